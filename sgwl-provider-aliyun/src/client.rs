//! Minimal signed client for the ECS RPC API

use std::collections::BTreeMap;

use chrono::Utc;
use serde::de::DeserializeOwned;
use sgwl_core::provider::{ProviderError, ProviderResult};

use crate::signature::{self, SIGNATURE_METHOD, SIGNATURE_VERSION};
use crate::types::ErrorResponse;

/// ECS API version all actions are called with
pub const API_VERSION: &str = "2014-05-26";

/// Signed GET client for ECS actions
pub struct EcsClient {
    http: reqwest::Client,
    endpoint: String,
    access_key_id: String,
    access_key_secret: String,
}

impl EcsClient {
    /// Create a client for `endpoint` (e.g., "https://ecs.cn-hangzhou.aliyuncs.com")
    pub fn new(
        endpoint: impl Into<String>,
        access_key_id: impl Into<String>,
        access_key_secret: impl Into<String>,
    ) -> ProviderResult<Self> {
        let http = reqwest::Client::builder().build().map_err(|e| {
            ProviderError::client_init(format!("Failed to build ECS HTTP client: {}", e))
                .with_cause(e)
        })?;

        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
        })
    }

    /// Regional ECS endpoint for `region_id`
    pub fn regional_endpoint(region_id: &str) -> String {
        format!("https://ecs.{}.aliyuncs.com", region_id)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Build the signed query string for one call
    fn signed_query(
        &self,
        action: &str,
        params: &[(&str, &str)],
        timestamp: &str,
        nonce: &str,
    ) -> ProviderResult<String> {
        let mut all: BTreeMap<String, String> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        for (k, v) in [
            ("Action", action),
            ("Format", "JSON"),
            ("Version", API_VERSION),
            ("AccessKeyId", self.access_key_id.as_str()),
            ("SignatureMethod", SIGNATURE_METHOD),
            ("SignatureVersion", SIGNATURE_VERSION),
            ("SignatureNonce", nonce),
            ("Timestamp", timestamp),
        ] {
            all.insert(k.to_string(), v.to_string());
        }

        let canonical = signature::canonical_query(&all);
        let string_to_sign = signature::string_to_sign("GET", &canonical);
        let signed = signature::sign(&self.access_key_secret, &string_to_sign).map_err(|e| {
            ProviderError::client_init(format!("Failed to sign request: {}", e))
        })?;

        Ok(format!(
            "{}&Signature={}",
            canonical,
            signature::percent_encode(&signed)
        ))
    }

    /// Call `action` and decode its JSON response
    ///
    /// Every failure, including transport errors, is reported as an API error
    /// tagged with the action name.
    pub async fn call<T>(&self, action: &'static str, params: &[(&str, &str)]) -> ProviderResult<T>
    where
        T: DeserializeOwned,
    {
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let nonce = uuid::Uuid::new_v4().to_string();
        let query = self
            .signed_query(action, params, &timestamp, &nonce)
            .map_err(|e| e.for_operation(action))?;
        let url = format!("{}/?{}", self.endpoint, query);

        log::debug!("Calling {} on {}", action, self.endpoint);

        let response = self.http.get(&url).send().await.map_err(|e| {
            ProviderError::api(format!("Request failed: {}", e))
                .for_operation(action)
                .with_cause(e)
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ProviderError::api(format!("Failed to read response body: {}", e))
                .for_operation(action)
                .with_cause(e)
        })?;

        if !status.is_success() {
            return Err(api_error(status, &body).for_operation(action));
        }

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::api(format!("Failed to parse response: {}", e))
                .for_operation(action)
                .with_cause(e)
        })
    }
}

fn api_error(status: reqwest::StatusCode, body: &str) -> ProviderError {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(err) => ProviderError::api(format!(
            "{}: {} (HTTP {}, request id {})",
            err.code,
            err.message,
            status.as_u16(),
            err.request_id
        )),
        Err(_) => ProviderError::api(format!("HTTP {}: {}", status.as_u16(), body.trim())),
    }
}
