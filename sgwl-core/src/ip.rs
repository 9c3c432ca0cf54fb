//! Public IP discovery through an HTTP echo service

use crate::provider::{BoxFuture, IpResolver, ProviderError, ProviderResult};

/// Echo service returning the caller's address as a plain-text body
pub const DEFAULT_ECHO_URL: &str = "https://checkip.amazonaws.com";

/// Resolves the public IP with a single unauthenticated GET
pub struct HttpIpResolver {
    client: reqwest::Client,
    url: String,
}

impl HttpIpResolver {
    /// Create a resolver for the default echo service
    pub fn new() -> ProviderResult<Self> {
        Self::with_url(DEFAULT_ECHO_URL)
    }

    /// Create a resolver for a specific echo endpoint (for testing)
    pub fn with_url(url: impl Into<String>) -> ProviderResult<Self> {
        let client = reqwest::Client::builder().build().map_err(|e| {
            ProviderError::client_init(format!("Failed to build HTTP client: {}", e)).with_cause(e)
        })?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    async fn fetch(&self) -> ProviderResult<String> {
        log::debug!("Requesting public IP from {}", self.url);

        let response = self.client.get(&self.url).send().await.map_err(|e| {
            ProviderError::network(format!("Failed to get public IP from {}: {}", self.url, e))
                .with_cause(e)
        })?;

        let body = response.text().await.map_err(|e| {
            ProviderError::read(format!("Failed to read public IP response: {}", e)).with_cause(e)
        })?;

        Ok(body.trim().to_string())
    }
}

impl IpResolver for HttpIpResolver {
    fn resolve(&self) -> BoxFuture<'_, ProviderResult<String>> {
        Box::pin(self.fetch())
    }
}
