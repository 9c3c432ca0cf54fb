//! sg-whitelist Alibaba Cloud Provider
//!
//! Security group operations against the ECS RPC API

pub mod client;
pub mod signature;
pub mod types;

use sgwl_core::config::Settings;
use sgwl_core::provider::{BoxFuture, ProviderResult, SecurityGroupApi};
use sgwl_core::rule::{Permission, TargetRule};

use crate::client::EcsClient;
use crate::types::{AuthorizeSecurityGroupResponse, DescribeSecurityGroupAttributeResponse};

const DESCRIBE_SECURITY_GROUP_ATTRIBUTE: &str = "DescribeSecurityGroupAttribute";
const AUTHORIZE_SECURITY_GROUP: &str = "AuthorizeSecurityGroup";

/// Alibaba Cloud Provider bound to one security group in one region
pub struct AliyunProvider {
    client: EcsClient,
    region_id: String,
    security_group_id: String,
}

impl AliyunProvider {
    /// Create a provider using the regional ECS endpoint
    pub fn new(settings: &Settings) -> ProviderResult<Self> {
        Self::with_endpoint(settings, EcsClient::regional_endpoint(&settings.region_id))
    }

    /// Create a provider against a specific endpoint (for testing)
    pub fn with_endpoint(settings: &Settings, endpoint: impl Into<String>) -> ProviderResult<Self> {
        let client = EcsClient::new(
            endpoint,
            settings.access_key_id.as_str(),
            settings.access_key_secret.as_str(),
        )?;

        Ok(Self {
            client,
            region_id: settings.region_id.clone(),
            security_group_id: settings.security_group_id.clone(),
        })
    }

    /// Read all permissions of the security group
    ///
    /// The whole list comes back in one response; there is no paging.
    async fn describe_security_group_attribute(&self) -> ProviderResult<Vec<Permission>> {
        let response: DescribeSecurityGroupAttributeResponse = self
            .client
            .call(
                DESCRIBE_SECURITY_GROUP_ATTRIBUTE,
                &[
                    ("SecurityGroupId", self.security_group_id.as_str()),
                    ("RegionId", self.region_id.as_str()),
                ],
            )
            .await?;

        log::debug!(
            "DescribeSecurityGroupAttribute {} (request id {})",
            response.security_group_id,
            response.request_id
        );

        Ok(response
            .permissions
            .permission
            .into_iter()
            .map(Permission::from)
            .collect())
    }

    /// Add an ingress permission
    async fn authorize_security_group(&self, rule: &TargetRule) -> ProviderResult<()> {
        let response: AuthorizeSecurityGroupResponse = self
            .client
            .call(
                AUTHORIZE_SECURITY_GROUP,
                &[
                    ("SecurityGroupId", self.security_group_id.as_str()),
                    ("RegionId", self.region_id.as_str()),
                    ("IpProtocol", rule.protocol.as_str()),
                    ("PortRange", rule.port_range.as_str()),
                    ("SourceCidrIp", rule.source_cidr_ip.as_str()),
                    ("Policy", rule.policy.as_str()),
                    ("NicType", rule.nic_type.as_str()),
                ],
            )
            .await?;

        log::debug!("AuthorizeSecurityGroup request id {}", response.request_id);
        Ok(())
    }
}

impl SecurityGroupApi for AliyunProvider {
    fn name(&self) -> &'static str {
        "aliyun"
    }

    fn describe_permissions(&self) -> BoxFuture<'_, ProviderResult<Vec<Permission>>> {
        Box::pin(self.describe_security_group_attribute())
    }

    fn authorize_ingress<'a>(&'a self, rule: &'a TargetRule) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(self.authorize_security_group(rule))
    }
}
