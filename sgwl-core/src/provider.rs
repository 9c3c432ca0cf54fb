//! Provider - Traits abstracting the remote collaborators
//!
//! A SecurityGroupApi wraps a specific cloud (Alibaba Cloud ECS, etc.) and
//! an IpResolver wraps the service used to discover the caller's public IP.
//! Both are narrow so that synchronization can run against fakes.

use std::future::Future;
use std::pin::Pin;

use crate::rule::{Permission, TargetRule};

/// Category of a provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transport failure while talking to a remote endpoint
    Network,
    /// The response arrived but its body could not be read
    Read,
    /// The client could not be constructed
    ClientInit,
    /// The remote API rejected or failed the call
    Api,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Network => "network error",
            ErrorKind::Read => "read error",
            ErrorKind::ClientInit => "client initialization error",
            ErrorKind::Api => "API error",
        };
        write!(f, "{}", s)
    }
}

/// Error type for Provider operations
#[derive(Debug)]
pub struct ProviderError {
    pub kind: ErrorKind,
    pub message: String,
    /// Remote operation that failed (e.g., "DescribeSecurityGroupAttribute")
    pub operation: Option<&'static str>,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(operation) = self.operation {
            write!(f, "[{}] {}: {}", operation, self.kind, self.message)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl ProviderError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            operation: None,
            cause: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn read(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Read, message)
    }

    pub fn client_init(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ClientInit, message)
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Api, message)
    }

    pub fn for_operation(mut self, operation: &'static str) -> Self {
        self.operation = Some(operation);
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Discovers the public IP address the caller is seen from
pub trait IpResolver: Send + Sync {
    /// Resolve the public IP as a trimmed string
    ///
    /// The value is not validated; whatever the service returns is passed on.
    fn resolve(&self) -> BoxFuture<'_, ProviderResult<String>>;
}

/// Security group operations needed for rule synchronization
///
/// Each cloud provider implements this trait against its own API.
/// The security group and region are bound when the implementation is built.
pub trait SecurityGroupApi: Send + Sync {
    /// Name of this Provider (e.g., "aliyun")
    fn name(&self) -> &'static str;

    /// List every permission of the security group, in the order the API returns them
    fn describe_permissions(&self) -> BoxFuture<'_, ProviderResult<Vec<Permission>>>;

    /// Add an ingress permission described by `rule`
    fn authorize_ingress<'a>(&'a self, rule: &'a TargetRule) -> BoxFuture<'a, ProviderResult<()>>;
}
