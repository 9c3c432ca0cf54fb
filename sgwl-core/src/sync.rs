//! Sync - Ensure the whitelist rule exists, creating it only when absent
//!
//! The describe-then-authorize sequence is not transactional. A rule added by
//! someone else between the two calls can still end up duplicated.

use crate::provider::{ProviderResult, SecurityGroupApi};
use crate::rule::{Permission, TargetRule};

/// Result of a synchronization run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The rule was missing and has been added
    Created,
    /// A matching rule was already present; nothing was written
    AlreadyExists,
}

/// Find the first permission covering `rule`, in API order
pub fn find_matching_permission<'a>(
    permissions: &'a [Permission],
    rule: &TargetRule,
) -> Option<&'a Permission> {
    permissions.iter().find(|p| rule.matches(p))
}

/// Make sure `rule` is present in the security group behind `api`
pub async fn synchronize<A>(api: &A, rule: &TargetRule) -> ProviderResult<SyncOutcome>
where
    A: SecurityGroupApi + ?Sized,
{
    let permissions = api.describe_permissions().await?;
    log::debug!(
        "{} returned {} permissions",
        api.name(),
        permissions.len()
    );

    if let Some(existing) = find_matching_permission(&permissions, rule) {
        log::info!(
            "Found existing {} {} rule for {} ({})",
            existing.ip_protocol,
            existing.port_range,
            existing.source_cidr_ip,
            existing.direction
        );
        return Ok(SyncOutcome::AlreadyExists);
    }

    log::info!(
        "Authorizing {} {} from {}",
        rule.protocol,
        rule.port_range,
        rule.source_cidr_ip
    );
    api.authorize_ingress(rule).await?;
    Ok(SyncOutcome::Created)
}
