//! Rule - Security group permissions and the rule we want to exist

/// Port the whitelisted rule opens
pub const TARGET_PORT: u16 = 443;

/// Direction of the rule we write; existing permissions keep the raw string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ingress,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Ingress => "ingress",
        }
    }
}

/// Action applied to traffic matching the rule we write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Accept,
}

impl Policy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Policy::Accept => "accept",
        }
    }
}

/// Network interface class the rule we write applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NicType {
    Internet,
}

impl NicType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NicType::Internet => "internet",
        }
    }
}

/// One existing permission as reported by the remote API
///
/// Values are kept verbatim; providers report e.g. "TCP" or "Accept"
/// in whatever case their API uses. Absent fields are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permission {
    pub ip_protocol: String,
    pub port_range: String,
    pub source_cidr_ip: String,
    pub direction: String,
    pub policy: String,
    pub nic_type: String,
}

/// The ingress rule that should exist for the caller's public IP
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRule {
    pub protocol: String,
    pub port_range: String,
    pub source_cidr_ip: String,
    pub direction: Direction,
    pub policy: Policy,
    pub nic_type: NicType,
}

impl TargetRule {
    /// Build the TCP/443 ingress rule for a single host
    pub fn for_public_ip(ip: &str) -> Self {
        Self {
            protocol: "tcp".to_string(),
            port_range: format!("{}/{}", TARGET_PORT, TARGET_PORT),
            source_cidr_ip: format!("{}/32", ip),
            direction: Direction::Ingress,
            policy: Policy::Accept,
            nic_type: NicType::Internet,
        }
    }

    /// Whether `permission` already covers this rule
    ///
    /// Only protocol, port range, source CIDR and direction discriminate.
    /// Policy and NIC type are written on create but not compared here.
    pub fn matches(&self, permission: &Permission) -> bool {
        permission.ip_protocol.eq_ignore_ascii_case(&self.protocol)
            && permission.port_range == self.port_range
            && permission.source_cidr_ip == self.source_cidr_ip
            && permission.direction == self.direction.as_str()
    }
}
