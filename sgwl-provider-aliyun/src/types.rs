//! ECS JSON response shapes

use serde::Deserialize;
use sgwl_core::rule::Permission;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeSecurityGroupAttributeResponse {
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub security_group_id: String,
    #[serde(default)]
    pub permissions: Permissions,
}

#[derive(Debug, Default, Deserialize)]
pub struct Permissions {
    #[serde(rename = "Permission", default)]
    pub permission: Vec<PermissionItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PermissionItem {
    pub ip_protocol: String,
    pub port_range: String,
    pub source_cidr_ip: String,
    pub direction: String,
    pub policy: String,
    pub nic_type: String,
}

impl From<PermissionItem> for Permission {
    fn from(item: PermissionItem) -> Self {
        Permission {
            ip_protocol: item.ip_protocol,
            port_range: item.port_range,
            source_cidr_ip: item.source_cidr_ip,
            direction: item.direction,
            policy: item.policy,
            nic_type: item.nic_type,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthorizeSecurityGroupResponse {
    #[serde(default)]
    pub request_id: String,
}

/// Body returned with non-2xx responses
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorResponse {
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub request_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_describe_response() {
        let body = r#"{
            "RequestId": "B2A4B0D5-1B3F-4E8A-9E43-1C8B1A6A2C11",
            "SecurityGroupId": "sg-bp1fg655nh68xyz9****",
            "RegionId": "cn-hangzhou",
            "InnerAccessPolicy": "Accept",
            "Permissions": {
                "Permission": [
                    {
                        "IpProtocol": "TCP",
                        "PortRange": "443/443",
                        "SourceCidrIp": "203.0.113.5/32",
                        "Direction": "ingress",
                        "Policy": "Accept",
                        "NicType": "internet",
                        "Priority": "1",
                        "CreateTime": "2024-01-01T00:00:00Z"
                    },
                    {
                        "IpProtocol": "ALL",
                        "PortRange": "-1/-1",
                        "DestCidrIp": "0.0.0.0/0",
                        "Direction": "egress",
                        "Policy": "Accept",
                        "NicType": "intranet"
                    }
                ]
            }
        }"#;

        let response: DescribeSecurityGroupAttributeResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.security_group_id, "sg-bp1fg655nh68xyz9****");
        assert_eq!(response.permissions.permission.len(), 2);

        let permission: Permission = response.permissions.permission.into_iter().next().unwrap().into();
        assert_eq!(permission.ip_protocol, "TCP");
        assert_eq!(permission.source_cidr_ip, "203.0.113.5/32");
        assert_eq!(permission.nic_type, "internet");
    }

    #[test]
    fn test_parse_describe_response_without_permissions() {
        let body = r#"{"RequestId": "abc", "SecurityGroupId": "sg-1", "Permissions": {}}"#;
        let response: DescribeSecurityGroupAttributeResponse = serde_json::from_str(body).unwrap();
        assert!(response.permissions.permission.is_empty());

        let egress_only = r#"{"Permissions": {"Permission": [{"Direction": "egress"}]}}"#;
        let response: DescribeSecurityGroupAttributeResponse =
            serde_json::from_str(egress_only).unwrap();
        assert_eq!(response.permissions.permission[0].source_cidr_ip, "");
    }

    #[test]
    fn test_parse_error_response() {
        let body = r#"{
            "RequestId": "7C1F8E2A",
            "HostId": "ecs.cn-hangzhou.aliyuncs.com",
            "Code": "InvalidSecurityGroupId.NotFound",
            "Message": "The specified SecurityGroupId does not exist.",
            "Recommend": "https://api.aliyun.com/troubleshoot"
        }"#;
        let error: ErrorResponse = serde_json::from_str(body).unwrap();
        assert_eq!(error.code, "InvalidSecurityGroupId.NotFound");
        assert_eq!(error.request_id, "7C1F8E2A");
    }
}
