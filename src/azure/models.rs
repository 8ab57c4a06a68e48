//! Serde shapes of the ARM and Microsoft Graph records the steps consume.
//!
//! Only `id` is required; every other field is optional so a partially
//! populated record still converts. Records without an `id` fail to
//! deserialize and are skipped by the client.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Common ARM envelope: top-level identity plus resource-specific `properties`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmResource<P> {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub tags: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub sku: Option<Sku>,
    #[serde(default)]
    pub properties: P,
}

impl<P> ArmResource<P> {
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.as_ref()?.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sku {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tier: Option<String>,
}

/// Reference to another ARM resource by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubResource {
    pub id: String,
}

// Resources

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroupProperties {
    #[serde(default)]
    pub provisioning_state: Option<String>,
}

// Compute

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineProperties {
    #[serde(default)]
    pub vm_id: Option<String>,
    #[serde(default)]
    pub provisioning_state: Option<String>,
    #[serde(default)]
    pub hardware_profile: Option<HardwareProfile>,
    #[serde(default)]
    pub storage_profile: Option<StorageProfile>,
    #[serde(default)]
    pub network_profile: Option<NetworkProfile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareProfile {
    #[serde(default)]
    pub vm_size: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageProfile {
    #[serde(default)]
    pub os_disk: Option<OsDisk>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsDisk {
    #[serde(default)]
    pub os_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkProfile {
    #[serde(default)]
    pub network_interfaces: Vec<SubResource>,
}

// Network

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNetworkProperties {
    #[serde(default)]
    pub address_space: Option<AddressSpace>,
    #[serde(default)]
    pub subnets: Vec<ArmResource<SubnetProperties>>,
    #[serde(default)]
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressSpace {
    #[serde(default)]
    pub address_prefixes: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetProperties {
    #[serde(default)]
    pub address_prefix: Option<String>,
    #[serde(default)]
    pub network_security_group: Option<SubResource>,
    #[serde(default)]
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicIpAddressProperties {
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(rename = "publicIPAllocationMethod", default)]
    pub public_ip_allocation_method: Option<String>,
    #[serde(default)]
    pub resource_guid: Option<String>,
    #[serde(default)]
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterfaceProperties {
    #[serde(default)]
    pub ip_configurations: Vec<ArmResource<IpConfigurationProperties>>,
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(rename = "enableIPForwarding", default)]
    pub enable_ip_forwarding: Option<bool>,
    #[serde(default)]
    pub network_security_group: Option<SubResource>,
    #[serde(default)]
    pub virtual_machine: Option<SubResource>,
    #[serde(default)]
    pub resource_guid: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpConfigurationProperties {
    #[serde(rename = "privateIPAddress", default)]
    pub private_ip_address: Option<String>,
    #[serde(rename = "publicIPAddress", default)]
    pub public_ip_address: Option<SubResource>,
    #[serde(default)]
    pub subnet: Option<SubResource>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSecurityGroupProperties {
    #[serde(default)]
    pub security_rules: Vec<ArmResource<SecurityRuleProperties>>,
    #[serde(default)]
    pub default_security_rules: Vec<ArmResource<SecurityRuleProperties>>,
    #[serde(default)]
    pub subnets: Vec<SubResource>,
    #[serde(default)]
    pub network_interfaces: Vec<SubResource>,
    #[serde(default)]
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityRuleProperties {
    #[serde(default)]
    pub access: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub provisioning_state: Option<String>,
    #[serde(default)]
    pub source_address_prefix: Option<String>,
    #[serde(default)]
    pub source_address_prefixes: Vec<String>,
    #[serde(default)]
    pub source_port_range: Option<String>,
    #[serde(default)]
    pub destination_address_prefix: Option<String>,
    #[serde(default)]
    pub destination_address_prefixes: Vec<String>,
    #[serde(default)]
    pub destination_port_range: Option<String>,
    #[serde(default)]
    pub destination_port_ranges: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerProperties {
    #[serde(rename = "frontendIPConfigurations", default)]
    pub frontend_ip_configurations: Vec<ArmResource<IpConfigurationProperties>>,
    #[serde(default)]
    pub resource_guid: Option<String>,
    #[serde(default)]
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureFirewallProperties {
    #[serde(default)]
    pub provisioning_state: Option<String>,
    #[serde(default)]
    pub threat_intel_mode: Option<String>,
}

// Storage

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageAccountProperties {
    #[serde(default)]
    pub primary_endpoints: Option<BTreeMap<String, String>>,
    #[serde(default, alias = "supportsHttpsTrafficOnly")]
    pub enable_https_traffic_only: Option<bool>,
    #[serde(default)]
    pub access_tier: Option<String>,
    #[serde(default)]
    pub primary_location: Option<String>,
    #[serde(default)]
    pub creation_time: Option<String>,
    #[serde(default)]
    pub encryption: Option<StorageEncryption>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageEncryption {
    #[serde(default)]
    pub services: Option<BTreeMap<String, EncryptionService>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncryptionService {
    #[serde(default)]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobContainerProperties {
    #[serde(default)]
    pub public_access: Option<String>,
    #[serde(default)]
    pub last_modified_time: Option<String>,
    #[serde(default)]
    pub has_immutability_policy: Option<bool>,
    #[serde(default)]
    pub has_legal_hold: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileShareProperties {
    #[serde(default)]
    pub share_quota: Option<i64>,
    #[serde(default)]
    pub last_modified_time: Option<String>,
}

// Databases

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostgreSqlServerProperties {
    #[serde(default)]
    pub fully_qualified_domain_name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub user_visible_state: Option<String>,
    #[serde(default)]
    pub ssl_enforcement: Option<String>,
    #[serde(default)]
    pub administrator_login: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostgreSqlDatabaseProperties {
    #[serde(default)]
    pub charset: Option<String>,
    #[serde(default)]
    pub collation: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyVaultProperties {
    #[serde(default)]
    pub vault_uri: Option<String>,
    #[serde(default)]
    pub enable_soft_delete: Option<bool>,
    #[serde(default)]
    pub enable_purge_protection: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CosmosDbAccountProperties {
    #[serde(default)]
    pub document_endpoint: Option<String>,
    #[serde(default)]
    pub database_account_offer_type: Option<String>,
    #[serde(default)]
    pub provisioning_state: Option<String>,
}

// Monitor

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticSettingsProperties {
    #[serde(default)]
    pub storage_account_id: Option<String>,
    #[serde(default)]
    pub logs: Vec<LogSettings>,
    #[serde(default)]
    pub metrics: Vec<MetricSettings>,
    /// Destination fields (workspace, event hub, ...) kept verbatim, explicit nulls included.
    #[serde(flatten)]
    pub destinations: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogSettings {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub retention_policy: Option<RetentionPolicy>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSettings {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub time_grain: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub retention_policy: Option<RetentionPolicy>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetentionPolicy {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub days: i64,
}

// Security

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityAssessmentProperties {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub status: Option<AssessmentStatus>,
    #[serde(default)]
    pub resource_details: Option<Map<String, Value>>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssessmentStatus {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub cause: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

// Microsoft Graph

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub verified_domains: Vec<VerifiedDomain>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedDomain {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_default: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub mail: Option<String>,
    #[serde(default)]
    pub mobile_phone: Option<String>,
    #[serde(default)]
    pub office_location: Option<String>,
    #[serde(default)]
    pub preferred_language: Option<String>,
    #[serde(default)]
    pub surname: Option<String>,
    #[serde(default)]
    pub user_principal_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub deleted_date_time: Option<String>,
    #[serde(default)]
    pub classification: Option<String>,
    #[serde(default)]
    pub created_date_time: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mail: Option<String>,
    #[serde(default)]
    pub mail_enabled: Option<bool>,
    #[serde(default)]
    pub mail_nickname: Option<String>,
    #[serde(default)]
    pub renewed_date_time: Option<String>,
    #[serde(default)]
    pub security_enabled: Option<bool>,
}

/// A group member; `@odata.type` says whether it is a user, a group, or something else.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    #[serde(rename = "@odata.type", default)]
    pub odata_type: Option<String>,
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Remaining fields as returned, so an explicit `null` can be told apart from absence.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_arm_resource_without_properties() {
        let vnet: ArmResource<VirtualNetworkProperties> =
            serde_json::from_value(json!({"id": "/vnets/a", "name": "a"})).unwrap();
        assert!(vnet.properties.subnets.is_empty());
        assert!(vnet.tag("environment").is_none());
    }

    #[test]
    fn test_missing_id_is_rejected() {
        let result = serde_json::from_value::<ArmResource<VirtualNetworkProperties>>(json!({"name": "a"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_diagnostic_destinations_keep_nulls() {
        let props: DiagnosticSettingsProperties = serde_json::from_value(json!({
            "storageAccountId": "/sa",
            "workspaceId": null,
            "logs": [{"category": "Audit", "enabled": true, "retentionPolicy": {"enabled": true, "days": 1}}]
        }))
        .unwrap();
        assert_eq!(props.destinations.get("workspaceId"), Some(&Value::Null));
        assert_eq!(props.logs[0].retention_policy.as_ref().unwrap().days, 1);
    }

    #[test]
    fn test_group_member_extra_fields() {
        let member: GroupMember = serde_json::from_value(json!({
            "@odata.type": "#microsoft.graph.group",
            "id": "1",
            "displayName": "Managers",
            "jobTitle": null
        }))
        .unwrap();
        assert_eq!(member.odata_type.as_deref(), Some("#microsoft.graph.group"));
        assert_eq!(member.extra.get("jobTitle"), Some(&Value::Null));
        assert!(member.extra.get("mail").is_none());
    }
}
