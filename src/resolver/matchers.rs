//! Closed-world table mapping ARM resource ids to graph entity types.

use regex::Regex;
use std::sync::LazyLock;

use crate::converters::{compute, cosmosdb, keyvault, network, storage};
use crate::steps::ids::{
    STEP_RM_COMPUTE_VIRTUAL_MACHINES, STEP_RM_COSMOSDB_SQL_DATABASES, STEP_RM_KEYVAULT_VAULTS,
    STEP_RM_NETWORK_INTERFACES, STEP_RM_NETWORK_LOAD_BALANCERS, STEP_RM_NETWORK_PUBLIC_IP_ADDRESSES,
    STEP_RM_NETWORK_SECURITY_GROUPS, STEP_RM_NETWORK_VIRTUAL_NETWORKS, STEP_RM_STORAGE_RESOURCES,
};

/// Graph type used when no table entry recognizes a resource id.
pub const DEFAULT_RESOURCE_TYPE: &str = "azure_unknown_resource_type";

const RESOURCE_GROUP_MATCHER: &str = "/subscriptions/[^/]+/resourceGroups/[^/]+";
const EOL_MATCHER: &str = "$";

#[derive(Debug)]
pub struct ResourceIdMap {
    pub resource_id_matcher: Regex,
    /// Azure resource type name accepted as a type hint
    pub azure_type: Option<&'static str>,
    pub entity_type: &'static str,
    /// Steps that ingest entities of `entity_type`
    pub depends_on: &'static [&'static str],
}

impl ResourceIdMap {
    fn new(
        provider_path: &str,
        azure_type: Option<&'static str>,
        entity_type: &'static str,
        depends_on: &'static [&'static str],
    ) -> Self {
        // ARM casing of provider and collection segments varies between APIs,
        // e.g. `microsoft.network/networksecuritygroups` inside setting ids.
        let pattern = format!("(?i){}{}{}", RESOURCE_GROUP_MATCHER, provider_path, EOL_MATCHER);
        Self {
            resource_id_matcher: Regex::new(&pattern).expect("Invalid resource id pattern"),
            azure_type,
            entity_type,
            depends_on,
        }
    }
}

/// Entries are tried in order; the first match wins.
pub static RESOURCE_ID_TYPES_MAP: LazyLock<Vec<ResourceIdMap>> = LazyLock::new(|| {
    vec![
        ResourceIdMap::new(
            "/providers/Microsoft.KeyVault/vaults/[^/]+",
            Some("Microsoft.KeyVault/vault"),
            keyvault::KEY_VAULT_ENTITY_TYPE,
            &[STEP_RM_KEYVAULT_VAULTS],
        ),
        ResourceIdMap::new(
            "/providers/Microsoft.Network/networkInterfaces/[^/]+",
            None,
            network::NETWORK_INTERFACE_ENTITY_TYPE,
            &[STEP_RM_NETWORK_INTERFACES],
        ),
        ResourceIdMap::new(
            "/providers/Microsoft.Network/networkSecurityGroups/[^/]+",
            None,
            network::SECURITY_GROUP_ENTITY_TYPE,
            &[STEP_RM_NETWORK_SECURITY_GROUPS],
        ),
        ResourceIdMap::new(
            "/providers/Microsoft.Network/publicIPAddresses/[^/]+",
            None,
            network::PUBLIC_IP_ENTITY_TYPE,
            &[STEP_RM_NETWORK_PUBLIC_IP_ADDRESSES],
        ),
        ResourceIdMap::new(
            "/providers/Microsoft.Network/virtualNetworks/[^/]+/subnets/[^/]+",
            None,
            network::SUBNET_ENTITY_TYPE,
            &[STEP_RM_NETWORK_VIRTUAL_NETWORKS],
        ),
        ResourceIdMap::new(
            "/providers/Microsoft.Network/virtualNetworks/[^/]+",
            None,
            network::VIRTUAL_NETWORK_ENTITY_TYPE,
            &[STEP_RM_NETWORK_VIRTUAL_NETWORKS],
        ),
        ResourceIdMap::new(
            "/providers/Microsoft.DocumentDB/databaseAccounts/[^/]+",
            None,
            cosmosdb::COSMOSDB_ACCOUNT_ENTITY_TYPE,
            &[STEP_RM_COSMOSDB_SQL_DATABASES],
        ),
        ResourceIdMap::new(
            "/providers/Microsoft.Storage/storageAccounts/[^/]+",
            None,
            storage::STORAGE_ACCOUNT_ENTITY_TYPE,
            &[STEP_RM_STORAGE_RESOURCES],
        ),
        ResourceIdMap::new(
            "/providers/Microsoft.Network/loadBalancers/[^/]+",
            None,
            network::LOAD_BALANCER_ENTITY_TYPE,
            &[STEP_RM_NETWORK_LOAD_BALANCERS],
        ),
        ResourceIdMap::new(
            "/providers/Microsoft.Compute/virtualMachines/[^/]+",
            None,
            compute::VIRTUAL_MACHINE_ENTITY_TYPE,
            &[STEP_RM_COMPUTE_VIRTUAL_MACHINES],
        ),
    ]
});

/// Every step any table entry depends on, in table order without duplicates.
pub fn resource_id_matcher_depends_on() -> Vec<&'static str> {
    let mut steps: Vec<&'static str> = Vec::new();
    for entry in RESOURCE_ID_TYPES_MAP.iter() {
        for step in entry.depends_on {
            if !steps.contains(step) {
                steps.push(step);
            }
        }
    }
    steps
}

/// Every entity type the table can resolve to, in table order.
pub fn resource_id_matcher_entity_types() -> Vec<&'static str> {
    RESOURCE_ID_TYPES_MAP.iter().map(|e| e.entity_type).collect()
}

pub fn get_type_for_resource_id<'a>(resource_id: &str, map: &'a [ResourceIdMap]) -> Option<&'a str> {
    map.iter()
        .find(|e| e.resource_id_matcher.is_match(resource_id))
        .map(|e| e.entity_type)
}

pub fn get_type_for_azure_type<'a>(azure_type: &str, map: &'a [ResourceIdMap]) -> Option<&'a str> {
    map.iter()
        .find(|e| e.azure_type == Some(azure_type))
        .map(|e| e.entity_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RG: &str = "/subscriptions/87f62f44-9dad-4284-a08f-f2fb3d8b528a/resourceGroups/j1dev";

    fn type_of(suffix: &str) -> Option<&'static str> {
        get_type_for_resource_id(&format!("{}{}", RG, suffix), &RESOURCE_ID_TYPES_MAP)
    }

    #[test]
    fn test_known_resource_ids() {
        assert_eq!(type_of("/providers/Microsoft.KeyVault/vaults/kv"), Some("azure_keyvault_service"));
        assert_eq!(type_of("/providers/Microsoft.Network/networkInterfaces/j1dev"), Some("azure_nic"));
        assert_eq!(
            type_of("/providers/Microsoft.Network/networkSecurityGroups/j1dev"),
            Some("azure_security_group")
        );
        assert_eq!(type_of("/providers/Microsoft.Network/publicIPAddresses/j1dev"), Some("azure_public_ip"));
        assert_eq!(type_of("/providers/Microsoft.Network/virtualNetworks/j1dev"), Some("azure_vnet"));
        assert_eq!(
            type_of("/providers/Microsoft.Network/virtualNetworks/j1dev/subnets/priv"),
            Some("azure_subnet")
        );
        assert_eq!(
            type_of("/providers/Microsoft.DocumentDB/databaseAccounts/db"),
            Some("azure_cosmosdb_account")
        );
        assert_eq!(
            type_of("/providers/Microsoft.Storage/storageAccounts/keionnedj1dev"),
            Some("azure_storage_account")
        );
        assert_eq!(type_of("/providers/Microsoft.Network/loadBalancers/TestLoadBalancer"), Some("azure_lb"));
        assert_eq!(type_of("/providers/Microsoft.Compute/virtualMachines/j1dev"), Some("azure_vm"));
    }

    #[test]
    fn test_lowercased_ids_match() {
        assert_eq!(
            type_of("/providers/microsoft.network/networksecuritygroups/j1dev"),
            Some("azure_security_group")
        );
    }

    #[test]
    fn test_unknown_and_nested_ids_do_not_match() {
        assert_eq!(type_of("/providers/Microsoft.Web/sites/app"), None);
        assert_eq!(
            type_of("/providers/Microsoft.Network/networkSecurityGroups/j1dev/providers/microsoft.insights/diagnosticSettings/x"),
            None
        );
        assert_eq!(get_type_for_resource_id("not an id", &RESOURCE_ID_TYPES_MAP), None);
    }

    #[test]
    fn test_azure_type_hint() {
        assert_eq!(
            get_type_for_azure_type("Microsoft.KeyVault/vault", &RESOURCE_ID_TYPES_MAP),
            Some("azure_keyvault_service")
        );
        assert_eq!(get_type_for_azure_type("NO_TYPE", &RESOURCE_ID_TYPES_MAP), None);
    }

    #[test]
    fn test_first_match_wins() {
        let general = ResourceIdMap::new("/providers/Microsoft.Network/[^/]+/[^/]+", None, "general", &[]);
        let specific = ResourceIdMap::new(
            "/providers/Microsoft.Network/loadBalancers/[^/]+",
            None,
            "specific",
            &[],
        );
        let id = format!("{}/providers/Microsoft.Network/loadBalancers/lb", RG);

        let specific_first = [
            ResourceIdMap::new("/providers/Microsoft.Network/loadBalancers/[^/]+", None, "specific", &[]),
            ResourceIdMap::new("/providers/Microsoft.Network/[^/]+/[^/]+", None, "general", &[]),
        ];
        assert_eq!(get_type_for_resource_id(&id, &[general, specific]), Some("general"));
        assert_eq!(get_type_for_resource_id(&id, &specific_first), Some("specific"));
    }

    #[test]
    fn test_depends_on_is_deduplicated() {
        let steps = resource_id_matcher_depends_on();
        assert_eq!(
            steps.iter().filter(|s| **s == STEP_RM_NETWORK_VIRTUAL_NETWORKS).count(),
            1
        );
        assert_eq!(steps.len(), 9);
        assert_eq!(resource_id_matcher_entity_types().len(), 10);
    }
}
