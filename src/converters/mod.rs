//! Pure converters from Azure API records to graph entities and relationships.
//!
//! Each submodule owns the `_type` / `_class` constants of one resource family.
//! Nothing here performs I/O; the only state consulted is the read-only
//! [`JobState`](crate::jobstate::JobState) handed to the functions that resolve targets.

pub mod active_directory;
pub mod compute;
pub mod cosmosdb;
pub mod databases;
pub mod keyvault;
pub mod monitor;
pub mod network;
pub mod resources;
pub mod security;
pub mod security_rules;
pub mod storage;

use crate::azure::models::ArmResource;
use crate::azure::resource_id::resource_group_name;
use crate::azure::AzureWebLinker;
use crate::graph::PropertyBag;

/// Properties shared by every ARM-backed entity: identity, location, tags and portal link.
pub fn resource_properties<P>(linker: &AzureWebLinker, resource: &ArmResource<P>) -> PropertyBag {
    PropertyBag::new()
        .set("id", resource.id.as_str())
        .set_opt("name", resource.name.as_deref())
        .set_opt("displayName", resource.name.as_deref())
        .set_opt("type", resource.resource_type.as_deref())
        .set_opt("region", resource.location.as_deref())
        .set_opt("resourceGroup", resource_group_name(&resource.id))
        .set_opt("environment", resource.tag("environment"))
        .tags(resource.tags.as_ref())
        .set_opt("webLink", linker.portal_resource_url(&resource.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azure::models::ResourceGroupProperties;
    use serde_json::json;

    #[test]
    fn test_resource_properties() {
        let resource: ArmResource<ResourceGroupProperties> = serde_json::from_value(json!({
            "id": "/subscriptions/s/resourceGroups/j1dev/providers/Microsoft.Network/virtualNetworks/j1dev",
            "name": "j1dev",
            "type": "Microsoft.Network/virtualNetworks",
            "location": "eastus",
            "tags": {"environment": "j1dev"}
        }))
        .unwrap();
        let linker = AzureWebLinker::new(Some("example.com".into()));

        let props = resource_properties(&linker, &resource).build();
        assert_eq!(props["resourceGroup"], json!("j1dev"));
        assert_eq!(props["region"], json!("eastus"));
        assert_eq!(props["environment"], json!("j1dev"));
        assert_eq!(props["tag.environment"], json!("j1dev"));
        assert_eq!(
            props["webLink"],
            json!("https://portal.azure.com/#@example.com/resource/subscriptions/s/resourceGroups/j1dev/providers/Microsoft.Network/virtualNetworks/j1dev")
        );
    }

    #[test]
    fn test_resource_properties_without_linker_domain() {
        let resource: ArmResource<ResourceGroupProperties> =
            serde_json::from_value(json!({"id": "/subscriptions/s/resourceGroups/rg"})).unwrap();
        let props = resource_properties(&AzureWebLinker::default(), &resource).build();
        assert!(!props.contains_key("webLink"));
        assert!(!props.contains_key("environment"));
        assert_eq!(props["resourceGroup"], json!("rg"));
    }
}
