use crate::azure::models::{ArmResource, KeyVaultProperties};
use crate::azure::AzureWebLinker;
use crate::graph::Entity;

use super::resource_properties;

pub const KEY_VAULT_ENTITY_TYPE: &str = "azure_keyvault_service";
pub const KEY_VAULT_ENTITY_CLASS: &[&str] = &["Service"];

pub fn create_key_vault_entity(linker: &AzureWebLinker, vault: &ArmResource<KeyVaultProperties>) -> Entity {
    let props = &vault.properties;
    let properties = resource_properties(linker, vault)
        .set("category", vec!["infrastructure"])
        .set_opt("endpoints", props.vault_uri.as_deref().map(|uri| vec![uri]))
        .set_opt("softDeleteEnabled", props.enable_soft_delete)
        .set_opt("purgeProtectionEnabled", props.enable_purge_protection)
        .build();

    Entity::new(vault.id.as_str(), KEY_VAULT_ENTITY_TYPE, KEY_VAULT_ENTITY_CLASS, properties)
}
