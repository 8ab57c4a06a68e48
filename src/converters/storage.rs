use crate::azure::models::{
    ArmResource, BlobContainerProperties, FileShareProperties, StorageAccountProperties,
};
use crate::azure::AzureWebLinker;
use crate::graph::{capitalize_first, get_time, Entity, Relationship, RelationshipClass};

use super::resource_properties;

pub const STORAGE_ACCOUNT_ENTITY_TYPE: &str = "azure_storage_account";
pub const STORAGE_ACCOUNT_ENTITY_CLASS: &[&str] = &["Service"];
pub const STORAGE_CONTAINER_ENTITY_TYPE: &str = "azure_storage_container";
pub const STORAGE_CONTAINER_ENTITY_CLASS: &[&str] = &["DataStore"];
pub const STORAGE_FILE_SHARE_ENTITY_TYPE: &str = "azure_storage_file_share";
pub const STORAGE_FILE_SHARE_ENTITY_CLASS: &[&str] = &["DataStore"];

/// Whether the account encrypts data at rest for one of its services (`blob`, `file`, ...).
pub fn storage_service_encrypted(
    account: &ArmResource<StorageAccountProperties>,
    service: &str,
) -> Option<bool> {
    account
        .properties
        .encryption
        .as_ref()?
        .services
        .as_ref()?
        .get(service)?
        .enabled
}

pub fn create_storage_account_entity(
    linker: &AzureWebLinker,
    account: &ArmResource<StorageAccountProperties>,
) -> Entity {
    let props = &account.properties;
    let endpoints: Vec<&str> = props
        .primary_endpoints
        .iter()
        .flat_map(|e| e.values())
        .map(String::as_str)
        .collect();

    let mut bag = resource_properties(linker, account)
        .set_opt("kind", account.kind.as_deref())
        .set_opt("sku", account.sku.as_ref().and_then(|s| s.name.as_deref()))
        .set_opt("skuTier", account.sku.as_ref().and_then(|s| s.tier.as_deref()))
        .set("endpoints", endpoints)
        .set_opt("enableHttpsTrafficOnly", props.enable_https_traffic_only)
        .set_opt("accessTier", props.access_tier.as_deref())
        .set_opt("primaryLocation", props.primary_location.as_deref())
        .set_opt("createdOn", get_time(props.creation_time.as_deref()));

    for service in ["blob", "file", "queue", "table"] {
        bag = bag.set_opt(
            &format!("encrypted{}", capitalize_first(service)),
            storage_service_encrypted(account, service),
        );
    }

    Entity::new(
        account.id.as_str(),
        STORAGE_ACCOUNT_ENTITY_TYPE,
        STORAGE_ACCOUNT_ENTITY_CLASS,
        bag.build(),
    )
}

pub fn create_storage_container_entity(
    linker: &AzureWebLinker,
    account: &ArmResource<StorageAccountProperties>,
    container: &ArmResource<BlobContainerProperties>,
) -> Entity {
    let props = &container.properties;
    let public_access = props.public_access.as_deref();

    let properties = resource_properties(linker, container)
        .set("public", public_access.is_some_and(|a| a != "None"))
        .set_opt("publicAccess", public_access)
        .set_opt("lastModified", get_time(props.last_modified_time.as_deref()))
        .set_opt("hasImmutabilityPolicy", props.has_immutability_policy)
        .set_opt("hasLegalHold", props.has_legal_hold)
        .set_opt("encrypted", storage_service_encrypted(account, "blob"))
        .build();

    Entity::new(
        container.id.as_str(),
        STORAGE_CONTAINER_ENTITY_TYPE,
        STORAGE_CONTAINER_ENTITY_CLASS,
        properties,
    )
}

pub fn create_storage_file_share_entity(
    linker: &AzureWebLinker,
    account: &ArmResource<StorageAccountProperties>,
    share: &ArmResource<FileShareProperties>,
) -> Entity {
    let properties = resource_properties(linker, share)
        .set_opt("shareQuota", share.properties.share_quota)
        .set_opt("lastModified", get_time(share.properties.last_modified_time.as_deref()))
        .set_opt("encrypted", storage_service_encrypted(account, "file"))
        .build();

    Entity::new(
        share.id.as_str(),
        STORAGE_FILE_SHARE_ENTITY_TYPE,
        STORAGE_FILE_SHARE_ENTITY_CLASS,
        properties,
    )
}

pub fn create_storage_account_child_relationship(account: &Entity, child: &Entity) -> Relationship {
    Relationship::direct(RelationshipClass::Has, account, child)
}
