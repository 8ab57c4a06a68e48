use crate::azure::models::{ArmResource, CosmosDbAccountProperties};
use crate::azure::AzureWebLinker;
use crate::graph::Entity;

use super::resource_properties;

pub const COSMOSDB_ACCOUNT_ENTITY_TYPE: &str = "azure_cosmosdb_account";
pub const COSMOSDB_ACCOUNT_ENTITY_CLASS: &[&str] = &["Account", "Service"];

pub fn create_cosmosdb_account_entity(
    linker: &AzureWebLinker,
    account: &ArmResource<CosmosDbAccountProperties>,
) -> Entity {
    let props = &account.properties;
    let properties = resource_properties(linker, account)
        .set_opt("kind", account.kind.as_deref())
        .set_opt("endpoint", props.document_endpoint.as_deref())
        .set_opt("offerType", props.database_account_offer_type.as_deref())
        .set_opt("provisioningState", props.provisioning_state.as_deref())
        .build();

    Entity::new(
        account.id.as_str(),
        COSMOSDB_ACCOUNT_ENTITY_TYPE,
        COSMOSDB_ACCOUNT_ENTITY_CLASS,
        properties,
    )
}
