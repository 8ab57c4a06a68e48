use crate::azure::models::{ArmResource, CosmosDbAccountProperties};
use crate::azure::AzureWebLinker;
use crate::converters::cosmosdb::create_cosmosdb_account_entity;
use crate::error::Result;
use crate::jobstate::JobState;

use super::{publish_resource_entity, StepContext};

const COSMOSDB_API_VERSION: &str = "2023-04-15";

pub(super) async fn fetch_cosmosdb_accounts(ctx: &StepContext, state: &mut dyn JobState) -> Result<()> {
    let linker = AzureWebLinker::from_job_state(&*state);
    let (accounts, stats) = ctx
        .client
        .list_management::<ArmResource<CosmosDbAccountProperties>>(
            &ctx.subscription_path("/providers/Microsoft.DocumentDB/databaseAccounts"),
            COSMOSDB_API_VERSION,
        )
        .await?;

    for account in &accounts {
        publish_resource_entity(state, create_cosmosdb_account_entity(&linker, account))?;
    }
    log::info!("Cosmos DB accounts: {} added, {} skipped", accounts.len(), stats.skipped);
    Ok(())
}
