use crate::azure::models::{ArmResource, KeyVaultProperties};
use crate::azure::AzureWebLinker;
use crate::converters::keyvault::create_key_vault_entity;
use crate::error::Result;
use crate::jobstate::JobState;

use super::monitor::publish_diagnostic_settings;
use super::{publish_resource_entity, StepContext};

const KEYVAULT_API_VERSION: &str = "2022-07-01";

pub(super) async fn fetch_key_vaults(ctx: &StepContext, state: &mut dyn JobState) -> Result<()> {
    let linker = AzureWebLinker::from_job_state(&*state);
    let (vaults, stats) = ctx
        .client
        .list_management::<ArmResource<KeyVaultProperties>>(
            &ctx.subscription_path("/providers/Microsoft.KeyVault/vaults"),
            KEYVAULT_API_VERSION,
        )
        .await?;

    for vault in &vaults {
        publish_resource_entity(state, create_key_vault_entity(&linker, vault))?;
        publish_diagnostic_settings(ctx, state, &linker, &vault.id).await?;
    }
    log::info!("Key vaults: {} added, {} skipped", vaults.len(), stats.skipped);
    Ok(())
}
