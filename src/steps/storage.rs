use crate::azure::models::{
    ArmResource, BlobContainerProperties, FileShareProperties, StorageAccountProperties,
};
use crate::azure::{AzureWebLinker, IterationStats};
use crate::converters::storage::{
    create_storage_account_child_relationship, create_storage_account_entity,
    create_storage_container_entity, create_storage_file_share_entity,
};
use crate::error::Result;
use crate::jobstate::JobState;

use super::monitor::publish_diagnostic_settings;
use super::{publish_resource_entity, StepContext};

const STORAGE_API_VERSION: &str = "2023-01-01";

pub(super) async fn fetch_storage_resources(ctx: &StepContext, state: &mut dyn JobState) -> Result<()> {
    let linker = AzureWebLinker::from_job_state(&*state);
    let (accounts, stats) = ctx
        .client
        .list_management::<ArmResource<StorageAccountProperties>>(
            &ctx.subscription_path("/providers/Microsoft.Storage/storageAccounts"),
            STORAGE_API_VERSION,
        )
        .await?;

    let mut child_stats = IterationStats::default();
    for account in &accounts {
        let account_entity = create_storage_account_entity(&linker, account);
        publish_resource_entity(state, account_entity.clone())?;

        let (containers, container_stats) = ctx
            .client
            .list_management::<ArmResource<BlobContainerProperties>>(
                &format!("{}/blobServices/default/containers", account.id),
                STORAGE_API_VERSION,
            )
            .await?;
        for container in &containers {
            let entity = create_storage_container_entity(&linker, account, container);
            let has = create_storage_account_child_relationship(&account_entity, &entity);
            state.add_entity(entity)?;
            state.add_relationship(has)?;
        }

        child_stats.absorb(container_stats);
        let (shares, share_stats) = ctx
            .client
            .list_management::<ArmResource<FileShareProperties>>(
                &format!("{}/fileServices/default/shares", account.id),
                STORAGE_API_VERSION,
            )
            .await?;
        for share in &shares {
            let entity = create_storage_file_share_entity(&linker, account, share);
            let has = create_storage_account_child_relationship(&account_entity, &entity);
            state.add_entity(entity)?;
            state.add_relationship(has)?;
        }

        child_stats.absorb(share_stats);

        log::debug!(
            "Storage account {}: {} containers, {} file shares",
            account.id,
            containers.len(),
            shares.len()
        );
        publish_diagnostic_settings(ctx, state, &linker, &account.id).await?;
    }
    log::info!(
        "Storage accounts: {} added, {} skipped; children: {} records over {} pages, {} skipped",
        accounts.len(),
        stats.skipped,
        child_stats.records,
        child_stats.pages,
        child_stats.skipped
    );
    Ok(())
}
