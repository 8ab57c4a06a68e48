use crate::azure::models::{ArmResource, ResourceGroupProperties};
use crate::azure::AzureWebLinker;
use crate::converters::resources::create_resource_group_entity;
use crate::error::Result;
use crate::jobstate::JobState;

use super::StepContext;

const RESOURCES_API_VERSION: &str = "2021-04-01";

pub(super) async fn fetch_resource_groups(ctx: &StepContext, state: &mut dyn JobState) -> Result<()> {
    let linker = AzureWebLinker::from_job_state(&*state);
    let (groups, stats) = ctx
        .client
        .list_management::<ArmResource<ResourceGroupProperties>>(
            &ctx.subscription_path("/resourcegroups"),
            RESOURCES_API_VERSION,
        )
        .await?;

    for group in &groups {
        state.add_entity(create_resource_group_entity(&linker, group))?;
    }
    log::info!("Resource groups: {} added, {} skipped", groups.len(), stats.skipped);
    Ok(())
}
