use crate::azure::models::{ArmResource, SecurityAssessmentProperties};
use crate::azure::AzureWebLinker;
use crate::converters::security::{
    assessments_path, create_assessment_entity, create_assessment_scanned_resource_relationship,
};
use crate::error::Result;
use crate::jobstate::JobState;

use super::StepContext;

const SECURITY_API_VERSION: &str = "2020-01-01";

pub(super) async fn fetch_assessments(ctx: &StepContext, state: &mut dyn JobState) -> Result<()> {
    let linker = AzureWebLinker::from_job_state(&*state);
    let (assessments, stats) = ctx
        .client
        .list_management::<ArmResource<SecurityAssessmentProperties>>(
            &assessments_path(&ctx.subscription_id),
            SECURITY_API_VERSION,
        )
        .await?;

    let mut assessed = 0;
    for assessment in &assessments {
        let entity = create_assessment_entity(&linker, assessment);
        let relationship = create_assessment_scanned_resource_relationship(&*state, &entity);
        state.add_entity(entity)?;
        if let Some(relationship) = relationship {
            state.add_relationship(relationship)?;
            assessed += 1;
        }
    }
    log::info!(
        "Security assessments: {} added, {} skipped, {} linked to resources",
        assessments.len(),
        stats.skipped,
        assessed
    );
    Ok(())
}
