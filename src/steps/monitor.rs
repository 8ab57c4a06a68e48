use crate::azure::models::{ArmResource, DiagnosticSettingsProperties};
use crate::azure::AzureWebLinker;
use crate::converters::monitor::{
    create_diagnostic_setting_entities, create_diagnostic_setting_relationships,
    diagnostic_settings_path,
};
use crate::error::Result;
use crate::jobstate::JobState;

use super::StepContext;

const DIAGNOSTIC_SETTINGS_API_VERSION: &str = "2021-05-01-preview";

/// Fetch and publish the diagnostic settings of one resource. Not every resource
/// type supports diagnostic settings, so a failed listing is logged and skipped.
pub(super) async fn publish_diagnostic_settings(
    ctx: &StepContext,
    state: &mut dyn JobState,
    linker: &AzureWebLinker,
    resource_id: &str,
) -> Result<()> {
    let listing = ctx
        .client
        .list_management::<ArmResource<DiagnosticSettingsProperties>>(
            &diagnostic_settings_path(resource_id),
            DIAGNOSTIC_SETTINGS_API_VERSION,
        )
        .await;
    let settings = match listing {
        Ok((settings, _)) => settings,
        Err(e) => {
            log::warn!("Diagnostic settings unavailable for {}: {}", resource_id, e);
            return Ok(());
        }
    };

    for setting in &settings {
        for entity in create_diagnostic_setting_entities(linker, setting) {
            let relationships = create_diagnostic_setting_relationships(&*state, resource_id, &entity);
            state.add_entity(entity)?;
            state.add_relationships(relationships)?;
        }
    }
    Ok(())
}
