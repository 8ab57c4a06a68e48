//! Diagnostic settings: one entity per log or metric category of a setting.

use crate::azure::models::{ArmResource, DiagnosticSettingsProperties, RetentionPolicy};
use crate::azure::AzureWebLinker;
use crate::graph::{key_component, Entity, PropertyBag, Relationship, RelationshipClass};
use crate::jobstate::JobState;
use crate::resolver::{find_or_build_resource_entity, relationship_to_resolution};

use super::storage::STORAGE_ACCOUNT_ENTITY_TYPE;

pub const DIAGNOSTIC_LOG_SETTING_ENTITY_TYPE: &str = "azure_diagnostic_log_setting";
pub const DIAGNOSTIC_LOG_SETTING_ENTITY_CLASS: &[&str] = &["Configuration"];
pub const DIAGNOSTIC_METRIC_SETTING_ENTITY_TYPE: &str = "azure_diagnostic_metric_setting";
pub const DIAGNOSTIC_METRIC_SETTING_ENTITY_CLASS: &[&str] = &["Configuration"];

/// Graph type standing in for whichever resource owns a diagnostic setting.
pub const MONITORED_RESOURCE_TYPE: &str = "azure_resource";

/// Destination fields copied verbatim, explicit `null`s included.
const DESTINATION_FIELDS: &[&str] = &[
    "eventHubAuthorizationRuleId",
    "eventHubName",
    "logAnalyticsDestinationType",
    "serviceBusRuleId",
    "workspaceId",
];

/// ARM list path of the diagnostic settings of one resource.
pub fn diagnostic_settings_path(resource_id: &str) -> String {
    format!("{}/providers/Microsoft.Insights/diagnosticSettings", resource_id)
}

fn retention_key(retention: Option<&RetentionPolicy>) -> String {
    format!(
        "{}/{}",
        key_component(retention.map(|r| r.days)),
        key_component(retention.map(|r| r.enabled))
    )
}

fn setting_properties(
    linker: &AzureWebLinker,
    settings: &ArmResource<DiagnosticSettingsProperties>,
    key: &str,
    category: Option<&str>,
    enabled: bool,
    retention: Option<&RetentionPolicy>,
) -> PropertyBag {
    PropertyBag::new()
        .set("id", key)
        .set_opt("name", settings.name.as_deref())
        .set_opt("displayName", settings.name.as_deref())
        .set_opt("category", category)
        .set("enabled", enabled)
        .copy_fields(&settings.properties.destinations, DESTINATION_FIELDS)
        .set_opt("retentionPolicy.days", retention.map(|r| r.days))
        .set_opt("retentionPolicy.enabled", retention.map(|r| r.enabled))
        .set_opt("storageAccountId", settings.properties.storage_account_id.as_deref())
        .set_opt("webLink", linker.portal_resource_url(&settings.id))
}

/// Log setting entities followed by metric setting entities.
pub fn create_diagnostic_setting_entities(
    linker: &AzureWebLinker,
    settings: &ArmResource<DiagnosticSettingsProperties>,
) -> Vec<Entity> {
    let mut entities = Vec::new();

    for log in &settings.properties.logs {
        let retention = log.retention_policy.as_ref();
        let key = format!(
            "{}/logs/{}/{}/{}",
            settings.id,
            key_component(log.category.as_deref()),
            log.enabled,
            retention_key(retention)
        );
        let properties =
            setting_properties(linker, settings, &key, log.category.as_deref(), log.enabled, retention)
                .build();
        entities.push(Entity::new(
            key,
            DIAGNOSTIC_LOG_SETTING_ENTITY_TYPE,
            DIAGNOSTIC_LOG_SETTING_ENTITY_CLASS,
            properties,
        ));
    }

    for metric in &settings.properties.metrics {
        let retention = metric.retention_policy.as_ref();
        let key = format!(
            "{}/metrics/{}/{}/{}/{}",
            settings.id,
            key_component(metric.category.as_deref()),
            metric.enabled,
            key_component(metric.time_grain.as_deref()),
            retention_key(retention)
        );
        let properties = setting_properties(
            linker,
            settings,
            &key,
            metric.category.as_deref(),
            metric.enabled,
            retention,
        )
        .set_opt("timeGrain", metric.time_grain.as_deref())
        .build();
        entities.push(Entity::new(
            key,
            DIAGNOSTIC_METRIC_SETTING_ENTITY_TYPE,
            DIAGNOSTIC_METRIC_SETTING_ENTITY_CLASS,
            properties,
        ));
    }

    entities
}

/// Monitored resource HAS setting, and setting USES its storage account when one is configured.
pub fn create_diagnostic_setting_relationships(
    state: &dyn JobState,
    resource_key: &str,
    setting: &Entity,
) -> Vec<Relationship> {
    let mut relationships = vec![Relationship::direct_between(
        RelationshipClass::Has,
        (MONITORED_RESOURCE_TYPE, resource_key),
        (&setting.entity_type, &setting.key),
    )];

    if let Some(storage_account_id) = setting.str_property("storageAccountId") {
        let target = find_or_build_resource_entity(state, storage_account_id, None);
        if target.entity_type() != STORAGE_ACCOUNT_ENTITY_TYPE {
            log::debug!(
                "Diagnostic setting {} names a storage account of type {}",
                setting.key,
                target.entity_type()
            );
        }
        relationships.push(relationship_to_resolution(RelationshipClass::Uses, setting, &target));
    }

    relationships
}
