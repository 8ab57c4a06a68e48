//! Security Center assessments.

use serde_json::{Map, Value};

use crate::azure::models::{ArmResource, SecurityAssessmentProperties};
use crate::azure::AzureWebLinker;
use crate::graph::{Entity, PropertyBag, Relationship, RelationshipClass};
use crate::jobstate::JobState;
use crate::resolver::{find_or_build_resource_entity, relationship_to_resolution};

pub const ASSESSMENT_ENTITY_TYPE: &str = "azure_security_assessment";
pub const ASSESSMENT_ENTITY_CLASS: &[&str] = &["Assessment"];

const DEFAULT_ASSESSMENT_CATEGORY: &str = "Security Assessment";

/// ARM list path of the assessments of one subscription.
pub fn assessments_path(subscription_id: &str) -> String {
    format!("/subscriptions/{}/providers/Microsoft.Security/assessments", subscription_id)
}

fn field<'a>(object: &'a Map<String, Value>, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .find_map(|name| object.get(*name).and_then(Value::as_str))
}

/// Id of the Azure resource an assessment scanned. The API has been seen to
/// return both `source`/`id` and `Source`/`Id`.
pub fn scanned_resource_id(resource_details: Option<&Map<String, Value>>) -> Option<&str> {
    let details = resource_details?;
    match field(details, &["source", "Source"]) {
        Some("Azure") => field(details, &["id", "Id"]),
        _ => None,
    }
}

fn assessment_category(metadata: Option<&Map<String, Value>>) -> String {
    metadata
        .and_then(|m| m.get("category"))
        .filter(|c| !c.is_null())
        .and_then(|c| serde_json::to_string(c).ok())
        .unwrap_or_else(|| DEFAULT_ASSESSMENT_CATEGORY.to_string())
}

pub fn create_assessment_entity(
    linker: &AzureWebLinker,
    assessment: &ArmResource<SecurityAssessmentProperties>,
) -> Entity {
    let props = &assessment.properties;
    let status = props.status.as_ref();

    let properties = PropertyBag::new()
        .prefixed("metadata", props.metadata.as_ref())
        .prefixed("resourceDetails", props.resource_details.as_ref())
        .set("id", assessment.id.as_str())
        .set_opt("name", assessment.name.as_deref())
        .set_opt("displayName", props.display_name.as_deref())
        .set("category", assessment_category(props.metadata.as_ref()))
        .set_opt("summary", props.display_name.as_deref())
        .set("internal", true)
        .set_opt("type", assessment.resource_type.as_deref())
        .set_opt("statusCode", status.and_then(|s| s.code.as_deref()))
        .set_opt("statusCause", status.and_then(|s| s.cause.as_deref()))
        .set_opt("statusDescription", status.and_then(|s| s.description.as_deref()))
        .set_opt(
            "scannedResourceId",
            scanned_resource_id(props.resource_details.as_ref()),
        )
        .set_opt("webLink", linker.portal_resource_url(&assessment.id))
        .build();

    Entity::new(
        assessment.id.as_str(),
        ASSESSMENT_ENTITY_TYPE,
        ASSESSMENT_ENTITY_CLASS,
        properties,
    )
}

/// Assessment ASSESSED the resource it scanned; `None` when nothing Azure-hosted was scanned.
pub fn create_assessment_scanned_resource_relationship(
    state: &dyn JobState,
    assessment: &Entity,
) -> Option<Relationship> {
    let resource_id = assessment.str_property("scannedResourceId")?;
    let target = find_or_build_resource_entity(state, resource_id, None);
    Some(relationship_to_resolution(
        RelationshipClass::Assessed,
        assessment,
        &target,
    ))
}
