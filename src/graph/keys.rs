//! Deterministic key and relationship-type generation.

use std::fmt::Display;

use super::RelationshipClass;

/// Rendering of an absent key component. Previously ingested graphs carry this
/// literal, so it must stay stable.
const ABSENT_COMPONENT: &str = "undefined";

/// `{type}_{id}`
pub fn generate_entity_key(entity_type: &str, natural_id: impl Display) -> String {
    format!("{}_{}", entity_type, natural_id)
}

/// Render an optional key component, substituting `undefined` when absent.
pub fn key_component<T: Display>(value: Option<T>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => ABSENT_COMPONENT.to_string(),
    }
}

/// Resource-manager style relationship key: `{from}|{class}|{to}`.
pub fn generate_relationship_key(class: RelationshipClass, from_key: &str, to_key: &str) -> String {
    format!("{}|{}|{}", from_key, class.as_str().to_lowercase(), to_key)
}

/// Directory style relationship key: `{from}_{to}`.
pub fn directory_relationship_key(from_key: &str, to_key: &str) -> String {
    format!("{}_{}", from_key, to_key)
}

/// Directory style relationship key with a verb: `{from}_{verb}_{to}`.
pub fn verb_relationship_key(from_key: &str, verb: &str, to_key: &str) -> String {
    format!("{}_{}_{}", from_key, verb, to_key)
}

/// `azure_security_group_rule:{ruleId}:{portRange}:{target}`
///
/// `target` is the subnet id for subnet-scoped edges, `internet`, or
/// `Service:{_type}:{displayName}` for service tags.
pub fn security_rule_key(rule_id: &str, port_range: Option<&str>, target: &str) -> String {
    format!(
        "azure_security_group_rule:{}:{}:{}",
        rule_id,
        key_component(port_range),
        target
    )
}

/// `{fromType}_{class}_{toType}` where the leading `_`-segments `toType` shares
/// with `fromType` are dropped, e.g. `azure_vnet` + `azure_subnet` gives
/// `azure_vnet_contains_subnet`. If nothing would remain of `toType`, it is used whole.
pub fn generate_relationship_type(class: RelationshipClass, from_type: &str, to_type: &str) -> String {
    let from_parts: Vec<&str> = from_type.split('_').collect();
    let to_parts: Vec<&str> = to_type.split('_').collect();

    let shared = from_parts
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let stripped = to_parts[shared..].join("_");
    let target = if stripped.is_empty() { to_type } else { stripped.as_str() };

    format!("{}_{}_{}", from_type, class.as_str().to_lowercase(), target)
}
