//! Resource-identity resolution.
//!
//! Given an ARM resource id (and optionally an Azure type name), find the
//! entity already ingested under that key, or describe it well enough for
//! the ingestion backend to resolve later. The three outcomes are kept
//! distinct so callers can tell a known-but-not-yet-ingested resource from an
//! id nothing in [`matchers::RESOURCE_ID_TYPES_MAP`] recognizes.

pub mod matchers;

pub use matchers::{
    get_type_for_azure_type, get_type_for_resource_id, resource_id_matcher_depends_on,
    resource_id_matcher_entity_types, ResourceIdMap, DEFAULT_RESOURCE_TYPE, RESOURCE_ID_TYPES_MAP,
};

use serde_json::Value;

use crate::graph::{
    generate_relationship_key, generate_relationship_type, Entity, MappedRelationship,
    PlaceholderEntity, Properties, Relationship, RelationshipClass, RelationshipDirection,
    RelationshipMapping,
};
use crate::jobstate::JobState;

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The entity is in job state.
    Resolved(Entity),
    /// Recognized type, not (yet) ingested.
    Placeholder(PlaceholderEntity),
    /// Neither the type hint nor any resource id pattern matched.
    Unrecognized { resource_id: String },
}

impl Resolution {
    pub fn key(&self) -> &str {
        match self {
            Resolution::Resolved(entity) => &entity.key,
            Resolution::Placeholder(placeholder) => &placeholder.key,
            Resolution::Unrecognized { resource_id } => resource_id,
        }
    }

    pub fn entity_type(&self) -> &str {
        match self {
            Resolution::Resolved(entity) => &entity.entity_type,
            Resolution::Placeholder(placeholder) => &placeholder.entity_type,
            Resolution::Unrecognized { .. } => DEFAULT_RESOURCE_TYPE,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }

    /// `{_type, _key}` reference; unrecognized ids fall back to [`DEFAULT_RESOURCE_TYPE`].
    pub fn to_placeholder(&self) -> PlaceholderEntity {
        PlaceholderEntity {
            entity_type: self.entity_type().to_string(),
            key: self.key().to_string(),
        }
    }
}

/// Resolve with the default table.
pub fn find_or_build_resource_entity(
    state: &dyn JobState,
    resource_id: &str,
    type_hint: Option<&str>,
) -> Resolution {
    find_or_build_resource_entity_with_map(state, resource_id, type_hint, &RESOURCE_ID_TYPES_MAP)
}

pub fn find_or_build_resource_entity_with_map(
    state: &dyn JobState,
    resource_id: &str,
    type_hint: Option<&str>,
    map: &[ResourceIdMap],
) -> Resolution {
    if let Some(entity) = state.find_entity(resource_id) {
        return Resolution::Resolved(entity.clone());
    }

    let entity_type = type_hint
        .and_then(|hint| get_type_for_azure_type(hint, map))
        .or_else(|| get_type_for_resource_id(resource_id, map));

    match entity_type {
        Some(entity_type) => Resolution::Placeholder(PlaceholderEntity {
            entity_type: entity_type.to_string(),
            key: resource_id.to_string(),
        }),
        None => {
            log::debug!("Unrecognized resource id: {}", resource_id);
            Resolution::Unrecognized {
                resource_id: resource_id.to_string(),
            }
        }
    }
}

/// Edge from `from` to a resolved target. Ingested targets get a direct
/// relationship; anything else a mapped one the backend resolves by `_type` + `_key`.
pub fn relationship_to_resolution(
    class: RelationshipClass,
    from: &Entity,
    target: &Resolution,
) -> Relationship {
    if let Resolution::Resolved(entity) = target {
        return Relationship::direct(class, from, entity);
    }

    let placeholder = target.to_placeholder();
    let mut properties = Properties::new();
    properties.insert("displayName".into(), Value::from(class.as_str()));

    Relationship::Mapped(MappedRelationship {
        key: generate_relationship_key(class, &from.key, &placeholder.key),
        relationship_type: generate_relationship_type(class, &from.entity_type, &placeholder.entity_type),
        class,
        mapping: RelationshipMapping::to_placeholder(RelationshipDirection::Forward, &from.key, &placeholder),
        properties,
    })
}
