//! Graph model: entities, placeholder references, direct and mapped relationships.
//!
//! Everything here serializes to the integration wire shape (`_key`, `_type`,
//! `_class`, `_fromEntityKey`, `_mapping`, ...) with resource properties
//! flattened next to the reserved fields.

mod keys;
mod properties;

pub use keys::{
    directory_relationship_key, generate_entity_key, generate_relationship_key,
    generate_relationship_type, key_component, security_rule_key, verb_relationship_key,
};
pub use properties::{capitalize_first, get_time, PropertyBag};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Resource-specific properties of an entity or relationship.
pub type Properties = Map<String, Value>;

/// A typed graph node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "_key")]
    pub key: String,
    #[serde(rename = "_type")]
    pub entity_type: String,
    #[serde(rename = "_class")]
    pub class: Vec<String>,
    #[serde(flatten)]
    pub properties: Properties,
}

impl Entity {
    pub fn new(
        key: impl Into<String>,
        entity_type: impl Into<String>,
        class: &[&str],
        properties: Properties,
    ) -> Self {
        Self {
            key: key.into(),
            entity_type: entity_type.into(),
            class: class.iter().map(|c| c.to_string()).collect(),
            properties,
        }
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn str_property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(Value::as_str)
    }
}

/// `{_type, _key}` stand-in for an entity that is referenced but not ingested in this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceholderEntity {
    #[serde(rename = "_type")]
    pub entity_type: String,
    #[serde(rename = "_key")]
    pub key: String,
}

/// True when a serialized graph object carries no `_class`, i.e. it is a placeholder.
pub fn is_placeholder_entity(object: &Properties) -> bool {
    !object.contains_key("_class")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RelationshipClass {
    Allows,
    Assessed,
    Assigned,
    Contains,
    Denies,
    Has,
    Protects,
    Uses,
}

impl RelationshipClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipClass::Allows => "ALLOWS",
            RelationshipClass::Assessed => "ASSESSED",
            RelationshipClass::Assigned => "ASSIGNED",
            RelationshipClass::Contains => "CONTAINS",
            RelationshipClass::Denies => "DENIES",
            RelationshipClass::Has => "HAS",
            RelationshipClass::Protects => "PROTECTS",
            RelationshipClass::Uses => "USES",
        }
    }
}

impl fmt::Display for RelationshipClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of a mapped relationship the known source entity sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RelationshipDirection {
    Forward,
    Reverse,
}

/// Target description resolved by the ingestion backend (find-or-create).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipMapping {
    pub relationship_direction: RelationshipDirection,
    pub source_entity_key: String,
    pub target_entity: Properties,
    pub target_filter_keys: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_target_creation: Option<bool>,
}

impl RelationshipMapping {
    /// Mapping onto a `{_type, _key}` reference, matched on both fields.
    pub fn to_placeholder(
        relationship_direction: RelationshipDirection,
        source_entity_key: &str,
        target: &PlaceholderEntity,
    ) -> Self {
        let mut target_entity = Properties::new();
        target_entity.insert("_type".into(), Value::from(target.entity_type.as_str()));
        target_entity.insert("_key".into(), Value::from(target.key.as_str()));
        Self {
            relationship_direction,
            source_entity_key: source_entity_key.to_string(),
            target_entity,
            target_filter_keys: vec![vec!["_type".into(), "_key".into()]],
            skip_target_creation: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectRelationship {
    #[serde(rename = "_key")]
    pub key: String,
    #[serde(rename = "_type")]
    pub relationship_type: String,
    #[serde(rename = "_class")]
    pub class: RelationshipClass,
    #[serde(rename = "_fromEntityKey")]
    pub from_key: String,
    #[serde(rename = "_toEntityKey")]
    pub to_key: String,
    #[serde(flatten)]
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedRelationship {
    #[serde(rename = "_key")]
    pub key: String,
    #[serde(rename = "_type")]
    pub relationship_type: String,
    #[serde(rename = "_class")]
    pub class: RelationshipClass,
    #[serde(rename = "_mapping")]
    pub mapping: RelationshipMapping,
    #[serde(flatten)]
    pub properties: Properties,
}

/// A typed graph edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Relationship {
    Direct(DirectRelationship),
    Mapped(MappedRelationship),
}

impl Relationship {
    /// Resource-manager style direct edge: `{from}|{class}|{to}` keyed, type generated
    /// from the endpoint types, `displayName` set to the class.
    pub fn direct(class: RelationshipClass, from: &Entity, to: &Entity) -> Self {
        Self::direct_between(
            class,
            (&from.entity_type, &from.key),
            (&to.entity_type, &to.key),
        )
    }

    /// Same as [`Relationship::direct`] for endpoints known only by `(type, key)`.
    pub fn direct_between(
        class: RelationshipClass,
        from: (&str, &str),
        to: (&str, &str),
    ) -> Self {
        let mut properties = Properties::new();
        properties.insert("displayName".into(), Value::from(class.as_str()));
        Relationship::Direct(DirectRelationship {
            key: generate_relationship_key(class, from.1, to.1),
            relationship_type: generate_relationship_type(class, from.0, to.0),
            class,
            from_key: from.1.to_string(),
            to_key: to.1.to_string(),
            properties,
        })
    }

    pub fn key(&self) -> &str {
        match self {
            Relationship::Direct(r) => &r.key,
            Relationship::Mapped(r) => &r.key,
        }
    }

    pub fn relationship_type(&self) -> &str {
        match self {
            Relationship::Direct(r) => &r.relationship_type,
            Relationship::Mapped(r) => &r.relationship_type,
        }
    }

    pub fn class(&self) -> RelationshipClass {
        match self {
            Relationship::Direct(r) => r.class,
            Relationship::Mapped(r) => r.class,
        }
    }

    pub fn properties(&self) -> &Properties {
        match self {
            Relationship::Direct(r) => &r.properties,
            Relationship::Mapped(r) => &r.properties,
        }
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self, Relationship::Mapped(_))
    }

    /// Endpoint keys of a direct relationship; `None` for mapped ones.
    pub fn endpoints(&self) -> Option<(&str, &str)> {
        match self {
            Relationship::Direct(r) => Some((&r.from_key, &r.to_key)),
            Relationship::Mapped(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vnet() -> Entity {
        Entity::new("/vnets/a", "azure_vnet", &["Network"], Properties::new())
    }

    fn subnet() -> Entity {
        Entity::new("/vnets/a/subnets/b", "azure_subnet", &["Network"], Properties::new())
    }

    #[test]
    fn test_entity_serializes_flat() {
        let mut props = Properties::new();
        props.insert("displayName".into(), json!("a"));
        let entity = Entity::new("k", "azure_vnet", &["Network"], props);

        let value = serde_json::to_value(&entity).unwrap();
        assert_eq!(
            value,
            json!({"_key": "k", "_type": "azure_vnet", "_class": ["Network"], "displayName": "a"})
        );
    }

    #[test]
    fn test_direct_relationship_shape() {
        let rel = Relationship::direct(RelationshipClass::Contains, &vnet(), &subnet());
        let value = serde_json::to_value(&rel).unwrap();
        assert_eq!(
            value,
            json!({
                "_key": "/vnets/a|contains|/vnets/a/subnets/b",
                "_type": "azure_vnet_contains_subnet",
                "_class": "CONTAINS",
                "_fromEntityKey": "/vnets/a",
                "_toEntityKey": "/vnets/a/subnets/b",
                "displayName": "CONTAINS"
            })
        );
        assert_eq!(rel.endpoints(), Some(("/vnets/a", "/vnets/a/subnets/b")));
    }

    #[test]
    fn test_mapped_relationship_round_trips_as_mapped() {
        let mut target = Properties::new();
        target.insert("_key".into(), json!("global:internet"));
        let rel = Relationship::Mapped(MappedRelationship {
            key: "rule".into(),
            relationship_type: "azure_security_group_rule".into(),
            class: RelationshipClass::Denies,
            mapping: RelationshipMapping {
                relationship_direction: RelationshipDirection::Reverse,
                source_entity_key: "/nsg".into(),
                target_entity: target,
                target_filter_keys: vec![vec!["_key".into()]],
                skip_target_creation: Some(false),
            },
            properties: Properties::new(),
        });

        let value = serde_json::to_value(&rel).unwrap();
        assert_eq!(value["_mapping"]["relationshipDirection"], json!("REVERSE"));
        assert_eq!(value["_mapping"]["skipTargetCreation"], json!(false));

        let back: Relationship = serde_json::from_value(value).unwrap();
        assert!(back.is_mapped());
        assert_eq!(back, rel);
    }

    #[test]
    fn test_placeholder_detection() {
        let placeholder = serde_json::to_value(PlaceholderEntity {
            entity_type: "azure_nic".into(),
            key: "/nic".into(),
        })
        .unwrap();
        let entity = serde_json::to_value(vnet()).unwrap();

        assert!(is_placeholder_entity(placeholder.as_object().unwrap()));
        assert!(!is_placeholder_entity(entity.as_object().unwrap()));
    }
}
