//! Resource groups and the `resource group HAS resource` edges every ARM step emits.

use crate::azure::models::{ArmResource, ResourceGroupProperties};
use crate::azure::resource_id::resource_group_id;
use crate::azure::AzureWebLinker;
use crate::graph::{
    generate_relationship_key, generate_relationship_type, Entity, MappedRelationship,
    PlaceholderEntity, Properties, Relationship, RelationshipClass, RelationshipDirection,
    RelationshipMapping,
};
use crate::jobstate::JobState;

use super::resource_properties;

pub const RESOURCE_GROUP_ENTITY_TYPE: &str = "azure_resource_group";
pub const RESOURCE_GROUP_ENTITY_CLASS: &[&str] = &["Group"];

pub fn create_resource_group_entity(
    linker: &AzureWebLinker,
    group: &ArmResource<ResourceGroupProperties>,
) -> Entity {
    let properties = resource_properties(linker, group)
        .set_opt("provisioningState", group.properties.provisioning_state.as_deref())
        .build();

    Entity::new(
        group.id.as_str(),
        RESOURCE_GROUP_ENTITY_TYPE,
        RESOURCE_GROUP_ENTITY_CLASS,
        properties,
    )
}

/// ARM ids are not consistently cased, so the group is matched ignoring case.
fn find_resource_group<'a>(state: &'a dyn JobState, group_id: &str) -> Option<&'a Entity> {
    state
        .entities_of_type(RESOURCE_GROUP_ENTITY_TYPE)
        .into_iter()
        .find(|e| e.key.eq_ignore_ascii_case(group_id))
}

/// `resource group HAS entity`. Direct when the group was ingested, otherwise mapped
/// from the entity back to a `{_type, _key}` group reference. `None` for ids outside
/// any resource group.
pub fn create_resource_group_relationship(state: &dyn JobState, entity: &Entity) -> Option<Relationship> {
    let group_id = resource_group_id(&entity.key)?;

    if let Some(group) = find_resource_group(state, &group_id) {
        return Some(Relationship::direct(RelationshipClass::Has, group, entity));
    }

    log::debug!("Resource group {} not ingested; mapping {}", group_id, entity.key);
    let placeholder = PlaceholderEntity {
        entity_type: RESOURCE_GROUP_ENTITY_TYPE.to_string(),
        key: group_id,
    };
    let mut properties = Properties::new();
    properties.insert("displayName".into(), RelationshipClass::Has.as_str().into());

    Some(Relationship::Mapped(MappedRelationship {
        key: generate_relationship_key(RelationshipClass::Has, &placeholder.key, &entity.key),
        relationship_type: generate_relationship_type(
            RelationshipClass::Has,
            RESOURCE_GROUP_ENTITY_TYPE,
            &entity.entity_type,
        ),
        class: RelationshipClass::Has,
        mapping: RelationshipMapping::to_placeholder(RelationshipDirection::Reverse, &entity.key, &placeholder),
        properties,
    }))
}
