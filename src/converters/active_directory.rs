//! Directory (Microsoft Graph) converters: account, users, groups and membership.

use serde_json::Value;

use crate::azure::models::{Group, GroupMember, Organization, User};
use crate::graph::{
    directory_relationship_key, generate_entity_key, get_time, verb_relationship_key,
    DirectRelationship, Entity, MappedRelationship, Properties, PropertyBag, Relationship,
    RelationshipClass, RelationshipDirection, RelationshipMapping,
};

pub const ACCOUNT_ENTITY_TYPE: &str = "azure_account";
pub const ACCOUNT_ENTITY_CLASS: &[&str] = &["Account"];
pub const USER_ENTITY_TYPE: &str = "azure_user";
pub const USER_ENTITY_CLASS: &[&str] = &["User"];
pub const GROUP_ENTITY_TYPE: &str = "azure_user_group";
pub const GROUP_ENTITY_CLASS: &[&str] = &["UserGroup"];
pub const GROUP_MEMBER_ENTITY_TYPE: &str = "azure_group_member";
pub const GROUP_MEMBER_ENTITY_CLASS: &[&str] = &["User"];

pub const ACCOUNT_GROUP_RELATIONSHIP_TYPE: &str = "azure_account_has_group";
pub const ACCOUNT_USER_RELATIONSHIP_TYPE: &str = "azure_account_has_user";
pub const USER_GROUP_RELATIONSHIP_TYPE: &str = "azure_user_assigned_group";
pub const GROUP_MEMBER_RELATIONSHIP_TYPE: &str = "azure_group_has_member";

const ODATA_USER: &str = "#microsoft.graph.user";
const ODATA_GROUP: &str = "#microsoft.graph.group";

/// Integration instance the account entity stands for.
#[derive(Debug, Clone)]
pub struct IntegrationInstance {
    pub id: String,
    pub name: String,
}

/// What kind of directory object a group member is, from its `@odata.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    User,
    Group,
    Other,
}

impl MemberKind {
    pub fn from_odata_type(odata_type: Option<&str>) -> Self {
        match odata_type {
            Some(ODATA_USER) => MemberKind::User,
            Some(ODATA_GROUP) => MemberKind::Group,
            _ => MemberKind::Other,
        }
    }

    pub fn entity_type(self) -> &'static str {
        match self {
            MemberKind::User => USER_ENTITY_TYPE,
            MemberKind::Group => GROUP_ENTITY_TYPE,
            MemberKind::Other => GROUP_MEMBER_ENTITY_TYPE,
        }
    }

    pub fn entity_class(self) -> &'static str {
        match self {
            MemberKind::User => USER_ENTITY_CLASS[0],
            MemberKind::Group => GROUP_ENTITY_CLASS[0],
            MemberKind::Other => GROUP_MEMBER_ENTITY_CLASS[0],
        }
    }
}

pub fn create_account_entity(instance: &IntegrationInstance, organization: &Organization) -> Entity {
    let mut default_domain = None;
    let verified_domains: Vec<Value> = organization
        .verified_domains
        .iter()
        .map(|domain| {
            if domain.is_default == Some(true) {
                default_domain = domain.name.clone();
            }
            domain.name.clone().map(Value::from).unwrap_or(Value::Null)
        })
        .collect();

    let properties = PropertyBag::new()
        .set("id", organization.id.as_str())
        .set("displayName", instance.name.as_str())
        .set_opt("name", organization.display_name.clone())
        .set_opt("organizationName", organization.display_name.clone())
        .set_opt("defaultDomain", default_domain)
        .set("verifiedDomains", verified_domains)
        .build();

    Entity::new(
        generate_entity_key(ACCOUNT_ENTITY_TYPE, &instance.id),
        ACCOUNT_ENTITY_TYPE,
        ACCOUNT_ENTITY_CLASS,
        properties,
    )
}

pub fn create_user_entity(user: &User) -> Entity {
    let properties = PropertyBag::new()
        .set("id", user.id.as_str())
        .set_opt("displayName", user.display_name.clone())
        .set_opt("givenName", user.given_name.clone())
        .set_opt("jobTitle", user.job_title.clone())
        .set_opt("mail", user.mail.clone())
        .set_opt("mobilePhone", user.mobile_phone.clone())
        .set_opt("officeLocation", user.office_location.clone())
        .set_opt("preferredLanguage", user.preferred_language.clone())
        .set_opt("surname", user.surname.clone())
        .set_opt("userPrincipalName", user.user_principal_name.clone())
        .build();

    Entity::new(
        generate_entity_key(USER_ENTITY_TYPE, &user.id),
        USER_ENTITY_TYPE,
        USER_ENTITY_CLASS,
        properties,
    )
}

pub fn create_group_entity(group: &Group) -> Entity {
    let properties = PropertyBag::new()
        .set("id", group.id.as_str())
        .set_opt("displayName", group.display_name.clone())
        .set_opt("deletedOn", get_time(group.deleted_date_time.as_deref()))
        .set_opt("classification", group.classification.clone())
        .set_opt("createdOn", get_time(group.created_date_time.as_deref()))
        .set_opt("description", group.description.clone())
        .set_opt("mail", group.mail.clone())
        .set_opt("mailEnabled", group.mail_enabled)
        .set_opt("mailNickname", group.mail_nickname.clone())
        .set_opt("renewedOn", get_time(group.renewed_date_time.as_deref()))
        .set_opt("securityEnabled", group.security_enabled)
        .build();

    Entity::new(
        generate_entity_key(GROUP_ENTITY_TYPE, &group.id),
        GROUP_ENTITY_TYPE,
        GROUP_ENTITY_CLASS,
        properties,
    )
}

fn directory_relationship(
    key: String,
    relationship_type: &str,
    class: RelationshipClass,
    from_key: &str,
    to_key: &str,
) -> Relationship {
    Relationship::Direct(DirectRelationship {
        key,
        relationship_type: relationship_type.to_string(),
        class,
        from_key: from_key.to_string(),
        to_key: to_key.to_string(),
        properties: Properties::new(),
    })
}

pub fn create_account_group_relationship(account: &Entity, group: &Group) -> Relationship {
    let group_key = generate_entity_key(GROUP_ENTITY_TYPE, &group.id);
    directory_relationship(
        directory_relationship_key(&account.key, &group_key),
        ACCOUNT_GROUP_RELATIONSHIP_TYPE,
        RelationshipClass::Has,
        &account.key,
        &group_key,
    )
}

pub fn create_account_user_relationship(account: &Entity, user: &User) -> Relationship {
    let user_key = generate_entity_key(USER_ENTITY_TYPE, &user.id);
    directory_relationship(
        directory_relationship_key(&account.key, &user_key),
        ACCOUNT_USER_RELATIONSHIP_TYPE,
        RelationshipClass::Has,
        &account.key,
        &user_key,
    )
}

/// Group HAS member, resolved by the backend on `_type` + `_key`.
pub fn create_group_member_relationship(group: &Group, member: &GroupMember) -> Relationship {
    let kind = MemberKind::from_odata_type(member.odata_type.as_deref());
    let group_key = generate_entity_key(GROUP_ENTITY_TYPE, &group.id);
    let member_key = generate_entity_key(kind.entity_type(), &member.id);

    let target = PropertyBag::new()
        .set("_key", member_key.as_str())
        .set("_type", kind.entity_type())
        .set("_class", kind.entity_class())
        .set_opt("displayName", member.display_name.clone())
        .set_raw("jobTitle", member.extra.get("jobTitle"))
        .set_raw("email", member.extra.get("mail"));

    let properties = PropertyBag::new()
        .set("groupId", group.id.as_str())
        .set("memberId", member.id.as_str())
        .set_opt("memberType", member.odata_type.clone())
        .build();

    Relationship::Mapped(MappedRelationship {
        key: directory_relationship_key(&group_key, &member_key),
        relationship_type: GROUP_MEMBER_RELATIONSHIP_TYPE.to_string(),
        class: RelationshipClass::Has,
        mapping: RelationshipMapping {
            relationship_direction: RelationshipDirection::Forward,
            source_entity_key: group_key,
            target_entity: target.build(),
            target_filter_keys: vec![vec!["_type".into(), "_key".into()]],
            skip_target_creation: None,
        },
        properties,
    })
}

/// Group ASSIGNED user, for each member that is a user.
pub fn create_user_group_relationships(group: &Group, members: &[GroupMember]) -> Vec<Relationship> {
    let group_key = generate_entity_key(GROUP_ENTITY_TYPE, &group.id);
    members
        .iter()
        .filter(|m| MemberKind::from_odata_type(m.odata_type.as_deref()) == MemberKind::User)
        .map(|member| {
            let user_key = generate_entity_key(USER_ENTITY_TYPE, &member.id);
            directory_relationship(
                verb_relationship_key(&group_key, "assigned", &user_key),
                USER_GROUP_RELATIONSHIP_TYPE,
                RelationshipClass::Assigned,
                &group_key,
                &user_key,
            )
        })
        .collect()
}
