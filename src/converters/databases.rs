use crate::azure::models::{ArmResource, PostgreSqlDatabaseProperties, PostgreSqlServerProperties};
use crate::azure::AzureWebLinker;
use crate::graph::{Entity, Relationship, RelationshipClass};

use super::resource_properties;

pub const POSTGRESQL_SERVER_ENTITY_TYPE: &str = "azure_postgresql_server";
pub const POSTGRESQL_SERVER_ENTITY_CLASS: &[&str] = &["Database", "DataStore", "Host"];
pub const POSTGRESQL_DATABASE_ENTITY_TYPE: &str = "azure_postgresql_database";
pub const POSTGRESQL_DATABASE_ENTITY_CLASS: &[&str] = &["Database"];

pub fn create_postgresql_server_entity(
    linker: &AzureWebLinker,
    server: &ArmResource<PostgreSqlServerProperties>,
) -> Entity {
    let props = &server.properties;
    let properties = resource_properties(linker, server)
        .set_opt("hostname", props.fully_qualified_domain_name.as_deref())
        .set_opt("fqdn", props.fully_qualified_domain_name.as_deref())
        .set_opt("databaseVersion", props.version.as_deref())
        .set_opt("state", props.user_visible_state.as_deref())
        .set_opt(
            "encrypted",
            props.ssl_enforcement.as_deref().map(|s| s == "Enabled"),
        )
        .set_opt("adminUser", props.administrator_login.as_deref())
        .set_opt("sku", server.sku.as_ref().and_then(|s| s.name.as_deref()))
        .build();

    Entity::new(
        server.id.as_str(),
        POSTGRESQL_SERVER_ENTITY_TYPE,
        POSTGRESQL_SERVER_ENTITY_CLASS,
        properties,
    )
}

/// Databases carry no location of their own; region and environment come from the server.
pub fn create_postgresql_database_entity(
    linker: &AzureWebLinker,
    server: &ArmResource<PostgreSqlServerProperties>,
    database: &ArmResource<PostgreSqlDatabaseProperties>,
) -> Entity {
    let properties = resource_properties(linker, database)
        .set_opt("region", server.location.as_deref())
        .set_opt("environment", server.tag("environment"))
        .set_opt("charset", database.properties.charset.as_deref())
        .set_opt("collation", database.properties.collation.as_deref())
        .build();

    Entity::new(
        database.id.as_str(),
        POSTGRESQL_DATABASE_ENTITY_TYPE,
        POSTGRESQL_DATABASE_ENTITY_CLASS,
        properties,
    )
}

pub fn create_postgresql_server_database_relationship(server: &Entity, database: &Entity) -> Relationship {
    Relationship::direct(RelationshipClass::Has, server, database)
}
