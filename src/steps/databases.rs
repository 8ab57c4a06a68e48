use crate::azure::models::{ArmResource, PostgreSqlDatabaseProperties, PostgreSqlServerProperties};
use crate::azure::{AzureWebLinker, IterationStats};
use crate::converters::databases::{
    create_postgresql_database_entity, create_postgresql_server_database_relationship,
    create_postgresql_server_entity,
};
use crate::error::Result;
use crate::jobstate::JobState;

use super::{publish_resource_entity, StepContext};

const POSTGRESQL_API_VERSION: &str = "2017-12-01";

pub(super) async fn fetch_postgresql_databases(ctx: &StepContext, state: &mut dyn JobState) -> Result<()> {
    let linker = AzureWebLinker::from_job_state(&*state);
    let (servers, stats) = ctx
        .client
        .list_management::<ArmResource<PostgreSqlServerProperties>>(
            &ctx.subscription_path("/providers/Microsoft.DBforPostgreSQL/servers"),
            POSTGRESQL_API_VERSION,
        )
        .await?;

    let mut database_stats = IterationStats::default();
    for server in &servers {
        let server_entity = create_postgresql_server_entity(&linker, server);
        publish_resource_entity(state, server_entity.clone())?;

        let (databases, page_stats) = ctx
            .client
            .list_management::<ArmResource<PostgreSqlDatabaseProperties>>(
                &format!("{}/databases", server.id),
                POSTGRESQL_API_VERSION,
            )
            .await?;
        for database in &databases {
            let entity = create_postgresql_database_entity(&linker, server, database);
            let has = create_postgresql_server_database_relationship(&server_entity, &entity);
            state.add_entity(entity)?;
            state.add_relationship(has)?;
        }
        database_stats.absorb(page_stats);
    }
    log::info!(
        "PostgreSQL: {} servers ({} skipped), {} databases ({} skipped)",
        servers.len(),
        stats.skipped,
        database_stats.records,
        database_stats.skipped
    );
    Ok(())
}
