//! SQLite snapshot of a finished collection run.

use rusqlite::{params, OptionalExtension};
use std::path::PathBuf;

use super::MemoryJobState;
use crate::db::{migrate, Db};
use crate::error::Result;
use crate::steps::StepResult;

/// Run-level metadata stored alongside the collected graph.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub run_id: String,
    pub instance_id: String,
    /// Epoch milliseconds
    pub started_at: i64,
    pub finished_at: i64,
    pub step_results: Vec<StepResult>,
}

/// Per-type counts of the most recent run, as reported by the `stats` binary.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: String,
    pub instance_id: String,
    pub finished_at: i64,
    pub step_results: Vec<StepResult>,
    pub entity_counts: Vec<(String, i64)>,
    pub relationship_counts: Vec<(String, i64)>,
    pub mapped_relationships: i64,
}

struct EntityRow {
    key: String,
    entity_type: String,
    body: String,
}

struct RelationshipRow {
    key: String,
    relationship_type: String,
    from_key: Option<String>,
    to_key: Option<String>,
    mapped: bool,
    body: String,
}

/// Apply pending migrations, then write the run and everything in `state` in one transaction.
pub async fn persist_run(
    db: &Db,
    migrations_dir: impl Into<PathBuf>,
    run: RunRecord,
    state: &MemoryJobState,
) -> Result<()> {
    let migrations_dir = migrations_dir.into();

    let entities = state
        .entities()
        .iter()
        .map(|e| -> Result<EntityRow> {
            Ok(EntityRow {
                key: e.key.clone(),
                entity_type: e.entity_type.clone(),
                body: serde_json::to_string(e)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let relationships = state
        .relationships()
        .iter()
        .map(|r| -> Result<RelationshipRow> {
            let (from_key, to_key) = match r.endpoints() {
                Some((from, to)) => (Some(from.to_string()), Some(to.to_string())),
                None => (None, None),
            };
            Ok(RelationshipRow {
                key: r.key().to_string(),
                relationship_type: r.relationship_type().to_string(),
                from_key,
                to_key,
                mapped: r.is_mapped(),
                body: serde_json::to_string(r)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let step_results = serde_json::to_string(&run.step_results)?;

    db.with_connection(move |conn| {
        migrate::run_migrations(conn, &migrations_dir)?;

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO ingestion_runs (id, instance_id, started_at, finished_at, step_results)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![run.run_id, run.instance_id, run.started_at, run.finished_at, step_results],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO entities (run_id, entity_key, entity_type, body) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for row in &entities {
                stmt.execute(params![run.run_id, row.key, row.entity_type, row.body])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO relationships
                 (run_id, relationship_key, relationship_type, from_key, to_key, mapped, body)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for row in &relationships {
                stmt.execute(params![
                    run.run_id,
                    row.key,
                    row.relationship_type,
                    row.from_key,
                    row.to_key,
                    row.mapped,
                    row.body
                ])?;
            }
        }

        tx.commit()?;
        log::info!(
            "Snapshot {} written: {} entities, {} relationships",
            run.run_id,
            entities.len(),
            relationships.len()
        );
        Ok(())
    })
    .await
}

/// Summary of the most recently finished run, if any run was recorded.
pub async fn latest_run_summary(db: &Db) -> Result<Option<RunSummary>> {
    db.with_connection(|conn| {
        let run = conn
            .query_row(
                "SELECT id, instance_id, finished_at, step_results
                 FROM ingestion_runs ORDER BY finished_at DESC LIMIT 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((run_id, instance_id, finished_at, step_results)) = run else {
            return Ok(None);
        };

        let count_by_type = |sql: &str| -> Result<Vec<(String, i64)>> {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt
                .query_map(params![run_id], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
            Ok(rows)
        };

        let entity_counts = count_by_type(
            "SELECT entity_type, COUNT(*) FROM entities WHERE run_id = ?1
             GROUP BY entity_type ORDER BY entity_type",
        )?;
        let relationship_counts = count_by_type(
            "SELECT relationship_type, COUNT(*) FROM relationships WHERE run_id = ?1
             GROUP BY relationship_type ORDER BY relationship_type",
        )?;
        let mapped_relationships: i64 = conn.query_row(
            "SELECT COUNT(*) FROM relationships WHERE run_id = ?1 AND mapped = 1",
            params![run_id],
            |row| row.get(0),
        )?;

        Ok(Some(RunSummary {
            step_results: serde_json::from_str(&step_results)?,
            run_id,
            instance_id,
            finished_at,
            entity_counts,
            relationship_counts,
            mapped_relationships,
        }))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Entity, Properties, Relationship, RelationshipClass};
    use crate::jobstate::JobState;
    use crate::steps::StepStatus;
    use tempfile::TempDir;

    fn populated_state() -> MemoryJobState {
        let mut state = MemoryJobState::new();
        let vnet = Entity::new("/vnets/a", "azure_vnet", &["Network"], Properties::new());
        let subnet = Entity::new("/vnets/a/subnets/b", "azure_subnet", &["Network"], Properties::new());
        let rel = Relationship::direct(RelationshipClass::Contains, &vnet, &subnet);
        state.add_entity(vnet).unwrap();
        state.add_entity(subnet).unwrap();
        state.add_relationship(rel).unwrap();
        state
    }

    fn run(id: &str, finished_at: i64) -> RunRecord {
        RunRecord {
            run_id: id.to_string(),
            instance_id: "local-integration-instance".to_string(),
            started_at: finished_at - 1000,
            finished_at,
            step_results: vec![StepResult {
                id: "rm-network-virtual-networks".to_string(),
                status: StepStatus::Success,
            }],
        }
    }

    #[tokio::test]
    async fn test_empty_database_has_no_summary() {
        let temp_dir = TempDir::new().unwrap();
        let db = Db::new(temp_dir.path().join("snapshot.db"));
        db.with_connection(|conn| migrate::run_migrations(conn, std::path::Path::new("no-such-dir")))
            .await
            .unwrap();

        assert!(latest_run_summary(&db).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_persist_and_summarize_latest_run() {
        let temp_dir = TempDir::new().unwrap();
        let db = Db::new(temp_dir.path().join("snapshot.db"));
        let migrations = temp_dir.path().join("no-such-dir");
        let state = populated_state();

        persist_run(&db, &migrations, run("run-1", 1_000), &state).await.unwrap();
        persist_run(&db, &migrations, run("run-2", 2_000), &state).await.unwrap();

        let summary = latest_run_summary(&db).await.unwrap().unwrap();
        assert_eq!(summary.run_id, "run-2");
        assert_eq!(
            summary.entity_counts,
            vec![("azure_subnet".to_string(), 1), ("azure_vnet".to_string(), 1)]
        );
        assert_eq!(
            summary.relationship_counts,
            vec![("azure_vnet_contains_subnet".to_string(), 1)]
        );
        assert_eq!(summary.mapped_relationships, 0);
        assert_eq!(summary.step_results[0].status, StepStatus::Success);
    }
}
