use rusqlite::{params, Connection};
use std::fs;
use std::path::Path;
use crate::error::{ConnectorError, Result};

/// Schema shipped with the crate, applied when no migrations directory exists on disk.
const EMBEDDED: &[(&str, &str)] = &[(
    "001_job_state",
    include_str!("../../migrations/001_job_state.sql"),
)];

struct Migration {
    version: u32,
    name: String,
    sql: String,
}

fn ensure_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Names of migrations already applied, in version order
pub fn get_applied_migrations(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM schema_migrations ORDER BY version")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    Ok(names)
}

fn parse_version(name: &str) -> Result<u32> {
    // "001_job_state" -> 1
    let version_str = name
        .split('_')
        .next()
        .ok_or_else(|| ConnectorError::Config(format!("Invalid migration filename: {}", name)))?;
    version_str
        .parse()
        .map_err(|_| ConnectorError::Config(format!("Invalid migration version: {}", version_str)))
}

fn load_migrations(migrations_dir: &Path) -> Result<Vec<Migration>> {
    let mut files: Vec<_> = fs::read_dir(migrations_dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("sql"))
        .collect();
    files.sort_by_key(|e| e.file_name());

    let mut migrations = Vec::with_capacity(files.len());
    for entry in files {
        let path = entry.path();
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ConnectorError::Config("Invalid migration filename".to_string()))?;
        let name = filename.trim_end_matches(".sql").to_string();
        migrations.push(Migration {
            version: parse_version(&name)?,
            sql: fs::read_to_string(&path)?,
            name,
        });
    }

    migrations.sort_by_key(|m| m.version);
    Ok(migrations)
}

fn embedded_migrations() -> Result<Vec<Migration>> {
    EMBEDDED
        .iter()
        .map(|(name, sql)| {
            Ok(Migration {
                version: parse_version(name)?,
                name: name.to_string(),
                sql: sql.to_string(),
            })
        })
        .collect()
}

/// Run all pending migrations from `migrations_dir`, or the embedded set if it is absent
pub fn run_migrations(conn: &mut Connection, migrations_dir: &Path) -> Result<()> {
    ensure_migrations_table(conn)?;

    let applied = get_applied_migrations(conn)?;
    let migrations = if migrations_dir.is_dir() {
        load_migrations(migrations_dir)?
    } else {
        log::debug!(
            "Migrations directory {} not found, using embedded schema",
            migrations_dir.display()
        );
        embedded_migrations()?
    };

    for migration in migrations {
        if applied.contains(&migration.name) {
            log::debug!("Migration {} already applied, skipping", migration.name);
            continue;
        }

        log::info!("Applying migration: {} (version {})", migration.name, migration.version);

        let tx = conn.transaction()?;
        tx.execute_batch(&migration.sql).map_err(|e| {
            ConnectorError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("Failed to execute migration {}: {}", migration.name, e)),
            ))
        })?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            params![migration.version, migration.name],
        )?;
        tx.commit()?;
    }

    Ok(())
}
