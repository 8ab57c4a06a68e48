use anyhow::{Context, Result};
use azgraph::db::Db;
use azgraph::jobstate::snapshot::{persist_run, RunRecord};
use azgraph::steps::{execution_order, run_steps, step_definitions, StepContext, StepStatus};
use azgraph::{Config, MemoryJobState};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "azgraph")]
#[command(about = "Collect Azure resources and directory objects into an entity graph")]
struct Args {
    /// Write the collected entities and relationships to this JSON file
    #[arg(long)]
    output: Option<PathBuf>,

    /// Do not write the run to the SQLite snapshot database
    #[arg(long, default_value_t = false)]
    skip_persist: bool,

    /// Print the step execution order and exit
    #[arg(long, default_value_t = false)]
    list_steps: bool,
}

fn init_logging(default_level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", default_level))
        .init();
}

fn print_steps() -> Result<()> {
    let definitions = step_definitions();
    for (i, step) in execution_order(&definitions, &[])?.iter().enumerate() {
        if step.depends_on.is_empty() {
            println!("{:>2}. {:<48} {}", i + 1, step.id, step.name);
        } else {
            println!(
                "{:>2}. {:<48} {} (after {})",
                i + 1,
                step.id,
                step.name,
                step.depends_on.join(", ")
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.list_steps {
        init_logging("info");
        return print_steps();
    }

    let config = Config::load()?;
    init_logging(&config.connector.log_level);

    let ctx = StepContext::from_config(&config)?;
    let definitions = step_definitions();
    let disabled = ctx.disabled_steps();
    if !disabled.is_empty() {
        log::info!("Active Directory ingestion disabled; skipping {}", disabled.join(", "));
    }
    let order = execution_order(&definitions, &disabled)?;

    let run_id = Uuid::new_v4().to_string();
    let started_at = Utc::now();
    log::info!(
        "Run {} started for instance {} ({} steps)",
        run_id,
        config.connector.instance_id,
        order.len()
    );

    let mut state = MemoryJobState::new();
    let step_results = run_steps(&ctx, &mut state, &order).await;
    let finished_at = Utc::now();

    let failed = step_results
        .iter()
        .filter(|r| r.status == StepStatus::Failure)
        .count();
    log::info!(
        "Run {} finished in {} ms: {} entities, {} relationships, {} failed steps",
        run_id,
        (finished_at - started_at).num_milliseconds(),
        state.entity_count(),
        state.relationship_count(),
        failed
    );

    if let Some(path) = &args.output {
        let document = serde_json::json!({
            "runId": run_id,
            "entities": state.entities(),
            "relationships": state.relationships(),
            "stepResults": step_results,
        });
        std::fs::write(path, serde_json::to_string_pretty(&document)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Graph written to {}", path.display());
    }

    if args.skip_persist {
        return Ok(());
    }

    let db = Db::new(config.db_path());
    let run = RunRecord {
        run_id,
        instance_id: config.connector.instance_id.clone(),
        started_at: started_at.timestamp_millis(),
        finished_at: finished_at.timestamp_millis(),
        step_results,
    };
    persist_run(&db, config.migrations_dir(), run, &state).await?;

    Ok(())
}
