use anyhow::Result;
use azgraph::db::Db;
use azgraph::jobstate::snapshot::latest_run_summary;
use azgraph::steps::StepStatus;
use azgraph::Config;
use chrono::{DateTime, Utc};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "stats")]
#[command(about = "Show entity and relationship counts of the latest collection run")]
struct Args {
    /// Snapshot database to read; defaults to connector.db_path from the config
    #[arg(long)]
    db: Option<PathBuf>,
}

fn status_label(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Success => "success",
        StepStatus::Failure => "FAILURE",
        StepStatus::PartialSuccessDueToDependencyFailure => "partial (dependency failed)",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args = Args::parse();
    let db_path = match args.db {
        Some(path) => path,
        None => Config::load()?.db_path().to_path_buf(),
    };
    let db = Db::new(&db_path);

    let Some(summary) = latest_run_summary(&db).await? else {
        println!("No runs recorded in {}.", db_path.display());
        return Ok(());
    };

    let finished = DateTime::<Utc>::from_timestamp_millis(summary.finished_at)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| summary.finished_at.to_string());

    println!("\n=== azgraph run {} ===\n", summary.run_id);
    println!("Instance: {}", summary.instance_id);
    println!("Finished: {}\n", finished);

    println!("{:-<72}", "");
    println!("{:<48} {:>22}", "Step", "Status");
    println!("{:-<72}", "");
    for result in &summary.step_results {
        println!("{:<48} {:>22}", result.id, status_label(result.status));
    }
    println!("{:-<72}", "");

    println!("\nEntities:\n");
    let mut total = 0;
    for (entity_type, count) in &summary.entity_counts {
        println!("  {:<56} {:>8}", entity_type, count);
        total += count;
    }
    println!("  {:<56} {:>8}", "total", total);

    println!("\nRelationships:\n");
    let mut total = 0;
    for (relationship_type, count) in &summary.relationship_counts {
        println!("  {:<56} {:>8}", relationship_type, count);
        total += count;
    }
    println!("  {:<56} {:>8}", "total", total);
    println!("  {:<56} {:>8}", "of which mapped", summary.mapped_relationships);
    println!();

    Ok(())
}
