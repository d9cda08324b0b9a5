use std::env;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use doctrack::{config::AppConfig, db, sync};

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let mut dry_run = false;
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--dry-run" => dry_run = true,
            other => {
                eprintln!("Unknown argument: {other}\nUsage: sync [--dry-run]");
                std::process::exit(1);
            }
        }
    }

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "sync",
        database_url = %config.redacted_database_url(),
        watched_folder = %config.watched_folder.display(),
        dry_run,
        "loaded configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    let mut conn = pool.get().context("failed to get database connection")?;

    let report = sync::run(&mut conn, &config, dry_run)?;
    if dry_run {
        println!(
            "[dry run] would process {} documents ({} skipped)",
            report.processed, report.skipped
        );
    } else {
        println!(
            "Processed {} new documents ({} skipped, {} failed)",
            report.processed, report.skipped, report.failed
        );
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
