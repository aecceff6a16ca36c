//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `bulk_lookup` library that handles:
//! - Command-line argument parsing
//! - Environment variable loading (.env file)
//! - Logger initialization
//! - User-facing output formatting
//!
//! All core functionality is implemented in the library crate.

use anyhow::{Context, Result};
use clap::Parser;
use std::process;

use bulk_lookup::initialization::init_logger_with;
use bulk_lookup::{run_bulk_lookup, JobStatus, Opt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env from the current directory, then from next to the executable
    if dotenvy::dotenv().is_err() {
        if let Ok(exe_path) = std::env::current_exe() {
            if let Some(exe_dir) = exe_path.parent() {
                let env_path = exe_dir.join(".env");
                if env_path.exists() {
                    let _ = dotenvy::from_path(&env_path);
                }
            }
        }
    }

    let opt = Opt::parse();

    let log_level = opt.log_level.clone();
    let log_format = opt.log_format.clone();
    init_logger_with(log_level.into(), log_format).context("Failed to initialize logger")?;

    match run_bulk_lookup(opt).await {
        Ok(report) => {
            let searched = report.total_rows.saturating_sub(report.skipped);
            println!(
                "Looked up {} row{} ({} succeeded, {} failed, {} skipped) in {:.1}s",
                searched,
                if searched == 1 { "" } else { "s" },
                report.successful,
                report.failed,
                report.skipped,
                report.elapsed_seconds
            );
            if let Some(path) = &report.output {
                println!("Results saved in {}", path.display());
            }
            if report.status == JobStatus::Failed {
                eprintln!(
                    "bulk_lookup: job {} failed: {}",
                    report.job_id,
                    report.error.as_deref().unwrap_or("unknown error")
                );
                process::exit(1);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("bulk_lookup error: {:#}", e);
            process::exit(1);
        }
    }
}
