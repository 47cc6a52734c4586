//! certmill: a standalone tool for batch certificate generation and dispatch.
//!
//! `generate` renders one certificate pair (PDF + JPEG preview) per roster
//! row and writes success/failure classification logs. `send` emails each
//! successfully generated certificate, skipping recipients already recorded
//! in the durable sent ledger, so repeated runs are safe and resumable.

use clap::{Parser, Subcommand};
use snafu::prelude::*;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use certmill::config::Config;
use certmill::error::{ConfigSnafu, PipelineError};
use certmill::{run_dispatch, run_generate};

/// Certificate batch generation and email dispatch tool.
#[derive(Parser, Debug)]
#[command(name = "certmill")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to the configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Dry run - validate configuration without processing.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render certificates for every roster row and classify the outcomes.
    Generate,
    /// Email generated certificates to recipients not yet in the sent ledger.
    Send,
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), PipelineError> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("certmill starting");

    let config = Config::from_file(&args.config).context(ConfigSnafu)?;

    if args.dry_run {
        info!("Dry run mode - validating configuration");
        info!("Roster: {}", config.roster.path);
        info!("Template: {}", config.certificate.template);
        info!(
            "Font: {} at {}px",
            config.certificate.font, config.certificate.font_size
        );
        info!(
            "Artifacts: {} (pdf), {} (jpg)",
            config.output.pdf_dir, config.output.jpg_dir
        );
        info!(
            "Logs: {} / {}, ledger: {}",
            config.output.success_log, config.output.failure_log, config.output.sent_ledger
        );
        info!("Configuration is valid");
        return Ok(());
    }

    match args.command {
        Command::Generate => {
            let stats = run_generate(&config)?;
            info!("Generation finished");
            info!("  Rows processed: {}", stats.rows);
            info!("  Certificates generated: {}", stats.generated);
            info!("  Rows failed: {}", stats.failed);
        }
        Command::Send => {
            let stats = run_dispatch(&config).await?;
            info!("Dispatch finished");
            info!("  Rows processed: {}", stats.rows);
            info!("  Emails sent: {}", stats.sent);
            info!("  Already sent (skipped): {}", stats.already_sent);
            info!("  Missing artifacts (skipped): {}", stats.missing_artifacts);
            info!("  Invalid rows (skipped): {}", stats.invalid);
            info!("  Send failures: {}", stats.failed);
        }
    }

    Ok(())
}
