//! Dispatcher stage: deliver each successfully generated certificate by
//! email, at most once per recipient across the lifetime of the ledger.
//!
//! The success log is the input contract from the generator; the sent
//! ledger is the durable filter. One authenticated session is opened for
//! the whole run and survives per-row failures; only the fatal startup
//! conditions (credentials, authentication, schema) abort it.

use rand::Rng;
use snafu::prelude::*;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{Config, DeliveryConfig};
use crate::error::{LedgerSnafu, MailSnafu, PipelineError, RosterSnafu};
use crate::ledger::SentLedger;
use crate::mail::{certificate_email, Mailer, SmtpConfig, SmtpMailer};
use crate::render::{artifact_paths, ArtifactPair};
use crate::roster::{RosterReader, RosterRow};

/// Statistics about a dispatcher run.
#[derive(Debug, Clone, Default)]
pub struct DispatchStats {
    pub rows: usize,
    pub sent: usize,
    pub already_sent: usize,
    pub missing_artifacts: usize,
    pub invalid: usize,
    pub failed: usize,
}

/// Run the dispatcher with a real SMTPS session.
pub async fn run_dispatch(config: &Config) -> Result<DispatchStats, PipelineError> {
    // Fatal startup: credentials present, session authenticated.
    let smtp = SmtpConfig::from_env().context(MailSnafu)?;
    let mailer = SmtpMailer::connect(&smtp).await.context(MailSnafu)?;
    dispatch_with(config, &mailer).await
}

/// Run the dispatch batch loop with any mailer implementation.
pub async fn dispatch_with<M: Mailer>(
    config: &Config,
    mailer: &M,
) -> Result<DispatchStats, PipelineError> {
    let mut ledger = SentLedger::open(&config.output.sent_ledger).context(LedgerSnafu)?;
    info!("{} recipients found in the sent ledger", ledger.len());

    // Schema gate on the success log before any send is attempted.
    let mut success_log = RosterReader::open(&config.output.success_log).context(RosterSnafu)?;
    let rows: Vec<RosterRow> = success_log
        .rows()
        .collect::<Result<_, _>>()
        .context(RosterSnafu)?;

    let mut stats = DispatchStats::default();
    for row in rows {
        stats.rows += 1;

        if let Some(field) = row.missing_field() {
            warn!("Skipping invalid row ({field} missing): {row:?}");
            stats.invalid += 1;
            continue;
        }

        // Silent skip by design: already delivered on a previous run.
        if ledger.contains(&row.email) {
            debug!("Already sent to {}, skipping", row.email);
            stats.already_sent += 1;
            continue;
        }

        let artifacts = artifact_paths(&config.output, &row.name);
        if !artifacts.pdf.exists() || !artifacts.jpg.exists() {
            warn!("Skipping '{}': certificate file(s) not found", row.name);
            stats.missing_artifacts += 1;
            continue;
        }

        match send_one(mailer, &config.delivery, &row, &artifacts).await {
            Ok(()) => {
                // Ledger write is flushed durably before the next row; a
                // crash right after a send that never reached the ledger
                // re-sends that one row on the next run.
                ledger.record(&row.name, &row.email).context(LedgerSnafu)?;
                stats.sent += 1;
                info!("Sent certificate to {} at {}", row.name, row.email);
            }
            Err(e) => {
                warn!("Failed to send to '{}' ({}): {}", row.name, row.email, e);
                stats.failed += 1;
            }
        }

        pace(&config.delivery).await;
    }

    info!(
        "Dispatch complete: {} rows, {} sent, {} already sent, {} missing artifacts, \
         {} invalid, {} failed",
        stats.rows,
        stats.sent,
        stats.already_sent,
        stats.missing_artifacts,
        stats.invalid,
        stats.failed
    );
    Ok(stats)
}

/// Build and transmit one message. Errors are per-row recoverable.
async fn send_one<M: Mailer>(
    mailer: &M,
    delivery: &DeliveryConfig,
    row: &RosterRow,
    artifacts: &ArtifactPair,
) -> Result<(), crate::error::MailError> {
    let email = certificate_email(&row.name, &row.email, &delivery.subject, artifacts)?;
    mailer.send(&email).await
}

/// Randomized inter-send delay to throttle outbound rate.
async fn pace(delivery: &DeliveryConfig) {
    if delivery.max_delay_secs == 0 {
        return;
    }
    let secs = rand::rng().random_range(delivery.min_delay_secs..=delivery.max_delay_secs);
    debug!("Pacing {secs}s before next send");
    tokio::time::sleep(Duration::from_secs(secs)).await;
}
