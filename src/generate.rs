//! Generator stage: render one certificate pair per valid roster row and
//! classify every row as success or failure.
//!
//! Per-row failures never abort the batch; only the fatal preconditions
//! (template, font, roster schema) do. Both classification logs are written
//! header-first and flushed per record, so a crash mid-run leaves a valid
//! prefix rather than a corrupt file.

use snafu::prelude::*;
use std::fs::File;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{
    CreateLogSnafu, FlushLogSnafu, OutcomeLogError, OutcomeLogSnafu, PipelineError, RenderSnafu,
    RosterSnafu, WriteLogSnafu,
};
use crate::render::{CertificateRenderer, Render};
use crate::roster::{RosterReader, RosterRow};

/// Statistics about a generator run.
#[derive(Debug, Clone, Default)]
pub struct GenerateStats {
    pub rows: usize,
    pub generated: usize,
    pub failed: usize,
}

/// Classification of a single roster row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Both artifacts were written.
    Generated,
    /// The row was skipped or rendering failed; the reason is recorded in
    /// the failure log.
    Failed { reason: String },
}

/// A single header-first CSV log, flushed after every record.
struct LogWriter {
    writer: csv::Writer<File>,
    path: String,
}

impl LogWriter {
    /// Create (truncate) the log and write its header row.
    fn create(path: &str) -> Result<Self, OutcomeLogError> {
        let mut writer = csv::Writer::from_path(path).context(CreateLogSnafu { path })?;
        writer
            .write_record(["name", "email"])
            .context(WriteLogSnafu { path })?;

        let mut log = Self {
            writer,
            path: path.to_string(),
        };
        log.flush()?;
        Ok(log)
    }

    fn append(&mut self, row: &RosterRow) -> Result<(), OutcomeLogError> {
        self.writer
            .write_record([row.name.as_str(), row.email.as_str()])
            .context(WriteLogSnafu { path: &self.path })?;
        self.flush()
    }

    fn flush(&mut self) -> Result<(), OutcomeLogError> {
        self.writer.flush().context(FlushLogSnafu { path: &self.path })
    }
}

/// Run the generator with the production renderer.
pub fn run_generate(config: &Config) -> Result<GenerateStats, PipelineError> {
    // Fatal preconditions: template and font must load before any row.
    let renderer =
        CertificateRenderer::new(&config.certificate, &config.output).context(RenderSnafu)?;
    generate_with(config, &renderer)
}

/// Run the generator batch loop with any renderer implementation.
pub fn generate_with<R: Render>(
    config: &Config,
    renderer: &R,
) -> Result<GenerateStats, PipelineError> {
    // Schema gate before the logs are created, so a bad roster leaves
    // nothing behind.
    let mut roster = RosterReader::open(&config.roster.path).context(RosterSnafu)?;

    let mut success = LogWriter::create(&config.output.success_log).context(OutcomeLogSnafu)?;
    let mut failure = LogWriter::create(&config.output.failure_log).context(OutcomeLogSnafu)?;

    info!("Starting certificate generation");

    let mut stats = GenerateStats::default();
    for row in roster.rows() {
        let row = row.context(RosterSnafu)?;
        stats.rows += 1;

        match classify(renderer, &row) {
            Outcome::Generated => {
                info!("Generated certificates for {}", row.name);
                success.append(&row).context(OutcomeLogSnafu)?;
                stats.generated += 1;
            }
            Outcome::Failed { reason } => {
                warn!(
                    "Failed for '{}' ({}): {}",
                    row.name, row.email, reason
                );
                failure.append(&row).context(OutcomeLogSnafu)?;
                stats.failed += 1;
            }
        }
    }

    info!(
        "Generation complete: {} rows, {} generated, {} failed",
        stats.rows, stats.generated, stats.failed
    );
    Ok(stats)
}

/// Classify one row: validation first, then rendering. Errors here are
/// captured as a failure outcome, never propagated.
fn classify<R: Render>(renderer: &R, row: &RosterRow) -> Outcome {
    if let Some(field) = row.missing_field() {
        return Outcome::Failed {
            reason: format!("{field} field missing"),
        };
    }

    match renderer.render(&row.name) {
        Ok(_) => Outcome::Generated,
        Err(e) => Outcome::Failed {
            reason: e.to_string(),
        },
    }
}
