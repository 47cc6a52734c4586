//! Error types for certmill using snafu.
//!
//! This module defines structured error types with context selectors for
//! all error conditions in the codebase.

use snafu::prelude::*;

// ============ Config Errors ============

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file {path}"))]
    ReadConfig {
        source: std::io::Error,
        path: String,
    },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML configuration"))]
    ParseConfig { source: serde_yaml::Error },

    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// Roster path is empty.
    #[snafu(display("Roster path cannot be empty"))]
    EmptyRosterPath,

    /// Template path is empty.
    #[snafu(display("Certificate template path cannot be empty"))]
    EmptyTemplatePath,

    /// Font path is empty.
    #[snafu(display("Font path cannot be empty"))]
    EmptyFontPath,

    /// Font size is not positive.
    #[snafu(display("Font size must be positive, got {size}"))]
    InvalidFontSize { size: f32 },

    /// Name box coordinates are degenerate.
    #[snafu(display("Name box must have positive width and height"))]
    InvalidNameBox,

    /// Pacing bounds are inverted.
    #[snafu(display("Pacing min_delay_secs ({min}) exceeds max_delay_secs ({max})"))]
    InvalidPacing { min: u64, max: u64 },
}

// ============ Roster Errors ============

/// Errors that can occur while reading a roster or classification log.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RosterError {
    /// Failed to open the CSV file.
    #[snafu(display("Failed to open {path}"))]
    OpenRoster { source: csv::Error, path: String },

    /// A required column is absent from the header row.
    #[snafu(display("{path} must contain a '{column}' column"))]
    MissingColumn { column: String, path: String },

    /// Failed to read a CSV record.
    #[snafu(display("Failed to read a row from {path}"))]
    ReadRow { source: csv::Error, path: String },
}

// ============ Render Errors ============

/// Errors that can occur while rendering certificate artifacts.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RenderError {
    /// Template image missing or undecodable.
    #[snafu(display("Failed to load template image {path}"))]
    LoadTemplate {
        source: image::ImageError,
        path: String,
    },

    /// Font file missing or unreadable.
    #[snafu(display("Failed to read font {path}"))]
    ReadFont {
        source: std::io::Error,
        path: String,
    },

    /// Font bytes are not a valid font.
    #[snafu(display("Failed to parse font {path}"))]
    ParseFont {
        source: ab_glyph::InvalidFont,
        path: String,
    },

    /// Failed to create an output directory.
    #[snafu(display("Failed to create output directory {path}"))]
    CreateOutputDir {
        source: std::io::Error,
        path: String,
    },

    /// Failed to encode the JPEG preview.
    #[snafu(display("Failed to write JPEG {path}"))]
    WriteJpeg {
        source: image::ImageError,
        path: String,
    },

    /// Failed to create the PDF output file.
    #[snafu(display("Failed to create PDF {path}"))]
    CreatePdf {
        source: std::io::Error,
        path: String,
    },

    /// Failed to serialize the PDF document.
    #[snafu(display("Failed to write PDF {path}"))]
    WritePdf {
        source: printpdf::Error,
        path: String,
    },
}

// ============ Outcome Log Errors ============

/// Errors that can occur while writing the success/failure logs.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum OutcomeLogError {
    /// Failed to create a log file.
    #[snafu(display("Failed to create log {path}"))]
    CreateLog { source: csv::Error, path: String },

    /// Failed to append a log record.
    #[snafu(display("Failed to write to log {path}"))]
    WriteLog { source: csv::Error, path: String },

    /// Failed to flush a log file.
    #[snafu(display("Failed to flush log {path}"))]
    FlushLog {
        source: std::io::Error,
        path: String,
    },
}

// ============ Ledger Errors ============

/// Errors that can occur while reading or appending the sent ledger.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum LedgerError {
    /// Failed to open the ledger for appending.
    #[snafu(display("Failed to open ledger {path}"))]
    OpenLedger {
        source: std::io::Error,
        path: String,
    },

    /// Failed to read existing ledger entries.
    #[snafu(display("Failed to read ledger {path}"))]
    ReadLedger { source: csv::Error, path: String },

    /// Failed to append a ledger entry.
    #[snafu(display("Failed to append to ledger {path}"))]
    AppendLedger { source: csv::Error, path: String },

    /// Failed to flush the ledger.
    #[snafu(display("Failed to flush ledger {path}"))]
    FlushLedger {
        source: std::io::Error,
        path: String,
    },

    /// Failed to fsync the ledger.
    #[snafu(display("Failed to sync ledger {path}"))]
    SyncLedger {
        source: std::io::Error,
        path: String,
    },
}

// ============ Mail Errors ============

/// Errors that can occur during message construction and SMTP delivery.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MailError {
    /// A required credential is absent from the environment.
    #[snafu(display("Missing required environment variable {name}"))]
    MissingCredential { name: String },

    /// EMAIL_PORT is not a valid port number.
    #[snafu(display("Invalid SMTP port '{value}'"))]
    InvalidPort {
        source: std::num::ParseIntError,
        value: String,
    },

    /// An address failed to parse as a mailbox.
    #[snafu(display("Invalid email address '{address}'"))]
    InvalidAddress {
        source: lettre::address::AddressError,
        address: String,
    },

    /// Message assembly failed.
    #[snafu(display("Failed to build message"))]
    BuildMessage { source: lettre::error::Error },

    /// An attachment carried an unparseable MIME type.
    #[snafu(display("Unsupported attachment content type '{mime}'"))]
    AttachmentType { mime: String },

    /// Failed to read an attachment from disk.
    #[snafu(display("Failed to read attachment {path}"))]
    ReadAttachment {
        source: std::io::Error,
        path: String,
    },

    /// Failed to set up the SMTP relay.
    #[snafu(display("Failed to connect to SMTP host {host}"))]
    SmtpConnect {
        source: lettre::transport::smtp::Error,
        host: String,
    },

    /// The server rejected the connection test (bad credentials).
    #[snafu(display("SMTP authentication failed for {host}"))]
    SmtpAuth { host: String },

    /// The server rejected a message in flight.
    #[snafu(display("SMTP transmission failed"))]
    Transmit {
        source: lettre::transport::smtp::Error,
    },
}

// ============ Pipeline Error (top-level) ============

/// Top-level pipeline errors that aggregate all error types.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// Configuration error.
    #[snafu(display("Configuration error"))]
    Config { source: ConfigError },

    /// Roster or classification-log error.
    #[snafu(display("Roster error"))]
    Roster { source: RosterError },

    /// Certificate rendering error (fatal preconditions only; per-row
    /// render failures are classified, not propagated).
    #[snafu(display("Render error"))]
    Render { source: RenderError },

    /// Success/failure log error.
    #[snafu(display("Outcome log error"))]
    OutcomeLog { source: OutcomeLogError },

    /// Sent ledger error.
    #[snafu(display("Ledger error"))]
    Ledger { source: LedgerError },

    /// Mail error (fatal startup conditions only; per-row send failures
    /// are logged, not propagated).
    #[snafu(display("Mail error"))]
    Mail { source: MailError },
}
