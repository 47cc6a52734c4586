//! Configuration parsing and validation.
//!
//! Handles loading configuration from YAML files with environment variable
//! interpolation. SMTP credentials intentionally live outside this file and
//! are read from the process environment at dispatch startup.

mod vars;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::path::Path;

use crate::error::{
    ConfigError, EmptyFontPathSnafu, EmptyRosterPathSnafu, EmptyTemplatePathSnafu,
    EnvInterpolationSnafu, InvalidFontSizeSnafu, InvalidNameBoxSnafu, InvalidPacingSnafu,
    ParseConfigSnafu, ReadConfigSnafu,
};

/// Main configuration structure for both pipeline stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub roster: RosterConfig,
    pub certificate: CertificateConfig,
    /// Output paths (optional, sensible defaults).
    #[serde(default)]
    pub output: OutputConfig,
    /// Delivery settings (optional).
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

/// Roster source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterConfig {
    /// Path to the roster CSV. Must contain `name` and `email` columns.
    pub path: String,
}

/// Certificate rendering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateConfig {
    /// Path to the template image, used as the immutable base for every render.
    pub template: String,

    /// Path to a TTF/OTF font file.
    pub font: String,

    /// Fixed font size in pixels (default: 70).
    #[serde(default = "default_font_size")]
    pub font_size: f32,

    /// Target rectangle the recipient name is centered inside.
    pub name_box: NameBox,

    /// Text color as RGB (default: black).
    #[serde(default = "default_text_color")]
    pub text_color: [u8; 3],
}

fn default_font_size() -> f32 {
    70.0
}

fn default_text_color() -> [u8; 3] {
    [0, 0, 0]
}

/// Fixed rectangle on the template that the name is centered inside.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NameBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl NameBox {
    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }
}

/// Output paths for artifacts, classification logs, and the sent ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for print-ready PDF certificates.
    #[serde(default = "default_pdf_dir")]
    pub pdf_dir: String,

    /// Directory for JPEG previews.
    #[serde(default = "default_jpg_dir")]
    pub jpg_dir: String,

    /// Per-run generator success log (truncated at generator start).
    #[serde(default = "default_success_log")]
    pub success_log: String,

    /// Per-run generator failure log (truncated at generator start).
    #[serde(default = "default_failure_log")]
    pub failure_log: String,

    /// Cross-run sent ledger (append-only, never truncated).
    #[serde(default = "default_sent_ledger")]
    pub sent_ledger: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            pdf_dir: default_pdf_dir(),
            jpg_dir: default_jpg_dir(),
            success_log: default_success_log(),
            failure_log: default_failure_log(),
            sent_ledger: default_sent_ledger(),
        }
    }
}

fn default_pdf_dir() -> String {
    "certificates_pdf".to_string()
}

fn default_jpg_dir() -> String {
    "certificates_jpg".to_string()
}

fn default_success_log() -> String {
    "output_success.csv".to_string()
}

fn default_failure_log() -> String {
    "output_failure.csv".to_string()
}

fn default_sent_ledger() -> String {
    "sent_log.csv".to_string()
}

/// Delivery settings: subject line and inter-send pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Subject line for every certificate email.
    #[serde(default = "default_subject")]
    pub subject: String,

    /// Lower bound of the randomized inter-send delay, in seconds.
    #[serde(default = "default_min_delay_secs")]
    pub min_delay_secs: u64,

    /// Upper bound of the randomized inter-send delay, in seconds.
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            subject: default_subject(),
            min_delay_secs: default_min_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
        }
    }
}

fn default_subject() -> String {
    "Your Certificate of Achievement is Here!".to_string()
}

fn default_min_delay_secs() -> u64 {
    2
}

fn default_max_delay_secs() -> u64 {
    5
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_file_with_options(path, true)
    }

    /// Load configuration from a YAML file with optional environment variable
    /// interpolation.
    pub fn from_file_with_options(
        path: impl AsRef<Path>,
        interpolate_env: bool,
    ) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).context(ReadConfigSnafu {
            path: path.as_ref().display().to_string(),
        })?;

        let content = if interpolate_env {
            let result = vars::interpolate(&content);
            if !result.is_ok() {
                let error_msg = result.errors.join("\n");
                return EnvInterpolationSnafu { message: error_msg }.fail();
            }
            result.text
        } else {
            content
        };

        let config: Config = serde_yaml::from_str(&content).context(ParseConfigSnafu)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(!self.roster.path.is_empty(), EmptyRosterPathSnafu);
        ensure!(!self.certificate.template.is_empty(), EmptyTemplatePathSnafu);
        ensure!(!self.certificate.font.is_empty(), EmptyFontPathSnafu);
        ensure!(
            self.certificate.font_size > 0.0,
            InvalidFontSizeSnafu {
                size: self.certificate.font_size
            }
        );
        ensure!(
            self.certificate.name_box.width() > 0 && self.certificate.name_box.height() > 0,
            InvalidNameBoxSnafu
        );
        ensure!(
            self.delivery.min_delay_secs <= self.delivery.max_delay_secs,
            InvalidPacingSnafu {
                min: self.delivery.min_delay_secs,
                max: self.delivery.max_delay_secs
            }
        );
        Ok(())
    }
}
