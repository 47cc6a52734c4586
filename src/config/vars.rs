//! Environment variable interpolation for config files.
//!
//! Supports `${VAR}` (error if missing), `${VAR:-default}` (default if VAR
//! is unset or empty), and `$$` as an escape for a literal `$`.

use regex::Regex;
use std::env;
use std::sync::LazyLock;

/// Matches `$$`, `${VAR}`, and `${VAR:-default}`.
static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\$|\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
        .expect("Invalid regex pattern")
});

/// Result of environment variable interpolation.
#[derive(Debug)]
pub struct InterpolationResult {
    /// The interpolated text.
    pub text: String,
    /// Any errors encountered during interpolation.
    pub errors: Vec<String>,
}

impl InterpolationResult {
    /// Returns true if there were no errors.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Interpolate environment variables in the given text.
///
/// Errors are accumulated so the user sees every missing variable at once.
pub fn interpolate(input: &str) -> InterpolationResult {
    let mut errors = Vec::new();

    let text = ENV_VAR_PATTERN
        .replace_all(input, |caps: &regex::Captures| {
            let full_match = caps.get(0).unwrap().as_str();
            if full_match == "$$" {
                return "$".to_string();
            }

            let var_name = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let default_value = caps.get(2).map(|m| m.as_str());

            match env::var(var_name) {
                Ok(value) if !value.is_empty() => value,
                _ => match default_value {
                    Some(default) => default.to_string(),
                    None => {
                        errors.push(format!("environment variable '{var_name}' is not set"));
                        full_match.to_string()
                    }
                },
            }
        })
        .to_string();

    InterpolationResult { text, errors }
}
