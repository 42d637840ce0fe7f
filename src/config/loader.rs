//! Configuration file loading.
//!
//! ## Responsibility
//! Read a TOML file from disk, parse it into a [`ContentRoutingConfig`], and
//! run validation before returning. Also exports the config JSON Schema.
//!
//! ## Guarantees
//! - A successfully loaded config is always validated
//! - I/O errors and parse errors are distinguished in the error type
//! - File path is included in every error message
//!
//! ## NOT Responsible For
//! - Defining the config schema (that belongs to `mod.rs`)

use std::path::Path;

use super::validation::{self, ConfigError};
use super::ContentRoutingConfig;

/// Load a [`ContentRoutingConfig`] from a TOML file.
///
/// # Returns
///
/// - `Ok(ContentRoutingConfig)` if the file is readable, well-formed, and valid.
/// - `Err(ConfigError::Io)` if the file cannot be read.
/// - `Err(ConfigError::Parse)` if the TOML is malformed.
/// - `Err(ConfigError::Validation)` if semantic constraints are violated.
///
/// # Panics
///
/// This function never panics.
pub fn load_from_file(path: &Path) -> Result<ContentRoutingConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        file: path.display().to_string(),
        source: e,
    })?;

    load_from_str(&content, &path.display().to_string())
}

/// Load a [`ContentRoutingConfig`] from a TOML string.
///
/// `source_name` identifies the source in error messages.
///
/// # Panics
///
/// This function never panics.
pub fn load_from_str(
    content: &str,
    source_name: &str,
) -> Result<ContentRoutingConfig, ConfigError> {
    let config: ContentRoutingConfig = toml::from_str(content).map_err(|e| ConfigError::Parse {
        file: source_name.to_string(),
        source: e,
    })?;

    validation::validate(&config).map_err(|errors| {
        ConfigError::Validation(
            errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("\n"),
        )
    })?;

    Ok(config)
}

/// JSON Schema for [`ContentRoutingConfig`], pretty-printed.
///
/// Returns an empty string if serialisation fails.
///
/// # Panics
///
/// This function never panics.
pub fn json_schema() -> String {
    let schema = schemars::schema_for!(ContentRoutingConfig);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
