//! Configuration validation engine.
//!
//! ## Responsibility
//! Validate semantic constraints on a parsed [`ContentRoutingConfig`] that
//! cannot be expressed through the type system alone (range checks,
//! cross-field ordering of thresholds, non-zero capacities).
//!
//! ## Guarantees
//! - Every validation rule has at least one test that triggers it
//! - Validation collects *all* errors before returning (no short-circuit)
//! - Error messages include the field name and the invalid value
//!
//! ## NOT Responsible For
//! - Parsing TOML (that belongs to `loader`)
//! - File I/O (that belongs to `loader`)

use super::ContentRoutingConfig;

/// Errors arising from configuration parsing, validation, or I/O.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parsing failed.
    #[error("Parse error in {file}: {source}")]
    Parse {
        /// Path of the file that failed to parse.
        file: String,
        /// Underlying TOML deserialization error.
        #[source]
        source: toml::de::Error,
    },

    /// One or more semantic validation rules failed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A specific field has an out-of-range or contradictory value.
    #[error("Field '{field}' has invalid value {value}: {reason}")]
    InvalidField {
        /// Field name (e.g., "urgency_threshold_high").
        field: String,
        /// String representation of the invalid value.
        value: String,
        /// Human-readable explanation of the constraint.
        reason: String,
    },

    /// File I/O error.
    #[error("IO error reading {file}: {source}")]
    Io {
        /// Path of the file that could not be read.
        file: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Largest permit count a routing semaphore can hold.
pub const MAX_CONCURRENT_ROUTING: usize = tokio::sync::Semaphore::MAX_PERMITS;

fn unit_range(errors: &mut Vec<ConfigError>, field: &str, value: f64) {
    if !(0.0..=1.0).contains(&value) {
        errors.push(ConfigError::InvalidField {
            field: field.into(),
            value: value.to_string(),
            reason: "must be between 0.0 and 1.0".into(),
        });
    }
}

fn at_least_one(errors: &mut Vec<ConfigError>, field: &str, value: usize) {
    if value == 0 {
        errors.push(ConfigError::InvalidField {
            field: field.into(),
            value: "0".into(),
            reason: "must be at least 1".into(),
        });
    }
}

/// Validate all semantic constraints on a [`ContentRoutingConfig`].
///
/// # Returns
///
/// - `Ok(())` if all constraints pass.
/// - `Err(Vec<ConfigError>)` with every violation found.
///
/// # Panics
///
/// This function never panics.
pub fn validate(config: &ContentRoutingConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    // ── Thresholds ───────────────────────────────────────────────────
    unit_range(&mut errors, "quality_threshold_high", config.quality_threshold_high);
    unit_range(&mut errors, "quality_threshold_medium", config.quality_threshold_medium);
    unit_range(&mut errors, "urgency_threshold_urgent", config.urgency_threshold_urgent);
    unit_range(&mut errors, "urgency_threshold_high", config.urgency_threshold_high);

    if config.quality_threshold_medium > config.quality_threshold_high {
        errors.push(ConfigError::InvalidField {
            field: "quality_threshold_medium".into(),
            value: config.quality_threshold_medium.to_string(),
            reason: "must be \u{2264} quality_threshold_high".into(),
        });
    }

    if config.urgency_threshold_high > config.urgency_threshold_urgent {
        errors.push(ConfigError::InvalidField {
            field: "urgency_threshold_high".into(),
            value: config.urgency_threshold_high.to_string(),
            reason: "must be \u{2264} urgency_threshold_urgent".into(),
        });
    }

    // ── Capacities ───────────────────────────────────────────────────
    at_least_one(&mut errors, "max_routing_destinations", config.max_routing_destinations);
    at_least_one(&mut errors, "max_concurrent_routing", config.max_concurrent_routing);
    if config.max_concurrent_routing > MAX_CONCURRENT_ROUTING {
        errors.push(ConfigError::InvalidField {
            field: "max_concurrent_routing".into(),
            value: config.max_concurrent_routing.to_string(),
            reason: format!("must be at most {MAX_CONCURRENT_ROUTING}"),
        });
    }
    at_least_one(&mut errors, "batch_processing_threshold", config.batch_processing_threshold);
    at_least_one(&mut errors, "max_user_content_per_hour", config.max_user_content_per_hour);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
