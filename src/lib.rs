//! # tokio-content-router
//!
//! Intelligent content routing over Tokio: decides, for each scored content
//! item and optional reader, which delivery channels receive it, at what
//! priority and after what delay.
//!
//! ## Architecture
//!
//! ```text
//! RoutingContent ─► permit ─► cache ─► PriorityCalculator ─► IntelligentRouter
//!                                                               │
//!            RoutingResult ◄─ package ◄─ delay shaping ◄─ LoadBalancer
//! ```
//!
//! [`ContentRoutingEngine`] owns every stage; share it with an `Arc`.

// ── Lint policy ───────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(missing_docs)]

use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod engine;
pub mod metrics;
pub mod routing;
pub mod types;

// Re-exports for convenience
pub use config::{ContentRoutingConfig, RoutingStrategy};
pub use engine::{ContentRoutingEngine, RoutingCounters, RoutingMetricsSnapshot};
pub use routing::{
    IntelligentRouter, LoadBalancer, PriorityCalculator, RoutingRule, RuleAction, RuleCondition,
};
pub use types::{
    ContentCategory, ContentError, RoutingContent, RoutingDecision, RoutingDestination,
    RoutingPriority, RoutingResult, UserContext,
};

/// Initialise the global tracing subscriber.
///
/// `LOG_FORMAT=json` selects structured JSON output; anything else (or
/// unset) selects human-readable output. Filtering follows `RUST_LOG`.
///
/// # Errors
///
/// Returns [`RouterError::Other`] if a global subscriber is already set.
///
/// # Panics
///
/// This function never panics.
///
/// # Example
///
/// ```no_run
/// # use tokio_content_router::{init_tracing, RouterError};
/// # fn example() -> Result<(), RouterError> {
/// init_tracing()?;
/// # Ok(()) }
/// ```
pub fn init_tracing() -> Result<(), RouterError> {
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let result = match format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .with_current_span(true)
            .with_span_list(true)
            .try_init(),
        _ => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init(),
    };

    result.map_err(|e| RouterError::Other(format!("tracing init failed: {e}")))
}

/// Errors raised inside the router.
///
/// Routing calls never return these directly; the engine folds them into a
/// failed [`RoutingResult`]. Management operations (`add_routing_rule`,
/// `try_new`) return them as-is.
#[derive(Error, Debug)]
pub enum RouterError {
    /// The configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// A rule with this id is already registered.
    #[error("routing rule already exists: {0}")]
    DuplicateRule(String),

    /// Content failed boundary validation.
    #[error("invalid content: {0}")]
    InvalidContent(#[from] ContentError),

    /// The caller cancelled the routing call before it got a permit.
    #[error("routing cancelled")]
    Cancelled,

    /// No routing permit became free within the configured timeout.
    #[error("timed out after {waited_ms}ms waiting for a routing permit")]
    Timeout {
        /// How long the call waited.
        waited_ms: u64,
    },

    /// The engine's permit pool is closed.
    #[error("routing unavailable")]
    Unavailable,

    /// Catch-all.
    #[error("{0}")]
    Other(String),
}

impl RouterError {
    /// Short label used as the `err_type` metric dimension.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::DuplicateRule(_) => "duplicate_rule",
            Self::InvalidContent(_) => "invalid_content",
            Self::Cancelled => "cancelled",
            Self::Timeout { .. } => "timeout",
            Self::Unavailable => "unavailable",
            Self::Other(_) => "other",
        }
    }
}
