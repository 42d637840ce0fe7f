//! # Stage: Routing Configuration
//!
//! ## Responsibility
//! Declare every tunable of the routing engine, parse it from TOML, and
//! validate semantic constraints before an engine is built from it.
//!
//! ## Guarantees
//! - Deterministic: the same TOML input always produces the same config
//! - Complete defaults: an empty TOML document yields a usable config
//! - Validated: all range and cross-field constraints are checked by
//!   [`validation::validate`] before [`loader`] hands a config out
//! - Schema-exportable: JSON Schema output enables IDE autocomplete
//!
//! ## NOT Responsible For
//! - Provisioning routing rules (rules are added on the engine)
//! - Hot reload: an engine treats its config as read-only after construction

pub mod loader;
pub mod validation;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ── Default value functions ──────────────────────────────────────────────

fn default_strategy() -> RoutingStrategy {
    RoutingStrategy::Intelligent
}

fn default_max_routing_destinations() -> usize {
    3
}

fn default_quality_threshold_high() -> f64 {
    0.8
}

fn default_quality_threshold_medium() -> f64 {
    0.6
}

fn default_urgency_threshold_urgent() -> f64 {
    0.9
}

fn default_urgency_threshold_high() -> f64 {
    0.7
}

fn default_max_user_content_per_hour() -> usize {
    50
}

fn default_max_processing_delay_minutes() -> u64 {
    240
}

fn default_batch_processing_threshold() -> usize {
    10
}

fn default_routing_cache_ttl_minutes() -> u64 {
    30
}

fn default_routing_cache_max_entries() -> usize {
    10_000
}

fn default_max_concurrent_routing() -> usize {
    100
}

fn default_routing_timeout_ms() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

// ── Strategy label ───────────────────────────────────────────────────────

/// Label recorded in [`crate::RoutingResult::strategy_used`].
///
/// Provenance only: every strategy runs the same rule-driven pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    /// Rules, load balancing and delay shaping.
    Intelligent,
    /// Rule evaluation only.
    RuleBased,
    /// Priority-score driven.
    PriorityBased,
    /// Load-aware.
    LoadBalanced,
}

impl RoutingStrategy {
    /// Stable snake_case label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intelligent => "intelligent",
            Self::RuleBased => "rule_based",
            Self::PriorityBased => "priority_based",
            Self::LoadBalanced => "load_balanced",
        }
    }
}

// ── ContentRoutingConfig ─────────────────────────────────────────────────

/// All tunables of a [`crate::ContentRoutingEngine`].
///
/// Supplied once at construction and read-only thereafter.
///
/// # Example
///
/// ```toml
/// max_routing_destinations = 2
/// urgency_threshold_urgent = 0.95
/// enable_intelligent_delays = false
/// ```
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ContentRoutingConfig {
    /// Provenance label copied into every result.
    #[serde(default = "default_strategy")]
    pub default_routing_strategy: RoutingStrategy,

    /// Upper bound on primary + fallback destinations in a result.
    #[serde(default = "default_max_routing_destinations")]
    pub max_routing_destinations: usize,

    /// Reserved; not read by any routing path.
    #[serde(default = "default_quality_threshold_high")]
    pub quality_threshold_high: f64,

    /// Reserved; not read by any routing path.
    #[serde(default = "default_quality_threshold_medium")]
    pub quality_threshold_medium: f64,

    /// Priority confidence at or above which content is `Urgent`.
    #[serde(default = "default_urgency_threshold_urgent")]
    pub urgency_threshold_urgent: f64,

    /// Priority confidence at or above which content is `High`.
    #[serde(default = "default_urgency_threshold_high")]
    pub urgency_threshold_high: f64,

    /// Deliveries allowed per user in a trailing 60-minute window.
    #[serde(default = "default_max_user_content_per_hour")]
    pub max_user_content_per_hour: usize,

    /// Defer non-urgent content for users over their hourly cap.
    #[serde(default = "default_true")]
    pub enable_load_balancing: bool,

    /// Raise delays for digest, research and daytime entertainment content.
    #[serde(default = "default_true")]
    pub enable_intelligent_delays: bool,

    /// Ceiling for computed intelligent delays.
    #[serde(default = "default_max_processing_delay_minutes")]
    pub max_processing_delay_minutes: u64,

    /// Batches at least this large are grouped by category.
    #[serde(default = "default_batch_processing_threshold")]
    pub batch_processing_threshold: usize,

    /// Memoise results per decision cache key.
    #[serde(default = "default_true")]
    pub cache_routing_decisions: bool,

    /// Lifetime of a cached result.
    #[serde(default = "default_routing_cache_ttl_minutes")]
    pub routing_cache_ttl_minutes: u64,

    /// Maximum cached results; the oldest entry is evicted when full.
    #[serde(default = "default_routing_cache_max_entries")]
    pub routing_cache_max_entries: usize,

    /// Permits in the routing semaphore.
    #[serde(default = "default_max_concurrent_routing")]
    pub max_concurrent_routing: usize,

    /// Longest wait for a routing permit, in milliseconds. `0` waits forever.
    #[serde(default = "default_routing_timeout_ms")]
    pub routing_timeout_ms: u64,

    /// Reject malformed content instead of routing it as-is.
    #[serde(default)]
    pub validate_content: bool,

    /// Count each routed primary destination in the load balancer.
    #[serde(default)]
    pub track_destination_load: bool,

    /// Reserved; not read by any routing path.
    #[serde(default)]
    pub enable_feedback_learning: bool,
}

impl Default for ContentRoutingConfig {
    fn default() -> Self {
        Self {
            default_routing_strategy: default_strategy(),
            max_routing_destinations: default_max_routing_destinations(),
            quality_threshold_high: default_quality_threshold_high(),
            quality_threshold_medium: default_quality_threshold_medium(),
            urgency_threshold_urgent: default_urgency_threshold_urgent(),
            urgency_threshold_high: default_urgency_threshold_high(),
            max_user_content_per_hour: default_max_user_content_per_hour(),
            enable_load_balancing: true,
            enable_intelligent_delays: true,
            max_processing_delay_minutes: default_max_processing_delay_minutes(),
            batch_processing_threshold: default_batch_processing_threshold(),
            cache_routing_decisions: true,
            routing_cache_ttl_minutes: default_routing_cache_ttl_minutes(),
            routing_cache_max_entries: default_routing_cache_max_entries(),
            max_concurrent_routing: default_max_concurrent_routing(),
            routing_timeout_ms: default_routing_timeout_ms(),
            validate_content: false,
            track_destination_load: false,
            enable_feedback_learning: false,
        }
    }
}

impl ContentRoutingConfig {
    /// Cache TTL as a [`std::time::Duration`].
    pub fn cache_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.routing_cache_ttl_minutes.saturating_mul(60))
    }

    /// Intelligent-delay ceiling in milliseconds.
    pub fn max_processing_delay_ms(&self) -> u64 {
        self.max_processing_delay_minutes.saturating_mul(60_000)
    }
}
