//! Engine-local routing counters.
//!
//! Lock-free atomics updated on every routing call, read through a
//! [`RoutingMetricsSnapshot`]. Independent of the process-wide Prometheus
//! registry in [`crate::metrics`].

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic routing counters owned by one engine.
#[derive(Debug, Default)]
pub struct RoutingStats {
    pub(crate) content_routed: AtomicU64,
    pub(crate) routing_decisions_made: AtomicU64,
    pub(crate) cache_hits: AtomicU64,
    pub(crate) cache_misses: AtomicU64,
    pub(crate) load_balancing_applied: AtomicU64,
    pub(crate) delays_applied: AtomicU64,
    pub(crate) routing_failures: AtomicU64,
    // Declared but never incremented on any routing path.
    pub(crate) rule_matches: AtomicU64,
    pub(crate) default_routing_used: AtomicU64,
}

impl RoutingStats {
    pub(crate) fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters.
    pub fn counters(&self) -> RoutingCounters {
        RoutingCounters {
            content_routed: self.content_routed.load(Ordering::Relaxed),
            routing_decisions_made: self.routing_decisions_made.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            load_balancing_applied: self.load_balancing_applied.load(Ordering::Relaxed),
            delays_applied: self.delays_applied.load(Ordering::Relaxed),
            routing_failures: self.routing_failures.load(Ordering::Relaxed),
            rule_matches: self.rule_matches.load(Ordering::Relaxed),
            default_routing_used: self.default_routing_used.load(Ordering::Relaxed),
        }
    }
}

/// Plain counter values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RoutingCounters {
    /// Items routed successfully (cache hits included).
    pub content_routed: u64,
    /// Decisions produced by freshly computed results.
    pub routing_decisions_made: u64,
    /// Cache hits.
    pub cache_hits: u64,
    /// Cache misses (including expired entries).
    pub cache_misses: u64,
    /// Calls where capacity deferral was applied.
    pub load_balancing_applied: u64,
    /// Decisions whose delay was raised.
    pub delays_applied: u64,
    /// Calls that produced a failed result.
    pub routing_failures: u64,
    /// Always zero.
    pub rule_matches: u64,
    /// Always zero.
    pub default_routing_used: u64,
}

/// Counters plus engine state sizes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingMetricsSnapshot {
    /// Counter values.
    pub counters: RoutingCounters,
    /// Entries in the decision cache.
    pub cache_size: usize,
    /// `cache_hits / (cache_hits + cache_misses)`, 0.0 before any lookup.
    pub cache_hit_rate: f64,
    /// Active routing rules.
    pub active_rules: usize,
    /// All routing rules.
    pub total_rules: usize,
    /// Stored user contexts.
    pub user_contexts: usize,
    /// Users with a delivery window in the load balancer.
    pub tracked_users: usize,
}

impl RoutingMetricsSnapshot {
    pub(crate) fn hit_rate(counters: &RoutingCounters) -> f64 {
        let lookups = counters.cache_hits + counters.cache_misses;
        if lookups == 0 {
            0.0
        } else {
            counters.cache_hits as f64 / lookups as f64
        }
    }
}
