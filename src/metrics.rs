//! Prometheus metrics for the content router.
//!
//! ## Usage
//!
//! Call [`init_metrics`] once at process startup. The helper functions
//! (`inc_routed`, `inc_cache`, …) are no-ops until then, so engines built in
//! tests or libraries that never initialise metrics still route normally.
//!
//! These are process-wide; per-engine counters live in
//! [`crate::engine::RoutingStats`].
//!
//! ## Metrics Exposed
//!
//! | Name | Type | Labels |
//! |------|------|--------|
//! | `content_router_routed_total` | Counter | `destination` |
//! | `content_router_cache_total` | Counter | `outcome` |
//! | `content_router_errors_total` | Counter | `err_type` |
//! | `content_router_routing_duration_seconds` | Histogram | — |
//! | `content_router_inflight` | Gauge | — |

use crate::RouterError;
use prometheus::{
    core::Collector, CounterVec, Encoder, Histogram, HistogramOpts, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

/// All router metrics, stored together in a single [`OnceLock`].
pub struct Metrics {
    /// Registry owning every descriptor below.
    pub registry: Registry,
    /// Successful routings by primary destination.
    pub routed_total: CounterVec,
    /// Decision cache lookups by outcome (`hit` / `miss`).
    pub cache_total: CounterVec,
    /// Failed routings by error kind.
    pub errors_total: CounterVec,
    /// End-to-end routing latency, permit wait included.
    pub routing_duration: Histogram,
    /// Routing calls currently waiting for or holding a permit.
    pub inflight: IntGauge,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

fn register<C>(registry: &Registry, collector: C) -> Result<C, RouterError>
where
    C: Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|e| RouterError::Other(format!("metrics registration failed: {e}")))?;
    Ok(collector)
}

fn build(registry: Registry) -> Result<Metrics, RouterError> {
    let init_err = |e: prometheus::Error| RouterError::Other(format!("metrics init failed: {e}"));

    let routed_total = register(
        &registry,
        CounterVec::new(
            Opts::new("content_router_routed_total", "Content routed by primary destination"),
            &["destination"],
        )
        .map_err(init_err)?,
    )?;
    let cache_total = register(
        &registry,
        CounterVec::new(
            Opts::new("content_router_cache_total", "Decision cache lookups by outcome"),
            &["outcome"],
        )
        .map_err(init_err)?,
    )?;
    let errors_total = register(
        &registry,
        CounterVec::new(
            Opts::new("content_router_errors_total", "Routing failures by type"),
            &["err_type"],
        )
        .map_err(init_err)?,
    )?;
    let routing_duration = register(
        &registry,
        Histogram::with_opts(HistogramOpts::new(
            "content_router_routing_duration_seconds",
            "End-to-end routing latency",
        ))
        .map_err(init_err)?,
    )?;
    let inflight = register(
        &registry,
        IntGauge::new("content_router_inflight", "Routing calls in flight").map_err(init_err)?,
    )?;

    Ok(Metrics {
        registry,
        routed_total,
        cache_total,
        errors_total,
        routing_duration,
        inflight,
    })
}

/// Initialise the router metrics in a private registry.
///
/// Calling it again is a no-op returning `Ok(())`.
///
/// # Errors
///
/// Returns [`RouterError::Other`] if a metric cannot be built or registered.
///
/// # Panics
///
/// This function never panics.
pub fn init_metrics() -> Result<(), RouterError> {
    if METRICS.get().is_some() {
        return Ok(());
    }
    let metrics = build(Registry::new())?;
    // A racing initialiser builds identical descriptors; first one wins.
    let _ = METRICS.set(metrics);
    Ok(())
}

fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

/// Count one successful routing to `destination`.
pub fn inc_routed(destination: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m.routed_total.get_metric_with_label_values(&[destination]) {
            c.inc();
        }
    }
}

/// Count one cache lookup with `outcome` (`"hit"` or `"miss"`).
pub fn inc_cache(outcome: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m.cache_total.get_metric_with_label_values(&[outcome]) {
            c.inc();
        }
    }
}

/// Count one failed routing of kind `err_type`.
pub fn inc_error(err_type: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m.errors_total.get_metric_with_label_values(&[err_type]) {
            c.inc();
        }
    }
}

/// Observe one end-to-end routing latency.
pub fn record_routing_latency(d: Duration) {
    if let Some(m) = metrics() {
        m.routing_duration.observe(d.as_secs_f64());
    }
}

/// Adjust the in-flight gauge by `delta`.
pub fn add_inflight(delta: i64) {
    if let Some(m) = metrics() {
        m.inflight.add(delta);
    }
}

/// Gather all registered metric families; empty before [`init_metrics`].
pub fn gather() -> Vec<prometheus::proto::MetricFamily> {
    metrics().map_or_else(Vec::new, |m| m.registry.gather())
}

/// Encode every metric in the Prometheus text exposition format.
///
/// Returns an empty string before [`init_metrics`] or on encoding failure.
///
/// # Panics
///
/// This function never panics.
pub fn gather_metrics() -> String {
    let families = gather();
    if families.is_empty() {
        return String::new();
    }
    let mut buffer = Vec::new();
    if TextEncoder::new().encode(&families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Structured view of the counters.
#[derive(Debug, Default)]
pub struct MetricsSummary {
    /// Routed totals keyed by destination.
    pub routed_total: HashMap<String, u64>,
    /// Cache lookups keyed by outcome.
    pub cache_total: HashMap<String, u64>,
    /// Failures keyed by error kind.
    pub errors_total: HashMap<String, u64>,
}

fn counter_values(counter: &CounterVec, label: &str) -> HashMap<String, u64> {
    let mut values = HashMap::new();
    for family in counter.collect() {
        for metric in family.get_metric() {
            let key = metric
                .get_label()
                .iter()
                .find(|l| l.get_name() == label)
                .map_or("unknown", |l| l.get_value());
            values.insert(key.to_string(), metric.get_counter().get_value() as u64);
        }
    }
    values
}

/// Current counter values; zeroed before [`init_metrics`].
pub fn get_metrics_summary() -> MetricsSummary {
    let Some(m) = metrics() else {
        return MetricsSummary::default();
    };
    MetricsSummary {
        routed_total: counter_values(&m.routed_total, "destination"),
        cache_total: counter_values(&m.cache_total, "outcome"),
        errors_total: counter_values(&m.errors_total, "err_type"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The global OnceLock cannot be reset between tests, so exact-value
    // checks run against an isolated bundle.
    fn isolated() -> Metrics {
        build(Registry::new()).expect("test: isolated metrics")
    }

    #[test]
    fn test_init_metrics_idempotent() {
        assert!(init_metrics().is_ok());
        assert!(init_metrics().is_ok());
    }

    #[test]
    fn test_helpers_before_or_after_init_do_not_panic() {
        inc_routed("user_feed");
        inc_cache("hit");
        inc_error("timeout");
        record_routing_latency(Duration::from_millis(3));
        add_inflight(1);
        add_inflight(-1);
    }

    #[test]
    fn test_routed_counter_counts_per_destination() {
        let m = isolated();
        for dest in ["user_feed", "user_feed", "archive"] {
            m.routed_total
                .get_metric_with_label_values(&[dest])
                .expect("test: label")
                .inc();
        }
        let values = counter_values(&m.routed_total, "destination");
        assert_eq!(values.get("user_feed"), Some(&2));
        assert_eq!(values.get("archive"), Some(&1));
    }

    #[test]
    fn test_latency_histogram_records_observation() {
        let m = isolated();
        m.routing_duration.observe(0.004);
        let families = m.registry.gather();
        let family = families
            .iter()
            .find(|f| f.get_name() == "content_router_routing_duration_seconds")
            .expect("test: histogram family");
        assert_eq!(family.get_metric()[0].get_histogram().get_sample_count(), 1);
    }

    #[test]
    fn test_inflight_gauge_tracks_delta() {
        let m = isolated();
        m.inflight.add(3);
        m.inflight.add(-1);
        assert_eq!(m.inflight.get(), 2);
    }

    #[test]
    fn test_gather_metrics_contains_routed_family_after_observation() {
        let _ = init_metrics();
        inc_routed("real_time_stream");
        assert!(gather_metrics().contains("content_router_routed_total"));
    }

    #[test]
    fn test_summary_reflects_global_counters() {
        let _ = init_metrics();
        inc_error("summary_check");
        let summary = get_metrics_summary();
        assert!(summary.errors_total.get("summary_check").copied().unwrap_or(0) >= 1);
    }
}
