//! # Stage: Content Routing Engine
//!
//! ## Responsibility
//! Orchestrate one routing call end to end: bounded admission through a
//! semaphore, decision-cache lookup, priority scoring, rule evaluation,
//! per-user load balancing, intelligent delay shaping, result packaging
//! and metrics.
//!
//! ## Guarantees
//! - Never fails outward: every error becomes a [`RoutingResult`] with
//!   `success == false` and an `error_message`
//! - Bounded: at most `max_concurrent_routing` calls compute at once; the
//!   permit wait is the only suspension point
//! - Isolated: a failure in one batch item never affects another
//! - Deterministic: identical inputs under identical rule/cache state give
//!   identical decisions
//!
//! ## NOT Responsible For
//! - Computing quality/urgency/relevance scores (upstream service)
//! - Storing user profiles beyond the in-memory context map
//! - Physically delivering content or retrying deliveries

pub mod cache;
pub mod delay;
pub mod stats;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use std::time::{Duration, Instant};
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{validation, ContentRoutingConfig};
use crate::metrics;
use crate::routing::{IntelligentRouter, LoadBalancer, PriorityCalculator, RoutingRule};
use crate::types::{
    ContentCategory, RoutingContent, RoutingDecision, RoutingDestination, RoutingPriority,
    RoutingResult, UserContext,
};
use crate::RouterError;

pub use cache::{cache_key, DecisionCache};
pub use stats::{RoutingCounters, RoutingMetricsSnapshot, RoutingStats};

/// Delay added to every non-urgent decision for a user over capacity.
pub const CAPACITY_DEFERRAL_MS: u64 = 3_600_000;

/// Admission-controlled content router.
///
/// Owns its rules, caches, user contexts and load windows; share it across
/// tasks with an `Arc`.
///
/// # Panics
///
/// This type and its methods never panic.
#[derive(Debug)]
pub struct ContentRoutingEngine {
    config: ContentRoutingConfig,
    priority_calculator: PriorityCalculator,
    load_balancer: LoadBalancer,
    router: IntelligentRouter,
    cache: DecisionCache,
    user_contexts: DashMap<String, UserContext>,
    semaphore: Semaphore,
    stats: RoutingStats,
}

impl ContentRoutingEngine {
    /// Build an engine with the four default rules.
    ///
    /// The config is taken as-is; see [`Self::try_new`] for a validating
    /// constructor. `max_concurrent_routing` is clamped to
    /// `1..=Semaphore::MAX_PERMITS`.
    pub fn new(config: ContentRoutingConfig) -> Self {
        let permits = config
            .max_concurrent_routing
            .clamp(1, Semaphore::MAX_PERMITS);
        if permits != config.max_concurrent_routing {
            warn!(
                requested = config.max_concurrent_routing,
                permits = permits,
                "max_concurrent_routing out of range, clamped"
            );
        }
        info!(
            strategy = config.default_routing_strategy.as_str(),
            max_concurrent = config.max_concurrent_routing,
            caching = config.cache_routing_decisions,
            load_balancing = config.enable_load_balancing,
            "content routing engine initialised"
        );
        Self {
            priority_calculator: PriorityCalculator::new(
                config.urgency_threshold_urgent,
                config.urgency_threshold_high,
            ),
            load_balancer: LoadBalancer::new(config.max_user_content_per_hour),
            router: IntelligentRouter::new(),
            cache: DecisionCache::new(config.cache_ttl(), config.routing_cache_max_entries),
            user_contexts: DashMap::new(),
            semaphore: Semaphore::new(permits),
            stats: RoutingStats::default(),
            config,
        }
    }

    /// Validate `config`, then build the engine.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Config`] listing every violated constraint.
    pub fn try_new(config: ContentRoutingConfig) -> Result<Self, RouterError> {
        validation::validate(&config).map_err(|errors| {
            RouterError::Config(
                errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })?;
        Ok(Self::new(config))
    }

    /// The engine's configuration.
    pub fn config(&self) -> &ContentRoutingConfig {
        &self.config
    }

    /// The rule router.
    pub fn router(&self) -> &IntelligentRouter {
        &self.router
    }

    /// The load balancer.
    pub fn load_balancer(&self) -> &LoadBalancer {
        &self.load_balancer
    }

    /// The priority calculator.
    pub fn priority_calculator(&self) -> &PriorityCalculator {
        &self.priority_calculator
    }

    // ── User contexts ──────────────────────────────────────────────────

    /// Insert or replace the context for `context.user_id`.
    pub fn set_user_context(&self, context: UserContext) {
        debug!(user_id = %context.user_id, "user context set");
        self.user_contexts.insert(context.user_id.clone(), context);
    }

    /// Stored context for `user_id`.
    pub fn get_user_context(&self, user_id: &str) -> Option<UserContext> {
        self.user_contexts.get(user_id).map(|c| c.value().clone())
    }

    /// Remove and return the context for `user_id`.
    pub fn remove_user_context(&self, user_id: &str) -> Option<UserContext> {
        self.user_contexts.remove(user_id).map(|(_, c)| c)
    }

    // ── Rules ──────────────────────────────────────────────────────────

    /// Add a routing rule. Cached results are not invalidated.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::DuplicateRule`] if the id is taken.
    pub fn add_routing_rule(&self, rule: RoutingRule) -> Result<(), RouterError> {
        self.router.add_rule(rule)
    }

    /// Deactivate a rule by id. Returns `false` if unknown.
    pub fn deactivate_routing_rule(&self, rule_id: &str) -> bool {
        self.router.deactivate_rule(rule_id)
    }

    /// Route content tagged `topic` to `destination` as well.
    pub fn add_topic_route(&self, topic: impl Into<String>, destination: RoutingDestination) {
        self.router.add_topic_route(topic, destination);
    }

    // ── Cache ──────────────────────────────────────────────────────────

    /// Drop every cached result.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Drop expired cached results. Returns how many were removed.
    pub fn purge_expired_cache(&self) -> usize {
        let purged = self.cache.purge_expired();
        if purged > 0 {
            debug!(purged = purged, "expired routing results purged");
        }
        purged
    }

    /// Drop per-user delivery windows with no delivery in the last hour.
    /// Returns how many users were dropped.
    pub fn purge_idle_users(&self) -> usize {
        let purged = self.load_balancer.purge_idle_users_at(Utc::now());
        if purged > 0 {
            debug!(purged = purged, "idle user delivery windows purged");
        }
        purged
    }

    // ── Metrics ────────────────────────────────────────────────────────

    /// Counters and state sizes.
    pub fn get_routing_metrics(&self) -> RoutingMetricsSnapshot {
        let counters = self.stats.counters();
        RoutingMetricsSnapshot {
            cache_hit_rate: RoutingMetricsSnapshot::hit_rate(&counters),
            counters,
            cache_size: self.cache.len(),
            active_rules: self.router.active_rule_count(),
            total_rules: self.router.rule_count(),
            user_contexts: self.user_contexts.len(),
            tracked_users: self.load_balancer.tracked_users(),
        }
    }

    // ── Routing ────────────────────────────────────────────────────────

    /// Route one item on behalf of an optional user.
    ///
    /// Never fails: errors are reported through `success` and
    /// `error_message` on the returned result.
    pub async fn route_content(
        &self,
        content: &RoutingContent,
        user_id: Option<&str>,
    ) -> RoutingResult {
        self.route_guarded(content, user_id, None).await
    }

    /// Like [`Self::route_content`], abandoning the permit wait when
    /// `cancel` fires.
    pub async fn route_content_with_cancel(
        &self,
        content: &RoutingContent,
        user_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> RoutingResult {
        self.route_guarded(content, user_id, Some(cancel)).await
    }

    /// Route many items for one optional user.
    ///
    /// Batches of at least `batch_processing_threshold` items are grouped by
    /// category (first-seen order) and each group is routed concurrently, so
    /// results follow group order rather than input order. Smaller batches
    /// are routed concurrently in input order.
    pub async fn batch_route_content(
        &self,
        items: &[RoutingContent],
        user_id: Option<&str>,
    ) -> Vec<RoutingResult> {
        if items.len() < self.config.batch_processing_threshold {
            return join_all(items.iter().map(|c| self.route_content(c, user_id))).await;
        }

        let groups = group_by_category(items);
        info!(
            items = items.len(),
            groups = groups.len(),
            "batch routing grouped by category"
        );

        let mut results = Vec::with_capacity(items.len());
        for (category, group) in groups {
            debug!(category = %category, items = group.len(), "routing category group");
            let routed = join_all(group.into_iter().map(|c| self.route_content(c, user_id))).await;
            results.extend(routed);
        }
        results
    }

    async fn route_guarded(
        &self,
        content: &RoutingContent,
        user_id: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> RoutingResult {
        let started = Instant::now();
        metrics::add_inflight(1);

        let outcome = match self.acquire_permit(cancel).await {
            Ok(_permit) => self.try_route(content, user_id, started),
            Err(e) => Err(e),
        };

        metrics::add_inflight(-1);
        metrics::record_routing_latency(started.elapsed());

        match outcome {
            Ok(result) => result,
            Err(err) => {
                warn!(
                    content_id = %content.content_id,
                    user_id = user_id.unwrap_or(cache::ANONYMOUS_USER),
                    error = %err,
                    "routing failed"
                );
                RoutingStats::inc(&self.stats.routing_failures);
                metrics::inc_error(err.kind());
                RoutingResult::failed(
                    content.content_id.clone(),
                    self.config.default_routing_strategy.as_str(),
                    err.to_string(),
                    elapsed_ms(started),
                )
            }
        }
    }

    async fn acquire_permit(
        &self,
        cancel: Option<&CancellationToken>,
    ) -> Result<SemaphorePermit<'_>, RouterError> {
        let timeout_ms = self.config.routing_timeout_ms;
        let bounded = async {
            if timeout_ms == 0 {
                return self
                    .semaphore
                    .acquire()
                    .await
                    .map_err(|_| RouterError::Unavailable);
            }
            match tokio::time::timeout(Duration::from_millis(timeout_ms), self.semaphore.acquire())
                .await
            {
                Ok(permit) => permit.map_err(|_| RouterError::Unavailable),
                Err(_) => Err(RouterError::Timeout {
                    waited_ms: timeout_ms,
                }),
            }
        };

        match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(RouterError::Cancelled),
                permit = bounded => permit,
            },
            None => bounded.await,
        }
    }

    fn try_route(
        &self,
        content: &RoutingContent,
        user_id: Option<&str>,
        started: Instant,
    ) -> Result<RoutingResult, RouterError> {
        let now = Utc::now();

        if self.config.validate_content {
            content.validate(now)?;
        }

        // 1. Cache
        let key = cache_key(content, user_id);
        if self.config.cache_routing_decisions {
            if let Some(cached) = self.cache.get(&key) {
                RoutingStats::inc(&self.stats.cache_hits);
                RoutingStats::inc(&self.stats.content_routed);
                metrics::inc_cache("hit");
                return Ok(cached);
            }
            RoutingStats::inc(&self.stats.cache_misses);
            metrics::inc_cache("miss");
        }

        // 2. Reader context
        let user_context = user_id.and_then(|id| self.get_user_context(id));

        // 3. Priority score; not merged into the rule-driven decisions.
        let (priority, confidence) =
            self.priority_calculator
                .calculate_priority_at(content, user_context.as_ref(), now);
        debug!(
            content_id = %content.content_id,
            priority = %priority,
            confidence = confidence,
            "priority calculated"
        );

        // 4. Rules
        let mut decisions = self
            .router
            .route_content_at(content, user_context.as_ref(), now);

        // 5. Per-user capacity
        let mut has_capacity = true;
        if let (true, Some(uid), Some(_)) = (
            self.config.enable_load_balancing,
            user_id,
            user_context.as_ref(),
        ) {
            has_capacity = self.load_balancer.check_user_capacity_at(uid, now);
            if !has_capacity {
                let deferred = defer_non_urgent(&mut decisions);
                RoutingStats::inc(&self.stats.load_balancing_applied);
                warn!(
                    content_id = %content.content_id,
                    user_id = uid,
                    deferred = deferred,
                    "user over hourly capacity, deferring non-urgent decisions"
                );
            }
        }

        // 6. Delay shaping
        if self.config.enable_intelligent_delays {
            let ceiling = self.config.max_processing_delay_ms();
            let mut raised = 0u64;
            for decision in decisions.iter_mut() {
                if delay::apply_optimal_delay(decision, content, now, ceiling) {
                    raised += 1;
                }
            }
            RoutingStats::add(&self.stats.delays_applied, raised);
        }

        // 7–8. Package, cache, account
        let result = self.package(content, decisions, started, now);

        if self.config.cache_routing_decisions {
            self.cache.insert(key, result.clone());
        }
        if has_capacity {
            if let Some(uid) = user_id {
                self.load_balancer.record_user_delivery_at(uid, now);
            }
        }
        if self.config.track_destination_load {
            self.load_balancer
                .update_destination_load(result.primary_destination, 1);
        }

        RoutingStats::inc(&self.stats.content_routed);
        RoutingStats::add(
            &self.stats.routing_decisions_made,
            result.decisions.len() as u64,
        );
        metrics::inc_routed(result.primary_destination.as_str());
        debug!(
            content_id = %content.content_id,
            destination = %result.primary_destination,
            decisions = result.decisions.len(),
            "content routed"
        );

        Ok(result)
    }

    fn package(
        &self,
        content: &RoutingContent,
        decisions: Vec<RoutingDecision>,
        started: Instant,
        now: DateTime<Utc>,
    ) -> RoutingResult {
        let primary_destination = decisions
            .first()
            .map(|d| d.destination)
            .unwrap_or(RoutingDestination::UserFeed);
        let fallback_destinations = decisions
            .iter()
            .skip(1)
            .take(self.config.max_routing_destinations.saturating_sub(1))
            .map(|d| d.destination)
            .collect();

        RoutingResult {
            content_id: content.content_id.clone(),
            decisions,
            primary_destination,
            fallback_destinations,
            processing_time_ms: elapsed_ms(started),
            strategy_used: self.config.default_routing_strategy.as_str().to_string(),
            success: true,
            error_message: None,
            processed_timestamp: now,
        }
    }
}

/// Downgrade every non-urgent decision to `Deferred` and push it back an
/// hour. Returns how many decisions changed.
fn defer_non_urgent(decisions: &mut [RoutingDecision]) -> usize {
    let mut changed = 0;
    for decision in decisions
        .iter_mut()
        .filter(|d| d.routing_priority != RoutingPriority::Urgent)
    {
        decision.routing_priority = RoutingPriority::Deferred;
        decision.processing_delay_ms = decision
            .processing_delay_ms
            .saturating_add(CAPACITY_DEFERRAL_MS);
        decision
            .reasoning
            .push("Deferred: user hourly content limit reached".to_string());
        changed += 1;
    }
    changed
}

/// Group items by category, preserving first-seen category order and input
/// order within each group.
fn group_by_category(items: &[RoutingContent]) -> Vec<(ContentCategory, Vec<&RoutingContent>)> {
    let mut groups: Vec<(ContentCategory, Vec<&RoutingContent>)> = Vec::new();
    for item in items {
        match groups.iter_mut().find(|(c, _)| *c == item.category) {
            Some((_, group)) => group.push(item),
            None => groups.push((item.category, vec![item])),
        }
    }
    groups
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::rules::{RuleAction, RuleCondition};
    use chrono::Duration as ChronoDuration;
    use std::sync::Arc;

    fn quiet_config() -> ContentRoutingConfig {
        ContentRoutingConfig {
            enable_intelligent_delays: false,
            ..ContentRoutingConfig::default()
        }
    }

    fn industry(id: &str) -> RoutingContent {
        RoutingContent::new(id, ContentCategory::IndustryUpdate).with_quality(0.5)
    }

    #[tokio::test]
    async fn test_route_content_default_feed() {
        let engine = ContentRoutingEngine::new(quiet_config());
        let result = engine.route_content(&industry("c2"), None).await;
        assert!(result.success);
        assert_eq!(result.primary_destination, RoutingDestination::UserFeed);
        assert!(result.fallback_destinations.is_empty());
        assert_eq!(result.strategy_used, "intelligent");
        assert!(result.error_message.is_none());
    }

    #[tokio::test]
    async fn test_second_call_is_cache_hit() {
        let engine = ContentRoutingEngine::new(quiet_config());
        let content = industry("c");
        let first = engine.route_content(&content, Some("u1")).await;
        let second = engine.route_content(&content, Some("u1")).await;
        assert_eq!(first, second);
        let c = engine.get_routing_metrics().counters;
        assert_eq!(c.cache_hits, 1);
        assert_eq!(c.cache_misses, 1);
        assert_eq!(c.content_routed, 2);
        assert_eq!(c.routing_decisions_made, 1);
    }

    #[tokio::test]
    async fn test_caching_disabled_never_hits() {
        let engine = ContentRoutingEngine::new(ContentRoutingConfig {
            cache_routing_decisions: false,
            ..quiet_config()
        });
        let content = industry("c");
        engine.route_content(&content, None).await;
        engine.route_content(&content, None).await;
        let metrics = engine.get_routing_metrics();
        assert_eq!(metrics.counters.cache_hits, 0);
        assert_eq!(metrics.counters.cache_misses, 0);
        assert_eq!(metrics.cache_size, 0);
    }

    #[tokio::test]
    async fn test_fallbacks_bounded_by_max_destinations() {
        let engine = ContentRoutingEngine::new(ContentRoutingConfig {
            max_routing_destinations: 2,
            ..quiet_config()
        });
        for (i, destination) in [
            RoutingDestination::PriorityQueue,
            RoutingDestination::BatchProcessing,
            RoutingDestination::NotificationSystem,
        ]
        .into_iter()
        .enumerate()
        {
            engine
                .add_routing_rule(RoutingRule::new(
                    format!("extra-{i}"),
                    format!("Extra {i}"),
                    vec![RuleCondition::CategoryIn {
                        categories: vec![ContentCategory::Educational],
                    }],
                    RuleAction {
                        destination,
                        priority: RoutingPriority::Normal,
                        delay_ms: 0,
                        exclusive: false,
                    },
                    50 - i as i32,
                ))
                .expect("test: add rule");
        }
        let content = RoutingContent::new("e", ContentCategory::Educational);
        let result = engine.route_content(&content, None).await;
        assert_eq!(result.decisions.len(), 3);
        assert_eq!(result.primary_destination, RoutingDestination::PriorityQueue);
        assert_eq!(
            result.fallback_destinations,
            vec![RoutingDestination::BatchProcessing]
        );
    }

    #[tokio::test]
    async fn test_over_capacity_user_gets_deferred() {
        let engine = ContentRoutingEngine::new(ContentRoutingConfig {
            max_user_content_per_hour: 1,
            ..quiet_config()
        });
        engine.set_user_context(UserContext::new("u1"));

        let first = engine.route_content(&industry("a"), Some("u1")).await;
        assert_eq!(first.decisions[0].routing_priority, RoutingPriority::Normal);

        let second = engine.route_content(&industry("b"), Some("u1")).await;
        let d = &second.decisions[0];
        assert_eq!(d.routing_priority, RoutingPriority::Deferred);
        assert!(d.processing_delay_ms >= CAPACITY_DEFERRAL_MS);
        assert!(d.reasoning.iter().any(|r| r.contains("hourly content limit")));
        assert_eq!(engine.get_routing_metrics().counters.load_balancing_applied, 1);
        // Capacity was exhausted, so the second delivery is not recorded.
        assert_eq!(
            engine.load_balancer().user_delivery_count("u1", Utc::now()),
            1
        );
    }

    #[tokio::test]
    async fn test_over_capacity_keeps_urgent_decisions() {
        let engine = ContentRoutingEngine::new(ContentRoutingConfig {
            max_user_content_per_hour: 1,
            ..quiet_config()
        });
        engine.set_user_context(UserContext::new("u1"));
        engine.load_balancer().record_user_delivery("u1");

        let news = RoutingContent::new("n", ContentCategory::BreakingNews).with_quality(0.9);
        let result = engine.route_content(&news, Some("u1")).await;
        assert_eq!(result.decisions[0].routing_priority, RoutingPriority::Urgent);
        assert_eq!(result.decisions[0].processing_delay_ms, 0);
    }

    #[tokio::test]
    async fn test_over_capacity_without_context_is_not_deferred() {
        let engine = ContentRoutingEngine::new(ContentRoutingConfig {
            max_user_content_per_hour: 1,
            ..quiet_config()
        });
        engine.load_balancer().record_user_delivery("ghost");
        let result = engine.route_content(&industry("x"), Some("ghost")).await;
        assert_eq!(result.decisions[0].routing_priority, RoutingPriority::Normal);
        assert_eq!(engine.get_routing_metrics().counters.load_balancing_applied, 0);
        // Capacity is only checked for readers with a context.
        assert_eq!(
            engine.load_balancer().user_delivery_count("ghost", Utc::now()),
            2
        );
    }

    #[tokio::test]
    async fn test_load_balancing_disabled_ignores_capacity() {
        let engine = ContentRoutingEngine::new(ContentRoutingConfig {
            max_user_content_per_hour: 1,
            enable_load_balancing: false,
            ..quiet_config()
        });
        engine.set_user_context(UserContext::new("u1"));
        engine.load_balancer().record_user_delivery("u1");
        let result = engine.route_content(&industry("x"), Some("u1")).await;
        assert_eq!(result.decisions[0].routing_priority, RoutingPriority::Normal);
    }

    #[tokio::test]
    async fn test_intelligent_delay_raises_research_default() {
        let engine = ContentRoutingEngine::new(ContentRoutingConfig::default());
        let paper = RoutingContent::new("p", ContentCategory::ResearchPaper).with_quality(0.3);
        let result = engine.route_content(&paper, None).await;
        let d = &result.decisions[0];
        assert_eq!(d.destination, RoutingDestination::EmailDigest);
        assert_eq!(d.processing_delay_ms, delay::EMAIL_DIGEST_DELAY_MS);
        assert!(d.reasoning.iter().any(|r| r.starts_with("Applied intelligent delay")));
        assert_eq!(engine.get_routing_metrics().counters.delays_applied, 1);
    }

    #[tokio::test]
    async fn test_validation_rejects_malformed_content_when_enabled() {
        let engine = ContentRoutingEngine::new(ContentRoutingConfig {
            validate_content: true,
            ..quiet_config()
        });
        let bad = industry("bad").with_quality(3.0);
        let result = engine.route_content(&bad, None).await;
        assert!(!result.success);
        assert!(result
            .error_message
            .as_deref()
            .unwrap_or_default()
            .contains("quality_score"));
        assert_eq!(engine.get_routing_metrics().counters.routing_failures, 1);
    }

    #[tokio::test]
    async fn test_malformed_content_flows_through_by_default() {
        let engine = ContentRoutingEngine::new(quiet_config());
        let bad = industry("bad")
            .with_quality(-2.0)
            .with_created(Utc::now() + ChronoDuration::hours(5));
        let result = engine.route_content(&bad, None).await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_cancelled_token_yields_failed_result() {
        let engine = ContentRoutingEngine::new(quiet_config());
        let token = CancellationToken::new();
        token.cancel();
        let result = engine
            .route_content_with_cancel(&industry("c"), None, &token)
            .await;
        assert!(!result.success);
        assert_eq!(result.error_message.as_deref(), Some("routing cancelled"));
    }

    #[tokio::test]
    async fn test_permit_timeout_yields_failed_result() {
        let engine = ContentRoutingEngine::new(ContentRoutingConfig {
            max_concurrent_routing: 1,
            routing_timeout_ms: 20,
            ..quiet_config()
        });
        let _held = engine.semaphore.acquire().await.expect("test: permit");
        let result = engine.route_content(&industry("c"), None).await;
        assert!(!result.success);
        assert!(result
            .error_message
            .as_deref()
            .unwrap_or_default()
            .contains("timed out"));
    }

    #[tokio::test]
    async fn test_track_destination_load_counts_primary() {
        let engine = ContentRoutingEngine::new(ContentRoutingConfig {
            track_destination_load: true,
            cache_routing_decisions: false,
            ..quiet_config()
        });
        engine.route_content(&industry("a"), None).await;
        engine.route_content(&industry("b"), None).await;
        assert_eq!(
            engine.load_balancer().destination_load(RoutingDestination::UserFeed),
            2
        );
    }

    #[tokio::test]
    async fn test_destination_load_untouched_by_default() {
        let engine = ContentRoutingEngine::new(quiet_config());
        engine.route_content(&industry("a"), None).await;
        assert_eq!(
            engine.load_balancer().destination_load(RoutingDestination::UserFeed),
            0
        );
    }

    #[tokio::test]
    async fn test_unused_counters_stay_zero() {
        let engine = ContentRoutingEngine::new(quiet_config());
        let news = RoutingContent::new("n", ContentCategory::BreakingNews).with_quality(0.9);
        engine.route_content(&news, None).await;
        engine.route_content(&industry("d"), None).await;
        let c = engine.get_routing_metrics().counters;
        assert_eq!(c.rule_matches, 0);
        assert_eq!(c.default_routing_used, 0);
    }

    #[tokio::test]
    async fn test_user_context_lifecycle() {
        let engine = ContentRoutingEngine::new(quiet_config());
        engine.set_user_context(UserContext::new("u1").with_active_topics(["rust"]));
        engine.set_user_context(UserContext::new("u1").with_active_topics(["go"]));
        let ctx = engine.get_user_context("u1").expect("test: context");
        assert!(ctx.active_topics.contains("go"));
        assert_eq!(engine.get_routing_metrics().user_contexts, 1);
        assert!(engine.remove_user_context("u1").is_some());
        assert!(engine.get_user_context("u1").is_none());
    }

    #[tokio::test]
    async fn test_clear_cache_forces_recompute() {
        let engine = ContentRoutingEngine::new(quiet_config());
        let content = industry("c");
        engine.route_content(&content, None).await;
        engine.clear_cache();
        engine.route_content(&content, None).await;
        assert_eq!(engine.get_routing_metrics().counters.cache_misses, 2);
    }

    #[test]
    fn test_try_new_rejects_invalid_config() {
        let err = ContentRoutingEngine::try_new(ContentRoutingConfig {
            max_concurrent_routing: 0,
            ..ContentRoutingConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, RouterError::Config(ref msg) if msg.contains("max_concurrent_routing")));
    }

    #[test]
    fn test_group_by_category_first_seen_order() {
        let items = vec![
            RoutingContent::new("1", ContentCategory::Entertainment),
            RoutingContent::new("2", ContentCategory::BreakingNews),
            RoutingContent::new("3", ContentCategory::Entertainment),
        ];
        let groups = group_by_category(&items);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, ContentCategory::Entertainment);
        let ids: Vec<_> = groups[0].1.iter().map(|c| c.content_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn test_defer_non_urgent_skips_urgent() {
        let now = Utc::now();
        let make = |priority| RoutingDecision {
            content_id: "c".into(),
            destination: RoutingDestination::UserFeed,
            routing_priority: priority,
            reasoning: Vec::new(),
            confidence_score: 0.5,
            processing_delay_ms: 10,
            metadata: Default::default(),
            decision_timestamp: now,
        };
        let mut decisions = vec![make(RoutingPriority::Urgent), make(RoutingPriority::High)];
        assert_eq!(defer_non_urgent(&mut decisions), 1);
        assert_eq!(decisions[0].routing_priority, RoutingPriority::Urgent);
        assert_eq!(decisions[1].routing_priority, RoutingPriority::Deferred);
        assert_eq!(decisions[1].processing_delay_ms, 10 + CAPACITY_DEFERRAL_MS);
    }

    #[tokio::test]
    async fn test_engine_routes_from_spawned_tasks() {
        let engine = Arc::new(ContentRoutingEngine::new(quiet_config()));
        let mut handles = Vec::new();
        for i in 0..16 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                let content = industry(&format!("c-{i}"));
                engine.route_content(&content, Some("u")).await
            }));
        }
        for handle in handles {
            let result = handle.await.expect("test: join");
            assert!(result.success);
        }
        assert_eq!(engine.get_routing_metrics().counters.content_routed, 16);
    }

    #[tokio::test]
    async fn test_zero_concurrency_is_clamped_to_one_permit() {
        let engine = ContentRoutingEngine::new(ContentRoutingConfig {
            max_concurrent_routing: 0,
            routing_timeout_ms: 50,
            ..quiet_config()
        });
        assert_eq!(engine.semaphore.available_permits(), 1);
        assert!(engine.route_content(&industry("c"), None).await.success);
    }

    #[tokio::test]
    async fn test_oversized_concurrency_is_clamped_without_panicking() {
        let engine = ContentRoutingEngine::new(ContentRoutingConfig {
            max_concurrent_routing: usize::MAX,
            ..quiet_config()
        });
        assert_eq!(engine.semaphore.available_permits(), Semaphore::MAX_PERMITS);
        assert!(engine.route_content(&industry("c"), None).await.success);
    }

    #[tokio::test]
    async fn test_delivery_windows_stay_bounded_without_load_balancing() {
        let engine = ContentRoutingEngine::new(ContentRoutingConfig {
            enable_load_balancing: false,
            cache_routing_decisions: false,
            ..quiet_config()
        });
        let stale = Utc::now() - ChronoDuration::hours(2);
        for _ in 0..200 {
            engine.load_balancer().record_user_delivery_at("u", stale);
        }
        for i in 0..20 {
            engine.route_content(&industry(&format!("c-{i}")), Some("u")).await;
        }
        assert_eq!(engine.load_balancer().raw_window_len("u"), Some(20));

        for i in 0..30 {
            engine
                .load_balancer()
                .record_user_delivery_at(&format!("gone-{i}"), stale);
        }
        assert_eq!(engine.get_routing_metrics().tracked_users, 31);
        assert_eq!(engine.purge_idle_users(), 30);
        assert_eq!(engine.get_routing_metrics().tracked_users, 1);
    }
}
