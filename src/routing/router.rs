//! Rule-driven content router.
//!
//! The [`IntelligentRouter`] evaluates its active [`RoutingRule`]s in
//! descending priority order (insertion order breaks ties) and turns every
//! match into a [`RoutingDecision`]. When nothing matches, a per-category
//! default applies. A topic → destination map can append extra decisions.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, info};

use super::rules::{default_rules, RoutingRule};
use crate::types::{
    ContentCategory, RoutingContent, RoutingDecision, RoutingDestination, RoutingPriority,
    UserContext,
};
use crate::RouterError;

const RULE_CONFIDENCE: f64 = 0.9;
const DEFAULT_CONFIDENCE: f64 = 0.6;
const TOPIC_CONFIDENCE: f64 = 0.5;

#[derive(Debug)]
struct RuleSet {
    /// `(insertion sequence, rule)`, sorted by priority desc then sequence asc.
    entries: Vec<(u64, RoutingRule)>,
    next_seq: u64,
}

impl RuleSet {
    fn insert(&mut self, rule: RoutingRule) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push((seq, rule));
        self.entries
            .sort_by(|(sa, a), (sb, b)| b.priority.cmp(&a.priority).then(sa.cmp(sb)));
    }
}

/// Prioritised rule evaluator with category defaults.
///
/// Thread-safe: rules and topic routes sit behind `RwLock`s; routing only
/// takes read locks.
///
/// # Panics
///
/// This type and its methods never panic.
#[derive(Debug)]
pub struct IntelligentRouter {
    rules: RwLock<RuleSet>,
    topic_routes: RwLock<HashMap<String, Vec<RoutingDestination>>>,
}

impl Default for IntelligentRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl IntelligentRouter {
    /// Router preloaded with [`default_rules`].
    pub fn new() -> Self {
        let router = Self::empty();
        {
            let mut set = router.rules.write();
            for rule in default_rules() {
                set.insert(rule);
            }
        }
        router
    }

    /// Router with no rules; every item takes its category default.
    pub fn empty() -> Self {
        Self {
            rules: RwLock::new(RuleSet {
                entries: Vec::new(),
                next_seq: 0,
            }),
            topic_routes: RwLock::new(HashMap::new()),
        }
    }

    /// Add a rule.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::DuplicateRule`] if a rule with the same id exists.
    pub fn add_rule(&self, rule: RoutingRule) -> Result<(), RouterError> {
        let mut set = self.rules.write();
        if set.entries.iter().any(|(_, r)| r.rule_id == rule.rule_id) {
            return Err(RouterError::DuplicateRule(rule.rule_id));
        }
        info!(
            rule_id = %rule.rule_id,
            name = %rule.name,
            priority = rule.priority,
            "routing rule added"
        );
        set.insert(rule);
        Ok(())
    }

    /// Deactivate a rule. Returns `false` if no rule has that id.
    pub fn deactivate_rule(&self, rule_id: &str) -> bool {
        let mut set = self.rules.write();
        match set.entries.iter_mut().find(|(_, r)| r.rule_id == rule_id) {
            Some((_, rule)) => {
                rule.is_active = false;
                info!(rule_id = rule_id, "routing rule deactivated");
                true
            }
            None => false,
        }
    }

    /// Snapshot of all rules in evaluation order.
    pub fn rules(&self) -> Vec<RoutingRule> {
        self.rules
            .read()
            .entries
            .iter()
            .map(|(_, r)| r.clone())
            .collect()
    }

    /// Number of active rules.
    pub fn active_rule_count(&self) -> usize {
        self.rules
            .read()
            .entries
            .iter()
            .filter(|(_, r)| r.is_active)
            .count()
    }

    /// Number of rules, active or not.
    pub fn rule_count(&self) -> usize {
        self.rules.read().entries.len()
    }

    /// Register an extra destination for content tagged with `topic`.
    pub fn add_topic_route(&self, topic: impl Into<String>, destination: RoutingDestination) {
        let topic = topic.into();
        let mut routes = self.topic_routes.write();
        let destinations = routes.entry(topic.clone()).or_default();
        if !destinations.contains(&destination) {
            destinations.push(destination);
            debug!(topic = %topic, destination = %destination, "topic route added");
        }
    }

    /// Route `content` at the current time.
    pub fn route_content(
        &self,
        content: &RoutingContent,
        user_context: Option<&UserContext>,
    ) -> Vec<RoutingDecision> {
        self.route_content_at(content, user_context, Utc::now())
    }

    /// Route `content` with an explicit clock.
    ///
    /// Never returns an empty list: the category default applies when no
    /// rule matches.
    pub fn route_content_at(
        &self,
        content: &RoutingContent,
        user_context: Option<&UserContext>,
        now: DateTime<Utc>,
    ) -> Vec<RoutingDecision> {
        let mut decisions = Vec::new();
        let mut exclusive_hit = false;

        {
            let set = self.rules.read();
            for (_, rule) in set.entries.iter().filter(|(_, r)| r.is_active) {
                if !rule.matches(content, user_context, now) {
                    continue;
                }
                debug!(
                    content_id = %content.content_id,
                    rule_id = %rule.rule_id,
                    exclusive = rule.actions.exclusive,
                    "routing rule matched"
                );
                decisions.push(decision_from_rule(content, rule, now));
                if rule.actions.exclusive {
                    exclusive_hit = true;
                    break;
                }
            }
        }

        if decisions.is_empty() {
            decisions.push(default_decision(content, now));
        }

        if !exclusive_hit {
            self.append_topic_routes(content, &mut decisions, now);
        }

        decisions
    }

    fn append_topic_routes(
        &self,
        content: &RoutingContent,
        decisions: &mut Vec<RoutingDecision>,
        now: DateTime<Utc>,
    ) {
        let routes = self.topic_routes.read();
        if routes.is_empty() {
            return;
        }
        for topic in &content.topics {
            let Some(destinations) = routes.get(topic) else {
                continue;
            };
            for &destination in destinations {
                if decisions.iter().any(|d| d.destination == destination) {
                    continue;
                }
                let mut metadata = HashMap::new();
                metadata.insert("routing_type".to_string(), "topic".to_string());
                metadata.insert("topic".to_string(), topic.clone());
                decisions.push(RoutingDecision {
                    content_id: content.content_id.clone(),
                    destination,
                    routing_priority: RoutingPriority::Normal,
                    reasoning: vec![format!("Topic routing: {topic}")],
                    confidence_score: TOPIC_CONFIDENCE,
                    processing_delay_ms: 0,
                    metadata,
                    decision_timestamp: now,
                });
            }
        }
    }
}

fn decision_from_rule(
    content: &RoutingContent,
    rule: &RoutingRule,
    now: DateTime<Utc>,
) -> RoutingDecision {
    let mut metadata = HashMap::new();
    metadata.insert("routing_type".to_string(), "rule".to_string());
    metadata.insert("rule_id".to_string(), rule.rule_id.clone());
    metadata.insert("rule_priority".to_string(), rule.priority.to_string());

    RoutingDecision {
        content_id: content.content_id.clone(),
        destination: rule.actions.destination,
        routing_priority: rule.actions.priority,
        reasoning: vec![format!("Matched routing rule: {}", rule.name)],
        confidence_score: RULE_CONFIDENCE,
        processing_delay_ms: rule.actions.delay_ms,
        metadata,
        decision_timestamp: now,
    }
}

fn default_decision(content: &RoutingContent, now: DateTime<Utc>) -> RoutingDecision {
    let (destination, priority, reason) = match content.category {
        ContentCategory::BreakingNews => (
            RoutingDestination::RealTimeStream,
            RoutingPriority::Urgent,
            "Default breaking news routing",
        ),
        ContentCategory::ResearchPaper => (
            RoutingDestination::EmailDigest,
            RoutingPriority::Normal,
            "Default research paper routing",
        ),
        _ => (
            RoutingDestination::UserFeed,
            RoutingPriority::Normal,
            "Default user feed routing",
        ),
    };

    let mut metadata = HashMap::new();
    metadata.insert("routing_type".to_string(), "default".to_string());

    RoutingDecision {
        content_id: content.content_id.clone(),
        destination,
        routing_priority: priority,
        reasoning: vec![reason.to_string()],
        confidence_score: DEFAULT_CONFIDENCE,
        processing_delay_ms: 0,
        metadata,
        decision_timestamp: now,
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
