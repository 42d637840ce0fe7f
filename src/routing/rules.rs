//! Routing rules: typed predicates plus the action a match produces.
//!
//! A [`RoutingRule`] matches when every one of its [`RuleCondition`]s holds.
//! Rules are immutable once built; the router can only deactivate them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ContentCategory, RoutingContent, RoutingDestination, RoutingPriority, UserContext};

/// Identifier of the built-in breaking-news rule.
pub const BREAKING_NEWS_RULE_ID: &str = "breaking_news_priority";
/// Identifier of the built-in research digest rule.
pub const RESEARCH_DIGEST_RULE_ID: &str = "research_paper_digest";
/// Identifier of the built-in personal-interest notification rule.
pub const PERSONAL_INTEREST_RULE_ID: &str = "personal_interest_notification";
/// Identifier of the built-in stale-content archive rule.
pub const ARCHIVE_STALE_RULE_ID: &str = "archive_stale_content";

const THIRTY_MINUTES_MS: u64 = 30 * 60 * 1000;

/// One predicate over content, reader and clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleCondition {
    /// Content category is one of the listed categories.
    CategoryIn {
        /// Accepted categories.
        categories: Vec<ContentCategory>,
    },
    /// `quality_score >= min`.
    MinQuality {
        /// Inclusive lower bound.
        min: f64,
    },
    /// Content shares at least one topic with the list.
    RequiredTopics {
        /// Topics of interest.
        topics: Vec<String>,
    },
    /// Content shares at least one topic with the reader's active topics.
    ///
    /// Holds vacuously when no reader context is supplied.
    UserActiveTopics,
    /// Content is at most `hours` old.
    MaxAgeHours {
        /// Inclusive upper bound on age.
        hours: f64,
    },
    /// Content is strictly older than `hours`.
    MinAgeHours {
        /// Exclusive lower bound on age.
        hours: f64,
    },
}

impl RuleCondition {
    /// Evaluate this predicate.
    pub fn matches(
        &self,
        content: &RoutingContent,
        user_context: Option<&UserContext>,
        now: DateTime<Utc>,
    ) -> bool {
        match self {
            Self::CategoryIn { categories } => categories.contains(&content.category),
            Self::MinQuality { min } => content.quality_score >= *min,
            Self::RequiredTopics { topics } => topics.iter().any(|t| content.topics.contains(t)),
            Self::UserActiveTopics => match user_context {
                Some(ctx) => !content.topics.is_disjoint(&ctx.active_topics),
                None => true,
            },
            Self::MaxAgeHours { hours } => content.age_hours(now) <= *hours,
            Self::MinAgeHours { hours } => content.age_hours(now) > *hours,
        }
    }
}

/// What a matching rule emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleAction {
    /// Target channel.
    pub destination: RoutingDestination,
    /// Delivery priority.
    pub priority: RoutingPriority,
    /// Delay before delivery.
    #[serde(default)]
    pub delay_ms: u64,
    /// Stop evaluating lower-priority rules after this one matches.
    #[serde(default)]
    pub exclusive: bool,
}

/// A prioritised, immutable routing rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingRule {
    /// Unique id.
    pub rule_id: String,
    /// Human-readable name, quoted in decision reasoning.
    pub name: String,
    /// All must hold for the rule to match. Empty matches everything.
    pub conditions: Vec<RuleCondition>,
    /// Emitted on match.
    pub actions: RuleAction,
    /// Higher is evaluated first.
    pub priority: i32,
    /// Inactive rules are skipped.
    pub is_active: bool,
    /// Who created the rule.
    pub created_by: String,
    /// When the rule was created.
    pub created_timestamp: DateTime<Utc>,
}

impl RoutingRule {
    /// Build an active rule created by `"system"` now.
    pub fn new(
        rule_id: impl Into<String>,
        name: impl Into<String>,
        conditions: Vec<RuleCondition>,
        actions: RuleAction,
        priority: i32,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            name: name.into(),
            conditions,
            actions,
            priority,
            is_active: true,
            created_by: "system".to_string(),
            created_timestamp: Utc::now(),
        }
    }

    /// Override the creator label.
    pub fn created_by(mut self, creator: impl Into<String>) -> Self {
        self.created_by = creator.into();
        self
    }

    /// `true` when every condition holds.
    pub fn matches(
        &self,
        content: &RoutingContent,
        user_context: Option<&UserContext>,
        now: DateTime<Utc>,
    ) -> bool {
        self.conditions
            .iter()
            .all(|condition| condition.matches(content, user_context, now))
    }
}

/// The four rules every engine starts with.
pub fn default_rules() -> Vec<RoutingRule> {
    vec![
        RoutingRule::new(
            BREAKING_NEWS_RULE_ID,
            "Breaking News Priority Routing",
            vec![
                RuleCondition::CategoryIn {
                    categories: vec![ContentCategory::BreakingNews],
                },
                RuleCondition::MinQuality { min: 0.7 },
            ],
            RuleAction {
                destination: RoutingDestination::RealTimeStream,
                priority: RoutingPriority::Urgent,
                delay_ms: 0,
                exclusive: false,
            },
            100,
        ),
        RoutingRule::new(
            RESEARCH_DIGEST_RULE_ID,
            "Research Paper Digest Routing",
            vec![
                RuleCondition::CategoryIn {
                    categories: vec![ContentCategory::ResearchPaper],
                },
                RuleCondition::MinQuality { min: 0.8 },
            ],
            RuleAction {
                destination: RoutingDestination::EmailDigest,
                priority: RoutingPriority::High,
                delay_ms: THIRTY_MINUTES_MS,
                exclusive: false,
            },
            80,
        ),
        RoutingRule::new(
            PERSONAL_INTEREST_RULE_ID,
            "Personal Interest Notification",
            vec![
                RuleCondition::CategoryIn {
                    categories: vec![ContentCategory::PersonalInterest],
                },
                RuleCondition::UserActiveTopics,
            ],
            RuleAction {
                destination: RoutingDestination::NotificationSystem,
                priority: RoutingPriority::High,
                delay_ms: 0,
                exclusive: false,
            },
            90,
        ),
        RoutingRule::new(
            ARCHIVE_STALE_RULE_ID,
            "Archive Stale Content",
            vec![
                RuleCondition::MinQuality { min: 0.0 },
                RuleCondition::MinAgeHours { hours: 72.0 },
            ],
            RuleAction {
                destination: RoutingDestination::Archive,
                priority: RoutingPriority::Deferred,
                delay_ms: 0,
                exclusive: true,
            },
            10,
        ),
    ]
}
