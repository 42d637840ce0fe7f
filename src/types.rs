//! Core routing data model.
//!
//! Content items arrive already scored by an upstream analysis service; this
//! module only describes them. Everything here is plain data: the types are
//! cloneable, (de)serialisable via serde, and carry no interior mutability.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use thiserror::Error;

/// Editorial category assigned to a content item by the upstream scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentCategory {
    /// Time-critical news.
    BreakingNews,
    /// Long-form research output.
    ResearchPaper,
    /// Industry or market update.
    IndustryUpdate,
    /// Matches an explicit interest of the reader.
    PersonalInterest,
    /// Currently trending topic.
    TrendingTopic,
    /// Tutorials, explainers, courses.
    Educational,
    /// Entertainment content.
    Entertainment,
}

impl ContentCategory {
    /// Stable snake_case label used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BreakingNews => "breaking_news",
            Self::ResearchPaper => "research_paper",
            Self::IndustryUpdate => "industry_update",
            Self::PersonalInterest => "personal_interest",
            Self::TrendingTopic => "trending_topic",
            Self::Educational => "educational",
            Self::Entertainment => "entertainment",
        }
    }
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Downstream channel that physically delivers content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingDestination {
    /// The reader's main feed.
    UserFeed,
    /// Push / in-app notification.
    NotificationSystem,
    /// Periodic email digest.
    EmailDigest,
    /// Cold storage; not surfaced to the reader.
    Archive,
    /// Expedited queue ahead of normal feed traffic.
    PriorityQueue,
    /// Live stream for time-critical items.
    RealTimeStream,
    /// Offline batch pipeline.
    BatchProcessing,
}

impl RoutingDestination {
    /// Every destination, in declaration order.
    pub const ALL: [RoutingDestination; 7] = [
        Self::UserFeed,
        Self::NotificationSystem,
        Self::EmailDigest,
        Self::Archive,
        Self::PriorityQueue,
        Self::RealTimeStream,
        Self::BatchProcessing,
    ];

    /// Stable snake_case label used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserFeed => "user_feed",
            Self::NotificationSystem => "notification_system",
            Self::EmailDigest => "email_digest",
            Self::Archive => "archive",
            Self::PriorityQueue => "priority_queue",
            Self::RealTimeStream => "real_time_stream",
            Self::BatchProcessing => "batch_processing",
        }
    }
}

impl fmt::Display for RoutingDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery priority attached to a routing decision.
///
/// Ordered so that `Urgent > High > Normal > Low > Deferred`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingPriority {
    /// Deliver immediately.
    Urgent,
    /// Deliver ahead of normal traffic.
    High,
    /// Default priority.
    Normal,
    /// Deliver when convenient.
    Low,
    /// Hold back; deliver after the configured delay.
    Deferred,
}

impl RoutingPriority {
    fn rank(&self) -> u8 {
        match self {
            Self::Urgent => 4,
            Self::High => 3,
            Self::Normal => 2,
            Self::Low => 1,
            Self::Deferred => 0,
        }
    }

    /// Stable snake_case label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::High => "high",
            Self::Normal => "normal",
            Self::Low => "low",
            Self::Deferred => "deferred",
        }
    }
}

impl PartialOrd for RoutingPriority {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RoutingPriority {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for RoutingPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boundary violations detected by [`RoutingContent::validate`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContentError {
    /// `content_id` is empty or whitespace.
    #[error("content_id must not be empty")]
    EmptyContentId,

    /// A score field is outside `[0.0, 1.0]` or not finite.
    #[error("{field} must be in [0.0, 1.0], got {value}")]
    ScoreOutOfRange {
        /// Name of the offending field.
        field: String,
        /// The rejected value.
        value: f64,
    },

    /// `created_timestamp` lies in the future.
    #[error("created_timestamp {0} is in the future")]
    FutureTimestamp(DateTime<Utc>),
}

/// A scored content item submitted for routing.
///
/// Produced by the upstream scoring service and read-only to the router.
/// Scores are nominally in `[0.0, 1.0]` but are not checked unless the
/// engine runs with `validate_content = true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingContent {
    /// Unique identifier of the item.
    pub content_id: String,
    /// Free-form media type (e.g. `"article"`, `"video"`).
    pub content_type: String,
    /// Editorial category.
    pub category: ContentCategory,
    /// Topic tags.
    pub topics: BTreeSet<String>,
    /// Upstream quality score.
    pub quality_score: f64,
    /// Upstream urgency score.
    pub urgency_score: f64,
    /// Per-user relevance, keyed by user id.
    pub user_relevance_scores: HashMap<String, f64>,
    /// Originating source.
    pub source: String,
    /// Length of the body in characters.
    pub content_length: usize,
    /// When the item was created.
    pub created_timestamp: DateTime<Utc>,
    /// Optional hard expiry.
    pub expiry_timestamp: Option<DateTime<Utc>>,
    /// Arbitrary string metadata.
    pub metadata: HashMap<String, String>,
}

impl RoutingContent {
    /// Create an item created "now" with neutral scores and no topics.
    pub fn new(content_id: impl Into<String>, category: ContentCategory) -> Self {
        Self {
            content_id: content_id.into(),
            content_type: "article".to_string(),
            category,
            topics: BTreeSet::new(),
            quality_score: 0.5,
            urgency_score: 0.5,
            user_relevance_scores: HashMap::new(),
            source: "unknown".to_string(),
            content_length: 0,
            created_timestamp: Utc::now(),
            expiry_timestamp: None,
            metadata: HashMap::new(),
        }
    }

    /// Set the quality score.
    pub fn with_quality(mut self, quality_score: f64) -> Self {
        self.quality_score = quality_score;
        self
    }

    /// Set the urgency score.
    pub fn with_urgency(mut self, urgency_score: f64) -> Self {
        self.urgency_score = urgency_score;
        self
    }

    /// Add topic tags.
    pub fn with_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics.extend(topics.into_iter().map(Into::into));
        self
    }

    /// Record a relevance score for one user.
    pub fn with_relevance(mut self, user_id: impl Into<String>, score: f64) -> Self {
        self.user_relevance_scores.insert(user_id.into(), score);
        self
    }

    /// Backdate the item so that it is `age` old relative to now.
    pub fn with_age(mut self, age: Duration) -> Self {
        self.created_timestamp = Utc::now() - age;
        self
    }

    /// Set the creation timestamp explicitly.
    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created_timestamp = created;
        self
    }

    /// Set the source label.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Age of the item in fractional hours at `now`. Negative for future timestamps.
    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        (now - self.created_timestamp).num_milliseconds() as f64 / 3_600_000.0
    }

    /// Check score ranges, id and timestamp sanity.
    ///
    /// Returns the first violation found.
    ///
    /// # Errors
    ///
    /// Returns a [`ContentError`] describing the violated boundary.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), ContentError> {
        if self.content_id.trim().is_empty() {
            return Err(ContentError::EmptyContentId);
        }
        check_unit("quality_score", self.quality_score)?;
        check_unit("urgency_score", self.urgency_score)?;
        for (user, score) in &self.user_relevance_scores {
            check_unit(&format!("user_relevance_scores[{user}]"), *score)?;
        }
        if self.created_timestamp > now {
            return Err(ContentError::FutureTimestamp(self.created_timestamp));
        }
        Ok(())
    }
}

fn check_unit(field: &str, value: f64) -> Result<(), ContentError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ContentError::ScoreOutOfRange {
            field: field.to_string(),
            value,
        })
    }
}

/// Per-user context supplied by the user-profile service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    /// User identifier.
    pub user_id: String,
    /// Topic → preference weight.
    pub preferences: HashMap<String, f64>,
    /// Topics the user is actively following.
    pub active_topics: BTreeSet<String>,
    /// Channel name → opted in.
    pub notification_preferences: HashMap<String, bool>,
    /// Current load reported by the profile service.
    pub current_load: f64,
    /// IANA timezone name.
    pub timezone: String,
    /// Last time the user was seen.
    pub last_activity: DateTime<Utc>,
}

impl UserContext {
    /// Create a context with no preferences, UTC timezone, active now.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            preferences: HashMap::new(),
            active_topics: BTreeSet::new(),
            notification_preferences: HashMap::new(),
            current_load: 0.0,
            timezone: "UTC".to_string(),
            last_activity: Utc::now(),
        }
    }

    /// Add actively followed topics.
    pub fn with_active_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.active_topics.extend(topics.into_iter().map(Into::into));
        self
    }

    /// Set a topic preference weight.
    pub fn with_preference(mut self, topic: impl Into<String>, weight: f64) -> Self {
        self.preferences.insert(topic.into(), weight);
        self
    }
}

/// A single routing decision: one destination for one content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Item this decision applies to.
    pub content_id: String,
    /// Target channel.
    pub destination: RoutingDestination,
    /// Delivery priority.
    pub routing_priority: RoutingPriority,
    /// Ordered audit trail.
    pub reasoning: Vec<String>,
    /// Confidence in this decision.
    pub confidence_score: f64,
    /// How long the delivery collaborator should wait before pushing.
    pub processing_delay_ms: u64,
    /// Free-form annotations (e.g. `rule_id`).
    pub metadata: HashMap<String, String>,
    /// When the decision was produced.
    pub decision_timestamp: DateTime<Utc>,
}

/// The externally visible outcome of routing one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingResult {
    /// Item that was routed.
    pub content_id: String,
    /// Every decision, in router order.
    pub decisions: Vec<RoutingDecision>,
    /// Destination of the first decision, `UserFeed` when there is none.
    pub primary_destination: RoutingDestination,
    /// Destinations of the following decisions, bounded by `max_routing_destinations - 1`.
    pub fallback_destinations: Vec<RoutingDestination>,
    /// Wall time spent computing the result.
    pub processing_time_ms: f64,
    /// Provenance label; not a dispatch switch.
    pub strategy_used: String,
    /// `false` when routing failed; see `error_message`.
    pub success: bool,
    /// Human-readable failure reason.
    pub error_message: Option<String>,
    /// When the result was produced.
    pub processed_timestamp: DateTime<Utc>,
}

impl RoutingResult {
    /// Build a failed result carrying `error`.
    pub fn failed(
        content_id: impl Into<String>,
        strategy_used: impl Into<String>,
        error: impl Into<String>,
        processing_time_ms: f64,
    ) -> Self {
        Self {
            content_id: content_id.into(),
            decisions: Vec::new(),
            primary_destination: RoutingDestination::UserFeed,
            fallback_destinations: Vec::new(),
            processing_time_ms,
            strategy_used: strategy_used.into(),
            success: false,
            error_message: Some(error.into()),
            processed_timestamp: Utc::now(),
        }
    }

    /// First decision, if any.
    pub fn primary_decision(&self) -> Option<&RoutingDecision> {
        self.decisions.first()
    }
}
