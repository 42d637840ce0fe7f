//! Multi-factor priority scoring.
//!
//! [`PriorityCalculator`] folds quality, urgency, per-user relevance and
//! freshness into a single confidence value and maps it onto a
//! [`RoutingPriority`]. Pure: no I/O, no shared state, never fails.

use chrono::{DateTime, Utc};

use crate::types::{RoutingContent, RoutingPriority, UserContext};

const QUALITY_WEIGHT: f64 = 0.25;
const URGENCY_WEIGHT: f64 = 0.35;
const RELEVANCE_WEIGHT: f64 = 0.25;
const FRESHNESS_WEIGHT: f64 = 0.15;

/// Content older than this contributes no freshness.
const FRESHNESS_HORIZON_HOURS: f64 = 24.0;

const NORMAL_CUTOFF: f64 = 0.5;
const LOW_CUTOFF: f64 = 0.3;

/// Priority calculator with configurable urgent/high cut points.
///
/// # Panics
///
/// This type and its methods never panic.
#[derive(Debug, Clone, PartialEq)]
pub struct PriorityCalculator {
    urgent_threshold: f64,
    high_threshold: f64,
}

impl PriorityCalculator {
    /// Create a calculator. Scores at or above `urgent_threshold` map to
    /// `Urgent`, at or above `high_threshold` to `High`.
    pub fn new(urgent_threshold: f64, high_threshold: f64) -> Self {
        Self {
            urgent_threshold,
            high_threshold,
        }
    }

    /// Score `content` for an optional reader at the current time.
    ///
    /// # Returns
    ///
    /// `(priority, confidence)`. Confidence is nominally in `[0.0, 1.0]`;
    /// out-of-range input scores propagate unchecked.
    pub fn calculate_priority(
        &self,
        content: &RoutingContent,
        user_context: Option<&UserContext>,
    ) -> (RoutingPriority, f64) {
        self.calculate_priority_at(content, user_context, Utc::now())
    }

    /// Same as [`Self::calculate_priority`] with an explicit clock.
    pub fn calculate_priority_at(
        &self,
        content: &RoutingContent,
        user_context: Option<&UserContext>,
        now: DateTime<Utc>,
    ) -> (RoutingPriority, f64) {
        let mut score = content.quality_score * QUALITY_WEIGHT;
        score += content.urgency_score * URGENCY_WEIGHT;

        if let Some(relevance) =
            user_context.and_then(|ctx| content.user_relevance_scores.get(&ctx.user_id))
        {
            score += relevance * RELEVANCE_WEIGHT;
        }

        score += freshness(content, now) * FRESHNESS_WEIGHT;

        (self.priority_for(score), score)
    }

    /// Map a confidence value onto a priority tag.
    pub fn priority_for(&self, score: f64) -> RoutingPriority {
        if score >= self.urgent_threshold {
            RoutingPriority::Urgent
        } else if score >= self.high_threshold {
            RoutingPriority::High
        } else if score >= NORMAL_CUTOFF {
            RoutingPriority::Normal
        } else if score >= LOW_CUTOFF {
            RoutingPriority::Low
        } else {
            RoutingPriority::Deferred
        }
    }
}

/// Linear decay from 1.0 at creation to 0.0 after 24 hours.
fn freshness(content: &RoutingContent, now: DateTime<Utc>) -> f64 {
    let age = content.age_hours(now);
    (1.0 - age / FRESHNESS_HORIZON_HOURS).clamp(0.0, 1.0)
}
