//! Intelligent delay shaping.
//!
//! Computes the minimum sensible delivery delay for a decision from its
//! destination, the content category and the hour of day (UTC), clamped to
//! the configured ceiling. The engine only ever raises a decision's delay.

use chrono::{DateTime, Timelike, Utc};

use crate::types::{ContentCategory, RoutingContent, RoutingDecision, RoutingDestination};

const MINUTE_MS: u64 = 60_000;

/// Base delay for digest destinations.
pub const EMAIL_DIGEST_DELAY_MS: u64 = 30 * MINUTE_MS;
/// Floor for research content.
pub const RESEARCH_PAPER_DELAY_MS: u64 = 15 * MINUTE_MS;
/// Floor for entertainment during working hours.
pub const WORK_HOURS_ENTERTAINMENT_DELAY_MS: u64 = 120 * MINUTE_MS;

/// Working hours in UTC, `[start, end)`.
const WORK_HOURS: std::ops::Range<u32> = 9..17;

/// Optimal delay for `decision`, at most `max_delay_ms`.
pub fn optimal_delay_ms(
    decision: &RoutingDecision,
    content: &RoutingContent,
    now: DateTime<Utc>,
    max_delay_ms: u64,
) -> u64 {
    let mut delay = 0;

    if decision.destination == RoutingDestination::EmailDigest {
        delay = EMAIL_DIGEST_DELAY_MS;
    }

    match content.category {
        ContentCategory::ResearchPaper => delay = delay.max(RESEARCH_PAPER_DELAY_MS),
        ContentCategory::Entertainment if WORK_HOURS.contains(&now.hour()) => {
            delay = delay.max(WORK_HOURS_ENTERTAINMENT_DELAY_MS)
        }
        _ => {}
    }

    delay.min(max_delay_ms)
}

/// Raise `decision`'s delay to the optimum if it is currently lower.
///
/// Returns `true` when the decision changed.
pub fn apply_optimal_delay(
    decision: &mut RoutingDecision,
    content: &RoutingContent,
    now: DateTime<Utc>,
    max_delay_ms: u64,
) -> bool {
    let optimal = optimal_delay_ms(decision, content, now, max_delay_ms);
    if optimal <= decision.processing_delay_ms {
        return false;
    }
    decision.processing_delay_ms = optimal;
    decision
        .reasoning
        .push(format!("Applied intelligent delay: {optimal}ms"));
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RoutingPriority;
    use chrono::TimeZone;
    use std::collections::HashMap;

    const NO_CAP: u64 = u64::MAX;

    fn at_hour(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, hour, 30, 0)
            .single()
            .unwrap_or_else(|| std::panic::panic_any("test: invalid timestamp"))
    }

    fn decision(destination: RoutingDestination, delay: u64) -> RoutingDecision {
        RoutingDecision {
            content_id: "c".into(),
            destination,
            routing_priority: RoutingPriority::Normal,
            reasoning: vec!["seed".into()],
            confidence_score: 0.5,
            processing_delay_ms: delay,
            metadata: HashMap::new(),
            decision_timestamp: at_hour(0),
        }
    }

    #[test]
    fn test_email_digest_base_delay() {
        let content = RoutingContent::new("c", ContentCategory::IndustryUpdate);
        let d = decision(RoutingDestination::EmailDigest, 0);
        assert_eq!(optimal_delay_ms(&d, &content, at_hour(3), NO_CAP), EMAIL_DIGEST_DELAY_MS);
    }

    #[test]
    fn test_research_paper_floor_applies_to_any_destination() {
        let content = RoutingContent::new("c", ContentCategory::ResearchPaper);
        let d = decision(RoutingDestination::UserFeed, 0);
        assert_eq!(optimal_delay_ms(&d, &content, at_hour(3), NO_CAP), RESEARCH_PAPER_DELAY_MS);
        let digest = decision(RoutingDestination::EmailDigest, 0);
        assert_eq!(
            optimal_delay_ms(&digest, &content, at_hour(3), NO_CAP),
            EMAIL_DIGEST_DELAY_MS
        );
    }

    #[test]
    fn test_entertainment_delayed_only_during_work_hours() {
        let content = RoutingContent::new("c", ContentCategory::Entertainment);
        let d = decision(RoutingDestination::UserFeed, 0);
        assert_eq!(
            optimal_delay_ms(&d, &content, at_hour(9), NO_CAP),
            WORK_HOURS_ENTERTAINMENT_DELAY_MS
        );
        assert_eq!(
            optimal_delay_ms(&d, &content, at_hour(16), NO_CAP),
            WORK_HOURS_ENTERTAINMENT_DELAY_MS
        );
        assert_eq!(optimal_delay_ms(&d, &content, at_hour(17), NO_CAP), 0);
        assert_eq!(optimal_delay_ms(&d, &content, at_hour(8), NO_CAP), 0);
    }

    #[test]
    fn test_delay_clamped_to_ceiling() {
        let content = RoutingContent::new("c", ContentCategory::Entertainment);
        let d = decision(RoutingDestination::UserFeed, 0);
        assert_eq!(optimal_delay_ms(&d, &content, at_hour(12), 60 * MINUTE_MS), 60 * MINUTE_MS);
    }

    #[test]
    fn test_apply_only_raises_delay() {
        let content = RoutingContent::new("c", ContentCategory::IndustryUpdate);

        let mut low = decision(RoutingDestination::EmailDigest, 1_000);
        assert!(apply_optimal_delay(&mut low, &content, at_hour(1), NO_CAP));
        assert_eq!(low.processing_delay_ms, EMAIL_DIGEST_DELAY_MS);
        assert_eq!(low.reasoning.len(), 2);

        let mut high = decision(RoutingDestination::EmailDigest, 10 * EMAIL_DIGEST_DELAY_MS);
        assert!(!apply_optimal_delay(&mut high, &content, at_hour(1), NO_CAP));
        assert_eq!(high.processing_delay_ms, 10 * EMAIL_DIGEST_DELAY_MS);
        assert_eq!(high.reasoning.len(), 1);
    }
}
