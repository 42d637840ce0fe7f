//! # Stage: Routing Intelligence
//!
//! ## Responsibility
//! Turn a scored content item into an ordered list of routing decisions:
//! prioritised rule evaluation with category defaults, a blended priority
//! score, and per-user / per-destination load accounting.
//!
//! ## Guarantees
//! - Deterministic: the same content, context, clock and rule set always
//!   produce the same decisions in the same order
//! - Thread-safe: rules and load windows use interior locking and are safe
//!   under concurrent routing calls
//! - Non-blocking: no routing path performs I/O or awaits
//!
//! ## NOT Responsible For
//! - Caching, delay shaping or deferral (that belongs to `engine`)
//! - Delivering content to destinations

pub mod load_balancer;
pub mod priority;
pub mod router;
pub mod rules;

pub use load_balancer::LoadBalancer;
pub use priority::PriorityCalculator;
pub use router::IntelligentRouter;
pub use rules::{default_rules, RoutingRule, RuleAction, RuleCondition};
