//! Per-user admission control and per-destination load tracking.
//!
//! Users get a sliding 60-minute delivery window; destinations get a plain
//! signed load counter. Both maps are sharded via [`DashMap`], so every
//! operation takes `&self` and is safe under concurrent routing.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use tracing::{debug, warn};

use crate::types::RoutingDestination;

/// Length of the per-user delivery window.
pub const USER_WINDOW_MINUTES: i64 = 60;

/// Sliding-window capacity checks and least-loaded destination selection.
///
/// # Panics
///
/// This type and its methods never panic.
#[derive(Debug)]
pub struct LoadBalancer {
    max_user_content_per_hour: usize,
    user_windows: DashMap<String, VecDeque<DateTime<Utc>>>,
    destination_loads: DashMap<RoutingDestination, i64>,
}

impl LoadBalancer {
    /// Create a balancer admitting `max_user_content_per_hour` deliveries per user.
    pub fn new(max_user_content_per_hour: usize) -> Self {
        Self {
            max_user_content_per_hour,
            user_windows: DashMap::new(),
            destination_loads: DashMap::new(),
        }
    }

    /// `true` while the user has fewer than the hourly cap of deliveries in
    /// the trailing window. Prunes expired entries as a side effect.
    pub fn check_user_capacity(&self, user_id: &str) -> bool {
        self.check_user_capacity_at(user_id, Utc::now())
    }

    /// Same as [`Self::check_user_capacity`] with an explicit clock.
    pub fn check_user_capacity_at(&self, user_id: &str, now: DateTime<Utc>) -> bool {
        let live = self.live_deliveries(user_id, now);
        let has_capacity = live < self.max_user_content_per_hour;
        if !has_capacity {
            warn!(
                user_id = user_id,
                deliveries = live,
                limit = self.max_user_content_per_hour,
                "user delivery capacity exhausted"
            );
        }
        has_capacity
    }

    /// Record a delivery to `user_id` now.
    pub fn record_user_delivery(&self, user_id: &str) {
        self.record_user_delivery_at(user_id, Utc::now());
    }

    /// Record a delivery to `user_id` at `at`.
    pub fn record_user_delivery_at(&self, user_id: &str, at: DateTime<Utc>) {
        let mut window = self.user_windows.entry(user_id.to_string()).or_default();
        prune(&mut window, at);
        window.push_back(at);
        debug!(user_id = user_id, deliveries = window.len(), "user delivery recorded");
    }

    /// Deliveries currently inside the user's window (after pruning at `now`).
    pub fn user_delivery_count(&self, user_id: &str, now: DateTime<Utc>) -> usize {
        self.live_deliveries(user_id, now)
    }

    /// Prune every window at `now` and drop users left with none.
    ///
    /// Returns how many users were dropped.
    pub fn purge_idle_users_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.user_windows.len();
        self.user_windows.retain(|_, window| {
            prune(window, now);
            !window.is_empty()
        });
        before.saturating_sub(self.user_windows.len())
    }

    /// Prune `user_id`'s window at `now`, dropping it once empty.
    fn live_deliveries(&self, user_id: &str, now: DateTime<Utc>) -> usize {
        let Some(mut window) = self.user_windows.get_mut(user_id) else {
            return 0;
        };
        prune(&mut window, now);
        let live = window.len();
        drop(window);
        if live == 0 {
            self.user_windows.remove_if(user_id, |_, window| window.is_empty());
        }
        live
    }

    #[cfg(test)]
    pub(crate) fn raw_window_len(&self, user_id: &str) -> Option<usize> {
        self.user_windows.get(user_id).map(|w| w.len())
    }

    /// Forget every delivery recorded for `user_id`.
    pub fn reset_user(&self, user_id: &str) {
        self.user_windows.remove(user_id);
        debug!(user_id = user_id, "user delivery window reset");
    }

    /// Least-loaded candidate; the first candidate wins ties.
    ///
    /// Returns `None` for an empty candidate list.
    pub fn get_optimal_destination(
        &self,
        candidates: &[RoutingDestination],
    ) -> Option<RoutingDestination> {
        let mut best: Option<(RoutingDestination, i64)> = None;
        for &candidate in candidates {
            let load = self.destination_load(candidate);
            match best {
                Some((_, best_load)) if load >= best_load => {}
                _ => best = Some((candidate, load)),
            }
        }
        best.map(|(destination, _)| destination)
    }

    /// Add `delta` (possibly negative) to a destination's load counter.
    pub fn update_destination_load(&self, destination: RoutingDestination, delta: i64) {
        let mut load = self.destination_loads.entry(destination).or_insert(0);
        *load = load.saturating_add(delta);
        debug!(destination = %destination, load = *load, "destination load updated");
    }

    /// Current load counter for `destination` (0 if never touched).
    pub fn destination_load(&self, destination: RoutingDestination) -> i64 {
        self.destination_loads
            .get(&destination)
            .map(|load| *load)
            .unwrap_or(0)
    }

    /// Number of users with a delivery window.
    pub fn tracked_users(&self) -> usize {
        self.user_windows.len()
    }
}

fn prune(window: &mut VecDeque<DateTime<Utc>>, now: DateTime<Utc>) {
    let cutoff = now - Duration::minutes(USER_WINDOW_MINUTES);
    window.retain(|at| *at > cutoff);
}
