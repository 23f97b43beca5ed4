//! Per-model admission control over one-minute windows.
//!
//! Each model owns a three-slot ring indexed by `minute_epoch % 3`. A slot
//! whose recorded minute doesn't match the one being accessed is stale and
//! is reset in place, so windows older than two minutes are pruned in O(1)
//! without timestamp parsing or background sweeps.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;

use crate::types::RateLimit;

const SLOTS: usize = 3;

/// Counters for one model in one minute bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateWindow {
    pub minute_epoch: u64,
    pub request_count: u64,
    pub token_count: u64,
}

/// Minutes since the Unix epoch.
pub fn current_minute() -> u64 {
    (Utc::now().timestamp().max(0) as u64) / 60
}

/// Worker-local sliding-window counters.
///
/// Not coordinated across a fleet: each worker admits up to the configured
/// ceiling on its own.
#[derive(Default)]
pub struct RateLimiter {
    windows: Mutex<HashMap<String, [RateWindow; SLOTS]>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `model` is under `limit` in the current minute. `None` means unlimited.
    pub fn check(&self, model: &str, limit: Option<&RateLimit>) -> bool {
        self.check_at(model, limit, current_minute())
    }

    /// Record a completed call against the current minute.
    pub fn record(&self, model: &str, tokens: u64) {
        self.record_at(model, tokens, current_minute());
    }

    /// Counters for `model` in `minute`; zeroes if nothing was recorded.
    pub fn usage_at(&self, model: &str, minute: u64) -> RateWindow {
        let windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        windows
            .get(model)
            .map(|ring| ring[slot(minute)])
            .filter(|w| w.minute_epoch == minute)
            .unwrap_or(RateWindow {
                minute_epoch: minute,
                ..RateWindow::default()
            })
    }

    pub(crate) fn check_at(&self, model: &str, limit: Option<&RateLimit>, minute: u64) -> bool {
        let Some(limit) = limit else {
            return true;
        };
        let usage = self.usage_at(model, minute);
        let requests_ok = limit
            .requests_per_minute
            .is_none_or(|max| usage.request_count < max);
        let tokens_ok = limit
            .tokens_per_minute
            .is_none_or(|max| usage.token_count < max);
        requests_ok && tokens_ok
    }

    pub(crate) fn record_at(&self, model: &str, tokens: u64, minute: u64) {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let ring = windows.entry(model.to_string()).or_default();
        for window in ring.iter_mut() {
            if window.minute_epoch + 2 < minute {
                *window = RateWindow::default();
            }
        }
        let window = &mut ring[slot(minute)];
        if window.minute_epoch != minute {
            *window = RateWindow {
                minute_epoch: minute,
                ..RateWindow::default()
            };
        }
        window.request_count = window.request_count.saturating_add(1);
        window.token_count = window.token_count.saturating_add(tokens);
    }

    /// Live windows for `model`, oldest first.
    pub fn windows(&self, model: &str) -> Vec<RateWindow> {
        let windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let mut live: Vec<RateWindow> = windows
            .get(model)
            .map(|ring| {
                ring.iter()
                    .copied()
                    .filter(|w| w.request_count > 0)
                    .collect()
            })
            .unwrap_or_default();
        live.sort_by_key(|w| w.minute_epoch);
        live
    }
}

fn slot(minute: u64) -> usize {
    (minute % SLOTS as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rpm(n: u64) -> RateLimit {
        RateLimit {
            requests_per_minute: Some(n),
            tokens_per_minute: None,
        }
    }

    #[test]
    fn no_limit_means_unlimited() {
        let limiter = RateLimiter::new();
        for _ in 0..1_000 {
            limiter.record_at("m", 10, 100);
        }
        assert!(limiter.check_at("m", None, 100));
    }

    #[test]
    fn request_ceiling_rejects_the_next_request() {
        let limiter = RateLimiter::new();
        let limit = rpm(3);
        for _ in 0..3 {
            assert!(limiter.check_at("m", Some(&limit), 100));
            limiter.record_at("m", 0, 100);
        }
        assert!(!limiter.check_at("m", Some(&limit), 100));
        // Other models are unaffected.
        assert!(limiter.check_at("other", Some(&limit), 100));
    }

    #[test]
    fn token_ceiling_applies() {
        let limiter = RateLimiter::new();
        let limit = RateLimit {
            requests_per_minute: None,
            tokens_per_minute: Some(1_000),
        };
        limiter.record_at("m", 999, 100);
        assert!(limiter.check_at("m", Some(&limit), 100));
        limiter.record_at("m", 1, 100);
        assert!(!limiter.check_at("m", Some(&limit), 100));
    }

    #[test]
    fn new_minute_starts_fresh() {
        let limiter = RateLimiter::new();
        let limit = rpm(1);
        limiter.record_at("m", 0, 100);
        assert!(!limiter.check_at("m", Some(&limit), 100));
        assert!(limiter.check_at("m", Some(&limit), 101));
    }

    #[test]
    fn counters_are_monotonic_within_a_minute() {
        let limiter = RateLimiter::new();
        limiter.record_at("m", 5, 100);
        limiter.record_at("m", 7, 100);
        let usage = limiter.usage_at("m", 100);
        assert_eq!(usage.request_count, 2);
        assert_eq!(usage.token_count, 12);
    }

    #[test]
    fn oversized_token_reports_saturate() {
        let limiter = RateLimiter::new();
        limiter.record_at("m", u64::MAX - 1, 100);
        limiter.record_at("m", 10, 100);
        assert_eq!(limiter.usage_at("m", 100).token_count, u64::MAX);
        assert!(!limiter.check_at(
            "m",
            Some(&RateLimit {
                requests_per_minute: None,
                tokens_per_minute: Some(1_000),
            }),
            100
        ));
    }

    #[test]
    fn windows_older_than_two_minutes_are_pruned() {
        let limiter = RateLimiter::new();
        limiter.record_at("m", 1, 100);
        limiter.record_at("m", 1, 101);
        limiter.record_at("m", 1, 102);
        assert_eq!(limiter.windows("m").len(), 3);

        limiter.record_at("m", 1, 103);
        let minutes: Vec<u64> = limiter.windows("m").iter().map(|w| w.minute_epoch).collect();
        assert_eq!(minutes, vec![101, 102, 103]);

        limiter.record_at("m", 1, 110);
        let minutes: Vec<u64> = limiter.windows("m").iter().map(|w| w.minute_epoch).collect();
        assert_eq!(minutes, vec![110]);
        assert_eq!(limiter.usage_at("m", 100).request_count, 0);
    }
}
