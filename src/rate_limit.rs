//! Per-user fixed-window rate limiting
//!
//! One shared map, one lock, no globals: the limiter is constructed at
//! service start and injected into the orchestrator. Checks are atomic
//! read-modify-write under the map lock.

use crate::config::OrchestratorConfig;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Requests without a user id all share this bucket.
const ANONYMOUS_BUCKET: &str = "anonymous";

/// One user's standing in the current window. Replaced wholesale, never
/// incremented, once the window has passed.
#[derive(Debug, Clone)]
pub struct RateLimitEntry {
    pub count: u32,
    pub window_reset_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed { remaining: u32 },
    Denied { retry_after: Duration },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }
}

/// Fixed-window limiter. A window starts at a user's first request and
/// runs its full length; a burst at the end of one window plus a burst at
/// the start of the next can briefly admit twice the limit.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    entries: Mutex<HashMap<String, RateLimitEntry>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self::new(config.rate_limit_max_requests, config.rate_limit_window)
    }

    /// Count this request against the caller's window.
    pub async fn check(&self, user_id: Option<&str>) -> RateLimitDecision {
        self.check_at(user_id, Instant::now()).await
    }

    /// Clock-parameterized variant of [`check`](Self::check); the public
    /// entry point pins `now`, tests drive it directly.
    pub(crate) async fn check_at(&self, user_id: Option<&str>, now: Instant) -> RateLimitDecision {
        let key = user_id.unwrap_or(ANONYMOUS_BUCKET);
        let mut entries = self.entries.lock().await;

        let decision = match entries.get_mut(key) {
            Some(entry) if now < entry.window_reset_at => {
                if entry.count < self.max_requests {
                    entry.count += 1;
                    RateLimitDecision::Allowed {
                        remaining: self.max_requests - entry.count,
                    }
                } else {
                    RateLimitDecision::Denied {
                        retry_after: entry.window_reset_at - now,
                    }
                }
            }
            _ => {
                // First request ever, or the old window lapsed: fresh entry.
                entries.insert(
                    key.to_string(),
                    RateLimitEntry {
                        count: 1,
                        window_reset_at: now + self.window,
                    },
                );
                RateLimitDecision::Allowed {
                    remaining: self.max_requests - 1,
                }
            }
        };

        match decision {
            RateLimitDecision::Allowed { remaining } => {
                debug!(user = key, remaining, "Rate limit check passed");
            }
            RateLimitDecision::Denied { retry_after } => {
                warn!(
                    user = key,
                    retry_after_ms = retry_after.as_millis() as u64,
                    "Rate limit exceeded"
                );
            }
        }

        decision
    }

    /// Number of buckets currently tracked; for operator visibility.
    pub async fn tracked_users(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(20, Duration::from_millis(60_000))
    }

    #[tokio::test]
    async fn test_allows_up_to_limit_then_denies() {
        let limiter = limiter();
        let start = Instant::now();

        for i in 0..20 {
            let decision = limiter.check_at(Some("u1"), start).await;
            assert!(decision.is_allowed(), "request {} should pass", i + 1);
        }

        match limiter.check_at(Some("u1"), start).await {
            RateLimitDecision::Denied { retry_after } => {
                assert!(retry_after > Duration::ZERO);
                assert!(retry_after <= Duration::from_millis(60_000));
            }
            RateLimitDecision::Allowed { .. } => panic!("21st request should be denied"),
        }
    }

    #[tokio::test]
    async fn test_remaining_counts_down() {
        let limiter = limiter();
        let start = Instant::now();

        assert_eq!(
            limiter.check_at(Some("u1"), start).await,
            RateLimitDecision::Allowed { remaining: 19 }
        );
        assert_eq!(
            limiter.check_at(Some("u1"), start).await,
            RateLimitDecision::Allowed { remaining: 18 }
        );
    }

    #[tokio::test]
    async fn test_window_reset_restores_allowance() {
        let limiter = limiter();
        let start = Instant::now();

        for _ in 0..20 {
            limiter.check_at(Some("u1"), start).await;
        }
        assert!(!limiter.check_at(Some("u1"), start).await.is_allowed());

        let after_window = start + Duration::from_millis(60_000);
        assert_eq!(
            limiter.check_at(Some("u1"), after_window).await,
            RateLimitDecision::Allowed { remaining: 19 }
        );
    }

    #[tokio::test]
    async fn test_boundary_burst_admits_two_windows() {
        // Fixed windows knowingly admit up to 2x the limit across a reset.
        let limiter = limiter();
        let start = Instant::now();

        for _ in 0..20 {
            assert!(limiter.check_at(Some("u1"), start).await.is_allowed());
        }
        let next_window = start + Duration::from_millis(60_001);
        for _ in 0..20 {
            assert!(limiter.check_at(Some("u1"), next_window).await.is_allowed());
        }
    }

    #[tokio::test]
    async fn test_users_tracked_independently() {
        let limiter = limiter();
        let start = Instant::now();

        for _ in 0..20 {
            limiter.check_at(Some("u1"), start).await;
        }
        assert!(!limiter.check_at(Some("u1"), start).await.is_allowed());
        assert!(limiter.check_at(Some("u2"), start).await.is_allowed());
        assert_eq!(limiter.tracked_users().await, 2);
    }

    #[tokio::test]
    async fn test_anonymous_requests_share_one_bucket() {
        let limiter = limiter();
        let start = Instant::now();

        assert_eq!(
            limiter.check_at(None, start).await,
            RateLimitDecision::Allowed { remaining: 19 }
        );
        assert_eq!(
            limiter.check_at(None, start).await,
            RateLimitDecision::Allowed { remaining: 18 }
        );
    }
}
