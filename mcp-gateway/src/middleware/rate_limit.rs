//! # Per-Client Rate Limiting
//!
//! A fixed one-second sliding window per client id. Simpler than the
//! minute/hour/token sliding-window scheme the auth module used to run,
//! because the gateway's rate limit is a transport-level request throttle,
//! not a billing-relevant token budget.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Carries what the 429 response needs to report: how long until the
/// client may retry, and the wall-clock instant the window resets.
pub struct RateLimitExceeded {
    pub retry_after_secs: u64,
    pub reset_epoch_secs: i64,
}

struct Window {
    started_at: Instant,
    count: u32,
}

pub struct RateLimiter {
    requests_per_second: u32,
    windows: DashMap<String, Mutex<Window>>,
}

impl RateLimiter {
    pub fn new(requests_per_second: u32) -> Self {
        Self {
            requests_per_second,
            windows: DashMap::new(),
        }
    }

    pub fn limit(&self) -> u32 {
        self.requests_per_second
    }

    /// Increments the client's counter for the current one-second window,
    /// rolling the window over if a full second has elapsed. Returns
    /// `Err` once the client has exceeded `requests_per_second` within the
    /// current window.
    pub fn check(&self, client_id: &str) -> Result<(), RateLimitExceeded> {
        let entry = self
            .windows
            .entry(client_id.to_string())
            .or_insert_with(|| {
                Mutex::new(Window {
                    started_at: Instant::now(),
                    count: 0,
                })
            });
        let mut window = entry.lock().unwrap();
        if window.started_at.elapsed().as_secs() >= 1 {
            window.started_at = Instant::now();
            window.count = 0;
        }
        window.count += 1;
        if window.count > self.requests_per_second {
            let remaining = Duration::from_secs(1).saturating_sub(window.started_at.elapsed());
            let retry_after_secs = remaining.as_secs().max(1);
            let reset_epoch_secs =
                (Utc::now() + chrono::Duration::from_std(remaining).unwrap()).timestamp();
            return Err(RateLimitExceeded {
                retry_after_secs,
                reset_epoch_secs,
            });
        }
        Ok(())
    }

    /// Drops windows idle for more than a minute, bounding memory for
    /// clients that never return.
    pub fn sweep_idle(&self) {
        self.windows
            .retain(|_, window| window.lock().unwrap().started_at.elapsed().as_secs() < 60);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_requests_within_limit() {
        let limiter = RateLimiter::new(3);
        assert!(limiter.check("client-a").is_ok());
        assert!(limiter.check("client-a").is_ok());
        assert!(limiter.check("client-a").is_ok());
    }

    #[test]
    fn rejects_requests_beyond_limit_in_same_window() {
        let limiter = RateLimiter::new(2);
        assert!(limiter.check("client-b").is_ok());
        assert!(limiter.check("client-b").is_ok());
        assert!(limiter.check("client-b").is_err());
    }

    #[test]
    fn clients_are_tracked_independently() {
        let limiter = RateLimiter::new(1);
        assert!(limiter.check("client-c").is_ok());
        assert!(limiter.check("client-d").is_ok());
    }
}
