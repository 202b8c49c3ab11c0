//! Sliding-window rate limiter for completion requests.
//!
//! Keeps the timestamps of the last `max_requests` permits. A caller that
//! would exceed the limit sleeps until the oldest timestamp leaves the
//! window. The lock is held across that sleep so waiting callers queue in
//! order and the window is never overshot. Only the task is suspended, not
//! the runtime thread.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Sliding-window limiter: at most `max_requests` permits per `window`.
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter. A zero `max_requests` is treated as 1.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        let max_requests = max_requests.max(1);
        Self {
            max_requests,
            window,
            timestamps: Mutex::new(VecDeque::with_capacity(max_requests)),
        }
    }

    /// Wait for a permit and record it.
    ///
    /// Returns how long the caller waited, including lock contention.
    pub async fn acquire(&self) -> Duration {
        let started = Instant::now();
        let mut timestamps = self.timestamps.lock().await;

        let now = Instant::now();
        while let Some(oldest) = timestamps.front() {
            if now.duration_since(*oldest) > self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() >= self.max_requests {
            if let Some(oldest) = timestamps.front().copied() {
                let wait = self.window.saturating_sub(now.duration_since(oldest));
                if !wait.is_zero() {
                    debug!(wait_ms = wait.as_millis() as u64, "Rate limit reached, waiting");
                    tokio::time::sleep(wait).await;
                }
            }
            timestamps.pop_front();
        }

        timestamps.push_back(Instant::now());
        started.elapsed()
    }

    /// Permits recorded in the current window.
    pub async fn in_flight(&self) -> usize {
        let now = Instant::now();
        self.timestamps
            .lock()
            .await
            .iter()
            .filter(|t| now.duration_since(**t) <= self.window)
            .count()
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

impl Default for RateLimiter {
    /// 60 requests per 60 seconds.
    fn default() -> Self {
        Self::new(60, Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_permits_within_limit_do_not_wait() {
        let limiter = RateLimiter::new(3, Duration::from_secs(10));
        for _ in 0..3 {
            assert_eq!(limiter.acquire().await, Duration::ZERO);
        }
        assert_eq!(limiter.in_flight().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_extra_request_waits_for_window() {
        let limiter = RateLimiter::new(2, Duration::from_secs(10));
        let start = Instant::now();

        limiter.acquire().await;
        tokio::time::advance(Duration::from_secs(3)).await;
        limiter.acquire().await;

        let waited = limiter.acquire().await;
        assert_eq!(waited, Duration::from_secs(7));
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_timestamps_are_pruned() {
        let limiter = RateLimiter::new(1, Duration::from_secs(5));
        limiter.acquire().await;
        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(limiter.acquire().await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_never_overshoot() {
        let limiter = Arc::new(RateLimiter::new(2, Duration::from_secs(10)));
        let start = Instant::now();

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move {
                    limiter.acquire().await;
                    Instant::now()
                })
            })
            .collect();

        let mut granted = Vec::new();
        for handle in handles {
            granted.push(handle.await.unwrap().duration_since(start));
        }
        granted.sort();

        assert_eq!(granted[1], Duration::ZERO);
        assert!(granted[2] >= Duration::from_secs(10));
        assert!(granted[4] >= Duration::from_secs(20));
    }

    #[test]
    fn test_zero_limit_is_clamped() {
        assert_eq!(RateLimiter::new(0, Duration::from_secs(1)).max_requests(), 1);
    }
}
