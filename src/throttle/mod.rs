//! Token-bucket rate limiting for outbound backend calls
//!
//! One limiter instance per external dependency (database, embedding API);
//! instances are injected explicitly and cloned into workers, never shared
//! across backends with different rates.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{trace, warn};

struct BucketState {
    rate_per_sec: f64,
    capacity: f64,
    tokens: f64,
    last_refill: Instant,
}

impl BucketState {
    /// Add tokens for the time elapsed since the last refill, capped at capacity.
    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate_per_sec).min(self.capacity);
        self.last_refill = now;
    }
}

/// Thread-safe token-bucket rate limiter
///
/// Cloning shares the same bucket, so every worker calling the same backend
/// draws from one token pool.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Option<Arc<Mutex<BucketState>>>,
}

impl RateLimiter {
    /// Create a limiter refilling at `rate_per_sec`, allowing bursts up to
    /// `capacity` immediate acquisitions. The bucket starts full.
    pub fn new(rate_per_sec: f64, capacity: f64) -> Self {
        let rate = rate_per_sec.max(f64::MIN_POSITIVE);
        let capacity = capacity.max(1.0);
        Self {
            inner: Some(Arc::new(Mutex::new(BucketState {
                rate_per_sec: rate,
                capacity,
                tokens: capacity,
                last_refill: Instant::now(),
            }))),
        }
    }

    /// Create a pass-through limiter that never blocks.
    ///
    /// Development use only; the bypass is security-relevant and logged.
    pub fn disabled() -> Self {
        warn!("rate limiting is DISABLED; all backend calls go out unthrottled");
        Self { inner: None }
    }

    /// Block the calling task until one permit is available.
    pub async fn acquire(&self) {
        let Some(bucket) = &self.inner else {
            return;
        };

        loop {
            let wait = {
                let mut state = bucket.lock().await;
                let now = Instant::now();
                state.refill(now);
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return;
                }
                // Exact time until the deficit is covered.
                Duration::from_secs_f64((1.0 - state.tokens) / state.rate_per_sec)
            };
            trace!(?wait, "rate limited, waiting for token");
            tokio::time::sleep(wait).await;
        }
    }

    /// Try to take a permit without blocking.
    pub fn try_acquire(&self) -> bool {
        let Some(bucket) = &self.inner else {
            return true;
        };

        // A contended lock counts as no permit; this call never waits.
        let Ok(mut state) = bucket.try_lock() else {
            return false;
        };
        let now = Instant::now();
        state.refill(now);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Whether this limiter actually throttles
    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant as StdInstant;

    #[tokio::test]
    async fn test_acquire_enforces_rate() {
        // 10 permits/sec, capacity 1: four acquires need three refills.
        let limiter = RateLimiter::new(10.0, 1.0);

        let start = StdInstant::now();
        for _ in 0..4 {
            limiter.acquire().await;
        }
        let elapsed = start.elapsed();

        assert!(
            elapsed >= Duration::from_millis(280),
            "4 acquires at 10/s finished in {:?}",
            elapsed
        );
    }

    #[tokio::test]
    async fn test_burst_capped_at_capacity() {
        let limiter = RateLimiter::new(0.5, 3.0);

        // Full bucket grants exactly `capacity` immediate permits.
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[tokio::test]
    async fn test_tokens_refill_over_time() {
        let limiter = RateLimiter::new(50.0, 1.0);
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(limiter.try_acquire());
    }

    #[tokio::test]
    async fn test_disabled_never_blocks() {
        let limiter = RateLimiter::disabled();
        let start = StdInstant::now();
        for _ in 0..1000 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(100));
        assert!(limiter.try_acquire());
    }

    #[tokio::test]
    async fn test_concurrent_acquires_never_overdraw() {
        let limiter = RateLimiter::new(20.0, 2.0);

        let start = StdInstant::now();
        let mut handles = Vec::new();
        for _ in 0..6 {
            let l = limiter.clone();
            handles.push(tokio::spawn(async move { l.acquire().await }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let elapsed = start.elapsed();

        // 6 permits at 20/s with 2 banked: at least (6-2)/20 = 200ms.
        assert!(
            elapsed >= Duration::from_millis(180),
            "6 concurrent acquires finished in {:?}",
            elapsed
        );
    }
}
