//! Per-key request pacing with exponential backoff.
//!
//! Every key (typically an engine name) is forced to wait a minimum interval
//! between requests, and carries a retry counter that drives exponential
//! backoff after failures.

use rand::Rng;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Clone, Copy)]
pub struct RateLimiterConfig {
    /// Minimum spacing between two requests sharing a key.
    pub min_delay: Duration,
    /// Base delay for the exponential backoff curve.
    pub base_delay: Duration,
    /// Backoff ceiling.
    pub max_delay: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(1),
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Default)]
struct KeyState {
    last_request: Option<Instant>,
    retries: u32,
}

/// Async rate limiter shared between concurrent probes. Keys are independent,
/// so throttling one engine never delays another.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    state: Mutex<HashMap<String, KeyState>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            state: Mutex::new(HashMap::new()),
        }
    }

    /// Sleep until at least `min_delay` has elapsed since the previous call
    /// with the same key. The last-call timestamp is updated unconditionally,
    /// including on the initial non-blocking call.
    pub async fn wait(&self, key: &str) {
        let remaining = {
            let mut guard = self.state.lock().await;
            let entry = guard.entry(key.to_string()).or_default();
            let remaining = entry
                .last_request
                .map(|last| self.config.min_delay.saturating_sub(last.elapsed()))
                .unwrap_or(Duration::ZERO);
            if remaining.is_zero() {
                entry.last_request = Some(Instant::now());
            }
            remaining
        };

        if !remaining.is_zero() {
            sleep(remaining).await;
            let mut guard = self.state.lock().await;
            let entry = guard.entry(key.to_string()).or_default();
            entry.last_request = Some(Instant::now());
        }
    }

    /// Compute the next backoff delay for `key` and bump its retry counter.
    ///
    /// `min(max_delay, base_delay * 2^retries + jitter)` with up to one
    /// second of uniform jitter.
    pub async fn backoff_time(&self, key: &str) -> Duration {
        let mut guard = self.state.lock().await;
        let entry = guard.entry(key.to_string()).or_default();
        let exponent = 2f64.powi(entry.retries.min(16) as i32);
        let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
        let raw = self.config.base_delay.as_secs_f64() * exponent + jitter;
        entry.retries = entry.retries.saturating_add(1);
        Duration::from_secs_f64(raw.min(self.config.max_delay.as_secs_f64()))
    }

    /// Clear the retry counter for `key` after a success so backoff does not
    /// accumulate for the process lifetime.
    pub async fn reset(&self, key: &str) {
        let mut guard = self.state.lock().await;
        if let Some(entry) = guard.get_mut(key) {
            entry.retries = 0;
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimiterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> RateLimiterConfig {
        RateLimiterConfig {
            min_delay: Duration::from_millis(50),
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn enforces_minimum_spacing_per_key() {
        let limiter = RateLimiter::new(fast_config());
        let started = Instant::now();
        limiter.wait("bing").await;
        limiter.wait("bing").await;
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn first_call_does_not_block() {
        let limiter = RateLimiter::new(fast_config());
        let started = Instant::now();
        limiter.wait("bing").await;
        assert!(started.elapsed() < Duration::from_millis(40));
    }

    #[tokio::test]
    async fn keys_do_not_interfere() {
        let limiter = RateLimiter::new(fast_config());
        limiter.wait("bing").await;
        let started = Instant::now();
        limiter.wait("duckduckgo").await;
        assert!(started.elapsed() < Duration::from_millis(40));
    }

    #[tokio::test]
    async fn backoff_grows_exponentially() {
        let limiter = RateLimiter::default();
        let first = limiter.backoff_time("google").await;
        let second = limiter.backoff_time("google").await;
        let third = limiter.backoff_time("google").await;
        // base 1s: 1+j, 2+j, 4+j with jitter < 1s
        assert!(first >= Duration::from_secs(1) && first < Duration::from_secs(2));
        assert!(second >= Duration::from_secs(2) && second < Duration::from_secs(3));
        assert!(third >= Duration::from_secs(4) && third < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn backoff_is_capped() {
        let limiter = RateLimiter::default();
        for _ in 0..12 {
            limiter.backoff_time("yandex").await;
        }
        let capped = limiter.backoff_time("yandex").await;
        assert_eq!(capped, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn reset_clears_retry_counter() {
        let limiter = RateLimiter::default();
        limiter.backoff_time("brave").await;
        limiter.backoff_time("brave").await;
        limiter.reset("brave").await;
        let after_reset = limiter.backoff_time("brave").await;
        assert!(after_reset < Duration::from_secs(2));
    }
}
