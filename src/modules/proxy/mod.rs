//! Proxy pool with quality-based selection and circuit-breaker deactivation.
//!
//! Tracks per-proxy success/failure statistics, selects the best-performing
//! endpoint, rotates on a minimum interval, and deactivates proxies after
//! repeated consecutive failures.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct ProxyPoolConfig {
    /// Minimum success rate for a proxy to stay in the candidate set.
    pub quality_threshold: f64,
    /// Consecutive failures before a proxy is deactivated.
    pub max_consecutive_failures: u32,
    /// Minimum interval between rotations, preventing thrashing.
    pub min_rotation_interval: Duration,
    /// When set, a deactivated proxy becomes eligible again after this
    /// cooldown. `None` keeps deactivation permanent.
    pub reactivation_cooldown: Option<Duration>,
    /// Timeout for the liveness probe.
    pub liveness_timeout: Duration,
}

impl Default for ProxyPoolConfig {
    fn default() -> Self {
        Self {
            quality_threshold: 0.7,
            max_consecutive_failures: 3,
            min_rotation_interval: Duration::from_secs(300),
            reactivation_cooldown: None,
            liveness_timeout: Duration::from_secs(5),
        }
    }
}

/// Rolling statistics for one proxy endpoint.
#[derive(Debug, Clone)]
pub struct ProxyStats {
    pub success_count: u64,
    pub failure_count: u64,
    /// Accumulated response time in seconds.
    pub total_response_time: f64,
    pub last_used: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub is_active: bool,
    deactivated_at: Option<Instant>,
}

impl Default for ProxyStats {
    fn default() -> Self {
        Self {
            success_count: 0,
            failure_count: 0,
            total_response_time: 0.0,
            last_used: None,
            last_success: None,
            consecutive_failures: 0,
            is_active: true,
            deactivated_at: None,
        }
    }
}

impl ProxyStats {
    pub fn total_requests(&self) -> u64 {
        self.success_count + self.failure_count
    }

    /// New proxies score a perfect rate so they get a chance.
    pub fn success_rate(&self) -> f64 {
        match self.total_requests() {
            0 => 1.0,
            total => self.success_count as f64 / total as f64,
        }
    }

    pub fn average_response_time(&self) -> f64 {
        match self.total_requests() {
            0 => 0.0,
            total => self.total_response_time / total as f64,
        }
    }
}

/// Per-proxy summary exposed to callers.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProxySummary {
    pub success_rate: f64,
    pub total_requests: u64,
    pub avg_response_time: f64,
    pub is_active: bool,
    pub consecutive_failures: u32,
}

#[derive(Debug, Default)]
struct Selection {
    current: Option<String>,
    last_rotation: Option<Instant>,
}

/// Shared proxy pool. Statistics live behind one lock per proxy entry so
/// concurrent probes reporting outcomes for different proxies never contend.
#[derive(Debug)]
pub struct ProxyPool {
    config: ProxyPoolConfig,
    entries: RwLock<HashMap<String, Arc<Mutex<ProxyStats>>>>,
    selection: Mutex<Selection>,
}

impl ProxyPool {
    pub fn new(config: ProxyPoolConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            selection: Mutex::new(Selection::default()),
        }
    }

    pub fn with_proxies<I, S>(config: ProxyPoolConfig, proxies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pool = Self::new(config);
        pool.load(proxies);
        pool
    }

    pub fn load<I, S>(&self, proxies: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut guard = self.entries.write().expect("proxy entries lock poisoned");
        for proxy in proxies {
            guard
                .entry(proxy.into())
                .or_insert_with(|| Arc::new(Mutex::new(ProxyStats::default())));
        }
    }

    pub fn add_proxy(&self, proxy: impl Into<String>) {
        self.load([proxy.into()]);
    }

    pub fn is_empty(&self) -> bool {
        self.entries
            .read()
            .expect("proxy entries lock poisoned")
            .is_empty()
    }

    /// Fetch candidate proxies from a listing service returning one endpoint
    /// per line, and add them to the pool.
    pub async fn fetch_from_service(&self, listing_url: &str) -> Result<usize, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        let body = client.get(listing_url).send().await?.text().await?;
        let proxies: Vec<String> = body
            .lines()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .map(|line| line.to_string())
            .collect();
        let added = proxies.len();
        self.load(proxies);
        log::info!("loaded {added} proxies from listing service");
        Ok(added)
    }

    /// A proxy is alive when a test request through it returns HTTP 200
    /// within the configured timeout.
    pub async fn probe_liveness(&self, proxy: &str, test_url: &str) -> bool {
        let Ok(proxy) = reqwest::Proxy::all(proxy) else {
            return false;
        };
        let Ok(client) = reqwest::Client::builder()
            .timeout(self.config.liveness_timeout)
            .proxy(proxy)
            .build()
        else {
            return false;
        };
        matches!(
            client.get(test_url).send().await,
            Ok(resp) if resp.status() == reqwest::StatusCode::OK
        )
    }

    /// Best active proxy: success rate at or above the quality threshold
    /// (new proxies pass), ranked by success rate descending then average
    /// response time ascending.
    pub fn best_proxy(&self) -> Option<String> {
        let entries = self.entries.read().expect("proxy entries lock poisoned");
        let mut candidates: Vec<(String, f64, f64)> = Vec::new();
        for (endpoint, stats) in entries.iter() {
            let mut stats = stats.lock().expect("proxy stats lock poisoned");
            self.maybe_reactivate(&mut stats);
            if !stats.is_active {
                continue;
            }
            let rate = stats.success_rate();
            if rate < self.config.quality_threshold {
                continue;
            }
            candidates.push((endpoint.clone(), rate, stats.average_response_time()));
        }

        candidates.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.2.partial_cmp(&b.2).unwrap_or(Ordering::Equal))
        });
        candidates.into_iter().next().map(|(endpoint, _, _)| endpoint)
    }

    fn maybe_reactivate(&self, stats: &mut ProxyStats) {
        if stats.is_active {
            return;
        }
        let Some(cooldown) = self.config.reactivation_cooldown else {
            return;
        };
        if let Some(deactivated_at) = stats.deactivated_at
            && deactivated_at.elapsed() >= cooldown
        {
            stats.is_active = true;
            stats.consecutive_failures = 0;
            stats.deactivated_at = None;
        }
    }

    /// Re-select the best proxy, but only if the minimum rotation interval
    /// has elapsed since the previous rotation.
    pub fn rotate(&self) {
        let mut selection = self.selection.lock().expect("proxy selection lock poisoned");
        if let Some(last) = selection.last_rotation
            && last.elapsed() < self.config.min_rotation_interval
        {
            return;
        }

        if let Some(best) = self.best_proxy()
            && selection.current.as_deref() != Some(best.as_str())
        {
            log::info!("rotated to proxy {best}");
            selection.current = Some(best);
            selection.last_rotation = Some(Instant::now());
        }
    }

    pub fn current_proxy(&self) -> Option<String> {
        self.selection
            .lock()
            .expect("proxy selection lock poisoned")
            .current
            .clone()
    }

    /// Rotate if due, then return the current selection.
    pub fn rotate_and_current(&self) -> Option<String> {
        self.rotate();
        self.current_proxy()
    }

    /// Record an outcome for the currently selected proxy.
    pub fn record_outcome(&self, success: bool, response_time: Duration) {
        if let Some(current) = self.current_proxy() {
            self.record_outcome_for(&current, success, response_time);
        }
    }

    /// Record an outcome for a specific proxy endpoint. Reaching the
    /// consecutive-failure limit deactivates it.
    pub fn record_outcome_for(&self, proxy: &str, success: bool, response_time: Duration) {
        let entries = self.entries.read().expect("proxy entries lock poisoned");
        let Some(stats) = entries.get(proxy) else {
            return;
        };
        let mut stats = stats.lock().expect("proxy stats lock poisoned");
        stats.last_used = Some(Utc::now());
        stats.total_response_time += response_time.as_secs_f64();

        if success {
            stats.success_count += 1;
            stats.last_success = Some(Utc::now());
            stats.consecutive_failures = 0;
        } else {
            stats.failure_count += 1;
            stats.consecutive_failures += 1;
            if stats.consecutive_failures >= self.config.max_consecutive_failures
                && stats.is_active
            {
                stats.is_active = false;
                stats.deactivated_at = Some(Instant::now());
                log::warn!(
                    "deactivated proxy {proxy} after {} consecutive failures",
                    stats.consecutive_failures
                );
            }
        }
    }

    pub fn stats_for(&self, proxy: &str) -> Option<ProxyStats> {
        let entries = self.entries.read().expect("proxy entries lock poisoned");
        entries
            .get(proxy)
            .map(|stats| stats.lock().expect("proxy stats lock poisoned").clone())
    }

    pub fn report(&self) -> HashMap<String, ProxySummary> {
        let entries = self.entries.read().expect("proxy entries lock poisoned");
        entries
            .iter()
            .map(|(endpoint, stats)| {
                let stats = stats.lock().expect("proxy stats lock poisoned");
                (
                    endpoint.clone(),
                    ProxySummary {
                        success_rate: if stats.total_requests() == 0 {
                            0.0
                        } else {
                            stats.success_rate()
                        },
                        total_requests: stats.total_requests(),
                        avg_response_time: stats.average_response_time(),
                        is_active: stats.is_active,
                        consecutive_failures: stats.consecutive_failures,
                    },
                )
            })
            .collect()
    }
}

impl Default for ProxyPool {
    fn default() -> Self {
        Self::new(ProxyPoolConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_proxies_pass_the_quality_gate() {
        let pool = ProxyPool::with_proxies(ProxyPoolConfig::default(), ["http://1.1.1.1:8080"]);
        assert_eq!(pool.best_proxy().as_deref(), Some("http://1.1.1.1:8080"));
    }

    #[test]
    fn three_consecutive_failures_deactivate() {
        let pool = ProxyPool::with_proxies(ProxyPoolConfig::default(), ["http://1.1.1.1:8080"]);
        for _ in 0..3 {
            pool.record_outcome_for("http://1.1.1.1:8080", false, Duration::from_millis(200));
        }
        let stats = pool.stats_for("http://1.1.1.1:8080").unwrap();
        assert!(!stats.is_active);
        assert_eq!(pool.best_proxy(), None);
    }

    #[test]
    fn success_resets_the_failure_streak() {
        let pool = ProxyPool::with_proxies(ProxyPoolConfig::default(), ["http://1.1.1.1:8080"]);
        pool.record_outcome_for("http://1.1.1.1:8080", false, Duration::from_millis(100));
        pool.record_outcome_for("http://1.1.1.1:8080", false, Duration::from_millis(100));
        pool.record_outcome_for("http://1.1.1.1:8080", true, Duration::from_millis(100));
        let stats = pool.stats_for("http://1.1.1.1:8080").unwrap();
        assert_eq!(stats.consecutive_failures, 0);
        assert!(stats.is_active);
    }

    #[test]
    fn rotation_respects_minimum_interval() {
        let pool = ProxyPool::with_proxies(
            ProxyPoolConfig::default(),
            ["http://1.1.1.1:8080", "http://2.2.2.2:8080"],
        );
        pool.rotate();
        let first = pool.current_proxy().unwrap();
        // Degrade the current proxy so a fresh selection would pick the other.
        pool.record_outcome_for(&first, false, Duration::from_millis(100));
        pool.rotate();
        assert_eq!(pool.current_proxy().unwrap(), first);
    }

    #[test]
    fn ranks_by_success_rate_then_latency() {
        let pool = ProxyPool::with_proxies(
            ProxyPoolConfig::default(),
            ["http://fast:8080", "http://slow:8080"],
        );
        for _ in 0..4 {
            pool.record_outcome_for("http://fast:8080", true, Duration::from_millis(100));
            pool.record_outcome_for("http://slow:8080", true, Duration::from_millis(900));
        }
        assert_eq!(pool.best_proxy().as_deref(), Some("http://fast:8080"));
    }

    #[test]
    fn cooldown_reactivates_when_configured() {
        let pool = ProxyPool::with_proxies(
            ProxyPoolConfig {
                reactivation_cooldown: Some(Duration::from_millis(0)),
                ..Default::default()
            },
            ["http://1.1.1.1:8080"],
        );
        for _ in 0..3 {
            pool.record_outcome_for("http://1.1.1.1:8080", false, Duration::from_millis(100));
        }
        assert!(!pool.stats_for("http://1.1.1.1:8080").unwrap().is_active);
        // Zero cooldown: the next selection pass reactivates it, but its
        // success rate (0/3) still keeps it below the quality gate.
        assert_eq!(pool.best_proxy(), None);
        let stats = pool.stats_for("http://1.1.1.1:8080").unwrap();
        assert!(stats.is_active);
    }
}
