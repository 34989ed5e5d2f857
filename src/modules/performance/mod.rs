//! Per-engine probe health tracking with threshold alerting.
//!
//! Records every probe outcome, maintains a running mean of response times,
//! and logs (never raises) when an engine crosses a failure-rate, latency,
//! or consecutive-failure threshold.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use crate::probes::Engine;

#[derive(Debug, Clone, Copy)]
pub struct PerformanceThresholds {
    pub failure_rate: f64,
    pub response_time: Duration,
    pub consecutive_failures: u32,
}

impl Default for PerformanceThresholds {
    fn default() -> Self {
        Self {
            failure_rate: 0.3,
            response_time: Duration::from_secs(10),
            consecutive_failures: 3,
        }
    }
}

/// Running totals for one engine.
#[derive(Debug, Clone, Default)]
pub struct EngineMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// Running mean of response times, in seconds.
    pub average_response_time: f64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    /// Accumulated backoff scheduled against this engine, in seconds.
    pub total_backoff_time: f64,
}

impl EngineMetrics {
    pub fn success_rate(&self) -> f64 {
        match self.total_requests {
            0 => 0.0,
            total => self.successful_requests as f64 / total as f64,
        }
    }

    fn failure_rate(&self) -> f64 {
        match self.total_requests {
            0 => 0.0,
            total => self.failed_requests as f64 / total as f64,
        }
    }
}

/// Summary row returned by [`PerformanceMonitor::summary`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineSummary {
    pub success_rate: f64,
    pub average_response_time: f64,
    pub total_requests: u64,
    pub consecutive_failures: u32,
}

/// Observes probe outcomes per engine. Metrics live behind one lock per
/// engine entry so concurrent probes never serialize on each other.
#[derive(Debug)]
pub struct PerformanceMonitor {
    thresholds: PerformanceThresholds,
    metrics: RwLock<HashMap<Engine, Arc<Mutex<EngineMetrics>>>>,
}

impl PerformanceMonitor {
    pub fn new(thresholds: PerformanceThresholds) -> Self {
        Self {
            thresholds,
            metrics: RwLock::new(HashMap::new()),
        }
    }

    fn entry(&self, engine: Engine) -> Arc<Mutex<EngineMetrics>> {
        {
            let metrics = self.metrics.read().expect("metrics lock poisoned");
            if let Some(entry) = metrics.get(&engine) {
                return entry.clone();
            }
        }
        let mut metrics = self.metrics.write().expect("metrics lock poisoned");
        metrics
            .entry(engine)
            .or_insert_with(|| Arc::new(Mutex::new(EngineMetrics::default())))
            .clone()
    }

    /// Record one probe outcome and evaluate alert thresholds.
    pub fn record(&self, engine: Engine, success: bool, response_time: Duration) {
        let entry = self.entry(engine);
        let mut metrics = entry.lock().expect("metrics entry lock poisoned");

        metrics.total_requests += 1;
        if success {
            metrics.successful_requests += 1;
            metrics.consecutive_failures = 0;
            metrics.last_success = Some(Utc::now());
        } else {
            metrics.failed_requests += 1;
            metrics.consecutive_failures += 1;
            metrics.last_failure = Some(Utc::now());
        }

        let n = metrics.total_requests as f64;
        metrics.average_response_time =
            (metrics.average_response_time * (n - 1.0) + response_time.as_secs_f64()) / n;

        self.check_alerts(engine, &metrics);
    }

    /// Account backoff time scheduled against an engine after a failure.
    pub fn record_backoff(&self, engine: Engine, backoff: Duration) {
        let entry = self.entry(engine);
        let mut metrics = entry.lock().expect("metrics entry lock poisoned");
        metrics.total_backoff_time += backoff.as_secs_f64();
    }

    fn check_alerts(&self, engine: Engine, metrics: &EngineMetrics) {
        if metrics.failure_rate() > self.thresholds.failure_rate {
            log::warn!(
                "high failure rate for {engine}: {:.1}%",
                metrics.failure_rate() * 100.0
            );
        }
        if metrics.average_response_time > self.thresholds.response_time.as_secs_f64() {
            log::warn!(
                "slow response time for {engine}: {:.2}s",
                metrics.average_response_time
            );
        }
        if metrics.consecutive_failures >= self.thresholds.consecutive_failures {
            log::warn!(
                "{} consecutive failures for {engine}",
                metrics.consecutive_failures
            );
        }
    }

    pub fn metrics_for(&self, engine: Engine) -> Option<EngineMetrics> {
        let metrics = self.metrics.read().expect("metrics lock poisoned");
        metrics
            .get(&engine)
            .map(|entry| entry.lock().expect("metrics entry lock poisoned").clone())
    }

    pub fn summary(&self) -> HashMap<Engine, EngineSummary> {
        let metrics = self.metrics.read().expect("metrics lock poisoned");
        metrics
            .iter()
            .map(|(engine, entry)| {
                let metrics = entry.lock().expect("metrics entry lock poisoned");
                (
                    *engine,
                    EngineSummary {
                        success_rate: metrics.success_rate(),
                        average_response_time: metrics.average_response_time,
                        total_requests: metrics.total_requests,
                        consecutive_failures: metrics.consecutive_failures,
                    },
                )
            })
            .collect()
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(PerformanceThresholds::default())
    }
}
