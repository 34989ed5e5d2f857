//! Raw count sanity checking.
//!
//! Rejects implausibly large counts outright and compares new counts against
//! a bounded per-domain history of previously accepted values, discarding
//! anomalous deviations before they can skew a score.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

use crate::probes::Engine;

#[derive(Debug, Clone, Copy)]
pub struct ValidatorConfig {
    /// Absolute ceiling above which a count is never believable.
    pub max_plausible_count: u64,
    /// Maximum relative deviation from the historical average.
    pub anomaly_threshold: f64,
    /// Accepted counts retained per domain, FIFO-evicted.
    pub history_capacity: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_plausible_count: 1_000_000_000,
            anomaly_threshold: 0.5,
            history_capacity: 10,
        }
    }
}

/// Validates counts against absolute bounds and per-domain history.
///
/// History is keyed by domain only, not by engine: engines corroborate the
/// same underlying quantity, so their accepted counts share one baseline.
#[derive(Debug)]
pub struct ResultValidator {
    config: ValidatorConfig,
    history: RwLock<HashMap<String, Arc<Mutex<VecDeque<u64>>>>>,
}

impl ResultValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self {
            config,
            history: RwLock::new(HashMap::new()),
        }
    }

    /// Non-mutating check. The first result for a new domain always passes.
    pub fn validate(&self, domain: &str, engine: Engine, count: u64) -> bool {
        let history = self.history.read().expect("history lock poisoned");
        match history.get(domain) {
            Some(entry) => {
                let entry = entry.lock().expect("history entry lock poisoned");
                self.check(domain, engine, count, &entry)
            }
            None => self.check(domain, engine, count, &VecDeque::new()),
        }
    }

    /// Check `count` and, when accepted, append it to the domain's history
    /// in the same critical section. Collapsing the check and the record
    /// into one call means no caller can do one and forget the other.
    pub fn validate_and_record(&self, domain: &str, engine: Engine, count: u64) -> bool {
        let entry = {
            let mut history = self.history.write().expect("history lock poisoned");
            history
                .entry(domain.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(VecDeque::new())))
                .clone()
        };

        let mut entry = entry.lock().expect("history entry lock poisoned");
        if !self.check(domain, engine, count, &entry) {
            return false;
        }
        entry.push_back(count);
        if entry.len() > self.config.history_capacity {
            entry.pop_front();
        }
        true
    }

    /// Current history snapshot for a domain, oldest first.
    pub fn history_for(&self, domain: &str) -> Vec<u64> {
        let history = self.history.read().expect("history lock poisoned");
        history
            .get(domain)
            .map(|entry| {
                entry
                    .lock()
                    .expect("history entry lock poisoned")
                    .iter()
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn check(&self, domain: &str, engine: Engine, count: u64, history: &VecDeque<u64>) -> bool {
        if count > self.config.max_plausible_count {
            log::warn!("implausibly high count {count} for {domain} on {engine}");
            return false;
        }

        if history.is_empty() {
            return true;
        }

        let average = history.iter().sum::<u64>() as f64 / history.len() as f64;
        // An all-zero history carries no usable baseline.
        if average > 0.0 {
            let deviation = (count as f64 - average).abs() / average;
            if deviation > self.config.anomaly_threshold {
                log::warn!(
                    "anomalous count {count} for {domain} on {engine} (history average {average:.0})"
                );
                return false;
            }
        }

        true
    }
}

impl Default for ResultValidator {
    fn default() -> Self {
        Self::new(ValidatorConfig::default())
    }
}
