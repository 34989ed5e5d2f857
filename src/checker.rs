//! The authority checker: wires fingerprints, rate limiting, proxies,
//! probes, validation, monitoring, and scoring into one entry point.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::forms::{FormDiscovery, FormError, FormSubmitter, SubmissionForm, SubmitterConfig};
use crate::modules::fingerprint::FingerprintRandomizer;
use crate::modules::performance::{EngineSummary, PerformanceMonitor, PerformanceThresholds};
use crate::modules::proxy::{ProxyPool, ProxyPoolConfig, ProxySummary};
use crate::modules::rate_limit::{RateLimiter, RateLimiterConfig};
use crate::modules::scoring::{AuthorityScore, AuthorityScorer};
use crate::modules::validator::{ResultValidator, ValidatorConfig};
use crate::probes::{
    engines, BrowserProbe, BrowserProbeConfig, Engine, EngineProbe, HttpProbe, ProbeOutcome,
};

#[derive(Debug, thiserror::Error)]
pub enum AuthorityError {
    #[error("invalid domain: {0}")]
    InvalidDomain(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("form error: {0}")]
    Form(#[from] FormError),
}

pub type AuthorityResult<T> = Result<T, AuthorityError>;

/// Builder for [`AuthorityChecker`]. Every knob has a sensible default;
/// `build()` never fails.
#[derive(Default)]
pub struct AuthorityCheckerBuilder {
    proxies: Vec<String>,
    proxy_config: Option<ProxyPoolConfig>,
    rate_config: Option<RateLimiterConfig>,
    validator_config: Option<ValidatorConfig>,
    thresholds: Option<PerformanceThresholds>,
    weights: Option<HashMap<Engine, f64>>,
    browser_config: Option<BrowserProbeConfig>,
    browser_probes: bool,
}

impl AuthorityCheckerBuilder {
    pub fn new() -> Self {
        Self {
            browser_probes: true,
            ..Default::default()
        }
    }

    pub fn with_proxies<I, S>(mut self, proxies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.proxies = proxies.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_proxy_config(mut self, config: ProxyPoolConfig) -> Self {
        self.proxy_config = Some(config);
        self
    }

    pub fn with_rate_config(mut self, config: RateLimiterConfig) -> Self {
        self.rate_config = Some(config);
        self
    }

    pub fn with_validator_config(mut self, config: ValidatorConfig) -> Self {
        self.validator_config = Some(config);
        self
    }

    pub fn with_thresholds(mut self, thresholds: PerformanceThresholds) -> Self {
        self.thresholds = Some(thresholds);
        self
    }

    pub fn with_weights(mut self, weights: HashMap<Engine, f64>) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn with_browser_config(mut self, config: BrowserProbeConfig) -> Self {
        self.browser_config = Some(config);
        self
    }

    /// Skip the browser-automation probes entirely. Useful on hosts with no
    /// browser installed; the direct-HTTP engines still contribute.
    pub fn disable_browser_probes(mut self) -> Self {
        self.browser_probes = false;
        self
    }

    pub fn build(self) -> AuthorityChecker {
        let fingerprints = Arc::new(FingerprintRandomizer::new());
        let rate_limiter = Arc::new(RateLimiter::new(self.rate_config.unwrap_or_default()));
        let proxies = Arc::new(ProxyPool::with_proxies(
            self.proxy_config.unwrap_or_default(),
            self.proxies,
        ));

        let mut probes: Vec<Arc<dyn EngineProbe>> = vec![
            Arc::new(HttpProbe::new(
                &engines::BING,
                fingerprints.clone(),
                rate_limiter.clone(),
                proxies.clone(),
            )),
            Arc::new(HttpProbe::new(
                &engines::DUCKDUCKGO,
                fingerprints.clone(),
                rate_limiter.clone(),
                proxies.clone(),
            )),
        ];

        if self.browser_probes {
            let browser_config = self.browser_config.unwrap_or_default();
            for endpoint in [&engines::GOOGLE, &engines::BRAVE] {
                probes.push(Arc::new(BrowserProbe::new(
                    endpoint,
                    browser_config.clone(),
                    fingerprints.clone(),
                    rate_limiter.clone(),
                    proxies.clone(),
                )));
            }
        }

        let scorer = match self.weights {
            Some(weights) => AuthorityScorer::with_weights(weights),
            None => AuthorityScorer::new(),
        };

        AuthorityChecker {
            probes,
            validator: Arc::new(ResultValidator::new(
                self.validator_config.unwrap_or_default(),
            )),
            monitor: Arc::new(PerformanceMonitor::new(self.thresholds.unwrap_or_default())),
            rate_limiter,
            scorer,
            proxies,
            fingerprints,
        }
    }
}

/// Scores the authority of a domain from backlink counts across several
/// search engines.
pub struct AuthorityChecker {
    probes: Vec<Arc<dyn EngineProbe>>,
    validator: Arc<ResultValidator>,
    monitor: Arc<PerformanceMonitor>,
    rate_limiter: Arc<RateLimiter>,
    scorer: AuthorityScorer,
    proxies: Arc<ProxyPool>,
    fingerprints: Arc<FingerprintRandomizer>,
}

impl AuthorityChecker {
    pub fn builder() -> AuthorityCheckerBuilder {
        AuthorityCheckerBuilder::new()
    }

    /// Probe every configured engine concurrently, validate what came back,
    /// and score the domain. Engines that abstain are simply absent from the
    /// counts; a run where every engine abstained scores zero rather than
    /// erroring, since "nobody answered" is an answer about availability,
    /// not about the domain.
    pub async fn check_authority(&self, domain: &str) -> AuthorityResult<AuthorityScore> {
        let domain = normalize_domain(domain)?;
        log::info!("checking authority of {domain}");

        let handles: Vec<_> = self
            .probes
            .iter()
            .map(|probe| {
                let probe = probe.clone();
                let domain = domain.clone();
                tokio::spawn(async move { probe.probe(&domain).await })
            })
            .collect();

        let mut counts: HashMap<Engine, u64> = HashMap::new();
        for outcome in futures::future::join_all(handles).await {
            let result = match outcome {
                Ok(result) => result,
                Err(err) => {
                    log::warn!("probe task panicked: {err}");
                    continue;
                }
            };

            match result.outcome {
                ProbeOutcome::Counted(count) => {
                    self.monitor.record(result.engine, true, result.latency);
                    self.rate_limiter.reset(result.engine.as_str()).await;
                    if self
                        .validator
                        .validate_and_record(&domain, result.engine, count)
                    {
                        counts.insert(result.engine, count);
                    } else {
                        log::warn!(
                            "discarding invalid count {count} from {} for {domain}",
                            result.engine
                        );
                    }
                }
                ProbeOutcome::Abstained(reason) => {
                    log::warn!("{} abstained for {domain}: {reason}", result.engine);
                    self.monitor.record(result.engine, false, result.latency);
                    let backoff = self.rate_limiter.backoff_time(result.engine.as_str()).await;
                    self.monitor.record_backoff(result.engine, backoff);
                }
            }
        }

        Ok(self.scorer.score(&domain, &counts))
    }

    /// Score counts obtained elsewhere, bypassing the probes.
    pub fn score_counts(
        &self,
        domain: &str,
        counts: &HashMap<Engine, u64>,
    ) -> AuthorityResult<AuthorityScore> {
        let domain = normalize_domain(domain)?;
        Ok(self.scorer.score(&domain, counts))
    }

    pub fn performance_summary(&self) -> HashMap<Engine, EngineSummary> {
        self.monitor.summary()
    }

    pub fn proxy_report(&self) -> HashMap<String, ProxySummary> {
        self.proxies.report()
    }

    /// Crawl a directory site for link-submission forms.
    pub async fn discover_forms(
        &self,
        start_url: &str,
        max_pages: usize,
    ) -> AuthorityResult<Vec<SubmissionForm>> {
        let discovery = FormDiscovery::new(self.fingerprints.clone())?;
        Ok(discovery.discover(start_url, max_pages).await?)
    }

    /// Pre-fill a submission form in a visible browser and submit it once a
    /// human confirms through the channel.
    pub async fn submit_form(
        &self,
        form_url: &str,
        values: &HashMap<String, String>,
        confirmation: oneshot::Receiver<bool>,
        config: SubmitterConfig,
    ) -> AuthorityResult<bool> {
        let submitter = FormSubmitter::new(config);
        Ok(submitter.submit(form_url, values, confirmation).await?)
    }
}

/// Reduce a user-supplied domain to a bare lowercase hostname. Schemes and
/// paths are tolerated and stripped.
fn normalize_domain(input: &str) -> AuthorityResult<String> {
    let trimmed = input.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let host = without_scheme
        .split('/')
        .next()
        .unwrap_or("")
        .to_lowercase();

    if host.is_empty() || !host.contains('.') {
        return Err(AuthorityError::InvalidDomain(input.to_string()));
    }
    Ok(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_scheme_path_and_case() {
        assert_eq!(
            normalize_domain("https://Example.COM/some/page").unwrap(),
            "example.com"
        );
        assert_eq!(normalize_domain("  example.com  ").unwrap(), "example.com");
    }

    #[test]
    fn rejects_empty_and_schemeless_garbage() {
        assert!(normalize_domain("").is_err());
        assert!(normalize_domain("https://").is_err());
        assert!(normalize_domain("localhost").is_err());
    }

    #[test]
    fn builder_defaults_include_browser_probes() {
        let checker = AuthorityChecker::builder().build();
        assert_eq!(checker.probes.len(), 4);
    }

    #[test]
    fn browser_probes_can_be_disabled() {
        let checker = AuthorityChecker::builder()
            .disable_browser_probes()
            .build();
        assert_eq!(checker.probes.len(), 2);
        let engines: Vec<Engine> = checker.probes.iter().map(|p| p.engine()).collect();
        assert_eq!(engines, vec![Engine::Bing, Engine::DuckDuckGo]);
    }

    #[test]
    fn scoring_without_probing_normalizes_the_domain() {
        let checker = AuthorityChecker::builder().disable_browser_probes().build();
        let counts = HashMap::from([(Engine::Bing, 1_000u64)]);
        let score = checker
            .score_counts("https://Example.com/about", &counts)
            .unwrap();
        assert_eq!(score.domain, "example.com");
        assert!(score.final_score > 0);
    }
}
