//! Direct-HTTP engine probe.
//!
//! Sends a fingerprinted `site:` query through the shared rate limiter and
//! proxy pool, then parses the count out of the returned page. Engines that
//! serve usable HTML without JavaScript (Bing, the DuckDuckGo html endpoint)
//! are probed this way.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::modules::fingerprint::FingerprintRandomizer;
use crate::modules::proxy::ProxyPool;
use crate::modules::rate_limit::RateLimiter;
use crate::probes::{
    count_from_html, engines, AbstainReason, Engine, EngineEndpoint, EngineProbe, EngineResult,
    ProbeOutcome,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Probes one engine over plain HTTPS with a fresh fingerprint per request.
pub struct HttpProbe {
    endpoint: &'static EngineEndpoint,
    fingerprints: Arc<FingerprintRandomizer>,
    rate_limiter: Arc<RateLimiter>,
    proxies: Arc<ProxyPool>,
    timeout: Duration,
    // One client per proxy endpoint so cookie jars and connection pools
    // stay proxy-affine instead of being rebuilt on every request.
    clients: Mutex<HashMap<Option<String>, reqwest::Client>>,
}

impl HttpProbe {
    pub fn new(
        endpoint: &'static EngineEndpoint,
        fingerprints: Arc<FingerprintRandomizer>,
        rate_limiter: Arc<RateLimiter>,
        proxies: Arc<ProxyPool>,
    ) -> Self {
        Self {
            endpoint,
            fingerprints,
            rate_limiter,
            proxies,
            timeout: DEFAULT_TIMEOUT,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn client_for(&self, proxy: &Option<String>) -> Result<reqwest::Client, reqwest::Error> {
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(proxy) {
            return Ok(client.clone());
        }

        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .cookie_store(true)
            .gzip(true)
            .brotli(true);
        if let Some(proxy_url) = proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }
        let client = builder.build()?;
        clients.insert(proxy.clone(), client.clone());
        Ok(client)
    }

    fn result(&self, domain: &str, outcome: ProbeOutcome, started: Instant) -> EngineResult {
        EngineResult {
            engine: self.endpoint.engine,
            domain: domain.to_string(),
            outcome,
            timestamp: Utc::now(),
            latency: started.elapsed(),
        }
    }
}

#[async_trait]
impl EngineProbe for HttpProbe {
    fn engine(&self) -> Engine {
        self.endpoint.engine
    }

    async fn probe(&self, domain: &str) -> EngineResult {
        let engine = self.endpoint.engine;
        self.rate_limiter.wait(engine.as_str()).await;

        let started = Instant::now();
        let fingerprint = self.fingerprints.generate();
        let proxy = self.proxies.rotate_and_current();

        let client = match self.client_for(&proxy).await {
            Ok(client) => client,
            Err(err) => {
                log::warn!("client setup failed for {engine}: {err}");
                return self.result(
                    domain,
                    ProbeOutcome::Abstained(AbstainReason::Transport(err.to_string())),
                    started,
                );
            }
        };

        let url = self.endpoint.search_url_for(&engines::site_query(domain));
        let mut request = client.get(&url);
        for (name, value) in fingerprint.headers() {
            request = request.header(name, value);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                log::warn!("request to {engine} failed for {domain}: {err}");
                if let Some(proxy) = &proxy {
                    self.proxies.record_outcome_for(proxy, false, started.elapsed());
                }
                return self.result(
                    domain,
                    ProbeOutcome::Abstained(AbstainReason::Transport(err.to_string())),
                    started,
                );
            }
        };

        let status = response.status();
        if !status.is_success() {
            log::warn!("{engine} answered {status} for {domain}");
            if let Some(proxy) = &proxy {
                self.proxies.record_outcome_for(proxy, false, started.elapsed());
            }
            return self.result(
                domain,
                ProbeOutcome::Abstained(AbstainReason::HttpStatus(status.as_u16())),
                started,
            );
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                if let Some(proxy) = &proxy {
                    self.proxies.record_outcome_for(proxy, false, started.elapsed());
                }
                return self.result(
                    domain,
                    ProbeOutcome::Abstained(AbstainReason::Transport(err.to_string())),
                    started,
                );
            }
        };

        // The proxy did its job once a page arrived, whatever it contained.
        if let Some(proxy) = &proxy {
            self.proxies.record_outcome_for(proxy, true, started.elapsed());
        }

        let outcome = match count_from_html(&body, self.endpoint) {
            Some(count) => {
                log::debug!("{engine} reported {count} results for {domain}");
                ProbeOutcome::Counted(count)
            }
            None => {
                log::debug!("{engine} page for {domain} carried no count element");
                ProbeOutcome::Abstained(AbstainReason::NoCountElement)
            }
        };
        self.result(domain, outcome, started)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe() -> HttpProbe {
        HttpProbe::new(
            &engines::BING,
            Arc::new(FingerprintRandomizer::new()),
            Arc::new(RateLimiter::default()),
            Arc::new(ProxyPool::default()),
        )
    }

    #[test]
    fn reports_its_engine() {
        assert_eq!(probe().engine(), Engine::Bing);
    }

    #[tokio::test]
    async fn clients_are_cached_per_proxy() {
        let probe = probe();
        probe.client_for(&None).await.unwrap();
        probe
            .client_for(&Some("http://1.1.1.1:8080".to_string()))
            .await
            .unwrap();
        assert_eq!(probe.clients.lock().await.len(), 2);
        probe.client_for(&None).await.unwrap();
        assert_eq!(probe.clients.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn invalid_proxy_surfaces_a_build_error() {
        let probe = probe();
        assert!(probe
            .client_for(&Some("not a proxy url".to_string()))
            .await
            .is_err());
    }
}
