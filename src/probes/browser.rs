//! Browser-automation engine probe.
//!
//! Engines that block plain HTTP clients or require JavaScript (Google,
//! Brave) are probed through a real Chromium session driven over CDP. Each
//! probe launches a fresh browser, navigates the `site:` query, polls the
//! rendered page for a count, and tears the browser down again.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use chrono::Utc;
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};

use crate::modules::fingerprint::FingerprintRandomizer;
use crate::modules::proxy::ProxyPool;
use crate::modules::rate_limit::RateLimiter;
use crate::probes::{
    count_from_html, engines, AbstainReason, Engine, EngineEndpoint, EngineProbe, EngineResult,
    ProbeOutcome,
};

#[derive(Debug, Clone)]
pub struct BrowserProbeConfig {
    pub headless: bool,
    /// How long to poll the rendered page for a count element.
    pub element_wait: Duration,
    /// Settle time after navigation before the first poll.
    pub nav_wait: Duration,
    /// Hard ceiling on one probe attempt, browser launch included.
    pub page_timeout: Duration,
    /// Explicit browser binary; auto-discovered when unset.
    pub chrome_executable: Option<String>,
}

impl Default for BrowserProbeConfig {
    fn default() -> Self {
        Self {
            headless: true,
            element_wait: Duration::from_secs(10),
            nav_wait: Duration::from_secs(2),
            page_timeout: Duration::from_secs(30),
            chrome_executable: None,
        }
    }
}

/// Locate a Chromium-family binary: `CHROME_EXECUTABLE`, then PATH, then
/// well-known install locations.
pub fn find_chrome_executable() -> Option<String> {
    if let Ok(path) = std::env::var("CHROME_EXECUTABLE")
        && Path::new(&path).exists()
    {
        return Some(path);
    }

    if let Ok(path_var) = std::env::var("PATH") {
        let names = [
            "google-chrome",
            "chromium",
            "chromium-browser",
            "chrome",
            "brave-browser",
        ];
        for dir in std::env::split_paths(&path_var) {
            for name in names {
                let full = dir.join(name);
                if full.exists() {
                    return Some(full.to_string_lossy().to_string());
                }
            }
        }
    }

    #[cfg(target_os = "linux")]
    let known = [
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/usr/bin/brave-browser",
    ];
    #[cfg(target_os = "macos")]
    let known = [
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
    ];
    #[cfg(target_os = "windows")]
    let known = [
        r"C:\Program Files\Google\Chrome\Application\chrome.exe",
        r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    ];

    known
        .iter()
        .find(|path| Path::new(path).exists())
        .map(|path| path.to_string())
}

/// Probes one engine through a headless (by default) Chromium session.
pub struct BrowserProbe {
    endpoint: &'static EngineEndpoint,
    config: BrowserProbeConfig,
    fingerprints: Arc<FingerprintRandomizer>,
    rate_limiter: Arc<RateLimiter>,
    proxies: Arc<ProxyPool>,
}

impl BrowserProbe {
    pub fn new(
        endpoint: &'static EngineEndpoint,
        config: BrowserProbeConfig,
        fingerprints: Arc<FingerprintRandomizer>,
        rate_limiter: Arc<RateLimiter>,
        proxies: Arc<ProxyPool>,
    ) -> Self {
        Self {
            endpoint,
            config,
            fingerprints,
            rate_limiter,
            proxies,
        }
    }

    fn browser_config(
        &self,
        user_agent: &str,
        proxy: Option<&str>,
    ) -> Result<BrowserConfig, String> {
        let executable = self
            .config
            .chrome_executable
            .clone()
            .or_else(find_chrome_executable)
            .ok_or_else(|| "no chromium-family browser found".to_string())?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(executable)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--mute-audio")
            .arg(format!("--user-agent={user_agent}"));

        if let Some(proxy) = proxy {
            builder = builder.arg(format!("--proxy-server={proxy}"));
        }
        if !self.config.headless {
            builder = builder.with_head();
        }

        builder.build()
    }

    /// Poll the rendered page until a count appears or the wait expires.
    /// Interstitial block pages trigger one backoff-and-retry with an
    /// `inurl:` query before giving up.
    async fn poll_for_count(&self, page: &Page, domain: &str) -> ProbeOutcome {
        let engine = self.endpoint.engine;
        let deadline = Instant::now() + self.config.element_wait;
        let mut retried_blocked = false;
        let mut last_snippet = String::new();

        loop {
            match page.content().await {
                Ok(html) => {
                    if let Some(count) = count_from_html(&html, self.endpoint) {
                        log::debug!("{engine} reported {count} results for {domain}");
                        return ProbeOutcome::Counted(count);
                    }

                    let lowered = html.to_lowercase();
                    if !retried_blocked
                        && (lowered.contains("detected unusual traffic")
                            || lowered.contains("captcha"))
                    {
                        retried_blocked = true;
                        let backoff = self.rate_limiter.backoff_time(engine.as_str()).await;
                        log::warn!(
                            "{engine} served a block page for {domain}, retrying with \
                             inurl after {backoff:?}"
                        );
                        sleep(backoff).await;
                        let retry_url = self
                            .endpoint
                            .search_url_for(&engines::inurl_query(domain));
                        if let Err(err) = page.goto(retry_url).await {
                            return ProbeOutcome::Abstained(AbstainReason::Navigation(
                                err.to_string(),
                            ));
                        }
                        sleep(self.config.nav_wait).await;
                        continue;
                    }

                    last_snippet = html.chars().take(500).collect();
                }
                Err(err) => {
                    return ProbeOutcome::Abstained(AbstainReason::Navigation(err.to_string()));
                }
            }

            if Instant::now() >= deadline {
                let url = page
                    .url()
                    .await
                    .ok()
                    .flatten()
                    .unwrap_or_else(|| "<unknown>".to_string());
                log::debug!(
                    "{engine} page for {domain} never showed a count (url {url}, \
                     page starts: {last_snippet})"
                );
                return ProbeOutcome::Abstained(AbstainReason::NoCountElement);
            }
            sleep(Duration::from_millis(250)).await;
        }
    }

    async fn probe_inner(&self, domain: &str, proxy: Option<&str>) -> ProbeOutcome {
        let fingerprint = self.fingerprints.generate();
        let browser_config = match self.browser_config(&fingerprint.user_agent, proxy) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("browser setup failed for {}: {err}", self.endpoint.engine);
                return ProbeOutcome::Abstained(AbstainReason::BrowserSetup(err));
            }
        };

        let (mut browser, mut handler) = match Browser::launch(browser_config).await {
            Ok(launched) => launched,
            Err(err) => {
                log::warn!("browser launch failed for {}: {err}", self.endpoint.engine);
                return ProbeOutcome::Abstained(AbstainReason::BrowserSetup(err.to_string()));
            }
        };

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    log::debug!("cdp handler event error: {err}");
                }
            }
        });

        let url = self.endpoint.search_url_for(&engines::site_query(domain));
        let outcome = match browser.new_page(url).await {
            Ok(page) => {
                sleep(self.config.nav_wait).await;
                self.poll_for_count(&page, domain).await
            }
            Err(err) => ProbeOutcome::Abstained(AbstainReason::Navigation(err.to_string())),
        };

        // Close errors must not shadow the probe outcome.
        if let Err(err) = browser.close().await {
            log::debug!("browser close failed: {err}");
        }
        handler_task.abort();
        outcome
    }
}

#[async_trait]
impl EngineProbe for BrowserProbe {
    fn engine(&self) -> Engine {
        self.endpoint.engine
    }

    async fn probe(&self, domain: &str) -> EngineResult {
        let engine = self.endpoint.engine;
        self.rate_limiter.wait(engine.as_str()).await;

        let started = Instant::now();
        let proxy = self.proxies.rotate_and_current();

        let outcome = match timeout(
            self.config.page_timeout,
            self.probe_inner(domain, proxy.as_deref()),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                log::warn!("{engine} probe for {domain} hit the page timeout");
                ProbeOutcome::Abstained(AbstainReason::Navigation("page timeout".to_string()))
            }
        };

        if let Some(proxy) = &proxy {
            // Setup failures say nothing about the proxy.
            match &outcome {
                ProbeOutcome::Counted(_) => {
                    self.proxies.record_outcome_for(proxy, true, started.elapsed())
                }
                ProbeOutcome::Abstained(AbstainReason::NoCountElement) => {
                    self.proxies.record_outcome_for(proxy, true, started.elapsed())
                }
                ProbeOutcome::Abstained(AbstainReason::Navigation(_)) => {
                    self.proxies.record_outcome_for(proxy, false, started.elapsed())
                }
                ProbeOutcome::Abstained(_) => {}
            }
        }

        EngineResult {
            engine,
            domain: domain.to_string(),
            outcome,
            timestamp: Utc::now(),
            latency: started.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe() -> BrowserProbe {
        BrowserProbe::new(
            &engines::GOOGLE,
            BrowserProbeConfig::default(),
            Arc::new(FingerprintRandomizer::new()),
            Arc::new(RateLimiter::default()),
            Arc::new(ProxyPool::default()),
        )
    }

    #[test]
    fn reports_its_engine() {
        assert_eq!(probe().engine(), Engine::Google);
    }

    #[test]
    fn explicit_executable_overrides_discovery() {
        let mut config = BrowserProbeConfig::default();
        config.chrome_executable = Some("/nonexistent/chrome".to_string());
        let probe = BrowserProbe::new(
            &engines::GOOGLE,
            config,
            Arc::new(FingerprintRandomizer::new()),
            Arc::new(RateLimiter::default()),
            Arc::new(ProxyPool::default()),
        );
        // Config construction does not verify the binary exists; launch does.
        assert!(probe.browser_config("agent", None).is_ok());
    }
}
