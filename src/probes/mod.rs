//! Engine probes: ask a search engine how many pages it indexes for a
//! domain, and say so explicitly when no answer could be obtained.
//!
//! A probe never reports zero because of its own failure. Transport errors,
//! blocks, and missing page elements all surface as [`ProbeOutcome::Abstained`]
//! so downstream consumers can distinguish "the engine said zero" from
//! "we never got an answer".

pub mod browser;
pub mod engines;
pub mod http;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::fmt;
use std::time::Duration;

pub use browser::{BrowserProbe, BrowserProbeConfig};
pub use engines::{Engine, EngineEndpoint};
pub use http::HttpProbe;

/// Why a probe produced no count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbstainReason {
    /// The engine answered with a non-success status.
    HttpStatus(u16),
    /// The request never completed.
    Transport(String),
    /// The page rendered but carried no recognizable count or results.
    NoCountElement,
    /// The browser could not be launched or configured.
    BrowserSetup(String),
    /// The browser launched but navigation or rendering failed.
    Navigation(String),
}

impl fmt::Display for AbstainReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbstainReason::HttpStatus(status) => write!(f, "http status {status}"),
            AbstainReason::Transport(err) => write!(f, "transport error: {err}"),
            AbstainReason::NoCountElement => write!(f, "no count element on page"),
            AbstainReason::BrowserSetup(err) => write!(f, "browser setup failed: {err}"),
            AbstainReason::Navigation(err) => write!(f, "navigation failed: {err}"),
        }
    }
}

/// A counted result, or an explicit abstention with its cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Counted(u64),
    Abstained(AbstainReason),
}

impl ProbeOutcome {
    pub fn count(&self) -> Option<u64> {
        match self {
            ProbeOutcome::Counted(count) => Some(*count),
            ProbeOutcome::Abstained(_) => None,
        }
    }
}

/// One probe attempt against one engine.
#[derive(Debug, Clone)]
pub struct EngineResult {
    pub engine: Engine,
    pub domain: String,
    pub outcome: ProbeOutcome,
    pub timestamp: DateTime<Utc>,
    pub latency: Duration,
}

/// A strategy for extracting a backlink count from one engine.
#[async_trait]
pub trait EngineProbe: Send + Sync {
    fn engine(&self) -> Engine;

    /// Probe the engine for `domain`. Infrastructure failures abstain rather
    /// than error; `Err` is reserved for misuse such as an invalid domain.
    async fn probe(&self, domain: &str) -> EngineResult;
}

static COUNT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([\d][\d,.\u{202f}\u{00a0}]*)").unwrap());

/// Pull the first number out of a count banner such as
/// "About 1,230,000 results". Separators vary by locale.
pub(crate) fn extract_count(text: &str) -> Option<u64> {
    let captured = COUNT_PATTERN.captures(text)?.get(1)?.as_str();
    let digits: String = captured.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Parse an engine results page. Prefers the explicit count banner; falls
/// back to counting visible result entries. Synchronous on purpose: parsed
/// documents are not `Send` and must never be held across an await.
pub(crate) fn count_from_html(html: &str, endpoint: &EngineEndpoint) -> Option<u64> {
    let document = Html::parse_document(html);

    for selector in endpoint.count_selectors {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let text: String = element.text().collect();
            if let Some(count) = extract_count(&text) {
                return Some(count);
            }
        }
    }

    for selector in endpoint.result_selectors {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        let visible = document.select(&selector).count();
        if visible > 0 {
            return Some(visible as u64);
        }
    }

    None
}
