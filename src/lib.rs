//! # linkrank-rs
//!
//! Backlink authority scoring over public search engines.
//!
//! Probes several engines for how many pages they index under a domain,
//! validates the raw counts against history, and compresses them into a
//! single 0-100 authority score. Ships a form-discovery crawler and a
//! human-gated submitter for directory listings on the side.
//!
//! ## Features
//!
//! - Concurrent direct-HTTP and browser-automation engine probes
//! - Per-request fingerprint randomization and proxy rotation
//! - Per-engine rate limiting with exponential backoff
//! - Anomaly rejection against per-domain count history
//! - Performance monitoring with threshold alerting
//! - Log-scaled authority scoring with an engine-diversity bonus
//!
//! ## Example
//!
//! ```no_run
//! use linkrank_rs::AuthorityChecker;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let checker = AuthorityChecker::builder()
//!         .disable_browser_probes()
//!         .build();
//!     let score = checker.check_authority("example.com").await?;
//!     println!("{} scored {}", score.domain, score.final_score);
//!     Ok(())
//! }
//! ```

mod checker;

pub mod forms;
pub mod modules;
pub mod probes;

pub use crate::checker::{
    AuthorityChecker,
    AuthorityCheckerBuilder,
    AuthorityError,
    AuthorityResult,
};

pub use crate::modules::performance::{EngineSummary, PerformanceMonitor, PerformanceThresholds};
pub use crate::modules::proxy::{ProxyPool, ProxyPoolConfig, ProxyStats, ProxySummary};
pub use crate::modules::rate_limit::{RateLimiter, RateLimiterConfig};
pub use crate::modules::scoring::{AuthorityScore, AuthorityScorer};
pub use crate::modules::validator::{ResultValidator, ValidatorConfig};

pub use crate::modules::fingerprint::{Fingerprint, FingerprintRandomizer};

pub use crate::probes::{
    AbstainReason,
    BrowserProbe,
    BrowserProbeConfig,
    Engine,
    EngineProbe,
    EngineResult,
    HttpProbe,
    ProbeOutcome,
};

pub use crate::forms::{
    FormDiscovery,
    FormError,
    FormSubmitter,
    SubmissionForm,
    SubmitterConfig,
};

/// Crate version, for reports and diagnostics.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
