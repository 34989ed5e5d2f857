//! Supporting subsystems shared by the probes and the checker.

pub mod fingerprint;
pub mod performance;
pub mod proxy;
pub mod rate_limit;
pub mod scoring;
pub mod validator;

pub use fingerprint::{Fingerprint, FingerprintRandomizer};
pub use performance::{PerformanceMonitor, PerformanceThresholds};
pub use proxy::{ProxyPool, ProxyPoolConfig};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use scoring::{AuthorityScore, AuthorityScorer};
pub use validator::{ResultValidator, ValidatorConfig};
