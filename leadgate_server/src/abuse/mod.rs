//! Abuse prevention module
//!
//! Provides protection against:
//! - Request flooding (sliding-window rate limiting with lockouts)
//! - Affiliate click fraud (frequency, user-agent and score heuristics)
//! - Repeat offenders (suspicion registry consulted by the gate)

pub mod click_fraud;
pub mod rate_limit;
pub mod scoring;
pub mod suspicion;
pub mod user_agent;
pub mod window;

pub use click_fraud::{ClickFraudConfig, ClickFraudDetector, ClickVerdict};
pub use rate_limit::{RateLimitConfig, RateLimitDecision, RateLimitResult, RateLimiter};
pub use scoring::{FraudScorer, LinearScorer};
pub use suspicion::SuspicionRegistry;
pub use user_agent::UserAgentFilter;
