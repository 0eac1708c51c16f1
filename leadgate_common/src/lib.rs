//! Leadgate Common - Shared wire types for the admission gate
//!
//! This crate contains the JSON bodies and identifiers exchanged between the
//! gate server and the operator CLI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use thiserror::Error;

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },
}

/// Identifies the origin of a request, derived from its network address.
///
/// Addresses are trivially shared (NAT) and, behind a trusted proxy, spoofable.
/// All gate state is keyed by this value regardless.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientKey(String);

impl ClientKey {
    /// Key used when no network address can be determined
    pub const ANONYMOUS: &'static str = "unknown";

    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn anonymous() -> Self {
        Self(Self::ANONYMOUS.to_string())
    }

    pub fn is_anonymous(&self) -> bool {
        self.0 == Self::ANONYMOUS
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<IpAddr> for ClientKey {
    fn from(ip: IpAddr) -> Self {
        Self(ip.to_string())
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Affiliate partner identifier taken from the click URL
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartnerId(String);

impl PartnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a client was placed in the suspicion registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlagReason {
    /// User-agent matched a known-bad substring
    UserAgent { pattern: String },

    /// Too many clicks on one partner link inside the click window
    ClickFrequency { partner: PartnerId, clicks: u32 },

    /// Heuristic fraud score crossed the threshold
    FraudScore { partner: PartnerId, score: f64 },

    /// Flagged by an operator or a peer handler
    Manual { note: String },
}

impl FlagReason {
    pub fn describe(&self) -> String {
        match self {
            FlagReason::UserAgent { pattern } => format!("user-agent matched '{}'", pattern),
            FlagReason::ClickFrequency { partner, clicks } => {
                format!("{} clicks on partner {}", clicks, partner)
            }
            FlagReason::FraudScore { partner, score } => {
                format!("fraud score {:.2} on partner {}", score, partner)
            }
            FlagReason::Manual { note } => format!("manual: {}", note),
        }
    }
}

/// JSON body of every gate rejection and admin error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }

    /// Turn a non-success HTTP response body into a protocol error
    pub fn into_error(body: &str, status: u16) -> ProtocolError {
        let message = serde_json::from_str::<ErrorBody>(body)
            .map(|b| b.error)
            .unwrap_or_else(|_| body.to_string());
        ProtocolError::Server { status, message }
    }
}

/// Acknowledgment returned by the affiliate click endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickAck {
    pub message: String,
}

/// Health endpoint response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

/// Gate counters and map sizes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateStats {
    pub admitted: u64,
    pub rate_limited: u64,
    pub denied: u64,
    pub flagged: u64,
    pub tracked_clients: usize,
    pub active_lockouts: usize,
    pub tracked_click_streams: usize,
    pub suspects: usize,
    pub uptime_seconds: u64,
}

/// One entry of the suspicion registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspectInfo {
    pub client: ClientKey,
    pub reason: FlagReason,
    pub flagged_at: DateTime<Utc>,
}

/// Result of an unflag or unlock operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseResponse {
    pub client: ClientKey,
    pub released: bool,
}

/// Body of the cyber-attack analysis endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttackReport {
    #[serde(default)]
    pub attack_vector: Option<String>,
    #[serde(default)]
    pub severity_score: Option<f64>,
}

/// Response of the cyber-attack analysis endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackAnalysis {
    pub status: String,
    pub critical: bool,
}

/// Constants shared by server and CLI
pub mod constants {
    /// Rejection message for a client that is already locked out
    pub const RATE_LIMITED_MESSAGE: &str = "Too many requests. Please try again later.";

    /// Rejection message for the request that triggers a lockout
    pub const LOCKED_OUT_MESSAGE: &str = "Too many requests. IP locked.";

    /// Rejection message for a suspicious client
    pub const ACCESS_DENIED_MESSAGE: &str = "Access denied - suspected fraud.";

    /// Rate limit headers
    pub const RATE_LIMIT_LIMIT_HEADER: &str = "X-RateLimit-Limit";
    pub const RATE_LIMIT_REMAINING_HEADER: &str = "X-RateLimit-Remaining";
    pub const RATE_LIMIT_RESET_HEADER: &str = "X-RateLimit-Reset";

    /// Proxy header consulted when forwarded addresses are trusted
    pub const FORWARDED_FOR_HEADER: &str = "X-Forwarded-For";

    /// Severity above which an attack report is treated as critical
    pub const CRITICAL_SEVERITY: f64 = 7.0;

    /// Severity assumed when a report omits it
    pub const DEFAULT_SEVERITY: f64 = 5.0;
}
