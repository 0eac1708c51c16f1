//! Per-client rate limiting with temporary lockouts
//!
//! Each client has a sliding window of request timestamps. Exceeding the
//! window maximum locks the client out for a fixed duration, during which
//! requests are rejected without being recorded.

use super::window::{self, EventLog};
use dashmap::DashMap;
use leadgate_common::{constants, ClientKey};
use std::time::{Duration, Instant};

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests allowed in the window
    pub max_requests: u32,
    /// Time window duration
    pub window: Duration,
    /// How long a client stays locked out after exceeding the window
    pub lockout: Duration,
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window_secs: u64, lockout_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
            lockout: Duration::from_secs(lockout_secs),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(50, 60, 300)
    }
}

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Request is within limits
    Admitted,
    /// Client was already locked out; request not recorded
    LockedOut,
    /// This request exceeded the window and started a lockout
    LockoutStarted,
}

/// Result of a rate limit check
#[derive(Debug, Clone)]
pub struct RateLimitResult {
    pub decision: RateLimitDecision,
    /// Requests currently in the window
    pub current: u32,
    /// Maximum allowed in the window
    pub limit: u32,
    /// Seconds until the window frees a slot, or until the lockout ends
    pub reset_in_secs: u64,
    /// Remaining requests in this window
    pub remaining: u32,
}

impl RateLimitResult {
    pub fn allowed(&self) -> bool {
        self.decision == RateLimitDecision::Admitted
    }

    /// Create headers for rate limit response
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            (constants::RATE_LIMIT_LIMIT_HEADER, self.limit.to_string()),
            (constants::RATE_LIMIT_REMAINING_HEADER, self.remaining.to_string()),
            (constants::RATE_LIMIT_RESET_HEADER, self.reset_in_secs.to_string()),
        ]
    }
}

/// Request window and lockout state of one client
#[derive(Debug, Default)]
struct ClientWindow {
    log: EventLog,
    locked_since: Option<Instant>,
}

impl ClientWindow {
    /// Last activity for eviction; clients under an active lockout are pinned
    fn evictable_since(&self, now: Instant, lockout: Duration) -> Option<Instant> {
        match self.locked_since {
            Some(start) if now.saturating_duration_since(start) <= lockout => None,
            Some(start) => Some(self.log.back().copied().map_or(start, |t| t.max(start))),
            None => self.log.back().copied(),
        }
    }
}

/// In-memory sliding-window rate limiter with lockout escalation.
///
/// Each client's window and lockout live in a single map entry, so a check
/// is one atomic read-modify-write per key.
pub struct RateLimiter {
    config: RateLimitConfig,
    /// Distinct clients tracked before eviction kicks in (0 = uncapped)
    capacity: usize,
    clients: DashMap<ClientKey, ClientWindow>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, capacity: usize) -> Self {
        Self {
            config,
            capacity,
            clients: DashMap::new(),
        }
    }

    /// Check and record one request from `client` at `now`.
    ///
    /// Every call that is not rejected by an active lockout appends a
    /// timestamp, so repeated calls with the same `now` count separately.
    /// When a lockout has elapsed the window starts over.
    pub fn check(&self, client: &ClientKey, now: Instant) -> RateLimitResult {
        let window = self.config.window;
        let lockout = self.config.lockout;

        window::make_room(&self.clients, client, self.capacity, |w| {
            w.evictable_since(now, lockout)
        });

        let mut entry = self.clients.entry(client.clone()).or_default();
        let state = entry.value_mut();

        if let Some(started) = state.locked_since {
            let elapsed = now.saturating_duration_since(started);
            if elapsed <= lockout {
                let current = u32::try_from(state.log.len()).unwrap_or(u32::MAX);
                return self.locked(RateLimitDecision::LockedOut, lockout - elapsed, current);
            }

            state.locked_since = None;
            state.log.clear();
            tracing::info!(client = %client, "Lockout expired");
        }

        let current = window::record(&mut state.log, now, window);

        if current > self.config.max_requests {
            state.locked_since = Some(now);
            tracing::warn!(
                client = %client,
                requests = current,
                lockout_secs = lockout.as_secs(),
                "Rate limit exceeded, client locked out"
            );
            return self.locked(RateLimitDecision::LockoutStarted, lockout, current);
        }

        RateLimitResult {
            decision: RateLimitDecision::Admitted,
            current,
            limit: self.config.max_requests,
            reset_in_secs: window::reset_in_secs(&state.log, now, window),
            remaining: self.config.max_requests - current,
        }
    }

    fn locked(&self, decision: RateLimitDecision, left: Duration, current: u32) -> RateLimitResult {
        RateLimitResult {
            decision,
            current,
            limit: self.config.max_requests,
            // Lockout is still active at exactly `lockout` elapsed
            reset_in_secs: left.as_secs() + 1,
            remaining: 0,
        }
    }

    /// Lift a lockout and forget the client's request history
    pub fn lift_lockout(&self, client: &ClientKey) -> bool {
        self.clients
            .remove(client)
            .map(|(_, w)| w.locked_since.is_some())
            .unwrap_or(false)
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }

    pub fn active_lockouts(&self) -> usize {
        self.clients
            .iter()
            .filter(|entry| entry.locked_since.is_some())
            .count()
    }

    /// Drop expired lockouts and idle clients (call periodically)
    pub fn cleanup(&self, now: Instant) {
        let window = self.config.window;
        let lockout = self.config.lockout;

        self.clients.retain(|_, w| {
            if let Some(start) = w.locked_since {
                if now.saturating_duration_since(start) <= lockout {
                    return true;
                }
                w.locked_since = None;
                w.log.clear();
            }
            window::prune(&mut w.log, now, window);
            !w.log.is_empty()
        });
    }
}
