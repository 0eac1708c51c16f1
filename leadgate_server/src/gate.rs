//! Global admission gate
//!
//! Every request passes through [`admission_middleware`] before it reaches a
//! handler. The gate first applies the rate limiter, then refuses clients in
//! the suspicion registry. Affiliate handlers feed clicks into the fraud
//! detector through the gate, which applies any resulting flag; the
//! middleware itself never runs the detector.

use crate::abuse::{
    ClickFraudDetector, ClickVerdict, FraudScorer, LinearScorer, RateLimitDecision,
    RateLimitResult, RateLimiter, SuspicionRegistry, UserAgentFilter,
};
use crate::config::GateConfig;
use crate::routes::AppState;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use leadgate_common::{constants, ClientKey, ErrorBody, FlagReason, GateStats, PartnerId, SuspectInfo};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Why the gate refused a request
#[derive(Debug, thiserror::Error)]
pub enum Rejection {
    #[error("{}", constants::RATE_LIMITED_MESSAGE)]
    LockedOut(RateLimitResult),

    #[error("{}", constants::LOCKED_OUT_MESSAGE)]
    LockoutStarted(RateLimitResult),

    #[error("{}", constants::ACCESS_DENIED_MESSAGE)]
    Suspicious,
}

impl Rejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::LockedOut(_) | Rejection::LockoutStarted(_) => StatusCode::TOO_MANY_REQUESTS,
            Rejection::Suspicious => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorBody::new(self.to_string()));
        let mut response = (status, body).into_response();

        if let Rejection::LockedOut(result) | Rejection::LockoutStarted(result) = &self {
            let headers = response.headers_mut();
            headers.insert(axum::http::header::RETRY_AFTER, HeaderValue::from(result.reset_in_secs));
            for (name, value) in result.headers() {
                if let (Ok(name), Ok(value)) =
                    (HeaderName::try_from(name), HeaderValue::from_str(&value))
                {
                    headers.insert(name, value);
                }
            }
        }

        response
    }
}

#[derive(Default)]
struct GateCounters {
    admitted: AtomicU64,
    rate_limited: AtomicU64,
    denied: AtomicU64,
    flagged: AtomicU64,
}

/// What happened to a recorded click
#[derive(Debug, Clone)]
pub struct ClickOutcome {
    pub verdict: ClickVerdict,
    /// The click put a previously clean client in the registry
    pub newly_flagged: bool,
}

/// Owns all admission and fraud state for the process
pub struct AdmissionGate {
    limiter: RateLimiter,
    suspicion: SuspicionRegistry,
    detector: ClickFraudDetector,
    counters: GateCounters,
    started_at: Instant,
}

impl AdmissionGate {
    /// Build a gate with the default linear fraud scorer
    pub fn new(config: &GateConfig) -> Self {
        let scorer = LinearScorer::new(
            f64::from(config.clicks.threshold),
            config.clicks.signal_weight,
        );
        Self::with_scorer(config, Arc::new(scorer))
    }

    pub fn with_scorer(config: &GateConfig, scorer: Arc<dyn FraudScorer>) -> Self {
        let capacity = config.max_tracked_clients;
        Self {
            limiter: RateLimiter::new(config.rate_limit.clone(), capacity),
            suspicion: SuspicionRegistry::new(config.suspicion_ttl, capacity),
            detector: ClickFraudDetector::new(
                config.clicks.clone(),
                UserAgentFilter::new(&config.blocked_user_agents),
                scorer,
                capacity,
            ),
            counters: GateCounters::default(),
            started_at: Instant::now(),
        }
    }

    /// Decide whether a request from `client` may proceed to its handler
    pub fn admit(&self, client: &ClientKey, now: Instant) -> Result<RateLimitResult, Rejection> {
        let result = self.limiter.check(client, now);

        if !result.allowed() {
            self.counters.rate_limited.fetch_add(1, Ordering::Relaxed);
            return Err(match result.decision {
                RateLimitDecision::LockoutStarted => Rejection::LockoutStarted(result),
                _ => {
                    tracing::warn!(client = %client, "Request rejected, client locked out");
                    Rejection::LockedOut(result)
                }
            });
        }

        if self.suspicion.is_suspicious(client, now) {
            self.counters.denied.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(client = %client, "Request blocked, client suspected of fraud");
            return Err(Rejection::Suspicious);
        }

        self.counters.admitted.fetch_add(1, Ordering::Relaxed);
        Ok(result)
    }

    /// Record a click on a basic affiliate link
    pub fn record_click(&self, partner: &PartnerId, client: &ClientKey, now: Instant) -> ClickOutcome {
        let verdict = self.detector.inspect(partner, client, now);
        self.apply(client, verdict, now)
    }

    /// Record a click on an advanced affiliate link
    pub fn record_click_advanced(
        &self,
        partner: &PartnerId,
        client: &ClientKey,
        user_agent: Option<&str>,
        now: Instant,
    ) -> ClickOutcome {
        let verdict = self.detector.inspect_advanced(partner, client, user_agent, now);
        self.apply(client, verdict, now)
    }

    fn apply(&self, client: &ClientKey, verdict: ClickVerdict, now: Instant) -> ClickOutcome {
        let newly_flagged = match &verdict {
            ClickVerdict::Fraudulent(reason) => self.flag(client, reason.clone(), now),
            ClickVerdict::Clean { clicks, score } => {
                tracing::debug!(client = %client, clicks, score = ?score, "Affiliate click recorded");
                false
            }
        };
        ClickOutcome { verdict, newly_flagged }
    }

    /// Flag a client. Returns `true` if it was not already flagged.
    pub fn flag(&self, client: &ClientKey, reason: FlagReason, now: Instant) -> bool {
        let description = reason.describe();
        let fresh = self.suspicion.flag(client, reason, now);
        if fresh {
            self.counters.flagged.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(client = %client, reason = %description, "Client flagged as suspicious");
        }
        fresh
    }

    /// Clear a suspicion flag along with the client's click history
    pub fn unflag(&self, client: &ClientKey) -> bool {
        self.detector.forget(client);
        let removed = self.suspicion.unflag(client);
        if removed {
            tracing::info!(client = %client, "Client unflagged");
        }
        removed
    }

    pub fn lift_lockout(&self, client: &ClientKey) -> bool {
        let lifted = self.limiter.lift_lockout(client);
        if lifted {
            tracing::info!(client = %client, "Lockout lifted");
        }
        lifted
    }

    pub fn suspects(&self) -> Vec<SuspectInfo> {
        self.suspicion.list()
    }

    pub fn stats(&self) -> GateStats {
        GateStats {
            admitted: self.counters.admitted.load(Ordering::Relaxed),
            rate_limited: self.counters.rate_limited.load(Ordering::Relaxed),
            denied: self.counters.denied.load(Ordering::Relaxed),
            flagged: self.counters.flagged.load(Ordering::Relaxed),
            tracked_clients: self.limiter.tracked_clients(),
            active_lockouts: self.limiter.active_lockouts(),
            tracked_click_streams: self.detector.tracked_streams(),
            suspects: self.suspicion.len(),
            uptime_seconds: self.started_at.elapsed().as_secs(),
        }
    }

    /// Drop expired windows, lockouts and flags
    pub fn cleanup(&self, now: Instant) {
        self.limiter.cleanup(now);
        self.detector.cleanup(now);
        self.suspicion.cleanup(now);
    }
}

/// Derive the client key for a request.
///
/// With `trust_forwarded_for`, the left-most `X-Forwarded-For` address wins.
/// Requests with no usable address share the anonymous key.
pub fn client_key(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded_for: bool,
) -> ClientKey {
    if trust_forwarded_for {
        let forwarded = headers
            .get(constants::FORWARDED_FOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        if let Some(addr) = forwarded {
            return ClientKey::new(addr);
        }
    }

    match peer {
        Some(addr) => ClientKey::from(addr.ip()),
        None => {
            tracing::warn!("No client address for request, using anonymous key");
            ClientKey::anonymous()
        }
    }
}

/// Middleware running the gate in front of every handler.
///
/// Admitted requests carry their [`ClientKey`] as a request extension.
pub async fn admission_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_key(request.headers(), peer, state.config.trust_forwarded_for);

    match state.gate.admit(&client, Instant::now()) {
        Ok(result) => tracing::debug!(
            client = %client,
            path = %request.uri().path(),
            requests = result.current,
            remaining = result.remaining,
            "Request admitted"
        ),
        Err(rejection) => return rejection.into_response(),
    }

    request.extensions_mut().insert(client);
    next.run(request).await
}

/// Periodically sweep expired gate state
pub async fn run_sweeper(gate: Arc<AdmissionGate>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    tracing::info!("Gate sweeper started (interval: {:?})", every);

    loop {
        interval.tick().await;
        gate.cleanup(Instant::now());

        let stats = gate.stats();
        tracing::debug!(
            tracked_clients = stats.tracked_clients,
            active_lockouts = stats.active_lockouts,
            click_streams = stats.tracked_click_streams,
            suspects = stats.suspects,
            "Gate state swept"
        );
    }
}
