//! Affiliate click-fraud detection
//!
//! Clicks are logged per (partner, client) in a sliding window. The basic
//! check only looks at click frequency. The advanced check additionally
//! screens the user-agent first and runs the fraud scorer last.
//!
//! The detector only produces verdicts; flagging is applied by the gate.

use super::scoring::FraudScorer;
use super::user_agent::{AgentCheck, UserAgentFilter};
use super::window::{self, EventLog};
use dashmap::DashMap;
use leadgate_common::{ClientKey, FlagReason, PartnerId};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct ClickFraudConfig {
    /// Trailing window for click counting
    pub window: Duration,
    /// Clicks allowed in the window before the client is flagged
    pub threshold: u32,
    /// Fraud score above which the client is flagged
    pub score_threshold: f64,
    /// Weight of the random signal in the heuristic score
    pub signal_weight: f64,
}

impl Default for ClickFraudConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(600),
            threshold: 20,
            score_threshold: 0.8,
            signal_weight: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClickVerdict {
    /// Click looks legitimate
    Clean { clicks: u32, score: Option<f64> },
    /// Client should be flagged
    Fraudulent(FlagReason),
}

impl ClickVerdict {
    pub fn is_fraudulent(&self) -> bool {
        matches!(self, ClickVerdict::Fraudulent(_))
    }
}

type ClickStream = (PartnerId, ClientKey);

pub struct ClickFraudDetector {
    config: ClickFraudConfig,
    capacity: usize,
    agents: UserAgentFilter,
    scorer: Arc<dyn FraudScorer>,
    clicks: DashMap<ClickStream, EventLog>,
}

impl ClickFraudDetector {
    pub fn new(
        config: ClickFraudConfig,
        agents: UserAgentFilter,
        scorer: Arc<dyn FraudScorer>,
        capacity: usize,
    ) -> Self {
        Self {
            config,
            capacity,
            agents,
            scorer,
            clicks: DashMap::new(),
        }
    }

    /// Basic check: click frequency only
    pub fn inspect(&self, partner: &PartnerId, client: &ClientKey, now: Instant) -> ClickVerdict {
        let clicks = self.log_click(partner, client, now);

        if clicks > self.config.threshold {
            tracing::warn!(
                client = %client,
                partner = %partner,
                clicks,
                "Affiliate click threshold exceeded"
            );
            return ClickVerdict::Fraudulent(FlagReason::ClickFrequency {
                partner: partner.clone(),
                clicks,
            });
        }

        ClickVerdict::Clean { clicks, score: None }
    }

    /// Advanced check: user-agent, then frequency, then heuristic score.
    ///
    /// A blocked user-agent short-circuits before the click is logged.
    pub fn inspect_advanced(
        &self,
        partner: &PartnerId,
        client: &ClientKey,
        user_agent: Option<&str>,
        now: Instant,
    ) -> ClickVerdict {
        if let AgentCheck::Blocked(pattern) = self.agents.check(user_agent.unwrap_or_default()) {
            tracing::warn!(
                client = %client,
                partner = %partner,
                user_agent = user_agent.unwrap_or_default(),
                "Affiliate hijacking user-agent"
            );
            return ClickVerdict::Fraudulent(FlagReason::UserAgent { pattern });
        }

        let clicks = match self.inspect(partner, client, now) {
            ClickVerdict::Clean { clicks, .. } => clicks,
            fraudulent => return fraudulent,
        };

        let score = self.scorer.score(clicks);
        if score > self.config.score_threshold {
            tracing::warn!(
                client = %client,
                partner = %partner,
                score,
                "Fraud score above threshold"
            );
            return ClickVerdict::Fraudulent(FlagReason::FraudScore {
                partner: partner.clone(),
                score,
            });
        }

        ClickVerdict::Clean {
            clicks,
            score: Some(score),
        }
    }

    fn log_click(&self, partner: &PartnerId, client: &ClientKey, now: Instant) -> u32 {
        let stream = (partner.clone(), client.clone());
        window::make_room(&self.clicks, &stream, self.capacity, |log| log.back().copied());

        let mut log = self.clicks.entry(stream).or_default();
        window::record(&mut log, now, self.config.window)
    }

    pub fn tracked_streams(&self) -> usize {
        self.clicks.len()
    }

    /// Forget every click stream of `client`
    pub fn forget(&self, client: &ClientKey) {
        self.clicks.retain(|(_, key), _| key != client);
    }

    /// Drop click streams with no clicks left in the window (call periodically)
    pub fn cleanup(&self, now: Instant) {
        let window = self.config.window;
        self.clicks.retain(|_, log| {
            window::prune(log, now, window);
            !log.is_empty()
        });
    }
}
