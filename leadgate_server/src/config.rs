//! Server configuration loaded from environment variables

use crate::abuse::user_agent::DEFAULT_BLOCKED_AGENTS;
use crate::abuse::{ClickFraudConfig, RateLimitConfig};
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// Host to bind to
    pub host: String,

    /// Public port for HTTP traffic
    pub port: u16,

    /// Read the client address from `X-Forwarded-For` (only behind a trusted proxy)
    pub trust_forwarded_for: bool,

    /// Bearer token for the admin API; admin routes are disabled when unset
    pub admin_token: Option<String>,

    /// Webhook receiving alerts; alerts are only logged when unset
    pub alert_webhook_url: Option<String>,

    /// How often expired gate state is swept
    pub cleanup_interval: Duration,

    /// Admission gate tunables
    pub gate: GateConfig,
}

/// Tunables of the admission gate
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub rate_limit: RateLimitConfig,

    pub clicks: ClickFraudConfig,

    /// Case-insensitive user-agent substrings that flag a client on sight
    pub blocked_user_agents: Vec<String>,

    /// How long a suspicion flag lasts (`None` = until restart)
    pub suspicion_ttl: Option<Duration>,

    /// Distinct keys kept per map before the stalest idle one is evicted
    /// (0 = uncapped). Active lockouts and live flags are never evicted.
    pub max_tracked_clients: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig::default(),
            clicks: ClickFraudConfig::default(),
            blocked_user_agents: DEFAULT_BLOCKED_AGENTS.clone(),
            suspicion_ttl: None,
            max_tracked_clients: 100_000,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let rate_limit = RateLimitConfig::new(
            parse_or(&var, "RATE_LIMIT_MAX_REQUESTS", 50)?,
            parse_or(&var, "RATE_LIMIT_WINDOW_SECS", 60)?,
            parse_or(&var, "LOCKOUT_SECS", 300)?,
        );

        let clicks = ClickFraudConfig {
            window: Duration::from_secs(parse_or(&var, "CLICK_WINDOW_SECS", 600)?),
            threshold: parse_or(&var, "CLICK_THRESHOLD", 20)?,
            score_threshold: parse_or(&var, "FRAUD_SCORE_THRESHOLD", 0.8)?,
            signal_weight: parse_or(&var, "FRAUD_SIGNAL_WEIGHT", 0.3)?,
        };

        let blocked_user_agents = match var("BLOCKED_USER_AGENTS") {
            Some(list) => list
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => DEFAULT_BLOCKED_AGENTS.clone(),
        };

        let suspicion_ttl = match parse_or::<u64>(&var, "SUSPICION_TTL_SECS", 0)? {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        let config = Self {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: var("PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidPort)?,
            trust_forwarded_for: parse_bool(&var, "TRUST_FORWARDED_FOR")?,
            admin_token: var("ADMIN_TOKEN"),
            alert_webhook_url: var("ALERT_WEBHOOK_URL"),
            cleanup_interval: Duration::from_secs(parse_or(&var, "CLEANUP_INTERVAL_SECS", 60)?),
            gate: GateConfig {
                rate_limit,
                clicks,
                blocked_user_agents,
                suspicion_ttl,
                max_tracked_clients: parse_or(&var, "MAX_TRACKED_CLIENTS", 100_000)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let gate = &self.gate;

        if gate.rate_limit.max_requests == 0 {
            return Err(ConfigError::OutOfRange("RATE_LIMIT_MAX_REQUESTS", "must be at least 1"));
        }
        if gate.rate_limit.window.is_zero() {
            return Err(ConfigError::OutOfRange("RATE_LIMIT_WINDOW_SECS", "must be at least 1"));
        }
        if gate.clicks.window.is_zero() {
            return Err(ConfigError::OutOfRange("CLICK_WINDOW_SECS", "must be at least 1"));
        }
        if gate.clicks.threshold == 0 {
            return Err(ConfigError::OutOfRange("CLICK_THRESHOLD", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&gate.clicks.score_threshold) {
            return Err(ConfigError::OutOfRange("FRAUD_SCORE_THRESHOLD", "must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&gate.clicks.signal_weight) {
            return Err(ConfigError::OutOfRange("FRAUD_SIGNAL_WEIGHT", "must be within [0, 1]"));
        }
        if self.cleanup_interval.is_zero() {
            return Err(ConfigError::OutOfRange("CLEANUP_INTERVAL_SECS", "must be at least 1"));
        }

        Ok(())
    }
}

fn parse_or<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key, raw)),
        None => Ok(default),
    }
}

fn parse_bool(var: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<bool, ConfigError> {
    match var(key).map(|v| v.trim().to_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue(key, v)),
        },
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid value for {0}: {1:?}")]
    InvalidValue(&'static str, String),

    #[error("{0} {1}")]
    OutOfRange(&'static str, &'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert!(!config.trust_forwarded_for);
        assert!(config.admin_token.is_none());

        let gate = &config.gate;
        assert_eq!(gate.rate_limit.max_requests, 50);
        assert_eq!(gate.rate_limit.window, Duration::from_secs(60));
        assert_eq!(gate.rate_limit.lockout, Duration::from_secs(300));
        assert_eq!(gate.clicks.window, Duration::from_secs(600));
        assert_eq!(gate.clicks.threshold, 20);
        assert_eq!(gate.clicks.score_threshold, 0.8);
        assert_eq!(gate.blocked_user_agents.len(), 3);
        assert!(gate.suspicion_ttl.is_none());
        assert_eq!(gate.max_tracked_clients, 100_000);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("PORT", "9000"),
            ("RATE_LIMIT_MAX_REQUESTS", "5"),
            ("LOCKOUT_SECS", "30"),
            ("BLOCKED_USER_AGENTS", "scrapy, ,clickbot"),
            ("SUSPICION_TTL_SECS", "3600"),
            ("TRUST_FORWARDED_FOR", "true"),
            ("ADMIN_TOKEN", "secret"),
        ])
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.gate.rate_limit.max_requests, 5);
        assert_eq!(config.gate.rate_limit.lockout, Duration::from_secs(30));
        assert_eq!(config.gate.blocked_user_agents, vec!["scrapy", "clickbot"]);
        assert_eq!(config.gate.suspicion_ttl, Some(Duration::from_secs(3600)));
        assert!(config.trust_forwarded_for);
        assert_eq!(config.admin_token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = load(&[("ADMIN_TOKEN", "  "), ("CLICK_THRESHOLD", "")]).unwrap();
        assert!(config.admin_token.is_none());
        assert_eq!(config.gate.clicks.threshold, 20);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(load(&[("PORT", "http")]), Err(ConfigError::InvalidPort)));
        assert!(matches!(
            load(&[("CLICK_THRESHOLD", "many")]),
            Err(ConfigError::InvalidValue("CLICK_THRESHOLD", _))
        ));
        assert!(matches!(
            load(&[("TRUST_FORWARDED_FOR", "maybe")]),
            Err(ConfigError::InvalidValue("TRUST_FORWARDED_FOR", _))
        ));
        assert!(matches!(
            load(&[("RATE_LIMIT_MAX_REQUESTS", "0")]),
            Err(ConfigError::OutOfRange("RATE_LIMIT_MAX_REQUESTS", _))
        ));
        assert!(matches!(
            load(&[("FRAUD_SCORE_THRESHOLD", "1.5")]),
            Err(ConfigError::OutOfRange("FRAUD_SCORE_THRESHOLD", _))
        ));
    }
}
