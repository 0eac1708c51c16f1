//! User-agent blocklist for affiliate link hijacking

use once_cell::sync::Lazy;

/// Substrings of user-agents known to hijack or farm affiliate clicks
pub static DEFAULT_BLOCKED_AGENTS: Lazy<Vec<String>> = Lazy::new(|| {
    ["evil-bot", "hijack-curl", "fraud-crawler"]
        .into_iter()
        .map(str::to_string)
        .collect()
});

/// Result of user-agent validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentCheck {
    /// User-agent is allowed
    Allowed,
    /// User-agent contains the blocked substring
    Blocked(String),
}

/// Case-insensitive substring matcher over a fixed set of patterns
#[derive(Debug, Clone)]
pub struct UserAgentFilter {
    patterns: Vec<String>,
}

impl UserAgentFilter {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self { patterns }
    }

    /// Check a user-agent header value
    pub fn check(&self, user_agent: &str) -> AgentCheck {
        let user_agent = user_agent.to_lowercase();

        self.patterns
            .iter()
            .find(|pattern| user_agent.contains(pattern.as_str()))
            .map(|pattern| AgentCheck::Blocked(pattern.clone()))
            .unwrap_or(AgentCheck::Allowed)
    }
}

impl Default for UserAgentFilter {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCKED_AGENTS.iter())
    }
}
