//! Admin commands (status, suspects, unflag, unlock)

use crate::api::GateClient;
use crate::config::Config;
use anyhow::Result;
use console::style;

/// Show gate statistics
pub async fn status() -> Result<()> {
    let config = Config::load()?;
    config.require_auth()?;
    let stats = GateClient::new(&config).stats().await?;

    println!("Gate: {}", config.base_url());
    println!("Uptime: {}", format_uptime(stats.uptime_seconds));
    println!();
    println!("Requests:");
    println!("  Admitted:      {}", stats.admitted);
    println!("  Rate limited:  {}", stats.rate_limited);
    println!("  Denied:        {}", stats.denied);
    println!("  Flagged:       {}", stats.flagged);
    println!();
    println!("Tracked state:");
    println!("  Clients:        {}", stats.tracked_clients);
    println!("  Lockouts:       {}", stats.active_lockouts);
    println!("  Click streams:  {}", stats.tracked_click_streams);
    println!("  Suspects:       {}", stats.suspects);

    Ok(())
}

/// List flagged clients
pub async fn suspects() -> Result<()> {
    let config = Config::load()?;
    config.require_auth()?;
    let suspects = GateClient::new(&config).suspects().await?;

    if suspects.is_empty() {
        println!("No suspicious clients.");
        return Ok(());
    }

    println!("{:<40} {:<20} {:<40}", "CLIENT", "FLAGGED", "REASON");
    println!("{}", "-".repeat(100));

    for suspect in suspects {
        println!(
            "{:<40} {:<20} {:<40}",
            truncate(suspect.client.as_str(), 38),
            suspect.flagged_at.format("%Y-%m-%d %H:%M:%S"),
            suspect.reason.describe()
        );
    }

    Ok(())
}

/// Remove a client from the suspicion registry
pub async fn unflag(key: &str) -> Result<()> {
    let config = Config::load()?;
    config.require_auth()?;
    let response = GateClient::new(&config).unflag(key).await?;

    if response.released {
        println!("{} Unflagged {}", style("✓").green().bold(), response.client);
    } else {
        println!("{} was not flagged.", response.client);
    }

    Ok(())
}

/// Lift a rate-limit lockout
pub async fn unlock(key: &str) -> Result<()> {
    let config = Config::load()?;
    config.require_auth()?;
    let response = GateClient::new(&config).unlock(key).await?;

    if response.released {
        println!("{} Lifted lockout for {}", style("✓").green().bold(), response.client);
    } else {
        println!("{} was not locked out.", response.client);
    }

    Ok(())
}

pub fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
