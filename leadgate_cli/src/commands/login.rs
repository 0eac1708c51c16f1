//! Login command - store the admin token and server URL

use crate::api::GateClient;
use crate::config::Config;
use anyhow::Result;
use console::style;

/// Handle login command
pub async fn run(token: String, server: Option<String>) -> Result<()> {
    let mut config = Config::load()?;

    if let Some(server) = server {
        config.server_url = server;
    }
    config.admin_token = Some(token);

    // Verify before saving
    let client = GateClient::new(&config);
    match client.stats().await {
        Ok(stats) => {
            config.save()?;
            println!(
                "{} Logged in to {} (gate up {})",
                style("✓").green().bold(),
                config.base_url(),
                super::admin::format_uptime(stats.uptime_seconds)
            );
        }
        Err(e) => {
            anyhow::bail!("Could not verify token against {}: {}", config.base_url(), e);
        }
    }

    Ok(())
}
