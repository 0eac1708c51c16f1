//! Click command - exercise affiliate links the way a client would

use crate::api::{ClickReply, GateClient};
use crate::config::Config;
use anyhow::Result;
use console::style;

pub struct ClickOptions {
    pub partner: String,
    pub advanced: bool,
    pub user_agent: Option<String>,
    pub count: u32,
}

/// Send `count` clicks and report how the gate answered each one
pub async fn run(opts: ClickOptions) -> Result<()> {
    let config = Config::load()?;
    let client = GateClient::new(&config);

    let mut acknowledged = 0u32;
    let mut refused = 0u32;

    for i in 1..=opts.count {
        let reply = client
            .click(&opts.partner, opts.advanced, opts.user_agent.as_deref())
            .await?;

        match reply {
            ClickReply::Acknowledged(message) => {
                acknowledged += 1;
                println!("{:>4} {} {}", i, style("200").green(), message);
            }
            ClickReply::Refused { status, message } => {
                refused += 1;
                println!("{:>4} {} {}", i, style(status).red(), message);
            }
        }
    }

    println!();
    println!("{} acknowledged, {} refused", acknowledged, refused);

    Ok(())
}
