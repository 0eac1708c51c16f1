//! Leadgate CLI - Operate the admission and fraud gate
//!
//! Usage:
//!   leadgate login <TOKEN>        Store the admin token
//!   leadgate status               Show gate statistics
//!   leadgate suspects             List flagged clients
//!   leadgate unflag <KEY>         Unflag a client
//!   leadgate unlock <KEY>         Lift a lockout
//!   leadgate click <PARTNER>      Send test clicks to an affiliate link

mod api;
mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "leadgate")]
#[command(author = "Leadgate Team")]
#[command(version)]
#[command(about = "Operate the Leadgate admission and fraud gate", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Store the admin token (verified against the server)
    Login {
        /// Admin bearer token
        token: String,

        /// Gate server URL
        #[arg(long, env = "LEADGATE_SERVER")]
        server: Option<String>,
    },

    /// Show gate statistics
    Status,

    /// List flagged clients
    Suspects,

    /// Remove a client from the suspicion registry
    Unflag {
        /// Client key (network address)
        key: String,
    },

    /// Lift a rate-limit lockout
    Unlock {
        /// Client key (network address)
        key: String,
    },

    /// Send clicks to an affiliate link
    Click {
        /// Partner ID
        partner: String,

        /// Use the advanced link (user-agent screening and fraud score)
        #[arg(short, long)]
        advanced: bool,

        /// User-Agent header to send
        #[arg(short, long)]
        user_agent: Option<String>,

        /// Number of clicks
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},leadgate_cli=info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    // Handle commands
    match cli.command {
        Commands::Login { token, server } => {
            commands::login::run(token, server).await?;
        }

        Commands::Status => {
            commands::admin::status().await?;
        }

        Commands::Suspects => {
            commands::admin::suspects().await?;
        }

        Commands::Unflag { key } => {
            commands::admin::unflag(&key).await?;
        }

        Commands::Unlock { key } => {
            commands::admin::unlock(&key).await?;
        }

        Commands::Click {
            partner,
            advanced,
            user_agent,
            count,
        } => {
            let opts = commands::click::ClickOptions {
                partner,
                advanced,
                user_agent,
                count,
            };
            commands::click::run(opts).await?;
        }
    }

    Ok(())
}
