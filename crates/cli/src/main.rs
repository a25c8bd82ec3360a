//! Mnemo CLI — the main entry point.
//!
//! Commands:
//! - `init`  — Write a starter config file
//! - `chat`  — Interactive chat with role-scoped memory
//! - `status` — Show the effective configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "mnemo",
    about = "Mnemo — role-scoped long-term memory for chat assistants",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter config file to ~/.mnemo/config.toml
    Init,

    /// Chat with memory-backed retrieval
    Chat {
        /// Actor ID to chat as
        #[arg(short, long, default_value = "local-user")]
        user: String,

        /// Organization the actor belongs to
        #[arg(short, long)]
        organization: Option<String>,

        /// Team the actor belongs to
        #[arg(short, long)]
        team: Option<String>,

        /// Role: member, team_lead or super_admin
        #[arg(short, long, default_value = "member")]
        role: String,
    },

    /// Show the effective configuration
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Init => commands::init::run()?,
        Commands::Chat {
            user,
            organization,
            team,
            role,
        } => commands::chat::run(user, organization, team, role).await?,
        Commands::Status => commands::status::run()?,
    }

    Ok(())
}
