//! Foodbank CLI - Database migrations and operational tasks.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! fb-cli migrate
//!
//! # Queue pickup reminders and send everything that is due (run from cron)
//! fb-cli sms dispatch --limit 100
//!
//! # Only queue pickup reminders
//! fb-cli sms reminders
//!
//! # Publish a new usage agreement version
//! fb-cli agreement publish --version 3 --file agreement-v3.md
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `sms` - Drain the SMS queue
//! - `agreement` - Manage usage agreements

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "fb-cli")]
#[command(author, version, about = "Foodbank CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Drain the SMS queue
    Sms {
        #[command(subcommand)]
        action: SmsAction,
    },
    /// Manage usage agreements
    Agreement {
        #[command(subcommand)]
        action: AgreementAction,
    },
}

#[derive(Subcommand)]
enum SmsAction {
    /// Queue pickup reminders, then send every due message
    Dispatch {
        /// Maximum number of messages to send in this run
        #[arg(short, long, default_value_t = 50)]
        limit: i64,
    },
    /// Queue pickup reminders without sending
    Reminders,
}

#[derive(Subcommand)]
enum AgreementAction {
    /// Publish a new agreement version
    Publish {
        /// Version number, must be unused
        #[arg(short, long)]
        version: i32,

        /// Markdown file with the agreement text
        #[arg(short, long)]
        file: PathBuf,

        /// When the version takes effect (RFC 3339, default: now)
        #[arg(short, long)]
        effective_from: Option<DateTime<Utc>>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Sms { action } => match action {
            SmsAction::Dispatch { limit } => commands::sms::dispatch(limit).await?,
            SmsAction::Reminders => commands::sms::reminders().await?,
        },
        Commands::Agreement { action } => match action {
            AgreementAction::Publish {
                version,
                file,
                effective_from,
            } => {
                commands::agreement::publish(
                    version,
                    &file,
                    effective_from.unwrap_or_else(Utc::now),
                )
                .await?;
            }
        },
    }
    Ok(())
}
