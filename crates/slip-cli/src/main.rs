//! Slip CLI - Receipt wallet
//!
//! Usage:
//!   slip init                       Initialize database
//!   slip signup --email E --alias A Create an account
//!   slip import --file receipts.json
//!   slip list --warranty            Receipts with an active warranty
//!   slip insights                   Spending by category and month

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = commands::load_config(cli.config.as_deref())?;
    let today = commands::today();

    if let Commands::Init = cli.command {
        return commands::cmd_init(&cli.db, &config);
    }

    let db = commands::open_db(&cli.db, &config)?;

    match cli.command {
        Commands::Init => Ok(()),
        Commands::Signup {
            email,
            alias,
            name,
            password,
        } => commands::cmd_signup(&db, &email, &password, &alias, name.as_deref()).await,
        Commands::Login { email, password } => commands::cmd_login(&db, &email, &password).await,
        Commands::Logout => commands::cmd_logout(&db).await,
        Commands::Whoami => commands::cmd_whoami(&db, cli.json).await,
        Commands::Import { file } => commands::cmd_import(&db, &file).await,
        Commands::List {
            search,
            category,
            folder,
            warranty,
            limit,
        } => {
            let options = commands::ListOptions {
                search: search.as_deref(),
                category: category.as_deref(),
                folder,
                warranty_only: warranty,
                limit,
            };
            commands::cmd_list(&db, &config, &options, today, cli.json).await
        }
        Commands::Show { id } => commands::cmd_show(&db, &config, &id, today, cli.json).await,
        Commands::Insights { months } => {
            commands::cmd_insights(&db, &config, months, today, cli.json).await
        }
        Commands::Stats => commands::cmd_stats(&db, &config, today, cli.json).await,
        Commands::Dates {
            id,
            warranty,
            return_by,
            clear_warranty,
            clear_return,
        } => {
            let patch = commands::date_patch(
                warranty.as_deref(),
                return_by.as_deref(),
                clear_warranty,
                clear_return,
            )?;
            commands::cmd_dates(&db, &config, &id, patch).await
        }
        Commands::Delete { id, when } => {
            commands::cmd_delete(&db, &config, &id, when, today).await
        }
        Commands::Purge => commands::cmd_purge(&db, &config, today).await,
        Commands::Upload { file, receipt } => {
            commands::cmd_upload(&db, &config, &file, receipt.as_deref()).await
        }
    }
}
