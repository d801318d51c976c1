//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `load_config` / `open_db` - Shared setup for every command
//! - `require_session` / `open_wallet` - Signed-in access to receipts
//! - `cmd_init` - Initialize the database

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use slip_core::{Config, Database, IdentityProvider, Session, Wallet};
use tokio_util::sync::CancellationToken;

/// Load config from `--config`, else the user override, else built-in defaults
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            Config::load_from(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))
        }
        None => Config::load().context("Failed to load config"),
    }
}

/// Open the database, applying the configured alias domain
pub fn open_db(db_path: &Path, config: &Config) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    let db = Database::new(path_str).context("Failed to open database")?;
    Ok(db.with_alias_domain(config.alias_domain.clone()))
}

/// Today's date in local time
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

pub async fn require_session(db: &Database) -> Result<Session> {
    db.current_session()
        .await
        .context("Failed to read session")?
        .context("Not signed in. Run 'slip login' or 'slip signup' first.")
}

/// Token cancelled when the user presses Ctrl-C
fn interrupt_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });
    cancel
}

/// Load the signed-in user's receipts into a wallet
pub async fn open_wallet(db: &Database, config: &Config) -> Result<Wallet<Database>> {
    let session = require_session(db).await?;
    let mut wallet = Wallet::new(Arc::new(db.clone()), session.user_id, config.clone());
    wallet
        .refresh(&interrupt_token())
        .await
        .context("Failed to load receipts")?;
    Ok(wallet)
}

pub fn cmd_init(db_path: &Path, config: &Config) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    open_db(db_path, config)?;

    println!("   Alias domain: {}", config.alias_domain);
    println!(
        "   Object storage: {}",
        config.storage_dir().display()
    );
    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Create an account: slip signup --email you@example.com --alias you");
    println!("  2. Import receipts: slip import --file receipts.json");

    Ok(())
}
