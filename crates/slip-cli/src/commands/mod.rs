//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `auth` - Account commands (signup, login, logout, whoami)
//! - `core` - Init and shared utilities (open_db, load_config, open_wallet)
//! - `receipts` - Receipt commands (import, list, show, dates, delete, purge)
//! - `reports` - Insights and stats
//! - `upload` - Receipt image upload

pub mod auth;
pub mod core;
pub mod receipts;
pub mod reports;
pub mod upload;

// Re-export command functions for main.rs
pub use auth::*;
pub use core::*;
pub use receipts::*;
pub use reports::*;
pub use upload::*;

use anyhow::{Context, Result};

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Print a value as pretty JSON
pub fn print_json(value: &impl serde::Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
