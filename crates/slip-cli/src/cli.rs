//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use slip_core::models::{DeletePolicy, FolderFilter};

/// Slip - Keep your receipts, warranties and returns in one place
#[derive(Parser)]
#[command(name = "slip")]
#[command(about = "Receipt wallet with warranty and return tracking", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "slip.db", env = "SLIP_DB", global = true)]
    pub db: PathBuf,

    /// Config file (defaults to the user config, then built-in settings)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Create an account with a receipt alias
    Signup {
        /// Login email
        #[arg(long)]
        email: String,

        /// Receipt alias (e.g. "jane" becomes jane@<alias domain>)
        #[arg(long)]
        alias: String,

        /// Full name shown on the profile
        #[arg(long)]
        name: Option<String>,

        /// Password
        #[arg(long, env = "SLIP_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Sign in
    Login {
        #[arg(long)]
        email: String,

        #[arg(long, env = "SLIP_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Sign out
    Logout,

    /// Show the signed-in account
    Whoami,

    /// Import receipt records from a JSON file (array, object or JSON lines)
    Import {
        /// JSON file to import
        #[arg(short, long)]
        file: PathBuf,
    },

    /// List receipts
    List {
        /// Search merchant or reference number
        #[arg(short, long)]
        search: Option<String>,

        /// Only this category ("All" for every category)
        #[arg(short, long)]
        category: Option<String>,

        /// Folder: all, work, personal
        #[arg(short, long, default_value = "all")]
        folder: FolderFilter,

        /// Only receipts with an active warranty
        #[arg(long)]
        warranty: bool,

        /// Maximum rows to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show one receipt in detail
    Show {
        /// Receipt ID
        id: String,
    },

    /// Spending insights: categories, monthly trend, budget
    Insights {
        /// Months in the trend (overrides config)
        #[arg(long)]
        months: Option<u32>,
    },

    /// Capture statistics
    Stats,

    /// Set or clear warranty and return dates
    Dates {
        /// Receipt ID
        id: String,

        /// Warranty expiry date (YYYY-MM-DD)
        #[arg(long, conflicts_with = "clear_warranty")]
        warranty: Option<String>,

        /// Return-by date (YYYY-MM-DD)
        #[arg(long = "return-by", conflicts_with = "clear_return")]
        return_by: Option<String>,

        /// Remove the warranty date
        #[arg(long)]
        clear_warranty: bool,

        /// Remove the return date
        #[arg(long)]
        clear_return: bool,
    },

    /// Delete a receipt now or schedule its deletion
    Delete {
        /// Receipt ID
        id: String,

        /// When: now, 30days, warranty
        #[arg(long, default_value = "now")]
        when: DeletePolicy,
    },

    /// Delete receipts whose scheduled deletion date has passed
    Purge,

    /// Upload a receipt image
    Upload {
        /// Image file
        #[arg(short, long)]
        file: PathBuf,

        /// Attach the image to this receipt
        #[arg(short, long)]
        receipt: Option<String>,
    },
}
