//! Slip Core Library
//!
//! Receipt wallet functionality shared by the Slip tools:
//! - Record normalization for loosely shaped receipt data
//! - Warranty and return-window status derived against an injected date
//! - Spending aggregation (categories, monthly trend, budget)
//! - Receipt filtering and category styling
//! - Collaborator traits for persistence, object storage and identity,
//!   with local SQLite and filesystem implementations
//! - A wallet controller with optimistic updates and change-feed refresh

pub mod config;
pub mod db;
pub mod error;
pub mod filter;
pub mod models;
pub mod normalize;
pub mod reports;
pub mod status;
pub mod store;
pub mod tags;
pub mod wallet;

/// Test utilities including an in-memory receipt store
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use filter::{category_options, FolderCounts, ReceiptFilter};
pub use models::*;
pub use normalize::{normalize, normalize_all, NormalizeOptions};
pub use status::{
    return_window_status, warranty_status, ReturnState, ReturnWindowStatus, WarrantyState,
    WarrantyStatus,
};
pub use store::{
    resolve_image_url, IdentityProvider, LocalObjectStore, ObjectStore, ReceiptStore,
};
pub use tags::{category_style, merchant_icon, CategoryStyle, CategoryStyleCache, TagColor, TagIcon};
pub use wallet::{DatePatch, PendingAction, PendingTicket, Wallet};
