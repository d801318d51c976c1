//! External collaborators
//!
//! The wallet reaches persistence, object storage and identity only through
//! the traits in this module.
//!
//! - `ReceiptStore`: raw receipt records scoped to a user, plus a change feed
//! - `ObjectStore`: receipt images
//! - `IdentityProvider`: sign-up, sign-in and the current session
//!
//! [`crate::db::Database`] implements `ReceiptStore` and `IdentityProvider`
//! on SQLite; [`LocalObjectStore`] keeps images on the local filesystem.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::broadcast;

use crate::error::{Error, Result};
use crate::models::{ChangeEvent, RawReceiptRecord, Session, StoredObject};

mod local;

pub use local::LocalObjectStore;

/// Bucket that receipt images are published under
pub const RECEIPT_BUCKET: &str = "receipts";

/// Persistence for raw receipt records
#[async_trait]
pub trait ReceiptStore: Send + Sync {
    /// All records owned by `user_id`
    async fn list(&self, user_id: &str) -> Result<Vec<RawReceiptRecord>>;

    /// Store a new record and return its id
    ///
    /// A string `id` in the record is kept; otherwise one is assigned.
    async fn insert(&self, user_id: &str, record: RawReceiptRecord) -> Result<String>;

    /// Shallow-merge `patch` into an existing record
    ///
    /// A `null` value in the patch removes that key.
    async fn update(&self, user_id: &str, id: &str, patch: RawReceiptRecord) -> Result<()>;

    async fn delete(&self, user_id: &str, id: &str) -> Result<()>;

    /// Change notifications for every user; receivers filter by user id
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;
}

/// Storage for uploaded receipt images
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` for `user_id`, returning the storage path and public URL
    async fn upload(&self, user_id: &str, file_name: &str, bytes: &[u8]) -> Result<StoredObject>;

    async fn delete(&self, path: &str) -> Result<()>;
}

/// Account and session management
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The signed-in session, if any
    async fn current_session(&self) -> Result<Option<Session>>;

    /// Create an account with a receipt alias and sign it in
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        alias: &str,
        full_name: Option<&str>,
    ) -> Result<Session>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    async fn sign_out(&self) -> Result<()>;
}

/// Public URL for a stored image
///
/// Absolute http(s) URLs pass through unchanged; anything else is treated as
/// a path in the receipts bucket.
pub fn resolve_image_url(path: &str, public_base_url: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!(
        "{}/storage/v1/object/public/{}/{}",
        public_base_url.trim_end_matches('/'),
        RECEIPT_BUCKET,
        path.trim_start_matches('/')
    )
}

/// Storage path for an upload: `<user>/<yyyymmddHHMMSS>-<sha8>-<name>`
pub fn object_path(
    user_id: &str,
    file_name: &str,
    bytes: &[u8],
    at: DateTime<Utc>,
) -> Result<String> {
    validate_segment(user_id, "user id")?;

    let name = sanitize_file_name(file_name);
    if name.is_empty() {
        return Err(Error::InvalidData(format!(
            "Invalid file name: {:?}",
            file_name
        )));
    }

    let digest = hex::encode(Sha256::digest(bytes));
    Ok(format!(
        "{}/{}-{}-{}",
        user_id,
        at.format("%Y%m%d%H%M%S"),
        &digest[..8],
        name
    ))
}

/// Keep only the final path component, with unsafe characters replaced
fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned.trim_start_matches('.').to_string()
}

fn validate_segment(value: &str, what: &str) -> Result<()> {
    if value.is_empty() || value.contains(['/', '\\']) || value == "." || value == ".." {
        return Err(Error::InvalidData(format!("Invalid {}: {:?}", what, value)));
    }
    Ok(())
}
