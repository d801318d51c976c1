//! Receipt image upload

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use slip_core::models::RawReceiptRecord;
use slip_core::{Config, Database, LocalObjectStore, ObjectStore, ReceiptStore};

use super::require_session;

pub async fn cmd_upload(
    db: &Database,
    config: &Config,
    file: &Path,
    receipt_id: Option<&str>,
) -> Result<()> {
    let session = require_session(db).await?;

    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .context("Upload path has no file name")?;

    let objects = LocalObjectStore::new(config.storage_dir(), config.public_base_url.clone())
        .context("Failed to open object storage")?;
    let stored = objects
        .upload(&session.user_id, file_name, &bytes)
        .await
        .context("Upload failed")?;

    println!("📤 Uploaded {} ({} bytes)", file_name, bytes.len());
    println!("   Path: {}", stored.path);
    println!("   URL:  {}", stored.public_url);

    if let Some(id) = receipt_id {
        let mut patch = RawReceiptRecord::new();
        patch.insert(
            "image_path".to_string(),
            Value::String(stored.path.clone()),
        );
        if let Err(e) = db.update(&session.user_id, id, patch).await {
            // Do not leave an orphaned object behind
            if let Err(cleanup) = objects.delete(&stored.path).await {
                tracing::warn!("Failed to remove {}: {}", stored.path, cleanup);
            }
            return Err(e).with_context(|| format!("Failed to attach image to receipt {}", id));
        }
        println!("   Attached to receipt {}", id);
    }

    Ok(())
}
