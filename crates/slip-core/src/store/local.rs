//! Filesystem object store

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tempfile::NamedTempFile;
use tracing::info;

use super::{object_path, resolve_image_url, ObjectStore};
use crate::error::{Error, Result};
use crate::models::StoredObject;

/// Stores receipt images under a local directory
///
/// Objects land at `<root>/<storage path>`; public URLs are built from the
/// configured base URL.
pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    /// Create a store rooted at `root`, creating the directory if needed
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Result<Self> {
        let root = root.into();

        if !root.exists() {
            fs::create_dir_all(&root).map_err(|e| {
                Error::Storage(format!(
                    "Failed to create storage directory {}: {}",
                    root.display(),
                    e
                ))
            })?;
            info!("Created storage directory: {}", root.display());
        }

        Ok(Self {
            root,
            public_base_url: public_base_url.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of a storage path, refusing anything that escapes
    /// the root
    fn object_file(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(Error::InvalidData(format!("Invalid storage path: {:?}", path)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload(&self, user_id: &str, file_name: &str, bytes: &[u8]) -> Result<StoredObject> {
        let path = object_path(user_id, file_name, bytes, Utc::now())?;
        let dest = self.object_file(&path)?;

        let parent = dest
            .parent()
            .ok_or_else(|| Error::Storage(format!("No parent for {}", dest.display())))?;
        fs::create_dir_all(parent)?;

        // Write to a temp file in the same directory so the rename is atomic
        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(bytes)?;
        tmp.flush()?;
        tmp.persist(&dest).map_err(|e| Error::Io(e.error))?;

        info!(bytes = bytes.len(), "Stored object: {}", path);

        Ok(StoredObject {
            public_url: resolve_image_url(&path, &self.public_base_url),
            path,
        })
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let file = self.object_file(path)?;

        if !file.exists() {
            return Err(Error::NotFound(format!("Object not found: {}", path)));
        }

        fs::remove_file(&file)?;
        info!("Deleted object: {}", path);
        Ok(())
    }
}
