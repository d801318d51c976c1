//! Receipt record operations

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{info, warn};

use super::Database;
use crate::error::{Error, Result};
use crate::models::{ChangeEvent, ChangeKind, RawReceiptRecord};
use crate::normalize::record_id;
use crate::store::ReceiptStore;

impl Database {
    /// All receipt records for a user, oldest first
    ///
    /// Rows whose JSON is not an object are skipped with a warning.
    pub fn list_receipt_records(&self, user_id: &str) -> Result<Vec<RawReceiptRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, record FROM receipts
             WHERE user_id = ? ORDER BY created_at ASC, rowid ASC",
        )?;

        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut records = Vec::with_capacity(rows.len());
        for (id, json) in rows {
            match serde_json::from_str::<RawReceiptRecord>(&json) {
                Ok(mut record) => {
                    record.insert("id".to_string(), Value::String(id));
                    records.push(record);
                }
                Err(e) => warn!("Skipping malformed receipt record {}: {}", id, e),
            }
        }

        Ok(records)
    }

    /// Get one record by id
    pub fn get_receipt_record(&self, user_id: &str, id: &str) -> Result<Option<RawReceiptRecord>> {
        let conn = self.conn()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT record FROM receipts WHERE user_id = ? AND id = ?",
                params![user_id, id],
                |row| row.get(0),
            )
            .optional()?;

        json.map(|j| serde_json::from_str(&j).map_err(Error::from))
            .transpose()
    }

    /// Insert a record, keeping the producer's id (`id`, `_id`, string or
    /// number) or assigning a UUID
    pub fn insert_receipt_record(&self, user_id: &str, mut record: RawReceiptRecord) -> Result<String> {
        let id = record_id(&record).unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        record.insert("id".to_string(), Value::String(id.clone()));

        let json = serde_json::to_string(&record)?;
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO receipts (id, user_id, record) VALUES (?, ?, ?)",
            params![id, user_id, json],
        )?;

        if inserted == 0 {
            return Err(Error::InvalidData(format!("Receipt already exists: {}", id)));
        }

        info!("Inserted receipt {}", id);
        self.notify(ChangeEvent {
            user_id: user_id.to_string(),
            receipt_id: id.clone(),
            kind: ChangeKind::Insert,
        });
        Ok(id)
    }

    /// Shallow-merge `patch` into a stored record
    ///
    /// `null` values remove keys; the `id` key cannot be changed.
    pub fn update_receipt_record(&self, user_id: &str, id: &str, patch: RawReceiptRecord) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let json: Option<String> = tx
            .query_row(
                "SELECT record FROM receipts WHERE user_id = ? AND id = ?",
                params![user_id, id],
                |row| row.get(0),
            )
            .optional()?;
        let json = json.ok_or_else(|| Error::NotFound(format!("Receipt {}", id)))?;

        let mut record: RawReceiptRecord = serde_json::from_str(&json)?;
        merge_patch(&mut record, patch);

        tx.execute(
            "UPDATE receipts SET record = ?, updated_at = CURRENT_TIMESTAMP
             WHERE user_id = ? AND id = ?",
            params![serde_json::to_string(&record)?, user_id, id],
        )?;
        tx.commit()?;

        info!("Updated receipt {}", id);
        self.notify(ChangeEvent {
            user_id: user_id.to_string(),
            receipt_id: id.to_string(),
            kind: ChangeKind::Update,
        });
        Ok(())
    }

    pub fn delete_receipt_record(&self, user_id: &str, id: &str) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM receipts WHERE user_id = ? AND id = ?",
            params![user_id, id],
        )?;

        if deleted == 0 {
            return Err(Error::NotFound(format!("Receipt {}", id)));
        }

        info!("Deleted receipt {}", id);
        self.notify(ChangeEvent {
            user_id: user_id.to_string(),
            receipt_id: id.to_string(),
            kind: ChangeKind::Delete,
        });
        Ok(())
    }

    /// Number of receipts stored for a user
    pub fn count_receipts(&self, user_id: &str) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM receipts WHERE user_id = ?",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

pub(crate) fn merge_patch(record: &mut RawReceiptRecord, patch: RawReceiptRecord) {
    for (key, value) in patch {
        if key == "id" {
            continue;
        }
        if value.is_null() {
            record.remove(&key);
        } else {
            record.insert(key, value);
        }
    }
}

#[async_trait]
impl ReceiptStore for Database {
    async fn list(&self, user_id: &str) -> Result<Vec<RawReceiptRecord>> {
        self.list_receipt_records(user_id)
    }

    async fn insert(&self, user_id: &str, record: RawReceiptRecord) -> Result<String> {
        self.insert_receipt_record(user_id, record)
    }

    async fn update(&self, user_id: &str, id: &str, patch: RawReceiptRecord) -> Result<()> {
        self.update_receipt_record(user_id, id, patch)
    }

    async fn delete(&self, user_id: &str, id: &str) -> Result<()> {
        self.delete_receipt_record(user_id, id)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}
