//! Test utilities for slip-core
//!
//! An in-memory [`ReceiptStore`] with failure injection, for exercising the
//! wallet without SQLite.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::db::merge_patch;
use crate::error::{Error, Result};
use crate::models::{ChangeEvent, ChangeKind, RawReceiptRecord};
use crate::normalize::record_id;
use crate::store::ReceiptStore;

/// In-memory receipt store
///
/// Records keep insertion order per user. When `failing` is set every call
/// returns [`Error::Unavailable`] without touching the data.
#[derive(Debug)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, Vec<RawReceiptRecord>>>,
    failing: AtomicBool,
    list_delay_ms: AtomicU64,
    list_calls: AtomicUsize,
    next_id: AtomicU64,
    changes: broadcast::Sender<ChangeEvent>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            records: Mutex::new(HashMap::new()),
            failing: AtomicBool::new(false),
            list_delay_ms: AtomicU64::new(0),
            list_calls: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
            changes,
        }
    }

    /// Store seeded with JSON objects for `user_id`; non-objects are ignored
    pub fn with_records(user_id: &str, records: Vec<Value>) -> Self {
        let store = Self::new();
        let objects = records
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();
        store.lock().insert(user_id.to_string(), objects);
        store
    }

    /// Make every subsequent call fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delay `list` responses, for cancellation tests
    pub fn set_list_delay(&self, delay: Duration) {
        self.list_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of `list` calls that reached the store
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Snapshot of a user's records
    /// Number of live change-feed subscribers
    pub fn subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }

    pub fn records(&self, user_id: &str) -> Vec<RawReceiptRecord> {
        self.lock().get(user_id).cloned().unwrap_or_default()
    }

    /// Add a record without publishing a change event
    pub fn seed(&self, user_id: &str, record: Value) {
        if let Value::Object(map) = record {
            self.lock()
                .entry(user_id.to_string())
                .or_default()
                .push(map);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<RawReceiptRecord>>> {
        match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Unavailable("memory store is failing".to_string()));
        }
        Ok(())
    }

    fn notify(&self, user_id: &str, receipt_id: &str, kind: ChangeKind) {
        let _ = self.changes.send(ChangeEvent {
            user_id: user_id.to_string(),
            receipt_id: receipt_id.to_string(),
            kind,
        });
    }
}

fn stored_id(record: &RawReceiptRecord) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

#[async_trait]
impl ReceiptStore for MemoryStore {
    async fn list(&self, user_id: &str) -> Result<Vec<RawReceiptRecord>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.list_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        self.check_available()?;
        Ok(self.records(user_id))
    }

    async fn insert(&self, user_id: &str, mut record: RawReceiptRecord) -> Result<String> {
        self.check_available()?;

        let id = match record_id(&record) {
            Some(id) => id,
            None => format!("mem-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
        };
        record.insert("id".to_string(), Value::String(id.clone()));

        {
            let mut records = self.lock();
            let list = records.entry(user_id.to_string()).or_default();
            if list.iter().any(|r| stored_id(r) == Some(id.as_str())) {
                return Err(Error::InvalidData(format!("Receipt already exists: {}", id)));
            }
            list.push(record);
        }

        self.notify(user_id, &id, ChangeKind::Insert);
        Ok(id)
    }

    async fn update(&self, user_id: &str, id: &str, patch: RawReceiptRecord) -> Result<()> {
        self.check_available()?;

        {
            let mut records = self.lock();
            let record = records
                .get_mut(user_id)
                .and_then(|list| list.iter_mut().find(|r| stored_id(r) == Some(id)))
                .ok_or_else(|| Error::NotFound(format!("Receipt {}", id)))?;
            merge_patch(record, patch);
        }

        self.notify(user_id, id, ChangeKind::Update);
        Ok(())
    }

    async fn delete(&self, user_id: &str, id: &str) -> Result<()> {
        self.check_available()?;

        {
            let mut records = self.lock();
            let list = records
                .get_mut(user_id)
                .ok_or_else(|| Error::NotFound(format!("Receipt {}", id)))?;
            let before = list.len();
            list.retain(|r| stored_id(r) != Some(id));
            if list.len() == before {
                return Err(Error::NotFound(format!("Receipt {}", id)));
            }
        }

        self.notify(user_id, id, ChangeKind::Delete);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}
