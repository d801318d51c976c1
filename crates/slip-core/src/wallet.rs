//! Receipt wallet
//!
//! The wallet owns the canonical receipt collection for one user. It fetches
//! raw records from a [`ReceiptStore`], normalizes them, and answers view
//! queries (filtered lists, insights, stats) from memory.
//!
//! The collection is replaced wholesale on every successful refresh. A
//! failed refresh leaves the previous collection in place.
//!
//! Deletes and date edits are optimistic. `begin_*` records the action in a
//! pending overlay that [`Wallet::receipts`] merges over the canonical
//! collection. The returned [`PendingTicket`] makes the store call without
//! holding the wallet, and [`Wallet::settle`] then folds the entry into the
//! collection or drops it again.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::filter::{category_options, FolderCounts, ReceiptFilter};
use crate::models::{DeletePolicy, RawReceiptRecord, Receipt, ReceiptStats, SpendingInsights};
use crate::normalize::{normalize_all, Field, NormalizeOptions};
use crate::reports::receipt_stats;
use crate::store::ReceiptStore;

/// Days until deletion for [`DeletePolicy::After30Days`]
pub const DELETE_GRACE_DAYS: u64 = 30;

/// Date edits for one receipt
///
/// Each field is `None` to leave it alone, `Some(None)` to clear it, or
/// `Some(Some(date))` to set it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatePatch {
    pub warranty_date: Option<Option<NaiveDate>>,
    pub return_date: Option<Option<NaiveDate>>,
    pub delete_after: Option<Option<NaiveDate>>,
}

impl DatePatch {
    pub fn is_empty(&self) -> bool {
        self.warranty_date.is_none() && self.return_date.is_none() && self.delete_after.is_none()
    }

    /// Store patch for these edits
    ///
    /// Writes the canonical key and nulls every alias so an older spelling
    /// in the stored record cannot shadow the new value. Clearing the
    /// warranty also clears any warranty duration it could be derived from.
    pub fn to_record(&self) -> RawReceiptRecord {
        let mut patch = RawReceiptRecord::new();

        let mut put = |field: Field, value: Option<NaiveDate>| {
            let keys = field.keys();
            for key in keys {
                patch.insert(key.to_string(), Value::Null);
            }
            if let (Some(key), Some(date)) = (keys.first(), value) {
                patch.insert(
                    key.to_string(),
                    Value::String(date.format("%Y-%m-%d").to_string()),
                );
            }
        };

        if let Some(value) = self.warranty_date {
            put(Field::WarrantyDate, value);
            if value.is_none() {
                put(Field::WarrantyMonths, None);
            }
        }
        if let Some(value) = self.return_date {
            put(Field::ReturnDate, value);
        }
        if let Some(value) = self.delete_after {
            put(Field::DeleteAfter, value);
        }

        patch
    }

    fn apply(&self, receipt: &mut Receipt) {
        if let Some(value) = self.warranty_date {
            receipt.warranty_date = value;
        }
        if let Some(value) = self.return_date {
            receipt.return_date = value;
        }
        if let Some(value) = self.delete_after {
            receipt.delete_after = value;
        }
    }
}

/// An action awaiting confirmation from the store
#[derive(Debug, Clone, PartialEq)]
pub enum PendingAction {
    Delete,
    Update(DatePatch),
}

/// A pending action whose store call has not been settled yet
///
/// Created by [`Wallet::begin_delete`] or [`Wallet::begin_update`]; hand it
/// back to [`Wallet::settle`] with the result of [`PendingTicket::run`].
#[must_use = "an unsettled ticket leaves the action pending"]
#[derive(Debug)]
pub struct PendingTicket<S: ReceiptStore> {
    store: Arc<S>,
    user_id: String,
    id: String,
    action: PendingAction,
}

impl<S: ReceiptStore> PendingTicket<S> {
    pub fn receipt_id(&self) -> &str {
        &self.id
    }

    pub fn action(&self) -> &PendingAction {
        &self.action
    }

    /// Perform the store call for this action
    pub async fn run(&self) -> Result<()> {
        match &self.action {
            PendingAction::Delete => self.store.delete(&self.user_id, &self.id).await,
            PendingAction::Update(patch) => {
                self.store
                    .update(&self.user_id, &self.id, patch.to_record())
                    .await
            }
        }
    }
}

/// View controller for one user's receipts
pub struct Wallet<S: ReceiptStore> {
    store: Arc<S>,
    user_id: String,
    config: Config,
    options: NormalizeOptions,
    receipts: Vec<Receipt>,
    pending: HashMap<String, PendingAction>,
}

impl<S: ReceiptStore> Wallet<S> {
    pub fn new(store: Arc<S>, user_id: impl Into<String>, config: Config) -> Self {
        let options = NormalizeOptions::from(&config);
        Self {
            store,
            user_id: user_id.into(),
            config,
            options,
            receipts: Vec::new(),
            pending: HashMap::new(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Refetch and renormalize the whole collection
    ///
    /// Returns the number of receipts loaded. If `cancel` fires first the
    /// fetch result is discarded and [`Error::Cancelled`] is returned.
    pub async fn refresh(&mut self, cancel: &CancellationToken) -> Result<usize> {
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Refresh cancelled");
                return Err(Error::Cancelled);
            }
            result = self.store.list(&self.user_id) => result,
        };

        let records = match fetched {
            Ok(records) => records,
            Err(e) => {
                warn!(
                    kept = self.receipts.len(),
                    "Refresh failed, keeping previous receipts: {}", e
                );
                return Err(e);
            }
        };

        let mut receipts = normalize_all(&records, &self.options);
        // Newest first; undated receipts last
        receipts.sort_by_key(|r| std::cmp::Reverse(r.date));

        self.receipts = receipts;
        self.pending
            .retain(|id, _| self.receipts.iter().any(|r| r.id == *id));

        debug!(count = self.receipts.len(), "Refreshed receipts");
        Ok(self.receipts.len())
    }

    /// Receipts as the user should see them, with pending actions applied
    pub fn receipts(&self) -> Vec<Receipt> {
        self.receipts
            .iter()
            .filter_map(|r| match self.pending.get(&r.id) {
                Some(PendingAction::Delete) => None,
                Some(PendingAction::Update(patch)) => {
                    let mut patched = r.clone();
                    patch.apply(&mut patched);
                    Some(patched)
                }
                None => Some(r.clone()),
            })
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<Receipt> {
        self.receipts().into_iter().find(|r| r.id == id)
    }

    pub fn pending(&self) -> &HashMap<String, PendingAction> {
        &self.pending
    }

    /// Filtered receipts, in collection order
    pub fn view(&self, filter: &ReceiptFilter<'_>, today: NaiveDate) -> Vec<Receipt> {
        let visible = self.receipts();
        filter.apply(&visible, today).into_iter().cloned().collect()
    }

    pub fn insights(&self, today: NaiveDate) -> SpendingInsights {
        SpendingInsights::compute(&self.receipts(), today, &self.config)
    }

    pub fn stats(&self, today: NaiveDate) -> ReceiptStats {
        receipt_stats(&self.receipts(), today, self.config.spam_per_receipt)
    }

    pub fn folder_counts(&self, today: NaiveDate) -> FolderCounts {
        FolderCounts::compute(&self.receipts(), today)
    }

    pub fn categories(&self) -> Vec<String> {
        category_options(&self.receipts())
    }

    fn ensure_known(&self, id: &str) -> Result<()> {
        if self.receipts.iter().any(|r| r.id == id) {
            Ok(())
        } else {
            Err(Error::NotFound(format!("Receipt {}", id)))
        }
    }

    fn begin(&mut self, id: &str, action: PendingAction) -> Result<PendingTicket<S>> {
        self.ensure_known(id)?;
        if self.pending.contains_key(id) {
            return Err(Error::InvalidData(format!(
                "Receipt {} already has a pending change",
                id
            )));
        }
        self.pending.insert(id.to_string(), action.clone());
        Ok(PendingTicket {
            store: Arc::clone(&self.store),
            user_id: self.user_id.clone(),
            id: id.to_string(),
            action,
        })
    }

    /// Hide a receipt until the deletion is settled
    ///
    /// The returned ticket performs the store call without borrowing the
    /// wallet, so views keep working while it is in flight.
    pub fn begin_delete(&mut self, id: &str) -> Result<PendingTicket<S>> {
        self.begin(id, PendingAction::Delete)
    }

    /// Show edited dates until the update is settled
    pub fn begin_update(&mut self, id: &str, patch: DatePatch) -> Result<PendingTicket<S>> {
        self.begin(id, PendingAction::Update(patch))
    }

    /// Fold a finished store call into the collection
    ///
    /// On success the action is committed; on failure the overlay entry is
    /// dropped, restoring the previous view, and the error is returned.
    pub fn settle(&mut self, ticket: PendingTicket<S>, result: Result<()>) -> Result<()> {
        let PendingTicket { id, action, .. } = ticket;
        self.pending.remove(&id);

        match (action, result) {
            (PendingAction::Delete, Ok(())) => {
                self.receipts.retain(|r| r.id != id);
                info!("Deleted receipt {}", id);
                Ok(())
            }
            (PendingAction::Update(patch), Ok(())) => {
                if let Some(receipt) = self.receipts.iter_mut().find(|r| r.id == id) {
                    patch.apply(receipt);
                }
                info!("Updated dates on receipt {}", id);
                Ok(())
            }
            (PendingAction::Delete, Err(e)) => {
                warn!("Delete of {} failed, restoring: {}", id, e);
                Err(e)
            }
            (PendingAction::Update(_), Err(e)) => {
                warn!("Update of {} failed, rolling back: {}", id, e);
                Err(e)
            }
        }
    }

    /// Delete a receipt: begin, call the store, settle
    pub async fn delete(&mut self, id: &str) -> Result<()> {
        let ticket = self.begin_delete(id)?;
        let result = ticket.run().await;
        self.settle(ticket, result)
    }

    /// Edit warranty, return and scheduled-deletion dates
    pub async fn update_dates(&mut self, id: &str, patch: DatePatch) -> Result<()> {
        if patch.is_empty() {
            return self.ensure_known(id);
        }
        let ticket = self.begin_update(id, patch)?;
        let result = ticket.run().await;
        self.settle(ticket, result)
    }

    /// Delete now or schedule a deletion date
    ///
    /// Returns the scheduled date, or `None` when the receipt was deleted
    /// immediately. A warranty that has already ended (on or before `today`)
    /// deletes immediately; no warranty date at all is an error.
    pub async fn schedule_deletion(
        &mut self,
        id: &str,
        policy: DeletePolicy,
        today: NaiveDate,
    ) -> Result<Option<NaiveDate>> {
        let receipt = self
            .receipts
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::NotFound(format!("Receipt {}", id)))?;

        let when = match policy {
            DeletePolicy::Now => None,
            DeletePolicy::After30Days => Some(
                today
                    .checked_add_days(Days::new(DELETE_GRACE_DAYS))
                    .ok_or_else(|| Error::InvalidData(format!("Date overflow from {}", today)))?,
            ),
            DeletePolicy::WhenWarrantyExpires => {
                let expires = receipt.warranty_date.ok_or_else(|| {
                    Error::InvalidData(format!("Receipt {} has no warranty date", id))
                })?;
                (expires > today).then_some(expires)
            }
        };

        match when {
            None => {
                self.delete(id).await?;
                Ok(None)
            }
            Some(date) => {
                self.update_dates(
                    id,
                    DatePatch {
                        delete_after: Some(Some(date)),
                        ..Default::default()
                    },
                )
                .await?;
                info!("Scheduled receipt {} for deletion on {}", id, date);
                Ok(Some(date))
            }
        }
    }

    /// Delete every receipt whose scheduled date is on or before `today`
    ///
    /// Stops at the first failure; receipts deleted before it stay deleted.
    pub async fn purge_due(&mut self, today: NaiveDate) -> Result<Vec<String>> {
        let due: Vec<String> = self
            .receipts
            .iter()
            .filter(|r| r.delete_after.is_some_and(|d| d <= today))
            .map(|r| r.id.clone())
            .collect();

        let mut purged = Vec::with_capacity(due.len());
        for id in due {
            self.delete(&id).await?;
            purged.push(id);
        }

        if !purged.is_empty() {
            info!(count = purged.len(), "Purged scheduled receipts");
        }
        Ok(purged)
    }

    /// Refetch on every change to this user's receipts until cancelled
    ///
    /// Returns the number of successful refreshes. Failed refreshes are
    /// logged and the loop keeps going; a closed feed ends it.
    pub async fn watch(&mut self, cancel: &CancellationToken) -> Result<usize> {
        let mut changes = self.store.subscribe();
        let mut refreshes = 0;

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = changes.recv() => event,
            };

            match event {
                Ok(event) if event.user_id == self.user_id => {
                    debug!(receipt = %event.receipt_id, kind = ?event.kind, "Receipt changed");
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Change feed lagged");
                }
                Err(RecvError::Closed) => break,
            }

            match self.refresh(cancel).await {
                Ok(_) => refreshes += 1,
                Err(Error::Cancelled) => break,
                Err(e) => warn!("Refresh after change failed: {}", e),
            }
        }

        Ok(refreshes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::ReceiptFilter;
    use crate::models::FolderFilter;
    use crate::test_utils::MemoryStore;
    use serde_json::json;
    use std::time::Duration;

    const USER: &str = "user-1";

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 25).unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn seeded() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::with_records(
            USER,
            vec![
                json!({
                    "id": "r1", "merchant": "Apple Store", "amount": 2199,
                    "category": "Tech", "date": "2025-01-15",
                    "warranty_date": "2026-01-15", "folder": "personal"
                }),
                json!({
                    "id": "r2", "merchant": "Cafe", "total": "£4.50",
                    "tag": "Food", "date": "2025-01-20", "folder": "work"
                }),
                json!({"id": "r3", "merchant": "Mystery"}),
            ],
        ))
    }

    async fn loaded(store: &Arc<MemoryStore>) -> Wallet<MemoryStore> {
        let mut wallet = Wallet::new(store.clone(), USER, Config::default());
        wallet.refresh(&CancellationToken::new()).await.unwrap();
        wallet
    }

    fn ids(receipts: &[Receipt]) -> Vec<&str> {
        receipts.iter().map(|r| r.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_refresh_sorts_newest_first() {
        let store = seeded();
        let wallet = loaded(&store).await;
        assert_eq!(ids(&wallet.receipts()), vec!["r2", "r1", "r3"]);
        assert_eq!(wallet.get("r2").unwrap().amount, 4.5);
        assert_eq!(wallet.get("r2").unwrap().category, "Food");
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_receipts() {
        let store = seeded();
        let mut wallet = loaded(&store).await;

        store.set_failing(true);
        let err = wallet.refresh(&CancellationToken::new()).await.unwrap_err();
        assert!(err.is_collaborator_failure());
        assert_eq!(wallet.receipts().len(), 3);
    }

    #[tokio::test]
    async fn test_refresh_replaces_wholesale() {
        let store = seeded();
        let mut wallet = loaded(&store).await;

        store.seed(USER, json!({"id": "r4", "merchant": "Boots", "amount": 3}));
        assert_eq!(wallet.refresh(&CancellationToken::new()).await.unwrap(), 4);
        assert!(wallet.get("r4").is_some());
    }

    #[tokio::test]
    async fn test_cancelled_refresh_leaves_collection_unchanged() {
        let store = seeded();
        let mut wallet = loaded(&store).await;
        store.seed(USER, json!({"id": "r4", "amount": 1}));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = wallet.refresh(&cancel).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(wallet.receipts().len(), 3);

        // Cancelled while the fetch is in flight
        store.set_list_delay(Duration::from_millis(200));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });
        let err = wallet.refresh(&cancel).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(wallet.receipts().len(), 3);
    }

    #[tokio::test]
    async fn test_delete_commits_on_success() {
        let store = seeded();
        let mut wallet = loaded(&store).await;

        wallet.delete("r2").await.unwrap();
        assert_eq!(ids(&wallet.receipts()), vec!["r1", "r3"]);
        assert!(wallet.pending().is_empty());
        assert_eq!(store.records(USER).len(), 2);
    }

    #[tokio::test]
    async fn test_delete_rolls_back_on_failure() {
        let store = seeded();
        let mut wallet = loaded(&store).await;

        store.set_failing(true);
        assert!(wallet.delete("r2").await.is_err());
        assert_eq!(ids(&wallet.receipts()), vec!["r2", "r1", "r3"]);
        assert!(wallet.pending().is_empty());
    }

    #[tokio::test]
    async fn test_pending_delete_hidden_until_settled() {
        let store = seeded();
        let mut wallet = loaded(&store).await;

        let ticket = wallet.begin_delete("r2").unwrap();
        assert_eq!(ids(&wallet.receipts()), vec!["r1", "r3"]);
        assert_eq!(wallet.pending().get("r2"), Some(&PendingAction::Delete));
        assert_eq!(wallet.stats(today()).receipts_captured, 2);

        store.set_failing(true);
        let result = ticket.run().await;
        // Still hidden until the result is folded in
        assert!(wallet.get("r2").is_none());

        assert!(wallet.settle(ticket, result).is_err());
        assert_eq!(ids(&wallet.receipts()), vec!["r2", "r1", "r3"]);
        assert!(wallet.pending().is_empty());
        assert_eq!(store.records(USER).len(), 3);
    }

    #[tokio::test]
    async fn test_pending_update_visible_across_refresh() {
        let store = seeded();
        let mut wallet = loaded(&store).await;

        let patch = DatePatch {
            return_date: Some(Some(date("2025-02-01"))),
            ..Default::default()
        };
        let ticket = wallet.begin_update("r1", patch).unwrap();
        assert_eq!(wallet.get("r1").unwrap().return_date, Some(date("2025-02-01")));

        // A refetch before the store confirms keeps the overlay
        wallet.refresh(&CancellationToken::new()).await.unwrap();
        assert_eq!(wallet.get("r1").unwrap().return_date, Some(date("2025-02-01")));

        let err = wallet.begin_delete("r1").unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));

        let result = ticket.run().await;
        wallet.settle(ticket, result).unwrap();
        assert!(wallet.pending().is_empty());
        assert_eq!(wallet.get("r1").unwrap().return_date, Some(date("2025-02-01")));
        assert_eq!(store.records(USER)[0]["return_date"], "2025-02-01");
    }

    #[tokio::test]
    async fn test_delete_unknown_receipt() {
        let store = seeded();
        let mut wallet = loaded(&store).await;
        let err = wallet.delete("nope").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_dates() {
        let store = seeded();
        let mut wallet = loaded(&store).await;

        wallet
            .update_dates(
                "r1",
                DatePatch {
                    warranty_date: Some(Some(date("2027-01-15"))),
                    return_date: Some(Some(date("2025-02-14"))),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let receipt = wallet.get("r1").unwrap();
        assert_eq!(receipt.warranty_date, Some(date("2027-01-15")));
        assert_eq!(receipt.return_date, Some(date("2025-02-14")));

        // The store agrees after a refetch
        wallet.refresh(&CancellationToken::new()).await.unwrap();
        assert_eq!(wallet.get("r1").unwrap().warranty_date, Some(date("2027-01-15")));
    }

    #[tokio::test]
    async fn test_update_dates_rolls_back_on_failure() {
        let store = seeded();
        let mut wallet = loaded(&store).await;

        store.set_failing(true);
        let patch = DatePatch {
            warranty_date: Some(None),
            ..Default::default()
        };
        assert!(wallet.update_dates("r1", patch).await.is_err());
        assert_eq!(
            wallet.get("r1").unwrap().warranty_date,
            Some(date("2026-01-15"))
        );
    }

    #[tokio::test]
    async fn test_clearing_warranty_survives_refetch() {
        let store = Arc::new(MemoryStore::with_records(
            USER,
            vec![json!({
                "id": "w", "amount": 10, "date": "2025-01-01",
                "warrantyDate": "2026-01-01", "warranty_months": 12
            })],
        ));
        let mut wallet = loaded(&store).await;

        wallet
            .update_dates(
                "w",
                DatePatch {
                    warranty_date: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        wallet.refresh(&CancellationToken::new()).await.unwrap();
        assert_eq!(wallet.get("w").unwrap().warranty_date, None);
    }

    #[tokio::test]
    async fn test_schedule_deletion_policies() {
        let store = seeded();
        let mut wallet = loaded(&store).await;

        let when = wallet
            .schedule_deletion("r2", DeletePolicy::After30Days, today())
            .await
            .unwrap();
        assert_eq!(when, Some(date("2025-02-24")));
        assert_eq!(wallet.get("r2").unwrap().delete_after, when);

        let when = wallet
            .schedule_deletion("r1", DeletePolicy::WhenWarrantyExpires, today())
            .await
            .unwrap();
        assert_eq!(when, Some(date("2026-01-15")));

        // No warranty date to wait for
        let err = wallet
            .schedule_deletion("r3", DeletePolicy::WhenWarrantyExpires, today())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));

        let when = wallet
            .schedule_deletion("r3", DeletePolicy::Now, today())
            .await
            .unwrap();
        assert_eq!(when, None);
        assert!(wallet.get("r3").is_none());
    }

    #[tokio::test]
    async fn test_purge_due() {
        let store = seeded();
        let mut wallet = loaded(&store).await;

        wallet
            .schedule_deletion("r2", DeletePolicy::After30Days, today())
            .await
            .unwrap();

        assert!(wallet.purge_due(today()).await.unwrap().is_empty());

        let purged = wallet.purge_due(date("2025-02-24")).await.unwrap();
        assert_eq!(purged, vec!["r2"]);
        assert!(wallet.get("r2").is_none());
        assert_eq!(store.records(USER).len(), 2);
    }

    #[tokio::test]
    async fn test_view_and_insights() {
        let store = seeded();
        let wallet = loaded(&store).await;

        let work = wallet.view(&ReceiptFilter::new().folder(FolderFilter::Work), today());
        assert_eq!(ids(&work), vec!["r2"]);

        let warranties = wallet.view(&ReceiptFilter::new().warranty_only(true), today());
        assert_eq!(ids(&warranties), vec!["r1"]);

        let insights = wallet.insights(today());
        assert!((insights.total_spent - 2203.5).abs() < 1e-9);
        assert_eq!(insights.top_category, "Tech");

        let stats = wallet.stats(today());
        assert_eq!(stats.receipts_captured, 3);
        assert_eq!(stats.warranties_tracked, 1);
        assert_eq!(stats.spam_blocked, 36);

        assert_eq!(wallet.categories(), vec!["All", "Food", "Tech", "Other"]);
        assert_eq!(wallet.folder_counts(today()).work, 1);
    }

    #[tokio::test]
    async fn test_watch_refetches_on_change() {
        let store = seeded();
        let mut wallet = loaded(&store).await;
        let cancel = CancellationToken::new();

        let driver = async {
            while store.subscriber_count() == 0 {
                tokio::task::yield_now().await;
            }
            let calls_before = store.list_calls();

            // Another user's change is ignored
            store
                .insert("someone-else", json!({"amount": 1}).as_object().cloned().unwrap())
                .await
                .unwrap();
            store
                .insert(USER, json!({"id": "r4", "amount": 7}).as_object().cloned().unwrap())
                .await
                .unwrap();

            while store.list_calls() == calls_before {
                tokio::task::yield_now().await;
            }
            cancel.cancel();
        };

        let (refreshes, ()) = tokio::time::timeout(Duration::from_secs(5), async {
            tokio::join!(wallet.watch(&cancel), driver)
        })
        .await
        .unwrap();

        assert_eq!(refreshes.unwrap(), 1);
        assert_eq!(store.list_calls(), 2);
        assert!(wallet.get("r4").is_some());
    }
}
