//! Database tests

use super::*;
use crate::error::Error;
use crate::models::*;
use crate::store::{IdentityProvider, ReceiptStore};
use serde_json::{json, Value};

fn record(value: Value) -> RawReceiptRecord {
    value.as_object().cloned().unwrap()
}

#[test]
fn test_in_memory_db() {
    let db = Database::in_memory().unwrap();
    assert!(db.list_receipt_records("user-1").unwrap().is_empty());
    assert_eq!(db.count_receipts("user-1").unwrap(), 0);
}

#[test]
fn test_schema_exists() {
    let db = Database::in_memory().unwrap();
    let conn = db.conn().unwrap();

    let result: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM pragma_table_info('receipts') WHERE name IN ('id', 'user_id', 'record', 'created_at', 'updated_at')",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(result, 5, "receipts table should have 5 expected columns");

    let result: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('users', 'profiles', 'session')",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(result, 3);
}

#[test]
fn test_reopen_runs_migrations_again() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("slip.db");
    let path = path.to_string_lossy();

    let db = Database::new(&path).unwrap();
    db.insert_receipt_record("u", record(json!({"merchant": "Tesco"})))
        .unwrap();
    drop(db);

    let db = Database::new(&path).unwrap();
    assert_eq!(db.count_receipts("u").unwrap(), 1);
}

// ========== Receipt records ==========

#[test]
fn test_insert_assigns_id() {
    let db = Database::in_memory().unwrap();
    let id = db
        .insert_receipt_record("u", record(json!({"merchant": "Tesco", "total": "£12.40"})))
        .unwrap();
    assert!(uuid::Uuid::parse_str(&id).is_ok());

    let records = db.list_receipt_records("u").unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["id"], json!(id));
    // Stored verbatim, not normalized
    assert_eq!(records[0]["total"], json!("£12.40"));
}

#[test]
fn test_insert_keeps_given_id_and_rejects_duplicates() {
    let db = Database::in_memory().unwrap();
    let id = db
        .insert_receipt_record("u", record(json!({"id": "r-1", "amount": 5})))
        .unwrap();
    assert_eq!(id, "r-1");

    let err = db
        .insert_receipt_record("u", record(json!({"id": "r-1", "amount": 6})))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidData(_)));

    // Same id under another user is a different record
    db.insert_receipt_record("other", record(json!({"id": "r-1"})))
        .unwrap();
}

#[test]
fn test_insert_resolves_id_aliases() {
    let db = Database::in_memory().unwrap();

    let id = db
        .insert_receipt_record("u", record(json!({"_id": "doc-1", "amount": 5})))
        .unwrap();
    assert_eq!(id, "doc-1");
    let err = db
        .insert_receipt_record("u", record(json!({"_id": "doc-1", "amount": 5})))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidData(_)));

    let id = db
        .insert_receipt_record("u", record(json!({"id": 42, "amount": 1})))
        .unwrap();
    assert_eq!(id, "42");
    let err = db
        .insert_receipt_record("u", record(json!({"id": 42})))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidData(_)));

    assert_eq!(db.count_receipts("u").unwrap(), 2);
    let stored = db.get_receipt_record("u", "doc-1").unwrap().unwrap();
    assert_eq!(stored["id"], "doc-1");
}

#[test]
fn test_records_are_scoped_by_user() {
    let db = Database::in_memory().unwrap();
    db.insert_receipt_record("alice", record(json!({"merchant": "A"})))
        .unwrap();
    db.insert_receipt_record("bob", record(json!({"merchant": "B"})))
        .unwrap();

    let alice = db.list_receipt_records("alice").unwrap();
    assert_eq!(alice.len(), 1);
    assert_eq!(alice[0]["merchant"], json!("A"));

    let id = alice[0]["id"].as_str().unwrap().to_string();
    assert!(matches!(
        db.delete_receipt_record("bob", &id).unwrap_err(),
        Error::NotFound(_)
    ));
}

#[test]
fn test_update_is_shallow_merge() {
    let db = Database::in_memory().unwrap();
    let id = db
        .insert_receipt_record(
            "u",
            record(json!({
                "merchant": "Currys", "amount": 499,
                "warranty_date": "2026-01-01", "items": [{"name": "TV"}]
            })),
        )
        .unwrap();

    db.update_receipt_record(
        "u",
        &id,
        record(json!({
            "warranty_date": "2027-01-01",
            "return_date": "2025-02-01",
            "items": null,
            "id": "hijack"
        })),
    )
    .unwrap();

    let stored = db.get_receipt_record("u", &id).unwrap().unwrap();
    assert_eq!(stored["merchant"], json!("Currys"));
    assert_eq!(stored["warranty_date"], json!("2027-01-01"));
    assert_eq!(stored["return_date"], json!("2025-02-01"));
    assert!(!stored.contains_key("items"));
    assert_eq!(stored["id"], json!(id));
}

#[test]
fn test_update_missing_record() {
    let db = Database::in_memory().unwrap();
    let err = db
        .update_receipt_record("u", "missing", record(json!({"amount": 1})))
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn test_malformed_rows_are_skipped() {
    let db = Database::in_memory().unwrap();
    db.insert_receipt_record("u", record(json!({"merchant": "Good"})))
        .unwrap();
    db.conn()
        .unwrap()
        .execute(
            "INSERT INTO receipts (id, user_id, record) VALUES ('bad', 'u', '[1, 2]')",
            [],
        )
        .unwrap();

    let records = db.list_receipt_records("u").unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["merchant"], json!("Good"));
}

#[tokio::test]
async fn test_change_feed_reports_mutations() {
    let db = Database::in_memory().unwrap();
    let mut rx = db.subscribe();

    let id = db
        .insert("u", record(json!({"merchant": "Boots"})))
        .await
        .unwrap();
    db.update("u", &id, record(json!({"amount": 3.5})))
        .await
        .unwrap();
    db.delete("u", &id).await.unwrap();

    let kinds: Vec<ChangeKind> = (0..3).map(|_| rx.try_recv().unwrap().kind).collect();
    assert_eq!(
        kinds,
        vec![ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete]
    );

    // A failed delete publishes nothing
    assert!(db.delete("u", &id).await.is_err());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_clones_share_change_feed() {
    let db = Database::in_memory().unwrap();
    let mut rx = db.subscribe();

    let clone = db.clone();
    clone
        .insert("u", record(json!({"id": "x"})))
        .await
        .unwrap();

    let event = rx.try_recv().unwrap();
    assert_eq!(event.user_id, "u");
    assert_eq!(event.receipt_id, "x");
}

// ========== Identity ==========

#[test]
fn test_email_alias() {
    assert_eq!(
        email_alias("Jane.Doe", DEFAULT_ALIAS_DOMAIN).unwrap(),
        "jane.doe@slip.email"
    );
    assert_eq!(
        email_alias("jane@receipts.example.com", DEFAULT_ALIAS_DOMAIN).unwrap(),
        "jane@receipts.example.com"
    );
    assert_eq!(email_alias("abc", "@mail.test").unwrap(), "abc@mail.test");

    assert!(email_alias("ab", DEFAULT_ALIAS_DOMAIN).is_err());
    assert!(email_alias("has space", DEFAULT_ALIAS_DOMAIN).is_err());
    assert!(email_alias("-dash", DEFAULT_ALIAS_DOMAIN).is_err());
    assert!(email_alias("jane", "localhost").is_err());
}

#[tokio::test]
async fn test_sign_up_and_sign_in() {
    let db = Database::in_memory().unwrap();
    assert!(db.current_session().await.unwrap().is_none());

    let session = db
        .sign_up("Jane@Example.com", "hunter22", "jane", Some("Jane Doe"))
        .await
        .unwrap();
    assert_eq!(session.email, "jane@example.com");
    assert_eq!(session.email_alias, "jane@slip.email");
    assert_eq!(session.full_name.as_deref(), Some("Jane Doe"));

    // Sign-up signs the user in
    let current = db.current_session().await.unwrap().unwrap();
    assert_eq!(current, session);

    db.sign_out().await.unwrap();
    assert!(db.current_session().await.unwrap().is_none());

    let again = db.sign_in("jane@example.com", "hunter22").await.unwrap();
    assert_eq!(again.user_id, session.user_id);
    assert_eq!(
        db.current_session().await.unwrap().unwrap().user_id,
        session.user_id
    );
}

#[tokio::test]
async fn test_sign_in_rejects_bad_credentials() {
    let db = Database::in_memory().unwrap();
    db.sign_up("jane@example.com", "hunter22", "jane", None)
        .await
        .unwrap();
    db.sign_out().await.unwrap();

    let err = db.sign_in("jane@example.com", "wrong-pass").await.unwrap_err();
    assert!(matches!(err, Error::Auth(_)));

    let err = db.sign_in("nobody@example.com", "hunter22").await.unwrap_err();
    assert!(matches!(err, Error::Auth(_)));

    assert!(db.current_session().await.unwrap().is_none());
}

#[tokio::test]
async fn test_sign_up_rejects_duplicates_and_weak_input() {
    let db = Database::in_memory().unwrap();
    db.sign_up("jane@example.com", "hunter22", "jane", None)
        .await
        .unwrap();

    let err = db
        .sign_up("JANE@example.com", "hunter22", "jane2", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Auth(_)));

    let err = db
        .sign_up("john@example.com", "hunter22", "JANE", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Auth(_)));

    let err = db
        .sign_up("john@example.com", "short", "john", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Auth(_)));

    let err = db
        .sign_up("not-an-email", "hunter22", "john", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidData(_)));
}

#[tokio::test]
async fn test_custom_alias_domain() {
    let db = Database::in_memory()
        .unwrap()
        .with_alias_domain("receipts.test");
    let session = db
        .sign_up("sam@example.com", "hunter22", "sam", None)
        .await
        .unwrap();
    assert_eq!(session.email_alias, "sam@receipts.test");
}
