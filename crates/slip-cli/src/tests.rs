//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use chrono::NaiveDate;
use slip_core::models::{DeletePolicy, FolderFilter};
use slip_core::{Config, Database, IdentityProvider, ReceiptStore};
use tempfile::TempDir;

use crate::commands::{self, truncate};

const RECEIPTS_JSON: &str = r#"[
  {"id": "apple-1", "merchant": "Apple Store", "amount": 2199, "category": "Tech",
   "date": "2025-01-15", "warranty_date": "2026-01-15", "return_date": "2025-01-27",
   "reference_number": "APL-0091", "folder": "personal"},
  {"id": "cafe-1", "store": "Cafe Nero", "total": "£4.50", "tag": "Food",
   "date": "2025-01-20", "folder": "work"},
  {"id": "old-1", "merchant": "Argos", "amount": "35.00", "category": "Home",
   "date": "2024-10-02", "warranty_date": "2024-12-01"}
]"#;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 25).unwrap()
}

fn test_config(dir: &TempDir) -> Config {
    Config {
        storage_root: Some(dir.path().join("objects")),
        ..Config::default()
    }
}

/// Database with a signed-in user, returning the user id
async fn setup_signed_in(dir: &TempDir) -> (Database, String) {
    let config = test_config(dir);
    let db = commands::open_db(&dir.path().join("slip.db"), &config).unwrap();
    commands::cmd_signup(&db, "jane@example.com", "hunter22", "jane", Some("Jane"))
        .await
        .unwrap();
    let session = db.current_session().await.unwrap().unwrap();
    (db, session.user_id)
}

async fn setup_with_receipts(dir: &TempDir) -> (Database, String) {
    let (db, user_id) = setup_signed_in(dir).await;
    let file = dir.path().join("receipts.json");
    std::fs::write(&file, RECEIPTS_JSON).unwrap();
    commands::cmd_import(&db, &file).await.unwrap();
    (db, user_id)
}

// ========== Helper Tests ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("Apple Store", 20), "Apple Store");
    assert_eq!(truncate("A very long merchant name", 10), "A very ...");
    // Counts characters, not bytes
    assert_eq!(truncate("££££££", 6), "££££££");
    assert_eq!(truncate("££££££££", 6), "£££...");
}

#[test]
fn test_parse_import_formats() {
    let array = commands::parse_import(RECEIPTS_JSON).unwrap();
    assert_eq!(array.len(), 3);

    let single = commands::parse_import(r#"{"merchant": "Boots"}"#).unwrap();
    assert_eq!(single.len(), 1);

    let lines = commands::parse_import("{\"merchant\": \"A\"}\n\n{\"merchant\": \"B\"}\n").unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1]["merchant"], "B");

    assert!(commands::parse_import("").unwrap().is_empty());
    assert!(commands::parse_import("[1, 2]").is_err());
    assert!(commands::parse_import("{not json").is_err());
}

#[test]
fn test_date_patch() {
    let patch = commands::date_patch(Some("2026-03-01"), None, false, true).unwrap();
    assert_eq!(
        patch.warranty_date,
        Some(NaiveDate::from_ymd_opt(2026, 3, 1))
    );
    assert_eq!(patch.return_date, Some(None));
    assert!(patch.delete_after.is_none());

    assert!(commands::date_patch(None, None, false, false).is_err());
    assert!(commands::date_patch(Some("01/03/2026"), None, false, false).is_err());
}

#[test]
fn test_load_config_missing_override() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");
    assert!(commands::load_config(Some(&missing)).is_err());
}

#[test]
fn test_load_config_override() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("slip.toml");
    std::fs::write(&path, "[budget]\nmonthly_limit = 900.0\n").unwrap();

    let config = commands::load_config(Some(&path)).unwrap();
    assert_eq!(config.budget_limit, 900.0);
    assert_eq!(config.currency_symbol, "£");
}

#[test]
fn test_cmd_init() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let db_path = dir.path().join("slip.db");
    commands::cmd_init(&db_path, &config).unwrap();
    assert!(db_path.exists());
}

// ========== Account Command Tests ==========

#[tokio::test]
async fn test_signup_login_logout() {
    let dir = TempDir::new().unwrap();
    let (db, _) = setup_signed_in(&dir).await;

    commands::cmd_whoami(&db, false).await.unwrap();
    commands::cmd_logout(&db).await.unwrap();
    assert!(db.current_session().await.unwrap().is_none());

    assert!(commands::cmd_login(&db, "jane@example.com", "wrong-password")
        .await
        .is_err());
    commands::cmd_login(&db, "jane@example.com", "hunter22")
        .await
        .unwrap();
    assert!(db.current_session().await.unwrap().is_some());
}

#[tokio::test]
async fn test_commands_require_session() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let db = commands::open_db(&dir.path().join("slip.db"), &config).unwrap();

    let err = commands::cmd_stats(&db, &config, today(), false)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Not signed in"));
}

// ========== Receipt Command Tests ==========

#[tokio::test]
async fn test_import_skips_duplicates() {
    let dir = TempDir::new().unwrap();
    let (db, user_id) = setup_with_receipts(&dir).await;
    assert_eq!(db.count_receipts(&user_id).unwrap(), 3);

    // Importing the same file again adds nothing
    let file = dir.path().join("receipts.json");
    commands::cmd_import(&db, &file).await.unwrap();
    assert_eq!(db.count_receipts(&user_id).unwrap(), 3);
}

#[tokio::test]
async fn test_reimport_with_underscore_ids() {
    let dir = TempDir::new().unwrap();
    let (db, user_id) = setup_signed_in(&dir).await;

    let file = dir.path().join("export.jsonl");
    std::fs::write(
        &file,
        "{\"_id\": \"doc-1\", \"merchant\": \"Boots\", \"amount\": 5}\n{\"id\": 7, \"merchant\": \"Argos\"}\n",
    )
    .unwrap();

    commands::cmd_import(&db, &file).await.unwrap();
    commands::cmd_import(&db, &file).await.unwrap();
    assert_eq!(db.count_receipts(&user_id).unwrap(), 2);
}

#[tokio::test]
async fn test_list_and_show() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let (db, _) = setup_with_receipts(&dir).await;

    let options = commands::ListOptions {
        search: Some("apple"),
        category: None,
        folder: FolderFilter::All,
        warranty_only: true,
        limit: Some(10),
    };
    commands::cmd_list(&db, &config, &options, today(), false)
        .await
        .unwrap();
    commands::cmd_list(&db, &config, &options, today(), true)
        .await
        .unwrap();

    commands::cmd_show(&db, &config, "apple-1", today(), false)
        .await
        .unwrap();
    assert!(commands::cmd_show(&db, &config, "missing", today(), false)
        .await
        .is_err());
}

#[tokio::test]
async fn test_insights_and_stats() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let (db, _) = setup_with_receipts(&dir).await;

    commands::cmd_insights(&db, &config, None, today(), false)
        .await
        .unwrap();
    commands::cmd_insights(&db, &config, Some(12), today(), true)
        .await
        .unwrap();
    commands::cmd_stats(&db, &config, today(), false)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_dates_updates_store() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let (db, user_id) = setup_with_receipts(&dir).await;

    let patch = commands::date_patch(Some("2027-06-30"), None, false, true).unwrap();
    commands::cmd_dates(&db, &config, "apple-1", patch)
        .await
        .unwrap();

    let records = db.list(&user_id).await.unwrap();
    let apple = records.iter().find(|r| r["id"] == "apple-1").unwrap();
    assert_eq!(apple["warranty_date"], "2027-06-30");
    assert!(!apple.contains_key("return_date"));
}

#[tokio::test]
async fn test_delete_and_purge() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let (db, user_id) = setup_with_receipts(&dir).await;

    commands::cmd_delete(&db, &config, "cafe-1", DeletePolicy::After30Days, today())
        .await
        .unwrap();
    assert_eq!(db.count_receipts(&user_id).unwrap(), 3);

    // Nothing due yet
    commands::cmd_purge(&db, &config, today()).await.unwrap();
    assert_eq!(db.count_receipts(&user_id).unwrap(), 3);

    let later = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
    commands::cmd_purge(&db, &config, later).await.unwrap();
    assert_eq!(db.count_receipts(&user_id).unwrap(), 2);

    // Warranty already over, so it goes right away
    commands::cmd_delete(&db, &config, "old-1", DeletePolicy::WhenWarrantyExpires, today())
        .await
        .unwrap();
    assert_eq!(db.count_receipts(&user_id).unwrap(), 1);

    commands::cmd_delete(&db, &config, "apple-1", DeletePolicy::Now, today())
        .await
        .unwrap();
    assert_eq!(db.count_receipts(&user_id).unwrap(), 0);
}

// ========== Upload Command Tests ==========

#[tokio::test]
async fn test_upload_attaches_image() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let (db, user_id) = setup_with_receipts(&dir).await;

    let image = dir.path().join("scan.png");
    std::fs::write(&image, b"\x89PNG").unwrap();

    commands::cmd_upload(&db, &config, &image, Some("apple-1"))
        .await
        .unwrap();

    let records = db.list(&user_id).await.unwrap();
    let apple = records.iter().find(|r| r["id"] == "apple-1").unwrap();
    let path = apple["image_path"].as_str().unwrap();
    assert!(path.starts_with(&format!("{}/", user_id)));
    assert!(path.ends_with("-scan.png"));
    assert!(config.storage_dir().join(path).exists());
}

#[tokio::test]
async fn test_upload_to_missing_receipt_cleans_up() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let (db, user_id) = setup_signed_in(&dir).await;

    let image = dir.path().join("scan.png");
    std::fs::write(&image, b"\x89PNG").unwrap();

    assert!(commands::cmd_upload(&db, &config, &image, Some("missing"))
        .await
        .is_err());

    let user_dir = config.storage_dir().join(&user_id);
    let leftovers = std::fs::read_dir(&user_dir)
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftovers, 0);
}
