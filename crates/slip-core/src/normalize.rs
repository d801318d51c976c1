//! Receipt record normalization
//!
//! Maps a loosely-typed [`RawReceiptRecord`] onto a canonical [`Receipt`].
//! Producers disagree on field names (`amount` / `total` / `price`) and on
//! encodings (`"£1,299.00"` vs `1299.0`), so every canonical field has an
//! ordered list of candidate keys and the first present, parseable value wins.
//!
//! Normalization never fails. Anything missing or malformed degrades to a
//! default so a partially ingested record still renders.
//!
//! The first candidate key of every field is the name [`Receipt`] serializes
//! under, which makes `normalize(to_record(r)) == r`.

use std::sync::LazyLock;

use chrono::{DateTime, Months, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::Config;
use crate::models::{Folder, LineItem, RawReceiptRecord, Receipt, ReceiptStatus};

/// Merchant name used when a record has none
pub const UNKNOWN_MERCHANT: &str = "Unknown Merchant";

/// Category used when a record has neither a category nor a tag
pub const DEFAULT_CATEGORY: &str = "Other";

/// Tolerance for `amount == subtotal + vat`
const AMOUNT_TOLERANCE: f64 = 0.005;

/// Currency symbols, ISO codes, thousands separators and whitespace
static AMOUNT_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[£$€¥₹,\s]|(?i:gbp|usd|eur)").expect("valid regex"));

/// Canonical receipt fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Id,
    Merchant,
    Amount,
    Subtotal,
    Vat,
    VatRate,
    Currency,
    Date,
    Category,
    WarrantyDate,
    WarrantyMonths,
    ReturnDate,
    Reference,
    EmailAlias,
    Items,
    Status,
    Folder,
    PaymentMethod,
    Location,
    Image,
    DeleteAfter,
}

impl Field {
    /// Candidate source keys, in priority order
    pub fn keys(self) -> &'static [&'static str] {
        match self {
            Self::Id => &["id", "_id"],
            Self::Merchant => &["merchant", "store", "vendor", "merchant_name"],
            Self::Amount => &["amount", "total", "price", "grand_total"],
            Self::Subtotal => &["subtotal", "sub_total"],
            Self::Vat => &["vat", "tax"],
            Self::VatRate => &["vat_rate", "vatRate", "tax_rate"],
            Self::Currency => &["currency_symbol", "currencySymbol", "currency"],
            Self::Date => &["date", "purchase_date", "timestamp", "createdAt", "created_at"],
            Self::Category => &["category", "tag"],
            Self::WarrantyDate => &["warranty_date", "warrantyDate", "warranty_expiry"],
            Self::WarrantyMonths => &["warranty_months", "warrantyMonths"],
            Self::ReturnDate => &["return_date", "returnDate", "return_by"],
            Self::Reference => &["reference_number", "referenceNumber", "reference", "receipt_id"],
            Self::EmailAlias => &["email_alias", "emailAlias", "email"],
            Self::Items => &["items", "line_items"],
            Self::Status => &["status"],
            Self::Folder => &["folder"],
            Self::PaymentMethod => &["payment_method", "paymentMethod", "payment_type", "payment"],
            Self::Location => &["location", "store_location"],
            Self::Image => &["image_path", "image_url", "imageUrl"],
            Self::DeleteAfter => &["delete_after"],
        }
    }
}

/// Defaults applied when a record leaves a field out
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeOptions {
    pub currency_symbol: String,
    pub vat_rate: f64,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            currency_symbol: "£".to_string(),
            vat_rate: 20.0,
        }
    }
}

impl From<&Config> for NormalizeOptions {
    fn from(config: &Config) -> Self {
        Self {
            currency_symbol: config.currency_symbol.clone(),
            vat_rate: config.default_vat_rate,
        }
    }
}

/// Parse a monetary string such as `"£1,299.00"` or `" 4.50 "`
///
/// Returns `None` if nothing finite is left after stripping currency
/// symbols, thousands separators and whitespace.
pub fn parse_amount_str(s: &str) -> Option<f64> {
    let cleaned = AMOUNT_NOISE.replace_all(s, "");
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Coerce a JSON value to a monetary amount
pub fn parse_amount(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_amount_str(s),
        _ => None,
    }
}

/// Parse a date string, keeping only the calendar date
///
/// Accepts `YYYY-MM-DD`, RFC 3339, `YYYY-MM-DD HH:MM:SS`,
/// `YYYY-MM-DDTHH:MM:SS[.fff]` and `DD/MM/YYYY`.
pub fn parse_date_str(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%d/%m/%Y") {
        return Some(date);
    }
    // Anything else that starts with an ISO date
    s.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

/// Coerce a JSON value to a calendar date
///
/// Numbers are epoch milliseconds; objects with a `seconds` field are
/// Firestore-style timestamps.
pub fn parse_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::String(s) => parse_date_str(s),
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| dt.date_naive()),
        Value::Object(map) => map
            .get("seconds")
            .or_else(|| map.get("_seconds"))
            .and_then(Value::as_i64)
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|dt| dt.date_naive()),
        _ => None,
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First candidate key whose value passes `parse`
fn resolve<T>(
    record: &RawReceiptRecord,
    field: Field,
    parse: impl Fn(&Value) -> Option<T>,
) -> Option<T> {
    field
        .keys()
        .iter()
        .filter_map(|key| record.get(*key))
        .find_map(parse)
}

fn currency_symbol(raw: &str) -> String {
    match raw.to_uppercase().as_str() {
        "GBP" => "£".to_string(),
        "USD" => "$".to_string(),
        "EUR" => "€".to_string(),
        "JPY" => "¥".to_string(),
        "INR" => "₹".to_string(),
        _ => raw.to_string(),
    }
}

fn parse_items(value: &Value) -> Option<Vec<LineItem>> {
    let entries = value.as_array()?;
    let items = entries
        .iter()
        .filter_map(Value::as_object)
        .map(|entry| LineItem {
            name: ["name", "description", "title"]
                .iter()
                .filter_map(|k| entry.get(*k))
                .find_map(text)
                .unwrap_or_else(|| "Item".to_string()),
            quantity: ["quantity", "qty"]
                .iter()
                .filter_map(|k| entry.get(*k))
                .find_map(parse_amount)
                .unwrap_or(1.0),
            price: ["price", "amount", "total"]
                .iter()
                .filter_map(|k| entry.get(*k))
                .find_map(parse_amount)
                .unwrap_or(0.0),
        })
        .collect();
    Some(items)
}

/// Stable id for a record that arrived without one
fn content_id(record: &RawReceiptRecord) -> String {
    let canonical = serde_json::to_string(record).unwrap_or_default();
    let digest = Sha256::digest(canonical.as_bytes());
    hex::encode(digest)[..20].to_string()
}

/// Short display reference derived from an id
pub fn reference_from_id(id: &str) -> String {
    id.chars().take(16).collect::<String>().to_uppercase()
}

/// Resolve subtotal and VAT so that `amount == subtotal + vat`
fn split_amount(amount: f64, subtotal: Option<f64>, vat: Option<f64>) -> (f64, f64) {
    match (subtotal, vat) {
        (Some(subtotal), Some(vat)) => {
            if (subtotal + vat - amount).abs() > AMOUNT_TOLERANCE {
                (subtotal, amount - subtotal)
            } else {
                (subtotal, vat)
            }
        }
        (None, Some(vat)) => (amount - vat, vat),
        (Some(subtotal), None) => (subtotal, amount - subtotal),
        (None, None) => (amount, 0.0),
    }
}

/// The producer's id for a record, from any id alias
///
/// Numbers count as ids; blank strings do not.
pub fn record_id(record: &RawReceiptRecord) -> Option<String> {
    resolve(record, Field::Id, text)
}

/// Normalize one raw record into a canonical receipt
pub fn normalize(record: &RawReceiptRecord, options: &NormalizeOptions) -> Receipt {
    let mut defaulted: Vec<&'static str> = Vec::new();

    let id = record_id(record).unwrap_or_else(|| {
        defaulted.push("id");
        content_id(record)
    });

    let merchant = resolve(record, Field::Merchant, text).unwrap_or_else(|| {
        defaulted.push("merchant");
        UNKNOWN_MERCHANT.to_string()
    });

    let subtotal = resolve(record, Field::Subtotal, parse_amount);
    let vat = resolve(record, Field::Vat, parse_amount);
    let amount = resolve(record, Field::Amount, parse_amount)
        .or_else(|| subtotal.zip(vat).map(|(s, v)| s + v))
        .unwrap_or_else(|| {
            defaulted.push("amount");
            0.0
        })
        .max(0.0);
    let (subtotal, vat) = split_amount(amount, subtotal, vat);

    let date = resolve(record, Field::Date, parse_date);
    if date.is_none() {
        defaulted.push("date");
    }

    let category = resolve(record, Field::Category, text).unwrap_or_else(|| {
        defaulted.push("category");
        DEFAULT_CATEGORY.to_string()
    });

    let warranty_date = resolve(record, Field::WarrantyDate, parse_date).or_else(|| {
        let months = resolve(record, Field::WarrantyMonths, parse_amount)?;
        if months < 1.0 {
            return None;
        }
        date?.checked_add_months(Months::new(months as u32))
    });

    let reference_number =
        resolve(record, Field::Reference, text).unwrap_or_else(|| reference_from_id(&id));

    let status = match resolve(record, Field::Status, text) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            debug!(id = %id, status = %raw, "Unknown receipt status, treating as complete");
            ReceiptStatus::Complete
        }),
        None => ReceiptStatus::Complete,
    };

    let receipt = Receipt {
        merchant,
        amount,
        subtotal,
        vat,
        vat_rate: resolve(record, Field::VatRate, parse_amount).unwrap_or(options.vat_rate),
        currency_symbol: resolve(record, Field::Currency, text)
            .map(|c| currency_symbol(&c))
            .unwrap_or_else(|| options.currency_symbol.clone()),
        date,
        category,
        warranty_date,
        return_date: resolve(record, Field::ReturnDate, parse_date),
        reference_number,
        email_alias: resolve(record, Field::EmailAlias, text),
        items: resolve(record, Field::Items, parse_items).unwrap_or_default(),
        status,
        folder: resolve(record, Field::Folder, |v| text(v)?.parse::<Folder>().ok()),
        payment_method: resolve(record, Field::PaymentMethod, text),
        location: resolve(record, Field::Location, text),
        image_path: resolve(record, Field::Image, text),
        delete_after: resolve(record, Field::DeleteAfter, parse_date),
        id,
    };

    if !defaulted.is_empty() {
        debug!(id = %receipt.id, defaulted = ?defaulted, "Normalized receipt with defaults");
    }

    receipt
}

/// Normalize a batch of records, preserving order
pub fn normalize_all(records: &[RawReceiptRecord], options: &NormalizeOptions) -> Vec<Receipt> {
    let receipts: Vec<Receipt> = records.iter().map(|r| normalize(r, options)).collect();
    let processing = receipts.iter().filter(|r| !r.is_finalized()).count();
    debug!(
        count = receipts.len(),
        processing, "Normalized receipt batch"
    );
    receipts
}

impl Receipt {
    /// Canonical record for this receipt
    ///
    /// Uses the primary key of every field, so normalizing the result yields
    /// this receipt again.
    pub fn to_record(&self) -> RawReceiptRecord {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => RawReceiptRecord::new(),
        }
    }
}
