//! Receipt command implementations

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde_json::Value;
use slip_core::models::{DeletePolicy, FolderFilter, RawReceiptRecord, Receipt};
use slip_core::status::{ReturnState, WarrantyState};
use slip_core::tags::{category_style, merchant_icon, CategoryStyleCache};
use slip_core::{resolve_image_url, Config, DatePatch, Database, Error, ReceiptFilter, ReceiptStore};

use super::{open_wallet, print_json, require_session, truncate};

/// Parse an import file: a JSON array, a single object, or JSON lines
pub fn parse_import(content: &str) -> Result<Vec<RawReceiptRecord>> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let values: Vec<Value> = match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Array(items)) => items,
        Ok(value) => vec![value],
        Err(_) => trimmed
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .enumerate()
            .map(|(i, line)| {
                serde_json::from_str(line).with_context(|| format!("Invalid JSON on line {}", i + 1))
            })
            .collect::<Result<_>>()?,
    };

    values
        .into_iter()
        .enumerate()
        .map(|(i, value)| match value {
            Value::Object(map) => Ok(map),
            _ => anyhow::bail!("Record {} is not a JSON object", i + 1),
        })
        .collect()
}

pub async fn cmd_import(db: &Database, file: &Path) -> Result<()> {
    let session = require_session(db).await?;

    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let records = parse_import(&content)?;

    println!("📥 Importing {} records from {}...", records.len(), file.display());

    let mut imported = 0;
    let mut skipped = 0;
    for record in records {
        match db.insert(&session.user_id, record).await {
            Ok(_) => imported += 1,
            Err(Error::InvalidData(msg)) => {
                tracing::debug!("Skipped record: {}", msg);
                skipped += 1;
            }
            Err(e) => return Err(e).context("Failed to import receipt"),
        }
    }

    println!("✅ Imported {} receipts", imported);
    if skipped > 0 {
        println!("   Skipped {} duplicates", skipped);
    }
    Ok(())
}

/// Arguments for `slip list`
pub struct ListOptions<'a> {
    pub search: Option<&'a str>,
    pub category: Option<&'a str>,
    pub folder: FolderFilter,
    pub warranty_only: bool,
    pub limit: Option<usize>,
}

/// Short warranty/return badge text for a table row
fn badges(receipt: &Receipt, today: NaiveDate, urgent_days: i64) -> String {
    if !receipt.is_finalized() {
        return "⏳ processing".to_string();
    }

    let mut parts = Vec::new();
    let warranty = receipt.warranty(today);
    match warranty.state {
        WarrantyState::Active => parts.push(format!(
            "🛡 {}",
            warranty.remaining.map(|r| r.display()).unwrap_or_default()
        )),
        WarrantyState::Expired => parts.push("warranty expired".to_string()),
        WarrantyState::None => {}
    }

    let window = receipt.return_window(today, urgent_days);
    match window.status {
        ReturnState::Urgent => parts.push(format!("⚠️ {}", window.message)),
        ReturnState::Active => parts.push(window.message),
        ReturnState::Expired | ReturnState::None => {}
    }

    parts.join(" · ")
}

pub async fn cmd_list(
    db: &Database,
    config: &Config,
    options: &ListOptions<'_>,
    today: NaiveDate,
    json: bool,
) -> Result<()> {
    let wallet = open_wallet(db, config).await?;

    let filter = ReceiptFilter::new()
        .search(options.search)
        .category(options.category)
        .folder(options.folder)
        .warranty_only(options.warranty_only);
    let mut receipts = wallet.view(&filter, today);
    if let Some(limit) = options.limit {
        receipts.truncate(limit);
    }

    if json {
        return print_json(&receipts);
    }

    if receipts.is_empty() {
        println!("No receipts found.");
        return Ok(());
    }

    let styles = CategoryStyleCache::new();

    println!();
    println!(
        "{:<10} │ {:<22} │ {:>10} │ {:<12} │ {:<7} │ Status",
        "Date", "Merchant", "Amount", "Category", "Tag"
    );
    println!("───────────┼────────────────────────┼────────────┼──────────────┼─────────┼─────────────────");

    for receipt in &receipts {
        println!(
            "{:<10} │ {:<22} │ {:>10} │ {:<12} │ {:<7} │ {}",
            receipt
                .date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
            truncate(&receipt.merchant, 22),
            receipt.amount_display(),
            truncate(&receipt.category, 12),
            styles.style(&receipt.category).color.as_str(),
            badges(receipt, today, config.return_urgent_days)
        );
    }

    println!();
    println!("{} receipts", receipts.len());
    Ok(())
}

pub async fn cmd_show(
    db: &Database,
    config: &Config,
    id: &str,
    today: NaiveDate,
    json: bool,
) -> Result<()> {
    let wallet = open_wallet(db, config).await?;
    let receipt = wallet
        .get(id)
        .with_context(|| format!("Receipt not found: {}", id))?;

    if json {
        return print_json(&receipt);
    }

    let style = category_style(&receipt.category);
    let icon = merchant_icon(&receipt.merchant, &receipt.category);

    println!();
    println!("🧾 {} [{}]", receipt.merchant, icon);
    println!("   ID:        {}", receipt.id);
    println!("   Reference: {}", receipt.reference_number);
    if let Some(date) = receipt.date {
        println!("   Date:      {}", date);
    }
    println!(
        "   Category:  {} ({} {})",
        receipt.category,
        style.color,
        style.color.hex()
    );
    if let Some(folder) = receipt.folder {
        println!("   Folder:    {}", folder);
    }
    println!("   Status:    {}", receipt.status);
    println!();
    println!(
        "   Subtotal:  {}{:.2}",
        receipt.currency_symbol, receipt.subtotal
    );
    println!(
        "   VAT ({}%): {}{:.2}",
        receipt.vat_rate, receipt.currency_symbol, receipt.vat
    );
    println!("   Total:     {}", receipt.amount_display());

    if !receipt.items.is_empty() {
        println!();
        println!("   Items:");
        for item in &receipt.items {
            println!(
                "     {:>4} × {:<30} {}{:.2}",
                item.quantity,
                truncate(&item.name, 30),
                receipt.currency_symbol,
                item.price
            );
        }
    }

    if let Some(payment) = &receipt.payment_method {
        println!("   Payment:   {}", payment);
    }
    if let Some(location) = &receipt.location {
        println!("   Location:  {}", location);
    }
    if let Some(alias) = &receipt.email_alias {
        println!("   Sent to:   {}", alias);
    }

    println!();
    let warranty = receipt.warranty(today);
    match (warranty.state, warranty.expires_on) {
        (WarrantyState::Active, Some(until)) => println!(
            "   🛡  Warranty: {} left (until {})",
            warranty.remaining.map(|r| r.display()).unwrap_or_default(),
            until
        ),
        (WarrantyState::Expired, Some(until)) => println!("   Warranty expired on {}", until),
        _ => {}
    }

    let window = receipt.return_window(today, config.return_urgent_days);
    if window.status != ReturnState::None {
        println!("   ↩  {}", window.message);
    }
    if let Some(when) = receipt.delete_after {
        println!("   🗑  Scheduled for deletion on {}", when);
    }
    if let Some(path) = &receipt.image_path {
        println!("   Image: {}", resolve_image_url(path, &config.public_base_url));
    }

    Ok(())
}

fn parse_date_arg(value: &str, flag: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid {} date '{}' (use YYYY-MM-DD)", flag, value))
}

/// Build a date patch from `slip dates` arguments
pub fn date_patch(
    warranty: Option<&str>,
    return_by: Option<&str>,
    clear_warranty: bool,
    clear_return: bool,
) -> Result<DatePatch> {
    let mut patch = DatePatch::default();

    if clear_warranty {
        patch.warranty_date = Some(None);
    } else if let Some(value) = warranty {
        patch.warranty_date = Some(Some(parse_date_arg(value, "--warranty")?));
    }

    if clear_return {
        patch.return_date = Some(None);
    } else if let Some(value) = return_by {
        patch.return_date = Some(Some(parse_date_arg(value, "--return-by")?));
    }

    if patch.is_empty() {
        anyhow::bail!(
            "Nothing to change. Use --warranty, --return-by, --clear-warranty or --clear-return"
        );
    }
    Ok(patch)
}

pub async fn cmd_dates(db: &Database, config: &Config, id: &str, patch: DatePatch) -> Result<()> {
    let mut wallet = open_wallet(db, config).await?;
    wallet
        .update_dates(id, patch)
        .await
        .with_context(|| format!("Failed to update receipt {}", id))?;

    println!("✅ Updated dates on {}", id);
    Ok(())
}

pub async fn cmd_delete(
    db: &Database,
    config: &Config,
    id: &str,
    policy: DeletePolicy,
    today: NaiveDate,
) -> Result<()> {
    let mut wallet = open_wallet(db, config).await?;
    let scheduled = wallet
        .schedule_deletion(id, policy, today)
        .await
        .with_context(|| format!("Failed to delete receipt {}", id))?;

    match scheduled {
        Some(date) => println!("🗓  Receipt {} will be deleted on {}", id, date),
        None => println!("🗑  Deleted receipt {}", id),
    }
    Ok(())
}

pub async fn cmd_purge(db: &Database, config: &Config, today: NaiveDate) -> Result<()> {
    let mut wallet = open_wallet(db, config).await?;
    let purged = wallet
        .purge_due(today)
        .await
        .context("Failed to purge scheduled receipts")?;

    if purged.is_empty() {
        println!("Nothing due for deletion.");
    } else {
        println!("🗑  Deleted {} scheduled receipts", purged.len());
        for id in &purged {
            println!("   {}", id);
        }
    }
    Ok(())
}
