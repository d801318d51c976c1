//! Insights and stats command implementations

use anyhow::Result;
use chrono::NaiveDate;
use slip_core::models::{BudgetLevel, TrendDirection};
use slip_core::{Config, Database};

use super::{open_wallet, print_json, truncate};

/// Width of the text bars in trend and budget output
const BAR_WIDTH: usize = 30;

fn bar(fraction: f64) -> String {
    let filled = ((fraction.clamp(0.0, 1.0)) * BAR_WIDTH as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

pub async fn cmd_insights(
    db: &Database,
    config: &Config,
    months: Option<u32>,
    today: NaiveDate,
    json: bool,
) -> Result<()> {
    let mut config = config.clone();
    if let Some(months) = months {
        config.trend_months = months.max(2);
    }

    let wallet = open_wallet(db, &config).await?;
    let insights = wallet.insights(today);

    if json {
        return print_json(&insights);
    }

    let symbol = &config.currency_symbol;

    println!();
    println!("📊 Spending Insights");
    println!("   ─────────────────────────────────────────────────────────────");

    if insights.receipt_count == 0 {
        println!("   No receipts yet.");
        return Ok(());
    }

    println!("   Total spent:   {}{:.2}", symbol, insights.total_spent);
    println!("   Receipts:      {}", insights.receipt_count);
    println!(
        "   Average:       {}{:.2}",
        symbol, insights.average_transaction
    );
    println!(
        "   Top category:  {} ({:.1}%)",
        insights.top_category, insights.top_category_percentage
    );

    println!();
    println!(
        "   {:20} │ {:>10} │ {:>6} │ {:>5}",
        "Category", "Amount", "%", "Count"
    );
    println!("   ─────────────────────┼────────────┼────────┼───────");
    for category in &insights.categories {
        println!(
            "   {:20} │ {:>10.2} │ {:>5.1}% │ {:>5}",
            truncate(&category.category, 20),
            category.amount,
            category.percentage,
            category.receipt_count
        );
    }

    println!();
    println!("   Monthly trend");
    let peak = insights
        .trend
        .iter()
        .map(|p| p.amount)
        .fold(0.0_f64, f64::max);
    for point in &insights.trend {
        let fraction = if peak > 0.0 { point.amount / peak } else { 0.0 };
        println!(
            "   {} {} {}{:.2}",
            point.label,
            bar(fraction),
            symbol,
            point.amount
        );
    }

    let mom = &insights.month_over_month;
    let arrow = match mom.direction {
        TrendDirection::Increase => "↑",
        TrendDirection::Decrease => "↓",
        TrendDirection::Flat => "→",
    };
    println!();
    println!(
        "   {} {:.1}% ({}{:.2}) vs {}",
        arrow,
        mom.change_percent.abs(),
        symbol,
        mom.delta.abs(),
        mom.previous_label
    );

    let budget = &insights.budget;
    let marker = match budget.level {
        BudgetLevel::Ok => "✅",
        BudgetLevel::Warning => "⚠️",
        BudgetLevel::Critical => "🚨",
    };
    println!();
    println!(
        "   Budget {} {:.0}% of {}{:.2}",
        marker, budget.percentage, symbol, budget.limit
    );
    println!("   {}", bar(budget.percentage / 100.0));
    if budget.remaining >= 0.0 {
        println!("   {}{:.2} remaining", symbol, budget.remaining);
    } else {
        println!("   {}{:.2} over budget", symbol, -budget.remaining);
    }

    Ok(())
}

pub async fn cmd_stats(db: &Database, config: &Config, today: NaiveDate, json: bool) -> Result<()> {
    let wallet = open_wallet(db, config).await?;
    let stats = wallet.stats(today);
    let counts = wallet.folder_counts(today);

    if json {
        return print_json(&serde_json::json!({
            "stats": stats,
            "folders": counts,
        }));
    }

    println!();
    println!("🧾 Receipts captured:  {}", stats.receipts_captured);
    println!("🛡  Warranties tracked: {}", stats.warranties_tracked);
    println!("🚫 Spam blocked:       {}", stats.spam_blocked);
    println!();
    println!(
        "   Work: {}  Personal: {}  All: {}",
        counts.work, counts.personal, counts.all
    );
    Ok(())
}
