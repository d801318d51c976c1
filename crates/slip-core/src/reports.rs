//! Spending reports and analytics
//!
//! Everything here is computed in memory from normalized receipts. Empty
//! collections and zero denominators resolve to 0 (or the `"N/A"` sentinel)
//! rather than NaN.
//!
//! Amounts are summed as-is; a collection is assumed to be in one currency.

use std::collections::HashMap;

use chrono::{Datelike, Months, NaiveDate};

use crate::config::Config;
use crate::models::{
    BudgetLevel, BudgetStatus, CategorySpending, MonthComparison, Receipt, ReceiptStats,
    SpendingInsights, TrendDataPoint, TrendDirection,
};

/// Label used when there is no top category
pub const NO_CATEGORY: &str = "N/A";

/// Months in the default spending trend
pub const DEFAULT_TREND_MONTHS: u32 = 6;

const BUDGET_WARNING_PERCENT: f64 = 70.0;
const BUDGET_CRITICAL_PERCENT: f64 = 90.0;

/// Sum of all receipt amounts
pub fn total_spent(receipts: &[Receipt]) -> f64 {
    receipts.iter().map(|r| r.amount).sum()
}

/// Mean receipt amount, 0 for an empty collection
pub fn average_transaction(receipts: &[Receipt]) -> f64 {
    if receipts.is_empty() {
        0.0
    } else {
        total_spent(receipts) / receipts.len() as f64
    }
}

/// Spending grouped by category
///
/// Sorted by amount, largest first; ties keep first-encountered order.
pub fn category_breakdown(receipts: &[Receipt]) -> Vec<CategorySpending> {
    let total = total_spent(receipts);

    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<CategorySpending> = Vec::new();

    for receipt in receipts {
        let slot = *index.entry(receipt.category.as_str()).or_insert_with(|| {
            groups.push(CategorySpending {
                category: receipt.category.clone(),
                amount: 0.0,
                percentage: 0.0,
                receipt_count: 0,
            });
            groups.len() - 1
        });
        groups[slot].amount += receipt.amount;
        groups[slot].receipt_count += 1;
    }

    for group in &mut groups {
        group.percentage = if total > 0.0 {
            (group.amount / total) * 100.0
        } else {
            0.0
        };
    }

    // sort_by is stable, so equal amounts stay in encounter order
    groups.sort_by(|a, b| {
        b.amount
            .partial_cmp(&a.amount)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    groups
}

/// Name of the largest category, or [`NO_CATEGORY`]
pub fn top_category(breakdown: &[CategorySpending]) -> &str {
    breakdown
        .first()
        .map(|c| c.category.as_str())
        .unwrap_or(NO_CATEGORY)
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Spending per calendar month for the `months` months ending at `today`'s
/// month, oldest first
///
/// Always returns exactly `months` buckets; empty months have amount 0.
pub fn monthly_trend(receipts: &[Receipt], today: NaiveDate, months: u32) -> Vec<TrendDataPoint> {
    let current = month_start(today);

    let mut points: Vec<TrendDataPoint> = (0..months)
        .rev()
        .map(|back| {
            let start = current
                .checked_sub_months(Months::new(back))
                .unwrap_or(current);
            TrendDataPoint {
                period: start.format("%Y-%m").to_string(),
                label: start.format("%b").to_string(),
                amount: 0.0,
                receipt_count: 0,
            }
        })
        .collect();

    for receipt in receipts {
        let Some(date) = receipt.date else {
            continue;
        };
        let key = date.format("%Y-%m").to_string();
        if let Some(point) = points.iter_mut().find(|p| p.period == key) {
            point.amount += receipt.amount;
            point.receipt_count += 1;
        }
    }

    points
}

/// Compare the last bucket of a trend with the one before it
pub fn month_over_month(trend: &[TrendDataPoint]) -> MonthComparison {
    let (previous_point, current_point) = match trend {
        [.., prev, cur] => (Some(prev), Some(cur)),
        [cur] => (None, Some(cur)),
        [] => (None, None),
    };

    let current = current_point.map(|p| p.amount).unwrap_or(0.0);
    let previous = previous_point.map(|p| p.amount).unwrap_or(0.0);
    let delta = current - previous;

    let change_percent = if previous > 0.0 {
        (delta / previous) * 100.0
    } else {
        0.0
    };

    let direction = if delta > 0.0 {
        TrendDirection::Increase
    } else if delta < 0.0 {
        TrendDirection::Decrease
    } else {
        TrendDirection::Flat
    };

    let previous_label = previous_point
        .and_then(|p| NaiveDate::parse_from_str(&format!("{}-01", p.period), "%Y-%m-%d").ok())
        .map(|d| d.format("%b %Y").to_string())
        .unwrap_or_default();

    MonthComparison {
        current,
        previous,
        change_percent,
        delta,
        direction,
        previous_label,
    }
}

/// Budget usage against a fixed limit
pub fn budget_status(spent: f64, limit: f64) -> BudgetStatus {
    let percentage = if limit > 0.0 {
        (spent / limit) * 100.0
    } else {
        0.0
    };

    let level = if percentage > BUDGET_CRITICAL_PERCENT {
        BudgetLevel::Critical
    } else if percentage > BUDGET_WARNING_PERCENT {
        BudgetLevel::Warning
    } else {
        BudgetLevel::Ok
    };

    BudgetStatus {
        spent,
        limit,
        percentage,
        remaining: limit - spent,
        level,
    }
}

/// Capture statistics: receipts, active warranties, spam blocked
pub fn receipt_stats(receipts: &[Receipt], today: NaiveDate, spam_per_receipt: u64) -> ReceiptStats {
    let captured = receipts.len() as u64;
    ReceiptStats {
        receipts_captured: captured,
        warranties_tracked: receipts
            .iter()
            .filter(|r| r.has_active_warranty(today))
            .count() as u64,
        spam_blocked: captured.saturating_mul(spam_per_receipt),
    }
}

impl SpendingInsights {
    /// Compute the full insights view for `receipts` as of `today`
    pub fn compute(receipts: &[Receipt], today: NaiveDate, config: &Config) -> Self {
        let total = total_spent(receipts);
        let categories = category_breakdown(receipts);
        let (top_category_amount, top_category_percentage) = categories
            .first()
            .map(|c| (c.amount, c.percentage))
            .unwrap_or((0.0, 0.0));
        let trend = monthly_trend(receipts, today, config.trend_months);
        let month_over_month = month_over_month(&trend);

        tracing::debug!(
            receipts = receipts.len(),
            categories = categories.len(),
            total,
            "Computed spending insights"
        );

        Self {
            total_spent: total,
            receipt_count: receipts.len() as i64,
            average_transaction: average_transaction(receipts),
            top_category: top_category(&categories).to_string(),
            top_category_amount,
            top_category_percentage,
            categories,
            trend,
            month_over_month,
            budget: budget_status(total, config.budget_limit),
        }
    }
}
