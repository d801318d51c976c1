//! Domain models for Slip

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A receipt record as it arrives from persistence
///
/// Field names and value encodings vary between producers (`amount` vs
/// `total`, `"£1,299.00"` vs `1299.0`); see [`crate::normalize`] for how it is
/// mapped onto a [`Receipt`].
pub type RawReceiptRecord = serde_json::Map<String, serde_json::Value>;

/// Coarse classification of a receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Folder {
    Work,
    Personal,
}

impl Folder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Personal => "personal",
        }
    }
}

impl std::str::FromStr for Folder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "work" => Ok(Self::Work),
            "personal" => Ok(Self::Personal),
            _ => Err(format!("Unknown folder: {} (valid: work, personal)", s)),
        }
    }
}

impl std::fmt::Display for Folder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Folder predicate for the receipt filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FolderFilter {
    #[default]
    All,
    Work,
    Personal,
}

impl FolderFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Work => "work",
            Self::Personal => "personal",
        }
    }

    /// Whether a receipt in `folder` passes this filter
    ///
    /// Receipts without a folder only pass `All`.
    pub fn matches(&self, folder: Option<Folder>) -> bool {
        match self {
            Self::All => true,
            Self::Work => folder == Some(Folder::Work),
            Self::Personal => folder == Some(Folder::Personal),
        }
    }
}

impl std::str::FromStr for FolderFilter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "work" => Ok(Self::Work),
            "personal" => Ok(Self::Personal),
            _ => Err(format!(
                "Unknown folder filter: {} (valid: all, work, personal)",
                s
            )),
        }
    }
}

impl std::fmt::Display for FolderFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle marker for a receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    /// Still being extracted server-side
    Processing,
    /// Fields are final
    #[default]
    Complete,
}

impl ReceiptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Complete => "complete",
        }
    }
}

impl std::str::FromStr for ReceiptStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "processing" | "pending" => Ok(Self::Processing),
            "complete" | "completed" | "done" | "processed" => Ok(Self::Complete),
            _ => Err(format!("Unknown receipt status: {}", s)),
        }
    }
}

impl std::fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One purchased line on a receipt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub quantity: f64,
    /// Line price (not unit price)
    pub price: f64,
}

/// A receipt in canonical form
///
/// Every field is populated or explicitly defaulted by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: String,
    pub merchant: String,
    /// Total paid, never negative
    pub amount: f64,
    pub subtotal: f64,
    pub vat: f64,
    /// VAT rate in percent
    pub vat_rate: f64,
    pub currency_symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warranty_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_date: Option<NaiveDate>,
    pub reference_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_alias: Option<String>,
    pub items: Vec<LineItem>,
    pub status: ReceiptStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<Folder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Storage path or absolute URL of the receipt image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    /// Scheduled deletion date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_after: Option<NaiveDate>,
}

impl Receipt {
    /// Whether extraction has finished
    ///
    /// A receipt that is still processing, or whose amount is still zero,
    /// is shown without interactivity or warranty/return badges.
    pub fn is_finalized(&self) -> bool {
        self.status != ReceiptStatus::Processing && self.amount != 0.0
    }

    /// Amount formatted with the receipt's currency symbol
    pub fn amount_display(&self) -> String {
        format!("{}{:.2}", self.currency_symbol, self.amount)
    }
}

/// How a user asked for a receipt to be deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Delete immediately
    Now,
    /// Delete 30 days from today
    After30Days,
    /// Delete once the warranty has expired
    WhenWarrantyExpires,
}

impl DeletePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Now => "now",
            Self::After30Days => "30days",
            Self::WhenWarrantyExpires => "warranty",
        }
    }
}

impl std::str::FromStr for DeletePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "now" => Ok(Self::Now),
            "30days" | "30-days" | "after-30-days" => Ok(Self::After30Days),
            "warranty" | "when-warranty-expires" => Ok(Self::WhenWarrantyExpires),
            _ => Err(format!(
                "Unknown delete policy: {} (valid: now, 30days, warranty)",
                s
            )),
        }
    }
}

impl std::fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ========== Collaborator Models ==========

/// An authenticated session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Stable user identifier consumed by the store collaborators
    pub user_id: String,
    pub email: String,
    pub email_alias: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

/// A stored object (receipt image)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    /// Storage path, namespaced by user
    pub path: String,
    pub public_url: String,
}

/// Kind of change reported by the receipt store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A change notification from the receipt store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub user_id: String,
    pub receipt_id: String,
    pub kind: ChangeKind,
}

// ========== Report Models ==========

/// Spending in one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySpending {
    pub category: String,
    pub amount: f64,
    pub percentage: f64,
    pub receipt_count: i64,
}

/// A single month in the spending trend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendDataPoint {
    /// Year-month key, e.g. "2025-01"
    pub period: String,
    /// Short month label, e.g. "Jan"
    pub label: String,
    pub amount: f64,
    pub receipt_count: i64,
}

/// Direction of a month-over-month change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increase,
    Decrease,
    Flat,
}

/// Current month compared with the previous one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthComparison {
    pub current: f64,
    pub previous: f64,
    /// Signed percentage change; 0 when the previous month is empty
    pub change_percent: f64,
    /// Signed absolute change
    pub delta: f64,
    pub direction: TrendDirection,
    /// Label of the previous month, e.g. "Dec 2024"
    pub previous_label: String,
}

/// How close spending is to the budget limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetLevel {
    /// 70% or less
    Ok,
    /// Above 70%, up to 90%
    Warning,
    /// Above 90%
    Critical,
}

/// Budget usage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetStatus {
    pub spent: f64,
    pub limit: f64,
    pub percentage: f64,
    /// Negative when over budget
    pub remaining: f64,
    pub level: BudgetLevel,
}

/// Everything the insights view shows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendingInsights {
    pub total_spent: f64,
    pub receipt_count: i64,
    pub average_transaction: f64,
    /// Top category name, or "N/A" when there are no receipts
    pub top_category: String,
    pub top_category_amount: f64,
    pub top_category_percentage: f64,
    pub categories: Vec<CategorySpending>,
    pub trend: Vec<TrendDataPoint>,
    pub month_over_month: MonthComparison,
    pub budget: BudgetStatus,
}

/// Capture statistics for the profile view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptStats {
    pub receipts_captured: u64,
    pub warranties_tracked: u64,
    pub spam_blocked: u64,
}
