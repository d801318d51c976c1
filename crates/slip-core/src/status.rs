//! Warranty and return-window status
//!
//! All functions here are pure in `(date, today)`. Activity depends on the
//! wall clock, not on stored data, so callers pass today's date on every
//! query instead of caching a boolean.
//!
//! Day counts use calendar days: both operands are dates, so there is no
//! hour-of-day drift.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::Receipt;
use crate::normalize::parse_date_str;

/// Days-left threshold (inclusive) at which a return window turns urgent
pub const DEFAULT_RETURN_URGENT_DAYS: i64 = 3;

/// Warranty state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarrantyState {
    Active,
    Expired,
    None,
}

impl WarrantyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::None => "none",
        }
    }
}

/// Time left on a warranty
///
/// `years` and `months` are a coarse decomposition (365-day years, 30-day
/// months); `days` is always the exact count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarrantyRemaining {
    pub years: i64,
    pub months: i64,
    pub days: i64,
}

impl WarrantyRemaining {
    pub fn from_days(days: i64) -> Self {
        Self {
            years: days / 365,
            months: (days % 365) / 30,
            days,
        }
    }

    /// Human-readable remaining time, e.g. "1 year 11 months" or "12 days"
    pub fn display(&self) -> String {
        fn unit(n: i64, singular: &str) -> String {
            if n == 1 {
                format!("1 {}", singular)
            } else {
                format!("{} {}s", n, singular)
            }
        }

        match (self.years, self.months) {
            (0, 0) => unit(self.days, "day"),
            (0, m) => unit(m, "month"),
            (y, 0) => unit(y, "year"),
            (y, m) => format!("{} {}", unit(y, "year"), unit(m, "month")),
        }
    }
}

/// Warranty status at a given date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarrantyStatus {
    pub state: WarrantyState,
    pub expires_on: Option<NaiveDate>,
    /// Present only while the warranty is active
    pub remaining: Option<WarrantyRemaining>,
}

impl WarrantyStatus {
    pub const NONE: WarrantyStatus = WarrantyStatus {
        state: WarrantyState::None,
        expires_on: None,
        remaining: None,
    };

    pub fn is_active(&self) -> bool {
        self.state == WarrantyState::Active
    }
}

/// Warranty status for an optional expiry date string
///
/// Absent or unparsable dates give [`WarrantyState::None`].
pub fn warranty_status(warranty_date: Option<&str>, today: NaiveDate) -> WarrantyStatus {
    warranty_status_for(warranty_date.and_then(parse_date_str), today)
}

/// Warranty status for an already-parsed expiry date
///
/// Active iff the expiry date is strictly after today.
pub fn warranty_status_for(warranty_date: Option<NaiveDate>, today: NaiveDate) -> WarrantyStatus {
    let Some(expires_on) = warranty_date else {
        return WarrantyStatus::NONE;
    };

    let days = (expires_on - today).num_days();
    if days > 0 {
        WarrantyStatus {
            state: WarrantyState::Active,
            expires_on: Some(expires_on),
            remaining: Some(WarrantyRemaining::from_days(days)),
        }
    } else {
        WarrantyStatus {
            state: WarrantyState::Expired,
            expires_on: Some(expires_on),
            remaining: None,
        }
    }
}

/// Return-window state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnState {
    Active,
    Urgent,
    Expired,
    None,
}

impl ReturnState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Urgent => "urgent",
            Self::Expired => "expired",
            Self::None => "none",
        }
    }
}

/// Return-window status at a given date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnWindowStatus {
    pub status: ReturnState,
    /// Whole days left; 0 when expired or absent
    pub days_left: i64,
    /// Badge text; empty when there is no return date
    pub message: String,
}

impl ReturnWindowStatus {
    pub fn none() -> Self {
        Self {
            status: ReturnState::None,
            days_left: 0,
            message: String::new(),
        }
    }
}

/// Return-window status for an optional return-by date string
pub fn return_window_status(return_date: Option<&str>, today: NaiveDate) -> ReturnWindowStatus {
    return_window_status_for(
        return_date.and_then(parse_date_str),
        today,
        DEFAULT_RETURN_URGENT_DAYS,
    )
}

/// Return-window status for an already-parsed date
///
/// `urgent_days` is the inclusive upper bound of the urgent band.
pub fn return_window_status_for(
    return_date: Option<NaiveDate>,
    today: NaiveDate,
    urgent_days: i64,
) -> ReturnWindowStatus {
    let Some(return_date) = return_date else {
        return ReturnWindowStatus::none();
    };

    let days_left = (return_date - today).num_days();

    if days_left < 0 {
        ReturnWindowStatus {
            status: ReturnState::Expired,
            days_left: 0,
            message: "Return Expired".to_string(),
        }
    } else if days_left == 0 {
        ReturnWindowStatus {
            status: ReturnState::Urgent,
            days_left: 0,
            message: "Return: Today".to_string(),
        }
    } else if days_left <= urgent_days {
        ReturnWindowStatus {
            status: ReturnState::Urgent,
            days_left,
            message: format!(
                "Return: {} {} Left",
                days_left,
                if days_left == 1 { "Day" } else { "Days" }
            ),
        }
    } else {
        ReturnWindowStatus {
            status: ReturnState::Active,
            days_left,
            message: format!("Return: {} Days Left", days_left),
        }
    }
}

impl Receipt {
    /// Warranty status as shown for this receipt
    ///
    /// Receipts that are not finalized show no warranty badge.
    pub fn warranty(&self, today: NaiveDate) -> WarrantyStatus {
        if !self.is_finalized() {
            return WarrantyStatus::NONE;
        }
        warranty_status_for(self.warranty_date, today)
    }

    /// Return-window status as shown for this receipt
    ///
    /// Receipts that are not finalized show no return badge.
    pub fn return_window(&self, today: NaiveDate, urgent_days: i64) -> ReturnWindowStatus {
        if !self.is_finalized() {
            return ReturnWindowStatus::none();
        }
        return_window_status_for(self.return_date, today, urgent_days)
    }

    pub fn has_active_warranty(&self, today: NaiveDate) -> bool {
        self.warranty(today).is_active()
    }
}
