//! Category styling for receipt tags
//!
//! Each category gets a color and an icon chosen by keyword match against a
//! fixed, ordered table. Matching is a case-insensitive substring test and the
//! first row that matches wins; anything else gets the neutral style.
//!
//! Styles are a pure function of the category string, so [`CategoryStyleCache`] can
//! memoize them per distinct category.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Tag color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagColor {
    Blue,
    Orange,
    Purple,
    Green,
    Yellow,
    Pink,
    Red,
    /// Neutral fallback
    Gray,
}

impl TagColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blue => "blue",
            Self::Orange => "orange",
            Self::Purple => "purple",
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Pink => "pink",
            Self::Red => "red",
            Self::Gray => "gray",
        }
    }

    /// Hex value of the 400 shade used for text and borders
    pub fn hex(&self) -> &'static str {
        match self {
            Self::Blue => "#60a5fa",
            Self::Orange => "#fb923c",
            Self::Purple => "#c084fc",
            Self::Green => "#4ade80",
            Self::Yellow => "#facc15",
            Self::Pink => "#f472b6",
            Self::Red => "#f87171",
            Self::Gray => "#9ca3af",
        }
    }
}

impl std::fmt::Display for TagColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Icon shown next to a merchant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagIcon {
    Laptop,
    Coffee,
    Shirt,
    ShoppingCart,
    Car,
    Plane,
    HeartPulse,
    Home,
    /// Neutral fallback
    ShoppingBag,
}

impl TagIcon {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Laptop => "laptop",
            Self::Coffee => "coffee",
            Self::Shirt => "shirt",
            Self::ShoppingCart => "shopping_cart",
            Self::Car => "car",
            Self::Plane => "plane",
            Self::HeartPulse => "heart_pulse",
            Self::Home => "home",
            Self::ShoppingBag => "shopping_bag",
        }
    }
}

impl std::fmt::Display for TagIcon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolved style for a category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStyle {
    pub color: TagColor,
    pub icon: TagIcon,
}

impl CategoryStyle {
    pub const NEUTRAL: CategoryStyle = CategoryStyle {
        color: TagColor::Gray,
        icon: TagIcon::ShoppingBag,
    };
}

/// Ordered keyword table: first matching keyword wins
const CATEGORY_STYLES: &[(&str, TagColor, TagIcon)] = &[
    ("tech", TagColor::Blue, TagIcon::Laptop),
    ("electronic", TagColor::Blue, TagIcon::Laptop),
    ("food", TagColor::Orange, TagIcon::Coffee),
    ("dining", TagColor::Orange, TagIcon::Coffee),
    ("restaurant", TagColor::Orange, TagIcon::Coffee),
    ("clothing", TagColor::Purple, TagIcon::Shirt),
    ("fashion", TagColor::Purple, TagIcon::Shirt),
    ("groceries", TagColor::Green, TagIcon::ShoppingCart),
    ("grocery", TagColor::Green, TagIcon::ShoppingCart),
    ("transport", TagColor::Yellow, TagIcon::Car),
    ("fuel", TagColor::Yellow, TagIcon::Car),
    ("travel", TagColor::Yellow, TagIcon::Plane),
    ("health", TagColor::Pink, TagIcon::HeartPulse),
    ("pharmacy", TagColor::Pink, TagIcon::HeartPulse),
    ("home", TagColor::Red, TagIcon::Home),
    ("utilities", TagColor::Red, TagIcon::Home),
];

/// Merchant keywords that pick an icon regardless of category
const MERCHANT_ICONS: &[(&str, TagIcon)] = &[
    ("apple", TagIcon::Laptop),
    ("starbucks", TagIcon::Coffee),
    ("coffee", TagIcon::Coffee),
    ("uniqlo", TagIcon::Shirt),
];

/// Resolve the style for a category string
pub fn category_style(category: &str) -> CategoryStyle {
    let lower = category.to_lowercase();
    CATEGORY_STYLES
        .iter()
        .find(|(keyword, _, _)| lower.contains(keyword))
        .map(|&(_, color, icon)| CategoryStyle { color, icon })
        .unwrap_or(CategoryStyle::NEUTRAL)
}

/// Resolve the icon for a merchant, falling back to the category's icon
pub fn merchant_icon(merchant: &str, category: &str) -> TagIcon {
    let lower = merchant.to_lowercase();
    MERCHANT_ICONS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|&(_, icon)| icon)
        .unwrap_or_else(|| category_style(category).icon)
}

/// Memoizing wrapper around [`category_style`]
///
/// Safe to share between threads; the lock is held only for the lookup.
#[derive(Debug, Default)]
pub struct CategoryStyleCache {
    styles: Mutex<HashMap<String, CategoryStyle>>,
}

impl CategoryStyleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Style for `category`, computed at most once per distinct string
    pub fn style(&self, category: &str) -> CategoryStyle {
        let mut styles = match self.styles.lock() {
            Ok(guard) => guard,
            // The map only ever holds pure results, so a poisoned one is still valid
            Err(poisoned) => poisoned.into_inner(),
        };
        *styles
            .entry(category.to_string())
            .or_insert_with(|| category_style(category))
    }

    /// Number of distinct categories resolved so far
    pub fn len(&self) -> usize {
        self.styles.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
