//! Receipt filter builder
//!
//! Narrows a receipt collection to the subset a view should show. The filter
//! never mutates or reorders its input, and a single pass over the
//! collection answers each query.

use chrono::NaiveDate;

use crate::models::{Folder, FolderFilter, Receipt};

/// Category value meaning "no category filter"
pub const ALL_CATEGORIES: &str = "All";

/// Builder for receipt queries
///
/// The lifetime `'query` covers the borrowed search text and category name.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReceiptFilter<'query> {
    pub search: Option<&'query str>,
    pub category: Option<&'query str>,
    pub folder: FolderFilter,
    pub warranty_only: bool,
}

impl<'query> ReceiptFilter<'query> {
    /// Create a filter that matches everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Set free-text search (merchant or reference number)
    pub fn search(mut self, text: Option<&'query str>) -> Self {
        self.search = text;
        self
    }

    /// Set category filter; `None` or `"All"` disables it
    pub fn category(mut self, category: Option<&'query str>) -> Self {
        self.category = category;
        self
    }

    pub fn folder(mut self, folder: FolderFilter) -> Self {
        self.folder = folder;
        self
    }

    /// Only keep receipts with an active warranty
    pub fn warranty_only(mut self, value: bool) -> Self {
        self.warranty_only = value;
        self
    }

    /// Receipts matching every predicate, in input order
    pub fn apply<'r>(&self, receipts: &'r [Receipt], today: NaiveDate) -> Vec<&'r Receipt> {
        // Whitespace is part of the needle; only "" disables the search
        let needle = self
            .search
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        let category = self.category.filter(|c| *c != ALL_CATEGORIES);

        let matched: Vec<&Receipt> = receipts
            .iter()
            .filter(|r| {
                needle.as_deref().map_or(true, |n| {
                    r.merchant.to_lowercase().contains(n)
                        || r.reference_number.to_lowercase().contains(n)
                })
            })
            .filter(|r| category.map_or(true, |c| r.category == c))
            .filter(|r| self.folder.matches(r.folder))
            .filter(|r| !self.warranty_only || r.has_active_warranty(today))
            .collect();

        tracing::debug!(
            total = receipts.len(),
            matched = matched.len(),
            "Applied receipt filter"
        );

        matched
    }
}

/// Category choices for a filter menu: `"All"` then each distinct category
/// in first-seen order
pub fn category_options(receipts: &[Receipt]) -> Vec<String> {
    let mut options = vec![ALL_CATEGORIES.to_string()];
    for receipt in receipts {
        if !options.iter().any(|o| *o == receipt.category) {
            options.push(receipt.category.clone());
        }
    }
    options
}

/// Receipt counts per folder tab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct FolderCounts {
    pub all: usize,
    pub work: usize,
    pub personal: usize,
    pub active_warranty: usize,
}

impl FolderCounts {
    pub fn compute(receipts: &[Receipt], today: NaiveDate) -> Self {
        receipts.iter().fold(Self::default(), |mut counts, r| {
            counts.all += 1;
            match r.folder {
                Some(Folder::Work) => counts.work += 1,
                Some(Folder::Personal) => counts.personal += 1,
                None => {}
            }
            if r.has_active_warranty(today) {
                counts.active_warranty += 1;
            }
            counts
        })
    }
}
