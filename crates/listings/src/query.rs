use serde::Serialize;

use crate::{Condition, Listing, UserId};

/// Page size used when the caller does not supply one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest page size a caller may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Builder for listing searches.
///
/// All criteria are optional and combined with AND. Draft listings only match
/// when `viewer` is their owner.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    /// Case-insensitive substring of the title or description.
    pub text: Option<String>,

    /// Exact category.
    pub category: Option<String>,

    /// Minimum price (inclusive).
    pub price_min: Option<i64>,

    /// Maximum price (inclusive).
    pub price_max: Option<i64>,

    /// Exact condition.
    pub condition: Option<Condition>,

    /// Caller on whose behalf the search runs.
    pub viewer: Option<UserId>,

    /// Maximum number of listings to return.
    pub limit: Option<u32>,

    /// Number of listings to skip.
    pub offset: Option<u64>,
}

impl SearchFilter {
    /// Creates a filter matching every visible listing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters by free text. Blank text is ignored.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.text = (!text.trim().is_empty()).then_some(text);
        self
    }

    /// Filters by category.
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Filters by inclusive price bounds.
    pub fn price_range(mut self, min: Option<i64>, max: Option<i64>) -> Self {
        self.price_min = min;
        self.price_max = max;
        self
    }

    /// Filters by condition.
    pub fn condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Runs the search on behalf of `viewer`.
    pub fn viewer(mut self, viewer: UserId) -> Self {
        self.viewer = Some(viewer);
        self
    }

    /// Limits the page size.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips the first `offset` matches.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Page size after applying the default and clamping to `1..=MAX_PAGE_SIZE`.
    pub fn effective_limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    /// Offset after applying the default.
    pub fn effective_offset(&self) -> u64 {
        self.offset.unwrap_or(0)
    }

    /// Returns true if `listing` satisfies every criterion.
    pub fn matches(&self, listing: &Listing) -> bool {
        if !listing.is_visible_to(self.viewer) {
            return false;
        }
        if let Some(ref text) = self.text {
            let needle = text.to_lowercase();
            if !listing.title.to_lowercase().contains(&needle)
                && !listing.description.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        if let Some(ref category) = self.category
            && &listing.category != category
        {
            return false;
        }
        if let Some(min) = self.price_min
            && listing.price < min
        {
            return false;
        }
        if let Some(max) = self.price_max
            && listing.price > max
        {
            return false;
        }
        if let Some(condition) = self.condition
            && listing.condition != condition
        {
            return false;
        }
        true
    }
}

/// One page of results with the total number of matches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> Page<T> {
    /// Creates a page.
    pub fn new(items: Vec<T>, total: u64) -> Self {
        Self { items, total }
    }

    /// Creates an empty page.
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }
}
