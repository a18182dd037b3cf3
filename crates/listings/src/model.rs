//! Listing data model.

use std::collections::HashSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ListingId, RepositoryError, Result, UserId};

/// Category assigned when the caller does not supply one.
pub const DEFAULT_CATEGORY: &str = "general";

/// Physical condition of the listed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    #[default]
    New,
    Used,
    Refurbished,
}

impl Condition {
    /// Returns the stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::New => "new",
            Condition::Used => "used",
            Condition::Refurbished => "refurbished",
        }
    }
}

impl FromStr for Condition {
    type Err = RepositoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(Condition::New),
            "used" => Ok(Condition::Used),
            "refurbished" => Ok(Condition::Refurbished),
            other => Err(RepositoryError::InvalidListing(format!(
                "unknown condition: {other}"
            ))),
        }
    }
}

/// Publication status of a listing.
///
/// `Draft` listings are only visible to their owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    #[default]
    Active,
    Archived,
    Draft,
}

impl ListingStatus {
    /// Returns the stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::Archived => "archived",
            ListingStatus::Draft => "draft",
        }
    }
}

impl FromStr for ListingStatus {
    type Err = RepositoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(ListingStatus::Active),
            "archived" => Ok(ListingStatus::Archived),
            "draft" => Ok(ListingStatus::Draft),
            other => Err(RepositoryError::InvalidListing(format!(
                "unknown status: {other}"
            ))),
        }
    }
}

/// One entry of a listing's ordered image set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingImage {
    /// 1-based position within the set.
    pub position: i32,
    pub url: String,
    pub is_primary: bool,
}

/// A stored listing with its images in position order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub owner: UserId,
    pub title: String,
    pub description: String,
    /// Price in minor currency units.
    pub price: i64,
    pub category: String,
    pub condition: Condition,
    pub status: ListingStatus,
    pub images: Vec<ListingImage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    /// Returns true if `viewer` may see this listing.
    pub fn is_visible_to(&self, viewer: Option<UserId>) -> bool {
        self.status != ListingStatus::Draft || viewer == Some(self.owner)
    }

    /// Returns the primary image, if any.
    pub fn primary_image(&self) -> Option<&ListingImage> {
        self.images.iter().find(|img| img.is_primary)
    }
}

/// Fields for a listing about to be created. The id and timestamps are
/// assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewListing {
    pub owner: UserId,
    pub title: String,
    pub description: String,
    pub price: i64,
    pub category: String,
    pub condition: Condition,
    pub status: ListingStatus,
}

impl NewListing {
    /// Creates a listing draft with default category, condition and status.
    pub fn new(owner: UserId, title: impl Into<String>, price: i64) -> Self {
        Self {
            owner,
            title: title.into(),
            description: String::new(),
            price,
            category: DEFAULT_CATEGORY.to_string(),
            condition: Condition::default(),
            status: ListingStatus::default(),
        }
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the category. An empty category falls back to the default.
    pub fn category(mut self, category: impl Into<String>) -> Self {
        let category = category.into();
        self.category = if category.trim().is_empty() {
            DEFAULT_CATEGORY.to_string()
        } else {
            category
        };
        self
    }

    /// Sets the condition.
    pub fn condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    /// Sets the status.
    pub fn status(mut self, status: ListingStatus) -> Self {
        self.status = status;
        self
    }

    /// Checks the required fields.
    pub fn validate(&self) -> Result<()> {
        validate_title(&self.title)?;
        validate_price(self.price)
    }
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(RepositoryError::InvalidListing("title is required".into()));
    }
    Ok(())
}

fn validate_price(price: i64) -> Result<()> {
    if price <= 0 {
        return Err(RepositoryError::InvalidListing(
            "price must be positive".into(),
        ));
    }
    Ok(())
}

/// A field of a partial update: either left untouched or set to a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
    Unset,
    Set(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Unset
    }
}

impl<T> From<Option<T>> for Patch<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Patch::Set(v),
            None => Patch::Unset,
        }
    }
}

impl<T> Patch<T> {
    /// Returns true if a value was supplied.
    pub fn is_set(&self) -> bool {
        matches!(self, Patch::Set(_))
    }

    /// Returns the supplied value, if any.
    pub fn as_set(&self) -> Option<&T> {
        match self {
            Patch::Set(v) => Some(v),
            Patch::Unset => None,
        }
    }
}

impl<T: Clone> Patch<T> {
    /// Overwrites `target` if a value was supplied.
    pub fn apply_to(&self, target: &mut T) {
        if let Patch::Set(v) = self {
            *target = v.clone();
        }
    }
}

/// A partial update of a listing's mutable fields.
///
/// The owner is not part of the update: it never changes after creation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingUpdate {
    pub title: Patch<String>,
    pub description: Patch<String>,
    pub price: Patch<i64>,
    pub category: Patch<String>,
    pub condition: Patch<Condition>,
    pub status: Patch<ListingStatus>,
}

impl ListingUpdate {
    /// Creates an update that touches nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no field is set.
    pub fn is_empty(&self) -> bool {
        !(self.title.is_set()
            || self.description.is_set()
            || self.price.is_set()
            || self.category.is_set()
            || self.condition.is_set()
            || self.status.is_set())
    }

    /// Checks the supplied values. Unset fields are not checked.
    pub fn validate(&self) -> Result<()> {
        if let Some(title) = self.title.as_set() {
            validate_title(title)?;
        }
        if let Some(price) = self.price.as_set() {
            validate_price(*price)?;
        }
        if let Some(category) = self.category.as_set()
            && category.trim().is_empty()
        {
            return Err(RepositoryError::InvalidListing(
                "category must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Applies the set fields to `listing`.
    pub fn apply_to(&self, listing: &mut Listing) {
        self.title.apply_to(&mut listing.title);
        self.description.apply_to(&mut listing.description);
        self.price.apply_to(&mut listing.price);
        self.category.apply_to(&mut listing.category);
        self.condition.apply_to(&mut listing.condition);
        self.status.apply_to(&mut listing.status);
    }
}

/// Prepares references for a wholesale image replace: empty entries are
/// skipped and only the first occurrence of a duplicate is kept.
pub fn normalize_image_references<I, S>(references: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    references
        .into_iter()
        .filter_map(|r| {
            let r = r.as_ref();
            if r.trim().is_empty() || !seen.insert(r.to_string()) {
                None
            } else {
                Some(r.to_string())
            }
        })
        .collect()
}

/// Builds the image rows for a replaced set: positions from 1, first is primary.
pub(crate) fn numbered_images(references: &[String]) -> Vec<ListingImage> {
    references
        .iter()
        .enumerate()
        .map(|(i, url)| ListingImage {
            position: i as i32 + 1,
            url: url.clone(),
            is_primary: i == 0,
        })
        .collect()
}
