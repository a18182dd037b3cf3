//! Listings for the marketplace.
//!
//! This crate provides:
//! - The listing data model ([`Listing`], [`ListingImage`], [`ListingUpdate`])
//! - [`ListingRepository`], a storage boundary whose mutations are gated on
//!   `(id, owner)` and report the number of rows affected
//! - In-memory and PostgreSQL implementations

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod query;
pub mod repository;

pub use common::{ListingId, UserId};
pub use error::{RepositoryError, Result};
pub use memory::InMemoryListingRepository;
pub use model::{
    Condition, DEFAULT_CATEGORY, Listing, ListingImage, ListingStatus, ListingUpdate, NewListing, Patch,
    normalize_image_references,
};
pub use postgres::PostgresListingRepository;
pub use query::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, Page, SearchFilter};
pub use repository::ListingRepository;
