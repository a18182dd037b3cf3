//! Shared identifier types for the marketplace services.

mod types;

pub use types::{ListingId, UserId};
