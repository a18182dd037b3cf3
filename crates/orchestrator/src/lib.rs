//! Listing workflows for the marketplace gateway.
//!
//! This crate provides:
//! - [`AuthGateway`]: turns an inbound `Authorization` header into a verified
//!   [`UserId`] or a single, reason-free rejection
//! - [`MediaUploadCoordinator`]: decodes raw image payloads and pushes them to
//!   the media backend, preserving input order
//! - [`AdOrchestrator`]: create/update/delete-with-images as a sequence of
//!   non-transactional steps under a per-call [`Deadline`]
//!
//! Steps that completed before a failure are never undone: a failed attach
//! leaves the listing with the images attached so far.

pub mod auth;
pub mod coordinator;
pub mod deadline;
pub mod error;
pub mod listing_saga;
pub mod upload;

pub use auth::{AuthGateway, AuthOutcome, bearer_token};
pub use common::{ListingId, UserId};
pub use coordinator::{AdOrchestrator, ListingDraft, Timeouts};
pub use deadline::Deadline;
pub use error::{OrchestratorError, Result};
pub use upload::{MediaReference, MediaUploadCoordinator, PreparedImage};
