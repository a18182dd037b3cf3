//! Identity service for the marketplace.
//!
//! This crate provides:
//! - [`TokenService`]: issues and verifies signed, time-bounded bearer credentials
//! - [`IdentityService`]: registration, login and profile lookup on top of a
//!   [`UserRepository`]
//! - In-memory and PostgreSQL user repositories

pub mod error;
pub mod memory;
pub mod postgres;
pub mod service;
pub mod token;
pub mod user;

pub use error::{IdentityError, Result, TokenError};
pub use memory::InMemoryUserRepository;
pub use postgres::PostgresUserRepository;
pub use service::IdentityService;
pub use token::{DEFAULT_TOKEN_LIFETIME, TokenCheck, TokenService};
pub use user::{NewUser, Profile, User, UserRepository};
