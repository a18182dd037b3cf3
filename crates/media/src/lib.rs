//! Media storage for the marketplace.
//!
//! [`MediaBackend`] is the upload boundary used by the gateway. Two backends
//! are provided: [`InMemoryMediaBackend`] for tests and local runs, and
//! [`LocalMediaBackend`], which writes objects below a directory on disk.

pub mod backend;
pub mod error;
pub mod local;
pub mod memory;

pub use backend::{MediaBackend, UploadRequest, is_supported_image_type, sanitize_file_name};
pub use error::MediaError;
pub use local::LocalMediaBackend;
pub use memory::InMemoryMediaBackend;
