use std::sync::Arc;

use async_trait::async_trait;
use common::UserId;

use crate::MediaError;

/// Longest file name kept after sanitising, extension included.
const MAX_FILE_NAME_LEN: usize = 200;

const SUPPORTED_IMAGE_TYPES: [&str; 6] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/svg+xml",
];

/// One object to store.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub owner: UserId,
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub file_name: String,
}

/// Upload boundary of the media backend.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Stores an object and returns a durable reference to it.
    ///
    /// An empty reference is a soft failure: the object was not stored but
    /// the backend is healthy. Hard failures are errors.
    async fn upload(&self, request: UploadRequest) -> Result<String, MediaError>;
}

#[async_trait]
impl<T: MediaBackend + ?Sized> MediaBackend for Arc<T> {
    async fn upload(&self, request: UploadRequest) -> Result<String, MediaError> {
        (**self).upload(request).await
    }
}

/// Returns true for the image types backends accept.
pub fn is_supported_image_type(content_type: &str) -> bool {
    SUPPORTED_IMAGE_TYPES.contains(&content_type)
}

/// Makes a caller-supplied file name safe to use as a path component.
///
/// Names containing path traversal or separators are rejected outright. Any
/// other character outside `[A-Za-z0-9_.-]` becomes `_`, and long names are
/// shortened keeping their extension.
pub fn sanitize_file_name(name: &str) -> Result<String, MediaError> {
    if name.is_empty() {
        return Err(MediaError::Rejected("file name is empty".into()));
    }
    if name.contains("..") || name.contains('/') || name.contains('\\') {
        return Err(MediaError::Rejected(format!("unsafe file name: {name}")));
    }

    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.len() <= MAX_FILE_NAME_LEN {
        return Ok(cleaned);
    }
    let (stem, ext) = match cleaned.rfind('.') {
        Some(dot) if dot > 0 => cleaned.split_at(dot),
        _ => (cleaned.as_str(), ""),
    };
    let keep = MAX_FILE_NAME_LEN.saturating_sub(ext.len());
    Ok(format!("{}{}", &stem[..keep.min(stem.len())], ext))
}
