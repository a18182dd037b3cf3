//! Raw image payloads to stored media references.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use media::{MediaBackend, UploadRequest, is_supported_image_type};
use tracing::{debug, warn};

use crate::listing_saga::STEP_UPLOAD_MEDIA;
use crate::{Deadline, OrchestratorError, Result, UserId};

/// Content type declared when a payload carries no `data:` prefix.
pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

/// A decoded payload ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedImage {
    /// Index of the payload in the caller's input, empties included.
    pub source_index: usize,
    pub bytes: Vec<u8>,
    pub content_type: String,
    /// The base64 text as supplied, without any `data:` prefix.
    encoded: String,
}

impl PreparedImage {
    /// Inline reference embedding the payload itself.
    fn inline_reference(&self) -> String {
        format!("data:{};base64,{}", self.content_type, self.encoded)
    }
}

/// A stored image and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaReference {
    /// 1-based position among the non-empty inputs.
    pub position: usize,
    /// Index of the payload in the caller's input, empties included.
    pub source_index: usize,
    pub url: String,
}

/// Pushes an ordered list of raw payloads to a media backend.
///
/// Empty payloads are skipped and consume no position. Output order always
/// follows input order.
#[derive(Debug, Clone)]
pub struct MediaUploadCoordinator<M: MediaBackend> {
    backend: M,
}

impl<M: MediaBackend> MediaUploadCoordinator<M> {
    /// Creates a coordinator uploading to `backend`.
    pub fn new(backend: M) -> Self {
        Self { backend }
    }

    /// Returns the media backend.
    pub fn backend(&self) -> &M {
        &self.backend
    }

    /// Decodes every non-empty payload and checks its declared content type.
    /// Nothing is uploaded, so a bad payload anywhere in the list fails the
    /// call before any side effect.
    pub fn prepare<S: AsRef<str>>(&self, raw: &[S]) -> Result<Vec<PreparedImage>> {
        let mut prepared = Vec::new();
        for (index, payload) in raw.iter().enumerate() {
            let payload = payload.as_ref().trim();
            if payload.is_empty() {
                continue;
            }
            let (content_type, encoded) = split_data_url(payload).ok_or_else(|| {
                OrchestratorError::InvalidArgument(format!(
                    "image {}: malformed data URL",
                    index + 1
                ))
            })?;
            if !is_supported_image_type(content_type) {
                return Err(OrchestratorError::InvalidArgument(format!(
                    "image {}: unsupported content type {content_type}",
                    index + 1
                )));
            }
            let bytes = STANDARD.decode(encoded).map_err(|e| {
                OrchestratorError::InvalidArgument(format!("image {}: {e}", index + 1))
            })?;
            if bytes.is_empty() {
                continue;
            }
            prepared.push(PreparedImage {
                source_index: index,
                bytes,
                content_type: content_type.to_string(),
                encoded: encoded.to_string(),
            });
        }
        Ok(prepared)
    }

    /// Uploads prepared images in order.
    ///
    /// An empty reference from the backend degrades to an inline `data:` URL.
    /// A backend error or an elapsed deadline aborts immediately; images
    /// uploaded earlier in the call are left where they are.
    #[tracing::instrument(skip(self, images, deadline), fields(count = images.len()))]
    pub async fn upload(
        &self,
        owner: UserId,
        images: Vec<PreparedImage>,
        deadline: &Deadline,
    ) -> Result<Vec<MediaReference>> {
        let mut references = Vec::with_capacity(images.len());

        for (i, image) in images.into_iter().enumerate() {
            let position = i + 1;
            let inline = image.inline_reference();
            let request = UploadRequest {
                owner,
                file_name: format!("image-{position}.{}", extension_for(&image.content_type)),
                bytes: image.bytes,
                content_type: image.content_type,
            };

            let url = deadline
                .run(STEP_UPLOAD_MEDIA, self.backend.upload(request))
                .await
                .inspect_err(|e| warn!(position, error = %e, "upload failed"))?;

            let url = if url.is_empty() {
                metrics::counter!("media_upload_fallbacks_total").increment(1);
                debug!(position, "empty reference from media backend, embedding payload");
                inline
            } else {
                metrics::counter!("media_uploads_total").increment(1);
                url
            };

            references.push(MediaReference {
                position,
                source_index: image.source_index,
                url,
            });
        }

        Ok(references)
    }

    /// Decodes then uploads `raw` in one go.
    pub async fn resolve<S: AsRef<str>>(
        &self,
        owner: UserId,
        raw: &[S],
        deadline: &Deadline,
    ) -> Result<Vec<MediaReference>> {
        let prepared = self.prepare(raw)?;
        self.upload(owner, prepared, deadline).await
    }
}

/// Splits an optional `data:<mime>;base64,` prefix off a payload.
fn split_data_url(payload: &str) -> Option<(&str, &str)> {
    let Some(rest) = payload.strip_prefix("data:") else {
        return Some((DEFAULT_CONTENT_TYPE, payload));
    };
    let (mime, encoded) = rest.split_once(";base64,")?;
    let mime = if mime.is_empty() { DEFAULT_CONTENT_TYPE } else { mime };
    Some((mime, encoded.trim()))
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        _ => "bin",
    }
}
