use std::path::{Path, PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

use crate::{MediaBackend, MediaError, UploadRequest, is_supported_image_type, sanitize_file_name};

/// Media backend writing objects below a directory on local disk.
///
/// An object uploaded by `owner` as `name` is written to
/// `<root>/<owner>/<uuid>-<name>` and referenced as
/// `<public_base>/<owner>/<uuid>-<name>`.
#[derive(Debug, Clone)]
pub struct LocalMediaBackend {
    root: PathBuf,
    public_base: String,
}

impl LocalMediaBackend {
    /// Creates a backend rooted at `root`. The directory is created on first upload.
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Returns the storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl MediaBackend for LocalMediaBackend {
    async fn upload(&self, request: UploadRequest) -> Result<String, MediaError> {
        if request.bytes.is_empty() {
            return Err(MediaError::Rejected("empty object".into()));
        }
        if !is_supported_image_type(&request.content_type) {
            return Err(MediaError::Rejected(format!(
                "unsupported content type: {}",
                request.content_type
            )));
        }

        let file_name = format!("{}-{}", Uuid::new_v4(), sanitize_file_name(&request.file_name)?);
        let owner = request.owner.to_string();

        let dir = self.root.join(&owner);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(&file_name);
        tokio::fs::write(&path, &request.bytes).await?;

        tracing::debug!(path = %path.display(), bytes = request.bytes.len(), "stored object on disk");
        Ok(format!("{}/{}/{}", self.public_base, owner, file_name))
    }
}
