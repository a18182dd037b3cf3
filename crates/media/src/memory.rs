use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{MediaBackend, MediaError, UploadRequest, sanitize_file_name};

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
}

#[derive(Default)]
struct State {
    objects: HashMap<String, StoredObject>,
    upload_calls: usize,
    fail_on_upload: bool,
    fail_on_upload_call: Option<usize>,
    return_empty_reference: bool,
    upload_delay: Option<Duration>,
}

/// In-memory media backend for testing.
///
/// References have the form `mem://<owner>/<uuid>-<file name>`.
#[derive(Clone, Default)]
pub struct InMemoryMediaBackend {
    state: Arc<RwLock<State>>,
}

impl InMemoryMediaBackend {
    /// Creates a new empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every upload fail with [`MediaError::Unavailable`].
    pub async fn set_fail_on_upload(&self, fail: bool) {
        self.state.write().await.fail_on_upload = fail;
    }

    /// Makes the `call`-th upload (1-based, counted from now) fail.
    pub async fn set_fail_on_upload_call(&self, call: usize) {
        let mut state = self.state.write().await;
        state.upload_calls = 0;
        state.fail_on_upload_call = Some(call);
    }

    /// Makes uploads succeed with an empty reference without storing anything.
    pub async fn set_return_empty_reference(&self, empty: bool) {
        self.state.write().await.return_empty_reference = empty;
    }

    /// Delays every upload by `delay`.
    pub async fn set_upload_delay(&self, delay: Duration) {
        self.state.write().await.upload_delay = Some(delay);
    }

    /// Returns the number of stored objects.
    pub async fn object_count(&self) -> usize {
        self.state.read().await.objects.len()
    }

    /// Returns the number of upload calls received.
    pub async fn upload_count(&self) -> usize {
        self.state.read().await.upload_calls
    }

    /// Returns the bytes and content type stored under `reference`.
    pub async fn get(&self, reference: &str) -> Option<(Vec<u8>, String)> {
        self.state
            .read()
            .await
            .objects
            .get(reference)
            .map(|o| (o.bytes.clone(), o.content_type.clone()))
    }
}

#[async_trait]
impl MediaBackend for InMemoryMediaBackend {
    async fn upload(&self, request: UploadRequest) -> Result<String, MediaError> {
        let delay = self.state.read().await.upload_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().await;
        state.upload_calls += 1;
        if state.fail_on_upload || state.fail_on_upload_call == Some(state.upload_calls) {
            return Err(MediaError::Unavailable("injected upload failure".into()));
        }
        if state.return_empty_reference {
            return Ok(String::new());
        }
        if request.bytes.is_empty() {
            return Err(MediaError::Rejected("empty object".into()));
        }

        let file_name = sanitize_file_name(&request.file_name)?;
        let reference = format!("mem://{}/{}-{}", request.owner, Uuid::new_v4(), file_name);
        state.objects.insert(
            reference.clone(),
            StoredObject {
                bytes: request.bytes,
                content_type: request.content_type,
            },
        );
        tracing::debug!(reference = %reference, "stored object in memory");
        Ok(reference)
    }
}
