use crate::batch::BatchId;
use crate::task::FileHandle;
use api_client::{ApiClient, ApiClientError, ProgressCallback};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server rejected upload with status {0}")]
    Rejected(u16),
    #[error("cannot read file: {0}")]
    Unreadable(String),
}

impl From<ApiClientError> for TransportError {
    fn from(e: ApiClientError) -> Self {
        match e {
            ApiClientError::Request(msg) => TransportError::Network(msg),
            ApiClientError::Status { status, .. } => TransportError::Rejected(status),
            ApiClientError::Io(msg) => TransportError::Unreadable(msg),
        }
    }
}

/// Moves one file to the server. Implementations must resolve on every
/// outcome; the worker pool counts on it to free the slot.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    async fn upload(
        &self,
        file: &FileHandle,
        user_id: &str,
        batch_id: &BatchId,
        progress: ProgressCallback,
    ) -> Result<(), TransportError>;
}

#[async_trait]
impl UploadTransport for ApiClient {
    async fn upload(
        &self,
        file: &FileHandle,
        user_id: &str,
        batch_id: &BatchId,
        progress: ProgressCallback,
    ) -> Result<(), TransportError> {
        self.upload_file(&file.name, &file.content, user_id, batch_id.as_str(), progress)
            .await
            .map_err(TransportError::from)
    }
}
