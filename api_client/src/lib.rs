//! API client module for the photo vault server.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, StatusCode};
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::io::ReaderStream;

const UPLOAD_PATH: &str = "/api/upload";
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Called with `(bytes_sent, bytes_total)` every time a chunk of the request
/// body is handed to the connection.
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

type ChunkStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + Sync>>;

/// Raw bytes of a file to upload.
#[derive(Debug, Clone)]
pub enum FileContent {
    /// A file on the local filesystem, streamed from disk.
    Path(PathBuf),
    /// Bytes already held in memory.
    Memory(Bytes),
}

#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error("Request Error: {0}")]
    Request(String),
    #[error("Upload rejected with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("IO Error: {0}")]
    Io(String),
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        ApiClient {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Upload a single file as multipart form data.
    ///
    /// The form carries the fields `file`, `userid` and `upload_batch_id`.
    /// Only HTTP 200 counts as success.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self, content, on_progress)))]
    pub async fn upload_file(
        &self,
        file_name: &str,
        content: &FileContent,
        user_id: &str,
        batch_id: &str,
        on_progress: ProgressCallback,
    ) -> Result<(), ApiClientError> {
        let (chunks, total) = open_chunks(content).await?;

        let mut sent = 0u64;
        let body = chunks.map(move |chunk| {
            if let Ok(bytes) = &chunk {
                sent += bytes.len() as u64;
                on_progress(sent, total);
            }
            chunk
        });

        let file_part = Part::stream_with_length(Body::wrap_stream(body), total)
            .file_name(file_name.to_string());
        let form = Form::new()
            .part("file", file_part)
            .text("userid", user_id.to_string())
            .text("upload_batch_id", batch_id.to_string());

        let url = format!("{}{}", self.base_url, UPLOAD_PATH);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ApiClientError::Request(e.to_string()))?;

        if response.status() != StatusCode::OK {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ApiClientError::Status { status, body });
        }

        tracing::debug!(file = file_name, bytes = total, "upload accepted");
        Ok(())
    }
}

async fn open_chunks(content: &FileContent) -> Result<(ChunkStream, u64), ApiClientError> {
    match content {
        FileContent::Path(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .map_err(|e| ApiClientError::Io(format!("{}: {}", path.display(), e)))?;
            let total = file
                .metadata()
                .await
                .map_err(|e| ApiClientError::Io(format!("{}: {}", path.display(), e)))?
                .len();
            let stream: ChunkStream = Box::pin(ReaderStream::with_capacity(file, UPLOAD_CHUNK_SIZE));
            Ok((stream, total))
        }
        FileContent::Memory(data) => {
            let total = data.len() as u64;
            let chunks: Vec<std::io::Result<Bytes>> = (0..data.len())
                .step_by(UPLOAD_CHUNK_SIZE)
                .map(|start| Ok(data.slice(start..(start + UPLOAD_CHUNK_SIZE).min(data.len()))))
                .collect();
            let stream: ChunkStream = Box::pin(futures::stream::iter(chunks));
            Ok((stream, total))
        }
    }
}
