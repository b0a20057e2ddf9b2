use std::collections::BTreeSet;
use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::client::api::{ChunkMetadata, UploadApi};
use crate::client::error::UploadError;
use crate::modules::upload::schema::ChunkUploadResponse;

/// Default chunk size: 5 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingStatus {
    Pending,
    Uploading,
    Success,
    Failed,
    Cancelled,
}

/// Client-side state of one file being uploaded.
#[derive(Debug)]
pub struct PendingUpload {
    pub file_id: String,
    pub path: PathBuf,
    pub original_name: String,
    pub file_size: u64,
    /// Index of the chunk most recently sent.
    pub cursor: u32,
    /// Percentage in `0.0..=100.0`.
    pub progress: f64,
    pub status: PendingStatus,
    pub error: Option<String>,
    pub url: Option<String>,
    cancel: CancellationToken,
}

impl PendingUpload {
    pub async fn from_path(
        path: impl Into<PathBuf>,
        file_id: impl Into<String>,
    ) -> Result<Self, UploadError> {
        let path = path.into();
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(UploadError::InvalidFile(format!("{} is not a file", path.display())));
        }
        let original_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_owned)
            .ok_or_else(|| {
                UploadError::InvalidFile(format!("{} has no usable file name", path.display()))
            })?;

        Ok(Self {
            file_id: file_id.into(),
            path,
            original_name,
            file_size: metadata.len(),
            cursor: 0,
            progress: 0.0,
            status: PendingStatus::Pending,
            error: None,
            url: None,
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Chunk count for `chunk_size`. The server stores indices as 32-bit
    /// signed integers, so larger counts are refused.
    pub fn total_chunks(&self, chunk_size: u64) -> Result<u32, UploadError> {
        let count = self.file_size.div_ceil(chunk_size.max(1));
        i32::try_from(count).map(|n| n as u32).map_err(|_| {
            UploadError::InvalidFile(format!(
                "{} needs {} chunks of {} bytes; use a larger chunk size",
                self.original_name, count, chunk_size
            ))
        })
    }
}

/// Progress events published while uploading.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    Started { file_id: String, total_chunks: u32 },
    Resumed { file_id: String, from_chunk: u32, uploaded_chunks: u32 },
    Progress { file_id: String, chunk_index: u32, percent: f64 },
    /// `url` is `None` when the server already held every chunk.
    Completed { file_id: String, url: Option<String> },
    Failed { file_id: String, error: String },
    Cancelled { file_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Completed { url: String },
    AlreadyComplete,
    Cancelled,
}

pub struct ChunkUploader {
    api: Arc<dyn UploadApi>,
    chunk_size: u64,
    events: Option<mpsc::Sender<UploadEvent>>,
}

impl ChunkUploader {
    pub fn new(api: Arc<dyn UploadApi>) -> Self {
        Self { api, chunk_size: DEFAULT_CHUNK_SIZE, events: None }
    }

    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_events(mut self, events: mpsc::Sender<UploadEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    async fn emit(&self, event: UploadEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event).await;
        }
    }

    /// Uploads every chunk the server is missing, resuming an earlier attempt.
    ///
    /// Cancellation is reported as `Ok(UploadOutcome::Cancelled)`. Any other
    /// failure stops the upload without retrying; calling this again re-queries
    /// the server and resumes.
    pub async fn begin_upload(
        &self,
        upload: &mut PendingUpload,
    ) -> Result<UploadOutcome, UploadError> {
        upload.status = PendingStatus::Uploading;
        upload.error = None;

        let result = match self.run(upload).await {
            Err(UploadError::Cancelled) => Ok(UploadOutcome::Cancelled),
            other => other,
        };

        let file_id = upload.file_id.clone();
        match &result {
            Ok(UploadOutcome::Completed { url }) => {
                info!(file_id = %file_id, url = %url, "upload completed");
                upload.status = PendingStatus::Success;
                upload.progress = 100.0;
                upload.url = Some(url.clone());
                self.emit(UploadEvent::Completed { file_id, url: Some(url.clone()) }).await;
            }
            Ok(UploadOutcome::AlreadyComplete) => {
                info!(file_id = %file_id, "server already holds every chunk");
                upload.status = PendingStatus::Success;
                upload.progress = 100.0;
                self.emit(UploadEvent::Completed { file_id, url: None }).await;
            }
            Ok(UploadOutcome::Cancelled) => {
                info!(file_id = %file_id, chunk = upload.cursor, "upload cancelled");
                upload.status = PendingStatus::Cancelled;
                self.emit(UploadEvent::Cancelled { file_id }).await;
            }
            Err(e) => {
                warn!(file_id = %file_id, chunk = upload.cursor, error = %e, "upload failed");
                upload.status = PendingStatus::Failed;
                upload.error = Some(e.to_string());
                self.emit(UploadEvent::Failed { file_id, error: e.to_string() }).await;
            }
        }
        result
    }

    async fn run(&self, upload: &mut PendingUpload) -> Result<UploadOutcome, UploadError> {
        if upload.file_size == 0 {
            return Err(UploadError::InvalidFile(format!("{} is empty", upload.original_name)));
        }
        let cancel = upload.cancel.clone();
        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        let total_chunks = upload.total_chunks(self.chunk_size)?;
        self.emit(UploadEvent::Started { file_id: upload.file_id.clone(), total_chunks }).await;

        let uploaded = self.uploaded_chunks(&upload.file_id, total_chunks).await?;
        if uploaded.len() as u32 >= total_chunks {
            return Ok(UploadOutcome::AlreadyComplete);
        }

        let missing: Vec<u32> = (0..total_chunks).filter(|i| !uploaded.contains(i)).collect();
        if !uploaded.is_empty() {
            info!(
                file_id = %upload.file_id,
                from_chunk = missing[0],
                uploaded = uploaded.len(),
                "resuming upload"
            );
            self.emit(UploadEvent::Resumed {
                file_id: upload.file_id.clone(),
                from_chunk: missing[0],
                uploaded_chunks: uploaded.len() as u32,
            })
            .await;
        }

        for chunk_index in missing {
            if cancel.is_cancelled() {
                return Err(UploadError::Cancelled);
            }
            upload.cursor = chunk_index;

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(UploadError::Cancelled),
                result = self.send_chunk(upload, chunk_index, total_chunks) => result?,
            };

            upload.progress = f64::from(chunk_index + 1) * 100.0 / f64::from(total_chunks);
            self.emit(UploadEvent::Progress {
                file_id: upload.file_id.clone(),
                chunk_index,
                percent: upload.progress,
            })
            .await;

            if let ChunkUploadResponse::Completed { url } = response {
                return Ok(UploadOutcome::Completed { url });
            }
        }

        Err(UploadError::NotFinalized { file_id: upload.file_id.clone() })
    }

    /// Chunks the server already holds. A failed query means starting over
    /// from chunk 0. A live session split into a different number of chunks
    /// can't be resumed with this chunk size and stops the upload.
    async fn uploaded_chunks(
        &self,
        file_id: &str,
        total_chunks: u32,
    ) -> Result<BTreeSet<u32>, UploadError> {
        match self.api.upload_status(file_id).await {
            Ok(Some(status)) if status.total_chunks == total_chunks => {
                Ok(status.uploaded_chunks.into_iter().filter(|&i| i < total_chunks).collect())
            }
            Ok(Some(status)) => Err(UploadError::ChunkCountMismatch {
                file_id: file_id.to_string(),
                server_total: status.total_chunks,
                local_total: total_chunks,
            }),
            Ok(None) => Ok(BTreeSet::new()),
            Err(e) => {
                warn!(file_id = %file_id, error = %e, "status query failed, starting from chunk 0");
                Ok(BTreeSet::new())
            }
        }
    }

    async fn send_chunk(
        &self,
        upload: &PendingUpload,
        chunk_index: u32,
        total_chunks: u32,
    ) -> Result<ChunkUploadResponse, UploadError> {
        let start = u64::from(chunk_index) * self.chunk_size;
        let len = self.chunk_size.min(upload.file_size.saturating_sub(start));

        let mut file = tokio::fs::File::open(&upload.path).await?;
        file.seek(SeekFrom::Start(start)).await?;
        let mut chunk = Vec::with_capacity(len as usize);
        file.take(len).read_to_end(&mut chunk).await?;
        if chunk.len() as u64 != len || len == 0 {
            return Err(UploadError::InvalidFile(format!(
                "{} changed size during upload",
                upload.original_name
            )));
        }

        let meta = ChunkMetadata {
            file_id: upload.file_id.clone(),
            original_name: upload.original_name.clone(),
            chunk_index,
            total_chunks,
        };
        self.api.upload_chunk(&meta, chunk).await
    }
}
