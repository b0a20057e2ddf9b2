use log::{debug, info, warn};
use std::sync::Arc;
use validator::Validate;

use crate::api::error;
use crate::modules::upload::{
    chunk_store::ChunkStore,
    media_store::MediaStore,
    model::{ChunkOutcome, ChunkSubmission, NewSession, UploadConfig},
    repository::SessionRepository,
    schema::{UploadSessionEntity, UploadStatusResponse},
};

/// Upload coordinator: per-file bookkeeping of partial uploads and finalization.
///
/// A failed finalization discards the session and its buffered chunks, so the
/// client restarts that file from chunk 0.
#[derive(Clone)]
pub struct UploadService {
    sessions: Arc<dyn SessionRepository + Send + Sync>,
    chunks: Arc<dyn ChunkStore + Send + Sync>,
    media: Arc<dyn MediaStore + Send + Sync>,
    config: UploadConfig,
}

impl UploadService {
    pub fn with_dependencies(
        sessions: Arc<dyn SessionRepository + Send + Sync>,
        chunks: Arc<dyn ChunkStore + Send + Sync>,
        media: Arc<dyn MediaStore + Send + Sync>,
        config: UploadConfig,
    ) -> Self {
        info!("UploadService initialized with dependencies");
        UploadService { sessions, chunks, media, config }
    }

    pub fn max_chunk_bytes(&self) -> usize {
        self.config.max_chunk_bytes
    }

    pub async fn receive_chunk(
        &self,
        chunk: ChunkSubmission,
    ) -> Result<ChunkOutcome, error::SystemError> {
        chunk.validate().map_err(|e| error::SystemError::bad_request(e.to_string()))?;
        if chunk.payload.is_empty() {
            return Err(error::SystemError::bad_request("Missing chunk payload"));
        }
        if chunk.chunk_index >= chunk.total_chunks {
            return Err(error::SystemError::bad_request(format!(
                "chunkIndex {} is outside 0..{}",
                chunk.chunk_index, chunk.total_chunks
            )));
        }

        let file_id = chunk.file_id.as_str();
        let existing = self.sessions.find_by_file_id(file_id).await.map_err(persistence)?;
        let mut already_recorded = false;
        if let Some(session) = existing {
            if session.is_expired(self.config.session_ttl) {
                info!("Upload session {} expired, starting over", file_id);
                self.discard(file_id).await;
            } else if session.total_chunks != chunk.total_chunks {
                return Err(error::SystemError::bad_request(format!(
                    "totalChunks {} does not match the session's {}",
                    chunk.total_chunks, session.total_chunks
                )));
            } else {
                already_recorded = session.received_chunks.contains(&chunk.chunk_index);
            }
        }

        self.chunks.put(file_id, chunk.chunk_index, &chunk.payload).await?;

        let new_session = NewSession::from(&chunk);
        let session = match self.sessions.record_chunk(&new_session, chunk.chunk_index).await {
            Ok(session) => session,
            Err(e) => {
                if !already_recorded {
                    self.release_unrecorded_chunk(file_id, chunk.chunk_index).await;
                }
                return Err(persistence(e));
            }
        };

        if !session.has_all_chunks() {
            debug!(
                "Upload {}: chunk {} recorded ({}/{})",
                file_id,
                chunk.chunk_index,
                session.uploaded_count(),
                session.total_chunks
            );
            return Ok(ChunkOutcome::Accepted { chunk_index: chunk.chunk_index });
        }

        if !self.sessions.claim_finalization(file_id).await.map_err(persistence)? {
            info!("Upload {} is already being finalized", file_id);
            return Ok(ChunkOutcome::Accepted { chunk_index: chunk.chunk_index });
        }

        match self.finalize(&session).await {
            Ok(url) => Ok(ChunkOutcome::Completed { url }),
            Err(e) => {
                warn!("Finalization of {} failed, discarding session: {}", file_id, e);
                self.discard(file_id).await;
                Err(e)
            }
        }
    }

    /// Removes bytes written for a chunk whose recording failed, unless the
    /// session turns out to list that index. When the session can't be read
    /// the bytes stay; the expiry sweep reclaims them.
    async fn release_unrecorded_chunk(&self, file_id: &str, chunk_index: i32) {
        let recorded = match self.sessions.find_by_file_id(file_id).await {
            Ok(Some(session)) => session.received_chunks.contains(&chunk_index),
            Ok(None) => false,
            Err(_) => true,
        };
        if recorded {
            return;
        }
        if let Err(e) = self.chunks.remove(file_id, chunk_index).await {
            warn!("Failed to remove chunk {} of {}: {}", chunk_index, file_id, e);
        }
    }

    async fn finalize(&self, session: &UploadSessionEntity) -> Result<String, error::SystemError> {
        let file_id = session.file_id.as_str();
        info!("Finalizing upload {} ({} chunks)", file_id, session.total_chunks);

        let assembled = self
            .chunks
            .assemble(file_id, session.total_chunks)
            .await
            .map_err(|e| error::SystemError::finalization(e.to_string()))?;

        let url = self.media.finalize(file_id, &session.original_name, &assembled).await.map_err(
            |e| match e {
                error::SystemError::Finalization(_) => e,
                other => error::SystemError::finalization(other.to_string()),
            },
        )?;

        if let Err(e) = self.sessions.mark_complete(file_id, &url).await {
            warn!("Failed to mark upload {} complete: {}", file_id, e);
        }
        self.discard(file_id).await;

        info!("Upload {} finalized at {}", file_id, url);
        Ok(url)
    }

    /// Removes the session record and buffered chunks. Failures are logged only.
    async fn discard(&self, file_id: &str) {
        if let Err(e) = self.chunks.purge(file_id).await {
            warn!("Failed to purge chunks of {}: {}", file_id, e);
        }
        if let Err(e) = self.sessions.delete(file_id).await {
            warn!("Failed to delete upload session {}: {}", file_id, e);
        }
    }

    /// Progress for a live session. `None` means no active session: unknown,
    /// expired, or already completed.
    pub async fn get_status(
        &self,
        file_id: &str,
    ) -> Result<Option<UploadStatusResponse>, error::SystemError> {
        let session = self.sessions.find_by_file_id(file_id).await?;
        Ok(session
            .filter(|s| !s.is_complete && !s.is_expired(self.config.session_ttl))
            .map(UploadStatusResponse::from))
    }

    /// Deletes sessions past the retention window along with their buffers.
    pub async fn purge_expired(&self) -> Result<usize, error::SystemError> {
        let cutoff = chrono::Utc::now()
            .checked_sub_signed(self.config.session_ttl)
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC);

        let expired = self.sessions.delete_expired(cutoff).await?;
        for file_id in &expired {
            if let Err(e) = self.chunks.purge(file_id).await {
                warn!("Failed to purge chunks of expired upload {}: {}", file_id, e);
            }
        }

        let stale = self.chunks.purge_stale(cutoff.into()).await?;
        if !expired.is_empty() || stale > 0 {
            info!("Purged {} expired upload sessions, {} stale chunk buffers", expired.len(), stale);
        }
        Ok(expired.len())
    }
}

fn persistence(e: error::SystemError) -> error::SystemError {
    match e {
        error::SystemError::Persistence(_) => e,
        other => error::SystemError::persistence(other.to_string()),
    }
}
