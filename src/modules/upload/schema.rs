use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

use crate::modules::upload::model::ChunkOutcome;

/// Upload session row. One per in-flight file, keyed by the client's file id.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UploadSessionEntity {
    pub file_id: String,
    pub original_name: String,
    pub total_chunks: i32,
    pub received_chunks: Vec<i32>,
    pub finalizing: bool,
    pub is_complete: bool,
    pub final_media_url: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl UploadSessionEntity {
    pub fn new(file_id: String, original_name: String, total_chunks: i32) -> Self {
        Self {
            file_id,
            original_name,
            total_chunks,
            received_chunks: Vec::new(),
            finalizing: false,
            is_complete: false,
            final_media_url: None,
            created_at: chrono::Utc::now(),
        }
    }

    /// Adds `chunk_index` to the received set. Returns false if it was already there.
    pub fn record_chunk(&mut self, chunk_index: i32) -> bool {
        if self.received_chunks.contains(&chunk_index) {
            return false;
        }
        self.received_chunks.push(chunk_index);
        true
    }

    pub fn uploaded_count(&self) -> usize {
        self.received_chunks.len()
    }

    pub fn has_all_chunks(&self) -> bool {
        self.received_chunks.len() == self.total_chunks as usize
    }

    pub fn is_expired(&self, ttl: chrono::Duration) -> bool {
        self.created_at
            .checked_add_signed(ttl)
            .is_some_and(|deadline| deadline <= chrono::Utc::now())
    }
}

/// Progress report for a live upload session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStatusResponse {
    pub total_chunks: u32,
    pub uploaded_chunks_count: u32,
    pub uploaded_chunks: Vec<u32>,
}

impl From<UploadSessionEntity> for UploadStatusResponse {
    fn from(entity: UploadSessionEntity) -> Self {
        let mut uploaded_chunks: Vec<u32> =
            entity.received_chunks.iter().map(|&index| index as u32).collect();
        uploaded_chunks.sort_unstable();

        UploadStatusResponse {
            total_chunks: entity.total_chunks as u32,
            uploaded_chunks_count: uploaded_chunks.len() as u32,
            uploaded_chunks,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChunkUploadResponse {
    Accepted {
        #[serde(rename = "chunkIndex")]
        chunk_index: u32,
    },
    Completed {
        url: String,
    },
}

impl From<ChunkOutcome> for ChunkUploadResponse {
    fn from(outcome: ChunkOutcome) -> Self {
        match outcome {
            ChunkOutcome::Accepted { chunk_index } => {
                ChunkUploadResponse::Accepted { chunk_index: chunk_index as u32 }
            }
            ChunkOutcome::Completed { url } => ChunkUploadResponse::Completed { url },
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UploadStatusQuery {
    #[validate(custom(function = "crate::utils::validate_file_id"))]
    pub file_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_chunk_is_idempotent() {
        let mut session = UploadSessionEntity::new("f1".into(), "a.mp4".into(), 3);
        assert!(session.record_chunk(1));
        assert!(!session.record_chunk(1));
        assert_eq!(session.uploaded_count(), 1);
        assert!(!session.has_all_chunks());
    }

    #[test]
    fn test_status_lists_chunks_in_index_order() {
        let mut session = UploadSessionEntity::new("f1".into(), "a.mp4".into(), 5);
        for index in [3, 0, 2] {
            session.record_chunk(index);
        }
        let status = UploadStatusResponse::from(session);
        assert_eq!(status.total_chunks, 5);
        assert_eq!(status.uploaded_chunks_count, 3);
        assert_eq!(status.uploaded_chunks, vec![0, 2, 3]);
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let status = UploadStatusResponse {
            total_chunks: 2,
            uploaded_chunks_count: 1,
            uploaded_chunks: vec![0],
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"totalChunks": 2, "uploadedChunksCount": 1, "uploadedChunks": [0]})
        );
    }

    #[test]
    fn test_chunk_response_deserializes_both_shapes() {
        let accepted: ChunkUploadResponse =
            serde_json::from_str(r#"{"message":"Chunk uploaded successfully!","chunkIndex":4}"#)
                .unwrap();
        assert_eq!(accepted, ChunkUploadResponse::Accepted { chunk_index: 4 });

        let completed: ChunkUploadResponse =
            serde_json::from_str(r#"{"message":"done","url":"https://cdn/x.mp4"}"#).unwrap();
        assert_eq!(completed, ChunkUploadResponse::Completed { url: "https://cdn/x.mp4".into() });
    }

    #[test]
    fn test_expiry_respects_ttl() {
        let mut session = UploadSessionEntity::new("f1".into(), "a.mp4".into(), 1);
        assert!(!session.is_expired(chrono::Duration::days(7)));
        session.created_at = chrono::Utc::now() - chrono::Duration::days(8);
        assert!(session.is_expired(chrono::Duration::days(7)));
    }

    #[test]
    fn test_out_of_range_ttl_never_expires() {
        let session = UploadSessionEntity::new("f1".into(), "a.mp4".into(), 1);
        assert!(!session.is_expired(chrono::Duration::MAX));
    }
}
