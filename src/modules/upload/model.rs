use actix_web::web::Bytes;
use validator::Validate;

use crate::api::error;
use crate::constants::{DEFAULT_MAX_CHUNK_BYTES, DEFAULT_SESSION_TTL_SECS, MAX_SESSION_TTL_SECS};

/// Upload coordinator configuration
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub session_ttl: chrono::Duration,
    pub max_chunk_bytes: usize,
}

impl UploadConfig {
    /// The retention window is capped at `MAX_SESSION_TTL_SECS`.
    pub fn new(session_ttl_secs: u64, max_chunk_bytes: usize) -> Self {
        let secs = session_ttl_secs.min(MAX_SESSION_TTL_SECS) as i64;
        Self { session_ttl: chrono::Duration::seconds(secs), max_chunk_bytes }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL_SECS, DEFAULT_MAX_CHUNK_BYTES)
    }
}

/// Raw multipart fields as they arrived, before any presence checks.
#[derive(Debug, Default)]
pub struct ChunkUploadForm {
    pub file_id: Option<String>,
    pub original_name: Option<String>,
    pub chunk_index: Option<String>,
    pub total_chunks: Option<String>,
    pub chunk: Option<Bytes>,
}

impl ChunkUploadForm {
    pub fn into_submission(self) -> Result<ChunkSubmission, error::SystemError> {
        let file_id = required("fileId", self.file_id)?;
        let original_name = required("originalName", self.original_name)?;
        let chunk_index = parse_index("chunkIndex", required("chunkIndex", self.chunk_index)?)?;
        let total_chunks =
            parse_index("totalChunks", required("totalChunks", self.total_chunks)?)?;
        let payload = self
            .chunk
            .filter(|bytes| !bytes.is_empty())
            .ok_or_else(|| error::SystemError::bad_request("Missing chunk payload"))?;

        Ok(ChunkSubmission { file_id, original_name, chunk_index, total_chunks, payload })
    }
}

fn required(field: &str, value: Option<String>) -> Result<String, error::SystemError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| error::SystemError::bad_request(format!("Missing required field: {field}")))
}

fn parse_index(field: &str, value: String) -> Result<i32, error::SystemError> {
    value
        .parse::<i32>()
        .map_err(|_| error::SystemError::bad_request(format!("{field} must be an integer")))
}

/// One chunk of a file, with all metadata present.
#[derive(Debug, Clone, Validate)]
pub struct ChunkSubmission {
    #[validate(custom(function = "crate::utils::validate_file_id"))]
    pub file_id: String,
    #[validate(length(min = 1, max = 1024, message = "originalName must be 1-1024 characters"))]
    pub original_name: String,
    #[validate(range(min = 0, message = "chunkIndex cannot be negative"))]
    pub chunk_index: i32,
    #[validate(range(min = 1, message = "totalChunks must be at least 1"))]
    pub total_chunks: i32,
    pub payload: Bytes,
}

/// Values needed to create a session on first chunk arrival.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub file_id: String,
    pub original_name: String,
    pub total_chunks: i32,
}

impl From<&ChunkSubmission> for NewSession {
    fn from(chunk: &ChunkSubmission) -> Self {
        NewSession {
            file_id: chunk.file_id.clone(),
            original_name: chunk.original_name.clone(),
            total_chunks: chunk.total_chunks,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutcome {
    Accepted { chunk_index: i32 },
    Completed { url: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_form() -> ChunkUploadForm {
        ChunkUploadForm {
            file_id: Some("f1".into()),
            original_name: Some("clip.mp4".into()),
            chunk_index: Some("0".into()),
            total_chunks: Some("3".into()),
            chunk: Some(Bytes::from_static(b"abc")),
        }
    }

    #[test]
    fn test_full_form_converts() {
        let submission = full_form().into_submission().unwrap();
        assert_eq!(submission.chunk_index, 0);
        assert_eq!(submission.total_chunks, 3);
        assert_eq!(&submission.payload[..], b"abc");
    }

    #[test]
    fn test_missing_total_chunks_is_bad_request() {
        let form = ChunkUploadForm { total_chunks: None, ..full_form() };
        let err = form.into_submission().unwrap_err();
        assert!(matches!(err, error::SystemError::BadRequest(msg) if msg.contains("totalChunks")));
    }

    #[test]
    fn test_empty_payload_is_bad_request() {
        let form = ChunkUploadForm { chunk: Some(Bytes::new()), ..full_form() };
        assert!(matches!(form.into_submission(), Err(error::SystemError::BadRequest(_))));
    }

    #[test]
    fn test_non_numeric_index_is_bad_request() {
        let form = ChunkUploadForm { chunk_index: Some("first".into()), ..full_form() };
        assert!(matches!(form.into_submission(), Err(error::SystemError::BadRequest(_))));
    }

    #[test]
    fn test_zero_total_chunks_fails_validation() {
        let form = ChunkUploadForm { total_chunks: Some("0".into()), ..full_form() };
        let submission = form.into_submission().unwrap();
        assert!(submission.validate().is_err());
    }

    #[test]
    fn test_huge_ttl_is_capped() {
        let config = UploadConfig::new(u64::MAX, 1024);
        assert_eq!(config.session_ttl, chrono::Duration::seconds(MAX_SESSION_TTL_SECS as i64));
    }
}
