use chrono::{DateTime, Utc};

use crate::{
    api::error,
    modules::upload::{model::NewSession, schema::UploadSessionEntity},
};

/// Keyed store for upload sessions.
///
/// `record_chunk` and `claim_finalization` must each be atomic per file id:
/// they are the only places where concurrent requests for the same file meet.
#[async_trait::async_trait]
pub trait SessionRepository {
    async fn find_by_file_id(
        &self,
        file_id: &str,
    ) -> Result<Option<UploadSessionEntity>, error::SystemError>;

    /// Creates the session if it does not exist yet, then adds `chunk_index`
    /// to its received set. Returns the session as stored afterwards.
    async fn record_chunk(
        &self,
        session: &NewSession,
        chunk_index: i32,
    ) -> Result<UploadSessionEntity, error::SystemError>;

    /// Flips the session into finalizing. Only one caller per session gets `true`.
    async fn claim_finalization(&self, file_id: &str) -> Result<bool, error::SystemError>;

    async fn mark_complete(&self, file_id: &str, url: &str) -> Result<(), error::SystemError>;

    async fn delete(&self, file_id: &str) -> Result<bool, error::SystemError>;

    /// Removes incomplete sessions created at or before `cutoff` and returns their ids.
    async fn delete_expired(&self, cutoff: DateTime<Utc>)
        -> Result<Vec<String>, error::SystemError>;
}
