use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::{
    api::error,
    modules::upload::{
        model::NewSession, repository::SessionRepository, schema::UploadSessionEntity,
    },
};

/// Process-local session store. Used when no external store is configured and in tests.
#[derive(Default)]
pub struct SessionMemoryRepository {
    sessions: Mutex<HashMap<String, UploadSessionEntity>>,
}

impl SessionMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SessionRepository for SessionMemoryRepository {
    async fn find_by_file_id(
        &self,
        file_id: &str,
    ) -> Result<Option<UploadSessionEntity>, error::SystemError> {
        let sessions = self.sessions.lock().await;
        Ok(sessions.get(file_id).cloned())
    }

    async fn record_chunk(
        &self,
        session: &NewSession,
        chunk_index: i32,
    ) -> Result<UploadSessionEntity, error::SystemError> {
        let mut sessions = self.sessions.lock().await;
        let entry = sessions.entry(session.file_id.clone()).or_insert_with(|| {
            UploadSessionEntity::new(
                session.file_id.clone(),
                session.original_name.clone(),
                session.total_chunks,
            )
        });
        entry.record_chunk(chunk_index);
        Ok(entry.clone())
    }

    async fn claim_finalization(&self, file_id: &str) -> Result<bool, error::SystemError> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(file_id) {
            Some(session) if !session.finalizing && session.has_all_chunks() => {
                session.finalizing = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_complete(&self, file_id: &str, url: &str) -> Result<(), error::SystemError> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .get_mut(file_id)
            .ok_or_else(|| error::SystemError::not_found("Upload session not found"))?;
        session.is_complete = true;
        session.final_media_url = Some(url.to_string());
        Ok(())
    }

    async fn delete(&self, file_id: &str) -> Result<bool, error::SystemError> {
        let mut sessions = self.sessions.lock().await;
        Ok(sessions.remove(file_id).is_some())
    }

    async fn delete_expired(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<String>, error::SystemError> {
        let mut sessions = self.sessions.lock().await;
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, session)| !session.is_complete && session.created_at <= cutoff)
            .map(|(id, _)| id.clone())
            .collect();

        for file_id in &expired {
            sessions.remove(file_id);
        }

        Ok(expired)
    }
}
