use chrono::{DateTime, Utc};
use deadpool_redis::redis::{self, AsyncCommands};

use crate::{
    api::error,
    modules::upload::{
        model::NewSession, repository::SessionRepository, schema::UploadSessionEntity,
    },
};

/// Redis-backed session store.
///
/// Layout per file id:
/// - `upload:{id}` JSON session record, created with `SET NX EX <ttl>`
/// - `upload:{id}:chunks` set of received indices
/// - `upload:{id}:finalizing` claim flag, created with `SET NX`
///
/// Every key expires with the session record, so the retention window is
/// enforced by Redis itself and `delete_expired` has nothing to do.
#[derive(Clone)]
pub struct SessionRedisRepository {
    pool: deadpool_redis::Pool,
    ttl_secs: u64,
}

fn session_key(file_id: &str) -> String {
    format!("upload:{file_id}")
}

fn chunks_key(file_id: &str) -> String {
    format!("upload:{file_id}:chunks")
}

fn finalizing_key(file_id: &str) -> String {
    format!("upload:{file_id}:finalizing")
}

impl SessionRedisRepository {
    pub fn new(pool: deadpool_redis::Pool, ttl_secs: u64) -> Self {
        Self { pool, ttl_secs }
    }

    async fn load(
        &self,
        conn: &mut deadpool_redis::Connection,
        file_id: &str,
    ) -> Result<Option<UploadSessionEntity>, error::SystemError> {
        let raw: Option<String> = conn.get(session_key(file_id)).await?;
        let Some(raw) = raw else {
            return Ok(None);
        };

        let mut session: UploadSessionEntity = serde_json::from_str(&raw)?;
        session.received_chunks = conn.smembers(chunks_key(file_id)).await?;
        session.finalizing = conn.exists(finalizing_key(file_id)).await?;
        Ok(Some(session))
    }

    /// Seconds left on the session record, or the full window if Redis reports none.
    async fn remaining_ttl(
        &self,
        conn: &mut deadpool_redis::Connection,
        file_id: &str,
    ) -> Result<i64, error::SystemError> {
        let ttl: i64 = conn.ttl(session_key(file_id)).await?;
        Ok(if ttl > 0 { ttl } else { self.ttl_secs as i64 })
    }
}

#[async_trait::async_trait]
impl SessionRepository for SessionRedisRepository {
    async fn find_by_file_id(
        &self,
        file_id: &str,
    ) -> Result<Option<UploadSessionEntity>, error::SystemError> {
        let mut conn = self.pool.get().await?;
        self.load(&mut conn, file_id).await
    }

    async fn record_chunk(
        &self,
        session: &NewSession,
        chunk_index: i32,
    ) -> Result<UploadSessionEntity, error::SystemError> {
        let mut conn = self.pool.get().await?;

        let record = UploadSessionEntity::new(
            session.file_id.clone(),
            session.original_name.clone(),
            session.total_chunks,
        );
        let _: Option<String> = redis::cmd("SET")
            .arg(session_key(&session.file_id))
            .arg(serde_json::to_string(&record)?)
            .arg("NX")
            .arg("EX")
            .arg(self.ttl_secs)
            .query_async(&mut conn)
            .await?;

        let _: i64 = conn.sadd(chunks_key(&session.file_id), chunk_index).await?;
        let ttl = self.remaining_ttl(&mut conn, &session.file_id).await?;
        let _: bool = conn.expire(chunks_key(&session.file_id), ttl).await?;

        self.load(&mut conn, &session.file_id)
            .await?
            .ok_or_else(|| error::SystemError::persistence("Upload session vanished while recording"))
    }

    async fn claim_finalization(&self, file_id: &str) -> Result<bool, error::SystemError> {
        let mut conn = self.pool.get().await?;
        let ttl = self.remaining_ttl(&mut conn, file_id).await?;

        let claimed: Option<String> = redis::cmd("SET")
            .arg(finalizing_key(file_id))
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(ttl)
            .query_async(&mut conn)
            .await?;

        Ok(claimed.is_some())
    }

    async fn mark_complete(&self, file_id: &str, url: &str) -> Result<(), error::SystemError> {
        let mut conn = self.pool.get().await?;
        let mut session = self
            .load(&mut conn, file_id)
            .await?
            .ok_or_else(|| error::SystemError::not_found("Upload session not found"))?;

        session.is_complete = true;
        session.final_media_url = Some(url.to_string());
        session.received_chunks.clear();

        let _: Option<String> = redis::cmd("SET")
            .arg(session_key(file_id))
            .arg(serde_json::to_string(&session)?)
            .arg("XX")
            .arg("KEEPTTL")
            .query_async(&mut conn)
            .await?;

        Ok(())
    }

    async fn delete(&self, file_id: &str) -> Result<bool, error::SystemError> {
        let mut conn = self.pool.get().await?;
        let removed: i64 = conn
            .del(&[session_key(file_id), chunks_key(file_id), finalizing_key(file_id)])
            .await?;
        Ok(removed > 0)
    }

    async fn delete_expired(
        &self,
        _cutoff: DateTime<Utc>,
    ) -> Result<Vec<String>, error::SystemError> {
        Ok(Vec::new())
    }
}
