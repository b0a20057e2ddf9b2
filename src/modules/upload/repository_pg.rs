use chrono::{DateTime, Utc};

use crate::{
    api::error,
    modules::upload::{
        model::NewSession, repository::SessionRepository, schema::UploadSessionEntity,
    },
};

#[derive(Clone)]
pub struct SessionPgRepository {
    pool: sqlx::PgPool,
}

impl SessionPgRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SessionRepository for SessionPgRepository {
    async fn find_by_file_id(
        &self,
        file_id: &str,
    ) -> Result<Option<UploadSessionEntity>, error::SystemError> {
        let session = sqlx::query_as::<_, UploadSessionEntity>(
            r#"
            SELECT * FROM upload_sessions WHERE file_id = $1
            "#,
        )
        .bind(file_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn record_chunk(
        &self,
        session: &NewSession,
        chunk_index: i32,
    ) -> Result<UploadSessionEntity, error::SystemError> {
        // Single statement so two requests for the same file cannot interleave
        // between reading and writing the received set.
        let entity = sqlx::query_as::<_, UploadSessionEntity>(
            r#"
            INSERT INTO upload_sessions (file_id, original_name, total_chunks, received_chunks)
            VALUES ($1, $2, $3, ARRAY[$4::INT])
            ON CONFLICT (file_id) DO UPDATE
            SET received_chunks = CASE
                WHEN $4::INT = ANY(upload_sessions.received_chunks)
                    THEN upload_sessions.received_chunks
                ELSE array_append(upload_sessions.received_chunks, $4::INT)
            END
            RETURNING *
            "#,
        )
        .bind(&session.file_id)
        .bind(&session.original_name)
        .bind(session.total_chunks)
        .bind(chunk_index)
        .fetch_one(&self.pool)
        .await?;

        Ok(entity)
    }

    async fn claim_finalization(&self, file_id: &str) -> Result<bool, error::SystemError> {
        let claimed = sqlx::query_scalar::<_, String>(
            r#"
            UPDATE upload_sessions
            SET finalizing = TRUE
            WHERE file_id = $1
              AND finalizing = FALSE
              AND cardinality(received_chunks) = total_chunks
            RETURNING file_id
            "#,
        )
        .bind(file_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(claimed.is_some())
    }

    async fn mark_complete(&self, file_id: &str, url: &str) -> Result<(), error::SystemError> {
        sqlx::query(
            r#"
            UPDATE upload_sessions SET is_complete = TRUE, final_media_url = $2 WHERE file_id = $1
            "#,
        )
        .bind(file_id)
        .bind(url)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, file_id: &str) -> Result<bool, error::SystemError> {
        let result = sqlx::query(
            r#"
            DELETE FROM upload_sessions WHERE file_id = $1
            "#,
        )
        .bind(file_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<String>, error::SystemError> {
        let expired = sqlx::query_scalar::<_, String>(
            r#"
            DELETE FROM upload_sessions
            WHERE created_at <= $1 AND is_complete = FALSE
            RETURNING file_id
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(expired)
    }
}
