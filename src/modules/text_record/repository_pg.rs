use uuid::Uuid;

use crate::{
    api::error,
    modules::text_record::{
        model::InsertTextRecord, repository::TextRecordRepository, schema::TextRecordEntity,
    },
};

#[derive(Clone)]
pub struct TextRecordPgRepository {
    pool: sqlx::PgPool,
}

impl TextRecordPgRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TextRecordRepository for TextRecordPgRepository {
    async fn create(
        &self,
        record: &InsertTextRecord,
    ) -> Result<TextRecordEntity, error::SystemError> {
        let entity = sqlx::query_as::<_, TextRecordEntity>(
            r#"
            INSERT INTO text_records (id, title, body, media_url)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(record.id)
        .bind(&record.title)
        .bind(&record.body)
        .bind(&record.media_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(entity)
    }

    async fn find_by_id(&self, id: &Uuid) -> Result<Option<TextRecordEntity>, error::SystemError> {
        let record = sqlx::query_as::<_, TextRecordEntity>(
            r#"
            SELECT * FROM text_records WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }
}
