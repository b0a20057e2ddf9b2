use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    api::error,
    modules::text_record::{
        model::InsertTextRecord, repository::TextRecordRepository, schema::TextRecordEntity,
    },
};

#[derive(Default)]
pub struct TextRecordMemoryRepository {
    records: RwLock<HashMap<Uuid, TextRecordEntity>>,
}

impl TextRecordMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl TextRecordRepository for TextRecordMemoryRepository {
    async fn create(
        &self,
        record: &InsertTextRecord,
    ) -> Result<TextRecordEntity, error::SystemError> {
        let entity = TextRecordEntity {
            id: record.id,
            title: record.title.clone(),
            body: record.body.clone(),
            media_url: record.media_url.clone(),
            created_at: chrono::Utc::now(),
        };
        self.records.write().await.insert(entity.id, entity.clone());
        Ok(entity)
    }

    async fn find_by_id(&self, id: &Uuid) -> Result<Option<TextRecordEntity>, error::SystemError> {
        Ok(self.records.read().await.get(id).cloned())
    }
}
