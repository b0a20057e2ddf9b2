use log::info;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::error;
use crate::modules::text_record::{
    model::{CreateTextRecordModel, InsertTextRecord},
    repository::TextRecordRepository,
    schema::TextRecordEntity,
};

#[derive(Clone)]
pub struct TextRecordService {
    repo: Arc<dyn TextRecordRepository + Send + Sync>,
}

impl TextRecordService {
    pub fn with_dependencies(repo: Arc<dyn TextRecordRepository + Send + Sync>) -> Self {
        info!("TextRecordService initialized with dependencies");
        TextRecordService { repo }
    }

    pub async fn create(
        &self,
        model: CreateTextRecordModel,
    ) -> Result<TextRecordEntity, error::SystemError> {
        let record = InsertTextRecord {
            id: Uuid::now_v7(),
            title: model.title,
            body: model.body,
            media_url: model.media_url,
        };
        self.repo.create(&record).await
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<TextRecordEntity, error::SystemError> {
        self.repo
            .find_by_id(&id)
            .await?
            .ok_or_else(|| error::SystemError::not_found("Text record not found"))
    }
}
