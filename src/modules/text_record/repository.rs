use uuid::Uuid;

use crate::{
    api::error,
    modules::text_record::{model::InsertTextRecord, schema::TextRecordEntity},
};

#[async_trait::async_trait]
pub trait TextRecordRepository {
    async fn create(&self, record: &InsertTextRecord)
        -> Result<TextRecordEntity, error::SystemError>;
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<TextRecordEntity>, error::SystemError>;
}
