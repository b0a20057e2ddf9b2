use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRecordEntity {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub media_url: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
