use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTextRecordModel {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[validate(url(message = "mediaUrl must be a valid URL"))]
    pub media_url: Option<String>,
}

pub struct InsertTextRecord {
    pub id: uuid::Uuid,
    pub title: String,
    pub body: String,
    pub media_url: Option<String>,
}
