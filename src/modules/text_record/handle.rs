use actix_web::{get, post, web};
use uuid::Uuid;

use crate::api::{error, success};
use crate::modules::text_record::{
    model::CreateTextRecordModel, schema::TextRecordEntity, service::TextRecordService,
};
use crate::utils::ValidatedJson;

#[post("/text-record")]
pub async fn create_text_record(
    text_record_service: web::Data<TextRecordService>,
    record: ValidatedJson<CreateTextRecordModel>,
) -> Result<success::Success<TextRecordEntity>, error::Error> {
    let record = text_record_service.create(record.0).await?;
    Ok(success::Success::created(Some(record)).message("Text record created"))
}

#[get("/text-record/{id}")]
pub async fn get_text_record(
    text_record_service: web::Data<TextRecordService>,
    record_id: web::Path<Uuid>,
) -> Result<success::Success<TextRecordEntity>, error::Error> {
    let record = text_record_service.get_by_id(record_id.into_inner()).await?;
    Ok(success::Success::ok(Some(record)))
}
