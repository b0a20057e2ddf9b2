use crate::modules::text_record::handle::*;
use actix_web::web::ServiceConfig;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(create_text_record).service(get_text_record);
}
