use crate::modules::upload::handle::*;
use actix_web::web::ServiceConfig;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(upload_chunk).service(get_upload_status);
}

pub fn media_configure(cfg: &mut ServiceConfig) {
    cfg.service(serve_media);
}
