use actix_cors::Cors;
use actix_web::{self, App, HttpServer, http::header, middleware::Logger, web};
use std::sync::Arc;
use std::time::Duration;

use mediakeep::{
    ENV, configs,
    modules::{
        self,
        text_record::TextRecordService,
        upload::{DiskChunkStore, UploadConfig, UploadService},
    },
};

#[actix_web::get("/")]
async fn health_check() -> &'static str {
    "Server is running"
}

fn spawn_session_sweeper(upload_service: UploadService, every: Duration) {
    actix_web::rt::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            if let Err(e) = upload_service.purge_expired().await {
                log::error!("Expired upload sweep failed: {}", e);
            }
        }
    });
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let repositories = configs::build_repositories(&ENV)
        .await
        .map_err(|e| std::io::Error::other(format!("Session store error: {e}")))?;
    let media = configs::build_media_store(&ENV)
        .map_err(|e| std::io::Error::other(format!("Media store error: {e}")))?;

    let upload_service = UploadService::with_dependencies(
        repositories.sessions,
        Arc::new(DiskChunkStore::new(&ENV.chunks_dir)),
        media.store,
        UploadConfig::new(ENV.session_ttl_secs, ENV.max_chunk_bytes),
    );
    let text_record_service = TextRecordService::with_dependencies(repositories.text_records);
    let local_media = media.local.map(web::Data::from);

    spawn_session_sweeper(upload_service.clone(), Duration::from_secs(ENV.sweep_interval_secs.max(1)));

    log::info!("Starting server at http://{}:{}", ENV.ip.as_str(), ENV.port);
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&ENV.frontend_url)
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT])
            .max_age(3600);

        let mut app = App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(web::Data::new(upload_service.clone()))
            .app_data(web::Data::new(text_record_service.clone()))
            .service(health_check)
            .service(
                web::scope("/api")
                    .configure(modules::upload::route::configure)
                    .configure(modules::text_record::route::configure),
            );
        if let Some(local_media) = &local_media {
            app = app.app_data(local_media.clone()).configure(modules::upload::route::media_configure);
        }
        app
    })
    .bind((ENV.ip.as_str(), ENV.port))?
    .workers(2)
    .run()
    .await
}
