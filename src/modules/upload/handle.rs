use actix_multipart::Multipart;
use actix_web::{get, post, web, HttpResponse};
use futures_util::TryStreamExt;
use std::io::ErrorKind;

use crate::api::{error, success};
use crate::modules::upload::{
    media_store::LocalMediaStore,
    model::{ChunkOutcome, ChunkUploadForm},
    schema::{ChunkUploadResponse, UploadStatusQuery, UploadStatusResponse},
    service::UploadService,
};
use crate::utils::ValidatedQuery;

/// Reads the chunk form. Every field, text or binary, is capped at `limit` bytes.
async fn read_chunk_form(
    payload: &mut Multipart,
    limit: usize,
) -> Result<ChunkUploadForm, error::Error> {
    let mut form = ChunkUploadForm::default();

    while let Some(mut field) =
        payload.try_next().await.map_err(|e| error::Error::bad_request(e.to_string()))?
    {
        let name = field
            .content_disposition()
            .and_then(|cd| cd.get_name())
            .map(str::to_owned)
            .ok_or_else(|| error::Error::bad_request("Missing content disposition"))?;

        let mut bytes = web::BytesMut::new();
        while let Some(chunk) =
            field.try_next().await.map_err(|e| error::Error::bad_request(e.to_string()))?
        {
            if bytes.len() + chunk.len() > limit {
                return Err(error::Error::payload_too_large(format!(
                    "Field {name} exceeds {limit} bytes"
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        let text = |bytes: web::BytesMut| {
            String::from_utf8(bytes.to_vec())
                .map_err(|_| error::Error::bad_request(format!("Field {name} is not valid UTF-8")))
        };

        match name.as_str() {
            "chunk" => form.chunk = Some(bytes.freeze()),
            "fileId" => form.file_id = Some(text(bytes)?),
            "originalName" => form.original_name = Some(text(bytes)?),
            "chunkIndex" => form.chunk_index = Some(text(bytes)?),
            "totalChunks" => form.total_chunks = Some(text(bytes)?),
            other => log::debug!("Ignoring unexpected multipart field {}", other),
        }
    }

    Ok(form)
}

#[post("/upload-chunk")]
pub async fn upload_chunk(
    upload_service: web::Data<UploadService>,
    mut payload: Multipart,
) -> Result<success::Success<ChunkUploadResponse>, error::Error> {
    let form = read_chunk_form(&mut payload, upload_service.max_chunk_bytes()).await?;
    let submission = form.into_submission()?;

    match upload_service.receive_chunk(submission).await? {
        outcome @ ChunkOutcome::Accepted { .. } => {
            Ok(success::Success::accepted(Some(outcome.into()))
                .message("Chunk uploaded successfully!"))
        }
        outcome @ ChunkOutcome::Completed { .. } => Ok(success::Success::ok(Some(outcome.into()))
            .message("File uploaded and reassembled successfully!")),
    }
}

#[get("/upload-status")]
pub async fn get_upload_status(
    upload_service: web::Data<UploadService>,
    query: ValidatedQuery<UploadStatusQuery>,
) -> Result<success::Success<UploadStatusResponse>, error::Error> {
    match upload_service.get_status(&query.0.file_id).await? {
        Some(status) => Ok(success::Success::ok(Some(status))),
        None => Err(error::Error::not_found("No active upload session")),
    }
}

#[get("/media/{name}")]
pub async fn serve_media(
    media_store: web::Data<LocalMediaStore>,
    name: web::Path<String>,
) -> Result<HttpResponse, error::Error> {
    let path =
        media_store.resolve(&name).ok_or_else(|| error::Error::not_found("Media not found"))?;

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(error::Error::not_found("Media not found"));
        }
        Err(e) => {
            log::error!("Failed to read media {}: {}", path.display(), e);
            return Err(error::Error::internal_server_error());
        }
    };

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    Ok(HttpResponse::Ok().content_type(mime.as_ref()).body(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::upload::route;
    use crate::modules::upload::service::tests::harness;
    use actix_web::{http::header, http::StatusCode, test, App};

    const BOUNDARY: &str = "mediakeep-test-boundary";

    fn multipart_body(fields: &[(&str, &str)], chunk: Option<&[u8]>) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some(chunk) = chunk {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"chunk\"; \
                     filename=\"blob\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(chunk);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn chunk_request(fields: &[(&str, &str)], chunk: Option<&[u8]>) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/api/upload-chunk")
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ))
            .set_payload(multipart_body(fields, chunk))
    }

    fn status_request(file_id: &str) -> test::TestRequest {
        test::TestRequest::get().uri(&format!("/api/upload-status?fileId={file_id}"))
    }

    #[actix_web::test]
    async fn test_chunk_sequence_over_http() {
        let h = harness();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(h.service.clone()))
                .service(web::scope("/api").configure(route::configure)),
        )
        .await;

        for (index, payload) in [("0", b"aa".as_slice()), ("1", b"bb".as_slice())] {
            let req = chunk_request(
                &[
                    ("fileId", "f1"),
                    ("originalName", "clip.mp4"),
                    ("chunkIndex", index),
                    ("totalChunks", "3"),
                ],
                Some(payload),
            );
            let resp = test::call_service(&app, req.to_request()).await;
            assert_eq!(resp.status(), StatusCode::ACCEPTED);
            let body: serde_json::Value = test::read_body_json(resp).await;
            assert_eq!(body["chunkIndex"].to_string(), index);
            assert!(body["message"].is_string());
        }

        let resp = test::call_service(&app, status_request("f1").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["totalChunks"], 3);
        assert_eq!(body["uploadedChunksCount"], 2);
        assert_eq!(body["uploadedChunks"], serde_json::json!([0, 1]));

        let req = chunk_request(
            &[
                ("fileId", "f1"),
                ("originalName", "clip.mp4"),
                ("chunkIndex", "2"),
                ("totalChunks", "3"),
            ],
            Some(b"cc".as_slice()),
        );
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["url"], "https://media.example/f1");

        let resp = test::call_service(&app, status_request("f1").to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body.get("totalChunks").is_none());
        assert_eq!(body["message"], "No active upload session");
    }

    #[actix_web::test]
    async fn test_missing_total_chunks_is_bad_request() {
        let h = harness();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(h.service.clone()))
                .service(web::scope("/api").configure(route::configure)),
        )
        .await;

        let req = chunk_request(
            &[("fileId", "f1"), ("originalName", "clip.mp4"), ("chunkIndex", "0")],
            Some(b"aa".as_slice()),
        );
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = test::call_service(&app, status_request("f1").to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_missing_payload_is_bad_request() {
        let h = harness();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(h.service.clone()))
                .service(web::scope("/api").configure(route::configure)),
        )
        .await;

        let req = chunk_request(
            &[
                ("fileId", "f1"),
                ("originalName", "clip.mp4"),
                ("chunkIndex", "0"),
                ("totalChunks", "1"),
            ],
            None,
        );
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_status_without_file_id_is_bad_request() {
        let h = harness();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(h.service.clone()))
                .service(web::scope("/api").configure(route::configure)),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/upload-status").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_serve_media_returns_stored_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f1.png"), b"png-bytes").unwrap();
        let store = LocalMediaStore::new(dir.path(), "http://localhost/media");
        let app = test::init_service(
            App::new().app_data(web::Data::new(store)).configure(route::media_configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/media/f1.png").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap().to_str().unwrap(),
            "image/png"
        );
        assert_eq!(test::read_body(resp).await, "png-bytes".as_bytes());

        let req = test::TestRequest::get().uri("/media/missing.png").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
