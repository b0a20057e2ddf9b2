//! Uploader driven against a real coordinator, in process and over HTTP.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use actix_web::{web, web::Bytes, App, HttpServer};

use crate::client::{
    ChunkMetadata, ChunkUploader, HttpUploadApi, PendingStatus, PendingUpload, UploadApi,
    UploadError, UploadOutcome,
};
use crate::modules::upload::{
    route,
    schema::{ChunkUploadResponse, UploadStatusResponse},
    service::tests::harness,
    ChunkSubmission, UploadService,
};

struct InProcessApi {
    service: UploadService,
    fail_at: Option<u32>,
    failed_once: AtomicBool,
}

impl InProcessApi {
    fn new(service: UploadService, fail_at: Option<u32>) -> Self {
        Self { service, fail_at, failed_once: AtomicBool::new(false) }
    }
}

fn server_error(e: crate::api::error::SystemError) -> UploadError {
    UploadError::Server { status: 500, message: e.to_string() }
}

#[async_trait::async_trait]
impl UploadApi for InProcessApi {
    async fn upload_status(
        &self,
        file_id: &str,
    ) -> Result<Option<UploadStatusResponse>, UploadError> {
        self.service.get_status(file_id).await.map_err(server_error)
    }

    async fn upload_chunk(
        &self,
        meta: &ChunkMetadata,
        chunk: Vec<u8>,
    ) -> Result<ChunkUploadResponse, UploadError> {
        if self.fail_at == Some(meta.chunk_index) && !self.failed_once.swap(true, Ordering::SeqCst)
        {
            return Err(UploadError::Server { status: 502, message: "connection reset".into() });
        }
        let submission = ChunkSubmission {
            file_id: meta.file_id.clone(),
            original_name: meta.original_name.clone(),
            chunk_index: meta.chunk_index as i32,
            total_chunks: meta.total_chunks as i32,
            payload: Bytes::from(chunk),
        };
        let outcome = self.service.receive_chunk(submission).await.map_err(server_error)?;
        Ok(outcome.into())
    }
}

fn five_chunk_file() -> tempfile::NamedTempFile {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"0123456789abcdefgh").unwrap();
    file.flush().unwrap();
    file
}

#[tokio::test]
async fn test_interrupted_upload_resumes_and_finalizes_once() {
    let h = harness();
    let (service, media) = (&h.service, &h.media);
    let api = Arc::new(InProcessApi::new(service.clone(), Some(3)));
    let uploader = ChunkUploader::new(api).with_chunk_size(4);

    let file = five_chunk_file();
    let mut upload = PendingUpload::from_path(file.path(), "clip-1").await.unwrap();

    let first = uploader.begin_upload(&mut upload).await;
    assert!(matches!(first, Err(UploadError::Server { status: 502, .. })));
    assert_eq!(upload.status, PendingStatus::Failed);

    let status = service.get_status("clip-1").await.unwrap().unwrap();
    assert_eq!(status.uploaded_chunks, vec![0, 1, 2]);

    let second = uploader.begin_upload(&mut upload).await.unwrap();
    assert_eq!(second, UploadOutcome::Completed { url: "https://media.example/clip-1".into() });
    assert_eq!(upload.status, PendingStatus::Success);

    assert_eq!(media.calls.load(Ordering::SeqCst), 1);
    assert_eq!(*media.last_bytes.lock().unwrap(), b"0123456789abcdefgh");
    assert!(service.get_status("clip-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_failed_finalization_restarts_from_first_chunk() {
    let h = harness();
    h.media.fail.store(true, Ordering::SeqCst);
    let uploader =
        ChunkUploader::new(Arc::new(InProcessApi::new(h.service.clone(), None))).with_chunk_size(4);

    let file = five_chunk_file();
    let mut upload = PendingUpload::from_path(file.path(), "clip-2").await.unwrap();

    let first = uploader.begin_upload(&mut upload).await;
    assert!(matches!(first, Err(UploadError::Server { .. })));
    assert!(h.service.get_status("clip-2").await.unwrap().is_none());

    h.media.fail.store(false, Ordering::SeqCst);
    let second = uploader.begin_upload(&mut upload).await.unwrap();
    assert!(matches!(second, UploadOutcome::Completed { .. }));
    assert_eq!(h.media.calls.load(Ordering::SeqCst), 2);
    assert_eq!(*h.media.last_bytes.lock().unwrap(), b"0123456789abcdefgh");
}

fn meta(file_id: &str, chunk_index: u32, total_chunks: u32) -> ChunkMetadata {
    ChunkMetadata {
        file_id: file_id.into(),
        original_name: "clip.mp4".into(),
        chunk_index,
        total_chunks,
    }
}

#[actix_web::test]
async fn test_http_client_against_running_server() {
    let h = harness();
    let service = h.service.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(service.clone()))
            .service(web::scope("/api").configure(route::configure))
    })
    .workers(1)
    .disable_signals()
    .bind(("127.0.0.1", 0))
    .unwrap();
    let addr = server.addrs()[0];
    let server = server.run();
    let handle = server.handle();
    actix_web::rt::spawn(server);

    let api = Arc::new(HttpUploadApi::new(format!("http://{addr}/api/")));

    assert!(api.upload_status("clip-http").await.unwrap().is_none());

    let accepted = api.upload_chunk(&meta("clip-http", 0, 2), b"0123".to_vec()).await.unwrap();
    assert_eq!(accepted, ChunkUploadResponse::Accepted { chunk_index: 0 });

    let status = api.upload_status("clip-http").await.unwrap().unwrap();
    assert_eq!(status.total_chunks, 2);
    assert_eq!(status.uploaded_chunks, vec![0]);

    match api.upload_chunk(&meta("clip-http", 1, 3), b"4567".to_vec()).await {
        Err(UploadError::Server { status: 400, message }) => {
            assert!(message.contains("totalChunks"), "{message}");
        }
        other => panic!("unexpected reply: {other:?}"),
    }

    h.media.fail.store(true, Ordering::SeqCst);
    match api.upload_chunk(&meta("clip-http", 1, 2), b"4567".to_vec()).await {
        Err(UploadError::Server { status: 500, message }) => {
            assert_eq!(message, "File upload failed");
        }
        other => panic!("unexpected reply: {other:?}"),
    }
    assert!(api.upload_status("clip-http").await.unwrap().is_none());
    h.media.fail.store(false, Ordering::SeqCst);

    let uploader = ChunkUploader::new(api).with_chunk_size(4);
    let file = five_chunk_file();
    let mut upload = PendingUpload::from_path(file.path(), "clip-http").await.unwrap();
    let outcome = uploader.begin_upload(&mut upload).await.unwrap();
    assert_eq!(outcome, UploadOutcome::Completed { url: "https://media.example/clip-http".into() });
    assert_eq!(*h.media.last_bytes.lock().unwrap(), b"0123456789abcdefgh");

    handle.stop(true).await;
}
