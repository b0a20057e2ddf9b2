use reqwest::StatusCode;
use tracing::debug;

use crate::api::error::ErrorBody;
use crate::client::error::UploadError;
use crate::modules::upload::schema::{ChunkUploadResponse, UploadStatusResponse};

/// Metadata sent alongside every chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMetadata {
    pub file_id: String,
    pub original_name: String,
    pub chunk_index: u32,
    pub total_chunks: u32,
}

/// Connection to an upload server.
#[async_trait::async_trait]
pub trait UploadApi: Send + Sync {
    /// Returns `None` when the server has no active session for `file_id`.
    async fn upload_status(
        &self,
        file_id: &str,
    ) -> Result<Option<UploadStatusResponse>, UploadError>;

    async fn upload_chunk(
        &self,
        meta: &ChunkMetadata,
        chunk: Vec<u8>,
    ) -> Result<ChunkUploadResponse, UploadError>;
}

pub struct HttpUploadApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpUploadApi {
    /// `base_url` is the API root, e.g. `http://127.0.0.1:8080/api`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

async fn server_error(response: reqwest::Response) -> UploadError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.message.into_owned())
        .unwrap_or(text);
    UploadError::Server { status, message }
}

#[async_trait::async_trait]
impl UploadApi for HttpUploadApi {
    async fn upload_status(
        &self,
        file_id: &str,
    ) -> Result<Option<UploadStatusResponse>, UploadError> {
        let response = self
            .http
            .get(self.url("upload-status"))
            .query(&[("fileId", file_id)])
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            _ => Err(server_error(response).await),
        }
    }

    async fn upload_chunk(
        &self,
        meta: &ChunkMetadata,
        chunk: Vec<u8>,
    ) -> Result<ChunkUploadResponse, UploadError> {
        debug!(
            file_id = %meta.file_id,
            chunk = meta.chunk_index,
            total = meta.total_chunks,
            bytes = chunk.len(),
            "sending chunk"
        );

        let part = reqwest::multipart::Part::bytes(chunk).file_name(meta.original_name.clone());
        let form = reqwest::multipart::Form::new()
            .text("fileId", meta.file_id.clone())
            .text("originalName", meta.original_name.clone())
            .text("chunkIndex", meta.chunk_index.to_string())
            .text("totalChunks", meta.total_chunks.to_string())
            .part("chunk", part);

        let response = self.http.post(self.url("upload-chunk")).multipart(form).send().await?;
        if !response.status().is_success() {
            return Err(server_error(response).await);
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let api = HttpUploadApi::new("http://localhost:8080/api/");
        assert_eq!(api.url("upload-status"), "http://localhost:8080/api/upload-status");
    }

    #[test]
    fn test_chunk_reply_shapes() {
        let accepted: ChunkUploadResponse =
            serde_json::from_str(r#"{"message":"Chunk uploaded successfully!","chunkIndex":2}"#)
                .unwrap();
        assert_eq!(accepted, ChunkUploadResponse::Accepted { chunk_index: 2 });

        let completed: ChunkUploadResponse =
            serde_json::from_str(r#"{"message":"done","url":"https://media.test/f1"}"#).unwrap();
        assert_eq!(completed, ChunkUploadResponse::Completed { url: "https://media.test/f1".into() });
    }
}
