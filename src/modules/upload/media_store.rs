use std::path::{Path, PathBuf};

use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio_util::io::ReaderStream;

use crate::api::error;

/// External host that turns a finalized file into a durable URL.
///
/// `public_id` is the upload's file id, so finalizing the same file twice
/// lands on the same stored object. `source` is the assembled file; the store
/// may move it, and the caller discards whatever is left afterwards.
#[async_trait::async_trait]
pub trait MediaStore {
    async fn finalize(
        &self,
        public_id: &str,
        original_name: &str,
        source: &Path,
    ) -> Result<String, error::SystemError>;
}

/// Stores finalized media on local disk and serves it under `base_url`.
#[derive(Debug, Clone)]
pub struct LocalMediaStore {
    media_dir: PathBuf,
    base_url: String,
}

impl LocalMediaStore {
    pub fn new(media_dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self { media_dir: media_dir.into(), base_url: base_url.into() }
    }

    /// Stored file name: the public id plus the original file's extension.
    fn stored_name(public_id: &str, original_name: &str) -> String {
        let extension =
            Path::new(original_name).extension().and_then(|ext| ext.to_str()).unwrap_or("");
        if extension.is_empty() {
            public_id.to_string()
        } else {
            format!("{}.{}", public_id, extension.to_lowercase())
        }
    }

    /// Maps a requested media name to a path inside the media directory.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let candidate = Path::new(name);
        let is_plain_file_name = candidate.file_name().and_then(|n| n.to_str()) == Some(name)
            && !name.starts_with('.');
        is_plain_file_name.then(|| self.media_dir.join(name))
    }
}

#[async_trait::async_trait]
impl MediaStore for LocalMediaStore {
    async fn finalize(
        &self,
        public_id: &str,
        original_name: &str,
        source: &Path,
    ) -> Result<String, error::SystemError> {
        tokio::fs::create_dir_all(&self.media_dir)
            .await
            .map_err(|e| error::SystemError::finalization(format!("create media dir: {e}")))?;

        let filename = Self::stored_name(public_id, original_name);
        let path = self.media_dir.join(&filename);

        // rename fails across filesystems; copy in that case.
        if let Err(e) = tokio::fs::rename(source, &path).await {
            log::debug!("Rename into media dir failed ({}), copying instead", e);
            tokio::fs::copy(source, &path)
                .await
                .map_err(|e| error::SystemError::finalization(format!("write {filename}: {e}")))?;
        }

        log::info!("Stored media at {}", path.display());
        Ok(format!("{}/{}", self.base_url.trim_end_matches('/'), filename))
    }
}

#[derive(Debug, Clone)]
struct MediaCredentials {
    api_key: String,
    api_secret: String,
}

/// Uploads finalized media to a Cloudinary-style host with a multipart POST
/// (`file`, `public_id`, optional `upload_preset`), reading `secure_url` or
/// `url` from the JSON reply.
///
/// The resource type is part of `upload_url` (`.../<cloud>/auto/upload`).
/// Without credentials the upload is unsigned and needs an unsigned preset.
#[derive(Debug, Clone)]
pub struct HttpMediaStore {
    http: reqwest::Client,
    upload_url: String,
    upload_preset: Option<String>,
    credentials: Option<MediaCredentials>,
}

#[derive(Debug, Deserialize)]
struct MediaUploadReply {
    secure_url: Option<String>,
    url: Option<String>,
}

impl HttpMediaStore {
    pub fn new(upload_url: impl Into<String>, upload_preset: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            upload_url: upload_url.into(),
            upload_preset,
            credentials: None,
        }
    }

    /// Signs every upload with `api_key` / `api_secret`.
    pub fn with_credentials(
        mut self,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        self.credentials =
            Some(MediaCredentials { api_key: api_key.into(), api_secret: api_secret.into() });
        self
    }

    /// Text fields of the upload form, signature included when signing.
    fn form_params(&self, public_id: &str, timestamp: i64) -> Vec<(&'static str, String)> {
        let mut params = vec![("public_id", public_id.to_string())];
        if let Some(preset) = &self.upload_preset {
            params.push(("upload_preset", preset.clone()));
        }

        if let Some(credentials) = &self.credentials {
            params.push(("timestamp", timestamp.to_string()));
            let signature = sign_params(&params, &credentials.api_secret);
            params.push(("api_key", credentials.api_key.clone()));
            params.push(("signature", signature));
            params.push(("signature_algorithm", "sha256".to_string()));
        }
        params
    }
}

/// Hex SHA-256 of `k1=v1&k2=v2...` (keys sorted) followed by the secret.
fn sign_params(params: &[(&'static str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<_> = params.iter().collect();
    sorted.sort_by_key(|(key, _)| *key);
    let to_sign =
        sorted.iter().map(|(key, value)| format!("{key}={value}")).collect::<Vec<_>>().join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait::async_trait]
impl MediaStore for HttpMediaStore {
    async fn finalize(
        &self,
        public_id: &str,
        original_name: &str,
        source: &Path,
    ) -> Result<String, error::SystemError> {
        let file = tokio::fs::File::open(source)
            .await
            .map_err(|e| error::SystemError::finalization(format!("open assembled file: {e}")))?;
        let length = file
            .metadata()
            .await
            .map_err(|e| error::SystemError::finalization(format!("stat assembled file: {e}")))?
            .len();

        let mime = mime_guess::from_path(original_name).first_or_octet_stream();
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let file_part = reqwest::multipart::Part::stream_with_length(body, length)
            .file_name(original_name.to_string())
            .mime_str(mime.as_ref())
            .map_err(|e| error::SystemError::finalization(e.to_string()))?;

        let mut form = reqwest::multipart::Form::new();
        for (key, value) in self.form_params(public_id, chrono::Utc::now().timestamp()) {
            form = form.text(key, value);
        }
        let form = form.part("file", file_part);

        let response = self
            .http
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| error::SystemError::finalization(format!("media host request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error::SystemError::finalization(format!(
                "media host rejected upload ({status}): {body}"
            )));
        }

        let reply: MediaUploadReply = response
            .json()
            .await
            .map_err(|e| error::SystemError::finalization(format!("media host reply: {e}")))?;

        reply
            .secure_url
            .or(reply.url)
            .ok_or_else(|| error::SystemError::finalization("media host reply had no URL"))
    }
}
