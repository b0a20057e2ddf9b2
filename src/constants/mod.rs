pub const DEFAULT_SESSION_TTL_SECS: u64 = 7 * 24 * 60 * 60;
/// Upper bound for the retention window, about a hundred years.
pub const MAX_SESSION_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60 * 60;
pub const DEFAULT_MAX_CHUNK_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStoreKind {
    Postgres,
    Redis,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaStoreKind {
    Local,
    Http,
}

pub struct Env {
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub frontend_url: String,
    pub ip: String,
    pub port: u16,
    pub session_store: SessionStoreKind,
    pub chunks_dir: String,
    pub media_store: MediaStoreKind,
    pub media_dir: String,
    pub media_base_url: String,
    pub media_upload_url: Option<String>,
    pub media_upload_preset: Option<String>,
    pub media_upload_api_key: Option<String>,
    pub media_upload_api_secret: Option<String>,
    pub session_ttl_secs: u64,
    pub sweep_interval_secs: u64,
    pub max_chunk_bytes: usize,
}

impl Env {
    fn new() -> Self {
        let database_url = std::env::var("DATABASE_URL").ok();
        let redis_url = std::env::var("REDIS_URL").ok();

        let frontend_url =
            std::env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());
        let ip = std::env::var("IP").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .expect("PORT must be a valid u16 integer");

        let session_store = match std::env::var("SESSION_STORE")
            .unwrap_or_else(|_| "memory".to_string())
            .to_lowercase()
            .as_str()
        {
            "postgres" => SessionStoreKind::Postgres,
            "redis" => SessionStoreKind::Redis,
            "memory" => SessionStoreKind::Memory,
            other => panic!("SESSION_STORE must be one of postgres, redis, memory (got {other})"),
        };

        let chunks_dir = std::env::var("CHUNKS_DIR").unwrap_or_else(|_| "./chunks".to_string());

        let media_store = match std::env::var("MEDIA_STORE")
            .unwrap_or_else(|_| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "local" => MediaStoreKind::Local,
            "http" => MediaStoreKind::Http,
            other => panic!("MEDIA_STORE must be one of local, http (got {other})"),
        };

        let media_dir = std::env::var("MEDIA_DIR").unwrap_or_else(|_| "./media".to_string());
        let media_base_url = std::env::var("MEDIA_BASE_URL")
            .unwrap_or_else(|_| format!("http://{}:{}/media", ip, port));
        let media_upload_url = std::env::var("MEDIA_UPLOAD_URL").ok();
        let media_upload_preset = std::env::var("MEDIA_UPLOAD_PRESET").ok();
        let media_upload_api_key = std::env::var("MEDIA_UPLOAD_API_KEY").ok();
        let media_upload_api_secret = std::env::var("MEDIA_UPLOAD_API_SECRET").ok();

        let session_ttl_secs = std::env::var("UPLOAD_SESSION_TTL_SECS")
            .unwrap_or_else(|_| DEFAULT_SESSION_TTL_SECS.to_string())
            .parse::<u64>()
            .expect("UPLOAD_SESSION_TTL_SECS must be a valid u64 integer")
            .min(MAX_SESSION_TTL_SECS);
        let sweep_interval_secs = std::env::var("UPLOAD_SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| DEFAULT_SWEEP_INTERVAL_SECS.to_string())
            .parse::<u64>()
            .expect("UPLOAD_SWEEP_INTERVAL_SECS must be a valid u64 integer");
        let max_chunk_bytes = std::env::var("MAX_CHUNK_BYTES")
            .unwrap_or_else(|_| DEFAULT_MAX_CHUNK_BYTES.to_string())
            .parse::<usize>()
            .expect("MAX_CHUNK_BYTES must be a valid usize integer");

        Env {
            database_url,
            redis_url,
            frontend_url,
            ip,
            port,
            session_store,
            chunks_dir,
            media_store,
            media_dir,
            media_base_url,
            media_upload_url,
            media_upload_preset,
            media_upload_api_key,
            media_upload_api_secret,
            session_ttl_secs,
            sweep_interval_secs,
            max_chunk_bytes,
        }
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}
