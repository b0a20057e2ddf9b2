use deadpool_redis::Runtime;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::sync::Arc;

use crate::{
    api::error,
    constants::{Env, MediaStoreKind, SessionStoreKind},
    modules::{
        text_record::{TextRecordMemoryRepository, TextRecordPgRepository, TextRecordRepository},
        upload::{
            HttpMediaStore, LocalMediaStore, MediaStore, SessionMemoryRepository,
            SessionPgRepository, SessionRedisRepository, SessionRepository,
        },
    },
};

pub async fn connect_database(database_url: &str) -> Result<PgPool, error::SystemError> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .min_connections(1)
        .acquire_slow_threshold(std::time::Duration::from_secs(3))
        .connect(database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

pub fn create_redis_pool(redis_url: &str) -> Result<deadpool_redis::Pool, error::SystemError> {
    let mut cfg = deadpool_redis::Config::from_url(redis_url);
    cfg.pool = Some(deadpool_redis::PoolConfig { max_size: 16, ..Default::default() });
    let pool = cfg.create_pool(Some(Runtime::Tokio1))?;
    Ok(pool)
}

pub struct Repositories {
    pub sessions: Arc<dyn SessionRepository + Send + Sync>,
    pub text_records: Arc<dyn TextRecordRepository + Send + Sync>,
}

/// Text records live in Postgres only when sessions do; every other backend
/// keeps them in memory.
pub async fn build_repositories(env: &Env) -> Result<Repositories, error::SystemError> {
    match env.session_store {
        SessionStoreKind::Postgres => {
            let url = env.database_url.as_deref().ok_or_else(|| {
                error::SystemError::config("DATABASE_URL is required when SESSION_STORE=postgres")
            })?;
            let pool = connect_database(url).await?;
            log::info!("Upload sessions stored in Postgres");
            Ok(Repositories {
                sessions: Arc::new(SessionPgRepository::new(pool.clone())),
                text_records: Arc::new(TextRecordPgRepository::new(pool)),
            })
        }
        SessionStoreKind::Redis => {
            let url = env.redis_url.as_deref().ok_or_else(|| {
                error::SystemError::config("REDIS_URL is required when SESSION_STORE=redis")
            })?;
            let pool = create_redis_pool(url)?;
            log::info!("Upload sessions stored in Redis");
            Ok(Repositories {
                sessions: Arc::new(SessionRedisRepository::new(pool, env.session_ttl_secs)),
                text_records: Arc::new(TextRecordMemoryRepository::new()),
            })
        }
        SessionStoreKind::Memory => {
            log::warn!("Upload sessions stored in memory; they will not survive a restart");
            Ok(Repositories {
                sessions: Arc::new(SessionMemoryRepository::new()),
                text_records: Arc::new(TextRecordMemoryRepository::new()),
            })
        }
    }
}

pub struct MediaBackend {
    pub store: Arc<dyn MediaStore + Send + Sync>,
    /// Set when finalized files are served by this process under `/media`.
    pub local: Option<Arc<LocalMediaStore>>,
}

pub fn build_media_store(env: &Env) -> Result<MediaBackend, error::SystemError> {
    match env.media_store {
        MediaStoreKind::Local => {
            let local = Arc::new(LocalMediaStore::new(&env.media_dir, &env.media_base_url));
            Ok(MediaBackend { store: local.clone(), local: Some(local) })
        }
        MediaStoreKind::Http => {
            let url = env.media_upload_url.as_deref().ok_or_else(|| {
                error::SystemError::config("MEDIA_UPLOAD_URL is required when MEDIA_STORE=http")
            })?;
            let mut store = HttpMediaStore::new(url, env.media_upload_preset.clone());
            match (&env.media_upload_api_key, &env.media_upload_api_secret) {
                (Some(key), Some(secret)) => {
                    log::info!("Media uploads are signed");
                    store = store.with_credentials(key, secret);
                }
                (None, None) => {}
                _ => {
                    return Err(error::SystemError::config(
                        "MEDIA_UPLOAD_API_KEY and MEDIA_UPLOAD_API_SECRET must be set together",
                    ));
                }
            }
            Ok(MediaBackend { store: Arc::new(store), local: None })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(session_store: SessionStoreKind, media_store: MediaStoreKind) -> Env {
        Env {
            database_url: None,
            redis_url: None,
            frontend_url: "http://localhost:5173".into(),
            ip: "127.0.0.1".into(),
            port: 8080,
            session_store,
            chunks_dir: "./chunks".into(),
            media_store,
            media_dir: "./media".into(),
            media_base_url: "http://127.0.0.1:8080/media".into(),
            media_upload_url: None,
            media_upload_preset: None,
            media_upload_api_key: None,
            media_upload_api_secret: None,
            session_ttl_secs: 60,
            sweep_interval_secs: 60,
            max_chunk_bytes: 1024,
        }
    }

    #[tokio::test]
    async fn test_postgres_backend_requires_database_url() {
        let result =
            build_repositories(&env(SessionStoreKind::Postgres, MediaStoreKind::Local)).await;
        assert!(matches!(result, Err(error::SystemError::Config(_))));
    }

    #[tokio::test]
    async fn test_memory_backend_needs_no_urls() {
        let result =
            build_repositories(&env(SessionStoreKind::Memory, MediaStoreKind::Local)).await;
        assert!(result.is_ok());
    }

    #[test]
    fn test_http_media_store_requires_upload_url() {
        let result = build_media_store(&env(SessionStoreKind::Memory, MediaStoreKind::Http));
        assert!(matches!(result, Err(error::SystemError::Config(_))));
    }

    #[test]
    fn test_local_media_store_is_served() {
        let backend =
            build_media_store(&env(SessionStoreKind::Memory, MediaStoreKind::Local)).unwrap();
        assert!(backend.local.is_some());
    }

    #[test]
    fn test_media_credentials_must_come_in_pairs() {
        let mut env = env(SessionStoreKind::Memory, MediaStoreKind::Http);
        env.media_upload_url = Some("https://api.example/v1/upload".into());
        env.media_upload_api_key = Some("key".into());
        let result = build_media_store(&env);
        assert!(matches!(result, Err(error::SystemError::Config(_))));

        env.media_upload_api_secret = Some("secret".into());
        let backend = build_media_store(&env).unwrap();
        assert!(backend.local.is_none());
    }
}
