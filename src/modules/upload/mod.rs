pub mod chunk_store;
pub mod handle;
pub mod media_store;
pub mod model;
pub mod repository;
pub mod repository_memory;
pub mod repository_pg;
pub mod repository_redis;
pub mod route;
pub mod schema;
pub mod service;

pub use chunk_store::{ChunkStore, DiskChunkStore};
pub use media_store::{HttpMediaStore, LocalMediaStore, MediaStore};
pub use model::{ChunkOutcome, ChunkSubmission, NewSession, UploadConfig};
pub use repository::SessionRepository;
pub use repository_memory::SessionMemoryRepository;
pub use repository_pg::SessionPgRepository;
pub use repository_redis::SessionRedisRepository;
pub use schema::{ChunkUploadResponse, UploadSessionEntity, UploadStatusResponse};
pub use service::UploadService;
