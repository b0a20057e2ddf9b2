//! Resumable chunked uploader.
//!
//! Splits a local file into fixed-size chunks, asks the server which chunks it
//! already holds, and sends the rest one at a time in index order.

pub mod api;
pub mod error;
pub mod queue;
pub mod uploader;

pub use api::{ChunkMetadata, HttpUploadApi, UploadApi};
pub use error::UploadError;
pub use queue::{QueuedResult, UploadQueue};
pub use uploader::{
    ChunkUploader, DEFAULT_CHUNK_SIZE, PendingStatus, PendingUpload, UploadEvent, UploadOutcome,
};
