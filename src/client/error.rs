/// Errors produced while uploading a file.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server responded {status}: {message}")]
    Server { status: u16, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid file: {0}")]
    InvalidFile(String),

    #[error(
        "server holds {file_id} as {server_total} chunks but this file splits into {local_total}"
    )]
    ChunkCountMismatch { file_id: String, server_total: u32, local_total: u32 },

    #[error("server accepted every chunk of {file_id} without finalizing it")]
    NotFinalized { file_id: String },

    #[error("cancelled")]
    Cancelled,
}
