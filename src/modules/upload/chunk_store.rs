use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tokio::io::AsyncWriteExt;

use crate::api::error;

/// Server-local buffer for chunk bytes, keyed by `(file_id, chunk_index)`.
#[async_trait::async_trait]
pub trait ChunkStore {
    /// Stores chunk bytes, replacing any earlier copy of the same index.
    async fn put(&self, file_id: &str, chunk_index: i32, bytes: &[u8])
        -> Result<(), error::SystemError>;

    async fn remove(&self, file_id: &str, chunk_index: i32) -> Result<(), error::SystemError>;

    /// Concatenates chunks `0..total_chunks` in index order into one file and
    /// returns its path. The file is removed by `purge`.
    async fn assemble(&self, file_id: &str, total_chunks: i32)
        -> Result<PathBuf, error::SystemError>;

    /// Drops every buffered chunk of `file_id`.
    async fn purge(&self, file_id: &str) -> Result<(), error::SystemError>;

    /// Drops buffers untouched since `cutoff`. Returns how many files' buffers were removed.
    async fn purge_stale(&self, cutoff: SystemTime) -> Result<usize, error::SystemError>;
}

const ASSEMBLED_NAME: &str = "assembled";

/// Keeps chunks on disk as `<root>/<file_id>/<chunk_index>`.
#[derive(Debug, Clone)]
pub struct DiskChunkStore {
    root: PathBuf,
}

impl DiskChunkStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn file_dir(&self, file_id: &str) -> PathBuf {
        self.root.join(file_id)
    }

    fn chunk_path(&self, file_id: &str, chunk_index: i32) -> PathBuf {
        self.file_dir(file_id).join(chunk_index.to_string())
    }
}

async fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

async fn concat_chunks(
    store: &DiskChunkStore,
    file_id: &str,
    total_chunks: i32,
    target: &Path,
) -> Result<(), error::SystemError> {
    let mut out = tokio::fs::File::create(target).await.map_err(|e| {
        error::SystemError::persistence(format!("create {}: {e}", target.display()))
    })?;

    for chunk_index in 0..total_chunks {
        let mut chunk =
            tokio::fs::File::open(store.chunk_path(file_id, chunk_index)).await.map_err(|e| {
                error::SystemError::persistence(format!(
                    "read chunk {chunk_index} of {file_id}: {e}"
                ))
            })?;
        tokio::io::copy(&mut chunk, &mut out).await.map_err(|e| {
            error::SystemError::persistence(format!("copy chunk {chunk_index} of {file_id}: {e}"))
        })?;
    }

    out.flush().await?;
    Ok(())
}

#[async_trait::async_trait]
impl ChunkStore for DiskChunkStore {
    async fn put(
        &self,
        file_id: &str,
        chunk_index: i32,
        bytes: &[u8],
    ) -> Result<(), error::SystemError> {
        let dir = self.file_dir(file_id);
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            error::SystemError::persistence(format!("create {}: {e}", dir.display()))
        })?;

        // Write beside the final name and rename, so a reader never sees half a chunk.
        let target = self.chunk_path(file_id, chunk_index);
        let partial = target.with_extension("part");
        if let Err(e) = tokio::fs::write(&partial, bytes).await {
            remove_if_exists(&partial).await.ok();
            return Err(error::SystemError::persistence(format!(
                "write chunk {chunk_index} of {file_id}: {e}"
            )));
        }
        if let Err(e) = tokio::fs::rename(&partial, &target).await {
            remove_if_exists(&partial).await.ok();
            return Err(error::SystemError::persistence(format!(
                "commit chunk {chunk_index} of {file_id}: {e}"
            )));
        }

        Ok(())
    }

    async fn remove(&self, file_id: &str, chunk_index: i32) -> Result<(), error::SystemError> {
        remove_if_exists(&self.chunk_path(file_id, chunk_index)).await?;
        Ok(())
    }

    async fn assemble(
        &self,
        file_id: &str,
        total_chunks: i32,
    ) -> Result<PathBuf, error::SystemError> {
        let target = self.file_dir(file_id).join(ASSEMBLED_NAME);
        match concat_chunks(self, file_id, total_chunks, &target).await {
            Ok(()) => Ok(target),
            Err(e) => {
                remove_if_exists(&target).await.ok();
                Err(e)
            }
        }
    }

    async fn purge(&self, file_id: &str) -> Result<(), error::SystemError> {
        match tokio::fs::remove_dir_all(self.file_dir(file_id)).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    async fn purge_stale(&self, cutoff: SystemTime) -> Result<usize, error::SystemError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut purged = 0;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_dir() || metadata.modified()? > cutoff {
                continue;
            }
            match tokio::fs::remove_dir_all(entry.path()).await {
                Ok(()) => purged += 1,
                Err(e) => log::warn!("Failed to purge stale chunks {:?}: {}", entry.path(), e),
            }
        }

        Ok(purged)
    }
}
