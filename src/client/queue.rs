use tokio_util::sync::CancellationToken;

use crate::client::error::UploadError;
use crate::client::uploader::{ChunkUploader, PendingStatus, PendingUpload, UploadOutcome};

pub struct QueuedResult {
    pub file_id: String,
    pub outcome: Result<UploadOutcome, UploadError>,
}

/// Uploads several files one after another.
///
/// Finished and cancelled files leave the queue. Failed files stay so a later
/// run resumes them.
pub struct UploadQueue {
    uploader: ChunkUploader,
    pending: Vec<PendingUpload>,
    cancel: CancellationToken,
}

impl UploadQueue {
    pub fn new(uploader: ChunkUploader) -> Self {
        Self { uploader, pending: Vec::new(), cancel: CancellationToken::new() }
    }

    /// Queues a file. Its cancellation token becomes a child of the queue's.
    pub fn push(&mut self, upload: PendingUpload) {
        let upload = upload.with_cancel_token(self.cancel.child_token());
        self.pending.push(upload);
    }

    pub fn pending(&self) -> &[PendingUpload] {
        &self.pending
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel_all(&self) {
        self.cancel.cancel();
    }

    pub async fn upload_files(&mut self) -> Vec<QueuedResult> {
        let mut results = Vec::with_capacity(self.pending.len());
        let mut retained = Vec::new();

        for mut upload in std::mem::take(&mut self.pending) {
            if self.cancel.is_cancelled() {
                upload.status = PendingStatus::Cancelled;
                results.push(QueuedResult {
                    file_id: upload.file_id.clone(),
                    outcome: Ok(UploadOutcome::Cancelled),
                });
                continue;
            }

            let outcome = self.uploader.begin_upload(&mut upload).await;
            let file_id = upload.file_id.clone();
            if upload.status == PendingStatus::Failed {
                retained.push(upload);
            }
            results.push(QueuedResult { file_id, outcome });
        }

        self.pending = retained;
        results
    }
}
