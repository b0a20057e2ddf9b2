use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use mediakeep::client::{
    ChunkUploader, DEFAULT_CHUNK_SIZE, HttpUploadApi, PendingUpload, UploadEvent, UploadOutcome,
    UploadQueue,
};

#[derive(Parser)]
#[command(name = "mediakeep-upload", version, about = "Resumable chunked file uploader")]
struct Cli {
    /// API root of the upload server
    #[arg(short, long, default_value = "http://127.0.0.1:8080/api")]
    server: String,

    /// Chunk size in bytes
    #[arg(short, long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: u64,

    /// Resume an earlier upload under this id (single file only)
    #[arg(short, long)]
    file_id: Option<String>,

    /// Number of passes over failed files; each pass resumes where the last stopped
    #[arg(short, long, default_value_t = 1)]
    attempts: u32,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Files to upload
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

async fn log_events(mut events: mpsc::Receiver<UploadEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            UploadEvent::Started { file_id, total_chunks } => {
                info!(file_id = %file_id, total_chunks, "upload started")
            }
            UploadEvent::Resumed { file_id, from_chunk, uploaded_chunks } => {
                info!(file_id = %file_id, from_chunk, uploaded_chunks, "resuming")
            }
            UploadEvent::Progress { file_id, chunk_index, percent } => {
                info!(file_id = %file_id, chunk = chunk_index, "{percent:.1}%")
            }
            UploadEvent::Completed { .. }
            | UploadEvent::Failed { .. }
            | UploadEvent::Cancelled { .. } => {}
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    if cli.file_id.is_some() && cli.files.len() > 1 {
        eprintln!("Error: --file-id can only be used with a single file");
        std::process::exit(2);
    }

    let (events_tx, events_rx) = mpsc::channel(256);
    let events_task = tokio::spawn(log_events(events_rx));

    let uploader = ChunkUploader::new(Arc::new(HttpUploadApi::new(&cli.server)))
        .with_chunk_size(cli.chunk_size)
        .with_events(events_tx);
    let mut queue = UploadQueue::new(uploader);

    for path in &cli.files {
        let file_id = cli.file_id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        match PendingUpload::from_path(path, file_id).await {
            Ok(upload) => {
                info!(file_id = %upload.file_id, path = %path.display(), "queued");
                queue.push(upload);
            }
            Err(e) => error!(path = %path.display(), error = %e, "skipping file"),
        }
    }

    let cancel = queue.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling uploads");
            cancel.cancel();
        }
    });

    let mut failed = 0;
    for attempt in 1..=cli.attempts.max(1) {
        if attempt > 1 {
            info!(attempt, remaining = queue.pending().len(), "retrying failed uploads");
        }
        let results = queue.upload_files().await;
        failed = 0;
        for result in results {
            match result.outcome {
                Ok(UploadOutcome::Completed { url }) => println!("{}\t{}", result.file_id, url),
                Ok(UploadOutcome::AlreadyComplete) => {
                    println!("{}\talready uploaded", result.file_id)
                }
                Ok(UploadOutcome::Cancelled) => println!("{}\tcancelled", result.file_id),
                Err(e) => {
                    failed += 1;
                    eprintln!("{}\tfailed: {e}", result.file_id);
                }
            }
        }
        if queue.pending().is_empty() {
            break;
        }
    }

    for upload in queue.pending() {
        eprintln!("resume with: --file-id {} {}", upload.file_id, upload.path.display());
    }

    drop(queue);
    let _ = events_task.await;

    if failed > 0 {
        std::process::exit(1);
    }
}
