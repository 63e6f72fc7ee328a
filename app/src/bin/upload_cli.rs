use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_appender::rolling;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;
use uploader::source::walk;
use uploader::{
    is_allowed_media, ApiClient, DropPayload, Entry, FileEntry, FileHandle, FsFile, QueueSnapshot,
    Role, Session, UploadConfig, UploadEvent, UploadManager, UploadStatus,
};

#[path = "../config.rs"]
mod config;

#[derive(Parser)]
#[command(name = "upload_cli", author, version, about = "Photo vault upload CLI")]
struct Cli {
    /// Override log level (e.g. info, debug)
    #[arg(long)]
    log_level: Option<String>,
    /// Override the vault server base URL
    #[arg(long)]
    server_url: Option<String>,
    /// Override the user id sent with every upload
    #[arg(long)]
    user_id: Option<String>,
    /// Override the number of simultaneous uploads
    #[arg(long)]
    max_concurrent: Option<usize>,
    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload files and folders; folders are walked recursively
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Upload a flat selection of files without walking folders
    Pick {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Show which files would be uploaded, without uploading anything
    Scan {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

#[cfg_attr(feature = "trace-spans", tracing::instrument)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let overrides = config::AppConfigOverrides {
        log_level: cli.log_level.clone(),
        server_url: cli.server_url.clone(),
        user_id: cli.user_id.clone(),
        max_concurrent: cli.max_concurrent,
    };
    let cfg = config::AppConfig::load_from(cli.config.clone()).apply_overrides(&overrides);
    std::fs::create_dir_all(&cfg.log_dir)?;
    let file_appender = rolling::daily(&cfg.log_dir, "vaultup.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(cfg.log_level.clone()))
        .with_writer(std::io::stderr.and(file_writer))
        .init();

    match cli.command {
        Commands::Scan { paths } => scan(&paths).await,
        Commands::Upload { paths } => {
            let manager = build_manager(&cfg)?;
            let payload = DropPayload::from_paths(&paths).await;
            run(manager, |m| async move { m.ingest_dropped(payload).await }).await
        }
        Commands::Pick { files } => {
            let manager = build_manager(&cfg)?;
            let picked = open_picked(&files).await;
            run(manager, |m| async move { m.ingest_picked(picked) }).await
        }
    }
}

fn build_manager(
    cfg: &config::AppConfig,
) -> Result<(UploadManager, mpsc::UnboundedReceiver<UploadEvent>), Box<dyn std::error::Error>> {
    let user_id = cfg
        .user_id
        .clone()
        .ok_or("no user id configured; pass --user-id or set user_id in the config file")?;
    let role: Role = cfg.role.parse()?;
    let session = Session::new(user_id, role);
    if !session.can_upload() {
        return Err("guest accounts cannot upload".into());
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let client = Arc::new(ApiClient::new(cfg.server_url.clone()));
    let manager = UploadManager::builder(client, session)
        .config(UploadConfig {
            max_concurrent: cfg.max_concurrent,
        })
        .events(tx)
        .build();
    tracing::info!(
        server = %cfg.server_url,
        user = %manager.session().user_id,
        max_concurrent = manager.max_concurrent(),
        "upload manager ready"
    );
    Ok((manager, rx))
}

async fn run<F, Fut>(
    (manager, rx): (UploadManager, mpsc::UnboundedReceiver<UploadEvent>),
    ingest: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: FnOnce(UploadManager) -> Fut,
    Fut: std::future::Future<Output = usize>,
{
    let printer = tokio::spawn(print_events(rx));
    let queued = ingest(manager.clone()).await;
    manager.wait_settled().await;
    let _ = printer.await;

    let snapshot = manager.snapshot();
    if queued == 0 {
        println!("No media files to upload");
        return Ok(());
    }
    print_summary(&snapshot);

    let failed = snapshot.count(UploadStatus::Error);
    if failed > 0 {
        return Err(format!("{} of {} uploads failed", failed, snapshot.total()).into());
    }
    Ok(())
}

/// Print live progress until the batch settles.
async fn print_events(mut rx: mpsc::UnboundedReceiver<UploadEvent>) {
    let mut names = HashMap::new();
    while let Some(event) = rx.recv().await {
        match event {
            UploadEvent::BatchStarted(id) => println!("Upload batch {}", id),
            UploadEvent::GatheringStarted | UploadEvent::GatheringFinished => {}
            UploadEvent::Skipped { name } => println!("Skipping non-media file: {}", name),
            UploadEvent::TaskQueued { id, name } => {
                names.insert(id, name);
            }
            UploadEvent::TaskStarted { id } => {
                if let Some(name) = names.get(&id) {
                    println!("Uploading {}", name);
                }
            }
            UploadEvent::TaskProgress { id, percent } => {
                if percent % 25 == 0 && percent < 100 {
                    if let Some(name) = names.get(&id) {
                        println!("  {} {}%", name, percent);
                    }
                }
            }
            UploadEvent::TaskFinished { id, status } => {
                let name = names.get(&id).map(String::as_str).unwrap_or("?");
                match status {
                    UploadStatus::Success => println!("Uploaded {}", name),
                    _ => println!("Failed {}", name),
                }
            }
            UploadEvent::BatchSettled(id) => {
                println!("Batch {} settled", id);
                break;
            }
        }
    }
}

fn print_summary(snapshot: &QueueSnapshot) {
    println!("{}", snapshot.headline());
    for row in snapshot.rows() {
        println!("  {:<10} {:>7}  {}", row.status, row.progress_text, row.name);
    }
}

async fn open_picked(files: &[PathBuf]) -> Vec<FileHandle> {
    let mut picked = Vec::with_capacity(files.len());
    for path in files {
        if path.is_dir() {
            tracing::warn!(path = %path.display(), "skipping directory in file selection");
            continue;
        }
        match Box::new(FsFile::new(path)).open().await {
            Ok(handle) => picked.push(handle),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "cannot read selected file"),
        }
    }
    picked
}

async fn scan(paths: &[PathBuf]) -> Result<(), Box<dyn std::error::Error>> {
    let mut accepted = 0usize;
    let mut skipped = 0usize;
    for path in paths {
        let entry = match Entry::from_path(path).await {
            Ok(entry) => entry,
            Err(e) => {
                println!("! {} ({})", path.display(), e);
                continue;
            }
        };
        let mut files = Box::pin(walk(entry));
        while let Some(file) = files.next().await {
            if is_allowed_media(&file.name) {
                accepted += 1;
                println!("+ {} ({} bytes)", file.name, file.size);
            } else {
                skipped += 1;
                println!("- {}", file.name);
            }
        }
    }
    println!("{} files would be uploaded, {} skipped", accepted, skipped);
    Ok(())
}
