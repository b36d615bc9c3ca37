pub mod config;
pub mod error;
pub mod media;
pub mod models;
pub mod permissions;
pub mod pipeline;
pub mod recognition;
pub mod relocation;
pub mod selection;
pub mod session;
pub mod storage;

#[cfg(test)]
mod test_support;

use config::SifterConfig;
use media::FsMediaIndex;
use models::Notification;
use permissions::FsPermissionBroker;
use pipeline::ClassificationPipeline;
use recognition::{CommandEngine, TextRecognitionClient};
use relocation::RelocationEngine;
use session::{Notifications, Session, SessionHandle};
use std::sync::Arc;
use storage::FsMediaStore;
use tracing_subscriber::EnvFilter;

/// Wire the filesystem collaborators into a running session
pub fn build_session(config: &SifterConfig) -> (SessionHandle, Notifications) {
    let pipeline = ClassificationPipeline::new(
        Arc::new(FsMediaIndex::from_config(config)),
        TextRecognitionClient::new(Arc::new(CommandEngine::from_config(config))),
        config.batch_size,
    );
    let relocation = RelocationEngine::from_config(
        Arc::new(FsMediaStore::new(config.library_root.clone())),
        Arc::new(FsPermissionBroker::from_config(config)),
        config,
    );

    Session::spawn(Arc::new(pipeline), Arc::new(relocation))
}

pub fn run() {
    // Load .env from the working directory if present
    let _ = dotenvy::dotenv();

    // Default: warn for most crates, info for ours
    // Use RUST_LOG=debug for per-batch and per-image logs
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,meme_sifter_lib=info")),
        )
        .init();

    let config = match SifterConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load settings: {}", e);
            return;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to start runtime: {}", e);
            return;
        }
    };

    runtime.block_on(scan_once(config));
}

/// Run a single scan and print what it found
async fn scan_once(config: SifterConfig) {
    tracing::info!(
        root = %config.library_root.display(),
        destination = %config.destination_folder,
        "Scanning library"
    );

    let (handle, mut notifications) = build_session(&config);
    if let Err(e) = handle.scan().await {
        tracing::error!("Failed to start scan: {}", e);
        return;
    }

    while let Some(notification) = notifications.recv().await {
        println!("{}", notification.message());
        if matches!(
            notification,
            Notification::ScanCompleted { .. } | Notification::ScanFailed { .. }
        ) {
            break;
        }
    }

    for record in handle.snapshot().results {
        println!("{}\t{}", record.display_name, record.headline());
    }

    handle.shutdown();
}
