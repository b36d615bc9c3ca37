//! Filesystem-backed media index
//!
//! Walks the configured scan folders under the library root. Location handles
//! are file paths relative to the root (`Pictures/Screens/a.png`).

use super::{is_image_path, is_in_destination, relative_folder, MediaIndex};
use crate::config::SifterConfig;
use crate::error::MediaError;
use crate::models::{ImageId, ImageRecord, LocationHandle};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Clone)]
pub struct FsMediaIndex {
    root: PathBuf,
    scan_folders: Vec<String>,
    destination: String,
}

impl FsMediaIndex {
    pub fn new(root: PathBuf, scan_folders: Vec<String>, destination: impl Into<String>) -> Self {
        Self {
            root,
            scan_folders,
            destination: destination.into(),
        }
    }

    pub fn from_config(config: &SifterConfig) -> Self {
        Self::new(
            config.library_root.clone(),
            config.scan_folders.clone(),
            config.destination_folder.clone(),
        )
    }

    /// Stable id for a relative file path (first 8 bytes of its SHA-256)
    pub fn image_id(handle: &str) -> ImageId {
        let hash = Sha256::digest(handle.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash[..8]);
        ImageId(u64::from_be_bytes(bytes))
    }

    fn scan_blocking(&self) -> Result<Vec<ImageRecord>, MediaError> {
        if !self.root.is_dir() {
            return Err(MediaError::RootMissing(self.root.clone()));
        }

        let mut seen = HashSet::new();
        let mut records = Vec::new();

        for folder in &self.scan_folders {
            let dir = self.root.join(folder);
            if !dir.is_dir() {
                tracing::debug!(folder = %dir.display(), "Scan folder missing, skipping");
                continue;
            }

            let walker = WalkDir::new(&dir)
                .follow_links(false)
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) if e.depth() == 0 => return Err(MediaError::Walk(e)),
                    Err(e) => {
                        // Skip directories we can't read (permission denied, etc.)
                        tracing::debug!(error = %e, "Skipping unreadable entry");
                        continue;
                    }
                };

                if !entry.file_type().is_file() || !is_image_path(entry.path()) {
                    continue;
                }

                let Some(folder) = relative_folder(&self.root, entry.path()) else {
                    continue;
                };
                if is_in_destination(&folder, &self.destination) {
                    continue;
                }

                if let Some(record) = self.create_record(entry.path()) {
                    if seen.insert(record.id) {
                        records.push(record);
                    }
                }
            }
        }

        // Newest first; ties broken by id so the order is deterministic
        records.sort_by(|a, b| b.date_added.cmp(&a.date_added).then(a.id.cmp(&b.id)));

        Ok(records)
    }

    fn create_record(&self, path: &Path) -> Option<ImageRecord> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let handle = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        let display_name = path.file_name()?.to_string_lossy().to_string();
        let date_added = file_timestamp(path).unwrap_or(0);

        Some(ImageRecord::new(
            Self::image_id(&handle),
            LocationHandle::new(handle),
            display_name,
            date_added,
        ))
    }
}

#[async_trait]
impl MediaIndex for FsMediaIndex {
    async fn list_candidates(&self) -> Result<Vec<ImageRecord>, MediaError> {
        let index = self.clone();
        let records = tokio::task::spawn_blocking(move || index.scan_blocking())
            .await
            .map_err(|e| MediaError::Io(std::io::Error::other(e)))??;

        tracing::info!(
            candidates = records.len(),
            root = %self.root.display(),
            "Listed media candidates"
        );
        Ok(records)
    }
}

/// Pending moves are hidden with a leading dot, so they are skipped here too
fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Creation time (falling back to modification time) in unix seconds
fn file_timestamp(path: &Path) -> Option<i64> {
    let metadata = std::fs::metadata(path).ok()?;
    metadata
        .created()
        .or_else(|_| metadata.modified())
        .ok()?
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs() as i64)
}
