//! Filesystem media store
//!
//! Handles are file paths relative to the library root, as issued by
//! [`crate::media::FsMediaIndex`]. A handle keeps resolving after its file
//! moves: the store remembers where it put each one.

use super::MediaStore;
use crate::error::MoveError;
use crate::media::relative_folder;
use crate::models::LocationHandle;
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Path, PathBuf};

/// Prefix that hides a file from scans while it is being moved
pub const PENDING_PREFIX: &str = ".pending-";

#[derive(Debug)]
pub struct FsMediaStore {
    root: PathBuf,
    /// handle -> current absolute path, for handles this store has touched
    locations: DashMap<LocationHandle, PathBuf>,
}

impl FsMediaStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            locations: DashMap::new(),
        }
    }

    /// Current absolute path of a handle
    pub fn resolve(&self, handle: &LocationHandle) -> PathBuf {
        self.locations
            .get(handle)
            .map(|entry| entry.value().clone())
            .unwrap_or_else(|| self.root.join(handle.as_str()))
    }

    fn existing(&self, handle: &LocationHandle) -> Result<PathBuf, MoveError> {
        let path = self.resolve(handle);
        if path.exists() {
            Ok(path)
        } else {
            Err(MoveError::NotFound(handle.to_string()))
        }
    }

    async fn rename(
        &self,
        handle: &LocationHandle,
        from: &Path,
        to: PathBuf,
    ) -> Result<(), MoveError> {
        tokio::fs::rename(from, &to)
            .await
            .map_err(|e| MoveError::from_io(handle.as_str(), e))?;
        tracing::debug!(handle = %handle, to = %to.display(), "Renamed");
        self.locations.insert(handle.clone(), to);
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Generate a unique path by appending _1, _2, etc.
fn generate_unique_path(original: &Path) -> PathBuf {
    if !original.exists() {
        return original.to_path_buf();
    }

    let parent = original.parent().unwrap_or(Path::new("."));
    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());
    let ext = original
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut counter = 1;
    loop {
        let candidate = parent.join(format!("{}_{}{}", stem, counter, ext));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
        if counter > 1000 {
            return parent.join(format!("{}_{}{}", stem, uuid::Uuid::new_v4(), ext));
        }
    }
}

#[async_trait]
impl MediaStore for FsMediaStore {
    async fn relative_path(&self, handle: &LocationHandle) -> Result<String, MoveError> {
        let path = self.existing(handle)?;
        relative_folder(&self.root, &path).ok_or_else(|| MoveError::NotFound(handle.to_string()))
    }

    async fn set_pending(&self, handle: &LocationHandle, pending: bool) -> Result<(), MoveError> {
        let path = self.existing(handle)?;
        let name = file_name(&path);
        let parent = path.parent().unwrap_or(&self.root).to_path_buf();

        match (pending, name.strip_prefix(PENDING_PREFIX)) {
            (true, None) => {
                let target = parent.join(format!("{}{}", PENDING_PREFIX, name));
                self.rename(handle, &path, target).await
            }
            (false, Some(visible)) => {
                let target = generate_unique_path(&parent.join(visible));
                self.rename(handle, &path, target).await
            }
            // Already in the requested state
            _ => Ok(()),
        }
    }

    async fn retarget(&self, handle: &LocationHandle, destination: &str) -> Result<(), MoveError> {
        let path = self.existing(handle)?;
        let dest_dir = self.root.join(destination.trim_matches('/'));

        if path.parent() == Some(dest_dir.as_path()) {
            return Ok(());
        }

        tokio::fs::create_dir_all(&dest_dir)
            .await
            .map_err(|e| MoveError::from_io(handle.as_str(), e))?;

        let target = generate_unique_path(&dest_dir.join(file_name(&path)));
        self.rename(handle, &path, target).await
    }
}
