//! Media index
//!
//! Lists the images that are candidates for classification. Anything already
//! inside the destination folder is filtered out here, so the pipeline never
//! sees it and moved images do not come back on the next scan.

mod fs_index;

pub use fs_index::FsMediaIndex;

use crate::error::MediaError;
use crate::models::ImageRecord;
use async_trait::async_trait;
use std::path::Path;

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "heic", "heif", "bmp", "tiff", "tif",
];

/// Query capability over the device's image library
#[async_trait]
pub trait MediaIndex: Send + Sync {
    /// All candidate images outside the destination folder, newest first
    async fn list_candidates(&self) -> Result<Vec<ImageRecord>, MediaError>;
}

/// Whether a relative folder path lies in the destination folder
///
/// Matches on containment so nested folders (`Pictures/Memes/2024/`) count too.
pub fn is_in_destination(relative_path: &str, destination: &str) -> bool {
    let destination = destination.trim_matches('/');
    !destination.is_empty() && relative_path.contains(destination)
}

/// Relative folder path of `file` under `root`, with a trailing slash
/// (`Pictures/Screens/`), or `None` if `file` is outside `root`
pub fn relative_folder(root: &Path, file: &Path) -> Option<String> {
    let parent = file.parent()?.strip_prefix(root).ok()?;
    let mut relative: String = parent
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    relative.push('/');
    Some(relative)
}

/// Check if a path has an image extension we can recognize
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}
