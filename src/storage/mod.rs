//! Move primitives
//!
//! A move is composed by the relocation engine from three steps: mark the
//! resource pending, retarget it into the destination folder, clear the
//! pending mark. Stores only implement the steps.

mod fs_store;

pub use fs_store::FsMediaStore;

use crate::error::MoveError;
use crate::models::LocationHandle;
use async_trait::async_trait;

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Current relative folder of the resource (`Pictures/Memes/`)
    async fn relative_path(&self, handle: &LocationHandle) -> Result<String, MoveError>;

    /// Hide (`true`) or expose (`false`) the resource while it is being moved
    async fn set_pending(&self, handle: &LocationHandle, pending: bool) -> Result<(), MoveError>;

    /// Move the resource into `destination` (a relative folder path)
    async fn retarget(&self, handle: &LocationHandle, destination: &str) -> Result<(), MoveError>;
}
