use super::PermissionBroker;
use crate::config::SifterConfig;
use crate::error::BrokerError;
use crate::models::{AuthorizationRequest, LocationHandle, MAX_AUTHORIZATION_BATCH};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Broker for a plain filesystem library
///
/// Access is already in place when every file, its folder and the destination
/// folder are writable. Otherwise the returned request names the handles the
/// user has to unlock (file permissions or the OS privacy settings). A locked
/// destination blocks every handle.
#[derive(Debug, Clone)]
pub struct FsPermissionBroker {
    root: PathBuf,
    destination: String,
}

impl FsPermissionBroker {
    pub fn new(root: PathBuf, destination: impl Into<String>) -> Self {
        Self {
            root,
            destination: destination.into(),
        }
    }

    pub fn from_config(config: &SifterConfig) -> Self {
        Self::new(config.library_root.clone(), config.destination_folder.clone())
    }

    /// The destination, or its nearest existing ancestor if not created yet
    fn destination_writable(&self) -> bool {
        self.root
            .join(self.destination.trim_matches('/'))
            .ancestors()
            .find(|dir| dir.exists())
            .map(is_writable_path)
            .unwrap_or(false)
    }

    fn is_writable(&self, handle: &LocationHandle) -> bool {
        let path = self.root.join(handle.as_str());
        let parent_writable = path.parent().map(is_writable_path).unwrap_or(false);
        is_writable_path(&path) && parent_writable
    }
}

fn is_writable_path(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| !m.permissions().readonly())
        .unwrap_or(false)
}

#[async_trait]
impl PermissionBroker for FsPermissionBroker {
    async fn request_write_access(
        &self,
        handles: &[LocationHandle],
    ) -> Result<Option<AuthorizationRequest>, BrokerError> {
        if handles.len() > MAX_AUTHORIZATION_BATCH {
            return Err(BrokerError::BatchTooLarge {
                requested: handles.len(),
                limit: MAX_AUTHORIZATION_BATCH,
            });
        }

        let destination_writable = self.destination_writable();
        if !destination_writable {
            tracing::debug!(destination = %self.destination, "Destination folder is not writable");
        }

        let locked: Vec<LocationHandle> = handles
            .iter()
            .filter(|h| !destination_writable || !self.is_writable(h))
            .cloned()
            .collect();

        if locked.is_empty() {
            tracing::debug!(handles = handles.len(), "Write access already in place");
            return Ok(None);
        }

        let request = AuthorizationRequest::new(locked)?;
        tracing::info!(
            request = %request.id,
            handles = request.len(),
            "Issued write-access request"
        );
        Ok(Some(request))
    }
}
