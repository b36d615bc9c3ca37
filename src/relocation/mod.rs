//! Relocation Engine
//!
//! Moves selected images into the destination folder. Every failed move,
//! whatever the cause, lands in one "needs authorization" bucket, and the
//! bucket is turned into a single batched write-access request.
//!
//! ## Retrying after a grant
//! The caller re-runs [`RelocationEngine::relocate`] with the original
//! selection. Images that already moved are found in the destination folder
//! by the location check and count as moved without being retargeted again.
//!
//! ## Batch cap
//! At most `authorization_cap` handles go into one request. The rest stay
//! where they are, so the next scan finds them again and a later relocation
//! picks them up.

use crate::config::SifterConfig;
use crate::error::{MoveError, RelocationError};
use crate::media::is_in_destination;
use crate::models::{AuthorizationRequest, ImageId, ImageRecord, LocationHandle, MAX_AUTHORIZATION_BATCH};
use crate::permissions::PermissionBroker;
use crate::storage::MediaStore;
use std::collections::HashSet;
use std::sync::Arc;

/// Result of one relocation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelocationOutcome {
    /// Nothing is waiting on the user
    AllMoved { moved: Vec<ImageId> },
    /// Some moves were refused; `moved` lists those that went through anyway
    AuthorizationNeeded {
        request: AuthorizationRequest,
        moved: Vec<ImageId>,
    },
}

impl RelocationOutcome {
    /// Ids now in the destination folder
    pub fn moved(&self) -> &[ImageId] {
        match self {
            RelocationOutcome::AllMoved { moved } => moved,
            RelocationOutcome::AuthorizationNeeded { moved, .. } => moved,
        }
    }

    pub fn count(&self) -> usize {
        self.moved().len()
    }
}

pub struct RelocationEngine {
    store: Arc<dyn MediaStore>,
    broker: Arc<dyn PermissionBroker>,
    destination: String,
    authorization_cap: usize,
}

impl RelocationEngine {
    pub fn new(
        store: Arc<dyn MediaStore>,
        broker: Arc<dyn PermissionBroker>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            store,
            broker,
            destination: destination.into(),
            authorization_cap: MAX_AUTHORIZATION_BATCH,
        }
    }

    /// Lower the per-request cap (never above 50)
    pub fn with_authorization_cap(mut self, cap: usize) -> Self {
        self.authorization_cap = cap.clamp(1, MAX_AUTHORIZATION_BATCH);
        self
    }

    pub fn from_config(
        store: Arc<dyn MediaStore>,
        broker: Arc<dyn PermissionBroker>,
        config: &SifterConfig,
    ) -> Self {
        Self::new(store, broker, config.destination_folder.clone())
            .with_authorization_cap(config.authorization_cap)
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Move `selected` into the destination folder
    pub async fn relocate(
        &self,
        selected: &[ImageRecord],
    ) -> Result<RelocationOutcome, RelocationError> {
        if selected.is_empty() {
            return Ok(RelocationOutcome::AllMoved { moved: Vec::new() });
        }

        let mut seen = HashSet::new();
        let mut moved = Vec::new();
        let mut refused: Vec<&ImageRecord> = Vec::new();

        for record in selected.iter().filter(|r| seen.insert(r.id)) {
            match self.move_one(&record.location).await {
                Ok(()) => moved.push(record.id),
                Err(e) => {
                    tracing::debug!(location = %record.location, error = %e, "Move refused");
                    refused.push(record);
                }
            }
        }

        if refused.is_empty() {
            tracing::info!(moved = moved.len(), destination = %self.destination, "Relocation complete");
            return Ok(RelocationOutcome::AllMoved { moved });
        }

        if refused.len() > self.authorization_cap {
            tracing::warn!(
                refused = refused.len(),
                cap = self.authorization_cap,
                deferred = refused.len() - self.authorization_cap,
                "Too many refused moves for one request, deferring the rest"
            );
            refused.truncate(self.authorization_cap);
        }

        let handles: Vec<LocationHandle> = refused.iter().map(|r| r.location.clone()).collect();

        match self.broker.request_write_access(&handles).await {
            Ok(Some(request)) => {
                tracing::info!(
                    moved = moved.len(),
                    request = %request.id,
                    pending = request.len(),
                    "Relocation needs authorization"
                );
                Ok(RelocationOutcome::AuthorizationNeeded { request, moved })
            }
            Ok(None) => {
                // Access is already in place; one more attempt for the refused batch
                for record in refused {
                    match self.move_one(&record.location).await {
                        Ok(()) => moved.push(record.id),
                        Err(e) => tracing::warn!(
                            location = %record.location,
                            error = %e,
                            "Move failed again, leaving it for the next scan"
                        ),
                    }
                }
                tracing::info!(moved = moved.len(), "Relocation complete after retry");
                Ok(RelocationOutcome::AllMoved { moved })
            }
            Err(source) => Err(RelocationError::Broker { source, moved }),
        }
    }

    /// Mark pending, retarget, clear pending. Already-moved resources are only
    /// un-hidden, in case an earlier attempt left them pending.
    pub async fn move_one(&self, location: &LocationHandle) -> Result<(), MoveError> {
        let folder = self.store.relative_path(location).await?;
        if is_in_destination(&folder, &self.destination) {
            tracing::debug!(location = %location, "Already in destination");
            return self.store.set_pending(location, false).await;
        }

        self.store.set_pending(location, true).await?;

        let result = match self.store.retarget(location, &self.destination).await {
            Ok(()) => self.store.set_pending(location, false).await,
            Err(e) => Err(e),
        };

        if result.is_err() {
            // Keep the resource visible so a later scan can find it
            if let Err(e) = self.store.set_pending(location, false).await {
                tracing::warn!(location = %location, error = %e, "Failed to clear pending mark");
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{meme, FakeBroker, FakeStore};
    use std::sync::atomic::Ordering;

    const DESTINATION: &str = "Pictures/Memes";

    fn engine(store: &Arc<FakeStore>, broker: &Arc<FakeBroker>) -> RelocationEngine {
        RelocationEngine::new(store.clone(), broker.clone(), DESTINATION)
    }

    fn records(n: u64) -> Vec<ImageRecord> {
        (1..=n).map(|i| meme(i, "text")).collect()
    }

    fn ids(records: &[ImageRecord]) -> Vec<ImageId> {
        records.iter().map(|r| r.id).collect()
    }

    #[tokio::test]
    async fn test_empty_selection_is_noop() {
        let store = Arc::new(FakeStore::new(&[]));
        let broker = Arc::new(FakeBroker::issuing());

        let outcome = engine(&store, &broker).relocate(&[]).await.unwrap();

        assert_eq!(outcome, RelocationOutcome::AllMoved { moved: vec![] });
        assert_eq!(broker.request_count(), 0);
    }

    #[tokio::test]
    async fn test_all_authorized_moves_everything() {
        let selected = records(5);
        let store = Arc::new(FakeStore::new(&selected));
        let broker = Arc::new(FakeBroker::issuing());

        let outcome = engine(&store, &broker).relocate(&selected).await.unwrap();

        assert_eq!(outcome, RelocationOutcome::AllMoved { moved: ids(&selected) });
        assert_eq!(broker.request_count(), 0);
        for record in &selected {
            assert_eq!(store.folder_of(record).as_deref(), Some("Pictures/Memes/"));
            assert!(!store.is_pending(record));
        }
    }

    #[tokio::test]
    async fn test_partial_failure_requests_only_refused() {
        let a = meme(1, "A");
        let c = meme(3, "C");
        let store = Arc::new(FakeStore::new(&[a.clone(), c.clone()]));
        store.lock(&[c.clone()]);
        let broker = Arc::new(FakeBroker::issuing());

        let outcome = engine(&store, &broker)
            .relocate(&[a.clone(), c.clone()])
            .await
            .unwrap();

        match outcome {
            RelocationOutcome::AuthorizationNeeded { request, moved } => {
                assert_eq!(request.handles, vec![c.location.clone()]);
                assert_eq!(moved, vec![a.id]);
            }
            other => panic!("expected authorization, got {:?}", other),
        }
        // The refused image is back to normal, not stuck pending
        assert!(!store.is_pending(&c));
        assert_eq!(store.folder_of(&c).as_deref(), Some("Pictures/"));
    }

    #[tokio::test]
    async fn test_request_capped_at_fifty() {
        for n in [1u64, 49, 50, 51, 120] {
            let selected = records(n);
            let store = Arc::new(FakeStore::new(&selected));
            store.lock(&selected);
            let broker = Arc::new(FakeBroker::issuing());

            let outcome = engine(&store, &broker).relocate(&selected).await.unwrap();

            let RelocationOutcome::AuthorizationNeeded { request, moved } = outcome else {
                panic!("expected authorization for n = {}", n);
            };
            let expected = (n as usize).min(MAX_AUTHORIZATION_BATCH);
            assert_eq!(request.len(), expected, "n = {}", n);
            assert_eq!(request.handles[0], selected[0].location);
            assert!(moved.is_empty());
            assert_eq!(broker.request_count(), 1);
        }
    }

    #[tokio::test]
    async fn test_lower_cap_from_config() {
        let selected = records(8);
        let store = Arc::new(FakeStore::new(&selected));
        store.lock(&selected);
        let broker = Arc::new(FakeBroker::issuing());
        let config = SifterConfig {
            authorization_cap: 3,
            ..SifterConfig::default()
        };

        let outcome = RelocationEngine::from_config(store.clone(), broker.clone(), &config)
            .relocate(&selected)
            .await
            .unwrap();

        let RelocationOutcome::AuthorizationNeeded { request, .. } = outcome else {
            panic!("expected authorization");
        };
        assert_eq!(request.len(), 3);
    }

    #[tokio::test]
    async fn test_retry_after_grant_is_idempotent() {
        let selected = records(4);
        let store = Arc::new(FakeStore::new(&selected));
        store.lock(&selected[2..]);
        let broker = Arc::new(FakeBroker::issuing());
        let engine = engine(&store, &broker);

        let first = engine.relocate(&selected).await.unwrap();
        assert_eq!(first.moved(), &ids(&selected[..2])[..]);
        assert_eq!(store.retargets.load(Ordering::SeqCst), 2);

        // User grants access; caller retries with the original selection
        store.unlock_all();
        let second = engine.relocate(&selected).await.unwrap();

        assert_eq!(second, RelocationOutcome::AllMoved { moved: ids(&selected) });
        assert_eq!(store.retargets.load(Ordering::SeqCst), 4);
        assert_eq!(broker.request_count(), 1);
    }

    #[tokio::test]
    async fn test_retry_clears_pending_left_by_failed_attempt() {
        let a = meme(1, "A");
        let store = Arc::new(FakeStore::new(&[a.clone()]));
        store.jam_pending();
        let broker = Arc::new(FakeBroker::issuing());
        let engine = engine(&store, &broker);

        // Retarget went through, but the pending mark could not be cleared
        let first = engine.relocate(&[a.clone()]).await.unwrap();
        assert!(matches!(first, RelocationOutcome::AuthorizationNeeded { .. }));
        assert_eq!(store.folder_of(&a).as_deref(), Some("Pictures/Memes/"));
        assert!(store.is_pending(&a));

        store.unlock_all();
        let second = engine.relocate(&[a.clone()]).await.unwrap();

        assert_eq!(second, RelocationOutcome::AllMoved { moved: vec![a.id] });
        assert!(!store.is_pending(&a));
        assert_eq!(store.retargets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_broker_proceed_retries_once() {
        let selected = records(3);
        let store = Arc::new(FakeStore::new(&selected));
        store.lock(&selected[1..2]);
        let broker = Arc::new(FakeBroker::proceeding());

        let outcome = engine(&store, &broker).relocate(&selected).await.unwrap();

        // Still locked after the retry: left in place for the next scan
        assert_eq!(
            outcome,
            RelocationOutcome::AllMoved { moved: vec![selected[0].id, selected[2].id] }
        );
        assert_eq!(store.folder_of(&selected[1]).as_deref(), Some("Pictures/"));
    }

    #[tokio::test]
    async fn test_broker_failure_reports_moved() {
        let selected = records(2);
        let store = Arc::new(FakeStore::new(&selected));
        store.lock(&selected[1..]);
        let broker = Arc::new(FakeBroker::failing());

        let err = engine(&store, &broker).relocate(&selected).await.unwrap_err();

        let RelocationError::Broker { moved, .. } = err;
        assert_eq!(moved, vec![selected[0].id]);
    }

    #[tokio::test]
    async fn test_duplicate_selection_moves_once() {
        let a = meme(1, "A");
        let store = Arc::new(FakeStore::new(&[a.clone()]));
        let broker = Arc::new(FakeBroker::issuing());

        let outcome = engine(&store, &broker)
            .relocate(&[a.clone(), a.clone()])
            .await
            .unwrap();

        assert_eq!(outcome.count(), 1);
        assert_eq!(store.retargets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_resource_needs_authorization() {
        let ghost = meme(9, "ghost");
        let store = Arc::new(FakeStore::new(&[]));
        let broker = Arc::new(FakeBroker::issuing());

        let outcome = engine(&store, &broker).relocate(&[ghost.clone()]).await.unwrap();

        let RelocationOutcome::AuthorizationNeeded { request, .. } = outcome else {
            panic!("expected authorization");
        };
        assert!(request.covers(&ghost.location));
    }
}
