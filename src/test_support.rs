//! In-memory stand-ins for the external collaborators, shared by unit tests.

use crate::error::{BrokerError, MediaError, MoveError, RecognitionError};
use crate::media::{is_in_destination, MediaIndex};
use crate::models::{AuthorizationRequest, ImageId, ImageRecord, LocationHandle};
use crate::permissions::PermissionBroker;
use crate::recognition::RecognitionEngine;
use crate::storage::MediaStore;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Candidate record `Pictures/<id>.png`, newest first by id
pub fn candidate(id: u64) -> ImageRecord {
    ImageRecord::new(
        ImageId(id),
        LocationHandle::new(format!("Pictures/{}.png", id)),
        format!("{}.png", id),
        10_000 - id as i64,
    )
}

pub fn meme(id: u64, text: &str) -> ImageRecord {
    candidate(id).with_ocr_text(text)
}

#[derive(Default)]
pub struct FakeIndex {
    records: Vec<ImageRecord>,
    fail: bool,
    pub calls: AtomicUsize,
}

impl FakeIndex {
    pub fn new(records: Vec<ImageRecord>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl MediaIndex for FakeIndex {
    async fn list_candidates(&self) -> Result<Vec<ImageRecord>, MediaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(MediaError::Io(std::io::Error::other("index unavailable")));
        }
        Ok(self.records.clone())
    }
}

/// Engine answering from a table; unknown handles have no text
#[derive(Default)]
pub struct FakeEngine {
    texts: HashMap<String, String>,
    failures: HashSet<String>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub calls: AtomicUsize,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, handle: &str, text: &str) -> Self {
        self.texts.insert(handle.to_string(), text.to_string());
        self
    }

    pub fn with_failure(mut self, handle: &str) -> Self {
        self.failures.insert(handle.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every record in `records` recognized with its own `ocr_text`
    pub fn from_records(records: &[ImageRecord]) -> Self {
        records.iter().fold(Self::new(), |engine, r| {
            engine.with_text(r.location.as_str(), &r.ocr_text)
        })
    }
}

#[async_trait]
impl RecognitionEngine for FakeEngine {
    async fn recognize(&self, location: &LocationHandle) -> Result<String, RecognitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failures.contains(location.as_str()) {
            return Err(RecognitionError::NotFound(location.to_string()));
        }
        Ok(self.texts.get(location.as_str()).cloned().unwrap_or_default())
    }
}

/// Store tracking each handle's folder; locked handles refuse to retarget
pub struct FakeStore {
    folders: Mutex<HashMap<LocationHandle, String>>,
    pending: Mutex<HashSet<LocationHandle>>,
    locked: Mutex<HashSet<LocationHandle>>,
    jammed: AtomicBool,
    pub retargets: AtomicUsize,
}

impl FakeStore {
    /// Every handle starts in `Pictures/`
    pub fn new(records: &[ImageRecord]) -> Self {
        let folders = records
            .iter()
            .map(|r| (r.location.clone(), "Pictures/".to_string()))
            .collect();
        Self {
            folders: Mutex::new(folders),
            pending: Mutex::new(HashSet::new()),
            locked: Mutex::new(HashSet::new()),
            jammed: AtomicBool::new(false),
            retargets: AtomicUsize::new(0),
        }
    }

    pub fn lock(&self, records: &[ImageRecord]) {
        let mut locked = self.locked.lock().unwrap();
        locked.extend(records.iter().map(|r| r.location.clone()));
    }

    /// Clearing a pending mark fails until `unlock_all`
    pub fn jam_pending(&self) {
        self.jammed.store(true, Ordering::SeqCst);
    }

    /// Simulate the user granting access
    pub fn unlock_all(&self) {
        self.locked.lock().unwrap().clear();
        self.jammed.store(false, Ordering::SeqCst);
    }

    pub fn folder_of(&self, record: &ImageRecord) -> Option<String> {
        self.folders.lock().unwrap().get(&record.location).cloned()
    }

    pub fn is_pending(&self, record: &ImageRecord) -> bool {
        self.pending.lock().unwrap().contains(&record.location)
    }
}

#[async_trait]
impl MediaStore for FakeStore {
    async fn relative_path(&self, handle: &LocationHandle) -> Result<String, MoveError> {
        self.folders
            .lock()
            .unwrap()
            .get(handle)
            .cloned()
            .ok_or_else(|| MoveError::NotFound(handle.to_string()))
    }

    async fn set_pending(&self, handle: &LocationHandle, pending: bool) -> Result<(), MoveError> {
        if !pending && self.jammed.load(Ordering::SeqCst) {
            return Err(MoveError::PermissionDenied(handle.to_string()));
        }
        let mut set = self.pending.lock().unwrap();
        if pending {
            set.insert(handle.clone());
        } else {
            set.remove(handle);
        }
        Ok(())
    }

    async fn retarget(&self, handle: &LocationHandle, destination: &str) -> Result<(), MoveError> {
        if self.locked.lock().unwrap().contains(handle) {
            return Err(MoveError::PermissionDenied(handle.to_string()));
        }
        let mut folders = self.folders.lock().unwrap();
        let folder = folders
            .get_mut(handle)
            .ok_or_else(|| MoveError::NotFound(handle.to_string()))?;
        if !is_in_destination(folder, destination) {
            self.retargets.fetch_add(1, Ordering::SeqCst);
        }
        *folder = format!("{}/", destination.trim_matches('/'));
        Ok(())
    }
}

/// Broker that always issues a request, or always says proceed
#[derive(Default)]
pub struct FakeBroker {
    proceed: bool,
    fail: bool,
    pub requests: Mutex<Vec<Vec<LocationHandle>>>,
}

impl FakeBroker {
    pub fn issuing() -> Self {
        Self::default()
    }

    pub fn proceeding() -> Self {
        Self {
            proceed: true,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl PermissionBroker for FakeBroker {
    async fn request_write_access(
        &self,
        handles: &[LocationHandle],
    ) -> Result<Option<AuthorizationRequest>, BrokerError> {
        self.requests.lock().unwrap().push(handles.to_vec());
        if self.fail {
            return Err(BrokerError::Request("broker offline".to_string()));
        }
        if self.proceed {
            return Ok(None);
        }
        AuthorizationRequest::new(handles.to_vec()).map(Some)
    }
}
