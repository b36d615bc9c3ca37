//! Session actor
//!
//! The single owner of everything the user sees: the result set, the
//! selection, and the pending authorization request. It runs as one task;
//! scans and relocations run on background tasks that report back through an
//! event channel, so every mutation happens here, one at a time.
//!
//! State is published through a `watch` channel (one transition per applied
//! intent or per published batch). Outcome messages go through an unbounded
//! channel: queued while nobody listens, delivered once.

use crate::error::{PipelineError, RelocationError, SessionError};
use crate::models::{AuthorizationRequest, ImageId, ImageRecord, Notification};
use crate::pipeline::{ClassificationPipeline, ScanSummary};
use crate::relocation::{RelocationEngine, RelocationOutcome};
use crate::selection::SelectionStore;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

/// Receiving end of the outcome messages
pub type Notifications = mpsc::UnboundedReceiver<Notification>;

/// What the presentation layer renders
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub results: Vec<ImageRecord>,
    pub selected: BTreeSet<ImageId>,
    pub pending_authorization: Option<AuthorizationRequest>,
    pub scanning: bool,
    pub relocating: bool,
}

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

enum Intent {
    Scan(Reply<bool>),
    Toggle(ImageId, Reply<bool>),
    SelectAll(Reply<usize>),
    ClearSelection(Reply<()>),
    MoveSelected(Reply<()>),
    AuthorizationResult { granted: bool, reply: Reply<()> },
    Shutdown,
}

enum Event {
    BatchReady { run: u64, records: Vec<ImageRecord> },
    ScanFinished { run: u64, result: Result<ScanSummary, PipelineError> },
    RelocationFinished(Result<RelocationOutcome, RelocationError>),
}

/// Cloneable front for the session actor
#[derive(Clone)]
pub struct SessionHandle {
    intents: mpsc::UnboundedSender<Intent>,
    state: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Intent) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel();
        self.intents
            .send(make(reply))
            .map_err(|_| SessionError::Closed)?;
        response.await.map_err(|_| SessionError::Closed)?
    }

    /// Start a scan. Returns `false` if one is already running.
    pub async fn scan(&self) -> Result<bool, SessionError> {
        self.request(Intent::Scan).await
    }

    /// Toggle an image that is in the result set. Returns whether it is now selected.
    pub async fn toggle(&self, id: ImageId) -> Result<bool, SessionError> {
        self.request(|reply| Intent::Toggle(id, reply)).await
    }

    /// Select every visible image. Returns how many were newly selected.
    pub async fn select_all(&self) -> Result<usize, SessionError> {
        self.request(Intent::SelectAll).await
    }

    pub async fn clear_selection(&self) -> Result<(), SessionError> {
        self.request(Intent::ClearSelection).await
    }

    /// Move the selected images into the destination folder in the background
    pub async fn move_selected(&self) -> Result<(), SessionError> {
        self.request(Intent::MoveSelected).await
    }

    /// Hand back the user's answer to the pending authorization request
    pub async fn authorization_result(&self, granted: bool) -> Result<(), SessionError> {
        self.request(|reply| Intent::AuthorizationResult { granted, reply })
            .await
    }

    /// Stop the session, cancelling any scan in flight
    pub fn shutdown(&self) {
        let _ = self.intents.send(Intent::Shutdown);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.clone()
    }
}

pub struct Session {
    pipeline: Arc<ClassificationPipeline>,
    relocation: Arc<RelocationEngine>,
    results: Vec<ImageRecord>,
    selection: SelectionStore,
    pending: Option<AuthorizationRequest>,
    /// Selection of the relocation awaiting authorization, replayed on grant
    last_move: Vec<ImageRecord>,
    /// Ids moved during the current scan run; late batches must not bring them back
    moved: HashSet<ImageId>,
    /// Records appended to the results during the current scan run
    found: usize,
    /// Images moved by the relocation now awaiting authorization
    moved_before_authorization: usize,
    scan_run: u64,
    scan_cancel: Option<CancellationToken>,
    relocating: bool,
    state: watch::Sender<SessionSnapshot>,
    notifications: mpsc::UnboundedSender<Notification>,
    events: mpsc::UnboundedSender<Event>,
}

impl Session {
    /// Spawn the actor on the current tokio runtime
    pub fn spawn(
        pipeline: Arc<ClassificationPipeline>,
        relocation: Arc<RelocationEngine>,
    ) -> (SessionHandle, Notifications) {
        let (intent_tx, intent_rx) = mpsc::unbounded_channel();
        let (session, event_rx, state_rx, notify_rx) = Session::new(pipeline, relocation);

        tokio::spawn(session.run(intent_rx, event_rx));

        let handle = SessionHandle {
            intents: intent_tx,
            state: state_rx,
        };
        (handle, notify_rx)
    }

    fn new(
        pipeline: Arc<ClassificationPipeline>,
        relocation: Arc<RelocationEngine>,
    ) -> (
        Self,
        mpsc::UnboundedReceiver<Event>,
        watch::Receiver<SessionSnapshot>,
        Notifications,
    ) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionSnapshot::default());

        let session = Session {
            pipeline,
            relocation,
            results: Vec::new(),
            selection: SelectionStore::new(),
            pending: None,
            last_move: Vec::new(),
            moved: HashSet::new(),
            found: 0,
            moved_before_authorization: 0,
            scan_run: 0,
            scan_cancel: None,
            relocating: false,
            state: state_tx,
            notifications: notify_tx,
            events: event_tx,
        };
        (session, event_rx, state_rx, notify_rx)
    }

    async fn run(
        mut self,
        mut intents: mpsc::UnboundedReceiver<Intent>,
        mut events: mpsc::UnboundedReceiver<Event>,
    ) {
        tracing::debug!("Session started");

        loop {
            tokio::select! {
                intent = intents.recv() => match intent {
                    Some(Intent::Shutdown) | None => break,
                    Some(intent) => self.handle_intent(intent),
                },
                Some(event) = events.recv() => self.handle_event(event),
            }
        }

        if let Some(cancel) = self.scan_cancel.take() {
            cancel.cancel();
        }
        tracing::info!("Session closed");
    }

    fn handle_intent(&mut self, intent: Intent) {
        match intent {
            Intent::Scan(reply) => {
                let started = self.start_scan();
                let _ = reply.send(Ok(started));
            }
            Intent::Toggle(id, reply) => {
                // Only visible images can be selected
                let selected = if self.results.iter().any(|r| r.id == id) {
                    self.selection.toggle(id)
                } else {
                    tracing::debug!(id = %id, "Ignoring toggle for image not in results");
                    false
                };
                self.publish();
                let _ = reply.send(Ok(selected));
            }
            Intent::SelectAll(reply) => {
                let added = self.selection.select_all(&self.results);
                self.publish();
                let _ = reply.send(Ok(added));
            }
            Intent::ClearSelection(reply) => {
                self.selection.clear();
                self.publish();
                let _ = reply.send(Ok(()));
            }
            Intent::MoveSelected(reply) => {
                let _ = reply.send(self.move_selected());
            }
            Intent::AuthorizationResult { granted, reply } => {
                let _ = reply.send(self.resolve_authorization(granted));
            }
            Intent::Shutdown => {}
        }
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::BatchReady { run, records } => {
                if run != self.scan_run {
                    return;
                }
                let before = self.results.len();
                self.results
                    .extend(records.into_iter().filter(|r| !self.moved.contains(&r.id)));
                let added = self.results.len() - before;
                self.found += added;
                tracing::debug!(added, total = self.results.len(), "Published batch");
                self.publish();
            }
            Event::ScanFinished { run, result } => {
                if run != self.scan_run {
                    return;
                }
                self.scan_cancel = None;
                match result {
                    Ok(summary) => {
                        tracing::debug!(
                            published = summary.published,
                            shown = self.found,
                            "Scan finished"
                        );
                        self.notify(Notification::ScanCompleted { found: self.found });
                    }
                    Err(PipelineError::Cancelled) => tracing::debug!("Scan cancelled"),
                    Err(e) => {
                        tracing::warn!(error = %e, "Scan failed");
                        self.notify(Notification::ScanFailed {
                            reason: e.to_string(),
                        });
                    }
                }
                self.publish();
            }
            Event::RelocationFinished(result) => {
                self.relocating = false;
                match result {
                    Ok(RelocationOutcome::AllMoved { moved }) => {
                        self.forget(&moved);
                        self.last_move.clear();
                        self.moved_before_authorization = 0;
                        self.notify(Notification::Moved { count: moved.len() });
                    }
                    Ok(RelocationOutcome::AuthorizationNeeded { request, moved }) => {
                        self.forget(&moved);
                        self.moved_before_authorization = moved.len();
                        self.pending = Some(request);
                    }
                    Err(RelocationError::Broker { source, moved }) => {
                        tracing::warn!(error = %source, "Relocation failed");
                        self.forget(&moved);
                        self.last_move.clear();
                        self.moved_before_authorization = 0;
                        self.notify(Notification::MoveFailed {
                            reason: source.to_string(),
                        });
                    }
                }
                self.publish();
            }
        }
    }

    fn start_scan(&mut self) -> bool {
        if self.scan_cancel.is_some() {
            tracing::debug!("Scan already in flight");
            return false;
        }

        self.scan_run += 1;
        self.results.clear();
        self.moved.clear();
        self.found = 0;
        self.selection.retain_present(&self.results);

        let cancel = CancellationToken::new();
        self.scan_cancel = Some(cancel.clone());

        let run = self.scan_run;
        let pipeline = Arc::clone(&self.pipeline);
        let events = self.events.clone();

        tokio::spawn(async move {
            let batches = events.clone();
            let result = pipeline
                .scan(&cancel, move |records| {
                    let _ = batches.send(Event::BatchReady { run, records });
                })
                .await;
            let _ = events.send(Event::ScanFinished { run, result });
        });

        tracing::info!(run, "Scan started");
        self.publish();
        true
    }

    fn move_selected(&mut self) -> Result<(), SessionError> {
        if self.relocating {
            return Err(SessionError::RelocationInFlight);
        }
        if self.pending.is_some() {
            return Err(SessionError::AuthorizationPending);
        }

        // Selection intersected with what is visible right now
        let selected = self.selection.selected_in(&self.results);
        if selected.is_empty() {
            tracing::debug!("Nothing selected, move ignored");
            return Ok(());
        }

        self.last_move = selected.clone();
        self.start_relocation(selected);
        Ok(())
    }

    fn resolve_authorization(&mut self, granted: bool) -> Result<(), SessionError> {
        let request = self
            .pending
            .take()
            .ok_or(SessionError::NoPendingAuthorization)?;

        if granted {
            tracing::info!(request = %request.id, "Authorization granted, retrying relocation");
            let selection = self.last_move.clone();
            self.start_relocation(selection);
        } else {
            tracing::info!(request = %request.id, "Authorization denied");
            self.last_move.clear();
            // Whatever went through before the request still counts
            let count = std::mem::take(&mut self.moved_before_authorization);
            if count > 0 {
                self.notify(Notification::Moved { count });
            }
            self.publish();
        }
        Ok(())
    }

    fn start_relocation(&mut self, selection: Vec<ImageRecord>) {
        self.relocating = true;

        let engine = Arc::clone(&self.relocation);
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = engine.relocate(&selection).await;
            let _ = events.send(Event::RelocationFinished(result));
        });

        self.publish();
    }

    /// Drop moved images from the results and the selection
    fn forget(&mut self, moved: &[ImageId]) {
        let moved_set: HashSet<ImageId> = moved.iter().copied().collect();
        self.results.retain(|r| !moved_set.contains(&r.id));
        self.selection.remove_all(moved);
        self.moved.extend(moved_set);
    }

    fn notify(&self, notification: Notification) {
        tracing::info!(message = %notification.message(), "Notification");
        let _ = self.notifications.send(notification);
    }

    fn publish(&self) {
        let snapshot = SessionSnapshot {
            results: self.results.clone(),
            selected: self.selection.ids().clone(),
            pending_authorization: self.pending.clone(),
            scanning: self.scan_cancel.is_some(),
            relocating: self.relocating,
        };
        self.state.send_replace(snapshot);
    }
}
