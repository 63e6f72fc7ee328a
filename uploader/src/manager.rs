//! The upload queue: ingestion, batch lifecycle and the bounded worker pool.

use crate::batch::{BatchId, Clock, SystemClock};
use crate::events::UploadEvent;
use crate::media::is_allowed_media;
use crate::session::Session;
use crate::snapshot::QueueSnapshot;
use crate::source::{walk, DropPayload, Entry};
use crate::task::{percent_of, FileHandle, TaskId, UploadStatus, UploadTask};
use crate::transport::UploadTransport;
use api_client::ProgressCallback;
use futures::{FutureExt, StreamExt};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, Notify};

pub const DEFAULT_MAX_CONCURRENT: usize = 3;

#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Upper bound on tasks in `Uploading` at any moment.
    pub max_concurrent: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }
}

#[derive(Default)]
struct QueueState {
    tasks: Vec<UploadTask>,
    active_uploads: usize,
    batch_id: Option<BatchId>,
    /// Number of ingest calls still discovering files.
    gathering: usize,
}

impl QueueState {
    fn is_settled(&self) -> bool {
        self.gathering == 0 && self.tasks.iter().all(|t| t.status().is_terminal())
    }
}

/// A task claimed by a worker. Tasks are never removed from the queue, so
/// the index stays valid for the whole upload.
struct Claim {
    index: usize,
    id: TaskId,
    file: FileHandle,
    batch_id: BatchId,
}

struct Inner {
    state: Mutex<QueueState>,
    config: UploadConfig,
    session: Session,
    transport: Arc<dyn UploadTransport>,
    clock: Arc<dyn Clock>,
    events: Option<mpsc::UnboundedSender<UploadEvent>>,
    settled: Notify,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: UploadEvent) {
        if let Some(tx) = &self.events {
            if let Err(e) = tx.send(event) {
                tracing::debug!(event = ?e.0, "upload event dropped, no listener");
            }
        }
    }

    fn ensure_batch(&self, state: &mut QueueState) -> BatchId {
        if let Some(id) = &state.batch_id {
            return id.clone();
        }
        let id = BatchId::from_datetime(self.clock.now());
        tracing::info!(batch = %id, "starting upload batch");
        state.batch_id = Some(id.clone());
        self.emit(UploadEvent::BatchStarted(id.clone()));
        id
    }

    fn claim_next(&self, state: &mut QueueState) -> Option<Claim> {
        if state.active_uploads >= self.config.max_concurrent {
            return None;
        }
        let index = state
            .tasks
            .iter()
            .position(|t| t.status() == UploadStatus::Pending)?;
        let batch_id = self.ensure_batch(state);
        let task = &mut state.tasks[index];
        task.start();
        state.active_uploads += 1;
        tracing::debug!(task = %task.id(), file = task.name(), active = state.active_uploads, "upload started");
        let claim = Claim {
            index,
            id: task.id(),
            file: task.file().clone(),
            batch_id,
        };
        self.emit(UploadEvent::TaskStarted { id: claim.id });
        Some(claim)
    }

    fn record_progress(&self, index: usize, sent: u64, total: u64) {
        let Some(percent) = percent_of(sent, total) else {
            return;
        };
        let mut state = self.lock();
        if let Some(task) = state.tasks.get_mut(index) {
            if task.record_progress(percent) {
                self.emit(UploadEvent::TaskProgress {
                    id: task.id(),
                    percent,
                });
            }
        }
    }

    fn finish(&self, state: &mut QueueState, claim: &Claim, succeeded: bool) {
        let task = &mut state.tasks[claim.index];
        if task.finish(succeeded) {
            state.active_uploads -= 1;
            self.emit(UploadEvent::TaskFinished {
                id: claim.id,
                status: task.status(),
            });
        }
    }

    /// Clear the batch once nothing is pending, uploading or being gathered.
    fn check_settled(&self, state: &mut QueueState) {
        if !state.is_settled() {
            return;
        }
        if let Some(batch) = state.batch_id.take() {
            let failed = state
                .tasks
                .iter()
                .filter(|t| t.status() == UploadStatus::Error)
                .count();
            tracing::info!(batch = %batch, failed, "upload batch settled");
            self.emit(UploadEvent::BatchSettled(batch));
        }
        self.settled.notify_waiters();
    }

    fn end_gathering(&self) {
        let mut state = self.lock();
        state.gathering = state.gathering.saturating_sub(1);
        self.emit(UploadEvent::GatheringFinished);
        self.check_settled(&mut state);
    }
}

/// Holds the batch open while an ingest call is still discovering files.
struct GatherGuard {
    inner: Arc<Inner>,
}

impl Drop for GatherGuard {
    fn drop(&mut self) {
        self.inner.end_gathering();
    }
}

pub struct UploadManagerBuilder {
    transport: Arc<dyn UploadTransport>,
    session: Session,
    config: UploadConfig,
    clock: Arc<dyn Clock>,
    events: Option<mpsc::UnboundedSender<UploadEvent>>,
}

impl UploadManagerBuilder {
    pub fn config(mut self, config: UploadConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.config.max_concurrent = max_concurrent;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn events(mut self, tx: mpsc::UnboundedSender<UploadEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn build(self) -> UploadManager {
        let mut config = self.config;
        config.max_concurrent = config.max_concurrent.max(1);
        UploadManager {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState::default()),
                config,
                session: self.session,
                transport: self.transport,
                clock: self.clock,
                events: self.events,
                settled: Notify::new(),
            }),
        }
    }
}

/// Session-wide upload queue. Clones share the same queue.
///
/// Uploads run as tokio tasks, so the manager must be used from within a
/// runtime.
#[derive(Clone)]
pub struct UploadManager {
    inner: Arc<Inner>,
}

impl UploadManager {
    pub fn builder(transport: Arc<dyn UploadTransport>, session: Session) -> UploadManagerBuilder {
        UploadManagerBuilder {
            transport,
            session,
            config: UploadConfig::default(),
            clock: Arc::new(SystemClock),
            events: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    pub fn max_concurrent(&self) -> usize {
        self.inner.config.max_concurrent
    }

    /// Return the active batch id, creating one from the clock if none is active.
    pub fn start_batch_if_needed(&self) -> BatchId {
        let mut state = self.inner.lock();
        self.inner.ensure_batch(&mut state)
    }

    pub fn current_batch(&self) -> Option<BatchId> {
        self.inner.lock().batch_id.clone()
    }

    fn begin_gathering(&self) -> GatherGuard {
        let mut state = self.inner.lock();
        state.gathering += 1;
        self.inner.ensure_batch(&mut state);
        self.inner.emit(UploadEvent::GatheringStarted);
        GatherGuard {
            inner: self.inner.clone(),
        }
    }

    /// Queue everything in a drop, walking dropped directories.
    ///
    /// Files start uploading as soon as they are discovered; the batch stays
    /// open until the whole tree has been walked. Returns the number of
    /// tasks queued.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self, payload)))]
    pub async fn ingest_dropped(&self, payload: DropPayload) -> usize {
        if !self.inner.session.can_upload() {
            tracing::warn!(user = %self.inner.session.user_id, "guest session cannot upload, ignoring drop");
            return 0;
        }
        let gather = self.begin_gathering();
        let mut queued = 0;
        for file in payload.files {
            queued += usize::from(self.enqueue(file).is_some());
        }
        for entry in payload.entries {
            queued += self.traverse(entry).await;
        }
        drop(gather);
        self.dispatch();
        queued
    }

    /// Queue a flat selection of files.
    pub fn ingest_picked(&self, files: Vec<FileHandle>) -> usize {
        if !self.inner.session.can_upload() {
            tracing::warn!(user = %self.inner.session.user_id, "guest session cannot upload, ignoring selection");
            return 0;
        }
        let gather = self.begin_gathering();
        let queued = files
            .into_iter()
            .filter_map(|file| self.enqueue(file))
            .count();
        drop(gather);
        self.dispatch();
        queued
    }

    async fn traverse(&self, entry: Entry) -> usize {
        let mut files = Box::pin(walk(entry));
        let mut queued = 0;
        while let Some(file) = files.next().await {
            queued += usize::from(self.enqueue(file).is_some());
        }
        queued
    }

    /// Add one file to the queue and try to start it right away.
    ///
    /// Files whose extension is not a known media type are dropped and
    /// `None` is returned.
    pub fn enqueue(&self, file: FileHandle) -> Option<TaskId> {
        if !self.inner.session.can_upload() {
            return None;
        }
        if !is_allowed_media(&file.name) {
            tracing::debug!(file = %file.name, "skipping non-media file");
            self.inner.emit(UploadEvent::Skipped { name: file.name });
            return None;
        }
        let id = {
            let mut state = self.inner.lock();
            self.inner.ensure_batch(&mut state);
            let task = UploadTask::new(file);
            let id = task.id();
            tracing::debug!(task = %id, file = task.name(), "queued");
            self.inner.emit(UploadEvent::TaskQueued {
                id,
                name: task.name().to_string(),
            });
            state.tasks.push(task);
            id
        };
        self.dispatch();
        Some(id)
    }

    /// Start pending tasks until the pool is full or nothing is pending.
    /// Safe to call any number of times; with nothing pending it does nothing.
    pub fn dispatch(&self) {
        let mut state = self.inner.lock();
        while let Some(claim) = self.inner.claim_next(&mut state) {
            let worker = self.clone();
            tokio::spawn(async move { worker.run_worker(claim).await });
        }
    }

    /// Upload the claimed task, then keep pulling pending tasks until none is left.
    async fn run_worker(self, first: Claim) {
        let mut claim = first;
        loop {
            let succeeded = self.perform_upload(&claim).await;
            let next = {
                let mut state = self.inner.lock();
                self.inner.finish(&mut state, &claim, succeeded);
                let next = self.inner.claim_next(&mut state);
                if next.is_none() {
                    self.inner.check_settled(&mut state);
                }
                next
            };
            match next {
                Some(c) => claim = c,
                None => break,
            }
        }
    }

    async fn perform_upload(&self, claim: &Claim) -> bool {
        let inner = self.inner.clone();
        let index = claim.index;
        let progress: ProgressCallback =
            Arc::new(move |sent, total| inner.record_progress(index, sent, total));

        let upload = self.inner.transport.upload(
            &claim.file,
            &self.inner.session.user_id,
            &claim.batch_id,
            progress,
        );
        match AssertUnwindSafe(upload).catch_unwind().await {
            Ok(Ok(())) => {
                tracing::debug!(task = %claim.id, file = %claim.file.name, "upload finished");
                true
            }
            Ok(Err(e)) => {
                tracing::warn!(task = %claim.id, file = %claim.file.name, error = %e, "upload failed");
                false
            }
            Err(_) => {
                tracing::error!(task = %claim.id, file = %claim.file.name, "upload transport panicked");
                false
            }
        }
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        let state = self.inner.lock();
        QueueSnapshot {
            tasks: state.tasks.clone(),
            gathering: state.gathering > 0,
            batch_id: state.batch_id.clone(),
            active_uploads: state.active_uploads,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.inner.lock().is_settled()
    }

    /// Wait until no task is pending or uploading and no ingest is in progress.
    pub async fn wait_settled(&self) {
        loop {
            let notified = self.inner.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_settled() {
                return;
            }
            notified.await;
        }
    }
}
