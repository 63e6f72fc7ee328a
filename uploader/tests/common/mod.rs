#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use uploader::{
    BatchId, Clock, DirectoryReader, Entry, FileHandle, ProgressCallback, Role, Session,
    TransportError, UploadManager, UploadTransport,
};

pub fn user() -> Session {
    Session::new("user-1", Role::User)
}

pub fn media(name: &str) -> FileHandle {
    FileHandle::in_memory(name, vec![0u8; 100])
}

/// Poll `cond` until it holds, failing the test after five seconds.
pub async fn eventually<F: FnMut() -> bool>(mut cond: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub name: String,
    pub user_id: String,
    pub batch_id: BatchId,
}

/// Transport whose uploads block until the test releases them by file name.
#[derive(Default)]
pub struct GatedTransport {
    gates: Mutex<HashMap<String, oneshot::Sender<Result<(), TransportError>>>>,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl GatedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn waiting(&self) -> Vec<String> {
        let mut names: Vec<String> = self.gates.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Finish the upload of `name` once it has reached the transport.
    pub async fn release(&self, name: &str, outcome: Result<(), TransportError>) {
        eventually(|| self.gates.lock().unwrap().contains_key(name)).await;
        let tx = self.gates.lock().unwrap().remove(name).unwrap();
        tx.send(outcome).unwrap();
    }
}

#[async_trait]
impl UploadTransport for GatedTransport {
    async fn upload(
        &self,
        file: &FileHandle,
        user_id: &str,
        batch_id: &BatchId,
        progress: ProgressCallback,
    ) -> Result<(), TransportError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(Call {
            name: file.name.clone(),
            user_id: user_id.to_string(),
            batch_id: batch_id.clone(),
        });
        progress(file.size / 4, file.size);
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().insert(file.name.clone(), tx);
        let outcome = rx
            .await
            .unwrap_or_else(|_| Err(TransportError::Network("gate dropped".into())));
        if outcome.is_ok() {
            progress(file.size, file.size);
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

/// Transport that finishes every upload after a short delay, failing the
/// names it was told to fail.
#[derive(Default)]
pub struct InstantTransport {
    failing: HashSet<String>,
    panicking: HashSet<String>,
    delay: Duration,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl InstantTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    pub fn panicking(mut self, name: &str) -> Self {
        self.panicking.insert(name.to_string());
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn uploaded_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.calls().into_iter().map(|c| c.name).collect();
        names.sort();
        names
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UploadTransport for InstantTransport {
    async fn upload(
        &self,
        file: &FileHandle,
        user_id: &str,
        batch_id: &BatchId,
        progress: ProgressCallback,
    ) -> Result<(), TransportError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(Call {
            name: file.name.clone(),
            user_id: user_id.to_string(),
            batch_id: batch_id.clone(),
        });
        progress(file.size / 2, file.size);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.panicking.contains(&file.name) {
            panic!("transport blew up on {}", file.name);
        }
        if self.failing.contains(&file.name) {
            return Err(TransportError::Rejected(500));
        }
        progress(file.size, file.size);
        Ok(())
    }
}

pub struct FakeClock {
    now: Mutex<NaiveDateTime>,
}

impl FakeClock {
    pub fn new() -> Arc<Self> {
        let start = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        Arc::new(Self {
            now: Mutex::new(start),
        })
    }

    pub fn advance_secs(&self, secs: i64) {
        let mut now = self.now.lock().unwrap();
        *now += ChronoDuration::seconds(secs);
    }
}

impl Clock for FakeClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap()
    }
}

/// In-memory directory that serves fixed pages, optionally failing or
/// waiting on a gate before a given page.
pub struct MemDir {
    name: String,
    pages: VecDeque<io::Result<Vec<Entry>>>,
    gate_before_page: Option<(usize, oneshot::Receiver<()>)>,
    served: usize,
}

impl MemDir {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            pages: VecDeque::new(),
            gate_before_page: None,
            served: 0,
        }
    }

    pub fn page(mut self, entries: Vec<Entry>) -> Self {
        self.pages.push_back(Ok(entries));
        self
    }

    pub fn failing_page(mut self) -> Self {
        self.pages
            .push_back(Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied")));
        self
    }

    /// Block before serving page `index` until `gate` fires.
    pub fn gated(mut self, index: usize, gate: oneshot::Receiver<()>) -> Self {
        self.gate_before_page = Some((index, gate));
        self
    }

    pub fn entry(self) -> Entry {
        Entry::directory(self)
    }
}

#[async_trait]
impl DirectoryReader for MemDir {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_entries(&mut self) -> io::Result<Vec<Entry>> {
        if matches!(&self.gate_before_page, Some((index, _)) if *index == self.served) {
            if let Some((_, gate)) = self.gate_before_page.take() {
                let _ = gate.await;
            }
        }
        self.served += 1;
        self.pages.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

pub fn file_entry(name: &str) -> Entry {
    Entry::file(media(name))
}

pub fn manager(transport: Arc<dyn UploadTransport>) -> UploadManager {
    UploadManager::builder(transport, user()).build()
}
