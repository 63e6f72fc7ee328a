use api_client::FileContent;
use bytes::Bytes;
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Opaque id assigned when a file enters the queue. Used for keying rows only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(Uuid);

impl TaskId {
    pub(crate) fn new() -> Self {
        TaskId(Uuid::new_v4())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Pending,
    Uploading,
    Success,
    Error,
}

impl UploadStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, UploadStatus::Success | UploadStatus::Error)
    }

    /// Pending or uploading: the task still holds the batch open.
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Uploading => "uploading",
            UploadStatus::Success => "success",
            UploadStatus::Error => "error",
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A file picked or dropped by the user, with its raw content.
#[derive(Debug, Clone)]
pub struct FileHandle {
    pub name: String,
    pub size: u64,
    pub content: FileContent,
}

impl FileHandle {
    pub fn new(name: impl Into<String>, size: u64, content: FileContent) -> Self {
        Self {
            name: name.into(),
            size,
            content,
        }
    }

    pub fn in_memory(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self::new(name, data.len() as u64, FileContent::Memory(data))
    }

    pub fn local(name: impl Into<String>, path: PathBuf, size: u64) -> Self {
        Self::new(name, size, FileContent::Path(path))
    }
}

#[derive(Debug, Clone)]
pub struct UploadTask {
    id: TaskId,
    file: FileHandle,
    status: UploadStatus,
    progress: u8,
}

impl UploadTask {
    pub(crate) fn new(file: FileHandle) -> Self {
        Self {
            id: TaskId::new(),
            file,
            status: UploadStatus::Pending,
            progress: 0,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Original file name, unsanitized.
    pub fn name(&self) -> &str {
        &self.file.name
    }

    pub fn file(&self) -> &FileHandle {
        &self.file
    }

    pub fn status(&self) -> UploadStatus {
        self.status
    }

    /// Percent in `0..=100`.
    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub(crate) fn start(&mut self) -> bool {
        if self.status != UploadStatus::Pending {
            return false;
        }
        self.status = UploadStatus::Uploading;
        true
    }

    /// Returns true when the visible percentage changed.
    pub(crate) fn record_progress(&mut self, percent: u8) -> bool {
        if self.status != UploadStatus::Uploading || percent <= self.progress {
            return false;
        }
        self.progress = percent.min(100);
        true
    }

    pub(crate) fn finish(&mut self, succeeded: bool) -> bool {
        if self.status != UploadStatus::Uploading {
            return false;
        }
        if succeeded {
            self.status = UploadStatus::Success;
            self.progress = 100;
        } else {
            self.status = UploadStatus::Error;
        }
        true
    }
}

/// `round(sent / total * 100)`, or `None` when the total is unknown.
pub fn percent_of(sent: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let pct = (sent.min(total) as f64 / total as f64 * 100.0).round();
    Some(pct as u8)
}
