//! Client-side upload queue for the photo vault.
//!
//! Files arrive from drops (possibly whole directory trees) or a file
//! picker, are filtered to media types, and are uploaded by a bounded pool
//! of workers. Every file queued between the first discovery and the moment
//! the queue drains shares one batch id, which the server uses to group them.

pub mod batch;
pub mod events;
pub mod manager;
pub mod media;
pub mod session;
pub mod snapshot;
pub mod source;
pub mod task;
pub mod transport;

pub use batch::{BatchId, Clock, SystemClock};
pub use events::UploadEvent;
pub use manager::{UploadConfig, UploadManager, UploadManagerBuilder, DEFAULT_MAX_CONCURRENT};
pub use media::{is_allowed_media, ALLOWED_EXTENSIONS};
pub use session::{Role, Session};
pub use snapshot::{QueueSnapshot, TaskRow};
pub use source::{DirectoryReader, DropPayload, Entry, FileEntry, FsDirectory, FsFile};
pub use task::{FileHandle, TaskId, UploadStatus, UploadTask};
pub use transport::{TransportError, UploadTransport};

pub use api_client::{ApiClient, FileContent, ProgressCallback};
