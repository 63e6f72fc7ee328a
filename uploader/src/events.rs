use crate::batch::BatchId;
use crate::task::{TaskId, UploadStatus};

/// Queue changes pushed to the hosting application.
///
/// Every mutation of the queue is followed by one of these, so a renderer
/// that redraws on each event never shows stale state.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    BatchStarted(BatchId),
    GatheringStarted,
    GatheringFinished,
    /// A file was dropped by the media filter.
    Skipped { name: String },
    TaskQueued { id: TaskId, name: String },
    TaskStarted { id: TaskId },
    TaskProgress { id: TaskId, percent: u8 },
    TaskFinished { id: TaskId, status: UploadStatus },
    /// The queue drained. Views that list files should reload.
    BatchSettled(BatchId),
}
