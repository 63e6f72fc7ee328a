//! Read-only copies of queue state for renderers.

use crate::batch::BatchId;
use crate::task::{TaskId, UploadStatus, UploadTask};

#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    pub tasks: Vec<UploadTask>,
    pub gathering: bool,
    pub batch_id: Option<BatchId>,
    pub active_uploads: usize,
}

impl QueueSnapshot {
    pub fn total(&self) -> usize {
        self.tasks.len()
    }

    pub fn count(&self, status: UploadStatus) -> usize {
        self.tasks.iter().filter(|t| t.status() == status).count()
    }

    /// Tasks still pending or uploading.
    pub fn remaining(&self) -> usize {
        self.tasks.iter().filter(|t| t.status().is_active()).count()
    }

    pub fn is_settled(&self) -> bool {
        self.remaining() == 0 && !self.gathering
    }

    /// One-line summary shown above the upload list.
    pub fn headline(&self) -> String {
        let total = self.total();
        let remaining = self.remaining();
        let success = self.count(UploadStatus::Success);
        if self.gathering {
            "Scanning directories...".to_string()
        } else if remaining > 0 {
            let pct = if total > 0 {
                (success as f64 / total as f64 * 100.0).round() as usize
            } else {
                0
            };
            format!(
                "Uploading {} files... ({}% complete of {})",
                remaining, pct, total
            )
        } else if total > 0 {
            format!("Upload complete! ({}/{} successful)", success, total)
        } else {
            String::new()
        }
    }

    pub fn rows(&self) -> Vec<TaskRow> {
        self.tasks.iter().map(TaskRow::from).collect()
    }
}

/// One line of the upload list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRow {
    pub id: TaskId,
    pub name: String,
    pub status: UploadStatus,
    pub progress_text: String,
}

impl From<&UploadTask> for TaskRow {
    fn from(task: &UploadTask) -> Self {
        let progress_text = match task.status() {
            UploadStatus::Pending => "0%".to_string(),
            UploadStatus::Uploading => format!("{}%", task.progress()),
            UploadStatus::Success => "100%".to_string(),
            UploadStatus::Error => "Failed".to_string(),
        };
        TaskRow {
            id: task.id(),
            name: task.name().to_string(),
            status: task.status(),
            progress_text,
        }
    }
}
