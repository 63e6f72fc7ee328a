//! Upload batch identifiers.
//!
//! A batch groups every file added between the first file of a session and
//! the moment the queue fully drains. The server uses the id to put the files
//! of one drop into the same folder, so ids sort by creation time.

use chrono::{Local, NaiveDateTime};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchId(String);

impl BatchId {
    /// Format as `YYYYMMDD_HHMMSS`.
    pub fn from_datetime(at: NaiveDateTime) -> Self {
        BatchId(at.format("%Y%m%d_%H%M%S").to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of wall-clock time for new batch ids.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}
