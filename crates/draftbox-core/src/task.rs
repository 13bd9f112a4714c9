//! Task records: the tracked state of one draft download.
//!
//! A record is owned by the coordinator for its whole lifetime. Workers only
//! report byte counts; every status change goes through `TaskRecord::transition`.

use std::fmt;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::progress::ProgressStats;

/// Longest accepted draft identifier.
const MAX_ID_LEN: usize = 128;

/// Draft identifier (opaque string, typically a UUID).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(String);

impl TaskId {
    /// Validates a caller-supplied identifier.
    ///
    /// Accepts 1-128 characters from `[A-Za-z0-9._-]`, excluding `.` and `..`,
    /// so an id is always safe to embed in a URL path and a file name.
    pub fn parse(raw: &str) -> Result<Self, InvalidTaskId> {
        let raw = raw.trim();
        let valid_chars = raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if raw.is_empty() || raw.len() > MAX_ID_LEN || !valid_chars || raw == "." || raw == ".." {
            return Err(InvalidTaskId(raw.to_string()));
        }
        Ok(TaskId(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TaskId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid draft identifier {0:?}")]
pub struct InvalidTaskId(pub String);

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Queued,
    Downloading,
    Paused,
    Cancelled,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Downloading => "downloading",
            TaskStatus::Paused => "paused",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// Parses a stored status. Unknown strings map to `Failed`.
    pub fn from_str(s: &str) -> Self {
        match s {
            "queued" => TaskStatus::Queued,
            "downloading" => TaskStatus::Downloading,
            "paused" => TaskStatus::Paused,
            "cancelled" => TaskStatus::Cancelled,
            "completed" => TaskStatus::Completed,
            _ => TaskStatus::Failed,
        }
    }

    /// Parses user input strictly (CLI filters).
    pub fn parse(s: &str) -> Option<Self> {
        let status = Self::from_str(&s.trim().to_ascii_lowercase());
        (status.as_str() == s.trim().to_ascii_lowercase()).then_some(status)
    }

    /// Cancelled, Completed and Failed are final for a run.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Cancelled | TaskStatus::Completed | TaskStatus::Failed
        )
    }

    /// Transitions only move forward, except Downloading <-> Paused. A queued
    /// task may be paused before its worker reaches the first chunk.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Queued, Downloading | Paused | Cancelled | Failed)
                | (Downloading, Paused | Completed | Failed | Cancelled)
                | (Paused, Downloading | Completed | Failed | Cancelled)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a failed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Connection failure, timeout or incomplete body.
    Network,
    /// Non-2xx HTTP response.
    Server,
    /// Creating, writing or renaming the archive failed.
    Disk,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Network => "network",
            FailureKind::Server => "server",
            FailureKind::Disk => "disk",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "network" => Some(FailureKind::Network),
            "server" => Some(FailureKind::Server),
            "disk" => Some(FailureKind::Disk),
            _ => None,
        }
    }

    /// Server errors are the HTTP-status flavour of network errors.
    pub fn is_network(self) -> bool {
        matches!(self, FailureKind::Network | FailureKind::Server)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error attached to a `Failed` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind, self.message)
    }
}

/// Tracked state of one download.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub id: TaskId,
    /// Target directory for the archive.
    pub destination: PathBuf,
    pub status: TaskStatus,
    /// Expected size; `None` until response headers are read.
    pub bytes_total: Option<u64>,
    pub bytes_done: u64,
    /// Set only when `status == Failed`.
    pub error: Option<TaskFailure>,
    /// Final archive file, set only when `status == Completed`.
    pub archive_path: Option<PathBuf>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TaskRecord {
    pub fn new(id: TaskId, destination: impl Into<PathBuf>) -> Self {
        let now = unix_timestamp();
        Self {
            id,
            destination: destination.into(),
            status: TaskStatus::Queued,
            bytes_total: None,
            bytes_done: 0,
            error: None,
            archive_path: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves to `next` if the edge is allowed. Returns the rejected current status otherwise.
    pub fn transition(&mut self, next: TaskStatus) -> Result<(), TaskStatus> {
        if !self.status.can_transition_to(next) {
            return Err(self.status);
        }
        self.status = next;
        self.updated_at = unix_timestamp();
        Ok(())
    }

    /// Records the size announced by the server.
    pub fn set_total(&mut self, total: Option<u64>) {
        self.bytes_total = total.map(|t| t.max(self.bytes_done));
    }

    /// Raises `bytes_done`; never lowers it and never exceeds a known total.
    /// Returns true if the value changed.
    pub fn advance(&mut self, bytes_done: u64) -> bool {
        let capped = match self.bytes_total {
            Some(total) => bytes_done.min(total),
            None => bytes_done,
        };
        if capped <= self.bytes_done {
            return false;
        }
        self.bytes_done = capped;
        true
    }

    /// Terminal success: the archive is at `archive_path` and all bytes are accounted for.
    pub fn complete(&mut self, bytes: u64, archive_path: PathBuf) -> Result<(), TaskStatus> {
        self.transition(TaskStatus::Completed)?;
        self.bytes_total = Some(bytes);
        self.bytes_done = bytes;
        self.archive_path = Some(archive_path);
        Ok(())
    }

    pub fn fail(&mut self, failure: TaskFailure) -> Result<(), TaskStatus> {
        self.transition(TaskStatus::Failed)?;
        self.error = Some(failure);
        Ok(())
    }

    pub fn progress(&self, elapsed_secs: f64) -> ProgressStats {
        ProgressStats {
            bytes_done: self.bytes_done,
            bytes_total: self.bytes_total,
            elapsed_secs,
        }
    }
}

/// Current time as Unix seconds.
pub(crate) fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
