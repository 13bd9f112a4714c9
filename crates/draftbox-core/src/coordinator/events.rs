//! Event stream fanned out to observers.
//!
//! Delivery is best-effort: the channel is bounded, a slow subscriber loses the
//! oldest events (and is told how many), and producers never block.

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use crate::progress::ProgressStats;
use crate::task::{TaskId, TaskRecord};

#[derive(Debug, Clone)]
pub enum TaskEvent {
    /// Byte counts changed. `bytes_done` never decreases within a run.
    Progress { id: TaskId, stats: ProgressStats },
    /// Snapshot taken right after a status transition.
    Status { record: TaskRecord },
    /// The worker dropped its reference and cleaned up; last event of a run.
    Released { id: TaskId },
}

impl TaskEvent {
    pub fn id(&self) -> &TaskId {
        match self {
            TaskEvent::Progress { id, .. } | TaskEvent::Released { id } => id,
            TaskEvent::Status { record } => &record.id,
        }
    }
}

/// Events for a single task, filtered out of the shared stream.
pub struct TaskSubscription {
    id: String,
    rx: broadcast::Receiver<TaskEvent>,
}

impl TaskSubscription {
    pub(crate) fn new(id: &str, rx: broadcast::Receiver<TaskEvent>) -> Self {
        Self {
            id: id.trim().to_string(),
            rx,
        }
    }

    fn matches(&self, event: &TaskEvent) -> bool {
        event.id().as_str() == self.id
    }

    /// Next event for this task; None once the coordinator is gone.
    pub async fn recv(&mut self) -> Option<TaskEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.matches(&event) => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(id = %self.id, missed, "subscriber lagged; events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Blocking variant of `recv` for non-async callers. Must not be called
    /// from inside an async runtime.
    pub fn blocking_recv(&mut self) -> Option<TaskEvent> {
        loop {
            match self.rx.blocking_recv() {
                Ok(event) if self.matches(&event) => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(id = %self.id, missed, "subscriber lagged; events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next buffered event for this task without waiting.
    pub fn try_recv(&mut self) -> Option<TaskEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if self.matches(&event) => return Some(event),
                Ok(_) => {}
                Err(TryRecvError::Lagged(missed)) => {
                    tracing::warn!(id = %self.id, missed, "subscriber lagged; events dropped");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}
