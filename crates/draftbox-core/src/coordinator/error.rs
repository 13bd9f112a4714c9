use crate::source::SourceError;
use crate::task::{InvalidTaskId, TaskId, TaskStatus};

/// Synchronous errors from coordinator operations. None of them has side effects.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("unknown draft identifier {0:?}")]
    UnknownIdentifier(String),
    #[error(transparent)]
    InvalidIdentifier(#[from] InvalidTaskId),
    #[error("cannot {action} draft {id}: task is {status}")]
    InvalidState {
        id: TaskId,
        status: TaskStatus,
        action: &'static str,
    },
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("failed to spawn transfer worker: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("download coordinator has been shut down")]
    ShutDown,
}
