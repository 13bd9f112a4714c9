//! Transfer error type and its classification into failure kinds.

use crate::task::{FailureKind, TaskFailure};

/// Error returned by one archive transfer.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// Stopped by a cancel request. Not a failure.
    #[error("cancelled by user")]
    Cancelled,
    /// Curl reported an error (timeout, connection, TLS, etc.).
    #[error("{0}")]
    Curl(#[source] curl::Error),
    /// Non-2xx HTTP response.
    #[error("HTTP {0}")]
    Http(u32),
    /// Body ended before the announced Content-Length.
    #[error("incomplete transfer: expected {expected} bytes, got {received}")]
    Incomplete { expected: u64, received: u64 },
    /// Creating, writing, syncing or renaming the part file failed.
    #[error("storage: {0}")]
    Storage(#[source] std::io::Error),
}

impl TransferError {
    /// Failure kind recorded on the task, or None for a cancellation.
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            TransferError::Cancelled => None,
            TransferError::Curl(e) => Some(classify_curl_error(e)),
            TransferError::Http(_) => Some(FailureKind::Server),
            TransferError::Incomplete { .. } => Some(FailureKind::Network),
            TransferError::Storage(_) => Some(FailureKind::Disk),
        }
    }

    pub fn to_failure(&self) -> Option<TaskFailure> {
        self.kind().map(|kind| TaskFailure {
            kind,
            message: self.to_string(),
        })
    }
}

/// Curl errors are network failures unless the write callback refused the data.
pub fn classify_curl_error(e: &curl::Error) -> FailureKind {
    if e.is_write_error() {
        return FailureKind::Disk;
    }
    if e.is_http_returned_error() {
        return FailureKind::Server;
    }
    FailureKind::Network
}
