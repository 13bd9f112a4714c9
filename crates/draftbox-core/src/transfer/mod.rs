//! Transfer worker: one streamed HTTP GET into a part file.
//!
//! `fetch` runs on the worker's own thread and blocks for the whole transfer.
//! It honours pause/cancel from a `TransferControl` and reports byte counts
//! through a `ProgressSink` at a bounded cadence. It never touches the task
//! record; the coordinator decides what a result means.

mod error;
mod headers;
mod worker;

pub use error::{classify_curl_error, TransferError};
pub use headers::ResponseHeaders;
pub use worker::fetch;

use std::path::PathBuf;
use std::time::Duration;

use crate::config::TransferConfig;
use crate::storage::PartFile;

/// HTTP client settings applied to every transfer.
#[derive(Debug, Clone)]
pub struct TransferOptions {
    pub connect_timeout: Duration,
    /// Whole-transfer limit. Includes time spent paused.
    pub timeout: Option<Duration>,
    pub buffer_size: Option<usize>,
    pub max_recv_speed: Option<u64>,
    pub user_agent: String,
    /// Minimum spacing between progress reports.
    pub progress_interval: Duration,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            timeout: None,
            buffer_size: None,
            max_recv_speed: None,
            user_agent: default_user_agent(),
            progress_interval: Duration::from_millis(250),
        }
    }
}

impl TransferOptions {
    pub fn from_config(cfg: Option<&TransferConfig>, progress_interval: Duration) -> Self {
        let defaults = Self::default();
        let Some(cfg) = cfg else {
            return Self {
                progress_interval,
                ..defaults
            };
        };
        Self {
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            timeout: cfg.timeout_secs.map(Duration::from_secs),
            buffer_size: cfg.buffer_size,
            max_recv_speed: cfg.max_bytes_per_sec,
            user_agent: cfg.user_agent.clone().unwrap_or(defaults.user_agent),
            progress_interval,
        }
    }
}

pub fn default_user_agent() -> String {
    format!("draftbox/{}", env!("CARGO_PKG_VERSION"))
}

/// One transfer: where to fetch from and which part file to stream into.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub url: String,
    pub part_path: PathBuf,
    pub options: TransferOptions,
}

/// Receives progress from a running transfer. Called on the worker thread.
pub trait ProgressSink {
    /// Response headers arrived; `bytes_total` is the announced length, if any.
    fn on_headers(&self, bytes_total: Option<u64>);
    /// Total bytes written to the part file so far.
    fn on_progress(&self, bytes_done: u64);
}

/// A fully received archive, still under its part-file name.
pub struct FetchedArchive {
    pub part: PartFile,
    pub bytes: u64,
    pub content_disposition: Option<String>,
}

impl std::fmt::Debug for FetchedArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchedArchive")
            .field("part", &self.part.temp_path())
            .field("bytes", &self.bytes)
            .field("content_disposition", &self.content_disposition)
            .finish()
    }
}
