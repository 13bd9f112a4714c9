//! Disk side of a transfer: the part file and its lifecycle.
//!
//! A worker streams into a hidden `.part` file in the destination directory.
//! On success it is synced and renamed to the archive name; otherwise it is
//! removed, so a cancelled or failed task leaves nothing behind.

mod writer;

pub use writer::PartFile;

use std::path::{Path, PathBuf};

use crate::task::TaskId;

/// Temporary file suffix used before the final rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Part file path for one run of a task, e.g. `dest/.abc-123.2.part`.
///
/// The run number keeps a restarted task from sharing a file with a previous
/// run that is still cleaning up.
pub fn part_path(destination: &Path, id: &TaskId, run: u64) -> PathBuf {
    destination.join(format!(".{}.{}{}", id, run, TEMP_SUFFIX))
}
