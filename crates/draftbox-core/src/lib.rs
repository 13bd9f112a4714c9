pub mod archive_name;
pub mod config;
pub mod control;
pub mod coordinator;
pub mod history;
pub mod logging;
pub mod opener;
pub mod progress;
pub mod source;
pub mod storage;
pub mod task;
pub mod transfer;

pub use coordinator::{
    CoordinatorError, CoordinatorOptions, DownloadCoordinator, StartOutcome, TaskEvent,
    TaskSubscription,
};
pub use task::{FailureKind, TaskFailure, TaskId, TaskRecord, TaskStatus};
