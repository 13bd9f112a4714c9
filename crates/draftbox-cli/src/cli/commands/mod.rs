//! CLI command handlers, one file per command.

mod get;
mod history;
mod open;
mod remove;

pub use get::run_get;
pub use history::{run_history, run_search};
pub use open::run_open;
pub use remove::run_remove;
