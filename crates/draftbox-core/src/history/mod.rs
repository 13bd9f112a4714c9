//! Draft history (SQLite via sqlx).
//!
//! Stores the terminal record of every download run: id, destination,
//! archive path, status, sizes, error and timestamps. The coordinator never
//! reads it back; it is a sink fed by `spawn_recorder`.

mod db;
mod read;
mod recorder;
mod types;
mod write;

pub use db::HistoryDb;
pub use recorder::spawn_recorder;
pub use types::{DraftEntry, DraftQuery};
