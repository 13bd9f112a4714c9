//! Connection setup and schema.

use anyhow::{Context, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::path::Path;

use crate::config::state_dir;

const DB_FILE: &str = "drafts.db";

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let mut uri = String::from("sqlite://");
    for c in path.to_string_lossy().chars() {
        match c {
            '%' | ' ' | '#' | '?' | '&' => uri.push_str(&format!("%{:02X}", c as u32)),
            c => uri.push(c),
        }
    }
    uri
}

/// Handle to the draft history database at `~/.local/state/draftbox/drafts.db`.
#[derive(Clone)]
pub struct HistoryDb {
    pub(crate) pool: Pool<Sqlite>,
}

impl HistoryDb {
    /// Open (or create) the default history database and run migrations.
    pub async fn open_default() -> Result<Self> {
        let path = state_dir()?.join(DB_FILE);
        Self::open_at(path).await
    }

    /// Open (or create) the database at a specific path. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&uri)
            .await
            .with_context(|| format!("failed to open history db {}", path.display()))?;
        let db = HistoryDb { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// In-memory database (single connection, so every query sees the same data).
    pub async fn open_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let db = HistoryDb { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS drafts (
                id TEXT PRIMARY KEY,
                destination TEXT NOT NULL,
                archive_path TEXT,
                status TEXT NOT NULL,
                bytes_total INTEGER,
                bytes_done INTEGER NOT NULL DEFAULT 0,
                error_kind TEXT,
                error_message TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_drafts_status ON drafts(status);")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
