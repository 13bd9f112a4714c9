//! CLI for the draftbox download manager.

mod commands;
mod control;

use anyhow::Result;
use clap::{Parser, Subcommand};
use draftbox_core::config;
use draftbox_core::history::HistoryDb;
use std::path::PathBuf;

use commands::{run_get, run_history, run_open, run_remove, run_search};

/// Top-level CLI for the draftbox download manager.
#[derive(Debug, Parser)]
#[command(name = "draftbox")]
#[command(about = "draftbox: download draft archives into local folders", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download one or more drafts. While running, stdin accepts
    /// `pause <id>`, `resume <id>`, `cancel <id>`, `start <id>` and `status`.
    Get {
        /// Draft identifiers.
        #[arg(required = true, value_name = "ID")]
        ids: Vec<String>,
        /// Destination folder (default: `download_dir` from config, else the current directory).
        #[arg(long, value_name = "DIR")]
        dest: Option<PathBuf>,
    },

    /// List finished downloads, newest first.
    History {
        /// Only show this status (completed, failed, cancelled).
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "20")]
        page_size: u32,
    },

    /// Search history by draft id or path.
    Search {
        keyword: String,
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "20")]
        page_size: u32,
    },

    /// Open the folder holding a downloaded draft.
    Open {
        /// Draft identifier.
        id: String,
    },

    /// Remove a draft from history (and optionally its archive).
    Remove {
        /// Draft identifier.
        id: String,
        /// Also delete the downloaded archive.
        #[arg(long)]
        delete_files: bool,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let db = HistoryDb::open_default().await?;

        match cli.command {
            CliCommand::Get { ids, dest } => {
                let dest = match dest.or_else(|| cfg.download_dir.clone()) {
                    Some(dir) => dir,
                    None => std::env::current_dir()?,
                };
                run_get(&cfg, &db, &ids, &dest).await?;
            }
            CliCommand::History {
                status,
                page,
                page_size,
            } => run_history(&db, status.as_deref(), page, page_size).await?,
            CliCommand::Search {
                keyword,
                page,
                page_size,
            } => run_search(&db, &keyword, page, page_size).await?,
            CliCommand::Open { id } => run_open(&db, &id).await?,
            CliCommand::Remove { id, delete_files } => run_remove(&db, &id, delete_files).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
