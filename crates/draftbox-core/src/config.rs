use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// HTTP client settings (optional `[transfer]` section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Seconds allowed for establishing the connection.
    pub connect_timeout_secs: u64,
    /// Whole-transfer limit in seconds, including time spent paused (None = unlimited).
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Curl receive buffer size in bytes (None = library default).
    #[serde(default)]
    pub buffer_size: Option<usize>,
    /// Per-transfer receive cap in bytes per second (None = no cap).
    #[serde(default)]
    pub max_bytes_per_sec: Option<u64>,
    /// User-Agent header (None = `draftbox/<version>`).
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            timeout_secs: None,
            buffer_size: None,
            max_bytes_per_sec: None,
            user_agent: None,
        }
    }
}

/// Global configuration loaded from `~/.config/draftbox/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftboxConfig {
    /// Archive URL for a draft; `{id}` is replaced by the draft identifier.
    pub archive_url_template: String,
    /// Parent directory for downloads (None = current directory).
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    /// Minimum milliseconds between progress events per task.
    pub progress_interval_ms: u64,
    /// Events buffered per subscriber before the slowest one starts losing them.
    pub event_capacity: usize,
    /// Optional HTTP client section; if missing, built-in defaults are used.
    #[serde(default)]
    pub transfer: Option<TransferConfig>,
}

impl Default for DraftboxConfig {
    fn default() -> Self {
        Self {
            archive_url_template: "https://api.example.com/drafts/{id}/archive".to_string(),
            download_dir: None,
            progress_interval_ms: 250,
            event_capacity: 1024,
            transfer: None,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("draftbox")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// `~/.local/state/draftbox`: log file and draft history database.
pub fn state_dir() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("draftbox")?;
    Ok(xdg_dirs.get_state_home())
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<DraftboxConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = DraftboxConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: DraftboxConfig = toml::from_str(&data)?;
    Ok(cfg)
}
