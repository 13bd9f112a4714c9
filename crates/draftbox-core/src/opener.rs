//! Reveal a downloaded draft in the platform file manager.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// File-manager launcher for the current platform.
pub fn opener_program() -> &'static str {
    #[cfg(target_os = "macos")]
    {
        "open"
    }
    #[cfg(target_os = "windows")]
    {
        "explorer"
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        "xdg-open"
    }
}

/// Directory to show for `path`: the path itself if it is a directory,
/// otherwise its parent (a finished archive lives inside its destination).
pub fn folder_for(path: &Path) -> Result<PathBuf> {
    if path.is_dir() {
        return Ok(path.to_path_buf());
    }
    match path.parent() {
        Some(parent) if path.is_file() && parent.is_dir() => Ok(parent.to_path_buf()),
        _ => bail!("{} is not an existing folder", path.display()),
    }
}

/// Opens the folder containing `path` without waiting for the file manager to exit.
pub fn open_folder(path: &Path) -> Result<()> {
    let folder = folder_for(path)?;
    let program = opener_program();
    tracing::debug!(program, folder = %folder.display(), "opening folder");
    Command::new(program)
        .arg(&folder)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to run {program} for {}", folder.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_for_directory_and_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(folder_for(dir.path()).unwrap(), dir.path());

        let archive = dir.path().join("draft.zip");
        std::fs::write(&archive, b"PK").unwrap();
        assert_eq!(folder_for(&archive).unwrap(), dir.path());
    }

    #[test]
    fn folder_for_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = folder_for(&dir.path().join("gone")).unwrap_err();
        assert!(err.to_string().contains("not an existing folder"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn linux_uses_xdg_open() {
        assert_eq!(opener_program(), "xdg-open");
    }
}
