//! Small filesystem helpers shared by config, loader, and hooks.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

#[cfg(test)]
mod tests;

pub fn ensure_dir(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    std::fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))?;
    Ok(path.to_path_buf())
}

/// Write content atomically via tempfile + rename, so a crash mid-write
/// never leaves a partially-written file in place.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path.parent().context("path has no parent directory")?;
    std::fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
    tmp.write_all(content)
        .context("failed to write temp file contents")?;
    tmp.as_file().sync_all().context("failed to sync temp file")?;
    tmp.persist(path)
        .map_err(|e| anyhow::anyhow!("failed to persist {}: {}", path.display(), e.error))?;
    Ok(())
}

/// Expand a leading `~` or `~/...` against the user's home directory.
/// Paths without a leading `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// A deterministic `{prefix}_{tool_name}_{YYYYMMDD_HHMMSS}.{ext}` filename,
/// as used by `FileSaveHook` (§4.8).
pub fn timestamped_filename(prefix: &str, tool_name: &str, timestamp: chrono::DateTime<chrono::Utc>, ext: &str) -> String {
    format!(
        "{prefix}_{}_{}.{ext}",
        safe_filename(tool_name),
        timestamp.format("%Y%m%d_%H%M%S")
    )
}

pub fn safe_filename(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '\0')
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ' ' => '_',
            _ => c,
        })
        .collect()
}
