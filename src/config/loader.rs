//! Reads and writes the TOML config file, grounded on
//! `config/loader/mod.rs`'s shared-lock-then-parse / separate-lockfile-write
//! pattern (adapted from JSON to TOML).

use crate::config::Config;
use crate::errors::{EngineError, Result};
use crate::utils::{atomic_write, ensure_dir, expand_home};
use fs2::FileExt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub fn default_config_path() -> PathBuf {
    expand_home("~/.tool-engine/config.toml")
}

/// Loads the config file if it exists; otherwise returns `Config::default()`.
/// Either way, `TOOLUNIVERSE_*` environment variables are applied afterward.
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let default_path = default_config_path();
    let path = config_path.unwrap_or(default_path.as_path());

    let mut config = if path.exists() {
        let file = fs::File::open(path).map_err(EngineError::Io)?;
        file.lock_shared()
            .map_err(|e| EngineError::Config(format!("failed to lock {}: {e}", path.display())))?;
        let content = fs::read_to_string(path).map_err(EngineError::Io)?;
        let _ = file.unlock();

        check_file_permissions(path);

        toml::from_str(&content).map_err(|e| EngineError::Config(format!("invalid config at {}: {e}", path.display())))?
    } else {
        Config::default()
    };

    config.apply_env_overrides();
    Ok(config)
}

pub fn save_config(config: &Config, config_path: Option<&Path>) -> Result<()> {
    let default_path = default_config_path();
    let path = config_path.unwrap_or(default_path.as_path());
    let parent = path
        .parent()
        .ok_or_else(|| EngineError::Config("config path has no parent directory".to_string()))?;
    ensure_dir(parent)?;

    let lock_path = path.with_extension("toml.lock");
    let lock_file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&lock_path)
        .map_err(EngineError::Io)?;
    lock_file
        .lock_exclusive()
        .map_err(|e| EngineError::Config(format!("failed to lock {}: {e}", lock_path.display())))?;

    let content = toml::to_string_pretty(config).map_err(|e| EngineError::Config(format!("failed to serialize config: {e}")))?;
    atomic_write(path, content.as_bytes()).map_err(EngineError::Internal)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }

    Ok(())
}

#[cfg(unix)]
fn check_file_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(meta) = fs::metadata(path) {
        let mode = meta.permissions().mode();
        if mode & 0o077 != 0 {
            warn!("config file {} has permissions {:o} — recommend 0600", path.display(), mode & 0o777);
        }
    }
}

#[cfg(not(unix))]
fn check_file_permissions(_path: &Path) {}
