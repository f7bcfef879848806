//! TOML-backed configuration (§6): one file with `[cache]`, `[server]`,
//! `[hooks]`, and `[loader]` sections, each overridable by a `TOOLUNIVERSE_*`
//! environment variable. Structured like `config/schema/mod.rs` — one struct
//! per section, `#[serde(default = "...")]` per field, a matching
//! `impl Default`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

pub mod loader;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub hooks: HooksSection,
    #[serde(default)]
    pub loader: LoaderSection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheSection::default(),
            server: ServerSection::default(),
            hooks: HooksSection::default(),
            loader: LoaderSection::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_memory_size")]
    pub memory_size: usize,
    /// Seconds; 0 means no default TTL (entries never expire unless a tool
    /// sets its own `cache_ttl`).
    #[serde(default)]
    pub default_ttl_secs: u64,
    #[serde(default = "default_true")]
    pub persist: bool,
    #[serde(default = "default_cache_path")]
    pub path: String,
    #[serde(default = "default_true")]
    pub async_persist: bool,
    #[serde(default = "default_async_queue_size")]
    pub async_queue_size: usize,
    #[serde(default = "default_true")]
    pub singleflight: bool,
}

fn default_memory_size() -> usize {
    256
}

fn default_cache_path() -> String {
    "~/.tool-engine/cache.sqlite".to_string()
}

fn default_async_queue_size() -> usize {
    10_000
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: true,
            memory_size: default_memory_size(),
            default_ttl_secs: 0,
            persist: true,
            path: default_cache_path(),
            async_persist: true,
            async_queue_size: default_async_queue_size(),
            singleflight: true,
        }
    }
}

impl CacheSection {
    pub fn resolved_path(&self) -> PathBuf {
        crate::utils::expand_home(&self.path)
    }

    pub fn manager_config(&self) -> crate::cache::CacheManagerConfig {
        crate::cache::CacheManagerConfig {
            enabled: self.enabled,
            persist: self.persist,
            async_persist: self.async_persist,
            singleflight: self.singleflight,
            default_ttl_secs: self.default_ttl_secs,
            async_queue_size: self.async_queue_size,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8790
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

fn default_max_workers() -> usize {
    8
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_workers: default_max_workers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HooksSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_hook_config_path")]
    pub config_path: String,
}

fn default_hook_config_path() -> String {
    "hooks.json".to_string()
}

impl Default for HooksSection {
    fn default() -> Self {
        Self {
            enabled: true,
            config_path: default_hook_config_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoaderSection {
    #[serde(default)]
    pub categories: HashMap<String, String>,
}

impl Config {
    /// Applies `TOOLUNIVERSE_*` overrides on top of whatever was loaded from
    /// the TOML file (or the defaults, if there was none), mirroring
    /// `config/credentials::apply_env_overrides`'s env-wins-over-file chain.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("TOOLUNIVERSE_CACHE_ENABLED") {
            self.cache.enabled = parse_bool(&v, self.cache.enabled);
        }
        if let Ok(v) = std::env::var("TOOLUNIVERSE_CACHE_MEMORY_SIZE") {
            if let Ok(n) = v.parse() {
                self.cache.memory_size = n;
            }
        }
        if let Ok(v) = std::env::var("TOOLUNIVERSE_CACHE_DEFAULT_TTL_SECS") {
            if let Ok(n) = v.parse() {
                self.cache.default_ttl_secs = n;
            }
        }
        if let Ok(v) = std::env::var("TOOLUNIVERSE_CACHE_PERSIST") {
            self.cache.persist = parse_bool(&v, self.cache.persist);
        }
        if let Ok(v) = std::env::var("TOOLUNIVERSE_CACHE_PATH") {
            self.cache.path = v;
        }
        if let Ok(v) = std::env::var("TOOLUNIVERSE_SERVER_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = std::env::var("TOOLUNIVERSE_SERVER_PORT") {
            if let Ok(p) = v.parse() {
                self.server.port = p;
            }
        }
        if let Ok(v) = std::env::var("TOOLUNIVERSE_SERVER_MAX_WORKERS") {
            if let Ok(n) = v.parse() {
                self.server.max_workers = n;
            }
        }
        if let Ok(v) = std::env::var("TOOLUNIVERSE_HOOKS_ENABLED") {
            self.hooks.enabled = parse_bool(&v, self.hooks.enabled);
        }
        if let Ok(v) = std::env::var("TOOLUNIVERSE_HOOKS_CONFIG_PATH") {
            self.hooks.config_path = v;
        }
    }
}

fn parse_bool(raw: &str, fallback: bool) -> bool {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert!(config.cache.enabled);
        assert_eq!(config.cache.memory_size, 256);
        assert_eq!(config.cache.default_ttl_secs, 0);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8790);
    }

    #[test]
    fn toml_round_trips_through_sections() {
        let toml_text = r#"
            [cache]
            enabled = true
            memory_size = 64

            [server]
            host = "0.0.0.0"
            port = 9000

            [hooks]
            enabled = false

            [loader]
            categories = { builtin = "tools/builtin.json" }
        "#;
        let config: Config = toml::from_str(toml_text).unwrap();
        assert_eq!(config.cache.memory_size, 64);
        assert_eq!(config.server.port, 9000);
        assert!(!config.hooks.enabled);
        assert_eq!(config.loader.categories.get("builtin").unwrap(), "tools/builtin.json");
    }

    #[test]
    fn env_override_wins_over_file_value() {
        let mut config = Config::default();
        // SAFETY: test-local env var, no other test reads it concurrently.
        unsafe { std::env::set_var("TOOLUNIVERSE_SERVER_PORT", "1234") };
        config.apply_env_overrides();
        unsafe { std::env::remove_var("TOOLUNIVERSE_SERVER_PORT") };
        assert_eq!(config.server.port, 1234);
    }
}
