//! Command-line surface (§6), grounded on `cli/commands/mod.rs`'s
//! `clap::Parser`/`Subcommand` shape.

mod serve;

use crate::builtin;
use crate::cache::{CacheManager, PersistentCache};
use crate::config::loader::load_config;
use crate::engine::Engine;
use crate::hooks::HookManager;
use crate::loader::{LoadFilters, Loader};
use crate::registry::Registry;
use crate::tool::ToolConfig;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "tool-engine")]
#[command(about = "Tool dispatch and integration engine")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Path to a TOML config file. Defaults to ~/.tool-engine/config.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the tool catalog over HTTP (§4.9 transports).
    ServeHttp {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        hooks: bool,
        #[arg(long)]
        hook_config: Option<PathBuf>,
        #[arg(long = "tool-category")]
        tool_category: Vec<String>,
        #[arg(long = "include-tools")]
        include_tools: Vec<String>,
        #[arg(long = "exclude-tools")]
        exclude_tools: Vec<String>,
        #[arg(long = "exclude-categories")]
        exclude_categories: Vec<String>,
        #[arg(long)]
        max_workers: Option<usize>,
    },
    /// Serve the tool catalog over stdio (§4.9 transports).
    ServeStdio {
        #[arg(long)]
        hooks: bool,
        #[arg(long)]
        hook_config: Option<PathBuf>,
        #[arg(long = "tool-category")]
        tool_category: Vec<String>,
    },
    /// Cache inspection and maintenance.
    Cache {
        #[command(subcommand)]
        cmd: CacheCommands,
    },
    /// Registry inspection.
    Registry {
        #[command(subcommand)]
        cmd: RegistryCommands,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Print memory + persistent cache statistics.
    Stats,
    /// Clear the cache, optionally scoped to one namespace.
    Clear {
        #[arg(long)]
        namespace: Option<String>,
    },
}

#[derive(Subcommand)]
enum RegistryCommands {
    /// Print how many tool types are available vs. marked unavailable.
    Health,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::ServeHttp {
            host,
            port,
            hooks,
            hook_config,
            tool_category,
            include_tools,
            exclude_tools,
            exclude_categories,
            max_workers,
        } => {
            let filters = LoadFilters {
                include_tools,
                tools_file: None,
                tool_categories: tool_category,
                exclude_tools,
                exclude_categories,
                exclude_tool_types: Vec::new(),
            };
            serve::serve_http(
                &config,
                host.unwrap_or(config.server.host.clone()),
                port.unwrap_or(config.server.port),
                hooks,
                hook_config,
                filters,
                max_workers.unwrap_or(config.server.max_workers),
            )
            .await?;
        }
        Commands::ServeStdio { hooks, hook_config, tool_category } => {
            let filters = LoadFilters {
                include_tools: Vec::new(),
                tools_file: None,
                tool_categories: tool_category,
                exclude_tools: Vec::new(),
                exclude_categories: Vec::new(),
                exclude_tool_types: Vec::new(),
            };
            serve::serve_stdio(&config, hooks, hook_config, filters).await?;
        }
        Commands::Cache { cmd } => cache_command(&config, cmd)?,
        Commands::Registry { cmd } => registry_command(&config, cmd)?,
    }

    Ok(())
}

fn cache_command(config: &crate::config::Config, cmd: CacheCommands) -> Result<()> {
    let persistent = Arc::new(open_persistent_cache(config)?);
    let manager = CacheManager::with_config(config.cache.manager_config(), config.cache.memory_size, persistent);
    match cmd {
        CacheCommands::Stats => {
            let stats = manager.stats()?;
            println!(
                "{{\"enabled\": {}, \"memory\": {{\"max_size\": {}, \"current_size\": {}, \"hits\": {}, \"misses\": {}}}, \"persistent\": {{\"entry_count\": {}, \"total_hit_count\": {}}}, \"async_persist\": {}, \"pending_writes\": {}}}",
                stats.enabled,
                stats.memory.max_size,
                stats.memory.current_size,
                stats.memory.hits,
                stats.memory.misses,
                stats.persistent.entry_count,
                stats.persistent.total_hit_count,
                stats.async_persist,
                stats.pending_writes,
            );
        }
        CacheCommands::Clear { namespace } => {
            manager.clear(namespace.as_deref());
            match namespace {
                Some(ns) => println!("cleared cache namespace '{ns}'"),
                None => println!("cleared entire cache"),
            }
        }
    }
    Ok(())
}

fn registry_command(config: &crate::config::Config, cmd: RegistryCommands) -> Result<()> {
    match cmd {
        RegistryCommands::Health => {
            let (engine, configs) = build_engine(config, LoadFilters::default())?;
            for tool_config in &configs {
                // Touch every tool once so construction failures are recorded
                // before we report registry health.
                engine.ensure_constructed(tool_config);
            }
            let health = engine.registry_health();
            println!(
                "{{\"total\": {}, \"available\": {}, \"unavailable\": {}}}",
                health.total, health.available, health.unavailable
            );
        }
    }
    Ok(())
}

fn load_tool_configs(config: &crate::config::Config, filters: &LoadFilters) -> Result<(Vec<ToolConfig>, Vec<ToolConfig>, crate::loader::LoadReport)> {
    let categories: HashMap<String, PathBuf> = config
        .loader
        .categories
        .iter()
        .map(|(name, path)| (name.clone(), PathBuf::from(path)))
        .collect();
    Loader::load(&categories, filters).map_err(Into::into)
}

pub(crate) fn build_engine(config: &crate::config::Config, filters: LoadFilters) -> Result<(Arc<Engine>, Vec<ToolConfig>)> {
    let registry = Arc::new(Registry::new());
    let catalog = Arc::new(RwLock::new(Vec::<ToolConfig>::new()));
    builtin::register_builtins(&registry, catalog.clone());

    let (mut configs, auto_loaders, report) = load_tool_configs(config, &filters)?;
    if !auto_loaders.is_empty() {
        warn!("{} auto-loader entries found; auto-discovery is not wired into this build", auto_loaders.len());
    }
    if report.excluded_count > 0 || report.duplicates_dropped > 0 {
        info!("loader: {} excluded, {} duplicates dropped", report.excluded_count, report.duplicates_dropped);
    }
    for (name, missing) in &report.missing_api_keys {
        warn!("tool '{name}' missing API keys: {:?}", missing);
    }
    if !report.missing_api_keys.is_empty() {
        let template_path = crate::config::loader::default_config_path()
            .parent()
            .map(|dir| dir.join(".env.template"))
            .unwrap_or_else(|| PathBuf::from(".env.template"));
        match crate::loader::write_missing_keys_template(&report, &template_path) {
            Ok(()) => info!("wrote missing API key template to {}", template_path.display()),
            Err(e) => warn!("failed to write missing API key template at {}: {e}", template_path.display()),
        }
    }

    let mut seen: HashSet<String> = configs.iter().map(|c| c.name.clone()).collect();
    for builtin_config in builtin::builtin_configs() {
        if seen.insert(builtin_config.name.clone()) {
            configs.push(builtin_config);
        }
    }
    *catalog.write().expect("tool catalog lock poisoned") = configs.clone();

    let persistent = Arc::new(open_persistent_cache(config)?);
    let cache = Arc::new(CacheManager::with_config(config.cache.manager_config(), config.cache.memory_size, persistent));
    let hooks = Arc::new(HookManager::new(Vec::new(), HashSet::new()));

    let engine = Arc::new(Engine::new(registry, cache, hooks, configs.clone()));
    Ok((engine, configs))
}

/// Skips touching the on-disk database entirely when persistence is
/// disabled, rather than opening a file the cache will never read or write.
fn open_persistent_cache(config: &crate::config::Config) -> Result<PersistentCache> {
    if config.cache.persist {
        PersistentCache::open(config.cache.resolved_path())
    } else {
        PersistentCache::open_in_memory()
    }
}
