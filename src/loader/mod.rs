//! Reads tool configs from category files, applies include/exclude filters
//! and API-key gating, and deduplicates the result (§4.5).

use crate::errors::{EngineError, Result};
use crate::tool::ToolConfig;
use fs2::FileExt;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::warn;

#[cfg(test)]
mod tests;

/// Type tag recognized as an MCP auto-loader entry (§4.5 step 6):
/// the loader runs its discovery instead of treating it as a regular tool.
pub const AUTO_LOADER_TYPE_TAG: &str = "MCPAutoLoaderTool";

#[derive(Debug, Clone, Default)]
pub struct LoadFilters {
    pub include_tools: Vec<String>,
    pub tools_file: Option<PathBuf>,
    pub tool_categories: Vec<String>,
    pub exclude_tools: Vec<String>,
    pub exclude_categories: Vec<String>,
    pub exclude_tool_types: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub excluded_count: usize,
    pub duplicates_dropped: usize,
    pub requested_but_missing: Vec<String>,
    /// tool name -> missing required/optional API keys, for the generated
    /// "missing keys" template file.
    pub missing_api_keys: HashMap<String, Vec<String>>,
}

/// Discovers and merges additional `ToolConfig`s for an `MCPAutoLoaderTool`
/// entry found during loading (§4.5 step 6). Implementations reach an
/// external MCP server; the core framework only defines the contract.
#[async_trait::async_trait]
pub trait AutoLoaderDiscovery: Send + Sync {
    async fn discover(&self, entry: &ToolConfig) -> anyhow::Result<Vec<ToolConfig>>;
}

pub struct Loader;

impl Loader {
    /// Read every category file, apply inclusion then exclusion filters,
    /// gate on API-key availability, and deduplicate by name (first
    /// occurrence wins). Auto-loader entries are returned separately so the
    /// caller can run async discovery (`merge_auto_loaded`) afterward.
    pub fn load(
        categories: &HashMap<String, PathBuf>,
        filters: &LoadFilters,
    ) -> Result<(Vec<ToolConfig>, Vec<ToolConfig>, LoadReport)> {
        let mut candidates: Vec<(String, ToolConfig)> = Vec::new();

        for (category, path) in categories {
            match read_category_file(path) {
                Ok(configs) => {
                    for config in configs {
                        candidates.push((category.clone(), config));
                    }
                }
                Err(e) => {
                    warn!("loader: skipping category '{category}' ({}): {e}", path.display());
                }
            }
        }

        let mut report = LoadReport::default();
        let include_set: HashSet<&str> = filters.include_tools.iter().map(String::as_str).collect();
        let tools_file_set: Option<HashSet<String>> = match &filters.tools_file {
            Some(path) => Some(read_name_list(path).unwrap_or_default()),
            None => None,
        };
        let category_set: HashSet<&str> = filters.tool_categories.iter().map(String::as_str).collect();
        let exclude_tools: HashSet<&str> = filters.exclude_tools.iter().map(String::as_str).collect();
        let exclude_categories: HashSet<&str> = filters.exclude_categories.iter().map(String::as_str).collect();
        let exclude_types: HashSet<&str> = filters.exclude_tool_types.iter().map(String::as_str).collect();

        let mut auto_loaders = Vec::new();
        let mut seen = HashSet::new();
        let mut result = Vec::new();

        for (category, config) in candidates {
            if config.type_tag == AUTO_LOADER_TYPE_TAG {
                auto_loaders.push(config);
                continue;
            }

            let included = if !include_set.is_empty() {
                include_set.contains(config.name.as_str())
            } else if let Some(names) = &tools_file_set {
                names.contains(&config.name)
            } else if !category_set.is_empty() {
                category_set.contains(category.as_str())
            } else {
                true
            };

            if !included {
                report.excluded_count += 1;
                continue;
            }

            if exclude_tools.contains(config.name.as_str())
                || exclude_categories.contains(category.as_str())
                || exclude_types.contains(config.type_tag.as_str())
            {
                report.excluded_count += 1;
                continue;
            }

            if !api_keys_satisfied(&config, &mut report) {
                continue;
            }

            if !seen.insert(config.name.clone()) {
                report.duplicates_dropped += 1;
                continue;
            }

            let mut config = config;
            if config.category.is_empty() {
                config.category = category.clone();
            }
            result.push(config);
        }

        if !include_set.is_empty() {
            let found: HashSet<&str> = result.iter().map(|c| c.name.as_str()).collect();
            report.requested_but_missing = include_set
                .into_iter()
                .filter(|name| !found.contains(name))
                .map(str::to_string)
                .collect();
        }

        Ok((result, auto_loaders, report))
    }

    /// Run discovery for every auto-loader entry and append the discovered
    /// configs (deduplicated against `existing`) to the result set.
    pub async fn merge_auto_loaded(
        existing: &mut Vec<ToolConfig>,
        auto_loaders: &[ToolConfig],
        discovery: &dyn AutoLoaderDiscovery,
    ) {
        let mut seen: HashSet<String> = existing.iter().map(|c| c.name.clone()).collect();
        for entry in auto_loaders {
            match discovery.discover(entry).await {
                Ok(discovered) => {
                    for config in discovered {
                        if seen.insert(config.name.clone()) {
                            existing.push(config);
                        }
                    }
                }
                Err(e) => {
                    warn!("loader: auto-loader '{}' discovery failed: {e}", entry.name);
                }
            }
        }
    }
}

/// Writes a `.env`-style template listing every distinct missing API key
/// across `report.missing_api_keys`, mirroring the reference harness'
/// `generate_env_template`. A no-op when nothing is missing.
pub fn write_missing_keys_template(report: &LoadReport, path: &Path) -> Result<()> {
    let keys: BTreeSet<&str> = report
        .missing_api_keys
        .values()
        .flat_map(|missing| missing.iter().map(String::as_str))
        .collect();
    if keys.is_empty() {
        return Ok(());
    }

    let mut content = String::from("# API Keys for tool-engine\n# Copy this file to .env and fill in your actual API keys\n\n");
    for key in keys {
        content.push_str(&format!("{key}=your_api_key_here\n\n"));
    }
    crate::utils::atomic_write(path, content.as_bytes()).map_err(EngineError::Internal)
}

fn api_keys_satisfied(config: &ToolConfig, report: &mut LoadReport) -> bool {
    let mut missing = Vec::new();
    for key in &config.required_api_keys {
        if std::env::var(key).is_err() {
            missing.push(key.clone());
        }
    }
    let has_optional = config.optional_api_keys.is_empty()
        || config
            .optional_api_keys
            .iter()
            .any(|key| std::env::var(key).is_ok());

    if !missing.is_empty() || !has_optional {
        let mut all_missing = missing;
        if !has_optional {
            all_missing.extend(config.optional_api_keys.iter().cloned());
        }
        report.missing_api_keys.insert(config.name.clone(), all_missing);
        false
    } else {
        true
    }
}

/// Tolerates both a JSON array of `ToolConfig` and an object mapping
/// name → `ToolConfig` (object values are flattened into a list).
fn read_category_file(path: &Path) -> Result<Vec<ToolConfig>> {
    let file = File::open(path).map_err(EngineError::Io)?;
    file.lock_shared()
        .map_err(|e| EngineError::Config(format!("failed to lock {}: {e}", path.display())))?;
    let mut content = String::new();
    std::io::BufReader::new(&file)
        .read_to_string(&mut content)
        .map_err(EngineError::Io)?;
    let _ = file.unlock();

    let raw: Value = serde_json::from_str(&content).map_err(EngineError::Serde)?;
    let configs = match raw {
        Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<ToolConfig>, _>>()
            .map_err(EngineError::Serde)?,
        Value::Object(map) => map
            .into_values()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<ToolConfig>, _>>()
            .map_err(EngineError::Serde)?,
        other => {
            return Err(EngineError::Config(format!(
                "expected a list or object of tool configs in {}, got {other}",
                path.display()
            )));
        }
    };
    Ok(configs)
}

fn read_name_list(path: &Path) -> Result<HashSet<String>> {
    let content = std::fs::read_to_string(path).map_err(EngineError::Io)?;
    let names: Vec<String> = serde_json::from_str(&content).map_err(EngineError::Serde)?;
    Ok(names.into_iter().collect())
}
