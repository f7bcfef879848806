//! Validates, dispatches, and executes tool invocations with caching,
//! singleflight dedup, per-tool concurrency caps, and hooks (§4.7).

use crate::cache::CacheManager;
use crate::hooks::{HookContext, HookManager};
use crate::registry::{Registry, RegistryHealth};
use crate::tool::{canonical_json, RunOptions, Tool, ToolConfig, ToolError, ToolErrorKind};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Semaphore;
use tracing::warn;

#[cfg(test)]
mod tests;

#[derive(Debug, Clone)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}

/// Dispatches individual and batched tool calls. Owns no tool bodies itself
/// — it instantiates them lazily through `Registry` and memoizes the live
/// instance per tool name (first construction wins on a race).
pub struct Engine {
    registry: Arc<Registry>,
    cache: Arc<CacheManager>,
    hooks: Arc<HookManager>,
    configs: HashMap<String, ToolConfig>,
    instances: Mutex<HashMap<String, Arc<dyn Tool>>>,
    tool_semaphores: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl Engine {
    pub fn new(registry: Arc<Registry>, cache: Arc<CacheManager>, hooks: Arc<HookManager>, configs: Vec<ToolConfig>) -> Self {
        Self {
            registry,
            cache,
            hooks,
            configs: configs.into_iter().map(|c| (c.name.clone(), c)).collect(),
            instances: Mutex::new(HashMap::new()),
            tool_semaphores: Mutex::new(HashMap::new()),
        }
    }

    /// Executes one invocation end to end: validation, cache, singleflight,
    /// dispatch with panic isolation, hooks, cache write. Always returns a
    /// JSON value — tool-level failures are dual-format error objects, never
    /// a Rust `Err` (§7: tool errors are result values, not control flow).
    pub async fn run_one(&self, call: ToolCall, opts: &RunOptions) -> Value {
        if call.name.trim().is_empty() {
            return ToolError::new(ToolErrorKind::Validation, "Missing or empty function name").to_dual_format();
        }
        if !call.arguments.is_object() && !call.arguments.is_null() {
            return ToolError::new(ToolErrorKind::Validation, "arguments must be an object").to_dual_format();
        }
        let arguments = if call.arguments.is_null() { json!({}) } else { call.arguments };

        let Some(config) = self.configs.get(&call.name).cloned() else {
            return unavailable_error(&call.name, "tool is not registered");
        };

        let tool = match self.get_or_construct(&config) {
            Ok(tool) => tool,
            Err(e) => {
                self.registry.mark_unavailable(&config.type_tag, e.to_string(), now_unix());
                return unavailable_error(&call.name, &e.to_string());
            }
        };

        let ns = tool.get_cache_namespace();
        let ver = tool.get_cache_version();
        let ck = tool.get_cache_key(&arguments);
        let caching = opts.use_cache && tool.supports_caching();

        if caching {
            if let Some(cached) = self.cache.get(&ns, &ver, &ck) {
                return cached;
            }
        }

        let _guard = self.cache.singleflight_guard(&ns, &ver, &ck).await;
        if caching {
            if let Some(cached) = self.cache.get(&ns, &ver, &ck) {
                return cached;
            }
        }

        if let Some(err) = tool.validate_parameters(&arguments) {
            return err.to_dual_format();
        }

        let accepted = tool.accepted_run_options();
        let forwarded = RunOptions {
            use_cache: accepted.contains("use_cache") && opts.use_cache,
            validate: accepted.contains("validate") && opts.validate,
            stream_callback: if accepted.contains("stream_callback") {
                opts.stream_callback.clone()
            } else {
                None
            },
        };

        let args_for_hooks = arguments.clone();
        let result = invoke_with_panic_guard(tool.clone(), arguments, forwarded).await;

        match result {
            Ok(value) => {
                let ctx = HookContext {
                    tool_type: Some(config.type_tag.clone()),
                };
                let after_hooks = self.hooks.apply_hooks(value, &call.name, &args_for_hooks, &ctx).await;
                if caching {
                    let ttl = tool.get_cache_ttl(&after_hooks);
                    self.cache.set(&ns, &ver, &ck, after_hooks.clone(), ttl);
                }
                after_hooks
            }
            Err(tool_error) => tool_error.to_dual_format(),
        }
    }

    /// Executes a batch, preserving input order. Identical calls (by
    /// canonical `{name, arguments}` signature) are deduplicated to a single
    /// job shared across their positions. Cacheable jobs are primed upfront
    /// with a `bulk_get` of their composed keys; jobs already cached never
    /// reach dispatch. Remaining jobs respect per-tool semaphores and an
    /// overall worker pool. A `stream_callback` forces sequential execution,
    /// since interleaving concurrent streams on one callback is ambiguous
    /// (§4.7).
    pub async fn run_batch(self: Arc<Self>, calls: Vec<ToolCall>, opts: RunOptions, max_workers: usize) -> Vec<Value> {
        let n = calls.len();
        let mut slots: Vec<Option<Value>> = vec![None; n];

        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut index_of_sig: HashMap<String, usize> = HashMap::new();
        for (i, call) in calls.iter().enumerate() {
            let sig = canonical_json(&json!({"name": call.name, "arguments": call.arguments}));
            match index_of_sig.get(&sig) {
                Some(&group_idx) => groups[group_idx].push(i),
                None => {
                    index_of_sig.insert(sig, groups.len());
                    groups.push(vec![i]);
                }
            }
        }

        let sequential = opts.stream_callback.is_some();

        // Prime cache: for every job whose tool is constructible and supports
        // caching, `bulk_get` its composed key upfront so an already-cached
        // result never goes through dispatch a second time (§4.7).
        let groups: Vec<Vec<usize>> = if opts.use_cache {
            let mut keys_by_ns_ver: HashMap<(String, String), Vec<String>> = HashMap::new();
            let group_keys: Vec<Option<(String, String, String)>> = groups
                .iter()
                .map(|indices| {
                    let key = self.cache_key_for(&calls[indices[0]]);
                    if let Some((ns, ver, ck)) = &key {
                        keys_by_ns_ver.entry((ns.clone(), ver.clone())).or_default().push(ck.clone());
                    }
                    key
                })
                .collect();

            let mut primed: HashMap<(String, String, String), Value> = HashMap::new();
            for ((ns, ver), keys) in &keys_by_ns_ver {
                for (ck, value) in self.cache.bulk_get(ns, ver, keys) {
                    primed.insert((ns.clone(), ver.clone(), ck), value);
                }
            }

            let mut pending = Vec::new();
            for (indices, key) in groups.into_iter().zip(group_keys) {
                let hit = key.and_then(|k| primed.get(&k).cloned());
                match hit {
                    Some(value) => {
                        for &idx in &indices {
                            slots[idx] = Some(value.clone());
                        }
                    }
                    None => pending.push(indices),
                }
            }
            pending
        } else {
            groups
        };

        if sequential {
            for indices in &groups {
                let call = calls[indices[0]].clone();
                let value = self.run_one(call, &opts).await;
                for &idx in indices {
                    slots[idx] = Some(value.clone());
                }
            }
        } else {
            let overall = Arc::new(Semaphore::new(max_workers.max(1)));
            let mut handles = Vec::new();
            for indices in groups {
                let engine = self.clone();
                let call = calls[indices[0]].clone();
                let opts = opts.clone();
                let overall = overall.clone();
                let tool_sem = engine.tool_semaphore_for(&call.name);
                handles.push(tokio::spawn(async move {
                    let _overall_permit = overall.acquire_owned().await.expect("batch semaphore closed");
                    let _tool_permit = match tool_sem {
                        Some(sem) => Some(sem.acquire_owned().await.expect("tool semaphore closed")),
                        None => None,
                    };
                    let value = engine.run_one(call, &opts).await;
                    (indices, value)
                }));
            }
            for handle in handles {
                match handle.await {
                    Ok((indices, value)) => {
                        for idx in indices {
                            slots[idx] = Some(value.clone());
                        }
                    }
                    Err(e) => warn!("batch job panicked: {e}"),
                }
            }
        }

        slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| ToolError::new(ToolErrorKind::Server, "batch job did not complete").to_dual_format()))
            .collect()
    }

    /// Composed `(namespace, version, cache_key)` for a call's tool, if that
    /// tool is already constructible (or can be constructed cheaply) and
    /// opts into caching. Returns `None` rather than erroring so priming
    /// never fails a batch job; `run_one` repeats construction and reports
    /// the real error for jobs this misses.
    fn cache_key_for(&self, call: &ToolCall) -> Option<(String, String, String)> {
        let config = self.configs.get(&call.name)?;
        let tool = self.get_or_construct(config).ok()?;
        if !tool.supports_caching() {
            return None;
        }
        let arguments = if call.arguments.is_null() { json!({}) } else { call.arguments.clone() };
        Some((tool.get_cache_namespace(), tool.get_cache_version(), tool.get_cache_key(&arguments)))
    }

    fn get_or_construct(&self, config: &ToolConfig) -> anyhow::Result<Arc<dyn Tool>> {
        let mut instances = self.instances.lock().expect("engine lock poisoned");
        if let Some(tool) = instances.get(&config.name) {
            return Ok(tool.clone());
        }
        if self.registry.is_unavailable(&config.type_tag) {
            anyhow::bail!("type '{}' was previously marked unavailable", config.type_tag);
        }
        let constructor = self
            .registry
            .lookup(&config.type_tag)
            .ok_or_else(|| anyhow::anyhow!("no constructor registered for type '{}'", config.type_tag))?;
        let tool = constructor.construct(config)?;
        instances.insert(config.name.clone(), tool.clone());
        Ok(tool)
    }

    /// Attempts to construct `config`'s tool if it isn't already live,
    /// marking its type unavailable on failure. Used by `registry health` to
    /// surface construction problems before a caller ever dispatches to them.
    pub fn ensure_constructed(&self, config: &ToolConfig) {
        if let Err(e) = self.get_or_construct(config) {
            self.registry.mark_unavailable(&config.type_tag, e.to_string(), now_unix());
        }
    }

    pub fn registry_health(&self) -> RegistryHealth {
        self.registry.health()
    }

    fn tool_semaphore_for(&self, tool_name: &str) -> Option<Arc<Semaphore>> {
        let limit = self.configs.get(tool_name)?.batch_max_concurrency;
        if limit == 0 {
            return None;
        }
        let mut semaphores = self.tool_semaphores.lock().expect("engine lock poisoned");
        Some(
            semaphores
                .entry(tool_name.to_string())
                .or_insert_with(|| Arc::new(Semaphore::new(limit as usize)))
                .clone(),
        )
    }
}

fn unavailable_error(tool_name: &str, detail: &str) -> Value {
    ToolError::new(ToolErrorKind::Unavailable, format!("Tool '{tool_name}' is unavailable: {detail}"))
        .with_next_steps(["Check tool name spelling", "Refresh tools"])
        .to_dual_format()
}

/// Runs the tool in a spawned task so a panic never takes down the engine.
/// No engine-level timeout is applied here (§5: callers impose timeouts via
/// the transport); only panic isolation is in scope.
async fn invoke_with_panic_guard(tool: Arc<dyn Tool>, arguments: Value, opts: RunOptions) -> Result<Value, ToolError> {
    let tool_for_error = tool.clone();
    let tool_name = tool.config().name.clone();
    let handle = tokio::task::spawn(async move { tool.run(arguments, &opts).await });

    match handle.await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(tool_for_error.handle_error(&e)),
        Err(join_err) => {
            if join_err.is_panic() {
                let payload = join_err.into_panic();
                let message = payload
                    .downcast_ref::<String>()
                    .map(String::as_str)
                    .or_else(|| payload.downcast_ref::<&str>().copied())
                    .unwrap_or("unknown cause");
                Err(ToolError::new(ToolErrorKind::Server, format!("Tool '{tool_name}' panicked: {message}")))
            } else {
                Err(ToolError::new(ToolErrorKind::Server, format!("Tool '{tool_name}' was cancelled")))
            }
        }
    }
}
