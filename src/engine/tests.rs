use super::*;
use crate::cache::{CacheManager, PersistentCache};
use crate::hooks::HookManager;
use crate::registry::Registry;
use crate::tool::ToolConfig;
use async_trait::async_trait;
use serde_json::json;
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

fn config(name: &str, type_tag: &str) -> ToolConfig {
    ToolConfig {
        name: name.to_string(),
        type_tag: type_tag.to_string(),
        category: String::new(),
        description: String::new(),
        parameter_schema: Value::Null,
        return_schema: None,
        required_api_keys: Vec::new(),
        optional_api_keys: Vec::new(),
        cacheable: true,
        cache_ttl: None,
        batch_max_concurrency: 0,
        supports_streaming: false,
    }
}

/// Counts how many times `run` actually executes, to tell a cache hit from
/// a re-dispatch.
struct CountingTool {
    config: ToolConfig,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Tool for CountingTool {
    fn config(&self) -> &ToolConfig {
        &self.config
    }

    async fn run(&self, arguments: Value, _opts: &RunOptions) -> anyhow::Result<Value> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(json!({"arguments": arguments, "invocation": n}))
    }

    fn accepted_run_options(&self) -> BTreeSet<&'static str> {
        ["use_cache"].into_iter().collect()
    }
}

struct FailingTool {
    config: ToolConfig,
    message: &'static str,
}

#[async_trait]
impl Tool for FailingTool {
    fn config(&self) -> &ToolConfig {
        &self.config
    }

    async fn run(&self, _arguments: Value, _opts: &RunOptions) -> anyhow::Result<Value> {
        anyhow::bail!(self.message)
    }
}

struct PanickingTool {
    config: ToolConfig,
}

#[async_trait]
impl Tool for PanickingTool {
    fn config(&self) -> &ToolConfig {
        &self.config
    }

    async fn run(&self, _arguments: Value, _opts: &RunOptions) -> anyhow::Result<Value> {
        panic!("boom");
    }
}

fn fresh_engine() -> (Engine, Arc<Registry>, Arc<AtomicUsize>) {
    let registry = Arc::new(Registry::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_for_ctor = calls.clone();
    registry.register(
        "Counting",
        Arc::new(move |cfg: &ToolConfig| -> anyhow::Result<Arc<dyn Tool>> {
            Ok(Arc::new(CountingTool {
                config: cfg.clone(),
                calls: calls_for_ctor.clone(),
            }))
        }),
    );
    registry.register("Failing", Arc::new(|cfg: &ToolConfig| -> anyhow::Result<Arc<dyn Tool>> {
        Ok(Arc::new(FailingTool {
            config: cfg.clone(),
            message: "invalid parameter: foo",
        }))
    }));
    registry.register("Panicking", Arc::new(|cfg: &ToolConfig| -> anyhow::Result<Arc<dyn Tool>> {
        Ok(Arc::new(PanickingTool { config: cfg.clone() }))
    }));

    let cache = Arc::new(CacheManager::new(64, Arc::new(PersistentCache::open_in_memory().unwrap())));
    let hooks = Arc::new(HookManager::new(Vec::new(), HashSet::new()));
    let configs = vec![
        config("Echo", "Counting"),
        config("Broken", "Failing"),
        config("Boom", "Panicking"),
    ];
    let engine = Engine::new(registry.clone(), cache, hooks, configs);
    (engine, registry, calls)
}

#[tokio::test]
async fn missing_tool_name_is_a_validation_error() {
    let (engine, _, _) = fresh_engine();
    let out = engine
        .run_one(ToolCall { name: String::new(), arguments: json!({}) }, &RunOptions::default())
        .await;
    assert_eq!(out["error"], "Missing or empty function name");
}

#[tokio::test]
async fn unknown_tool_name_is_unavailable() {
    let (engine, _, _) = fresh_engine();
    let out = engine
        .run_one(ToolCall { name: "Nope".to_string(), arguments: json!({}) }, &RunOptions::default())
        .await;
    assert!(out["error"].as_str().unwrap().contains("unavailable"));
    assert_eq!(out["error_details"]["kind"], "unavailable");
}

/// Scenario 1: a cold cache miss executes the tool; a warm hit afterwards
/// returns the cached value without re-executing it.
#[tokio::test]
async fn scenario_1_cold_miss_then_warm_hit() {
    let (engine, _, calls) = fresh_engine();
    let opts = RunOptions { use_cache: true, ..Default::default() };
    let call = ToolCall { name: "Echo".to_string(), arguments: json!({"q": "hi"}) };

    let first = engine.run_one(call.clone(), &opts).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(first["invocation"], 1);

    let second = engine.run_one(call, &opts).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1, "second call should be served from cache");
    assert_eq!(second, first);
}

/// Scenario 2: distinct cache keys (different arguments) never collide, and
/// disabling caching bypasses the cache entirely.
#[tokio::test]
async fn scenario_2_distinct_arguments_and_uncached_calls_do_not_collide() {
    let (engine, _, calls) = fresh_engine();
    let cached = RunOptions { use_cache: true, ..Default::default() };
    let uncached = RunOptions { use_cache: false, ..Default::default() };

    engine
        .run_one(ToolCall { name: "Echo".to_string(), arguments: json!({"q": "a"}) }, &cached)
        .await;
    engine
        .run_one(ToolCall { name: "Echo".to_string(), arguments: json!({"q": "b"}) }, &cached)
        .await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    engine
        .run_one(ToolCall { name: "Echo".to_string(), arguments: json!({"q": "a"}) }, &uncached)
        .await;
    assert_eq!(calls.load(Ordering::SeqCst), 3, "use_cache=false must always re-execute");
}

/// Scenario 3: a batch with duplicate calls dispatches the tool once per
/// unique signature and shares the result across every matching position,
/// in original order.
#[tokio::test]
async fn scenario_3_batch_dedups_identical_calls_and_preserves_order() {
    let (engine, _, calls) = fresh_engine();
    let engine = Arc::new(engine);
    let batch = vec![
        ToolCall { name: "Echo".to_string(), arguments: json!({"q": "a"}) },
        ToolCall { name: "Echo".to_string(), arguments: json!({"q": "b"}) },
        ToolCall { name: "Echo".to_string(), arguments: json!({"q": "a"}) },
    ];
    let opts = RunOptions { use_cache: true, ..Default::default() };
    let results = engine.run_batch(batch, opts, 4).await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0], results[2], "duplicate calls share one result");
    assert_ne!(results[0], results[1]);
    assert_eq!(calls.load(Ordering::SeqCst), 2, "only unique signatures execute");
}

#[tokio::test]
async fn tool_errors_are_classified_and_dual_formatted() {
    let (engine, _, _) = fresh_engine();
    let out = engine
        .run_one(ToolCall { name: "Broken".to_string(), arguments: json!({}) }, &RunOptions::default())
        .await;
    assert_eq!(out["error"], "invalid parameter: foo");
    assert_eq!(out["error_details"]["kind"], "validation");
}

#[tokio::test]
async fn a_panicking_tool_is_isolated_and_reported_as_a_server_error() {
    let (engine, _, _) = fresh_engine();
    let out = engine
        .run_one(ToolCall { name: "Boom".to_string(), arguments: json!({}) }, &RunOptions::default())
        .await;
    assert_eq!(out["error_details"]["kind"], "server");
    assert!(out["error"].as_str().unwrap().contains("panicked"));
}

#[tokio::test]
async fn construction_failure_marks_the_type_unavailable() {
    let registry = Arc::new(Registry::new());
    registry.register("Broken", Arc::new(|_cfg: &ToolConfig| -> anyhow::Result<Arc<dyn Tool>> {
        anyhow::bail!("missing dependency")
    }));
    let cache = Arc::new(CacheManager::new(8, Arc::new(PersistentCache::open_in_memory().unwrap())));
    let hooks = Arc::new(HookManager::new(Vec::new(), HashSet::new()));
    let engine = Engine::new(registry.clone(), cache, hooks, vec![config("Flaky", "Broken")]);

    let out = engine
        .run_one(ToolCall { name: "Flaky".to_string(), arguments: json!({}) }, &RunOptions::default())
        .await;
    assert_eq!(out["error_details"]["kind"], "unavailable");
    assert!(registry.is_unavailable("Broken"));
}

/// A batch job whose result is already sitting in cache must be primed and
/// skipped entirely, never reaching dispatch.
#[tokio::test]
async fn batch_primes_already_cached_jobs_and_skips_their_dispatch() {
    let (engine, _, calls) = fresh_engine();
    let engine = Arc::new(engine);
    let opts = RunOptions { use_cache: true, ..Default::default() };

    let warm = engine
        .run_one(ToolCall { name: "Echo".to_string(), arguments: json!({"q": "a"}) }, &opts)
        .await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let batch = vec![
        ToolCall { name: "Echo".to_string(), arguments: json!({"q": "a"}) },
        ToolCall { name: "Echo".to_string(), arguments: json!({"q": "c"}) },
        ToolCall { name: "Echo".to_string(), arguments: json!({"q": "a"}) },
    ];
    let results = engine.run_batch(batch, opts, 4).await;

    assert_eq!(calls.load(Ordering::SeqCst), 2, "only the uncached job should dispatch");
    assert_eq!(results[0], warm, "primed result matches what was cached");
    assert_eq!(results[2], warm);
    assert_ne!(results[1], warm);
}

#[tokio::test]
async fn batch_respects_a_per_tool_concurrency_cap() {
    let (engine, _, calls) = fresh_engine();
    let engine = Arc::new(engine);
    let batch: Vec<ToolCall> = (0..5)
        .map(|i| ToolCall { name: "Echo".to_string(), arguments: json!({"q": i}) })
        .collect();
    let opts = RunOptions { use_cache: false, ..Default::default() };
    let results = engine.run_batch(batch, opts, 8).await;
    assert_eq!(results.len(), 5);
    assert_eq!(calls.load(Ordering::SeqCst), 5);
}
