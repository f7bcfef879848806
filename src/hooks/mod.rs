//! Post-execution processing pipeline: rule-triggered hooks applied in
//! priority order, with a tool-name recursion guard (§4.8).

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

pub mod file_save;
pub mod rule;
pub mod summarization;

pub use file_save::FileSaveHook;
pub use rule::{ContentTypeKind, HookRule, LengthOperator};
pub use summarization::{Composer, SummarizationHook};


/// Which tools a hook applies to.
#[derive(Debug, Clone)]
pub enum HookBinding {
    Global,
    ToolNames(HashSet<String>),
    Categories(HashSet<String>),
}

#[derive(Debug, Clone, Default)]
pub struct HookContext {
    pub tool_type: Option<String>,
}

/// A post-execution processor. `priority` and `enabled` are mutable at
/// runtime (`enable_hook`/`disable_hook`), so they're stored with interior
/// mutability rather than requiring `&mut self` through the manager.
#[async_trait]
pub trait Hook: Send + Sync {
    fn name(&self) -> &str;
    fn is_enabled(&self) -> bool;
    fn set_enabled(&self, enabled: bool);
    fn priority(&self) -> i32;
    fn rule(&self) -> &HookRule;
    fn binding(&self) -> &HookBinding;
    async fn process(&self, result: Value, tool_name: &str, arguments: &Value, ctx: &HookContext) -> Value;
}

/// Shared `enabled`/`priority` state for `Hook` implementors.
pub struct HookState {
    pub name: String,
    enabled: AtomicBool,
    priority: AtomicI32,
    pub rule: HookRule,
    pub binding: HookBinding,
}

impl HookState {
    pub fn new(name: impl Into<String>, priority: i32, rule: HookRule, binding: HookBinding) -> Self {
        Self {
            name: name.into(),
            enabled: AtomicBool::new(true),
            priority: AtomicI32::new(priority),
            rule,
            binding,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn priority(&self) -> i32 {
        self.priority.load(Ordering::Acquire)
    }
}

/// Coordinates hook loading, ordering, and application. `tool_allowlist`
/// holds the hook-tool names (e.g. the summarization composer) exempt from
/// hook processing to prevent recursion.
pub struct HookManager {
    hooks: Mutex<Vec<Arc<dyn Hook>>>,
    enabled: AtomicBool,
    tool_allowlist: HashSet<String>,
}

impl HookManager {
    pub fn new(hooks: Vec<Arc<dyn Hook>>, tool_allowlist: HashSet<String>) -> Self {
        Self {
            hooks: Mutex::new(hooks),
            enabled: AtomicBool::new(true),
            tool_allowlist,
        }
    }

    pub async fn apply_hooks(&self, result: Value, tool_name: &str, arguments: &Value, ctx: &HookContext) -> Value {
        if !self.enabled.load(Ordering::Acquire) {
            return result;
        }
        if self.tool_allowlist.contains(tool_name) {
            return result;
        }

        let mut ordered: Vec<Arc<dyn Hook>> = self.hooks.lock().expect("hook manager lock poisoned").clone();
        ordered.sort_by_key(Hook::priority);

        let mut current = result;
        for hook in ordered {
            if !hook.is_enabled() {
                continue;
            }
            if !is_applicable(hook.binding(), tool_name, ctx) {
                continue;
            }
            if hook.rule().evaluate(&current, tool_name, ctx.tool_type.as_deref()) {
                current = hook.process(current, tool_name, arguments, ctx).await;
            }
        }
        current
    }

    pub fn toggle_hooks(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn enable_hook(&self, name: &str) {
        self.set_hook_enabled(name, true);
    }

    pub fn disable_hook(&self, name: &str) {
        self.set_hook_enabled(name, false);
    }

    fn set_hook_enabled(&self, name: &str, enabled: bool) {
        let hooks = self.hooks.lock().expect("hook manager lock poisoned");
        if let Some(hook) = hooks.iter().find(|h| h.name() == name) {
            hook.set_enabled(enabled);
        }
    }

    /// Atomically replace the active hook set, e.g. after a config reload.
    pub fn reload(&self, hooks: Vec<Arc<dyn Hook>>) {
        *self.hooks.lock().expect("hook manager lock poisoned") = hooks;
    }
}

fn is_applicable(binding: &HookBinding, tool_name: &str, ctx: &HookContext) -> bool {
    match binding {
        HookBinding::Global => true,
        HookBinding::ToolNames(names) => names.contains(tool_name),
        HookBinding::Categories(categories) => ctx
            .tool_type
            .as_deref()
            .is_some_and(|t| categories.contains(t)),
    }
}
