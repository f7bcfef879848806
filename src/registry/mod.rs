//! Maps tool type-tags to constructors and tracks unavailable types (§4.4).

use crate::tool::{Tool, ToolConfig};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::warn;


/// Builds a live `Tool` from its `ToolConfig`. One constructor per
/// `type_tag`; tools sharing a type share a constructor.
pub trait ToolConstructor: Send + Sync {
    fn construct(&self, config: &ToolConfig) -> anyhow::Result<Arc<dyn Tool>>;
}

impl<F> ToolConstructor for F
where
    F: Fn(&ToolConfig) -> anyhow::Result<Arc<dyn Tool>> + Send + Sync,
{
    fn construct(&self, config: &ToolConfig) -> anyhow::Result<Arc<dyn Tool>> {
        self(config)
    }
}

#[derive(Debug, Clone)]
pub struct UnavailableEntry {
    pub error: String,
    pub marked_at_unix: u64,
}

#[derive(Debug, Clone, Default)]
pub struct RegistryHealth {
    pub total: usize,
    pub available: usize,
    pub unavailable: usize,
    pub details: HashMap<String, UnavailableEntry>,
}

/// Type-tag → constructor map, plus unavailability tracking so the engine
/// can short-circuit repeated failed lookups without retrying construction.
/// Read-mostly: mutated only during startup registration and when the engine
/// marks a type unavailable after a failed construction.
pub struct Registry {
    constructors: Mutex<HashMap<String, Arc<dyn ToolConstructor>>>,
    unavailable: Mutex<HashMap<String, UnavailableEntry>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            constructors: Mutex::new(HashMap::new()),
            unavailable: Mutex::new(HashMap::new()),
        }
    }

    /// Register a constructor for `type_tag`, overriding any existing one.
    pub fn register(&self, type_tag: impl Into<String>, constructor: Arc<dyn ToolConstructor>) {
        let type_tag = type_tag.into();
        let mut constructors = self.constructors.lock().expect("registry lock poisoned");
        if constructors.contains_key(&type_tag) {
            warn!("registry: overwriting constructor for type '{type_tag}'");
        }
        constructors.insert(type_tag, constructor);
    }

    pub fn lookup(&self, type_tag: &str) -> Option<Arc<dyn ToolConstructor>> {
        self.constructors
            .lock()
            .expect("registry lock poisoned")
            .get(type_tag)
            .cloned()
    }

    pub fn mark_unavailable(&self, type_tag: impl Into<String>, error: impl Into<String>, now_unix: u64) {
        let type_tag = type_tag.into();
        let error = error.into();
        warn!("registry: marking type '{type_tag}' unavailable: {error}");
        self.unavailable.lock().expect("registry lock poisoned").insert(
            type_tag,
            UnavailableEntry {
                error,
                marked_at_unix: now_unix,
            },
        );
    }

    pub fn is_unavailable(&self, type_tag: &str) -> bool {
        self.unavailable
            .lock()
            .expect("registry lock poisoned")
            .contains_key(type_tag)
    }

    pub fn health(&self) -> RegistryHealth {
        let constructors = self.constructors.lock().expect("registry lock poisoned");
        let unavailable = self.unavailable.lock().expect("registry lock poisoned");
        RegistryHealth {
            total: constructors.len(),
            available: constructors.len().saturating_sub(unavailable.len()),
            unavailable: unavailable.len(),
            details: unavailable.clone(),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
