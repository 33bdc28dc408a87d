//! Agent registry.
//!
//! Maps agent names to descriptors and lazily constructed instances. Each
//! name owns a [`tokio::sync::OnceCell`], so concurrent first lookups for
//! one agent construct it exactly once while lookups for different agents
//! never wait on each other. A failed construction leaves the cell empty
//! and a later lookup retries.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use crate::agent::{ChatAgent, ChatRequest, ChatResponse};
use crate::error::{AgentryError, Result};
use crate::runtime::Runtime;

/// Builds an agent instance against the shared runtime.
///
/// Constructors may block (reading configuration files, building HTTP
/// clients); the registry runs them on tokio's blocking pool.
pub type AgentConstructor = Arc<dyn Fn(&Runtime) -> Result<Arc<dyn ChatAgent>> + Send + Sync>;

/// A registered agent: its name, how to build it and what it does.
#[derive(Clone)]
pub struct AgentDescriptor {
    pub name: String,
    pub description: String,
    pub constructor: AgentConstructor,
}

impl AgentDescriptor {
    pub fn new<F>(name: &str, description: &str, constructor: F) -> Self
    where
        F: Fn(&Runtime) -> Result<Arc<dyn ChatAgent>> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            constructor: Arc::new(constructor),
        }
    }
}

impl fmt::Debug for AgentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

/// A group of agents registered together.
#[derive(Debug, Clone, Copy)]
pub struct AgentModule {
    pub name: &'static str,
    pub load: fn() -> Result<Vec<AgentDescriptor>>,
}

/// Read-only view of a registered agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentInfo {
    pub name: String,
    pub description: String,
    /// Whether an instance has been constructed
    pub instantiated: bool,
}

type InstanceCell = Arc<OnceCell<Arc<dyn ChatAgent>>>;

struct Entry {
    descriptor: AgentDescriptor,
    instance: InstanceCell,
}

/// Name → agent registry.
pub struct AgentRegistry {
    runtime: Arc<Runtime>,
    entries: RwLock<HashMap<String, Entry>>,
}

impl AgentRegistry {
    pub fn new(runtime: Arc<Runtime>) -> Self {
        Self {
            runtime,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// Register every agent the modules provide.
    ///
    /// Modules load in order. A module that fails to load is logged and
    /// skipped. Names already registered are left untouched, so repeated
    /// discovery neither duplicates agents nor drops cached instances.
    /// Returns the number of newly registered agents.
    pub fn discover(&self, modules: &[AgentModule]) -> usize {
        let mut added = 0;
        for module in modules {
            let descriptors = match (module.load)() {
                Ok(descriptors) => descriptors,
                Err(e) => {
                    error!(module = module.name, error = %e, "Failed to load agent module");
                    continue;
                }
            };
            for descriptor in descriptors {
                let mut entries = self.write_entries();
                if entries.contains_key(&descriptor.name) {
                    debug!(agent = %descriptor.name, module = module.name, "Agent already registered");
                    continue;
                }
                info!(agent = %descriptor.name, module = module.name, "Discovered agent");
                entries.insert(
                    descriptor.name.clone(),
                    Entry {
                        descriptor,
                        instance: Arc::new(OnceCell::new()),
                    },
                );
                added += 1;
            }
        }
        crate::log_component!(
            info,
            "registry",
            "Agent discovery complete",
            modules = modules.len(),
            added = added
        );
        added
    }

    /// Register or replace an agent. Replacing drops the cached instance.
    pub fn register(&self, descriptor: AgentDescriptor) {
        let name = descriptor.name.clone();
        let previous = self.write_entries().insert(
            name.clone(),
            Entry {
                descriptor,
                instance: Arc::new(OnceCell::new()),
            },
        );
        if previous.is_some() {
            warn!(agent = %name, "Replacing registered agent");
        } else {
            info!(agent = %name, "Registered agent");
        }
    }

    /// Instance for `name`, constructing it on first use.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown names; construction errors propagate.
    pub async fn get_instance(&self, name: &str) -> Result<Arc<dyn ChatAgent>> {
        let (descriptor, cell) = {
            let entries = self.read_entries();
            let entry = entries
                .get(name)
                .ok_or_else(|| AgentryError::NotFound(format!("agent '{}'", name)))?;
            (entry.descriptor.clone(), Arc::clone(&entry.instance))
        };

        let runtime = Arc::clone(&self.runtime);
        let instance = cell
            .get_or_try_init(|| async move {
                info!(agent = %descriptor.name, "Constructing agent");
                let name = descriptor.name.clone();
                let built = tokio::task::spawn_blocking(move || (descriptor.constructor)(&runtime))
                    .await
                    .map_err(|e| {
                        AgentryError::Execution(format!("constructor for '{}' panicked: {}", name, e))
                    })
                    .and_then(|built| built);
                built.map_err(|e| {
                    error!(agent = %name, error = %e, "Agent construction failed");
                    e
                })
            })
            .await?;
        Ok(Arc::clone(instance))
    }

    /// Registered names, sorted.
    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read_entries().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn describe(&self, name: &str) -> Option<AgentInfo> {
        self.read_entries().get(name).map(|entry| AgentInfo {
            name: entry.descriptor.name.clone(),
            description: entry.descriptor.description.clone(),
            instantiated: entry.instance.initialized(),
        })
    }

    /// All registered agents, sorted by name.
    pub fn describe_all(&self) -> Vec<AgentInfo> {
        self.list_names()
            .iter()
            .filter_map(|name| self.describe(name))
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read_entries().contains_key(name)
    }

    pub fn has_instance(&self, name: &str) -> bool {
        self.read_entries()
            .get(name)
            .is_some_and(|entry| entry.instance.initialized())
    }

    /// Drop the cached instance of `name`. Returns whether one existed.
    pub fn clear(&self, name: &str) -> bool {
        let mut entries = self.write_entries();
        let Some(entry) = entries.get_mut(name) else {
            return false;
        };
        let existed = entry.instance.initialized();
        entry.instance = Arc::new(OnceCell::new());
        if existed {
            info!(agent = name, "Cleared agent instance");
        }
        existed
    }

    /// Drop every cached instance; registrations stay.
    pub fn clear_all(&self) {
        let mut entries = self.write_entries();
        for entry in entries.values_mut() {
            entry.instance = Arc::new(OnceCell::new());
        }
        info!(agents = entries.len(), "Cleared all agent instances");
    }

    /// Route a request to its agent.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown agents and construction errors. Failures
    /// inside the agent are reported in the response instead.
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let agent = self.get_instance(&request.agent_name).await?;
        Ok(agent.chat(request).await)
    }

    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_entries(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agents", &self.list_names())
            .finish()
    }
}
