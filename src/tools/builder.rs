//! Declarative tool construction.
//!
//! A [`ToolCatalog`] maps implementation kinds (`backend_query`, `echo`, ...)
//! to factories. The [`ToolBuilder`] turns an agent's tool descriptors into a
//! [`ToolSet`], dropping any descriptor it cannot build with a warning.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use super::backend::{BackendClient, BackendMethod, BackendTool};
use super::{EchoTool, Tool, ToolSet};
use crate::config::ToolDescriptor;
use crate::error::{AgentryError, Result};

/// Shared resources tool factories may draw on.
#[derive(Debug, Clone)]
pub struct ToolEnv {
    pub backend: Arc<BackendClient>,
}

/// Builds one tool from its descriptor.
pub type ToolFactory = Arc<dyn Fn(&ToolDescriptor, &ToolEnv) -> Result<Arc<dyn Tool>> + Send + Sync>;

#[derive(Clone)]
struct CatalogEntry {
    required_params: &'static [&'static str],
    factory: ToolFactory,
}

/// Kind → factory table.
#[derive(Clone, Default)]
pub struct ToolCatalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl ToolCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog with the built-in kinds: `backend_query`, `backend_create`, `echo`.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog.register("backend_query", &["path"], |descriptor, env| {
            Ok(Arc::new(BackendTool::from_descriptor(
                descriptor,
                BackendMethod::Get,
                env.backend.clone(),
            )?) as Arc<dyn Tool>)
        });
        catalog.register("backend_create", &["path"], |descriptor, env| {
            Ok(Arc::new(BackendTool::from_descriptor(
                descriptor,
                BackendMethod::Post,
                env.backend.clone(),
            )?) as Arc<dyn Tool>)
        });
        catalog.register("echo", &[], |descriptor, _env| {
            Ok(Arc::new(EchoTool::new(&descriptor.name)) as Arc<dyn Tool>)
        });
        catalog
    }

    /// Register (or replace) a tool kind.
    pub fn register<F>(&mut self, kind: &str, required_params: &'static [&'static str], factory: F)
    where
        F: Fn(&ToolDescriptor, &ToolEnv) -> Result<Arc<dyn Tool>> + Send + Sync + 'static,
    {
        self.entries.insert(
            kind.to_string(),
            CatalogEntry {
                required_params,
                factory: Arc::new(factory),
            },
        );
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for ToolCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCatalog")
            .field("kinds", &self.kinds())
            .finish()
    }
}

/// Turns descriptors into bound tools.
pub struct ToolBuilder<'a> {
    catalog: &'a ToolCatalog,
    env: &'a ToolEnv,
}

impl<'a> ToolBuilder<'a> {
    pub fn new(catalog: &'a ToolCatalog, env: &'a ToolEnv) -> Self {
        Self { catalog, env }
    }

    /// Build one tool.
    ///
    /// # Errors
    ///
    /// `Config` when the kind is unknown, a required parameter is missing,
    /// or the factory rejects the descriptor.
    pub fn build_one(&self, descriptor: &ToolDescriptor) -> Result<Arc<dyn Tool>> {
        if descriptor.name.trim().is_empty() {
            return Err(AgentryError::Config("tool descriptor without a name".into()));
        }
        let entry = self.catalog.entries.get(&descriptor.kind).ok_or_else(|| {
            AgentryError::Config(format!(
                "tool '{}': unknown type '{}' (known: {})",
                descriptor.name,
                descriptor.kind,
                self.catalog.kinds().join(", ")
            ))
        })?;
        if let Some(missing) = entry
            .required_params
            .iter()
            .find(|p| !descriptor.params.contains_key(**p))
        {
            return Err(AgentryError::Config(format!(
                "tool '{}': missing required param '{}'",
                descriptor.name, missing
            )));
        }
        (entry.factory)(descriptor, self.env)
    }

    /// Build every descriptor, skipping the ones that fail.
    pub fn build(&self, descriptors: &[ToolDescriptor]) -> ToolSet {
        let mut set = ToolSet::new();
        for descriptor in descriptors {
            if set.has(&descriptor.name) {
                warn!(tool = %descriptor.name, "Duplicate tool name; keeping the first declaration");
                continue;
            }
            match self.build_one(descriptor) {
                Ok(tool) => set.register(tool),
                Err(e) => {
                    warn!(tool = %descriptor.name, kind = %descriptor.kind, error = %e, "Skipping tool")
                }
            }
        }
        info!(built = set.len(), declared = descriptors.len(), "Built tools");
        set
    }
}
