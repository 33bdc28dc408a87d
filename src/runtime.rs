//! Process-scoped runtime state.
//!
//! A [`Runtime`] bundles what every agent construction draws on: the loaded
//! settings, the pooled session stores, the tool catalog with its shared
//! backend client, and the engine factory. It is built once per process and
//! handed to the [`AgentRegistry`](crate::registry::AgentRegistry); tests
//! build a fresh one each.

use std::sync::Arc;

use tracing::info;

use crate::config::RuntimeSettings;
use crate::engine::{EngineFactory, ModelEngineFactory};
use crate::error::Result;
use crate::session::SessionServiceFactory;
use crate::tools::{BackendClient, ToolBuilder, ToolCatalog, ToolEnv};

/// Shared state for agent construction.
pub struct Runtime {
    settings: RuntimeSettings,
    sessions: SessionServiceFactory,
    engines: Arc<dyn EngineFactory>,
    tool_catalog: ToolCatalog,
    tool_env: ToolEnv,
}

impl Runtime {
    /// Runtime with the built-in tool catalog and the offline echo engine.
    pub fn new(settings: RuntimeSettings) -> Result<Self> {
        Self::builder(settings).build()
    }

    pub fn builder(settings: RuntimeSettings) -> RuntimeBuilder {
        RuntimeBuilder {
            settings,
            engines: None,
            tool_catalog: None,
        }
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    pub fn sessions(&self) -> &SessionServiceFactory {
        &self.sessions
    }

    pub fn engine_factory(&self) -> &Arc<dyn EngineFactory> {
        &self.engines
    }

    pub fn tool_catalog(&self) -> &ToolCatalog {
        &self.tool_catalog
    }

    pub fn tool_env(&self) -> &ToolEnv {
        &self.tool_env
    }

    /// Builder over this runtime's catalog and environment.
    pub fn tool_builder(&self) -> ToolBuilder<'_> {
        ToolBuilder::new(&self.tool_catalog, &self.tool_env)
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("session_backend", &self.settings.session.backend)
            .field("backend_url", &self.settings.backend.base_url)
            .field("tool_kinds", &self.tool_catalog.kinds())
            .finish()
    }
}

/// Builder for [`Runtime`].
pub struct RuntimeBuilder {
    settings: RuntimeSettings,
    engines: Option<Arc<dyn EngineFactory>>,
    tool_catalog: Option<ToolCatalog>,
}

impl RuntimeBuilder {
    pub fn with_engine_factory(mut self, factory: impl EngineFactory + 'static) -> Self {
        self.engines = Some(Arc::new(factory));
        self
    }

    pub fn with_shared_engine_factory(mut self, factory: Arc<dyn EngineFactory>) -> Self {
        self.engines = Some(factory);
        self
    }

    pub fn with_tool_catalog(mut self, catalog: ToolCatalog) -> Self {
        self.tool_catalog = Some(catalog);
        self
    }

    /// # Errors
    ///
    /// Returns a `Config` error when the backend URL is invalid.
    pub fn build(self) -> Result<Runtime> {
        let backend = Arc::new(BackendClient::new(&self.settings.backend)?);
        let sessions = SessionServiceFactory::new(self.settings.session.clone());
        info!(
            backend_url = %self.settings.backend.base_url,
            session_backend = ?self.settings.session.backend,
            "Runtime initialized"
        );
        Ok(Runtime {
            sessions,
            engines: self
                .engines
                .unwrap_or_else(|| Arc::new(ModelEngineFactory::default())),
            tool_catalog: self.tool_catalog.unwrap_or_else(ToolCatalog::with_builtins),
            tool_env: ToolEnv { backend },
            settings: self.settings,
        })
    }
}
