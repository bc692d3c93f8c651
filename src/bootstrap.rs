/// Subsystem setup and initialization
///
/// Wires together all components: activity catalog, expression syntaxes,
/// definition store, publisher, materializer selector and instance store.
/// This is the host application's explicit registration point.

use crate::{
    activity::{builtin_declarations, load_manifest, ActivityRegistry},
    config::{Config, LoggingConfig, StoreBackend},
    definition::{DefinitionPublisher, DefinitionStore, MemoryDefinitionStore, SqliteDefinitionStore},
    expression::ExpressionSyntaxRegistry,
    instance::{MemoryWorkflowInstanceStore, WorkflowInstanceStore},
    materialize::{CompiledWorkflowRegistry, ExecutableGraph, MaterializerSelector},
};
use anyhow::{Context, Result};
use std::{path::Path, sync::Arc};
use tracing_subscriber::EnvFilter;

/// Handle to every component of the definition-management subsystem
#[derive(Clone)]
pub struct WorkflowManagement {
    pub registry: Arc<ActivityRegistry>,
    pub syntaxes: Arc<ExpressionSyntaxRegistry>,
    pub workflows: Arc<CompiledWorkflowRegistry>,
    pub store: Arc<dyn DefinitionStore>,
    pub publisher: DefinitionPublisher,
    pub selector: Arc<MaterializerSelector>,
    pub instances: Arc<dyn WorkflowInstanceStore>,
}

impl WorkflowManagement {
    /// Fetch the published version of `definition_id` and materialize it,
    /// the way an execution engine consumes this subsystem.
    pub async fn materialize_published(&self, definition_id: &str) -> Result<ExecutableGraph> {
        let version = self.store.get_published(definition_id).await?;
        Ok(self.selector.materialize(&version)?)
    }

    /// Same as `materialize_published` for a pinned version
    pub async fn materialize_version(&self, definition_id: &str, version: u32) -> Result<ExecutableGraph> {
        let version = self.store.get_version(definition_id, version).await?;
        Ok(self.selector.materialize(&version)?)
    }
}

/// Build every component from `config`
///
/// The catalog holds the built-in activity kinds plus the optional manifest.
/// A malformed declaration aborts startup.
pub async fn bootstrap(config: &Config) -> Result<WorkflowManagement> {
    tracing::info!("📚 Populating activity catalog");
    let mut declarations = builtin_declarations();
    if let Some(manifest) = &config.catalog.manifest_path {
        tracing::info!("📄 Loading activity manifest: {}", manifest);
        declarations.extend(load_manifest(Path::new(manifest))?);
    }
    let registry = Arc::new(ActivityRegistry::default());
    registry
        .populate(declarations)
        .context("Failed to populate activity catalog")?;

    let syntaxes = Arc::new(ExpressionSyntaxRegistry::default());

    let store: Arc<dyn DefinitionStore> = match config.store.backend {
        StoreBackend::Memory => {
            tracing::info!("🧠 Using in-memory definition store");
            Arc::new(MemoryDefinitionStore::new())
        }
        StoreBackend::Sqlite => {
            tracing::info!("📁 Ensuring data directory exists: {}", config.store.data_dir);
            std::fs::create_dir_all(&config.store.data_dir)
                .with_context(|| format!("Failed to create data directory {}", config.store.data_dir))?;
            Arc::new(
                SqliteDefinitionStore::open(&config.store.database_path())
                    .await
                    .context("Failed to open definition database")?,
            )
        }
    };

    let publisher = DefinitionPublisher::new(Arc::clone(&store));

    tracing::info!("🧩 Registering materializers");
    let workflows = Arc::new(CompiledWorkflowRegistry::new());
    let selector = Arc::new(MaterializerSelector::with_defaults(
        Arc::clone(&registry),
        Arc::clone(&syntaxes),
        Arc::clone(&workflows),
    )?);

    let instances: Arc<dyn WorkflowInstanceStore> = Arc::new(MemoryWorkflowInstanceStore::new());

    tracing::info!("✅ Definition management initialized ({} activity kinds)", registry.len());

    Ok(WorkflowManagement {
        registry,
        syntaxes,
        workflows,
        store,
        publisher,
        selector,
        instances,
    })
}

/// Install the fmt subscriber. Safe to call more than once; later calls are no-ops.
pub fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .try_init();
}
