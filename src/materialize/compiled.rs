/// Compiled-reference strategy
///
/// The payload names a `CompiledWorkflow` registered in code. The workflow is
/// resolved by identity, never parsed, and its builder output is bound through
/// the same path as structured documents.

use crate::definition::{DefinitionVersion, RepresentationKind};
use crate::error::MaterializeError;
use crate::materialize::binder::{bind_document, MaterializeContext};
use crate::materialize::document::DocumentBuilder;
use crate::materialize::graph::ExecutableGraph;
use crate::materialize::selector::Materializer;
use arc_swap::ArcSwap;
use std::{collections::HashMap, sync::Arc};

/// A precompiled graph builder
pub trait CompiledWorkflow: Send + Sync {
    fn build(&self, builder: &mut DocumentBuilder);
}

impl<F> CompiledWorkflow for F
where
    F: Fn(&mut DocumentBuilder) + Send + Sync,
{
    fn build(&self, builder: &mut DocumentBuilder) {
        self(builder)
    }
}

/// Compiled workflows by identity
///
/// Read-mostly: lookups are lock-free loads, registration clones the map and
/// swaps it in.
pub struct CompiledWorkflowRegistry {
    workflows: ArcSwap<HashMap<String, Arc<dyn CompiledWorkflow>>>,
}

impl Default for CompiledWorkflowRegistry {
    fn default() -> Self {
        Self {
            workflows: ArcSwap::new(Arc::new(HashMap::new())),
        }
    }
}

impl CompiledWorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        name: impl Into<String>,
        workflow: impl CompiledWorkflow + 'static,
    ) -> Result<(), MaterializeError> {
        let name = name.into();
        let workflow: Arc<dyn CompiledWorkflow> = Arc::new(workflow);

        // rcu retries the closure if another registration swapped in between
        let mut duplicate = false;
        self.workflows.rcu(|current| {
            duplicate = current.contains_key(&name);
            let mut next = HashMap::clone(current);
            if !duplicate {
                next.insert(name.clone(), Arc::clone(&workflow));
            }
            next
        });

        if duplicate {
            return Err(MaterializeError::DuplicateCompiledWorkflow(name));
        }
        tracing::debug!(workflow = %name, "Registered compiled workflow");
        Ok(())
    }

    /// Get a workflow by name (lock-free read)
    pub fn get(&self, name: &str) -> Option<Arc<dyn CompiledWorkflow>> {
        self.workflows.load().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.workflows.load().contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.workflows.load().keys().cloned().collect();
        names.sort();
        names
    }
}

pub struct CompiledMaterializer {
    workflows: Arc<CompiledWorkflowRegistry>,
}

impl CompiledMaterializer {
    pub fn new(workflows: Arc<CompiledWorkflowRegistry>) -> Self {
        Self { workflows }
    }

    pub fn workflows(&self) -> &Arc<CompiledWorkflowRegistry> {
        &self.workflows
    }
}

impl Materializer for CompiledMaterializer {
    fn kind(&self) -> RepresentationKind {
        RepresentationKind::Compiled
    }

    fn materialize(
        &self,
        version: &DefinitionVersion,
        context: MaterializeContext<'_>,
    ) -> Result<ExecutableGraph, MaterializeError> {
        let name = version.representation.payload.trim();
        let workflow = self
            .workflows
            .get(name)
            .ok_or_else(|| MaterializeError::UnknownCompiledWorkflow(name.to_string()))?;

        let mut builder = DocumentBuilder::new();
        workflow.build(&mut builder);
        bind_document(version, &builder.build(), context)
    }
}
