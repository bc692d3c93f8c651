/// Materializer selection
///
/// One strategy per representation kind, held in one slot per
/// `RepresentationKind` variant. The selector reads the kind tag of a
/// definition version, takes a single registry snapshot and dispatches.

use crate::activity::ActivityRegistry;
use crate::definition::{DefinitionVersion, RepresentationKind};
use crate::error::MaterializeError;
use crate::expression::ExpressionSyntaxRegistry;
use crate::materialize::binder::MaterializeContext;
use crate::materialize::compiled::{CompiledMaterializer, CompiledWorkflowRegistry};
use crate::materialize::graph::ExecutableGraph;
use crate::materialize::structured::JsonMaterializer;
use std::sync::Arc;

/// Turns one representation kind into an executable graph
pub trait Materializer: Send + Sync {
    fn kind(&self) -> RepresentationKind;

    /// Must not mutate `version`; must bind against `context` only
    fn materialize(
        &self,
        version: &DefinitionVersion,
        context: MaterializeContext<'_>,
    ) -> Result<ExecutableGraph, MaterializeError>;
}

pub struct MaterializerSelector {
    registry: Arc<ActivityRegistry>,
    syntaxes: Arc<ExpressionSyntaxRegistry>,
    structured: Option<Arc<dyn Materializer>>,
    compiled: Option<Arc<dyn Materializer>>,
}

impl MaterializerSelector {
    /// A selector with no strategies registered
    pub fn new(registry: Arc<ActivityRegistry>, syntaxes: Arc<ExpressionSyntaxRegistry>) -> Self {
        Self {
            registry,
            syntaxes,
            structured: None,
            compiled: None,
        }
    }

    /// A selector with the JSON and compiled-reference strategies
    pub fn with_defaults(
        registry: Arc<ActivityRegistry>,
        syntaxes: Arc<ExpressionSyntaxRegistry>,
        workflows: Arc<CompiledWorkflowRegistry>,
    ) -> Result<Self, MaterializeError> {
        let mut selector = Self::new(registry, syntaxes);
        selector.register(Arc::new(JsonMaterializer::new()))?;
        selector.register(Arc::new(CompiledMaterializer::new(workflows)))?;
        Ok(selector)
    }

    /// Bind a strategy to its kind. A second strategy for the same kind is a
    /// configuration error and leaves the first in place.
    pub fn register(&mut self, materializer: Arc<dyn Materializer>) -> Result<(), MaterializeError> {
        let kind = materializer.kind();
        let slot = self.slot_mut(kind);
        if slot.is_some() {
            return Err(MaterializeError::DuplicateMaterializer(kind.tag().to_string()));
        }
        *slot = Some(materializer);
        tracing::debug!(kind = %kind, "Registered materializer");
        Ok(())
    }

    pub fn supports(&self, tag: &str) -> bool {
        RepresentationKind::from_tag(tag).is_some_and(|kind| self.slot(kind).is_some())
    }

    pub fn materialize(&self, version: &DefinitionVersion) -> Result<ExecutableGraph, MaterializeError> {
        let tag = version.representation.kind.as_str();
        let materializer = RepresentationKind::from_tag(tag)
            .and_then(|kind| self.slot(kind).as_ref())
            .ok_or_else(|| MaterializeError::NoMaterializerForKind(tag.to_string()))?;

        let catalog = self.registry.snapshot();
        let context = MaterializeContext {
            catalog: &catalog,
            syntaxes: &self.syntaxes,
        };

        match materializer.materialize(version, context) {
            Ok(graph) => {
                tracing::info!(
                    definition_id = %version.definition_id,
                    version = version.version,
                    kind = tag,
                    "🧩 Materialized graph with {} nodes",
                    graph.node_count()
                );
                Ok(graph)
            }
            Err(e) => {
                tracing::warn!(
                    definition_id = %version.definition_id,
                    version = version.version,
                    kind = tag,
                    "Materialization failed: {}",
                    e
                );
                Err(e)
            }
        }
    }

    fn slot(&self, kind: RepresentationKind) -> &Option<Arc<dyn Materializer>> {
        match kind {
            RepresentationKind::Structured => &self.structured,
            RepresentationKind::Compiled => &self.compiled,
        }
    }

    fn slot_mut(&mut self, kind: RepresentationKind) -> &mut Option<Arc<dyn Materializer>> {
        match kind {
            RepresentationKind::Structured => &mut self.structured,
            RepresentationKind::Compiled => &mut self.compiled,
        }
    }
}
