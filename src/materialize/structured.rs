/// Structured-data strategy
///
/// Reads the stored payload as a JSON `GraphDocument` and binds it.

use crate::definition::{DefinitionVersion, RepresentationKind};
use crate::error::MaterializeError;
use crate::materialize::binder::{bind_document, MaterializeContext};
use crate::materialize::document::GraphDocument;
use crate::materialize::graph::ExecutableGraph;
use crate::materialize::selector::Materializer;

#[derive(Debug, Default)]
pub struct JsonMaterializer;

impl JsonMaterializer {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(payload: &str) -> Result<GraphDocument, MaterializeError> {
        serde_json::from_str(payload).map_err(|e| MaterializeError::InvalidDocument(e.to_string()))
    }
}

impl Materializer for JsonMaterializer {
    fn kind(&self) -> RepresentationKind {
        RepresentationKind::Structured
    }

    fn materialize(
        &self,
        version: &DefinitionVersion,
        context: MaterializeContext<'_>,
    ) -> Result<ExecutableGraph, MaterializeError> {
        let document = Self::parse(&version.representation.payload)?;
        bind_document(version, &document, context)
    }
}
