/// Materialization Layer
///
/// Turns stored definition versions into executable graphs:
/// - Workflow document shape and builder
/// - Binding against an activity catalog snapshot
/// - JSON and compiled-reference strategies
/// - Selector dispatching on the representation kind tag

// Node/connection document
pub mod document;

// Executable graph on petgraph
pub mod graph;

// Shared binding logic
pub mod binder;

// JSON strategy
pub mod structured;

// Compiled-reference strategy
pub mod compiled;

// Strategy dispatch
pub mod selector;

pub use binder::{bind_document, MaterializeContext};
pub use compiled::{CompiledMaterializer, CompiledWorkflow, CompiledWorkflowRegistry};
pub use document::{ConnectionDocument, DocumentBuilder, ExpressionInput, GraphDocument, NodeDocument, PropertyInput};
pub use graph::{ActivityNode, BoundProperty, BoundValue, Connection, ExecutableGraph};
pub use selector::{Materializer, MaterializerSelector};
pub use structured::JsonMaterializer;
