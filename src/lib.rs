/// Flowmint: workflow definition management
///
/// This library provides the definition-management core of a workflow engine:
/// an activity catalog, a versioned definition store with publish/retract
/// lifecycle, and materialization of stored definitions into executable graphs.

// Core configuration and setup
pub mod config;

// Error families for every layer
pub mod error;

// Activity catalog layer - declarations, descriptors and the atomic-swap registry
pub mod activity;

// Expression syntaxes accepted for dynamic property values
pub mod expression;

// Definition layer - versioned storage and the publisher
pub mod definition;

// Materialization layer - strategies turning definitions into petgraph graphs
pub mod materialize;

// Workflow instance records
pub mod instance;

// Component wiring
pub mod bootstrap;

// Re-export commonly used types for external consumers
pub use activity::{ActivityDescriptor, ActivityKindDeclaration, ActivityRegistry};
pub use bootstrap::{bootstrap, WorkflowManagement};
pub use definition::{DefinitionPublisher, DefinitionStore, DefinitionVersion, Representation, VersionStatus};
pub use error::{DefinitionError, MaterializeError, RegistryError};
pub use materialize::{ExecutableGraph, MaterializerSelector};
