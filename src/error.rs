/// Error types for definition management
///
/// Each family maps to one failure class: configuration errors raised while
/// building the activity catalog, lookup and lifecycle errors raised by the
/// definition store, and materialization errors raised while turning a stored
/// representation into an executable graph. Nothing here is retried internally.

use thiserror::Error;

/// A malformed activity-kind declaration. Fatal at catalog population time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorBuildError {
    #[error("Activity kind identifier must not be empty")]
    EmptyKind,

    #[error("Activity '{kind}' declares a property with an empty name")]
    EmptyPropertyName { kind: String },

    #[error("Activity '{kind}' declares a port with an empty name")]
    EmptyPortName { kind: String },

    #[error("Activity '{kind}' declares property '{property}' more than once")]
    DuplicateProperty { kind: String, property: String },

    #[error("Activity '{kind}' declares {direction} port '{port}' more than once")]
    DuplicatePort {
        kind: String,
        direction: &'static str,
        port: String,
    },

    #[error("Activity '{kind}' property '{property}': default value does not match type '{expected}'")]
    DefaultTypeMismatch {
        kind: String,
        property: String,
        expected: String,
    },

    #[error("Activity '{kind}' property '{property}': unknown default value provider '{provider}'")]
    UnknownDefaultProvider {
        kind: String,
        property: String,
        provider: String,
    },

    #[error("Activity '{kind}' property '{property}': unknown options provider '{provider}'")]
    UnknownOptionsProvider {
        kind: String,
        property: String,
        provider: String,
    },
}

/// Errors raised by the activity registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Activity kind declared more than once: {0}")]
    DuplicateActivityKind(String),

    #[error("Unknown activity kind: {0}")]
    UnknownActivityKind(String),

    #[error(transparent)]
    Descriptor(#[from] DescriptorBuildError),

    #[error("Failed to load activity manifest '{path}': {reason}")]
    Manifest { path: String, reason: String },
}

/// Errors raised by definition stores and the publisher.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("Version {version} of definition '{definition_id}' not found")]
    VersionNotFound { definition_id: String, version: u32 },

    #[error("Definition '{0}' has no published version")]
    NoPublishedVersion(String),

    #[error("Definition not found: {0}")]
    DefinitionNotFound(String),

    #[error("Version {version} of definition '{definition_id}' is retracted and cannot be published")]
    RetractedVersion { definition_id: String, version: u32 },

    /// The store observed a state its write exclusivity should have made
    /// impossible. This is a store bug, not a caller error.
    #[error("Internal consistency violation for definition '{definition_id}': {detail}")]
    InternalConsistency { definition_id: String, detail: String },

    #[error("Operation cancelled before commit")]
    Cancelled,

    #[error("Operation timed out before commit")]
    TimedOut,

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DefinitionError {
    /// True for errors a caller can fix by changing state (publishing, creating a draft).
    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            DefinitionError::VersionNotFound { .. }
                | DefinitionError::NoPublishedVersion(_)
                | DefinitionError::DefinitionNotFound(_)
        )
    }
}

/// Errors raised while materializing a definition version.
#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("No materializer registered for representation kind '{0}'")]
    NoMaterializerForKind(String),

    #[error("A materializer for representation kind '{0}' is already registered")]
    DuplicateMaterializer(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Invalid workflow document: {0}")]
    InvalidDocument(String),

    #[error("Node id used more than once: {0}")]
    DuplicateNode(String),

    #[error("Connection references unknown node: {0}")]
    UnknownNode(String),

    #[error("Node '{node}' ({kind}) has no {direction} port '{port}'")]
    UnknownPort {
        node: String,
        kind: String,
        direction: &'static str,
        port: String,
    },

    #[error("Node '{node}' ({kind}) sets undeclared property '{property}'")]
    UnknownProperty {
        node: String,
        kind: String,
        property: String,
    },

    #[error("Node '{node}' property '{property}' does not accept expressions")]
    ExpressionsNotSupported { node: String, property: String },

    #[error("Node '{node}' property '{property}' uses unknown expression syntax '{syntax}'")]
    UnknownSyntax {
        node: String,
        property: String,
        syntax: String,
    },

    #[error("Node '{node}' property '{property}': {reason}")]
    InvalidPropertyValue {
        node: String,
        property: String,
        reason: String,
    },

    #[error("Node '{node}' pins {kind} version {requested}, catalog has version {available}")]
    ActivityVersionMismatch {
        node: String,
        kind: String,
        requested: u32,
        available: u32,
    },

    #[error("Unknown compiled workflow: {0}")]
    UnknownCompiledWorkflow(String),

    #[error("Compiled workflow registered more than once: {0}")]
    DuplicateCompiledWorkflow(String),
}

/// Errors raised by instance stores.
#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("Workflow instance not found: {0}")]
    NotFound(String),
}
