/// Workflow Definition Layer
///
/// This module handles versioned workflow definitions:
/// - Version records and representation payloads
/// - The version-history state machine and its invariants
/// - Store contract with in-memory and SQLite implementations
/// - Publisher for draft/published/retracted transitions
/// - Cancellation and timeout wrapper for store operations

// Version record types
pub mod types;

// Pure versioning state machine
pub mod history;

// Store contract and in-memory store
pub mod store;

// SQLite persistence with sqlx
pub mod sqlite;

// Publish/retract/new-draft orchestration
pub mod publisher;

// Cancellation and deadlines
pub mod cancel;

pub use cancel::{run_cancellable, CommitGate};
pub use history::{EditOutcome, HistoryEdit, VersionHistory};
pub use publisher::DefinitionPublisher;
pub use sqlite::SqliteDefinitionStore;
pub use store::{DefinitionStore, MemoryDefinitionStore};
pub use types::{DefinitionVersion, Representation, RepresentationKind, VersionStatus};
