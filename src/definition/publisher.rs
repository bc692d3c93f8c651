/// Definition publisher
///
/// Orchestrates draft -> published transitions on top of a `DefinitionStore`.
/// Every operation is a single store edit, so atomicity comes from the store's
/// per-id write exclusivity; the publisher holds no lock of its own.

use crate::definition::cancel::CommitGate;
use crate::definition::history::{EditOutcome, VersionHistory};
use crate::definition::store::DefinitionStore;
use crate::definition::types::DefinitionVersion;
use crate::error::DefinitionError;
use chrono::Utc;
use std::sync::Arc;

#[derive(Clone)]
pub struct DefinitionPublisher {
    store: Arc<dyn DefinitionStore>,
}

impl std::fmt::Debug for DefinitionPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefinitionPublisher").finish_non_exhaustive()
    }
}

impl DefinitionPublisher {
    pub fn new(store: Arc<dyn DefinitionStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DefinitionStore> {
        &self.store
    }

    /// Publish `version`, retracting whichever version was published before
    ///
    /// A no-op when `version` is already the published one.
    pub async fn publish(
        &self,
        definition_id: &str,
        version: u32,
    ) -> Result<DefinitionVersion, DefinitionError> {
        let gate = CommitGate::unbounded();
        Ok(self.publish_within(definition_id, version, &gate).await?.record)
    }

    /// `publish` committed through `gate`; reports whether anything changed
    pub async fn publish_within(
        &self,
        definition_id: &str,
        version: u32,
        gate: &CommitGate,
    ) -> Result<EditOutcome, DefinitionError> {
        let outcome = self
            .store
            .apply_within(
                definition_id,
                Box::new(move |history: &mut VersionHistory| {
                    let previous = history.published().ok().map(|v| v.version);
                    let outcome = history.publish(version)?;
                    if outcome.changed {
                        if let Some(previous) = previous {
                            tracing::debug!(previous, "Demoting previously published version");
                        }
                    }
                    Ok(outcome)
                }),
                gate,
            )
            .await?;

        if outcome.changed {
            tracing::info!(definition_id, version, "🚀 Published definition version");
        } else {
            tracing::debug!(definition_id, version, "Version already published");
        }
        Ok(outcome)
    }

    /// Retract `version`. Already-retracted versions are left as they are.
    pub async fn retract(
        &self,
        definition_id: &str,
        version: u32,
    ) -> Result<DefinitionVersion, DefinitionError> {
        let gate = CommitGate::unbounded();
        Ok(self.retract_within(definition_id, version, &gate).await?.record)
    }

    pub async fn retract_within(
        &self,
        definition_id: &str,
        version: u32,
        gate: &CommitGate,
    ) -> Result<EditOutcome, DefinitionError> {
        let outcome = self
            .store
            .apply_within(
                definition_id,
                Box::new(move |history: &mut VersionHistory| history.retract(version)),
                gate,
            )
            .await?;

        if outcome.changed {
            tracing::info!(definition_id, version, "⏏️ Retracted definition version");
        } else {
            tracing::debug!(definition_id, version, "Version already retracted");
        }
        Ok(outcome)
    }

    /// Copy the published representation into a fresh draft
    pub async fn new_draft_from_published(
        &self,
        definition_id: &str,
    ) -> Result<DefinitionVersion, DefinitionError> {
        let gate = CommitGate::unbounded();
        self.new_draft_from_published_within(definition_id, &gate).await
    }

    pub async fn new_draft_from_published_within(
        &self,
        definition_id: &str,
        gate: &CommitGate,
    ) -> Result<DefinitionVersion, DefinitionError> {
        let outcome = self
            .store
            .apply_within(
                definition_id,
                Box::new(|history: &mut VersionHistory| {
                    let representation = history.published()?.representation.clone();
                    Ok(EditOutcome::changed(
                        history.append_draft(representation, Utc::now()),
                    ))
                }),
                gate,
            )
            .await?;

        tracing::info!(
            definition_id,
            version = outcome.record.version,
            "📝 Created draft from published version"
        );
        Ok(outcome.record)
    }
}
