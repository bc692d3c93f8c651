/// Definition store contract and in-memory implementation
///
/// All writes for one definition id are serialized by the store; writes to
/// different ids never wait on each other. Every write is a single
/// `HistoryEdit` that is committed in one step, after the store has claimed
/// the caller's `CommitGate`, so an aborted caller leaves no trace.

use crate::definition::cancel::CommitGate;
use crate::definition::history::{EditOutcome, HistoryEdit, VersionHistory};
use crate::definition::types::{DefinitionVersion, Representation};
use crate::error::DefinitionError;
use async_trait::async_trait;
use chrono::Utc;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;

/// Durable keyed storage of workflow definition versions
#[async_trait]
pub trait DefinitionStore: Send + Sync {
    /// Run `edit` against the definition's history under its write lock and
    /// commit the result if the edit reports a change.
    ///
    /// Unknown ids start from an empty history whose numbering continues
    /// above any deleted versions. Invariant violations found after the edit
    /// abort the write with `InternalConsistency`. A change is only committed
    /// after `gate.enter_commit()` succeeds.
    async fn apply_within(
        &self,
        definition_id: &str,
        edit: HistoryEdit,
        gate: &CommitGate,
    ) -> Result<EditOutcome, DefinitionError>;

    /// Snapshot of every version of a definition, `None` if it has none
    async fn history(&self, definition_id: &str) -> Result<Option<VersionHistory>, DefinitionError>;

    /// Remove every version. Returns whether anything was removed.
    /// Version numbers of removed versions are never handed out again.
    async fn delete(&self, definition_id: &str) -> Result<bool, DefinitionError>;

    /// Ids of all stored definitions, sorted
    async fn list_definition_ids(&self) -> Result<Vec<String>, DefinitionError>;

    /// `apply_within` without cancellation
    async fn apply(
        &self,
        definition_id: &str,
        edit: HistoryEdit,
    ) -> Result<DefinitionVersion, DefinitionError> {
        let gate = CommitGate::unbounded();
        Ok(self.apply_within(definition_id, edit, &gate).await?.record)
    }

    /// Append version N+1 as a draft
    async fn create_draft_within(
        &self,
        definition_id: &str,
        representation: Representation,
        gate: &CommitGate,
    ) -> Result<DefinitionVersion, DefinitionError> {
        let outcome = self
            .apply_within(
                definition_id,
                Box::new(move |history: &mut VersionHistory| {
                    Ok(EditOutcome::changed(
                        history.append_draft(representation, Utc::now()),
                    ))
                }),
                gate,
            )
            .await?;
        tracing::info!(definition_id, version = outcome.record.version, "📝 Created draft");
        Ok(outcome.record)
    }

    async fn create_draft(
        &self,
        definition_id: &str,
        representation: Representation,
    ) -> Result<DefinitionVersion, DefinitionError> {
        let gate = CommitGate::unbounded();
        self.create_draft_within(definition_id, representation, &gate).await
    }

    async fn get_version(
        &self,
        definition_id: &str,
        version: u32,
    ) -> Result<DefinitionVersion, DefinitionError> {
        match self.history(definition_id).await? {
            Some(history) => history.get(version).cloned(),
            None => Err(DefinitionError::VersionNotFound {
                definition_id: definition_id.to_string(),
                version,
            }),
        }
    }

    async fn get_published(&self, definition_id: &str) -> Result<DefinitionVersion, DefinitionError> {
        match self.history(definition_id).await? {
            Some(history) => history.published().cloned(),
            None => Err(DefinitionError::NoPublishedVersion(definition_id.to_string())),
        }
    }

    async fn get_latest(&self, definition_id: &str) -> Result<DefinitionVersion, DefinitionError> {
        match self.history(definition_id).await? {
            Some(history) => history.latest().cloned(),
            None => Err(DefinitionError::DefinitionNotFound(definition_id.to_string())),
        }
    }

    /// Every version, ascending. Empty for unknown ids.
    async fn list_versions(&self, definition_id: &str) -> Result<Vec<DefinitionVersion>, DefinitionError> {
        Ok(self
            .history(definition_id)
            .await?
            .map(VersionHistory::into_versions)
            .unwrap_or_default())
    }
}

/// Per-definition state guarded by its own lock
#[derive(Debug)]
struct Slot {
    history: VersionHistory,
    /// Set once the slot has left the map; writers that raced the removal
    /// must fetch a fresh slot
    retired: bool,
}

/// In-memory definition store
///
/// Each definition id gets its own `RwLock`, so writes to one id never block
/// reads or writes of another. Slots exist only for ids with versions.
#[derive(Debug, Default)]
pub struct MemoryDefinitionStore {
    /// Key: definition id
    slots: RwLock<HashMap<String, Arc<RwLock<Slot>>>>,
    /// Key: definition id, Value: highest version number removed by `delete`
    retired_versions: RwLock<HashMap<String, u32>>,
}

impl MemoryDefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn existing_slot(&self, definition_id: &str) -> Option<Arc<RwLock<Slot>>> {
        self.slots.read().await.get(definition_id).cloned()
    }

    /// Get or create the slot for a definition id
    async fn slot(&self, definition_id: &str) -> Arc<RwLock<Slot>> {
        // Fast path for existing slots
        if let Some(slot) = self.existing_slot(definition_id).await {
            return slot;
        }

        let mut slots = self.slots.write().await;
        // Double-check: another writer may have created it
        if let Some(slot) = slots.get(definition_id) {
            return Arc::clone(slot);
        }
        let retired_max = self
            .retired_versions
            .read()
            .await
            .get(definition_id)
            .copied()
            .unwrap_or(0);
        let slot = Arc::new(RwLock::new(Slot {
            history: VersionHistory::new(definition_id).with_retired_max(retired_max),
            retired: false,
        }));
        slots.insert(definition_id.to_string(), Arc::clone(&slot));
        slot
    }

    /// Drop a slot that ended up without versions
    async fn prune(&self, definition_id: &str, slot: &Arc<RwLock<Slot>>) {
        let mut slots = self.slots.write().await;
        if slots
            .get(definition_id)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
        {
            slots.remove(definition_id);
        }
    }

    #[cfg(test)]
    async fn slot_count(&self) -> usize {
        self.slots.read().await.len()
    }
}

#[async_trait]
impl DefinitionStore for MemoryDefinitionStore {
    async fn apply_within(
        &self,
        definition_id: &str,
        edit: HistoryEdit,
        gate: &CommitGate,
    ) -> Result<EditOutcome, DefinitionError> {
        let (slot, mut guard) = loop {
            let slot = self.slot(definition_id).await;
            let guard = Arc::clone(&slot).write_owned().await;
            if !guard.retired {
                break (slot, guard);
            }
        };

        let mut working = guard.history.clone();
        let result = edit(&mut working)
            .and_then(|outcome| working.check_invariants().map(|_| outcome))
            .and_then(|outcome| {
                if outcome.changed {
                    gate.enter_commit()?;
                }
                Ok(outcome)
            });

        match result {
            Ok(outcome) => {
                // Commit: no await between the gate and here
                if outcome.changed {
                    guard.history = working;
                }
                Ok(outcome)
            }
            Err(e) => {
                if guard.history.is_empty() {
                    guard.retired = true;
                    drop(guard);
                    self.prune(definition_id, &slot).await;
                }
                Err(e)
            }
        }
    }

    async fn history(&self, definition_id: &str) -> Result<Option<VersionHistory>, DefinitionError> {
        let Some(slot) = self.existing_slot(definition_id).await else {
            return Ok(None);
        };
        let slot = slot.read().await;
        if slot.retired || slot.history.is_empty() {
            return Ok(None);
        }
        Ok(Some(slot.history.clone()))
    }

    async fn delete(&self, definition_id: &str) -> Result<bool, DefinitionError> {
        // Held until the high-water mark is recorded so a new slot can't be
        // seeded from a stale value
        let mut slots = self.slots.write().await;
        let Some(slot) = slots.remove(definition_id) else {
            return Ok(false);
        };

        let mut slot = slot.write().await;
        slot.retired = true;
        if slot.history.is_empty() {
            return Ok(false);
        }

        let high_water = slot.history.high_water();
        self.retired_versions
            .write()
            .await
            .insert(definition_id.to_string(), high_water);
        drop(slots);

        tracing::info!(definition_id, high_water, "🗑️ Deleted definition");
        Ok(true)
    }

    async fn list_definition_ids(&self) -> Result<Vec<String>, DefinitionError> {
        let slots: Vec<(String, Arc<RwLock<Slot>>)> = self
            .slots
            .read()
            .await
            .iter()
            .map(|(id, slot)| (id.clone(), Arc::clone(slot)))
            .collect();

        let mut ids = Vec::new();
        for (id, slot) in slots {
            let slot = slot.read().await;
            if !slot.retired && !slot.history.is_empty() {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}
