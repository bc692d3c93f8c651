/// Workflow instance records
///
/// Instances pin the definition version they were started from. The external
/// engine owns their execution; this module only stores them.

use crate::definition::DefinitionVersion;
use crate::error::InstanceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Idle,
    Running,
    Suspended,
    Finished,
    Faulted,
    Cancelled,
}

impl InstanceStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InstanceStatus::Finished | InstanceStatus::Faulted | InstanceStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub id: String,
    pub definition_id: String,
    /// The exact version the instance was started from
    pub definition_version: u32,
    pub status: InstanceStatus,
    /// Engine-owned state, opaque here
    pub state: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowInstance {
    /// A fresh idle instance of `version` with a random id
    pub fn start(version: &DefinitionVersion) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            definition_id: version.definition_id.clone(),
            definition_version: version.version,
            status: InstanceStatus::Idle,
            state: Value::Object(Default::default()),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn transition(&mut self, status: InstanceStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

#[async_trait]
pub trait WorkflowInstanceStore: Send + Sync {
    /// Insert or replace by id
    async fn save(&self, instance: WorkflowInstance) -> Result<(), InstanceError>;

    async fn load(&self, id: &str) -> Result<WorkflowInstance, InstanceError>;

    /// Returns whether an instance was removed
    async fn delete(&self, id: &str) -> Result<bool, InstanceError>;

    /// Instances of any version of `definition_id`, oldest first
    async fn list_for_definition(&self, definition_id: &str) -> Result<Vec<WorkflowInstance>, InstanceError>;
}

#[derive(Debug, Default)]
pub struct MemoryWorkflowInstanceStore {
    instances: RwLock<HashMap<String, WorkflowInstance>>,
}

impl MemoryWorkflowInstanceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowInstanceStore for MemoryWorkflowInstanceStore {
    async fn save(&self, instance: WorkflowInstance) -> Result<(), InstanceError> {
        tracing::debug!(
            instance_id = %instance.id,
            definition_id = %instance.definition_id,
            status = ?instance.status,
            "Saving workflow instance"
        );
        self.instances.write().await.insert(instance.id.clone(), instance);
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<WorkflowInstance, InstanceError> {
        self.instances
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| InstanceError::NotFound(id.to_string()))
    }

    async fn delete(&self, id: &str) -> Result<bool, InstanceError> {
        Ok(self.instances.write().await.remove(id).is_some())
    }

    async fn list_for_definition(&self, definition_id: &str) -> Result<Vec<WorkflowInstance>, InstanceError> {
        let mut instances: Vec<WorkflowInstance> = self
            .instances
            .read()
            .await
            .values()
            .filter(|i| i.definition_id == definition_id)
            .cloned()
            .collect();
        instances.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(instances)
    }
}
