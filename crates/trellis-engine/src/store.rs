//! Workflow definition and run history stores.
//!
//! Memory stores back tests and single-process deployments; file stores
//! persist JSON documents under a storage root:
//!
//! ```text
//! {root}/
//! ├── workflows/
//! │   └── {workflow_id}.json
//! └── runs/
//!     └── {workflow_id}/
//!         └── {run_id}.json
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use trellis_protocols::error::StoreError;
use trellis_protocols::store::{RunStore, WorkflowStore};
use trellis_protocols::types::{WorkflowDefinition, WorkflowRun};

fn io_err(context: &str, e: impl std::fmt::Display) -> StoreError {
    StoreError::Io(format!("{context}: {e}"))
}

fn serde_err(context: &str, e: impl std::fmt::Display) -> StoreError {
    StoreError::Serialization(format!("{context}: {e}"))
}

fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// In-memory workflow definition store.
pub struct MemoryWorkflowStore {
    workflows: RwLock<HashMap<String, WorkflowDefinition>>,
}

impl MemoryWorkflowStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            workflows: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryWorkflowStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkflowStore for MemoryWorkflowStore {
    async fn save(&self, definition: &WorkflowDefinition) -> Result<(), StoreError> {
        let mut store = self.workflows.write().await;
        store.insert(definition.id.clone(), definition.clone());
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<WorkflowDefinition>, StoreError> {
        let store = self.workflows.read().await;
        Ok(store.get(id).cloned())
    }

    async fn load_all(&self) -> Result<Vec<WorkflowDefinition>, StoreError> {
        let store = self.workflows.read().await;
        Ok(store.values().cloned().collect())
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut store = self.workflows.write().await;
        Ok(store.remove(id).is_some())
    }

    async fn list_active_scheduled(&self) -> Result<Vec<WorkflowDefinition>, StoreError> {
        let store = self.workflows.read().await;
        Ok(store
            .values()
            .filter(|w| w.is_active && w.trigger.is_scheduled())
            .cloned()
            .collect())
    }
}

/// File-backed workflow definition store.
pub struct FileWorkflowStore {
    storage_path: PathBuf,
}

impl FileWorkflowStore {
    /// Create the store, ensuring the workflows directory exists.
    pub async fn new(storage_path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let storage_path = storage_path.into();
        let dir = storage_path.join("workflows");
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_err("creating workflows directory", e))?;
        debug!("FileWorkflowStore initialized at {:?}", storage_path);
        Ok(Self { storage_path })
    }

    fn workflow_path(&self, id: &str) -> PathBuf {
        self.storage_path
            .join("workflows")
            .join(format!("{}.json", sanitize_id(id)))
    }
}

#[async_trait]
impl WorkflowStore for FileWorkflowStore {
    async fn save(&self, definition: &WorkflowDefinition) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(definition)
            .map_err(|e| serde_err("serializing workflow", e))?;
        fs::write(self.workflow_path(&definition.id), content)
            .await
            .map_err(|e| io_err("writing workflow file", e))
    }

    async fn load(&self, id: &str) -> Result<Option<WorkflowDefinition>, StoreError> {
        let path = self.workflow_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| io_err("reading workflow file", e))?;
        let definition =
            serde_json::from_str(&content).map_err(|e| serde_err("parsing workflow file", e))?;
        Ok(Some(definition))
    }

    async fn load_all(&self) -> Result<Vec<WorkflowDefinition>, StoreError> {
        let dir = self.storage_path.join("workflows");
        let mut workflows = Vec::new();
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| io_err("reading workflows directory", e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_err("reading directory entry", e))?
        {
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            match fs::read_to_string(&path).await {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(definition) => workflows.push(definition),
                    Err(e) => warn!("skipping unreadable workflow {:?}: {}", path, e),
                },
                Err(e) => warn!("skipping unreadable workflow {:?}: {}", path, e),
            }
        }
        Ok(workflows)
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let path = self.workflow_path(id);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)
            .await
            .map_err(|e| io_err("deleting workflow file", e))?;
        Ok(true)
    }

    async fn list_active_scheduled(&self) -> Result<Vec<WorkflowDefinition>, StoreError> {
        Ok(self
            .load_all()
            .await?
            .into_iter()
            .filter(|w| w.is_active && w.trigger.is_scheduled())
            .collect())
    }
}

/// In-memory run history store.
pub struct MemoryRunStore {
    runs: RwLock<HashMap<Uuid, WorkflowRun>>,
}

impl MemoryRunStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            runs: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryRunStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn save(&self, run: &WorkflowRun) -> Result<(), StoreError> {
        let mut runs = self.runs.write().await;
        runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn load(&self, id: &Uuid) -> Result<Option<WorkflowRun>, StoreError> {
        let runs = self.runs.read().await;
        Ok(runs.get(id).cloned())
    }

    async fn list_for_workflow(
        &self,
        workflow_id: &str,
        limit: usize,
    ) -> Result<Vec<WorkflowRun>, StoreError> {
        let runs = self.runs.read().await;
        let mut matching: Vec<WorkflowRun> = runs
            .values()
            .filter(|r| r.workflow_id == workflow_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        matching.truncate(limit);
        Ok(matching)
    }
}

/// File-backed run history store, one directory per workflow.
pub struct FileRunStore {
    storage_path: PathBuf,
}

impl FileRunStore {
    /// Create the store, ensuring the runs directory exists.
    pub async fn new(storage_path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let storage_path = storage_path.into();
        let dir = storage_path.join("runs");
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_err("creating runs directory", e))?;
        debug!("FileRunStore initialized at {:?}", storage_path);
        Ok(Self { storage_path })
    }

    fn workflow_dir(&self, workflow_id: &str) -> PathBuf {
        self.storage_path.join("runs").join(sanitize_id(workflow_id))
    }

    fn run_path(&self, workflow_id: &str, run_id: &Uuid) -> PathBuf {
        self.workflow_dir(workflow_id).join(format!("{run_id}.json"))
    }
}

#[async_trait]
impl RunStore for FileRunStore {
    async fn save(&self, run: &WorkflowRun) -> Result<(), StoreError> {
        let dir = self.workflow_dir(&run.workflow_id);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_err("creating run directory", e))?;
        let content =
            serde_json::to_string_pretty(run).map_err(|e| serde_err("serializing run", e))?;
        fs::write(self.run_path(&run.workflow_id, &run.id), content)
            .await
            .map_err(|e| io_err("writing run file", e))
    }

    async fn load(&self, id: &Uuid) -> Result<Option<WorkflowRun>, StoreError> {
        // Run files are grouped by workflow; scan the group directories.
        let runs_dir = self.storage_path.join("runs");
        let mut entries = fs::read_dir(&runs_dir)
            .await
            .map_err(|e| io_err("reading runs directory", e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_err("reading directory entry", e))?
        {
            let candidate = entry.path().join(format!("{id}.json"));
            if candidate.exists() {
                let content = fs::read_to_string(&candidate)
                    .await
                    .map_err(|e| io_err("reading run file", e))?;
                let run = serde_json::from_str(&content)
                    .map_err(|e| serde_err("parsing run file", e))?;
                return Ok(Some(run));
            }
        }
        Ok(None)
    }

    async fn list_for_workflow(
        &self,
        workflow_id: &str,
        limit: usize,
    ) -> Result<Vec<WorkflowRun>, StoreError> {
        let dir = self.workflow_dir(workflow_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut runs = Vec::new();
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| io_err("reading run directory", e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_err("reading directory entry", e))?
        {
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            match fs::read_to_string(&path).await {
                Ok(content) => match serde_json::from_str::<WorkflowRun>(&content) {
                    Ok(run) => runs.push(run),
                    Err(e) => warn!("skipping unreadable run {:?}: {}", path, e),
                },
                Err(e) => warn!("skipping unreadable run {:?}: {}", path, e),
            }
        }
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs.truncate(limit);
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use trellis_protocols::types::{Trigger, WorkflowStep};

    fn definition(id: &str, active: bool, scheduled: bool) -> WorkflowDefinition {
        let trigger = if scheduled {
            Trigger::Schedule {
                cron: "0 9 * * *".to_string(),
            }
        } else {
            Trigger::Manual
        };
        let mut def = WorkflowDefinition::new(id, "Test", trigger)
            .with_steps(vec![WorkflowStep::new("s1", "Step", "agent", "do it")]);
        def.is_active = active;
        def
    }

    #[tokio::test]
    async fn test_memory_workflow_store_crud() {
        let store = MemoryWorkflowStore::new();
        store.save(&definition("wf-1", false, false)).await.unwrap();

        assert!(store.load("wf-1").await.unwrap().is_some());
        assert!(store.load("missing").await.unwrap().is_none());
        assert_eq!(store.load_all().await.unwrap().len(), 1);

        assert!(store.delete("wf-1").await.unwrap());
        assert!(!store.delete("wf-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_active_scheduled_filters() {
        let store = MemoryWorkflowStore::new();
        store.save(&definition("manual", true, false)).await.unwrap();
        store.save(&definition("inactive", false, true)).await.unwrap();
        store.save(&definition("due", true, true)).await.unwrap();

        let scheduled = store.list_active_scheduled().await.unwrap();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].id, "due");
    }

    #[tokio::test]
    async fn test_file_workflow_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FileWorkflowStore::new(dir.path()).await.unwrap();

        store.save(&definition("wf-1", true, true)).await.unwrap();
        let loaded = store.load("wf-1").await.unwrap().unwrap();
        assert_eq!(loaded.id, "wf-1");
        assert_eq!(loaded.version, 1);

        assert_eq!(store.list_active_scheduled().await.unwrap().len(), 1);
        assert!(store.delete("wf-1").await.unwrap());
        assert!(store.load("wf-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_run_store_history_order_and_limit() {
        let dir = TempDir::new().unwrap();
        let store = FileRunStore::new(dir.path()).await.unwrap();

        for version in 1..=5 {
            let mut run = WorkflowRun::new("wf-1", version);
            run.started_at = chrono::Utc::now() + chrono::Duration::seconds(version as i64);
            store.save(&run).await.unwrap();
        }

        let history = store.list_for_workflow("wf-1", 3).await.unwrap();
        assert_eq!(history.len(), 3);
        // Newest first.
        assert_eq!(history[0].workflow_version, 5);
        assert_eq!(history[2].workflow_version, 3);

        assert!(store.list_for_workflow("other", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_run_store_load_by_id() {
        let dir = TempDir::new().unwrap();
        let store = FileRunStore::new(dir.path()).await.unwrap();

        let run = WorkflowRun::new("wf-1", 1);
        store.save(&run).await.unwrap();

        let loaded = store.load(&run.id).await.unwrap().unwrap();
        assert_eq!(loaded.workflow_id, "wf-1");
        assert!(store.load(&Uuid::new_v4()).await.unwrap().is_none());
    }
}
