//! Persistence: remote store adapter, local cache and the status reconciler.
//!
//! ```text
//!   ┌──────────────────────────────┐
//!   │          Reconciler          │  read: local ⊕ remote (remote wins per key)
//!   └───────┬──────────────┬───────┘  write: local first, then remote upserts
//!           │              │
//!           ▼              ▼
//!   ┌──────────────┐ ┌──────────────┐
//!   │  LocalStore  │ │ RemoteStore  │  (SupabaseClient in production)
//!   └──────────────┘ └──────────────┘
//! ```

mod local;
mod reconciler;
mod supabase;

#[cfg(test)]
pub(crate) mod memory;

pub use local::LocalStore;
pub use reconciler::{Reconciler, RemoteLeg, WriteReport, STATE_KEY};
pub use supabase::SupabaseClient;

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::activity::ActivityRecord;
use crate::checklist::{StatusMap, TaskDefinition, TaskStatus};
use crate::collaborators::{Collaborator, CollaboratorChanges};
use crate::estimates::Estimate;
use crate::repository::RepoConfig;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Remote request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed remote response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Remote store unavailable")]
    Unavailable,
}

/// Hosted table set: task definitions, status map, estimates, collaborators,
/// the active repository pointer and the inbound activity log.
///
/// Every write is an upsert or update keyed by natural id. Reads skip rows
/// that fail shape validation instead of failing the whole read.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn fetch_statuses(&self) -> Result<StatusMap, StoreError>;

    async fn upsert_status(&self, task_id: &str, status: TaskStatus) -> Result<(), StoreError>;

    /// Insert missing task definition rows, leaving existing rows untouched.
    async fn ensure_tasks(&self, tasks: &[TaskDefinition]) -> Result<(), StoreError>;

    /// `{task_id -> collaborator_id}` for every task row; `None` marks an unassigned task.
    async fn fetch_assignments(&self) -> Result<BTreeMap<String, Option<String>>, StoreError>;

    async fn set_assignment(&self, task_id: &str, collaborator_id: Option<&str>) -> Result<(), StoreError>;

    /// Clear every assignment pointing at `collaborator_id`.
    async fn clear_assignments_to(&self, collaborator_id: &str) -> Result<(), StoreError>;

    async fn fetch_estimates(&self) -> Result<Vec<Estimate>, StoreError>;

    async fn fetch_estimate(&self, task_id: &str) -> Result<Option<Estimate>, StoreError>;

    async fn upsert_estimate(&self, estimate: &Estimate) -> Result<(), StoreError>;

    async fn list_collaborators(&self) -> Result<Vec<Collaborator>, StoreError>;

    async fn insert_collaborator(&self, collaborator: &Collaborator) -> Result<(), StoreError>;

    async fn update_collaborator(&self, id: &str, changes: &CollaboratorChanges) -> Result<(), StoreError>;

    async fn delete_collaborator(&self, id: &str) -> Result<(), StoreError>;

    /// Newest repository pointer row.
    async fn fetch_repo(&self) -> Result<Option<RepoConfig>, StoreError>;

    /// Replace the repository pointer with a single new row.
    async fn replace_repo(&self, repo: &RepoConfig) -> Result<(), StoreError>;

    async fn insert_activity(&self, record: &ActivityRecord) -> Result<(), StoreError>;

    /// Newest first, optionally restricted to one task.
    async fn list_activity(&self, task_id: Option<&str>, limit: usize) -> Result<Vec<ActivityRecord>, StoreError>;
}
