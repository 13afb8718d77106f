//! In-memory remote store used by tests.
//!
//! Mirrors the hosted table set with plain collections. `set_failing(true)`
//! makes every call return `StoreError::Unavailable`, simulating an outage.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{RemoteStore, StoreError};
use crate::activity::ActivityRecord;
use crate::checklist::{StatusMap, TaskDefinition, TaskStatus};
use crate::collaborators::{Collaborator, CollaboratorChanges};
use crate::estimates::Estimate;
use crate::repository::RepoConfig;

#[derive(Default)]
struct Tables {
    statuses: StatusMap,
    task_ids: Vec<String>,
    assignments: BTreeMap<String, Option<String>>,
    estimates: BTreeMap<String, Estimate>,
    collaborators: Vec<Collaborator>,
    repo: Option<RepoConfig>,
    activity: Vec<ActivityRecord>,
}

#[derive(Default)]
pub struct MemoryRemote {
    tables: Mutex<Tables>,
    failing: AtomicBool,
    status_upserts: AtomicUsize,
}

impl MemoryRemote {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn seed_statuses(&self, statuses: StatusMap) {
        self.tables.lock().unwrap().statuses = statuses;
    }

    pub fn seed_assignment(&self, task_id: &str, collaborator_id: &str) {
        self.tables
            .lock()
            .unwrap()
            .assignments
            .insert(task_id.to_string(), Some(collaborator_id.to_string()));
    }

    /// Number of successful status upserts so far.
    pub fn status_upserts(&self) -> usize {
        self.status_upserts.load(Ordering::SeqCst)
    }

    pub fn task_ids(&self) -> Vec<String> {
        self.tables.lock().unwrap().task_ids.clone()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn fetch_statuses(&self) -> Result<StatusMap, StoreError> {
        self.check()?;
        Ok(self.tables.lock().unwrap().statuses.clone())
    }

    async fn upsert_status(&self, task_id: &str, status: TaskStatus) -> Result<(), StoreError> {
        self.check()?;
        self.tables.lock().unwrap().statuses.insert(task_id.to_string(), status);
        self.status_upserts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn ensure_tasks(&self, tasks: &[TaskDefinition]) -> Result<(), StoreError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        for task in tasks {
            if !tables.task_ids.contains(&task.id) {
                tables.task_ids.push(task.id.clone());
            }
        }
        Ok(())
    }

    async fn fetch_assignments(&self) -> Result<BTreeMap<String, Option<String>>, StoreError> {
        self.check()?;
        Ok(self.tables.lock().unwrap().assignments.clone())
    }

    async fn set_assignment(&self, task_id: &str, collaborator_id: Option<&str>) -> Result<(), StoreError> {
        self.check()?;
        self.tables
            .lock()
            .unwrap()
            .assignments
            .insert(task_id.to_string(), collaborator_id.map(str::to_string));
        Ok(())
    }

    async fn clear_assignments_to(&self, collaborator_id: &str) -> Result<(), StoreError> {
        self.check()?;
        self.tables
            .lock()
            .unwrap()
            .assignments
            .values_mut()
            .filter(|assigned| assigned.as_deref() == Some(collaborator_id))
            .for_each(|assigned| *assigned = None);
        Ok(())
    }

    async fn fetch_estimates(&self) -> Result<Vec<Estimate>, StoreError> {
        self.check()?;
        Ok(self.tables.lock().unwrap().estimates.values().cloned().collect())
    }

    async fn fetch_estimate(&self, task_id: &str) -> Result<Option<Estimate>, StoreError> {
        self.check()?;
        Ok(self.tables.lock().unwrap().estimates.get(task_id).cloned())
    }

    async fn upsert_estimate(&self, estimate: &Estimate) -> Result<(), StoreError> {
        self.check()?;
        self.tables
            .lock()
            .unwrap()
            .estimates
            .insert(estimate.task_id.clone(), estimate.clone());
        Ok(())
    }

    async fn list_collaborators(&self) -> Result<Vec<Collaborator>, StoreError> {
        self.check()?;
        let mut list = self.tables.lock().unwrap().collaborators.clone();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(list)
    }

    async fn insert_collaborator(&self, collaborator: &Collaborator) -> Result<(), StoreError> {
        self.check()?;
        self.tables.lock().unwrap().collaborators.push(collaborator.clone());
        Ok(())
    }

    async fn update_collaborator(&self, id: &str, changes: &CollaboratorChanges) -> Result<(), StoreError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        if let Some(c) = tables.collaborators.iter_mut().find(|c| c.id == id) {
            changes.apply(c);
        }
        Ok(())
    }

    async fn delete_collaborator(&self, id: &str) -> Result<(), StoreError> {
        self.check()?;
        self.tables.lock().unwrap().collaborators.retain(|c| c.id != id);
        Ok(())
    }

    async fn fetch_repo(&self) -> Result<Option<RepoConfig>, StoreError> {
        self.check()?;
        Ok(self.tables.lock().unwrap().repo.clone())
    }

    async fn replace_repo(&self, repo: &RepoConfig) -> Result<(), StoreError> {
        self.check()?;
        self.tables.lock().unwrap().repo = Some(repo.clone());
        Ok(())
    }

    async fn insert_activity(&self, record: &ActivityRecord) -> Result<(), StoreError> {
        self.check()?;
        self.tables.lock().unwrap().activity.push(record.clone());
        Ok(())
    }

    async fn list_activity(&self, task_id: Option<&str>, limit: usize) -> Result<Vec<ActivityRecord>, StoreError> {
        self.check()?;
        Ok(self
            .tables
            .lock()
            .unwrap()
            .activity
            .iter()
            .rev()
            .filter(|r| task_id.map(|id| r.task_id == id).unwrap_or(true))
            .take(limit)
            .cloned()
            .collect())
    }
}
