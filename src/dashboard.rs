//! Dashboard controller - owns the in-memory task list and drives every mutation.
//!
//! ## Status change flow
//! 1. Update the in-memory task, capturing pre-transition counters
//! 2. Persist the full `{id -> status}` map through the reconciler
//!    (steps 1 and 2 run under one lock, so snapshots persist in order)
//! 3. Derive post-transition stats by applying the delta to the captured counters
//! 4. Emit a status-change event
//!
//! Per-task busy markers are held for the duration of each mutation and
//! released on every exit path.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::activity::{ActivityFeed, RecentActivity};
use crate::checklist::task::status_map;
use crate::checklist::{
    breakdown_after_transition, category_breakdown, CategoryStats, Manifest, ProjectStats, Task,
    TaskFilter, TaskId, TaskStatus,
};
use crate::collaborators::{Collaborator, CollaboratorPatch, NewCollaborator, Roster, RosterError};
use crate::estimates::{Estimate, EstimateBook, EstimateError, EstimateInput};
use crate::export::ChecklistReport;
use crate::notify::{EventSink, StatusChangePayload, STATUS_CHANGE_EVENT};
use crate::repository::{RepoConfig, RepoError, RepoPointer};
use crate::store::{LocalStore, Reconciler, RemoteLeg, RemoteStore};

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Unknown collaborator: {0}")]
    UnknownCollaborator(String),

    #[error(transparent)]
    Estimate(#[from] EstimateError),

    #[error(transparent)]
    Roster(#[from] RosterError),

    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Result of a status change.
#[derive(Debug, Clone, Serialize)]
pub struct StatusChange {
    pub task_id: TaskId,
    pub from: TaskStatus,
    pub to: TaskStatus,
    pub stats: ProjectStats,
    pub by_category: BTreeMap<String, CategoryStats>,
    pub remote: RemoteLeg,
}

/// Result of a per-category bulk operation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkOutcome {
    pub applied: Vec<TaskId>,
    /// Applied locally, but the remote write failed.
    pub remote_failed: Vec<TaskId>,
}

/// Reference-counted per-task busy markers.
#[derive(Debug, Default)]
struct BusySet {
    counts: Mutex<HashMap<TaskId, usize>>,
}

impl BusySet {
    fn enter(&self, task_id: &str) -> BusyGuard<'_> {
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        *counts.entry(task_id.to_string()).or_insert(0) += 1;
        BusyGuard {
            set: self,
            task_id: task_id.to_string(),
        }
    }

    fn contains(&self, task_id: &str) -> bool {
        self.counts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(task_id)
    }

    fn snapshot(&self) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self
            .counts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}

struct BusyGuard<'a> {
    set: &'a BusySet,
    task_id: TaskId,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        let mut counts = self.set.counts.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(count) = counts.get_mut(&self.task_id) {
            *count -= 1;
            if *count == 0 {
                counts.remove(&self.task_id);
            }
        }
    }
}

/// Application state for one checklist.
pub struct Dashboard {
    project: String,
    manifest: Manifest,
    tasks: RwLock<Vec<Task>>,
    reconciler: Reconciler,
    estimates: EstimateBook,
    roster: Roster,
    repository: RepoPointer,
    notifier: Arc<dyn EventSink>,
    busy: BusySet,
    activity: RwLock<ActivityFeed>,
    /// Held from snapshot to persisted write of the status map.
    persist: tokio::sync::Mutex<()>,
}

impl Dashboard {
    /// Seed the task list from the manifest and overlay persisted state.
    pub async fn load(
        project: &str,
        manifest: Manifest,
        remote: Option<Arc<dyn RemoteStore>>,
        local: Arc<LocalStore>,
        notifier: Arc<dyn EventSink>,
    ) -> Self {
        if let Some(remote) = &remote {
            if let Err(e) = remote.ensure_tasks(&manifest.tasks).await {
                tracing::warn!(error = %e, "Could not register task definitions remotely");
            }
        }

        let dashboard = Self {
            project: project.to_string(),
            tasks: RwLock::new(manifest.tasks()),
            manifest,
            reconciler: Reconciler::new(remote.clone(), Arc::clone(&local)),
            estimates: EstimateBook::new(remote.clone(), Arc::clone(&local)),
            roster: Roster::new(remote.clone(), Arc::clone(&local)),
            repository: RepoPointer::new(remote, local),
            notifier,
            busy: BusySet::default(),
            activity: RwLock::new(ActivityFeed::default()),
            persist: tokio::sync::Mutex::new(()),
        };
        dashboard.refresh().await;
        dashboard
    }

    /// Re-read statuses, assignments and estimates from the stores.
    ///
    /// Persisted entries for ids outside the manifest are ignored, as are
    /// assignments to collaborators no longer on the roster.
    pub async fn refresh(&self) {
        let _persist = self.persist.lock().await;
        let statuses = self.reconciler.read().await;
        let mut assignments = self.roster.assignments().await;
        let estimates = self.estimates.all().await;

        let orphans = statuses.keys().filter(|id| !self.manifest.contains(id)).count();
        if orphans > 0 {
            tracing::debug!(orphans, "Ignoring persisted statuses for unknown tasks");
        }

        let roster = self.roster.list().await;
        let before = assignments.len();
        assignments.retain(|_, assigned| roster.iter().any(|c| c.id == *assigned));
        if assignments.len() != before {
            tracing::debug!(
                dropped = before - assignments.len(),
                "Ignoring assignments to unknown collaborators"
            );
        }

        let mut tasks = self.tasks.write().await;
        for task in tasks.iter_mut() {
            if let Some(status) = statuses.get(&task.id) {
                task.status = *status;
            }
            task.assignee = assignments.get(&task.id).cloned();
            task.estimate = estimates.get(&task.id).cloned();
        }
        tracing::info!(
            tasks = tasks.len(),
            statuses = statuses.len(),
            "Checklist state loaded"
        );
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn has_remote(&self) -> bool {
        self.reconciler.has_remote()
    }

    pub async fn tasks(&self) -> Vec<Task> {
        self.tasks.read().await.clone()
    }

    pub async fn task(&self, task_id: &str) -> Option<Task> {
        self.tasks.read().await.iter().find(|t| t.id == task_id).cloned()
    }

    fn require_task(&self, task_id: &str) -> Result<(), DashboardError> {
        if self.manifest.contains(task_id) {
            Ok(())
        } else {
            Err(DashboardError::UnknownTask(task_id.to_string()))
        }
    }

    /// Progress over the full task list, independent of any filter.
    pub async fn stats(&self) -> ProjectStats {
        ProjectStats::from_tasks(&self.tasks.read().await)
    }

    pub async fn category_stats(&self) -> BTreeMap<String, CategoryStats> {
        category_breakdown(&self.tasks.read().await)
    }

    pub async fn filter(&self, filter: &TaskFilter) -> Vec<Task> {
        filter.apply(&self.tasks.read().await)
    }

    pub fn is_busy(&self, task_id: &str) -> bool {
        self.busy.contains(task_id)
    }

    pub fn busy_tasks(&self) -> Vec<TaskId> {
        self.busy.snapshot()
    }

    pub async fn recent_activity(&self) -> Vec<RecentActivity> {
        self.activity.read().await.entries()
    }

    /// Change a task's status. Unknown ids are a no-op and return `None`.
    ///
    /// Setting the current status again is a real transition: it is persisted
    /// and announced like any other.
    pub async fn set_status(&self, task_id: &str, new_status: TaskStatus) -> Option<StatusChange> {
        let persist = self.persist.lock().await;
        let (task, from, stats_before, breakdown_before, statuses) = {
            let mut tasks = self.tasks.write().await;
            let stats_before = ProjectStats::from_tasks(&tasks);
            let breakdown_before = category_breakdown(&tasks);

            let entry = tasks.iter_mut().find(|t| t.id == task_id)?;
            let from = entry.status;
            entry.status = new_status;
            let task = entry.clone();

            (task, from, stats_before, breakdown_before, status_map(&tasks))
        };
        let _busy = self.busy.enter(task_id);

        let report = self.reconciler.write(&statuses, Some(task_id)).await;
        drop(persist);
        if !report.remote_ok() && self.has_remote() {
            tracing::warn!(task_id, "Status saved locally only");
        }

        let stats = stats_before.after_transition(from, new_status);
        let by_category = breakdown_after_transition(&breakdown_before, &task.category, from, new_status);

        let now = Utc::now();
        self.activity.write().await.push(RecentActivity {
            task_id: task.id.clone(),
            label: task.label.clone(),
            status: new_status,
            at: now,
        });

        tracing::info!(
            task_id,
            transition = %format!("{} -> {}", from, new_status),
            percent = stats.percent,
            "Task status changed"
        );

        let payload = StatusChangePayload::new(
            &self.project,
            &task,
            from,
            new_status,
            &stats,
            by_category.clone(),
            now,
        );
        match serde_json::to_value(&payload) {
            Ok(value) => {
                self.notifier.emit(STATUS_CHANGE_EVENT, value).await;
            }
            Err(e) => tracing::error!(task_id, error = %e, "Failed to encode status change event"),
        }

        Some(StatusChange {
            task_id: task.id,
            from,
            to: new_status,
            stats,
            by_category,
            remote: report.remote,
        })
    }

    fn category_task_ids(tasks: &[Task], category: &str) -> Vec<TaskId> {
        tasks
            .iter()
            .filter(|t| t.category == category)
            .map(|t| t.id.clone())
            .collect()
    }

    /// Apply a status to every task in a category, one independent write per task.
    pub async fn set_category_status(&self, category: &str, status: TaskStatus) -> BulkOutcome {
        let ids = Self::category_task_ids(&self.tasks.read().await, category);

        let mut outcome = BulkOutcome::default();
        for id in ids {
            if let Some(change) = self.set_status(&id, status).await {
                if matches!(change.remote, RemoteLeg::Failed { .. }) {
                    outcome.remote_failed.push(id.clone());
                }
                outcome.applied.push(id);
            }
        }
        outcome
    }

    /// Assign a task to a collaborator, or unassign with `None`.
    ///
    /// Returns whether the remote leg succeeded.
    pub async fn assign(&self, task_id: &str, collaborator_id: Option<&str>) -> Result<bool, DashboardError> {
        self.require_task(task_id)?;
        if let Some(id) = collaborator_id {
            if self.roster.get(id).await.is_none() {
                return Err(DashboardError::UnknownCollaborator(id.to_string()));
            }
        }
        Ok(self.assign_unchecked(task_id, collaborator_id).await)
    }

    async fn assign_unchecked(&self, task_id: &str, collaborator_id: Option<&str>) -> bool {
        let _busy = self.busy.enter(task_id);
        {
            let mut tasks = self.tasks.write().await;
            if let Some(task) = tasks.iter_mut().find(|t| t.id == task_id) {
                task.assignee = collaborator_id.map(str::to_string);
            }
        }
        self.roster.assign(task_id, collaborator_id).await
    }

    /// Assign every task in a category, one independent write per task.
    pub async fn assign_category(
        &self,
        category: &str,
        collaborator_id: Option<&str>,
    ) -> Result<BulkOutcome, DashboardError> {
        if let Some(id) = collaborator_id {
            if self.roster.get(id).await.is_none() {
                return Err(DashboardError::UnknownCollaborator(id.to_string()));
            }
        }

        let ids = Self::category_task_ids(&self.tasks.read().await, category);
        let mut outcome = BulkOutcome::default();
        for id in ids {
            if !self.assign_unchecked(&id, collaborator_id).await && self.has_remote() {
                outcome.remote_failed.push(id.clone());
            }
            outcome.applied.push(id);
        }
        Ok(outcome)
    }

    pub async fn estimate(&self, task_id: &str) -> Result<Option<Estimate>, DashboardError> {
        self.require_task(task_id)?;
        Ok(self.estimates.get(task_id).await)
    }

    pub async fn estimates(&self) -> BTreeMap<String, Estimate> {
        self.estimates.all().await
    }

    /// Save an estimate. Returns the stored estimate and whether the remote leg succeeded.
    pub async fn save_estimate(
        &self,
        task_id: &str,
        input: EstimateInput,
    ) -> Result<(Estimate, bool), DashboardError> {
        self.require_task(task_id)?;
        let _busy = self.busy.enter(task_id);

        let (estimate, remote_ok) = self.estimates.save(task_id, input).await?;
        let mut tasks = self.tasks.write().await;
        if let Some(task) = tasks.iter_mut().find(|t| t.id == task_id) {
            task.estimate = Some(estimate.clone());
        }
        Ok((estimate, remote_ok))
    }

    pub async fn collaborators(&self) -> Vec<Collaborator> {
        self.roster.list().await
    }

    pub async fn add_collaborator(&self, input: NewCollaborator) -> Result<Collaborator, DashboardError> {
        Ok(self.roster.add(input).await?)
    }

    pub async fn update_collaborator(
        &self,
        id: &str,
        patch: CollaboratorPatch,
    ) -> Result<Option<Collaborator>, DashboardError> {
        Ok(self.roster.update(id, patch).await?)
    }

    /// Delete a collaborator and clear every task assigned to it.
    pub async fn delete_collaborator(&self, id: &str) -> bool {
        let existed = self.roster.delete(id).await;

        let mut tasks = self.tasks.write().await;
        for task in tasks.iter_mut() {
            if task.assignee.as_deref() == Some(id) {
                task.assignee = None;
            }
        }
        existed
    }

    pub async fn repository(&self) -> Option<RepoConfig> {
        self.repository.get().await
    }

    pub async fn set_repository(&self, input: &str) -> Result<RepoConfig, DashboardError> {
        Ok(self.repository.set(input).await?)
    }

    /// Report over the filtered list, carrying the filter-independent overall percent.
    pub async fn export(&self, filter: &TaskFilter) -> ChecklistReport {
        let tasks = self.tasks.read().await;
        let overall = ProjectStats::from_tasks(&tasks).percent;
        let visible = filter.apply(&tasks);
        ChecklistReport::build(&self.project, &visible, overall, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checklist::StatusMap;
    use crate::notify::testing::RecordingSink;
    use crate::store::memory::MemoryRemote;

    const MANIFEST: &str = r#"
tasks:
  - { id: "1", label: "Login", category: "Auth" }
  - { id: "2", label: "Reset password", category: "Auth" }
  - { id: "3", label: "Invoices", category: "Billing" }
  - { id: "4", label: "Refunds", category: "Billing" }
"#;

    struct Fixture {
        remote: Arc<MemoryRemote>,
        local: Arc<LocalStore>,
        sink: Arc<RecordingSink>,
        dashboard: Dashboard,
    }

    async fn fixture() -> Fixture {
        let remote = Arc::new(MemoryRemote::default());
        let local = Arc::new(LocalStore::in_memory());
        let sink = Arc::new(RecordingSink::default());
        let dashboard = Dashboard::load(
            "Desk",
            Manifest::from_yaml(MANIFEST).unwrap(),
            Some(remote.clone() as Arc<dyn RemoteStore>),
            Arc::clone(&local),
            sink.clone() as Arc<dyn EventSink>,
        )
        .await;
        Fixture { remote, local, sink, dashboard }
    }

    #[tokio::test]
    async fn test_load_registers_tasks_and_ignores_orphans() {
        let remote = Arc::new(MemoryRemote::default());
        remote.seed_statuses(
            [("3".to_string(), TaskStatus::Done), ("ghost".to_string(), TaskStatus::Done)]
                .into_iter()
                .collect(),
        );
        let dashboard = Dashboard::load(
            "Desk",
            Manifest::from_yaml(MANIFEST).unwrap(),
            Some(remote.clone() as Arc<dyn RemoteStore>),
            Arc::new(LocalStore::in_memory()),
            Arc::new(RecordingSink::default()),
        )
        .await;

        assert_eq!(remote.task_ids(), vec!["1", "2", "3", "4"]);
        let tasks = dashboard.tasks().await;
        assert_eq!(tasks.len(), 4);
        assert_eq!(dashboard.task("3").await.unwrap().status, TaskStatus::Done);
        assert!(dashboard.task("ghost").await.is_none());
        assert_eq!(dashboard.stats().await.percent, 25);
    }

    #[tokio::test]
    async fn test_unknown_task_is_a_noop() {
        let f = fixture().await;
        let before = f.dashboard.tasks().await;

        assert!(f.dashboard.set_status("nope", TaskStatus::Done).await.is_none());

        assert_eq!(f.dashboard.tasks().await, before);
        assert_eq!(f.remote.status_upserts(), 0);
        assert!(f.local.get_raw(crate::store::STATE_KEY).await.is_none());
        assert!(f.sink.events().is_empty());
        assert!(f.dashboard.recent_activity().await.is_empty());
    }

    #[tokio::test]
    async fn test_done_and_back_scenario() {
        let f = fixture().await;

        let change = f.dashboard.set_status("1", TaskStatus::Done).await.unwrap();
        assert_eq!(change.stats.percent, 25);
        assert_eq!(change.by_category["Auth"], CategoryStats { total: 2, done: 1, doing: 0, pending: 1 });
        assert_eq!(change.by_category["Billing"], CategoryStats { total: 2, done: 0, doing: 0, pending: 2 });
        assert_eq!(change.remote, RemoteLeg::Synced { upserted: 4 });

        let change = f.dashboard.set_status("1", TaskStatus::Pending).await.unwrap();
        assert_eq!(change.stats.percent, 0);
        assert_eq!(change.by_category["Auth"], CategoryStats { total: 2, done: 0, doing: 0, pending: 2 });
        assert_eq!(f.dashboard.stats().await.percent, 0);

        let events = f.sink.events();
        assert_eq!(events.len(), 2);
        let (name, payload) = &events[0];
        assert_eq!(name, STATUS_CHANGE_EVENT);
        assert_eq!(payload["item"]["transition"], "pending -> done");
        assert_eq!(payload["stats"]["completed"], 1);
        assert_eq!(payload["stats"]["pending"], 3);
        assert_eq!(payload["stats"]["summary"], "1/4 (25%)");
        assert_eq!(payload["statsByCategory"]["Auth"]["done"], 1);
        assert_eq!(events[1].1["item"]["transition"], "done -> pending");
    }

    #[tokio::test]
    async fn test_same_status_still_notifies() {
        let f = fixture().await;
        f.dashboard.set_status("3", TaskStatus::Doing).await.unwrap();

        let change = f.dashboard.set_status("3", TaskStatus::Doing).await.unwrap();
        assert_eq!(change.from, TaskStatus::Doing);
        assert_eq!(change.remote, RemoteLeg::Synced { upserted: 1 });
        assert_eq!(change.stats.doing, 1);
        assert_eq!(change.stats, f.dashboard.stats().await);

        let events = f.sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].1["item"]["transition"], "doing -> doing");
    }

    #[tokio::test]
    async fn test_remote_failure_keeps_local_state_and_clears_busy() {
        let f = fixture().await;
        f.remote.set_failing(true);

        let change = f.dashboard.set_status("2", TaskStatus::Done).await.unwrap();
        assert!(matches!(change.remote, RemoteLeg::Failed { .. }));
        assert_eq!(f.dashboard.task("2").await.unwrap().status, TaskStatus::Done);
        assert!(!f.dashboard.is_busy("2"));
        assert!(f.dashboard.busy_tasks().is_empty());
        assert_eq!(f.sink.events().len(), 1);

        f.dashboard.refresh().await;
        assert_eq!(f.dashboard.task("2").await.unwrap().status, TaskStatus::Done);
    }

    #[tokio::test]
    async fn test_bulk_status_applies_per_task() {
        let f = fixture().await;

        let outcome = f.dashboard.set_category_status("Billing", TaskStatus::Done).await;
        assert_eq!(outcome.applied, vec!["3", "4"]);
        assert!(outcome.remote_failed.is_empty());
        assert_eq!(f.dashboard.stats().await.percent, 50);
        assert_eq!(f.sink.events().len(), 2);

        f.remote.set_failing(true);
        let outcome = f.dashboard.set_category_status("Auth", TaskStatus::Doing).await;
        assert_eq!(outcome.applied, vec!["1", "2"]);
        assert_eq!(outcome.remote_failed, vec!["1", "2"]);
        assert_eq!(f.dashboard.stats().await.doing, 2);

        assert!(f.dashboard.set_category_status("Nope", TaskStatus::Done).await.applied.is_empty());
    }

    #[tokio::test]
    async fn test_filter_does_not_change_overall_percent() {
        let f = fixture().await;
        f.dashboard.set_status("1", TaskStatus::Done).await;

        let filter = TaskFilter { status: Some(TaskStatus::Done), ..Default::default() };
        assert_eq!(f.dashboard.filter(&filter).await.len(), 1);

        let report = f.dashboard.export(&filter).await;
        assert_eq!(report.percent, 25);
        assert_eq!(report.done_count, 1);
        assert_eq!(report.remaining_count, 0);
    }

    #[tokio::test]
    async fn test_deleting_collaborator_clears_assignments() {
        let f = fixture().await;
        let ana = f
            .dashboard
            .add_collaborator(NewCollaborator { name: "Ana".into(), ..Default::default() })
            .await
            .unwrap();

        f.dashboard.assign("1", Some(&ana.id)).await.unwrap();
        let outcome = f.dashboard.assign_category("Billing", Some(&ana.id)).await.unwrap();
        assert_eq!(outcome.applied, vec!["3", "4"]);

        let filter = TaskFilter { assignee: Some(ana.id.clone()), ..Default::default() };
        assert_eq!(f.dashboard.filter(&filter).await.len(), 3);

        assert!(f.dashboard.delete_collaborator(&ana.id).await);
        assert!(f.dashboard.collaborators().await.is_empty());
        assert!(f.dashboard.tasks().await.iter().all(|t| t.assignee.is_none()));

        f.dashboard.refresh().await;
        assert!(f.dashboard.tasks().await.iter().all(|t| t.assignee.is_none()));
    }

    #[tokio::test]
    async fn test_refresh_drops_assignments_to_unknown_collaborators() {
        let f = fixture().await;
        let ana = f
            .dashboard
            .add_collaborator(NewCollaborator { name: "Ana".into(), ..Default::default() })
            .await
            .unwrap();
        f.dashboard.assign("1", Some(&ana.id)).await.unwrap();
        f.remote.seed_assignment("2", "removed-elsewhere");

        f.dashboard.refresh().await;
        assert_eq!(f.dashboard.task("1").await.unwrap().assignee, Some(ana.id));
        assert_eq!(f.dashboard.task("2").await.unwrap().assignee, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_status_changes_agree_in_every_store() {
        let manifest: String = std::iter::once("tasks:\n".to_string())
            .chain((0..40).map(|i| format!("  - {{ id: \"t{i}\", label: \"Task {i}\", category: \"Bulk\" }}\n")))
            .collect();
        let remote = Arc::new(MemoryRemote::default());
        let local = Arc::new(LocalStore::in_memory());
        let dashboard = Arc::new(
            Dashboard::load(
                "Desk",
                Manifest::from_yaml(&manifest).unwrap(),
                Some(remote.clone() as Arc<dyn RemoteStore>),
                Arc::clone(&local),
                Arc::new(RecordingSink::default()),
            )
            .await,
        );

        let handles: Vec<_> = (0..40)
            .map(|i| {
                let dashboard = Arc::clone(&dashboard);
                tokio::spawn(async move { dashboard.set_status(&format!("t{i}"), TaskStatus::Done).await })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().is_some());
        }

        assert_eq!(dashboard.stats().await.completed, 40);
        let persisted: StatusMap = local.get_entries(crate::store::STATE_KEY).await;
        assert_eq!(persisted.len(), 40);
        assert!(persisted.values().all(|s| *s == TaskStatus::Done));
        let stored = remote.fetch_statuses().await.unwrap();
        assert_eq!(stored, persisted);
    }

    #[tokio::test]
    async fn test_assign_validates_ids() {
        let f = fixture().await;
        assert!(matches!(
            f.dashboard.assign("nope", None).await,
            Err(DashboardError::UnknownTask(_))
        ));
        assert!(matches!(
            f.dashboard.assign("1", Some("ghost")).await,
            Err(DashboardError::UnknownCollaborator(_))
        ));
        assert!(f.dashboard.assign("1", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_save_estimate_updates_task() {
        let f = fixture().await;
        let input = EstimateInput { estimated_cost: Some("1.234,56".into()), ..Default::default() };

        let (estimate, remote_ok) = f.dashboard.save_estimate("4", input).await.unwrap();
        assert!(remote_ok);
        assert_eq!(estimate.estimated_cost, Some(1234.56));
        assert_eq!(f.dashboard.task("4").await.unwrap().estimate, Some(estimate.clone()));
        assert_eq!(f.dashboard.estimate("4").await.unwrap(), Some(estimate));

        let bad = EstimateInput { estimated_cost: Some("lots".into()), ..Default::default() };
        assert!(matches!(
            f.dashboard.save_estimate("4", bad).await,
            Err(DashboardError::Estimate(EstimateError::InvalidCost(_)))
        ));
        assert!(matches!(
            f.dashboard.save_estimate("x", EstimateInput::default()).await,
            Err(DashboardError::UnknownTask(_))
        ));
    }

    #[tokio::test]
    async fn test_recent_activity_records_changes() {
        let f = fixture().await;
        f.dashboard.set_status("1", TaskStatus::Doing).await;
        f.dashboard.set_status("3", TaskStatus::Done).await;

        let activity = f.dashboard.recent_activity().await;
        assert_eq!(activity.len(), 2);
        assert_eq!(activity[0].task_id, "3");
        assert_eq!(activity[0].label, "Invoices");
    }

    #[test]
    fn test_busy_guard_is_reference_counted() {
        let busy = BusySet::default();
        let first = busy.enter("1");
        let second = busy.enter("1");
        drop(first);
        assert!(busy.contains("1"));
        drop(second);
        assert!(!busy.contains("1"));
    }
}
