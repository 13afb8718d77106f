//! Status reconciliation between the remote store and the local cache.
//!
//! Merge policy: remote values override local values per key, keys present
//! only locally are kept. This is last-writer-wins per task at the remote
//! store; two clients racing on the same task end with whichever upsert
//! landed last.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use super::{LocalStore, RemoteStore, StoreError};
use crate::checklist::{StatusMap, TaskId};

/// Local cache key holding `{task_id -> status}`.
pub const STATE_KEY: &str = "checklist_state";

/// Outcome of the remote half of a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RemoteLeg {
    /// Every changed key was upserted.
    Synced { upserted: usize },
    /// These keys could not be upserted and will be retried on the next write.
    Failed { failed: Vec<TaskId> },
    /// No remote store configured.
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    pub remote: RemoteLeg,
}

impl WriteReport {
    pub fn remote_ok(&self) -> bool {
        matches!(self.remote, RemoteLeg::Synced { .. })
    }
}

/// Produces one authoritative status map from both stores and writes back to both.
pub struct Reconciler {
    remote: Option<Arc<dyn RemoteStore>>,
    local: Arc<LocalStore>,
    /// Last values known to be in the remote store.
    synced: Mutex<StatusMap>,
    remote_down: AtomicBool,
}

impl Reconciler {
    pub fn new(remote: Option<Arc<dyn RemoteStore>>, local: Arc<LocalStore>) -> Self {
        Self {
            remote,
            local,
            synced: Mutex::new(StatusMap::new()),
            remote_down: AtomicBool::new(false),
        }
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Local snapshot, skipping malformed entries.
    pub async fn read_local(&self) -> StatusMap {
        self.local.get_entries(STATE_KEY).await
    }

    /// Merged view. Never fails: a remote failure yields the local snapshot.
    pub async fn read(&self) -> StatusMap {
        let mut merged = self.read_local().await;

        let Some(remote) = &self.remote else {
            return merged;
        };

        match remote.fetch_statuses().await {
            Ok(remote_map) => {
                self.mark_remote_up();
                let mut synced = self.synced.lock().await;
                *synced = remote_map.clone();
                merged.extend(remote_map);
                merged
            }
            Err(e) => {
                self.mark_remote_down(&e);
                merged
            }
        }
    }

    /// Persist locally, then upsert each changed key remotely.
    ///
    /// `touched` is upserted even when it matches the last known remote value,
    /// since another client may have changed it since our last read. The
    /// local write always takes effect. Remote upserts are independent: a
    /// failure on one key neither stops the others nor rolls anything back.
    pub async fn write(&self, statuses: &StatusMap, touched: Option<&str>) -> WriteReport {
        self.local.set(STATE_KEY, statuses).await;

        let Some(remote) = &self.remote else {
            return WriteReport { remote: RemoteLeg::Disabled };
        };

        // Held across the upserts so overlapping writes reach the remote in order.
        let mut synced = self.synced.lock().await;
        let changed: Vec<(&TaskId, _)> = statuses
            .iter()
            .filter(|(id, status)| touched == Some(id.as_str()) || synced.get(*id) != Some(*status))
            .collect();

        let mut upserted = 0;
        let mut failed = Vec::new();
        let mut last_error = None;
        for (id, status) in changed {
            match remote.upsert_status(id, *status).await {
                Ok(()) => {
                    synced.insert(id.clone(), *status);
                    upserted += 1;
                }
                Err(e) => {
                    tracing::debug!(task_id = %id, error = %e, "Remote status upsert failed");
                    failed.push(id.clone());
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => {
                self.mark_remote_down(&e);
                WriteReport { remote: RemoteLeg::Failed { failed } }
            }
            None => {
                self.mark_remote_up();
                WriteReport { remote: RemoteLeg::Synced { upserted } }
            }
        }
    }

    fn mark_remote_down(&self, error: &StoreError) {
        if !self.remote_down.swap(true, Ordering::SeqCst) {
            tracing::warn!(
                "Remote store unavailable, continuing with local state only: {}",
                error
            );
        } else {
            tracing::debug!("Remote store still unavailable: {}", error);
        }
    }

    fn mark_remote_up(&self) {
        if self.remote_down.swap(false, Ordering::SeqCst) {
            tracing::info!("Remote store reachable again");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checklist::TaskStatus;
    use crate::store::memory::MemoryRemote;

    fn map(entries: &[(&str, TaskStatus)]) -> StatusMap {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn setup() -> (Arc<MemoryRemote>, Arc<LocalStore>, Reconciler) {
        let remote = Arc::new(MemoryRemote::default());
        let local = Arc::new(LocalStore::in_memory());
        let reconciler = Reconciler::new(
            Some(remote.clone() as Arc<dyn RemoteStore>),
            Arc::clone(&local),
        );
        (remote, local, reconciler)
    }

    #[tokio::test]
    async fn test_remote_overrides_local_and_keeps_local_only_keys() {
        let (remote, local, reconciler) = setup();
        local
            .set(STATE_KEY, &map(&[("a", TaskStatus::Pending), ("b", TaskStatus::Doing)]))
            .await;
        remote.seed_statuses(map(&[("a", TaskStatus::Done), ("c", TaskStatus::Doing)]));

        let merged = reconciler.read().await;
        assert_eq!(
            merged,
            map(&[("a", TaskStatus::Done), ("b", TaskStatus::Doing), ("c", TaskStatus::Doing)])
        );
    }

    #[tokio::test]
    async fn test_remote_failure_on_read_returns_local() {
        let (remote, local, reconciler) = setup();
        local.set(STATE_KEY, &map(&[("a", TaskStatus::Doing)])).await;
        remote.seed_statuses(map(&[("a", TaskStatus::Done)]));
        remote.set_failing(true);

        assert_eq!(reconciler.read().await, map(&[("a", TaskStatus::Doing)]));
    }

    #[tokio::test]
    async fn test_local_write_survives_remote_failure() {
        let (remote, _local, reconciler) = setup();
        remote.set_failing(true);

        let report = reconciler.write(&map(&[("a", TaskStatus::Done)]), None).await;
        assert_eq!(report.remote, RemoteLeg::Failed { failed: vec!["a".to_string()] });
        assert!(!report.remote_ok());

        assert_eq!(reconciler.read().await, map(&[("a", TaskStatus::Done)]));
    }

    #[tokio::test]
    async fn test_only_changed_keys_are_upserted_and_failures_retry() {
        let (remote, _local, reconciler) = setup();
        remote.seed_statuses(map(&[("a", TaskStatus::Pending), ("b", TaskStatus::Pending)]));
        reconciler.read().await;

        let report = reconciler
            .write(&map(&[("a", TaskStatus::Done), ("b", TaskStatus::Pending)]), None)
            .await;
        assert_eq!(report.remote, RemoteLeg::Synced { upserted: 1 });
        assert_eq!(remote.status_upserts(), 1);

        remote.set_failing(true);
        let state = map(&[("a", TaskStatus::Done), ("b", TaskStatus::Doing)]);
        let report = reconciler.write(&state, None).await;
        assert_eq!(report.remote, RemoteLeg::Failed { failed: vec!["b".to_string()] });

        remote.set_failing(false);
        let report = reconciler.write(&state, None).await;
        assert_eq!(report.remote, RemoteLeg::Synced { upserted: 1 });
        assert_eq!(remote.fetch_statuses().await.unwrap(), state);
    }

    #[tokio::test]
    async fn test_touched_key_is_upserted_even_when_unchanged() {
        let (remote, _local, reconciler) = setup();
        remote.seed_statuses(map(&[("a", TaskStatus::Done), ("b", TaskStatus::Pending)]));
        reconciler.read().await;

        // Another client moves "a" after our read.
        remote.seed_statuses(map(&[("a", TaskStatus::Pending), ("b", TaskStatus::Pending)]));

        let state = map(&[("a", TaskStatus::Done), ("b", TaskStatus::Pending)]);
        let report = reconciler.write(&state, Some("a")).await;
        assert_eq!(report.remote, RemoteLeg::Synced { upserted: 1 });
        assert_eq!(remote.fetch_statuses().await.unwrap(), state);
        assert_eq!(reconciler.read().await["a"], TaskStatus::Done);
    }

    #[tokio::test]
    async fn test_without_remote_is_local_only() {
        let local = Arc::new(LocalStore::in_memory());
        let reconciler = Reconciler::new(None, Arc::clone(&local));
        assert!(!reconciler.has_remote());

        let report = reconciler.write(&map(&[("a", TaskStatus::Doing)]), None).await;
        assert_eq!(report.remote, RemoteLeg::Disabled);
        assert_eq!(reconciler.read().await, map(&[("a", TaskStatus::Doing)]));
    }
}
