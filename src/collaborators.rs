//! Collaborator roster and task assignments.
//!
//! Reads prefer the remote store and fall back to the local cache; writes go
//! to the local cache first and then to the remote store. Ids are minted here
//! as v4 UUIDs so both copies of a collaborator share one identity.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::store::{LocalStore, RemoteStore};

pub const COLLABORATORS_KEY: &str = "checklist_collaborators";
pub const ASSIGNMENTS_KEY: &str = "checklist_assignments";

#[derive(Debug, Error, PartialEq)]
pub enum RosterError {
    #[error("Collaborator name must not be empty")]
    EmptyName,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collaborator {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role_label: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Form input for a new collaborator.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCollaborator {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role_label: Option<String>,
}

/// Partial update as submitted. An empty email or role clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollaboratorPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role_label: Option<String>,
}

/// Normalized update. `Some(None)` clears a field; `None` leaves it alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CollaboratorChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_label: Option<Option<String>>,
}

impl CollaboratorChanges {
    pub fn apply(&self, collaborator: &mut Collaborator) {
        if let Some(name) = &self.name {
            collaborator.name = name.clone();
        }
        if let Some(email) = &self.email {
            collaborator.email = email.clone();
        }
        if let Some(role) = &self.role_label {
            collaborator.role_label = role.clone();
        }
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl CollaboratorPatch {
    fn normalize(self) -> Result<CollaboratorChanges, RosterError> {
        let name = match self.name {
            Some(name) if name.trim().is_empty() => return Err(RosterError::EmptyName),
            Some(name) => Some(name.trim().to_string()),
            None => None,
        };
        Ok(CollaboratorChanges {
            name,
            email: self.email.map(|e| trimmed(Some(e))),
            role_label: self.role_label.map(|r| trimmed(Some(r))),
        })
    }
}

/// Local cache record. `unsynced` marks a collaborator the remote store has
/// not accepted yet; it is pushed on the next successful remote read.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedCollaborator {
    #[serde(flatten)]
    collaborator: Collaborator,
    #[serde(default, skip_serializing_if = "is_false")]
    unsynced: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Collaborators and assignments backed by both stores.
pub struct Roster {
    remote: Option<Arc<dyn RemoteStore>>,
    local: Arc<LocalStore>,
}

impl Roster {
    pub fn new(remote: Option<Arc<dyn RemoteStore>>, local: Arc<LocalStore>) -> Self {
        Self { remote, local }
    }

    async fn local_list(&self) -> Vec<Collaborator> {
        let cached: Vec<CachedCollaborator> = self.local.get_list(COLLABORATORS_KEY).await;
        cached.into_iter().map(|c| c.collaborator).collect()
    }

    async fn local_assignments(&self) -> BTreeMap<String, String> {
        self.local.get_entries(ASSIGNMENTS_KEY).await
    }

    /// All collaborators, sorted by name.
    pub async fn list(&self) -> Vec<Collaborator> {
        if let Some(remote) = &self.remote {
            match remote.list_collaborators().await {
                Ok(rows) => return self.sync_from_remote(remote.as_ref(), rows).await,
                Err(e) => tracing::debug!(error = %e, "Remote roster read failed, using local copy"),
            }
        }
        let mut list = self.local_list().await;
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    /// Push collaborators added while the remote was down, then make the local
    /// copy mirror the remote rows plus whatever is still unsynced.
    async fn sync_from_remote(&self, remote: &dyn RemoteStore, mut rows: Vec<Collaborator>) -> Vec<Collaborator> {
        let cached: Vec<CachedCollaborator> = self.local.get_list(COLLABORATORS_KEY).await;
        let mut still_unsynced = Vec::new();
        for entry in cached.into_iter().filter(|c| c.unsynced) {
            let collaborator = entry.collaborator;
            if rows.iter().any(|r| r.id == collaborator.id) {
                continue;
            }
            match remote.insert_collaborator(&collaborator).await {
                Ok(()) => tracing::info!(id = %collaborator.id, "Pushed collaborator added while offline"),
                Err(e) => {
                    tracing::warn!(id = %collaborator.id, error = %e, "Remote collaborator insert still failing");
                    still_unsynced.push(collaborator.id.clone());
                }
            }
            rows.push(collaborator);
        }
        rows.sort_by(|a, b| a.name.cmp(&b.name));

        self.local
            .update_list(COLLABORATORS_KEY, |cached: &mut Vec<CachedCollaborator>| {
                // Added concurrently and not yet visible remotely.
                let pending: Vec<CachedCollaborator> = cached
                    .drain(..)
                    .filter(|c| c.unsynced && !rows.iter().any(|r| r.id == c.collaborator.id))
                    .collect();
                cached.extend(rows.iter().map(|c| CachedCollaborator {
                    collaborator: c.clone(),
                    unsynced: still_unsynced.contains(&c.id),
                }));
                cached.extend(pending);
            })
            .await;

        rows
    }

    pub async fn get(&self, id: &str) -> Option<Collaborator> {
        self.list().await.into_iter().find(|c| c.id == id)
    }

    pub async fn add(&self, input: NewCollaborator) -> Result<Collaborator, RosterError> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(RosterError::EmptyName);
        }

        let collaborator = Collaborator {
            id: Uuid::new_v4().to_string(),
            name,
            email: trimmed(input.email),
            role_label: trimmed(input.role_label),
            created_at: Utc::now(),
        };

        let entry = CachedCollaborator { collaborator: collaborator.clone(), unsynced: self.remote.is_some() };
        self.local
            .update_list(COLLABORATORS_KEY, |cached: &mut Vec<CachedCollaborator>| cached.push(entry))
            .await;

        if let Some(remote) = &self.remote {
            match remote.insert_collaborator(&collaborator).await {
                Ok(()) => {
                    self.local
                        .update_list(COLLABORATORS_KEY, |cached: &mut Vec<CachedCollaborator>| {
                            if let Some(c) = cached.iter_mut().find(|c| c.collaborator.id == collaborator.id) {
                                c.unsynced = false;
                            }
                        })
                        .await;
                }
                Err(e) => {
                    tracing::warn!(id = %collaborator.id, error = %e, "Remote collaborator insert failed, kept local copy");
                }
            }
        }

        tracing::info!(id = %collaborator.id, name = %collaborator.name, "Added collaborator");
        Ok(collaborator)
    }

    /// Apply a partial update. Returns the updated collaborator, or `None` if unknown.
    pub async fn update(&self, id: &str, patch: CollaboratorPatch) -> Result<Option<Collaborator>, RosterError> {
        let changes = patch.normalize()?;

        self.local
            .update_list(COLLABORATORS_KEY, |cached: &mut Vec<CachedCollaborator>| {
                if let Some(existing) = cached.iter_mut().find(|c| c.collaborator.id == id) {
                    changes.apply(&mut existing.collaborator);
                }
            })
            .await;

        if let Some(remote) = &self.remote {
            if let Err(e) = remote.update_collaborator(id, &changes).await {
                tracing::warn!(id, error = %e, "Remote collaborator update failed");
            }
        }

        Ok(self.get(id).await)
    }

    /// Remove a collaborator and every assignment pointing at it, in both stores.
    ///
    /// Returns `false` if the collaborator was not known.
    pub async fn delete(&self, id: &str) -> bool {
        let existed = self.get(id).await.is_some();

        self.local
            .update_list(COLLABORATORS_KEY, |cached: &mut Vec<CachedCollaborator>| {
                cached.retain(|c| c.collaborator.id != id)
            })
            .await;
        self.local
            .update_entries(ASSIGNMENTS_KEY, |assignments: &mut BTreeMap<String, String>| {
                assignments.retain(|_, assigned| assigned != id)
            })
            .await;

        if let Some(remote) = &self.remote {
            // Clear references before the row goes away.
            if let Err(e) = remote.clear_assignments_to(id).await {
                tracing::warn!(id, error = %e, "Remote assignment cleanup failed");
            }
            if let Err(e) = remote.delete_collaborator(id).await {
                tracing::warn!(id, error = %e, "Remote collaborator delete failed");
            }
        }

        if existed {
            tracing::info!(id, "Deleted collaborator");
        }
        existed
    }

    /// `{task_id -> collaborator_id}`: local copy overlaid by remote rows.
    ///
    /// A remote row that is unassigned removes the local entry. A successful
    /// remote read is written back so the offline copy follows it.
    pub async fn assignments(&self) -> BTreeMap<String, String> {
        if let Some(remote) = &self.remote {
            match remote.fetch_assignments().await {
                Ok(rows) => {
                    return self
                        .local
                        .update_entries(ASSIGNMENTS_KEY, |local: &mut BTreeMap<String, String>| {
                            for (task_id, assigned) in rows {
                                match assigned {
                                    Some(id) => local.insert(task_id, id),
                                    None => local.remove(&task_id),
                                };
                            }
                            local.clone()
                        })
                        .await;
                }
                Err(e) => tracing::debug!(error = %e, "Remote assignments read failed, using local copy"),
            }
        }
        self.local_assignments().await
    }

    /// Assign or unassign a task. Returns whether the remote leg succeeded.
    pub async fn assign(&self, task_id: &str, collaborator_id: Option<&str>) -> bool {
        self.local
            .update_entries(ASSIGNMENTS_KEY, |local: &mut BTreeMap<String, String>| {
                match collaborator_id {
                    Some(id) => local.insert(task_id.to_string(), id.to_string()),
                    None => local.remove(task_id),
                };
            })
            .await;

        match &self.remote {
            Some(remote) => match remote.set_assignment(task_id, collaborator_id).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(task_id, error = %e, "Remote assignment failed, kept local copy");
                    false
                }
            },
            None => false,
        }
    }
}
