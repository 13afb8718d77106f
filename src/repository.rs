//! Active repository pointer: the single code repository the checklist tracks.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::github::parse_repo_url;
use crate::store::{LocalStore, RemoteStore};

pub const REPO_KEY: &str = "checklist_project_repo";

#[derive(Debug, Error, PartialEq)]
pub enum RepoError {
    #[error("Not a repository reference: {0:?} (expected owner/repo or a GitHub URL)")]
    Unrecognized(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfig {
    pub repo_url: String,
    pub owner: String,
    pub repo_name: String,
}

pub struct RepoPointer {
    remote: Option<Arc<dyn RemoteStore>>,
    local: Arc<LocalStore>,
}

impl RepoPointer {
    pub fn new(remote: Option<Arc<dyn RemoteStore>>, local: Arc<LocalStore>) -> Self {
        Self { remote, local }
    }

    /// Remote pointer if available, local copy otherwise.
    pub async fn get(&self) -> Option<RepoConfig> {
        if let Some(remote) = &self.remote {
            match remote.fetch_repo().await {
                Ok(Some(repo)) => return Some(repo),
                Ok(None) => {}
                Err(e) => tracing::debug!(error = %e, "Remote repository read failed"),
            }
        }
        self.local.get(REPO_KEY).await
    }

    /// Parse `input` and make it the active repository.
    pub async fn set(&self, input: &str) -> Result<RepoConfig, RepoError> {
        let parsed = parse_repo_url(input).ok_or_else(|| RepoError::Unrecognized(input.to_string()))?;
        let config = RepoConfig {
            repo_url: input.trim().to_string(),
            owner: parsed.owner,
            repo_name: parsed.repo,
        };

        self.local.set(REPO_KEY, &config).await;

        if let Some(remote) = &self.remote {
            if let Err(e) = remote.replace_repo(&config).await {
                tracing::warn!(error = %e, "Remote repository save failed, kept local copy");
            }
        }

        tracing::info!(owner = %config.owner, repo = %config.repo_name, "Active repository set");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryRemote;

    #[tokio::test]
    async fn test_set_then_get_with_and_without_remote() {
        let remote = Arc::new(MemoryRemote::default());
        let local = Arc::new(LocalStore::in_memory());
        let pointer = RepoPointer::new(Some(remote.clone() as Arc<dyn RemoteStore>), local);

        assert!(pointer.get().await.is_none());

        let config = pointer.set("https://github.com/acme/desk.git").await.unwrap();
        assert_eq!(config.owner, "acme");
        assert_eq!(config.repo_name, "desk");
        assert_eq!(pointer.get().await, Some(config.clone()));

        remote.set_failing(true);
        assert_eq!(pointer.get().await, Some(config));
    }

    #[tokio::test]
    async fn test_rejects_unparseable_input() {
        let pointer = RepoPointer::new(None, Arc::new(LocalStore::in_memory()));
        assert!(matches!(pointer.set("not a repo").await, Err(RepoError::Unrecognized(_))));
        assert!(pointer.get().await.is_none());
    }
}
