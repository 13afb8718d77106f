//! Supabase client for the PostgREST API.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::{RemoteStore, StoreError};
use crate::activity::ActivityRecord;
use crate::checklist::{StatusMap, TaskDefinition, TaskStatus};
use crate::collaborators::{Collaborator, CollaboratorChanges};
use crate::estimates::Estimate;
use crate::repository::RepoConfig;

const TASKS_TABLE: &str = "checklist_tasks";
const STATE_TABLE: &str = "checklist_state";
const ESTIMATES_TABLE: &str = "task_estimates";
const COLLABORATORS_TABLE: &str = "checklist_collaborators";
const REPO_TABLE: &str = "project_repo";
const ACTIVITY_TABLE: &str = "checklist_activity";

/// Matches every row of the repo pointer table (its ids are UUIDs).
const NIL_UUID: &str = "00000000-0000-0000-0000-000000000000";

/// Supabase client for database operations.
pub struct SupabaseClient {
    client: Client,
    url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct StateRow {
    task_id: String,
    status: TaskStatus,
}

#[derive(Deserialize)]
struct AssignmentRow {
    id: String,
    #[serde(default)]
    assigned_to: Option<String>,
}

impl SupabaseClient {
    /// Create a new Supabase client.
    pub fn new(url: &str, api_key: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Get the PostgREST URL.
    fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.url)
    }

    fn request(&self, method: Method, path_and_query: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.rest_url(), path_and_query))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn send(builder: RequestBuilder) -> Result<String, StoreError> {
        let resp = builder.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }

    /// GET rows and decode them one by one, skipping rows that fail validation.
    async fn select<T: DeserializeOwned>(&self, table: &str, query: &str) -> Result<Vec<T>, StoreError> {
        let text = Self::send(self.request(Method::GET, &format!("{}?{}", table, query))).await?;
        let rows: Vec<Value> = serde_json::from_str(&text)?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value(row) {
                Ok(decoded) => Some(decoded),
                Err(e) => {
                    tracing::warn!(table, error = %e, "Skipping malformed remote row");
                    None
                }
            })
            .collect())
    }

    /// POST with `on_conflict` merge semantics.
    async fn upsert(&self, table: &str, on_conflict: &str, body: &Value) -> Result<(), StoreError> {
        let builder = self
            .request(Method::POST, &format!("{}?on_conflict={}", table, on_conflict))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(body);
        Self::send(builder).await.map(|_| ())
    }

    async fn insert(&self, table: &str, body: &Value) -> Result<(), StoreError> {
        let builder = self
            .request(Method::POST, table)
            .header("Prefer", "return=minimal")
            .json(body);
        Self::send(builder).await.map(|_| ())
    }

    async fn patch(&self, table: &str, filter: &str, body: &Value) -> Result<(), StoreError> {
        let builder = self
            .request(Method::PATCH, &format!("{}?{}", table, filter))
            .json(body);
        Self::send(builder).await.map(|_| ())
    }

    async fn delete(&self, table: &str, filter: &str) -> Result<(), StoreError> {
        Self::send(self.request(Method::DELETE, &format!("{}?{}", table, filter)))
            .await
            .map(|_| ())
    }
}

fn eq(column: &str, value: &str) -> String {
    format!("{}=eq.{}", column, urlencoding::encode(value))
}

#[async_trait]
impl RemoteStore for SupabaseClient {
    // ==================== Status ====================

    async fn fetch_statuses(&self) -> Result<StatusMap, StoreError> {
        let rows: Vec<StateRow> = self.select(STATE_TABLE, "select=task_id,status").await?;
        Ok(rows
            .into_iter()
            .filter(|r| !r.task_id.is_empty())
            .map(|r| (r.task_id, r.status))
            .collect())
    }

    async fn upsert_status(&self, task_id: &str, status: TaskStatus) -> Result<(), StoreError> {
        let body = serde_json::json!({
            "task_id": task_id,
            "status": status,
            "updated_at": chrono::Utc::now(),
        });
        self.upsert(STATE_TABLE, "task_id", &body).await
    }

    // ==================== Task definitions ====================

    async fn ensure_tasks(&self, tasks: &[TaskDefinition]) -> Result<(), StoreError> {
        if tasks.is_empty() {
            return Ok(());
        }
        let rows: Vec<Value> = tasks
            .iter()
            .map(|t| serde_json::json!({ "id": t.id, "label": t.label, "category": t.category }))
            .collect();

        let builder = self
            .request(Method::POST, &format!("{}?on_conflict=id", TASKS_TABLE))
            .header("Prefer", "resolution=ignore-duplicates,return=minimal")
            .json(&rows);
        Self::send(builder).await.map(|_| ())
    }

    async fn fetch_assignments(&self) -> Result<BTreeMap<String, Option<String>>, StoreError> {
        let rows: Vec<AssignmentRow> = self.select(TASKS_TABLE, "select=id,assigned_to").await?;
        Ok(rows.into_iter().map(|r| (r.id, r.assigned_to)).collect())
    }

    async fn set_assignment(&self, task_id: &str, collaborator_id: Option<&str>) -> Result<(), StoreError> {
        let body = serde_json::json!({ "assigned_to": collaborator_id });
        self.patch(TASKS_TABLE, &eq("id", task_id), &body).await
    }

    async fn clear_assignments_to(&self, collaborator_id: &str) -> Result<(), StoreError> {
        let body = serde_json::json!({ "assigned_to": Value::Null });
        self.patch(TASKS_TABLE, &eq("assigned_to", collaborator_id), &body).await
    }

    // ==================== Estimates ====================

    async fn fetch_estimates(&self) -> Result<Vec<Estimate>, StoreError> {
        self.select(ESTIMATES_TABLE, "select=*&order=updated_at.desc").await
    }

    async fn fetch_estimate(&self, task_id: &str) -> Result<Option<Estimate>, StoreError> {
        let rows: Vec<Estimate> = self
            .select(ESTIMATES_TABLE, &format!("select=*&{}&limit=1", eq("task_id", task_id)))
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn upsert_estimate(&self, estimate: &Estimate) -> Result<(), StoreError> {
        self.upsert(ESTIMATES_TABLE, "task_id", &serde_json::to_value(estimate)?)
            .await
    }

    // ==================== Collaborators ====================

    async fn list_collaborators(&self) -> Result<Vec<Collaborator>, StoreError> {
        self.select(COLLABORATORS_TABLE, "select=*&order=name").await
    }

    async fn insert_collaborator(&self, collaborator: &Collaborator) -> Result<(), StoreError> {
        self.insert(COLLABORATORS_TABLE, &serde_json::to_value(collaborator)?)
            .await
    }

    async fn update_collaborator(&self, id: &str, changes: &CollaboratorChanges) -> Result<(), StoreError> {
        self.patch(COLLABORATORS_TABLE, &eq("id", id), &serde_json::to_value(changes)?)
            .await
    }

    async fn delete_collaborator(&self, id: &str) -> Result<(), StoreError> {
        self.delete(COLLABORATORS_TABLE, &eq("id", id)).await
    }

    // ==================== Repository ====================

    async fn fetch_repo(&self) -> Result<Option<RepoConfig>, StoreError> {
        let rows: Vec<RepoConfig> = self
            .select(
                REPO_TABLE,
                "select=repo_url,owner,repo_name&order=created_at.desc&limit=1",
            )
            .await?;
        Ok(rows.into_iter().find(|r| !r.repo_url.is_empty()))
    }

    async fn replace_repo(&self, repo: &RepoConfig) -> Result<(), StoreError> {
        self.delete(REPO_TABLE, &format!("id=neq.{}", NIL_UUID)).await?;
        self.insert(REPO_TABLE, &serde_json::to_value(repo)?).await
    }

    // ==================== Activity ====================

    async fn insert_activity(&self, record: &ActivityRecord) -> Result<(), StoreError> {
        self.insert(ACTIVITY_TABLE, &serde_json::to_value(record)?).await
    }

    async fn list_activity(&self, task_id: Option<&str>, limit: usize) -> Result<Vec<ActivityRecord>, StoreError> {
        let mut query = format!("select=*&order=created_at.desc&limit={}", limit);
        if let Some(task_id) = task_id {
            query.push('&');
            query.push_str(&eq("task_id", task_id));
        }
        self.select(ACTIVITY_TABLE, &query).await
    }
}
