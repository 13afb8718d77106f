//! Activity: the recent status-change feed and inbound automation callbacks.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::checklist::TaskStatus;

/// Number of entries kept in the recent activity feed.
pub const RECENT_ACTIVITY_LEN: usize = 4;

/// One line of the recent status-change feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentActivity {
    pub task_id: String,
    pub label: String,
    pub status: TaskStatus,
    pub at: DateTime<Utc>,
}

/// Bounded newest-first feed.
#[derive(Debug, Default)]
pub struct ActivityFeed {
    entries: VecDeque<RecentActivity>,
}

impl ActivityFeed {
    pub fn push(&mut self, entry: RecentActivity) {
        self.entries.push_front(entry);
        self.entries.truncate(RECENT_ACTIVITY_LEN);
    }

    pub fn entries(&self) -> Vec<RecentActivity> {
        self.entries.iter().cloned().collect()
    }
}

/// Activity row stored remotely for an inbound callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub task_id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default = "default_event_type")]
    pub event_type: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub agent_response: Option<String>,
    #[serde(default)]
    pub agent_response_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub git_url: Option<String>,
    /// Assigned by the remote store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_event_type() -> String {
    "status_change".to_string()
}

/// Latest callback body received, kept in memory.
#[derive(Debug, Clone, Serialize)]
pub struct CallbackRecord {
    pub received_at: DateTime<Utc>,
    pub body: Value,
}

fn first_str(body: &Value, pointers: &[&str]) -> Option<String> {
    pointers
        .iter()
        .filter_map(|p| body.pointer(p))
        .find_map(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

impl CallbackRecord {
    pub fn new(body: Value, received_at: DateTime<Utc>) -> Self {
        Self { received_at, body }
    }

    /// Task named by the callback, under any of the accepted field names.
    pub fn task_id(&self) -> Option<String> {
        first_str(&self.body, &["/task_id", "/item/id", "/itemId"])
    }

    /// Activity row for this callback, if it names a task.
    pub fn to_activity(&self) -> Option<ActivityRecord> {
        let task_id = self.task_id()?;
        let agent_response = first_str(&self.body, &["/agent_response", "/agentResponse", "/response"]);
        Some(ActivityRecord {
            task_id,
            label: first_str(&self.body, &["/item/label", "/label"]),
            event_type: first_str(&self.body, &["/event_type"]).unwrap_or_else(default_event_type),
            payload: self.body.clone(),
            agent_response_at: agent_response.as_ref().map(|_| self.received_at),
            agent_response,
            git_url: first_str(&self.body, &["/git_url", "/gitUrl", "/git_ref"]),
            created_at: Some(self.received_at),
        })
    }
}
