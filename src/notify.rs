//! Outbound event notifications.
//!
//! Events are posted as `{event, timestamp, payload}` to a single configured
//! endpoint. Delivery is fire-and-forget: failures are logged and dropped,
//! never retried, and never undo the change that triggered them.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::checklist::{CategoryStats, ProjectStats, Task, TaskStatus};

/// Event name for a task status transition.
pub const STATUS_CHANGE_EVENT: &str = "checklist_status_change";

/// ISO-8601 UTC timestamp with millisecond precision.
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Destination for outbound events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one event. Returns whether it was delivered; never fails.
    async fn emit(&self, event: &str, payload: Value) -> bool;
}

/// Wire envelope.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    pub event: String,
    pub timestamp: String,
    pub payload: Value,
}

impl EventEnvelope {
    pub fn new(event: &str, payload: Value, at: DateTime<Utc>) -> Self {
        Self {
            event: event.to_string(),
            timestamp: iso_timestamp(at),
            payload,
        }
    }
}

/// Posts events to a webhook URL.
pub struct WebhookNotifier {
    client: Client,
    endpoint: Option<String>,
    missing_warned: AtomicBool,
}

impl WebhookNotifier {
    pub fn new(endpoint: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            endpoint: endpoint.filter(|e| !e.trim().is_empty()),
            missing_warned: AtomicBool::new(false),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }
}

#[async_trait]
impl EventSink for WebhookNotifier {
    async fn emit(&self, event: &str, payload: Value) -> bool {
        let Some(endpoint) = &self.endpoint else {
            if !self.missing_warned.swap(true, Ordering::SeqCst) {
                tracing::warn!("Webhook endpoint not configured (WEBHOOK_URL), events are not sent");
            }
            return false;
        };

        let envelope = EventEnvelope::new(event, payload, Utc::now());
        match self.client.post(endpoint).json(&envelope).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!(event, "Event delivered");
                true
            }
            Ok(resp) => {
                tracing::warn!(event, status = %resp.status(), "Webhook rejected event");
                false
            }
            Err(e) => {
                tracing::warn!(event, error = %e, "Webhook delivery failed");
                false
            }
        }
    }
}

/// Task details carried in a status-change event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionItem {
    pub id: String,
    pub label: String,
    pub category: String,
    pub status_previous: TaskStatus,
    pub status_new: TaskStatus,
    /// `"prev -> new"`.
    pub transition: String,
    pub priority: Option<crate::checklist::Priority>,
    pub difficulty: Option<crate::checklist::Difficulty>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub impacted_files: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransitionStats {
    pub total: usize,
    pub completed: usize,
    pub doing: usize,
    pub pending: usize,
    pub percent: u32,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionMeta {
    pub timestamp: String,
    pub categories_count: usize,
    pub items_count: usize,
}

/// Payload of a [`STATUS_CHANGE_EVENT`]. All statistics are post-transition.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangePayload {
    pub project: String,
    pub source: String,
    pub item: TransitionItem,
    pub stats: TransitionStats,
    pub stats_by_category: BTreeMap<String, CategoryStats>,
    pub meta: TransitionMeta,
}

impl StatusChangePayload {
    pub fn new(
        project: &str,
        task: &Task,
        from: TaskStatus,
        to: TaskStatus,
        stats_after: &ProjectStats,
        by_category_after: BTreeMap<String, CategoryStats>,
        at: DateTime<Utc>,
    ) -> Self {
        let impacted_files = if task.impacted_files.is_empty() {
            None
        } else {
            Some(task.impacted_files.clone())
        };

        Self {
            project: project.to_string(),
            source: "checklist-dashboard".to_string(),
            item: TransitionItem {
                id: task.id.clone(),
                label: task.label.clone(),
                category: task.category.clone(),
                status_previous: from,
                status_new: to,
                transition: format!("{} -> {}", from, to),
                priority: task.priority,
                difficulty: task.difficulty,
                description: task.description.clone(),
                location: task.location.clone(),
                impacted_files,
            },
            stats: TransitionStats {
                total: stats_after.total,
                completed: stats_after.completed,
                doing: stats_after.doing,
                pending: stats_after.pending,
                percent: stats_after.percent,
                summary: stats_after.summary(),
            },
            meta: TransitionMeta {
                timestamp: iso_timestamp(at),
                categories_count: by_category_after.len(),
                items_count: stats_after.total,
            },
            stats_by_category: by_category_after,
        }
    }
}
