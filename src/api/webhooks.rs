//! Inbound automation callbacks and the activity log they feed.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::routes::AppState;
use crate::activity::{ActivityRecord, CallbackRecord};

const DEFAULT_ACTIVITY_LIMIT: usize = 50;
const MAX_ACTIVITY_LIMIT: usize = 100;

/// Create webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/callback", post(receive_callback))
        .route("/last", get(last_callback))
}

#[derive(Debug, Serialize)]
pub struct CallbackAck {
    pub ok: bool,
    /// Whether an activity row was written to the remote store.
    pub recorded: bool,
}

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub task_id: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ActivityList {
    /// `remote` or `memory`.
    pub source: &'static str,
    pub items: Vec<ActivityRecord>,
}

/// POST /api/webhooks/callback - Keep the body and log it as activity.
async fn receive_callback(State(state): State<Arc<AppState>>, Json(body): Json<Value>) -> Json<CallbackAck> {
    let record = CallbackRecord::new(body, Utc::now());
    let activity = record.to_activity();
    *state.last_callback.write().await = Some(record);

    let mut recorded = false;
    match (&state.remote, activity) {
        (Some(remote), Some(activity)) => match remote.insert_activity(&activity).await {
            Ok(()) => recorded = true,
            Err(e) => tracing::warn!(task_id = %activity.task_id, error = %e, "Failed to record callback activity"),
        },
        (_, None) => tracing::debug!("Callback does not name a task, kept in memory only"),
        (None, Some(_)) => tracing::debug!("No remote store, callback kept in memory only"),
    }

    Json(CallbackAck { ok: true, recorded })
}

/// GET /api/webhooks/last - Latest callback body, or `null`.
async fn last_callback(State(state): State<Arc<AppState>>) -> Json<Option<CallbackRecord>> {
    Json(state.last_callback.read().await.clone())
}

/// GET /api/activity - Remote activity rows, falling back to the latest callback.
pub(super) async fn list_activity(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ActivityQuery>,
) -> Json<ActivityList> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
        .clamp(1, MAX_ACTIVITY_LIMIT);
    let task_id = query.task_id.as_deref().filter(|id| !id.is_empty());

    if let Some(remote) = &state.remote {
        match remote.list_activity(task_id, limit).await {
            Ok(items) => return Json(ActivityList { source: "remote", items }),
            Err(e) => tracing::warn!(error = %e, "Activity read failed, using latest callback"),
        }
    }

    let items = state
        .last_callback
        .read()
        .await
        .as_ref()
        .and_then(CallbackRecord::to_activity)
        .filter(|a| task_id.map(|id| a.task_id == id).unwrap_or(true))
        .into_iter()
        .collect();
    Json(ActivityList { source: "memory", items })
}
