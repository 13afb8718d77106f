//! Task and category endpoints.
//!
//! - List tasks (filtered)
//! - Change status, assign, estimate a single task
//! - Bulk status / assignment per category

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::routes::{error_response, AppState, TaskQuery};
use crate::checklist::{Task, TaskStatus};
use crate::dashboard::{BulkOutcome, StatusChange};
use crate::estimates::{Estimate, EstimateInput};

/// Create task routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_tasks))
        .route("/:id/status", post(set_status))
        .route("/:id/assignee", post(assign))
        .route("/:id/estimate", get(get_estimate).put(save_estimate))
}

/// Create per-category bulk routes.
pub fn category_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:category/status", post(set_category_status))
        .route("/:category/assignee", post(assign_category))
}

// ─────────────────────────────────────────────────────────────────────────────
// Request/Response Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: TaskStatus,
}

/// `collaborator_id: null` (or absent) unassigns.
#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    #[serde(default)]
    pub collaborator_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AssignResponse {
    pub task_id: String,
    pub collaborator_id: Option<String>,
    pub remote_ok: bool,
}

#[derive(Debug, Serialize)]
pub struct EstimateResponse {
    pub estimate: Estimate,
    pub remote_ok: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /api/tasks - Filtered task list in manifest order.
async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TaskQuery>,
) -> Result<Json<Vec<Task>>, (StatusCode, String)> {
    let filter = query.into_filter()?;
    Ok(Json(state.dashboard.filter(&filter).await))
}

/// POST /api/tasks/:id/status - Change a task's status.
async fn set_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<StatusChange>, (StatusCode, String)> {
    state
        .dashboard
        .set_status(&id, req.status)
        .await
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Task {} not found", id)))
}

/// POST /api/tasks/:id/assignee - Assign or unassign a task.
async fn assign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AssignRequest>,
) -> Result<Json<AssignResponse>, (StatusCode, String)> {
    let remote_ok = state
        .dashboard
        .assign(&id, req.collaborator_id.as_deref())
        .await
        .map_err(error_response)?;

    Ok(Json(AssignResponse {
        task_id: id,
        collaborator_id: req.collaborator_id,
        remote_ok,
    }))
}

/// GET /api/tasks/:id/estimate - `null` when none is saved.
async fn get_estimate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Option<Estimate>>, (StatusCode, String)> {
    state
        .dashboard
        .estimate(&id)
        .await
        .map(Json)
        .map_err(error_response)
}

/// PUT /api/tasks/:id/estimate - Save an estimate.
async fn save_estimate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(input): Json<EstimateInput>,
) -> Result<Json<EstimateResponse>, (StatusCode, String)> {
    let (estimate, remote_ok) = state
        .dashboard
        .save_estimate(&id, input)
        .await
        .map_err(error_response)?;
    Ok(Json(EstimateResponse { estimate, remote_ok }))
}

/// POST /api/categories/:category/status - Set every task in a category.
async fn set_category_status(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
    Json(req): Json<StatusRequest>,
) -> Json<BulkOutcome> {
    Json(state.dashboard.set_category_status(&category, req.status).await)
}

/// POST /api/categories/:category/assignee - Assign every task in a category.
async fn assign_category(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
    Json(req): Json<AssignRequest>,
) -> Result<Json<BulkOutcome>, (StatusCode, String)> {
    state
        .dashboard
        .assign_category(&category, req.collaborator_id.as_deref())
        .await
        .map(Json)
        .map_err(error_response)
}
