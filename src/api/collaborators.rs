//! Collaborator roster API endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};

use super::routes::{error_response, AppState};
use crate::collaborators::{Collaborator, CollaboratorPatch, NewCollaborator};

/// Create collaborator routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_collaborators).post(add_collaborator))
        .route("/:id", patch(update_collaborator).delete(delete_collaborator))
}

/// GET /api/collaborators - Roster sorted by name.
async fn list_collaborators(State(state): State<Arc<AppState>>) -> Json<Vec<Collaborator>> {
    Json(state.dashboard.collaborators().await)
}

/// POST /api/collaborators - Add a collaborator.
async fn add_collaborator(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewCollaborator>,
) -> Result<(StatusCode, Json<Collaborator>), (StatusCode, String)> {
    let collaborator = state
        .dashboard
        .add_collaborator(req)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(collaborator)))
}

/// PATCH /api/collaborators/:id - Partial update.
async fn update_collaborator(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CollaboratorPatch>,
) -> Result<Json<Collaborator>, (StatusCode, String)> {
    state
        .dashboard
        .update_collaborator(&id, req)
        .await
        .map_err(error_response)?
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Collaborator {} not found", id)))
}

/// DELETE /api/collaborators/:id - Remove a collaborator and its assignments.
async fn delete_collaborator(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    if state.dashboard.delete_collaborator(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, format!("Collaborator {} not found", id)))
    }
}
