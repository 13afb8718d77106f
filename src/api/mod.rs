//! HTTP API for the checklist dashboard.
//!
//! ## Endpoints
//!
//! - `GET /api/health` - Liveness and configured backends
//! - `GET /api/tasks` - Filtered task list
//! - `POST /api/tasks/:id/status` - Change a task's status
//! - `GET /api/stats` - Overall and per-category progress
//! - `GET /api/export` - Downloadable progress report
//! - `/api/collaborators` - Roster management
//! - `/api/webhooks` - Inbound automation callbacks

mod collaborators;
mod routes;
mod tasks;
mod webhooks;

pub use routes::{router, serve, AppState};
