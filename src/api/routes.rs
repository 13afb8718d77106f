//! HTTP route handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::activity::{CallbackRecord, RecentActivity};
use crate::checklist::{CategoryStats, Manifest, ProjectStats, TaskFilter, TaskId, TaskStatus};
use crate::config::Config;
use crate::dashboard::{Dashboard, DashboardError};
use crate::estimates::Estimate;
use crate::github::{GithubClient, RepoMetadata};
use crate::notify::{EventSink, WebhookNotifier};
use crate::repository::RepoConfig;
use crate::store::{LocalStore, RemoteStore, SupabaseClient};

use super::collaborators;
use super::tasks;
use super::webhooks;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub dashboard: Arc<Dashboard>,
    /// Read-only repository metadata source
    pub github: GithubClient,
    /// Remote store, when configured. Used directly for the activity log.
    pub remote: Option<Arc<dyn RemoteStore>>,
    /// Latest inbound callback body
    pub last_callback: RwLock<Option<CallbackRecord>>,
}

impl AppState {
    pub fn new(config: Config, dashboard: Arc<Dashboard>, remote: Option<Arc<dyn RemoteStore>>) -> Self {
        let github = GithubClient::new(&config.github_api_url);
        Self {
            config,
            dashboard,
            github,
            remote,
            last_callback: RwLock::new(None),
        }
    }
}

/// Map controller errors onto HTTP responses.
pub(super) fn error_response(e: DashboardError) -> (StatusCode, String) {
    let status = match e {
        DashboardError::UnknownTask(_) | DashboardError::UnknownCollaborator(_) => StatusCode::NOT_FOUND,
        DashboardError::Estimate(_) | DashboardError::Roster(_) | DashboardError::Repo(_) => {
            StatusCode::BAD_REQUEST
        }
    };
    (status, e.to_string())
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let manifest = match &config.manifest_path {
        Some(path) => Manifest::load(path)?,
        None => Manifest::builtin()?,
    };
    tracing::info!(tasks = manifest.tasks.len(), "Task manifest loaded");

    let local = Arc::new(LocalStore::open(&config.working_dir).await);

    let remote: Option<Arc<dyn RemoteStore>> = match &config.supabase {
        Some(supabase) => {
            tracing::info!("Remote store enabled at {}", supabase.url);
            Some(Arc::new(SupabaseClient::new(&supabase.url, &supabase.api_key)))
        }
        None => {
            tracing::info!("Remote store disabled (no credentials configured), using local cache only");
            None
        }
    };

    let notifier: Arc<dyn EventSink> = Arc::new(WebhookNotifier::new(config.webhook_url.clone()));

    let dashboard = Arc::new(
        Dashboard::load(&config.project_name, manifest, remote.clone(), local, notifier).await,
    );

    let state = Arc::new(AppState::new(config.clone(), dashboard, remote));
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/stats", get(get_stats))
        .route("/api/estimates", get(list_estimates))
        .route("/api/repo", get(get_repo).put(set_repo))
        .route("/api/repo/metadata", get(get_repo_metadata))
        .route("/api/activity", get(webhooks::list_activity))
        .route("/api/activity/recent", get(recent_activity))
        .route("/api/export", get(export))
        .nest("/api/tasks", tasks::routes())
        .nest("/api/categories", tasks::category_routes())
        .nest("/api/collaborators", collaborators::routes())
        .nest("/api/webhooks", webhooks::routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Wait for SIGTERM/SIGINT.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    project: String,
    remote_store: bool,
    webhook: bool,
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        project: state.dashboard.project().to_string(),
        remote_store: state.dashboard.has_remote(),
        webhook: state.config.webhook_url.is_some(),
    })
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    stats: ProjectStats,
    summary: String,
    by_category: BTreeMap<String, CategoryStats>,
    busy: Vec<TaskId>,
}

/// Overall progress, independent of any filter.
async fn get_stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let stats = state.dashboard.stats().await;
    Json(StatsResponse {
        summary: stats.summary(),
        stats,
        by_category: state.dashboard.category_stats().await,
        busy: state.dashboard.busy_tasks(),
    })
}

/// `?search=&status=&assignee=`. Blank values and `status=all` mean "no filter".
#[derive(Debug, Default, Deserialize)]
pub(super) struct TaskQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub assignee: Option<String>,
}

impl TaskQuery {
    pub(super) fn into_filter(self) -> Result<TaskFilter, (StatusCode, String)> {
        let non_blank = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        let status = match non_blank(self.status) {
            None => None,
            Some(s) if s.eq_ignore_ascii_case("all") => None,
            Some(s) => Some(s.parse::<TaskStatus>().map_err(|e| (StatusCode::BAD_REQUEST, e))?),
        };

        Ok(TaskFilter {
            search: non_blank(self.search),
            status,
            assignee: non_blank(self.assignee),
        })
    }
}

async fn list_estimates(State(state): State<Arc<AppState>>) -> Json<BTreeMap<String, Estimate>> {
    Json(state.dashboard.estimates().await)
}

async fn get_repo(State(state): State<Arc<AppState>>) -> Json<Option<RepoConfig>> {
    Json(state.dashboard.repository().await)
}

#[derive(Debug, Deserialize)]
struct SetRepoRequest {
    repo_url: String,
}

async fn set_repo(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SetRepoRequest>,
) -> Result<Json<RepoConfig>, (StatusCode, String)> {
    state
        .dashboard
        .set_repository(&req.repo_url)
        .await
        .map(Json)
        .map_err(error_response)
}

/// Metadata for the active repository. Unavailable parts are `null`.
async fn get_repo_metadata(State(state): State<Arc<AppState>>) -> Json<RepoMetadata> {
    let Some(repo) = state.dashboard.repository().await else {
        return Json(RepoMetadata::default());
    };
    Json(state.github.fetch_metadata(&repo.owner, &repo.repo_name).await)
}

async fn recent_activity(State(state): State<Arc<AppState>>) -> Json<Vec<RecentActivity>> {
    Json(state.dashboard.recent_activity().await)
}

/// Download the progress report for the current filter.
async fn export(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TaskQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let filter = query.into_filter()?;
    let report = state.dashboard.export(&filter).await;
    let disposition = format!("attachment; filename=\"{}\"", report.file_name());

    Ok((
        [
            (header::CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        report.render_markdown(),
    ))
}
