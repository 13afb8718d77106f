//! Checkdesk server binary.

use checkdesk::{api, Config};
use tracing_subscriber::EnvFilter;

/// `RUST_LOG`, then `CHECKDESK_LOG_LEVEL`, then `info`.
fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| {
            std::env::var("CHECKDESK_LOG_LEVEL")
                .map_err(anyhow::Error::from)
                .and_then(|level| EnvFilter::try_new(level).map_err(anyhow::Error::from))
        })
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(log_filter()).init();

    let config = Config::from_env()?;
    tracing::info!(
        working_dir = %config.working_dir.display(),
        project = %config.project_name,
        "Starting checkdesk"
    );

    api::serve(config).await
}
