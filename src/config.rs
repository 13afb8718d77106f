//! Configuration management.
//!
//! Configuration is read from environment variables:
//! - `CHECKDESK_HOST` / `CHECKDESK_PORT` - bind address (default `127.0.0.1:3001`)
//! - `WORKING_DIR` - directory holding the local cache (default: current dir)
//! - `CHECKDESK_MANIFEST` - task manifest path (default: built-in manifest)
//! - `CHECKDESK_PROJECT` - project name used in events and reports
//! - `SUPABASE_URL` + `SUPABASE_SERVICE_KEY` or `SUPABASE_ANON_KEY` - remote store
//! - `WEBHOOK_URL` - outbound event endpoint
//! - `GITHUB_API_URL` - repository metadata API base

use std::path::PathBuf;

use thiserror::Error;

use crate::github::DEFAULT_API_URL;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Remote store credentials.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub working_dir: PathBuf,
    pub manifest_path: Option<PathBuf>,
    pub project_name: String,
    /// `None` runs on the local cache only.
    pub supabase: Option<SupabaseConfig>,
    pub webhook_url: Option<String>,
    pub github_api_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match var("CHECKDESK_PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                name: "CHECKDESK_PORT",
                value: raw,
            })?,
            None => 3001,
        };

        let working_dir = var("WORKING_DIR")
            .map(PathBuf::from)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        let supabase = match var("SUPABASE_URL") {
            Some(url) => match var("SUPABASE_SERVICE_KEY").or_else(|| var("SUPABASE_ANON_KEY")) {
                Some(api_key) => Some(SupabaseConfig { url, api_key }),
                None => {
                    tracing::warn!("SUPABASE_URL is set without a key, running on the local cache only");
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            host: var("CHECKDESK_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            working_dir,
            manifest_path: var("CHECKDESK_MANIFEST").map(PathBuf::from),
            project_name: var("CHECKDESK_PROJECT").unwrap_or_else(|| "Checkdesk".to_string()),
            supabase,
            webhook_url: var("WEBHOOK_URL"),
            github_api_url: var("GITHUB_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        })
    }
}
