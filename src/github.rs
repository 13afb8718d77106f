//! Read-only repository metadata from the public GitHub API.
//!
//! Every fetch degrades to `None` on failure; metadata is decoration, never
//! a reason to fail a request.

use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// `owner/repo` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

/// Extract owner and repo from `https://github.com/owner/repo(.git)` or `owner/repo`.
pub fn parse_repo_url(input: &str) -> Option<RepoRef> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        let url = url::Url::parse(trimmed).ok()?;
        let mut parts = url.path_segments()?.filter(|s| !s.is_empty());
        let owner = parts.next()?.to_string();
        let repo = parts.next()?;
        let repo = repo.strip_suffix(".git").unwrap_or(repo).to_string();
        return Some(RepoRef { owner, repo });
    }

    let pattern = Regex::new(r"^([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+)$").ok()?;
    let caps = pattern.captures(trimmed)?;
    Some(RepoRef {
        owner: caps[1].to_string(),
        repo: caps[2].to_string(),
    })
}

/// Descriptive repository metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepoInfo {
    pub full_name: String,
    pub description: Option<String>,
    pub default_branch: String,
    pub stars: u64,
    pub forks: u64,
    pub open_issues: u64,
    pub html_url: String,
    pub language: Option<String>,
    pub last_pushed: Option<String>,
    pub created_at: Option<String>,
}

/// Latest commit on a branch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitSummary {
    /// First seven characters of the hash.
    pub sha: String,
    /// First line of the message.
    pub message: String,
    pub date: String,
}

/// Everything shown for the active repository. Missing parts are `None`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RepoMetadata {
    pub info: Option<RepoInfo>,
    pub last_commit: Option<CommitSummary>,
}

#[derive(Deserialize)]
struct RawRepo {
    full_name: Option<String>,
    description: Option<String>,
    default_branch: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    forks_count: u64,
    #[serde(default)]
    open_issues_count: u64,
    html_url: Option<String>,
    language: Option<String>,
    pushed_at: Option<String>,
    created_at: Option<String>,
}

#[derive(Deserialize)]
struct RawCommit {
    sha: Option<String>,
    commit: Option<RawCommitDetail>,
}

#[derive(Deserialize)]
struct RawCommitDetail {
    message: Option<String>,
    committer: Option<RawCommitter>,
}

#[derive(Deserialize)]
struct RawCommitter {
    date: Option<String>,
}

pub struct GithubClient {
    client: Client,
    api_base: String,
}

impl GithubClient {
    pub fn new(api_base: &str) -> Self {
        let client = Client::builder()
            .user_agent("checkdesk/0.1")
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Option<T> {
        let resp = match self
            .client
            .get(format!("{}{}", self.api_base, path))
            .header("Accept", "application/vnd.github.v3+json")
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                tracing::debug!(path, error = %e, "GitHub request failed");
                return None;
            }
        };

        if !resp.status().is_success() {
            tracing::debug!(path, status = %resp.status(), "GitHub returned an error status");
            return None;
        }

        resp.json().await.ok()
    }

    pub async fn fetch_repo_info(&self, owner: &str, repo: &str) -> Option<RepoInfo> {
        let raw: RawRepo = self.get_json(&format!("/repos/{}/{}", owner, repo)).await?;
        Some(RepoInfo {
            full_name: raw.full_name.unwrap_or_else(|| format!("{}/{}", owner, repo)),
            description: raw.description,
            default_branch: raw.default_branch.unwrap_or_else(|| "main".to_string()),
            stars: raw.stargazers_count,
            forks: raw.forks_count,
            open_issues: raw.open_issues_count,
            html_url: raw
                .html_url
                .unwrap_or_else(|| format!("https://github.com/{}/{}", owner, repo)),
            language: raw.language,
            last_pushed: raw.pushed_at,
            created_at: raw.created_at,
        })
    }

    pub async fn fetch_last_commit(&self, owner: &str, repo: &str, branch: &str) -> Option<CommitSummary> {
        let raw: RawCommit = self
            .get_json(&format!("/repos/{}/{}/commits/{}", owner, repo, branch))
            .await?;
        let detail = raw.commit;
        Some(CommitSummary {
            sha: raw.sha.unwrap_or_default().chars().take(7).collect(),
            message: detail
                .as_ref()
                .and_then(|d| d.message.as_deref())
                .and_then(|m| m.lines().next())
                .unwrap_or_default()
                .to_string(),
            date: detail
                .and_then(|d| d.committer)
                .and_then(|c| c.date)
                .unwrap_or_default(),
        })
    }

    /// Repository info, then the last commit on its default branch.
    pub async fn fetch_metadata(&self, owner: &str, repo: &str) -> RepoMetadata {
        let Some(info) = self.fetch_repo_info(owner, repo).await else {
            return RepoMetadata::default();
        };
        let last_commit = self.fetch_last_commit(owner, repo, &info.default_branch).await;
        RepoMetadata {
            info: Some(info),
            last_commit,
        }
    }
}
