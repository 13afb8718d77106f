//! Per-task estimates: due date, free-text duration, cost and notes.
//!
//! One estimate per task, upserted by task id and never deleted. Saves always
//! land in the local cache first; the remote copy is best effort.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{LocalStore, RemoteStore};

/// Local cache key holding `{task_id -> Estimate}`.
pub const ESTIMATES_KEY: &str = "checklist_task_estimates";

#[derive(Debug, Error, PartialEq)]
pub enum EstimateError {
    #[error("Invalid cost {0:?}: expected a non-negative number")]
    InvalidCost(String),

    #[error("Invalid due date {0:?}: expected YYYY-MM-DD")]
    InvalidDueDate(String),
}

/// Stored estimate for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub task_id: String,
    #[serde(rename = "estimated_due_date", default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub estimated_time: Option<String>,
    #[serde(default)]
    pub estimated_cost: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Raw form input for an estimate. Every field is optional free text.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EstimateInput {
    #[serde(default, alias = "estimated_due_date")]
    pub due_date: Option<String>,
    #[serde(default)]
    pub estimated_time: Option<String>,
    /// Accepts either a JSON number or a (possibly locale-formatted) string.
    #[serde(default, deserialize_with = "cost_as_text")]
    pub estimated_cost: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

fn cost_as_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

impl EstimateInput {
    /// Normalize into a stored estimate stamped with `now`.
    pub fn into_estimate(self, task_id: &str, now: DateTime<Utc>) -> Result<Estimate, EstimateError> {
        Ok(Estimate {
            task_id: task_id.to_string(),
            due_date: parse_due_date(self.due_date.as_deref().unwrap_or(""))?,
            estimated_time: non_empty(self.estimated_time),
            estimated_cost: parse_cost(self.estimated_cost.as_deref().unwrap_or(""))?,
            notes: non_empty(self.notes),
            updated_at: now,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parse a due date from its first ten characters. Empty input is `None`.
pub fn parse_due_date(raw: &str) -> Result<Option<NaiveDate>, EstimateError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .get(..10)
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        .map(Some)
        .ok_or_else(|| EstimateError::InvalidDueDate(raw.to_string()))
}

/// Parse a cost typed by a person in either `1,234.56` or `1.234,56` style.
///
/// Whitespace and a leading currency marker are ignored. When both separators
/// appear, the last one is the decimal separator. A lone separator repeated
/// more than once is a thousands separator. Empty input is `None`.
pub fn parse_cost(raw: &str) -> Result<Option<f64>, EstimateError> {
    let invalid = || EstimateError::InvalidCost(raw.to_string());

    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = compact
        .trim_start_matches(|c: char| c.is_alphabetic() || c == '$' || c == '€' || c == '£');
    if digits.is_empty() {
        return if compact.is_empty() { Ok(None) } else { Err(invalid()) };
    }

    let normalized = match (digits.rfind('.'), digits.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => digits.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => digits.replace(',', ""),
        (None, Some(_)) if digits.matches(',').count() > 1 => digits.replace(',', ""),
        (None, Some(_)) => digits.replace(',', "."),
        (Some(_), None) if digits.matches('.').count() > 1 => digits.replace('.', ""),
        _ => digits.to_string(),
    };

    let value: f64 = normalized.parse().map_err(|_| invalid())?;
    if !value.is_finite() || value < 0.0 {
        return Err(invalid());
    }
    Ok(Some(value))
}

/// Estimates backed by the local cache and, when configured, the remote store.
pub struct EstimateBook {
    remote: Option<Arc<dyn RemoteStore>>,
    local: Arc<LocalStore>,
}

impl EstimateBook {
    pub fn new(remote: Option<Arc<dyn RemoteStore>>, local: Arc<LocalStore>) -> Self {
        Self { remote, local }
    }

    async fn local_estimates(&self) -> BTreeMap<String, Estimate> {
        self.local.get_entries(ESTIMATES_KEY).await
    }

    /// Estimate for one task: remote copy first, local copy otherwise.
    pub async fn get(&self, task_id: &str) -> Option<Estimate> {
        if let Some(remote) = &self.remote {
            match remote.fetch_estimate(task_id).await {
                Ok(Some(estimate)) => return Some(estimate),
                Ok(None) => {}
                Err(e) => tracing::debug!(task_id, error = %e, "Remote estimate read failed"),
            }
        }
        self.local_estimates().await.remove(task_id)
    }

    /// All estimates: local copies overlaid by remote rows.
    pub async fn all(&self) -> BTreeMap<String, Estimate> {
        let mut merged = self.local_estimates().await;
        if let Some(remote) = &self.remote {
            match remote.fetch_estimates().await {
                Ok(rows) => {
                    for estimate in rows {
                        merged.insert(estimate.task_id.clone(), estimate);
                    }
                }
                Err(e) => tracing::debug!(error = %e, "Remote estimates read failed, using local copies"),
            }
        }
        merged
    }

    /// Normalize and persist. Returns the stored estimate and whether the remote leg succeeded.
    pub async fn save(&self, task_id: &str, input: EstimateInput) -> Result<(Estimate, bool), EstimateError> {
        let estimate = input.into_estimate(task_id, Utc::now())?;

        self.local
            .update_entries(ESTIMATES_KEY, |local: &mut BTreeMap<String, Estimate>| {
                local.insert(task_id.to_string(), estimate.clone());
            })
            .await;

        let remote_ok = match &self.remote {
            Some(remote) => match remote.upsert_estimate(&estimate).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(task_id, error = %e, "Remote estimate save failed, kept local copy");
                    false
                }
            },
            None => false,
        };

        Ok((estimate, remote_ok))
    }
}
