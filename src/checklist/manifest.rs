//! Static task manifest.
//!
//! The manifest is the only source of task identity. It is loaded once at
//! startup, either from the file named by `CHECKDESK_MANIFEST` (YAML or JSON)
//! or from the manifest compiled into the binary.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::task::{Difficulty, Priority, Task, TaskStatus};

const BUILTIN_MANIFEST: &str = include_str!("../../manifest.yaml");

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to read manifest {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse manifest: {0}")]
    Parse(String),

    #[error("Manifest contains no tasks")]
    Empty,

    #[error("Task with empty id or label at position {0}")]
    Incomplete(usize),

    #[error("Duplicate task id: {0}")]
    DuplicateId(String),
}

/// One task as written in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub id: String,
    pub label: String,
    pub category: String,
    /// Initial status before any persisted state is applied.
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub impacted_files: Vec<String>,
}

impl TaskDefinition {
    fn to_task(&self) -> Task {
        Task {
            id: self.id.clone(),
            label: self.label.clone(),
            category: self.category.clone(),
            status: self.status,
            priority: self.priority,
            difficulty: self.difficulty,
            description: self.description.clone(),
            location: self.location.clone(),
            impacted_files: self.impacted_files.clone(),
            assignee: None,
            estimate: None,
        }
    }
}

/// Validated, ordered list of task definitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub tasks: Vec<TaskDefinition>,
}

impl Manifest {
    /// Manifest compiled into the binary.
    pub fn builtin() -> Result<Self, ManifestError> {
        Self::from_yaml(BUILTIN_MANIFEST)
    }

    /// Load from a file; `.json` files are parsed as JSON, everything else as YAML.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.display().to_string(),
            source,
        })?;

        if path.extension().map(|e| e == "json").unwrap_or(false) {
            Self::from_json(&contents)
        } else {
            Self::from_yaml(&contents)
        }
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest =
            serde_yaml::from_str(contents).map_err(|e| ManifestError::Parse(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn from_json(contents: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest =
            serde_json::from_str(contents).map_err(|e| ManifestError::Parse(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<(), ManifestError> {
        if self.tasks.is_empty() {
            return Err(ManifestError::Empty);
        }

        let mut seen = HashSet::new();
        for (i, def) in self.tasks.iter().enumerate() {
            if def.id.trim().is_empty() || def.label.trim().is_empty() {
                return Err(ManifestError::Incomplete(i));
            }
            if !seen.insert(def.id.as_str()) {
                return Err(ManifestError::DuplicateId(def.id.clone()));
            }
        }
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.iter().any(|t| t.id == id)
    }

    /// Fresh task list in manifest order.
    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.iter().map(TaskDefinition::to_task).collect()
    }
}
