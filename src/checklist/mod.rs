//! Checklist module - task definitions, status values, derived statistics and filters.
//!
//! This module is pure data and pure functions:
//! - The set of task ids is fixed by the manifest loaded at startup
//! - Only status, assignee and estimate change at runtime
//! - Statistics are always derived from a task list, never stored

pub mod filter;
pub mod manifest;
pub mod stats;
pub mod task;

pub use filter::TaskFilter;
pub use manifest::{Manifest, ManifestError, TaskDefinition};
pub use stats::{breakdown_after_transition, category_breakdown, percent, CategoryStats, ProjectStats};
pub use task::{Difficulty, Priority, StatusMap, Task, TaskId, TaskStatus};
