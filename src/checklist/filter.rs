//! Task list filtering.

use super::task::{Task, TaskStatus};

/// Predicate set applied to the in-memory task list. All set predicates are ANDed.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// Case-insensitive substring over label and category.
    pub search: Option<String>,
    pub status: Option<TaskStatus>,
    /// Collaborator id.
    pub assignee: Option<String>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        self.matches_search(task) && self.matches_status(task) && self.matches_assignee(task)
    }

    fn matches_search(&self, task: &Task) -> bool {
        let needle = match self.search.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s.to_lowercase(),
            _ => return true,
        };
        task.label.to_lowercase().contains(&needle) || task.category.to_lowercase().contains(&needle)
    }

    fn matches_status(&self, task: &Task) -> bool {
        self.status.map(|s| s == task.status).unwrap_or(true)
    }

    fn matches_assignee(&self, task: &Task) -> bool {
        match self.assignee.as_deref() {
            Some(id) if !id.is_empty() => task.assignee.as_deref() == Some(id),
            _ => true,
        }
    }

    /// Matching tasks, in list order.
    pub fn apply(&self, tasks: &[Task]) -> Vec<Task> {
        tasks.iter().filter(|t| self.matches(t)).cloned().collect()
    }
}
