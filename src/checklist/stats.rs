//! Aggregate statistics derived from a task list.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::task::{Task, TaskStatus};

/// `round(completed / total * 100)`, with an empty list counting as 0%.
pub fn percent(completed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((completed as f64 / total as f64) * 100.0).round() as u32
}

/// Progress over the whole manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProjectStats {
    pub total: usize,
    pub completed: usize,
    pub doing: usize,
    pub pending: usize,
    pub percent: u32,
}

impl ProjectStats {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let mut counts = CategoryStats::default();
        for task in tasks {
            counts.add(task.status);
        }
        Self::from_counts(counts.total, counts.done, counts.doing)
    }

    fn from_counts(total: usize, completed: usize, doing: usize) -> Self {
        Self {
            total,
            completed,
            doing,
            pending: total.saturating_sub(completed + doing),
            percent: percent(completed, total),
        }
    }

    /// Stats after one task moves from `from` to `to`, with `total` unchanged.
    pub fn after_transition(&self, from: TaskStatus, to: TaskStatus) -> Self {
        let mut counts = CategoryStats {
            total: self.total,
            done: self.completed,
            doing: self.doing,
            pending: self.pending,
        };
        counts.shift(from, to);
        Self::from_counts(counts.total, counts.done, counts.doing)
    }

    /// Human-readable `completed/total (percent%)`.
    pub fn summary(&self) -> String {
        format!("{}/{} ({}%)", self.completed, self.total, self.percent)
    }
}

/// Status counters for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategoryStats {
    pub total: usize,
    pub done: usize,
    pub doing: usize,
    pub pending: usize,
}

impl CategoryStats {
    fn add(&mut self, status: TaskStatus) {
        self.total += 1;
        *self.slot(status) += 1;
    }

    fn slot(&mut self, status: TaskStatus) -> &mut usize {
        match status {
            TaskStatus::Pending => &mut self.pending,
            TaskStatus::Doing => &mut self.doing,
            TaskStatus::Done => &mut self.done,
        }
    }

    /// Move one task between counters. `X -> X` leaves counts unchanged.
    fn shift(&mut self, from: TaskStatus, to: TaskStatus) {
        let slot = self.slot(from);
        *slot = slot.saturating_sub(1);
        *self.slot(to) += 1;
    }

    pub fn percent(&self) -> u32 {
        percent(self.done, self.total)
    }
}

/// Per-category counters, keyed by category name.
pub fn category_breakdown(tasks: &[Task]) -> BTreeMap<String, CategoryStats> {
    let mut out: BTreeMap<String, CategoryStats> = BTreeMap::new();
    for task in tasks {
        out.entry(task.category.clone()).or_default().add(task.status);
    }
    out
}

/// Apply one transition to a pre-transition breakdown.
///
/// Only `category` is touched; every other entry is returned as-is.
pub fn breakdown_after_transition(
    before: &BTreeMap<String, CategoryStats>,
    category: &str,
    from: TaskStatus,
    to: TaskStatus,
) -> BTreeMap<String, CategoryStats> {
    let mut after = before.clone();
    if let Some(stats) = after.get_mut(category) {
        stats.shift(from, to);
    }
    after
}
