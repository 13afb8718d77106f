//! Downloadable progress report.
//!
//! The report is built as a plain model first and rendered to Markdown, so a
//! front end can lay it out however it wants from the same data.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::checklist::{percent, Task};

/// Categories shown in the completion chart.
const CHART_CATEGORIES: usize = 6;
const MAX_LABEL_CHARS: usize = 82;
const BAR_WIDTH: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBar {
    pub category: String,
    pub percent: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySection {
    pub category: String,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChecklistReport {
    pub title: String,
    pub project: String,
    pub generated_at: DateTime<Utc>,
    pub percent: u32,
    pub chart: Vec<CategoryBar>,
    pub done_count: usize,
    pub remaining_count: usize,
    pub done: Vec<CategorySection>,
    pub not_done: Vec<CategorySection>,
}

fn truncate_label(label: &str) -> String {
    if label.chars().count() > MAX_LABEL_CHARS {
        let head: String = label.chars().take(MAX_LABEL_CHARS - 3).collect();
        format!("{}…", head)
    } else {
        label.to_string()
    }
}

fn sections<'a>(tasks: impl Iterator<Item = &'a Task>) -> Vec<CategorySection> {
    let mut grouped: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for task in tasks {
        grouped
            .entry(task.category.as_str())
            .or_default()
            .push(truncate_label(&task.label));
    }
    grouped
        .into_iter()
        .map(|(category, items)| CategorySection {
            category: category.to_string(),
            items,
        })
        .collect()
}

fn chart(tasks: &[Task]) -> Vec<CategoryBar> {
    let mut counts: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for task in tasks {
        let entry = counts.entry(task.category.as_str()).or_default();
        entry.0 += 1;
        if task.is_done() {
            entry.1 += 1;
        }
    }

    let mut bars: Vec<CategoryBar> = counts
        .into_iter()
        .map(|(category, (total, done))| CategoryBar {
            category: category.to_string(),
            percent: percent(done, total),
        })
        .collect();
    // Stable sort keeps alphabetical order among equal percentages.
    bars.sort_by(|a, b| b.percent.cmp(&a.percent));
    bars.truncate(CHART_CATEGORIES);
    bars
}

fn text_bar(pct: u32) -> String {
    let filled = ((pct.min(100) as usize * BAR_WIDTH) + 50) / 100;
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

impl ChecklistReport {
    /// Build a report over `tasks` (possibly filtered) with the given overall percent.
    pub fn build(project: &str, tasks: &[Task], overall_percent: u32, generated_at: DateTime<Utc>) -> Self {
        let done_count = tasks.iter().filter(|t| t.is_done()).count();
        Self {
            title: "Implementation Checklist".to_string(),
            project: project.to_string(),
            generated_at,
            percent: overall_percent,
            chart: chart(tasks),
            done_count,
            remaining_count: tasks.len() - done_count,
            done: sections(tasks.iter().filter(|t| t.is_done())),
            not_done: sections(tasks.iter().filter(|t| !t.is_done())),
        }
    }

    pub fn file_name(&self) -> String {
        format!("checklist-{}.md", self.generated_at.format("%Y-%m-%d"))
    }

    pub fn render_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("# {}\n\n", self.title));
        out.push_str(&format!(
            "{} · {}\n\n",
            self.project,
            self.generated_at.format("%B %-d, %Y")
        ));

        out.push_str(&format!(
            "**{}% complete**  `{}`\n\n",
            self.percent,
            text_bar(self.percent)
        ));

        if !self.chart.is_empty() {
            out.push_str("| Category | Progress | Done |\n|---|---|---|\n");
            for bar in &self.chart {
                out.push_str(&format!(
                    "| {} | `{}` | {}% |\n",
                    bar.category,
                    text_bar(bar.percent),
                    bar.percent
                ));
            }
            out.push('\n');
        }

        out.push_str(&format!(
            "> {} done · {} remaining · {} total\n\n",
            self.done_count,
            self.remaining_count,
            self.done_count + self.remaining_count
        ));

        for (heading, marker, groups) in [("Done", "[x]", &self.done), ("Not done", "[ ]", &self.not_done)] {
            out.push_str(&format!("## {}\n\n", heading));
            if groups.is_empty() {
                out.push_str("_Nothing here._\n\n");
                continue;
            }
            for section in groups {
                out.push_str(&format!("### {}\n\n", section.category.to_uppercase()));
                for item in &section.items {
                    out.push_str(&format!("- {} {}\n", marker, item));
                }
                out.push('\n');
            }
        }

        out.push_str(&format!(
            "_Generated {} UTC_\n",
            self.generated_at.format("%Y-%m-%d %H:%M")
        ));
        out
    }
}
