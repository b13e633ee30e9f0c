use std::collections::BTreeMap;

use crate::{Status, TaskRecord};

/// Marker appended by [`truncate`].
pub const ELLIPSIS: char = '\u{2026}';

/// Aggregate view over a batch snapshot, for progress displays.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub finished: usize,
    pub counts: BTreeMap<&'static str, usize>,
    /// Mean task percentage; terminal tasks count as fully done.
    pub overall_pct: f64,
}

impl BatchSummary {
    pub fn from_tasks(tasks: &[TaskRecord]) -> Self {
        let mut summary = BatchSummary {
            total: tasks.len(),
            ..Self::default()
        };
        if tasks.is_empty() {
            return summary;
        }

        let mut pct_sum = 0.0;
        for task in tasks {
            *summary.counts.entry(task.status().as_str()).or_insert(0) += 1;
            if task.is_terminal() {
                summary.finished += 1;
                pct_sum += 100.0;
            } else {
                pct_sum += task.progress_pct();
            }
        }
        summary.overall_pct = pct_sum / tasks.len() as f64;
        summary
    }

    pub fn count(&self, status: Status) -> usize {
        self.counts.get(status.as_str()).copied().unwrap_or(0)
    }

    pub fn is_finished(&self) -> bool {
        self.finished == self.total
    }
}

/// Shortens `text` to at most `limit` characters, replacing the last kept
/// character with an ellipsis when anything was cut.
pub fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    if limit == 0 {
        return String::new();
    }
    let mut out: String = text.chars().take(limit - 1).collect();
    out.push(ELLIPSIS);
    out
}
