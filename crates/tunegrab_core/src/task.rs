use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a single task.
///
/// `Pending -> Downloading -> Converting -> Completed` is the happy path.
/// `Skipped`, `Failed` and `Cancelled` are the other terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    #[default]
    Pending,
    Downloading,
    Converting,
    Completed,
    Skipped,
    Failed,
    Cancelled,
}

impl Status {
    pub const ALL: [Status; 7] = [
        Status::Pending,
        Status::Downloading,
        Status::Converting,
        Status::Completed,
        Status::Skipped,
        Status::Failed,
        Status::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "PENDING",
            Status::Downloading => "DOWNLOADING",
            Status::Converting => "CONVERTING",
            Status::Completed => "COMPLETED",
            Status::Skipped => "SKIPPED",
            Status::Failed => "FAILED",
            Status::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Status::Completed | Status::Skipped | Status::Failed | Status::Cancelled
        )
    }

    pub fn can_transition_to(self, next: Status) -> bool {
        use Status::*;
        match self {
            Pending => matches!(next, Downloading | Skipped | Cancelled | Failed),
            Downloading => matches!(next, Converting | Completed | Failed | Cancelled),
            Converting => matches!(next, Completed | Failed | Cancelled),
            Completed | Skipped | Failed | Cancelled => false,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable state for one work item of a batch.
///
/// Identity fields are fixed at construction. Every mutator returns whether
/// the record actually changed; once the status is terminal they all return
/// `false`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRecord {
    url: String,
    title: String,
    item_id: String,
    index: usize,
    total: usize,
    status: Status,
    progress_pct: f64,
    error_msg: String,
    attempts: u32,
}

impl TaskRecord {
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        item_id: impl Into<String>,
        index: usize,
        total: usize,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            item_id: item_id.into(),
            index,
            total,
            status: Status::Pending,
            progress_pct: 0.0,
            error_msg: String::new(),
            attempts: 0,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    /// 1-based position in the batch.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn progress_pct(&self) -> f64 {
        self.progress_pct
    }

    pub fn error_msg(&self) -> &str {
        &self.error_msg
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn transition(&mut self, next: Status) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        true
    }

    pub fn mark_downloading(&mut self) -> bool {
        self.transition(Status::Downloading)
    }

    pub fn mark_converting(&mut self) -> bool {
        self.transition(Status::Converting)
    }

    pub fn skip(&mut self) -> bool {
        self.transition(Status::Skipped)
    }

    pub fn cancel(&mut self) -> bool {
        self.transition(Status::Cancelled)
    }

    pub fn complete(&mut self) -> bool {
        if !self.transition(Status::Completed) {
            return false;
        }
        self.progress_pct = 100.0;
        true
    }

    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        if !self.transition(Status::Failed) {
            return false;
        }
        self.error_msg = message.into();
        true
    }

    /// Updates the percentage from byte counts reported by the converter.
    ///
    /// Leaves the value untouched when `total` is unknown or zero. The result
    /// is clamped to `0.0..=100.0` even if `downloaded > total`.
    pub fn record_progress(&mut self, downloaded: u64, total: Option<u64>) -> bool {
        let Some(total) = total.filter(|t| *t > 0) else {
            return false;
        };
        self.set_progress(downloaded as f64 / total as f64 * 100.0)
    }

    pub fn set_progress(&mut self, pct: f64) -> bool {
        if self.is_terminal() || pct.is_nan() {
            return false;
        }
        self.progress_pct = pct.clamp(0.0, 100.0);
        true
    }

    pub fn record_attempt(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.attempts += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for from in Status::ALL.iter().filter(|s| s.is_terminal()) {
            for to in Status::ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn converting_is_only_reachable_from_downloading() {
        let sources: Vec<_> = Status::ALL
            .into_iter()
            .filter(|s| s.can_transition_to(Status::Converting))
            .collect();
        assert_eq!(sources, vec![Status::Downloading]);
    }
}
