use tunegrab_core::{truncate, BatchSummary, Status, TaskRecord};

pub const TITLE_WIDTH: usize = 50;

pub fn task_line(task: &TaskRecord) -> String {
    let mut line = format!(
        "[{}/{}] {:<11} {:>5.1}% {}",
        task.index(),
        task.total(),
        task.status(),
        task.progress_pct(),
        truncate(task.title(), TITLE_WIDTH)
    );
    if task.status() == Status::Failed && !task.error_msg().is_empty() {
        line.push_str(" - ");
        line.push_str(task.error_msg());
    }
    line
}

pub fn summary_line(summary: &BatchSummary) -> String {
    format!(
        "{} items: {} completed, {} skipped, {} failed, {} cancelled",
        summary.total,
        summary.count(Status::Completed),
        summary.count(Status::Skipped),
        summary.count(Status::Failed),
        summary.count(Status::Cancelled)
    )
}

/// Suppresses repeated lines for the same task, e.g. progress ticks that
/// do not move the displayed percentage.
#[derive(Debug, Default)]
pub struct LineDeduper {
    last: Vec<Option<String>>,
}

impl LineDeduper {
    pub fn accept(&mut self, task: &TaskRecord) -> Option<String> {
        let slot = task.index().checked_sub(1)?;
        if self.last.len() <= slot {
            self.last.resize(slot + 1, None);
        }
        let line = task_line(task);
        if self.last[slot].as_deref() == Some(line.as_str()) {
            return None;
        }
        self.last[slot] = Some(line.clone());
        Some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tunegrab_core::ELLIPSIS;

    fn task(title: &str) -> TaskRecord {
        TaskRecord::new("https://youtu.be/a", title, "a", 2, 7)
    }

    #[test]
    fn line_shows_position_status_and_title() {
        let mut t = task("Song");
        t.mark_downloading();
        t.set_progress(42.0);
        assert_eq!(task_line(&t), "[2/7] DOWNLOADING  42.0% Song");
    }

    #[test]
    fn long_titles_are_truncated() {
        let t = task(&"x".repeat(80));
        let line = task_line(&t);
        let title = line.rsplit(' ').next().unwrap();
        assert_eq!(title.chars().count(), TITLE_WIDTH);
        assert!(title.ends_with(ELLIPSIS));
    }

    #[test]
    fn failure_message_is_appended() {
        let mut t = task("Song");
        t.fail("network error: timed out");
        assert!(task_line(&t).ends_with("Song - network error: timed out"));
    }

    #[test]
    fn summary_counts_each_outcome() {
        let mut done = task("a");
        done.mark_downloading();
        done.complete();
        let mut skipped = task("b");
        skipped.skip();
        let summary = BatchSummary::from_tasks(&[done, skipped, task("c")]);
        assert_eq!(
            summary_line(&summary),
            "3 items: 1 completed, 1 skipped, 0 failed, 0 cancelled"
        );
    }

    #[test]
    fn deduper_drops_repeats() {
        let mut deduper = LineDeduper::default();
        let mut t = task("Song");
        t.mark_downloading();
        assert!(deduper.accept(&t).is_some());
        assert!(deduper.accept(&t).is_none());
        t.set_progress(10.0);
        assert!(deduper.accept(&t).is_some());
    }
}
