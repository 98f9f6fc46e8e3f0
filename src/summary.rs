use crate::domain::{format_duration, TaskItem};
use crate::store::TaskStore;
use chrono::Duration;

/// Totals for one planned day
#[derive(Debug, Clone, PartialEq)]
pub struct DaySummary {
    pub task_count: usize,
    pub completed_count: usize,
    pub routine_count: usize,
    /// Completed share of all tasks, 0.0 when the day is empty
    pub progress: f64,
    /// Sum of energy ordinals
    pub total_energy: u32,
    pub scheduled: Duration,
    pub free: Duration,
    pub subtasks_done: usize,
    pub subtasks_total: usize,
}

impl DaySummary {
    pub fn subtask_progress(&self) -> f64 {
        if self.subtasks_total == 0 {
            0.0
        } else {
            self.subtasks_done as f64 / self.subtasks_total as f64
        }
    }
}

/// Whether a task counts as done on the store's day
pub fn is_done(store: &TaskStore, task: &TaskItem) -> bool {
    if task.is_routine() {
        store.is_routine_completed(task.id(), store.day())
    } else {
        task.is_completed()
    }
}

pub fn summarize(store: &TaskStore) -> DaySummary {
    let tasks = store.tasks();
    let task_count = tasks.len();
    let completed_count = tasks.iter().filter(|t| is_done(store, t)).count();
    let scheduled: Duration = tasks.iter().map(|t| t.duration()).sum();
    let bounds = store.bounds();

    let progress = if task_count == 0 {
        0.0
    } else {
        completed_count as f64 / task_count as f64
    };

    DaySummary {
        task_count,
        completed_count,
        routine_count: tasks.iter().filter(|t| t.is_routine()).count(),
        progress,
        total_energy: tasks.iter().map(|t| u32::from(t.energy().ordinal())).sum(),
        scheduled,
        free: (bounds.end - bounds.start) - scheduled,
        subtasks_done: tasks.iter().map(|t| t.completed_subtasks_count()).sum(),
        subtasks_total: tasks.iter().map(|t| t.subtasks().len()).sum(),
    }
}

/// Format percentage with 1 decimal place
fn format_percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

/// Markdown day report: summary section, then the timeline
pub fn render_report(store: &TaskStore) -> String {
    let summary = summarize(store);
    let mut report = String::new();

    report.push_str(&format!("# Day Plan - {}\n\n", store.day()));

    report.push_str("## Summary\n\n");
    report.push_str(&format!(
        "- **Tasks:** {} ({} routines)\n",
        summary.task_count, summary.routine_count
    ));
    report.push_str(&format!(
        "- **Completed:** {}/{} ({})\n",
        summary.completed_count,
        summary.task_count,
        format_percent(summary.progress)
    ));
    report.push_str(&format!(
        "- **Scheduled:** {} (free {})\n",
        format_duration(summary.scheduled),
        format_duration(summary.free)
    ));
    report.push_str(&format!("- **Energy:** {}\n", summary.total_energy));
    if summary.subtasks_total > 0 {
        report.push_str(&format!(
            "- **Subtasks:** {}/{} ({})\n",
            summary.subtasks_done,
            summary.subtasks_total,
            format_percent(summary.subtask_progress())
        ));
    }
    report.push('\n');

    if summary.task_count > 0 {
        report.push_str("## Timeline\n\n");
        for task in store.tasks_sorted_by_start() {
            let check = if is_done(store, &task) { "x" } else { " " };
            report.push_str(&format!(
                "- [{}] {} {} {} ({})\n",
                check,
                task.time_range_formatted(),
                task.icon(),
                task.title(),
                task.duration_formatted()
            ));
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskSpec;
    use chrono::{NaiveDate, NaiveDateTime};
    use pretty_assertions::assert_eq;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 20).unwrap()
    }

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        day().and_hms_opt(hour, minute, 0).unwrap()
    }

    #[test]
    fn test_empty_day() {
        let store = TaskStore::new(day());
        let summary = summarize(&store);
        assert_eq!(summary.progress, 0.0);
        assert_eq!(summary.free, Duration::hours(24));
        assert_eq!(summary.subtask_progress(), 0.0);
    }

    #[test]
    fn test_summary_counts_routines_for_the_day() {
        let mut store = TaskStore::new(day());
        let routine = store
            .add_task(TaskSpec::new("Stretch", at(7, 0), Duration::minutes(15)).routine(true).energy(1))
            .unwrap();
        let work = store
            .add_task(
                TaskSpec::new("Write", at(9, 0), Duration::hours(2))
                    .energy(3)
                    .subtask("Outline")
                    .subtask("Draft"),
            )
            .unwrap();
        store.add_task(TaskSpec::new("Lunch", at(12, 0), Duration::minutes(45)).energy(2)).unwrap();

        store.toggle_routine_completion(routine.id(), day()).unwrap();
        store.toggle_subtask(work.id(), work.subtasks()[0].id).unwrap();

        let summary = summarize(&store);
        assert_eq!(summary.task_count, 3);
        assert_eq!(summary.completed_count, 1);
        assert_eq!(summary.total_energy, 6);
        assert_eq!(summary.scheduled, Duration::minutes(180));
        assert_eq!(summary.free, Duration::hours(21));
        assert_eq!(summary.subtask_progress(), 0.5);

        let report = render_report(&store);
        assert!(report.contains("- **Completed:** 1/3 (33.3%)"));
        assert!(report.contains("- [x] 07:00 - 07:15"));
    }
}
