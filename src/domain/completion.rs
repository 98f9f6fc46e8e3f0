use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-day completion mark of a routine task
///
/// Keyed by `(task_id, day)`; a missing record means the routine has not been
/// marked for that day yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCompletionRecord {
    pub id: Uuid,
    pub task_id: Uuid,
    pub day: NaiveDate,
    pub completed: bool,
    /// When the flag was last changed
    pub marked_at: NaiveDateTime,
}

impl TaskCompletionRecord {
    pub fn new(task_id: Uuid, day: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            day,
            completed: true,
            marked_at: Local::now().naive_local(),
        }
    }

    pub fn key(&self) -> (Uuid, NaiveDate) {
        (self.task_id, self.day)
    }

    pub(crate) fn toggle(&mut self) -> bool {
        self.completed = !self.completed;
        self.marked_at = Local::now().naive_local();
        self.completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_completed() {
        let task_id = Uuid::new_v4();
        let day = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let record = TaskCompletionRecord::new(task_id, day);
        assert!(record.completed);
        assert_eq!(record.key(), (task_id, day));
    }

    #[test]
    fn test_toggle_flips_flag() {
        let day = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let mut record = TaskCompletionRecord::new(Uuid::new_v4(), day);
        assert!(!record.toggle());
        assert!(record.toggle());
    }
}
