use crate::domain::{TaskColor, TaskItem, TaskSpec};
use crate::error::ValidationError;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

fn at(day: NaiveDate, hour: i64, minute: i64) -> NaiveDateTime {
    day.and_time(NaiveTime::MIN) + Duration::hours(hour) + Duration::minutes(minute)
}

/// Fixed demo day used by previews and tests
///
/// Tasks are listed in start order and never overlap.
pub fn sample_tasks(day: NaiveDate) -> Result<Vec<TaskItem>, ValidationError> {
    let specs = vec![
        TaskSpec::new("Rise & Shine", at(day, 6, 0), Duration::minutes(15))
            .icon("☀️")
            .color(TaskColor::Amber)
            .energy(1)
            .routine(true),
        TaskSpec::new("Breakfast", at(day, 8, 0), Duration::minutes(30))
            .icon("🍳")
            .color(TaskColor::Amber)
            .energy(1),
        TaskSpec::new("Deep Work - Coding", at(day, 10, 0), Duration::minutes(120))
            .icon("💻")
            .color(TaskColor::Sky)
            .energy(3),
        TaskSpec::new("Gym", at(day, 12, 0), Duration::minutes(60))
            .icon("🏋️")
            .color(TaskColor::Sage)
            .energy(4)
            .subtask("Warm up - 10 min")
            .subtask("Strength training")
            .subtask("Cool down"),
        TaskSpec::new("Team Meeting", at(day, 14, 0), Duration::minutes(60))
            .icon("👥")
            .color(TaskColor::Sky)
            .energy(2),
        TaskSpec::new("Wind Down", at(day, 22, 0), Duration::minutes(15))
            .icon("🌙")
            .color(TaskColor::Lavender)
            .energy(0)
            .routine(true),
    ];

    specs.into_iter().map(TaskItem::new).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::cascade::find_overlap;

    #[test]
    fn test_sample_day_is_valid() {
        let day = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let tasks = sample_tasks(day).unwrap();

        assert_eq!(tasks.len(), 6);
        assert!(find_overlap(&tasks).is_none());
        assert!(tasks.iter().all(|t| t.start_time().date() == day));
        assert_eq!(tasks.iter().filter(|t| t.is_routine()).count(), 2);
        let gym = tasks.iter().find(|t| t.title() == "Gym").unwrap();
        assert_eq!(gym.subtasks().len(), 3);
    }
}
