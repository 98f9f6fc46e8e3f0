//! Conflict-aware placement of a task on the day's timeline.
//!
//! The moved task is pinned at its requested start. Every task it displaces is
//! pushed right to start exactly where the previous one in the new arrangement
//! ends, and the push travels downstream until a task no longer collides.
//!
//! Planning never mutates: the store applies a [`ReschedulePlan`] only after
//! the whole plan has been checked against the day bounds.

use crate::domain::{Interval, TaskItem};
use crate::error::{ConflictReason, PlannerError};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use log::debug;
use uuid::Uuid;

/// `[00:00, 24:00)` of one calendar day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBounds {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DayBounds {
    pub fn for_day(day: NaiveDate) -> Self {
        let start = day.and_time(NaiveTime::MIN);
        Self {
            start,
            end: start
                .checked_add_signed(Duration::days(1))
                .unwrap_or(NaiveDateTime::MAX),
        }
    }

    pub fn contains(&self, interval: &Interval) -> bool {
        interval.start >= self.start && interval.end <= self.end
    }
}

/// One task's change of position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shift {
    pub task_id: Uuid,
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
}

impl Shift {
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }
}

/// Every position a reschedule would commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReschedulePlan {
    pub moved: Shift,
    /// Displaced tasks in the order they were pushed
    pub cascaded: Vec<Shift>,
}

impl ReschedulePlan {
    /// Moved task first, then the cascade; skips unchanged positions
    pub fn changes(&self) -> impl Iterator<Item = &Shift> {
        std::iter::once(&self.moved)
            .chain(self.cascaded.iter())
            .filter(|shift| !shift.is_noop())
    }

    pub fn is_noop(&self) -> bool {
        self.changes().next().is_none()
    }

    pub fn changed_ids(&self) -> Vec<Uuid> {
        self.changes().map(|shift| shift.task_id).collect()
    }
}

/// Compute the arrangement produced by moving `moved_id` to `new_start`
///
/// `tasks` is the store collection in insertion order; equal start times are
/// broken by that order. Each task is visited at most once.
pub fn plan_reschedule(
    tasks: &[TaskItem],
    moved_id: Uuid,
    new_start: NaiveDateTime,
    bounds: DayBounds,
) -> Result<ReschedulePlan, PlannerError> {
    let moved = tasks
        .iter()
        .find(|task| task.id() == moved_id)
        .ok_or(PlannerError::TaskNotFound(moved_id))?;

    let candidate = moved
        .interval_at(new_start)
        .filter(|interval| bounds.contains(interval))
        .ok_or(PlannerError::SchedulingConflict {
            task_id: moved_id,
            reason: ConflictReason::OutsideDay,
        })?;

    let mut working: Vec<(usize, &TaskItem)> = tasks
        .iter()
        .enumerate()
        .filter(|(_, task)| task.id() != moved_id)
        .collect();
    working.sort_by(|(a_order, a), (b_order, b)| {
        a.start_time()
            .cmp(&b.start_time())
            .then(a_order.cmp(b_order))
    });

    let mut cursor = candidate.end;
    let mut cascaded = Vec::new();

    for (_, task) in working {
        let current = task.interval();
        if current.end <= candidate.start {
            continue;
        }
        if !current.overlaps(&candidate) && current.start >= cursor {
            // Everything after this point already starts past the cascade front
            break;
        }

        let shifted = match task.interval_at(cursor) {
            Some(shifted) if bounds.contains(&shifted) => shifted,
            _ => {
                debug!(
                    "cascade from {} pushes {} to {}, past the day end",
                    moved_id,
                    task.id(),
                    cursor
                );
                return Err(PlannerError::SchedulingConflict {
                    task_id: task.id(),
                    reason: ConflictReason::OutsideDay,
                });
            }
        };

        cascaded.push(Shift {
            task_id: task.id(),
            from: current.start,
            to: shifted.start,
        });
        cursor = shifted.end;
    }

    Ok(ReschedulePlan {
        moved: Shift {
            task_id: moved_id,
            from: moved.start_time(),
            to: new_start,
        },
        cascaded,
    })
}

/// First pair of tasks whose intervals overlap, if any
pub fn find_overlap<'a, I>(tasks: I) -> Option<(Uuid, Uuid)>
where
    I: IntoIterator<Item = &'a TaskItem>,
{
    let mut sorted: Vec<&TaskItem> = tasks.into_iter().collect();
    sorted.sort_by_key(|task| task.start_time());
    sorted
        .windows(2)
        .find(|pair| pair[0].interval().overlaps(&pair[1].interval()))
        .map(|pair| (pair[0].id(), pair[1].id()))
}
