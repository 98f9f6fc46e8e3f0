//! Drag-to-reschedule on the day timeline.
//!
//! The state machine is a pure `transition` function; [`DragMachine`] drives
//! it from pointer positions and hands the final candidate to the store.

use crate::error::{DragError, PlannerError};
use crate::store::{ReschedulePlan, TaskStore};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use log::{debug, info};
use uuid::Uuid;

/// Maps vertical timeline offsets to wall-clock times
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineGeometry {
    pub start_hour: u32,
    pub end_hour: u32,
    /// Points per hour
    pub hour_height: f64,
}

impl Default for TimelineGeometry {
    fn default() -> Self {
        Self {
            start_hour: 6,
            end_hour: 23,
            hour_height: 60.0,
        }
    }
}

impl TimelineGeometry {
    /// Zero when the hour window or the hour height is degenerate
    pub fn height(&self) -> f64 {
        let height = f64::from(self.end_hour.saturating_sub(self.start_hour)) * self.hour_height;
        if height.is_finite() {
            height.max(0.0)
        } else {
            0.0
        }
    }

    fn top(&self, day: NaiveDate) -> NaiveDateTime {
        day.and_time(NaiveTime::MIN) + Duration::hours(i64::from(self.start_hour.min(24)))
    }

    /// Time at offset `y` from the top; offsets outside the timeline clamp to its edges
    pub fn time_at(&self, day: NaiveDate, y: f64) -> NaiveDateTime {
        let top = self.top(day);
        let height = self.height();
        if height <= 0.0 {
            return top;
        }
        let y = if y.is_nan() { 0.0 } else { y.clamp(0.0, height) };
        let minutes = (y / self.hour_height * 60.0).round() as i64;
        top + Duration::minutes(minutes)
    }

    /// Offset of `time` from the top of the timeline
    pub fn y_for(&self, time: NaiveDateTime) -> f64 {
        let top = self.top(time.date());
        (time - top).num_seconds() as f64 / 3600.0 * self.hour_height
    }
}

pub const MINUTES_PER_DAY: i64 = 24 * 60;

/// Rounds times to the nearest multiple of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapGrid {
    step: Duration,
}

impl Default for SnapGrid {
    fn default() -> Self {
        Self::minutes(15)
    }
}

impl SnapGrid {
    /// Steps are kept within one minute to one day
    pub fn minutes(step: i64) -> Self {
        Self {
            step: Duration::minutes(step.clamp(1, MINUTES_PER_DAY)),
        }
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    /// Nearest grid point; halfway rounds later
    pub fn snap(&self, time: NaiveDateTime) -> NaiveDateTime {
        let midnight = time.date().and_time(NaiveTime::MIN);
        let step = self.step.num_seconds();
        let offset = (time - midnight).num_seconds();
        let rounded = (offset + step / 2) / step * step;
        midnight
            .checked_add_signed(Duration::seconds(rounded))
            .unwrap_or(time)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DragState {
    Idle,
    Dragging {
        task_id: Uuid,
        pointer_offset: f64,
        baseline: NaiveDateTime,
    },
    Snapping {
        task_id: Uuid,
        pointer_offset: f64,
        baseline: NaiveDateTime,
        candidate: NaiveDateTime,
    },
    Committing {
        task_id: Uuid,
        baseline: NaiveDateTime,
        candidate: NaiveDateTime,
    },
}

impl DragState {
    pub fn name(&self) -> &'static str {
        match self {
            DragState::Idle => "idle",
            DragState::Dragging { .. } => "dragging",
            DragState::Snapping { .. } => "snapping",
            DragState::Committing { .. } => "committing",
        }
    }

    pub fn task_id(&self) -> Option<Uuid> {
        match self {
            DragState::Idle => None,
            DragState::Dragging { task_id, .. }
            | DragState::Snapping { task_id, .. }
            | DragState::Committing { task_id, .. } => Some(*task_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DragEvent {
    Begin {
        task_id: Uuid,
        pointer_offset: f64,
        baseline: NaiveDateTime,
    },
    Move {
        candidate: NaiveDateTime,
    },
    End,
    Resolve,
    Cancel,
}

impl DragEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DragEvent::Begin { .. } => "begin",
            DragEvent::Move { .. } => "move",
            DragEvent::End => "end",
            DragEvent::Resolve => "resolve",
            DragEvent::Cancel => "cancel",
        }
    }
}

/// Next state, or `None` when the event is not allowed in `state`
pub fn transition(state: &DragState, event: &DragEvent) -> Option<DragState> {
    use DragEvent as E;
    use DragState as S;

    match (state, event) {
        (
            S::Idle,
            E::Begin {
                task_id,
                pointer_offset,
                baseline,
            },
        ) => Some(S::Dragging {
            task_id: *task_id,
            pointer_offset: *pointer_offset,
            baseline: *baseline,
        }),

        (
            S::Dragging {
                task_id,
                pointer_offset,
                baseline,
            }
            | S::Snapping {
                task_id,
                pointer_offset,
                baseline,
                ..
            },
            E::Move { candidate },
        ) => Some(S::Snapping {
            task_id: *task_id,
            pointer_offset: *pointer_offset,
            baseline: *baseline,
            candidate: *candidate,
        }),

        // Released without moving
        (S::Dragging { .. }, E::End) => Some(S::Idle),

        (
            S::Snapping {
                task_id,
                baseline,
                candidate,
                ..
            },
            E::End,
        ) => Some(S::Committing {
            task_id: *task_id,
            baseline: *baseline,
            candidate: *candidate,
        }),

        (S::Committing { .. }, E::Resolve) => Some(S::Idle),

        (S::Dragging { .. } | S::Snapping { .. }, E::Cancel) => Some(S::Idle),

        _ => None,
    }
}

/// How a drag ended
#[derive(Debug, Clone, PartialEq)]
pub enum DropOutcome {
    Accepted(ReschedulePlan),
    /// The store refused the move; the task springs back
    Rejected {
        task_id: Uuid,
        candidate: NaiveDateTime,
        error: PlannerError,
    },
    Unchanged {
        task_id: Uuid,
    },
    Cancelled {
        task_id: Uuid,
    },
}

/// Drives one drag at a time against a store
#[derive(Debug, Clone)]
pub struct DragMachine {
    geometry: TimelineGeometry,
    grid: SnapGrid,
    state: DragState,
    last_outcome: Option<DropOutcome>,
}

impl DragMachine {
    pub fn new(geometry: TimelineGeometry, grid: SnapGrid) -> Self {
        Self {
            geometry,
            grid,
            state: DragState::Idle,
            last_outcome: None,
        }
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    /// Result of the most recent finished drag, for feedback after a drop
    pub fn last_outcome(&self) -> Option<&DropOutcome> {
        self.last_outcome.as_ref()
    }

    pub fn geometry(&self) -> &TimelineGeometry {
        &self.geometry
    }

    /// Task being dragged and where it would land now
    pub fn preview(&self) -> Option<(Uuid, NaiveDateTime)> {
        match self.state {
            DragState::Dragging {
                task_id, baseline, ..
            } => Some((task_id, baseline)),
            DragState::Snapping {
                task_id, candidate, ..
            }
            | DragState::Committing {
                task_id, candidate, ..
            } => Some((task_id, candidate)),
            DragState::Idle => None,
        }
    }

    fn fire(&mut self, event: DragEvent) -> Result<(), DragError> {
        let next = transition(&self.state, &event).ok_or(DragError::InvalidTransition {
            state: self.state.name(),
            event: event.name(),
        })?;
        debug!("drag {} -> {} on {}", self.state.name(), next.name(), event.name());
        self.state = next;
        Ok(())
    }

    /// Grab a task with the pointer at offset `pointer_y`
    pub fn begin(&mut self, store: &TaskStore, task_id: Uuid, pointer_y: f64) -> Result<(), DragError> {
        let task = store.task(task_id).ok_or(DragError::TaskNotFound(task_id))?;
        let baseline = task.start_time();
        let pointer_offset = pointer_y - self.geometry.y_for(baseline);
        self.fire(DragEvent::Begin {
            task_id,
            pointer_offset,
            baseline,
        })
    }

    /// Follow the pointer; returns the snapped candidate start
    pub fn move_to(&mut self, pointer_y: f64) -> Result<NaiveDateTime, DragError> {
        let (pointer_offset, baseline) = match self.state {
            DragState::Dragging {
                pointer_offset,
                baseline,
                ..
            }
            | DragState::Snapping {
                pointer_offset,
                baseline,
                ..
            } => (pointer_offset, baseline),
            _ => {
                return Err(DragError::InvalidTransition {
                    state: self.state.name(),
                    event: "move",
                })
            }
        };

        let raw = self.geometry.time_at(baseline.date(), pointer_y - pointer_offset);
        let candidate = self.grid.snap(raw);
        self.fire(DragEvent::Move { candidate })?;
        Ok(candidate)
    }

    /// Release the task and commit the candidate through the store
    pub fn end(&mut self, store: &mut TaskStore) -> Result<DropOutcome, DragError> {
        let task_id = self.state.task_id();
        self.fire(DragEvent::End)?;

        let outcome = match self.state {
            DragState::Committing {
                task_id,
                baseline,
                candidate,
            } => {
                let outcome = if candidate == baseline {
                    DropOutcome::Unchanged { task_id }
                } else {
                    match store.reschedule(task_id, candidate) {
                        Ok(plan) => DropOutcome::Accepted(plan),
                        Err(error) => {
                            info!("drop of {} at {} rejected: {}", task_id, candidate, error);
                            DropOutcome::Rejected {
                                task_id,
                                candidate,
                                error,
                            }
                        }
                    }
                };
                self.fire(DragEvent::Resolve)?;
                outcome
            }
            _ => DropOutcome::Unchanged {
                task_id: task_id.unwrap_or_default(),
            },
        };

        self.last_outcome = Some(outcome.clone());
        Ok(outcome)
    }

    /// Abandon the drag; the store is never touched
    pub fn cancel(&mut self) -> Result<DropOutcome, DragError> {
        let task_id = self.state.task_id();
        self.fire(DragEvent::Cancel)?;
        let outcome = DropOutcome::Cancelled {
            task_id: task_id.unwrap_or_default(),
        };
        self.last_outcome = Some(outcome.clone());
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskSpec;
    use crate::error::ConflictReason;
    use crate::reminders::testing::RecordingService;
    use crate::reminders::{FixedClock, ReminderScheduler};
    use pretty_assertions::assert_eq;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 2).unwrap()
    }

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        day().and_hms_opt(hour, minute, 0).unwrap()
    }

    fn machine() -> DragMachine {
        DragMachine::new(TimelineGeometry::default(), SnapGrid::default())
    }

    fn store_with(tasks: &[(&str, u32, u32, i64)]) -> (TaskStore, Vec<Uuid>) {
        let mut store = TaskStore::new(day());
        let ids = tasks
            .iter()
            .map(|(title, h, m, minutes)| {
                store
                    .add_task(TaskSpec::new(*title, at(*h, *m), Duration::minutes(*minutes)))
                    .unwrap()
                    .id()
            })
            .collect();
        (store, ids)
    }

    #[test]
    fn test_snap_to_nearest_quarter() {
        let grid = SnapGrid::default();
        assert_eq!(grid.snap(at(9, 13)), at(9, 15));
        assert_eq!(grid.snap(at(9, 7)), at(9, 0));
        assert_eq!(grid.snap(at(9, 52)), at(9, 45));
        assert_eq!(grid.snap(at(23, 53)), day().succ_opt().unwrap().and_hms_opt(0, 0, 0).unwrap());
    }

    #[test]
    fn test_geometry_round_trip() {
        let geometry = TimelineGeometry::default();
        assert_eq!(geometry.y_for(at(6, 0)), 0.0);
        assert_eq!(geometry.y_for(at(9, 30)), 210.0);
        assert_eq!(geometry.time_at(day(), 210.0), at(9, 30));
        // Clamped to the visible range
        assert_eq!(geometry.time_at(day(), -40.0), at(6, 0));
        assert_eq!(geometry.time_at(day(), 5000.0), at(23, 0));
    }

    #[test]
    fn test_degenerate_geometry_pins_to_top() {
        let flipped = TimelineGeometry {
            start_hour: 8,
            end_hour: 20,
            hour_height: -60.0,
        };
        assert_eq!(flipped.height(), 0.0);
        assert_eq!(flipped.time_at(day(), 120.0), at(8, 0));

        let unbounded = TimelineGeometry {
            start_hour: u32::MAX,
            end_hour: u32::MAX,
            hour_height: 60.0,
        };
        assert_eq!(unbounded.time_at(day(), 30.0), day().succ_opt().unwrap().and_hms_opt(0, 0, 0).unwrap());
    }

    #[test]
    fn test_huge_snap_step_is_one_day() {
        let grid = SnapGrid::minutes(i64::MAX);
        assert_eq!(grid.step(), Duration::days(1));
        assert_eq!(grid.snap(at(9, 0)), at(0, 0));
    }

    #[test]
    fn test_transition_table() {
        let id = Uuid::new_v4();
        let begin = DragEvent::Begin {
            task_id: id,
            pointer_offset: 4.0,
            baseline: at(9, 0),
        };
        let dragging = transition(&DragState::Idle, &begin).unwrap();
        assert_eq!(dragging.name(), "dragging");

        let snapping = transition(&dragging, &DragEvent::Move { candidate: at(9, 15) }).unwrap();
        assert_eq!(
            transition(&snapping, &DragEvent::End),
            Some(DragState::Committing {
                task_id: id,
                baseline: at(9, 0),
                candidate: at(9, 15),
            })
        );
        assert_eq!(transition(&dragging, &DragEvent::End), Some(DragState::Idle));
        assert_eq!(transition(&snapping, &DragEvent::Cancel), Some(DragState::Idle));

        assert_eq!(transition(&DragState::Idle, &DragEvent::End), None);
        assert_eq!(transition(&DragState::Idle, &DragEvent::Cancel), None);
        assert_eq!(transition(&dragging, &begin), None);
        assert_eq!(transition(&dragging, &DragEvent::Resolve), None);
    }

    #[test]
    fn test_drag_commits_snapped_time() {
        let (mut store, ids) = store_with(&[("Focus", 9, 0, 60)]);
        let mut drag = machine();
        let grab_y = drag.geometry().y_for(at(9, 0)) + 10.0;

        drag.begin(&store, ids[0], grab_y).unwrap();
        // 13 minutes further down
        let candidate = drag.move_to(grab_y + 13.0).unwrap();
        assert_eq!(candidate, at(9, 15));

        let outcome = drag.end(&mut store).unwrap();

        assert!(matches!(outcome, DropOutcome::Accepted(_)));
        assert_eq!(store.task(ids[0]).unwrap().start_time(), at(9, 15));
        assert_eq!(drag.state(), &DragState::Idle);
    }

    #[test]
    fn test_drag_pushes_neighbours() {
        let (mut store, ids) = store_with(&[("A", 9, 0, 60), ("B", 10, 0, 60)]);
        let mut drag = machine();
        let y = drag.geometry().y_for(at(9, 0));

        drag.begin(&store, ids[0], y).unwrap();
        drag.move_to(y + 30.0).unwrap();
        let outcome = drag.end(&mut store).unwrap();

        let DropOutcome::Accepted(plan) = outcome else {
            panic!("expected accepted drop");
        };
        assert_eq!(plan.cascaded.len(), 1);
        assert_eq!(store.task(ids[1]).unwrap().start_time(), at(10, 30));
    }

    #[test]
    fn test_rejected_drop_springs_back() {
        let (mut store, ids) = store_with(&[("Late", 21, 0, 60), ("Night", 22, 0, 120)]);
        let before = store.snapshot().to_json().unwrap();
        let mut drag = machine();
        let y = drag.geometry().y_for(at(21, 0));

        drag.begin(&store, ids[0], y).unwrap();
        drag.move_to(y + 60.0).unwrap();
        let outcome = drag.end(&mut store).unwrap();

        assert_eq!(
            outcome,
            DropOutcome::Rejected {
                task_id: ids[0],
                candidate: at(22, 0),
                error: PlannerError::SchedulingConflict {
                    task_id: ids[1],
                    reason: ConflictReason::OutsideDay,
                },
            }
        );
        assert_eq!(store.snapshot().to_json().unwrap(), before);
        assert_eq!(drag.last_outcome(), Some(&outcome));
    }

    #[test]
    fn test_release_in_place_never_calls_store() {
        let (mut store, ids) = store_with(&[("Stay", 9, 0, 60)]);
        let revision = store.revision();
        let mut drag = machine();
        let y = drag.geometry().y_for(at(9, 0));

        drag.begin(&store, ids[0], y).unwrap();
        assert_eq!(drag.end(&mut store).unwrap(), DropOutcome::Unchanged { task_id: ids[0] });

        drag.begin(&store, ids[0], y).unwrap();
        drag.move_to(y + 40.0).unwrap();
        // Back within snapping distance of where it started
        drag.move_to(y + 3.0).unwrap();
        assert_eq!(drag.end(&mut store).unwrap(), DropOutcome::Unchanged { task_id: ids[0] });

        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn test_cancel_leaves_store_and_reminders_alone() {
        let (mut store, ids) = store_with(&[("Call", 14, 0, 30)]);
        let service = RecordingService::new();
        store.attach_reminders(ReminderScheduler::new(
            Box::new(service.clone()),
            Box::new(FixedClock(at(8, 0))),
            Duration::minutes(10),
        ));
        service.clear();
        let revision = store.revision();
        let mut drag = machine();
        let y = drag.geometry().y_for(at(14, 0));

        drag.begin(&store, ids[0], y).unwrap();
        drag.move_to(y + 90.0).unwrap();
        assert_eq!(drag.cancel().unwrap(), DropOutcome::Cancelled { task_id: ids[0] });

        assert_eq!(store.revision(), revision);
        assert_eq!(store.task(ids[0]).unwrap().start_time(), at(14, 0));
        assert!(service.calls().is_empty());
    }

    #[test]
    fn test_invalid_operations() {
        let (mut store, _) = store_with(&[("Only", 9, 0, 60)]);
        let mut drag = machine();

        assert_eq!(
            drag.cancel(),
            Err(DragError::InvalidTransition { state: "idle", event: "cancel" })
        );
        assert_eq!(
            drag.move_to(100.0),
            Err(DragError::InvalidTransition { state: "idle", event: "move" })
        );
        assert!(drag.end(&mut store).is_err());

        let missing = Uuid::new_v4();
        assert_eq!(drag.begin(&store, missing, 0.0), Err(DragError::TaskNotFound(missing)));
    }
}
