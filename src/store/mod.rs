//! Day-scoped task collection and the only write path into it.
//!
//! # Invariants
//! - No two stored tasks have overlapping intervals after any operation returns.
//! - A failed operation leaves the collection exactly as it was.
//! - Readers see a mutation (and subscribers are told) before it is saved and
//!   before reminders are touched.

pub mod cascade;
pub mod sample;

pub use cascade::{find_overlap, plan_reschedule, DayBounds, ReschedulePlan, Shift};

use crate::domain::{Subtask, TaskCompletionRecord, TaskDetails, TaskItem, TaskSpec};
use crate::error::{ConflictReason, PersistenceError, PlannerError};
use crate::persistence::{save_with_retry, PersistenceGateway, StoreSnapshot};
use crate::reminders::ReminderScheduler;
use chrono::{Local, NaiveDate, NaiveDateTime};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::sync::mpsc::{channel, Receiver, Sender};
use uuid::Uuid;

/// What a committed mutation touched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    Added(Uuid),
    Removed(Uuid),
    /// Every task whose start moved, moved task first
    Rescheduled(Vec<Uuid>),
    /// Subtasks, details or routine records; the interval is unchanged
    Updated(Uuid),
    CompletionChanged(Uuid),
    /// The whole collection was swapped (sample data, loaded snapshot)
    Replaced,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    pub revision: u64,
    pub change: StoreChange,
}

/// Dismissible warning that the last save did not reach storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceNotice {
    pub message: String,
    pub raised_at: NaiveDateTime,
}

/// Owns the tasks of one day
pub struct TaskStore {
    day: NaiveDate,
    /// Insertion order; breaks start-time ties in the cascade
    tasks: Vec<TaskItem>,
    completions: BTreeMap<(Uuid, NaiveDate), TaskCompletionRecord>,
    todos: Vec<serde_json::Value>,
    context: Option<Box<dyn PersistenceGateway>>,
    reminders: Option<ReminderScheduler>,
    subscribers: Vec<Sender<StoreEvent>>,
    revision: u64,
    pending_save: bool,
    notice: Option<PersistenceNotice>,
}

impl TaskStore {
    pub fn new(day: NaiveDate) -> Self {
        Self {
            day,
            tasks: Vec::new(),
            completions: BTreeMap::new(),
            todos: Vec::new(),
            context: None,
            reminders: None,
            subscribers: Vec::new(),
            revision: 0,
            pending_save: false,
            notice: None,
        }
    }

    pub fn day(&self) -> NaiveDate {
        self.day
    }

    pub fn bounds(&self) -> DayBounds {
        DayBounds::for_day(self.day)
    }

    /// Bumped once per committed mutation; cheap to poll
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Tasks in insertion order
    pub fn tasks(&self) -> &[TaskItem] {
        &self.tasks
    }

    pub fn task(&self, id: Uuid) -> Option<&TaskItem> {
        self.tasks.iter().find(|task| task.id() == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn completion_records(&self) -> impl Iterator<Item = &TaskCompletionRecord> {
        self.completions.values()
    }

    pub fn is_routine_completed(&self, task_id: Uuid, day: NaiveDate) -> bool {
        self.completions
            .get(&(task_id, day))
            .map(|record| record.completed)
            .unwrap_or(false)
    }

    pub fn notice(&self) -> Option<&PersistenceNotice> {
        self.notice.as_ref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// True while the in-memory state is ahead of storage
    pub fn has_unsaved_changes(&self) -> bool {
        self.pending_save
    }

    /// Receive an event for every committed mutation
    pub fn subscribe(&mut self) -> Receiver<StoreEvent> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot::new(
            self.day,
            self.tasks.clone(),
            self.completions.values().cloned().collect(),
            self.todos.clone(),
        )
    }

    /// Fresh copy sorted by start time, ties by id
    pub fn tasks_sorted_by_start(&self) -> Vec<TaskItem> {
        let mut sorted = self.tasks.clone();
        sorted.sort_by(|a, b| {
            a.start_time()
                .cmp(&b.start_time())
                .then(a.id().cmp(&b.id()))
        });
        sorted
    }

    /// Bind the persistence gateway
    ///
    /// A stored day is validated and adopted. Mutations made before binding
    /// are merged into it: unsaved tasks that fit around the stored ones are
    /// kept, the rest are dropped and named in a notice. The merged day is
    /// then written back.
    pub fn set_model_context(
        &mut self,
        mut context: Box<dyn PersistenceGateway>,
    ) -> Result<(), PersistenceError> {
        let Some(snapshot) = context.load(self.day)? else {
            self.context = Some(context);
            if self.pending_save {
                info!("binding storage with unsaved changes for {}", self.day);
                self.persist();
            }
            return Ok(());
        };

        let todos = snapshot.todos;
        let (stored_tasks, stored_completions) =
            self.validate_snapshot(snapshot.tasks, snapshot.completions, snapshot.day)?;
        self.context = Some(context);

        if !self.pending_save {
            self.tasks = stored_tasks;
            self.completions = stored_completions;
            self.todos = todos;
            info!("loaded {} tasks for {}", self.tasks.len(), self.day);
            self.announce(StoreChange::Replaced);
            return Ok(());
        }

        let unsaved = std::mem::take(&mut self.tasks);
        let unsaved_completions = std::mem::take(&mut self.completions);
        let (tasks, dropped) = merge_unsaved(stored_tasks, unsaved);
        let mut completions = stored_completions;
        for (key, record) in unsaved_completions {
            if tasks.iter().any(|task| task.id() == key.0) {
                completions.insert(key, record);
            }
        }
        info!(
            "merged unsaved changes into stored day {} ({} tasks, {} dropped)",
            self.day,
            tasks.len(),
            dropped.len()
        );
        self.tasks = tasks;
        self.completions = completions;
        self.todos = todos;
        self.commit(StoreChange::Replaced);

        if !dropped.is_empty() {
            let titles: Vec<&str> = dropped.iter().map(|task| task.title()).collect();
            warn!("dropped unsaved tasks clashing with {}: {:?}", self.day, titles);
            self.raise_notice(format!(
                "Unsaved tasks clashed with the stored plan and were dropped: {}",
                titles.join(", ")
            ));
        }
        Ok(())
    }

    fn validate_snapshot(
        &self,
        tasks: Vec<TaskItem>,
        completions: Vec<TaskCompletionRecord>,
        day: NaiveDate,
    ) -> Result<(Vec<TaskItem>, BTreeMap<(Uuid, NaiveDate), TaskCompletionRecord>), PersistenceError> {
        if day != self.day {
            return Err(PersistenceError::Other(format!(
                "snapshot is for {}, store is for {}",
                day, self.day
            )));
        }
        let bounds = self.bounds();
        for task in &tasks {
            task.validate()
                .map_err(|e| PersistenceError::Other(format!("task {}: {}", task.id(), e)))?;
            if !bounds.contains(&task.interval()) {
                return Err(PersistenceError::Other(format!(
                    "task {} lies outside {}",
                    task.id(),
                    self.day
                )));
            }
        }
        if let Some((a, b)) = find_overlap(&tasks) {
            return Err(PersistenceError::Other(format!(
                "stored tasks {} and {} overlap",
                a, b
            )));
        }

        let mut records = BTreeMap::new();
        for record in completions {
            let owner_is_routine = tasks
                .iter()
                .any(|task| task.id() == record.task_id && task.is_routine());
            if owner_is_routine {
                records.insert(record.key(), record);
            } else {
                warn!("dropping completion record of unknown routine {}", record.task_id);
            }
        }
        Ok((tasks, records))
    }

    /// Wire the reminder scheduler in and reconcile it with the current tasks
    pub fn attach_reminders(&mut self, mut scheduler: ReminderScheduler) {
        scheduler.sync_day(self.day, &self.tasks);
        self.reminders = Some(scheduler);
    }

    pub fn reminders(&self) -> Option<&ReminderScheduler> {
        self.reminders.as_ref()
    }

    /// Create and insert a task; refuses any overlap
    pub fn add_task(&mut self, spec: TaskSpec) -> Result<TaskItem, PlannerError> {
        let task = TaskItem::new(spec)?;
        let bounds = self.bounds();
        let interval = task
            .interval_at(task.start_time())
            .filter(|interval| bounds.contains(interval))
            .ok_or(PlannerError::SchedulingConflict {
                task_id: task.id(),
                reason: ConflictReason::OutsideDay,
            })?;
        if let Some(other) = self.tasks.iter().find(|t| t.interval().overlaps(&interval)) {
            return Err(PlannerError::SchedulingConflict {
                task_id: task.id(),
                reason: ConflictReason::Overlaps(other.id()),
            });
        }

        info!("added '{}' at {}", task.title(), task.time_range_formatted());
        self.tasks.push(task.clone());
        self.commit(StoreChange::Added(task.id()));
        Ok(task)
    }

    /// Delete a task with its subtasks and completion records; no-op if absent
    pub fn remove_task(&mut self, id: Uuid) -> Option<TaskItem> {
        let index = self.tasks.iter().position(|task| task.id() == id)?;
        let removed = self.tasks.remove(index);
        self.completions.retain(|(task_id, _), _| *task_id != id);

        info!("removed '{}'", removed.title());
        self.commit(StoreChange::Removed(id));
        Some(removed)
    }

    /// Move a task to `new_start`, pushing displaced tasks right
    ///
    /// All-or-nothing: on `SchedulingConflict` no task has moved.
    pub fn reschedule(
        &mut self,
        id: Uuid,
        new_start: NaiveDateTime,
    ) -> Result<ReschedulePlan, PlannerError> {
        let plan = plan_reschedule(&self.tasks, id, new_start, self.bounds())?;
        if plan.is_noop() {
            debug!("reschedule of {} to its current start ignored", id);
            return Ok(plan);
        }

        for shift in plan.changes() {
            if let Some(task) = self.tasks.iter_mut().find(|t| t.id() == shift.task_id) {
                task.move_to(shift.to);
            }
        }
        debug_assert!(find_overlap(&self.tasks).is_none());

        info!(
            "rescheduled {} to {} ({} pushed)",
            id,
            new_start.format("%H:%M"),
            plan.cascaded.len()
        );
        self.commit(StoreChange::Rescheduled(plan.changed_ids()));
        Ok(plan)
    }

    fn task_mut(&mut self, id: Uuid) -> Result<&mut TaskItem, PlannerError> {
        self.tasks
            .iter_mut()
            .find(|task| task.id() == id)
            .ok_or(PlannerError::TaskNotFound(id))
    }

    /// Flip a subtask's done flag, returning the new value
    pub fn toggle_subtask(&mut self, task_id: Uuid, subtask_id: Uuid) -> Result<bool, PlannerError> {
        let done = self
            .task_mut(task_id)?
            .toggle_subtask(subtask_id)
            .ok_or(PlannerError::SubtaskNotFound { task_id, subtask_id })?;
        self.commit(StoreChange::Updated(task_id));
        Ok(done)
    }

    pub fn add_subtask(&mut self, task_id: Uuid, text: &str) -> Result<Subtask, PlannerError> {
        let subtask = self.task_mut(task_id)?.add_subtask(text)?.clone();
        self.commit(StoreChange::Updated(task_id));
        Ok(subtask)
    }

    pub fn remove_subtask(&mut self, task_id: Uuid, subtask_id: Uuid) -> Result<Subtask, PlannerError> {
        let removed = self
            .task_mut(task_id)?
            .remove_subtask(subtask_id)
            .ok_or(PlannerError::SubtaskNotFound { task_id, subtask_id })?;
        self.commit(StoreChange::Updated(task_id));
        Ok(removed)
    }

    /// Flip completion of a one-off task
    pub fn toggle_completion(&mut self, task_id: Uuid) -> Result<bool, PlannerError> {
        let task = self.task_mut(task_id)?;
        if task.is_routine() {
            return Err(PlannerError::RoutineCompletion(task_id));
        }
        let completed = task.toggle_completion();
        self.commit(StoreChange::CompletionChanged(task_id));
        Ok(completed)
    }

    /// Mark or unmark a routine for one day; other days are untouched
    pub fn toggle_routine_completion(
        &mut self,
        task_id: Uuid,
        day: NaiveDate,
    ) -> Result<bool, PlannerError> {
        let task = self.task(task_id).ok_or(PlannerError::TaskNotFound(task_id))?;
        if !task.is_routine() {
            return Err(PlannerError::NotRoutine(task_id));
        }

        let completed = match self.completions.get_mut(&(task_id, day)) {
            Some(record) => record.toggle(),
            None => {
                self.completions
                    .insert((task_id, day), TaskCompletionRecord::new(task_id, day));
                true
            }
        };
        self.commit(StoreChange::Updated(task_id));
        Ok(completed)
    }

    /// Edit title, icon, color, energy or notes
    pub fn update_details(&mut self, task_id: Uuid, details: TaskDetails) -> Result<(), PlannerError> {
        self.task_mut(task_id)?.apply_details(details)?;
        self.commit(StoreChange::Updated(task_id));
        Ok(())
    }

    /// Replace everything with the fixed demo day
    pub fn load_sample_data(&mut self) -> Result<(), PlannerError> {
        let tasks = sample::sample_tasks(self.day)?;
        self.tasks = tasks;
        self.completions.clear();
        info!("loaded sample data for {}", self.day);
        self.commit(StoreChange::Replaced);
        Ok(())
    }

    /// Publish, save, then resync reminders
    fn commit(&mut self, change: StoreChange) {
        self.publish(&change);
        self.persist();
        self.resync_reminders(&change);
    }

    /// Publish and resync without saving (state came from storage)
    fn announce(&mut self, change: StoreChange) {
        self.publish(&change);
        self.resync_reminders(&change);
    }

    fn publish(&mut self, change: &StoreChange) {
        self.revision += 1;
        let event = StoreEvent {
            revision: self.revision,
            change: change.clone(),
        };
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn persist(&mut self) {
        if self.context.is_none() {
            debug!("no storage bound; keeping change in memory");
            self.pending_save = true;
            return;
        }

        let snapshot = self.snapshot();
        let Some(gateway) = self.context.as_mut() else {
            return;
        };
        match save_with_retry(gateway.as_mut(), &snapshot) {
            Ok(()) => {
                self.pending_save = false;
                self.notice = None;
            }
            Err(e) => {
                warn!("could not save {}: {}", self.day, e);
                self.pending_save = true;
                self.notice = Some(PersistenceNotice {
                    message: format!("Changes are kept but could not be saved: {}", e),
                    raised_at: Local::now().naive_local(),
                });
            }
        }
    }

    /// Append to the current notice, or raise a new one
    fn raise_notice(&mut self, message: String) {
        let message = match self.notice.take() {
            Some(previous) => format!("{} {}", previous.message, message),
            None => message,
        };
        self.notice = Some(PersistenceNotice {
            message,
            raised_at: Local::now().naive_local(),
        });
    }

    fn resync_reminders(&mut self, change: &StoreChange) {
        let Some(scheduler) = self.reminders.as_mut() else {
            return;
        };
        let day = self.day;
        let tasks = &self.tasks;
        let find = |id: &Uuid| tasks.iter().find(|task| task.id() == *id);

        match change {
            StoreChange::Added(id)
            | StoreChange::CompletionChanged(id)
            | StoreChange::Updated(id) => {
                if let Some(task) = find(id) {
                    scheduler.sync_task(task);
                }
            }
            StoreChange::Rescheduled(ids) => {
                for task in ids.iter().filter_map(find) {
                    scheduler.sync_task(task);
                }
            }
            StoreChange::Removed(id) => scheduler.forget(*id),
            StoreChange::Replaced => scheduler.sync_day(day, tasks),
        }
    }
}

/// Stored tasks first, then each unsaved task that neither shares an id with
/// nor overlaps what is already kept. Returns the kept and the dropped tasks.
fn merge_unsaved(stored: Vec<TaskItem>, unsaved: Vec<TaskItem>) -> (Vec<TaskItem>, Vec<TaskItem>) {
    let mut kept = stored;
    let mut dropped = Vec::new();
    for task in unsaved {
        let interval = task.interval();
        let clashes = kept
            .iter()
            .any(|other| other.id() == task.id() || other.interval().overlaps(&interval));
        if clashes {
            dropped.push(task);
        } else {
            kept.push(task);
        }
    }
    (kept, dropped)
}
