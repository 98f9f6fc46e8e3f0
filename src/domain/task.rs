use super::enums::{EnergyLevel, TaskColor};
use crate::error::ValidationError;
use chrono::{Duration, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Longest duration a task may have, in seconds
pub const MAX_DURATION_SECS: i64 = 24 * 60 * 60;

/// Half-open time range `[start, end)` occupied by a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Interval {
    /// Saturates at the end of representable time
    pub fn new(start: NaiveDateTime, duration: Duration) -> Self {
        Self::checked(start, duration).unwrap_or(Self {
            start,
            end: NaiveDateTime::MAX,
        })
    }

    /// `None` when the end is not representable
    pub fn checked(start: NaiveDateTime, duration: Duration) -> Option<Self> {
        start
            .checked_add_signed(duration)
            .map(|end| Self { start, end })
    }

    /// Two half-open ranges overlap when each starts before the other ends
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Format a duration as "Xh Ym" (omits 0 values)
pub fn format_duration(duration: Duration) -> String {
    let total_minutes = duration.num_minutes();
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours > 0 && minutes > 0 {
        format!("{}h {}m", hours, minutes)
    } else if hours > 0 {
        format!("{}h", hours)
    } else {
        format!("{}m", minutes)
    }
}

fn check_duration(secs: i64) -> Result<(), ValidationError> {
    if secs <= 0 {
        return Err(ValidationError::NonPositiveDuration(secs));
    }
    if secs > MAX_DURATION_SECS {
        return Err(ValidationError::DurationTooLong(secs));
    }
    Ok(())
}

/// A checklist entry owned by exactly one task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: Uuid,
    pub text: String,
    pub done: bool,
    /// Position within the owning task, unique per task
    pub order: u32,
}

impl Subtask {
    pub fn new(text: impl Into<String>, order: u32) -> Result<Self, ValidationError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(ValidationError::EmptySubtask);
        }
        Ok(Self {
            id: Uuid::new_v4(),
            text,
            done: false,
            order,
        })
    }
}

/// Everything needed to create a task; validated by [`TaskItem::new`]
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub title: String,
    pub icon: String,
    pub color: TaskColor,
    pub start: NaiveDateTime,
    pub duration: Duration,
    /// Raw ordinal, checked against the 0..=4 range on construction
    pub energy: u8,
    pub is_routine: bool,
    pub notes: Option<String>,
    pub subtasks: Vec<String>,
}

impl TaskSpec {
    pub fn new(title: impl Into<String>, start: NaiveDateTime, duration: Duration) -> Self {
        Self {
            title: title.into(),
            icon: "📝".to_string(),
            color: TaskColor::default(),
            start,
            duration,
            energy: EnergyLevel::default().ordinal(),
            is_routine: false,
            notes: None,
            subtasks: Vec::new(),
        }
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    pub fn color(mut self, color: TaskColor) -> Self {
        self.color = color;
        self
    }

    pub fn energy(mut self, energy: u8) -> Self {
        self.energy = energy;
        self
    }

    pub fn routine(mut self, is_routine: bool) -> Self {
        self.is_routine = is_routine;
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn subtask(mut self, text: impl Into<String>) -> Self {
        self.subtasks.push(text.into());
        self
    }
}

/// Editable, non-temporal fields of a task
#[derive(Debug, Clone, Default)]
pub struct TaskDetails {
    pub title: Option<String>,
    pub icon: Option<String>,
    pub color: Option<TaskColor>,
    pub energy: Option<u8>,
    /// `Some(None)` clears the notes
    pub notes: Option<Option<String>>,
}

/// A time-boxed task on the day's timeline
///
/// Identity is the `id`; two items with the same id are the same task even
/// when their fields differ.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskItem {
    pub(crate) id: Uuid,
    pub(crate) title: String,
    pub(crate) icon: String,
    pub(crate) color: TaskColor,
    pub(crate) start_time: NaiveDateTime,
    /// Stored in whole seconds
    pub(crate) duration_secs: i64,
    pub(crate) energy: EnergyLevel,
    pub(crate) is_routine: bool,
    pub(crate) subtasks: Vec<Subtask>,
    #[serde(default)]
    pub(crate) notes: Option<String>,
    #[serde(default)]
    pub(crate) is_completed: bool,
    #[serde(default)]
    pub(crate) completed_at: Option<NaiveDateTime>,
    pub(crate) created_at: NaiveDateTime,
    pub(crate) updated_at: NaiveDateTime,
}

impl TaskItem {
    pub fn new(spec: TaskSpec) -> Result<Self, ValidationError> {
        let title = spec.title.trim().to_string();
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        let duration_secs = spec.duration.num_seconds();
        check_duration(duration_secs)?;
        let energy = EnergyLevel::try_from(spec.energy)?;

        let now = Local::now().naive_local();
        let mut task = Self {
            id: Uuid::new_v4(),
            title,
            icon: spec.icon,
            color: spec.color,
            start_time: spec.start,
            duration_secs,
            energy,
            is_routine: spec.is_routine,
            subtasks: Vec::new(),
            notes: spec.notes.filter(|n| !n.trim().is_empty()),
            is_completed: false,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        for text in spec.subtasks {
            task.add_subtask(text)?;
        }
        Ok(task)
    }

    /// Check invariants of an item that did not come through [`TaskItem::new`]
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        check_duration(self.duration_secs)?;
        if self.subtasks.iter().any(|st| st.text.trim().is_empty()) {
            return Err(ValidationError::EmptySubtask);
        }
        Ok(())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn icon(&self) -> &str {
        &self.icon
    }

    pub fn color(&self) -> TaskColor {
        self.color
    }

    pub fn start_time(&self) -> NaiveDateTime {
        self.start_time
    }

    pub fn duration(&self) -> Duration {
        Duration::try_seconds(self.duration_secs).unwrap_or(Duration::MAX)
    }

    pub fn end_time(&self) -> NaiveDateTime {
        self.interval().end
    }

    pub fn interval(&self) -> Interval {
        Interval::new(self.start_time, self.duration())
    }

    /// The interval this task would occupy if it started at `start`, or
    /// `None` when that end is past representable time
    pub fn interval_at(&self, start: NaiveDateTime) -> Option<Interval> {
        Interval::checked(start, self.duration())
    }

    pub fn energy(&self) -> EnergyLevel {
        self.energy
    }

    pub fn is_routine(&self) -> bool {
        self.is_routine
    }

    pub fn subtasks(&self) -> &[Subtask] {
        &self.subtasks
    }

    pub fn subtask(&self, subtask_id: Uuid) -> Option<&Subtask> {
        self.subtasks.iter().find(|st| st.id == subtask_id)
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    pub fn completed_at(&self) -> Option<NaiveDateTime> {
        self.completed_at
    }

    pub fn created_at(&self) -> NaiveDateTime {
        self.created_at
    }

    pub fn updated_at(&self) -> NaiveDateTime {
        self.updated_at
    }

    /// Append a subtask after the current last one
    pub fn add_subtask(&mut self, text: impl Into<String>) -> Result<&Subtask, ValidationError> {
        let order = self
            .subtasks
            .iter()
            .map(|st| st.order + 1)
            .max()
            .unwrap_or(0);
        let subtask = Subtask::new(text, order)?;
        self.subtasks.push(subtask);
        self.touch();
        Ok(&self.subtasks[self.subtasks.len() - 1])
    }

    /// Remove a subtask by id, returning it if it existed
    pub(crate) fn remove_subtask(&mut self, subtask_id: Uuid) -> Option<Subtask> {
        let index = self.subtasks.iter().position(|st| st.id == subtask_id)?;
        let removed = self.subtasks.remove(index);
        self.touch();
        Some(removed)
    }

    /// Flip a subtask's done flag, returning the new value
    pub(crate) fn toggle_subtask(&mut self, subtask_id: Uuid) -> Option<bool> {
        let subtask = self.subtasks.iter_mut().find(|st| st.id == subtask_id)?;
        subtask.done = !subtask.done;
        let done = subtask.done;
        self.touch();
        Some(done)
    }

    /// Flip completion of a one-off task
    pub(crate) fn toggle_completion(&mut self) -> bool {
        self.is_completed = !self.is_completed;
        self.completed_at = if self.is_completed {
            Some(Local::now().naive_local())
        } else {
            None
        };
        self.touch();
        self.is_completed
    }

    pub(crate) fn move_to(&mut self, start: NaiveDateTime) {
        self.start_time = start;
        self.touch();
    }

    pub(crate) fn apply_details(&mut self, details: TaskDetails) -> Result<(), ValidationError> {
        // Validate everything before writing anything
        let title = match details.title {
            Some(title) if title.trim().is_empty() => return Err(ValidationError::EmptyTitle),
            Some(title) => Some(title.trim().to_string()),
            None => None,
        };
        let energy = details.energy.map(EnergyLevel::try_from).transpose()?;

        if let Some(title) = title {
            self.title = title;
        }
        if let Some(icon) = details.icon {
            self.icon = icon;
        }
        if let Some(color) = details.color {
            self.color = color;
        }
        if let Some(energy) = energy {
            self.energy = energy;
        }
        if let Some(notes) = details.notes {
            self.notes = notes.filter(|n| !n.trim().is_empty());
        }
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Local::now().naive_local();
    }

    pub fn completed_subtasks_count(&self) -> usize {
        self.subtasks.iter().filter(|st| st.done).count()
    }

    /// Fraction of subtasks done (0.0 when there are none)
    pub fn subtasks_progress(&self) -> f64 {
        if self.subtasks.is_empty() {
            return 0.0;
        }
        self.completed_subtasks_count() as f64 / self.subtasks.len() as f64
    }

    /// Format duration as "Xh Ym"
    pub fn duration_formatted(&self) -> String {
        format_duration(self.duration())
    }

    /// Format as "HH:MM - HH:MM"
    pub fn time_range_formatted(&self) -> String {
        format!(
            "{} - {}",
            self.start_time.format("%H:%M"),
            self.end_time().format("%H:%M")
        )
    }
}

impl PartialEq for TaskItem {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TaskItem {}

impl Hash for TaskItem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
