//! Error types for the planner engine.

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Malformed input rejected when building a task or subtask.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("task title cannot be empty")]
    EmptyTitle,

    #[error("task duration must be positive, got {0}s")]
    NonPositiveDuration(i64),

    #[error("task duration cannot exceed one day, got {0}s")]
    DurationTooLong(i64),

    #[error("energy level must be within 0..=4, got {0}")]
    EnergyOutOfRange(u8),

    #[error("subtask text cannot be empty")]
    EmptySubtask,
}

/// Why a placement was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    /// The interval overlaps another task (strict creation)
    Overlaps(Uuid),
    /// The interval would start before 00:00 or end after 24:00
    OutsideDay,
}

impl std::fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Overlaps(other) => write!(f, "overlaps task {}", other),
            Self::OutsideDay => write!(f, "would leave the day"),
        }
    }
}

/// Errors surfaced by task store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlannerError {
    #[error("invalid task: {0}")]
    Validation(#[from] ValidationError),

    /// A placement (direct or cascaded) cannot fit the day
    #[error("scheduling conflict for task {task_id}: {reason}")]
    SchedulingConflict { task_id: Uuid, reason: ConflictReason },

    #[error("task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("subtask {subtask_id} not found in task {task_id}")]
    SubtaskNotFound { task_id: Uuid, subtask_id: Uuid },

    #[error("task {0} is not a routine")]
    NotRoutine(Uuid),

    #[error("task {0} is a routine; completion is tracked per day")]
    RoutineCompletion(Uuid),
}

impl PlannerError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::SchedulingConflict { .. })
    }
}

/// Errors raised by a persistence gateway.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Another writer holds the store lock
    #[error("store is locked: {}", .0.display())]
    Locked(PathBuf),

    #[error("snapshot registers unknown entity kind `{0}`")]
    UnknownEntity(String),

    #[error("{0}")]
    Other(String),
}

/// Errors raised by a notification service.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification authorization denied")]
    AuthorizationDenied,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors raised by the drag state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DragError {
    #[error("cannot apply `{event}` while {state}")]
    InvalidTransition {
        state: &'static str,
        event: &'static str,
    },

    #[error("task not found: {0}")]
    TaskNotFound(Uuid),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_message_names_task() {
        let id = Uuid::new_v4();
        let err = PlannerError::SchedulingConflict {
            task_id: id,
            reason: ConflictReason::OutsideDay,
        };
        assert!(err.is_conflict());
        assert!(err.to_string().contains(&id.to_string()));
        assert!(err.to_string().contains("leave the day"));
    }

    #[test]
    fn test_validation_converts_into_planner_error() {
        let err: PlannerError = ValidationError::EnergyOutOfRange(7).into();
        assert_eq!(err, PlannerError::Validation(ValidationError::EnergyOutOfRange(7)));
        assert!(!err.is_conflict());
    }
}
