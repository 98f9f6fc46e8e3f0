//! Day planner engine: a conflict-free timeline of tasks, drag rescheduling
//! with push-right cascades, pluggable persistence and task reminders.

pub mod config;
pub mod domain;
pub mod drag;
pub mod error;
pub mod logging;
pub mod notifications;
pub mod persistence;
pub mod reminders;
pub mod store;
pub mod summary;

pub use domain::{TaskColor, TaskDetails, TaskItem, TaskSpec};
pub use drag::{DragMachine, DropOutcome, SnapGrid, TimelineGeometry};
pub use error::{PersistenceError, PlannerError};
pub use store::{StoreChange, StoreEvent, TaskStore};
