pub mod completion;
pub mod enums;
pub mod task;

pub use completion::TaskCompletionRecord;
pub use enums::{DurationPreset, EnergyLevel, TaskColor};
pub use task::{format_duration, Interval, Subtask, TaskDetails, TaskItem, TaskSpec};
