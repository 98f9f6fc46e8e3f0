//! Wire format of a persisted day and the fixed entity registry.

use crate::domain::{TaskCompletionRecord, TaskItem};
use crate::error::PersistenceError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Entity kinds sharing the persistence gateway, fixed at process start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Task,
    Subtask,
    /// Owned by the separate to-do list feature; carried through untouched
    TodoItem,
    TodoSubtask,
    TaskCompletionRecord,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "Task",
            Self::Subtask => "Subtask",
            Self::TodoItem => "TodoItem",
            Self::TodoSubtask => "TodoSubtask",
            Self::TaskCompletionRecord => "TaskCompletionRecord",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|kind| kind.as_str() == name)
    }

    pub fn all() -> &'static [EntityKind] {
        &[
            EntityKind::Task,
            EntityKind::Subtask,
            EntityKind::TodoItem,
            EntityKind::TodoSubtask,
            EntityKind::TaskCompletionRecord,
        ]
    }
}

fn registered_entity_names() -> Vec<String> {
    EntityKind::all()
        .iter()
        .map(|kind| kind.as_str().to_string())
        .collect()
}

/// Everything the store persists for one day
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub day: NaiveDate,
    #[serde(default = "registered_entity_names")]
    pub entities: Vec<String>,
    pub tasks: Vec<TaskItem>,
    #[serde(default)]
    pub completions: Vec<TaskCompletionRecord>,
    /// To-do list payloads, preserved verbatim
    #[serde(default)]
    pub todos: Vec<serde_json::Value>,
}

impl StoreSnapshot {
    pub fn new(
        day: NaiveDate,
        tasks: Vec<TaskItem>,
        completions: Vec<TaskCompletionRecord>,
        todos: Vec<serde_json::Value>,
    ) -> Self {
        Self {
            day,
            entities: registered_entity_names(),
            tasks,
            completions,
            todos,
        }
    }

    /// Reject snapshots written with entity kinds this build does not know
    pub fn check_registry(&self) -> Result<(), PersistenceError> {
        match self
            .entities
            .iter()
            .find(|name| EntityKind::from_name(name).is_none())
        {
            Some(unknown) => Err(PersistenceError::UnknownEntity(unknown.clone())),
            None => Ok(()),
        }
    }

    pub fn to_json(&self) -> Result<String, PersistenceError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(content: &str) -> Result<Self, PersistenceError> {
        let snapshot: StoreSnapshot = serde_json::from_str(content)?;
        snapshot.check_registry()?;
        Ok(snapshot)
    }
}
