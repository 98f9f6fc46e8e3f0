//! Local notification center backed by reminders.json.
//!
//! Reminders wait in the registry file until `fire_due` delivers them. Delivery
//! uses `osascript` on macOS and is a no-op elsewhere.

use crate::error::NotificationError;
use crate::persistence::{atomic_write, read_file};
use crate::reminders::{NotificationCategory, NotificationService, PendingReminder, ReminderContent};
use chrono::NaiveDateTime;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[cfg(target_os = "macos")]
use std::process::Command;

#[derive(Debug, Default, Serialize, Deserialize)]
struct ReminderRegistry {
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    reminders: Vec<PendingReminder>,
}

/// File-backed notification service for the command line
pub struct LocalNotificationCenter {
    path: PathBuf,
    registry: ReminderRegistry,
    allowed: bool,
}

impl LocalNotificationCenter {
    /// Open the registry at `path`; a missing file starts empty
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, NotificationError> {
        let path = path.into();
        let content = read_file(&path).map_err(|e| NotificationError::Other(format!("{:#}", e)))?;
        let registry = if content.trim().is_empty() {
            ReminderRegistry::default()
        } else {
            serde_json::from_str(&content)?
        };
        Ok(Self {
            path,
            registry,
            allowed: true,
        })
    }

    /// Whether authorization requests are granted
    pub fn allow(mut self, allowed: bool) -> Self {
        self.allowed = allowed;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn categories(&self) -> &[String] {
        &self.registry.categories
    }

    fn save(&self) -> Result<(), NotificationError> {
        let json = serde_json::to_string_pretty(&self.registry)?;
        atomic_write(&self.path, &json).map_err(|e| NotificationError::Other(format!("{:#}", e)))
    }

    /// Deliver and drop every reminder due at `now`, earliest first
    pub fn fire_due(&mut self, now: NaiveDateTime) -> Result<Vec<PendingReminder>, NotificationError> {
        let (due, waiting): (Vec<_>, Vec<_>) = self
            .registry
            .reminders
            .drain(..)
            .partition(|reminder| reminder.fire_at <= now);
        self.registry.reminders = waiting;

        if due.is_empty() {
            return Ok(due);
        }
        for reminder in &due {
            deliver(&reminder.content);
        }
        self.save()?;
        info!("delivered {} reminders", due.len());
        Ok(due)
    }
}

impl NotificationService for LocalNotificationCenter {
    fn request_authorization(&mut self) -> bool {
        self.allowed
    }

    fn register_categories(&mut self, categories: &[NotificationCategory]) {
        self.registry.categories = categories.iter().map(|c| c.id.clone()).collect();
        if let Err(e) = self.save() {
            warn!("failed to record notification categories: {}", e);
        }
    }

    fn schedule(
        &mut self,
        id: &str,
        fire_at: NaiveDateTime,
        content: &ReminderContent,
    ) -> Result<(), NotificationError> {
        if !self.allowed {
            return Err(NotificationError::AuthorizationDenied);
        }
        self.registry.reminders.retain(|r| r.id != id);
        self.registry.reminders.push(PendingReminder {
            id: id.to_string(),
            fire_at,
            content: content.clone(),
        });
        self.registry.reminders.sort_by_key(|r| r.fire_at);
        debug!("queued {} for {}", id, fire_at);
        self.save()
    }

    fn cancel(&mut self, id: &str) {
        let before = self.registry.reminders.len();
        self.registry.reminders.retain(|r| r.id != id);
        if self.registry.reminders.len() == before {
            return;
        }
        if let Err(e) = self.save() {
            warn!("failed to cancel reminder {}: {}", id, e);
        }
    }

    fn pending(&self) -> Vec<PendingReminder> {
        self.registry.reminders.clone()
    }
}

/// Show one reminder as a desktop notification
pub fn deliver(content: &ReminderContent) {
    #[cfg(target_os = "macos")]
    {
        let script = format!(
            r#"display notification "{}" with title "{}""#,
            content.body.replace('"', "\\\""),
            content.title.replace('"', "\\\"")
        );

        let _ = Command::new("osascript").arg("-e").arg(&script).output();
    }

    #[cfg(not(target_os = "macos"))]
    {
        // No-op on other platforms
        let _ = content;
    }
}
