//! One local reminder per upcoming task, kept in step with the timeline.
//!
//! The scheduler remembers the fire time it registered for every task. A sync
//! that would register the same fire time again does nothing, so repeated
//! store mutations never stack reminders for one task.

use crate::domain::TaskItem;
use crate::error::NotificationError;
use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

pub const REMINDER_CATEGORY: &str = "TASK_REMINDER";
pub const COMPLETE_ACTION: &str = "COMPLETE_TASK_ACTION";
pub const SNOOZE_ACTION: &str = "SNOOZE_TASK_ACTION";
const REMINDER_PREFIX: &str = "task-reminder-";

/// Source of "now" for deciding what is past due
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock frozen at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// What the user sees when a reminder fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderContent {
    pub task_id: Uuid,
    pub title: String,
    pub body: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationAction {
    pub id: String,
    pub title: String,
    /// Opens the app when chosen
    pub foreground: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationCategory {
    pub id: String,
    pub actions: Vec<NotificationAction>,
}

/// Categories registered before the first reminder is scheduled
pub fn reminder_categories() -> Vec<NotificationCategory> {
    vec![NotificationCategory {
        id: REMINDER_CATEGORY.to_string(),
        actions: vec![
            NotificationAction {
                id: COMPLETE_ACTION.to_string(),
                title: "Complete".to_string(),
                foreground: true,
            },
            NotificationAction {
                id: SNOOZE_ACTION.to_string(),
                title: "Snooze 15 min".to_string(),
                foreground: false,
            },
        ],
    }]
}

/// Notification identifier derived from the stable task id
pub fn reminder_id(task_id: Uuid) -> String {
    format!("{}{}", REMINDER_PREFIX, task_id)
}

fn task_id_from_reminder(id: &str) -> Option<Uuid> {
    id.strip_prefix(REMINDER_PREFIX)
        .and_then(|raw| Uuid::parse_str(raw).ok())
}

/// A reminder already registered with the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReminder {
    pub id: String,
    pub fire_at: NaiveDateTime,
    pub content: ReminderContent,
}

/// OS-level delivery of local notifications
///
/// Scheduling an identifier that is already pending replaces it.
pub trait NotificationService {
    fn request_authorization(&mut self) -> bool;

    fn register_categories(&mut self, categories: &[NotificationCategory]);

    fn schedule(
        &mut self,
        id: &str,
        fire_at: NaiveDateTime,
        content: &ReminderContent,
    ) -> Result<(), NotificationError>;

    fn cancel(&mut self, id: &str);

    /// Reminders registered by an earlier run
    fn pending(&self) -> Vec<PendingReminder> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Authorization {
    Unknown,
    Granted,
    Denied,
}

/// What the service currently holds for one task
#[derive(Debug, Clone, PartialEq, Eq)]
struct Scheduled {
    fire_at: NaiveDateTime,
    title: String,
}

/// Keeps one reminder per future task at `start - lead_time`
pub struct ReminderScheduler {
    service: Box<dyn NotificationService>,
    clock: Box<dyn Clock>,
    lead_time: Duration,
    scheduled: HashMap<Uuid, Scheduled>,
    authorization: Authorization,
}

impl ReminderScheduler {
    pub fn new(
        service: Box<dyn NotificationService>,
        clock: Box<dyn Clock>,
        lead_time: Duration,
    ) -> Self {
        let scheduled = service
            .pending()
            .into_iter()
            .filter_map(|p| {
                task_id_from_reminder(&p.id).map(|id| {
                    let scheduled = Scheduled {
                        fire_at: p.fire_at,
                        title: p.content.title,
                    };
                    (id, scheduled)
                })
            })
            .collect();
        Self {
            service,
            clock,
            lead_time,
            scheduled,
            authorization: Authorization::Unknown,
        }
    }

    pub fn lead_time(&self) -> Duration {
        self.lead_time
    }

    /// Fire time currently registered for a task
    pub fn scheduled_for(&self, task_id: Uuid) -> Option<NaiveDateTime> {
        self.scheduled.get(&task_id).map(|s| s.fire_at)
    }

    fn ensure_authorized(&mut self) -> bool {
        if self.authorization == Authorization::Unknown {
            if self.service.request_authorization() {
                self.service.register_categories(&reminder_categories());
                self.authorization = Authorization::Granted;
            } else {
                warn!("notification authorization denied; tasks will run without reminders");
                self.authorization = Authorization::Denied;
            }
        }
        self.authorization == Authorization::Granted
    }

    /// Bring one task's reminder in line with its current start and title
    pub fn sync_task(&mut self, task: &TaskItem) {
        let wanted = task
            .start_time()
            .checked_sub_signed(self.lead_time)
            .filter(|fire_at| !task.is_completed() && *fire_at > self.clock.now());
        let current = self.scheduled.get(&task.id());
        let current_fire = current.map(|s| s.fire_at);
        let renamed = current.is_some_and(|s| s.title != task.title());
        if wanted == current_fire && !(wanted.is_some() && renamed) {
            return;
        }

        let id = reminder_id(task.id());
        // Same fire time: scheduling again under the same id replaces the content
        if current_fire.is_some() && wanted != current_fire {
            self.service.cancel(&id);
            self.scheduled.remove(&task.id());
        }

        let Some(fire_at) = wanted else {
            debug!("no reminder for {} (past due or completed)", task.id());
            return;
        };
        if !self.ensure_authorized() {
            return;
        }

        let content = ReminderContent {
            task_id: task.id(),
            title: task.title().to_string(),
            body: format!("Starting in {} minutes", self.lead_time.num_minutes()),
            category: REMINDER_CATEGORY.to_string(),
        };
        match self.service.schedule(&id, fire_at, &content) {
            Ok(()) => {
                info!("reminder for '{}' at {}", task.title(), fire_at);
                let scheduled = Scheduled {
                    fire_at,
                    title: task.title().to_string(),
                };
                self.scheduled.insert(task.id(), scheduled);
            }
            Err(e) => warn!("failed to schedule reminder for {}: {}", task.id(), e),
        }
    }

    /// Drop the reminder of a deleted task
    pub fn forget(&mut self, task_id: Uuid) {
        // The service may hold a reminder from an earlier run we never saw
        self.service.cancel(&reminder_id(task_id));
        self.scheduled.remove(&task_id);
    }

    /// Reconcile with the full task list of `day`
    ///
    /// Reminders for tasks of that day that are no longer listed are dropped;
    /// reminders belonging to other days are left alone.
    pub fn sync_day<'a, I>(&mut self, day: NaiveDate, tasks: I)
    where
        I: IntoIterator<Item = &'a TaskItem>,
    {
        let tasks: Vec<&TaskItem> = tasks.into_iter().collect();
        let present: HashSet<Uuid> = tasks.iter().map(|task| task.id()).collect();
        let lead_time = self.lead_time;
        let stale: Vec<Uuid> = self
            .scheduled
            .iter()
            .filter(|(id, scheduled)| {
                let start = scheduled.fire_at.checked_add_signed(lead_time);
                start.is_some_and(|start| start.date() == day) && !present.contains(*id)
            })
            .map(|(id, _)| *id)
            .collect();
        for id in stale {
            self.forget(id);
        }
        for task in tasks {
            self.sync_task(task);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Authorize,
        Register(usize),
        Schedule(String, NaiveDateTime),
        Cancel(String),
    }

    /// Notification service that records every call
    #[derive(Clone)]
    pub struct RecordingService {
        pub calls: Rc<RefCell<Vec<Call>>>,
        /// Title of every scheduled reminder, in call order
        pub titles: Rc<RefCell<Vec<String>>>,
        pub grant: bool,
        pub fail_schedule: bool,
    }

    impl RecordingService {
        pub fn new() -> Self {
            Self {
                calls: Rc::new(RefCell::new(Vec::new())),
                titles: Rc::new(RefCell::new(Vec::new())),
                grant: true,
                fail_schedule: false,
            }
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }

        /// Only schedule/cancel calls, which are what tests usually care about
        pub fn reminder_calls(&self) -> Vec<Call> {
            self.calls()
                .into_iter()
                .filter(|c| matches!(c, Call::Schedule(..) | Call::Cancel(_)))
                .collect()
        }

        pub fn clear(&self) {
            self.calls.borrow_mut().clear();
            self.titles.borrow_mut().clear();
        }
    }

    impl NotificationService for RecordingService {
        fn request_authorization(&mut self) -> bool {
            self.calls.borrow_mut().push(Call::Authorize);
            self.grant
        }

        fn register_categories(&mut self, categories: &[NotificationCategory]) {
            self.calls.borrow_mut().push(Call::Register(categories.len()));
        }

        fn schedule(
            &mut self,
            id: &str,
            fire_at: NaiveDateTime,
            content: &ReminderContent,
        ) -> Result<(), NotificationError> {
            self.calls
                .borrow_mut()
                .push(Call::Schedule(id.to_string(), fire_at));
            self.titles.borrow_mut().push(content.title.clone());
            if self.fail_schedule {
                return Err(NotificationError::Other("queue full".to_string()));
            }
            Ok(())
        }

        fn cancel(&mut self, id: &str) {
            self.calls.borrow_mut().push(Call::Cancel(id.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{Call, RecordingService};
    use super::*;
    use crate::domain::TaskSpec;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 7, 9)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn scheduler(service: &RecordingService) -> ReminderScheduler {
        ReminderScheduler::new(
            Box::new(service.clone()),
            Box::new(FixedClock(at(8, 0))),
            Duration::minutes(10),
        )
    }

    fn task_at(hour: u32, minute: u32) -> TaskItem {
        TaskItem::new(TaskSpec::new("Standup", at(hour, minute), Duration::minutes(30))).unwrap()
    }

    #[test]
    fn test_first_schedule_authorizes_and_registers() {
        let service = RecordingService::new();
        let mut reminders = scheduler(&service);
        let task = task_at(14, 0);

        reminders.sync_task(&task);

        assert_eq!(
            service.calls(),
            vec![
                Call::Authorize,
                Call::Register(1),
                Call::Schedule(reminder_id(task.id()), at(13, 50)),
            ]
        );
        assert_eq!(reminders.scheduled_for(task.id()), Some(at(13, 50)));
    }

    #[test]
    fn test_reschedule_replaces_reminder() {
        let service = RecordingService::new();
        let mut reminders = scheduler(&service);
        let mut task = task_at(14, 0);
        reminders.sync_task(&task);
        service.clear();

        task.move_to(at(15, 0));
        reminders.sync_task(&task);

        let id = reminder_id(task.id());
        assert_eq!(
            service.calls(),
            vec![Call::Cancel(id.clone()), Call::Schedule(id, at(14, 50))]
        );
    }

    #[test]
    fn test_same_fire_time_is_deduplicated() {
        let service = RecordingService::new();
        let mut reminders = scheduler(&service);
        let task = task_at(14, 0);
        reminders.sync_task(&task);
        service.clear();

        reminders.sync_task(&task);
        reminders.sync_day(task.start_time().date(), [&task]);

        assert!(service.calls().is_empty());
    }

    #[test]
    fn test_renamed_task_gets_fresh_reminder_content() {
        let service = RecordingService::new();
        let mut reminders = scheduler(&service);
        let mut task = task_at(14, 0);
        reminders.sync_task(&task);
        service.clear();

        task.title = "Daily standup".to_string();
        reminders.sync_task(&task);
        reminders.sync_task(&task);

        assert_eq!(
            service.calls(),
            vec![Call::Schedule(reminder_id(task.id()), at(13, 50))]
        );
        assert_eq!(service.titles.borrow().last().map(String::as_str), Some("Daily standup"));
        assert_eq!(reminders.scheduled_for(task.id()), Some(at(13, 50)));
    }

    #[test]
    fn test_past_due_is_not_scheduled() {
        let service = RecordingService::new();
        let mut reminders = scheduler(&service);

        // 08:05 start fires at 07:55, before the clock's 08:00
        reminders.sync_task(&task_at(8, 5));

        assert!(service.calls().is_empty());
    }

    #[test]
    fn test_moving_into_the_past_cancels() {
        let service = RecordingService::new();
        let mut reminders = scheduler(&service);
        let mut task = task_at(14, 0);
        reminders.sync_task(&task);
        service.clear();

        task.move_to(at(7, 0));
        reminders.sync_task(&task);

        assert_eq!(service.calls(), vec![Call::Cancel(reminder_id(task.id()))]);
        assert_eq!(reminders.scheduled_for(task.id()), None);
    }

    #[test]
    fn test_completed_task_loses_reminder() {
        let service = RecordingService::new();
        let mut reminders = scheduler(&service);
        let mut task = task_at(14, 0);
        reminders.sync_task(&task);
        service.clear();

        task.toggle_completion();
        reminders.sync_task(&task);

        assert_eq!(service.calls(), vec![Call::Cancel(reminder_id(task.id()))]);
    }

    #[test]
    fn test_denied_authorization_degrades_silently() {
        let mut service = RecordingService::new();
        service.grant = false;
        let mut reminders = scheduler(&service);

        reminders.sync_task(&task_at(14, 0));
        reminders.sync_task(&task_at(16, 0));

        // Asked once, never scheduled
        assert_eq!(service.calls(), vec![Call::Authorize]);
    }

    #[test]
    fn test_schedule_failure_is_not_remembered() {
        let mut service = RecordingService::new();
        service.fail_schedule = true;
        let mut reminders = scheduler(&service);
        let task = task_at(14, 0);

        reminders.sync_task(&task);

        assert_eq!(reminders.scheduled_for(task.id()), None);
    }

    #[test]
    fn test_sync_day_forgets_missing_tasks_of_that_day_only() {
        let service = RecordingService::new();
        let mut reminders = scheduler(&service);
        let day = at(0, 0).date();
        let kept = task_at(14, 0);
        let dropped = task_at(16, 0);
        let tomorrow = TaskItem::new(TaskSpec::new(
            "Tomorrow",
            at(9, 0) + Duration::days(1),
            Duration::minutes(30),
        ))
        .unwrap();
        reminders.sync_day(day, [&kept, &dropped]);
        reminders.sync_task(&tomorrow);
        service.clear();

        reminders.sync_day(day, [&kept]);

        assert_eq!(service.calls(), vec![Call::Cancel(reminder_id(dropped.id()))]);
        assert!(reminders.scheduled_for(tomorrow.id()).is_some());
    }

    #[test]
    fn test_reminder_id_round_trip() {
        let id = Uuid::new_v4();
        assert_eq!(task_id_from_reminder(&reminder_id(id)), Some(id));
        assert_eq!(task_id_from_reminder("todo-reminder-x"), None);
    }
}
