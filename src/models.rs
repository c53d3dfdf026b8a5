use chrono::{DateTime, Days, Duration, FixedOffset, TimeZone};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::reminder::{DailyReminder, TaskReminder};
use crate::stats;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Done,
    Snoozed,
    Abandoned,
}

// Stored with the camelCase keys the mobile app writes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub text: String,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub due_date: Option<DateTime<FixedOffset>>,
    pub status: TaskStatus,
    #[serde(default)]
    pub snooze_count: u32,
    pub created_at: DateTime<FixedOffset>,
    #[serde(default)]
    pub notification_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("abandoned tasks cannot change status")]
    Abandoned,
    #[error("completed tasks cannot be snoozed")]
    AlreadyDone,
    #[error("completed tasks cannot be edited or deleted")]
    Completed,
}

impl Task {
    pub fn new(text: String, due_date: DateTime<FixedOffset>, now: DateTime<FixedOffset>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text,
            due_date: Some(due_date),
            status: TaskStatus::Pending,
            snooze_count: 0,
            created_at: now,
            notification_id: None,
        }
    }

    // pending|snoozed -> done, done -> pending
    pub fn toggle_done(&mut self) -> Result<(), TransitionError> {
        self.status = match self.status {
            TaskStatus::Pending | TaskStatus::Snoozed => TaskStatus::Done,
            TaskStatus::Done => TaskStatus::Pending,
            TaskStatus::Abandoned => return Err(TransitionError::Abandoned),
        };
        Ok(())
    }

    /// Defer the task to the next calendar day.
    ///
    /// The due time of day is kept. Overdue tasks, and tasks without a due
    /// date, land on tomorrow relative to `now`.
    pub fn snooze(&mut self, now: DateTime<FixedOffset>) -> Result<(), TransitionError> {
        match self.status {
            TaskStatus::Done => return Err(TransitionError::AlreadyDone),
            TaskStatus::Abandoned => return Err(TransitionError::Abandoned),
            TaskStatus::Pending | TaskStatus::Snoozed => {}
        }

        let deferred = self
            .due_date
            .map(next_day)
            .filter(|d| d.with_timezone(now.offset()).date_naive() > now.date_naive());
        self.due_date = Some(deferred.unwrap_or_else(|| next_day(now)));
        self.status = TaskStatus::Snoozed;
        self.snooze_count += 1;
        Ok(())
    }

    // Terminal; abandoning twice is a no-op
    pub fn abandon(&mut self) {
        self.status = TaskStatus::Abandoned;
    }

    // Done tasks are history: their text and day are frozen
    pub fn ensure_editable(&self) -> Result<(), TransitionError> {
        if self.status == TaskStatus::Done {
            return Err(TransitionError::Completed);
        }
        Ok(())
    }
}

const TUTORIAL: [(&str, &str); 7] = [
    ("tutorial-1", "Add a task for tomorrow 📅"),
    ("tutorial-2", "Edit a task to change its text ✏️"),
    ("tutorial-5", "Mark a task as done ✅"),
    ("tutorial-3", "Snooze a task to push it to tomorrow ➡️"),
    ("tutorial-4", "Delete a task you no longer need ⬅️"),
    ("tutorial-7", "Delete the tasks planned for tomorrow 🗑️"),
    ("tutorial-6", "Finish every task 🎉"),
];

/// Onboarding tasks written on first run, all due today at 06:00 in `tz`.
pub fn tutorial_tasks<Tz: TimeZone>(now: DateTime<FixedOffset>, tz: &Tz) -> Vec<Task> {
    let due = now
        .with_timezone(tz)
        .date_naive()
        .and_hms_opt(6, 0, 0)
        .and_then(|naive| tz.from_local_datetime(&naive).earliest())
        .map(|d| d.fixed_offset())
        .unwrap_or(now);

    TUTORIAL
        .iter()
        .map(|(id, text)| Task {
            id: id.to_string(),
            ..Task::new(text.to_string(), due, now)
        })
        .collect()
}

fn next_day(at: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    at.checked_add_days(Days::new(1))
        .unwrap_or(at + Duration::days(1))
}

// Missing, null or unparsable due dates all read as "no due date"
fn lenient_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<FixedOffset>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::String(s)) => DateTime::parse_from_rfc3339(&s).ok(),
        _ => None,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReminderSettings {
    pub daily_enabled: bool,
    pub daily_time: String, // "HH:MM"
    pub preview_limit: usize,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            daily_enabled: true,
            daily_time: "08:00".to_string(),
            preview_limit: 5,
        }
    }
}

/// Denormalized copy of the last computed streaks. Never authoritative.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StreakCache {
    pub current_streak: u32,
    pub best_streak: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Db {
    #[serde(default)]
    pub settings: ReminderSettings,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub streaks: Option<StreakCache>,
    #[serde(default)]
    pub daily_reminder: Option<DailyReminder>,
    #[serde(default)]
    pub task_reminders: Vec<TaskReminder>,
}

impl Db {
    pub fn find_task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Rebuild the streak cache from the current task list, as of `now`.
    pub fn refresh_streaks(&mut self, now: DateTime<FixedOffset>) -> StreakCache {
        let cache = stats::compute_stats(&self.tasks, now).streaks();
        self.streaks = Some(cache);
        cache
    }

    // Drop task reminders no task points to anymore (deleted or edited tasks)
    pub fn prune_task_reminders(&mut self) {
        let tasks = &self.tasks;
        self.task_reminders.retain(|r| {
            tasks
                .iter()
                .any(|t| t.id == r.task_id && t.notification_id.as_deref() == Some(r.id.as_str()))
        });
    }
}
