// --------------------------------------------------
// Handles API endpoints related to task operations
// and reminder settings.
//
// Responsibilities:
// - Create / list / edit / delete tasks
// - Toggle done, snooze, abandon
// - Refresh the streak cache after every change
// - Get / update reminder settings
// --------------------------------------------------

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Days, Duration, FixedOffset, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::{Db, ReminderSettings, Task};
use crate::reminder;
use crate::state::Clock;
use crate::stats;
use crate::store::SharedStore;

fn parse_date(raw: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| AppError::bad_request("invalid date"))
}

fn parse_due_at(raw: &str) -> AppResult<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw).map_err(|_| AppError::bad_request("invalid dueAt"))
}

fn required_text(raw: &str) -> AppResult<String> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(AppError::bad_request("text required"));
    }
    Ok(text.to_string())
}

// Today's list is read-only once everything on it is done without snoozes
fn ensure_unlocked(db: &Db, id: &str, today: NaiveDate) -> AppResult<()> {
    let task = db
        .tasks
        .iter()
        .find(|t| t.id == id)
        .ok_or(AppError::NotFound)?;

    let due_today = task
        .due_date
        .is_some_and(|d| stats::day_key(&d, &Local) == today);
    if due_today && stats::is_day_locked(&stats::tasks_for_day_in(&db.tasks, today, &Local)) {
        return Err(AppError::Conflict("today's list is complete and locked".to_string()));
    }
    Ok(())
}

// load -> check lock -> apply -> refresh streaks -> save, all under the store lock
async fn update_one(
    store: &SharedStore,
    clock: Clock,
    id: &str,
    apply: impl FnOnce(&mut Task, DateTime<FixedOffset>) -> AppResult<()>,
) -> AppResult<Task> {
    let now = clock.now();
    let store = store.lock().await;
    let mut db = store.load()?;

    ensure_unlocked(&db, id, clock.today())?;
    let task = db.find_task_mut(id).ok_or(AppError::NotFound)?;
    apply(task, now)?;
    let updated = task.clone();

    db.prune_task_reminders();
    db.refresh_streaks(now);
    store.save(&db)?;
    Ok(updated)
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskView {
    #[default]
    Today,
    Tomorrow,
    All,
}

#[derive(Debug, Default, Deserialize)]
pub struct TasksQuery {
    pub view: Option<TaskView>,
    pub date: Option<String>, // "YYYY-MM-DD", wins over `view`
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TasksResponse {
    pub date: Option<NaiveDate>,
    pub now: String,
    pub locked: bool,
    pub tasks: Vec<Task>,
}

// -----------------------------
// GET /api/tasks?view=today|tomorrow|all
// GET /api/tasks?date=YYYY-MM-DD
// Day views hide abandoned tasks
// -----------------------------
pub async fn get_tasks(
    State(store): State<SharedStore>,
    State(clock): State<Clock>,
    Query(q): Query<TasksQuery>,
) -> AppResult<Json<TasksResponse>> {
    let now = clock.now();
    let today = clock.today();

    let date = match (q.date.as_deref(), q.view.unwrap_or_default()) {
        (Some(raw), _) => Some(parse_date(raw)?),
        (None, TaskView::Today) => Some(today),
        (None, TaskView::Tomorrow) => today.succ_opt(),
        (None, TaskView::All) => None,
    };

    let db = store.lock().await.load()?;

    let (tasks, locked): (Vec<Task>, bool) = match date {
        Some(day) => {
            let day_tasks = stats::tasks_for_day_in(&db.tasks, day, &Local);
            let locked = day == today && stats::is_day_locked(&day_tasks);
            (day_tasks.into_iter().cloned().collect(), locked)
        }
        None => (db.tasks, false),
    };

    Ok(Json(TasksResponse {
        date,
        now: now.to_rfc3339(),
        locked,
        tasks,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskInput {
    pub text: String,
    pub due_at: Option<String>,    // RFC3339
    pub remind_at: Option<String>, // "HH:MM" tomorrow, used when dueAt is absent
    #[serde(default)]
    pub reminder: bool,
}

// -----------------------------
// POST /api/tasks
// New tasks are due tomorrow unless dueAt says otherwise
// -----------------------------
pub async fn create_task(
    State(store): State<SharedStore>,
    State(clock): State<Clock>,
    Json(input): Json<CreateTaskInput>,
) -> AppResult<Json<Task>> {
    let text = required_text(&input.text)?;
    let now = clock.now();

    let due_at = match (input.due_at.as_deref(), input.remind_at.as_deref()) {
        (Some(raw), _) => parse_due_at(raw)?,
        (None, Some(hhmm)) => {
            let tomorrow = clock
                .today()
                .succ_opt()
                .ok_or_else(|| AppError::bad_request("date out of range"))?;
            reminder::parse_hhmm_on(tomorrow, hhmm, &Local)
                .ok_or_else(|| AppError::bad_request("invalid remindAt"))?
        }
        (None, None) => now
            .checked_add_days(Days::new(1))
            .unwrap_or(now + Duration::days(1)),
    };

    let mut task = Task::new(text, due_at, now);

    let store = store.lock().await;
    let mut db = store.load()?;

    if input.reminder {
        match reminder::plan_task_reminder(&task, now) {
            Some(planned) => {
                task.notification_id = Some(planned.id.clone());
                db.task_reminders.push(planned);
            }
            None => tracing::warn!(task_id = %task.id, "due date too close, no reminder planned"),
        }
    }

    db.tasks.push(task.clone());
    db.refresh_streaks(now);
    store.save(&db)?;

    tracing::info!(task_id = %task.id, due = %due_at, "task created");
    Ok(Json(task))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskInput {
    pub text: String,
    pub due_at: Option<String>, // RFC3339
}

// -----------------------------
// PUT /api/tasks/:id
// Edits drop any reminder planned for the task.
// Completed tasks cannot be edited.
// -----------------------------
pub async fn update_task(
    State(store): State<SharedStore>,
    State(clock): State<Clock>,
    Path(id): Path<String>,
    Json(input): Json<UpdateTaskInput>,
) -> AppResult<Json<Task>> {
    let text = required_text(&input.text)?;
    let due_at = input.due_at.as_deref().map(parse_due_at).transpose()?;

    let updated = update_one(&store, clock, &id, |task, _| {
        task.ensure_editable()?;
        task.text = text;
        if due_at.is_some() {
            task.due_date = due_at;
        }
        task.notification_id = None;
        Ok(())
    })
    .await?;

    tracing::info!(task_id = %id, "task edited");
    Ok(Json(updated))
}

// -----------------------------
// DELETE /api/tasks/:id
// Removes a task permanently, unless it is completed
// -----------------------------
pub async fn delete_task(
    State(store): State<SharedStore>,
    State(clock): State<Clock>,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let store = store.lock().await;
    let mut db = store.load()?;

    ensure_unlocked(&db, &id, clock.today())?;
    if let Some(task) = db.tasks.iter().find(|t| t.id == id) {
        task.ensure_editable()?;
    }
    db.tasks.retain(|t| t.id != id);

    db.prune_task_reminders();
    db.refresh_streaks(clock.now());
    store.save(&db)?;

    tracing::info!(task_id = %id, "task deleted");
    Ok(Json(serde_json::json!({ "ok": true })))
}

// -----------------------------
// POST /api/tasks/:id/toggle
// Toggles task status between pending and done
// -----------------------------
pub async fn toggle_task(
    State(store): State<SharedStore>,
    State(clock): State<Clock>,
    Path(id): Path<String>,
) -> AppResult<Json<Task>> {
    let updated = update_one(&store, clock, &id, |task, _| Ok(task.toggle_done()?)).await?;
    tracing::info!(task_id = %id, status = ?updated.status, "task toggled");
    Ok(Json(updated))
}

// -----------------------------
// POST /api/tasks/:id/snooze
// Moves the task to the next day
// -----------------------------
pub async fn snooze_task(
    State(store): State<SharedStore>,
    State(clock): State<Clock>,
    Path(id): Path<String>,
) -> AppResult<Json<Task>> {
    let updated = update_one(&store, clock, &id, |task, now| Ok(task.snooze(now)?)).await?;
    tracing::info!(task_id = %id, snoozes = updated.snooze_count, "task snoozed");
    Ok(Json(updated))
}

// -----------------------------
// POST /api/tasks/:id/abandon
// Kept for stats, hidden from day views
// -----------------------------
pub async fn abandon_task(
    State(store): State<SharedStore>,
    State(clock): State<Clock>,
    Path(id): Path<String>,
) -> AppResult<Json<Task>> {
    let updated = update_one(&store, clock, &id, |task, _| {
        task.abandon();
        Ok(())
    })
    .await?;
    tracing::info!(task_id = %id, "task abandoned");
    Ok(Json(updated))
}

// -----------------------------
// GET /api/settings
// -----------------------------
pub async fn get_settings(State(store): State<SharedStore>) -> AppResult<Json<ReminderSettings>> {
    let db = store.lock().await.load()?;
    Ok(Json(db.settings))
}

// -----------------------------
// PUT /api/settings
// -----------------------------
pub async fn put_settings(
    State(store): State<SharedStore>,
    State(clock): State<Clock>,
    Json(settings): Json<ReminderSettings>,
) -> AppResult<Json<ReminderSettings>> {
    // format check only, any zone will do
    if reminder::parse_hhmm_on(clock.today(), &settings.daily_time, &Utc).is_none() {
        return Err(AppError::bad_request("dailyTime must be HH:MM"));
    }
    if settings.preview_limit == 0 {
        return Err(AppError::bad_request("previewLimit must be at least 1"));
    }

    let store = store.lock().await;
    let mut db = store.load()?;
    db.settings = settings;
    store.save(&db)?;

    Ok(Json(db.settings))
}
