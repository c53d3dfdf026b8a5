use axum::{extract::State, Json};
use chrono::{Local, NaiveDate};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::models::StreakCache;
use crate::reminder::{self, DailyReminder, TaskReminder};
use crate::state::Clock;
use crate::stats::{self, DaySummary, StatsResult, TodayProgress};
use crate::store::SharedStore;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub stats: StatsResult,
    #[serde(flatten)]
    pub today: TodayProgress,
}

// -----------------------------
// GET /api/stats
// Recomputes everything from the task list and refreshes the streak cache.
// An unreadable db yields zero stats instead of an error.
// -----------------------------
pub async fn get_stats(
    State(store): State<SharedStore>,
    State(clock): State<Clock>,
) -> AppResult<Json<StatsResponse>> {
    let today = clock.today();
    let store = store.lock().await;

    let mut db = match store.load() {
        Ok(db) => Some(db),
        Err(err) => {
            tracing::warn!(error = %err, "db unreadable, reporting empty stats");
            None
        }
    };

    let tasks = db.as_ref().map(|db| db.tasks.as_slice()).unwrap_or_default();
    let result = stats::compute_stats_at(tasks, today, &Local);
    let progress = stats::today_progress(tasks, today, &Local);

    if let Some(db) = db.as_mut() {
        let cache = result.streaks();
        if db.streaks != Some(cache) {
            db.streaks = Some(cache);
            store.save(db)?;
        }
    }

    Ok(Json(StatsResponse {
        date: today,
        stats: result,
        today: progress,
    }))
}

// -----------------------------
// GET /api/streaks
// Cached pair; rebuilt when the cache is missing
// -----------------------------
pub async fn get_streaks(
    State(store): State<SharedStore>,
    State(clock): State<Clock>,
) -> AppResult<Json<StreakCache>> {
    let store = store.lock().await;
    let mut db = store.load()?;

    if let Some(cache) = db.streaks {
        return Ok(Json(cache));
    }

    let cache = db.refresh_streaks(clock.now());
    store.save(&db)?;
    Ok(Json(cache))
}

// -----------------------------
// GET /api/stats/days
// Day-by-day view of what the streak walk saw
// -----------------------------
pub async fn get_day_history(
    State(store): State<SharedStore>,
    State(clock): State<Clock>,
) -> AppResult<Json<Vec<DaySummary>>> {
    let today = clock.today();
    let db = store.lock().await.load()?;
    let buckets = stats::group_by_day(&db.tasks);
    Ok(Json(stats::day_summaries(&buckets, today)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReminderResponse {
    pub scheduled: bool, // false when today's digest already existed
    pub reminder: Option<DailyReminder>,
}

// -----------------------------
// POST /api/reminders/daily
// Plans the digest of tomorrow's tasks, at most once per day
// -----------------------------
pub async fn schedule_daily_reminder(
    State(store): State<SharedStore>,
    State(clock): State<Clock>,
) -> AppResult<Json<DailyReminderResponse>> {
    let now = clock.now();
    let store = store.lock().await;
    let mut db = store.load()?;

    if !db.settings.daily_enabled {
        if db.daily_reminder.take().is_some() {
            store.save(&db)?;
            tracing::info!("daily reminder disabled, cancelled the planned one");
        }
        return Ok(Json(DailyReminderResponse {
            scheduled: false,
            reminder: None,
        }));
    }

    let tomorrow = clock
        .today()
        .succ_opt()
        .ok_or_else(|| AppError::bad_request("date out of range"))?;
    let tomorrow_tasks = stats::tasks_for_day_in(&db.tasks, tomorrow, &Local);

    let Some(planned) =
        reminder::plan_daily_reminder(
            db.daily_reminder.as_ref(),
            &tomorrow_tasks,
            now,
            &db.settings,
            &Local,
        )
    else {
        tracing::debug!("daily reminder already planned today");
        return Ok(Json(DailyReminderResponse {
            scheduled: false,
            reminder: db.daily_reminder,
        }));
    };

    if let Some(previous) = &db.daily_reminder {
        tracing::info!(previous = %previous.id, "replacing daily reminder");
    }
    tracing::info!(fire_at = %planned.fire_at, tasks = tomorrow_tasks.len(), "daily reminder planned");

    db.daily_reminder = Some(planned.clone());
    store.save(&db)?;

    Ok(Json(DailyReminderResponse {
        scheduled: true,
        reminder: Some(planned),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemindersResponse {
    pub daily: Option<DailyReminder>,
    pub tasks: Vec<TaskReminder>,
}

// -----------------------------
// GET /api/reminders
// Everything the delivery side has to schedule
// -----------------------------
pub async fn get_reminders(State(store): State<SharedStore>) -> AppResult<Json<RemindersResponse>> {
    let db = store.lock().await.load()?;
    Ok(Json(RemindersResponse {
        daily: db.daily_reminder,
        tasks: db.task_reminders,
    }))
}
