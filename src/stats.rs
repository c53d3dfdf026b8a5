/*
Streak and completion statistics.
Pure functions over a task list, independent from storage and HTTP.
*/

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, Local, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use crate::models::{StreakCache, Task, TaskStatus};

/// Calendar day in local time, displayed as `YYYY-MM-DD`.
///
/// Ordering of `NaiveDate` is chronological, so sorted keys walk days in order.
pub type DayKey = NaiveDate;

// One snooze is tolerated, the second one breaks the day
const MAX_TOLERATED_SNOOZES: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResult {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub total_snoozes: u64,
    pub snooze_percentage: f64, // one decimal place
    pub best_streak: u32,
    pub current_streak: u32,
}

impl StatsResult {
    pub fn streaks(&self) -> StreakCache {
        StreakCache {
            current_streak: self.current_streak,
            best_streak: self.best_streak,
        }
    }
}

// Progress of today's list (abandoned tasks are hidden from it)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodayProgress {
    pub today_total: usize,
    pub today_done: usize,
}

pub fn day_key<Tz: TimeZone>(at: &DateTime<FixedOffset>, tz: &Tz) -> DayKey {
    at.with_timezone(tz).date_naive()
}

/// Group tasks by the calendar day of their due date in `tz`.
///
/// Tasks without a due date are skipped. Within a bucket, tasks keep
/// their input order.
pub fn group_by_day_in<'a, Tz: TimeZone>(
    tasks: &'a [Task],
    tz: &Tz,
) -> BTreeMap<DayKey, Vec<&'a Task>> {
    let mut buckets: BTreeMap<DayKey, Vec<&Task>> = BTreeMap::new();
    for task in tasks {
        let Some(due) = task.due_date else {
            continue;
        };
        buckets.entry(day_key(&due, tz)).or_default().push(task);
    }
    buckets
}

pub fn group_by_day(tasks: &[Task]) -> BTreeMap<DayKey, Vec<&Task>> {
    group_by_day_in(tasks, &Local)
}

// A task keeps the streak alive if it is done, abandoned,
// or snoozed no more than once.
fn keeps_streak(task: &Task) -> bool {
    match task.status {
        TaskStatus::Done | TaskStatus::Abandoned => true,
        TaskStatus::Snoozed => task.snooze_count <= MAX_TOLERATED_SNOOZES,
        TaskStatus::Pending => false,
    }
}

pub fn is_valid_day(day_tasks: &[&Task]) -> bool {
    day_tasks.iter().all(|t| keeps_streak(t))
}

/// Walk day buckets in ascending order up to and including `today`.
///
/// Rules:
/// - valid day right after the previous valid day -> current + 1
/// - valid day after a gap or after an invalid day -> current = 1
/// - invalid day -> current = 0
/// - days after `today` are ignored
pub fn streaks(buckets: &BTreeMap<DayKey, Vec<&Task>>, today: DayKey) -> StreakCache {
    let mut last_valid: Option<DayKey> = None;
    let mut current = 0;
    let mut best = 0;

    for (day, day_tasks) in buckets.range(..=today) {
        let valid = is_valid_day(day_tasks);
        if valid {
            // calendar-day ordinals, not millisecond deltas (DST safe)
            current = match last_valid {
                Some(last) if (*day - last).num_days() == 1 => current + 1,
                _ => 1,
            };
            last_valid = Some(*day);
            best = best.max(current);
        } else {
            current = 0;
            last_valid = None;
        }
        tracing::trace!(%day, valid, current, best, "streak walk");
    }

    StreakCache {
        current_streak: current,
        best_streak: best,
    }
}

fn snooze_percentage(total_snoozes: u64, total_tasks: usize) -> f64 {
    if total_tasks == 0 {
        return 0.0;
    }
    let raw = total_snoozes as f64 / total_tasks as f64 * 100.0;
    (raw * 10.0).round() / 10.0
}

/// Compute totals, snooze rate and streaks as seen on `today` in `tz`.
pub fn compute_stats_at<Tz: TimeZone>(tasks: &[Task], today: DayKey, tz: &Tz) -> StatsResult {
    let total_tasks = tasks.len();
    let completed_tasks = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Done)
        .count();
    let total_snoozes: u64 = tasks.iter().map(|t| u64::from(t.snooze_count)).sum();

    let buckets = group_by_day_in(tasks, tz);
    let streak = streaks(&buckets, today);

    StatsResult {
        total_tasks,
        completed_tasks,
        total_snoozes,
        snooze_percentage: snooze_percentage(total_snoozes, total_tasks),
        best_streak: streak.best_streak,
        current_streak: streak.current_streak,
    }
}

// Local-time stats as of the instant `now`
pub fn compute_stats(tasks: &[Task], now: DateTime<FixedOffset>) -> StatsResult {
    compute_stats_at(tasks, day_key(&now, &Local), &Local)
}

// Tasks shown for a given day ("today" / "tomorrow" lists)
pub fn tasks_for_day_in<'a, Tz: TimeZone>(tasks: &'a [Task], day: DayKey, tz: &Tz) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|t| t.status != TaskStatus::Abandoned)
        .filter(|t| t.due_date.is_some_and(|d| day_key(&d, tz) == day))
        .collect()
}

pub fn today_progress<Tz: TimeZone>(tasks: &[Task], today: DayKey, tz: &Tz) -> TodayProgress {
    let today_tasks = tasks_for_day_in(tasks, today, tz);
    TodayProgress {
        today_total: today_tasks.len(),
        today_done: today_tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Done)
            .count(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySummary {
    pub date: DayKey,
    pub total: usize,
    pub done: usize,
    pub valid: bool,
}

// Per-day breakdown of the streak walk, oldest first, future days excluded
pub fn day_summaries(buckets: &BTreeMap<DayKey, Vec<&Task>>, today: DayKey) -> Vec<DaySummary> {
    buckets
        .range(..=today)
        .map(|(day, day_tasks)| DaySummary {
            date: *day,
            total: day_tasks.len(),
            done: day_tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Done)
                .count(),
            valid: is_valid_day(day_tasks),
        })
        .collect()
}

/// A day is locked once every task on it is done without ever being snoozed.
pub fn is_day_locked(day_tasks: &[&Task]) -> bool {
    !day_tasks.is_empty()
        && day_tasks
            .iter()
            .all(|t| t.status == TaskStatus::Done && t.snooze_count == 0)
}
