// --------------------------------------------------
// Reminder planning.
//
// Nothing here talks to a platform notification API:
// planned reminders are stored in the db and handed to
// whatever delivers them.
//
// - one daily "tomorrow" digest, at most once per day
// - optional reminder per task, at its due date
// --------------------------------------------------

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ReminderSettings, Task};
use crate::stats::DayKey;

pub const DAILY_TITLE: &str = "À Demain ✨";
pub const TASK_TITLE: &str = "Task reminder";

const EMPTY_DIGEST: &str = "You have tasks to do today 🧠";
const DIGEST_HEADER: &str = "Your tasks for today:";

// Anything closer than this is considered already due
const MIN_LEAD_SECS: i64 = 60;
const FALLBACK_DELAY_MIN: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReminder {
    pub id: String,
    pub planned_on: DayKey, // idempotency key
    pub title: String,
    pub body: String,
    pub fire_at: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskReminder {
    pub id: String,
    pub task_id: String,
    pub title: String,
    pub body: String,
    pub fire_at: DateTime<FixedOffset>,
}

// Parse a "HH:MM" string into a DateTime on the given date in `tz`.
// The offset is the one `tz` uses on that date, not today's.
pub fn parse_hhmm_on<Tz: TimeZone>(
    date: NaiveDate,
    hhmm: &str,
    tz: &Tz,
) -> Option<DateTime<FixedOffset>> {
    let (h, m) = hhmm.split_once(':')?;
    let h: u32 = h.trim().parse().ok()?;
    let m: u32 = m.trim().parse().ok()?;
    let naive = date.and_hms_opt(h, m, 0)?;
    tz.from_local_datetime(&naive).earliest().map(|d| d.fixed_offset())
}

/// Push fire times that are past or less than a minute away to now + 5 minutes.
pub fn normalize_trigger(
    at: DateTime<FixedOffset>,
    now: DateTime<FixedOffset>,
) -> DateTime<FixedOffset> {
    if at <= now + Duration::seconds(MIN_LEAD_SECS) {
        now + Duration::minutes(FALLBACK_DELAY_MIN)
    } else {
        at
    }
}

// Digest text: header + up to `limit` bullets + overflow line
pub fn digest_body(tasks: &[&Task], limit: usize) -> String {
    if tasks.is_empty() {
        return EMPTY_DIGEST.to_string();
    }

    let mut lines = vec![DIGEST_HEADER.to_string()];
    lines.extend(tasks.iter().take(limit).map(|t| format!("• {}", t.text)));
    if tasks.len() > limit {
        lines.push(format!("...and {} more", tasks.len() - limit));
    }
    lines.join("\n")
}

/// Plan the daily digest for `tomorrow_tasks`.
///
/// Returns `None` when a digest was already planned today (the caller keeps
/// the existing one). Otherwise the returned reminder replaces the previous
/// one. It fires at the next occurrence of `settings.daily_time` on the
/// wall clock of `tz`, or 08:00 when the setting does not parse.
pub fn plan_daily_reminder<Tz: TimeZone>(
    existing: Option<&DailyReminder>,
    tomorrow_tasks: &[&Task],
    now: DateTime<FixedOffset>,
    settings: &ReminderSettings,
    tz: &Tz,
) -> Option<DailyReminder> {
    let today = now.with_timezone(tz).date_naive();
    if existing.is_some_and(|r| r.planned_on == today) {
        return None;
    }

    let at_time = |date: NaiveDate| {
        parse_hhmm_on(date, &settings.daily_time, tz)
            .or_else(|| parse_hhmm_on(date, "08:00", tz))
    };

    let fire_at = match at_time(today) {
        Some(t) if t > now => Some(t),
        _ => today.succ_opt().and_then(at_time),
    }
    .unwrap_or(now + Duration::days(1));

    Some(DailyReminder {
        id: Uuid::new_v4().to_string(),
        planned_on: today,
        title: DAILY_TITLE.to_string(),
        body: digest_body(tomorrow_tasks, settings.preview_limit),
        fire_at: normalize_trigger(fire_at, now),
    })
}

/// Reminder at the task's due date; `None` if it has no due date or is
/// due within the next minute.
pub fn plan_task_reminder(task: &Task, now: DateTime<FixedOffset>) -> Option<TaskReminder> {
    let due = task.due_date?;
    if due <= now + Duration::seconds(MIN_LEAD_SECS) {
        return None;
    }
    Some(TaskReminder {
        id: Uuid::new_v4().to_string(),
        task_id: task.id.clone(),
        title: TASK_TITLE.to_string(),
        body: task.text.clone(),
        fire_at: due,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn named(text: &str) -> Task {
        Task::new(text.to_string(), at("2025-04-20T09:00:00+02:00"), at("2025-04-19T10:00:00+02:00"))
    }

    #[test]
    fn parses_hhmm() {
        let date = NaiveDate::from_ymd_opt(2025, 4, 19).unwrap();
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(parse_hhmm_on(date, "07:45", &offset), Some(at("2025-04-19T07:45:00+02:00")));
        assert_eq!(parse_hhmm_on(date, "25:00", &offset), None);
        assert_eq!(parse_hhmm_on(date, "0745", &offset), None);
    }

    #[test]
    fn near_triggers_are_pushed_back() {
        let now = at("2025-04-19T10:00:00+02:00");
        assert_eq!(normalize_trigger(at("2025-04-19T10:00:30+02:00"), now), at("2025-04-19T10:05:00+02:00"));
        assert_eq!(normalize_trigger(at("2025-04-19T09:00:00+02:00"), now), at("2025-04-19T10:05:00+02:00"));
        assert_eq!(normalize_trigger(at("2025-04-19T11:00:00+02:00"), now), at("2025-04-19T11:00:00+02:00"));
    }

    #[test]
    fn digest_lists_first_tasks_and_overflow() {
        let tasks: Vec<Task> = ["a", "b", "c", "d", "e", "f", "g"].iter().map(|t| named(t)).collect();
        let refs: Vec<&Task> = tasks.iter().collect();

        let body = digest_body(&refs, 5);
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 7);
        assert_eq!(lines[0], DIGEST_HEADER);
        assert_eq!(lines[1], "• a");
        assert_eq!(lines[6], "...and 2 more");

        assert_eq!(digest_body(&[], 5), EMPTY_DIGEST);
    }

    #[test]
    fn daily_reminder_is_planned_once_per_day() {
        let now = at("2025-04-19T21:00:00+02:00");
        let tz = *now.offset();
        let settings = ReminderSettings::default();
        let task = named("Call a friend");

        let first = plan_daily_reminder(None, &[&task], now, &settings, &tz).unwrap();
        assert_eq!(first.planned_on, now.date_naive());
        assert_eq!(first.fire_at, at("2025-04-20T08:00:00+02:00"));
        assert!(first.body.contains("• Call a friend"));

        let later = at("2025-04-19T23:00:00+02:00");
        assert!(plan_daily_reminder(Some(&first), &[&task], later, &settings, &tz).is_none());

        let next_day = at("2025-04-20T07:00:00+02:00");
        let replaced = plan_daily_reminder(Some(&first), &[], next_day, &settings, &tz).unwrap();
        assert_ne!(replaced.id, first.id);
        assert_eq!(replaced.fire_at, at("2025-04-20T08:00:00+02:00"));
    }

    #[test]
    fn bad_daily_time_falls_back_to_eight() {
        let now = at("2025-04-19T06:00:00+00:00");
        let settings = ReminderSettings {
            daily_time: "noon".to_string(),
            ..ReminderSettings::default()
        };
        let planned = plan_daily_reminder(None, &[], now, &settings, now.offset()).unwrap();
        assert_eq!(planned.fire_at, at("2025-04-19T08:00:00+00:00"));
    }

    #[test]
    fn daily_reminder_uses_the_offset_of_the_fire_day() {
        // Evening before a spring-forward change: the wall clock of the
        // fire day is one hour ahead of the one `now` was read with.
        let now = at("2025-03-29T21:00:00+01:00");
        let summer = FixedOffset::east_opt(2 * 3600).unwrap();

        let planned =
            plan_daily_reminder(None, &[], now, &ReminderSettings::default(), &summer).unwrap();
        assert_eq!(planned.fire_at, at("2025-03-30T08:00:00+02:00"));
        assert_eq!(planned.fire_at.offset(), &summer);
    }

    #[test]
    fn task_reminder_needs_a_minute_of_lead() {
        let task = named("Water the plants");
        assert!(plan_task_reminder(&task, at("2025-04-20T08:59:30+02:00")).is_none());

        let planned = plan_task_reminder(&task, at("2025-04-19T10:00:00+02:00")).unwrap();
        assert_eq!(planned.task_id, task.id);
        assert_eq!(planned.fire_at, at("2025-04-20T09:00:00+02:00"));
        assert_eq!(planned.body, "Water the plants");
    }
}
