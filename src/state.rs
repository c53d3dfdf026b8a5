// --------------------------------------------------
// Shared handler state: the store and the clock.
//
// Handlers extract the part they need with
// `State<SharedStore>` / `State<Clock>`.
// --------------------------------------------------

use axum::extract::FromRef;
use chrono::{DateTime, FixedOffset, Local};

use crate::stats::{self, DayKey};
use crate::store::SharedStore;

/// Source of "now" for every handler.
#[derive(Debug, Clone, Copy)]
pub enum Clock {
    System,
    /// Frozen instant, used by tests to pin today.
    #[allow(dead_code)]
    Fixed(DateTime<FixedOffset>),
}

impl Clock {
    pub fn now(&self) -> DateTime<FixedOffset> {
        match self {
            Clock::System => Local::now().fixed_offset(),
            Clock::Fixed(at) => *at,
        }
    }

    // Today's key on the local calendar
    pub fn today(&self) -> DayKey {
        stats::day_key(&self.now(), &Local)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub clock: Clock,
}

impl AppState {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            clock: Clock::System,
        }
    }
}

impl FromRef<AppState> for SharedStore {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Clock {
    fn from_ref(state: &AppState) -> Self {
        state.clock
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    /// 2025-04-19 12:00 on the local wall clock.
    pub(crate) fn frozen() -> Clock {
        let at = Local
            .with_ymd_and_hms(2025, 4, 19, 12, 0, 0)
            .single()
            .unwrap()
            .fixed_offset();
        Clock::Fixed(at)
    }

    #[test]
    fn fixed_clock_does_not_move() {
        let clock = frozen();
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.today().to_string(), "2025-04-19");
    }

    #[test]
    fn system_clock_is_local_today() {
        let today = Clock::System.today();
        let local = Local::now().date_naive();
        // tolerate a midnight rollover between the two reads
        assert!((local - today).num_days().abs() <= 1);
    }
}
