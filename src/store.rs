use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{DateTime, FixedOffset, Local};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::models::{self, Db};

pub const DEFAULT_DB_PATH: &str = "data/db.json";

/// Store shared by the handlers. Holding the lock across load/mutate/save
/// keeps read-modify-write sequences from interleaving.
pub type SharedStore = Arc<Mutex<JsonStore>>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error on db file: {0}")]
    Io(#[from] io::Error),
    #[error("invalid db file: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // A db file that does not exist yet reads as an empty db
    pub fn load(&self) -> Result<Db, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Db::default()),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, db: &Db) -> Result<(), StoreError> {
        let mut tmp_path = self.path.clone().into_os_string();
        tmp_path.push(".tmp");
        let text = serde_json::to_string_pretty(db)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        fs::write(&tmp_path, text)?;
        fs::rename(&tmp_path, &self.path)?;
        tracing::debug!(path = %self.path.display(), tasks = db.tasks.len(), "db saved");
        Ok(())
    }

    /// First run: write the onboarding tasks when no db file exists yet.
    ///
    /// Returns whether anything was written. An existing file, even one
    /// with no tasks, is left alone.
    pub fn seed_if_missing(&self, now: DateTime<FixedOffset>) -> Result<bool, StoreError> {
        if self.path.try_exists()? {
            return Ok(false);
        }

        let mut db = Db {
            tasks: models::tutorial_tasks(now, &Local),
            ..Db::default()
        };
        db.refresh_streaks(now);
        self.save(&db)?;
        tracing::info!(tasks = db.tasks.len(), "seeded tutorial tasks");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StreakCache, Task};
    use chrono::DateTime;

    #[test]
    fn missing_file_is_an_empty_db() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("nope.json"));
        let db = store.load().unwrap();
        assert!(db.tasks.is_empty());
    }

    #[test]
    fn save_then_load_keeps_tasks_and_cache() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("nested/db.json"));

        let now = DateTime::parse_from_rfc3339("2025-04-19T10:00:00+02:00").unwrap();
        let mut db = Db::default();
        db.tasks.push(Task::new("Plan the week".to_string(), now, now));
        db.streaks = Some(StreakCache { current_streak: 3, best_streak: 5 });
        store.save(&db).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.tasks.len(), 1);
        assert_eq!(loaded.tasks[0].text, "Plan the week");
        assert_eq!(loaded.streaks, db.streaks);
        assert!(!dir.path().join("nested/db.json.tmp").exists());
    }

    #[test]
    fn seeds_only_a_fresh_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("db.json"));
        let now = DateTime::parse_from_rfc3339("2025-04-19T10:00:00+02:00").unwrap();

        assert!(store.seed_if_missing(now).unwrap());
        let db = store.load().unwrap();
        assert_eq!(db.tasks.len(), 7);
        assert!(db.tasks.iter().all(|t| t.id.starts_with("tutorial-")));
        assert!(db.streaks.is_some());

        // the user cleared everything: no re-seeding
        store.save(&Db::default()).unwrap();
        assert!(!store.seed_if_missing(now).unwrap());
        assert!(store.load().unwrap().tasks.is_empty());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        fs::write(&path, "{ not json").unwrap();

        let err = JsonStore::new(&path).load().unwrap_err();
        assert!(matches!(err, StoreError::Json(_)));
    }
}
