use std::sync::{Mutex, PoisonError};

use anyhow::{Result, anyhow};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::db::Database;

/// Key under which the whole resume-point map is stored.
pub(crate) const PROGRESS_NAMESPACE: &str = "seriesProgress";

/// Durable local key/value storage.
pub(crate) trait KvStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

impl KvStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.get_value(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.put_value(key, value)
    }
}

/// Best-effort resume points, `seriesId -> season -> episodeIndex`, kept as one
/// JSON document. Storage faults are logged and never reach the caller.
pub(crate) struct ProgressStore {
    store: Mutex<Box<dyn KvStore>>,
}

impl ProgressStore {
    pub(crate) fn new(store: Box<dyn KvStore>) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }

    pub(crate) fn save(&self, series_id: &str, season: &str, episode_index: usize) {
        match self.try_save(series_id, season, episode_index) {
            Ok(()) => debug!(series_id, season, episode_index, "resume point saved"),
            Err(err) => warn!(series_id, season, "failed to save resume point: {err:#}"),
        }
    }

    /// Stored index, or 0 when absent or unreadable.
    pub(crate) fn load(&self, series_id: &str, season: &str) -> usize {
        match self.try_load(series_id, season) {
            Ok(index) => index.unwrap_or(0),
            Err(err) => {
                warn!(series_id, season, "failed to load resume point: {err:#}");
                0
            }
        }
    }

    /// Stored index clamped to the season's current episode list.
    pub(crate) fn resume_index(
        &self,
        series_id: &str,
        season: &str,
        episode_count: usize,
    ) -> usize {
        self.load(series_id, season)
            .min(episode_count.saturating_sub(1))
    }

    fn read_document(&self, store: &dyn KvStore) -> Result<Map<String, Value>> {
        let Some(raw) = store.get(PROGRESS_NAMESPACE)? else {
            return Ok(Map::new());
        };
        match serde_json::from_str::<Value>(&raw)? {
            Value::Object(document) => Ok(document),
            Value::Null => Ok(Map::new()),
            other => Err(anyhow!("progress document is not an object: {other}")),
        }
    }

    fn try_load(&self, series_id: &str, season: &str) -> Result<Option<usize>> {
        let store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        let document = self.read_document(&**store)?;
        let Some(stored) = document.get(series_id).and_then(|seasons| seasons.get(season)) else {
            return Ok(None);
        };
        let index = stored
            .as_u64()
            .and_then(|index| usize::try_from(index).ok())
            .ok_or_else(|| anyhow!("invalid resume point {stored}"))?;
        Ok(Some(index))
    }

    fn try_save(&self, series_id: &str, season: &str, episode_index: usize) -> Result<()> {
        let store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        let mut document = match self.read_document(&**store) {
            Ok(document) => document,
            Err(err) => {
                warn!("discarding unreadable progress document: {err:#}");
                Map::new()
            }
        };

        let seasons = document
            .entry(series_id.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !seasons.is_object() {
            *seasons = Value::Object(Map::new());
        }
        if let Value::Object(seasons) = seasons {
            seasons.insert(season.to_string(), Value::from(episode_index));
        }

        store.set(
            PROGRESS_NAMESPACE,
            &serde_json::to_string(&Value::Object(document))?,
        )
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use anyhow::{Result, anyhow};

    use super::KvStore;

    /// In-memory store whose contents stay inspectable from the test.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct MemoryStore {
        pub(crate) values: Arc<Mutex<HashMap<String, String>>>,
        pub(crate) fail_writes: bool,
    }

    impl KvStore for MemoryStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            Ok(self.values.lock().expect("lock store").get(key).cloned())
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            if self.fail_writes {
                return Err(anyhow!("disk full"));
            }
            self.values
                .lock()
                .expect("lock store")
                .insert(key.to_string(), value.to_string());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryStore;
    use super::*;

    fn store_with(raw: Option<&str>) -> (ProgressStore, MemoryStore) {
        let memory = MemoryStore::default();
        if let Some(raw) = raw {
            memory
                .values
                .lock()
                .expect("lock store")
                .insert(PROGRESS_NAMESPACE.to_string(), raw.to_string());
        }
        (ProgressStore::new(Box::new(memory.clone())), memory)
    }

    #[test]
    fn save_then_load_is_keyed_by_series_and_season() {
        let (progress, memory) = store_with(None);
        progress.save("show", "T1", 3);
        progress.save("show", "T2", 1);
        progress.save("other", "T1", 7);

        assert_eq!(progress.load("show", "T1"), 3);
        assert_eq!(progress.load("show", "T2"), 1);
        assert_eq!(progress.load("other", "T1"), 7);
        assert_eq!(progress.load("show", "T3"), 0);

        let raw = memory.values.lock().expect("lock").get(PROGRESS_NAMESPACE).cloned();
        let document: Value = serde_json::from_str(&raw.expect("stored")).expect("json");
        assert_eq!(document["show"]["T1"], 3);
    }

    #[test]
    fn save_overwrites_previous_resume_point() {
        let (progress, _) = store_with(None);
        progress.save("show", "T1", 3);
        progress.save("show", "T1", 0);
        assert_eq!(progress.load("show", "T1"), 0);
    }

    #[test]
    fn corrupted_document_loads_as_zero_and_is_replaced_on_save() {
        let (progress, _) = store_with(Some("{not json"));
        assert_eq!(progress.load("show", "T1"), 0);

        progress.save("show", "T1", 2);
        assert_eq!(progress.load("show", "T1"), 2);
    }

    #[test]
    fn non_numeric_entry_loads_as_zero() {
        let (progress, _) = store_with(Some(r#"{"show":{"T1":"three","T2":-1}}"#));
        assert_eq!(progress.load("show", "T1"), 0);
        assert_eq!(progress.load("show", "T2"), 0);
    }

    #[test]
    fn stale_resume_point_is_clamped_to_last_episode() {
        let (progress, _) = store_with(None);
        progress.save("show", "T1", 7);
        assert_eq!(progress.resume_index("show", "T1", 5), 4);
        assert_eq!(progress.resume_index("show", "T1", 10), 7);
        assert_eq!(progress.resume_index("show", "T1", 0), 0);
    }

    #[test]
    fn write_failures_are_swallowed() {
        let memory = MemoryStore {
            fail_writes: true,
            ..MemoryStore::default()
        };
        let progress = ProgressStore::new(Box::new(memory));
        progress.save("show", "T1", 4);
        assert_eq!(progress.load("show", "T1"), 0);
    }

    #[test]
    fn persists_through_sqlite_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("progress.db");
        {
            let db = Database::open(&path).expect("open db");
            db.migrate().expect("migrate");
            ProgressStore::new(Box::new(db)).save("show", "T2", 6);
        }
        let db = Database::open(&path).expect("reopen db");
        db.migrate().expect("migrate");
        assert_eq!(ProgressStore::new(Box::new(db)).load("show", "T2"), 6);
    }
}
