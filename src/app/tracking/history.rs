use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::report::{ErrorKind, ErrorReporter};
use crate::db::{Database, HistoryRow};
use crate::http::HttpError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ContentKind {
    Series,
    Movie,
}

impl ContentKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Series => "series",
            Self::Movie => "movie",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "series" => Some(Self::Series),
            "movie" => Some(Self::Movie),
            _ => None,
        }
    }
}

/// One "watched" record. Series keep one record per season, so a later write
/// for the same season replaces the earlier one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HistoryRecord {
    #[serde(rename = "type")]
    pub(crate) kind: ContentKind,
    pub(crate) content_id: String,
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) poster: Option<String>,
    #[serde(default)]
    pub(crate) season: Option<String>,
    #[serde(default)]
    pub(crate) last_episode: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HistoryEntry {
    pub(crate) key: String,
    pub(crate) record: HistoryRecord,
    /// Epoch milliseconds, stamped by the store.
    pub(crate) viewed_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LastWatched {
    pub(crate) season: String,
    pub(crate) last_episode: usize,
}

pub(crate) fn history_key(kind: ContentKind, content_id: &str, season: Option<&str>) -> String {
    match (kind, season) {
        (ContentKind::Series, Some(season)) => format!("{content_id}_{season}"),
        _ => content_id.to_string(),
    }
}

/// Per-user watch history log.
pub(crate) trait HistoryLog: Send + Sync {
    fn read_last_watched(&self, user_id: &str, series_id: &str) -> Result<Option<LastWatched>>;
    fn write_history(&self, user_id: &str, key: &str, record: &HistoryRecord) -> Result<()>;
    fn list_history(&self, user_id: &str) -> Result<Vec<HistoryEntry>>;
    fn remove_history(&self, user_id: &str, key: &str) -> Result<bool>;
}

/// History log kept in the local SQLite database.
pub(crate) struct LocalHistoryLog {
    db: Mutex<Database>,
}

impl LocalHistoryLog {
    pub(crate) fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }
}

impl HistoryLog for LocalHistoryLog {
    fn read_last_watched(&self, user_id: &str, series_id: &str) -> Result<Option<LastWatched>> {
        let db = self.db.lock().unwrap_or_else(PoisonError::into_inner);
        let row = db.latest_history_for(user_id, ContentKind::Series.as_str(), series_id)?;
        Ok(row.and_then(|row| {
            Some(LastWatched {
                season: row.season?,
                last_episode: usize::try_from(row.last_episode?).ok()?,
            })
        }))
    }

    fn write_history(&self, user_id: &str, key: &str, record: &HistoryRecord) -> Result<()> {
        let row = HistoryRow {
            entry_key: key.to_string(),
            kind: record.kind.as_str().to_string(),
            content_id: record.content_id.clone(),
            title: record.title.clone(),
            poster: record.poster.clone(),
            season: record.season.clone(),
            last_episode: record
                .last_episode
                .map(i64::try_from)
                .transpose()
                .map_err(|_| anyhow!("episode index out of range for {key}"))?,
            viewed_at: 0,
        };
        let db = self.db.lock().unwrap_or_else(PoisonError::into_inner);
        db.upsert_history(user_id, &row)?;
        Ok(())
    }

    fn list_history(&self, user_id: &str) -> Result<Vec<HistoryEntry>> {
        let db = self.db.lock().unwrap_or_else(PoisonError::into_inner);
        let rows = db.list_history(user_id)?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let kind = ContentKind::parse(&row.kind)?;
                Some(HistoryEntry {
                    key: row.entry_key,
                    record: HistoryRecord {
                        kind,
                        content_id: row.content_id,
                        title: row.title,
                        poster: row.poster,
                        season: row.season,
                        last_episode: row.last_episode.and_then(|ep| usize::try_from(ep).ok()),
                    },
                    viewed_at: row.viewed_at,
                })
            })
            .collect())
    }

    fn remove_history(&self, user_id: &str, key: &str) -> Result<bool> {
        let db = self.db.lock().unwrap_or_else(PoisonError::into_inner);
        db.delete_history(user_id, key)
    }
}

/// Reporter category for a history store failure, judged by its root cause.
pub(crate) fn failure_kind(err: &anyhow::Error) -> ErrorKind {
    for cause in err.chain() {
        if let Some(http) = cause.downcast_ref::<HttpError>() {
            return if http.is_auth() {
                ErrorKind::Auth
            } else {
                ErrorKind::Network
            };
        }
        if cause.downcast_ref::<rusqlite::Error>().is_some() {
            return ErrorKind::Database;
        }
    }
    ErrorKind::Unknown
}

/// Writes history for the viewing user, if any. Failures go to the error
/// reporter and never reach the caller.
#[derive(Clone)]
pub(crate) struct HistoryWriter {
    history: Arc<dyn HistoryLog>,
    reporter: Arc<dyn ErrorReporter>,
    user_id: Option<String>,
}

impl HistoryWriter {
    pub(crate) fn new(
        history: Arc<dyn HistoryLog>,
        reporter: Arc<dyn ErrorReporter>,
        user_id: Option<String>,
    ) -> Self {
        Self {
            history,
            reporter,
            user_id,
        }
    }

    pub(crate) fn write(&self, key: &str, record: &HistoryRecord) -> bool {
        let Some(user_id) = self.user_id.as_deref() else {
            debug!(key, "no viewing user, history write skipped");
            return false;
        };
        match self.history.write_history(user_id, key, record) {
            Ok(()) => {
                info!(key, episode = ?record.last_episode, "history recorded");
                true
            }
            Err(err) => {
                self.reporter.report(
                    failure_kind(&err),
                    &format!("failed to record history for {key}: {err:#}"),
                );
                false
            }
        }
    }
}
