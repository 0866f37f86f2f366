mod api;
mod committer;
mod history;
mod orchestrator;
mod playback;
mod progress;
mod report;
mod timer;


use chrono::{DateTime, Utc};
use thiserror::Error;

pub(crate) use api::RemoteHistoryLog;
pub(crate) use committer::HistoryCommitter;
pub(crate) use history::*;
pub(crate) use orchestrator::*;
pub(crate) use playback::*;
pub(crate) use progress::*;
pub(crate) use report::*;

/// Where an open series session currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PlaybackSessionState {
    pub(crate) series_id: String,
    pub(crate) season: String,
    pub(crate) episode_index: usize,
    pub(crate) language: String,
}

/// A scheduled but not yet written "watched" record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingHistoryEntry {
    pub(crate) series_id: String,
    pub(crate) season: String,
    pub(crate) episode_index: usize,
    pub(crate) title: String,
    pub(crate) poster: Option<String>,
    pub(crate) armed_at: DateTime<Utc>,
}

impl PendingHistoryEntry {
    pub(crate) fn history_key(&self) -> String {
        history_key(ContentKind::Series, &self.series_id, Some(&self.season))
    }

    pub(crate) fn to_record(&self) -> HistoryRecord {
        HistoryRecord {
            kind: ContentKind::Series,
            content_id: self.series_id.clone(),
            title: self.title.clone(),
            poster: self.poster.clone(),
            season: Some(self.season.clone()),
            last_episode: Some(self.episode_index),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Previous,
    Next,
}

impl Direction {
    pub(crate) fn step(self, index: usize) -> Option<usize> {
        match self {
            Self::Previous => index.checked_sub(1),
            Self::Next => index.checked_add(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum PlaybackError {
    #[error("series not found: {0}")]
    UnknownSeries(String),
    #[error("movie not found: {0}")]
    UnknownMovie(String),
    #[error("no episodes available for {0}")]
    NoEpisodes(String),
}
