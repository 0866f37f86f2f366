use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use super::super::catalog::{Episode, Series};
use super::super::episode::{
    episode_heading, history_title, season_number, season_progress_percent, viewer_url,
};
use super::committer::HistoryCommitter;
use super::progress::ProgressStore;
use super::{Direction, PendingHistoryEntry, PlaybackSessionState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SessionPhase {
    /// The series has nothing playable; every operation is a no-op.
    NoEpisodes,
    SeasonGrid,
    Player(PlaybackSessionState),
}

/// Everything a renderer needs for the episode on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EpisodeView {
    pub(crate) series_title: String,
    pub(crate) season: String,
    pub(crate) episode_index: usize,
    pub(crate) episode_count: usize,
    pub(crate) heading: String,
    pub(crate) description: String,
    pub(crate) thumbnail: Option<String>,
    pub(crate) language: String,
    /// Language controls to offer; empty when the season has only the
    /// language-neutral identifier.
    pub(crate) languages: Vec<String>,
    pub(crate) video_id: Option<String>,
    pub(crate) can_previous: bool,
    pub(crate) can_next: bool,
}

impl EpisodeView {
    pub(crate) fn viewer_url(&self) -> Option<String> {
        self.video_id.as_deref().map(viewer_url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SeasonCard {
    pub(crate) key: String,
    pub(crate) number: u64,
    pub(crate) episode_count: usize,
    pub(crate) poster: Option<String>,
    pub(crate) progress_percent: u8,
}

/// Season grid cards, in grid order.
pub(crate) fn season_cards(series: &Series, progress: &ProgressStore) -> Vec<SeasonCard> {
    series
        .ordered_seasons()
        .into_iter()
        .map(|season| {
            let episode_count = series.episodes(season).map_or(0, <[Episode]>::len);
            let resume = progress.resume_index(&series.id, season, episode_count);
            SeasonCard {
                key: season.to_string(),
                number: season_number(season),
                episode_count,
                poster: series.season_poster(season).map(str::to_string),
                progress_percent: season_progress_percent(resume, episode_count),
            }
        })
        .collect()
}

/// One open series playback surface.
///
/// The session owns its history committer; `close` flushes whatever is still
/// pending. Dropping a session without closing it leaves the dwell timer
/// running, so the last opened episode is still recorded once it elapses.
pub(crate) struct PlaybackSession {
    series: Arc<Series>,
    progress: Arc<ProgressStore>,
    committer: HistoryCommitter,
    default_language: String,
    phase: SessionPhase,
}

impl PlaybackSession {
    pub(crate) fn new(
        series: Arc<Series>,
        progress: Arc<ProgressStore>,
        committer: HistoryCommitter,
        default_language: &str,
    ) -> Self {
        Self {
            series,
            progress,
            committer,
            default_language: default_language.to_string(),
            phase: SessionPhase::NoEpisodes,
        }
    }

    pub(crate) fn series(&self) -> &Series {
        &self.series
    }

    pub(crate) fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub(crate) fn state(&self) -> Option<&PlaybackSessionState> {
        match &self.phase {
            SessionPhase::Player(state) => Some(state),
            _ => None,
        }
    }

    pub(crate) fn pending(&self) -> Option<PendingHistoryEntry> {
        self.committer.pending()
    }

    /// Episodes of the season being played.
    pub(crate) fn current_episodes(&self) -> &[Episode] {
        self.state()
            .and_then(|state| self.series.episodes(&state.season))
            .unwrap_or(&[])
    }

    /// Moves to `(season, episode_index)`. Returns false and changes nothing
    /// when the target does not exist.
    pub(crate) fn open(&mut self, season: &str, episode_index: usize) -> bool {
        let language = match &self.phase {
            SessionPhase::Player(state) if state.season == season => state.language.clone(),
            _ => self.default_language.clone(),
        };
        self.enter(season, episode_index, language)
    }

    /// Steps to the adjacent episode, committing the one being left.
    pub(crate) fn navigate(&mut self, direction: Direction) -> bool {
        let Some(state) = self.state() else {
            return false;
        };
        let season = state.season.clone();
        let current = state.episode_index;

        self.committer.flush_pending();

        let episode_count = self.series.episodes(&season).map_or(0, <[Episode]>::len);
        let Some(target) = direction.step(current).filter(|index| *index < episode_count) else {
            debug!(season = %season, episode = current, ?direction, "navigation out of range");
            return false;
        };
        self.open(&season, target)
    }

    /// Switches audio language for the current episode without touching
    /// pending history or resume points.
    pub(crate) fn change_language(&mut self, language: &str) -> bool {
        let language = language.trim();
        if language.is_empty() {
            return false;
        }
        let SessionPhase::Player(state) = &mut self.phase else {
            return false;
        };
        if state.language == language {
            return false;
        }
        debug!(from = %state.language, to = language, "language changed");
        state.language = language.to_string();
        true
    }

    /// Shows the season grid. Only series with more than one season and at
    /// least one episode have one.
    pub(crate) fn show_season_grid(&mut self) -> bool {
        if self.series.season_count() <= 1 || self.series.total_episodes() == 0 {
            return false;
        }
        self.phase = SessionPhase::SeasonGrid;
        true
    }

    /// Enters `season` at `start`, or at its resume point when no start is
    /// given. The language goes back to the default.
    pub(crate) fn select_season(&mut self, season: &str, start: Option<usize>) -> bool {
        let episode_count = self.series.episodes(season).map_or(0, <[Episode]>::len);
        if episode_count == 0 {
            return false;
        }
        let index = match start {
            Some(index) => index,
            None => self
                .progress
                .resume_index(&self.series.id, season, episode_count),
        };
        self.enter(season, index, self.default_language.clone())
    }

    pub(crate) fn season_cards(&self) -> Vec<SeasonCard> {
        season_cards(&self.series, &self.progress)
    }

    pub(crate) fn view(&self) -> Option<EpisodeView> {
        let state = self.state()?;
        let episodes = self.series.episodes(&state.season)?;
        let episode = episodes.get(state.episode_index)?;
        let languages = episodes
            .first()
            .map(|first| first.languages().into_iter().map(str::to_string).collect())
            .unwrap_or_default();

        Some(EpisodeView {
            series_title: self.series.title.clone(),
            season: state.season.clone(),
            episode_index: state.episode_index,
            episode_count: episodes.len(),
            heading: episode_heading(
                &state.season,
                episode.number,
                state.episode_index,
                &episode.title,
            ),
            description: episode.description.clone(),
            thumbnail: episode.thumbnail.clone(),
            language: state.language.clone(),
            languages,
            video_id: episode.video_for(&state.language).map(str::to_string),
            can_previous: state.episode_index > 0,
            can_next: state.episode_index + 1 < episodes.len(),
        })
    }

    /// Ends the session, committing any pending entry now.
    pub(crate) fn close(self) -> bool {
        debug!(series_id = %self.series.id, "session closed");
        self.committer.flush_pending()
    }

    fn enter(&mut self, season: &str, episode_index: usize, language: String) -> bool {
        if self.series.episode(season, episode_index).is_none() {
            debug!(season, episode = episode_index, "no such episode");
            return false;
        }

        self.committer.cancel_pending();
        self.committer.arm(PendingHistoryEntry {
            series_id: self.series.id.clone(),
            season: season.to_string(),
            episode_index,
            title: history_title(&self.series.title, season),
            poster: self.series.season_poster(season).map(str::to_string),
            armed_at: Utc::now(),
        });
        self.progress.save(&self.series.id, season, episode_index);

        self.phase = SessionPhase::Player(PlaybackSessionState {
            series_id: self.series.id.clone(),
            season: season.to_string(),
            episode_index,
            language,
        });
        true
    }
}
