use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use tracing::{debug, info, warn};

use super::super::catalog::{CatalogProvider, DEFAULT_VIDEO_KEY, Episode, Movie, Series};
use super::super::episode::{first_season, viewer_url};
use super::committer::HistoryCommitter;
use super::history::{
    ContentKind, HistoryEntry, HistoryLog, HistoryRecord, HistoryWriter, LastWatched, history_key,
};
use super::playback::{PlaybackSession, SeasonCard, SessionPhase, season_cards};
use super::progress::ProgressStore;
use super::report::{ErrorKind, ErrorReporter};
use super::PlaybackError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SessionSettings {
    pub(crate) user_id: Option<String>,
    pub(crate) dwell: Duration,
    pub(crate) default_language: String,
}

/// Where a newly opened series session should start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OpenRequest {
    /// Last watched episode, else the first season.
    Resume,
    /// Season grid when the series has more than one season.
    SeasonGrid,
    /// A season, at its resume point.
    Season(String),
    Episode { season: String, index: usize },
}

const MOVIE_LANGUAGES: [&str; 2] = ["en", "es"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MoviePlayback {
    pub(crate) movie_id: String,
    pub(crate) title: String,
    pub(crate) language: String,
    pub(crate) video_id: String,
    /// `en`/`es` identifiers; switching is offered only when both exist.
    videos: BTreeMap<String, String>,
}

impl MoviePlayback {
    fn resolve(movie: &Movie) -> Self {
        let videos = MOVIE_LANGUAGES
            .iter()
            .filter_map(|language| {
                let id = movie.videos.get(*language)?;
                Some((language.to_string(), id.clone()))
            })
            .collect::<BTreeMap<_, _>>();
        let (language, video_id) = MOVIE_LANGUAGES
            .iter()
            .find_map(|language| Some((language.to_string(), videos.get(*language)?.clone())))
            .unwrap_or_else(|| (DEFAULT_VIDEO_KEY.to_string(), movie.id.clone()));
        Self {
            movie_id: movie.id.clone(),
            title: movie.title.clone(),
            language,
            video_id,
            videos,
        }
    }

    pub(crate) fn can_switch_language(&self) -> bool {
        self.videos.len() == MOVIE_LANGUAGES.len()
    }

    pub(crate) fn change_language(&mut self, language: &str) -> bool {
        if !self.can_switch_language() || self.language == language {
            return false;
        }
        let Some(id) = self.videos.get(language) else {
            return false;
        };
        self.video_id = id.clone();
        self.language = language.to_string();
        true
    }

    pub(crate) fn viewer_url(&self) -> String {
        viewer_url(&self.video_id)
    }
}

/// Opens playback sessions and keeps at most one of them pending a history
/// commit at a time.
pub(crate) struct SessionOrchestrator {
    catalog: Arc<dyn CatalogProvider>,
    history: Arc<dyn HistoryLog>,
    progress: Arc<ProgressStore>,
    reporter: Arc<dyn ErrorReporter>,
    settings: SessionSettings,
    active: Option<HistoryCommitter>,
}

impl SessionOrchestrator {
    pub(crate) fn new(
        catalog: Arc<dyn CatalogProvider>,
        history: Arc<dyn HistoryLog>,
        progress: Arc<ProgressStore>,
        reporter: Arc<dyn ErrorReporter>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            catalog,
            history,
            progress,
            reporter,
            settings,
            active: None,
        }
    }

    pub(crate) fn catalog(&self) -> &dyn CatalogProvider {
        self.catalog.as_ref()
    }

    pub(crate) fn user_id(&self) -> Option<&str> {
        self.settings.user_id.as_deref()
    }

    pub(crate) fn open(
        &mut self,
        series_id: &str,
        request: OpenRequest,
    ) -> Result<PlaybackSession, PlaybackError> {
        self.close_active();
        let series = self.find_series(series_id)?;

        let committer = HistoryCommitter::new(self.writer(), self.settings.dwell);
        self.active = Some(committer.clone());
        let mut session = PlaybackSession::new(
            Arc::clone(&series),
            Arc::clone(&self.progress),
            committer,
            &self.settings.default_language,
        );

        let opened = match &request {
            OpenRequest::Resume => false,
            OpenRequest::SeasonGrid => session.show_season_grid(),
            OpenRequest::Season(season) => session.select_season(season, None),
            OpenRequest::Episode { season, index } => session.select_season(season, Some(*index)),
        };
        if !opened {
            if request != OpenRequest::Resume {
                debug!(series_id, ?request, "requested start unavailable, resuming instead");
            }
            self.resume(&series, &mut session);
        }

        match session.state() {
            Some(state) => info!(
                series_id = %state.series_id,
                season = %state.season,
                episode = state.episode_index,
                "session opened"
            ),
            None if session.phase() == &SessionPhase::SeasonGrid => {
                info!(series_id, "session opened at season grid")
            }
            None => self.reporter.report(
                ErrorKind::Content,
                &format!("{} has no episodes available yet.", series.title),
            ),
        }
        Ok(session)
    }

    /// Opens a uniformly random episode across every season.
    pub(crate) fn open_random<R: Rng + ?Sized>(
        &mut self,
        series_id: &str,
        rng: &mut R,
    ) -> Result<PlaybackSession, PlaybackError> {
        let series = self.find_series(series_id)?;
        let episodes = series
            .ordered_seasons()
            .into_iter()
            .flat_map(|season| {
                let count = series.episodes(season).map_or(0, <[Episode]>::len);
                (0..count).map(move |index| (season, index))
            })
            .collect::<Vec<_>>();
        if episodes.is_empty() {
            self.reporter.report(
                ErrorKind::Content,
                &format!("{} has no episodes to pick from.", series.title),
            );
            return Err(PlaybackError::NoEpisodes(series.title.clone()));
        }

        let (season, index) = episodes[rng.gen_range(0..episodes.len())];
        debug!(series_id, season, index, "random episode picked");
        let request = OpenRequest::Episode {
            season: season.to_string(),
            index,
        };
        self.open(series_id, request)
    }

    /// Starts a movie and records it in history right away.
    pub(crate) fn open_movie(&mut self, movie_id: &str) -> Result<MoviePlayback, PlaybackError> {
        self.close_active();
        let Some(movie) = self.catalog.get_movie(movie_id) else {
            self.reporter
                .report(ErrorKind::Content, "The movie could not be loaded.");
            return Err(PlaybackError::UnknownMovie(movie_id.to_string()));
        };

        let record = HistoryRecord {
            kind: ContentKind::Movie,
            content_id: movie.id.clone(),
            title: movie.title.clone(),
            poster: movie.poster.clone(),
            season: None,
            last_episode: None,
        };
        self.writer()
            .write(&history_key(ContentKind::Movie, &movie.id, None), &record);

        let playback = MoviePlayback::resolve(&movie);
        info!(movie_id, language = %playback.language, "movie opened");
        Ok(playback)
    }

    /// Flushes the pending entry of the most recently opened session.
    pub(crate) fn close_active(&mut self) -> bool {
        self.active
            .take()
            .is_some_and(|committer| committer.flush_pending())
    }

    pub(crate) fn season_cards(&self, series_id: &str) -> Result<Vec<SeasonCard>, PlaybackError> {
        let series = self
            .catalog
            .get_series(series_id)
            .ok_or_else(|| PlaybackError::UnknownSeries(series_id.to_string()))?;
        Ok(season_cards(&series, &self.progress))
    }

    /// The viewing user's history, newest first. Empty when nobody is signed in.
    pub(crate) fn history(&self) -> Result<Vec<HistoryEntry>> {
        match self.user_id() {
            Some(user_id) => self.history.list_history(user_id),
            None => Ok(Vec::new()),
        }
    }

    pub(crate) fn forget(&self, key: &str) -> Result<bool> {
        match self.user_id() {
            Some(user_id) => self.history.remove_history(user_id, key),
            None => Ok(false),
        }
    }

    fn find_series(&self, series_id: &str) -> Result<Arc<Series>, PlaybackError> {
        self.catalog.get_series(series_id).ok_or_else(|| {
            self.reporter
                .report(ErrorKind::Content, "The series could not be loaded.");
            PlaybackError::UnknownSeries(series_id.to_string())
        })
    }

    fn writer(&self) -> HistoryWriter {
        HistoryWriter::new(
            Arc::clone(&self.history),
            Arc::clone(&self.reporter),
            self.settings.user_id.clone(),
        )
    }

    fn last_watched(&self, series_id: &str) -> Option<LastWatched> {
        let user_id = self.user_id()?;
        match self.history.read_last_watched(user_id, series_id) {
            Ok(last) => last,
            Err(err) => {
                warn!(series_id, "history lookup failed, starting fresh: {err:#}");
                None
            }
        }
    }

    fn resume(&self, series: &Series, session: &mut PlaybackSession) {
        if let Some(last) = self.last_watched(&series.id) {
            let episode_count = series.episodes(&last.season).map_or(0, <[Episode]>::len);
            if episode_count > 0
                && session.open(&last.season, last.last_episode.min(episode_count - 1))
            {
                return;
            }
            debug!(series_id = %series.id, season = %last.season, "last watched season is gone");
        }

        let playable = series
            .seasons
            .iter()
            .filter(|(_, episodes)| !episodes.is_empty())
            .map(|(season, _)| season.as_str());
        if let Some(season) = first_season(playable) {
            session.open(season, 0);
        }
    }
}
