mod catalog;
mod episode;
mod tracking;
mod tui;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::cli::{Cli, Command};
use crate::config::{Config, HistoryBackend};
use crate::db::Database;

use self::catalog::Catalog;
use self::episode::{format_viewed_at, language_display, truncate};
use self::tracking::{
    ErrorReporter, HistoryLog, LocalHistoryLog, LogReporter, OpenRequest, PlaybackSession,
    ProgressStore, RemoteHistoryLog, SeasonCard, SessionOrchestrator, SessionPhase,
    SessionSettings,
};

pub fn run(cli: Cli, config: Config) -> Result<()> {
    if cli.is_interactive() {
        return tui::run_tui(&config);
    }

    let mut orchestrator = build_orchestrator(&config, Arc::new(LogReporter))?;
    match cli.command {
        Some(Command::Play {
            series,
            season,
            episode,
            grid,
        }) => {
            let request = match (season, episode) {
                (Some(season), Some(index)) => OpenRequest::Episode { season, index },
                (Some(season), None) => OpenRequest::Season(season),
                (None, _) if grid => OpenRequest::SeasonGrid,
                (None, _) => OpenRequest::Resume,
            };
            let session = orchestrator.open(&series, request)?;
            print_session(&session);
            session.close();
        }
        Some(Command::Random { series }) => {
            let session = orchestrator.open_random(&series, &mut rand::thread_rng())?;
            print_session(&session);
            session.close();
        }
        Some(Command::Movie { id }) => {
            run_movie(&mut orchestrator, &id, &config.default_language)?
        }
        Some(Command::Progress { series }) => {
            print_season_cards(&orchestrator.season_cards(&series)?)
        }
        Some(Command::History) => run_history(&orchestrator)?,
        Some(Command::Forget { key }) => run_forget(&orchestrator, &key)?,
        Some(Command::Tui) | None => {}
    }

    Ok(())
}

fn build_orchestrator(
    config: &Config,
    reporter: Arc<dyn ErrorReporter>,
) -> Result<SessionOrchestrator> {
    let catalog = Catalog::load(&config.catalog_path)?;
    let progress = ProgressStore::new(Box::new(open_db(config)?));
    let history: Arc<dyn HistoryLog> = match &config.history {
        HistoryBackend::Local => Arc::new(LocalHistoryLog::new(open_db(config)?)),
        HistoryBackend::Remote {
            base_url,
            auth_token,
        } => {
            debug!(base_url = %base_url, "using remote history store");
            Arc::new(RemoteHistoryLog::new(base_url, auth_token.clone()))
        }
    };

    Ok(SessionOrchestrator::new(
        Arc::new(catalog),
        history,
        Arc::new(progress),
        reporter,
        SessionSettings {
            user_id: config.user_id.clone(),
            dwell: config.dwell,
            default_language: config.default_language.clone(),
        },
    ))
}

fn open_db(config: &Config) -> Result<Database> {
    let db = Database::open(&config.database_path)?;
    db.migrate().with_context(|| {
        format!(
            "failed to prepare database at {}",
            config.database_path.display()
        )
    })?;
    Ok(db)
}

fn print_session(session: &PlaybackSession) {
    let series = session.series();
    match session.phase() {
        SessionPhase::NoEpisodes => println!("{} has no episodes yet.", series.title),
        SessionPhase::SeasonGrid => {
            println!("{}: choose a season", series.title);
            print_season_cards(&session.season_cards());
        }
        SessionPhase::Player(_) => {
            let Some(view) = session.view() else {
                return;
            };
            println!("{}", view.series_title);
            println!("  {}", view.heading);
            println!(
                "  Episode {}/{}  prev: {}  next: {}",
                view.episode_index + 1,
                view.episode_count,
                yes_no(view.can_previous),
                yes_no(view.can_next)
            );
            if !view.languages.is_empty() {
                let languages = view
                    .languages
                    .iter()
                    .map(|language| language_display(language))
                    .collect::<Vec<_>>()
                    .join(", ");
                println!(
                    "  Language: {} (available: {languages})",
                    language_display(&view.language)
                );
            }
            match view.viewer_url() {
                Some(url) => println!("  Watch: {url}"),
                None => println!("  No playable video for this episode."),
            }
            if let Some(thumbnail) = &view.thumbnail {
                println!("  Thumbnail: {thumbnail}");
            }
        }
    }
}

fn print_season_cards(cards: &[SeasonCard]) {
    if cards.is_empty() {
        println!("No seasons yet.");
        return;
    }
    println!(
        "{:<20} {:<6} {:<10} {:<10}",
        "SEASON", "NO.", "EPISODES", "PROGRESS"
    );
    for card in cards {
        println!(
            "{:<20} {:<6} {:<10} {:<10}",
            truncate(&card.key, 20),
            card.number,
            card.episode_count,
            format!("{}%", card.progress_percent)
        );
    }
}

fn run_movie(orchestrator: &mut SessionOrchestrator, id: &str, language: &str) -> Result<()> {
    let mut playback = orchestrator.open_movie(id)?;
    if playback.change_language(language) {
        debug!(movie_id = %playback.movie_id, language, "movie language switched");
    }
    println!("{} [{}]", playback.title, playback.movie_id);
    println!("  Language: {}", language_display(&playback.language));
    if playback.can_switch_language() {
        println!("  Switch with --language en or --language es");
    }
    println!("  Watch: {}", playback.viewer_url());
    Ok(())
}

fn run_history(orchestrator: &SessionOrchestrator) -> Result<()> {
    if orchestrator.user_id().is_none() {
        println!("No viewing user set. Pass --user or set EPISODIC_USER.");
        return Ok(());
    }
    let entries = orchestrator.history()?;
    if entries.is_empty() {
        println!("No history yet. Run `episodic play <series>` first.");
        return Ok(());
    }

    println!(
        "{:<24} {:<36} {:<8} {:<28}",
        "KEY", "TITLE", "EP", "VIEWED AT"
    );
    for entry in entries {
        let episode = entry
            .record
            .last_episode
            .map_or_else(|| "-".to_string(), |index| (index + 1).to_string());
        println!(
            "{:<24} {:<36} {:<8} {:<28}",
            truncate(&entry.key, 24),
            truncate(&entry.record.title, 36),
            episode,
            format_viewed_at(entry.viewed_at)
        );
    }
    Ok(())
}

fn run_forget(orchestrator: &SessionOrchestrator, key: &str) -> Result<()> {
    if orchestrator.forget(key)? {
        println!("Removed {key} from history.");
    } else {
        println!("No history entry named {key}.");
    }
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
