use std::sync::mpsc;

use crossterm::event::KeyCode;
use ratatui::widgets::TableState;

use super::super::episode::{language_display, next_language, truncate};
use super::super::tracking::{
    Direction, ErrorKind, OpenRequest, PlaybackError, PlaybackSession, Report,
    SessionOrchestrator, SessionPhase,
};
use super::{PendingNotice, TuiState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Flow {
    Continue,
    Quit,
}

pub(super) fn status_info(msg: &str) -> String {
    format!("INFO: {msg}")
}

pub(super) fn status_error(msg: &str) -> String {
    format!("ERROR: {msg}")
}

/// Content problems become a popup; everything else lands in the status line.
pub(super) fn drain_reports(rx: &mpsc::Receiver<Report>, state: &mut TuiState) {
    while let Ok(report) = rx.try_recv() {
        if report.kind == ErrorKind::Content {
            state.pending_notice = Some(PendingNotice {
                title: "Content Unavailable",
                message: format!("{}\n\nPress any key to continue.", report.message),
            });
        }
        state.status = status_error(&report.message);
    }
}

pub(super) fn handle_key(
    orchestrator: &mut SessionOrchestrator,
    state: &mut TuiState,
    code: KeyCode,
) -> Flow {
    if code == KeyCode::Char('q') {
        close_session(state);
        return Flow::Quit;
    }

    let phase = state.session.as_ref().map(|session| session.phase().clone());
    match phase {
        None => handle_library_key(orchestrator, state, code),
        Some(SessionPhase::SeasonGrid) => handle_grid_key(state, code),
        Some(SessionPhase::Player(_)) => handle_player_key(orchestrator, state, code),
        Some(SessionPhase::NoEpisodes) => {
            if matches!(code, KeyCode::Esc | KeyCode::Enter) {
                close_session(state);
            }
        }
    }
    Flow::Continue
}

fn handle_library_key(orchestrator: &mut SessionOrchestrator, state: &mut TuiState, code: KeyCode) {
    let count = state.items.len();
    match code {
        KeyCode::Up => move_cursor(&mut state.library, count, -1),
        KeyCode::Down => move_cursor(&mut state.library, count, 1),
        KeyCode::Enter => open_selected(orchestrator, state, OpenRequest::Resume),
        KeyCode::Char('g') => open_selected(orchestrator, state, OpenRequest::SeasonGrid),
        KeyCode::Char('r') => {
            let Some(series) = state.selected_series().cloned() else {
                return;
            };
            let opened = orchestrator.open_random(&series.id, &mut rand::thread_rng());
            install_session(state, opened);
        }
        _ => {}
    }
}

fn handle_player_key(orchestrator: &mut SessionOrchestrator, state: &mut TuiState, code: KeyCode) {
    let Some(session) = state.session.as_mut() else {
        return;
    };
    let episode_count = session.current_episodes().len();
    match code {
        KeyCode::Esc => close_session(state),
        KeyCode::Left | KeyCode::Right => {
            let direction = if code == KeyCode::Left {
                Direction::Previous
            } else {
                Direction::Next
            };
            if session.navigate(direction) {
                sync_cursor(state);
                state.status = playing_status(state.session.as_ref());
            } else {
                state.status = status_info(match direction {
                    Direction::Previous => "Already at the first episode.",
                    Direction::Next => "Already at the last episode.",
                });
            }
        }
        KeyCode::Up => move_cursor(&mut state.cursor, episode_count, -1),
        KeyCode::Down => move_cursor(&mut state.cursor, episode_count, 1),
        KeyCode::Enter => {
            let (Some(index), Some(season)) = (
                state.cursor.selected(),
                session.state().map(|current| current.season.clone()),
            ) else {
                return;
            };
            if session.open(&season, index) {
                state.status = playing_status(state.session.as_ref());
            }
        }
        KeyCode::Char('l') => {
            let Some(view) = session.view() else {
                return;
            };
            match next_language(&view.language, &state.default_language, &view.languages) {
                Some(language) => {
                    session.change_language(&language);
                    state.status =
                        status_info(&format!("Language: {}", language_display(&language)));
                }
                None => state.status = status_info("No other language for this season."),
            }
        }
        KeyCode::Char('g') => {
            if session.show_season_grid() {
                reset_cursor(&mut state.cursor, session.season_cards().len(), 0);
                state.status = status_info("Choose a season.");
            } else {
                state.status = status_info("This series has a single season.");
            }
        }
        KeyCode::Char('r') => {
            let series_id = session.series().id.clone();
            let opened = orchestrator.open_random(&series_id, &mut rand::thread_rng());
            install_session(state, opened);
        }
        _ => {}
    }
}

fn handle_grid_key(state: &mut TuiState, code: KeyCode) {
    let Some(session) = state.session.as_mut() else {
        return;
    };
    let cards = session.season_cards();
    match code {
        KeyCode::Esc => close_session(state),
        KeyCode::Up => move_cursor(&mut state.cursor, cards.len(), -1),
        KeyCode::Down => move_cursor(&mut state.cursor, cards.len(), 1),
        KeyCode::Enter => {
            let Some(card) = state.cursor.selected().and_then(|index| cards.get(index)) else {
                return;
            };
            if session.select_season(&card.key, None) {
                sync_cursor(state);
                state.status = playing_status(state.session.as_ref());
            } else {
                state.status = status_info("That season has no episodes yet.");
            }
        }
        _ => {}
    }
}

fn open_selected(
    orchestrator: &mut SessionOrchestrator,
    state: &mut TuiState,
    request: OpenRequest,
) {
    let Some(series) = state.selected_series().cloned() else {
        state.status = status_error("No series selected.");
        return;
    };
    let opened = orchestrator.open(&series.id, request);
    install_session(state, opened);
}

/// Replaces the open session. The orchestrator already flushed the previous
/// one when it opened the new session.
fn install_session(state: &mut TuiState, opened: Result<PlaybackSession, PlaybackError>) {
    match opened {
        Ok(session) => {
            let grid = session.phase() == &SessionPhase::SeasonGrid;
            let card_count = session.season_cards().len();
            state.session = Some(session);
            if grid {
                reset_cursor(&mut state.cursor, card_count, 0);
                state.status = status_info("Choose a season.");
            } else {
                sync_cursor(state);
                state.status = playing_status(state.session.as_ref());
            }
        }
        Err(err) => state.status = status_error(&err.to_string()),
    }
}

fn close_session(state: &mut TuiState) {
    let Some(session) = state.session.take() else {
        return;
    };
    let title = session.series().title.clone();
    let flushed = session.close();
    state.cursor = TableState::default();
    state.status = if flushed {
        status_info(&format!("Closed {}. Marked as watched.", truncate(&title, 40)))
    } else {
        status_info(&format!("Closed {}.", truncate(&title, 40)))
    };
}

/// Points the episode cursor at the episode being played.
fn sync_cursor(state: &mut TuiState) {
    let Some(session) = state.session.as_ref() else {
        return;
    };
    let count = session.current_episodes().len();
    let index = session.state().map_or(0, |current| current.episode_index);
    reset_cursor(&mut state.cursor, count, index);
}

fn reset_cursor(cursor: &mut TableState, count: usize, index: usize) {
    *cursor = TableState::default();
    cursor.select((count > 0).then(|| index.min(count - 1)));
}

fn move_cursor(cursor: &mut TableState, count: usize, step: isize) {
    if count == 0 {
        cursor.select(None);
        return;
    }
    let current = cursor.selected().unwrap_or(0);
    let next = current.saturating_add_signed(step).min(count - 1);
    cursor.select(Some(next));
}

fn playing_status(session: Option<&PlaybackSession>) -> String {
    match session.and_then(PlaybackSession::view) {
        Some(view) => status_info(&format!(
            "Playing {} | {}",
            truncate(&view.series_title, 30),
            view.heading
        )),
        None => status_info("Nothing to play."),
    }
}
