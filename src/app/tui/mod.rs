mod actions;
mod render;
mod session;

use std::io;
use std::sync::{Arc, mpsc};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::TableState;
use tracing::info;

use crate::config::Config;

use super::build_orchestrator;
use super::catalog::Series;
use super::tracking::{ChannelReporter, PlaybackSession, Report, SessionOrchestrator};

use self::actions::{Flow, drain_reports, handle_key, status_info};
use self::render::draw_tui;
use self::session::TerminalGuard;

#[derive(Debug, Clone)]
pub(super) struct PendingNotice {
    pub(super) title: &'static str,
    pub(super) message: String,
}

/// Everything the loop mutates between frames.
pub(super) struct TuiState {
    pub(super) items: Vec<Arc<Series>>,
    pub(super) library: TableState,
    pub(super) session: Option<PlaybackSession>,
    /// Cursor over the episode list or the season grid of the open session.
    pub(super) cursor: TableState,
    pub(super) status: String,
    pub(super) pending_notice: Option<PendingNotice>,
    pub(super) default_language: String,
    pub(super) dwell: Duration,
    pub(super) user_id: Option<String>,
}

impl TuiState {
    fn new(orchestrator: &SessionOrchestrator, config: &Config) -> Self {
        let items = orchestrator.catalog().all_series();
        let mut library = TableState::default();
        library.select((!items.is_empty()).then_some(0));
        let status = if items.is_empty() {
            status_info(&format!(
                "Catalog is empty. Add series to {}.",
                config.catalog_path.display()
            ))
        } else {
            status_info("Ready.")
        };
        Self {
            items,
            library,
            session: None,
            cursor: TableState::default(),
            status,
            pending_notice: None,
            default_language: config.default_language.clone(),
            dwell: config.dwell,
            user_id: config.user_id.clone(),
        }
    }

    pub(super) fn selected_series(&self) -> Option<&Arc<Series>> {
        self.library
            .selected()
            .and_then(|index| self.items.get(index))
    }
}

pub(crate) fn run_tui(config: &Config) -> Result<()> {
    let (report_tx, report_rx) = mpsc::channel::<Report>();
    let mut orchestrator = build_orchestrator(config, Arc::new(ChannelReporter::new(report_tx)))?;
    let mut state = TuiState::new(&orchestrator, config);
    info!(series = state.items.len(), "tui started");

    let mut guard = TerminalGuard::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))
        .context("failed to initialize terminal backend")?;
    terminal.clear()?;

    loop {
        drain_reports(&report_rx, &mut state);
        terminal.draw(|frame| draw_tui(frame, &mut state))?;

        if !event::poll(Duration::from_millis(200))? {
            continue;
        }

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if state.pending_notice.is_some() {
            state.pending_notice = None;
            continue;
        }

        if handle_key(&mut orchestrator, &mut state, key.code) == Flow::Quit {
            break;
        }
    }

    if let Some(open) = state.session.take() {
        open.close();
    }
    terminal.show_cursor()?;
    guard.leave()?;
    info!("tui stopped");
    Ok(())
}
