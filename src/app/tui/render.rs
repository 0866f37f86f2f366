use std::time::Duration;

use chrono::Utc;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, BorderType, Borders, Cell, Clear, Gauge, Padding, Paragraph, Row, Table, TableState,
    Wrap,
};

use super::super::episode::{language_display, season_label, truncate};
use super::super::tracking::{PlaybackSession, SeasonCard, SessionPhase};
use super::TuiState;

pub(super) fn draw_tui(frame: &mut Frame, state: &mut TuiState) {
    let bg = Block::default().style(Style::default().bg(Color::Black));
    frame.render_widget(bg, frame.area());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    frame.render_widget(header(state), chunks[0]);

    let body_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(chunks[1]);
    let details_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(8), Constraint::Length(3)])
        .split(body_chunks[1]);

    let phase = state.session.as_ref().map(|session| session.phase().clone());
    let mode = match phase {
        Some(SessionPhase::Player(_)) => {
            if let Some(session) = state.session.as_ref() {
                draw_episode_list(frame, body_chunks[0], session, &mut state.cursor);
                draw_now_playing(frame, &details_chunks, session, state.dwell);
            }
            Mode::Player
        }
        Some(SessionPhase::SeasonGrid) => {
            let cards = state
                .session
                .as_ref()
                .map(PlaybackSession::season_cards)
                .unwrap_or_default();
            draw_season_grid(frame, body_chunks[0], &cards, &mut state.cursor);
            draw_season_details(frame, &details_chunks, &cards, &state.cursor);
            Mode::Grid
        }
        Some(SessionPhase::NoEpisodes) => {
            let title = state
                .session
                .as_ref()
                .map(|session| truncate(&session.series().title, 40))
                .unwrap_or_default();
            let empty = Paragraph::new(format!(
                "{title}\n\nNo episodes available yet.\n\nPress Esc to go back."
            ))
            .alignment(Alignment::Center)
            .block(panel_block("Episodes"));
            frame.render_widget(empty, chunks[1]);
            Mode::Empty
        }
        None => {
            draw_library(frame, body_chunks[0], state);
            draw_series_details(frame, details_chunks[0], state);
            Mode::Library
        }
    };

    let command_bar = Paragraph::new(controls_line(mode))
        .alignment(Alignment::Center)
        .block(panel_block("Controls"));
    frame.render_widget(command_bar, chunks[2]);

    let status_widget = Paragraph::new(state.status.clone())
        .style(status_style(&state.status))
        .block(panel_block("Status"));
    frame.render_widget(status_widget, chunks[3]);

    if let Some(notice) = &state.pending_notice {
        let popup_area = popup_rect_for_text(frame.area(), &notice.message);
        render_popup_shadow(frame, popup_area);
        frame.render_widget(Clear, popup_area);
        let popup = Paragraph::new(notice.message.clone())
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(modal_block(notice.title));
        frame.render_widget(popup, popup_area);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Library,
    Player,
    Grid,
    Empty,
}

fn header(state: &TuiState) -> Paragraph<'static> {
    let viewer = state
        .user_id
        .as_deref()
        .map_or_else(|| "signed out".to_string(), |user| format!("viewer {user}"));
    let open = state
        .session
        .as_ref()
        .map_or_else(|| "no session".to_string(), |session| truncate(&session.series().title, 30));
    Paragraph::new(Line::from(vec![
        Span::styled(
            "EPISODIC",
            Style::default()
                .fg(Color::Rgb(110, 170, 255))
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled("   ", Style::default()),
        Span::styled(
            format!("{} series", state.items.len()),
            Style::default().fg(Color::Rgb(185, 195, 210)),
        ),
        Span::styled("   ", Style::default()),
        Span::styled(viewer, Style::default().fg(Color::Rgb(185, 195, 210))),
        Span::styled("   ", Style::default()),
        Span::styled(open, Style::default().fg(Color::Yellow)),
    ]))
    .alignment(Alignment::Center)
    .block(panel_block("Dashboard"))
}

fn draw_library(frame: &mut Frame, area: Rect, state: &mut TuiState) {
    let rows: Vec<Row> = state
        .items
        .iter()
        .map(|series| {
            Row::new(vec![
                Cell::from(truncate(&series.title, 48)),
                Cell::from(series.season_count().to_string()),
                Cell::from(series.total_episodes().to_string()),
            ])
        })
        .collect();
    let table = Table::new(
        rows,
        [
            Constraint::Percentage(60),
            Constraint::Length(10),
            Constraint::Length(10),
        ],
    )
    .header(header_row(["Title", "Seasons", "Episodes"]))
    .block(panel_block("Library"))
    .row_highlight_style(highlight_style())
    .highlight_symbol("▸ ");
    frame.render_stateful_widget(table, area, &mut state.library);
}

fn draw_series_details(frame: &mut Frame, area: Rect, state: &TuiState) {
    let text = match state.selected_series() {
        Some(series) => {
            let seasons = series
                .ordered_seasons()
                .into_iter()
                .map(|season| {
                    let count = series.episodes(season).map_or(0, |episodes| episodes.len());
                    format!("T{}  {count} eps", season_label(season))
                })
                .collect::<Vec<_>>()
                .join("\n");
            format!(
                "Title\n{}\n\nId\n{}\n\nSeasons\n{}",
                truncate(&series.title, 40),
                truncate(&series.id, 28),
                if seasons.is_empty() { "-".to_string() } else { seasons }
            )
        }
        None => "No series in the catalog yet.".to_string(),
    };
    let details = Paragraph::new(text)
        .style(Style::default().fg(Color::Rgb(230, 230, 230)))
        .block(panel_block("Selected"));
    frame.render_widget(details, area);
}

fn draw_episode_list(
    frame: &mut Frame,
    area: Rect,
    session: &PlaybackSession,
    cursor: &mut TableState,
) {
    let playing = session.state().map(|state| state.episode_index);
    let rows: Vec<Row> = session
        .current_episodes()
        .iter()
        .enumerate()
        .map(|(index, episode)| {
            let marker = if playing == Some(index) { "▶" } else { "" };
            let number = episode.number.map_or(index as u64 + 1, u64::from);
            Row::new(vec![
                Cell::from(marker),
                Cell::from(number.to_string()),
                Cell::from(truncate(&episode.title, 48)),
            ])
        })
        .collect();
    let title = session.state().map_or_else(
        || "Episodes".to_string(),
        |state| format!("Season {}", season_label(&state.season)),
    );
    let table = Table::new(
        rows,
        [
            Constraint::Length(2),
            Constraint::Length(5),
            Constraint::Percentage(80),
        ],
    )
    .header(header_row(["", "Ep", "Title"]))
    .block(owned_panel_block(title))
    .row_highlight_style(highlight_style())
    .highlight_symbol("▸ ");
    frame.render_stateful_widget(table, area, cursor);
}

fn draw_now_playing(frame: &mut Frame, areas: &[Rect], session: &PlaybackSession, dwell: Duration) {
    let Some(view) = session.view() else {
        return;
    };
    let languages = if view.languages.is_empty() {
        "-".to_string()
    } else {
        view.languages
            .iter()
            .map(|language| language_display(language))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let pending = match session.pending() {
        Some(entry) => {
            let elapsed = (Utc::now() - entry.armed_at).to_std().unwrap_or_default();
            let remaining = dwell.saturating_sub(elapsed).as_secs();
            format!("marked as watched in {remaining}s")
        }
        None => "recorded".to_string(),
    };
    let text = format!(
        "{}\n{}\n\nLanguage\n{} (also: {languages})\n\nWatch\n{}\n\nHistory\n{pending}\n\n{}",
        truncate(&view.series_title, 40),
        truncate(&view.heading, 40),
        language_display(&view.language),
        view.viewer_url()
            .unwrap_or_else(|| "No playable video for this episode.".to_string()),
        truncate(&view.description, 120),
    );
    let details = Paragraph::new(text)
        .style(Style::default().fg(Color::Rgb(230, 230, 230)))
        .wrap(Wrap { trim: true })
        .block(panel_block("Now Playing"));
    frame.render_widget(details, areas[0]);

    let position = (view.episode_index + 1) as f64 / view.episode_count.max(1) as f64;
    let label = format!(
        "{}{} of {}{}",
        if view.can_previous { "◂ " } else { "  " },
        view.episode_index + 1,
        view.episode_count,
        if view.can_next { " ▸" } else { "  " },
    );
    frame.render_widget(progress_gauge(label, position), areas[1]);
}

fn draw_season_grid(frame: &mut Frame, area: Rect, cards: &[SeasonCard], cursor: &mut TableState) {
    let rows: Vec<Row> = cards
        .iter()
        .map(|card| {
            Row::new(vec![
                Cell::from(format!("T{}", season_label(&card.key))),
                Cell::from(card.episode_count.to_string()),
                Cell::from(format!("{}%", card.progress_percent)),
            ])
        })
        .collect();
    let table = Table::new(
        rows,
        [
            Constraint::Percentage(50),
            Constraint::Length(10),
            Constraint::Length(10),
        ],
    )
    .header(header_row(["Season", "Episodes", "Seen"]))
    .block(panel_block("Seasons"))
    .row_highlight_style(highlight_style())
    .highlight_symbol("▸ ");
    frame.render_stateful_widget(table, area, cursor);
}

fn draw_season_details(
    frame: &mut Frame,
    areas: &[Rect],
    cards: &[SeasonCard],
    cursor: &TableState,
) {
    let Some(card) = cursor.selected().and_then(|index| cards.get(index)) else {
        return;
    };
    let text = format!(
        "Season\n{}\n\nEpisodes\n{}\n\nPoster\n{}",
        season_label(&card.key),
        card.episode_count,
        card.poster.as_deref().map_or_else(|| "-".to_string(), |poster| truncate(poster, 40)),
    );
    let details = Paragraph::new(text)
        .style(Style::default().fg(Color::Rgb(230, 230, 230)))
        .block(panel_block("Selected"));
    frame.render_widget(details, areas[0]);
    frame.render_widget(
        progress_gauge(
            format!("{}% seen", card.progress_percent),
            f64::from(card.progress_percent) / 100.0,
        ),
        areas[1],
    );
}

fn progress_gauge(label: String, ratio: f64) -> Gauge<'static> {
    Gauge::default()
        .block(panel_block("Progress"))
        .gauge_style(
            Style::default()
                .fg(Color::Rgb(130, 190, 255))
                .bg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .label(label)
        .ratio(ratio.clamp(0.0, 1.0))
}

fn header_row(labels: [&'static str; 3]) -> Row<'static> {
    Row::new(labels.to_vec()).style(
        Style::default()
            .fg(Color::Rgb(110, 170, 255))
            .add_modifier(Modifier::BOLD),
    )
}

fn highlight_style() -> Style {
    Style::default()
        .bg(Color::Rgb(110, 170, 255))
        .fg(Color::Black)
        .add_modifier(Modifier::BOLD)
}

fn panel_block(title: &'static str) -> Block<'static> {
    owned_panel_block(title.to_string())
}

fn owned_panel_block(title: String) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(125, 135, 150)))
        .title(title)
}

fn modal_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(
            Style::default()
                .fg(Color::Rgb(160, 190, 235))
                .add_modifier(Modifier::BOLD),
        )
        .title(title)
        .padding(Padding::new(2, 2, 1, 1))
}

fn key_hint(keys: &'static str) -> Span<'static> {
    Span::styled(
        format!(" {keys} "),
        Style::default()
            .bg(Color::Rgb(72, 82, 96))
            .fg(Color::Rgb(230, 235, 242)),
    )
}

fn controls_line(mode: Mode) -> Line<'static> {
    let (label, hints) = match mode {
        Mode::Library => (
            "LIBRARY",
            "↑/↓ move  Enter resume  g seasons  r random  q quit",
        ),
        Mode::Player => (
            "PLAYER",
            "←/→ prev/next  ↑/↓+Enter jump  l language  g seasons  r random  Esc close",
        ),
        Mode::Grid => ("SEASONS", "↑/↓ move  Enter open season  Esc close  q quit"),
        Mode::Empty => ("EMPTY", "Esc back  q quit"),
    };
    Line::from(vec![
        key_hint(label),
        Span::styled(
            format!("   {hints}"),
            Style::default().fg(Color::Rgb(185, 195, 210)),
        ),
    ])
}

fn status_style(status: &str) -> Style {
    if status.starts_with("ERROR:") {
        Style::default()
            .fg(Color::Rgb(255, 145, 120))
            .add_modifier(Modifier::BOLD)
    } else if status.starts_with("INFO:") {
        Style::default().fg(Color::Rgb(205, 165, 255))
    } else {
        Style::default().fg(Color::Rgb(230, 235, 242))
    }
}

fn centered_fixed_rect(width: u16, height: u16, area: Rect) -> Rect {
    let clamped_width = width.min(area.width.max(1));
    let clamped_height = height.min(area.height.max(1));
    let x = area.x + area.width.saturating_sub(clamped_width) / 2;
    let y = area.y + area.height.saturating_sub(clamped_height) / 2;
    Rect::new(x, y, clamped_width, clamped_height)
}

fn render_popup_shadow(frame: &mut Frame, popup_area: Rect) {
    let area = frame.area();
    let shadow = Rect::new(
        (popup_area.x + 1).min(area.x + area.width.saturating_sub(1)),
        (popup_area.y + 1).min(area.y + area.height.saturating_sub(1)),
        popup_area.width.saturating_sub(1),
        popup_area.height.saturating_sub(1),
    );
    if shadow.width == 0 || shadow.height == 0 {
        return;
    }
    let shadow_block = Block::default().style(Style::default().bg(Color::Rgb(14, 16, 24)));
    frame.render_widget(shadow_block, shadow);
}

fn popup_rect_for_text(area: Rect, text: &str) -> Rect {
    let max_line_width = text
        .lines()
        .map(|line| line.chars().count() as u16)
        .max()
        .unwrap_or(0);
    let line_count = text.lines().count() as u16;

    let available_width = area.width.saturating_sub(2).max(1);
    let min_width = 44.min(available_width);
    let max_width = 72.min(available_width);
    let width = max_line_width.saturating_add(12).clamp(min_width, max_width);

    let available_height = area.height.saturating_sub(2).max(1);
    let min_height = 8.min(available_height);
    let max_height = 16.min(available_height);
    let height = line_count.saturating_add(6).clamp(min_height, max_height);

    centered_fixed_rect(width, height, area)
}
