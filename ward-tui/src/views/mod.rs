//! View rendering dispatch.

pub mod helpers;
pub mod patient_detail;
pub mod patient_list;

pub use helpers::{placeholder, render_placeholder, two_column};

use crate::nav::{InputMode, Screen};
use crate::state::App;
use crate::theme::notification_color;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

pub fn render_view(f: &mut Frame<'_>, app: &App) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.size());

    render_header(f, app, layout[0]);

    match app.screen {
        Screen::PatientList => patient_list::render(f, app, layout[1]),
        Screen::PatientDetail { .. } => patient_detail::render(f, app, layout[1]),
    }

    render_footer(f, app, layout[2]);
}

fn render_header(f: &mut Frame<'_>, app: &App, area: Rect) {
    let stats = app.cache_stats();
    let title = format!("WARD | {}", app.screen.title());
    let line = Line::from(vec![
        Span::styled(
            app.config.api_base_url.clone(),
            Style::default().fg(app.theme.text_dim),
        ),
        Span::raw("  "),
        Span::styled(
            format!(
                "cache: {} entries, {:.0}% hits",
                stats.entry_count,
                stats.hit_rate() * 100.0
            ),
            Style::default().fg(app.theme.secondary),
        ),
    ]);
    let header = Paragraph::new(line).block(
        Block::default().borders(Borders::ALL).title(Span::styled(
            title,
            Style::default()
                .fg(app.theme.primary)
                .add_modifier(Modifier::BOLD),
        )),
    );
    f.render_widget(header, area);
}

fn render_footer(f: &mut Frame<'_>, app: &App, area: Rect) {
    let (text, style) = match app.notifications.last() {
        Some(note) => (
            note.display(),
            Style::default().fg(notification_color(note.level, &app.theme)),
        ),
        None => (
            help_text(app).to_string(),
            Style::default().fg(app.theme.text_dim),
        ),
    };
    let footer = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL))
        .style(style);
    f.render_widget(footer, area);
}

pub fn help_text(app: &App) -> &'static str {
    match (&app.screen, app.input_mode) {
        (Screen::PatientList, InputMode::Editing) => {
            "type to filter • Enter search • Backspace delete • Esc clear"
        }
        (Screen::PatientList, InputMode::Normal) => {
            "/ search • j/k move • Enter open • Esc clear • r retry • q quit"
        }
        (Screen::PatientDetail { .. }, _) => {
            "Tab/Shift-Tab or 1-3 switch tab • r retry • Esc back • q quit"
        }
    }
}
