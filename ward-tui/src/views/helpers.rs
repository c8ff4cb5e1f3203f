//! Common view rendering helpers.

use crate::theme::WardTheme;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::Style,
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};
use ward_cache::ViewState;

/// Text and style standing in for records that cannot be shown.
///
/// Returns `None` for `Ready`.
pub fn placeholder<R>(
    state: &ViewState<R>,
    theme: &WardTheme,
    empty_text: &str,
    noun: &str,
) -> Option<(String, Style)> {
    match state {
        ViewState::Loading => Some(("Loading...".to_string(), Style::default().fg(theme.warning))),
        ViewState::Error { message } => Some((
            format!("{} (press r to retry)", message),
            Style::default().fg(theme.error),
        )),
        ViewState::EmptyInitial => {
            Some((empty_text.to_string(), Style::default().fg(theme.text_dim)))
        }
        ViewState::NoMatch { filter_text } => Some((
            format!("No {} match '{}' (Esc to clear)", noun, filter_text),
            Style::default().fg(theme.text_dim),
        )),
        ViewState::Ready { .. } => None,
    }
}

pub fn render_placeholder(f: &mut Frame<'_>, area: Rect, title: &str, text: String, style: Style) {
    let paragraph = Paragraph::new(text)
        .style(style)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(Block::default().title(title).borders(Borders::ALL));
    f.render_widget(paragraph, area);
}

/// Split `area` into two columns, the left one `left_percent` wide.
pub fn two_column(area: Rect, left_percent: u16) -> (Rect, Rect) {
    let left_percent = left_percent.min(100);
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(left_percent),
            Constraint::Percentage(100 - left_percent),
        ])
        .split(area);
    (chunks[0], chunks[1])
}
