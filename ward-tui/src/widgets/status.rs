//! Cache status indicator.

use ratatui::{
    layout::Rect,
    style::Style,
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};
use ward_cache::{CacheEntry, QueryStatus};

pub struct StatusIndicator {
    pub title: String,
    pub status: String,
    pub style: Style,
}

impl StatusIndicator {
    pub fn render(&self, f: &mut Frame<'_>, area: Rect) {
        let paragraph = Paragraph::new(self.status.clone())
            .style(self.style)
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .title(self.title.as_str())
                    .borders(Borders::ALL),
            );
        f.render_widget(paragraph, area);
    }
}

/// One-line summary of an entry's lifecycle.
pub fn describe_entry<T>(entry: Option<&CacheEntry<T>>) -> String {
    let Some(entry) = entry else {
        return "not loaded".to_string();
    };
    let mut text = match entry.status() {
        QueryStatus::Empty => "empty".to_string(),
        QueryStatus::Pending if entry.retry_count() > 0 => {
            format!("loading (retry {})", entry.retry_count())
        }
        QueryStatus::Pending => "loading".to_string(),
        QueryStatus::Success => "loaded".to_string(),
        QueryStatus::Failure => format!("failed after {} retries", entry.retry_count()),
    };
    if let Some(at) = entry.fetched_at() {
        text.push_str(&format!(" | fetched {}", at.format("%H:%M:%S")));
    }
    if entry.is_invalidated() {
        text.push_str(" | stale");
    }
    text
}
