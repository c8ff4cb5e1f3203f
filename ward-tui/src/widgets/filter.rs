//! Search box for the patient list.

use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

pub struct SearchBar<'a> {
    pub input: &'a str,
    pub submitted: Option<&'a str>,
    pub editing: bool,
    pub text_style: Style,
    pub hint_style: Style,
    pub border_style: Style,
}

impl<'a> SearchBar<'a> {
    /// Block title: shows which search the list comes from.
    pub fn title(&self) -> String {
        match self.submitted {
            Some(name) => format!("Search [server: \"{}\"]", name),
            None => "Search [all patients]".to_string(),
        }
    }

    pub fn line(&self) -> Line<'static> {
        if self.input.is_empty() && !self.editing {
            return Line::from(Span::styled(
                "Press / to search by name".to_string(),
                self.hint_style,
            ));
        }
        let cursor = if self.editing { "_" } else { "" };
        Line::from(vec![
            Span::styled(self.input.to_string(), self.text_style),
            Span::styled(cursor.to_string(), self.hint_style),
        ])
    }

    pub fn render(&self, f: &mut Frame<'_>, area: Rect) {
        let paragraph = Paragraph::new(self.line()).block(
            Block::default()
                .title(self.title())
                .borders(Borders::ALL)
                .border_style(self.border_style),
        );
        f.render_widget(paragraph, area);
    }
}
