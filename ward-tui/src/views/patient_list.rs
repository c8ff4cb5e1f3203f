//! Patient search and list screen.

use crate::nav::InputMode;
use crate::state::App;
use crate::views::helpers::{placeholder, render_placeholder};
use crate::widgets::SearchBar;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};
use ward_cache::ViewState;
use ward_core::{PatientSummary, NOT_AVAILABLE};

pub fn render(f: &mut Frame<'_>, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    let editing = app.input_mode == InputMode::Editing;
    let search = SearchBar {
        input: &app.search_input,
        submitted: app.submitted_search.as_deref(),
        editing,
        text_style: Style::default().fg(app.theme.text),
        hint_style: Style::default().fg(app.theme.text_dim),
        border_style: Style::default().fg(if editing {
            app.theme.border_focus
        } else {
            app.theme.border
        }),
    };
    search.render(f, chunks[0]);

    let state = app.list_view_state();
    match &state {
        ViewState::Ready {
            records,
            total_count,
        } => {
            render_table(f, app, records, chunks[1]);
            let summary = Paragraph::new(showing_line(records.len(), *total_count))
                .style(Style::default().fg(app.theme.text_dim));
            f.render_widget(summary, chunks[2]);
        }
        other => {
            if let Some((text, style)) =
                placeholder(other, &app.theme, "No patients found", "patients")
            {
                render_placeholder(f, chunks[1], "Patients", text, style);
            }
        }
    }
}

pub fn showing_line(shown: usize, total: usize) -> String {
    format!("Showing {} of {} patients", shown, total)
}

fn render_table(f: &mut Frame<'_>, app: &App, records: &[PatientSummary], area: Rect) {
    let rows: Vec<Row> = records
        .iter()
        .map(|patient| {
            Row::new(vec![
                Cell::from(patient.full_name.clone()),
                Cell::from(patient.birth_date.format("%Y-%m-%d").to_string()),
                Cell::from(patient.gender.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string())),
                Cell::from(patient.id.clone()),
            ])
        })
        .collect();

    let header = Row::new(vec!["Name", "Birth Date", "Gender", "ID"]).style(
        Style::default()
            .fg(app.theme.primary)
            .add_modifier(Modifier::BOLD),
    );
    let widths = [
        Constraint::Percentage(40),
        Constraint::Percentage(20),
        Constraint::Percentage(15),
        Constraint::Percentage(25),
    ];
    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().title("Patients").borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .fg(app.theme.primary)
                .bg(app.theme.bg_highlight),
        )
        .highlight_symbol("> ");

    let mut state = TableState::default();
    if !records.is_empty() {
        state.select(Some(app.selected.min(records.len() - 1)));
    }
    f.render_stateful_widget(table, area, &mut state);
}
