//! Patient detail screen with Details, Encounters and Medications tabs.
//!
//! All three tabs read the same cached patient record.

use crate::nav::{ActiveTab, Screen};
use crate::state::App;
use crate::theme::{encounter_status_color, medication_status_color, query_status_color};
use crate::views::helpers::{placeholder, render_placeholder, two_column};
use crate::widgets::{describe_entry, DetailPanel, StatusIndicator};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, Paragraph, Tabs},
    Frame,
};
use ward_cache::{QueryStatus, ViewState};
use ward_core::{display_status, format_fhir_date, Encounter, MedicationRequest, PatientRecord};

pub fn render(f: &mut Frame<'_>, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(area);

    let record_state = app.record_view_state();
    let record = match &record_state {
        ViewState::Ready { records, .. } => records.first(),
        _ => None,
    };

    let heading = match (record, &app.screen) {
        (Some(record), _) => format!("{} ({})", record.summary.full_name, record.summary.id),
        (None, Screen::PatientDetail { id }) => id.clone(),
        (None, Screen::PatientList) => String::new(),
    };
    let header = Paragraph::new(Span::styled(
        heading,
        Style::default()
            .fg(app.theme.text)
            .add_modifier(Modifier::BOLD),
    ))
    .block(Block::default().title("Patient").borders(Borders::ALL));
    f.render_widget(header, chunks[0]);

    let titles: Vec<&str> = ActiveTab::all().iter().map(|t| t.title()).collect();
    let tabs = Tabs::new(titles)
        .select(app.active_tab.index())
        .block(Block::default().borders(Borders::ALL))
        .style(Style::default().fg(app.theme.text_dim))
        .highlight_style(
            Style::default()
                .fg(app.theme.primary)
                .add_modifier(Modifier::BOLD),
        );
    f.render_widget(tabs, chunks[1]);

    match app.active_tab {
        ActiveTab::Details => render_details(f, app, &record_state, chunks[2]),
        ActiveTab::Encounters => render_encounters(f, app, chunks[2]),
        ActiveTab::Medications => render_medications(f, app, chunks[2]),
    }
}

fn render_details(f: &mut Frame<'_>, app: &App, state: &ViewState<PatientRecord>, area: Rect) {
    let ViewState::Ready { records, .. } = state else {
        if let Some((text, style)) = placeholder(state, &app.theme, "Patient not found", "patients") {
            render_placeholder(f, area, "Details", text, style);
        }
        return;
    };
    let Some(record) = records.first() else {
        return;
    };

    let (left, right) = two_column(area, 65);
    DetailPanel::new("Demographics", record.demographics())
        .with_label_style(Style::default().fg(app.theme.secondary))
        .render(f, left);

    let entry = app.detail_entry();
    let status = entry.as_ref().map_or(QueryStatus::Empty, |e| e.status());
    let indicator = StatusIndicator {
        title: "Record".to_string(),
        status: format!(
            "{} encounters, {} medications\n{}",
            record.encounters.len(),
            record.medications.len(),
            describe_entry(entry.as_ref())
        ),
        style: Style::default().fg(query_status_color(status, &app.theme)),
    };
    indicator.render(f, right);
}

fn render_encounters(f: &mut Frame<'_>, app: &App, area: Rect) {
    let state = app.encounters_view_state();
    let ViewState::Ready { records, .. } = &state else {
        if let Some((text, style)) =
            placeholder(&state, &app.theme, "No encounters recorded", "encounters")
        {
            render_placeholder(f, area, "Encounters", text, style);
        }
        return;
    };

    let items: Vec<ListItem> = records.iter().map(|e| encounter_card(app, e)).collect();
    let list = List::new(items).block(
        Block::default()
            .title(format!("Encounters ({})", records.len()))
            .borders(Borders::ALL),
    );
    f.render_widget(list, area);
}

fn render_medications(f: &mut Frame<'_>, app: &App, area: Rect) {
    let state = app.medications_view_state();
    let ViewState::Ready { records, .. } = &state else {
        if let Some((text, style)) =
            placeholder(&state, &app.theme, "No medications recorded", "medications")
        {
            render_placeholder(f, area, "Medications", text, style);
        }
        return;
    };

    let items: Vec<ListItem> = records.iter().map(|m| medication_card(app, m)).collect();
    let list = List::new(items).block(
        Block::default()
            .title(format!("Medications ({})", records.len()))
            .borders(Borders::ALL),
    );
    f.render_widget(list, area);
}

fn encounter_card(app: &App, encounter: &Encounter) -> ListItem<'static> {
    let status_style =
        Style::default().fg(encounter_status_color(encounter.status_kind(), &app.theme));
    ListItem::new(Text::from(vec![
        Line::from(vec![
            Span::styled(display_status(&encounter.status), status_style),
            Span::raw("  "),
            Span::raw(encounter.period.describe()),
        ]),
        Line::from(vec![
            Span::styled("Reason: ", Style::default().fg(app.theme.text_dim)),
            Span::raw(encounter.reason_text().to_string()),
        ]),
        Line::from(""),
    ]))
}

fn medication_card(app: &App, medication: &MedicationRequest) -> ListItem<'static> {
    let status_style =
        Style::default().fg(medication_status_color(medication.status_kind(), &app.theme));
    let dim = Style::default().fg(app.theme.text_dim);
    ListItem::new(Text::from(vec![
        Line::from(vec![
            Span::styled(
                medication.medication_name().to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(display_status(&medication.status), status_style),
        ]),
        Line::from(vec![
            Span::styled("Dosage: ", dim),
            Span::raw(medication.dosage_text().to_string()),
        ]),
        Line::from(vec![
            Span::styled("Authored: ", dim),
            Span::raw(format_fhir_date(Some(&medication.authored_on))),
            Span::styled("  Intent: ", dim),
            Span::raw(display_status(&medication.intent)),
        ]),
        Line::from(""),
    ]))
}
