//! Colors for the registry browser.

use crate::notifications::NotificationLevel;
use ratatui::style::Color;
use ward_cache::QueryStatus;
use ward_core::{EncounterStatus, MedicationStatus};

#[derive(Debug, Clone)]
pub struct WardTheme {
    pub bg: Color,
    pub bg_highlight: Color,
    pub primary: Color,
    pub primary_dim: Color,
    pub secondary: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
    pub text: Color,
    pub text_dim: Color,
    pub border: Color,
    pub border_focus: Color,
}

impl Default for WardTheme {
    fn default() -> Self {
        Self {
            bg: Color::Rgb(15, 18, 24),
            bg_highlight: Color::Rgb(38, 44, 56),
            primary: Color::Rgb(59, 130, 246),
            primary_dim: Color::Rgb(37, 80, 150),
            secondary: Color::Rgb(147, 197, 253),
            success: Color::Rgb(34, 197, 94),
            warning: Color::Rgb(234, 179, 8),
            error: Color::Rgb(239, 68, 68),
            info: Color::Rgb(96, 165, 250),
            text: Color::Rgb(243, 244, 246),
            text_dim: Color::Rgb(156, 163, 175),
            border: Color::Rgb(75, 85, 99),
            border_focus: Color::Rgb(59, 130, 246),
        }
    }
}

pub fn encounter_status_color(status: EncounterStatus, theme: &WardTheme) -> Color {
    match status {
        EncounterStatus::Finished => theme.success,
        EncounterStatus::InProgress => theme.info,
        EncounterStatus::Other => theme.text_dim,
    }
}

pub fn medication_status_color(status: MedicationStatus, theme: &WardTheme) -> Color {
    match status {
        MedicationStatus::Active => theme.success,
        MedicationStatus::Stopped => theme.error,
        MedicationStatus::Other => theme.text_dim,
    }
}

pub fn query_status_color(status: QueryStatus, theme: &WardTheme) -> Color {
    match status {
        QueryStatus::Empty => theme.text_dim,
        QueryStatus::Pending => theme.warning,
        QueryStatus::Success => theme.success,
        QueryStatus::Failure => theme.error,
    }
}

pub fn notification_color(level: NotificationLevel, theme: &WardTheme) -> Color {
    match level {
        NotificationLevel::Info => theme.info,
        NotificationLevel::Warning => theme.warning,
        NotificationLevel::Error => theme.error,
        NotificationLevel::Success => theme.success,
    }
}
