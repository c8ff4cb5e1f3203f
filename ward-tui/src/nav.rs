//! Screen and tab navigation.

/// Which panel of the patient detail screen is showing.
///
/// Changes only on explicit tab selection. Every tab renders from the same
/// cached patient record, so switching never fetches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActiveTab {
    #[default]
    Details,
    Encounters,
    Medications,
}

impl ActiveTab {
    pub fn title(&self) -> &'static str {
        match self {
            ActiveTab::Details => "Details",
            ActiveTab::Encounters => "Encounters",
            ActiveTab::Medications => "Medications",
        }
    }

    pub fn all() -> &'static [ActiveTab] {
        &[ActiveTab::Details, ActiveTab::Encounters, ActiveTab::Medications]
    }

    pub fn index(&self) -> usize {
        Self::all().iter().position(|t| t == self).unwrap_or(0)
    }

    pub fn from_index(index: usize) -> Option<ActiveTab> {
        Self::all().get(index).copied()
    }

    pub fn next(&self) -> ActiveTab {
        let all = Self::all();
        all[(self.index() + 1) % all.len()]
    }

    pub fn previous(&self) -> ActiveTab {
        let all = Self::all();
        let idx = self.index();
        let prev = if idx == 0 { all.len() - 1 } else { idx - 1 };
        all[prev]
    }
}

/// The screen currently on display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    PatientList,
    PatientDetail { id: String },
}

impl Screen {
    pub fn title(&self) -> &'static str {
        match self {
            Screen::PatientList => "Patients",
            Screen::PatientDetail { .. } => "Patient",
        }
    }
}

/// Whether keystrokes edit the search box or drive navigation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InputMode {
    #[default]
    Normal,
    Editing,
}
