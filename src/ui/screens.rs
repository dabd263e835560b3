use crate::models::Patient;

use super::forms::QueryInput;

/// Selection state for the dashboard list. The rows themselves live in
/// `Records` so a sync refresh is picked up on the next frame.
#[derive(Default)]
pub(crate) struct DashboardScreen {
    pub(crate) selected: usize,
}

impl DashboardScreen {
    pub(crate) fn move_selection(&mut self, offset: isize, len: usize) {
        if len == 0 {
            self.selected = 0;
            return;
        }
        let last = len as isize - 1;
        self.selected = (self.selected as isize + offset).clamp(0, last) as usize;
    }

    pub(crate) fn select_first(&mut self) {
        self.selected = 0;
    }

    pub(crate) fn select_last(&mut self, len: usize) {
        self.selected = len.saturating_sub(1);
    }

    /// Keep the selection inside a list that may have shrunk.
    pub(crate) fn ensure_in_bounds(&mut self, len: usize) {
        if len == 0 {
            self.selected = 0;
        } else if self.selected >= len {
            self.selected = len - 1;
        }
    }

    /// Point the selection at `id` if it is in `patients`.
    pub(crate) fn focus(&mut self, patients: &[Patient], id: i64) {
        if let Some(idx) = patients.iter().position(|patient| patient.id == id) {
            self.selected = idx;
        }
    }
}

/// Detail view for one patient, addressed by id.
pub(crate) struct DetailScreen {
    pub(crate) patient_id: i64,
    pub(crate) patient: Option<Patient>,
    pub(crate) scroll: u16,
}

impl DetailScreen {
    pub(crate) fn new(patient_id: i64, patient: Option<Patient>) -> Self {
        Self {
            patient_id,
            patient,
            scroll: 0,
        }
    }

    pub(crate) fn scroll_by(&mut self, offset: i32) {
        self.scroll = (self.scroll as i32 + offset).max(0) as u16;
    }
}

/// Tables and columns listed in the console reference panel.
pub(crate) const SCHEMA_REFERENCE: &[(&str, &[(&str, &str)])] = &[
    (
        "patients",
        &[
            ("id", "INTEGER PRIMARY KEY"),
            ("first_name", "TEXT"),
            ("last_name", "TEXT"),
            ("date_of_birth", "TEXT"),
            ("gender", "TEXT"),
            ("email", "TEXT"),
            ("phone", "TEXT"),
            ("address", "TEXT"),
            ("medical_history", "TEXT"),
            ("allergies", "TEXT"),
            ("emergency_contact", "TEXT"),
            ("insurance_provider", "TEXT"),
            ("insurance_number", "TEXT"),
            ("created_at", "TIMESTAMP"),
            ("updated_at", "TIMESTAMP"),
        ],
    ),
    (
        "query_history",
        &[
            ("id", "INTEGER PRIMARY KEY"),
            ("query", "TEXT"),
            ("timestamp", "TIMESTAMP"),
        ],
    ),
];

/// Sample statements offered by the reference panel, grouped by purpose.
pub(crate) const EXAMPLE_QUERIES: &[(&str, &str)] = &[
    ("Basic", "SELECT * FROM patients;"),
    (
        "Basic",
        "SELECT first_name, last_name, email FROM patients ORDER BY last_name;",
    ),
    ("Filtering", "SELECT * FROM patients WHERE gender = 'female';"),
    (
        "Filtering",
        "SELECT * FROM patients WHERE created_at >= datetime('now', '-7 days');",
    ),
];

/// Which half of the console receives arrow keys.
#[derive(Copy, Clone, PartialEq, Eq, Default)]
pub(crate) enum ConsoleFocus {
    #[default]
    Editor,
    Results,
}

/// SQL console: editor, history recall and a scrollable result grid.
#[derive(Default)]
pub(crate) struct ConsoleScreen {
    pub(crate) input: QueryInput,
    pub(crate) focus: ConsoleFocus,
    pub(crate) result_scroll: usize,
    /// Highlighted example while the reference panel is open.
    pub(crate) reference: Option<usize>,
}

impl ConsoleScreen {
    pub(crate) fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            ConsoleFocus::Editor => ConsoleFocus::Results,
            ConsoleFocus::Results => ConsoleFocus::Editor,
        };
    }

    pub(crate) fn scroll_results(&mut self, offset: isize, row_count: usize) {
        let last = row_count.saturating_sub(1) as isize;
        self.result_scroll = (self.result_scroll as isize + offset).clamp(0, last.max(0)) as usize;
    }

    pub(crate) fn toggle_reference(&mut self) {
        self.reference = match self.reference {
            Some(_) => None,
            None => Some(0),
        };
    }

    /// Move the example highlight, wrapping at both ends.
    pub(crate) fn move_example(&mut self, offset: isize) {
        if let Some(selected) = self.reference {
            let len = EXAMPLE_QUERIES.len() as isize;
            self.reference = Some((selected as isize + offset).rem_euclid(len) as usize);
        }
    }

    /// Copy the highlighted example into the editor and close the panel.
    pub(crate) fn use_example(&mut self) {
        if let Some((_, sql)) = self.reference.and_then(|idx| EXAMPLE_QUERIES.get(idx)) {
            self.input.text = sql.to_string();
            self.input.recall = None;
            self.focus = ConsoleFocus::Editor;
        }
        self.reference = None;
    }
}
