use anyhow::{anyhow, Result};
use chrono::{NaiveDate, Utc};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

use crate::models::{Gender, NewPatient};

/// Tabs of the registration form. Each groups a slice of [`PatientField`].
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum FormTab {
    Personal,
    Medical,
    Insurance,
}

impl FormTab {
    pub(crate) const ALL: [FormTab; 3] = [FormTab::Personal, FormTab::Medical, FormTab::Insurance];

    pub(crate) fn title(self) -> &'static str {
        match self {
            FormTab::Personal => "Personal",
            FormTab::Medical => "Medical",
            FormTab::Insurance => "Insurance",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            FormTab::Personal => 0,
            FormTab::Medical => 1,
            FormTab::Insurance => 2,
        }
    }

    /// Fields shown on this tab, top to bottom.
    pub(crate) fn fields(self) -> &'static [PatientField] {
        match self {
            FormTab::Personal => &[
                PatientField::FirstName,
                PatientField::LastName,
                PatientField::DateOfBirth,
                PatientField::Gender,
                PatientField::Email,
                PatientField::Phone,
                PatientField::Address,
            ],
            FormTab::Medical => &[
                PatientField::MedicalHistory,
                PatientField::Allergies,
                PatientField::EmergencyContact,
            ],
            FormTab::Insurance => &[PatientField::InsuranceProvider, PatientField::InsuranceNumber],
        }
    }
}

/// Every input on the registration form, in focus order.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub(crate) enum PatientField {
    #[default]
    FirstName,
    LastName,
    DateOfBirth,
    Gender,
    Email,
    Phone,
    Address,
    MedicalHistory,
    Allergies,
    EmergencyContact,
    InsuranceProvider,
    InsuranceNumber,
}

impl PatientField {
    const ORDER: [PatientField; 12] = [
        PatientField::FirstName,
        PatientField::LastName,
        PatientField::DateOfBirth,
        PatientField::Gender,
        PatientField::Email,
        PatientField::Phone,
        PatientField::Address,
        PatientField::MedicalHistory,
        PatientField::Allergies,
        PatientField::EmergencyContact,
        PatientField::InsuranceProvider,
        PatientField::InsuranceNumber,
    ];

    pub(crate) fn label(self) -> &'static str {
        match self {
            PatientField::FirstName => "First name",
            PatientField::LastName => "Last name",
            PatientField::DateOfBirth => "Date of birth",
            PatientField::Gender => "Gender",
            PatientField::Email => "Email",
            PatientField::Phone => "Phone",
            PatientField::Address => "Address",
            PatientField::MedicalHistory => "Medical history",
            PatientField::Allergies => "Allergies",
            PatientField::EmergencyContact => "Emergency contact",
            PatientField::InsuranceProvider => "Insurance provider",
            PatientField::InsuranceNumber => "Policy number",
        }
    }

    pub(crate) fn is_required(self) -> bool {
        self.tab() == FormTab::Personal
    }

    pub(crate) fn tab(self) -> FormTab {
        match self {
            PatientField::FirstName
            | PatientField::LastName
            | PatientField::DateOfBirth
            | PatientField::Gender
            | PatientField::Email
            | PatientField::Phone
            | PatientField::Address => FormTab::Personal,
            PatientField::MedicalHistory
            | PatientField::Allergies
            | PatientField::EmergencyContact => FormTab::Medical,
            PatientField::InsuranceProvider | PatientField::InsuranceNumber => FormTab::Insurance,
        }
    }

    fn position(self) -> usize {
        Self::ORDER
            .iter()
            .position(|field| *field == self)
            .unwrap_or(0)
    }

    fn offset(self, delta: isize) -> Self {
        let len = Self::ORDER.len() as isize;
        let idx = (self.position() as isize + delta).rem_euclid(len);
        Self::ORDER[idx as usize]
    }
}

/// State of the multi-tab registration form.
#[derive(Default, Clone)]
pub(crate) struct PatientForm {
    pub(crate) first_name: String,
    pub(crate) last_name: String,
    pub(crate) date_of_birth: String,
    pub(crate) gender: Gender,
    pub(crate) email: String,
    pub(crate) phone: String,
    pub(crate) address: String,
    pub(crate) medical_history: String,
    pub(crate) allergies: String,
    pub(crate) emergency_contact: String,
    pub(crate) insurance_provider: String,
    pub(crate) insurance_number: String,
    pub(crate) active: PatientField,
    pub(crate) error: Option<String>,
}

impl PatientForm {
    pub(crate) fn active_tab(&self) -> FormTab {
        self.active.tab()
    }

    /// Move focus to the next field, wrapping onto the next tab.
    pub(crate) fn next_field(&mut self) {
        self.active = self.active.offset(1);
    }

    pub(crate) fn previous_field(&mut self) {
        self.active = self.active.offset(-1);
    }

    /// Jump to the first field of the neighbouring tab.
    pub(crate) fn switch_tab(&mut self, forward: bool) {
        let current = self.active_tab().index() as isize;
        let delta = if forward { 1 } else { -1 };
        let target = (current + delta).rem_euclid(FormTab::ALL.len() as isize) as usize;
        self.active = FormTab::ALL[target].fields()[0];
    }

    /// Cycle the gender selector when it has focus.
    pub(crate) fn cycle_gender(&mut self, forward: bool) -> bool {
        if self.active != PatientField::Gender {
            return false;
        }
        self.gender = if forward {
            self.gender.next()
        } else {
            self.gender.previous()
        };
        true
    }

    /// Append a character to the active text field. The gender selector takes
    /// no free text.
    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        if self.active == PatientField::DateOfBirth && !(ch.is_ascii_digit() || ch == '-') {
            return false;
        }
        match self.value_mut(self.active) {
            Some(value) => {
                value.push(ch);
                true
            }
            None => false,
        }
    }

    pub(crate) fn backspace(&mut self) {
        if let Some(value) = self.value_mut(self.active) {
            value.pop();
        }
    }

    fn value_mut(&mut self, field: PatientField) -> Option<&mut String> {
        let value = match field {
            PatientField::FirstName => &mut self.first_name,
            PatientField::LastName => &mut self.last_name,
            PatientField::DateOfBirth => &mut self.date_of_birth,
            PatientField::Gender => return None,
            PatientField::Email => &mut self.email,
            PatientField::Phone => &mut self.phone,
            PatientField::Address => &mut self.address,
            PatientField::MedicalHistory => &mut self.medical_history,
            PatientField::Allergies => &mut self.allergies,
            PatientField::EmergencyContact => &mut self.emergency_contact,
            PatientField::InsuranceProvider => &mut self.insurance_provider,
            PatientField::InsuranceNumber => &mut self.insurance_number,
        };
        Some(value)
    }

    /// Text currently shown for `field`.
    pub(crate) fn value(&self, field: PatientField) -> String {
        match field {
            PatientField::FirstName => self.first_name.clone(),
            PatientField::LastName => self.last_name.clone(),
            PatientField::DateOfBirth => self.date_of_birth.clone(),
            PatientField::Gender => self.gender.to_string(),
            PatientField::Email => self.email.clone(),
            PatientField::Phone => self.phone.clone(),
            PatientField::Address => self.address.clone(),
            PatientField::MedicalHistory => self.medical_history.clone(),
            PatientField::Allergies => self.allergies.clone(),
            PatientField::EmergencyContact => self.emergency_contact.clone(),
            PatientField::InsuranceProvider => self.insurance_provider.clone(),
            PatientField::InsuranceNumber => self.insurance_number.clone(),
        }
    }

    /// Validate the inputs and build the payload for the store. On failure the
    /// offending field takes focus.
    pub(crate) fn parse_inputs(&mut self) -> Result<NewPatient> {
        match self.validate() {
            Ok(patient) => Ok(patient),
            Err((field, err)) => {
                self.active = field;
                Err(err)
            }
        }
    }

    fn validate(&self) -> std::result::Result<NewPatient, (PatientField, anyhow::Error)> {
        let required = |field: PatientField, raw: &str| {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                Err((field, anyhow!("{} is required.", field.label())))
            } else {
                Ok(trimmed.to_string())
            }
        };

        let first_name = required(PatientField::FirstName, &self.first_name)?;
        let last_name = required(PatientField::LastName, &self.last_name)?;
        let date_of_birth = required(PatientField::DateOfBirth, &self.date_of_birth)?;
        let dob = NaiveDate::parse_from_str(&date_of_birth, "%Y-%m-%d").map_err(|_| {
            (
                PatientField::DateOfBirth,
                anyhow!("Date of birth must look like YYYY-MM-DD."),
            )
        })?;
        if dob > Utc::now().date_naive() {
            return Err((
                PatientField::DateOfBirth,
                anyhow!("Date of birth cannot be in the future."),
            ));
        }

        let email = required(PatientField::Email, &self.email)?;
        let valid_email = email
            .split_once('@')
            .map(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.ends_with('.'))
            .unwrap_or(false);
        if !valid_email {
            return Err((PatientField::Email, anyhow!("Email address looks invalid.")));
        }

        let phone = required(PatientField::Phone, &self.phone)?;
        if !phone.chars().any(|ch| ch.is_ascii_digit()) {
            return Err((PatientField::Phone, anyhow!("Phone number needs digits.")));
        }

        let address = required(PatientField::Address, &self.address)?;

        Ok(NewPatient {
            first_name,
            last_name,
            date_of_birth,
            gender: self.gender,
            email,
            phone,
            address,
            medical_history: optional(&self.medical_history),
            allergies: optional(&self.allergies),
            emergency_contact: optional(&self.emergency_contact),
            insurance_provider: optional(&self.insurance_provider),
            insurance_number: optional(&self.insurance_number),
        })
    }

    /// Render a single line for the form widget.
    pub(crate) fn build_line(&self, field: PatientField) -> Line<'static> {
        let value = self.value(field);
        let is_active = self.active == field;

        let display = if field == PatientField::Gender {
            format!("< {value} >")
        } else if value.is_empty() {
            if field.is_required() {
                "<required>".to_string()
            } else {
                "<optional>".to_string()
            }
        } else {
            value
        };

        let style = if is_active {
            Style::default().fg(Color::Yellow)
        } else if display.starts_with("<required>") || display.starts_with("<optional>") {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };

        Line::from(vec![
            Span::raw(format!("{:<20}", format!("{}:", field.label()))),
            Span::styled(display, style),
        ])
    }

    /// Character count of the active field, used to park the cursor.
    pub(crate) fn value_len(&self, field: PatientField) -> usize {
        self.value(field).chars().count()
    }
}

fn optional(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Single-line SQL editor for the console, with recall of earlier queries.
#[derive(Default, Clone)]
pub(crate) struct QueryInput {
    pub(crate) text: String,
    /// Index into the history list while the user is recalling entries.
    pub(crate) recall: Option<usize>,
}

impl QueryInput {
    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        self.text.push(ch);
        self.recall = None;
        true
    }

    pub(crate) fn backspace(&mut self) {
        self.text.pop();
        self.recall = None;
    }

    pub(crate) fn clear(&mut self) {
        self.text.clear();
        self.recall = None;
    }

    /// Step through `history` (newest first). `older` walks back in time.
    pub(crate) fn recall(&mut self, history: &[String], older: bool) {
        if history.is_empty() {
            return;
        }
        let next = match (self.recall, older) {
            (None, true) => Some(0),
            (None, false) => None,
            (Some(idx), true) => Some((idx + 1).min(history.len() - 1)),
            (Some(0), false) => None,
            (Some(idx), false) => Some(idx - 1),
        };
        self.recall = next;
        self.text = match next {
            Some(idx) => history[idx].clone(),
            None => String::new(),
        };
    }

    /// Trimmed statement ready to run, or `None` when the editor is blank.
    pub(crate) fn statement(&self) -> Option<String> {
        let trimmed = self.text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled() -> PatientForm {
        PatientForm {
            first_name: " Ana ".into(),
            last_name: "Diaz".into(),
            date_of_birth: "1990-01-01".into(),
            gender: Gender::Female,
            email: "a@x.com".into(),
            phone: "555-0100".into(),
            address: "1 Main St".into(),
            ..PatientForm::default()
        }
    }

    #[test]
    fn complete_form_produces_trimmed_payload_with_blank_optionals_as_none() {
        let mut form = filled();
        form.allergies = "  ".into();
        form.insurance_provider = "Acme Health".into();

        let patient = form.parse_inputs().unwrap();
        assert_eq!(patient.first_name, "Ana");
        assert_eq!(patient.allergies, None);
        assert_eq!(patient.insurance_provider.as_deref(), Some("Acme Health"));
    }

    #[test]
    fn missing_required_field_takes_focus() {
        let mut form = filled();
        form.phone.clear();
        form.active = PatientField::FirstName;

        let err = form.parse_inputs().unwrap_err();
        assert_eq!(err.to_string(), "Phone is required.");
        assert_eq!(form.active, PatientField::Phone);
    }

    #[test]
    fn date_of_birth_must_be_a_past_iso_date() {
        let mut form = filled();
        form.date_of_birth = "1990-13-01".into();
        assert!(form.parse_inputs().is_err());

        form.date_of_birth = "2999-01-01".into();
        let err = form.parse_inputs().unwrap_err();
        assert!(err.to_string().contains("future"));
    }

    #[test]
    fn email_needs_local_part_and_domain() {
        for bad in ["ana", "@x.com", "ana@localhost", "ana@x."] {
            let mut form = filled();
            form.email = bad.into();
            assert!(form.parse_inputs().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn focus_wraps_across_tabs() {
        let mut form = PatientForm::default();
        for _ in 0..7 {
            form.next_field();
        }
        assert_eq!(form.active_tab(), FormTab::Medical);

        form.switch_tab(true);
        assert_eq!(form.active, PatientField::InsuranceProvider);
        form.switch_tab(true);
        assert_eq!(form.active, PatientField::FirstName);

        form.previous_field();
        assert_eq!(form.active, PatientField::InsuranceNumber);
    }

    #[test]
    fn gender_field_cycles_instead_of_typing() {
        let mut form = PatientForm {
            active: PatientField::Gender,
            ..PatientForm::default()
        };
        assert!(!form.push_char('x'));
        assert!(form.cycle_gender(true));
        assert_eq!(form.gender, Gender::Male);
    }

    #[test]
    fn date_field_only_accepts_digits_and_dashes() {
        let mut form = PatientForm {
            active: PatientField::DateOfBirth,
            ..PatientForm::default()
        };
        assert!(form.push_char('1'));
        assert!(form.push_char('-'));
        assert!(!form.push_char('a'));
        assert_eq!(form.date_of_birth, "1-");
    }

    #[test]
    fn query_recall_walks_history_and_back() {
        let history = vec!["SELECT 2".to_string(), "SELECT 1".to_string()];
        let mut input = QueryInput::default();

        input.recall(&history, true);
        assert_eq!(input.text, "SELECT 2");
        input.recall(&history, true);
        input.recall(&history, true);
        assert_eq!(input.text, "SELECT 1");
        input.recall(&history, false);
        assert_eq!(input.text, "SELECT 2");
        input.recall(&history, false);
        assert_eq!(input.text, "");
        assert!(input.statement().is_none());
    }
}
