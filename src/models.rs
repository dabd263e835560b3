//! Domain models that mirror the SQLite schema and get passed throughout the
//! TUI. These stay light-weight data holders so other layers can focus on
//! presentation and persistence logic.

use std::fmt;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, Value, ValueRef};

/// Fixed set of genders offered by the registration form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gender {
    #[default]
    Female,
    Male,
    Other,
    PreferNotToSay,
}

impl Gender {
    /// Every variant in the order the registration form cycles through them.
    pub const ALL: [Gender; 4] = [
        Gender::Female,
        Gender::Male,
        Gender::Other,
        Gender::PreferNotToSay,
    ];

    /// Lowercase text stored in the `gender` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Female => "female",
            Gender::Male => "male",
            Gender::Other => "other",
            Gender::PreferNotToSay => "prefer-not-to-say",
        }
    }

    /// Parse the stored text. Rows written through the SQL console may carry
    /// anything, so unknown values collapse to `Other` instead of failing the
    /// whole listing.
    pub fn from_storage(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "female" | "f" => Gender::Female,
            "male" | "m" => Gender::Male,
            "prefer-not-to-say" | "prefer_not_to_say" => Gender::PreferNotToSay,
            _ => Gender::Other,
        }
    }

    /// Next option when the user cycles the selector.
    pub fn next(self) -> Self {
        match self {
            Gender::Female => Gender::Male,
            Gender::Male => Gender::Other,
            Gender::Other => Gender::PreferNotToSay,
            Gender::PreferNotToSay => Gender::Female,
        }
    }

    /// Previous option when the user cycles the selector backwards.
    pub fn previous(self) -> Self {
        match self {
            Gender::Female => Gender::PreferNotToSay,
            Gender::Male => Gender::Female,
            Gender::Other => Gender::Male,
            Gender::PreferNotToSay => Gender::Other,
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Gender::Female => "Female",
            Gender::Male => "Male",
            Gender::Other => "Other",
            Gender::PreferNotToSay => "Prefer not to say",
        };
        f.pad(label)
    }
}

impl ToSql for Gender {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Gender {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str().map(Gender::from_storage)
    }
}

/// A timestamp column. SQL console writes can leave any text behind, so a value
/// that does not parse is kept verbatim instead of failing the row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Timestamp {
    Parsed(DateTime<Utc>),
    Raw(String),
}

impl Timestamp {
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Timestamp::Parsed(at) => Some(*at),
            Timestamp::Raw(_) => None,
        }
    }

    /// Render with `fmt`, or the raw text when it never parsed.
    pub fn format(&self, fmt: &str) -> String {
        match self {
            Timestamp::Parsed(at) => at.format(fmt).to_string(),
            Timestamp::Raw(raw) => raw.clone(),
        }
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(at: DateTime<Utc>) -> Self {
        Timestamp::Parsed(at)
    }
}

impl FromSql for Timestamp {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        if let Ok(at) = DateTime::<Utc>::column_result(value) {
            return Ok(Timestamp::Parsed(at));
        }
        let raw = match value {
            ValueRef::Null => String::new(),
            ValueRef::Integer(number) => number.to_string(),
            ValueRef::Real(number) => number.to_string(),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                String::from_utf8_lossy(bytes).into_owned()
            }
        };
        Ok(Timestamp::Raw(raw))
    }
}

/// Registration payload collected by the form. Optional sections stay `None`
/// when the user leaves them blank so they land as `NULL` in the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewPatient {
    pub first_name: String,
    pub last_name: String,
    /// ISO `YYYY-MM-DD`, already checked by the form.
    pub date_of_birth: String,
    pub gender: Gender,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
    pub emergency_contact: Option<String>,
    pub insurance_provider: Option<String>,
    pub insurance_number: Option<String>,
}

/// A stored patient record. The `id` is assigned by SQLite and never changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patient {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: String,
    pub gender: Gender,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
    pub emergency_contact: Option<String>,
    pub insurance_provider: Option<String>,
    pub insurance_number: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Patient {
    /// `Last, First` as shown in the dashboard list.
    pub fn display_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_name)
    }

    /// Whether the record was created within `window` of `now`. Unparseable
    /// timestamps never count as recent.
    pub fn registered_within(&self, now: DateTime<Utc>, window: chrono::Duration) -> bool {
        self.created_at
            .as_datetime()
            .is_some_and(|at| at <= now && now - at <= window)
    }

    /// Label/value pairs for the detail view, grouped the same way as the
    /// registration tabs.
    pub fn detail_sections(&self) -> Vec<(&'static str, Vec<(&'static str, String)>)> {
        let optional = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
        vec![
            (
                "Personal",
                vec![
                    ("First name", self.first_name.clone()),
                    ("Last name", self.last_name.clone()),
                    ("Date of birth", self.date_of_birth.clone()),
                    ("Gender", self.gender.to_string()),
                    ("Email", self.email.clone()),
                    ("Phone", self.phone.clone()),
                    ("Address", self.address.clone()),
                ],
            ),
            (
                "Medical",
                vec![
                    ("Medical history", optional(&self.medical_history)),
                    ("Allergies", optional(&self.allergies)),
                    ("Emergency contact", optional(&self.emergency_contact)),
                ],
            ),
            (
                "Insurance",
                vec![
                    ("Provider", optional(&self.insurance_provider)),
                    ("Policy number", optional(&self.insurance_number)),
                ],
            ),
            (
                "Record",
                vec![
                    ("Patient id", self.id.to_string()),
                    ("Created", self.created_at.format("%Y-%m-%d %H:%M:%S UTC")),
                    ("Updated", self.updated_at.format("%Y-%m-%d %H:%M:%S UTC")),
                ],
            ),
        ]
    }
}

impl fmt::Display for Patient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.first_name, self.last_name)
    }
}

/// One row of the `query_history` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryHistoryEntry {
    pub id: i64,
    /// Literal text as the user typed it.
    pub query: String,
    pub timestamp: Timestamp,
}

/// Whatever the engine handed back for a console statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutcome {
    /// Column names in statement order. Empty for statements that return no
    /// rows (inserts, DDL, batches).
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// Rows returned when `columns` is non-empty, rows changed otherwise.
    pub row_count: usize,
}

impl QueryOutcome {
    /// Whether the statement produced a result set.
    pub fn has_result_set(&self) -> bool {
        !self.columns.is_empty()
    }
}

/// Render an engine value for the console grid.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(number) => number.to_string(),
        Value::Real(number) => number.to_string(),
        Value::Text(text) => text.clone(),
        Value::Blob(bytes) => format!("<{} bytes>", bytes.len()),
    }
}
