//! In-memory application state shared by every screen.
//!
//! [`Records`] is a read-through cache over the [`Store`]: it keeps the patient
//! list, the recent query history and the last console result, plus the
//! loading/error flags the views render. Each public operation brackets its
//! store calls: raise `loading`, clear the previous error, delegate, then either
//! update the cache or record the error message. A failure never discards
//! cached data.

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::db::Store;
use crate::error::StoreResult;
use crate::models::{NewPatient, Patient, QueryHistoryEntry, QueryOutcome};
use crate::sync::{SyncEventKind, SyncSubscriber};

/// Registrations newer than this count as recent on the dashboard.
pub const RECENT_WINDOW_DAYS: i64 = 7;

pub struct Records {
    store: Store,
    subscriber: Option<SyncSubscriber>,
    patients: Vec<Patient>,
    search: String,
    visible: Vec<Patient>,
    history: Vec<QueryHistoryEntry>,
    last_outcome: Option<QueryOutcome>,
    loading: bool,
    error: Option<String>,
}

impl Records {
    /// Wrap a store. If the store broadcasts on a channel, this instance also
    /// subscribes to it so writes from other instances trigger refreshes.
    pub fn new(store: Store) -> Self {
        let subscriber = store.channel().map(|channel| channel.subscribe());
        Self {
            store,
            subscriber,
            patients: Vec::new(),
            search: String::new(),
            visible: Vec::new(),
            history: Vec::new(),
            last_outcome: None,
            loading: false,
            error: None,
        }
    }

    /// Hydrate both caches. Returns `false` when either load failed; the first
    /// failure is the one kept in [`Records::error`].
    pub fn load(&mut self) -> bool {
        self.refresh(true, true)
    }

    pub fn patients(&self) -> &[Patient] {
        &self.patients
    }

    /// Patients matching the active search term, newest first.
    pub fn visible_patients(&self) -> &[Patient] {
        if self.search.trim().is_empty() {
            &self.patients
        } else {
            &self.visible
        }
    }

    /// Cached patients registered in the last [`RECENT_WINDOW_DAYS`] days.
    pub fn recent_count(&self, now: DateTime<Utc>) -> usize {
        let window = Duration::days(RECENT_WINDOW_DAYS);
        self.patients
            .iter()
            .filter(|patient| patient.registered_within(now, window))
            .count()
    }

    pub fn search_term(&self) -> &str {
        &self.search
    }

    pub fn history(&self) -> &[QueryHistoryEntry] {
        &self.history
    }

    pub fn last_outcome(&self) -> Option<&QueryOutcome> {
        self.last_outcome.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Re-read the patient list (and the search results, if a search is active).
    pub fn refresh_patients(&mut self) -> bool {
        self.refresh(true, false)
    }

    pub fn refresh_history(&mut self) -> bool {
        self.refresh(false, true)
    }

    /// Change the dashboard search term and re-run the search.
    pub fn search(&mut self, term: &str) -> bool {
        self.search = term.to_string();
        if term.trim().is_empty() {
            self.visible.clear();
            self.error = None;
            return true;
        }
        match self.bracket(|store| store.search_patients(term)) {
            Some(visible) => {
                self.visible = visible;
                true
            }
            None => false,
        }
    }

    /// Register a patient. The new record goes to the front of the cache since
    /// the list is newest first.
    pub fn add_patient(&mut self, data: &NewPatient) -> Option<Patient> {
        let patient = self.bracket(|store| store.add_patient(data))?;
        self.patients.insert(0, patient.clone());
        if !self.search.trim().is_empty() {
            let term = self.search.clone();
            self.search(&term);
        }
        Some(patient)
    }

    /// Fetch one patient straight from the store. `None` means either absence
    /// (with no error recorded) or a failure (see [`Records::error`]).
    pub fn patient(&mut self, id: i64) -> Option<Patient> {
        self.bracket(|store| store.get_patient_by_id(id)).flatten()
    }

    /// Run console text. On success the result, the history and the patient
    /// list are refreshed, since any statement (even one returning rows) may
    /// have written to `patients`. On failure only the error flag changes.
    /// A refresh that fails after a successful statement leaves its message in
    /// [`Records::error`] while still returning the outcome.
    pub fn execute_query(&mut self, text: &str) -> Option<QueryOutcome> {
        let outcome = self.bracket(|store| store.execute_query(text))?;
        self.last_outcome = Some(outcome.clone());
        self.refresh(true, true);
        Some(outcome)
    }

    /// Drain the sync channel and refresh whatever other instances changed.
    /// Returns `true` when a cache was refreshed.
    pub fn apply_sync_events(&mut self) -> bool {
        let Some(subscriber) = self.subscriber.as_mut() else {
            return false;
        };

        let messages = match subscriber.poll() {
            Ok(messages) => messages,
            Err(err) => {
                warn!(target: "patient_records", event = "sync_poll_failed", error = %err);
                return false;
            }
        };
        if messages.is_empty() {
            return false;
        }

        let patients_changed = messages
            .iter()
            .any(|message| message.kind == SyncEventKind::PatientAdded);
        let queries_ran = messages
            .iter()
            .any(|message| message.kind == SyncEventKind::QueryExecuted);
        info!(
            target: "patient_records",
            event = "sync_received",
            count = messages.len(),
            patients_changed,
            queries_ran
        );

        // A console statement elsewhere may have written to `patients` too.
        self.refresh(patients_changed || queries_ran, queries_ran);
        true
    }

    /// Re-read the requested caches under one loading/error bracket. Each
    /// fetch runs even if an earlier one failed; the first failure wins.
    fn refresh(&mut self, patients: bool, history: bool) -> bool {
        self.loading = true;
        self.error = None;
        let mut failure = None;

        if patients {
            match fetch_patient_lists(&self.store, &self.search) {
                Ok((all, visible)) => {
                    self.patients = all;
                    self.visible = visible;
                }
                Err(err) => failure = Some(err.to_string()),
            }
        }
        if history {
            match self.store.get_query_history() {
                Ok(entries) => self.history = entries,
                Err(err) => {
                    failure.get_or_insert(err.to_string());
                }
            }
        }

        self.loading = false;
        let ok = failure.is_none();
        self.error = failure;
        ok
    }

    fn bracket<T>(&mut self, op: impl FnOnce(&Store) -> StoreResult<T>) -> Option<T> {
        self.loading = true;
        self.error = None;
        let result = op(&self.store);
        self.loading = false;
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.error = Some(err.to_string());
                None
            }
        }
    }
}

/// The full list plus, when `term` is not blank, the search matches.
fn fetch_patient_lists(store: &Store, term: &str) -> StoreResult<(Vec<Patient>, Vec<Patient>)> {
    let patients = store.list_patients()?;
    let visible = if term.trim().is_empty() {
        Vec::new()
    } else {
        store.search_patients(term)?
    };
    Ok((patients, visible))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Gender;

    fn ana() -> NewPatient {
        NewPatient {
            first_name: "Ana".into(),
            last_name: "Diaz".into(),
            date_of_birth: "1990-01-01".into(),
            gender: Gender::Female,
            email: "a@x.com".into(),
            phone: "555-0100".into(),
            address: "1 Main St".into(),
            ..NewPatient::default()
        }
    }

    fn records() -> Records {
        let mut records = Records::new(Store::open_in_memory().unwrap());
        assert!(records.load());
        records
    }

    #[test]
    fn add_patient_prepends_to_cache() {
        let mut records = records();
        let first = records.add_patient(&ana()).unwrap();
        let second = records
            .add_patient(&NewPatient {
                first_name: "Bo".into(),
                ..ana()
            })
            .unwrap();

        let ids: Vec<i64> = records.patients().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
        assert!(!records.is_loading());
        assert!(records.error().is_none());
    }

    #[test]
    fn failed_query_keeps_caches_and_sets_error() {
        let mut records = records();
        records.add_patient(&ana()).unwrap();
        records.execute_query("SELECT * FROM patients").unwrap();
        let patients_before = records.patients().to_vec();
        let history_before = records.history().to_vec();

        assert!(records.execute_query("SELEC oops").is_none());

        let message = records.error().unwrap();
        assert!(message.contains("syntax error"), "unexpected message: {message}");
        assert_eq!(records.patients(), patients_before.as_slice());
        assert_eq!(records.history(), history_before.as_slice());
        assert!(!records.is_loading());
    }

    #[test]
    fn successful_call_clears_previous_error() {
        let mut records = records();
        assert!(records.execute_query("not sql").is_none());
        assert!(records.error().is_some());

        records.execute_query("SELECT 1").unwrap();
        assert!(records.error().is_none());
    }

    #[test]
    fn missing_patient_is_not_an_error() {
        let mut records = records();
        assert!(records.patient(404).is_none());
        assert!(records.error().is_none());
    }

    #[test]
    fn console_inserts_show_up_in_the_patient_cache() {
        let mut records = records();
        records
            .execute_query(
                "INSERT INTO patients (first_name, last_name, date_of_birth, gender, email, phone, address)
                 VALUES ('Cy', 'Lee', '1980-02-02', 'other', 'c@x.com', '2', 'Here')",
            )
            .unwrap();
        assert_eq!(records.patients().len(), 1);
        assert_eq!(records.patients()[0].first_name, "Cy");
    }

    #[test]
    fn load_keeps_the_patient_error_when_history_succeeds() {
        let mut records = records();
        records.add_patient(&ana()).unwrap();
        // A copy without INTEGER PRIMARY KEY accepts a non-numeric id, which the
        // row mapper then rejects.
        records
            .store()
            .connection()
            .execute_batch(
                "ALTER TABLE patients RENAME TO patients_old;
                 CREATE TABLE patients AS SELECT * FROM patients_old;
                 UPDATE patients SET id = 'not a number';",
            )
            .unwrap();

        assert!(!records.load());
        let message = records.error().expect("load failure must be reported");
        assert!(!message.is_empty());
        assert_eq!(records.patients().len(), 1);
        assert!(!records.is_loading());
    }

    #[test]
    fn returning_statements_refresh_the_patient_cache() {
        let mut records = records();
        records.add_patient(&ana()).unwrap();

        let outcome = records
            .execute_query("DELETE FROM patients RETURNING id")
            .unwrap();
        assert!(outcome.has_result_set());
        assert!(records.patients().is_empty());
    }

    #[test]
    fn console_written_timestamps_do_not_break_the_list() {
        let mut records = records();
        records.add_patient(&ana()).unwrap();

        records
            .execute_query("UPDATE patients SET created_at = 'last tuesday'")
            .unwrap();
        assert!(records.error().is_none());
        assert!(records.load());
        assert_eq!(
            records.patients()[0].created_at,
            crate::models::Timestamp::Raw("last tuesday".into())
        );
    }

    #[test]
    fn recent_count_covers_the_last_week_only() {
        let mut records = records();
        records.add_patient(&ana()).unwrap();
        records.add_patient(&ana()).unwrap();
        records
            .execute_query(
                "UPDATE patients SET created_at = datetime('now', '-30 days')
                 WHERE id = (SELECT MIN(id) FROM patients)",
            )
            .unwrap();

        assert_eq!(records.recent_count(Utc::now()), 1);
        assert_eq!(records.patients().len(), 2);
    }

    #[test]
    fn search_filters_visible_patients_only() {
        let mut records = records();
        records.add_patient(&ana()).unwrap();
        records
            .add_patient(&NewPatient {
                first_name: "Bo".into(),
                last_name: "Chen".into(),
                ..ana()
            })
            .unwrap();

        assert!(records.search("chen"));
        assert_eq!(records.visible_patients().len(), 1);
        assert_eq!(records.patients().len(), 2);

        assert!(records.search(""));
        assert_eq!(records.visible_patients().len(), 2);
    }
}
