//! Persistence module split across logical submodules. [`Store`] owns the one
//! SQLite connection and is the only way the rest of the crate reaches it.

mod connection;
mod patients;
mod queries;

use std::path::Path;

use chrono::Utc;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::error::StoreResult;
use crate::models::{NewPatient, Patient, QueryHistoryEntry, QueryOutcome};
use crate::sync::{SyncChannel, SyncEventKind};

pub use connection::ensure_schema;
pub use patients::{fetch_patient, fetch_patients, insert_patient, search_patients};
pub use queries::{fetch_query_history, record_query, run_statement, HISTORY_LIMIT};

/// Handle over the embedded database plus the channel used to tell other
/// running instances about writes.
pub struct Store {
    conn: Connection,
    channel: Option<SyncChannel>,
}

impl Store {
    /// Open (or create) the database at `path` and make sure the schema exists.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Ok(Self {
            conn: connection::open_database(path)?,
            channel: None,
        })
    }

    /// Same schema over a throwaway in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self {
            conn: connection::open_in_memory()?,
            channel: None,
        })
    }

    /// Broadcast writes on `channel`.
    pub fn with_channel(mut self, channel: SyncChannel) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn channel(&self) -> Option<&SyncChannel> {
        self.channel.as_ref()
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Insert a patient. The form has already validated the payload; nothing is
    /// checked here.
    pub fn add_patient(&self, data: &NewPatient) -> StoreResult<Patient> {
        let patient = insert_patient(&self.conn, data, Utc::now())?;
        info!(
            target: "patient_records",
            event = "patient_added",
            patient_id = patient.id
        );
        self.notify(SyncEventKind::PatientAdded);
        Ok(patient)
    }

    pub fn list_patients(&self) -> StoreResult<Vec<Patient>> {
        fetch_patients(&self.conn)
    }

    pub fn get_patient_by_id(&self, id: i64) -> StoreResult<Option<Patient>> {
        fetch_patient(&self.conn, id)
    }

    pub fn search_patients(&self, term: &str) -> StoreResult<Vec<Patient>> {
        search_patients(&self.conn, term)
    }

    /// Record `text` in the history, then run it. The two steps are separate
    /// round trips: a failing statement still leaves its history entry. Other
    /// instances hear about it only once the statement has finished, so their
    /// refresh sees whatever it wrote.
    pub fn execute_query(&self, text: &str) -> StoreResult<QueryOutcome> {
        record_query(&self.conn, text, Utc::now())?;

        let result = run_statement(&self.conn, text);
        self.notify(SyncEventKind::QueryExecuted);

        match result {
            Ok(outcome) => {
                info!(
                    target: "patient_records",
                    event = "query_executed",
                    query_len = text.len(),
                    row_count = outcome.row_count,
                    ok = true
                );
                Ok(outcome)
            }
            Err(err) => {
                info!(
                    target: "patient_records",
                    event = "query_executed",
                    query_len = text.len(),
                    ok = false,
                    error = %err
                );
                Err(err)
            }
        }
    }

    pub fn get_query_history(&self) -> StoreResult<Vec<QueryHistoryEntry>> {
        fetch_query_history(&self.conn, HISTORY_LIMIT)
    }

    fn notify(&self, kind: SyncEventKind) {
        if let Some(channel) = &self.channel {
            if let Err(err) = channel.publish(kind) {
                warn!(
                    target: "patient_records",
                    event = "sync_publish_failed",
                    kind = ?kind,
                    error = %err
                );
            }
        }
    }
}
