use chrono::{DateTime, Utc};
use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::StoreResult;
use crate::models::{NewPatient, Patient};

/// Column list shared by every patient query so the row mapper always sees the
/// same shape.
const PATIENT_COLUMNS: &str = "id, first_name, last_name, date_of_birth, gender, email, phone, \
     address, medical_history, allergies, emergency_contact, insurance_provider, \
     insurance_number, created_at, updated_at";

/// Map a storage row (snake_case columns) onto the application struct. Reads by
/// column name so console-created views with reordered columns still map.
pub(crate) fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        id: row.get("id")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        date_of_birth: row.get("date_of_birth")?,
        gender: row.get("gender")?,
        email: row.get("email")?,
        phone: row.get("phone")?,
        address: row.get("address")?,
        medical_history: row.get("medical_history")?,
        allergies: row.get("allergies")?,
        emergency_contact: row.get("emergency_contact")?,
        insurance_provider: row.get("insurance_provider")?,
        insurance_number: row.get("insurance_number")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Insert a new patient with both timestamps pinned to `now`, echoing the row
/// SQLite stored so callers see the assigned id.
pub fn insert_patient(conn: &Connection, data: &NewPatient, now: DateTime<Utc>) -> StoreResult<Patient> {
    let sql = format!(
        "INSERT INTO patients (
            first_name, last_name, date_of_birth, gender, email, phone, address,
            medical_history, allergies, emergency_contact, insurance_provider,
            insurance_number, created_at, updated_at
        ) VALUES (
            :first_name, :last_name, :date_of_birth, :gender, :email, :phone, :address,
            :medical_history, :allergies, :emergency_contact, :insurance_provider,
            :insurance_number, :now, :now
        )
        RETURNING {PATIENT_COLUMNS}"
    );

    let patient = conn.query_row(
        &sql,
        named_params! {
            ":first_name": data.first_name,
            ":last_name": data.last_name,
            ":date_of_birth": data.date_of_birth,
            ":gender": data.gender,
            ":email": data.email,
            ":phone": data.phone,
            ":address": data.address,
            ":medical_history": data.medical_history,
            ":allergies": data.allergies,
            ":emergency_contact": data.emergency_contact,
            ":insurance_provider": data.insurance_provider,
            ":insurance_number": data.insurance_number,
            ":now": now,
        },
        patient_from_row,
    )?;

    Ok(patient)
}

/// Every patient, newest registration first.
pub fn fetch_patients(conn: &Connection) -> StoreResult<Vec<Patient>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PATIENT_COLUMNS} FROM patients ORDER BY created_at DESC, id DESC"
    ))?;

    let patients = stmt
        .query_map([], patient_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(patients)
}

/// Look up a single patient. Absence is `Ok(None)`.
pub fn fetch_patient(conn: &Connection, id: i64) -> StoreResult<Option<Patient>> {
    let patient = conn
        .query_row(
            &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1"),
            [id],
            patient_from_row,
        )
        .optional()?;

    Ok(patient)
}

/// Case-insensitive search across names and contact fields. A blank term
/// behaves like [`fetch_patients`].
pub fn search_patients(conn: &Connection, term: &str) -> StoreResult<Vec<Patient>> {
    let term = term.trim();
    if term.is_empty() {
        return fetch_patients(conn);
    }

    let pattern = format!("%{}%", escape_like(&term.to_lowercase()));
    let mut stmt = conn.prepare(&format!(
        "SELECT {PATIENT_COLUMNS} FROM patients
         WHERE LOWER(first_name) LIKE ?1 ESCAPE '\\'
            OR LOWER(last_name) LIKE ?1 ESCAPE '\\'
            OR LOWER(email) LIKE ?1 ESCAPE '\\'
            OR LOWER(phone) LIKE ?1 ESCAPE '\\'
         ORDER BY created_at DESC, id DESC"
    ))?;

    let patients = stmt
        .query_map([pattern], patient_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(patients)
}

/// Escape `LIKE` wildcards so a search for `50%` means the literal text.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
