use std::fs;
use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;
use tracing::info;

use crate::error::{StoreError, StoreResult};

/// How long a statement waits on a lock held by another running instance
/// before SQLite reports `SQLITE_BUSY`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (or create) the database file at `path`, creating parent directories
/// as needed, and make sure both tables exist.
pub fn open_database(path: &Path) -> StoreResult<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| StoreError::DataDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let init = |source| StoreError::Init {
        path: path.to_path_buf(),
        source,
    };

    let conn = Connection::open(path).map_err(init)?;
    conn.busy_timeout(BUSY_TIMEOUT).map_err(init)?;
    ensure_schema(&conn).map_err(init)?;

    info!(
        target: "patient_records",
        event = "store_opened",
        path = %path.display()
    );
    Ok(conn)
}

/// Private in-memory database with the full schema.
pub fn open_in_memory() -> StoreResult<Connection> {
    let conn = Connection::open_in_memory().map_err(|source| StoreError::Init {
        path: ":memory:".into(),
        source,
    })?;
    ensure_schema(&conn).map_err(|source| StoreError::Init {
        path: ":memory:".into(),
        source,
    })?;
    Ok(conn)
}

/// Idempotently create the `patients` and `query_history` tables.
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS patients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            date_of_birth TEXT NOT NULL,
            gender TEXT NOT NULL,
            email TEXT NOT NULL,
            phone TEXT NOT NULL,
            address TEXT NOT NULL,
            medical_history TEXT,
            allergies TEXT,
            emergency_contact TEXT,
            insurance_provider TEXT,
            insurance_number TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS query_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            query TEXT NOT NULL,
            timestamp TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    Ok(())
}
