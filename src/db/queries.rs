use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, Connection, Error as SqlError, ErrorCode};

use crate::error::StoreResult;
use crate::models::{QueryHistoryEntry, QueryOutcome};

/// Number of history entries the console shows.
pub const HISTORY_LIMIT: usize = 10;

/// Append the literal query text to `query_history`.
pub fn record_query(conn: &Connection, text: &str, now: DateTime<Utc>) -> StoreResult<i64> {
    conn.execute(
        "INSERT INTO query_history (query, timestamp) VALUES (?1, ?2)",
        params![text, now],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Most recent `limit` history entries, newest first.
pub fn fetch_query_history(conn: &Connection, limit: usize) -> StoreResult<Vec<QueryHistoryEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, query, timestamp
         FROM query_history
         ORDER BY timestamp DESC, id DESC
         LIMIT ?1",
    )?;

    let entries = stmt
        .query_map([limit as i64], |row| {
            Ok(QueryHistoryEntry {
                id: row.get("id")?,
                query: row.get("query")?,
                timestamp: row.get("timestamp")?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(entries)
}

/// Run arbitrary console text against the engine. Nothing is parameterized or
/// filtered: selects, mutations and DDL all go straight through.
pub fn run_statement(conn: &Connection, text: &str) -> StoreResult<QueryOutcome> {
    let before = total_changes(conn)?;

    let mut stmt = match conn.prepare(text) {
        Ok(stmt) => stmt,
        Err(SqlError::MultipleStatement) => {
            conn.execute_batch(text)?;
            return Ok(QueryOutcome {
                row_count: changes_since(conn, before)?,
                ..QueryOutcome::default()
            });
        }
        Err(err) => return Err(err.into()),
    };

    if stmt.column_count() == 0 {
        match stmt.execute([]) {
            Ok(_) => {}
            // Whitespace or a lone comment compiles to no statement at all,
            // and stepping that empty handle is reported as API misuse.
            Err(SqlError::SqliteFailure(err, _)) if err.code == ErrorCode::ApiMisuse => {
                return Ok(QueryOutcome::default());
            }
            Err(err) => return Err(err.into()),
        }
        return Ok(QueryOutcome {
            row_count: changes_since(conn, before)?,
            ..QueryOutcome::default()
        });
    }

    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let width = columns.len();

    let mut rows = Vec::new();
    let mut cursor = stmt.query([])?;
    while let Some(row) = cursor.next()? {
        let values = (0..width)
            .map(|idx| row.get::<_, Value>(idx))
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(values);
    }

    Ok(QueryOutcome {
        columns,
        row_count: rows.len(),
        rows,
    })
}

/// Connection-wide change counter. `changes()` alone would report the last
/// DML count even after a DDL statement.
fn total_changes(conn: &Connection) -> StoreResult<i64> {
    Ok(conn.query_row("SELECT total_changes()", [], |row| row.get(0))?)
}

fn changes_since(conn: &Connection, before: i64) -> StoreResult<usize> {
    Ok(total_changes(conn)?.saturating_sub(before).max(0) as usize)
}
