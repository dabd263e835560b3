use std::thread;
use std::time::Duration;

use anyhow::Result;
use rusqlite::Connection;
use tempfile::TempDir;

use patient_records_manager::{Gender, NewPatient, Records, Store, SyncChannel};

/// Two "windows" sharing one database file and one channel file, each with its
/// own origin so neither ignores the other's messages.
fn two_instances(dir: &TempDir) -> Result<(Records, Records)> {
    let db = dir.path().join("patients.sqlite");
    let channel = dir.path().join("patient-records-sync.channel");

    let left = Store::open(&db)?.with_channel(SyncChannel::with_origin(channel.clone(), "left"));
    let right = Store::open(&db)?.with_channel(SyncChannel::with_origin(channel, "right"));

    let mut left = Records::new(left);
    let mut right = Records::new(right);
    assert!(left.load());
    assert!(right.load());
    Ok((left, right))
}

fn patient(first: &str) -> NewPatient {
    NewPatient {
        first_name: first.into(),
        last_name: "Diaz".into(),
        date_of_birth: "1990-01-01".into(),
        gender: Gender::Other,
        email: "a@x.com".into(),
        phone: "555-0100".into(),
        address: "1 Main St".into(),
        ..NewPatient::default()
    }
}

#[test]
fn patient_added_in_one_instance_refreshes_the_other() -> Result<()> {
    let dir = TempDir::new()?;
    let (mut left, mut right) = two_instances(&dir)?;

    left.add_patient(&patient("Ana")).expect("insert succeeds");
    assert!(right.patients().is_empty());

    assert!(right.apply_sync_events());
    assert_eq!(right.patients().len(), 1);
    assert_eq!(right.patients()[0].first_name, "Ana");

    // The sender does not hear its own broadcast.
    assert!(!left.apply_sync_events());
    Ok(())
}

#[test]
fn query_executed_refreshes_history_elsewhere() -> Result<()> {
    let dir = TempDir::new()?;
    let (mut left, mut right) = two_instances(&dir)?;

    left.execute_query("SELECT 1").expect("query runs");
    assert!(right.history().is_empty());

    assert!(right.apply_sync_events());
    assert_eq!(right.history().len(), 1);
    assert_eq!(right.history()[0].query, "SELECT 1");
    Ok(())
}

#[test]
fn messages_sent_before_an_instance_starts_are_missed() -> Result<()> {
    let dir = TempDir::new()?;
    let db = dir.path().join("patients.sqlite");
    let channel = dir.path().join("sync.channel");

    let early = Store::open(&db)?.with_channel(SyncChannel::with_origin(channel.clone(), "early"));
    early.add_patient(&patient("Ana"))?;

    let late = Store::open(&db)?.with_channel(SyncChannel::with_origin(channel, "late"));
    let mut late = Records::new(late);
    assert!(late.load());
    assert_eq!(late.patients().len(), 1);
    assert!(!late.apply_sync_events());
    Ok(())
}

#[test]
fn failed_console_statement_is_still_announced() -> Result<()> {
    let dir = TempDir::new()?;
    let (mut left, mut right) = two_instances(&dir)?;

    assert!(left.execute_query("SELEC oops").is_none());

    assert!(right.apply_sync_events());
    assert_eq!(right.history().len(), 1);
    assert_eq!(right.history()[0].query, "SELEC oops");
    Ok(())
}

#[test]
fn query_executed_is_announced_after_the_statement_commits() -> Result<()> {
    let dir = TempDir::new()?;
    let (mut left, mut right) = two_instances(&dir)?;

    let side = dir.path().join("side.sqlite");
    let blocker = Connection::open(&side)?;
    blocker.execute_batch("CREATE TABLE counters (n INTEGER); INSERT INTO counters VALUES (1);")?;

    left.execute_query(&format!("ATTACH DATABASE '{}' AS side", side.display()))
        .expect("attach succeeds");
    assert!(right.apply_sync_events());

    // Hold the side database so the next statement waits on its busy timeout.
    // History lives in the main file, so only the statement itself is blocked.
    blocker.execute_batch("BEGIN IMMEDIATE")?;
    let watcher = thread::spawn(move || -> Result<(Records, bool)> {
        thread::sleep(Duration::from_millis(300));
        let heard_while_blocked = right.apply_sync_events();
        blocker.execute_batch("COMMIT")?;
        Ok((right, heard_while_blocked))
    });

    left.execute_query("UPDATE side.counters SET n = 2")
        .expect("update runs once the lock is released");

    let (mut right, heard_while_blocked) = watcher.join().expect("watcher thread")?;
    assert!(!heard_while_blocked);
    assert!(right.apply_sync_events());
    Ok(())
}
