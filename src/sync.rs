//! Cross-instance change notifications.
//!
//! Every running copy of the app opens the same SQLite file. When one of them
//! registers a patient or runs a console query it appends a small JSON line to
//! a channel file sitting next to the database; the others tail that file on
//! each tick of their event loop and refresh the affected caches. Delivery is
//! best effort: an instance only sees messages written after it subscribed.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ChannelError;

/// Channel name used when the configuration does not override it.
pub const DEFAULT_CHANNEL_NAME: &str = "patient-records-sync";

/// Once the channel file grows past this size the next publisher truncates it.
const MAX_CHANNEL_BYTES: u64 = 64 * 1024;

/// Process-wide identity stamped on every outgoing message so an instance can
/// ignore its own broadcasts.
pub fn instance_id() -> &'static str {
    static INSTANCE: OnceLock<String> = OnceLock::new();
    INSTANCE.get_or_init(|| Uuid::new_v4().to_string())
}

/// What happened in the publishing instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncEventKind {
    PatientAdded,
    QueryExecuted,
}

/// Wire shape of one channel line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMessage {
    #[serde(rename = "type")]
    pub kind: SyncEventKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub origin: String,
}

/// Publishing handle for a named channel. Cloning is cheap; nothing touches
/// the filesystem until the first publish or subscribe.
#[derive(Debug, Clone)]
pub struct SyncChannel {
    path: PathBuf,
    origin: String,
}

impl SyncChannel {
    /// Channel called `name` living in `dir`.
    pub fn named(dir: &Path, name: &str) -> Self {
        Self::with_origin(dir.join(format!("{name}.channel")), instance_id())
    }

    /// Channel at an explicit path with an explicit origin. Tests use this to
    /// stand in for two separate processes.
    pub fn with_origin(path: PathBuf, origin: &str) -> Self {
        Self {
            path,
            origin: origin.to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one message for other instances.
    pub fn publish(&self, kind: SyncEventKind) -> Result<(), ChannelError> {
        let message = SyncMessage {
            kind,
            timestamp: Utc::now(),
            origin: self.origin.clone(),
        };
        let mut line = serde_json::to_string(&message)?;
        line.push('\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if file.metadata()?.len() > MAX_CHANNEL_BYTES {
            file.set_len(0)?;
        }
        file.write_all(line.as_bytes())?;

        debug!(
            target: "patient_records",
            event = "sync_published",
            kind = ?kind
        );
        Ok(())
    }

    /// Start listening from the current end of the channel. Anything already
    /// written is not replayed.
    pub fn subscribe(&self) -> SyncSubscriber {
        let cursor = fs::metadata(&self.path).map(|meta| meta.len()).unwrap_or(0);
        SyncSubscriber {
            path: self.path.clone(),
            origin: self.origin.clone(),
            cursor,
        }
    }
}

/// Reading side of a channel, tracking how far into the file it has read.
#[derive(Debug)]
pub struct SyncSubscriber {
    path: PathBuf,
    origin: String,
    cursor: u64,
}

impl SyncSubscriber {
    /// Messages from other instances written since the previous poll. Partial
    /// trailing lines stay in the file until the writer finishes them.
    pub fn poll(&mut self) -> Result<Vec<SyncMessage>, ChannelError> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let len = file.metadata()?.len();
        if len < self.cursor {
            // Truncated by a publisher; whatever is there now is new.
            self.cursor = 0;
        }
        if len == self.cursor {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(self.cursor))?;
        let mut buf = Vec::with_capacity((len - self.cursor) as usize);
        file.read_to_end(&mut buf)?;

        let complete = match buf.iter().rposition(|byte| *byte == b'\n') {
            Some(last_newline) => last_newline + 1,
            None => return Ok(Vec::new()),
        };
        self.cursor += complete as u64;

        let mut messages = Vec::new();
        for line in buf[..complete].split(|byte| *byte == b'\n') {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice::<SyncMessage>(line) {
                Ok(message) if message.origin == self.origin => {}
                Ok(message) => messages.push(message),
                Err(err) => warn!(
                    target: "patient_records",
                    event = "sync_message_skipped",
                    error = %err
                ),
            }
        }

        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(dir: &Path) -> (SyncChannel, SyncChannel) {
        let path = dir.join("test.channel");
        (
            SyncChannel::with_origin(path.clone(), "tab-a"),
            SyncChannel::with_origin(path, "tab-b"),
        )
    }

    #[test]
    fn wire_format_uses_type_and_snake_case_kinds() {
        let message = SyncMessage {
            kind: SyncEventKind::PatientAdded,
            timestamp: Utc::now(),
            origin: "x".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "patient_added");
        assert!(json["timestamp"].is_string());

        let parsed: SyncMessage =
            serde_json::from_str(r#"{"type":"query_executed","timestamp":"2024-01-01T00:00:00Z"}"#)
                .unwrap();
        assert_eq!(parsed.kind, SyncEventKind::QueryExecuted);
        assert_eq!(parsed.origin, "");
    }

    #[test]
    fn other_instances_receive_messages_but_the_sender_does_not() {
        let dir = tempfile::tempdir().unwrap();
        let (a, b) = pair(dir.path());
        let mut a_sub = a.subscribe();
        let mut b_sub = b.subscribe();

        a.publish(SyncEventKind::PatientAdded).unwrap();

        let received = b_sub.poll().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].kind, SyncEventKind::PatientAdded);
        assert!(a_sub.poll().unwrap().is_empty());
        assert!(b_sub.poll().unwrap().is_empty());
    }

    #[test]
    fn late_subscribers_miss_earlier_messages() {
        let dir = tempfile::tempdir().unwrap();
        let (a, b) = pair(dir.path());
        a.publish(SyncEventKind::QueryExecuted).unwrap();

        let mut late = b.subscribe();
        assert!(late.poll().unwrap().is_empty());

        a.publish(SyncEventKind::PatientAdded).unwrap();
        let received = late.poll().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].kind, SyncEventKind::PatientAdded);
    }

    #[test]
    fn malformed_and_partial_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let (a, b) = pair(dir.path());
        let mut sub = b.subscribe();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(a.path())
            .unwrap();
        file.write_all(b"not json\n{\"type\":\"patient_added\"").unwrap();
        assert!(sub.poll().unwrap().is_empty());

        file.write_all(b",\"timestamp\":\"2024-01-01T00:00:00Z\",\"origin\":\"tab-a\"}\n")
            .unwrap();
        let received = sub.poll().unwrap();
        assert_eq!(received.len(), 1);
    }

    #[test]
    fn readers_recover_after_truncation() {
        let dir = tempfile::tempdir().unwrap();
        let (a, b) = pair(dir.path());
        let filler = "x".repeat(MAX_CHANNEL_BYTES as usize + 1);
        fs::write(a.path(), format!("{filler}\n")).unwrap();

        let mut sub = b.subscribe();
        a.publish(SyncEventKind::PatientAdded).unwrap();

        let received = sub.poll().unwrap();
        assert_eq!(received.len(), 1);
        assert!(fs::metadata(a.path()).unwrap().len() < MAX_CHANNEL_BYTES);
    }

    #[test]
    fn polling_a_channel_nobody_created_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let channel = SyncChannel::named(dir.path(), DEFAULT_CHANNEL_NAME);
        let mut sub = channel.subscribe();
        assert!(sub.poll().unwrap().is_empty());
        assert!(!channel.path().exists());
    }
}
