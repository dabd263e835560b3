//! Core library surface for the Patient Records Manager TUI application.
//!
//! The modules exposed here keep the API small so the `bin` target and the
//! integration tests reuse the same pieces.
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod state;
pub mod sync;
pub mod ui;

/// The persistence handle used by `main.rs` and the tests.
pub use db::Store;

pub use config::Config;
pub use error::{ChannelError, StoreError};
pub use models::{Gender, NewPatient, Patient, QueryHistoryEntry, QueryOutcome};
pub use state::Records;
pub use sync::{SyncChannel, SyncEventKind, SyncMessage};

/// The interactive application entry point and state container.
pub use ui::{run_app, App};
