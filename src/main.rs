//! Binary entry point that glues the SQLite-backed records store to the TUI:
//! read the configuration, start logging, open the store, hydrate the caches
//! and drive the Ratatui event loop until the user exits.
use anyhow::Context;
use clap::Parser;
use patient_records_manager::{logging, run_app, App, Config, Records, Store, SyncChannel};
use tracing::{error, info};

/// Initialize persistence, load cached data, and launch the event loop.
///
/// A store that cannot be opened is fatal: the error is returned before the
/// terminal switches into raw mode so it prints normally.
fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    let _log_guard = logging::init(&config.resolved_log_dir()?)?;

    let db_path = config.resolved_db_path()?;
    let channel = SyncChannel::named(&config.channel_dir()?, &config.channel);
    let store = match Store::open(&db_path) {
        Ok(store) => store.with_channel(channel),
        Err(err) => {
            error!(target: "patient_records", event = "store_open_failed", error = %err);
            return Err(err).context("patient store is unavailable");
        }
    };
    info!(
        target: "patient_records",
        event = "session_started",
        db = %db_path.display(),
        channel = %config.channel
    );

    let mut records = Records::new(store);
    records.load();

    let mut app = App::new(records);
    run_app(&mut app)
}
