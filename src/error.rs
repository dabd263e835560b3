use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database file could not be opened or the schema could not be
    /// created. Fatal for the session.
    #[error("failed to initialize patient store at {path}: {source}")]
    Init {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error("could not create data directory {path}: {source}")]
    DataDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Sql(#[from] rusqlite::Error),
}

/// Failures on the cross-instance sync channel. These never abort a database
/// operation; callers log them and move on.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("sync channel i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("could not encode sync message: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
