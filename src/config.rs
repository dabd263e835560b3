use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Parser;
use directories::{BaseDirs, ProjectDirs};

use crate::sync::DEFAULT_CHANNEL_NAME;

/// Fallback folder beneath the home directory when the platform has no
/// project data directory.
const DATA_DIR_NAME: &str = ".patient-records";
/// SQLite file name stored inside the application data directory.
const DB_FILE_NAME: &str = "patients.sqlite";

/// Command-line and environment settings.
#[derive(Debug, Clone, Parser)]
#[command(name = "patient-records", version, about = "Terminal patient records manager")]
pub struct Config {
    /// SQLite database file.
    #[arg(long = "db", env = "PATIENT_RECORDS_DB")]
    pub db_path: Option<PathBuf>,

    /// Directory for log files.
    #[arg(long, env = "PATIENT_RECORDS_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Name of the channel other running instances listen on.
    #[arg(long, env = "PATIENT_RECORDS_CHANNEL", default_value = DEFAULT_CHANNEL_NAME)]
    pub channel: String,
}

impl Config {
    /// Database location, defaulting into the user's data directory.
    pub fn resolved_db_path(&self) -> Result<PathBuf> {
        match &self.db_path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join(DB_FILE_NAME)),
        }
    }

    /// Log directory, defaulting to `logs/` in the data directory.
    pub fn resolved_log_dir(&self) -> Result<PathBuf> {
        match &self.log_dir {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("logs")),
        }
    }

    /// Directory holding the sync channel file: always the database's own
    /// directory so every instance pointed at the same file shares it.
    pub fn channel_dir(&self) -> Result<PathBuf> {
        let db_path = self.resolved_db_path()?;
        Ok(db_path
            .parent()
            .map(|parent| parent.to_path_buf())
            .unwrap_or_default())
    }
}

/// Per-user data directory for the application.
fn data_dir() -> Result<PathBuf> {
    if let Some(dirs) = ProjectDirs::from("", "", "patient-records") {
        return Ok(dirs.data_dir().to_path_buf());
    }
    let base_dirs = BaseDirs::new().ok_or_else(|| anyhow!("could not locate home directory"))?;
    Ok(base_dirs.home_dir().join(DATA_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_paths_win_over_defaults() {
        let config = Config::try_parse_from([
            "patient-records",
            "--db",
            "/tmp/records/p.sqlite",
            "--log-dir",
            "/tmp/records/logs",
        ])
        .unwrap();

        assert_eq!(config.resolved_db_path().unwrap(), PathBuf::from("/tmp/records/p.sqlite"));
        assert_eq!(config.resolved_log_dir().unwrap(), PathBuf::from("/tmp/records/logs"));
        assert_eq!(config.channel_dir().unwrap(), PathBuf::from("/tmp/records"));
        assert_eq!(config.channel, DEFAULT_CHANNEL_NAME);
    }

    #[test]
    fn bare_file_name_keeps_channel_in_working_directory() {
        let config = Config::try_parse_from(["patient-records", "--db", "p.sqlite"]).unwrap();
        assert_eq!(config.channel_dir().unwrap(), PathBuf::new());
    }
}
