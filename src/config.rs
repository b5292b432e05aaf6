//! Logger configuration.
//!
//! Every field has a default, so an empty YAML document is a valid config:
//!
//! ```yaml
//! stint_log_path: pitstop_log.csv
//! totals_path: driver_times.csv
//! archive_dir: RaceLogs
//! live_totals_path: live_totals.csv   # optional
//! db_path: race.db                    # optional SQLite mirror
//! poll_interval_ms: 500
//! projection_interval_secs: 60
//! connect_timeout_secs: 30
//! event_capacity: 256
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::source::preprocess_yaml;
use crate::{PitlogError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggerConfig {
    /// Append-only stint log
    pub stint_log_path: PathBuf,
    /// Per-driver totals table, rewritten after every stint
    pub totals_path: PathBuf,
    /// Where outputs are moved on session rollover
    pub archive_dir: PathBuf,
    /// Optional file receiving projected totals
    pub live_totals_path: Option<PathBuf>,
    /// Optional SQLite database mirroring stints and totals
    pub db_path: Option<PathBuf>,
    pub poll_interval_ms: u64,
    pub projection_interval_secs: u64,
    /// How long the source may stay offline at startup before giving up
    pub connect_timeout_secs: u64,
    /// Buffered events per subscriber
    pub event_capacity: usize,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            stint_log_path: PathBuf::from("pitstop_log.csv"),
            totals_path: PathBuf::from("driver_times.csv"),
            archive_dir: PathBuf::from("RaceLogs"),
            live_totals_path: None,
            db_path: None,
            poll_interval_ms: 500,
            projection_interval_secs: 60,
            connect_timeout_secs: 30,
            event_capacity: 256,
        }
    }
}

impl LoggerConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        // An empty file means "all defaults"
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let cleaned = preprocess_yaml(text)?;
        let config: Self = serde_yaml_ng::from_str(&cleaned)
            .map_err(|e| PitlogError::parse_error("logger config", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| PitlogError::file_error(path, e))?;
        Self::from_yaml_str(&text)
    }

    /// Reject settings the logger cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(PitlogError::config_error("poll_interval_ms must be positive"));
        }
        if self.projection_interval_secs == 0 {
            return Err(PitlogError::config_error("projection_interval_secs must be positive"));
        }
        if self.event_capacity == 0 {
            return Err(PitlogError::config_error("event_capacity must be positive"));
        }
        if self.stint_log_path == self.totals_path {
            return Err(PitlogError::config_error(format!(
                "stint log and totals table share the path {}",
                self.stint_log_path.display()
            )));
        }
        if self.live_totals_path.as_ref().is_some_and(|live| {
            *live == self.stint_log_path || *live == self.totals_path
        }) {
            return Err(PitlogError::config_error(
                "live_totals_path must differ from the stint log and totals table",
            ));
        }
        if self.db_path.as_ref().is_some_and(|db| {
            *db == self.stint_log_path || *db == self.totals_path
        }) {
            return Err(PitlogError::config_error(
                "db_path must differ from the CSV outputs",
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn projection_interval(&self) -> Duration {
        Duration::from_secs(self.projection_interval_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
