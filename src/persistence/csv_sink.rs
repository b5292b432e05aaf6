//! CSV stint log and totals table

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use super::PersistenceSink;
use crate::config::LoggerConfig;
use crate::tracking::TotalsSnapshot;
use crate::types::{
    DriverKey, DriverTotals, StintRecord, format_hms, format_min_sec, format_timestamp,
};
use crate::{PitlogError, Result};

/// Stint log columns.
pub const STINT_HEADERS: [&str; 13] = [
    "CarIdx",
    "Class",
    "TeamName",
    "DriverName",
    "Stint Start Timestamp",
    "Stint End Timestamp",
    "Stint Start SessionTime",
    "Stint End SessionTime",
    "Stint Start Lap",
    "Stint End Lap",
    "Stint Duration (sec)",
    "Stint Duration (min:sec)",
    "Stint Duration (Laps)",
];

/// Totals table columns.
pub const TOTALS_HEADERS: [&str; 7] = [
    "TeamName",
    "DriverName",
    "Total Time (sec)",
    "Total Time (h:m:s)",
    "Total Laps",
    "Average Lap (sec)",
    "Best Lap (sec)",
];

/// Totals row as read back from disk.
///
/// Numeric cells stay strings so blank or hand-edited values degrade to
/// zero instead of failing the whole load.
#[derive(Debug, Deserialize)]
struct TotalsRow {
    #[serde(rename = "TeamName")]
    team: String,
    #[serde(rename = "DriverName")]
    driver: String,
    #[serde(rename = "Total Time (sec)", default)]
    total_time: String,
    #[serde(rename = "Total Laps", default)]
    total_laps: String,
    #[serde(rename = "Best Lap (sec)", alias = "Best Lap Time (sec)", default)]
    best_lap: String,
}

impl TotalsRow {
    fn into_totals(self) -> (DriverKey, DriverTotals) {
        let total_time_seconds = self.total_time.trim().parse::<f64>().unwrap_or(0.0);
        let laps = self.total_laps.trim();
        let total_laps = laps
            .parse::<i64>()
            .or_else(|_| laps.parse::<f64>().map(|v| v as i64))
            .unwrap_or(0);
        let best_lap_seconds = self
            .best_lap
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v > 0.0);

        (
            DriverKey::new(self.team, self.driver),
            DriverTotals { total_time_seconds, total_laps, best_lap_seconds },
        )
    }
}

/// Writes the stint log and totals table as CSV files.
#[derive(Debug, Clone)]
pub struct CsvSink {
    stint_log: PathBuf,
    totals: PathBuf,
    archive_dir: PathBuf,
    live_totals: Option<PathBuf>,
}

impl CsvSink {
    pub fn new(
        stint_log: impl Into<PathBuf>,
        totals: impl Into<PathBuf>,
        archive_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            stint_log: stint_log.into(),
            totals: totals.into(),
            archive_dir: archive_dir.into(),
            live_totals: None,
        }
    }

    /// Also write projected totals to `path` on every projection.
    pub fn with_live_totals(mut self, path: impl Into<PathBuf>) -> Self {
        self.live_totals = Some(path.into());
        self
    }

    pub fn from_config(config: &LoggerConfig) -> Self {
        let sink = Self::new(&config.stint_log_path, &config.totals_path, &config.archive_dir);
        match &config.live_totals_path {
            Some(path) => sink.with_live_totals(path),
            None => sink,
        }
    }

    pub fn stint_log_path(&self) -> &Path {
        &self.stint_log
    }

    pub fn totals_path(&self) -> &Path {
        &self.totals
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    fn write_headers(path: &Path, headers: &[&str]) -> Result<()> {
        ensure_parent(path)?;
        let mut writer =
            csv::Writer::from_path(path).map_err(|e| PitlogError::csv_error(path, e))?;
        writer.write_record(headers).map_err(|e| PitlogError::csv_error(path, e))?;
        writer.flush().map_err(|e| PitlogError::file_error(path, e))
    }

    /// Write a totals table to a temp file and rename it over `path`.
    fn write_table_atomic(path: &Path, totals: &TotalsSnapshot) -> Result<()> {
        ensure_parent(path)?;
        let tmp_path = path.with_extension("csv.tmp");

        let file = File::create(&tmp_path).map_err(|e| PitlogError::file_error(&tmp_path, e))?;
        {
            let mut writer = csv::Writer::from_writer(&file);
            writer.write_record(TOTALS_HEADERS).map_err(|e| PitlogError::csv_error(&tmp_path, e))?;
            for (key, driver) in totals {
                writer
                    .write_record(totals_record(key, driver))
                    .map_err(|e| PitlogError::csv_error(&tmp_path, e))?;
            }
            writer.flush().map_err(|e| PitlogError::file_error(&tmp_path, e))?;
        }
        file.sync_all().map_err(|e| PitlogError::file_error(&tmp_path, e))?;

        fs::rename(&tmp_path, path).map_err(|e| PitlogError::file_error(path, e))
    }
}

impl PersistenceSink for CsvSink {
    fn initialize(&mut self) -> Result<()> {
        for (path, headers) in [
            (&self.stint_log, &STINT_HEADERS[..]),
            (&self.totals, &TOTALS_HEADERS[..]),
        ] {
            if !path.exists() {
                debug!("Creating {}", path.display());
                Self::write_headers(path, headers)?;
            }
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        Self::write_headers(&self.stint_log, &STINT_HEADERS)?;
        Self::write_headers(&self.totals, &TOTALS_HEADERS)?;
        if let Some(live) = &self.live_totals {
            Self::write_headers(live, &TOTALS_HEADERS)?;
        }
        Ok(())
    }

    fn append_stint(&mut self, record: &StintRecord) -> Result<()> {
        let path = &self.stint_log;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| PitlogError::file_error(path, e))?;
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(stint_record(record)).map_err(|e| PitlogError::csv_error(path, e))?;
        writer.flush().map_err(|e| PitlogError::file_error(path, e))
    }

    fn write_totals(&mut self, totals: &TotalsSnapshot) -> Result<()> {
        Self::write_table_atomic(&self.totals, totals)
    }

    fn load_totals(&self) -> Result<Vec<(DriverKey, DriverTotals)>> {
        let path = &self.totals;
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PitlogError::file_error(path, e)),
        };

        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);
        let mut rows = Vec::new();
        for (line, row) in reader.deserialize::<TotalsRow>().enumerate() {
            match row {
                Ok(row) => rows.push(row.into_totals()),
                // Partially written or hand-edited rows are skipped, not fatal
                Err(e) => warn!("Skipping totals row {} in {}: {e}", line + 1, path.display()),
            }
        }
        Ok(rows)
    }

    /// Either both outputs are moved or neither is: a failed move puts back
    /// whatever was already archived.
    fn archive(&mut self, suffix: &str) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.archive_dir)
            .map_err(|e| PitlogError::file_error(&self.archive_dir, e))?;

        let mut moved: Vec<(&Path, PathBuf)> = Vec::new();
        for path in [&self.stint_log, &self.totals] {
            if !path.exists() {
                continue;
            }
            let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
            let dest = self.archive_dir.join(format!("{stem}_{suffix}.csv"));
            if let Err(e) = move_file(path, &dest) {
                for (original, archived) in moved.iter().rev() {
                    if let Err(undo) = move_file(archived, original) {
                        warn!("Could not restore {}: {undo}", original.display());
                    }
                }
                return Err(e);
            }
            moved.push((path.as_path(), dest));
        }
        Ok(moved.into_iter().map(|(_, dest)| dest).collect())
    }

    fn write_live_totals(&mut self, projected: &TotalsSnapshot) -> Result<()> {
        match &self.live_totals {
            Some(path) => Self::write_table_atomic(path, projected),
            None => Ok(()),
        }
    }
}

fn stint_record(record: &StintRecord) -> [String; 13] {
    [
        record.car_index.to_string(),
        record.class.clone(),
        record.team.clone(),
        record.driver.clone(),
        format_timestamp(record.start_ts),
        format_timestamp(record.end_ts),
        format!("{:.3}", record.start_session_time),
        format!("{:.3}", record.end_session_time),
        record.start_lap.to_string(),
        record.end_lap.to_string(),
        format!("{:.3}", record.duration_seconds),
        format_min_sec(record.duration_seconds),
        record.duration_laps.to_string(),
    ]
}

fn totals_record(key: &DriverKey, totals: &DriverTotals) -> [String; 7] {
    [
        key.team.clone(),
        key.driver.clone(),
        format!("{:.3}", totals.total_time_seconds),
        format_hms(totals.total_time_seconds),
        totals.total_laps.to_string(),
        format!("{:.3}", totals.average_lap_seconds()),
        totals.best_lap_seconds.map(|b| format!("{b:.3}")).unwrap_or_default(),
    ]
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| PitlogError::file_error(parent, e))
        }
        _ => Ok(()),
    }
}

/// Rename, falling back to copy and remove across filesystems.
fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to).map_err(|e| PitlogError::file_error(to, e))?;
    fs::remove_file(from).map_err(|e| PitlogError::file_error(from, e))
}
