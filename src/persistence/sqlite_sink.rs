//! SQLite mirror of the stint log and totals table

use std::path::{Path, PathBuf};

use rusqlite::{Connection, params};
use tracing::debug;

use super::PersistenceSink;
use crate::tracking::TotalsSnapshot;
use crate::types::{DriverKey, DriverTotals, StintRecord, format_min_sec, format_timestamp};
use crate::{PitlogError, Result};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS pitstops (
    car_idx INTEGER,
    class TEXT,
    team TEXT,
    driver TEXT,
    start_ts TEXT,
    end_ts TEXT,
    start_sess REAL,
    end_sess REAL,
    start_lap INTEGER,
    end_lap INTEGER,
    duration_sec REAL,
    duration TEXT,
    duration_laps INTEGER
);
CREATE TABLE IF NOT EXISTS driver_totals (
    team TEXT,
    driver TEXT,
    total_time REAL,
    total_laps INTEGER,
    best_lap REAL
);
";

/// Mirrors every stint row and totals rewrite into an SQLite database.
///
/// Pit stops accumulate across sessions; a rollover only empties the
/// totals table.
#[derive(Debug)]
pub struct SqliteSink {
    path: PathBuf,
    conn: Connection,
}

impl SqliteSink {
    /// Open or create the database and its tables.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let conn = Connection::open(&path).map_err(|e| PitlogError::database_error(&path, e))?;
        let mut sink = Self { path, conn };
        sink.initialize()?;
        Ok(sink)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pit stops recorded so far, across every session.
    pub fn stint_count(&self) -> Result<usize> {
        self.conn
            .query_row("SELECT COUNT(*) FROM pitstops", [], |row| row.get::<_, i64>(0))
            .map(|n| n as usize)
            .map_err(|e| self.error(e))
    }

    fn error(&self, source: rusqlite::Error) -> PitlogError {
        PitlogError::database_error(&self.path, source)
    }
}

impl PersistenceSink for SqliteSink {
    fn initialize(&mut self) -> Result<()> {
        self.conn.execute_batch(SCHEMA).map_err(|e| self.error(e))
    }

    fn reset(&mut self) -> Result<()> {
        self.conn.execute("DELETE FROM driver_totals", []).map_err(|e| self.error(e))?;
        Ok(())
    }

    fn append_stint(&mut self, record: &StintRecord) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO pitstops \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    record.car_index as i64,
                    record.class,
                    record.team,
                    record.driver,
                    format_timestamp(record.start_ts),
                    format_timestamp(record.end_ts),
                    record.start_session_time,
                    record.end_session_time,
                    record.start_lap,
                    record.end_lap,
                    record.duration_seconds,
                    format_min_sec(record.duration_seconds),
                    record.duration_laps,
                ],
            )
            .map_err(|e| self.error(e))?;
        Ok(())
    }

    /// Replace the totals table in one transaction.
    fn write_totals(&mut self, totals: &TotalsSnapshot) -> Result<()> {
        let path = self.path.clone();
        let err = |e: rusqlite::Error| PitlogError::database_error(&path, e);

        let tx = self.conn.transaction().map_err(err)?;
        tx.execute("DELETE FROM driver_totals", []).map_err(err)?;
        {
            let mut insert = tx
                .prepare("INSERT INTO driver_totals VALUES (?1, ?2, ?3, ?4, ?5)")
                .map_err(err)?;
            for (key, driver) in totals {
                insert
                    .execute(params![
                        key.team,
                        key.driver,
                        driver.total_time_seconds,
                        driver.total_laps,
                        driver.best_lap_seconds,
                    ])
                    .map_err(err)?;
            }
        }
        tx.commit().map_err(err)?;

        debug!("Mirrored {} totals rows to {}", totals.len(), self.path.display());
        Ok(())
    }

    fn load_totals(&self) -> Result<Vec<(DriverKey, DriverTotals)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT team, driver, total_time, total_laps, best_lap FROM driver_totals")
            .map_err(|e| self.error(e))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    DriverKey::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?),
                    DriverTotals {
                        total_time_seconds: row.get(2)?,
                        total_laps: row.get(3)?,
                        best_lap_seconds: row.get(4)?,
                    },
                ))
            })
            .map_err(|e| self.error(e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| self.error(e))
    }

    /// The database keeps its history in place.
    fn archive(&mut self, _suffix: &str) -> Result<Vec<PathBuf>> {
        Ok(Vec::new())
    }
}
