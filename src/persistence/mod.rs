//! Persistence sinks for stint records and driver totals.
//!
//! The logger only talks to [`PersistenceSink`]; [`CsvSink`] is the on-disk
//! implementation producing the stint log and totals tables. [`SqliteSink`]
//! mirrors the same rows into a database behind a [`MirroredSink`].

use std::path::PathBuf;

use crate::Result;
use crate::config::LoggerConfig;
use crate::tracking::TotalsSnapshot;
use crate::types::{DriverKey, DriverTotals, StintRecord};

mod csv_sink;
mod mirrored;
mod sqlite_sink;

pub use csv_sink::{CsvSink, STINT_HEADERS, TOTALS_HEADERS};
pub use mirrored::MirroredSink;
pub use sqlite_sink::SqliteSink;

/// Destination for everything the logger commits.
///
/// Calls happen from the single logger task, one tick at a time. A failing
/// call never changes in-memory state, so the next successful write is
/// consistent with it.
pub trait PersistenceSink: Send + 'static {
    /// Create outputs with headers when they do not exist yet. Existing
    /// outputs are left untouched so a restart can resume from them.
    fn initialize(&mut self) -> Result<()>;

    /// Replace outputs with header-only tables.
    fn reset(&mut self) -> Result<()>;

    /// Append one closed stint to the stint log.
    fn append_stint(&mut self, record: &StintRecord) -> Result<()>;

    /// Rewrite the totals table in full.
    fn write_totals(&mut self, totals: &TotalsSnapshot) -> Result<()>;

    /// Read back totals written by a previous run; empty when none exist.
    fn load_totals(&self) -> Result<Vec<(DriverKey, DriverTotals)>>;

    /// Move current outputs aside, tagging them with `suffix`.
    ///
    /// Returns the archived paths; outputs that do not exist are skipped.
    fn archive(&mut self, suffix: &str) -> Result<Vec<PathBuf>>;

    /// Publish projected totals. Advisory only, never read back.
    fn write_live_totals(&mut self, _projected: &TotalsSnapshot) -> Result<()> {
        Ok(())
    }
}

impl<S: PersistenceSink + ?Sized> PersistenceSink for Box<S> {
    fn initialize(&mut self) -> Result<()> {
        (**self).initialize()
    }

    fn reset(&mut self) -> Result<()> {
        (**self).reset()
    }

    fn append_stint(&mut self, record: &StintRecord) -> Result<()> {
        (**self).append_stint(record)
    }

    fn write_totals(&mut self, totals: &TotalsSnapshot) -> Result<()> {
        (**self).write_totals(totals)
    }

    fn load_totals(&self) -> Result<Vec<(DriverKey, DriverTotals)>> {
        (**self).load_totals()
    }

    fn archive(&mut self, suffix: &str) -> Result<Vec<PathBuf>> {
        (**self).archive(suffix)
    }

    fn write_live_totals(&mut self, projected: &TotalsSnapshot) -> Result<()> {
        (**self).write_live_totals(projected)
    }
}

/// Sink described by `config`: the CSV outputs, mirrored into SQLite when
/// `db_path` is set.
pub fn sink_from_config(config: &LoggerConfig) -> Result<Box<dyn PersistenceSink>> {
    let csv = CsvSink::from_config(config);
    Ok(match &config.db_path {
        Some(db) => Box::new(MirroredSink::new(csv, SqliteSink::open(db)?)),
        None => Box::new(csv),
    })
}
