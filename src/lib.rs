//! Stint and pit-stop logger for racing simulator telemetry.
//!
//! pitlog watches every car's pit-road flag and lap counter, turns each
//! on-track stint into a record, keeps running per-driver totals and resets
//! cleanly whenever the simulator starts a new session.
//!
//! # Features
//!
//! - **Stint tracking**: one record per pit entry with duration, laps and best lap
//! - **Driver totals**: accumulated across stints, resumed after a restart
//! - **Session rollover**: outputs archived and state reset on a new session
//! - **Commit on exit**: open stints are flushed into totals on shutdown
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use pitlog::{LoggerConfig, Pitlog};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> pitlog::Result<()> {
//!     let handle = Pitlog::replay("session.yaml", LoggerConfig::default(), 4.0)?;
//!     let mut events = handle.events();
//!
//!     while let Some(event) = events.next().await {
//!         println!("{event:?}");
//!     }
//!     let summary = handle.join().await?;
//!     println!("{} drivers", summary.totals.len());
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod config;
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Tracking state machines
pub mod tracking;

// Poll loop, inputs and outputs
pub mod logger;
pub mod persistence;
pub mod source;

// Core exports
pub use error::*;
pub use types::*;

pub use config::LoggerConfig;
pub use logger::{LoggerEvent, LoggerHandle, LoggerStats, PitLogger, SessionSummary, TickOutcome};
pub use persistence::{CsvSink, MirroredSink, PersistenceSink, SqliteSink};
pub use source::{ReplaySource, SourcePoll, TelemetrySource, TelemetryTick};
pub use tracking::{RolloverManager, StintTracker, TotalsAccumulator, TotalsSnapshot};

/// Unified entry point for running the logger.
///
/// Both constructors spawn onto the current tokio runtime and write CSV
/// outputs at the paths named in the [`LoggerConfig`], mirrored into SQLite
/// when `db_path` is set.
pub struct Pitlog;

impl Pitlog {
    /// Run the logger against any telemetry source.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration is invalid
    /// - The output files or the database cannot be created
    ///
    /// Totals left by a previous run are loaded and extended.
    pub fn start<P: TelemetrySource>(source: P, config: LoggerConfig) -> Result<LoggerHandle> {
        let sink = persistence::sink_from_config(&config)?;
        Ok(PitLogger::new(config, sink)?.spawn(source))
    }

    /// Replay a recorded tick log.
    ///
    /// Ticks are spaced by the configured poll interval divided by `speed`.
    ///
    /// # Errors
    ///
    /// Returns an error if the tick log cannot be read or parsed, if `speed`
    /// is not a positive number, or for any reason listed on [`Pitlog::start`].
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use pitlog::{LoggerConfig, Pitlog};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> pitlog::Result<()> {
    /// let handle = Pitlog::replay("race.yaml", LoggerConfig::default(), 1.0)?;
    /// let summary = handle.join().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn replay<P: AsRef<std::path::Path>>(
        path: P,
        config: LoggerConfig,
        speed: f64,
    ) -> Result<LoggerHandle> {
        let mut source = ReplaySource::open(path, config.poll_interval())?;
        source.set_speed(speed)?;
        Self::start(source, config)
    }
}
