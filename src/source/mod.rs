//! Telemetry sources for the stint logger.
//!
//! A source is polled once per logger tick. The acquisition protocol behind
//! it is opaque to the logger: all it sees is a [`SourcePoll`] per call.

use std::time::Duration;

use crate::Result;

mod replay;
mod roster;
mod tick;

pub use replay::{ReplayDocument, ReplaySource};
pub use roster::{Roster, RosterEntry, preprocess_yaml};
pub use tick::TelemetryTick;

/// Outcome of polling a telemetry source once.
#[derive(Debug, Clone, PartialEq)]
pub enum SourcePoll {
    /// Fresh telemetry for this tick.
    Tick(TelemetryTick),
    /// The source is momentarily offline; no snapshot this tick.
    Disconnected,
    /// The source is exhausted and will never produce another tick.
    Finished,
}

/// Trait for telemetry data sources
///
/// Sources handle their own pacing, the same way a live simulator connection
/// waits for its next data-ready signal. The logger simply awaits
/// [`poll`](TelemetrySource::poll) in a loop.
#[async_trait::async_trait]
pub trait TelemetrySource: Send + 'static {
    /// Wait for and return the next poll result
    ///
    /// Returns:
    /// - `Ok(SourcePoll::Tick(tick))` - New telemetry available
    /// - `Ok(SourcePoll::Disconnected)` - Source offline, try again next tick
    /// - `Ok(SourcePoll::Finished)` - Stream ended (normal termination)
    /// - `Err(e)` - Error occurred; retryable errors are retried by the logger
    async fn poll(&mut self) -> Result<SourcePoll>;

    /// Nominal spacing between polls
    fn poll_interval(&self) -> Duration;
}
