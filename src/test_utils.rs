//! Test utilities shared by unit tests and benchmarks
//!
//! Scripted sources, an in-memory sink and builders for ticks and snapshots
//! with predictable names: car `i` is driven by `"Driver i"` of `"Team i"`.

#![cfg(any(test, feature = "benchmark"))]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::persistence::PersistenceSink;
use crate::source::{Roster, RosterEntry, SourcePoll, TelemetrySource, TelemetryTick};
use crate::tracking::TotalsSnapshot;
use crate::types::{CarIndex, CarSnapshot, DriverKey, DriverTotals, SessionEpoch, StintRecord};
use crate::{PitlogError, Result};

/// 2025-06-07T12:00:00Z
const BASE_TIMESTAMP: i64 = 1_749_297_600;

/// Fixed wall-clock instant `seconds` after the test epoch.
pub fn t(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(BASE_TIMESTAMP, 0).unwrap_or_default() + TimeDelta::seconds(seconds)
}

/// Per-car values for [`tick`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarSpec {
    pub on_pit_road: bool,
    pub lap: i32,
    pub best_lap_time: f32,
}

impl CarSpec {
    pub fn with_best(mut self, best_lap_time: f32) -> Self {
        self.best_lap_time = best_lap_time;
        self
    }
}

pub fn car(on_pit_road: bool, lap: i32) -> CarSpec {
    CarSpec { on_pit_road, lap, best_lap_time: -1.0 }
}

/// Roster entry for car `idx`.
pub fn roster_entry(idx: CarIndex) -> RosterEntry {
    RosterEntry {
        car_idx: idx as i32,
        user_name: format!("Driver {idx}"),
        team_name: Some(format!("Team {idx}")),
        car_class_short_name: Some("GT3".to_string()),
        ..Default::default()
    }
}

/// A tick with one slot per entry in `cars`, all on the roster.
pub fn tick(session: i32, cars: &[CarSpec]) -> TelemetryTick {
    TelemetryTick {
        session_num: SessionEpoch(session),
        session_time: cars.iter().map(|c| c.lap).max().unwrap_or(0) as f64 * 90.0,
        on_pit_road: cars.iter().map(|c| c.on_pit_road).collect(),
        lap: cars.iter().map(|c| c.lap).collect(),
        best_lap_time: cars.iter().map(|c| c.best_lap_time).collect(),
        roster: Arc::new(Roster::from_entries((0..cars.len()).map(roster_entry))),
    }
}

/// A snapshot for car `idx` with roster-style names.
pub fn snapshot(idx: CarIndex, on_pit_road: bool, lap: i32) -> CarSnapshot {
    CarSnapshot {
        car_index: idx,
        on_pit_road,
        lap,
        best_lap_time: -1.0,
        session_time: f64::from(lap) * 90.0,
        driver_name: format!("Driver {idx}"),
        team_name: format!("Team {idx}"),
        class_name: "GT3".to_string(),
    }
}

/// Source that plays a fixed script of poll results.
pub struct ScriptedSource {
    script: VecDeque<Result<SourcePoll>>,
    /// Once the script runs out, report offline after this delay instead of finishing
    idle: Option<Duration>,
}

impl ScriptedSource {
    pub fn new(polls: impl IntoIterator<Item = SourcePoll>) -> Self {
        Self { script: polls.into_iter().map(Ok).collect(), idle: None }
    }

    /// A source that never connects, polling every `delay`.
    pub fn offline(delay: Duration) -> Self {
        Self { script: VecDeque::new(), idle: Some(delay) }
    }

    pub fn then_idle(mut self, delay: Duration) -> Self {
        self.idle = Some(delay);
        self
    }

    pub fn with_error_first(mut self, error: PitlogError) -> Self {
        self.script.push_front(Err(error));
        self
    }

    pub fn with_error_last(mut self, error: PitlogError) -> Self {
        self.script.push_back(Err(error));
        self
    }
}

#[async_trait::async_trait]
impl TelemetrySource for ScriptedSource {
    async fn poll(&mut self) -> Result<SourcePoll> {
        if let Some(next) = self.script.pop_front() {
            return next;
        }
        match self.idle {
            Some(delay) => {
                tokio::time::sleep(delay).await;
                Ok(SourcePoll::Disconnected)
            }
            None => Ok(SourcePoll::Finished),
        }
    }

    fn poll_interval(&self) -> Duration {
        self.idle.unwrap_or_default()
    }
}

/// Sink that records every call in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub stints: Vec<StintRecord>,
    /// Last totals table written, also returned by `load_totals`
    pub totals: Option<TotalsSnapshot>,
    pub live: Option<TotalsSnapshot>,
    pub archives: Vec<String>,
    pub initialized: usize,
    pub resets: usize,
    pub live_writes: usize,
    /// Make every write fail
    pub fail_writes: bool,
}

impl MemorySink {
    fn check(&self) -> Result<()> {
        if self.fail_writes {
            Err(PitlogError::file_error("memory", std::io::Error::other("write refused")))
        } else {
            Ok(())
        }
    }
}

impl PersistenceSink for MemorySink {
    fn initialize(&mut self) -> Result<()> {
        self.check()?;
        self.initialized += 1;
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.check()?;
        self.resets += 1;
        self.stints.clear();
        self.totals = Some(TotalsSnapshot::new());
        self.live = None;
        Ok(())
    }

    fn append_stint(&mut self, record: &StintRecord) -> Result<()> {
        self.check()?;
        self.stints.push(record.clone());
        Ok(())
    }

    fn write_totals(&mut self, totals: &TotalsSnapshot) -> Result<()> {
        self.check()?;
        self.totals = Some(totals.clone());
        Ok(())
    }

    fn load_totals(&self) -> Result<Vec<(DriverKey, DriverTotals)>> {
        Ok(self.totals.iter().flatten().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    fn archive(&mut self, suffix: &str) -> Result<Vec<PathBuf>> {
        self.check()?;
        self.archives.push(suffix.to_string());
        Ok(vec![PathBuf::from(format!("memory_{suffix}"))])
    }

    fn write_live_totals(&mut self, projected: &TotalsSnapshot) -> Result<()> {
        self.check()?;
        self.live_writes += 1;
        self.live = Some(projected.clone());
        Ok(())
    }
}
