//! Replay source for recorded tick logs
//!
//! A tick log is a YAML document stream with one document per poll:
//!
//! ```yaml
//! session_num: 0
//! session_time: 12.5
//! on_pit_road: [false, true]
//! lap: [1, 3]
//! best_lap_time: [-1.0, 92.4]
//! drivers:
//!   - CarIdx: 0
//!     UserName: Ana Costa
//!     TeamName: Tortoise Racing
//!     CarClassShortName: GT3
//! ---
//! connected: false
//! ```
//!
//! `drivers` is only needed when the roster changes; later documents reuse
//! the last roster seen. A raw session-info dump can be embedded instead as
//! a `session_info` string, in which case its `DriverInfo.Drivers` list is
//! used. `connected: false` replays a source dropout.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::time::{Interval, MissedTickBehavior, interval};
use tracing::{debug, info, trace};

use super::{Roster, RosterEntry, SourcePoll, TelemetrySource, TelemetryTick, preprocess_yaml};
use crate::types::SessionEpoch;
use crate::{PitlogError, Result};

/// One recorded poll.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReplayDocument {
    pub connected: bool,
    pub session_num: i32,
    pub session_time: f64,
    pub on_pit_road: Vec<bool>,
    pub lap: Vec<i32>,
    pub best_lap_time: Vec<f32>,
    pub drivers: Option<Vec<RosterEntry>>,
    pub session_info: Option<String>,
}

impl Default for ReplayDocument {
    fn default() -> Self {
        Self {
            connected: true,
            session_num: 0,
            session_time: 0.0,
            on_pit_road: Vec::new(),
            lap: Vec::new(),
            best_lap_time: Vec::new(),
            drivers: None,
            session_info: None,
        }
    }
}

/// A document with its roster already decoded.
#[derive(Debug)]
struct PendingTick {
    connected: bool,
    session_num: i32,
    session_time: f64,
    on_pit_road: Vec<bool>,
    lap: Vec<i32>,
    best_lap_time: Vec<f32>,
    roster: Option<Arc<Roster>>,
}

/// Replay source that plays back a tick log
pub struct ReplaySource {
    /// Documents not yet replayed
    documents: VecDeque<PendingTick>,

    /// Roster carried between documents
    roster: Arc<Roster>,

    /// Recorded spacing between ticks
    tick_spacing: Duration,

    /// Playback speed multiplier (1.0 = normal, 2.0 = double speed)
    speed: f64,

    /// Pacing interval, created on first poll
    interval: Option<Interval>,

    /// Ticks delivered so far
    ticks_replayed: u64,
}

impl ReplaySource {
    /// Open a tick log from disk.
    ///
    /// The whole file is parsed up front so a corrupt log fails before the
    /// logger starts.
    pub fn open<P: AsRef<Path>>(path: P, tick_spacing: Duration) -> Result<Self> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|e| PitlogError::file_error(path, e))?;
        let source = Self::from_yaml_str(&text, tick_spacing)?;

        info!("Opened tick log {}: {} ticks", path.display(), source.remaining());
        Ok(source)
    }

    /// Parse a tick log held in memory.
    pub fn from_yaml_str(text: &str, tick_spacing: Duration) -> Result<Self> {
        let cleaned = preprocess_yaml(text)?;
        let mut documents = Vec::new();

        for (index, doc) in serde_yaml_ng::Deserializer::from_str(&cleaned).enumerate() {
            let document = ReplayDocument::deserialize(doc).map_err(|e| {
                PitlogError::parse_error(format!("tick log document {index}"), e.to_string())
            })?;
            documents.push(document);
        }

        Self::from_documents(documents, tick_spacing)
    }

    /// Build a source from already-decoded documents.
    ///
    /// Embedded session-info dumps are parsed here, so a bad roster in any
    /// document fails before the first poll.
    pub fn from_documents(
        documents: impl IntoIterator<Item = ReplayDocument>,
        tick_spacing: Duration,
    ) -> Result<Self> {
        let documents = documents
            .into_iter()
            .enumerate()
            .map(|(index, document)| Self::resolve_roster(index, document))
            .collect::<Result<VecDeque<_>>>()?;

        Ok(Self {
            documents,
            roster: Arc::new(Roster::default()),
            tick_spacing,
            speed: 1.0,
            interval: None,
            ticks_replayed: 0,
        })
    }

    fn resolve_roster(index: usize, document: ReplayDocument) -> Result<PendingTick> {
        let roster = match (&document.session_info, document.drivers) {
            (Some(info), _) => Some(Roster::from_session_yaml(info).map_err(|e| {
                PitlogError::parse_error(format!("tick log document {index}"), e.to_string())
            })?),
            (None, Some(drivers)) => Some(Roster::from_entries(drivers)),
            (None, None) => None,
        };

        Ok(PendingTick {
            connected: document.connected,
            session_num: document.session_num,
            session_time: document.session_time,
            on_pit_road: document.on_pit_road,
            lap: document.lap,
            best_lap_time: document.best_lap_time,
            roster: roster.map(Arc::new),
        })
    }

    /// Set playback speed, clamped to 0.1x..100x.
    ///
    /// Non-finite or non-positive speeds are rejected.
    pub fn set_speed(&mut self, speed: f64) -> Result<()> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(PitlogError::config_error(format!(
                "playback speed must be a positive number, got {speed}"
            )));
        }
        self.speed = speed.clamp(0.1, 100.0);
        // Rebuilt with the new period on the next poll
        self.interval = None;

        debug!("Playback speed set to {}x", self.speed);
        Ok(())
    }

    /// Current playback speed
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Documents left to replay
    pub fn remaining(&self) -> usize {
        self.documents.len()
    }

    /// Ticks delivered so far
    pub fn ticks_replayed(&self) -> u64 {
        self.ticks_replayed
    }

    fn pacing(&mut self) -> Option<&mut Interval> {
        if self.tick_spacing.is_zero() {
            return None;
        }
        let period = self.tick_spacing.div_f64(self.speed);
        Some(self.interval.get_or_insert_with(|| {
            let mut interval = interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        }))
    }
}

#[async_trait::async_trait]
impl TelemetrySource for ReplaySource {
    async fn poll(&mut self) -> Result<SourcePoll> {
        let Some(document) = self.documents.pop_front() else {
            debug!("Reached end of replay after {} ticks", self.ticks_replayed);
            return Ok(SourcePoll::Finished);
        };

        if let Some(interval) = self.pacing() {
            interval.tick().await;
        }

        let PendingTick {
            connected,
            session_num,
            session_time,
            on_pit_road,
            lap,
            best_lap_time,
            roster,
        } = document;

        if let Some(roster) = roster {
            debug!("Roster updated: {} entries", roster.len());
            self.roster = roster;
        }

        if !connected {
            trace!("Replayed source dropout");
            return Ok(SourcePoll::Disconnected);
        }

        self.ticks_replayed += 1;
        trace!(
            "Tick {}: session={}, session_time={:.1}, cars={}",
            self.ticks_replayed,
            session_num,
            session_time,
            on_pit_road.len()
        );

        Ok(SourcePoll::Tick(TelemetryTick {
            session_num: SessionEpoch(session_num),
            session_time,
            on_pit_road,
            lap,
            best_lap_time,
            roster: Arc::clone(&self.roster),
        }))
    }

    fn poll_interval(&self) -> Duration {
        self.tick_spacing.div_f64(self.speed)
    }
}
