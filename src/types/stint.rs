//! Stint state and emitted stint records

use chrono::{DateTime, Utc};

use super::car::{CarIndex, CarSnapshot, min_lap};

/// A stint that is currently running on track.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenStint {
    pub start_time: DateTime<Utc>,
    pub start_session_time: f64,
    pub start_lap: i32,
    /// Running minimum of valid best-lap samples seen during the stint
    pub best_lap_in_stint: Option<f64>,
    /// Last lap counter observed, used for projections and shutdown flush
    pub current_lap: i32,
    /// Last session time observed
    pub current_session_time: f64,
    pub team: String,
    pub driver: String,
    pub class: String,
}

impl OpenStint {
    /// Open a stint from the snapshot that first saw the car off pit road.
    pub fn start(snapshot: &CarSnapshot, now: DateTime<Utc>) -> Self {
        Self {
            start_time: now,
            start_session_time: snapshot.session_time,
            start_lap: snapshot.lap,
            best_lap_in_stint: snapshot.valid_best_lap(),
            current_lap: snapshot.lap,
            current_session_time: snapshot.session_time,
            team: snapshot.team_name.clone(),
            driver: snapshot.driver_name.clone(),
            class: snapshot.class_name.clone(),
        }
    }

    /// Fold a new snapshot into the running values.
    pub fn observe(&mut self, snapshot: &CarSnapshot) {
        self.best_lap_in_stint = min_lap(self.best_lap_in_stint, snapshot.valid_best_lap());
        self.current_lap = snapshot.lap;
        self.current_session_time = snapshot.session_time;
    }

    /// Seconds elapsed since the stint started.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> f64 {
        seconds_between(self.start_time, now)
    }

    /// Laps completed since the stint started, as last observed.
    pub fn laps_so_far(&self) -> i64 {
        i64::from(self.current_lap) - i64::from(self.start_lap)
    }

    /// Close the stint into an immutable record.
    pub fn close(
        self,
        car_index: CarIndex,
        end_time: DateTime<Utc>,
        end_session_time: f64,
        end_lap: i32,
        closed_by: StintClose,
    ) -> StintRecord {
        StintRecord {
            car_index,
            class: self.class,
            team: self.team,
            driver: self.driver,
            start_ts: self.start_time,
            end_ts: end_time,
            start_session_time: self.start_session_time,
            end_session_time,
            start_lap: self.start_lap,
            end_lap,
            duration_seconds: seconds_between(self.start_time, end_time),
            duration_laps: i64::from(end_lap) - i64::from(self.start_lap),
            best_lap_in_stint: self.best_lap_in_stint,
            closed_by,
        }
    }
}

/// Per-car stint state owned by the [`StintTracker`](crate::tracking::StintTracker).
#[derive(Debug, Clone, PartialEq)]
pub enum StintState {
    /// The car is on track with a stint in progress.
    Running(OpenStint),
    /// The car entered pit road; waiting for it to leave before a new stint opens.
    AwaitingExit,
}

impl StintState {
    /// The last observed pit-road flag.
    pub fn on_pit(&self) -> bool {
        matches!(self, StintState::AwaitingExit)
    }

    pub fn open_stint(&self) -> Option<&OpenStint> {
        match self {
            StintState::Running(stint) => Some(stint),
            StintState::AwaitingExit => None,
        }
    }
}

/// What ended a stint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StintClose {
    /// The car crossed onto pit road.
    PitEntry,
    /// The logger shut down while the car was on track; a partial stint.
    Shutdown,
}

/// Immutable summary of one completed stint.
#[derive(Debug, Clone, PartialEq)]
pub struct StintRecord {
    pub car_index: CarIndex,
    pub class: String,
    pub team: String,
    pub driver: String,
    pub start_ts: DateTime<Utc>,
    pub end_ts: DateTime<Utc>,
    pub start_session_time: f64,
    pub end_session_time: f64,
    pub start_lap: i32,
    pub end_lap: i32,
    pub duration_seconds: f64,
    /// `end_lap - start_lap`, kept as computed even when the counter went backwards
    pub duration_laps: i64,
    pub best_lap_in_stint: Option<f64>,
    pub closed_by: StintClose,
}

impl StintRecord {
    /// True when the lap counter went backwards over the stint.
    ///
    /// This happens when the simulator resets lap counters outside a detected
    /// session change. The record is still emitted unchanged. A zero-lap stint
    /// such as a drive-through is not a regression.
    pub fn laps_regressed(&self) -> bool {
        self.duration_laps < 0
    }
}

/// Wall-clock seconds between two timestamps, millisecond resolution.
pub fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snapshot(lap: i32, best: f32) -> CarSnapshot {
        CarSnapshot {
            car_index: 4,
            on_pit_road: false,
            lap,
            best_lap_time: best,
            session_time: 120.0,
            driver_name: "Ana Costa".to_string(),
            team_name: "Tortoise Racing".to_string(),
            class_name: "GT3".to_string(),
        }
    }

    #[test]
    fn close_computes_duration_and_laps() {
        let t0 = Utc.with_ymd_and_hms(2025, 6, 7, 12, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2025, 6, 7, 12, 5, 0).unwrap();

        let mut stint = OpenStint::start(&snapshot(1, -1.0), t0);
        stint.observe(&snapshot(3, 95.2));
        stint.observe(&snapshot(5, 94.8));

        let record = stint.close(4, t1, 420.0, 5, StintClose::PitEntry);
        assert_eq!(record.duration_seconds, 300.0);
        assert_eq!(record.duration_laps, 4);
        assert_eq!(record.best_lap_in_stint, Some(94.8f32 as f64));
        assert_eq!(record.team, "Tortoise Racing");
        assert!(!record.laps_regressed());
    }

    #[test]
    fn decreasing_lap_counter_is_preserved_and_flagged() {
        let t0 = Utc.with_ymd_and_hms(2025, 6, 7, 12, 0, 0).unwrap();
        let stint = OpenStint::start(&snapshot(12, -1.0), t0);
        let record = stint.close(4, t0, 120.0, 2, StintClose::PitEntry);
        assert_eq!(record.duration_laps, -10);
        assert!(record.laps_regressed());
    }

    #[test]
    fn zero_lap_stint_is_not_a_regression() {
        let t0 = Utc.with_ymd_and_hms(2025, 6, 7, 12, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2025, 6, 7, 12, 0, 40).unwrap();
        let stint = OpenStint::start(&snapshot(7, -1.0), t0);
        let record = stint.close(4, t1, 70.0, 7, StintClose::PitEntry);
        assert_eq!(record.duration_laps, 0);
        assert!(!record.laps_regressed());
    }

    #[test]
    fn awaiting_exit_reports_on_pit() {
        assert!(StintState::AwaitingExit.on_pit());
        assert!(StintState::AwaitingExit.open_stint().is_none());
    }
}
