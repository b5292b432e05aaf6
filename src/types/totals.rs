//! Per-driver accumulated totals

use std::fmt;

use serde::{Deserialize, Serialize};

use super::car::min_lap;

/// Totals are keyed by team and driver so that shared cars split correctly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DriverKey {
    pub team: String,
    pub driver: String,
}

impl DriverKey {
    pub fn new(team: impl Into<String>, driver: impl Into<String>) -> Self {
        Self { team: team.into(), driver: driver.into() }
    }
}

impl fmt::Display for DriverKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.team, self.driver)
    }
}

/// Running totals for one driver within a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriverTotals {
    pub total_time_seconds: f64,
    pub total_laps: i64,
    /// Fastest lap seen across all stints; `None` until a valid lap exists
    pub best_lap_seconds: Option<f64>,
}

impl DriverTotals {
    /// Add one stint's contribution.
    pub fn add(&mut self, seconds: f64, laps: i64, best_lap: Option<f64>) {
        self.total_time_seconds += seconds;
        self.total_laps += laps;
        self.best_lap_seconds = min_lap(self.best_lap_seconds, best_lap);
    }

    /// Average seconds per lap, zero when no laps are recorded.
    pub fn average_lap_seconds(&self) -> f64 {
        if self.total_laps != 0 { self.total_time_seconds / self.total_laps as f64 } else { 0.0 }
    }
}
