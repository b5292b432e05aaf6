//! One poll of the telemetry source

use std::sync::Arc;

use crate::types::{CarIndex, CarSnapshot, SessionEpoch, UNKNOWN_CLASS};
use crate::{PitlogError, Result};

use super::Roster;

/// Everything the tracker needs from a single poll.
///
/// Per-car values are parallel arrays indexed by car index, mirroring how the
/// simulator exposes its `CarIdx*` telemetry variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryTick {
    pub session_num: SessionEpoch,
    pub session_time: f64,
    pub on_pit_road: Vec<bool>,
    pub lap: Vec<i32>,
    pub best_lap_time: Vec<f32>,
    /// Driver roster (shared between ticks until the source reports a new one)
    pub roster: Arc<Roster>,
}

impl TelemetryTick {
    /// Number of car slots present in this tick.
    pub fn car_count(&self) -> usize {
        self.on_pit_road.len()
    }

    /// Build the snapshot for one car.
    ///
    /// Returns `Ok(None)` for roster entries that never run stints (pace car,
    /// spectators) and an error when the car's arrays are inconsistent. Cars
    /// missing from the roster get placeholder names rather than being dropped.
    pub fn snapshot(&self, car_index: CarIndex) -> Result<Option<CarSnapshot>> {
        let on_pit_road = *self
            .on_pit_road
            .get(car_index)
            .ok_or_else(|| PitlogError::malformed_car(car_index, "index out of range"))?;
        let lap = *self
            .lap
            .get(car_index)
            .ok_or_else(|| PitlogError::malformed_car(car_index, "lap counter missing"))?;
        let best_lap_time = self.best_lap_time.get(car_index).copied().unwrap_or(-1.0);

        let (team_name, driver_name, class_name) = match self.roster.get(car_index) {
            Some(entry) if !entry.is_competitor() => return Ok(None),
            Some(entry) => (
                entry.team().to_string(),
                entry.user_name.clone(),
                entry.car_class_short_name.clone().unwrap_or_else(|| UNKNOWN_CLASS.to_string()),
            ),
            None => (
                CarSnapshot::placeholder_name(car_index),
                CarSnapshot::placeholder_name(car_index),
                UNKNOWN_CLASS.to_string(),
            ),
        };

        Ok(Some(CarSnapshot {
            car_index,
            on_pit_road,
            lap,
            best_lap_time,
            session_time: self.session_time,
            driver_name,
            team_name,
            class_name,
        }))
    }

    /// Snapshots for every car slot, in index order.
    pub fn snapshots(&self) -> impl Iterator<Item = Result<Option<CarSnapshot>>> + '_ {
        (0..self.car_count()).map(|idx| self.snapshot(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::RosterEntry;

    fn tick() -> TelemetryTick {
        TelemetryTick {
            session_num: SessionEpoch(2),
            session_time: 64.0,
            on_pit_road: vec![true, false, false],
            lap: vec![0, 7],
            best_lap_time: vec![-1.0, 88.25, 90.0],
            roster: Arc::new(Roster::from_entries(vec![
                RosterEntry {
                    car_idx: 0,
                    user_name: "Pace Car".into(),
                    car_is_pace_car: Some(1),
                    ..Default::default()
                },
                RosterEntry {
                    car_idx: 1,
                    user_name: "Ana Costa".into(),
                    team_name: Some("Tortoise Racing".into()),
                    car_class_short_name: Some("GT3".into()),
                    ..Default::default()
                },
            ])),
        }
    }

    #[test]
    fn pace_car_is_skipped() {
        assert_eq!(tick().snapshot(0).unwrap(), None);
    }

    #[test]
    fn roster_names_are_attached() {
        let snap = tick().snapshot(1).unwrap().unwrap();
        assert_eq!(snap.team_name, "Tortoise Racing");
        assert_eq!(snap.driver_name, "Ana Costa");
        assert_eq!(snap.class_name, "GT3");
        assert_eq!(snap.lap, 7);
        assert_eq!(snap.session_time, 64.0);
    }

    #[test]
    fn missing_lap_is_malformed() {
        let err = tick().snapshot(2).unwrap_err();
        assert!(matches!(err, PitlogError::MalformedCar { car_index: 2, .. }));
    }

    #[test]
    fn unlisted_car_gets_placeholder_names() {
        let mut t = tick();
        t.lap.push(3);
        let snap = t.snapshot(2).unwrap().unwrap();
        assert_eq!(snap.team_name, "Car 2");
        assert_eq!(snap.driver_name, "Car 2");
        assert_eq!(snap.class_name, UNKNOWN_CLASS);
    }

    #[test]
    fn out_of_range_index_is_malformed() {
        assert!(tick().snapshot(10).is_err());
        assert_eq!(tick().snapshots().count(), 3);
    }
}
