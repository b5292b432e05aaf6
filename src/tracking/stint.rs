//! Per-car stint state machine

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::types::{
    CarIndex, CarSnapshot, OpenStint, StintClose, StintRecord, StintState, format_min_sec,
};

/// Watches pit-road occupancy per car and emits a [`StintRecord`] on every pit entry.
///
/// A car only gets state once it has been seen off pit road; cars sitting in
/// the pits at startup are ignored until they leave.
#[derive(Debug, Default)]
pub struct StintTracker {
    cars: HashMap<CarIndex, StintState>,
    pit_counts: HashMap<CarIndex, u32>,
}

impl StintTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one car's snapshot into its state, returning a record on pit entry.
    pub fn on_snapshot(
        &mut self,
        snapshot: &CarSnapshot,
        now: DateTime<Utc>,
    ) -> Option<StintRecord> {
        let idx = snapshot.car_index;

        let state = match self.cars.entry(idx) {
            Entry::Vacant(slot) => {
                if !snapshot.on_pit_road {
                    debug!(car = idx, lap = snapshot.lap, "Stint opened for {}", snapshot.driver_name);
                    slot.insert(StintState::Running(OpenStint::start(snapshot, now)));
                }
                return None;
            }
            Entry::Occupied(slot) => slot.into_mut(),
        };

        if snapshot.on_pit_road == state.on_pit() {
            if let StintState::Running(stint) = state {
                stint.observe(snapshot);
            }
            return None;
        }

        match std::mem::replace(state, StintState::AwaitingExit) {
            StintState::Running(mut stint) => {
                stint.observe(snapshot);
                let record = stint.close(
                    idx,
                    now,
                    snapshot.session_time,
                    snapshot.lap,
                    StintClose::PitEntry,
                );
                *self.pit_counts.entry(idx).or_default() += 1;

                if record.laps_regressed() {
                    warn!(
                        car = idx,
                        start_lap = record.start_lap,
                        end_lap = record.end_lap,
                        "Lap counter went backwards over stint; recording {} laps",
                        record.duration_laps
                    );
                }
                debug!(
                    car = idx,
                    laps = record.duration_laps,
                    "Pit entry closed stint after {}",
                    format_min_sec(record.duration_seconds)
                );
                Some(record)
            }
            StintState::AwaitingExit => {
                debug!(car = idx, lap = snapshot.lap, "Pit exit opened stint");
                *state = StintState::Running(OpenStint::start(snapshot, now));
                None
            }
        }
    }

    /// Close every running stint as a partial [`StintClose::Shutdown`] record.
    ///
    /// Records come back ordered by car index and the tracker is left empty.
    pub fn close_all(&mut self, now: DateTime<Utc>) -> Vec<StintRecord> {
        let mut cars: Vec<_> = self.cars.drain().collect();
        cars.sort_by_key(|(idx, _)| *idx);
        self.pit_counts.clear();

        cars.into_iter()
            .filter_map(|(idx, state)| match state {
                StintState::Running(stint) => {
                    let (session_time, lap) = (stint.current_session_time, stint.current_lap);
                    Some(stint.close(idx, now, session_time, lap, StintClose::Shutdown))
                }
                StintState::AwaitingExit => None,
            })
            .collect()
    }

    /// Stints currently running, in no particular order.
    pub fn open_stints(&self) -> impl Iterator<Item = (CarIndex, &OpenStint)> + '_ {
        self.cars.iter().filter_map(|(idx, state)| state.open_stint().map(|s| (*idx, s)))
    }

    pub fn state(&self, car_index: CarIndex) -> Option<&StintState> {
        self.cars.get(&car_index)
    }

    /// Pit entries seen for a car since the last reset.
    pub fn pit_count(&self, car_index: CarIndex) -> u32 {
        self.pit_counts.get(&car_index).copied().unwrap_or(0)
    }

    /// Number of cars with state.
    pub fn tracked_cars(&self) -> usize {
        self.cars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cars.is_empty() && self.pit_counts.is_empty()
    }

    /// Forget every car.
    pub fn clear(&mut self) {
        self.cars.clear();
        self.pit_counts.clear();
    }
}
