//! Per-driver totals accumulated across stints

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use crate::types::{DriverKey, DriverTotals, OpenStint, StintRecord};

/// Totals in stable (team, driver) order.
pub type TotalsSnapshot = BTreeMap<DriverKey, DriverTotals>;

/// Running totals for every driver seen in the current session.
#[derive(Debug, Default, Clone)]
pub struct TotalsAccumulator {
    totals: TotalsSnapshot,
}

impl TotalsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore totals persisted by a previous run of the same session.
    ///
    /// Later rows for the same driver replace earlier ones.
    pub fn load(rows: impl IntoIterator<Item = (DriverKey, DriverTotals)>) -> Self {
        let totals: TotalsSnapshot = rows.into_iter().collect();
        debug!("Restored totals for {} drivers", totals.len());
        Self { totals }
    }

    /// Fold a closed stint into its driver's totals.
    pub fn on_stint_closed(&mut self, record: &StintRecord) {
        let key = DriverKey::new(&record.team, &record.driver);
        let entry = self.totals.entry(key).or_default();
        entry.add(record.duration_seconds, record.duration_laps, record.best_lap_in_stint);

        trace!(
            car = record.car_index,
            total_laps = entry.total_laps,
            "Totals updated for {} / {}",
            record.team,
            record.driver
        );
    }

    /// Totals plus the elapsed contribution of stints still on track.
    ///
    /// Works on a copy; the committed totals are untouched so nothing is
    /// counted twice once those stints actually close.
    pub fn snapshot_with_live_stints<'a>(
        &self,
        open_stints: impl IntoIterator<Item = &'a OpenStint>,
        now: DateTime<Utc>,
    ) -> TotalsSnapshot {
        let mut projected = self.totals.clone();
        for stint in open_stints {
            projected
                .entry(DriverKey::new(&stint.team, &stint.driver))
                .or_default()
                .add(stint.elapsed_seconds(now), stint.laps_so_far(), stint.best_lap_in_stint);
        }
        projected
    }

    /// Committed totals.
    pub fn totals(&self) -> &TotalsSnapshot {
        &self.totals
    }

    pub fn get(&self, key: &DriverKey) -> Option<&DriverTotals> {
        self.totals.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DriverKey, &DriverTotals)> {
        self.totals.iter()
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    pub fn clear(&mut self) {
        self.totals.clear();
    }
}
