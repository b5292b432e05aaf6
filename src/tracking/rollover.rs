//! Session rollover detection and reset

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use super::{StintTracker, TotalsAccumulator};
use crate::Result;
use crate::persistence::PersistenceSink;
use crate::types::{SessionChange, SessionEpoch, archive_suffix};

/// Tracks the current session number and resets everything when it changes.
#[derive(Debug, Default, Clone)]
pub struct RolloverManager {
    current: Option<SessionEpoch>,
}

impl RolloverManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare the epoch reported this tick against the current one.
    ///
    /// The first epoch ever seen is adopted silently so a restart into the
    /// same session keeps its resumed totals.
    pub fn observe(&mut self, epoch: SessionEpoch) -> Option<SessionChange> {
        match self.current.replace(epoch) {
            None => {
                info!("Tracking {epoch}");
                None
            }
            Some(old) if old != epoch => Some(SessionChange { old, new: epoch }),
            Some(_) => None,
        }
    }

    pub fn current(&self) -> Option<SessionEpoch> {
        self.current
    }

    /// Archive outputs, forget every car and driver, then write fresh headers.
    ///
    /// The in-memory reset always happens. Outputs are only re-initialized
    /// once the archive succeeded; after a failed archive they are left in
    /// place so nothing is overwritten before it was moved aside.
    pub fn on_session_change(
        &self,
        change: SessionChange,
        tracker: &mut StintTracker,
        totals: &mut TotalsAccumulator,
        sink: &mut dyn PersistenceSink,
        now: DateTime<Utc>,
    ) -> Result<()> {
        info!("Session changed from {} to {}, rolling over logs", change.old, change.new);

        let archived = sink.archive(&archive_suffix(now));

        let dropped = tracker.open_stints().count();
        if dropped > 0 {
            warn!("Discarding {dropped} open stints from {}", change.old);
        }
        tracker.clear();
        totals.clear();

        match archived {
            Ok(paths) => {
                for path in &paths {
                    info!("Archived {}", path.display());
                }
                sink.reset().inspect_err(|e| error!("Failed to re-initialize logs: {e}"))
            }
            Err(e) => {
                error!("Failed to archive logs, keeping {} outputs in place: {e}", change.old);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::CsvSink;
    use crate::test_utils::{MemorySink, snapshot};
    use chrono::{TimeDelta, TimeZone};
    use std::fs;
    use tempfile::TempDir;

    fn t(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 7, 12, 0, 0).unwrap() + TimeDelta::seconds(seconds)
    }

    #[test]
    fn first_epoch_is_adopted() {
        let mut rollover = RolloverManager::new();
        assert_eq!(rollover.observe(SessionEpoch(4)), None);
        assert_eq!(rollover.observe(SessionEpoch(4)), None);
        assert_eq!(
            rollover.observe(SessionEpoch(5)),
            Some(SessionChange { old: SessionEpoch(4), new: SessionEpoch(5) })
        );
        assert_eq!(rollover.current(), Some(SessionEpoch(5)));
    }

    #[test]
    fn mid_stint_change_resets_everything() {
        let mut rollover = RolloverManager::new();
        let mut tracker = StintTracker::new();
        let mut totals = TotalsAccumulator::new();
        let mut sink = MemorySink::default();

        rollover.observe(SessionEpoch(1));
        tracker.on_snapshot(&snapshot(0, false, 1), t(0));
        if let Some(r) = tracker.on_snapshot(&snapshot(0, true, 4), t(200)) {
            totals.on_stint_closed(&r);
        }
        tracker.on_snapshot(&snapshot(0, false, 4), t(220));
        tracker.on_snapshot(&snapshot(1, false, 2), t(220));

        let change = rollover.observe(SessionEpoch(2)).unwrap();
        rollover.on_session_change(change, &mut tracker, &mut totals, &mut sink, t(300)).unwrap();

        assert!(tracker.is_empty());
        assert!(totals.is_empty());
        assert_eq!(sink.archives, vec!["20250607_120500".to_string()]);
        assert_eq!(sink.resets, 1);
    }

    #[test]
    fn rollover_then_snapshot_matches_cold_start() {
        let rollover = RolloverManager::new();
        let mut tracker = StintTracker::new();
        let mut totals = TotalsAccumulator::new();
        let mut sink = MemorySink::default();
        tracker.on_snapshot(&snapshot(0, false, 10), t(0));
        let change = SessionChange { old: SessionEpoch(1), new: SessionEpoch(2) };

        for _ in 0..2 {
            rollover.on_session_change(change, &mut tracker, &mut totals, &mut sink, t(5)).unwrap();
            assert!(tracker.is_empty());
            assert!(totals.is_empty());
        }

        let mut cold = StintTracker::new();
        tracker.on_snapshot(&snapshot(0, false, 0), t(10));
        cold.on_snapshot(&snapshot(0, false, 0), t(10));
        assert_eq!(tracker.state(0), cold.state(0));

        let warm_record = tracker.on_snapshot(&snapshot(0, true, 3), t(100));
        let cold_record = cold.on_snapshot(&snapshot(0, true, 3), t(100));
        assert_eq!(warm_record, cold_record);
        assert_eq!(warm_record.unwrap().duration_laps, 3);
    }

    #[test]
    fn sink_failure_still_resets_memory() {
        let rollover = RolloverManager::new();
        let mut tracker = StintTracker::new();
        let mut totals = TotalsAccumulator::new();
        let mut sink = MemorySink { fail_writes: true, ..Default::default() };
        tracker.on_snapshot(&snapshot(0, false, 1), t(0));

        let change = SessionChange { old: SessionEpoch(0), new: SessionEpoch(1) };
        let result = rollover.on_session_change(change, &mut tracker, &mut totals, &mut sink, t(9));

        assert!(result.is_err());
        assert!(tracker.is_empty());
        assert_eq!(sink.resets, 0);
    }

    #[test]
    fn failed_archive_leaves_outputs_untouched() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, "").unwrap();
        let mut sink = CsvSink::new(
            dir.path().join("pitstop_log.csv"),
            dir.path().join("driver_times.csv"),
            blocker.join("RaceLogs"),
        );
        sink.initialize().unwrap();

        let rollover = RolloverManager::new();
        let mut tracker = StintTracker::new();
        let mut totals = TotalsAccumulator::new();
        tracker.on_snapshot(&snapshot(0, false, 1), t(0));
        let record = tracker.on_snapshot(&snapshot(0, true, 5), t(240)).unwrap();
        sink.append_stint(&record).unwrap();
        totals.on_stint_closed(&record);
        sink.write_totals(totals.totals()).unwrap();

        let change = SessionChange { old: SessionEpoch(3), new: SessionEpoch(4) };
        let result =
            rollover.on_session_change(change, &mut tracker, &mut totals, &mut sink, t(300));

        assert!(result.is_err());
        assert!(tracker.is_empty());
        assert!(totals.is_empty());
        assert_eq!(fs::read_to_string(sink.stint_log_path()).unwrap().lines().count(), 2);
        assert_eq!(fs::read_to_string(sink.totals_path()).unwrap().lines().count(), 2);
        assert!(!blocker.join("RaceLogs").exists());
    }
}
