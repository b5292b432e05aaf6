//! Fan-out of every write to a primary sink and a mirror

use std::path::PathBuf;

use tracing::warn;

use super::PersistenceSink;
use crate::Result;
use crate::tracking::TotalsSnapshot;
use crate::types::{DriverKey, DriverTotals, StintRecord};

/// Writes to `primary` first, then to `mirror`.
///
/// A mirror failure never stops the primary write. When both fail the
/// primary's error is returned. Totals are only ever loaded from the primary.
#[derive(Debug)]
pub struct MirroredSink<P, M> {
    primary: P,
    mirror: M,
}

impl<P: PersistenceSink, M: PersistenceSink> MirroredSink<P, M> {
    pub fn new(primary: P, mirror: M) -> Self {
        Self { primary, mirror }
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    pub fn mirror(&self) -> &M {
        &self.mirror
    }
}

/// Primary error first, then the mirror's.
fn combine(what: &str, primary: Result<()>, mirror: Result<()>) -> Result<()> {
    match (primary, mirror) {
        (Err(e), Err(m)) => {
            warn!("Mirror also failed to {what}: {m}");
            Err(e)
        }
        (primary, mirror) => primary.and(mirror),
    }
}

impl<P: PersistenceSink, M: PersistenceSink> PersistenceSink for MirroredSink<P, M> {
    fn initialize(&mut self) -> Result<()> {
        combine("initialize", self.primary.initialize(), self.mirror.initialize())
    }

    fn reset(&mut self) -> Result<()> {
        combine("reset", self.primary.reset(), self.mirror.reset())
    }

    fn append_stint(&mut self, record: &StintRecord) -> Result<()> {
        let primary = self.primary.append_stint(record);
        combine("append stint", primary, self.mirror.append_stint(record))
    }

    fn write_totals(&mut self, totals: &TotalsSnapshot) -> Result<()> {
        let primary = self.primary.write_totals(totals);
        combine("write totals", primary, self.mirror.write_totals(totals))
    }

    fn load_totals(&self) -> Result<Vec<(DriverKey, DriverTotals)>> {
        self.primary.load_totals()
    }

    /// Only the primary's archive decides whether outputs may be reset.
    fn archive(&mut self, suffix: &str) -> Result<Vec<PathBuf>> {
        let mut archived = self.primary.archive(suffix)?;
        match self.mirror.archive(suffix) {
            Ok(paths) => archived.extend(paths),
            Err(e) => warn!("Mirror failed to archive: {e}"),
        }
        Ok(archived)
    }

    fn write_live_totals(&mut self, projected: &TotalsSnapshot) -> Result<()> {
        self.primary.write_live_totals(projected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MemorySink, snapshot, t};
    use crate::tracking::StintTracker;

    fn closed_stint() -> StintRecord {
        let mut tracker = StintTracker::new();
        tracker.on_snapshot(&snapshot(1, false, 2), t(0));
        tracker.on_snapshot(&snapshot(1, true, 6), t(300)).unwrap()
    }

    #[test]
    fn writes_reach_both_sinks() {
        let mut sink = MirroredSink::new(MemorySink::default(), MemorySink::default());
        let record = closed_stint();
        sink.append_stint(&record).unwrap();
        sink.write_totals(&TotalsSnapshot::new()).unwrap();

        assert_eq!(sink.primary().stints, vec![record.clone()]);
        assert_eq!(sink.mirror().stints, vec![record]);
        assert!(sink.mirror().totals.is_some());
    }

    #[test]
    fn failing_mirror_still_lets_primary_write() {
        let mirror = MemorySink { fail_writes: true, ..Default::default() };
        let mut sink = MirroredSink::new(MemorySink::default(), mirror);

        assert!(sink.append_stint(&closed_stint()).is_err());
        assert_eq!(sink.primary().stints.len(), 1);

        // Archiving is judged by the primary alone
        assert_eq!(sink.archive("20250607_120500").unwrap().len(), 1);
        assert_eq!(sink.primary().archives.len(), 1);
    }

    #[test]
    fn projections_skip_the_mirror() {
        let mut sink = MirroredSink::new(MemorySink::default(), MemorySink::default());
        sink.write_live_totals(&TotalsSnapshot::new()).unwrap();
        assert_eq!(sink.primary().live_writes, 1);
        assert_eq!(sink.mirror().live_writes, 0);
    }
}
