//! The poll loop tying source, tracker, totals, rollover and sink together

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::LoggerConfig;
use crate::persistence::PersistenceSink;
use crate::source::{SourcePoll, TelemetrySource, TelemetryTick};
use crate::tracking::{RolloverManager, StintTracker, TotalsAccumulator, TotalsSnapshot};
use crate::types::{SessionChange, StintRecord, format_hms, seconds_between};
use crate::{PitlogError, Result};

mod handle;

pub use handle::{LoggerEvent, LoggerHandle};

/// Counters kept over the logger's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoggerStats {
    pub ticks: u64,
    pub stints_closed: u64,
    pub rollovers: u64,
    /// Car updates skipped because their telemetry was malformed
    pub skipped_cars: u64,
    pub persistence_errors: u64,
}

/// What a single tick changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutcome {
    pub session_change: Option<SessionChange>,
    pub closed: Vec<StintRecord>,
    pub skipped_cars: usize,
    /// Projected standings published this tick
    pub projection: Option<Arc<TotalsSnapshot>>,
}

/// Final state returned when the logger stops.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    /// Committed totals including the shutdown flush
    pub totals: TotalsSnapshot,
    /// Stints that were still on track at shutdown
    pub partial_stints: Vec<StintRecord>,
    pub stats: LoggerStats,
}

/// Owns all logger state; driven one tick at a time.
///
/// Use [`process_tick`](Self::process_tick) and [`finish`](Self::finish)
/// directly for synchronous driving, or [`spawn`](Self::spawn) to run the
/// poll loop on a tokio task.
pub struct PitLogger<S> {
    config: LoggerConfig,
    sink: S,
    tracker: StintTracker,
    totals: TotalsAccumulator,
    rollover: RolloverManager,
    last_projection: Option<DateTime<Utc>>,
    stats: LoggerStats,
    events: broadcast::Sender<LoggerEvent>,
    standings: watch::Sender<Option<Arc<TotalsSnapshot>>>,
}

impl<S: PersistenceSink> PitLogger<S> {
    /// Validate the config, prepare outputs and resume totals left by a
    /// previous run.
    pub fn new(config: LoggerConfig, mut sink: S) -> Result<Self> {
        config.validate()?;
        sink.initialize()?;
        let totals = TotalsAccumulator::load(sink.load_totals()?);
        if !totals.is_empty() {
            info!("Resumed totals for {} drivers", totals.len());
        }

        let (events, _) = broadcast::channel(config.event_capacity);
        let (standings, _) = watch::channel(None);

        Ok(Self {
            config,
            sink,
            tracker: StintTracker::new(),
            totals,
            rollover: RolloverManager::new(),
            last_projection: None,
            stats: LoggerStats::default(),
            events,
            standings,
        })
    }

    /// Apply one tick: rollover first, then every car's snapshot.
    pub fn process_tick(&mut self, tick: &TelemetryTick, now: DateTime<Utc>) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        self.stats.ticks += 1;

        if let Some(change) = self.rollover.observe(tick.session_num) {
            if let Err(e) = self.rollover.on_session_change(
                change,
                &mut self.tracker,
                &mut self.totals,
                &mut self.sink,
                now,
            ) {
                self.stats.persistence_errors += 1;
                error!("Rollover left outputs inconsistent: {e}");
            }
            self.stats.rollovers += 1;
            self.last_projection = Some(now);
            self.standings.send_replace(None);
            let _ = self.events.send(LoggerEvent::SessionChanged(change));
            outcome.session_change = Some(change);
        }

        for snapshot in tick.snapshots() {
            let snapshot = match snapshot {
                Ok(Some(snapshot)) => snapshot,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Skipping car this tick: {e}");
                    outcome.skipped_cars += 1;
                    continue;
                }
            };
            if let Some(record) = self.tracker.on_snapshot(&snapshot, now) {
                self.commit_stint(&record);
                outcome.closed.push(record);
            }
        }
        self.stats.skipped_cars += outcome.skipped_cars as u64;

        if self.projection_due(now) {
            outcome.projection = Some(self.project(now));
        }

        trace!(
            "Tick {}: {} cars, {} stints open",
            self.stats.ticks,
            tick.car_count(),
            self.tracker.open_stints().count()
        );
        outcome
    }

    fn commit_stint(&mut self, record: &StintRecord) {
        info!(
            car = record.car_index,
            "Stint end: {} / {}: {} laps, {}",
            record.team,
            record.driver,
            record.duration_laps,
            format_hms(record.duration_seconds)
        );

        if let Err(e) = self.sink.append_stint(record) {
            self.stats.persistence_errors += 1;
            error!("Failed to append stint: {e}");
        }
        self.totals.on_stint_closed(record);
        if let Err(e) = self.sink.write_totals(self.totals.totals()) {
            self.stats.persistence_errors += 1;
            error!("Failed to write totals: {e}");
        }

        self.stats.stints_closed += 1;
        let _ = self.events.send(LoggerEvent::StintClosed(record.clone()));
    }

    /// The first tick starts the projection clock.
    fn projection_due(&mut self, now: DateTime<Utc>) -> bool {
        let Some(last) = self.last_projection else {
            self.last_projection = Some(now);
            return false;
        };
        seconds_between(last, now) >= self.config.projection_interval().as_secs_f64()
    }

    /// Publish totals plus open-stint contributions. Never touches committed totals.
    fn project(&mut self, now: DateTime<Utc>) -> Arc<TotalsSnapshot> {
        self.last_projection = Some(now);
        let projected = Arc::new(
            self.totals.snapshot_with_live_stints(self.tracker.open_stints().map(|(_, s)| s), now),
        );

        if let Err(e) = self.sink.write_live_totals(&projected) {
            self.stats.persistence_errors += 1;
            warn!("Failed to write live totals: {e}");
        }
        info!("Projected standings for {} drivers", projected.len());
        for (key, totals) in projected.iter() {
            debug!("  {key}: {} laps, {}", totals.total_laps, format_hms(totals.total_time_seconds));
        }

        self.standings.send_replace(Some(Arc::clone(&projected)));
        projected
    }

    /// Commit every open stint into totals and rewrite the totals table.
    ///
    /// Partial stints only feed the totals; the stint log keeps pit-entry
    /// records exclusively. In-memory totals are updated even when the write
    /// fails.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Result<SessionSummary> {
        let partial_stints = self.tracker.close_all(now);
        for record in &partial_stints {
            debug!(
                car = record.car_index,
                "Flushing open stint for {} / {}: {:.1}s",
                record.team,
                record.driver,
                record.duration_seconds
            );
            self.totals.on_stint_closed(record);
        }
        info!("Flushed {} open stints into totals", partial_stints.len());

        let written = self.sink.write_totals(self.totals.totals());
        if written.is_err() {
            self.stats.persistence_errors += 1;
        }

        let totals = self.totals.totals().clone();
        self.standings.send_replace(Some(Arc::new(totals.clone())));
        let _ = self.events.send(LoggerEvent::ShutdownFlush { partial_stints: partial_stints.len() });

        written?;
        Ok(SessionSummary { totals, partial_stints, stats: self.stats })
    }

    /// Poll `source` until it finishes, fails for good, or `cancel` fires,
    /// then commit on exit.
    pub async fn run<P: TelemetrySource>(
        mut self,
        mut source: P,
        cancel: CancellationToken,
    ) -> Result<SessionSummary> {
        info!("Pit logger started (source polls every {:?})", source.poll_interval());
        let started = Instant::now();
        let connect_timeout = self.config.connect_timeout();
        let mut connected = false;
        let mut error_count = 0u32;
        let mut fatal = None;

        loop {
            // A tick already being processed is never interrupted
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Pit logger cancelled");
                    break;
                }
                result = source.poll() => result,
            };

            match result {
                Ok(SourcePoll::Tick(tick)) => {
                    if !connected {
                        info!("Telemetry source connected");
                        connected = true;
                    }
                    error_count = 0;
                    self.process_tick(&tick, Utc::now());
                }
                Ok(SourcePoll::Disconnected) => {
                    trace!("Telemetry source offline");
                    if !connected && started.elapsed() >= connect_timeout {
                        fatal = Some(PitlogError::NotConnected { waited: started.elapsed() });
                        break;
                    }
                }
                Ok(SourcePoll::Finished) => {
                    info!("Telemetry source finished after {} ticks", self.stats.ticks);
                    if !connected {
                        fatal = Some(PitlogError::NotConnected { waited: started.elapsed() });
                    }
                    break;
                }
                Err(e) if e.is_retryable() => {
                    error_count += 1;
                    warn!("Source error ({error_count}): {e}");
                    if !connected && started.elapsed() >= connect_timeout {
                        fatal = Some(PitlogError::NotConnected { waited: started.elapsed() });
                        break;
                    }

                    // Exponential backoff: 50ms, 100ms, 200ms, ... capped at 1.6s
                    let backoff = std::time::Duration::from_millis(50 * (1 << error_count.min(5)));
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            info!("Pit logger cancelled during backoff");
                            break;
                        }
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
                Err(e) => {
                    error!("Unrecoverable source error: {e}");
                    fatal = Some(e);
                    break;
                }
            }
        }

        let summary = self.finish(Utc::now());
        match fatal {
            Some(e) => {
                for suggestion in e.recovery_suggestions() {
                    info!("  - {suggestion}");
                }
                Err(e)
            }
            None => {
                info!("Pit logger stopped ({} stints closed)", self.stats.stints_closed);
                summary
            }
        }
    }

    /// Run the poll loop on a tokio task.
    pub fn spawn<P: TelemetrySource>(self, source: P) -> LoggerHandle {
        let cancel = CancellationToken::new();
        let events = self.events.clone();
        let standings = self.standings.subscribe();
        let task = tokio::spawn(self.run(source, cancel.clone()));
        LoggerHandle::new(task, cancel, events, standings)
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    pub fn tracker(&self) -> &StintTracker {
        &self.tracker
    }

    pub fn totals(&self) -> &TotalsAccumulator {
        &self.totals
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn stats(&self) -> LoggerStats {
        self.stats
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LoggerEvent> {
        self.events.subscribe()
    }
}
