//! Handle to a spawned logger task

use std::sync::Arc;

use futures::{Stream, StreamExt, future};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::SessionSummary;
use crate::tracking::TotalsSnapshot;
use crate::types::{SessionChange, StintRecord};
use crate::{PitlogError, Result};

/// Notifications published by the logger task.
#[derive(Debug, Clone, PartialEq)]
pub enum LoggerEvent {
    /// A car entered pit road and its stint was committed.
    StintClosed(StintRecord),
    /// The session changed; outputs were archived and state reset.
    SessionChanged(SessionChange),
    /// Open stints were flushed into totals on shutdown.
    ShutdownFlush { partial_stints: usize },
}

/// Controls a logger running on a tokio task.
///
/// Dropping the handle cancels the task, which still commits open stints
/// before it exits.
pub struct LoggerHandle {
    task: Option<JoinHandle<Result<SessionSummary>>>,
    cancel: CancellationToken,
    events: broadcast::Sender<LoggerEvent>,
    standings: watch::Receiver<Option<Arc<TotalsSnapshot>>>,
}

impl LoggerHandle {
    pub(super) fn new(
        task: JoinHandle<Result<SessionSummary>>,
        cancel: CancellationToken,
        events: broadcast::Sender<LoggerEvent>,
        standings: watch::Receiver<Option<Arc<TotalsSnapshot>>>,
    ) -> Self {
        Self { task: Some(task), cancel, events, standings }
    }

    /// Events published after this call. Lagging subscribers skip what they missed.
    pub fn events(&self) -> impl Stream<Item = LoggerEvent> + Unpin + 'static {
        BroadcastStream::new(self.events.subscribe())
            .filter_map(|event| future::ready(event.ok()))
    }

    /// Projected standings, then the committed totals at shutdown.
    pub fn standings(&self) -> impl Stream<Item = Arc<TotalsSnapshot>> + Unpin + 'static {
        WatchStream::new(self.standings.clone()).filter_map(future::ready)
    }

    /// Latest published standings, if any.
    pub fn current_standings(&self) -> Option<Arc<TotalsSnapshot>> {
        self.standings.borrow().clone()
    }

    /// Ask the logger to stop after the tick in progress.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the logger to stop on its own.
    pub async fn join(mut self) -> Result<SessionSummary> {
        match self.task.take() {
            Some(task) => task.await?,
            None => Err(PitlogError::source_failed("logger task already joined")),
        }
    }

    /// Cancel and wait for the commit-on-exit flush.
    pub async fn shutdown(self) -> Result<SessionSummary> {
        self.cancel();
        self.join().await
    }
}

impl Drop for LoggerHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            debug!("Dropping logger handle, cancelling task");
        }
        self.cancel.cancel();
    }
}
