//! Core types for stint tracking.
//!
//! ## Lifecycle
//!
//! - [`CarSnapshot`] is produced once per car per poll tick and dropped after use
//! - [`StintState`] lives in the tracker for as long as the car has been seen on track
//! - [`StintRecord`] is emitted when a stint closes and never changes afterwards
//! - [`DriverTotals`] accumulate records per [`DriverKey`] until the next rollover
//! - [`SessionEpoch`] identifies the session; a new value triggers a rollover

mod car;
mod format;
mod session;
mod stint;
mod totals;

pub use car::{CarIndex, CarSnapshot, UNKNOWN_CLASS, min_lap, valid_lap_time};
pub use format::{archive_suffix, format_hms, format_min_sec, format_timestamp};
pub use session::{SessionChange, SessionEpoch};
pub use stint::{OpenStint, StintClose, StintRecord, StintState, seconds_between};
pub use totals::{DriverKey, DriverTotals};
