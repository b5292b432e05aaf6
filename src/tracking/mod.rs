//! Stint tracking, totals accumulation and session rollover.
//!
//! All three components are plain synchronous state owned by one logger task.

mod rollover;
mod stint;
mod totals;

pub use rollover::RolloverManager;
pub use stint::StintTracker;
pub use totals::{TotalsAccumulator, TotalsSnapshot};
