//! Session identity

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque session number reported by the telemetry source.
///
/// A change in value between two polls means a new session started.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionEpoch(pub i32);

impl fmt::Display for SessionEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session {}", self.0)
    }
}

/// A detected transition from one session to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionChange {
    pub old: SessionEpoch,
    pub new: SessionEpoch,
}
