//! Driver roster lookup
//!
//! The roster maps car indices to the team, driver and class names shown in
//! the simulator's session info. Entries use the simulator's PascalCase keys so
//! the `DriverInfo.Drivers` list of a session-info dump can be read directly.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::CarIndex;
use crate::{PitlogError, Result};

/// One entry of the driver roster.
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
#[serde(default)]
pub struct RosterEntry {
    /// Car index number
    pub car_idx: i32,
    /// Driver name
    pub user_name: String,
    /// Team name, absent in single-driver sessions
    pub team_name: Option<String>,
    /// Car class short name
    pub car_class_short_name: Option<String>,
    /// Whether this is the pace car
    pub car_is_pace_car: Option<i32>,
    /// Whether this entry is a spectator slot
    pub is_spectator: Option<i32>,
}

impl RosterEntry {
    /// Pace cars and spectator slots never run stints.
    pub fn is_competitor(&self) -> bool {
        self.car_is_pace_car.unwrap_or(0) == 0 && self.is_spectator.unwrap_or(0) == 0
    }

    /// Team name as reported, blank included. Entries without the key at
    /// all fall back to the driver name.
    pub fn team(&self) -> &str {
        self.team_name.as_deref().unwrap_or(&self.user_name)
    }
}

/// Car index to roster entry lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Roster {
    entries: HashMap<CarIndex, RosterEntry>,
}

impl Roster {
    /// Build a roster from a list of entries; negative car indices are dropped.
    pub fn from_entries(entries: impl IntoIterator<Item = RosterEntry>) -> Self {
        let entries = entries
            .into_iter()
            .filter_map(|entry| usize::try_from(entry.car_idx).ok().map(|idx| (idx, entry)))
            .collect();
        Self { entries }
    }

    /// Parse the `DriverInfo.Drivers` list out of a session-info YAML document.
    pub fn from_session_yaml(yaml: &str) -> Result<Self> {
        #[derive(Deserialize)]
        #[serde(rename_all = "PascalCase")]
        struct SessionDoc {
            #[serde(default)]
            driver_info: Option<DriverInfo>,
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "PascalCase")]
        struct DriverInfo {
            #[serde(default)]
            drivers: Vec<RosterEntry>,
        }

        let cleaned = preprocess_yaml(yaml)?;
        let doc: SessionDoc = serde_yaml_ng::from_str(&cleaned)
            .map_err(|e| PitlogError::parse_error("Session info roster", e.to_string()))?;

        Ok(Self::from_entries(doc.driver_info.map(|info| info.drivers).unwrap_or_default()))
    }

    pub fn get(&self, car_index: CarIndex) -> Option<&RosterEntry> {
        self.entries.get(&car_index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Strip control characters the simulator leaks into its YAML output.
///
/// Newline, carriage return and tab are kept. Fails if nothing but whitespace
/// remains.
pub fn preprocess_yaml(yaml: &str) -> Result<String> {
    let cleaned: String = yaml
        .chars()
        .filter(|ch| !matches!(ch, '\x00'..='\x08' | '\x0B'..='\x0C' | '\x0E'..='\x1F'))
        .collect();

    if cleaned.trim().is_empty() {
        return Err(PitlogError::parse_error(
            "YAML preprocessing",
            "YAML is empty after preprocessing",
        ));
    }

    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SESSION_YAML: &str = "\
WeekendInfo:
  TrackName: spa 2024 gp
DriverInfo:
  DriverCarIdx: 1
  Drivers:
  - CarIdx: 0
    UserName: Pace Car
    CarIsPaceCar: 1
  - CarIdx: 1
    UserName: Ana Costa
    TeamName: Tortoise Racing
    CarClassShortName: GT3
  - CarIdx: 2
    UserName: Ben Ode
    TeamName: ''
    CarClassShortName: LMP2
";

    #[test]
    fn parses_drivers_from_session_info() {
        let roster = Roster::from_session_yaml(SESSION_YAML).unwrap();
        assert_eq!(roster.len(), 3);

        let ana = roster.get(1).unwrap();
        assert_eq!(ana.user_name, "Ana Costa");
        assert_eq!(ana.team(), "Tortoise Racing");
        assert_eq!(ana.car_class_short_name.as_deref(), Some("GT3"));
        assert!(ana.is_competitor());

        assert!(!roster.get(0).unwrap().is_competitor());
        // Blank team names are kept so totals keys match earlier tables
        assert_eq!(roster.get(2).unwrap().team(), "");
        assert_eq!(
            RosterEntry { user_name: "Solo".into(), ..Default::default() }.team(),
            "Solo"
        );
        assert!(roster.get(9).is_none());
    }

    #[test]
    fn session_without_driver_info_is_empty() {
        let roster = Roster::from_session_yaml("WeekendInfo:\n  TrackName: x\n").unwrap();
        assert!(roster.is_empty());
    }

    #[test]
    fn preprocess_removes_control_characters() {
        let input = "DriverInfo:\n\x00\x01  Drivers: []\x03\r\n\t";
        let result = preprocess_yaml(input).unwrap();
        assert!(!result.contains('\x00'));
        assert!(!result.contains('\x03'));
        assert!(result.contains('\r'));
        assert!(result.contains('\t'));
    }

    #[test]
    fn preprocess_rejects_blank_input() {
        assert!(preprocess_yaml("\x00\x01  \n").is_err());
    }

    #[test]
    fn negative_car_indices_are_dropped() {
        let roster = Roster::from_entries(vec![RosterEntry {
            car_idx: -1,
            user_name: "ghost".into(),
            ..Default::default()
        }]);
        assert!(roster.is_empty());
    }
}
