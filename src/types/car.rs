//! Per-car telemetry snapshot

/// Index of a car in the simulator's per-car arrays.
pub type CarIndex = usize;

/// Fallback class name used when a car has no roster entry.
pub const UNKNOWN_CLASS: &str = "Unknown";

/// One car's reading for a single poll tick.
///
/// Produced fresh each tick from a [`TelemetryTick`](crate::source::TelemetryTick)
/// and never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CarSnapshot {
    pub car_index: CarIndex,
    pub on_pit_road: bool,
    pub lap: i32,
    /// Best lap time in seconds; the simulator reports zero or negative values
    /// until a timed lap exists
    pub best_lap_time: f32,
    pub session_time: f64,
    pub driver_name: String,
    pub team_name: String,
    pub class_name: String,
}

impl CarSnapshot {
    /// Best lap time as seconds, if the sample is a usable lap time.
    pub fn valid_best_lap(&self) -> Option<f64> {
        valid_lap_time(self.best_lap_time)
    }

    /// Placeholder name used for both team and driver of an unlisted car.
    pub fn placeholder_name(car_index: CarIndex) -> String {
        format!("Car {car_index}")
    }
}

/// Filter out the simulator's "no time" sentinels (zero, negative, NaN).
pub fn valid_lap_time(seconds: f32) -> Option<f64> {
    (seconds.is_finite() && seconds > 0.0).then_some(seconds as f64)
}

/// Running minimum over optional lap times.
pub fn min_lap(current: Option<f64>, sample: Option<f64>) -> Option<f64> {
    match (current, sample) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_lap_times_are_ignored() {
        assert_eq!(valid_lap_time(-1.0), None);
        assert_eq!(valid_lap_time(0.0), None);
        assert_eq!(valid_lap_time(f32::NAN), None);
        assert_eq!(valid_lap_time(f32::INFINITY), None);
        assert_eq!(valid_lap_time(92.5), Some(92.5));
    }

    #[test]
    fn min_lap_keeps_the_fastest_known_time() {
        assert_eq!(min_lap(None, None), None);
        assert_eq!(min_lap(Some(90.0), None), Some(90.0));
        assert_eq!(min_lap(None, Some(91.0)), Some(91.0));
        assert_eq!(min_lap(Some(90.0), Some(89.5)), Some(89.5));
        assert_eq!(min_lap(Some(90.0), Some(95.0)), Some(90.0));
    }

    #[test]
    fn placeholder_uses_car_index() {
        assert_eq!(CarSnapshot::placeholder_name(7), "Car 7");
    }
}
