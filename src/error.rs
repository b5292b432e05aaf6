//! Error types for the stint logger.
//!
//! All errors implement the `std::error::Error` trait and carry enough context
//! to decide whether the poll loop should retry, skip a car, or stop.
//!
//! ## Error Categories
//!
//! - **Source Errors**: Telemetry source offline or returning bad data
//! - **Car Errors**: A single car's arrays or roster entry are malformed
//! - **Persistence Errors**: CSV files that cannot be read, written or archived,
//!   and SQLite mirror failures
//! - **Configuration Errors**: Invalid logger settings
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use pitlog::PitlogError;
//!
//! let error = PitlogError::source_failed("simulator not running");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for logger operations.
pub type Result<T, E = PitlogError> = std::result::Result<T, E>;

/// Main error type for logger operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PitlogError {
    #[error("Telemetry source not connected after {waited:?}")]
    NotConnected { waited: Duration },

    #[error("Telemetry source error: {reason}")]
    Source {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("File error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Database error in {path}")]
    Database {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Malformed telemetry for car {car_index}: {details}")]
    MalformedCar { car_index: usize, details: String },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("Logger task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl PitlogError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            PitlogError::Source { .. } => true,
            PitlogError::File { .. } => true,
            PitlogError::Csv { .. } => true,
            PitlogError::Database { .. } => true,
            PitlogError::MalformedCar { .. } => true,
            PitlogError::NotConnected { .. } => false,
            PitlogError::Parse { .. } => false,
            PitlogError::Config { .. } => false,
            PitlogError::Task(_) => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            PitlogError::NotConnected { .. } => vec![
                "Ensure the simulator is running and in a session",
                "Increase the connect timeout",
                "Check the replay file path",
            ],
            PitlogError::Source { .. } => vec![
                "Wait for the simulator to reconnect",
                "Check that telemetry output is enabled",
            ],
            PitlogError::File { .. } => vec![
                "Check the output directory exists and is writable",
                "Close spreadsheets holding the CSV file open",
                "Ensure sufficient disk space",
            ],
            PitlogError::Csv { .. } => vec![
                "Check the CSV header matches the expected columns",
                "Remove or archive a hand-edited totals file",
            ],
            PitlogError::Database { .. } => vec![
                "Check the database directory exists and is writable",
                "Close other programs holding the database locked",
            ],
            PitlogError::Parse { .. } => vec![
                "Verify the replay file is a YAML document stream",
                "Check array lengths match between fields",
            ],
            PitlogError::MalformedCar { .. } => vec![
                "The car is skipped for this tick and retried on the next",
            ],
            PitlogError::Config { .. } => vec![
                "Check the configuration file against the documented keys",
                "Use distinct paths for the stint log and totals table",
            ],
            PitlogError::Task(_) => vec![
                "Check the log for a panic in the logger task",
                "Totals were last committed at the previous stint close",
            ],
        }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PitlogError::File { path: path.into(), source }
    }

    /// Helper constructor for CSV errors with path context.
    pub fn csv_error(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        PitlogError::Csv { path: path.into(), source }
    }

    /// Helper constructor for SQLite errors with path context.
    pub fn database_error(path: impl Into<PathBuf>, source: rusqlite::Error) -> Self {
        PitlogError::Database { path: path.into(), source }
    }

    /// Helper constructor for transient source errors.
    pub fn source_failed(reason: impl Into<String>) -> Self {
        PitlogError::Source { reason: reason.into(), source: None }
    }

    /// Helper constructor for source errors with an underlying cause.
    pub fn source_failed_with(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        PitlogError::Source { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for parse errors.
    pub fn parse_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        PitlogError::Parse { context: context.into(), details: details.into() }
    }

    /// Helper constructor for a single car's malformed data.
    pub fn malformed_car(car_index: usize, details: impl Into<String>) -> Self {
        PitlogError::MalformedCar { car_index, details: details.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(reason: impl Into<String>) -> Self {
        PitlogError::Config { reason: reason.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn error_messages_carry_their_context(
            reason in ".*",
            car_index in 0usize..64,
            details in ".*",
            context in "\\w+"
        ) {
            let source = PitlogError::source_failed(reason.clone());
            let car = PitlogError::malformed_car(car_index, details.clone());
            let parse = PitlogError::parse_error(context.clone(), details.clone());

            prop_assert!(source.to_string().contains(&reason));
            prop_assert!(car.to_string().contains(&car_index.to_string()));
            prop_assert!(car.to_string().contains(&details));
            prop_assert!(parse.to_string().contains(&context));
        }
    }

    #[test]
    fn retry_classification_follows_taxonomy() {
        assert!(PitlogError::source_failed("offline").is_retryable());
        assert!(PitlogError::malformed_car(3, "lap missing").is_retryable());
        assert!(
            PitlogError::file_error("x.csv", std::io::Error::other("locked")).is_retryable()
        );
        assert!(!PitlogError::NotConnected { waited: Duration::from_secs(1) }.is_retryable());
        assert!(!PitlogError::parse_error("replay", "bad").is_retryable());
        assert!(!PitlogError::config_error("zero interval").is_retryable());
    }

    #[test]
    fn every_variant_has_suggestions() {
        let errors = vec![
            PitlogError::NotConnected { waited: Duration::from_secs(30) },
            PitlogError::source_failed("offline"),
            PitlogError::file_error("a.csv", std::io::Error::other("denied")),
            PitlogError::parse_error("replay", "bad"),
            PitlogError::database_error("race.db", rusqlite::Error::InvalidQuery),
            PitlogError::malformed_car(0, "missing"),
            PitlogError::config_error("bad"),
        ];
        for error in errors {
            let suggestions = error.recovery_suggestions();
            assert!(!suggestions.is_empty(), "no suggestions for {error}");
            assert!(suggestions.iter().all(|s| s.len() > 5));
        }
    }

    #[test]
    fn file_errors_name_their_path() {
        let io = std::io::Error::other("denied");
        let error = PitlogError::file_error("out/driver_times.csv", io);
        assert_eq!(error.to_string(), "File error: out/driver_times.csv");
    }

    #[test]
    fn source_chain_is_preserved() {
        let inner = std::io::Error::other("pipe closed");
        let error = PitlogError::source_failed_with("read failed", Box::new(inner));
        let source = std::error::Error::source(&error).expect("source should be set");
        assert_eq!(source.to_string(), "pipe closed");
    }

    #[test]
    fn error_is_send_sync_static() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<PitlogError>();
    }
}
