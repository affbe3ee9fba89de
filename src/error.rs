//! Error types for the prayer engine.

use chrono::NaiveDate;

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Error type for core operations
///
/// Day-boundary rollover, travel expiry and a missing home base are modelled
/// as state, never as errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("Prayer schedule unavailable for {date}: {reason}")]
    ScheduleUnavailable { date: NaiveDate, reason: String },

    #[error("Heading sensor unavailable: {0}")]
    SensorUnavailable(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Invalid manual location: {0}")]
    InvalidManualLocation(String),
}

impl CoreError {
    pub fn schedule_unavailable(date: NaiveDate, reason: impl Into<String>) -> Self {
        CoreError::ScheduleUnavailable {
            date,
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Persistence(e.to_string())
    }
}
