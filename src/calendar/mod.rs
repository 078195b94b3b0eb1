//! Calendar domain: data types, backend seam, and the scheduling logic that sits on top
//! of it (conflict detection, calendar resolution, deletion matching).

pub mod backend;
pub mod calendar_types;
pub mod calendar_validation;
pub mod conflict;
pub mod google;
pub mod matcher;
pub mod memory;
pub mod resolver;
pub mod service;

pub use backend::{create_backend, CalendarBackend};
pub use calendar_types::*;
pub use calendar_validation::*;
pub use service::CalendarService;

/// Failure taxonomy for calendar operations
#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    #[error("Could not understand the time '{0}'")]
    Parse(String),
    #[error("Invalid time range: {0}")]
    InvalidRange(String),
    #[error("Calendar '{name}' not found. Available: {}", available.join(", "))]
    CalendarNotFound { name: String, available: Vec<String> },
    #[error("Conflicts with '{}' starting {}", .0.summary, .0.start)]
    ConflictDetected(Box<ExistingEvent>),
    #[error("No event matching '{0}' was found")]
    NoMatchFound(String),
    #[error("Calendar backend error: {0}")]
    Backend(String),
}

impl CalendarError {
    /// Stable machine-readable name used in tool results.
    pub fn kind(&self) -> &'static str {
        match self {
            CalendarError::Parse(_) => "parse_error",
            CalendarError::InvalidRange(_) => "invalid_range",
            CalendarError::CalendarNotFound { .. } => "calendar_not_found",
            CalendarError::ConflictDetected(_) => "conflict_detected",
            CalendarError::NoMatchFound(_) => "no_match_found",
            CalendarError::Backend(_) => "backend_error",
        }
    }
}

impl From<reqwest::Error> for CalendarError {
    fn from(err: reqwest::Error) -> Self {
        CalendarError::Backend(err.to_string())
    }
}
