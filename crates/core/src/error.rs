use chrono::NaiveDate;
use std::fmt;

/// Required configuration is missing, empty or ambiguous. Raised before any network call.
#[derive(Debug, Clone)]
pub struct ConfigurationError {
    pub detail: String,
}

impl ConfigurationError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "configuration error: {}", self.detail)
    }
}

impl std::error::Error for ConfigurationError {}

#[derive(Debug, Clone)]
pub struct EmptyHistoryError {
    pub as_of: NaiveDate,
    pub window_start: NaiveDate,
    pub history_len: usize,
}

impl fmt::Display for EmptyHistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no history records in window {}..={} (history has {} rows)",
            self.window_start, self.as_of, self.history_len
        )
    }
}

impl std::error::Error for EmptyHistoryError {}

/// The first append landed but the second did not. Nothing is rolled back.
#[derive(Debug, Clone)]
pub struct PartialWriteError {
    pub written_range: String,
    pub failed_range: String,
    pub detail: String,
}

impl fmt::Display for PartialWriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "partial write: appended to '{}' but append to '{}' failed: {}",
            self.written_range, self.failed_range, self.detail
        )
    }
}

impl std::error::Error for PartialWriteError {}
