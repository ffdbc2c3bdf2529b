//! Error types for indicator-tracker

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    /// Input rejected before any write (percentage range, entity kind, month token, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TrackerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_json_error_converts() {
        let err: TrackerError = serde_json::from_str::<u8>("not a number").unwrap_err().into();
        assert!(matches!(err, TrackerError::Json(_)));
        assert!(err.to_string().starts_with("JSON error"));
    }

    #[test]
    fn test_validation_helper() {
        let err = TrackerError::validation("percentage out of range");
        assert_eq!(err.to_string(), "Validation error: percentage out of range");
    }
}
