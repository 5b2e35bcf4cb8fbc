//! Unified error hierarchy for TrailRS
//!
//! The estimators never fail for a data-quality problem: a missing heart rate
//! or a pace outside the model's range is a `None`, not an error. The types
//! here cover the outer surfaces only (configuration, file import and sensor
//! stream construction).

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for all TrailRS operations
#[derive(Debug, Error)]
pub enum TrailRsError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Import errors
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// Malformed sensor stream
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    /// Data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while loading activity files
#[derive(Debug, Error)]
pub enum ImportError {
    /// Unsupported format
    #[error("Unsupported format for {path}")]
    UnsupportedFormat { path: PathBuf },

    /// Format-specific parsing error
    #[error("Parse error in {format}: {reason}")]
    Parse { format: String, reason: String },

    /// A record that can never be analysed
    #[error("Invalid record {id}: {reason}")]
    InvalidRecord { id: String, reason: String },
}

/// Sensor stream construction errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StreamError {
    /// The three sequences must have the same length
    #[error("Stream length mismatch: grade={grade}, altitude={altitude}, time={time}")]
    LengthMismatch {
        grade: usize,
        altitude: usize,
        time: usize,
    },

    /// Time must never go backwards
    #[error("Stream time decreases at sample {index}")]
    NonMonotonicTime { index: usize },
}

/// Result type alias for TrailRS operations
pub type Result<T> = std::result::Result<T, TrailRsError>;

impl TrailRsError {
    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TrailRsError::Import(ImportError::InvalidRecord { .. }) => ErrorSeverity::Warning,
            TrailRsError::Stream(_) => ErrorSeverity::Warning,
            TrailRsError::Validation(_) => ErrorSeverity::Warning,
            TrailRsError::Configuration(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Emit this error as a tracing event at the level of its severity
    pub fn log(&self) {
        if self.severity().to_tracing_level() == tracing::Level::WARN {
            tracing::warn!(error = %self, "Operation rejected");
        } else {
            tracing::error!(error = %self, severity = ?self.severity(), "Operation failed");
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            TrailRsError::Import(ImportError::UnsupportedFormat { path }) => {
                format!(
                    "Cannot read {}: use a .json or .csv activity file",
                    path.display()
                )
            }
            TrailRsError::Stream(StreamError::LengthMismatch { .. }) => {
                "Sensor stream is incomplete: grade, altitude and time must have the same number of samples"
                    .to_string()
            }
            TrailRsError::Configuration(reason) => {
                format!("Invalid configuration: {}", reason)
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical error requiring immediate attention
    Critical,
    /// Error that prevents the operation
    Error,
    /// Warning that doesn't prevent operation
    Warning,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
        }
    }
}
