//! Capture Log Error Types

use thiserror::Error;

/// Errors raised while interpreting a record line
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordParseError {
    /// Direction token outside the four known values
    #[error("unknown direction token: {0}")]
    UnknownDirection(String),
}
