//! Error types for record sources.

use std::fmt;

/// Errors from listing configuration records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordSourceError {
    /// The backing API could not be reached.
    Connection { details: String },
    /// The cache never completed its initial sync.
    Sync { details: String },
    /// A record snapshot could not be read or parsed.
    InvalidSnapshot { details: String },
    /// A label selector string could not be parsed.
    InvalidSelector { details: String },
}

impl fmt::Display for RecordSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection { details } => write!(f, "record source connection failed: {details}"),
            Self::Sync { details } => write!(f, "record source sync failed: {details}"),
            Self::InvalidSnapshot { details } => write!(f, "invalid record snapshot: {details}"),
            Self::InvalidSelector { details } => write!(f, "invalid label selector: {details}"),
        }
    }
}

impl std::error::Error for RecordSourceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_details() {
        let err = RecordSourceError::Sync {
            details: "timed out".to_string(),
        };
        assert_eq!(err.to_string(), "record source sync failed: timed out");
    }
}
