use std::fmt;

use super::Format;

/// Errors raised while reading a library through an adapter
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// Format-specific failure: missing columns, bad blobs, SQLite or CSV errors
    #[error("{format} error: {cause}")]
    Format {
        /// Source format
        format: Format,
        /// Description of the failure
        cause: String,
    },

    /// Rows of one spectrum are not contiguous or disagree on precursor columns
    #[error("{format}: ambiguous record grouping for {group:?} at row {row}")]
    AmbiguousRecordGrouping {
        /// Source format
        format: Format,
        /// Grouping key of the offending record
        group: String,
        /// 1-based data row number
        row: usize,
    },

    /// The file is not a recognized library format
    #[error("Unsupported library format: {0}")]
    UnsupportedFormat(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AdapterError {
    pub(crate) fn format(format: Format, cause: impl fmt::Display) -> Self {
        AdapterError::Format {
            format,
            cause: cause.to_string(),
        }
    }
}
