use std::path::PathBuf;

use crate::json::JsonError;
use crate::text::TextError;

use super::IndexQuery;

/// Errors that can occur while building, loading or reading through an index
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// No entry matches the query
    #[error("No entry for {0}")]
    NotFound(IndexQuery),

    /// The side file failed its checksum or could not be parsed
    #[error("Corrupt index {}: {reason}", path.display())]
    CorruptIndex {
        /// Side file path
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error parsing a text library
    #[error("Text library error: {0}")]
    Text(#[from] TextError),

    /// Error parsing a JSON library
    #[error("JSON library error: {0}")]
    Json(#[from] JsonError),

    /// The source is neither a text nor a JSON library
    #[error("Unsupported format for indexing: {0}")]
    UnsupportedFormat(String),
}
