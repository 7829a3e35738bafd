use std::path::PathBuf;

use thiserror::Error;

/// Main error type for corpex operations
#[derive(Error, Debug)]
pub enum CorpexError {
    #[error("index directory not found: {}", .0.display())]
    IndexDirMissing(PathBuf),

    #[error("no segments found in index")]
    NoSegments,

    #[error("failed to load segment {name}: {source}")]
    SegmentLoad {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("metadata CSV missing required column: {0}")]
    MissingColumn(String),

    #[error("document JSON not found: {}", .0.display())]
    DocumentNotFound(PathBuf),

    #[error("unreadable document JSON {}: {reason}", .path.display())]
    BadDocumentJson { path: PathBuf, reason: String },

    #[error("document has no indexable tokens: {0}")]
    EmptyDocument(String),

    #[error("slice produced no indexable documents")]
    EmptySlice,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for corpex operations
pub type Result<T> = std::result::Result<T, CorpexError>;

impl CorpexError {
    /// Check whether this error indicates index data that is absent rather
    /// than corrupt (callers may fall back to an empty index).
    pub fn is_missing_index(&self) -> bool {
        matches!(
            self,
            CorpexError::IndexDirMissing(_) | CorpexError::NoSegments
        )
    }
}
