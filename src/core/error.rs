//! Error types for FastDeltaMap
//!
//! Top-level error aggregating the decode and translate phases.

use crate::core::delta::DeltaParseError;
use crate::formats::records::RecordParseError;
use thiserror::Error;

/// Main error type for FastDeltaMap operations
#[derive(Debug, Error)]
pub enum DeltaMapError {
    /// Delta file decoding errors (always fatal)
    #[error("Delta parse error: {0}")]
    Delta(#[from] DeltaParseError),

    /// Positional record errors
    #[error("Record error: {0}")]
    Record(#[from] RecordParseError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for FastDeltaMap operations
pub type Result<T> = std::result::Result<T, DeltaMapError>;
