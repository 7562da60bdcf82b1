//! FastDeltaMap - genome coordinate translation through MUMmer delta alignments
//!
//! Decodes a delta file into an exact position-to-position mapping plus a
//! gap mapping for positions that fall inside indels, then streams a
//! tab-delimited record file (VCF and similar) through it.
//!
//! # Features
//!
//! - Query to reference or reference to query translation
//! - Forward and reverse-complement alignment blocks
//! - Gap anchors for positions inside insertions and deletions
//! - Support for compressed inputs (gzip, bzip2)
//!
//! # Example
//!
//! ```ignore
//! use fast_deltamap::{decode_file, translate_file, Orientation, OutputPaths, TranslateOptions};
//!
//! // Decode the delta file first; the mapping must be complete before translating
//! let delta = decode_file("assembly.delta".as_ref(), Orientation::QueryToReference)?;
//!
//! // Then stream the records
//! let outputs = OutputPaths::for_input("calls.vcf");
//! let stats = translate_file("calls.vcf", &outputs, &delta.mapping, &TranslateOptions::default())?;
//! ```

pub mod core;
pub mod formats;

// Re-export commonly used types
pub use crate::core::{
    decode, decode_bytes, decode_file, decode_reader, DecodeStats, DeltaFile, DeltaMapError,
    DeltaMapping, DeltaParseError, DeltaParseErrorKind, GapMap, Lookup, Orientation, Position,
    PositionMap,
};
pub use crate::formats::{
    lift_file, translate_file, translate_records, OutputPaths, RecordParseError, TranslateOptions,
    TranslateStats,
};
