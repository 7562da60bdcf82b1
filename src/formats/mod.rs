//! File format adapters
//!
//! Adapters for positional record files translated through a delta mapping.

pub mod records;

pub use records::{
    lift_file, translate_file, translate_record, translate_records, OutputPaths, RecordParseError, RecordView,
    Routing, TranslateOptions, TranslateStats,
};
