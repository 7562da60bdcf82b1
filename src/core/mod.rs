//! Core coordinate mapping functionality
//!
//! This module contains the delta decoder, the position maps it builds,
//! and the input layer shared by both phases.

pub mod delta;
mod error;
pub mod io;
mod position;

pub use delta::{
    decode, decode_bytes, decode_file, decode_reader, AlignmentBlock, AlignmentHeader,
    DeltaFile, DeltaParseError, DeltaParseErrorKind, DeltaPreamble,
};
pub use error::{DeltaMapError, Result};
pub use io::{
    detect_compression, open_input, ByteLineIterator, CompressionFormat, LineIterator, MappedReader, PlainReader,
    DEFAULT_BUFFER_SIZE, MMAP_THRESHOLD,
};
pub use position::{
    direction, DecodeStats, DeltaMapping, Direction, GapMap, Lookup, Orientation, Position,
    PositionMap,
};
