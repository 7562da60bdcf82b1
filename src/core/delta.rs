//! Delta alignment decoding
//!
//! Decodes MUMmer delta files into a [`DeltaMapping`].
//!
//! # Delta File Format
//!
//! ```text
//! /path/to/reference.fa /path/to/query.fa
//! NUCMER
//! >refName queryName refLength queryLength
//! refStart refEnd queryStart queryEnd errors simErrors stops
//! 5
//! -12
//! 0
//! refStart refEnd queryStart queryEnd errors simErrors stops
//! 0
//! ```
//!
//! - The two preamble lines name the aligned files and the program
//! - A `>` header names the reference and query sequences
//! - Each coordinate line opens a block; any number of blocks may share a header
//! - Coordinates are 1-based and inclusive; `start > end` means the block is
//!   walked backwards on that side
//! - Each run value `n` covers `|n| - 1` aligned bases followed by one base
//!   present only in the reference (`n > 0`) or only in the query (`n < 0`)
//! - `0` terminates the run list; the rest of the block aligns 1:1

use crate::core::io::{open_input, LineIterator};
use crate::core::position::{DeltaMapping, Direction, Orientation, Position};
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

/// Error type for delta file decoding
///
/// Carries the line number and, where useful, the offending content.
#[derive(Debug, Clone)]
pub struct DeltaParseError {
    /// Human-readable error message
    pub message: String,
    /// Line number where the error occurred (1-based)
    pub line_number: Option<usize>,
    /// The kind of error that occurred
    pub kind: DeltaParseErrorKind,
    /// The problematic content (if available)
    pub content: Option<String>,
}

/// Specific kinds of delta decoding errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaParseErrorKind {
    /// Malformed `>` header line
    InvalidHeader,
    /// Malformed or out-of-range coordinate line
    InvalidCoordinates,
    /// Failed to parse a numeric value
    InvalidNumber,
    /// Coordinate line before any `>` header
    MissingHeader,
    /// Input ended inside a run list
    UnexpectedEof,
    /// Reference and query sides of a block consumed different lengths
    LengthMismatch,
    /// Run values walked past the end of a block
    BlockOverrun,
    /// I/O error during reading
    IoError,
    /// File not found
    FileNotFound,
}

impl std::fmt::Display for DeltaParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line_number {
            Some(line) => write!(f, "Line {}: {}", line, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for DeltaParseError {}

impl DeltaParseError {
    pub fn with_context(
        message: impl Into<String>,
        line_number: usize,
        kind: DeltaParseErrorKind,
        content: Option<String>,
    ) -> Self {
        Self {
            message: message.into(),
            line_number: Some(line_number),
            kind,
            content,
        }
    }

    pub fn invalid_header(message: impl Into<String>, line_number: usize, content: &str) -> Self {
        Self::with_context(
            message,
            line_number,
            DeltaParseErrorKind::InvalidHeader,
            Some(content.chars().take(100).collect()),
        )
    }

    pub fn invalid_coordinates(message: impl Into<String>, line_number: usize, content: &str) -> Self {
        Self::with_context(
            message,
            line_number,
            DeltaParseErrorKind::InvalidCoordinates,
            Some(content.chars().take(100).collect()),
        )
    }

    pub fn invalid_number(field: &str, value: &str, line_number: usize) -> Self {
        Self::with_context(
            format!("Invalid {} value '{}': expected an integer", field, value),
            line_number,
            DeltaParseErrorKind::InvalidNumber,
            None,
        )
    }

    pub fn missing_header(line_number: usize, content: &str) -> Self {
        Self::with_context(
            "Coordinate line appears before any '>' alignment header",
            line_number,
            DeltaParseErrorKind::MissingHeader,
            Some(content.chars().take(100).collect()),
        )
    }

    pub fn unexpected_eof(block: &AlignmentBlock, line_number: usize) -> Self {
        Self::with_context(
            format!("Input ended before the '0' terminator of block {}", block),
            line_number,
            DeltaParseErrorKind::UnexpectedEof,
            None,
        )
    }

    /// Reference and query sides of a block do not agree in length
    pub fn length_mismatch(block: &AlignmentBlock, line_number: usize) -> Self {
        Self::with_context(
            format!("Invalid delta file: mismatched sequence lengths at {}", block),
            line_number,
            DeltaParseErrorKind::LengthMismatch,
            None,
        )
    }

    pub fn block_overrun(block: &AlignmentBlock, line_number: usize) -> Self {
        Self::with_context(
            format!("Run values walk past the end of block {}", block),
            line_number,
            DeltaParseErrorKind::BlockOverrun,
            None,
        )
    }

    pub fn file_not_found(path: &Path) -> Self {
        Self {
            message: format!("Delta file not found: {}", path.display()),
            line_number: None,
            kind: DeltaParseErrorKind::FileNotFound,
            content: None,
        }
    }

    pub fn is_kind(&self, kind: DeltaParseErrorKind) -> bool {
        self.kind == kind
    }
}

impl From<std::io::Error> for DeltaParseError {
    fn from(e: std::io::Error) -> Self {
        Self {
            message: format!("IO error: {}", e),
            line_number: None,
            kind: DeltaParseErrorKind::IoError,
            content: None,
        }
    }
}

/// Leading lines of a delta file, before the first header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaPreamble {
    /// Path of the reference FASTA as recorded by the aligner
    pub reference_path: Option<String>,
    /// Path of the query FASTA as recorded by the aligner
    pub query_path: Option<String>,
    /// Alignment program (`NUCMER` or `PROMER`)
    pub program: Option<String>,
}

impl DeltaPreamble {
    fn push_line(&mut self, line: &str) {
        if self.reference_path.is_none() {
            let mut fields = line.split_whitespace();
            self.reference_path = fields.next().map(str::to_string);
            self.query_path = fields.next().map(str::to_string);
        } else if self.program.is_none() {
            self.program = Some(line.to_string());
        } else {
            log::debug!("Ignoring extra preamble line: {}", line);
        }
    }

    /// Whether coordinates are in amino-acid space
    pub fn is_promer(&self) -> bool {
        self.program
            .as_deref()
            .map(|p| p.eq_ignore_ascii_case("PROMER"))
            .unwrap_or(false)
    }
}

/// Parsed `>` header line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentHeader {
    pub reference: Arc<str>,
    pub query: Arc<str>,
    pub reference_len: Option<u64>,
    pub query_len: Option<u64>,
}

impl AlignmentHeader {
    /// Parse a header line
    ///
    /// Format: `>refName queryName [refLength queryLength]`
    pub fn parse(line: &str, line_number: usize) -> Result<Self, DeltaParseError> {
        let body = line.strip_prefix('>').unwrap_or(line);
        let fields: Vec<&str> = body.split_whitespace().collect();

        if fields.len() < 2 {
            return Err(DeltaParseError::invalid_header(
                format!("Expected reference and query names, got {} fields", fields.len()),
                line_number,
                line,
            ));
        }

        let length = |index: usize, name: &str| -> Result<Option<u64>, DeltaParseError> {
            fields
                .get(index)
                .map(|v| {
                    v.parse::<u64>()
                        .map_err(|_| DeltaParseError::invalid_number(name, v, line_number))
                })
                .transpose()
        };

        Ok(Self {
            reference: Arc::from(fields[0]),
            query: Arc::from(fields[1]),
            reference_len: length(2, "reference length")?,
            query_len: length(3, "query length")?,
        })
    }
}

/// One alignment block: a coordinate line under a header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentBlock {
    pub reference: Arc<str>,
    pub query: Arc<str>,
    pub ref_start: u64,
    pub ref_end: u64,
    pub query_start: u64,
    pub query_end: u64,
}

impl std::fmt::Display for AlignmentBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {}",
            self.reference, self.query, self.ref_start, self.ref_end, self.query_start, self.query_end
        )
    }
}

/// Largest accepted coordinate
///
/// Cursors walk in `i64` and start one step outside the block.
const MAX_COORDINATE: u64 = i64::MAX as u64 - 1;

/// Parse the first four fields of a coordinate line
fn parse_coordinates(line: &str, line_number: usize) -> Result<[u64; 4], DeltaParseError> {
    const NAMES: [&str; 4] = ["reference start", "reference end", "query start", "query end"];

    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 4 {
        return Err(DeltaParseError::invalid_coordinates(
            format!("Expected 4+ fields, got {}", fields.len()),
            line_number,
            line,
        ));
    }

    let mut coords = [0u64; 4];
    for (i, name) in NAMES.iter().enumerate() {
        coords[i] = fields[i]
            .parse::<u64>()
            .map_err(|_| DeltaParseError::invalid_number(name, fields[i], line_number))?;
        if coords[i] == 0 {
            return Err(DeltaParseError::invalid_coordinates(
                format!("{} must be 1-based, got 0", name),
                line_number,
                line,
            ));
        }
        if coords[i] > MAX_COORDINATE {
            return Err(DeltaParseError::invalid_coordinates(
                format!("{} {} exceeds the largest supported coordinate {}", name, coords[i], MAX_COORDINATE),
                line_number,
                line,
            ));
        }
    }
    Ok(coords)
}

/// Whether a line is made only of integers (a coordinate or run line)
fn is_numeric_line(line: &str) -> bool {
    line.split_whitespace().all(|f| f.parse::<i64>().is_ok())
}

impl AlignmentBlock {
    /// Parse a coordinate line belonging to `header`
    pub fn parse(header: &AlignmentHeader, line: &str, line_number: usize) -> Result<Self, DeltaParseError> {
        let [ref_start, ref_end, query_start, query_end] = parse_coordinates(line, line_number)?;

        if let Some(len) = header.reference_len {
            if ref_start.max(ref_end) > len {
                return Err(DeltaParseError::invalid_coordinates(
                    format!("Reference coordinates exceed {} length {}", header.reference, len),
                    line_number,
                    line,
                ));
            }
        }
        if let Some(len) = header.query_len {
            if query_start.max(query_end) > len {
                return Err(DeltaParseError::invalid_coordinates(
                    format!("Query coordinates exceed {} length {}", header.query, len),
                    line_number,
                    line,
                ));
            }
        }

        Ok(Self {
            reference: Arc::clone(&header.reference),
            query: Arc::clone(&header.query),
            ref_start,
            ref_end,
            query_start,
            query_end,
        })
    }
}

/// Cursor walking one side of a block
#[derive(Debug, Clone, Copy)]
struct Cursor {
    pos: i64,
    end: i64,
    step: i64,
}

impl Cursor {
    /// Start one step before `start` so the first advance lands on it
    fn new(start: u64, end: u64) -> Self {
        let step = Direction::of_span(start, end).step();
        Self {
            pos: start as i64 - step,
            end: end as i64,
            step,
        }
    }

    /// Bases left before (and including) the end
    fn remaining(&self) -> i64 {
        (self.end - self.pos) * self.step
    }

    /// Advance one base, refusing to leave the block
    fn advance(&mut self) -> Option<u64> {
        if self.remaining() <= 0 {
            return None;
        }
        self.pos += self.step;
        Some(self.pos as u64)
    }
}

/// A decoded delta file
#[derive(Debug, Clone)]
pub struct DeltaFile {
    pub preamble: DeltaPreamble,
    pub mapping: DeltaMapping,
}

/// Walk one block's run list and fill `mapping`
fn decode_block<R: BufRead>(
    block: &AlignmentBlock,
    lines: &mut LineIterator<R>,
    mapping: &mut DeltaMapping,
) -> Result<(), DeltaParseError> {
    let orientation = mapping.orientation();
    let mut reference = Cursor::new(block.ref_start, block.ref_end);
    let mut query = Cursor::new(block.query_start, block.query_end);
    let mut last_match: Option<Position> = None;

    let position_pair = |ref_coord: u64, query_coord: u64| {
        orientation.orient(
            Position::new(Arc::clone(&block.reference), ref_coord),
            Position::new(Arc::clone(&block.query), query_coord),
        )
    };

    loop {
        let line_number = lines.line_number() + 1;
        let value: i64 = match lines.next_line() {
            None => return Err(DeltaParseError::unexpected_eof(block, line_number)),
            Some(line) => {
                let line = line?.trim();
                line.parse()
                    .map_err(|_| DeltaParseError::invalid_number("run", line, line_number))?
            }
        };
        if value == 0 {
            break;
        }
        mapping.stats_mut().indels += 1;

        for _ in 1..value.unsigned_abs() {
            match (reference.advance(), query.advance()) {
                (Some(r), Some(q)) => {
                    let (key, target) = position_pair(r, q);
                    last_match = Some(target.clone());
                    mapping.insert_direct(key, target);
                }
                _ => return Err(DeltaParseError::block_overrun(block, line_number)),
            }
        }

        // One base present on a single side only
        let (gapped, gap_on_key_side) = if value > 0 {
            let coord = reference
                .advance()
                .ok_or_else(|| DeltaParseError::block_overrun(block, line_number))?;
            (Position::new(Arc::clone(&block.reference), coord), orientation.is_reverse())
        } else {
            let coord = query
                .advance()
                .ok_or_else(|| DeltaParseError::block_overrun(block, line_number))?;
            (Position::new(Arc::clone(&block.query), coord), !orientation.is_reverse())
        };

        if gap_on_key_side {
            match &last_match {
                Some(anchor) => mapping.insert_gap(gapped, anchor.clone()),
                None => {
                    mapping.stats_mut().gaps_without_anchor += 1;
                    log::debug!("Gap at {} has no preceding match in block {}", gapped, block);
                }
            }
        }
    }

    let terminator_line = lines.line_number();
    if reference.remaining() != query.remaining() {
        return Err(DeltaParseError::length_mismatch(block, terminator_line));
    }

    while let (Some(r), Some(q)) = (reference.advance(), query.advance()) {
        let (key, target) = position_pair(r, q);
        mapping.insert_direct(key, target);
    }

    mapping.stats_mut().blocks += 1;
    Ok(())
}

/// Decode a delta stream, keeping its preamble
pub fn decode_reader<R: BufRead>(reader: R, orientation: Orientation) -> Result<DeltaFile, DeltaParseError> {
    let mut lines = LineIterator::new(reader);
    let mut preamble = DeltaPreamble::default();
    let mut mapping = DeltaMapping::new(orientation);
    let mut header: Option<AlignmentHeader> = None;

    loop {
        let line_number = lines.line_number() + 1;
        let line = match lines.next_line() {
            None => break,
            Some(line) => line?,
        };
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        if trimmed.starts_with('>') {
            let parsed = AlignmentHeader::parse(trimmed, line_number)?;
            log::debug!("Alignment {} / {}", parsed.reference, parsed.query);
            mapping.stats_mut().alignments += 1;
            header = Some(parsed);
            continue;
        }

        match header {
            None if is_numeric_line(trimmed) => {
                return Err(DeltaParseError::missing_header(line_number, trimmed));
            }
            None => preamble.push_line(trimmed),
            Some(ref current) => {
                let block = AlignmentBlock::parse(current, trimmed, line_number)?;
                decode_block(&block, &mut lines, &mut mapping)?;
            }
        }
    }

    if preamble.is_promer() {
        log::warn!("Delta file was produced by PROMER; coordinates are treated as nucleotide positions");
    }

    let stats = mapping.stats();
    log::info!(
        "Decoded {} blocks in {} alignments ({}): {} direct, {} gap entries",
        stats.blocks,
        stats.alignments,
        orientation.label(),
        mapping.positions().len(),
        mapping.gaps().len()
    );
    if stats.overwritten > 0 {
        log::warn!("{} positions were mapped by more than one block; the last block wins", stats.overwritten);
    }
    if stats.superseded_gaps > 0 {
        log::warn!(
            "{} gap entries were dropped because another block maps the same position directly",
            stats.superseded_gaps
        );
    }

    Ok(DeltaFile { preamble, mapping })
}

/// Decode a delta stream into its position and gap maps
pub fn decode<R: BufRead>(reader: R, orientation: Orientation) -> Result<DeltaMapping, DeltaParseError> {
    decode_reader(reader, orientation).map(|file| file.mapping)
}

/// Decode a delta file from a path
///
/// Plain, gzip and bzip2 inputs are accepted.
pub fn decode_file(path: &Path, orientation: Orientation) -> Result<DeltaFile, DeltaParseError> {
    if !path.exists() {
        return Err(DeltaParseError::file_not_found(path));
    }
    decode_reader(open_input(path)?, orientation)
}

/// Decode a delta file from bytes (for testing)
pub fn decode_bytes(data: &[u8], orientation: Orientation) -> Result<DeltaMapping, DeltaParseError> {
    decode(BufReader::new(data), orientation)
}
