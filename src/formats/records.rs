//! Positional record adapter
//!
//! Streams a tab-delimited file whose first two fields are a sequence name
//! and a 1-based coordinate (VCF and similar), rewriting each record through
//! a decoded [`DeltaMapping`].
//!
//! Every data record goes to exactly one place:
//! - the mapped output, when its position has a direct counterpart
//! - the gap output, when it lies inside an indel (the anchor is written)
//! - nowhere, when the alignment does not cover it
//!
//! Comment lines are copied verbatim to both outputs.

use crate::core::{decode_file, open_input, ByteLineIterator, DeltaFile, DeltaMapping, Lookup, Orientation, Position};
use memchr::memchr;
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Zero-copy view of one data record
///
/// Only the sequence name and coordinate are parsed; everything after the
/// second tab is kept as raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordView<'a> {
    /// Sequence name (field 1)
    pub seq: &'a str,
    /// Coordinate (field 2, 1-based)
    pub coord: u64,
    /// Remaining fields, `None` when the record has exactly two fields
    pub tail: Option<&'a [u8]>,
}

impl<'a> RecordView<'a> {
    /// Parse a record line (without its line terminator)
    pub fn parse(line: &'a [u8]) -> Result<Self, RecordParseError> {
        if line.is_empty() {
            return Err(RecordParseError::EmptyLine);
        }

        let first_tab = memchr(b'\t', line).ok_or(RecordParseError::TooFewFields {
            expected: 2,
            found: 1,
        })?;
        let rest = &line[first_tab + 1..];
        let (coord_bytes, tail) = match memchr(b'\t', rest) {
            Some(second_tab) => (&rest[..second_tab], Some(&rest[second_tab + 1..])),
            None => (rest, None),
        };

        let seq = std::str::from_utf8(&line[..first_tab])
            .map_err(|_| RecordParseError::InvalidUtf8("sequence name"))?;
        let coord_str =
            std::str::from_utf8(coord_bytes).map_err(|_| RecordParseError::InvalidUtf8("coordinate"))?;
        let coord: u64 = coord_str
            .trim()
            .parse()
            .map_err(|_| RecordParseError::InvalidNumber("coordinate", coord_str.to_string()))?;

        Ok(Self { seq, coord, tail })
    }

    /// Position this record refers to
    pub fn position(&self) -> Position {
        Position::new(self.seq, self.coord)
    }
}

/// Record parsing error
#[derive(Debug, thiserror::Error)]
pub enum RecordParseError {
    #[error("Empty line")]
    EmptyLine,

    #[error("Too few fields: expected at least {expected}, found {found}")]
    TooFewFields { expected: usize, found: usize },

    #[error("Invalid UTF-8 in field: {0}")]
    InvalidUtf8(&'static str),

    #[error("Invalid number in field {0}: {1}")]
    InvalidNumber(&'static str, String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Translation options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslateOptions {
    /// Lines starting with this byte are copied to both outputs
    pub comment_marker: u8,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self { comment_marker: b'#' }
    }
}

/// Translation statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TranslateStats {
    /// Data records seen
    pub total: usize,
    /// Records written to the mapped output
    pub mapped: usize,
    /// Records written to the gap output
    pub gap: usize,
    /// Records outside every alignment block
    pub unmapped: usize,
    /// Records that could not be parsed
    pub malformed: usize,
    /// Comment lines copied to both outputs
    pub headers: usize,
}

/// Where a record was routed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    Mapped,
    Gap,
    Unmapped,
}

/// Write `seq \t coord [\t tail]`
fn write_record<W: Write>(out: &mut W, target: &Position, tail: Option<&[u8]>) -> std::io::Result<()> {
    write!(out, "{}\t{}", target.seq, target.coord)?;
    if let Some(tail) = tail {
        out.write_all(b"\t")?;
        out.write_all(tail)?;
    }
    out.write_all(b"\n")
}

/// Route one parsed record to the matching output
pub fn translate_record<M: Write, G: Write>(
    view: &RecordView,
    mapping: &DeltaMapping,
    mapped_out: &mut M,
    gap_out: &mut G,
) -> std::io::Result<Routing> {
    match mapping.lookup(&view.position()) {
        Some(Lookup::Direct(target)) => {
            write_record(mapped_out, target, view.tail)?;
            Ok(Routing::Mapped)
        }
        Some(Lookup::Gap(anchor)) => {
            write_record(gap_out, anchor, view.tail)?;
            Ok(Routing::Gap)
        }
        None => Ok(Routing::Unmapped),
    }
}

/// Stream records from `reader` into the mapped and gap outputs
///
/// Malformed records are logged with their line number and skipped; only
/// I/O failures abort the stream.
pub fn translate_records<R: BufRead, M: Write, G: Write>(
    reader: R,
    mapping: &DeltaMapping,
    mapped_out: &mut M,
    gap_out: &mut G,
    options: &TranslateOptions,
) -> Result<TranslateStats, RecordParseError> {
    let mut lines = ByteLineIterator::new(reader);
    let mut stats = TranslateStats::default();

    loop {
        let line_number = lines.line_number() + 1;
        let line = match lines.next_line() {
            None => break,
            Some(line) => line?,
        };

        if line.is_empty() {
            continue;
        }

        if line[0] == options.comment_marker {
            mapped_out.write_all(line)?;
            mapped_out.write_all(b"\n")?;
            gap_out.write_all(line)?;
            gap_out.write_all(b"\n")?;
            stats.headers += 1;
            continue;
        }

        stats.total += 1;

        let view = match RecordView::parse(line) {
            Ok(view) => view,
            Err(e) => {
                log::warn!("Skipping malformed record at line {}: {}", line_number, e);
                stats.malformed += 1;
                continue;
            }
        };

        match translate_record(&view, mapping, mapped_out, gap_out)? {
            Routing::Mapped => stats.mapped += 1,
            Routing::Gap => stats.gap += 1,
            Routing::Unmapped => stats.unmapped += 1,
        }
    }

    Ok(stats)
}

/// Paths of the two translation outputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub mapped: PathBuf,
    pub gap: PathBuf,
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

impl OutputPaths {
    /// `<prefix>.map` and `<prefix>.gap`
    pub fn with_prefix<P: AsRef<Path>>(prefix: P) -> Self {
        let prefix = prefix.as_ref();
        Self {
            mapped: with_suffix(prefix, ".map"),
            gap: with_suffix(prefix, ".gap"),
        }
    }

    /// Outputs next to the input: `<input>.map` and `<input>.gap`
    pub fn for_input<P: AsRef<Path>>(input: P) -> Self {
        Self::with_prefix(input)
    }
}

/// Translate a record file into its mapped and gap outputs
pub fn translate_file<P: AsRef<Path>>(
    input: P,
    outputs: &OutputPaths,
    mapping: &DeltaMapping,
    options: &TranslateOptions,
) -> Result<TranslateStats, RecordParseError> {
    let reader = open_input(input.as_ref())?;

    let mut mapped_out = BufWriter::with_capacity(128 * 1024, File::create(&outputs.mapped)?);
    let mut gap_out = BufWriter::with_capacity(64 * 1024, File::create(&outputs.gap)?);

    let stats = translate_records(reader, mapping, &mut mapped_out, &mut gap_out, options)?;

    mapped_out.flush()?;
    gap_out.flush()?;

    log::info!(
        "Translated {} records: {} mapped, {} in gaps, {} unmapped, {} malformed",
        stats.total,
        stats.mapped,
        stats.gap,
        stats.unmapped,
        stats.malformed
    );
    Ok(stats)
}

/// Decode a delta file, then translate a record file through it
///
/// The mapping is complete before the first record is read. A decode error
/// aborts before any output file is created.
pub fn lift_file(
    delta_path: &Path,
    input: &Path,
    outputs: &OutputPaths,
    orientation: Orientation,
    options: &TranslateOptions,
) -> crate::core::Result<(DeltaFile, TranslateStats)> {
    let delta = decode_file(delta_path, orientation)?;
    let stats = translate_file(input, outputs, &delta.mapping, options)?;
    Ok((delta, stats))
}
