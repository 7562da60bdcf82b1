//! Positions, walking directions and the decoded position mappings
//!
//! A delta alignment is decoded into two maps keyed by [`Position`]:
//! the direct map (one entry per aligned base) and the gap map (one entry
//! per base that sits inside an indel, pointing at the nearest aligned base).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A 1-based coordinate on a named sequence
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    /// Sequence identifier
    pub seq: Arc<str>,
    /// 1-based coordinate
    pub coord: u64,
}

impl Position {
    pub fn new(seq: impl Into<Arc<str>>, coord: u64) -> Self {
        Self {
            seq: seq.into(),
            coord,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.seq, self.coord)
    }
}

/// Map from a position to its direct counterpart
pub type PositionMap = HashMap<Position, Position>;

/// Map from a position inside an indel to its anchor
pub type GapMap = HashMap<Position, Position>;

/// Three-way sign of `b - a`
///
/// # Examples
/// ```
/// use fast_deltamap::core::direction;
/// assert_eq!(direction(1, 10), 1);
/// assert_eq!(direction(10, 1), -1);
/// assert_eq!(direction(5, 5), 0);
/// ```
pub fn direction(a: u64, b: u64) -> i64 {
    match b.cmp(&a) {
        std::cmp::Ordering::Greater => 1,
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
    }
}

/// Walking direction of one side of an alignment block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

impl Direction {
    /// Direction of a `start..=end` span
    ///
    /// A single-base span (`start == end`) walks forward.
    pub fn of_span(start: u64, end: u64) -> Self {
        if direction(start, end) < 0 {
            Direction::Reverse
        } else {
            Direction::Forward
        }
    }

    /// Signed step (+1 or -1)
    pub fn step(&self) -> i64 {
        match self {
            Direction::Forward => 1,
            Direction::Reverse => -1,
        }
    }
}

/// Which coordinate space is translated into which
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Orientation {
    /// Query positions are keys, reference positions are values
    #[default]
    QueryToReference,
    /// Reference positions are keys, query positions are values
    ReferenceToQuery,
}

impl Orientation {
    /// Orientation selected by the `reverse` flag
    pub fn from_reverse(reverse: bool) -> Self {
        if reverse {
            Orientation::ReferenceToQuery
        } else {
            Orientation::QueryToReference
        }
    }

    pub fn is_reverse(&self) -> bool {
        matches!(self, Orientation::ReferenceToQuery)
    }

    /// Order a (reference, query) pair as (key, value)
    pub fn orient<T>(&self, reference: T, query: T) -> (T, T) {
        match self {
            Orientation::QueryToReference => (query, reference),
            Orientation::ReferenceToQuery => (reference, query),
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Orientation::QueryToReference => "query -> reference",
            Orientation::ReferenceToQuery => "reference -> query",
        }
    }
}

/// Counters collected while decoding a delta file
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DecodeStats {
    /// Alignment headers (`>` lines)
    pub alignments: usize,
    /// Coordinate blocks
    pub blocks: usize,
    /// Non-terminator run values
    pub indels: usize,
    /// Direct entries written (including overwrites)
    pub direct_entries: usize,
    /// Gap entries written
    pub gap_entries: usize,
    /// Gaps seen before any match in their block
    pub gaps_without_anchor: usize,
    /// Direct keys written more than once
    pub overwritten: usize,
    /// Gap entries dropped because the key has a direct counterpart
    pub superseded_gaps: usize,
}

/// Result of looking up one position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    /// Position has a direct counterpart
    Direct(&'a Position),
    /// Position lies inside an indel; the anchor is the nearest aligned base
    Gap(&'a Position),
}

/// Decoded delta alignment
///
/// Holds the direct map and the gap map in one key space, selected by
/// [`Orientation`]. A key never appears in both maps.
#[derive(Debug, Clone, Default)]
pub struct DeltaMapping {
    positions: PositionMap,
    gaps: GapMap,
    orientation: Orientation,
    stats: DecodeStats,
}

impl DeltaMapping {
    pub fn new(orientation: Orientation) -> Self {
        Self {
            orientation,
            ..Self::default()
        }
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn positions(&self) -> &PositionMap {
        &self.positions
    }

    pub fn gaps(&self) -> &GapMap {
        &self.gaps
    }

    pub fn stats(&self) -> &DecodeStats {
        &self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut DecodeStats {
        &mut self.stats
    }

    /// Split into (PositionMap, GapMap)
    pub fn into_parts(self) -> (PositionMap, GapMap) {
        (self.positions, self.gaps)
    }

    /// Record a direct correspondence
    pub(crate) fn insert_direct(&mut self, key: Position, value: Position) {
        if self.gaps.remove(&key).is_some() {
            self.stats.superseded_gaps += 1;
            self.stats.gap_entries -= 1;
        }
        if let Some(previous) = self.positions.insert(key, value) {
            self.stats.overwritten += 1;
            log::debug!("Replaced direct target {}", previous);
        }
        self.stats.direct_entries += 1;
    }

    /// Record a gap anchor unless the key already has a direct counterpart
    pub(crate) fn insert_gap(&mut self, key: Position, anchor: Position) {
        if self.positions.contains_key(&key) {
            self.stats.superseded_gaps += 1;
            return;
        }
        if self.gaps.insert(key, anchor).is_none() {
            self.stats.gap_entries += 1;
        }
    }

    /// Look up a position, direct map first
    pub fn lookup(&self, key: &Position) -> Option<Lookup<'_>> {
        let direct = self.positions.get(key);
        debug_assert!(
            direct.is_none() || !self.gaps.contains_key(key),
            "{} present in both the direct and the gap map",
            key
        );
        match direct {
            Some(target) => Some(Lookup::Direct(target)),
            None => self.gaps.get(key).map(Lookup::Gap),
        }
    }

    /// Look up by sequence name and coordinate
    pub fn lookup_at(&self, seq: &str, coord: u64) -> Option<Lookup<'_>> {
        self.lookup(&Position::new(seq, coord))
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() && self.gaps.is_empty()
    }
}
