//! Property-based tests for delta decoding
//!
//! Random alignment blocks are rendered as delta text and decoded in both
//! orientations.

use fast_deltamap::core::{decode_bytes, DeltaParseErrorKind, Orientation, Position};
use proptest::prelude::*;
use std::collections::HashSet;

/// A randomly generated, self-consistent alignment block
#[derive(Debug, Clone)]
struct BlockPlan {
    ref_start: u64,
    query_start: u64,
    runs: Vec<i64>,
    tail: u64,
    query_reversed: bool,
}

impl BlockPlan {
    fn matched(&self) -> u64 {
        self.runs.iter().map(|n| n.unsigned_abs() - 1).sum::<u64>() + self.tail
    }

    fn ref_len(&self) -> u64 {
        self.matched() + self.runs.iter().filter(|n| **n > 0).count() as u64
    }

    fn query_len(&self) -> u64 {
        self.matched() + self.runs.iter().filter(|n| **n < 0).count() as u64
    }

    /// (ref_start, ref_end, query_start, query_end)
    fn coordinates(&self) -> (u64, u64, u64, u64) {
        let ref_end = self.ref_start + self.ref_len() - 1;
        let query_far = self.query_start + self.query_len() - 1;
        if self.query_reversed {
            (self.ref_start, ref_end, query_far, self.query_start)
        } else {
            (self.ref_start, ref_end, self.query_start, query_far)
        }
    }

    fn render(&self) -> String {
        let (rs, re, qs, qe) = self.coordinates();
        let mut text = format!("/ref.fa /qry.fa\nNUCMER\n>ref qry\n{} {} {} {} 0 0 0\n", rs, re, qs, qe);
        for n in &self.runs {
            text.push_str(&format!("{}\n", n));
        }
        text.push_str("0\n");
        text
    }
}

fn arb_run() -> impl Strategy<Value = i64> {
    prop_oneof![(1i64..20), (-20i64..=-1)]
}

fn arb_block() -> impl Strategy<Value = BlockPlan> {
    (
        1u64..100_000,
        1u64..100_000,
        prop::collection::vec(arb_run(), 0..12),
        1u64..50,
        any::<bool>(),
    )
        .prop_map(|(ref_start, query_start, runs, tail, query_reversed)| BlockPlan {
            ref_start,
            query_start,
            runs,
            tail,
            query_reversed,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Well-formed blocks always decode, with one direct entry per aligned base
    #[test]
    fn prop_consistent_block_decodes(block in arb_block()) {
        let text = block.render();
        for orientation in [Orientation::QueryToReference, Orientation::ReferenceToQuery] {
            let mapping = decode_bytes(text.as_bytes(), orientation).unwrap();
            prop_assert_eq!(mapping.positions().len() as u64, block.matched());
            prop_assert_eq!(mapping.stats().blocks, 1);
        }
    }

    /// Composing forward and reverse mappings is the identity on direct positions
    #[test]
    fn prop_reverse_round_trip(block in arb_block()) {
        let text = block.render();
        let forward = decode_bytes(text.as_bytes(), Orientation::QueryToReference).unwrap();
        let reverse = decode_bytes(text.as_bytes(), Orientation::ReferenceToQuery).unwrap();

        prop_assert_eq!(forward.positions().len(), reverse.positions().len());
        for (query, reference) in forward.positions() {
            prop_assert_eq!(reverse.positions().get(reference), Some(query));
        }
    }

    /// Gap keys never have a direct counterpart and always point at a matched base
    #[test]
    fn prop_gap_entries_are_anchored(block in arb_block()) {
        let text = block.render();
        for orientation in [Orientation::QueryToReference, Orientation::ReferenceToQuery] {
            let mapping = decode_bytes(text.as_bytes(), orientation).unwrap();
            let targets: HashSet<&Position> = mapping.positions().values().collect();

            for (key, anchor) in mapping.gaps() {
                prop_assert!(!mapping.positions().contains_key(key));
                prop_assert!(targets.contains(anchor));
            }

            let key_side_gaps = block
                .runs
                .iter()
                .filter(|n| if orientation.is_reverse() { **n > 0 } else { **n < 0 })
                .count();
            prop_assert_eq!(
                mapping.gaps().len() + mapping.stats().gaps_without_anchor,
                key_side_gaps
            );
        }
    }

    /// Every mapped coordinate stays inside its block
    #[test]
    fn prop_coordinates_within_block(block in arb_block()) {
        let (rs, re, qs, qe) = block.coordinates();
        let mapping = decode_bytes(block.render().as_bytes(), Orientation::QueryToReference).unwrap();
        for (query, reference) in mapping.positions() {
            prop_assert!(query.coord >= qs.min(qe) && query.coord <= qs.max(qe));
            prop_assert!(reference.coord >= rs && reference.coord <= re);
        }
    }

    /// Lengthening one side by a base is rejected
    #[test]
    fn prop_length_mismatch_rejected(block in arb_block()) {
        let (rs, re, qs, qe) = block.coordinates();
        let mut text = format!(">ref qry\n{} {} {} {} 0 0 0\n", rs, re + 1, qs, qe);
        for n in &block.runs {
            text.push_str(&format!("{}\n", n));
        }
        text.push_str("0\n");

        let err = decode_bytes(text.as_bytes(), Orientation::QueryToReference).unwrap_err();
        prop_assert_eq!(err.kind, DeltaParseErrorKind::LengthMismatch);
    }
}

#[test]
fn identity_block_maps_each_base_to_itself() {
    let text = b">chr1 ctg1\n1 10 1 10 0 0 0\n0\n";
    let forward = decode_bytes(text, Orientation::QueryToReference).unwrap();
    let reverse = decode_bytes(text, Orientation::ReferenceToQuery).unwrap();

    for k in 1..=10 {
        assert_eq!(
            forward.positions().get(&Position::new("ctg1", k)),
            Some(&Position::new("chr1", k))
        );
        assert_eq!(
            reverse.positions().get(&Position::new("chr1", k)),
            Some(&Position::new("ctg1", k))
        );
    }
    assert!(forward.gaps().is_empty());
    assert!(reverse.gaps().is_empty());
}

#[test]
fn later_block_reuses_header_identifiers() {
    let text = b">chr1 ctg1\n1 3 1 3 0 0 0\n0\n10 12 20 22 0 0 0\n0\n>chr2 ctg2\n5 6 1 2 0 0 0\n0\n";
    let mapping = decode_bytes(text, Orientation::QueryToReference).unwrap();

    assert_eq!(
        mapping.positions().get(&Position::new("ctg1", 21)),
        Some(&Position::new("chr1", 11))
    );
    assert_eq!(
        mapping.positions().get(&Position::new("ctg2", 2)),
        Some(&Position::new("chr2", 6))
    );
    assert_eq!(mapping.positions().len(), 8);
}
