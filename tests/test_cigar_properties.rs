/// Property-based tests for CIGAR projection
///
/// Uses proptest to verify coordinate invariants that must hold for any
/// well-formed operation string.
use clonemark::cigar::{parse_cigar, project, tail_insert_sizes, CigarOp};
use proptest::prelude::*;

fn op_strategy() -> impl Strategy<Value = (char, u32)> {
    (
        prop::sample::select(vec!['M', 'I', 'D', 'N', 'S', 'H', 'P', '=', 'X']),
        1u32..500,
    )
}

fn render(ops: &[(char, u32)]) -> String {
    ops.iter().map(|(c, n)| format!("{n}{c}")).collect()
}

/// Property: a single match of length L from position P ends at P+L and
/// consumes L query bases
#[test]
fn prop_single_match() {
    proptest!(|(pos in 0i64..1_000_000_000, len in 1u32..100_000)| {
        let p = project(&format!("{len}M"), pos, "r").unwrap();
        prop_assert_eq!(p.ref_end, pos + len as i64);
        prop_assert_eq!(p.query_len, len);
        prop_assert_eq!(p.query_end - p.query_start, len);
    });
}

/// Property: reference and query spans equal the sums of the consuming ops
#[test]
fn prop_spans_match_consumption() {
    proptest!(|(ops in prop::collection::vec(op_strategy(), 1..20), pos in 0i64..1_000_000)| {
        let cigar = render(&ops);
        let p = project(&cigar, pos, "r").unwrap();

        let parsed = parse_cigar(&cigar).unwrap();
        let ref_len: u32 = parsed.iter().filter(|(op, _)| op.consumes_ref()).map(|(_, n)| n).sum();
        let query_len: u32 = parsed.iter().filter(|(op, _)| op.consumes_query()).map(|(_, n)| n).sum();

        prop_assert_eq!(p.ref_start, pos);
        prop_assert_eq!(p.ref_end - p.ref_start, ref_len as i64);
        prop_assert_eq!(p.query_len, query_len);
        prop_assert!(p.query_start <= p.query_end);
        prop_assert!(p.query_end <= p.read_len);
    });
}

/// Property: tail inserts never exceed the query-consuming length
#[test]
fn prop_tails_bounded_by_query() {
    proptest!(|(ops in prop::collection::vec(op_strategy(), 1..20), min_match in 1u32..50)| {
        let cigar = render(&ops);
        let tails = tail_insert_sizes(&cigar, min_match).unwrap();
        let p = project(&cigar, 0, "r").unwrap();
        prop_assert!(tails[0] <= p.query_len);
        prop_assert!(tails[1] <= p.query_len);
    });
}

/// Property: reversing the operation order swaps the two tails
#[test]
fn prop_tails_swap_on_reverse() {
    proptest!(|(ops in prop::collection::vec(op_strategy(), 1..20), min_match in 1u32..50)| {
        let forward = tail_insert_sizes(&render(&ops), min_match).unwrap();
        let reversed: Vec<_> = ops.iter().rev().copied().collect();
        let backward = tail_insert_sizes(&render(&reversed), min_match).unwrap();
        prop_assert_eq!(forward, [backward[1], backward[0]]);
    });
}

#[test]
fn test_op_classes() {
    assert!(CigarOp::from_char('S').is_some_and(|op| op.consumes_query() && !op.consumes_ref()));
    assert!(CigarOp::from_char('H').is_some_and(|op| !op.consumes_query() && !op.consumes_ref()));
    assert!(CigarOp::from_char('D').is_some_and(|op| !op.consumes_query() && op.consumes_ref()));
    assert!(CigarOp::from_char('Q').is_none());
}

#[test]
fn test_malformed_cigars() {
    assert!(project("", 0, "r").is_err());
    assert!(project("*", 0, "r").is_err());
    assert!(project("10M5", 0, "r").is_err());
    assert!(project("M", 0, "r").is_err());
    assert!(project("10Q", 0, "r").is_err());
}
