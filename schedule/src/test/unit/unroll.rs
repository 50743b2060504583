use test_case::test_case;

use crate::test::helpers::Field;
use crate::unroll::{Decision, Segment, UnrollState, UnrollTracker};

/// `k` fresh loops numbered from `first`.
fn segment(field: &Field, first: u64, k: usize) -> Segment {
    (0..k as u64).map(|i| (first + i, field.bump())).collect()
}

#[test_case(1; "single loop steps")]
#[test_case(2; "two loop steps")]
#[test_case(5; "five loop steps")]
fn test_steady_unroll_of_three(k: usize) {
    let field = Field::new(2);
    let mut tracker = UnrollTracker::new();
    let step = |i: u64| segment(&field, i * k as u64, k);

    assert!(matches!(tracker.boundary("ts", 3, step(0)), Decision::Discard));
    assert_eq!(tracker.state().accumulating(), Some(("ts", 0)));

    assert!(matches!(tracker.boundary("ts", 3, step(1)), Decision::Accumulate));
    assert_eq!(tracker.state().accumulating(), Some(("ts", k)));

    assert!(matches!(tracker.boundary("ts", 3, step(2)), Decision::Accumulate));
    assert_eq!(tracker.state().accumulating(), Some(("ts", 2 * k)));

    let Decision::Fuse(fused) = tracker.boundary("ts", 3, step(3)) else {
        panic!("fourth boundary should fuse");
    };
    assert_eq!(fused.len(), 3 * k);
    let seqs: Vec<u64> = fused.iter().map(|(seq, _)| *seq).collect();
    assert_eq!(seqs, (k as u64..4 * k as u64).collect::<Vec<_>>());
    assert!(tracker.state().is_idle());
}

#[test]
fn test_zero_unroll_fuses_every_segment() {
    let field = Field::new(2);
    let mut tracker = UnrollTracker::new();

    let Decision::Fuse(fused) = tracker.boundary("ts", 0, segment(&field, 0, 2)) else {
        panic!("segment should fuse immediately");
    };
    assert_eq!(fused.len(), 2);
    assert!(tracker.state().is_idle());
    assert!(matches!(tracker.boundary("ts", 0, Vec::new()), Decision::Skip));
}

#[test]
fn test_other_name_restarts_accumulation() {
    let field = Field::new(2);
    let mut tracker = UnrollTracker::new();
    tracker.boundary("a", 2, segment(&field, 0, 1));
    tracker.boundary("a", 2, segment(&field, 1, 1));
    assert_eq!(tracker.state().accumulating(), Some(("a", 1)));

    assert!(matches!(tracker.boundary("b", 2, segment(&field, 2, 1)), Decision::Discard));
    assert_eq!(tracker.state().accumulating(), Some(("b", 0)));
}

#[test]
fn test_empty_segment_never_fuses() {
    let field = Field::new(2);
    let mut tracker = UnrollTracker::new();
    tracker.boundary("ts", 1, segment(&field, 0, 1));

    assert!(matches!(tracker.boundary("ts", 1, Vec::new()), Decision::Accumulate));
    assert_eq!(tracker.state().accumulating(), Some(("ts", 0)));
    assert!(matches!(tracker.boundary("ts", 1, segment(&field, 1, 1)), Decision::Fuse(loops) if loops.len() == 1));
}

#[test]
fn test_reset_returns_to_idle() {
    let field = Field::new(2);
    let mut tracker = UnrollTracker::new();
    tracker.boundary("ts", 4, segment(&field, 0, 1));
    tracker.reset();
    assert!(matches!(tracker.state(), UnrollState::Idle));
}
