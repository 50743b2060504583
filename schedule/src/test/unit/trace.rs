use crate::Error;
use crate::test::helpers::{Field, fuse_untiled, values};
use crate::trace::{Node, Trace};

fn queue(trace: &mut Trace, nodes: impl IntoIterator<Item = tessel_ir::ParLoop>) -> Vec<u64> {
    nodes.into_iter().map(|par_loop| trace.append(Node::Loop(par_loop)).unwrap()).collect()
}

#[test]
fn test_append_does_not_execute() {
    let field = Field::new(4);
    let mut trace = Trace::new();
    let seqs = queue(&mut trace, [field.bump(), field.bump()]);

    assert_eq!(seqs, vec![0, 1]);
    assert_eq!(trace.len(), 2);
    assert_eq!(trace.next_seq(), 2);
    assert_eq!(values(&field.a), vec![0.0, 1.0, 2.0, 3.0]);
}

#[test]
fn test_force_runs_prefix_up_to_last_writer() {
    let field = Field::new(3);
    let mut trace = Trace::new();
    queue(&mut trace, [field.bump(), field.scaled(2.0), field.bump()]);

    trace.force(field.b.id()).unwrap();

    assert_eq!(trace.len(), 1);
    assert_eq!(trace.flushed(), Some(1));
    assert_eq!(values(&field.a), vec![1.0, 2.0, 3.0]);
    assert_eq!(values(&field.b), vec![2.0, 4.0, 6.0]);
}

#[test]
fn test_force_without_pending_writer_runs_nothing() {
    let field = Field::new(2);
    let mut trace = Trace::new();
    queue(&mut trace, [field.bump()]);

    trace.force(field.b.id()).unwrap();

    assert_eq!(trace.len(), 1);
    assert_eq!(trace.flushed(), None);
    assert_eq!(values(&field.a), vec![0.0, 1.0]);
}

#[test]
fn test_force_all_runs_in_program_order() {
    let field = Field::new(2);
    let mut trace = Trace::new();
    queue(&mut trace, [field.scaled(10.0), field.bump(), field.bump()]);

    trace.force_all().unwrap();

    assert!(trace.is_empty());
    assert_eq!(values(&field.a), vec![2.0, 3.0]);
    assert_eq!(values(&field.b), vec![0.0, 10.0]);
}

#[test]
fn test_replace_contiguous_segment() {
    let field = Field::new(4);
    let mut trace = Trace::new();
    let seqs = queue(&mut trace, [field.bump(), field.scaled(3.0), field.bump()]);

    let fused = fuse_untiled("pair", vec![field.bump(), field.scaled(3.0)]);
    trace.replace(&seqs[..2], Node::Fused(fused)).unwrap();

    let pending: Vec<_> = trace.pending().map(|entry| entry.seq).collect();
    assert_eq!(pending, vec![0, 2]);
    assert!(matches!(trace.pending().next().map(|entry| &entry.node), Some(Node::Fused(_))));
    assert_eq!(trace.loops_since(0).len(), 1);

    trace.force_all().unwrap();
    assert_eq!(values(&field.a), vec![2.0, 3.0, 4.0, 5.0]);
    assert_eq!(values(&field.b), vec![3.0, 6.0, 9.0, 12.0]);
}

#[test]
fn test_replace_refuses_to_cross_flush() {
    let field = Field::new(2);
    let mut trace = Trace::new();
    let seqs = queue(&mut trace, [field.bump(), field.scaled(1.0)]);
    trace.force(field.a.id()).unwrap();

    let fused = fuse_untiled("late", vec![field.bump(), field.scaled(1.0)]);
    let err = trace.replace(&seqs, Node::Fused(fused)).unwrap_err();

    assert!(matches!(err, Error::RewriteCrossesFlush { start: 0, flushed: 0 }));
    assert_eq!(trace.len(), 1);
}

#[test]
fn test_replace_requires_contiguous_pending_nodes() {
    let field = Field::new(2);
    let mut trace = Trace::new();
    queue(&mut trace, [field.bump(), field.scaled(1.0), field.bump()]);

    let fused = fuse_untiled("gap", vec![field.bump(), field.bump()]);
    let err = trace.replace(&[0, 2], Node::Fused(fused.clone())).unwrap_err();
    assert!(matches!(err, Error::NotContiguous { start: 0 }));

    let err = trace.replace(&[1, 7], Node::Fused(fused.clone())).unwrap_err();
    assert!(matches!(err, Error::NotPending { seq: 7 }));

    let err = trace.replace(&[], Node::Fused(fused)).unwrap_err();
    assert!(matches!(err, Error::EmptySegment));
    assert_eq!(trace.len(), 3);
}

#[test]
fn test_kernel_failure_poisons_trace() {
    let field = Field::new(2);
    let mut trace = Trace::new();
    queue(&mut trace, [field.broken(), field.bump()]);

    let err = trace.force_all().unwrap_err();
    assert!(matches!(err, Error::Execution { .. }));
    assert!(trace.is_poisoned());

    assert!(matches!(trace.append(Node::Loop(field.bump())), Err(Error::TracePoisoned)));
    assert!(matches!(trace.force(field.a.id()), Err(Error::TracePoisoned)));
    assert!(matches!(trace.force_all(), Err(Error::TracePoisoned)));
    assert_eq!(values(&field.a), vec![0.0, 1.0]);
}
