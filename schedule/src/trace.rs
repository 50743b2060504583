//! Lazy execution trace.
//!
//! Loops are appended in program order and run only when something forces them: a
//! host read of data they write, or an explicit flush. A contiguous pending segment
//! can be swapped for one fused node in place; no rewrite may reach back past a
//! point that has already been flushed.

use std::collections::VecDeque;

use snafu::{OptionExt, ResultExt, ensure};
use tessel_ir::ParLoop;
use tracing::{debug, error, trace};

use crate::error::{
    EmptySegmentSnafu, Error, ExecutionSnafu, NotContiguousSnafu, NotPendingSnafu, Result, RewriteCrossesFlushSnafu,
    TracePoisonedSnafu,
};
use crate::fusion::FusedLoop;

#[derive(Debug, Clone)]
pub enum Node {
    Loop(ParLoop),
    Fused(FusedLoop),
}

impl Node {
    pub fn writes_data(&self, id: u64) -> bool {
        match self {
            Node::Loop(par_loop) => par_loop.writes_data(id),
            Node::Fused(fused) => fused.writes_data(id),
        }
    }

    pub fn execute(&self) -> Result<()> {
        match self {
            Node::Loop(par_loop) => tessel_runtime::execute(par_loop).context(ExecutionSnafu),
            Node::Fused(fused) => fused.execute(),
        }
    }

    pub fn as_loop(&self) -> Option<&ParLoop> {
        match self {
            Node::Loop(par_loop) => Some(par_loop),
            Node::Fused(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub seq: u64,
    pub node: Node,
}

#[derive(Debug, Default)]
pub struct Trace {
    pending: VecDeque<Entry>,
    next_seq: u64,
    /// Highest sequence number ever flushed.
    flushed: Option<u64>,
    poisoned: bool,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `node` without running it; returns its sequence number.
    pub fn append(&mut self, node: Node) -> Result<u64> {
        ensure!(!self.poisoned, TracePoisonedSnafu);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push_back(Entry { seq, node });
        trace!(seq, pending = self.pending.len(), "node appended");
        Ok(seq)
    }

    /// Run every pending node up to and including the last one writing `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TracePoisoned`] on a poisoned trace. A failing node stops the
    /// flush, poisons the trace and its error is returned.
    pub fn force(&mut self, id: u64) -> Result<()> {
        ensure!(!self.poisoned, TracePoisonedSnafu);
        match self.pending.iter().rposition(|entry| entry.node.writes_data(id)) {
            Some(last) => self.flush_prefix(last + 1),
            None => Ok(()),
        }
    }

    /// Run everything pending.
    pub fn force_all(&mut self) -> Result<()> {
        ensure!(!self.poisoned, TracePoisonedSnafu);
        self.flush_prefix(self.pending.len())
    }

    fn flush_prefix(&mut self, count: usize) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        debug!(count, pending = self.pending.len(), "flushing trace");
        for entry in self.pending.drain(..count).collect::<Vec<_>>() {
            self.flushed = Some(entry.seq);
            if let Err(e) = entry.node.execute() {
                error!(seq = entry.seq, error = %e, "trace node failed; trace poisoned");
                self.poisoned = true;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Replace the pending nodes `seqs` (contiguous, in trace order) with `node`.
    ///
    /// The new node takes the first sequence number of the segment.
    ///
    /// # Arguments
    ///
    /// * `seqs` - Sequence numbers of the nodes to replace, in trace order
    /// * `node` - Replacement, usually a fused chain over the same loops
    ///
    /// # Errors
    ///
    /// Nothing is modified on error.
    ///
    /// * [`Error::TracePoisoned`] - the trace is poisoned
    /// * [`Error::EmptySegment`] - `seqs` is empty
    /// * [`Error::RewriteCrossesFlush`] - the segment starts at or before a flushed node
    /// * [`Error::NotPending`] - some sequence number is no longer pending
    /// * [`Error::NotContiguous`] - the nodes are pending but not adjacent
    pub fn replace(&mut self, seqs: &[u64], node: Node) -> Result<()> {
        ensure!(!self.poisoned, TracePoisonedSnafu);
        let start = *seqs.first().context(EmptySegmentSnafu)?;
        if let Some(flushed) = self.flushed {
            ensure!(start > flushed, RewriteCrossesFlushSnafu { start, flushed });
        }

        let position = self.pending.iter().position(|entry| entry.seq == start).context(NotPendingSnafu { seq: start })?;
        for (offset, &seq) in seqs.iter().enumerate() {
            if self.pending.get(position + offset).is_some_and(|entry| entry.seq == seq) {
                continue;
            }
            ensure!(self.pending.iter().any(|entry| entry.seq == seq), NotPendingSnafu { seq });
            return NotContiguousSnafu { start }.fail();
        }

        self.pending.drain(position..position + seqs.len());
        self.pending.insert(position, Entry { seq: start, node });
        debug!(start, replaced = seqs.len(), "trace segment rewritten");
        Ok(())
    }

    /// Pending loops with sequence number `>= from`, in trace order.
    pub fn loops_since(&self, from: u64) -> Vec<(u64, ParLoop)> {
        self.pending
            .iter()
            .filter(|entry| entry.seq >= from)
            .filter_map(|entry| entry.node.as_loop().map(|par_loop| (entry.seq, par_loop.clone())))
            .collect()
    }

    pub fn pending(&self) -> impl Iterator<Item = &Entry> {
        self.pending.iter()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Sequence number the next append will receive.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    pub fn flushed(&self) -> Option<u64> {
        self.flushed
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }
}
