//! Error types for scheduling.

use snafu::Snafu;

/// Result type for scheduling operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// A loop or fused unit failed while the trace was being flushed.
    #[snafu(display("Execution failed: {source}"))]
    Execution { source: tessel_runtime::Error },

    /// Host access to a flushed Dat failed.
    #[snafu(display("Data access failed: {source}"))]
    Device { source: tessel_device::Error },

    /// An earlier kernel failure left the trace unusable.
    #[snafu(display("Trace is poisoned by an earlier kernel failure"))]
    TracePoisoned,

    /// A rewrite would move work across an already forced point.
    #[snafu(display("Rewrite starting at #{start} crosses flushed point #{flushed}"))]
    RewriteCrossesFlush { start: u64, flushed: u64 },

    /// A node of the segment to rewrite is no longer pending.
    #[snafu(display("Trace node #{seq} is not pending"))]
    NotPending { seq: u64 },

    /// The segment to rewrite is interleaved with other nodes.
    #[snafu(display("Trace segment starting at #{start} is not contiguous"))]
    NotContiguous { start: u64 },

    #[snafu(display("Cannot rewrite an empty trace segment"))]
    EmptySegment,

    /// Tiling engine failed to produce a plan. Fatal for the chain.
    #[snafu(display("Tiling engine '{engine}' failed for chain '{chain}': {reason}"))]
    Engine { engine: String, chain: String, reason: String },

    /// Loop chains do not nest.
    #[snafu(display("Loop chain '{requested}' opened while '{active}' is still open"))]
    ChainAlreadyOpen { active: String, requested: String },
}
