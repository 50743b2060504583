//! Loop-chain scopes.
//!
//! A chain is opened with [`Runtime::loop_chain`](crate::Runtime::loop_chain) and
//! closed by its [`ChainScope`]. [`ChainScope::close`] is the chain boundary: the
//! loops issued inside the scope go through the unroll state machine and possibly
//! fusion. Dropping the scope without closing it (early return, panic) abandons the
//! chain: nothing is fused, and the context is left ready for the next chain.

use bon::bon;
use tessel_ir::Dat;

use crate::context::Runtime;
use crate::error::Result;

/// Per-chain options.
#[derive(Debug, Clone, Default)]
pub struct ChainOptions {
    /// Number of time steps to accumulate before fusing; 0 fuses every chain as it closes.
    pub time_unroll: usize,
    /// Suggested tile size; 0 uses the configured default.
    pub tile_size: usize,
    /// Coordinates handed to the tiling engine for debugging output.
    pub coords: Option<Dat>,
}

#[bon]
impl ChainOptions {
    #[builder]
    pub fn builder(
        #[builder(default = 0)] time_unroll: usize,
        #[builder(default = 0)] tile_size: usize,
        coords: Option<Dat>,
    ) -> Self {
        Self { time_unroll, tile_size, coords }
    }
}

/// Chain opened in a scheduler context but not yet closed.
#[derive(Debug)]
pub(crate) struct OpenChain {
    pub name: String,
    /// First trace sequence number belonging to the chain.
    pub start: u64,
    pub options: ChainOptions,
}

/// Guard pairing a chain's begin with its end.
#[must_use = "dropping the scope immediately abandons the chain"]
pub struct ChainScope<'rt> {
    runtime: &'rt Runtime,
    name: String,
    closed: bool,
}

impl<'rt> ChainScope<'rt> {
    pub(crate) fn new(runtime: &'rt Runtime, name: String) -> Self {
        Self { runtime, name, closed: false }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Chain boundary: run the unroll state machine and fuse when it says so.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.runtime.end_chain()
    }
}

impl Drop for ChainScope<'_> {
    fn drop(&mut self) {
        if !self.closed {
            self.runtime.abandon_chain();
        }
    }
}

impl std::fmt::Debug for ChainScope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainScope").field("name", &self.name).field("closed", &self.closed).finish()
    }
}
