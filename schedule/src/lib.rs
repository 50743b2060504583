//! Lazy scheduling for tessel.
//!
//! Parallel loops are queued in a [`Runtime`] and executed only when their results
//! are needed. Loops issued inside a loop chain can be fused into one tiled unit by
//! a [`TilingEngine`], optionally after accumulating several time steps.
//!
//! # Module Organization
//!
//! - [`trace`] - Pending loops, forcing and in-place segment rewrites
//! - [`fusion`] - Eligibility, argument merging and [`FusedLoop`]
//! - [`inspector`] - Per-chain memoization of tiling plans
//! - [`unroll`] - Time-step accumulation state machine
//! - [`tiling`] - Engine interface and chain descriptors
//! - [`context`] / [`chain`] - The [`Runtime`] and its [`ChainScope`] guard

pub mod chain;
pub mod config;
pub mod context;
pub mod error;
pub mod fusion;
pub mod inspector;
pub mod tiling;
pub mod trace;
pub mod unroll;


pub use chain::{ChainOptions, ChainScope};
pub use config::{DEFAULT_TILE_SIZE, SchedulerConfig};
pub use context::Runtime;
pub use error::*;
pub use fusion::{FusedLoop, Fuser, Fusion};
pub use inspector::{Inspector, InspectorCache};
pub use tiling::{
    ChainDescriptor, Coordinates, LoopDescriptor, MapDescriptor, SetDescriptor, StaticPlan, Target, TilingEngine,
    TilingPlan, Untiled,
};
pub use trace::{Node, Trace};
pub use unroll::{Decision, UnrollState, UnrollTracker};
