//! Data model for tessel loops.
//!
//! # Module Organization
//!
//! - [`set`] - Iteration domains ([`Set`], [`Subset`], [`Domain`])
//! - [`map`] - Fixed-arity indirections between sets
//! - [`dat`] - Data arrays ([`Dat`], [`Global`])
//! - [`access`] - Access modes and their merge algebra
//! - [`arg`] - Loop arguments binding data to a loop
//! - [`kernel`] - Kernel contract: parameter list, slots, entry points
//! - [`parloop`] - Validated parallel loops
//! - [`error`] - Error types and result handling

use std::sync::atomic::{AtomicU64, Ordering};

pub mod access;
pub mod arg;
pub mod dat;
pub mod error;
pub mod kernel;
pub mod map;
pub mod parloop;
pub mod set;


pub use access::Access;
pub use arg::{Arg, ArgKind};
pub use dat::{Dat, Data, Global};
pub use error::{Error, KernelError, Result};
pub use kernel::{EntryPoint, FnEntry, Kernel, ParamSpec, Slot};
pub use map::Map;
pub use parloop::{Args, ParLoop};
pub use set::{Domain, Set, Subset};

pub use tessel_dtype::{DType, Storage};

static OBJECT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique id shared by sets, maps, data arrays and loops.
pub(crate) fn next_id() -> u64 {
    OBJECT_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}
