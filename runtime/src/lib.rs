//! Loop execution for tessel.
//!
//! - [`executor`] runs one loop entity by entity on the host, handling data
//!   authority and read-only guards.
//! - [`tiled`] runs a fused chain following a tiling plan: colors in order, tiles of
//!   one color in parallel.
//! - [`compiler`] holds the code generator and native compiler interfaces, plus a
//!   cache of built kernels.

pub mod compiler;
pub mod error;
pub mod executor;
pub mod tiled;


pub use compiler::{BuildOptions, CGenerator, CodeGenerator, Compiler, KernelAst, KernelCache};
pub use error::*;
pub use executor::execute;
pub use tiled::{Color, Tile, TileStep, execute_tiled};
