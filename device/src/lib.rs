//! Device-side memory and the host/device authority protocol for tessel data arrays.

pub mod allocator;
pub mod cell;
pub mod error;


pub use allocator::{Allocator, MirrorAllocator, RawBuffer};
pub use cell::{Authority, DataCell, DeviceBuffer, ReadOnlyGuard};
pub use error::{Error, Result};
