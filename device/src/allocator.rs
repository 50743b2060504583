use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use snafu::ensure;

use crate::error::{Result, SizeMismatchSnafu};

/// Opaque handle to device-resident memory.
#[derive(Debug)]
pub enum RawBuffer {
    /// Device memory emulated in host RAM.
    Mirror { data: Box<[u8]> },
}

impl RawBuffer {
    /// Get the size of the buffer in bytes.
    pub fn size(&self) -> usize {
        match self {
            RawBuffer::Mirror { data } => data.len(),
        }
    }
}

/// Backend memory manager for the device side of a data array.
///
/// Transfers are byte images; the element layout is owned by `tessel_dtype::Storage`.
pub trait Allocator: Send + Sync + fmt::Debug {
    /// Zero-filled buffer of `size` bytes.
    fn alloc(&self, size: usize) -> Result<RawBuffer>;

    /// Host → device copy. `src` must be exactly the buffer size.
    fn copyin(&self, dst: &mut RawBuffer, src: &[u8]) -> Result<()>;

    /// Device → host copy. `dst` must be exactly the buffer size.
    fn copyout(&self, src: &RawBuffer, dst: &mut [u8]) -> Result<()>;

    fn free(&self, _buffer: RawBuffer) {}

    fn name(&self) -> &str;
}

/// Allocator whose "device" memory lives in host RAM.
///
/// Used as the default accelerator stand-in and by tests; it also counts transfers,
/// which makes authority transitions observable.
#[derive(Debug, Default)]
pub struct MirrorAllocator {
    uploads: AtomicUsize,
    downloads: AtomicUsize,
}

impl MirrorAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of host → device copies performed.
    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::Relaxed)
    }

    /// Number of device → host copies performed.
    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::Relaxed)
    }
}

impl Allocator for MirrorAllocator {
    fn alloc(&self, size: usize) -> Result<RawBuffer> {
        Ok(RawBuffer::Mirror { data: vec![0u8; size].into_boxed_slice() })
    }

    fn copyin(&self, dst: &mut RawBuffer, src: &[u8]) -> Result<()> {
        let RawBuffer::Mirror { data } = dst;
        ensure!(data.len() == src.len(), SizeMismatchSnafu { expected: data.len(), actual: src.len() });
        data.copy_from_slice(src);
        self.uploads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn copyout(&self, src: &RawBuffer, dst: &mut [u8]) -> Result<()> {
        let RawBuffer::Mirror { data } = src;
        ensure!(data.len() == dst.len(), SizeMismatchSnafu { expected: data.len(), actual: dst.len() });
        dst.copy_from_slice(data);
        self.downloads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn name(&self) -> &str {
        "MIRROR"
    }
}
