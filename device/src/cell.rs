//! Host/device data authority.
//!
//! A [`DataCell`] owns the host copy of a data array and, optionally, a device copy.
//! Exactly one of them is authoritative at any time, recorded by [`Authority`]:
//!
//! - `Host`: the host storage is current; a device copy, if any, is stale.
//! - `Device`: the device copy is current; the host storage must be fetched before use.
//!
//! Every host-side read goes through [`DataCell::read`], which fetches first. Every
//! host-side write goes through [`DataCell::write`], which fetches, checks the
//! read-only guard, and leaves the cell `Host`-authoritative.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use snafu::{OptionExt, ResultExt, ensure};
use tessel_dtype::{DType, Storage};
use tracing::trace;

use crate::allocator::{Allocator, RawBuffer};
use crate::error::{NoDeviceBufferSnafu, ReadOnlySnafu, Result, StorageSnafu};

/// Which resident copy of a data array is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum Authority {
    Host,
    Device,
}

/// Device-resident copy together with the allocator that owns it.
#[derive(Debug)]
pub struct DeviceBuffer {
    raw: Option<RawBuffer>,
    allocator: Arc<dyn Allocator>,
}

impl DeviceBuffer {
    fn allocate(allocator: Arc<dyn Allocator>, size: usize) -> Result<Self> {
        let raw = allocator.alloc(size)?;
        Ok(Self { raw: Some(raw), allocator })
    }

    fn raw(&self) -> Result<&RawBuffer> {
        self.raw.as_ref().context(NoDeviceBufferSnafu)
    }

    fn raw_mut(&mut self) -> Result<&mut RawBuffer> {
        self.raw.as_mut().context(NoDeviceBufferSnafu)
    }

    pub fn size(&self) -> usize {
        self.raw.as_ref().map_or(0, RawBuffer::size)
    }

    pub fn allocator(&self) -> &dyn Allocator {
        &*self.allocator
    }
}

impl Drop for DeviceBuffer {
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            self.allocator.free(raw);
        }
    }
}

#[derive(Debug)]
struct DeviceState {
    authority: Authority,
    buffer: Option<DeviceBuffer>,
}

/// Host storage plus optional device copy, with an exclusive authority flag.
///
/// Lock order: `state` before `host`.
#[derive(Debug)]
pub struct DataCell {
    host: RwLock<Storage>,
    state: Mutex<DeviceState>,
    /// Number of live [`ReadOnlyGuard`]s.
    readers: AtomicUsize,
}

impl DataCell {
    pub fn new(storage: Storage) -> Self {
        Self {
            host: RwLock::new(storage),
            state: Mutex::new(DeviceState { authority: Authority::Host, buffer: None }),
            readers: AtomicUsize::new(0),
        }
    }

    pub fn dtype(&self) -> DType {
        self.host.read().dtype()
    }

    pub fn len(&self) -> usize {
        self.host.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn authority(&self) -> Authority {
        self.state.lock().authority
    }

    pub fn has_device_buffer(&self) -> bool {
        self.state.lock().buffer.is_some()
    }

    /// False while at least one kernel call holds this array read-only.
    pub fn is_writable(&self) -> bool {
        self.readers.load(Ordering::Acquire) == 0
    }

    /// Bring the device copy back to host if the device is authoritative.
    ///
    /// Afterwards the cell is `Host`-authoritative. No-op when already `Host`.
    pub fn fetch(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.authority == Authority::Host {
            return Ok(());
        }

        let buffer = state.buffer.as_ref().context(NoDeviceBufferSnafu)?;
        let mut bytes = vec![0u8; buffer.size()];
        buffer.allocator.copyout(buffer.raw()?, &mut bytes)?;

        let mut host = self.host.write();
        let fetched = Storage::from_bytes(host.dtype(), &bytes).context(StorageSnafu)?;
        host.copy_from(&fetched).context(StorageSnafu)?;
        state.authority = Authority::Host;
        trace!(elements = host.len(), "fetched device copy to host");
        Ok(())
    }

    /// Read the host copy, fetching from the device first when needed.
    pub fn read(&self) -> Result<RwLockReadGuard<'_, Storage>> {
        self.fetch()?;
        Ok(self.host.read())
    }

    /// Mutate the host copy.
    ///
    /// Fails with `ReadOnly` while a kernel call holds the array read-only. The
    /// cell is `Host`-authoritative afterwards, so any device copy becomes stale.
    pub fn write<R>(&self, f: impl FnOnce(&mut Storage) -> R) -> Result<R> {
        ensure!(self.is_writable(), ReadOnlySnafu);
        self.fetch()?;
        let mut state = self.state.lock();
        let result = f(&mut self.host.write());
        state.authority = Authority::Host;
        Ok(result)
    }

    /// Declare the host copy current after a host-side modification.
    ///
    /// Called after every non-READ access, whatever backend ran the loop.
    pub fn mark_host(&self) {
        let mut state = self.state.lock();
        if state.authority == Authority::Device {
            trace!("device copy marked stale");
        }
        state.authority = Authority::Host;
    }

    /// Copy the host storage to the device and make the device authoritative.
    ///
    /// Allocates (or reallocates on size change) through `allocator`.
    pub fn upload(&self, allocator: &Arc<dyn Allocator>) -> Result<()> {
        let mut state = self.state.lock();
        if state.authority == Authority::Device {
            return Ok(());
        }

        let bytes = self.host.read().to_bytes();
        let reuse = state.buffer.as_ref().is_some_and(|buffer| buffer.size() == bytes.len());
        if !reuse {
            state.buffer = Some(DeviceBuffer::allocate(Arc::clone(allocator), bytes.len())?);
        }

        let buffer = state.buffer.as_mut().context(NoDeviceBufferSnafu)?;
        let allocator = Arc::clone(&buffer.allocator);
        allocator.copyin(buffer.raw_mut()?, &bytes)?;
        state.authority = Authority::Device;
        trace!(bytes = bytes.len(), allocator = allocator.name(), "uploaded host copy to device");
        Ok(())
    }

    /// Run a device-side update on the device copy.
    ///
    /// Stands in for a device backend writing its resident buffer: a stale device copy
    /// is refreshed from host first, and the device is authoritative afterwards.
    pub fn with_device_mut<R>(&self, f: impl FnOnce(&mut Storage) -> R) -> Result<R> {
        let mut state = self.state.lock();
        let dtype = self.host.read().dtype();
        let host_is_current = state.authority == Authority::Host;
        let buffer = state.buffer.as_mut().context(NoDeviceBufferSnafu)?;
        let allocator = Arc::clone(&buffer.allocator);

        if host_is_current {
            allocator.copyin(buffer.raw_mut()?, &self.host.read().to_bytes())?;
        }

        let mut bytes = vec![0u8; buffer.size()];
        allocator.copyout(buffer.raw()?, &mut bytes)?;
        let mut device = Storage::from_bytes(dtype, &bytes).context(StorageSnafu)?;
        let result = f(&mut device);
        allocator.copyin(buffer.raw_mut()?, &device.to_bytes())?;

        state.authority = Authority::Device;
        Ok(result)
    }

    /// Hold this array read-only until the guard is dropped.
    pub fn read_only(&self) -> ReadOnlyGuard<'_> {
        self.readers.fetch_add(1, Ordering::AcqRel);
        ReadOnlyGuard { cell: self }
    }
}

/// Scoped read-only marker; writability is restored on drop, including unwinding.
#[must_use = "the array is writable again as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ReadOnlyGuard<'a> {
    cell: &'a DataCell,
}

impl Drop for ReadOnlyGuard<'_> {
    fn drop(&mut self) {
        self.cell.readers.fetch_sub(1, Ordering::AcqRel);
    }
}
