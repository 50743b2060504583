//! Kernel contract.
//!
//! A [`Kernel`] is a named entry point with an explicit, ordered parameter list.
//! Executors hand it one [`Slot`] per loop argument, in argument order; the
//! parameter list is checked against the loop when the loop is built and against the
//! slots before every call.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;
use snafu::{OptionExt, ensure};
use tessel_dtype::{DType, HasDType, Storage};

use crate::error::{KernelError, ReadOnlySlotSnafu, SlotCountSnafu, SlotDTypeSnafu, SlotShapeSnafu};

/// One positional kernel parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamSpec {
    pub dtype: DType,
    /// Elements per call.
    pub len: usize,
    /// The kernel writes through this parameter.
    pub mutable: bool,
}

impl ParamSpec {
    pub fn input(dtype: DType, len: usize) -> Self {
        Self { dtype, len, mutable: false }
    }

    pub fn output(dtype: DType, len: usize) -> Self {
        Self { dtype, len, mutable: true }
    }
}

/// Per-call view of one argument.
#[derive(Debug)]
pub struct Slot {
    position: usize,
    storage: Storage,
    writable: bool,
}

impl Slot {
    pub fn new(position: usize, storage: Storage, writable: bool) -> Self {
        Self { position, storage, writable }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn get<T: HasDType>(&self) -> Result<&[T], KernelError> {
        let actual = self.storage.dtype();
        self.storage.as_slice::<T>().context(SlotDTypeSnafu { position: self.position, expected: T::DTYPE, actual })
    }

    /// Mutable view; fails on slots bound with READ access.
    pub fn get_mut<T: HasDType>(&mut self) -> Result<&mut [T], KernelError> {
        ensure!(self.writable, ReadOnlySlotSnafu { position: self.position });
        let actual = self.storage.dtype();
        let position = self.position;
        self.storage.as_mut_slice::<T>().context(SlotDTypeSnafu { position, expected: T::DTYPE, actual })
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn into_storage(self) -> Storage {
        self.storage
    }
}

/// Callable produced by a compiler or wrapped from a Rust closure.
pub trait EntryPoint: Send + Sync {
    fn call(&self, slots: &mut [Slot]) -> Result<(), KernelError>;
}

/// [`EntryPoint`] backed by a closure.
pub struct FnEntry<F>(pub F);

impl<F> EntryPoint for FnEntry<F>
where
    F: Fn(&mut [Slot]) -> Result<(), KernelError> + Send + Sync,
{
    fn call(&self, slots: &mut [Slot]) -> Result<(), KernelError> {
        (self.0)(slots)
    }
}

struct KernelInner {
    name: String,
    params: SmallVec<[ParamSpec; 8]>,
    entry: Arc<dyn EntryPoint>,
}

#[derive(Clone)]
pub struct Kernel(Arc<KernelInner>);

impl Kernel {
    pub fn new(name: impl Into<String>, params: impl IntoIterator<Item = ParamSpec>, entry: Arc<dyn EntryPoint>) -> Self {
        Self(Arc::new(KernelInner { name: name.into(), params: params.into_iter().collect(), entry }))
    }

    pub fn from_fn<F>(name: impl Into<String>, params: impl IntoIterator<Item = ParamSpec>, f: F) -> Self
    where
        F: Fn(&mut [Slot]) -> Result<(), KernelError> + Send + Sync + 'static,
    {
        Self::new(name, params, Arc::new(FnEntry(f)))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.0.params
    }

    /// Check `slots` against the parameter list.
    pub fn check_slots(&self, slots: &[Slot]) -> Result<(), KernelError> {
        let params = self.params();
        ensure!(slots.len() == params.len(), SlotCountSnafu { expected: params.len(), actual: slots.len() });
        for (position, (param, slot)) in params.iter().zip(slots).enumerate() {
            ensure!(slot.dtype() == param.dtype, SlotDTypeSnafu { position, expected: param.dtype, actual: slot.dtype() });
            ensure!(slot.len() == param.len, SlotShapeSnafu { position, expected: param.len, actual: slot.len() });
        }
        Ok(())
    }

    /// Check the slots, then invoke the entry point.
    pub fn call(&self, slots: &mut [Slot]) -> Result<(), KernelError> {
        self.check_slots(slots)?;
        self.0.entry.call(slots)
    }

    pub fn ptr_eq(&self, other: &Kernel) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel").field("name", &self.0.name).field("params", &self.0.params).finish_non_exhaustive()
    }
}
