//! Data arrays: per-entity [`Dat`]s and set-less [`Global`]s.

use std::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};
use snafu::ensure;
use tessel_device::DataCell;
use tessel_dtype::{DType, HasDType, Storage};

use crate::error::{DataLengthMismatchSnafu, Result, ZeroDimSnafu};
use crate::next_id;
use crate::set::Set;

struct DatInner {
    id: u64,
    name: String,
    set: Set,
    dim: usize,
    cell: DataCell,
}

/// Typed array holding `dim` elements per entity of a set.
///
/// Host storage and the optional device copy live in a [`DataCell`], which also
/// tracks which of them is authoritative.
#[derive(Clone)]
pub struct Dat(Arc<DatInner>);

impl Dat {
    pub fn new(name: impl Into<String>, set: &Set, dim: usize, storage: Storage) -> Result<Self> {
        let name = name.into();
        ensure!(dim > 0, ZeroDimSnafu { name });
        let expected = set.size() * dim;
        ensure!(storage.len() == expected, DataLengthMismatchSnafu { name, expected, actual: storage.len() });

        Ok(Self(Arc::new(DatInner { id: next_id(), name, set: set.clone(), dim, cell: DataCell::new(storage) })))
    }

    pub fn from_vec<T: HasDType>(name: impl Into<String>, set: &Set, dim: usize, values: Vec<T>) -> Result<Self> {
        Self::new(name, set, dim, Storage::from_vec(values))
    }

    pub fn zeros(name: impl Into<String>, set: &Set, dim: usize, dtype: DType) -> Result<Self> {
        Self::new(name, set, dim, Storage::zeros(dtype, set.size() * dim))
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn set(&self) -> &Set {
        &self.0.set
    }

    pub fn dim(&self) -> usize {
        self.0.dim
    }

    pub fn dtype(&self) -> DType {
        self.0.cell.dtype()
    }

    /// Host storage and authority state.
    pub fn cell(&self) -> &DataCell {
        &self.0.cell
    }

    pub fn ptr_eq(&self, other: &Dat) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Dat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dat")
            .field("name", &self.0.name)
            .field("set", &self.0.set.name())
            .field("dim", &self.0.dim)
            .field("authority", &self.0.cell.authority())
            .finish()
    }
}

struct GlobalInner {
    id: u64,
    name: String,
    dim: usize,
    data: RwLock<Storage>,
}

/// Small host-resident array not indexed by any set.
///
/// Used for reductions and constants; kernels always see the whole array.
#[derive(Clone)]
pub struct Global(Arc<GlobalInner>);

impl Global {
    pub fn new(name: impl Into<String>, dim: usize, storage: Storage) -> Result<Self> {
        let name = name.into();
        ensure!(dim > 0, ZeroDimSnafu { name });
        ensure!(storage.len() == dim, DataLengthMismatchSnafu { name, expected: dim, actual: storage.len() });
        Ok(Self(Arc::new(GlobalInner { id: next_id(), name, dim, data: RwLock::new(storage) })))
    }

    pub fn from_vec<T: HasDType>(name: impl Into<String>, values: Vec<T>) -> Result<Self> {
        let dim = values.len();
        Self::new(name, dim, Storage::from_vec(values))
    }

    pub fn scalar<T: HasDType>(name: impl Into<String>, value: T) -> Self {
        Self(Arc::new(GlobalInner {
            id: next_id(),
            name: name.into(),
            dim: 1,
            data: RwLock::new(Storage::from_vec(vec![value])),
        }))
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn dim(&self) -> usize {
        self.0.dim
    }

    pub fn dtype(&self) -> DType {
        self.0.data.read().dtype()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Storage> {
        self.0.data.read()
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut Storage) -> R) -> R {
        f(&mut self.0.data.write())
    }

    /// First element, the usual way to read back a scalar reduction.
    pub fn value<T: HasDType>(&self) -> Option<T> {
        self.0.data.read().as_slice::<T>().and_then(|values| values.first().copied())
    }

    pub fn ptr_eq(&self, other: &Global) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Global {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Global").field("name", &self.0.name).field("dim", &self.0.dim).finish()
    }
}

/// Either kind of data array, as found in read- and write-sets.
#[derive(Debug, Clone)]
pub enum Data {
    Dat(Dat),
    Global(Global),
}

impl Data {
    pub fn id(&self) -> u64 {
        match self {
            Data::Dat(dat) => dat.id(),
            Data::Global(global) => global.id(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Data::Dat(dat) => dat.name(),
            Data::Global(global) => global.name(),
        }
    }

    pub fn as_dat(&self) -> Option<&Dat> {
        match self {
            Data::Dat(dat) => Some(dat),
            Data::Global(_) => None,
        }
    }
}

impl PartialEq for Data {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Data {}

impl From<&Dat> for Data {
    fn from(dat: &Dat) -> Self {
        Data::Dat(dat.clone())
    }
}

impl From<&Global> for Data {
    fn from(global: &Global) -> Self {
        Data::Global(global.clone())
    }
}
