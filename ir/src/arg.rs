//! Loop arguments.
//!
//! An [`Arg`] binds one data array to one loop with an access mode. Addressing is a
//! single tagged enum; there is no per-backend argument type.

use smallvec::{SmallVec, smallvec};
use snafu::ensure;
use tessel_dtype::DType;

use crate::access::Access;
use crate::dat::{Dat, Data, Global};
use crate::error::{MapIndexOutOfRangeSnafu, MapTargetMismatchSnafu, Result};
use crate::map::Map;

/// How an argument's slot is located for one iteration entity.
#[derive(Debug, Clone)]
pub enum ArgKind {
    /// The entity's own row.
    Direct { dat: Dat },
    /// The row of `map[entity][index]`.
    Indirect { dat: Dat, map: Map, index: usize },
    /// All `arity` rows of `map[entity]`, concatenated.
    VectorIndirect { dat: Dat, map: Map },
    /// The whole array.
    Global { global: Global },
}

#[derive(Debug, Clone)]
pub struct Arg {
    pub access: Access,
    pub kind: ArgKind,
}

impl Arg {
    pub fn direct(dat: &Dat, access: Access) -> Self {
        Self { access, kind: ArgKind::Direct { dat: dat.clone() } }
    }

    pub fn indirect(dat: &Dat, map: &Map, index: usize, access: Access) -> Result<Self> {
        check_target(dat, map)?;
        ensure!(index < map.arity(), MapIndexOutOfRangeSnafu { map: map.name(), index, arity: map.arity() });
        Ok(Self { access, kind: ArgKind::Indirect { dat: dat.clone(), map: map.clone(), index } })
    }

    pub fn vector(dat: &Dat, map: &Map, access: Access) -> Result<Self> {
        check_target(dat, map)?;
        Ok(Self { access, kind: ArgKind::VectorIndirect { dat: dat.clone(), map: map.clone() } })
    }

    pub fn global(global: &Global, access: Access) -> Self {
        Self { access, kind: ArgKind::Global { global: global.clone() } }
    }

    pub fn data(&self) -> Data {
        match &self.kind {
            ArgKind::Direct { dat } | ArgKind::Indirect { dat, .. } | ArgKind::VectorIndirect { dat, .. } => {
                Data::Dat(dat.clone())
            }
            ArgKind::Global { global } => Data::Global(global.clone()),
        }
    }

    pub fn data_id(&self) -> u64 {
        match &self.kind {
            ArgKind::Direct { dat } | ArgKind::Indirect { dat, .. } | ArgKind::VectorIndirect { dat, .. } => dat.id(),
            ArgKind::Global { global } => global.id(),
        }
    }

    pub fn dat(&self) -> Option<&Dat> {
        match &self.kind {
            ArgKind::Direct { dat } | ArgKind::Indirect { dat, .. } | ArgKind::VectorIndirect { dat, .. } => Some(dat),
            ArgKind::Global { .. } => None,
        }
    }

    pub fn map(&self) -> Option<&Map> {
        match &self.kind {
            ArgKind::Indirect { map, .. } | ArgKind::VectorIndirect { map, .. } => Some(map),
            ArgKind::Direct { .. } | ArgKind::Global { .. } => None,
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self.kind, ArgKind::Global { .. })
    }

    pub fn dtype(&self) -> DType {
        match &self.kind {
            ArgKind::Direct { dat } | ArgKind::Indirect { dat, .. } | ArgKind::VectorIndirect { dat, .. } => dat.dtype(),
            ArgKind::Global { global } => global.dtype(),
        }
    }

    /// Number of elements the kernel sees in this argument's slot.
    pub fn slot_len(&self) -> usize {
        match &self.kind {
            ArgKind::Direct { dat } | ArgKind::Indirect { dat, .. } => dat.dim(),
            ArgKind::VectorIndirect { dat, map } => dat.dim() * map.arity(),
            ArgKind::Global { global } => global.dim(),
        }
    }

    /// Rows of the bound Dat resolved for `entity`; empty for globals.
    pub fn rows(&self, entity: usize) -> SmallVec<[usize; 4]> {
        match &self.kind {
            ArgKind::Direct { .. } => smallvec![entity],
            ArgKind::Indirect { map, index, .. } => smallvec![map.row(entity)[*index]],
            ArgKind::VectorIndirect { map, .. } => map.row(entity).iter().copied().collect(),
            ArgKind::Global { .. } => SmallVec::new(),
        }
    }
}

fn check_target(dat: &Dat, map: &Map) -> Result<()> {
    ensure!(
        map.target().ptr_eq(dat.set()),
        MapTargetMismatchSnafu { map: map.name(), target: map.target().name(), dat: dat.name(), set: dat.set().name() }
    );
    Ok(())
}

impl Dat {
    /// Bind this Dat through its iteration entity's own row.
    pub fn arg(&self, access: Access) -> Arg {
        Arg::direct(self, access)
    }

    /// Bind this Dat through column `index` of `map`.
    pub fn arg_via(&self, map: &Map, index: usize, access: Access) -> Result<Arg> {
        Arg::indirect(self, map, index, access)
    }

    /// Bind this Dat through every column of `map`.
    pub fn arg_vec(&self, map: &Map, access: Access) -> Result<Arg> {
        Arg::vector(self, map, access)
    }
}

impl Global {
    pub fn arg(&self, access: Access) -> Arg {
        Arg::global(self, access)
    }
}
