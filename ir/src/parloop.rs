use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;
use snafu::ensure;

use crate::arg::{Arg, ArgKind};
use crate::dat::Data;
use crate::error::{
    ArgCountMismatchSnafu, DirectSetMismatchSnafu, MapSourceMismatchSnafu, ParamDTypeMismatchSnafu,
    ParamMutabilityMismatchSnafu, ParamShapeMismatchSnafu, Result,
};
use crate::kernel::Kernel;
use crate::next_id;
use crate::set::{Domain, Set};

pub type Args = SmallVec<[Arg; 8]>;

struct ParLoopInner {
    id: u64,
    kernel: Kernel,
    domain: Domain,
    args: Args,
}

/// One kernel applied to every entity of a domain.
///
/// Built once, validated against the kernel's parameter list, then shared by the
/// trace, the fusion scheduler and the executors.
#[derive(Clone)]
pub struct ParLoop(Arc<ParLoopInner>);

impl ParLoop {
    pub fn new(kernel: &Kernel, domain: impl Into<Domain>, args: impl IntoIterator<Item = Arg>) -> Result<Self> {
        let domain = domain.into();
        let args: Args = args.into_iter().collect();
        validate(kernel, &domain, &args)?;
        Ok(Self(Arc::new(ParLoopInner { id: next_id(), kernel: kernel.clone(), domain, args })))
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn kernel(&self) -> &Kernel {
        &self.0.kernel
    }

    pub fn domain(&self) -> &Domain {
        &self.0.domain
    }

    pub fn set(&self) -> &Set {
        self.0.domain.set()
    }

    pub fn args(&self) -> &[Arg] {
        &self.0.args
    }

    /// Data read by this loop (`READ` or `RW`), in argument order.
    pub fn reads(&self) -> Vec<Data> {
        self.args().iter().filter(|arg| arg.access.reads()).map(Arg::data).collect()
    }

    /// Data written by this loop (any mode but `READ`), in argument order.
    pub fn writes(&self) -> Vec<Data> {
        self.args().iter().filter(|arg| arg.access.writes()).map(Arg::data).collect()
    }

    pub fn writes_data(&self, id: u64) -> bool {
        self.args().iter().any(|arg| arg.access.writes() && arg.data_id() == id)
    }

    /// Any Global argument with a non-READ mode. WRITE and RW count too: tiles running
    /// in parallel would race on the shared value, so such loops never fuse.
    pub fn reduces_global(&self) -> bool {
        self.args().iter().any(|arg| arg.is_global() && arg.access.writes())
    }

    pub fn is_layered(&self) -> bool {
        self.0.domain.is_layered()
    }

    pub fn ptr_eq(&self, other: &ParLoop) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ParLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParLoop")
            .field("kernel", &self.0.kernel.name())
            .field("set", &self.0.domain.set().name())
            .field("args", &self.0.args.len())
            .finish()
    }
}

fn validate(kernel: &Kernel, domain: &Domain, args: &[Arg]) -> Result<()> {
    let params = kernel.params();
    ensure!(
        params.len() == args.len(),
        ArgCountMismatchSnafu { kernel: kernel.name(), expected: params.len(), actual: args.len() }
    );

    let set = domain.set();
    for (position, (param, arg)) in params.iter().zip(args).enumerate() {
        let (expected, actual) = (param.dtype, arg.dtype());
        ensure!(expected == actual, ParamDTypeMismatchSnafu { kernel: kernel.name(), position, expected, actual });

        let (expected, actual) = (param.len, arg.slot_len());
        ensure!(expected == actual, ParamShapeMismatchSnafu { kernel: kernel.name(), position, expected, actual });

        ensure!(
            param.mutable == arg.access.writes(),
            ParamMutabilityMismatchSnafu { kernel: kernel.name(), position, access: arg.access }
        );

        match &arg.kind {
            ArgKind::Direct { dat } => ensure!(
                dat.set().ptr_eq(set),
                DirectSetMismatchSnafu { position, dat: dat.name(), dat_set: dat.set().name(), set: set.name() }
            ),
            ArgKind::Indirect { map, .. } | ArgKind::VectorIndirect { map, .. } => ensure!(
                map.source().ptr_eq(set),
                MapSourceMismatchSnafu { position, map: map.name(), source_set: map.source().name(), set: set.name() }
            ),
            ArgKind::Global { .. } => {}
        }
    }
    Ok(())
}
