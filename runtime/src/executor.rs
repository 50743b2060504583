//! Reference executor.
//!
//! Runs a loop one entity at a time: every argument is resolved to a slot (a copy of
//! the rows it addresses), the kernel is invoked positionally, and every non-READ
//! slot is written back to the location it came from.
//!
//! ```text
//! prepare:  fetch every Dat to host, hold READ-only Dats read-only
//! run:      for e in core part, then owned part:
//!               slots = resolve(args, entity(e))
//!               kernel(slots)
//!               write back non-READ slots
//! finish:   mark written Dats host-authoritative
//! ```

use std::ops::Range;

use snafu::{ResultExt, ensure};
use tessel_device::ReadOnlyGuard;
use tessel_ir::{Arg, ArgKind, ParLoop, Slot};
use tracing::{debug, trace};

use crate::error::{DeviceSnafu, KernelSnafu, LayeredSetUnsupportedSnafu, Result, StorageSnafu};

/// Run `par_loop` to completion on the host.
///
/// # Errors
///
/// Returns error if the set is layered, argument data cannot be staged, or the kernel
/// fails for some entity.
#[tracing::instrument(skip_all, fields(loop.kernel = par_loop.kernel().name(), loop.set = par_loop.set().name()))]
pub fn execute(par_loop: &ParLoop) -> Result<()> {
    ensure!(!par_loop.is_layered(), LayeredSetUnsupportedSnafu { set: par_loop.set().name() });

    let loops = std::slice::from_ref(par_loop);
    let guards = prepare(loops)?;

    let domain = par_loop.domain();
    let core = domain.core_len().min(domain.len());
    debug!(core, owned = domain.len() - core, "executing loop");
    run_range(par_loop, 0..core)?;
    run_range(par_loop, core..domain.len())?;

    drop(guards);
    finish(loops);
    Ok(())
}

/// Fetch every Dat argument of `loops` and hold read-only the Dats that no loop writes.
pub(crate) fn prepare(loops: &[ParLoop]) -> Result<Vec<ReadOnlyGuard<'_>>> {
    let mut guards = Vec::new();
    for par_loop in loops {
        for arg in par_loop.args() {
            let Some(dat) = arg.dat() else { continue };
            dat.cell().fetch().context(DeviceSnafu)?;
            if arg.access.is_read_only() && !loops.iter().any(|other| other.writes_data(dat.id())) {
                guards.push(dat.cell().read_only());
            }
        }
    }
    Ok(guards)
}

/// Every Dat touched by a non-READ argument becomes host-authoritative.
pub(crate) fn finish(loops: &[ParLoop]) {
    for arg in loops.iter().flat_map(ParLoop::args) {
        if arg.access.writes()
            && let Some(dat) = arg.dat()
        {
            dat.cell().mark_host();
        }
    }
}

pub(crate) fn run_range(par_loop: &ParLoop, iterations: Range<usize>) -> Result<()> {
    for e in iterations {
        run_entity(par_loop, par_loop.domain().entity(e))?;
    }
    Ok(())
}

/// Resolve, call, write back for a single entity.
pub(crate) fn run_entity(par_loop: &ParLoop, entity: usize) -> Result<()> {
    let kernel = par_loop.kernel();
    let mut slots = par_loop
        .args()
        .iter()
        .enumerate()
        .map(|(position, arg)| resolve(arg, position, entity))
        .collect::<Result<Vec<_>>>()?;

    kernel.call(&mut slots).context(KernelSnafu { kernel: kernel.name(), entity })?;

    for (arg, slot) in par_loop.args().iter().zip(&slots) {
        if arg.access.writes() {
            write_back(arg, entity, slot)?;
        }
    }
    trace!(entity, "entity done");
    Ok(())
}

fn resolve(arg: &Arg, position: usize, entity: usize) -> Result<Slot> {
    let storage = match &arg.kind {
        ArgKind::Global { global } => global.read().clone(),
        ArgKind::Direct { dat } | ArgKind::Indirect { dat, .. } | ArgKind::VectorIndirect { dat, .. } => {
            let host = dat.cell().read().context(DeviceSnafu)?;
            host.gather(&arg.rows(entity), dat.dim()).context(StorageSnafu)?
        }
    };
    Ok(Slot::new(position, storage, arg.access.writes()))
}

fn write_back(arg: &Arg, entity: usize, slot: &Slot) -> Result<()> {
    match &arg.kind {
        ArgKind::Global { global } => global.write(|data| data.copy_from(slot.storage())).context(StorageSnafu),
        ArgKind::Direct { dat } | ArgKind::Indirect { dat, .. } | ArgKind::VectorIndirect { dat, .. } => {
            let rows = arg.rows(entity);
            dat.cell()
                .write(|host| host.scatter(&rows, dat.dim(), slot.storage()))
                .context(DeviceSnafu)?
                .context(StorageSnafu)
        }
    }
}
