//! Tiled execution of a fused loop chain.
//!
//! A plan partitions the fused iteration space into tiles and groups tiles into
//! colors. Colors run one after another; the tiles of one color run in parallel.
//! Inside a tile, steps run in order and each step applies one loop's kernel to an
//! explicit list of its iterations with the reference per-entity semantics.
//!
//! Tiles of one color must not conflict; that is the tiling engine's guarantee, not
//! something checked here.

use parking_lot::Mutex;
use snafu::ensure;
use tessel_ir::ParLoop;
use tracing::{debug, trace};

use crate::error::{Error, LayeredSetUnsupportedSnafu, PlanIterationOutOfRangeSnafu, PlanLoopOutOfRangeSnafu, Result};
use crate::executor::{finish, prepare, run_entity};

/// Iterations of one loop visited by a tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileStep {
    /// Position of the loop in the fused chain.
    pub loop_index: usize,
    /// Iteration indices into the loop's domain, in visiting order.
    pub iterations: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tile {
    pub steps: Vec<TileStep>,
}

/// Tiles that may run concurrently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Color {
    pub tiles: Vec<Tile>,
}

/// Run `loops` following `colors`.
///
/// Colors run one after another; the tiles of a color run concurrently on rayon.
///
/// # Arguments
///
/// * `loops` - The fused chain, in issue order
/// * `colors` - Tiling plan whose steps index into `loops`
///
/// # Errors
///
/// * [`Error::PlanLoopOutOfRange`] / [`Error::PlanIterationOutOfRange`] - the plan does
///   not fit `loops`; checked before anything runs
/// * [`Error::LayeredSetUnsupported`] - a loop iterates a layered set
/// * [`Error::Kernel`] - a kernel call failed
/// * [`Error::Device`] / [`Error::Storage`] - argument data could not be staged
#[tracing::instrument(skip_all, fields(loops = loops.len(), colors = colors.len()))]
pub fn execute_tiled(loops: &[ParLoop], colors: &[Color]) -> Result<()> {
    validate(loops, colors)?;
    let guards = prepare(loops)?;

    for (color_index, color) in colors.iter().enumerate() {
        debug!(color = color_index, tiles = color.tiles.len(), "executing color");
        match color.tiles.as_slice() {
            [] => {}
            [tile] => run_tile(loops, tile)?,
            tiles => run_parallel(loops, tiles)?,
        }
    }

    drop(guards);
    finish(loops);
    Ok(())
}

fn run_parallel(loops: &[ParLoop], tiles: &[Tile]) -> Result<()> {
    let errors: Mutex<Vec<Error>> = Mutex::new(Vec::new());

    rayon::scope(|s| {
        for tile in tiles {
            let errors = &errors;
            s.spawn(move |_| {
                if let Err(e) = run_tile(loops, tile) {
                    errors.lock().push(e);
                }
            });
        }
    });

    match errors.into_inner().into_iter().next() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn run_tile(loops: &[ParLoop], tile: &Tile) -> Result<()> {
    for step in &tile.steps {
        let par_loop = &loops[step.loop_index];
        trace!(loop.kernel = par_loop.kernel().name(), iterations = step.iterations.len(), "tile step");
        for &e in &step.iterations {
            run_entity(par_loop, par_loop.domain().entity(e))?;
        }
    }
    Ok(())
}

/// Reject plans that reference loops or iterations that do not exist.
fn validate(loops: &[ParLoop], colors: &[Color]) -> Result<()> {
    for par_loop in loops {
        ensure!(!par_loop.is_layered(), LayeredSetUnsupportedSnafu { set: par_loop.set().name() });
    }

    let steps = colors.iter().flat_map(|color| &color.tiles).flat_map(|tile| &tile.steps);
    for step in steps {
        ensure!(step.loop_index < loops.len(), PlanLoopOutOfRangeSnafu { index: step.loop_index, loops: loops.len() });
        let par_loop = &loops[step.loop_index];
        let len = par_loop.domain().len();
        if let Some(&iteration) = step.iterations.iter().find(|&&iteration| iteration >= len) {
            return PlanIterationOutOfRangeSnafu { kernel: par_loop.kernel().name(), iteration, len }.fail();
        }
    }
    Ok(())
}
