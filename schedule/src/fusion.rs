//! Loop-chain fusion.
//!
//! [`Fuser::fuse`] decides whether a chain of loops can become one fused unit, and if
//! so describes the chain to the tiling engine (once per chain name) and builds a
//! [`FusedLoop`] whose arguments are the union of the chain's arguments with merged
//! access modes. Every reason not to fuse is a warning or a debug event, never an
//! error: the loops are handed back untouched and run one by one.

use std::fmt;
use std::sync::Arc;

use snafu::ResultExt;
use tessel_ir::{Access, Arg, Dat, Data, ParLoop};
use tessel_runtime::execute_tiled;
use tracing::{debug, warn};

use crate::config::SchedulerConfig;
use crate::error::{ExecutionSnafu, Result};
use crate::inspector::{Inspector, InspectorCache};
use crate::tiling::{
    ChainDescriptor, Coordinates, LoopDescriptor, MapDescriptor, SetDescriptor, Target, TilingEngine, TilingPlan,
};

/// Outcome of [`Fuser::fuse`].
#[derive(Debug, Clone)]
pub enum Fusion {
    Fused(FusedLoop),
    /// The input loops, same order, same objects.
    Unfused(Vec<ParLoop>),
}

impl Fusion {
    pub fn is_fused(&self) -> bool {
        matches!(self, Fusion::Fused(_))
    }
}

struct FusedInner {
    name: String,
    loops: Vec<ParLoop>,
    args: Vec<Arg>,
    inspector: Arc<Inspector>,
    plan: Arc<dyn TilingPlan>,
}

/// Chain of loops executed as one unit through a tiling plan.
#[derive(Clone)]
pub struct FusedLoop(Arc<FusedInner>);

impl FusedLoop {
    fn new(name: &str, loops: Vec<ParLoop>, inspector: Arc<Inspector>, plan: Arc<dyn TilingPlan>) -> Self {
        let args = merge_args(&loops);
        Self(Arc::new(FusedInner { name: name.to_string(), loops, args, inspector, plan }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn loops(&self) -> &[ParLoop] {
        &self.0.loops
    }

    /// One argument per distinct data array, in first-appearance order, with the
    /// merged access mode.
    pub fn args(&self) -> &[Arg] {
        &self.0.args
    }

    pub fn inspector(&self) -> &Arc<Inspector> {
        &self.0.inspector
    }

    pub fn reads(&self) -> Vec<Data> {
        self.args().iter().filter(|arg| arg.access.reads()).map(Arg::data).collect()
    }

    pub fn writes(&self) -> Vec<Data> {
        self.args().iter().filter(|arg| arg.access.writes()).map(Arg::data).collect()
    }

    pub fn writes_data(&self, id: u64) -> bool {
        self.args().iter().any(|arg| arg.access.writes() && arg.data_id() == id)
    }

    /// Run the chain following the inspector's plan.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Execution`] if a kernel fails or the plan does not fit
    /// the chain's loops.
    #[tracing::instrument(skip_all, fields(chain.name = %self.0.name))]
    pub fn execute(&self) -> Result<()> {
        execute_tiled(&self.0.loops, self.0.plan.colors()).context(ExecutionSnafu)
    }
}

impl fmt::Debug for FusedLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FusedLoop")
            .field("name", &self.0.name)
            .field("loops", &self.0.loops.len())
            .field("args", &self.0.args.len())
            .finish()
    }
}

/// Union of the chain's arguments keyed by data array.
///
/// A `READ` of data an earlier loop of the chain overwrote with `WRITE` sees the
/// chain's own values, so the merged argument stays `WRITE`.
pub(crate) fn merge_args(loops: &[ParLoop]) -> Vec<Arg> {
    let mut merged: Vec<Arg> = Vec::new();
    for arg in loops.iter().flat_map(ParLoop::args) {
        match merged.iter_mut().find(|seen| seen.data_id() == arg.data_id()) {
            Some(seen) if seen.access == Access::Write && arg.access == Access::Read => {}
            Some(seen) => seen.access = seen.access.merge(arg.access),
            None => merged.push(arg.clone()),
        }
    }
    merged
}

/// Fusion inputs owned by a scheduler context.
pub struct Fuser<'a> {
    pub config: &'a SchedulerConfig,
    pub engine: Option<&'a dyn TilingEngine>,
    pub inspectors: &'a InspectorCache,
}

impl Fuser<'_> {
    /// Fuse `loops` into one unit named `name`, or hand them back unfused.
    ///
    /// Loops come back unfused when fusion is disabled or unconfigured, when no engine
    /// is registered, and when any loop writes a Global or iterates a layered set.
    ///
    /// # Arguments
    ///
    /// * `name` - Chain name; the inspector cached under it is reused
    /// * `loops` - Loops in issue order
    /// * `tile_size` - Requested tile size, `0` for the configured default
    /// * `coords` - Optional coordinates handed to the engine for partitioning
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Engine`] if the tiling engine fails for `name`. The failure
    /// is cached with the inspector and returned again on later calls.
    #[tracing::instrument(skip_all, fields(chain.name = %name, loops = loops.len()))]
    pub fn fuse(&self, name: &str, loops: Vec<ParLoop>, tile_size: usize, coords: Option<&Dat>) -> Result<Fusion> {
        if self.config.nofuse {
            debug!("fusion disabled by configuration");
            return Ok(Fusion::Unfused(loops));
        }
        if self.config.tiling_dir().is_none() {
            warn!("set TESSEL_TILING_DIR to the location of the tiling engine");
            warn!("loops won't be fused, and plain loops will be executed");
            return Ok(Fusion::Unfused(loops));
        }
        let Some(engine) = self.engine else {
            warn!("no tiling engine registered; loops won't be fused");
            return Ok(Fusion::Unfused(loops));
        };
        if loops.is_empty() {
            return Ok(Fusion::Unfused(loops));
        }

        if let Some(par_loop) = loops.iter().find(|par_loop| par_loop.reduces_global() || par_loop.is_layered()) {
            debug!(loop.kernel = par_loop.kernel().name(), "chain not eligible for fusion");
            return Ok(Fusion::Unfused(loops));
        }

        let tile_size = self.config.tile_size_for(tile_size);
        let inspector = self.inspectors.get_or_create(name, tile_size);
        let plan = inspector.inspect(engine, || self.describe(name, &loops, inspector.tile_size(), engine, coords))?;

        debug!(tile_size = inspector.tile_size(), colors = plan.colors().len(), "loop chain fused");
        Ok(Fusion::Fused(FusedLoop::new(name, loops, inspector, plan)))
    }

    fn describe(
        &self,
        name: &str,
        loops: &[ParLoop],
        tile_size: usize,
        engine: &dyn TilingEngine,
        coords: Option<&Dat>,
    ) -> ChainDescriptor {
        let mut sets: Vec<SetDescriptor> = Vec::new();
        let mut maps: Vec<MapDescriptor> = Vec::new();
        let mut descriptors = Vec::with_capacity(loops.len());

        for par_loop in loops {
            let set = par_loop.set();
            let desc = SetDescriptor { name: set.name().to_string(), core_size: set.core_size() };
            if !sets.contains(&desc) {
                sets.push(desc);
            }

            let mut args = Vec::with_capacity(par_loop.args().len());
            for arg in par_loop.args() {
                let target = match arg.map() {
                    Some(map) => {
                        if !maps.iter().any(|seen| seen.name == map.name()) {
                            maps.push(MapDescriptor {
                                name: map.name().to_string(),
                                source: map.source().name().to_string(),
                                target: map.target().name().to_string(),
                                arity: map.arity(),
                                values: map.values().to_vec(),
                            });
                        }
                        Target::Map(map.name().to_string())
                    }
                    None => Target::Direct,
                };
                args.push((target, arg.access));
            }

            descriptors.push(LoopDescriptor {
                kernel: par_loop.kernel().name().to_string(),
                set: set.name().to_string(),
                iterations: par_loop.domain().len(),
                args,
            });
        }

        let coordinates = coords.and_then(|dat| match dat.cell().read() {
            Ok(values) => Some(Coordinates { set: dat.set().name().to_string(), dim: dat.dim(), values: values.clone() }),
            Err(e) => {
                warn!(error = %e, dat = dat.name(), "coordinates unavailable for inspection");
                None
            }
        });

        let build_options = self
            .config
            .engine_build_options(engine.lib_name())
            .map(|options| engine.compile_options().merged(&options))
            .unwrap_or_default();

        ChainDescriptor {
            name: name.to_string(),
            tile_size,
            sets,
            maps,
            loops: descriptors,
            coordinates,
            build_options,
        }
    }
}
