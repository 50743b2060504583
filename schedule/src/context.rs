//! Scheduler context.
//!
//! A [`Runtime`] owns everything that would otherwise be process-wide: the lazy
//! trace, the inspector cache, the unroll state machine, the tiling engine and the
//! configuration. Independent runtimes do not share any of it.
//!
//! The trace lock is held while forced nodes execute, so kernels must not call back
//! into the runtime that runs them.

use std::sync::Arc;

use bon::bon;
use parking_lot::{Mutex, RwLockReadGuard};
use snafu::ResultExt;
use tessel_ir::{Dat, Data, Global, ParLoop, Storage};
use tracing::{debug, warn};

use crate::chain::{ChainOptions, ChainScope, OpenChain};
use crate::config::SchedulerConfig;
use crate::error::{ChainAlreadyOpenSnafu, DeviceSnafu, Error, Result};
use crate::fusion::{Fuser, Fusion};
use crate::inspector::InspectorCache;
use crate::tiling::TilingEngine;
use crate::trace::{Node, Trace};
use crate::unroll::{Decision, UnrollState, UnrollTracker};

pub struct Runtime {
    config: SchedulerConfig,
    engine: Option<Arc<dyn TilingEngine>>,
    trace: Mutex<Trace>,
    inspectors: InspectorCache,
    unroll: Mutex<UnrollTracker>,
    chain: Mutex<Option<OpenChain>>,
}

#[bon]
impl Runtime {
    #[builder]
    pub fn builder(#[builder(default)] config: SchedulerConfig, engine: Option<Arc<dyn TilingEngine>>) -> Self {
        Self {
            config,
            engine,
            trace: Mutex::new(Trace::new()),
            inspectors: InspectorCache::new(),
            unroll: Mutex::new(UnrollTracker::new()),
            chain: Mutex::new(None),
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Runtime {
    pub fn new(config: SchedulerConfig) -> Self {
        Self::builder().config(config).build()
    }

    /// Runtime configured from `TESSEL_*` environment variables.
    pub fn from_env() -> Self {
        Self::new(SchedulerConfig::from_env())
    }

    pub fn with_engine(mut self, engine: Arc<dyn TilingEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn inspectors(&self) -> &InspectorCache {
        &self.inspectors
    }

    /// Queue `par_loop`; it runs when its results are needed.
    ///
    /// Returns the trace sequence number of the queued loop.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TracePoisoned`] once an earlier kernel has failed.
    pub fn par_loop(&self, par_loop: ParLoop) -> Result<u64> {
        self.trace.lock().append(Node::Loop(par_loop))
    }

    /// Run pending work up to the last writer of `data`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Execution`] if a kernel in the forced prefix fails, after which
    /// the runtime is poisoned, and [`Error::TracePoisoned`] if it already was.
    pub fn force(&self, data: &Data) -> Result<()> {
        self.trace.lock().force(data.id())
    }

    /// Run all pending work.
    pub fn flush(&self) -> Result<()> {
        self.trace.lock().force_all()
    }

    /// Host view of `dat` with every pending writer applied.
    ///
    /// # Errors
    ///
    /// Same as [`Runtime::force`], plus [`Error::Device`] when the host copy cannot be
    /// read back.
    pub fn read<'d>(&self, dat: &'d Dat) -> Result<RwLockReadGuard<'d, Storage>> {
        self.force(&Data::from(dat))?;
        dat.cell().read().context(DeviceSnafu)
    }

    pub fn read_global(&self, global: &Global) -> Result<Storage> {
        self.force(&Data::from(global))?;
        Ok(global.read().clone())
    }

    /// Host-side update of `dat` once every pending loop is done with it.
    ///
    /// # Errors
    ///
    /// Same as [`Runtime::flush`], plus [`Error::Device`] when the device copy cannot
    /// be refreshed.
    pub fn write<R>(&self, dat: &Dat, f: impl FnOnce(&mut Storage) -> R) -> Result<R> {
        self.flush()?;
        dat.cell().write(f).context(DeviceSnafu)
    }

    pub fn pending(&self) -> usize {
        self.trace.lock().len()
    }

    /// Snapshot of the pending nodes in trace order.
    pub fn pending_nodes(&self) -> Vec<Node> {
        self.trace.lock().pending().map(|entry| entry.node.clone()).collect()
    }

    pub fn is_poisoned(&self) -> bool {
        self.trace.lock().is_poisoned()
    }

    pub fn unroll_state(&self) -> UnrollState {
        self.unroll.lock().state().clone()
    }

    pub fn active_chain(&self) -> Option<String> {
        self.chain.lock().as_ref().map(|open| open.name.clone())
    }

    /// Fuse `loops` directly, outside any chain scope.
    pub fn fuse(&self, name: &str, loops: Vec<ParLoop>, tile_size: usize) -> Result<Fusion> {
        self.fuser().fuse(name, loops, tile_size, None)
    }

    fn fuser(&self) -> Fuser<'_> {
        Fuser { config: &self.config, engine: self.engine.as_deref(), inspectors: &self.inspectors }
    }

    /// Open chain `name`; loops issued until the scope closes belong to it.
    ///
    /// # Arguments
    ///
    /// * `name` - Chain name, also the key of its cached inspector
    /// * `options` - Tile size, time unrolling and inspection coordinates
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChainAlreadyOpen`] if another chain is open; chains do not nest.
    pub fn loop_chain(&self, name: &str, options: ChainOptions) -> Result<ChainScope<'_>> {
        let mut chain = self.chain.lock();
        if let Some(active) = chain.as_ref() {
            return ChainAlreadyOpenSnafu { active: active.name.as_str(), requested: name }.fail();
        }
        let start = self.trace.lock().next_seq();
        debug!(chain.name = name, start, time_unroll = options.time_unroll, "loop chain opened");
        *chain = Some(OpenChain { name: name.to_string(), start, options });
        Ok(ChainScope::new(self, name.to_string()))
    }

    /// Run `body` inside chain `name`, closing it on success and abandoning it on error.
    ///
    /// # Errors
    ///
    /// Returns whatever [`Runtime::loop_chain`] or `body` returns, or the error of closing
    /// the chain, e.g. [`Error::Engine`] when inspection fails.
    pub fn with_loop_chain<T>(
        &self,
        name: &str,
        options: ChainOptions,
        body: impl FnOnce(&Self) -> Result<T>,
    ) -> Result<T> {
        let scope = self.loop_chain(name, options)?;
        let value = body(self)?;
        scope.close()?;
        Ok(value)
    }

    pub(crate) fn abandon_chain(&self) {
        if let Some(open) = self.chain.lock().take() {
            warn!(chain.name = %open.name, "loop chain abandoned; loops run unfused");
        }
    }

    pub(crate) fn end_chain(&self) -> Result<()> {
        let Some(open) = self.chain.lock().take() else {
            return Ok(());
        };
        let segment = self.trace.lock().loops_since(open.start);
        let decision = self.unroll.lock().boundary(&open.name, open.options.time_unroll, segment);
        let Decision::Fuse(items) = decision else {
            return Ok(());
        };

        let (seqs, loops): (Vec<u64>, Vec<ParLoop>) = items.into_iter().unzip();
        let fusion = self.fuser().fuse(&open.name, loops, open.options.tile_size, open.options.coords.as_ref())?;
        let Fusion::Fused(fused) = fusion else {
            return Ok(());
        };

        match self.trace.lock().replace(&seqs, Node::Fused(fused)) {
            Ok(()) => Ok(()),
            Err(e @ (Error::RewriteCrossesFlush { .. } | Error::NotPending { .. } | Error::NotContiguous { .. })) => {
                warn!(chain.name = %open.name, error = %e, "fused chain no longer pending; loops run unfused");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .field("engine", &self.engine.as_ref().map(|engine| engine.name().to_string()))
            .field("pending", &self.trace.lock().len())
            .field("inspectors", &self.inspectors)
            .finish()
    }
}
