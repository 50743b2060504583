//! Memoized chain inspection.
//!
//! One [`Inspector`] per chain name and scheduler context. The first caller runs the
//! tiling engine; concurrent callers block until that finishes and then share the
//! outcome. Later callers get the cached plan, or the cached failure, without the
//! chain being described again.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use papaya::HashMap;
use tracing::{debug, error};

use crate::error::{EngineSnafu, Error, Result};
use crate::tiling::{ChainDescriptor, TilingEngine, TilingPlan};

/// Outcome of the single engine run of an inspector.
#[derive(Debug)]
enum Inspection {
    Planned(Arc<dyn TilingPlan>),
    Failed { engine: String, reason: String },
}

#[derive(Debug)]
pub struct Inspector {
    name: String,
    tile_size: usize,
    inspection: OnceCell<Inspection>,
}

impl Inspector {
    pub fn new(name: impl Into<String>, tile_size: usize) -> Self {
        Self { name: name.into(), tile_size, inspection: OnceCell::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tile_size(&self) -> usize {
        self.tile_size
    }

    /// The engine has run, successfully or not.
    pub fn is_initialized(&self) -> bool {
        self.inspection.get().is_some()
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.inspection.get(), Some(Inspection::Failed { .. }))
    }

    pub fn plan(&self) -> Option<&Arc<dyn TilingPlan>> {
        match self.inspection.get()? {
            Inspection::Planned(plan) => Some(plan),
            Inspection::Failed { .. } => None,
        }
    }

    /// Plan for this chain, running `engine` on the first call only.
    ///
    /// `describe` is only called when the engine runs. Concurrent callers block until
    /// the run finishes and share its outcome.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Engine`] when the engine fails. The failure is remembered:
    /// every later call returns the same error without running the engine again.
    pub fn inspect(
        &self,
        engine: &dyn TilingEngine,
        describe: impl FnOnce() -> ChainDescriptor,
    ) -> Result<Arc<dyn TilingPlan>> {
        let inspection = self.inspection.get_or_init(|| {
            let chain = describe();
            debug!(
                chain.name = %self.name,
                engine = engine.name(),
                loops = chain.loops.len(),
                tile_size = self.tile_size,
                "inspecting loop chain"
            );
            match engine.plan(&chain) {
                Ok(plan) => Inspection::Planned(plan),
                Err(e) => {
                    let reason = match e {
                        Error::Engine { reason, .. } => reason,
                        other => other.to_string(),
                    };
                    error!(chain.name = %self.name, engine = engine.name(), %reason, "tiling engine failed");
                    Inspection::Failed { engine: engine.name().to_string(), reason }
                }
            }
        });

        match inspection {
            Inspection::Planned(plan) => Ok(Arc::clone(plan)),
            Inspection::Failed { engine, reason } => {
                EngineSnafu { engine: engine.as_str(), chain: self.name.as_str(), reason: reason.as_str() }.fail()
            }
        }
    }
}

/// Inspectors keyed by chain name.
#[derive(Default)]
pub struct InspectorCache {
    inspectors: HashMap<String, Arc<Inspector>>,
}

impl InspectorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspector for `name`, created with `tile_size` if absent.
    ///
    /// An existing inspector is returned as is, whatever its tile size.
    pub fn get_or_create(&self, name: &str, tile_size: usize) -> Arc<Inspector> {
        let guard = self.inspectors.guard();
        if let Some(existing) = self.inspectors.get(name, &guard) {
            return Arc::clone(existing);
        }

        let created = Arc::new(Inspector::new(name, tile_size));
        use papaya::{Compute, Operation};
        match self.inspectors.compute(
            name.to_string(),
            |entry| match entry {
                Some((_, existing)) => Operation::Abort(Arc::clone(existing)),
                None => Operation::Insert(Arc::clone(&created)),
            },
            &guard,
        ) {
            Compute::Inserted(_, inspector) => Arc::clone(inspector),
            Compute::Aborted(inspector) => inspector,
            _ => created,
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<Inspector>> {
        self.inspectors.pin().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.inspectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inspectors.is_empty()
    }

    pub fn clear(&self) {
        self.inspectors.pin().clear();
    }
}

impl std::fmt::Debug for InspectorCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InspectorCache").field("inspectors", &self.inspectors.len()).finish()
    }
}
