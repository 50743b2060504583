//! Tiling-engine interface.
//!
//! An engine receives the structure of a loop chain ([`ChainDescriptor`]) and returns
//! a [`TilingPlan`]: a sequence of colors, each a set of tiles that can run
//! concurrently. The partitioning algorithm belongs to the engine; [`Untiled`] is a
//! trivially correct reference engine that runs every loop whole, one after another.

use std::fmt;
use std::sync::Arc;

use tessel_ir::{Access, Storage};
use tessel_runtime::{BuildOptions, Color, Tile, TileStep};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SetDescriptor {
    pub name: String,
    pub core_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapDescriptor {
    pub name: String,
    pub source: String,
    pub target: String,
    pub arity: usize,
    pub values: Vec<usize>,
}

/// How a loop argument reaches its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Direct,
    Map(String),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Direct => f.write_str("DIRECT"),
            Target::Map(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopDescriptor {
    pub kernel: String,
    pub set: String,
    /// Number of iterations of the loop's domain.
    pub iterations: usize,
    pub args: Vec<(Target, Access)>,
}

/// Coordinates an engine may use to emit debugging output of its partitioning.
#[derive(Debug, Clone, PartialEq)]
pub struct Coordinates {
    pub set: String,
    pub dim: usize,
    pub values: Storage,
}

/// Everything an engine learns about a chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainDescriptor {
    pub name: String,
    pub tile_size: usize,
    pub sets: Vec<SetDescriptor>,
    pub maps: Vec<MapDescriptor>,
    pub loops: Vec<LoopDescriptor>,
    pub coordinates: Option<Coordinates>,
    pub build_options: BuildOptions,
}

/// Compiled execution plan for one chain.
pub trait TilingPlan: Send + Sync + fmt::Debug {
    /// Colors in execution order.
    fn colors(&self) -> &[Color];
}

pub trait TilingEngine: Send + Sync {
    /// Inspect `chain` and build its plan. Failures are fatal for the chain.
    fn plan(&self, chain: &ChainDescriptor) -> Result<Arc<dyn TilingPlan>>;

    fn name(&self) -> &str;

    /// Library linked into generated inspectors.
    fn lib_name(&self) -> &str {
        "st"
    }

    /// Engine-specific compiler flags, on top of the include and link paths.
    fn compile_options(&self) -> BuildOptions {
        BuildOptions::default()
    }
}

/// Plan given as explicit colors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticPlan {
    colors: Vec<Color>,
}

impl StaticPlan {
    pub fn new(colors: Vec<Color>) -> Self {
        Self { colors }
    }
}

impl TilingPlan for StaticPlan {
    fn colors(&self) -> &[Color] {
        &self.colors
    }
}

/// One color per loop, one tile per color covering the whole domain.
#[derive(Debug, Default, Clone, Copy)]
pub struct Untiled;

impl TilingEngine for Untiled {
    fn plan(&self, chain: &ChainDescriptor) -> Result<Arc<dyn TilingPlan>> {
        let colors = chain
            .loops
            .iter()
            .enumerate()
            .map(|(loop_index, desc)| Color {
                tiles: vec![Tile { steps: vec![TileStep { loop_index, iterations: (0..desc.iterations).collect() }] }],
            })
            .collect();
        Ok(Arc::new(StaticPlan::new(colors)))
    }

    fn name(&self) -> &str {
        "untiled"
    }
}
