//! Scheduler configuration.
//!
//! Built explicitly with the bon builder or read from the environment.

use std::path::{Path, PathBuf};

use bon::bon;
use tessel_runtime::BuildOptions;
use tracing::warn;

/// Tile size used when a chain asks for 0.
pub const DEFAULT_TILE_SIZE: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Root directory of the tiling engine. Fusion is disabled without it.
    pub tiling_dir: Option<PathBuf>,
    /// Tile size substituted for chains that request 0.
    pub tile_size: usize,
    /// Disable fusion entirely.
    pub nofuse: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { tiling_dir: None, tile_size: DEFAULT_TILE_SIZE, nofuse: false }
    }
}

#[bon]
impl SchedulerConfig {
    #[builder]
    pub fn builder(
        #[builder(into)] tiling_dir: Option<PathBuf>,
        #[builder(default = DEFAULT_TILE_SIZE)] tile_size: usize,
        #[builder(default = false)] nofuse: bool,
    ) -> Self {
        Self { tiling_dir, tile_size, nofuse }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `TESSEL_TILING_DIR` - Tiling engine root directory (unset: no fusion)
    /// * `TESSEL_TILE_SIZE` - Default tile size (default: 256)
    /// * `TESSEL_NOFUSE` - Disable fusion if set
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// [`SchedulerConfig::from_env`] over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let tiling_dir = lookup("TESSEL_TILING_DIR").filter(|dir| !dir.is_empty()).map(PathBuf::from);
        let tile_size = match lookup("TESSEL_TILE_SIZE") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(value = %raw, "ignoring unparsable TESSEL_TILE_SIZE");
                DEFAULT_TILE_SIZE
            }),
            None => DEFAULT_TILE_SIZE,
        };
        let nofuse = lookup("TESSEL_NOFUSE").is_some();

        Self { tiling_dir, tile_size, nofuse }
    }

    pub fn tiling_dir(&self) -> Option<&Path> {
        self.tiling_dir.as_deref()
    }

    /// `requested`, or the configured default when 0.
    pub fn tile_size_for(&self, requested: usize) -> usize {
        if requested == 0 { self.tile_size } else { requested }
    }

    /// Flags needed to build against the tiling engine installed at `tiling_dir`.
    pub fn engine_build_options(&self, lib_name: &str) -> Option<BuildOptions> {
        let dir = self.tiling_dir()?;
        Some(
            BuildOptions::default()
                .include(dir.join("sparsetiling").join("include").display().to_string())
                .link_dir(dir.join("lib").display().to_string())
                .link(lib_name),
        )
    }
}
