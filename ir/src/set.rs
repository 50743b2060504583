//! Iteration domains.

use std::fmt;
use std::sync::Arc;

use snafu::ensure;

use crate::error::{CoreSizeExceedsSizeSnafu, Result, SubsetIndexOutOfRangeSnafu, ZeroLayersSnafu};
use crate::next_id;

#[derive(Debug)]
struct SetInner {
    id: u64,
    name: String,
    size: usize,
    core_size: usize,
    layers: usize,
}

/// A count of homogeneous entities.
///
/// `[0, core_size)` is owned and needs no halo exchange; `[core_size, size)` is the
/// rest of the owned part. Cheap to clone; identity is preserved across clones.
#[derive(Clone)]
pub struct Set(Arc<SetInner>);

impl Set {
    /// Set whose entities are all core.
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        Self(Arc::new(SetInner { id: next_id(), name: name.into(), size, core_size: size, layers: 1 }))
    }

    pub fn with_core(name: impl Into<String>, size: usize, core_size: usize) -> Result<Self> {
        let name = name.into();
        ensure!(core_size <= size, CoreSizeExceedsSizeSnafu { name, core_size, size });
        Ok(Self(Arc::new(SetInner { id: next_id(), name, size, core_size, layers: 1 })))
    }

    /// Extruded set: every base entity is stacked into `layers` layers.
    pub fn layered(name: impl Into<String>, size: usize, layers: usize) -> Result<Self> {
        let name = name.into();
        ensure!(layers > 0, ZeroLayersSnafu { name });
        Ok(Self(Arc::new(SetInner { id: next_id(), name, size, core_size: size, layers })))
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn size(&self) -> usize {
        self.0.size
    }

    pub fn core_size(&self) -> usize {
        self.0.core_size
    }

    pub fn layers(&self) -> usize {
        self.0.layers
    }

    pub fn is_layered(&self) -> bool {
        self.0.layers > 1
    }

    pub fn ptr_eq(&self, other: &Set) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Set {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Set {}

impl fmt::Debug for Set {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Set")
            .field("name", &self.0.name)
            .field("size", &self.0.size)
            .field("core_size", &self.0.core_size)
            .field("layers", &self.0.layers)
            .finish()
    }
}

/// Restriction of a parent set to an explicit list of entities.
#[derive(Debug, Clone)]
pub struct Subset {
    parent: Set,
    indices: Arc<[usize]>,
}

impl Subset {
    pub fn new(parent: &Set, indices: Vec<usize>) -> Result<Self> {
        if let Some(&index) = indices.iter().find(|&&index| index >= parent.size()) {
            return SubsetIndexOutOfRangeSnafu { name: parent.name(), index, size: parent.size() }.fail();
        }
        Ok(Self { parent: parent.clone(), indices: indices.into() })
    }

    pub fn parent(&self) -> &Set {
        &self.parent
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }
}

/// What a loop iterates: a whole set or a subset of one.
#[derive(Debug, Clone)]
pub enum Domain {
    Set(Set),
    Subset(Subset),
}

impl Domain {
    /// The set whose entities are visited.
    pub fn set(&self) -> &Set {
        match self {
            Domain::Set(set) => set,
            Domain::Subset(subset) => subset.parent(),
        }
    }

    /// Number of iterations.
    pub fn len(&self) -> usize {
        match self {
            Domain::Set(set) => set.size(),
            Domain::Subset(subset) => subset.indices().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterations that touch only core entities. A subset has no core part.
    pub fn core_len(&self) -> usize {
        match self {
            Domain::Set(set) => set.core_size(),
            Domain::Subset(_) => 0,
        }
    }

    /// Parent entity visited by iteration `e`.
    pub fn entity(&self, e: usize) -> usize {
        match self {
            Domain::Set(_) => e,
            Domain::Subset(subset) => subset.indices()[e],
        }
    }

    pub fn is_layered(&self) -> bool {
        self.set().is_layered()
    }
}

impl From<Set> for Domain {
    fn from(set: Set) -> Self {
        Domain::Set(set)
    }
}

impl From<&Set> for Domain {
    fn from(set: &Set) -> Self {
        Domain::Set(set.clone())
    }
}

impl From<Subset> for Domain {
    fn from(subset: Subset) -> Self {
        Domain::Subset(subset)
    }
}
