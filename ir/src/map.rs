use std::fmt;
use std::sync::Arc;

use snafu::ensure;

use crate::error::{MapLengthMismatchSnafu, MapValueOutOfRangeSnafu, Result, ZeroAritySnafu};
use crate::next_id;
use crate::set::Set;

#[derive(Debug)]
struct MapInner {
    id: u64,
    name: String,
    source: Set,
    target: Set,
    arity: usize,
    values: Arc<[usize]>,
}

/// Fixed-arity indirection from entities of `source` to entities of `target`.
///
/// Stored row-major: row `e` is `values[e * arity..(e + 1) * arity]`.
#[derive(Clone)]
pub struct Map(Arc<MapInner>);

impl Map {
    pub fn new(name: impl Into<String>, source: &Set, target: &Set, arity: usize, values: Vec<usize>) -> Result<Self> {
        let name = name.into();
        ensure!(arity > 0, ZeroAritySnafu { name });

        let expected = source.size() * arity;
        ensure!(values.len() == expected, MapLengthMismatchSnafu { name, expected, actual: values.len() });

        if let Some((position, &value)) = values.iter().enumerate().find(|(_, value)| **value >= target.size()) {
            return MapValueOutOfRangeSnafu { name, position, value, size: target.size() }.fail();
        }

        Ok(Self(Arc::new(MapInner {
            id: next_id(),
            name,
            source: source.clone(),
            target: target.clone(),
            arity,
            values: values.into(),
        })))
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn source(&self) -> &Set {
        &self.0.source
    }

    pub fn target(&self) -> &Set {
        &self.0.target
    }

    pub fn arity(&self) -> usize {
        self.0.arity
    }

    pub fn values(&self) -> &[usize] {
        &self.0.values
    }

    /// Targets of source entity `entity`.
    pub fn row(&self, entity: usize) -> &[usize] {
        let arity = self.0.arity;
        &self.0.values[entity * arity..(entity + 1) * arity]
    }

    pub fn ptr_eq(&self, other: &Map) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Map")
            .field("name", &self.0.name)
            .field("source", &self.0.source.name())
            .field("target", &self.0.target.name())
            .field("arity", &self.0.arity)
            .finish_non_exhaustive()
    }
}
