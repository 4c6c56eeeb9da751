//! Shape-identity keyed mapper cache.

use std::sync::Arc;

use dashmap::DashMap;
use dynashape_model::Shape;
use tracing::debug;

use crate::config::MapperConfig;
use crate::error::SchemaError;
use crate::mapper::{Mapper, ValuePath};

/// Memoizes one [`Mapper`] per `Arc<Shape>` instance.
///
/// Entries pin the shape `Arc`, so the address used as key cannot be reused
/// while the entry lives. Misses are built outside any shard lock; when two
/// threads race on the same shape the first insert wins and the other build
/// is dropped.
#[derive(Debug, Default)]
pub struct MapperCache {
    config: MapperConfig,
    entries: DashMap<usize, CacheEntry>,
}

#[derive(Debug)]
struct CacheEntry {
    _shape: Arc<Shape>,
    mapper: Arc<Mapper>,
}

impl MapperCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new(config: MapperConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
        }
    }

    /// The configuration every mapper in this cache is built with.
    #[must_use]
    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Return the mapper for `shape`, building it on first use.
    pub fn mapper_for(&self, shape: &Arc<Shape>) -> Result<Arc<Mapper>, SchemaError> {
        self.resolve(shape, &mut ValuePath::root())
    }

    pub(crate) fn resolve(
        &self,
        shape: &Arc<Shape>,
        path: &mut ValuePath,
    ) -> Result<Arc<Mapper>, SchemaError> {
        let key = Arc::as_ptr(shape) as usize;
        if let Some(entry) = self.entries.get(&key) {
            return Ok(Arc::clone(&entry.mapper));
        }
        debug!(kind = shape.kind().name(), %path, "building mapper");
        let mapper = Arc::new(Mapper::build(shape, self, path)?);
        let entry = self.entries.entry(key).or_insert_with(|| CacheEntry {
            _shape: Arc::clone(shape),
            mapper,
        });
        Ok(Arc::clone(&entry.mapper))
    }

    /// Number of cached mappers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when nothing has been built yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
