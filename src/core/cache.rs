//! # Descriptor Cache
//!
//! Process-wide map from message type to its resolved [`RecordDescriptor`].
//!
//! Descriptors are immutable once built, so lookups hand out shared `Arc`s and
//! encode/decode never holds the lock. Resolution runs outside the lock; two
//! threads racing on the same type may both resolve it and the later write
//! simply overwrites an equal descriptor.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use tracing::trace;

use crate::core::descriptor::{resolve, RecordDescriptor, Structure};
use crate::error::{constants, ProtocolError, Result};
use crate::utils::metrics;

type Entry = Arc<dyn Any + Send + Sync>;

/// Thread-safe cache of resolved descriptors keyed by type
#[derive(Default)]
pub struct DescriptorCache {
    entries: RwLock<HashMap<TypeId, Entry>>,
}

impl DescriptorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached descriptor for `S`, resolving it on first use
    pub fn descriptor<S: Structure>(&self) -> Result<Arc<RecordDescriptor<S>>> {
        let key = TypeId::of::<S>();

        let cached = {
            let entries = self
                .entries
                .read()
                .map_err(|_| ProtocolError::Custom(constants::ERR_CACHE_READ_LOCK.into()))?;
            entries.get(&key).cloned()
        };

        if let Some(entry) = cached {
            metrics::global().cache_hit();
            return entry
                .downcast::<RecordDescriptor<S>>()
                .map_err(|_| ProtocolError::Custom(constants::ERR_CACHE_TYPE_MISMATCH.into()));
        }

        metrics::global().cache_miss();
        let record = Arc::new(resolve::<S>()?);
        metrics::global().descriptor_resolved();

        let mut entries = self
            .entries
            .write()
            .map_err(|_| ProtocolError::Custom(constants::ERR_CACHE_WRITE_LOCK.into()))?;
        entries.insert(key, record.clone());
        trace!(
            type_name = std::any::type_name::<S>(),
            cached_types = entries.len(),
            "Cached record descriptor"
        );

        Ok(record)
    }

    /// Whether a descriptor for `S` is already cached
    pub fn contains<S: Structure>(&self) -> bool {
        self.entries
            .read()
            .map(|entries| entries.contains_key(&TypeId::of::<S>()))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached descriptor; outstanding `Arc`s stay valid
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }
}

/// The cache shared by every [`Structure::descriptor`] call
pub fn global() -> &'static DescriptorCache {
    static CACHE: OnceLock<DescriptorCache> = OnceLock::new();
    CACHE.get_or_init(DescriptorCache::new)
}
