//! Content-addressed memoization of aero queries.

use crate::flight_conditions::FlightConditions;
use crate::geometry::AircraftGeometry;
use crate::imports::*;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug)]
struct CacheEntry<V> {
    /// normalized key text, compared on hit to rule out hash collisions
    key: String,
    value: V,
}

/// Memoizes results keyed by the serialized `(model key, geometry, flight conditions)`
/// triple. The model key carries every model setting that changes results, see
/// [`AeroCalculator::cache_salt`](crate::aero::AeroCalculator::cache_salt).
///
/// The lock is held while `compute_fn` runs, so concurrent callers asking for
/// the same key compute it once. Entries live until [`BatchAeroCache::clear`]
/// or drop; there is no eviction.
#[derive(Debug)]
pub struct BatchAeroCache<V> {
    entries: Mutex<HashMap<u64, CacheEntry<V>>>,
}

impl<V> Default for BatchAeroCache<V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<V: Clone> BatchAeroCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the normalized key text and its hash.
    pub fn cache_key(
        model_key: &str,
        geometry: &AircraftGeometry,
        conditions: &FlightConditions,
    ) -> anyhow::Result<(u64, String)> {
        let key = serde_json::to_string(&(model_key, geometry, conditions))
            .with_context(|| format_dbg!(conditions))?;
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        Ok((hasher.finish(), key))
    }

    pub fn get_or_compute<F>(
        &self,
        model_key: &str,
        geometry: &AircraftGeometry,
        conditions: &FlightConditions,
        compute_fn: F,
    ) -> anyhow::Result<V>
    where
        F: FnOnce() -> anyhow::Result<V>,
    {
        let (hash, key) = Self::cache_key(model_key, geometry, conditions)?;
        let mut entries = self.lock();
        if let Some(entry) = entries.get(&hash) {
            if entry.key == key {
                log::debug!("Aero cache hit: {hash:016x}");
                return Ok(entry.value.clone());
            }
            log::warn!("Aero cache hash collision on {hash:016x}, recomputing");
        } else {
            log::debug!("Aero cache miss: {hash:016x}");
        }
        let value = compute_fn()?;
        entries.insert(
            hash,
            CacheEntry {
                key,
                value: value.clone(),
            },
        );
        Ok(value)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, CacheEntry<V>>> {
        // a panicking compute_fn never inserts, so the map stays consistent
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
