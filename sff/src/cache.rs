//! Bounded memo of decoded sprites.
//!
//! One cache belongs to one opened container. Keys do not identify the
//! container, so sharing a cache between files mixes their sprites.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::sff::{DecodedRaster, Sff, SffError};

/// `(group, image, palette override)`
pub type CacheKey = (i16, i16, Option<usize>);

#[derive(Default)]
struct State {
    rasters: HashMap<CacheKey, Arc<DecodedRaster>>,
    /// Least recently used first.
    order: VecDeque<CacheKey>,
}

impl State {
    fn touch(&mut self, key: &CacheKey) {
        if let Some(at) = self.order.iter().position(|k| k == key) {
            if let Some(key) = self.order.remove(at) {
                self.order.push_back(key);
            }
        }
    }
}

/// Least-recently-used cache of decoded rasters, safe to share between
/// threads.
pub struct RasterCache {
    capacity: usize,
    state: Mutex<State>,
}

impl RasterCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // every mutation leaves the map and order consistent, even mid-panic
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().rasters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.rasters.clear();
        state.order.clear();
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<DecodedRaster>> {
        let mut state = self.lock();
        let raster = state.rasters.get(key).cloned()?;
        state.touch(key);
        Some(raster)
    }

    pub fn insert(&self, key: CacheKey, raster: DecodedRaster) -> Arc<DecodedRaster> {
        let raster = Arc::new(raster);
        if self.capacity == 0 {
            return raster;
        }

        let mut state = self.lock();
        if state.rasters.insert(key, raster.clone()).is_some() {
            state.touch(&key);
        } else {
            state.order.push_back(key);
        }
        while state.rasters.len() > self.capacity {
            let Some(oldest) = state.order.pop_front() else {
                break;
            };
            state.rasters.remove(&oldest);
            log::debug!("evicted sprite {},{} from the raster cache", oldest.0, oldest.1);
        }
        raster
    }

    /// Return the cached raster or decode and remember it.
    ///
    /// Decoding runs outside the lock, so two threads missing on the same key
    /// may both decode it; the later insert wins.
    pub fn get_or_decode(
        &self,
        sff: &Sff,
        group: i16,
        image: i16,
        palette_override: Option<usize>,
    ) -> Result<Arc<DecodedRaster>, SffError> {
        let key = (group, image, palette_override);
        if let Some(raster) = self.get(&key) {
            return Ok(raster);
        }
        let raster = sff.decode(group, image, palette_override)?;
        Ok(self.insert(key, raster))
    }
}
