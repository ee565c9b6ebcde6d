//! The per-chunk scratchpad generation steps share.

use std::any::Any;

use glam::IVec3;
use rustc_hash::FxHashMap;
use voxgate_noise::NoiseSource;

use crate::ChunkData;

/// Everything one pipeline execution owns while filling a chunk.
///
/// The `scratch` map is the typed side-channel between steps: the biome
/// step deposits its classification there and later steps read it back.
pub struct GenerationContext {
    pub chunk: ChunkData,
    /// The chunk's world-space origin, duplicated out of `chunk` for
    /// convenience in hot loops.
    pub origin: IVec3,
    /// The world seed every step derives its noise from.
    pub seed: i32,
    /// A base noise source at the world seed; steps clone and reconfigure
    /// it rather than sharing mutable state.
    pub noise: NoiseSource,
    scratch: FxHashMap<&'static str, Box<dyn Any + Send>>,
}

impl GenerationContext {
    pub fn new(origin: IVec3, seed: i32) -> Self {
        Self {
            chunk: ChunkData::new(origin),
            origin,
            seed,
            noise: NoiseSource::new(seed),
            scratch: FxHashMap::default(),
        }
    }

    /// Stores a value for downstream steps, replacing any previous value
    /// under the same key.
    pub fn put_scratch<T: Any + Send>(&mut self, key: &'static str, value: T) {
        self.scratch.insert(key, Box::new(value));
    }

    /// Reads a value a previous step deposited. `None` when the key is
    /// missing or holds a different type.
    pub fn scratch<T: Any + Send>(&self, key: &str) -> Option<&T> {
        self.scratch.get(key)?.downcast_ref()
    }
}
