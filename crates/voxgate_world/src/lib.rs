#![doc = include_str!("../README.md")]

use std::sync::Arc;

use parking_lot::RwLock;

mod block;
mod cache;
mod chunk;
pub mod coords;
mod context;
mod error;
mod pipeline;
pub mod steps;
mod world;

pub use block::{Block, BlockKind};
pub use cache::{CacheConfig, CacheMetrics, ChunkCache};
pub use chunk::ChunkData;
pub use context::GenerationContext;
pub use error::ChunkError;
pub use pipeline::{GenerationPipeline, GenerationStep};
pub use world::WorldManager;

/// Horizontal edge length of a chunk, in blocks.
pub const CHUNK_SIZE: i32 = 16;

/// Vertical extent of a chunk, in blocks.
pub const CHUNK_HEIGHT: i32 = 64;

/// Total cells per chunk.
pub const CHUNK_VOLUME: i32 = CHUNK_SIZE * CHUNK_HEIGHT * CHUNK_SIZE;

/// A chunk as held by the cache: shared ownership for readers, interior
/// mutability for the single writer on the event loop.
pub type SharedChunk = Arc<RwLock<ChunkData>>;
