//! The world manager: coordinate algebra plus a thin facade over the
//! chunk cache for block-level access.

use glam::IVec3;
use tracing::debug;

use crate::coords::{chunk_origin_of, local_of};
use crate::{Block, BlockKind, ChunkCache, ChunkError, SharedChunk};

/// Block-level view of the world.
///
/// All mutation entry points are expected to run on the event-loop
/// thread; the manager itself holds no state beyond the cache handle.
#[derive(Clone)]
pub struct WorldManager {
    cache: ChunkCache,
}

impl WorldManager {
    pub fn new(cache: ChunkCache) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &ChunkCache {
        &self.cache
    }

    /// The chunk containing a world position, generating it if needed.
    pub async fn chunk_at(&self, world: IVec3) -> Result<SharedChunk, ChunkError> {
        self.cache.get(chunk_origin_of(world)).await
    }

    pub async fn block_at(&self, world: IVec3) -> Result<Block, ChunkError> {
        let chunk = self.chunk_at(world).await?;
        let local = local_of(world);

        let block = chunk.read().block(local.x, local.y, local.z)?;
        Ok(block)
    }

    /// Replaces the block at a world position, returning what was there.
    pub async fn modify_block(
        &self,
        world: IVec3,
        kind: BlockKind,
    ) -> Result<BlockKind, ChunkError> {
        let chunk = self.chunk_at(world).await?;
        let local = local_of(world);

        let previous = chunk.write().set_kind(local.x, local.y, local.z, kind)?;
        debug!(?world, ?kind, ?previous, "block modified");
        Ok(previous)
    }

    /// Clears the block at a world position back to air.
    pub async fn remove_block(&self, world: IVec3) -> Result<BlockKind, ChunkError> {
        self.modify_block(world, BlockKind::Air).await
    }
}
