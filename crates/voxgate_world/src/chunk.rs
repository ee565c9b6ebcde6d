//! The fixed-size block volume.

use glam::IVec3;

use crate::{Block, BlockKind, ChunkError, CHUNK_HEIGHT, CHUNK_SIZE, CHUNK_VOLUME};

/// A `SIZE × HEIGHT × SIZE` block buffer anchored at a world-space origin.
///
/// Indexing is `x + y * SIZE + z * SIZE * HEIGHT`; every accessor
/// validates its coordinates and returns
/// [`ChunkError::OutOfBounds`] instead of panicking.
#[derive(Clone, PartialEq, Debug)]
pub struct ChunkData {
    position: IVec3,
    blocks: Vec<Block>,
}

impl ChunkData {
    /// Creates an all-air chunk at the given world origin. Block ids are
    /// assigned from the cell index and never change afterwards.
    pub fn new(position: IVec3) -> Self {
        let blocks = (0..CHUNK_VOLUME)
            .map(|i| Block::new(i as i64, BlockKind::Air))
            .collect();

        Self { position, blocks }
    }

    /// The chunk's world-space origin.
    pub fn position(&self) -> IVec3 {
        self.position
    }

    /// Maps chunk-local coordinates onto the flat buffer index.
    pub fn index_of(x: i32, y: i32, z: i32) -> Result<usize, ChunkError> {
        if !(0..CHUNK_SIZE).contains(&x)
            || !(0..CHUNK_HEIGHT).contains(&y)
            || !(0..CHUNK_SIZE).contains(&z)
        {
            return Err(ChunkError::OutOfBounds { x, y, z });
        }

        Ok((x + y * CHUNK_SIZE + z * CHUNK_SIZE * CHUNK_HEIGHT) as usize)
    }

    pub fn block(&self, x: i32, y: i32, z: i32) -> Result<Block, ChunkError> {
        Ok(self.blocks[Self::index_of(x, y, z)?])
    }

    pub fn kind(&self, x: i32, y: i32, z: i32) -> Result<BlockKind, ChunkError> {
        Ok(self.blocks[Self::index_of(x, y, z)?].kind)
    }

    /// Replaces the material of one cell, keeping its identity. Returns
    /// the previous kind.
    pub fn set_kind(&mut self, x: i32, y: i32, z: i32, kind: BlockKind) -> Result<BlockKind, ChunkError> {
        let idx = Self::index_of(x, y, z)?;
        Ok(std::mem::replace(&mut self.blocks[idx].kind, kind))
    }

    /// Direct by-index access for bulk passes that computed the index
    /// themselves.
    pub fn block_at(&self, index: usize) -> Option<Block> {
        self.blocks.get(index).copied()
    }

    pub fn fill(&mut self, kind: BlockKind) {
        for block in &mut self.blocks {
            block.kind = kind;
        }
    }

    /// Number of cells holding the given material.
    pub fn count_of(&self, kind: BlockKind) -> usize {
        self.blocks.iter().filter(|b| b.kind == kind).count()
    }

    /// The topmost solid-or-liquid cell of a column, if any.
    pub fn surface_of_column(&self, x: i32, z: i32) -> Result<Option<i32>, ChunkError> {
        for y in (0..CHUNK_HEIGHT).rev() {
            if !self.kind(x, y, z)?.is_air() {
                return Ok(Some(y));
            }
        }
        Ok(None)
    }

    /// One kind byte per cell, in index order. This is the chunk's wire
    /// form inside a chunk response.
    pub fn kind_bytes(&self) -> Vec<u8> {
        self.blocks.iter().map(|b| b.kind as u8).collect()
    }

    /// Rebuilds a chunk from its wire form.
    pub fn from_kind_bytes(position: IVec3, bytes: &[u8]) -> Result<Self, ChunkError> {
        if bytes.len() != CHUNK_VOLUME as usize {
            return Err(ChunkError::OutOfBounds {
                x: bytes.len() as i32,
                y: 0,
                z: 0,
            });
        }

        let blocks = bytes
            .iter()
            .enumerate()
            .map(|(i, byte)| {
                BlockKind::from_u8(*byte)
                    .map(|kind| Block::new(i as i64, kind))
                    .ok_or(ChunkError::OutOfBounds {
                        x: i32::from(*byte),
                        y: 0,
                        z: 0,
                    })
            })
            .collect::<Result<_, _>>()?;

        Ok(Self { position, blocks })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rustc_hash::FxHashSet;

    use super::*;

    #[test]
    fn index_bijects_the_volume() {
        let mut seen = FxHashSet::default();

        for z in 0..CHUNK_SIZE {
            for y in 0..CHUNK_HEIGHT {
                for x in 0..CHUNK_SIZE {
                    let idx = ChunkData::index_of(x, y, z).unwrap();
                    assert!(idx < CHUNK_VOLUME as usize);
                    assert!(seen.insert(idx), "({x},{y},{z}) collided");
                }
            }
        }

        assert_eq!(seen.len(), CHUNK_VOLUME as usize);
    }

    #[test]
    fn out_of_bounds_is_reported_not_panicked() {
        for (x, y, z) in [
            (-1, 0, 0),
            (CHUNK_SIZE, 0, 0),
            (0, -1, 0),
            (0, CHUNK_HEIGHT, 0),
            (0, 0, CHUNK_SIZE),
        ] {
            assert!(matches!(
                ChunkData::index_of(x, y, z),
                Err(ChunkError::OutOfBounds { .. })
            ));
        }
    }

    #[test]
    fn set_kind_keeps_block_identity() {
        let mut chunk = ChunkData::new(IVec3::ZERO);

        let before = chunk.block(3, 40, 7).unwrap();
        assert_eq!(chunk.set_kind(3, 40, 7, BlockKind::Stone).unwrap(), BlockKind::Air);
        let after = chunk.block(3, 40, 7).unwrap();

        assert_eq!(before.id, after.id);
        assert_eq!(after.kind, BlockKind::Stone);
    }

    #[test]
    fn surface_scan_skips_air() {
        let mut chunk = ChunkData::new(IVec3::ZERO);
        assert_eq!(chunk.surface_of_column(0, 0).unwrap(), None);

        chunk.set_kind(0, 10, 0, BlockKind::Dirt).unwrap();
        chunk.set_kind(0, 12, 0, BlockKind::Water).unwrap();

        // Water counts as a surface; air above it does not.
        assert_eq!(chunk.surface_of_column(0, 0).unwrap(), Some(12));
    }

    #[test]
    fn wire_bytes_round_trip() {
        let mut chunk = ChunkData::new(IVec3::new(16, 0, -16));
        chunk.set_kind(1, 2, 3, BlockKind::Leaves).unwrap();
        chunk.set_kind(0, 0, 0, BlockKind::Bedrock).unwrap();

        let bytes = chunk.kind_bytes();
        assert_eq!(bytes.len(), CHUNK_VOLUME as usize);

        let back = ChunkData::from_kind_bytes(chunk.position(), &bytes).unwrap();
        assert_eq!(back, chunk);
    }

    #[test]
    fn invalid_wire_bytes_are_rejected() {
        assert!(ChunkData::from_kind_bytes(IVec3::ZERO, &[0; 3]).is_err());

        let mut bytes = vec![0u8; CHUNK_VOLUME as usize];
        bytes[5] = 200;
        assert!(ChunkData::from_kind_bytes(IVec3::ZERO, &bytes).is_err());
    }
}
