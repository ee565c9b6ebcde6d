//! Blocks: the unit cells of a chunk.

/// Every material a cell can hold. The discriminants are the wire bytes of
/// chunk payloads, so the order is fixed.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[repr(u8)]
pub enum BlockKind {
    #[default]
    Air = 0,
    Dirt = 1,
    Grass = 2,
    Bedrock = 3,
    Snow = 4,
    Ice = 5,
    Moss = 6,
    Stone = 7,
    Wood = 8,
    Leaves = 9,
    Water = 10,
}

impl BlockKind {
    pub const COUNT: usize = 11;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Air,
        Self::Dirt,
        Self::Grass,
        Self::Bedrock,
        Self::Snow,
        Self::Ice,
        Self::Moss,
        Self::Stone,
        Self::Wood,
        Self::Leaves,
        Self::Water,
    ];

    pub const fn from_u8(byte: u8) -> Option<Self> {
        if (byte as usize) < Self::COUNT {
            Some(Self::ALL[byte as usize])
        } else {
            None
        }
    }

    pub const fn is_air(self) -> bool {
        matches!(self, Self::Air)
    }

    /// Whether the cell blocks movement and carving. Water is liquid, air
    /// is nothing; everything else is solid.
    pub const fn is_solid(self) -> bool {
        !matches!(self, Self::Air | Self::Water)
    }

    /// Surfaces a tree can take root on.
    pub const fn supports_trees(self) -> bool {
        matches!(self, Self::Grass | Self::Dirt | Self::Moss)
    }
}

/// One cell: a stable per-chunk identity plus its current material.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Block {
    /// Index-derived identity, stable across kind changes for the life of
    /// the chunk.
    pub id: i64,
    pub kind: BlockKind,
}

impl Block {
    pub const fn new(id: i64, kind: BlockKind) -> Self {
        Self { id, kind }
    }
}
