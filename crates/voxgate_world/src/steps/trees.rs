//! Tree placement on generated terrain.

use async_trait::async_trait;
use voxgate_noise::NoiseSource;

use crate::steps::{Biome, BiomeData, BIOME_SCRATCH_KEY};
use crate::{BlockKind, GenerationContext, GenerationStep, CHUNK_HEIGHT, CHUNK_SIZE};

const PLACEMENT_SEED_OFFSET: i32 = 5_000;
const PLACEMENT_FREQUENCY: f32 = 0.1;

const MIN_TREE_HEIGHT: i32 = 4;
const MAX_TREE_HEIGHT: i32 = 8;
const CANOPY_RADIUS: i32 = 2;

/// Interior margin keeping canopies inside the chunk.
const MARGIN: i32 = 2;

/// Placement-noise threshold per biome; a column grows a tree when the
/// normalized sample exceeds it. Zero disables trees for the biome
/// entirely.
fn tree_threshold(biome: Biome) -> f32 {
    match biome {
        Biome::TropicalRainforest => 0.4,
        Biome::TemperateForest => 0.55,
        Biome::Taiga => 0.7,
        Biome::Grassland => 0.85,
        Biome::IceCap | Biome::Tundra | Biome::RockyHighlands => 0.0,
    }
}

/// Deterministic per-column trunk height in `[MIN, MAX]`.
fn trunk_height(seed: i32, world_x: i32, world_z: i32) -> i32 {
    let mut h = seed
        .wrapping_mul(0x9e37_79b9_u32 as i32)
        ^ world_x.wrapping_mul(0x85eb_ca6b_u32 as i32)
        ^ world_z.wrapping_mul(0xc2b2_ae35_u32 as i32);
    h ^= h >> 13;
    h = h.wrapping_mul(0x27d4_eb2d);
    h ^= h >> 16;

    let span = (MAX_TREE_HEIGHT - MIN_TREE_HEIGHT + 1) as u32;
    MIN_TREE_HEIGHT + ((h as u32) % span) as i32
}

pub struct TreeStep;

impl TreeStep {
    pub fn new() -> Self {
        Self
    }

    fn placement_noise(seed: i32) -> NoiseSource {
        let mut noise = NoiseSource::new(seed.wrapping_add(PLACEMENT_SEED_OFFSET));
        noise.set_frequency(PLACEMENT_FREQUENCY);
        noise
    }

    fn plant(ctx: &mut GenerationContext, x: i32, surface_y: i32, z: i32, height: i32) -> anyhow::Result<()> {
        for y in surface_y + 1..=surface_y + height {
            ctx.chunk.set_kind(x, y, z, BlockKind::Wood)?;
        }

        let top = surface_y + height;

        for dx in -CANOPY_RADIUS..=CANOPY_RADIUS {
            for dy in -CANOPY_RADIUS..=CANOPY_RADIUS {
                for dz in -CANOPY_RADIUS..=CANOPY_RADIUS {
                    // Keep the canopy roughly spherical and leave the
                    // trunk column itself in wood.
                    if dx * dx + dy * dy + dz * dz > CANOPY_RADIUS * CANOPY_RADIUS + 1 {
                        continue;
                    }
                    if dx == 0 && dz == 0 && dy <= 0 {
                        continue;
                    }

                    let (cx, cy, cz) = (x + dx, top + dy, z + dz);
                    if !(0..CHUNK_SIZE).contains(&cx)
                        || !(0..CHUNK_HEIGHT).contains(&cy)
                        || !(0..CHUNK_SIZE).contains(&cz)
                    {
                        continue;
                    }

                    if ctx.chunk.kind(cx, cy, cz)? == BlockKind::Air {
                        ctx.chunk.set_kind(cx, cy, cz, BlockKind::Leaves)?;
                    }
                }
            }
        }

        Ok(())
    }
}

impl Default for TreeStep {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationStep for TreeStep {
    fn name(&self) -> &str {
        "trees"
    }

    async fn run(&self, ctx: &mut GenerationContext) -> anyhow::Result<()> {
        let Some(biome) = ctx.scratch::<BiomeData>(BIOME_SCRATCH_KEY).copied() else {
            // No biome classification, no trees. Not an error: the
            // pipeline may legitimately run without the biome step.
            return Ok(());
        };

        let threshold = tree_threshold(biome.biome);
        if threshold <= 0.0 {
            return Ok(());
        }

        let noise = Self::placement_noise(ctx.seed);
        let headroom = MAX_TREE_HEIGHT + 3;

        for x in MARGIN..CHUNK_SIZE - MARGIN {
            for z in MARGIN..CHUNK_SIZE - MARGIN {
                let world_x = ctx.origin.x + x;
                let world_z = ctx.origin.z + z;

                let sample =
                    (noise.get_noise_2d(world_x as f32, world_z as f32) + 1.0) * 0.5;
                if sample <= threshold {
                    continue;
                }

                let Some(surface_y) = ctx.chunk.surface_of_column(x, z)? else {
                    continue;
                };

                if !ctx.chunk.kind(x, surface_y, z)?.supports_trees() {
                    continue;
                }

                // Nothing grows under water, and the full trunk plus
                // canopy must fit inside the chunk.
                if surface_y + headroom >= CHUNK_HEIGHT {
                    continue;
                }
                if ctx.chunk.kind(x, surface_y + 1, z)? == BlockKind::Water {
                    continue;
                }

                let clear = (surface_y + 1..=surface_y + headroom)
                    .all(|y| matches!(ctx.chunk.kind(x, y, z), Ok(BlockKind::Air)));
                if !clear {
                    continue;
                }

                let height = trunk_height(ctx.seed, world_x, world_z);
                Self::plant(ctx, x, surface_y, z, height)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use glam::IVec3;

    use super::*;

    #[test]
    fn trunk_heights_are_deterministic_and_bounded()
    {
        for x in -100..100 {
            for z in -20..20 {
                let h = trunk_height(1337, x, z);
                assert_eq!(h, trunk_height(1337, x, z));
                assert!((MIN_TREE_HEIGHT..=MAX_TREE_HEIGHT).contains(&h));
            }
        }
    }

    #[tokio::test]
    async fn plants_only_on_supporting_surfaces() {
        // Flat grass world with a biome that always grows trees.
        let mut ctx = GenerationContext::new(IVec3::ZERO, 5);

        for x in 0..CHUNK_SIZE {
            for z in 0..CHUNK_SIZE {
                for y in 0..=10 {
                    ctx.chunk.set_kind(x, y, z, BlockKind::Dirt).unwrap();
                }
                ctx.chunk.set_kind(x, 10, z, BlockKind::Grass).unwrap();
            }
        }

        ctx.put_scratch(
            BIOME_SCRATCH_KEY,
            BiomeData {
                biome: Biome::TropicalRainforest,
                temperature: 0.8,
                moisture: 0.9,
                elevation: 0.3,
                surface: BlockKind::Grass,
                subsurface: BlockKind::Dirt,
                height_multiplier: 10.0,
                base_height: 25.0,
            },
        );

        TreeStep::new().run(&mut ctx).await.unwrap();

        let wood = ctx.chunk.count_of(BlockKind::Wood);
        let leaves = ctx.chunk.count_of(BlockKind::Leaves);
        assert!(wood > 0, "a rainforest chunk of flat grass must grow trees");
        assert!(leaves > wood, "canopies should outweigh trunks");

        // Trunks stay inside the interior margin.
        for y in 11..CHUNK_HEIGHT {
            for edge in [0, 1, CHUNK_SIZE - 2, CHUNK_SIZE - 1] {
                assert_ne!(ctx.chunk.kind(edge, y, 0).unwrap(), BlockKind::Wood);
                assert_ne!(ctx.chunk.kind(0, y, edge).unwrap(), BlockKind::Wood);
            }
        }
    }

    #[tokio::test]
    async fn treeless_biomes_stay_treeless() {
        let mut ctx = GenerationContext::new(IVec3::ZERO, 5);

        for x in 0..CHUNK_SIZE {
            for z in 0..CHUNK_SIZE {
                ctx.chunk.set_kind(x, 5, z, BlockKind::Grass).unwrap();
            }
        }

        ctx.put_scratch(
            BIOME_SCRATCH_KEY,
            BiomeData {
                biome: Biome::Tundra,
                temperature: 0.2,
                moisture: 0.5,
                elevation: 0.3,
                surface: BlockKind::Snow,
                subsurface: BlockKind::Dirt,
                height_multiplier: 8.0,
                base_height: 24.0,
            },
        );

        TreeStep::new().run(&mut ctx).await.unwrap();

        assert_eq!(ctx.chunk.count_of(BlockKind::Wood), 0);
    }
}
