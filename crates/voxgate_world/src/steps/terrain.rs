//! Heightmap terrain fill.

use anyhow::Context;
use async_trait::async_trait;
use voxgate_noise::{FractalKind, NoiseKind, NoiseSource};

use crate::steps::{BiomeData, BIOME_SCRATCH_KEY};
use crate::{BlockKind, GenerationContext, GenerationStep, CHUNK_HEIGHT, CHUNK_SIZE};

/// Columns at or below this world height flood with water instead of air,
/// and keep a subsurface cap instead of the biome surface block.
pub const SEA_LEVEL: i32 = 20;

/// Absolute bottom of the world; nothing exists below this bedrock floor.
pub const WORLD_FLOOR_Y: i32 = -1024;

const HEIGHT_SEED_OFFSET: i32 = 2_500;

pub struct TerrainStep;

impl TerrainStep {
    pub fn new() -> Self {
        Self
    }

    fn height_noise(seed: i32) -> NoiseSource {
        let mut noise = NoiseSource::new(seed.wrapping_add(HEIGHT_SEED_OFFSET));
        noise.set_noise_kind(NoiseKind::OpenSimplex2);
        noise.set_frequency(0.01);
        noise.set_fractal_kind(FractalKind::FBm);
        noise.set_fractal_octaves(4);
        noise
    }
}

impl Default for TerrainStep {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationStep for TerrainStep {
    fn name(&self) -> &str {
        "terrain"
    }

    async fn run(&self, ctx: &mut GenerationContext) -> anyhow::Result<()> {
        let biome = *ctx
            .scratch::<BiomeData>(BIOME_SCRATCH_KEY)
            .context("terrain requires the biome step to run first")?;

        let noise = Self::height_noise(ctx.seed);

        for x in 0..CHUNK_SIZE {
            for z in 0..CHUNK_SIZE {
                let world_x = (ctx.origin.x + x) as f32;
                let world_z = (ctx.origin.z + z) as f32;

                let sample = (noise.get_noise_2d(world_x, world_z) + 1.0) * 0.5;
                let height = (biome.base_height + biome.height_multiplier * sample)
                    .round() as i32;
                let height = height.clamp(1, CHUNK_HEIGHT - 1);

                for y in 0..CHUNK_HEIGHT {
                    let world_y = ctx.origin.y + y;

                    let kind = if world_y <= WORLD_FLOOR_Y || world_y == 0 {
                        BlockKind::Bedrock
                    } else if world_y < height {
                        biome.subsurface
                    } else if world_y == height {
                        if height > SEA_LEVEL {
                            biome.surface
                        } else {
                            biome.subsurface
                        }
                    } else if world_y <= SEA_LEVEL {
                        BlockKind::Water
                    } else {
                        BlockKind::Air
                    };

                    ctx.chunk.set_kind(x, y, z, kind)?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use glam::IVec3;

    use super::*;
    use crate::steps::BiomeStep;

    async fn generated(origin: IVec3, seed: i32) -> GenerationContext {
        let mut ctx = GenerationContext::new(origin, seed);
        BiomeStep::new().run(&mut ctx).await.unwrap();
        TerrainStep::new().run(&mut ctx).await.unwrap();
        ctx
    }

    #[tokio::test]
    async fn requires_biome_data() {
        let mut ctx = GenerationContext::new(IVec3::ZERO, 1);
        assert!(TerrainStep::new().run(&mut ctx).await.is_err());
    }

    #[tokio::test]
    async fn ground_chunk_has_bedrock_floor_and_air_ceiling() {
        let ctx = generated(IVec3::ZERO, 1337).await;

        for x in 0..CHUNK_SIZE {
            for z in 0..CHUNK_SIZE {
                // World y == 0 is the bedrock cap of the playable range.
                assert_eq!(ctx.chunk.kind(x, 0, z).unwrap(), BlockKind::Bedrock);
                // Heights clamp below the chunk top, so the top layer is
                // never terrain.
                let top = ctx.chunk.kind(x, CHUNK_HEIGHT - 1, z).unwrap();
                assert!(matches!(top, BlockKind::Air | BlockKind::Water));
            }
        }
    }

    #[tokio::test]
    async fn columns_are_terrain_below_surface() {
        let ctx = generated(IVec3::ZERO, 42).await;

        for x in 0..CHUNK_SIZE {
            for z in 0..CHUNK_SIZE {
                let surface = ctx.chunk.surface_of_column(x, z).unwrap().unwrap();
                for y in 1..surface {
                    let kind = ctx.chunk.kind(x, y, z).unwrap();
                    assert!(
                        kind.is_solid() || kind == BlockKind::Water,
                        "hole at ({x},{y},{z}): {kind:?}"
                    );
                }
            }
        }
    }

    #[tokio::test]
    async fn world_floor_is_bedrock() {
        // A chunk whose lowest layer sits exactly on the world floor.
        let origin = IVec3::new(0, WORLD_FLOOR_Y, 0);
        let ctx = generated(origin, 7).await;

        assert_eq!(ctx.chunk.kind(5, 0, 5).unwrap(), BlockKind::Bedrock);
    }

    #[tokio::test]
    async fn deep_sky_chunks_are_empty() {
        let ctx = generated(IVec3::new(0, 1024, 0), 7).await;
        assert_eq!(
            ctx.chunk.count_of(BlockKind::Air),
            (CHUNK_SIZE * CHUNK_SIZE * CHUNK_HEIGHT) as usize
        );
    }
}
