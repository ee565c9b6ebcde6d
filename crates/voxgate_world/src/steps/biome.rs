//! Whittaker-style biome classification.
//!
//! Three low-frequency scalar fields (temperature, moisture, elevation)
//! are sampled once at the chunk center and thresholded into a biome. The
//! result is written to scratch for the terrain and tree steps.

use async_trait::async_trait;
use voxgate_noise::{NoiseKind, NoiseSource};

use crate::{BlockKind, GenerationContext, GenerationStep, CHUNK_SIZE};

/// Scratch key the classification is published under.
pub const BIOME_SCRATCH_KEY: &str = "BiomeData";

const TEMPERATURE_SEED_OFFSET: i32 = 1_000;
const MOISTURE_SEED_OFFSET: i32 = 2_000;
const ELEVATION_SEED_OFFSET: i32 = 3_000;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Biome {
    IceCap,
    Tundra,
    Taiga,
    Grassland,
    TemperateForest,
    TropicalRainforest,
    RockyHighlands,
}

/// The classification one chunk generates under, plus the derived terrain
/// parameters downstream steps consume.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct BiomeData {
    pub biome: Biome,
    /// Normalized field samples in `[0, 1]`.
    pub temperature: f32,
    pub moisture: f32,
    pub elevation: f32,
    pub surface: BlockKind,
    pub subsurface: BlockKind,
    pub height_multiplier: f32,
    pub base_height: f32,
}

impl BiomeData {
    fn classify(temperature: f32, moisture: f32, elevation: f32) -> Self {
        let biome = if elevation > 0.8 {
            Biome::RockyHighlands
        } else if temperature < 0.15 {
            Biome::IceCap
        } else if temperature < 0.3 {
            Biome::Tundra
        } else if temperature < 0.55 {
            if moisture > 0.5 {
                Biome::Taiga
            } else {
                Biome::Grassland
            }
        } else if moisture > 0.6 {
            Biome::TropicalRainforest
        } else if moisture > 0.3 {
            Biome::TemperateForest
        } else {
            Biome::Grassland
        };

        let (surface, subsurface, height_multiplier, base_height) = match biome {
            Biome::IceCap => (BlockKind::Ice, BlockKind::Snow, 6.0, 22.0),
            Biome::Tundra => (BlockKind::Snow, BlockKind::Dirt, 8.0, 24.0),
            Biome::Taiga => (BlockKind::Moss, BlockKind::Dirt, 12.0, 26.0),
            Biome::Grassland => (BlockKind::Grass, BlockKind::Dirt, 8.0, 24.0),
            Biome::TemperateForest => (BlockKind::Grass, BlockKind::Dirt, 14.0, 26.0),
            Biome::TropicalRainforest => (BlockKind::Grass, BlockKind::Dirt, 10.0, 25.0),
            Biome::RockyHighlands => (BlockKind::Stone, BlockKind::Stone, 24.0, 30.0),
        };

        Self {
            biome,
            temperature,
            moisture,
            elevation,
            surface,
            subsurface,
            height_multiplier,
            base_height,
        }
    }
}

pub struct BiomeStep;

impl BiomeStep {
    pub fn new() -> Self {
        Self
    }

    fn field(seed: i32, offset: i32, frequency: f32) -> NoiseSource {
        let mut noise = NoiseSource::new(seed.wrapping_add(offset));
        noise.set_noise_kind(NoiseKind::OpenSimplex2);
        noise.set_frequency(frequency);
        noise
    }
}

impl Default for BiomeStep {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationStep for BiomeStep {
    fn name(&self) -> &str {
        "biome"
    }

    async fn run(&self, ctx: &mut GenerationContext) -> anyhow::Result<()> {
        let center_x = (ctx.origin.x + CHUNK_SIZE / 2) as f32;
        let center_z = (ctx.origin.z + CHUNK_SIZE / 2) as f32;

        let sample = |noise: &NoiseSource| (noise.get_noise_2d(center_x, center_z) + 1.0) * 0.5;

        let temperature = sample(&Self::field(ctx.seed, TEMPERATURE_SEED_OFFSET, 0.0015));
        let moisture = sample(&Self::field(ctx.seed, MOISTURE_SEED_OFFSET, 0.002));
        let elevation = sample(&Self::field(ctx.seed, ELEVATION_SEED_OFFSET, 0.001));

        ctx.put_scratch(
            BIOME_SCRATCH_KEY,
            BiomeData::classify(temperature, moisture, elevation),
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use glam::IVec3;

    use super::*;

    #[test]
    fn classification_covers_the_axes() {
        assert_eq!(BiomeData::classify(0.1, 0.5, 0.2).biome, Biome::IceCap);
        assert_eq!(BiomeData::classify(0.2, 0.5, 0.2).biome, Biome::Tundra);
        assert_eq!(BiomeData::classify(0.4, 0.8, 0.2).biome, Biome::Taiga);
        assert_eq!(BiomeData::classify(0.4, 0.2, 0.2).biome, Biome::Grassland);
        assert_eq!(
            BiomeData::classify(0.8, 0.9, 0.2).biome,
            Biome::TropicalRainforest
        );
        assert_eq!(
            BiomeData::classify(0.8, 0.4, 0.2).biome,
            Biome::TemperateForest
        );
        assert_eq!(BiomeData::classify(0.8, 0.1, 0.2).biome, Biome::Grassland);
        // Elevation dominates everything else.
        assert_eq!(
            BiomeData::classify(0.8, 0.9, 0.9).biome,
            Biome::RockyHighlands
        );
    }

    #[tokio::test]
    async fn deposits_biome_data_in_scratch() {
        let mut ctx = GenerationContext::new(IVec3::new(160, 0, -320), 99);

        BiomeStep::new().run(&mut ctx).await.unwrap();

        let data = ctx.scratch::<BiomeData>(BIOME_SCRATCH_KEY).unwrap();
        assert!((0.0..=1.0).contains(&data.temperature));
        assert!((0.0..=1.0).contains(&data.moisture));
        assert!((0.0..=1.0).contains(&data.elevation));
        assert!(data.height_multiplier > 0.0);
    }

    #[tokio::test]
    async fn classification_is_deterministic_per_origin() {
        let mut a = GenerationContext::new(IVec3::new(32, 0, 32), 7);
        let mut b = GenerationContext::new(IVec3::new(32, 0, 32), 7);

        BiomeStep::new().run(&mut a).await.unwrap();
        BiomeStep::new().run(&mut b).await.unwrap();

        assert_eq!(
            a.scratch::<BiomeData>(BIOME_SCRATCH_KEY),
            b.scratch::<BiomeData>(BIOME_SCRATCH_KEY)
        );
    }
}
