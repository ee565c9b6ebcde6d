//! Cave carving with 3D fractal noise.

use async_trait::async_trait;
use voxgate_noise::{FractalKind, NoiseKind, NoiseSource};

use crate::{BlockKind, GenerationContext, GenerationStep, CHUNK_HEIGHT, CHUNK_SIZE};

/// Default carve threshold on the normalized noise value.
const CAVE_THRESHOLD: f32 = 0.55;

/// World-height band caves may appear in.
const CAVE_MIN_Y: i32 = 1;
const CAVE_MAX_Y: i32 = 128;

pub struct CaveStep {
    threshold: f32,
}

impl CaveStep {
    pub fn new() -> Self {
        Self::with_threshold(CAVE_THRESHOLD)
    }

    /// A custom carve threshold; higher values carve less.
    pub fn with_threshold(threshold: f32) -> Self {
        Self { threshold }
    }

    fn cave_noise(seed: i32) -> NoiseSource {
        let mut noise = NoiseSource::new(seed);
        noise.set_noise_kind(NoiseKind::OpenSimplex2);
        noise.set_frequency(0.05);
        noise.set_fractal_kind(FractalKind::FBm);
        noise.set_fractal_octaves(2);
        noise
    }
}

impl Default for CaveStep {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationStep for CaveStep {
    fn name(&self) -> &str {
        "caves"
    }

    async fn run(&self, ctx: &mut GenerationContext) -> anyhow::Result<()> {
        let noise = Self::cave_noise(ctx.seed);

        for x in 0..CHUNK_SIZE {
            for z in 0..CHUNK_SIZE {
                for y in 0..CHUNK_HEIGHT {
                    let world_y = ctx.origin.y + y;
                    if !(CAVE_MIN_Y..CAVE_MAX_Y).contains(&world_y) {
                        continue;
                    }

                    let kind = ctx.chunk.kind(x, y, z)?;

                    // Carving only applies to solid rock; air and water
                    // pass through and bedrock is load-bearing.
                    if !kind.is_solid() || kind == BlockKind::Bedrock {
                        continue;
                    }

                    let world_x = (ctx.origin.x + x) as f32;
                    let world_z = (ctx.origin.z + z) as f32;

                    let sample =
                        (noise.get_noise_3d(world_x, world_y as f32, world_z) + 1.0) * 0.5;

                    if sample > self.threshold {
                        ctx.chunk.set_kind(x, y, z, BlockKind::Air)?;
                    }
                }
            }
        }

        Ok(())
    }
}
