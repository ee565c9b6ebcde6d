//! The canonical generation steps, in pipeline order.

mod biome;
mod caves;
mod terrain;
mod trees;

pub use biome::{Biome, BiomeData, BiomeStep, BIOME_SCRATCH_KEY};
pub use caves::CaveStep;
pub use terrain::{TerrainStep, SEA_LEVEL, WORLD_FLOOR_Y};
pub use trees::TreeStep;
