//! The ordered generation pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use glam::IVec3;
use tracing::{debug, warn};

use crate::steps::{BiomeStep, CaveStep, TerrainStep, TreeStep};
use crate::{ChunkData, ChunkError, GenerationContext};

/// One stage of chunk generation.
///
/// Steps run strictly in the order they were added and communicate
/// through [`GenerationContext::put_scratch`]. A step may do its heavy
/// lifting off-thread, but the context is handed to one step at a time.
#[async_trait]
pub trait GenerationStep: Send + Sync {
    /// Stable name, used for removal, logs, and failure reports.
    fn name(&self) -> &str;

    async fn run(&self, ctx: &mut GenerationContext) -> anyhow::Result<()>;
}

/// An ordered sequence of [`GenerationStep`]s sharing one seed.
///
/// The step list should be settled before the first chunk is generated;
/// mutating it afterwards changes what the cache will produce for
/// not-yet-generated keys.
pub struct GenerationPipeline {
    seed: i32,
    steps: Vec<Arc<dyn GenerationStep>>,
}

impl GenerationPipeline {
    /// An empty pipeline. Mostly useful in tests; servers want
    /// [`with_default_steps`](Self::with_default_steps).
    pub fn new(seed: i32) -> Self {
        Self { seed, steps: Vec::new() }
    }

    /// The canonical step ordering: biome, terrain, caves, trees.
    pub fn with_default_steps(seed: i32) -> Self {
        let mut pipeline = Self::new(seed);
        pipeline.add_step(BiomeStep::new());
        pipeline.add_step(TerrainStep::new());
        pipeline.add_step(CaveStep::new());
        pipeline.add_step(TreeStep::new());
        pipeline
    }

    pub fn seed(&self) -> i32 {
        self.seed
    }

    /// Appends a step to the end of the sequence.
    pub fn add_step(&mut self, step: impl GenerationStep + 'static) {
        self.steps.push(Arc::new(step));
    }

    /// Removes a step by name. Returns whether anything was removed.
    pub fn remove_step(&mut self, name: &str) -> bool {
        let before = self.steps.len();
        self.steps.retain(|step| step.name() != name);

        let removed = self.steps.len() != before;
        if !removed {
            warn!(step = name, "no such generation step to remove");
        }
        removed
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Runs every step in order and returns the finished chunk.
    ///
    /// The first failing step aborts the chunk; the partial result is
    /// discarded.
    pub async fn generate(&self, origin: IVec3) -> Result<ChunkData, ChunkError> {
        let mut ctx = GenerationContext::new(origin, self.seed);

        for step in &self.steps {
            if let Err(e) = step.run(&mut ctx).await {
                warn!(step = step.name(), ?origin, "generation step failed: {e:#}");

                return Err(ChunkError::GenerationFailure {
                    step: step.name().to_owned(),
                    reason: format!("{e:#}"),
                });
            }
        }

        debug!(?origin, steps = self.steps.len(), "chunk generated");
        Ok(ctx.chunk)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{BlockKind, CHUNK_VOLUME};

    struct FillStep(BlockKind);

    #[async_trait]
    impl GenerationStep for FillStep {
        fn name(&self) -> &str {
            "fill"
        }

        async fn run(&self, ctx: &mut GenerationContext) -> anyhow::Result<()> {
            ctx.chunk.fill(self.0);
            Ok(())
        }
    }

    struct FailingStep;

    #[async_trait]
    impl GenerationStep for FailingStep {
        fn name(&self) -> &str {
            "failing"
        }

        async fn run(&self, _ctx: &mut GenerationContext) -> anyhow::Result<()> {
            anyhow::bail!("step exploded")
        }
    }

    #[tokio::test]
    async fn steps_run_in_declaration_order() {
        let mut pipeline = GenerationPipeline::new(0);
        pipeline.add_step(FillStep(BlockKind::Stone));
        pipeline.add_step(FillStep(BlockKind::Dirt));

        let chunk = pipeline.generate(IVec3::ZERO).await.unwrap();
        assert_eq!(chunk.count_of(BlockKind::Dirt), CHUNK_VOLUME as usize);
    }

    #[tokio::test]
    async fn failure_aborts_with_the_step_name() {
        let mut pipeline = GenerationPipeline::new(0);
        pipeline.add_step(FillStep(BlockKind::Stone));
        pipeline.add_step(FailingStep);

        let err = pipeline.generate(IVec3::ZERO).await.unwrap_err();
        assert!(
            matches!(err, ChunkError::GenerationFailure { ref step, .. } if step == "failing")
        );
    }

    #[test]
    fn remove_step_by_name() {
        let mut pipeline = GenerationPipeline::with_default_steps(1);
        assert_eq!(pipeline.step_count(), 4);

        assert!(pipeline.remove_step("caves"));
        assert!(!pipeline.remove_step("caves"));
        assert_eq!(pipeline.step_names(), ["biome", "terrain", "trees"]);
    }

    #[tokio::test]
    async fn default_pipeline_is_deterministic() {
        let pipeline = GenerationPipeline::with_default_steps(1337);
        let origin = IVec3::new(-32, 0, 48);

        let a = pipeline.generate(origin).await.unwrap();
        let b = pipeline.generate(origin).await.unwrap();

        assert_eq!(a.kind_bytes(), b.kind_bytes());
    }
}
