use thiserror::Error;

/// Errors of the chunk and generation layer.
///
/// `Clone` so one generation failure can fan out to every single-flight
/// waiter.
#[derive(Clone, Debug, Error)]
pub enum ChunkError {
    /// A chunk-local coordinate was outside `[0, SIZE) × [0, HEIGHT) ×
    /// [0, SIZE)`. This is a programmer error and surfaces immediately.
    #[error("block coordinates ({x}, {y}, {z}) are out of chunk bounds")]
    OutOfBounds { x: i32, y: i32, z: i32 },

    /// A pipeline step failed; the chunk was abandoned. Waiters may retry.
    #[error("generation step '{step}' failed: {reason}")]
    GenerationFailure { step: String, reason: String },

    /// The generation task disappeared without publishing a result.
    #[error("generation task aborted before completing")]
    GenerationAborted,
}
