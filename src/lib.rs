#![doc = include_str!("../README.md")]

pub use voxgate_loop as event_loop;
pub use voxgate_network as network;
pub use voxgate_noise as noise;
pub use voxgate_protocol as protocol;
pub use voxgate_server as server;
pub use voxgate_store as store;
pub use voxgate_world as world;

/// The most commonly used items, re-exported in one place.
pub mod prelude {
    pub use voxgate_loop::{EventLoop, LoopConfig, LoopHandle, Priority};
    pub use voxgate_network::{
        Client, ClientState, FacingSide, RequestError, Session, SessionEvent, SessionId,
        SessionManager,
    };
    pub use voxgate_noise::{FractalKind, NoiseKind, NoiseSource};
    pub use voxgate_protocol::{
        CodecConfig, CompressionKind, EncryptionKey, EncryptionKind, Message, MessageKind,
        PacketProcessor,
    };
    pub use voxgate_server::{GameState, ServerConfig, ServerHandle};
    pub use voxgate_store::{Entity, FileStore, User};
    pub use voxgate_world::{
        Block, BlockKind, CacheConfig, ChunkCache, ChunkData, GenerationPipeline,
        GenerationStep, WorldManager, CHUNK_HEIGHT, CHUNK_SIZE,
    };
}
