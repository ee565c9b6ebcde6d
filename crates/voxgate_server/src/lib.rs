#![doc = include_str!("../README.md")]

mod bootstrap;
mod config;
pub mod services;
mod state;
pub mod streaming;

pub use bootstrap::{run, start, ServerArgs, ServerHandle};
pub use config::{
    ChunkGeneratorConfig, EventLoopConfig, NetworkConfig, SeedUserConfig, ServerConfig,
};
pub use services::SERVER_VERSION;
pub use state::GameState;
