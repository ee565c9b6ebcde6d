//! The single mutable domain state the event loop owns.

use std::path::PathBuf;
use std::sync::Arc;

use voxgate_network::SessionManager;
use voxgate_store::{FileStore, User};
use voxgate_world::WorldManager;

use crate::streaming::ChunkStreamer;

/// Everything the game mutates, owned by the event-loop thread.
///
/// There are no locks on this struct because there is exactly one writer:
/// every listener and system receives `&mut GameState` serially on the
/// loop. The world's chunk cache is internally shared so generation tasks
/// can publish results from worker tasks.
pub struct GameState {
    pub net: SessionManager<GameState>,
    pub world: WorldManager,
    pub streamer: ChunkStreamer,
    pub users: Arc<FileStore<User>>,
    pub assets_dir: PathBuf,
}
