//! Explicit chunk pulls.

use voxgate_network::SessionManager;
use voxgate_protocol::messages::ChunkRequest;

use crate::{streaming, GameState};

pub(crate) fn register(net: &mut SessionManager<GameState>) {
    net.on::<ChunkRequest>("chunks", |state, handle, session, request| {
        streaming::serve_request(state, handle, session, request.origins.clone());
        Ok(())
    });
}
