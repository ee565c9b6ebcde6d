//! Build version handshake.

use voxgate_network::SessionManager;
use voxgate_protocol::messages::{VersionRequest, VersionResponse};

use crate::GameState;

/// The version reported to clients, taken from the build metadata.
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

pub(crate) fn register(net: &mut SessionManager<GameState>) {
    net.on::<VersionRequest>("version", |state, _, session, request| {
        state.net.send(
            session,
            &VersionResponse {
                request_id: request.request_id,
                version: SERVER_VERSION.to_owned(),
            }
            .into(),
        )
    });
}
