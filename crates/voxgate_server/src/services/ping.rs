//! Liveness echo.

use std::time::{SystemTime, UNIX_EPOCH};

use voxgate_network::SessionManager;
use voxgate_protocol::messages::{Ping, Pong};

use crate::GameState;

pub(crate) fn register(net: &mut SessionManager<GameState>) {
    net.on::<Ping>("ping", |state, _, session, ping| {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        state.net.send(
            session,
            &Pong { request_id: ping.request_id, timestamp_ms }.into(),
        )
    });
}
