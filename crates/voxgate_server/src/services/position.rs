//! Player movement intake.

use voxgate_network::SessionManager;
use voxgate_protocol::messages::PlayerPositionRequest;

use crate::{streaming, GameState};

pub(crate) fn register(net: &mut SessionManager<GameState>) {
    net.on::<PlayerPositionRequest>("position", |state, handle, session, request| {
        let Some(s) = state.net.session_mut(session) else {
            return Ok(());
        };

        if !s.logged_in() {
            // Movement before login is ignored, not fatal.
            return Ok(());
        }

        let moved = s.set_position(request.position);
        s.set_rotation(request.rotation);

        if moved {
            streaming::stream_view(state, handle, session);
        }

        Ok(())
    });
}
