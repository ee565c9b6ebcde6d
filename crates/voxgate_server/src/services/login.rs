//! Authentication and spawn.

use glam::Vec3;
use tracing::info;
use voxgate_network::SessionManager;
use voxgate_protocol::messages::{
    LoginRequest, LoginResponse, PlayerPositionResponse, SystemChat,
};
use voxgate_store::verify_password;

use crate::{streaming, GameState};

/// Where a fresh login is placed.
const SPAWN_POSITION: Vec3 = Vec3::new(1.0, 1.0, 1.0);

pub(crate) fn register(net: &mut SessionManager<GameState>) {
    net.on::<LoginRequest>("login", |state, handle, session, request| {
        let user = state
            .users
            .search(|u| u.email == request.email)
            .into_iter()
            .next();

        let accepted = user
            .as_ref()
            .is_some_and(|u| verify_password(&request.password, &u.password_hash));

        if !accepted {
            state.net.send(
                session,
                &LoginResponse {
                    request_id: request.request_id,
                    success: false,
                    reason: Some("invalid credentials".into()),
                }
                .into(),
            )?;
            return Ok(());
        }

        state.net.send(
            session,
            &LoginResponse {
                request_id: request.request_id,
                success: true,
                reason: None,
            }
            .into(),
        )?;

        if let Some(s) = state.net.session_mut(session) {
            s.set_logged_in(true);
            s.set_position(SPAWN_POSITION);
            s.set_rotation(Vec3::ZERO);
        }

        // The assigned spawn, pushed right behind the login result.
        state.net.send(
            session,
            &PlayerPositionResponse {
                position: SPAWN_POSITION,
                rotation: Vec3::ZERO,
            }
            .into(),
        )?;

        info!(%session, email = %request.email, "login accepted");
        state
            .net
            .broadcast(&SystemChat { text: format!("{} joined", request.email) }.into());

        // Spawning is a position change; stream the surrounding world.
        streaming::stream_view(state, handle, session);

        Ok(())
    });
}
