//! Per-player chunk streaming.
//!
//! Invoked whenever a session's position changes (or a client pulls
//! chunks explicitly): compute the view set, subtract what the session
//! already has, fetch nearest-first, batch below the frame budget, send,
//! and only then mark chunks as sent.

use glam::{IVec3, Vec3};
use tracing::{debug, warn};
use voxgate_loop::{LoopHandle, Priority};
use voxgate_network::SessionId;
use voxgate_protocol::messages::{ChunkPayload, ChunkResponse};
use voxgate_world::coords::{chunk_coords_of, origin_of_coords};
use voxgate_world::{CHUNK_SIZE, CHUNK_VOLUME};

use crate::GameState;

/// Chunks per response frame. Three payloads stay safely under the 64 KiB
/// reliable-datagram budget of one frame.
const MAX_CHUNKS_PER_RESPONSE: usize = 3;
const _: () = assert!(MAX_CHUNKS_PER_RESPONSE * CHUNK_VOLUME as usize + 1024 < 65536);

/// Hard cap on an explicit chunk pull, bounding hostile requests.
const MAX_EXPLICIT_ORIGINS: usize = 128;

/// Computes which chunks each player should have.
pub struct ChunkStreamer {
    view_radius: i32,
}

impl ChunkStreamer {
    pub fn new(view_radius: i32) -> Self {
        Self { view_radius }
    }

    pub fn view_radius(&self) -> i32 {
        self.view_radius
    }

    /// Every chunk origin in view of `position`, nearest first by squared
    /// horizontal distance. The world is one chunk layer tall, so the
    /// view set lives at the ground layer.
    pub fn origins_in_view(&self, position: Vec3) -> Vec<IVec3> {
        let center = chunk_coords_of(IVec3::new(
            position.x.floor() as i32,
            0,
            position.z.floor() as i32,
        ));

        let mut origins = Vec::new();
        for cx in center.x - self.view_radius..=center.x + self.view_radius {
            for cz in center.z - self.view_radius..=center.z + self.view_radius {
                origins.push(origin_of_coords(IVec3::new(cx, 0, cz)));
            }
        }

        let px = position.x;
        let pz = position.z;
        origins.sort_by_key(|origin| {
            let dx = (origin.x + CHUNK_SIZE / 2) as f32 - px;
            let dz = (origin.z + CHUNK_SIZE / 2) as f32 - pz;
            (dx * dx + dz * dz) as i64
        });

        origins
    }
}

/// Streams every in-view chunk the session does not have yet. Safe to
/// call redundantly: an unchanged position yields an empty missing set
/// and nothing is sent.
pub fn stream_view(state: &mut GameState, handle: &LoopHandle<GameState>, session: SessionId) {
    let Some(s) = state.net.session(session) else {
        return;
    };

    let missing: Vec<IVec3> = state
        .streamer
        .origins_in_view(s.position())
        .into_iter()
        .filter(|origin| !s.sent_chunks().contains(origin))
        .collect();

    if missing.is_empty() {
        return;
    }

    debug!(%session, missing = missing.len(), "streaming chunks");
    fetch_and_send(state, handle, session, missing);
}

/// Fetches `origins` off-loop and hands the payloads back as a send
/// action. Used by both view streaming and explicit chunk pulls.
pub fn fetch_and_send(
    state: &mut GameState,
    handle: &LoopHandle<GameState>,
    session: SessionId,
    origins: Vec<IVec3>,
) {
    if origins.is_empty() {
        return;
    }

    let world = state.world.clone();

    handle.enqueue_async(Priority::Normal, "chunk-fetch", move |h| async move {
        let mut payloads = Vec::with_capacity(origins.len());

        for origin in origins {
            match world.cache().get(origin).await {
                Ok(chunk) => {
                    payloads.push(ChunkPayload {
                        origin,
                        blocks: chunk.read().kind_bytes(),
                    });
                }
                Err(e) => {
                    // Left unsent on purpose; the next position update
                    // retries it.
                    warn!(?origin, "chunk fetch failed: {e}");
                }
            }
        }

        if payloads.is_empty() {
            return;
        }

        h.enqueue(Priority::Normal, "chunk-send", move |state, _| {
            send_batches(state, session, payloads)
        });
    });
}

fn send_batches(
    state: &mut GameState,
    session: SessionId,
    payloads: Vec<ChunkPayload>,
) -> anyhow::Result<()> {
    if state.net.session(session).is_none() {
        // The player left while chunks were generating.
        return Ok(());
    }

    for batch in payloads.chunks(MAX_CHUNKS_PER_RESPONSE) {
        let origins: Vec<IVec3> = batch.iter().map(|p| p.origin).collect();

        let response = ChunkResponse { chunks: batch.to_vec() };
        state.net.send(session, &response.into())?;

        // Marked sent only after the frame was handed to the transport.
        if let Some(s) = state.net.session_mut(session) {
            for origin in origins {
                s.mark_chunk_sent(origin);
            }
        }
    }

    Ok(())
}

/// Serves an explicit chunk pull, bounded and deduplicated against the
/// session's sent set.
pub fn serve_request(
    state: &mut GameState,
    handle: &LoopHandle<GameState>,
    session: SessionId,
    mut origins: Vec<IVec3>,
) {
    origins.truncate(MAX_EXPLICIT_ORIGINS);

    let Some(s) = state.net.session(session) else {
        return;
    };

    origins.retain(|origin| !s.sent_chunks().contains(origin));
    fetch_and_send(state, handle, session, origins);
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn view_set_is_a_square_ring_sorted_nearest_first() {
        let streamer = ChunkStreamer::new(2);
        let origins = streamer.origins_in_view(Vec3::new(8.0, 1.0, 8.0));

        assert_eq!(origins.len(), 25);
        // The player's own chunk comes first.
        assert_eq!(origins[0], IVec3::ZERO);
        // Corners come last.
        let last = *origins.last().unwrap();
        assert_eq!(last.x.abs(), 32);
        assert_eq!(last.z.abs(), 32);
    }

    #[test]
    fn view_set_follows_the_player_across_chunk_borders() {
        let streamer = ChunkStreamer::new(1);

        let at_origin = streamer.origins_in_view(Vec3::new(1.0, 0.0, 1.0));
        let next_door = streamer.origins_in_view(Vec3::new(17.0, 0.0, 1.0));

        assert!(at_origin.contains(&IVec3::new(-16, 0, 0)));
        assert!(!next_door.contains(&IVec3::new(-16, 0, 0)));
        assert!(next_door.contains(&IVec3::new(32, 0, 0)));
    }

    #[test]
    fn negative_positions_snap_to_their_chunk() {
        let streamer = ChunkStreamer::new(0);
        let origins = streamer.origins_in_view(Vec3::new(-0.5, 0.0, -0.5));

        assert_eq!(origins, vec![IVec3::new(-16, 0, -16)]);
    }
}
