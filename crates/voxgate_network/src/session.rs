//! Per-peer session state.

use std::net::SocketAddr;
use std::time::Instant;

use glam::{IVec3, Vec3};
use rustc_hash::FxHashSet;

use crate::PeerId;

/// Identity of one session, assigned monotonically by the session
/// manager. Sessions are addressed by id; the manager outlives them all.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// The world-space side a player faces, derived from the rotation vector.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
pub enum FacingSide {
    #[default]
    North,
    South,
    East,
    West,
    Top,
    Bottom,
}

impl FacingSide {
    /// The dominant absolute axis of `rotation` picks the side; the sign
    /// picks which of the pair. Zero rotation faces north.
    pub fn from_rotation(rotation: Vec3) -> Self {
        let ax = rotation.x.abs();
        let ay = rotation.y.abs();
        let az = rotation.z.abs();

        if ax == 0.0 && ay == 0.0 && az == 0.0 {
            return Self::North;
        }

        if ax >= ay && ax >= az {
            if rotation.x >= 0.0 {
                Self::East
            } else {
                Self::West
            }
        } else if ay >= az {
            if rotation.y >= 0.0 {
                Self::Top
            } else {
                Self::Bottom
            }
        } else if rotation.z >= 0.0 {
            Self::North
        } else {
            Self::South
        }
    }
}

/// Mutable state of one connected peer.
///
/// Owned by the session manager and only ever mutated on the event-loop
/// thread. Setters are guarded: assigning an unchanged value is a no-op
/// and reports `false`.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    peer: PeerId,
    addr: SocketAddr,
    logged_in: bool,
    last_ping: Instant,
    position: Vec3,
    rotation: Vec3,
    facing: FacingSide,
    sent_chunks: FxHashSet<IVec3>,
}

impl Session {
    pub(crate) fn new(id: SessionId, peer: PeerId, addr: SocketAddr) -> Self {
        Self {
            id,
            peer,
            addr,
            logged_in: false,
            last_ping: Instant::now(),
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            facing: FacingSide::default(),
            sent_chunks: FxHashSet::default(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub(crate) fn peer(&self) -> PeerId {
        self.peer
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn logged_in(&self) -> bool {
        self.logged_in
    }

    pub fn set_logged_in(&mut self, logged_in: bool) -> bool {
        if self.logged_in == logged_in {
            return false;
        }
        self.logged_in = logged_in;
        true
    }

    pub fn last_ping(&self) -> Instant {
        self.last_ping
    }

    /// Records peer activity for timeout bookkeeping.
    pub fn touch(&mut self) {
        self.last_ping = Instant::now();
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) -> bool {
        if self.position == position {
            return false;
        }
        self.position = position;
        true
    }

    pub fn rotation(&self) -> Vec3 {
        self.rotation
    }

    /// Stores a normalized rotation (zero stays zero) and re-derives the
    /// facing side.
    pub fn set_rotation(&mut self, rotation: Vec3) -> bool {
        let normalized = if rotation == Vec3::ZERO {
            rotation
        } else {
            rotation.normalize()
        };

        if self.rotation == normalized {
            return false;
        }

        self.rotation = normalized;
        self.facing = FacingSide::from_rotation(normalized);
        true
    }

    pub fn facing(&self) -> FacingSide {
        self.facing
    }

    /// World origins of every chunk this session has been sent.
    pub fn sent_chunks(&self) -> &FxHashSet<IVec3> {
        &self.sent_chunks
    }

    /// Marks a chunk as delivered. Best-effort: delivery means the frame
    /// was handed to the transport, not that the peer stored it.
    pub fn mark_chunk_sent(&mut self, origin: IVec3) -> bool {
        self.sent_chunks.insert(origin)
    }

    pub(crate) fn clear_sent_chunks(&mut self) {
        self.sent_chunks.clear();
    }
}
