//! World ⇄ chunk coordinate algebra.
//!
//! Chunks are `SIZE × HEIGHT × SIZE` volumes addressed by their
//! world-space origin. All of the math here is pure and total; negative
//! world coordinates are handled with euclidean division.

use glam::{IVec3, Vec3};

use crate::{CHUNK_HEIGHT, CHUNK_SIZE};

/// The chunk grid indices containing a world position.
pub fn chunk_coords_of(world: IVec3) -> IVec3 {
    IVec3::new(
        world.x.div_euclid(CHUNK_SIZE),
        world.y.div_euclid(CHUNK_HEIGHT),
        world.z.div_euclid(CHUNK_SIZE),
    )
}

/// The world-space origin of the chunk containing a world position.
pub fn chunk_origin_of(world: IVec3) -> IVec3 {
    origin_of_coords(chunk_coords_of(world))
}

/// The world-space origin of a chunk given its grid indices.
pub fn origin_of_coords(coords: IVec3) -> IVec3 {
    IVec3::new(
        coords.x * CHUNK_SIZE,
        coords.y * CHUNK_HEIGHT,
        coords.z * CHUNK_SIZE,
    )
}

/// The chunk-local offset of a world position.
pub fn local_of(world: IVec3) -> IVec3 {
    IVec3::new(
        world.x.rem_euclid(CHUNK_SIZE),
        world.y.rem_euclid(CHUNK_HEIGHT),
        world.z.rem_euclid(CHUNK_SIZE),
    )
}

/// The chunk origin under a floating-point position, e.g. a player.
pub fn chunk_origin_of_point(point: Vec3) -> IVec3 {
    chunk_origin_of(IVec3::new(
        point.x.floor() as i32,
        point.y.floor() as i32,
        point.z.floor() as i32,
    ))
}
