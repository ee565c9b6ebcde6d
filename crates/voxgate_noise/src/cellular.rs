//! Cellular (Worley) noise: distances to jittered feature points.

use crate::gradient::{floor, hash2, hash3, PRIME_X, PRIME_Y, PRIME_Z};

/// How the distance to a feature point is measured.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
pub enum CellularDistance {
    #[default]
    Euclidean,
    EuclideanSq,
    Manhattan,
    /// Manhattan plus squared-euclidean, a cheap anisotropy blend.
    Hybrid,
}

/// What the lookup returns once the two nearest feature points are known.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
pub enum CellularReturn {
    /// A per-cell constant, useful for region ids.
    CellValue,
    #[default]
    Distance,
    Distance2,
    Distance2Add,
    Distance2Sub,
    Distance2Mul,
    Distance2Div,
}

/// Maximum feature point offset from its cell center, before the jitter
/// modifier. Chosen so neighboring-cell search windows always contain the
/// nearest point.
const JITTER_MAX: f32 = 0.437_015_95;

#[inline]
fn jitter_offset(h: i32, shift: u32) -> f32 {
    // Sixteen hash bits per axis is plenty for sub-cell placement.
    let bits = ((h >> shift) & 0xffff) as f32;
    (bits / 65535.0 - 0.5) * 2.0 * JITTER_MAX
}

#[inline]
fn measure2(distance: CellularDistance, dx: f32, dy: f32) -> f32 {
    match distance {
        CellularDistance::Euclidean | CellularDistance::EuclideanSq => dx * dx + dy * dy,
        CellularDistance::Manhattan => dx.abs() + dy.abs(),
        CellularDistance::Hybrid => dx.abs() + dy.abs() + (dx * dx + dy * dy),
    }
}

#[inline]
fn measure3(distance: CellularDistance, dx: f32, dy: f32, dz: f32) -> f32 {
    match distance {
        CellularDistance::Euclidean | CellularDistance::EuclideanSq => {
            dx * dx + dy * dy + dz * dz
        }
        CellularDistance::Manhattan => dx.abs() + dy.abs() + dz.abs(),
        CellularDistance::Hybrid => {
            dx.abs() + dy.abs() + dz.abs() + (dx * dx + dy * dy + dz * dz)
        }
    }
}

fn finish(
    distance: CellularDistance,
    ret: CellularReturn,
    mut d0: f32,
    mut d1: f32,
    closest_hash: i32,
) -> f32 {
    if distance == CellularDistance::Euclidean {
        d0 = d0.sqrt();
        d1 = d1.sqrt();
    }

    match ret {
        CellularReturn::CellValue => closest_hash as f32 * (1.0 / 2147483648.0),
        CellularReturn::Distance => d0 - 1.0,
        CellularReturn::Distance2 => d1 - 1.0,
        CellularReturn::Distance2Add => (d1 + d0) * 0.5 - 1.0,
        CellularReturn::Distance2Sub => d1 - d0 - 1.0,
        CellularReturn::Distance2Mul => d1 * d0 * 0.5 - 1.0,
        CellularReturn::Distance2Div => d0 / d1 - 1.0,
    }
}

pub(crate) fn cellular_2d(
    seed: i32,
    x: f32,
    y: f32,
    distance: CellularDistance,
    ret: CellularReturn,
    jitter: f32,
) -> f32 {
    let xc = floor(x);
    let yc = floor(y);

    let mut d0 = f32::MAX;
    let mut d1 = f32::MAX;
    let mut closest_hash = 0;

    for xi in xc - 1..=xc + 1 {
        for yi in yc - 1..=yc + 1 {
            let xp = xi.wrapping_mul(PRIME_X);
            let yp = yi.wrapping_mul(PRIME_Y);
            let h = hash2(seed, xp, yp);

            let fx = xi as f32 + jitter_offset(h, 0) * jitter;
            let fy = yi as f32 + jitter_offset(h, 16) * jitter;

            let d = measure2(distance, fx - x, fy - y);

            if d < d0 {
                d1 = d0;
                d0 = d;
                closest_hash = h;
            } else if d < d1 {
                d1 = d;
            }
        }
    }

    finish(distance, ret, d0, d1, closest_hash)
}

pub(crate) fn cellular_3d(
    seed: i32,
    x: f32,
    y: f32,
    z: f32,
    distance: CellularDistance,
    ret: CellularReturn,
    jitter: f32,
) -> f32 {
    let xc = floor(x);
    let yc = floor(y);
    let zc = floor(z);

    let mut d0 = f32::MAX;
    let mut d1 = f32::MAX;
    let mut closest_hash = 0;

    for xi in xc - 1..=xc + 1 {
        for yi in yc - 1..=yc + 1 {
            for zi in zc - 1..=zc + 1 {
                let xp = xi.wrapping_mul(PRIME_X);
                let yp = yi.wrapping_mul(PRIME_Y);
                let zp = zi.wrapping_mul(PRIME_Z);
                let h = hash3(seed, xp, yp, zp);

                let fx = xi as f32 + jitter_offset(h, 0) * jitter;
                let fy = yi as f32 + jitter_offset(h, 10) * jitter;
                let fz = zi as f32 + jitter_offset(h, 16) * jitter;

                let d = measure3(distance, fx - x, fy - y, fz - z);

                if d < d0 {
                    d1 = d0;
                    d0 = d;
                    closest_hash = h;
                } else if d < d1 {
                    d1 = d;
                }
            }
        }
    }

    finish(distance, ret, d0, d1, closest_hash)
}
