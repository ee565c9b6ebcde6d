//! Open-simplex style noise on the skewed triangular / tetrahedral
//! lattice.

use crate::gradient::{floor, grad2, grad3, PRIME_X, PRIME_Y, PRIME_Z};

const SQRT3: f32 = 1.732_050_8;
/// 2D skew/unskew factors.
const F2: f32 = 0.5 * (SQRT3 - 1.0);
const G2: f32 = (3.0 - SQRT3) / 6.0;
/// 3D skew/unskew factors.
const F3: f32 = 1.0 / 3.0;
const G3: f32 = 1.0 / 6.0;

pub(crate) fn simplex_2d(seed: i32, x: f32, y: f32) -> f32 {
    let s = (x + y) * F2;
    let i = floor(x + s);
    let j = floor(y + s);

    let t = (i + j) as f32 * G2;
    let x0 = x - (i as f32 - t);
    let y0 = y - (j as f32 - t);

    // Which of the two triangles of the skewed cell are we in?
    let (i1, j1) = if x0 > y0 { (1, 0) } else { (0, 1) };

    let x1 = x0 - i1 as f32 + G2;
    let y1 = y0 - j1 as f32 + G2;
    let x2 = x0 - 1.0 + 2.0 * G2;
    let y2 = y0 - 1.0 + 2.0 * G2;

    let ip = i.wrapping_mul(PRIME_X);
    let jp = j.wrapping_mul(PRIME_Y);

    let mut n = 0.0;

    let t0 = 0.5 - x0 * x0 - y0 * y0;
    if t0 > 0.0 {
        let t0 = t0 * t0;
        n += t0 * t0 * grad2(seed, ip, jp, x0, y0);
    }

    let t1 = 0.5 - x1 * x1 - y1 * y1;
    if t1 > 0.0 {
        let t1 = t1 * t1;
        n += t1
            * t1
            * grad2(
                seed,
                ip.wrapping_add(i1 * PRIME_X),
                jp.wrapping_add(j1 * PRIME_Y),
                x1,
                y1,
            );
    }

    let t2 = 0.5 - x2 * x2 - y2 * y2;
    if t2 > 0.0 {
        let t2 = t2 * t2;
        n += t2
            * t2
            * grad2(
                seed,
                ip.wrapping_add(PRIME_X),
                jp.wrapping_add(PRIME_Y),
                x2,
                y2,
            );
    }

    n * 70.0
}

pub(crate) fn simplex_3d(seed: i32, x: f32, y: f32, z: f32) -> f32 {
    let s = (x + y + z) * F3;
    let i = floor(x + s);
    let j = floor(y + s);
    let k = floor(z + s);

    let t = (i + j + k) as f32 * G3;
    let x0 = x - (i as f32 - t);
    let y0 = y - (j as f32 - t);
    let z0 = z - (k as f32 - t);

    // Rank the offsets to pick the simplex traversal order.
    let (i1, j1, k1, i2, j2, k2) = if x0 >= y0 {
        if y0 >= z0 {
            (1, 0, 0, 1, 1, 0)
        } else if x0 >= z0 {
            (1, 0, 0, 1, 0, 1)
        } else {
            (0, 0, 1, 1, 0, 1)
        }
    } else if y0 < z0 {
        (0, 0, 1, 0, 1, 1)
    } else if x0 < z0 {
        (0, 1, 0, 0, 1, 1)
    } else {
        (0, 1, 0, 1, 1, 0)
    };

    let x1 = x0 - i1 as f32 + G3;
    let y1 = y0 - j1 as f32 + G3;
    let z1 = z0 - k1 as f32 + G3;
    let x2 = x0 - i2 as f32 + 2.0 * G3;
    let y2 = y0 - j2 as f32 + 2.0 * G3;
    let z2 = z0 - k2 as f32 + 2.0 * G3;
    let x3 = x0 - 1.0 + 3.0 * G3;
    let y3 = y0 - 1.0 + 3.0 * G3;
    let z3 = z0 - 1.0 + 3.0 * G3;

    let ip = i.wrapping_mul(PRIME_X);
    let jp = j.wrapping_mul(PRIME_Y);
    let kp = k.wrapping_mul(PRIME_Z);

    let mut n = 0.0;

    let corners = [
        (ip, jp, kp, x0, y0, z0),
        (
            ip.wrapping_add(i1 * PRIME_X),
            jp.wrapping_add(j1 * PRIME_Y),
            kp.wrapping_add(k1 * PRIME_Z),
            x1,
            y1,
            z1,
        ),
        (
            ip.wrapping_add(i2 * PRIME_X),
            jp.wrapping_add(j2 * PRIME_Y),
            kp.wrapping_add(k2 * PRIME_Z),
            x2,
            y2,
            z2,
        ),
        (
            ip.wrapping_add(PRIME_X),
            jp.wrapping_add(PRIME_Y),
            kp.wrapping_add(PRIME_Z),
            x3,
            y3,
            z3,
        ),
    ];

    for (cx, cy, cz, dx, dy, dz) in corners {
        let t = 0.6 - dx * dx - dy * dy - dz * dz;
        if t > 0.0 {
            let t = t * t;
            n += t * t * grad3(seed, cx, cy, cz, dx, dy, dz);
        }
    }

    n * 32.0
}

/// Seed perturbation for the second lattice of the smooth variant.
const SMOOTH_LATTICE_SEED_OFFSET: i32 = 1_293_373;

/// The smoother variant: two simplex lattices offset by half a cell,
/// averaged. Averaging suppresses the directional artifacts of a single
/// lattice at the cost of one extra evaluation.
pub(crate) fn simplex_smooth_2d(seed: i32, x: f32, y: f32) -> f32 {
    let a = simplex_2d(seed, x, y);
    let b = simplex_2d(
        seed.wrapping_add(SMOOTH_LATTICE_SEED_OFFSET),
        x + 0.5,
        y + 0.5,
    );
    (a + b) * 0.5
}

pub(crate) fn simplex_smooth_3d(seed: i32, x: f32, y: f32, z: f32) -> f32 {
    let a = simplex_3d(seed, x, y, z);
    let b = simplex_3d(
        seed.wrapping_add(SMOOTH_LATTICE_SEED_OFFSET),
        x + 0.5,
        y + 0.5,
        z + 0.5,
    );
    (a + b) * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        assert_eq!(simplex_2d(3, 0.4, 0.9), simplex_2d(3, 0.4, 0.9));
        assert_eq!(simplex_3d(3, 0.4, 0.9, 1.6), simplex_3d(3, 0.4, 0.9, 1.6));
        assert_eq!(
            simplex_smooth_3d(3, 0.4, 0.9, 1.6),
            simplex_smooth_3d(3, 0.4, 0.9, 1.6)
        );
    }

    #[test]
    fn smooth_variant_differs_from_base() {
        let mut differs = false;
        for i in 0..32 {
            let x = i as f32 * 0.31;
            if simplex_2d(11, x, -x) != simplex_smooth_2d(11, x, -x) {
                differs = true;
                break;
            }
        }
        assert!(differs);
    }

    #[test]
    fn stays_roughly_bounded() {
        for i in -200..200 {
            let x = i as f32 * 0.173;
            let y = i as f32 * 0.311;
            let v2 = simplex_2d(77, x, y);
            let v3 = simplex_3d(77, x, y, x * 0.5);
            assert!(v2.abs() < 1.5, "{v2}");
            assert!(v3.abs() < 1.5, "{v3}");
        }
    }
}
