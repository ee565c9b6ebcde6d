//! Classic gradient noise with quintic fades.

use crate::gradient::{floor, grad2, grad3, lerp, quintic, PRIME_X, PRIME_Y, PRIME_Z};

/// Scales the raw lattice dot products toward `[-1, 1]`. The public entry
/// points clamp afterwards, so a rare overshoot cannot escape.
const PERLIN_2D_BOUNDING: f32 = 1.4142135;
const PERLIN_3D_BOUNDING: f32 = 0.9649214;

pub(crate) fn perlin_2d(seed: i32, x: f32, y: f32) -> f32 {
    let x0 = floor(x);
    let y0 = floor(y);

    let xd0 = x - x0 as f32;
    let yd0 = y - y0 as f32;
    let xd1 = xd0 - 1.0;
    let yd1 = yd0 - 1.0;

    let xs = quintic(xd0);
    let ys = quintic(yd0);

    let x0 = x0.wrapping_mul(PRIME_X);
    let y0 = y0.wrapping_mul(PRIME_Y);
    let x1 = x0.wrapping_add(PRIME_X);
    let y1 = y0.wrapping_add(PRIME_Y);

    let xf0 = lerp(grad2(seed, x0, y0, xd0, yd0), grad2(seed, x1, y0, xd1, yd0), xs);
    let xf1 = lerp(grad2(seed, x0, y1, xd0, yd1), grad2(seed, x1, y1, xd1, yd1), xs);

    lerp(xf0, xf1, ys) * PERLIN_2D_BOUNDING
}

pub(crate) fn perlin_3d(seed: i32, x: f32, y: f32, z: f32) -> f32 {
    let x0 = floor(x);
    let y0 = floor(y);
    let z0 = floor(z);

    let xd0 = x - x0 as f32;
    let yd0 = y - y0 as f32;
    let zd0 = z - z0 as f32;
    let xd1 = xd0 - 1.0;
    let yd1 = yd0 - 1.0;
    let zd1 = zd0 - 1.0;

    let xs = quintic(xd0);
    let ys = quintic(yd0);
    let zs = quintic(zd0);

    let x0 = x0.wrapping_mul(PRIME_X);
    let y0 = y0.wrapping_mul(PRIME_Y);
    let z0 = z0.wrapping_mul(PRIME_Z);
    let x1 = x0.wrapping_add(PRIME_X);
    let y1 = y0.wrapping_add(PRIME_Y);
    let z1 = z0.wrapping_add(PRIME_Z);

    let xf00 = lerp(
        grad3(seed, x0, y0, z0, xd0, yd0, zd0),
        grad3(seed, x1, y0, z0, xd1, yd0, zd0),
        xs,
    );
    let xf10 = lerp(
        grad3(seed, x0, y1, z0, xd0, yd1, zd0),
        grad3(seed, x1, y1, z0, xd1, yd1, zd0),
        xs,
    );
    let xf01 = lerp(
        grad3(seed, x0, y0, z1, xd0, yd0, zd1),
        grad3(seed, x1, y0, z1, xd1, yd0, zd1),
        xs,
    );
    let xf11 = lerp(
        grad3(seed, x0, y1, z1, xd0, yd1, zd1),
        grad3(seed, x1, y1, z1, xd1, yd1, zd1),
        xs,
    );

    let yf0 = lerp(xf00, xf10, ys);
    let yf1 = lerp(xf01, xf11, ys);

    lerp(yf0, yf1, zs) * PERLIN_3D_BOUNDING
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_at_lattice_points() {
        // Gradient noise is exactly zero where every offset is zero along
        // the gradient.
        assert_eq!(perlin_2d(1, 0.0, 0.0), 0.0);
        assert_eq!(perlin_3d(1, 4.0, -2.0, 9.0), 0.0);
    }

    #[test]
    fn deterministic_per_seed() {
        assert_eq!(perlin_2d(5, 1.25, 2.5), perlin_2d(5, 1.25, 2.5));
        assert_ne!(
            perlin_3d(5, 1.25, 2.5, 3.75),
            perlin_3d(6, 1.25, 2.5, 3.75),
            "different seeds must decorrelate"
        );
    }

    #[test]
    fn varies_between_lattice_points() {
        let mut distinct = std::collections::BTreeSet::new();
        for i in 0..100 {
            let v = perlin_2d(99, i as f32 * 0.37 + 0.11, i as f32 * 0.53 + 0.07);
            distinct.insert((v * 1e6) as i64);
        }
        assert!(distinct.len() > 50, "noise looks constant");
    }
}
