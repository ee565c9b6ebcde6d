//! Value and cubic-value noise: interpolated white noise on the integer
//! lattice.

use crate::gradient::{
    cubic_lerp, floor, hermite, lerp, value2, value3, PRIME_X, PRIME_Y, PRIME_Z,
};

pub(crate) fn value_2d(seed: i32, x: f32, y: f32) -> f32 {
    let x0 = floor(x);
    let y0 = floor(y);

    let xs = hermite(x - x0 as f32);
    let ys = hermite(y - y0 as f32);

    let x0 = x0.wrapping_mul(PRIME_X);
    let y0 = y0.wrapping_mul(PRIME_Y);
    let x1 = x0.wrapping_add(PRIME_X);
    let y1 = y0.wrapping_add(PRIME_Y);

    let xf0 = lerp(value2(seed, x0, y0), value2(seed, x1, y0), xs);
    let xf1 = lerp(value2(seed, x0, y1), value2(seed, x1, y1), xs);

    lerp(xf0, xf1, ys)
}

pub(crate) fn value_3d(seed: i32, x: f32, y: f32, z: f32) -> f32 {
    let x0 = floor(x);
    let y0 = floor(y);
    let z0 = floor(z);

    let xs = hermite(x - x0 as f32);
    let ys = hermite(y - y0 as f32);
    let zs = hermite(z - z0 as f32);

    let x0 = x0.wrapping_mul(PRIME_X);
    let y0 = y0.wrapping_mul(PRIME_Y);
    let z0 = z0.wrapping_mul(PRIME_Z);
    let x1 = x0.wrapping_add(PRIME_X);
    let y1 = y0.wrapping_add(PRIME_Y);
    let z1 = z0.wrapping_add(PRIME_Z);

    let xf00 = lerp(value3(seed, x0, y0, z0), value3(seed, x1, y0, z0), xs);
    let xf10 = lerp(value3(seed, x0, y1, z0), value3(seed, x1, y1, z0), xs);
    let xf01 = lerp(value3(seed, x0, y0, z1), value3(seed, x1, y0, z1), xs);
    let xf11 = lerp(value3(seed, x0, y1, z1), value3(seed, x1, y1, z1), xs);

    let yf0 = lerp(xf00, xf10, ys);
    let yf1 = lerp(xf01, xf11, ys);

    lerp(yf0, yf1, zs)
}

/// Bounding factor keeping the 2D cubic interpolation inside `[-1, 1]`.
const CUBIC_2D_BOUNDING: f32 = 1.0 / (1.5 * 1.5);
const CUBIC_3D_BOUNDING: f32 = 1.0 / (1.5 * 1.5 * 1.5);

pub(crate) fn value_cubic_2d(seed: i32, x: f32, y: f32) -> f32 {
    let x1 = floor(x);
    let y1 = floor(y);

    let xs = x - x1 as f32;
    let ys = y - y1 as f32;

    let x1 = x1.wrapping_mul(PRIME_X);
    let y1 = y1.wrapping_mul(PRIME_Y);
    let x0 = x1.wrapping_sub(PRIME_X);
    let y0 = y1.wrapping_sub(PRIME_Y);
    let x2 = x1.wrapping_add(PRIME_X);
    let y2 = y1.wrapping_add(PRIME_Y);
    let x3 = x2.wrapping_add(PRIME_X);
    let y3 = y2.wrapping_add(PRIME_Y);

    let mut rows = [0.0; 4];
    for (row, yp) in rows.iter_mut().zip([y0, y1, y2, y3]) {
        *row = cubic_lerp(
            value2(seed, x0, yp),
            value2(seed, x1, yp),
            value2(seed, x2, yp),
            value2(seed, x3, yp),
            xs,
        );
    }

    cubic_lerp(rows[0], rows[1], rows[2], rows[3], ys) * CUBIC_2D_BOUNDING
}

pub(crate) fn value_cubic_3d(seed: i32, x: f32, y: f32, z: f32) -> f32 {
    let x1 = floor(x);
    let y1 = floor(y);
    let z1 = floor(z);

    let xs = x - x1 as f32;
    let ys = y - y1 as f32;
    let zs = z - z1 as f32;

    let x1 = x1.wrapping_mul(PRIME_X);
    let y1 = y1.wrapping_mul(PRIME_Y);
    let z1 = z1.wrapping_mul(PRIME_Z);
    let xp = [
        x1.wrapping_sub(PRIME_X),
        x1,
        x1.wrapping_add(PRIME_X),
        x1.wrapping_add(PRIME_X).wrapping_add(PRIME_X),
    ];
    let yp = [
        y1.wrapping_sub(PRIME_Y),
        y1,
        y1.wrapping_add(PRIME_Y),
        y1.wrapping_add(PRIME_Y).wrapping_add(PRIME_Y),
    ];
    let zp = [
        z1.wrapping_sub(PRIME_Z),
        z1,
        z1.wrapping_add(PRIME_Z),
        z1.wrapping_add(PRIME_Z).wrapping_add(PRIME_Z),
    ];

    let mut layers = [0.0; 4];
    for (layer, zc) in layers.iter_mut().zip(zp) {
        let mut rows = [0.0; 4];
        for (row, yc) in rows.iter_mut().zip(yp) {
            *row = cubic_lerp(
                value3(seed, xp[0], yc, zc),
                value3(seed, xp[1], yc, zc),
                value3(seed, xp[2], yc, zc),
                value3(seed, xp[3], yc, zc),
                xs,
            );
        }
        *layer = cubic_lerp(rows[0], rows[1], rows[2], rows[3], ys);
    }

    cubic_lerp(layers[0], layers[1], layers[2], layers[3], zs) * CUBIC_3D_BOUNDING
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_lattice_values_at_integer_points() {
        // At integer coordinates the interpolation collapses to the corner
        // value itself.
        let at = value_2d(9, 3.0, -5.0);
        let corner = value2(
            9,
            3i32.wrapping_mul(PRIME_X),
            (-5i32).wrapping_mul(PRIME_Y),
        );
        assert!((at - corner).abs() < 1e-6);
    }

    #[test]
    fn deterministic_everywhere() {
        for &(x, y, z) in &[(0.3, 0.7, -2.2), (100.5, -40.25, 7.125)] {
            assert_eq!(value_3d(7, x, y, z), value_3d(7, x, y, z));
            assert_eq!(value_cubic_3d(7, x, y, z), value_cubic_3d(7, x, y, z));
        }
    }

    #[test]
    fn cubic_variant_stays_bounded() {
        for i in 0..500 {
            let x = i as f32 * 0.173;
            let y = i as f32 * -0.091;
            let v = value_cubic_2d(1234, x, y);
            assert!((-1.0..=1.0).contains(&v), "{v}");
        }
    }
}
