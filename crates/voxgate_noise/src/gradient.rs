//! Integer lattice hashing and gradient primitives shared by the noise
//! variants.
//!
//! Coordinates are pre-multiplied by large primes so neighboring lattice
//! points decorrelate under the final avalanche multiply. All arithmetic
//! wraps; overflow is part of the hash.

pub(crate) const PRIME_X: i32 = 501125321;
pub(crate) const PRIME_Y: i32 = 1136930381;
pub(crate) const PRIME_Z: i32 = 1720413743;

const HASH_MULTIPLIER: i32 = 0x27d4eb2d;

#[inline]
pub(crate) fn hash2(seed: i32, xp: i32, yp: i32) -> i32 {
    (seed ^ xp ^ yp).wrapping_mul(HASH_MULTIPLIER)
}

#[inline]
pub(crate) fn hash3(seed: i32, xp: i32, yp: i32, zp: i32) -> i32 {
    (seed ^ xp ^ yp ^ zp).wrapping_mul(HASH_MULTIPLIER)
}

/// A white-noise value in `[-1, 1)` for one lattice point.
#[inline]
pub(crate) fn value2(seed: i32, xp: i32, yp: i32) -> f32 {
    let mut h = hash2(seed, xp, yp);
    h = h.wrapping_mul(h);
    h ^= h.wrapping_shl(19);
    h as f32 * (1.0 / 2147483648.0)
}

#[inline]
pub(crate) fn value3(seed: i32, xp: i32, yp: i32, zp: i32) -> f32 {
    let mut h = hash3(seed, xp, yp, zp);
    h = h.wrapping_mul(h);
    h ^= h.wrapping_shl(19);
    h as f32 * (1.0 / 2147483648.0)
}

const SQRT_HALF: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// Eight unit gradient directions for 2D noise.
const GRAD2: [(f32, f32); 8] = [
    (1.0, 0.0),
    (SQRT_HALF, SQRT_HALF),
    (0.0, 1.0),
    (-SQRT_HALF, SQRT_HALF),
    (-1.0, 0.0),
    (-SQRT_HALF, -SQRT_HALF),
    (0.0, -1.0),
    (SQRT_HALF, -SQRT_HALF),
];

/// The twelve cube-edge directions for 3D noise, padded to sixteen entries
/// so selection is a mask instead of a modulo.
const GRAD3: [(f32, f32, f32); 16] = [
    (1.0, 1.0, 0.0),
    (-1.0, 1.0, 0.0),
    (1.0, -1.0, 0.0),
    (-1.0, -1.0, 0.0),
    (1.0, 0.0, 1.0),
    (-1.0, 0.0, 1.0),
    (1.0, 0.0, -1.0),
    (-1.0, 0.0, -1.0),
    (0.0, 1.0, 1.0),
    (0.0, -1.0, 1.0),
    (0.0, 1.0, -1.0),
    (0.0, -1.0, -1.0),
    (1.0, 1.0, 0.0),
    (-1.0, 1.0, 0.0),
    (0.0, -1.0, 1.0),
    (0.0, -1.0, -1.0),
];

/// Dot product of the hashed lattice gradient and the offset vector.
#[inline]
pub(crate) fn grad2(seed: i32, xp: i32, yp: i32, xd: f32, yd: f32) -> f32 {
    let h = hash2(seed, xp, yp);
    let (gx, gy) = GRAD2[((h >> 15) & 7) as usize];
    xd * gx + yd * gy
}

#[inline]
pub(crate) fn grad3(seed: i32, xp: i32, yp: i32, zp: i32, xd: f32, yd: f32, zd: f32) -> f32 {
    let h = hash3(seed, xp, yp, zp);
    let (gx, gy, gz) = GRAD3[((h >> 15) & 15) as usize];
    xd * gx + yd * gy + zd * gz
}

#[inline]
pub(crate) fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + t * (b - a)
}

/// Hermite smoothing, continuous first derivative.
#[inline]
pub(crate) fn hermite(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

/// Quintic smoothing, continuous second derivative. Used by perlin to
/// avoid visible lattice artifacts in lighting-like derivatives.
#[inline]
pub(crate) fn quintic(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

/// Catmull-Rom style interpolation over four samples.
#[inline]
pub(crate) fn cubic_lerp(a: f32, b: f32, c: f32, d: f32, t: f32) -> f32 {
    let p = (d - c) - (a - b);
    t * t * t * p + t * t * ((a - b) - p) + t * (c - a) + b
}

#[inline]
pub(crate) fn floor(f: f32) -> i32 {
    let i = f as i32;
    if f < i as f32 {
        i - 1
    } else {
        i
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_deterministic() {
        assert_eq!(hash2(1337, PRIME_X, PRIME_Y), hash2(1337, PRIME_X, PRIME_Y));
        assert_ne!(hash2(1337, PRIME_X, PRIME_Y), hash2(1338, PRIME_X, PRIME_Y));
    }

    #[test]
    fn lattice_values_stay_in_range() {
        for i in -50i32..50 {
            for j in -50i32..50 {
                let v = value2(42, i.wrapping_mul(PRIME_X), j.wrapping_mul(PRIME_Y));
                assert!((-1.0..=1.0).contains(&v), "{v} out of range");
            }
        }
    }

    #[test]
    fn floor_handles_negatives() {
        assert_eq!(floor(1.7), 1);
        assert_eq!(floor(-0.2), -1);
        assert_eq!(floor(-2.0), -2);
        assert_eq!(floor(0.0), 0);
    }

    #[test]
    fn cubic_lerp_passes_through_its_middle_points() {
        assert_eq!(cubic_lerp(0.0, 3.0, 7.0, 10.0, 0.0), 3.0);
        assert_eq!(cubic_lerp(0.0, 3.0, 7.0, 10.0, 1.0), 7.0);
    }
}
