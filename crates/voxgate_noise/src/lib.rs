#![doc = include_str!("../README.md")]

mod cellular;
mod gradient;
mod perlin;
mod simplex;
mod value;

pub use cellular::{CellularDistance, CellularReturn};

/// The base noise algorithm a [`NoiseSource`] evaluates.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
pub enum NoiseKind {
    #[default]
    OpenSimplex2,
    OpenSimplex2S,
    Cellular,
    Perlin,
    ValueCubic,
    Value,
}

/// Fractal layering applied on top of the base algorithm.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
pub enum FractalKind {
    #[default]
    None,
    FBm,
    Ridged,
    PingPong,
    /// Warp the sampling coordinates once, then run FBm on the warped
    /// position.
    DomainWarpIndependent,
    /// Re-warp at every octave with the octave's own frequency.
    DomainWarpProgressive,
}

/// A configured, seeded noise generator.
///
/// Construction is cheap; hold one per noise field. Identical settings
/// and coordinates always produce identical outputs, which is what lets
/// the chunk cache regenerate evicted chunks bit-for-bit.
///
/// ```
/// use voxgate_noise::{FractalKind, NoiseKind, NoiseSource};
///
/// let mut noise = NoiseSource::new(1337);
/// noise.set_noise_kind(NoiseKind::OpenSimplex2);
/// noise.set_frequency(0.05);
/// noise.set_fractal_kind(FractalKind::FBm);
/// noise.set_fractal_octaves(2);
///
/// let sample = noise.get_noise_3d(12.0, 40.0, -3.0);
/// assert!((-1.0..=1.0).contains(&sample));
/// ```
#[derive(Clone, Debug)]
pub struct NoiseSource {
    seed: i32,
    frequency: f32,
    kind: NoiseKind,
    fractal: FractalKind,
    octaves: u32,
    lacunarity: f32,
    gain: f32,
    ping_pong_strength: f32,
    fractal_bounding: f32,
    cellular_distance: CellularDistance,
    cellular_return: CellularReturn,
    cellular_jitter: f32,
    warp_amplitude: f32,
}

impl NoiseSource {
    pub fn new(seed: i32) -> Self {
        let mut source = Self {
            seed,
            frequency: 0.01,
            kind: NoiseKind::default(),
            fractal: FractalKind::default(),
            octaves: 3,
            lacunarity: 2.0,
            gain: 0.5,
            ping_pong_strength: 2.0,
            fractal_bounding: 1.0,
            cellular_distance: CellularDistance::default(),
            cellular_return: CellularReturn::default(),
            cellular_jitter: 1.0,
            warp_amplitude: 1.0,
        };
        source.recalculate_bounding();
        source
    }

    pub fn seed(&self) -> i32 {
        self.seed
    }

    pub fn set_seed(&mut self, seed: i32) {
        self.seed = seed;
    }

    pub fn set_noise_kind(&mut self, kind: NoiseKind) {
        self.kind = kind;
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        self.frequency = frequency;
    }

    pub fn set_fractal_kind(&mut self, fractal: FractalKind) {
        self.fractal = fractal;
    }

    pub fn set_fractal_octaves(&mut self, octaves: u32) {
        self.octaves = octaves.max(1);
        self.recalculate_bounding();
    }

    pub fn set_fractal_lacunarity(&mut self, lacunarity: f32) {
        self.lacunarity = lacunarity;
    }

    pub fn set_fractal_gain(&mut self, gain: f32) {
        self.gain = gain;
        self.recalculate_bounding();
    }

    pub fn set_ping_pong_strength(&mut self, strength: f32) {
        self.ping_pong_strength = strength;
    }

    pub fn set_cellular_distance(&mut self, distance: CellularDistance) {
        self.cellular_distance = distance;
    }

    pub fn set_cellular_return(&mut self, ret: CellularReturn) {
        self.cellular_return = ret;
    }

    pub fn set_cellular_jitter(&mut self, jitter: f32) {
        self.cellular_jitter = jitter;
    }

    /// Warp displacement in sampling-space units, for the domain-warp
    /// fractal kinds.
    pub fn set_domain_warp_amplitude(&mut self, amplitude: f32) {
        self.warp_amplitude = amplitude;
    }

    fn recalculate_bounding(&mut self) {
        let gain = self.gain.abs();
        let mut amp = gain;
        let mut total = 1.0;

        for _ in 1..self.octaves {
            total += amp;
            amp *= gain;
        }

        self.fractal_bounding = 1.0 / total;
    }

    /// Samples the configured noise field at `(x, z)`. Output is in
    /// `[-1, 1]`.
    pub fn get_noise_2d(&self, x: f32, z: f32) -> f32 {
        let x = x * self.frequency;
        let z = z * self.frequency;

        let sample = match self.fractal {
            FractalKind::None => self.single_2d(self.seed, x, z),
            FractalKind::FBm => self.fbm_2d(x, z),
            FractalKind::Ridged => self.ridged_2d(x, z),
            FractalKind::PingPong => self.ping_pong_2d(x, z),
            FractalKind::DomainWarpIndependent => {
                let (x, z) = self.warp_2d(self.seed, self.warp_amplitude, x, z);
                self.fbm_2d(x, z)
            }
            FractalKind::DomainWarpProgressive => self.warped_fbm_2d(x, z),
        };

        sample.clamp(-1.0, 1.0)
    }

    /// Samples the configured noise field at `(x, y, z)`. Output is in
    /// `[-1, 1]`.
    pub fn get_noise_3d(&self, x: f32, y: f32, z: f32) -> f32 {
        let x = x * self.frequency;
        let y = y * self.frequency;
        let z = z * self.frequency;

        let sample = match self.fractal {
            FractalKind::None => self.single_3d(self.seed, x, y, z),
            FractalKind::FBm => self.fbm_3d(x, y, z),
            FractalKind::Ridged => self.ridged_3d(x, y, z),
            FractalKind::PingPong => self.ping_pong_3d(x, y, z),
            FractalKind::DomainWarpIndependent => {
                let (x, y, z) = self.warp_3d(self.seed, self.warp_amplitude, x, y, z);
                self.fbm_3d(x, y, z)
            }
            FractalKind::DomainWarpProgressive => self.warped_fbm_3d(x, y, z),
        };

        sample.clamp(-1.0, 1.0)
    }

    fn single_2d(&self, seed: i32, x: f32, y: f32) -> f32 {
        match self.kind {
            NoiseKind::OpenSimplex2 => simplex::simplex_2d(seed, x, y),
            NoiseKind::OpenSimplex2S => simplex::simplex_smooth_2d(seed, x, y),
            NoiseKind::Cellular => cellular::cellular_2d(
                seed,
                x,
                y,
                self.cellular_distance,
                self.cellular_return,
                self.cellular_jitter,
            ),
            NoiseKind::Perlin => perlin::perlin_2d(seed, x, y),
            NoiseKind::ValueCubic => value::value_cubic_2d(seed, x, y),
            NoiseKind::Value => value::value_2d(seed, x, y),
        }
    }

    fn single_3d(&self, seed: i32, x: f32, y: f32, z: f32) -> f32 {
        match self.kind {
            NoiseKind::OpenSimplex2 => simplex::simplex_3d(seed, x, y, z),
            NoiseKind::OpenSimplex2S => simplex::simplex_smooth_3d(seed, x, y, z),
            NoiseKind::Cellular => cellular::cellular_3d(
                seed,
                x,
                y,
                z,
                self.cellular_distance,
                self.cellular_return,
                self.cellular_jitter,
            ),
            NoiseKind::Perlin => perlin::perlin_3d(seed, x, y, z),
            NoiseKind::ValueCubic => value::value_cubic_3d(seed, x, y, z),
            NoiseKind::Value => value::value_3d(seed, x, y, z),
        }
    }

    fn fbm_2d(&self, mut x: f32, mut y: f32) -> f32 {
        let mut seed = self.seed;
        let mut amp = self.fractal_bounding;
        let mut sum = 0.0;

        for _ in 0..self.octaves {
            sum += self.single_2d(seed, x, y) * amp;

            seed = seed.wrapping_add(1);
            x *= self.lacunarity;
            y *= self.lacunarity;
            amp *= self.gain;
        }

        sum
    }

    fn fbm_3d(&self, mut x: f32, mut y: f32, mut z: f32) -> f32 {
        let mut seed = self.seed;
        let mut amp = self.fractal_bounding;
        let mut sum = 0.0;

        for _ in 0..self.octaves {
            sum += self.single_3d(seed, x, y, z) * amp;

            seed = seed.wrapping_add(1);
            x *= self.lacunarity;
            y *= self.lacunarity;
            z *= self.lacunarity;
            amp *= self.gain;
        }

        sum
    }

    fn ridged_2d(&self, mut x: f32, mut y: f32) -> f32 {
        let mut seed = self.seed;
        let mut amp = self.fractal_bounding;
        let mut sum = 0.0;

        for _ in 0..self.octaves {
            sum += (self.single_2d(seed, x, y).abs() * -2.0 + 1.0) * amp;

            seed = seed.wrapping_add(1);
            x *= self.lacunarity;
            y *= self.lacunarity;
            amp *= self.gain;
        }

        sum
    }

    fn ridged_3d(&self, mut x: f32, mut y: f32, mut z: f32) -> f32 {
        let mut seed = self.seed;
        let mut amp = self.fractal_bounding;
        let mut sum = 0.0;

        for _ in 0..self.octaves {
            sum += (self.single_3d(seed, x, y, z).abs() * -2.0 + 1.0) * amp;

            seed = seed.wrapping_add(1);
            x *= self.lacunarity;
            y *= self.lacunarity;
            z *= self.lacunarity;
            amp *= self.gain;
        }

        sum
    }

    fn ping_pong_2d(&self, mut x: f32, mut y: f32) -> f32 {
        let mut seed = self.seed;
        let mut amp = self.fractal_bounding;
        let mut sum = 0.0;

        for _ in 0..self.octaves {
            let t = (self.single_2d(seed, x, y) + 1.0) * self.ping_pong_strength;
            sum += (ping_pong(t) - 0.5) * 2.0 * amp;

            seed = seed.wrapping_add(1);
            x *= self.lacunarity;
            y *= self.lacunarity;
            amp *= self.gain;
        }

        sum
    }

    fn ping_pong_3d(&self, mut x: f32, mut y: f32, mut z: f32) -> f32 {
        let mut seed = self.seed;
        let mut amp = self.fractal_bounding;
        let mut sum = 0.0;

        for _ in 0..self.octaves {
            let t = (self.single_3d(seed, x, y, z) + 1.0) * self.ping_pong_strength;
            sum += (ping_pong(t) - 0.5) * 2.0 * amp;

            seed = seed.wrapping_add(1);
            x *= self.lacunarity;
            y *= self.lacunarity;
            z *= self.lacunarity;
            amp *= self.gain;
        }

        sum
    }

    /// Seed offsets decorrelating the warp fields from the noise itself.
    const WARP_SEED_X: i32 = 0x5eed_01;
    const WARP_SEED_Y: i32 = 0x5eed_02;
    const WARP_SEED_Z: i32 = 0x5eed_03;

    fn warp_2d(&self, seed: i32, amp: f32, x: f32, y: f32) -> (f32, f32) {
        let wx = perlin::perlin_2d(seed.wrapping_add(Self::WARP_SEED_X), x, y);
        let wy = perlin::perlin_2d(seed.wrapping_add(Self::WARP_SEED_Y), x, y);
        (x + wx * amp, y + wy * amp)
    }

    fn warp_3d(&self, seed: i32, amp: f32, x: f32, y: f32, z: f32) -> (f32, f32, f32) {
        let wx = perlin::perlin_3d(seed.wrapping_add(Self::WARP_SEED_X), x, y, z);
        let wy = perlin::perlin_3d(seed.wrapping_add(Self::WARP_SEED_Y), x, y, z);
        let wz = perlin::perlin_3d(seed.wrapping_add(Self::WARP_SEED_Z), x, y, z);
        (x + wx * amp, y + wy * amp, z + wz * amp)
    }

    fn warped_fbm_2d(&self, mut x: f32, mut y: f32) -> f32 {
        let mut seed = self.seed;
        let mut amp = self.fractal_bounding;
        let mut warp_amp = self.warp_amplitude;
        let mut sum = 0.0;

        for _ in 0..self.octaves {
            let (wx, wy) = self.warp_2d(seed, warp_amp, x, y);
            sum += self.single_2d(seed, wx, wy) * amp;

            seed = seed.wrapping_add(1);
            x *= self.lacunarity;
            y *= self.lacunarity;
            amp *= self.gain;
            warp_amp *= self.gain;
        }

        sum
    }

    fn warped_fbm_3d(&self, mut x: f32, mut y: f32, mut z: f32) -> f32 {
        let mut seed = self.seed;
        let mut amp = self.fractal_bounding;
        let mut warp_amp = self.warp_amplitude;
        let mut sum = 0.0;

        for _ in 0..self.octaves {
            let (wx, wy, wz) = self.warp_3d(seed, warp_amp, x, y, z);
            sum += self.single_3d(seed, wx, wy, wz) * amp;

            seed = seed.wrapping_add(1);
            x *= self.lacunarity;
            y *= self.lacunarity;
            z *= self.lacunarity;
            amp *= self.gain;
            warp_amp *= self.gain;
        }

        sum
    }
}

/// Folds `t` into a triangle wave over `[0, 1]`.
fn ping_pong(t: f32) -> f32 {
    let t = t - ((t * 0.5) as i32 * 2) as f32;
    if t < 1.0 {
        t
    } else {
        2.0 - t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_KINDS: [NoiseKind; 6] = [
        NoiseKind::OpenSimplex2,
        NoiseKind::OpenSimplex2S,
        NoiseKind::Cellular,
        NoiseKind::Perlin,
        NoiseKind::ValueCubic,
        NoiseKind::Value,
    ];

    const ALL_FRACTALS: [FractalKind; 6] = [
        FractalKind::None,
        FractalKind::FBm,
        FractalKind::Ridged,
        FractalKind::PingPong,
        FractalKind::DomainWarpIndependent,
        FractalKind::DomainWarpProgressive,
    ];

    fn sweep(noise: &NoiseSource) -> Vec<f32> {
        let mut samples = Vec::new();
        for i in -40..40 {
            let f = i as f32 * 7.13;
            samples.push(noise.get_noise_2d(f, -f * 0.7));
            samples.push(noise.get_noise_3d(f, f * 0.3, -f));
        }
        samples
    }

    #[test]
    fn every_configuration_stays_in_range() {
        for kind in ALL_KINDS {
            for fractal in ALL_FRACTALS {
                let mut noise = NoiseSource::new(1337);
                noise.set_noise_kind(kind);
                noise.set_fractal_kind(fractal);
                noise.set_frequency(0.05);

                for sample in sweep(&noise) {
                    assert!(
                        (-1.0..=1.0).contains(&sample),
                        "{kind:?}/{fractal:?} produced {sample}"
                    );
                }
            }
        }
    }

    #[test]
    fn identical_settings_are_deterministic() {
        for kind in ALL_KINDS {
            let mut a = NoiseSource::new(42);
            a.set_noise_kind(kind);
            a.set_fractal_kind(FractalKind::FBm);
            a.set_fractal_octaves(4);

            let b = a.clone();

            assert_eq!(sweep(&a), sweep(&b), "{kind:?}");
        }
    }

    #[test]
    fn seeds_decorrelate() {
        let a = NoiseSource::new(1);
        let b = NoiseSource::new(2);

        assert_ne!(sweep(&a), sweep(&b));
    }

    #[test]
    fn kinds_produce_distinct_fields() {
        let mut fields = Vec::new();
        for kind in ALL_KINDS {
            let mut noise = NoiseSource::new(7);
            noise.set_noise_kind(kind);
            fields.push(sweep(&noise));
        }

        for i in 0..fields.len() {
            for j in i + 1..fields.len() {
                assert_ne!(fields[i], fields[j], "{:?} vs {:?}", ALL_KINDS[i], ALL_KINDS[j]);
            }
        }
    }

    #[test]
    fn octave_count_changes_the_field() {
        let mut one = NoiseSource::new(9);
        one.set_fractal_kind(FractalKind::FBm);
        one.set_fractal_octaves(1);

        let mut four = one.clone();
        four.set_fractal_octaves(4);

        assert_ne!(sweep(&one), sweep(&four));
    }

    #[test]
    fn low_frequency_fields_vary_slowly() {
        let mut noise = NoiseSource::new(3);
        noise.set_frequency(0.0005);

        let a = noise.get_noise_2d(100.0, 100.0);
        let b = noise.get_noise_2d(100.5, 100.5);

        assert!((a - b).abs() < 0.05, "low frequency should be smooth");
    }

    #[test]
    fn ping_pong_folds_into_unit_interval() {
        for i in 0..100 {
            let t = i as f32 * 0.173;
            let folded = ping_pong(t);
            assert!((0.0..=1.0).contains(&folded), "{t} -> {folded}");
        }
    }
}
