// Deterministic per-entity pseudo-random values.
//
// Every procedural choice (clot ring jitter, particle descriptors, debris
// trajectories) is a pure function of an explicit integer/float seed so that
// rebuilding the scene reproduces it bit for bit.

/// Golden-ratio conjugate, the base multiplier for particle seeds.
pub const GOLDEN: f32 = 0.618_033_988_749;

/// Fractional part in [0, 1), also for negative inputs.
#[inline]
pub fn fract(x: f32) -> f32 {
    x - x.floor()
}

/// Classic sine hash: `fract(sin(seed·12.9898 + 78.233)·43758.5453)`.
///
/// Evaluated in f64 so that large seeds (clot bumps use seeds in the
/// thousands) keep their low bits.
#[inline]
pub fn seeded_random(seed: f32) -> f32 {
    let x = ((seed as f64) * 12.9898 + 78.233).sin() * 43_758.545_3;
    ((x - x.floor()) as f32).min(0.999_999_9)
}

/// Value in [-1, 1) derived from `seeded_random`.
#[inline]
pub fn signed_random(seed: f32) -> f32 {
    seeded_random(seed) * 2.0 - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fract_wraps_negative_values() {
        assert!((fract(-0.25) - 0.75).abs() < 1e-6);
        assert!((fract(3.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn seeded_random_is_stable_and_bounded() {
        for seed in 0..5000 {
            let a = seeded_random(seed as f32);
            let b = seeded_random(seed as f32);
            assert_eq!(a.to_bits(), b.to_bits());
            assert!((0.0..1.0).contains(&a));
        }
    }

    #[test]
    fn neighbouring_seeds_differ() {
        assert_ne!(seeded_random(1000.0), seeded_random(1001.0));
    }
}
