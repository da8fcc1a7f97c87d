// 3D simplex noise and the clot erosion pattern built on it.
//
// `simplex3` is the classic permutation-polynomial simplex noise (mod 289
// hashing, no lookup tables) so the WGSL fragment shader can evaluate the
// exact same function on the GPU. `DissolveNoise` layers three octaves of it,
// mixes in a directional bias and classifies a clot-local point as solid,
// glowing edge or discarded for a given dissolve amount.

use glam::{Vec3, Vec4};

use super::hash::seeded_random;

// ============================================================================
// SIMPLEX NOISE
// ============================================================================

#[inline]
fn mod289_3(x: Vec3) -> Vec3 {
    x - (x * (1.0 / 289.0)).floor() * 289.0
}

#[inline]
fn mod289_4(x: Vec4) -> Vec4 {
    x - (x * (1.0 / 289.0)).floor() * 289.0
}

#[inline]
fn permute(x: Vec4) -> Vec4 {
    mod289_4((x * 34.0 + 1.0) * x)
}

#[inline]
fn taylor_inv_sqrt(r: Vec4) -> Vec4 {
    Vec4::splat(1.792_842_9) - r * 0.853_734_7
}

/// GLSL `step(edge, x)`: 0 where x < edge, 1 elsewhere.
#[inline]
fn step3(edge: Vec3, x: Vec3) -> Vec3 {
    Vec3::select(x.cmplt(edge), Vec3::ZERO, Vec3::ONE)
}

#[inline]
fn step4(edge: Vec4, x: Vec4) -> Vec4 {
    Vec4::select(x.cmplt(edge), Vec4::ZERO, Vec4::ONE)
}

/// Simplex noise in roughly [-1, 1].
pub fn simplex3(v: Vec3) -> f32 {
    const C: (f32, f32) = (1.0 / 6.0, 1.0 / 3.0);

    // Skewed cell origin and the first corner offset.
    let mut i = (v + Vec3::splat(v.dot(Vec3::splat(C.1)))).floor();
    let x0 = v - i + Vec3::splat(i.dot(Vec3::splat(C.0)));

    // Which simplex of the skewed cube we are in.
    let g = step3(Vec3::new(x0.y, x0.z, x0.x), x0);
    let l = Vec3::ONE - g;
    let l_zxy = Vec3::new(l.z, l.x, l.y);
    let i1 = g.min(l_zxy);
    let i2 = g.max(l_zxy);

    let x1 = x0 - i1 + Vec3::splat(C.0);
    let x2 = x0 - i2 + Vec3::splat(C.1);
    let x3 = x0 - Vec3::splat(0.5);

    i = mod289_3(i);
    let p = permute(
        permute(
            permute(Vec4::splat(i.z) + Vec4::new(0.0, i1.z, i2.z, 1.0))
                + Vec4::splat(i.y)
                + Vec4::new(0.0, i1.y, i2.y, 1.0),
        ) + Vec4::splat(i.x)
            + Vec4::new(0.0, i1.x, i2.x, 1.0),
    );

    // Gradients: 7x7 points over a square, mapped onto an octahedron.
    // Plain divisions: j and x_ must be exact for integer p.
    let j = p - 49.0 * (p / 49.0).floor();
    let x_ = (j / 7.0).floor();
    let y_ = (j - 7.0 * x_).floor();

    let x = x_ * (2.0 / 7.0) + Vec4::splat(0.5 / 7.0 - 1.0);
    let y = y_ * (2.0 / 7.0) + Vec4::splat(0.5 / 7.0 - 1.0);
    let h = Vec4::ONE - x.abs() - y.abs();

    let b0 = Vec4::new(x.x, x.y, y.x, y.y);
    let b1 = Vec4::new(x.z, x.w, y.z, y.w);

    let s0 = b0.floor() * 2.0 + 1.0;
    let s1 = b1.floor() * 2.0 + 1.0;
    let sh = -step4(h, Vec4::ZERO);

    let a0 = Vec4::new(b0.x, b0.z, b0.y, b0.w) + Vec4::new(s0.x, s0.z, s0.y, s0.w) * Vec4::new(sh.x, sh.x, sh.y, sh.y);
    let a1 = Vec4::new(b1.x, b1.z, b1.y, b1.w) + Vec4::new(s1.x, s1.z, s1.y, s1.w) * Vec4::new(sh.z, sh.z, sh.w, sh.w);

    let mut p0 = Vec3::new(a0.x, a0.y, h.x);
    let mut p1 = Vec3::new(a0.z, a0.w, h.y);
    let mut p2 = Vec3::new(a1.x, a1.y, h.z);
    let mut p3 = Vec3::new(a1.z, a1.w, h.w);

    let norm = taylor_inv_sqrt(Vec4::new(p0.dot(p0), p1.dot(p1), p2.dot(p2), p3.dot(p3)));
    p0 *= norm.x;
    p1 *= norm.y;
    p2 *= norm.z;
    p3 *= norm.w;

    let m = (Vec4::splat(0.6) - Vec4::new(x0.dot(x0), x1.dot(x1), x2.dot(x2), x3.dot(x3))).max(Vec4::ZERO);
    let m = m * m;
    42.0 * (m * m).dot(Vec4::new(p0.dot(x0), p1.dot(x1), p2.dot(x2), p3.dot(x3)))
}

// ============================================================================
// DISSOLVE PATTERN
// ============================================================================

/// Width of the glowing band just above the dissolve threshold.
pub const EDGE_WIDTH: f32 = 0.12;

/// Weight of the directional bias in the final pattern.
pub const DIRECTIONAL_MIX: f32 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Erosion {
    /// Below the threshold: not drawn.
    Discarded,
    /// Just above the threshold; carries the glow weight in (0, 1].
    Edge(f32),
    Solid,
}

/// Seeded erosion pattern for the clot.
///
/// The seed shifts the noise domain; the same seed gives the same pattern
/// on the CPU and in the shader (which receives `offset()` as a uniform).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DissolveNoise {
    offset: Vec3,
}

impl DissolveNoise {
    pub fn new(seed: f32) -> Self {
        let offset = Vec3::new(
            seeded_random(seed),
            seeded_random(seed + 1.0),
            seeded_random(seed + 2.0),
        ) * 64.0;
        Self { offset }
    }

    pub fn offset(&self) -> Vec3 { self.offset }

    /// Pattern value at a clot-local point, roughly in [-0.05, 0.8].
    /// Points facing `direction` get lower values and erode first.
    pub fn sample(&self, local: Vec3, time: f32, direction: Vec3) -> f32 {
        let q = local + self.offset;
        let mut n = simplex3(q * 8.0 + Vec3::splat(time * 0.5)) * 0.5 + 0.5;
        n += simplex3(q * 16.0 - Vec3::splat(time * 0.3)) * 0.25;
        n += simplex3(q * 32.0) * 0.125;
        n /= 1.875;

        let bias = 0.5 - local.normalize_or_zero().dot(direction.normalize_or_zero()) * 0.3;
        n + (bias - n) * DIRECTIONAL_MIX
    }

    /// Classify a point for dissolve amount `threshold`.
    /// Nothing erodes at threshold 0.
    pub fn classify(&self, local: Vec3, time: f32, direction: Vec3, threshold: f32) -> Erosion {
        if threshold <= 0.0 {
            return Erosion::Solid;
        }
        let n = self.sample(local, time, direction);
        if n < threshold {
            return Erosion::Discarded;
        }
        let glow = 1.0 - smoothstep(threshold, threshold + EDGE_WIDTH, n);
        if glow > 0.0 { Erosion::Edge(glow) } else { Erosion::Solid }
    }
}

#[inline]
fn smoothstep(e0: f32, e1: f32, x: f32) -> f32 {
    let t = ((x - e0) / (e1 - e0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lattice() -> impl Iterator<Item = Vec3> {
        (0..12).flat_map(|i| {
            (0..12).flat_map(move |j| {
                (0..12).map(move |k| Vec3::new(i as f32, j as f32, k as f32) * 0.037 - Vec3::splat(0.2))
            })
        })
    }

    #[test]
    fn simplex_is_bounded_and_not_constant() {
        let values: Vec<f32> = lattice().map(|p| simplex3(p * 8.0)).collect();
        assert!(values.iter().all(|v| v.abs() <= 1.05));
        let min = values.iter().copied().fold(f32::MAX, f32::min);
        let max = values.iter().copied().fold(f32::MIN, f32::max);
        assert!(max - min > 0.5, "range {min}..{max}");
    }

    #[test]
    fn simplex_is_deterministic() {
        let p = Vec3::new(0.1, 0.2, 0.3);
        assert_eq!(simplex3(p), simplex3(p));
        assert!((simplex3(p) + 0.4755).abs() < 1e-3);
    }

    #[test]
    fn same_seed_same_pattern() {
        let a = DissolveNoise::new(3.0);
        let b = DissolveNoise::new(3.0);
        let c = DissolveNoise::new(4.0);
        assert_eq!(a, b);
        assert_ne!(a.offset(), c.offset());
    }

    #[test]
    fn zero_dissolve_keeps_everything() {
        let noise = DissolveNoise::new(1.0);
        assert!(lattice().all(|p| noise.classify(p, 2.0, Vec3::X, 0.0) == Erosion::Solid));
    }

    #[test]
    fn full_dissolve_removes_everything() {
        let noise = DissolveNoise::new(1.0);
        assert!(lattice().all(|p| noise.classify(p, 2.0, Vec3::X, 1.0) == Erosion::Discarded));
    }

    #[test]
    fn erosion_only_grows_with_dissolve() {
        let noise = DissolveNoise::new(9.0);
        let discarded = |d: f32| {
            lattice().filter(|&p| noise.classify(p, 0.5, Vec3::X, d) == Erosion::Discarded).count()
        };
        let counts: Vec<usize> = [0.1, 0.3, 0.5, 0.7].into_iter().map(discarded).collect();
        assert!(counts.windows(2).all(|w| w[0] <= w[1]), "{counts:?}");
        assert!(counts[3] > counts[0]);
    }

    #[test]
    fn points_facing_the_instrument_erode_first() {
        let noise = DissolveNoise::new(5.0);
        let toward: f32 = lattice().map(|p| noise.sample(p.with_x(p.x.abs() + 0.05), 0.0, Vec3::X)).sum();
        let away: f32 = lattice().map(|p| noise.sample(p.with_x(-p.x.abs() - 0.05), 0.0, Vec3::X)).sum();
        assert!(toward < away);
    }
}
