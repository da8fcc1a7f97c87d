// Scalar field over a fixed voxel grid, painted with metaball contributions.
//
// Layout:
//   GridTransform: padded world AABB ↔ grid indices ↔ grid-local [-1, 1]³
//   ScalarField:   N³ samples, accumulates `strength / d² - subtract` balls
//
// Distances are measured in world units divided by FIELD_REFERENCE_EXTENT,
// not by the grid's own size. A ball therefore has the same world-space
// footprint no matter how large the padded bounds of the network are, and
// the falloff is isotropic even when the grid is not a cube.

use glam::{UVec3, Vec3};

// ============================================================================
// CONSTANTS
// ============================================================================

/// World length that maps to one unit of normalized field distance.
pub const FIELD_REFERENCE_EXTENT: f32 = 1.62;

/// Strength of a ball per unit of (radius / FIELD_REFERENCE_EXTENT).
pub const INFLUENCE_SCALE: f32 = 12.0;

/// Constant subtracted from every ball's falloff; the ball contributes
/// nothing beyond `d² = strength / FIELD_SUBTRACT`.
pub const FIELD_SUBTRACT: f32 = 12.0;

/// Iso value at which the surface is extracted.
pub const ISOLATION: f32 = 80.0;

/// Samples per grid axis.
pub const DEFAULT_RESOLUTION: u32 = 64;

/// World-space padding added on every side of the sampled bounds.
pub const GRID_PADDING: f32 = 1.5;

// ============================================================================
// GRID TRANSFORM
// ============================================================================

/// Fixed mapping between world space and the voxel grid of one generation call.
///
/// Sample `i` on an axis sits at grid-local `2·i/(N-1) - 1`, and grid-local
/// maps to world as `center + local · half_extent`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridTransform {
    pub min:        Vec3,
    pub max:        Vec3,
    pub resolution: u32,
}

impl GridTransform {
    /// Bounds of `points`, padded by `padding` on every side.
    /// Falls back to a unit cube around the origin when `points` is empty.
    pub fn enclosing(points: impl IntoIterator<Item = Vec3>, padding: f32, resolution: u32) -> Self {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for p in points {
            min = min.min(p);
            max = max.max(p);
        }
        if !min.is_finite() || !max.is_finite() {
            min = Vec3::splat(-0.5);
            max = Vec3::splat(0.5);
        }
        Self {
            min: min - Vec3::splat(padding),
            max: max + Vec3::splat(padding),
            resolution: resolution.max(2),
        }
    }

    pub fn size(&self) -> Vec3 { self.max - self.min }
    pub fn center(&self) -> Vec3 { (self.min + self.max) * 0.5 }
    pub fn half_extent(&self) -> Vec3 { self.size() * 0.5 }

    /// World distance between neighbouring samples on each axis.
    pub fn spacing(&self) -> Vec3 {
        self.size() / (self.resolution - 1) as f32
    }

    /// Fractional grid index → grid-local coordinates in [-1, 1].
    #[inline]
    pub fn index_to_local(&self, index: Vec3) -> Vec3 {
        index * (2.0 / (self.resolution - 1) as f32) - Vec3::ONE
    }

    /// Grid-local [-1, 1]³ → world space.
    #[inline]
    pub fn local_to_world(&self, local: Vec3) -> Vec3 {
        self.center() + local * self.half_extent()
    }

    #[inline]
    pub fn index_to_world(&self, index: Vec3) -> Vec3 {
        self.local_to_world(self.index_to_local(index))
    }

    /// World → fractional grid index (unclamped).
    #[inline]
    pub fn world_to_index(&self, world: Vec3) -> Vec3 {
        (world - self.min) / self.spacing()
    }
}

// ============================================================================
// FIELD CONTRIBUTION
// ============================================================================

/// One metaball: a world-space center and its normalized strength.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldContribution {
    pub center:   Vec3,
    pub strength: f32,
}

impl FieldContribution {
    /// Ball whose strength is derived from a world-space radius.
    pub fn from_radius(center: Vec3, radius: f32) -> Self {
        Self { center, strength: radius / FIELD_REFERENCE_EXTENT * INFLUENCE_SCALE }
    }

    /// World distance beyond which the ball adds nothing.
    pub fn cutoff_radius(&self) -> f32 {
        FIELD_REFERENCE_EXTENT * (self.strength.max(0.0) / FIELD_SUBTRACT).sqrt()
    }

    /// Value this ball adds at `point` (zero outside the cutoff).
    #[inline]
    pub fn value_at(&self, point: Vec3) -> f32 {
        let d2 = point.distance_squared(self.center) / (FIELD_REFERENCE_EXTENT * FIELD_REFERENCE_EXTENT);
        let v = self.strength / (1e-6 + d2) - FIELD_SUBTRACT;
        v.max(0.0)
    }
}

// ============================================================================
// SCALAR FIELD
// ============================================================================

pub struct ScalarField {
    transform: GridTransform,
    values:    Vec<f32>,
}

impl ScalarField {
    pub fn new(transform: GridTransform) -> Self {
        let n = transform.resolution as usize;
        Self { transform, values: vec![0.0; n * n * n] }
    }

    pub fn transform(&self) -> &GridTransform { &self.transform }
    pub fn resolution(&self) -> u32 { self.transform.resolution }

    #[inline]
    fn offset(&self, x: u32, y: u32, z: u32) -> usize {
        let n = self.transform.resolution as usize;
        (z as usize * n + y as usize) * n + x as usize
    }

    #[inline]
    pub fn value(&self, x: u32, y: u32, z: u32) -> f32 {
        self.values[self.offset(x, y, z)]
    }

    /// Add one ball to every sample inside its cutoff sphere.
    pub fn add(&mut self, ball: FieldContribution) {
        if ball.strength <= 0.0 || !ball.center.is_finite() {
            return;
        }
        let reach = Vec3::splat(ball.cutoff_radius());
        let last = (self.transform.resolution - 1) as f32;
        let lo = self.transform.world_to_index(ball.center - reach).ceil().clamp(Vec3::ZERO, Vec3::splat(last));
        let hi = self.transform.world_to_index(ball.center + reach).floor().clamp(Vec3::ZERO, Vec3::splat(last));
        let (lo, hi) = (lo.as_uvec3(), hi.as_uvec3());

        for z in lo.z..=hi.z {
            for y in lo.y..=hi.y {
                for x in lo.x..=hi.x {
                    let world = self.transform.index_to_world(UVec3::new(x, y, z).as_vec3());
                    let v = ball.value_at(world);
                    if v > 0.0 {
                        let i = self.offset(x, y, z);
                        self.values[i] += v;
                    }
                }
            }
        }
    }

    pub fn add_all(&mut self, balls: &[FieldContribution]) {
        for &ball in balls {
            self.add(ball);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_transform() -> GridTransform {
        GridTransform::enclosing([Vec3::ZERO], 1.0, 21)
    }

    #[test]
    fn transform_maps_corners_to_bounds() {
        let t = GridTransform::enclosing([Vec3::new(-1.0, 0.0, 2.0), Vec3::new(3.0, 5.0, 4.0)], 1.5, 64);
        assert!(t.index_to_world(Vec3::ZERO).distance(t.min) < 1e-4);
        assert!(t.index_to_world(Vec3::splat(63.0)).distance(t.max) < 1e-4);
        let mid = t.world_to_index(t.center());
        assert!(mid.distance(Vec3::splat(31.5)) < 1e-3);
    }

    #[test]
    fn empty_input_gives_usable_grid() {
        let t = GridTransform::enclosing(std::iter::empty::<Vec3>(), 1.5, 64);
        assert!(t.size().min_element() > 0.0);
    }

    #[test]
    fn ball_value_vanishes_at_cutoff() {
        let ball = FieldContribution::from_radius(Vec3::ZERO, 0.2);
        let r = ball.cutoff_radius();
        assert!(ball.value_at(Vec3::new(r * 1.001, 0.0, 0.0)) == 0.0);
        assert!(ball.value_at(Vec3::new(r * 0.5, 0.0, 0.0)) > 0.0);
    }

    #[test]
    fn adding_a_ball_peaks_at_its_center() {
        let mut field = ScalarField::new(unit_transform());
        field.add(FieldContribution::from_radius(Vec3::ZERO, 0.3));
        let center = field.value(10, 10, 10);
        assert!(center > ISOLATION);
        assert!(field.value(10, 10, 12) < center);
        assert_eq!(field.value(0, 0, 0), 0.0);
    }

    #[test]
    fn non_finite_ball_is_ignored() {
        let mut field = ScalarField::new(unit_transform());
        field.add(FieldContribution { center: Vec3::NAN, strength: 1.0 });
        assert!((0..21).all(|i| field.value(i, i, i) == 0.0));
    }
}
