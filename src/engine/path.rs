// Centerline curves: the 3D axes of vessels, blood-flow tracks and the catheter.
//
// A centerline is a uniform Catmull-Rom spline through its control points.
// The first and last spans use reflected phantom points, so the curve passes
// through every control point and is C¹ everywhere.
//
// Parameter t is normalized over the control polygon (not arc length) and is
// clamped to [0, 1] on every query, so out-of-range parameters never fail.

use glam::Vec3;
use super::error::GeometryError;

/// Number of samples used to build the arc-length table.
const LENGTH_SAMPLES: usize = 200;

/// Below this derivative magnitude the analytic tangent is considered degenerate.
const TANGENT_EPSILON: f32 = 1e-6;

// ============================================================================
// CENTERLINE CURVE
// ============================================================================

#[derive(Debug, Clone)]
pub struct CenterlineCurve {
    points: Vec<Vec3>,
    /// Cumulative chord length at t = i / LENGTH_SAMPLES.
    arc_table: Vec<f32>,
}

impl CenterlineCurve {
    /// Build a curve from ≥2 finite control points with non-zero total length.
    pub fn new(points: Vec<Vec3>) -> Result<Self, GeometryError> {
        if points.len() < 2 {
            return Err(GeometryError::TooFewControlPoints { found: points.len() });
        }
        if points.iter().any(|p| !p.is_finite()) {
            return Err(GeometryError::NonFiniteControlPoint);
        }

        let mut curve = Self { points, arc_table: Vec::new() };
        curve.arc_table = curve.measure_arc_table();
        if curve.length() <= f32::EPSILON {
            return Err(GeometryError::ZeroLengthCurve);
        }
        Ok(curve)
    }

    /// Arc length of the whole curve in world units.
    pub fn length(&self) -> f32 {
        self.arc_table.last().copied().unwrap_or(0.0)
    }

    /// Curve parameter at which `fraction` of the arc length has been covered.
    pub fn param_at_fraction(&self, fraction: f32) -> f32 {
        let target = fraction.clamp(0.0, 1.0) * self.length();
        let i = self.arc_table.partition_point(|&d| d < target);
        if i == 0 {
            return 0.0;
        }
        if i >= self.arc_table.len() {
            return 1.0;
        }
        let (d0, d1) = (self.arc_table[i - 1], self.arc_table[i]);
        let s = if d1 > d0 { (target - d0) / (d1 - d0) } else { 0.0 };
        (i as f32 - 1.0 + s) / LENGTH_SAMPLES as f32
    }

    /// Position after `fraction` of the arc length (uniform speed along the curve).
    pub fn point_at_fraction(&self, fraction: f32) -> Vec3 {
        self.point_at(self.param_at_fraction(fraction))
    }

    /// Position on the curve at parameter `t` (clamped to [0, 1]).
    pub fn point_at(&self, t: f32) -> Vec3 {
        let (p0, p1, p2, p3, u) = self.span(t);
        let u2 = u * u;
        let u3 = u2 * u;
        0.5 * ((2.0 * p1)
            + (-p0 + p2) * u
            + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * u2
            + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * u3)
    }

    /// Unit tangent at parameter `t` (clamped to [0, 1]).
    ///
    /// Uses the analytic spline derivative. If that vanishes (repeated control
    /// points) falls back to a finite-difference chord, then to +Y, so the
    /// result is always unit length.
    pub fn tangent_at(&self, t: f32) -> Vec3 {
        let (p0, p1, p2, p3, u) = self.span(t);
        let derivative = 0.5 * ((-p0 + p2)
            + 2.0 * (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * u
            + 3.0 * (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * u * u);

        if derivative.length_squared() > TANGENT_EPSILON * TANGENT_EPSILON {
            return derivative.normalize();
        }

        let t = t.clamp(0.0, 1.0);
        let delta = 1e-3;
        let chord = self.point_at((t + delta).min(1.0)) - self.point_at((t - delta).max(0.0));
        chord.try_normalize().unwrap_or(Vec3::Y)
    }

    /// Cross-section frame at parameter `t`.
    pub fn frame_at(&self, t: f32) -> RadialFrame {
        RadialFrame::from_tangent(self.tangent_at(t))
    }

    /// `divisions + 1` evenly spaced (in parameter) points from t=0 to t=1.
    pub fn sample(&self, divisions: usize) -> Vec<Vec3> {
        let divisions = divisions.max(1);
        (0..=divisions)
            .map(|i| self.point_at(i as f32 / divisions as f32))
            .collect()
    }

    // Control points of the span containing `t`, plus the local parameter u.
    fn span(&self, t: f32) -> (Vec3, Vec3, Vec3, Vec3, f32) {
        let n = self.points.len();
        let scaled = t.clamp(0.0, 1.0) * (n - 1) as f32;
        let i = (scaled.floor() as usize).min(n - 2);
        let u = scaled - i as f32;

        let p1 = self.points[i];
        let p2 = self.points[i + 1];
        let p0 = if i == 0 { 2.0 * p1 - p2 } else { self.points[i - 1] };
        let p3 = if i + 2 >= n { 2.0 * p2 - p1 } else { self.points[i + 2] };
        (p0, p1, p2, p3, u)
    }

    fn measure_arc_table(&self) -> Vec<f32> {
        let samples = self.sample(LENGTH_SAMPLES);
        let mut table = Vec::with_capacity(samples.len());
        let mut total = 0.0;
        table.push(0.0);
        for w in samples.windows(2) {
            total += w[0].distance(w[1]);
            table.push(total);
        }
        table
    }
}

// ============================================================================
// RADIAL FRAME
// ============================================================================

/// Orthonormal cross-section basis around a tangent.
///
/// `right` and `forward` span the plane perpendicular to `tangent`. Built with
/// cross products against world +Y, or +X when the tangent is nearly vertical.
/// Shared by the clot blob, particle radial offsets and stuck-position search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadialFrame {
    pub tangent: Vec3,
    pub right:   Vec3,
    pub forward: Vec3,
}

impl RadialFrame {
    pub fn from_tangent(tangent: Vec3) -> Self {
        let tangent = tangent.try_normalize().unwrap_or(Vec3::Y);
        let up = if tangent.dot(Vec3::Y).abs() > 0.99 { Vec3::X } else { Vec3::Y };
        let right = tangent.cross(up).normalize();
        let forward = right.cross(tangent).normalize();
        Self { tangent, right, forward }
    }

    /// Unit direction in the cross-section plane at `angle` radians from `right`.
    #[inline]
    pub fn radial(&self, angle: f32) -> Vec3 {
        self.right * angle.cos() + self.forward * angle.sin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bent_curve() -> CenterlineCurve {
        CenterlineCurve::new(vec![
            Vec3::new(0.0, -2.0, 0.0),
            Vec3::new(0.1, -1.0, 0.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(-0.5, 1.0, 0.25),
            Vec3::new(-1.2, 2.2, 0.58),
        ])
        .unwrap()
    }

    #[test]
    fn rejects_fewer_than_two_points() {
        let err = CenterlineCurve::new(vec![Vec3::ZERO]).unwrap_err();
        assert!(matches!(err, GeometryError::TooFewControlPoints { found: 1 }));
    }

    #[test]
    fn rejects_zero_length_curve() {
        let err = CenterlineCurve::new(vec![Vec3::ONE, Vec3::ONE, Vec3::ONE]).unwrap_err();
        assert!(matches!(err, GeometryError::ZeroLengthCurve));
    }

    #[test]
    fn passes_through_endpoints() {
        let curve = bent_curve();
        assert!(curve.point_at(0.0).distance(Vec3::new(0.0, -2.0, 0.0)) < 1e-5);
        assert!(curve.point_at(1.0).distance(Vec3::new(-1.2, 2.2, 0.58)) < 1e-5);
    }

    #[test]
    fn tangent_is_unit_everywhere() {
        let curve = bent_curve();
        for i in -20..=120 {
            let t = i as f32 / 100.0;
            let len = curve.tangent_at(t).length();
            assert!((len - 1.0).abs() < 1e-4, "t={t} len={len}");
        }
    }

    #[test]
    fn out_of_range_parameters_clamp() {
        let curve = bent_curve();
        assert_eq!(curve.point_at(-3.0), curve.point_at(0.0));
        assert_eq!(curve.point_at(7.5), curve.point_at(1.0));
        assert_eq!(curve.tangent_at(1.5), curve.tangent_at(1.0));
    }

    #[test]
    fn tangent_survives_repeated_control_points() {
        let curve = CenterlineCurve::new(vec![
            Vec3::ZERO,
            Vec3::ZERO,
            Vec3::new(0.0, 1.0, 0.0),
        ])
        .unwrap();
        let t = curve.tangent_at(0.0);
        assert!((t.length() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn straight_line_length_matches_distance() {
        let curve = CenterlineCurve::new(vec![Vec3::ZERO, Vec3::new(0.0, 4.0, 0.0)]).unwrap();
        assert!((curve.length() - 4.0).abs() < 1e-3);
    }

    #[test]
    fn arc_fraction_moves_at_uniform_speed() {
        // Uneven control spacing: t = 0.5 sits at y = 1, a quarter of the length.
        let curve = CenterlineCurve::new(vec![
            Vec3::ZERO,
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 4.0, 0.0),
        ])
        .unwrap();
        assert!((curve.length() - 4.0).abs() < 1e-3);
        assert!((curve.param_at_fraction(0.25) - 0.5).abs() < 0.01);
        assert!((curve.point_at_fraction(0.25).y - 1.0).abs() < 0.02);
        assert_eq!(curve.param_at_fraction(0.0), 0.0);
        assert_eq!(curve.param_at_fraction(1.0), 1.0);
    }

    #[test]
    fn radial_frame_is_orthonormal() {
        for tangent in [Vec3::Y, Vec3::X, Vec3::new(0.3, 0.9, -0.2), Vec3::NEG_Y] {
            let f = RadialFrame::from_tangent(tangent);
            assert!(f.right.dot(f.tangent).abs() < 1e-5);
            assert!(f.forward.dot(f.tangent).abs() < 1e-5);
            assert!(f.right.dot(f.forward).abs() < 1e-5);
            assert!((f.radial(1.3).length() - 1.0).abs() < 1e-5);
        }
    }
}
