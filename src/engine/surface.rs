// Implicit vessel surfaces: centerlines + radii → metaball field → mesh.
//
// Pipeline:
//   VesselNetwork (+ optional ClotDescriptor)
//     → GridTransform::enclosing()  padded AABB of every curve
//     → ScalarField::add()           one ball per curve sample, clot blob balls
//     → extract_surface()            naive surface nets at ISOLATION
//     → triangulate_smooth()         RenderMesh in world space
//
// Overlapping segments fuse at branch points because their balls sum in one
// field; no mesh stitching happens anywhere.

use std::f32::consts::TAU;

use glam::{UVec3, Vec3};
use serde::{Deserialize, Serialize};

use super::error::GeometryError;
use super::field::{
    FieldContribution, GridTransform, ScalarField, DEFAULT_RESOLUTION, GRID_PADDING, ISOLATION,
};
use super::hash::seeded_random;
use super::mesh::{triangulate_smooth, PolyMesh, RenderMesh};
use super::path::CenterlineCurve;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Extracted surface radius divided by the nominal segment radius.
///
/// Measured once for FIELD_REFERENCE_EXTENT / INFLUENCE_SCALE / ISOLATION with
/// a continuous chain of balls on a straight centerline (radius 0.16). The
/// ratio is not constant across radii; thinner segments come out relatively
/// fatter. Particles and collision volumes use it to convert nominal radii
/// into visible ones.
pub const SURFACE_CALIBRATION: f32 = 2.35;

/// Balls placed per world unit of centerline length.
pub const SAMPLES_PER_UNIT: f32 = 20.0;

/// Curve samples used to measure the bounds of each segment.
const BOUNDS_DIVISIONS: usize = 20;

/// Clot visual radius as a fraction of its vessel's nominal radius.
const CLOT_VISUAL_FACTOR: f32 = 1.8 * 0.7;
const CLOT_SLICES: usize = 8;
const CLOT_RINGS: usize = 3;

// ============================================================================
// VESSEL NETWORK
// ============================================================================

/// One tubular vessel: a centerline and its nominal radius.
#[derive(Debug, Clone)]
pub struct VesselSegment {
    pub curve:  CenterlineCurve,
    pub radius: f32,
}

impl VesselSegment {
    pub fn new(curve: CenterlineCurve, radius: f32) -> Result<Self, GeometryError> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(GeometryError::InvalidRadius { radius });
        }
        Ok(Self { curve, radius })
    }

    /// Radius of the extracted surface for this segment.
    pub fn surface_radius(&self) -> f32 {
        self.radius * SURFACE_CALIBRATION
    }

    /// One ball per 1/SAMPLES_PER_UNIT of arc length, endpoints included.
    pub fn contributions(&self) -> Vec<FieldContribution> {
        let steps = (self.curve.length() * SAMPLES_PER_UNIT).ceil().max(1.0) as usize;
        (0..=steps)
            .map(|i| {
                let t = i as f32 / steps as f32;
                FieldContribution::from_radius(self.curve.point_at(t), self.radius)
            })
            .collect()
    }
}

/// Unordered set of possibly overlapping segments.
#[derive(Debug, Clone, Default)]
pub struct VesselNetwork {
    segments: Vec<VesselSegment>,
}

impl VesselNetwork {
    pub fn new(segments: Vec<VesselSegment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[VesselSegment] { &self.segments }
    pub fn is_empty(&self) -> bool { self.segments.is_empty() }

    /// Same curves with every radius multiplied by `factor` (inner lumen).
    pub fn scaled(&self, factor: f32) -> Result<Self, GeometryError> {
        let segments = self.segments.iter()
            .map(|s| VesselSegment::new(s.curve.clone(), s.radius * factor))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { segments })
    }

    /// Padded voxel grid enclosing every curve of the network.
    pub fn grid(&self, padding: f32, resolution: u32) -> GridTransform {
        let points = self.segments.iter().flat_map(|s| s.curve.sample(BOUNDS_DIVISIONS));
        GridTransform::enclosing(points, padding, resolution)
    }

    pub fn contributions(&self) -> Vec<FieldContribution> {
        self.segments.iter().flat_map(|s| s.contributions()).collect()
    }
}

// ============================================================================
// CLOT DESCRIPTOR
// ============================================================================

/// An occlusion bound to a parametric position on one vessel curve.
#[derive(Debug, Clone)]
pub struct ClotDescriptor {
    pub curve:         CenterlineCurve,
    pub t:             f32,
    /// Nominal radius of the vessel the clot sits in.
    pub vessel_radius: f32,
    /// Axial length in world units.
    pub length:        f32,
}

impl ClotDescriptor {
    pub fn new(curve: CenterlineCurve, t: f32, vessel_radius: f32, length: f32) -> Result<Self, GeometryError> {
        if !(0.0..=1.0).contains(&t) {
            return Err(GeometryError::ClotOutOfRange { t });
        }
        if !(vessel_radius.is_finite() && vessel_radius > 0.0) {
            return Err(GeometryError::InvalidRadius { radius: vessel_radius });
        }
        Ok(Self { curve, t, vessel_radius, length: length.max(0.0) })
    }

    pub fn center(&self) -> Vec3 { self.curve.point_at(self.t) }
    pub fn tangent(&self) -> Vec3 { self.curve.tangent_at(self.t) }

    /// Radius of the blob's rings before field blending.
    pub fn visual_radius(&self) -> f32 {
        self.vessel_radius * CLOT_VISUAL_FACTOR
    }

    /// Sphere that blood particles must stay out of.
    pub fn collision_radius(&self) -> f32 {
        self.vessel_radius * 1.2
    }

    /// Dense core, three jittered rings and a handful of bumps per slice.
    pub fn contributions(&self) -> Vec<FieldContribution> {
        let vis = self.visual_radius();
        let t_range = self.length / self.curve.length();
        let mut balls = Vec::new();

        for i in 0..CLOT_SLICES {
            let fi = i as f32;
            let t = self.t - t_range * 0.5 + (fi / (CLOT_SLICES - 1) as f32) * t_range;
            let sample_t = t.clamp(0.01, 0.99);
            let point = self.curve.point_at(sample_t);
            let frame = self.curve.frame_at(sample_t);

            balls.push(FieldContribution::from_radius(point, vis * 0.5 * 1.3));

            for ring in 1..=CLOT_RINGS {
                let fr = ring as f32;
                let ring_radius = fr / CLOT_RINGS as f32 * vis;
                let count = 6 + ring * 3;
                let ball_size = vis * (0.35 - fr * 0.05);

                for j in 0..count {
                    let seed = (i * 1000 + ring * 100 + j) as f32;
                    let angle_jitter = (seeded_random(seed) - 0.5) * 0.4;
                    let radius_jitter = 1.0 + (seeded_random(seed + 1.0) - 0.5) * 0.3;
                    let angle = j as f32 / count as f32 * TAU + angle_jitter + fi * 0.3;
                    let offset = frame.radial(angle) * ring_radius * radius_jitter;
                    balls.push(FieldContribution::from_radius(point + offset, ball_size));
                }
            }

            let bumps = 6 + (seeded_random((i * 500) as f32) * 3.0).floor() as usize;
            for j in 0..bumps {
                let seed = (i * 2000 + j) as f32;
                let angle = j as f32 / bumps as f32 * TAU + seeded_random(seed) * 0.5;
                let dist = vis * (0.5 + seeded_random(seed + 1.0) * 0.25);
                let size = vis * (0.1 + seeded_random(seed + 2.0) * 0.08);
                balls.push(FieldContribution::from_radius(point + frame.radial(angle) * dist, size));
            }
        }
        balls
    }
}

// ============================================================================
// GENERATION
// ============================================================================

/// Tunables of one extraction pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceParams {
    /// Samples per grid axis.
    pub resolution:  u32,
    /// World padding around the sampled curve bounds.
    pub padding:     f32,
    pub isolation:   f32,
    /// Lumen radii as a fraction of the wall radii.
    pub lumen_scale: f32,
}

impl Default for SurfaceParams {
    fn default() -> Self {
        Self {
            resolution:  DEFAULT_RESOLUTION,
            padding:     GRID_PADDING,
            isolation:   ISOLATION,
            lumen_scale: 0.8,
        }
    }
}

/// Vessel surface, optionally fused with the clot blob in the same field.
pub fn generate_surface(
    network: &VesselNetwork,
    clot: Option<&ClotDescriptor>,
    params: &SurfaceParams,
) -> RenderMesh {
    if network.is_empty() {
        return RenderMesh::empty();
    }

    let mut field = ScalarField::new(network.grid(params.padding, params.resolution));
    let mut balls = network.contributions();
    if let Some(clot) = clot {
        balls.extend(clot.contributions());
    }
    field.add_all(&balls);

    let poly = extract_surface(&field, params.isolation);
    log::info!(
        "surface: {} balls on {}³ grid → {} vertices, {} faces",
        balls.len(), params.resolution, poly.vertex_count(), poly.faces.len(),
    );
    triangulate_smooth(&poly)
}

/// Clot blob alone, sampled on the vessel network's grid so that it lands in
/// the same world space as the vessel surface.
pub fn generate_clot_surface(
    network: &VesselNetwork,
    clot: &ClotDescriptor,
    params: &SurfaceParams,
) -> RenderMesh {
    let grid = if network.is_empty() {
        GridTransform::enclosing(clot.curve.sample(BOUNDS_DIVISIONS), params.padding, params.resolution)
    } else {
        network.grid(params.padding, params.resolution)
    };

    let mut field = ScalarField::new(grid);
    let balls = clot.contributions();
    field.add_all(&balls);

    let poly = extract_surface(&field, params.isolation);
    log::info!("clot surface: {} balls → {} vertices", balls.len(), poly.vertex_count());
    triangulate_smooth(&poly)
}

// ============================================================================
// SCENE GEOMETRY
// ============================================================================

/// Every static mesh of the scene, built once and never touched per frame.
pub struct SceneGeometry {
    pub vessel: RenderMesh,
    pub lumen:  RenderMesh,
    pub clot:   RenderMesh,
}

impl SceneGeometry {
    pub fn generate(
        network: &VesselNetwork,
        clot: &ClotDescriptor,
        params: &SurfaceParams,
    ) -> Result<Self, GeometryError> {
        let vessel = generate_surface(network, None, params);
        let lumen = generate_surface(&network.scaled(params.lumen_scale)?, None, params);
        let clot = generate_clot_surface(network, clot, params);
        Ok(Self { vessel, lumen, clot })
    }
}

// ============================================================================
// SURFACE NETS
// ============================================================================

const CORNERS: [UVec3; 8] = [
    UVec3::new(0, 0, 0), UVec3::new(1, 0, 0), UVec3::new(0, 1, 0), UVec3::new(1, 1, 0),
    UVec3::new(0, 0, 1), UVec3::new(1, 0, 1), UVec3::new(0, 1, 1), UVec3::new(1, 1, 1),
];

/// The 12 cube edges as pairs of CORNERS indices.
const CUBE_EDGES: [(usize, usize); 12] = [
    (0, 1), (2, 3), (4, 5), (6, 7),
    (0, 2), (1, 3), (4, 6), (5, 7),
    (0, 4), (1, 5), (2, 6), (3, 7),
];

/// Linear index of cell `c` in a grid `cells` wide. Widened before
/// multiplying; cells^3 leaves u32 range above 1625 cells a side.
#[inline]
fn cell_offset(c: UVec3, cells: u32) -> usize {
    let n = cells as usize;
    (c.z as usize * n + c.y as usize) * n + c.x as usize
}

/// Extract the `isolation` level set of `field` as a quad mesh.
///
/// Naive surface nets: every cell whose corners straddle the iso value gets
/// one vertex at the mean of its edge crossings; every grid edge that
/// straddles it emits the quad joining the four cells around that edge.
/// Quads face away from the inside (field > isolation), CCW from outside.
pub fn extract_surface(field: &ScalarField, isolation: f32) -> PolyMesh {
    let n = field.resolution();
    let cells = n - 1;
    let transform = *field.transform();
    let cell_index = |c: UVec3| cell_offset(c, cells);

    let mut mesh = PolyMesh::new();
    let mut cell_vertex = vec![usize::MAX; cells as usize * cells as usize * cells as usize];

    for z in 0..cells {
        for y in 0..cells {
            for x in 0..cells {
                let base = UVec3::new(x, y, z);
                let values = CORNERS.map(|c| {
                    let p = base + c;
                    field.value(p.x, p.y, p.z)
                });
                let inside = values.iter().filter(|&&v| v > isolation).count();
                if inside == 0 || inside == 8 {
                    continue;
                }

                let mut sum = Vec3::ZERO;
                let mut crossings = 0;
                for &(a, b) in &CUBE_EDGES {
                    let (va, vb) = (values[a], values[b]);
                    if (va > isolation) != (vb > isolation) {
                        let s = (isolation - va) / (vb - va);
                        sum += CORNERS[a].as_vec3().lerp(CORNERS[b].as_vec3(), s);
                        crossings += 1;
                    }
                }

                let index = base.as_vec3() + sum / crossings as f32;
                cell_vertex[cell_index(base)] = mesh.add_vertex(transform.index_to_world(index));
            }
        }
    }

    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                let p = UVec3::new(x, y, z);
                let inside = field.value(x, y, z) > isolation;

                for axis in 0..3 {
                    if p[axis] + 1 >= n {
                        continue;
                    }
                    let mut q = p;
                    q[axis] += 1;
                    if inside == (field.value(q.x, q.y, q.z) > isolation) {
                        continue;
                    }

                    let (b, c) = ((axis + 1) % 3, (axis + 2) % 3);
                    if p[b] == 0 || p[c] == 0 || p[b] >= cells || p[c] >= cells {
                        continue;
                    }
                    let mut pb = p;
                    pb[b] -= 1;
                    let mut pc = p;
                    pc[c] -= 1;
                    let mut pbc = pb;
                    pbc[c] -= 1;

                    let quad = [pbc, pc, p, pb].map(|cell| cell_vertex[cell_index(cell)]);
                    if quad.contains(&usize::MAX) {
                        continue;
                    }
                    if inside {
                        mesh.add_face(quad.to_vec());
                    } else {
                        mesh.add_face(quad.iter().rev().copied().collect());
                    }
                }
            }
        }
    }

    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn straight(length: f32) -> CenterlineCurve {
        CenterlineCurve::new(vec![Vec3::ZERO, Vec3::new(0.0, length, 0.0)]).unwrap()
    }

    fn ball_field(radius: f32) -> ScalarField {
        let grid = GridTransform::enclosing([Vec3::ZERO], 1.0, 32);
        let mut field = ScalarField::new(grid);
        field.add(FieldContribution::from_radius(Vec3::ZERO, radius));
        field
    }

    #[test]
    fn cell_offsets_do_not_wrap_on_large_grids() {
        assert_eq!(cell_offset(UVec3::new(1, 2, 3), 10), 321);

        let cells = 2000u32;
        let last = UVec3::splat(cells - 1);
        assert_eq!(cell_offset(last, cells), 2000usize.pow(3) - 1);
        assert!(cell_offset(UVec3::new(0, 0, cells - 1), cells) > u32::MAX as usize);
    }

    #[test]
    fn sphere_extraction_is_closed() {
        let mesh = extract_surface(&ball_field(0.3), ISOLATION);
        assert!(mesh.faces.len() > 50);

        let mut edges: HashMap<(usize, usize), u32> = HashMap::new();
        for face in &mesh.faces {
            for i in 0..face.len() {
                let (a, b) = (face[i], face[(i + 1) % face.len()]);
                *edges.entry((a.min(b), a.max(b))).or_default() += 1;
            }
        }
        assert!(edges.values().all(|&count| count == 2));
    }

    #[test]
    fn sphere_faces_point_outward() {
        let mesh = triangulate_smooth(&extract_surface(&ball_field(0.3), ISOLATION));
        let outward = mesh.vertices.iter()
            .filter(|v| Vec3::from(v.normal).dot(Vec3::from(v.position)) > 0.0)
            .count();
        assert_eq!(outward, mesh.vertices.len());
    }

    #[test]
    fn empty_network_yields_empty_mesh() {
        let mesh = generate_surface(&VesselNetwork::default(), None, &SurfaceParams::default());
        assert!(mesh.vertices.is_empty());
        assert!(mesh.indices.is_empty());
    }

    #[test]
    fn tiny_radius_yields_empty_mesh() {
        let segment = VesselSegment::new(straight(1.0), 1e-4).unwrap();
        let mesh = generate_surface(&VesselNetwork::new(vec![segment]), None, &SurfaceParams::default());
        assert!(mesh.vertices.is_empty());
    }

    #[test]
    fn rejects_non_positive_radius() {
        assert!(matches!(
            VesselSegment::new(straight(1.0), 0.0),
            Err(GeometryError::InvalidRadius { .. })
        ));
    }

    #[test]
    fn tube_radius_matches_calibration() {
        let segment = VesselSegment::new(straight(4.0), 0.16).unwrap();
        let params = SurfaceParams { resolution: 96, ..Default::default() };
        let mesh = generate_surface(&VesselNetwork::new(vec![segment]), None, &params);

        // Mid-section vertices only; the caps are rounded.
        let radii: Vec<f32> = mesh.vertices.iter()
            .map(|v| Vec3::from(v.position))
            .filter(|p| p.y > 1.0 && p.y < 3.0)
            .map(|p| (p.x * p.x + p.z * p.z).sqrt())
            .collect();
        assert!(!radii.is_empty());
        let mean = radii.iter().sum::<f32>() / radii.len() as f32;
        let expected = 0.16 * SURFACE_CALIBRATION;
        assert!((mean - expected).abs() < expected * 0.1, "mean {mean} expected {expected}");
    }

    #[test]
    fn generation_is_deterministic() {
        let segment = VesselSegment::new(straight(2.0), 0.2).unwrap();
        let network = VesselNetwork::new(vec![segment]);
        let a = generate_surface(&network, None, &SurfaceParams::default());
        let b = generate_surface(&network, None, &SurfaceParams::default());
        assert_eq!(a.indices, b.indices);
        assert!(a.vertices.iter().zip(&b.vertices).all(|(x, y)| x.position == y.position));
    }

    #[test]
    fn clot_blob_stays_near_its_center() {
        let curve = straight(4.0);
        let network = VesselNetwork::new(vec![VesselSegment::new(curve.clone(), 0.16).unwrap()]);
        let clot = ClotDescriptor::new(curve, 0.5, 0.16, 0.5).unwrap();
        let mesh = generate_clot_surface(&network, &clot, &SurfaceParams::default());

        assert!(!mesh.vertices.is_empty());
        let center = clot.center();
        for v in &mesh.vertices {
            let p = Vec3::from(v.position);
            assert!((p.y - center.y).abs() < 0.9);
            assert!((p - center).with_y(0.0).length() < 0.6);
        }
    }

    #[test]
    fn clot_rejects_parameter_outside_unit_range() {
        assert!(matches!(
            ClotDescriptor::new(straight(1.0), 1.2, 0.16, 0.5),
            Err(GeometryError::ClotOutOfRange { .. })
        ));
    }
}
