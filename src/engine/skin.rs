// Skinning: wrap a skeleton (polyline or profile) with a radius into a PolyMesh.
//
// Supported shapes:
//   skin_tube()      polyline + radius → open tube (catheter, guidewire)
//   lathe()          2D profile revolved around +Y (rounded catheter tip)
//   torus()          ring around +Y (glow at the tip opening)
//   uv_sphere()      latitude/longitude sphere (white cells)
//   blood_disc()     flattened biconcave sphere (red cells)
//   icosahedron()    20 triangles (platelets, debris)
//   rough_fragment() icosahedron with seeded per-vertex axis scaling
//
// All faces wind CCW viewed from outside.

use std::f32::consts::{PI, TAU};

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::mesh::PolyMesh;
use super::path::CenterlineCurve;

// ============================================================================
// TUBE
// ============================================================================

/// Skin an open tube of `radius` around `polyline`.
///
/// The polyline is first fitted with a centerline and resampled at
/// `segments + 1` points evenly spaced in arc length; cross-section rings use
/// parallel-transported (rotation-minimizing) frames so the tube never twists.
/// Returns an empty mesh when the polyline is degenerate.
pub fn skin_tube(polyline: &[Vec3], radius: f32, segments: usize, radial: usize) -> PolyMesh {
    let mut mesh = PolyMesh::new();
    let Ok(curve) = CenterlineCurve::new(polyline.to_vec()) else {
        return mesh;
    };
    let segments = segments.max(1);
    let radial = radial.max(3);

    let mut tangent = curve.tangent_at(0.0);
    let mut normal = tangent.any_orthonormal_vector();

    for i in 0..=segments {
        let t = curve.param_at_fraction(i as f32 / segments as f32);
        let center = curve.point_at(t);
        let next_tangent = curve.tangent_at(t);

        // Parallel transport: remove the component of the old normal along the new tangent.
        let transported = normal - next_tangent * normal.dot(next_tangent);
        normal = transported.try_normalize().unwrap_or_else(|| next_tangent.any_orthonormal_vector());
        tangent = next_tangent;
        let binormal = tangent.cross(normal);

        for j in 0..radial {
            let theta = j as f32 / radial as f32 * TAU;
            mesh.add_vertex(center + (normal * theta.cos() + binormal * theta.sin()) * radius);
        }
    }

    for i in 0..segments {
        for j in 0..radial {
            let a = i * radial + j;
            let b = i * radial + (j + 1) % radial;
            let c = (i + 1) * radial + (j + 1) % radial;
            let d = (i + 1) * radial + j;
            mesh.add_face(vec![a, b, c, d]);
        }
    }
    mesh
}

// ============================================================================
// LATHE
// ============================================================================

/// Revolve `profile` (x = radius, y = height) around +Y.
/// A final point with zero radius becomes a single apex vertex.
pub fn lathe(profile: &[(f32, f32)], segments: usize) -> PolyMesh {
    let mut mesh = PolyMesh::new();
    if profile.len() < 2 {
        return mesh;
    }
    let segments = segments.max(3);
    let (rings, apex) = match profile.split_last() {
        Some((&(r, y), rest)) if r.abs() < 1e-6 => (rest, Some(y)),
        _ => (profile, None),
    };

    for &(r, y) in rings {
        for k in 0..segments {
            let phi = k as f32 / segments as f32 * TAU;
            mesh.add_vertex(Vec3::new(r * phi.cos(), y, r * phi.sin()));
        }
    }

    for i in 0..rings.len().saturating_sub(1) {
        for k in 0..segments {
            let a = i * segments + k;
            let b = i * segments + (k + 1) % segments;
            let c = (i + 1) * segments + (k + 1) % segments;
            let d = (i + 1) * segments + k;
            mesh.add_face(vec![a, d, c, b]);
        }
    }

    if let Some(y) = apex {
        let top = mesh.add_vertex(Vec3::new(0.0, y, 0.0));
        let last = (rings.len() - 1) * segments;
        for k in 0..segments {
            mesh.add_face(vec![last + k, top, last + (k + 1) % segments]);
        }
    }
    mesh
}

/// Quarter-cosine dome from `radius` at y = 0 to a point at y = `length`.
pub fn rounded_tip(radius: f32, length: f32, steps: usize) -> PolyMesh {
    let steps = steps.max(1);
    let profile: Vec<(f32, f32)> = (0..=steps)
        .map(|i| {
            let angle = i as f32 / steps as f32 * PI * 0.5;
            let r = if i == steps { 0.0 } else { radius * angle.cos() };
            (r, length * angle.sin())
        })
        .collect();
    lathe(&profile, 24)
}

/// Ring of tube radius `minor` around +Y at distance `major`.
pub fn torus(major: f32, minor: f32, radial: usize, tubular: usize) -> PolyMesh {
    let radial = radial.max(3);
    let profile: Vec<(f32, f32)> = (0..=radial)
        .map(|i| {
            let v = i as f32 / radial as f32 * TAU;
            (major + minor * v.cos(), minor * v.sin())
        })
        .collect();
    lathe(&profile, tubular)
}

// ============================================================================
// PARTICLE SHAPES
// ============================================================================

/// Unit sphere with `width` longitudes and `height` latitude bands.
pub fn uv_sphere(width: usize, height: usize) -> PolyMesh {
    let width = width.max(3);
    let height = height.max(2);
    let mut profile = Vec::with_capacity(height + 1);
    for i in 0..=height {
        let polar = i as f32 / height as f32 * PI;
        let r = if i == 0 || i == height { 0.0 } else { polar.sin() };
        profile.push((r, -polar.cos()));
    }
    // Bottom pole as a fan, the rest as a lathe ending at the top pole.
    let mut mesh = lathe(&profile[1..], width);
    let bottom = mesh.add_vertex(Vec3::NEG_Y);
    for k in 0..width {
        mesh.add_face(vec![bottom, k, (k + 1) % width]);
    }
    mesh
}

/// Red cell: sphere flattened to a disc with a biconcave dip in the middle.
pub fn blood_disc() -> PolyMesh {
    let mut mesh = uv_sphere(16, 12);
    for p in &mut mesh.positions {
        let r2 = p.x * p.x + p.z * p.z;
        let concave = 0.3 * (1.0 - r2) * p.y.signum();
        p.y = p.y * 0.35 + concave;
    }
    mesh
}

pub fn icosahedron() -> PolyMesh {
    let phi = (1.0 + 5.0_f32.sqrt()) * 0.5;
    let mut mesh = PolyMesh::new();
    for p in [
        Vec3::new(-1.0, phi, 0.0), Vec3::new(1.0, phi, 0.0), Vec3::new(-1.0, -phi, 0.0), Vec3::new(1.0, -phi, 0.0),
        Vec3::new(0.0, -1.0, phi), Vec3::new(0.0, 1.0, phi), Vec3::new(0.0, -1.0, -phi), Vec3::new(0.0, 1.0, -phi),
        Vec3::new(phi, 0.0, -1.0), Vec3::new(phi, 0.0, 1.0), Vec3::new(-phi, 0.0, -1.0), Vec3::new(-phi, 0.0, 1.0),
    ] {
        mesh.add_vertex(p.normalize());
    }
    for f in [
        [0, 11, 5], [0, 5, 1], [0, 1, 7], [0, 7, 10], [0, 10, 11],
        [1, 5, 9], [5, 11, 4], [11, 10, 2], [10, 7, 6], [7, 1, 8],
        [3, 9, 4], [3, 4, 2], [3, 2, 6], [3, 6, 8], [3, 8, 9],
        [4, 9, 5], [2, 4, 11], [6, 2, 10], [8, 6, 7], [9, 8, 1],
    ] {
        mesh.add_face(f.to_vec());
    }
    mesh
}

/// Icosahedron whose vertices are scaled per axis by seeded factors drawn from
/// `[lo, lo + span)`, giving an irregular but reproducible fragment.
pub fn rough_fragment(seed: u64, lo: Vec3, span: Vec3) -> PolyMesh {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut mesh = icosahedron();
    for p in &mut mesh.positions {
        let scale = Vec3::new(
            lo.x + rng.gen_range(0.0_f32..1.0) * span.x,
            lo.y + rng.gen_range(0.0_f32..1.0) * span.y,
            lo.z + rng.gen_range(0.0_f32..1.0) * span.z,
        );
        *p *= scale;
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mesh::{triangulate_flat, triangulate_smooth};

    fn all_normals_outward(poly: &PolyMesh, center: Vec3) -> bool {
        let mesh = triangulate_flat(poly);
        mesh.vertices.chunks(3).all(|tri| {
            let centroid = tri.iter().map(|v| Vec3::from(v.position)).sum::<Vec3>() / 3.0;
            Vec3::from(tri[0].normal).dot(centroid - center) > 0.0
        })
    }

    #[test]
    fn tube_has_expected_topology() {
        let line = [Vec3::ZERO, Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.5, 2.0, 0.0)];
        let tube = skin_tube(&line, 0.2, 100, 16);
        assert_eq!(tube.vertex_count(), 101 * 16);
        assert_eq!(tube.faces.len(), 100 * 16);
    }

    #[test]
    fn tube_rings_keep_their_radius() {
        let line = [Vec3::ZERO, Vec3::new(0.0, 3.0, 0.0)];
        let tube = skin_tube(&line, 0.22, 10, 12);
        for p in &tube.positions {
            assert!((p.with_y(0.0).length() - 0.22).abs() < 1e-4);
        }
    }

    #[test]
    fn tube_faces_point_outward() {
        let line = [Vec3::ZERO, Vec3::new(0.0, 3.0, 0.0)];
        let tube = triangulate_flat(&skin_tube(&line, 0.5, 4, 8));
        for tri in tube.vertices.chunks(3) {
            let centroid = tri.iter().map(|v| Vec3::from(v.position)).sum::<Vec3>() / 3.0;
            assert!(Vec3::from(tri[0].normal).dot(centroid.with_y(0.0)) > 0.0);
        }
    }

    #[test]
    fn degenerate_polyline_gives_empty_tube() {
        assert_eq!(skin_tube(&[Vec3::ONE], 0.2, 10, 8).vertex_count(), 0);
        assert_eq!(skin_tube(&[Vec3::ONE, Vec3::ONE], 0.2, 10, 8).vertex_count(), 0);
    }

    #[test]
    fn rounded_tip_closes_at_apex() {
        let tip = rounded_tip(0.22, 0.35, 20);
        let top = tip.positions.iter().map(|p| p.y).fold(f32::MIN, f32::max);
        assert!((top - 0.35).abs() < 1e-5);
        assert!(all_normals_outward(&tip, Vec3::ZERO));
    }

    #[test]
    fn torus_wraps_the_ring() {
        let ring = torus(0.18, 0.03, 8, 24);
        assert_eq!(ring.vertex_count(), 9 * 24);
        for p in &ring.positions {
            let on_ring = p.with_y(0.0).normalize() * 0.18;
            assert!((p.distance(on_ring) - 0.03).abs() < 1e-4);
        }
        let mesh = triangulate_flat(&ring);
        for tri in mesh.vertices.chunks(3) {
            let centroid = tri.iter().map(|v| Vec3::from(v.position)).sum::<Vec3>() / 3.0;
            let core = centroid.with_y(0.0).normalize() * 0.18;
            assert!(Vec3::from(tri[0].normal).dot(centroid - core) > 0.0);
        }
    }

    #[test]
    fn sphere_is_closed_and_outward() {
        let sphere = uv_sphere(16, 12);
        assert_eq!(sphere.vertex_count(), 16 * 11 + 2);
        assert!(all_normals_outward(&sphere, Vec3::ZERO));
        let smooth = triangulate_smooth(&sphere);
        assert!(smooth.vertices.iter().all(|v| (Vec3::from(v.position).length() - 1.0).abs() < 1e-4));
    }

    #[test]
    fn icosahedron_is_outward() {
        assert!(all_normals_outward(&icosahedron(), Vec3::ZERO));
    }

    #[test]
    fn disc_is_flattened() {
        let disc = blood_disc();
        let max_y = disc.positions.iter().map(|p| p.y.abs()).fold(0.0, f32::max);
        assert!(max_y < 0.66);
    }

    #[test]
    fn fragments_are_reproducible() {
        let a = rough_fragment(7, Vec3::splat(0.7), Vec3::splat(0.6));
        let b = rough_fragment(7, Vec3::splat(0.7), Vec3::splat(0.6));
        assert_eq!(a.positions, b.positions);
    }
}
