// Mesh types shared by every procedural generator in the scene.
//
//   surface nets / skin_tube / lathe / particle shapes
//     → PolyMesh → triangulate_smooth() or triangulate_flat() → RenderMesh → GPU

use glam::{Mat4, Vec3};

// ============================================================================
// GPU VERTEX
// ============================================================================

/// GPU-ready vertex with position and normal.
///   @location(0) position: vec3<f32>
///   @location(1) normal:   vec3<f32>
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuVertex {
    pub position: [f32; 3],
    pub normal:   [f32; 3],
}

impl GpuVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<GpuVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

// ============================================================================
// POLY MESH
// ============================================================================

/// Intermediate polygon mesh for procedural construction.
/// Faces are n-gons with CCW winding viewed from outside.
/// Not GPU-ready; triangulate into a `RenderMesh` first.
#[derive(Debug, Clone, Default)]
pub struct PolyMesh {
    pub positions: Vec<Vec3>,
    pub faces:     Vec<Vec<usize>>,  // each face = CCW-ordered vertex index list
}

impl PolyMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vertex and return its index.
    pub fn add_vertex(&mut self, pos: Vec3) -> usize {
        let idx = self.positions.len();
        self.positions.push(pos);
        idx
    }

    /// Add a face by vertex indices (CCW order).
    pub fn add_face(&mut self, indices: Vec<usize>) {
        debug_assert!(indices.len() >= 3, "Face must have at least 3 vertices");
        self.faces.push(indices);
    }

    pub fn vertex_count(&self) -> usize { self.positions.len() }

    /// Apply an affine transform to every position in place.
    pub fn transform(&mut self, matrix: Mat4) {
        for p in &mut self.positions {
            *p = matrix.transform_point3(*p);
        }
    }
}

// ============================================================================
// RENDER MESH
// ============================================================================

/// GPU-ready triangle mesh. Upload vertex_bytes() to a VERTEX buffer and
/// index_bytes() to an INDEX buffer (Uint32).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderMesh {
    pub vertices: Vec<GpuVertex>,
    pub indices:  Vec<u32>,
}

impl RenderMesh {
    pub fn empty() -> Self { Self::default() }

    /// Cast vertex slice to raw bytes for wgpu buffer upload.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Cast index slice to raw bytes for wgpu buffer upload.
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn index_count(&self) -> usize  { self.indices.len() }
    pub fn triangle_count(&self) -> usize { self.indices.len() / 3 }
    pub fn is_empty(&self) -> bool { self.indices.is_empty() }

    /// Axis-aligned bounds, or None for an empty mesh.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut it = self.vertices.iter().map(|v| Vec3::from(v.position));
        let first = it.next()?;
        Some(it.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p))))
    }
}

// ============================================================================
// TRIANGULATION
// ============================================================================

/// Triangulate with smooth (area-weighted) normals shared through the index buffer.
///
///   1. Accumulate each fan triangle's unnormalized cross product into its
///      three vertices; the magnitude is twice the area, so the sum is
///      area-weighted.
///   2. Normalize per vertex.
///   3. Fan-triangulate every face from its first vertex.
pub fn triangulate_smooth(poly: &PolyMesh) -> RenderMesh {
    let mut normal_accum: Vec<Vec3> = vec![Vec3::ZERO; poly.vertex_count()];

    for face in &poly.faces {
        for i in 1..(face.len() - 1) {
            let a = poly.positions[face[0]];
            let b = poly.positions[face[i]];
            let c = poly.positions[face[i + 1]];
            let weighted_normal = (b - a).cross(c - a);
            normal_accum[face[0]]     += weighted_normal;
            normal_accum[face[i]]     += weighted_normal;
            normal_accum[face[i + 1]] += weighted_normal;
        }
    }

    let vertices: Vec<GpuVertex> = poly.positions.iter()
        .zip(normal_accum.iter())
        .map(|(pos, n)| GpuVertex {
            position: pos.to_array(),
            normal:   n.normalize_or_zero().to_array(),
        })
        .collect();

    let mut indices: Vec<u32> = Vec::new();
    for face in &poly.faces {
        for i in 1..(face.len() - 1) {
            indices.push(face[0]     as u32);
            indices.push(face[i]     as u32);
            indices.push(face[i + 1] as u32);
        }
    }

    RenderMesh { vertices, indices }
}

/// Triangulate with one normal per face (faceted look for fragments).
/// Every triangle gets its own three vertices.
pub fn triangulate_flat(poly: &PolyMesh) -> RenderMesh {
    let mut mesh = RenderMesh::empty();
    for face in &poly.faces {
        let a = poly.positions[face[0]];
        for i in 1..(face.len() - 1) {
            let b = poly.positions[face[i]];
            let c = poly.positions[face[i + 1]];
            let normal = (b - a).cross(c - a).normalize_or_zero().to_array();
            for p in [a, b, c] {
                mesh.indices.push(mesh.vertices.len() as u32);
                mesh.vertices.push(GpuVertex { position: p.to_array(), normal });
            }
        }
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> PolyMesh {
        let mut m = PolyMesh::new();
        for p in [Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0), Vec3::Y] {
            m.add_vertex(p);
        }
        m.add_face(vec![0, 1, 2, 3]);
        m
    }

    #[test]
    fn smooth_quad_shares_vertices() {
        let mesh = triangulate_smooth(&quad());
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.triangle_count(), 2);
        assert!(mesh.vertices.iter().all(|v| v.normal == [0.0, 0.0, 1.0]));
    }

    #[test]
    fn flat_quad_splits_vertices() {
        let mesh = triangulate_flat(&quad());
        assert_eq!(mesh.vertices.len(), 6);
        assert_eq!(mesh.indices, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn bounds_cover_all_vertices() {
        let mesh = triangulate_smooth(&quad());
        assert_eq!(mesh.bounds(), Some((Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0))));
        assert_eq!(RenderMesh::empty().bounds(), None);
    }
}
