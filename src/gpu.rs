// GPU-side plumbing for the host: uniform layouts, buffers and pipelines.
// Everything here is wgpu boilerplate; the scene never sees any of it.

use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

use vascular_journey::engine::clot::PointLight;
use vascular_journey::engine::mesh::{GpuVertex, RenderMesh};
use vascular_journey::engine::scene::{AMBIENT_INTENSITY, DIRECTIONAL_LIGHTS};
use vascular_journey::engine::systems::InstanceRaw;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
pub const MAX_POINT_LIGHTS: usize = 4;

// ============================================================================
// UNIFORMS
// ============================================================================

/// Mirrors `Globals` in shaders/common.wgsl.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GlobalsUniform {
    view_proj:   [[f32; 4]; 4],
    eye:         [f32; 4],
    ambient:     [f32; 4],
    dir_pos:     [[f32; 4]; 3],
    dir_color:   [[f32; 4]; 3],
    point_pos:   [[f32; 4]; MAX_POINT_LIGHTS],
    point_color: [[f32; 4]; MAX_POINT_LIGHTS],
}

impl GlobalsUniform {
    pub fn new(view_proj: Mat4, eye: Vec3, lights: &[PointLight]) -> Self {
        let mut uniform = Self {
            view_proj:   view_proj.to_cols_array_2d(),
            eye:         [eye.x, eye.y, eye.z, 0.0],
            ambient:     [AMBIENT_INTENSITY, AMBIENT_INTENSITY, AMBIENT_INTENSITY, 1.0],
            dir_pos:     [[0.0; 4]; 3],
            dir_color:   [[0.0; 4]; 3],
            point_pos:   [[0.0; 4]; MAX_POINT_LIGHTS],
            point_color: [[0.0; 4]; MAX_POINT_LIGHTS],
        };
        for (i, light) in DIRECTIONAL_LIGHTS.iter().enumerate() {
            uniform.dir_pos[i] = light.position.extend(light.intensity).to_array();
            uniform.dir_color[i] = light.color.extend(1.0).to_array();
        }
        let active = lights.iter().filter(|l| l.intensity > 0.0).take(MAX_POINT_LIGHTS);
        let mut count = 0;
        for (i, light) in active.enumerate() {
            uniform.point_pos[i] = light.position.extend(light.range).to_array();
            uniform.point_color[i] = light.color.extend(light.intensity).to_array();
            count += 1;
        }
        uniform.eye[3] = count as f32;
        uniform
    }
}

/// Mirrors `Material` in shaders/mesh.wgsl.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    model:    [[f32; 4]; 4],
    color:    [f32; 4],
    emissive: [f32; 4],
}

impl MaterialUniform {
    pub fn new(model: Mat4, color: Vec3, opacity: f32, emissive: Vec3, roughness: f32) -> Self {
        Self {
            model:    model.to_cols_array_2d(),
            color:    color.extend(opacity).to_array(),
            emissive: emissive.extend(roughness).to_array(),
        }
    }

    pub fn with_model(mut self, model: Mat4) -> Self {
        self.model = model.to_cols_array_2d();
        self
    }
}

/// Mirrors `Clot` in shaders/clot.wgsl.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ClotUniform {
    pub model:        [[f32; 4]; 4],
    pub center:       [f32; 4],
    pub direction:    [f32; 4],
    pub noise_offset: [f32; 4],
    pub edge_color:   [f32; 4],
    pub base_color:   [f32; 4],
}

/// Hex color literal to linear-ish RGB floats.
pub fn rgb(hex: u32) -> Vec3 {
    Vec3::new(
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    )
}

// ============================================================================
// BUFFERS
// ============================================================================

/// A uniform buffer and the bind group exposing it at binding 0.
pub struct UniformBinding {
    buffer:         wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

impl UniformBinding {
    pub fn new<T: bytemuck::Pod>(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        value: &T,
        label: &str,
    ) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::bytes_of(value),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some(label),
        });
        Self { buffer, bind_group }
    }

    pub fn write<T: bytemuck::Pod>(&self, queue: &wgpu::Queue, value: &T) {
        queue.write_buffer(&self.buffer, 0, bytemuck::bytes_of(value));
    }
}

/// Vertex and index buffers for one mesh. Rewritten in place when the new
/// mesh fits, reallocated when it grows.
pub struct MeshBuffers {
    vertex:          wgpu::Buffer,
    index:           wgpu::Buffer,
    vertex_capacity: usize,
    index_capacity:  usize,
    index_count:     u32,
    label:           &'static str,
}

impl MeshBuffers {
    pub fn new(device: &wgpu::Device, mesh: &RenderMesh, label: &'static str) -> Self {
        let vertex_capacity = mesh.vertices.len().max(1);
        let index_capacity = mesh.indices.len().max(3);
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: &padded(mesh.vertex_bytes(), vertex_capacity * std::mem::size_of::<GpuVertex>()),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: &padded(mesh.index_bytes(), index_capacity * std::mem::size_of::<u32>()),
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
        });
        Self {
            vertex,
            index,
            vertex_capacity,
            index_capacity,
            index_count: mesh.index_count() as u32,
            label,
        }
    }

    pub fn write(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, mesh: &RenderMesh) {
        if mesh.vertices.len() > self.vertex_capacity || mesh.indices.len() > self.index_capacity {
            log::debug!("{}: growing mesh buffers to {} vertices", self.label, mesh.vertices.len());
            *self = Self::new(device, mesh, self.label);
            return;
        }
        if !mesh.is_empty() {
            queue.write_buffer(&self.vertex, 0, mesh.vertex_bytes());
            queue.write_buffer(&self.index, 0, mesh.index_bytes());
        }
        self.index_count = mesh.index_count() as u32;
    }

    pub fn is_empty(&self) -> bool { self.index_count == 0 }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, instances: u32) {
        if self.is_empty() || instances == 0 {
            return;
        }
        pass.set_vertex_buffer(0, self.vertex.slice(..));
        pass.set_index_buffer(self.index.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.index_count, 0, 0..instances);
    }
}

fn padded(bytes: &[u8], len: usize) -> Vec<u8> {
    let mut out = bytes.to_vec();
    out.resize(len.max(bytes.len()), 0);
    out
}

/// Fixed-capacity per-instance buffer.
pub struct InstanceBuffer {
    buffer:   wgpu::Buffer,
    capacity: usize,
    count:    u32,
}

impl InstanceBuffer {
    pub fn new(device: &wgpu::Device, capacity: usize, label: &str) -> Self {
        let capacity = capacity.max(1);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: (capacity * std::mem::size_of::<InstanceRaw>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self { buffer, capacity, count: 0 }
    }

    pub fn write(&mut self, queue: &wgpu::Queue, instances: &[InstanceRaw]) {
        let count = instances.len().min(self.capacity);
        if count > 0 {
            queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&instances[..count]));
        }
        self.count = count as u32;
    }

    pub fn count(&self) -> u32 { self.count }

    pub fn bind(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(1, self.buffer.slice(..));
    }
}

pub fn create_depth_texture(device: &wgpu::Device, config: &wgpu::SurfaceConfiguration) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

// ============================================================================
// PIPELINES
// ============================================================================

pub fn uniform_layout(device: &wgpu::Device, visibility: wgpu::ShaderStages, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some(label),
    })
}

/// How a pipeline treats faces, blending and depth.
#[derive(Clone, Copy)]
pub struct PassStyle {
    pub cull:        Option<wgpu::Face>,
    pub blend:       wgpu::BlendState,
    pub depth_write: bool,
}

impl PassStyle {
    pub const OPAQUE: Self = Self { cull: Some(wgpu::Face::Back), blend: wgpu::BlendState::REPLACE, depth_write: true };
    pub const BACK_FACES: Self = Self { cull: Some(wgpu::Face::Front), blend: wgpu::BlendState::REPLACE, depth_write: true };
    pub const TRANSLUCENT: Self = Self { cull: None, blend: wgpu::BlendState::ALPHA_BLENDING, depth_write: false };
    pub const INSTANCED: Self = Self { cull: None, blend: wgpu::BlendState::ALPHA_BLENDING, depth_write: true };
}

pub fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    buffers: &[wgpu::VertexBufferLayout<'_>],
    style: PassStyle,
    label: &str,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(style.blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: style.cull,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: style.depth_write,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
        cache: None,
    })
}

/// WGSL source of one pipeline, with the shared globals and lighting prepended.
pub fn shader_source(body: &'static str) -> String {
    format!("{}\n{}", include_str!("shaders/common.wgsl"), body)
}
