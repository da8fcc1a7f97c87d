// Vascular journey viewer: scroll (wheel or arrow keys) drives a catheter
// through the vessel network, the clot dissolves and the blood flow resumes.
//
//   vascular_journey [config.json] [--reduced-motion]
//
// F3 toggles the debug overlay, Escape quits. All animation logic lives in
// engine::scene; this file feeds it progress and draws what comes back.

mod gpu;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use bevy_ecs::prelude::*;
use glam::{Mat4, Quat, Vec3};
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use vascular_journey::engine::clot::{EDGE_COLOR, SUCTION_COLOR, VORTEX_COUNT, DEBRIS_COUNT};
use vascular_journey::engine::components::Tint;
use vascular_journey::engine::debug_overlay::{DebugOverlay, DebugStats, FrameClock};
use vascular_journey::engine::input::{InputState, ScrollRegion};
use vascular_journey::engine::mesh::{triangulate_flat, triangulate_smooth, GpuVertex, RenderMesh};
use vascular_journey::engine::particles::ParticleKind;
use vascular_journey::engine::progress::ProgressScheduler;
use vascular_journey::engine::rig::RigMeshCache;
use vascular_journey::engine::skin;
use vascular_journey::engine::systems::{self, InstanceRaw};
use vascular_journey::engine::{FrameOutput, SceneConfig, SceneError, SceneHandle, VascularScene};

use gpu::{
    ClotUniform, GlobalsUniform, InstanceBuffer, MaterialUniform, MeshBuffers, PassStyle, UniformBinding, rgb,
};

/// Height of the virtual scroll section, in viewports.
const REGION_SCREENS: f32 = 4.0;

const VORTEX_POINT_SIZE: f32 = 0.0075;

// ============================================================================
// OPTIONS
// ============================================================================

#[derive(Debug, Default)]
struct Options {
    config_path:    Option<PathBuf>,
    reduced_motion: bool,
}

impl Options {
    fn from_args(args: impl Iterator<Item = String>) -> Self {
        let mut options = Self::default();
        for arg in args {
            match arg.as_str() {
                "--reduced-motion" => options.reduced_motion = true,
                _ if options.config_path.is_none() => options.config_path = Some(PathBuf::from(arg)),
                _ => log::warn!("Ignoring extra argument {:?}", arg),
            }
        }
        options
    }
}

// ============================================================================
// MATERIALS
// ============================================================================

/// One drawable mesh with its own material uniform.
struct MeshDraw {
    buffers:  MeshBuffers,
    uniform:  MaterialUniform,
    binding:  UniformBinding,
    visible:  bool,
}

impl MeshDraw {
    fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        mesh: &RenderMesh,
        uniform: MaterialUniform,
        label: &'static str,
    ) -> Self {
        Self {
            buffers: MeshBuffers::new(device, mesh, label),
            binding: UniformBinding::new(device, layout, &uniform, label),
            uniform,
            visible: true,
        }
    }

    fn set_model(&mut self, queue: &wgpu::Queue, model: Mat4) {
        self.uniform = self.uniform.with_model(model);
        self.binding.write(queue, &self.uniform);
    }

    fn draw(&self, pass: &mut wgpu::RenderPass<'_>) -> u32 {
        if !self.visible || self.buffers.is_empty() {
            return 0;
        }
        pass.set_bind_group(1, &self.binding.bind_group, &[]);
        self.buffers.draw(pass, 1);
        1
    }
}

/// An instanced shape: one mesh, many transforms.
struct InstancedDraw {
    mesh:      MeshBuffers,
    instances: InstanceBuffer,
}

impl InstancedDraw {
    fn new(device: &wgpu::Device, mesh: &RenderMesh, capacity: usize, label: &'static str) -> Self {
        Self {
            mesh: MeshBuffers::new(device, mesh, label),
            instances: InstanceBuffer::new(device, capacity, label),
        }
    }

    fn draw(&self, pass: &mut wgpu::RenderPass<'_>) -> u32 {
        if self.instances.count() == 0 {
            return 0;
        }
        self.instances.bind(pass);
        self.mesh.draw(pass, self.instances.count());
        1
    }
}

fn particle_mesh(kind: ParticleKind) -> RenderMesh {
    match kind {
        ParticleKind::RedCell   => triangulate_smooth(&skin::blood_disc()),
        ParticleKind::WhiteCell => triangulate_smooth(&skin::uv_sphere(12, 10)),
        ParticleKind::Platelet  => triangulate_flat(&skin::icosahedron()),
    }
}

// ============================================================================
// APPLICATION STATE
// ============================================================================

struct State {
    window:  Arc<Window>,
    surface: wgpu::Surface<'static>,
    device:  wgpu::Device,
    queue:   wgpu::Queue,
    config:  wgpu::SurfaceConfiguration,
    size:    winit::dpi::PhysicalSize<u32>,
    depth_view: wgpu::TextureView,

    globals:              UniformBinding,
    opaque_pipeline:      wgpu::RenderPipeline,
    lumen_pipeline:       wgpu::RenderPipeline,
    translucent_pipeline: wgpu::RenderPipeline,
    clot_pipeline:        wgpu::RenderPipeline,
    particle_pipeline:    wgpu::RenderPipeline,

    // Static scene
    lumen:  MeshDraw,
    vessel: MeshDraw,
    halo:   MeshDraw,
    clot_mesh:    MeshBuffers,
    clot_binding: UniformBinding,
    clot_uniform: ClotUniform,
    clot_visible: bool,
    flash:  MeshDraw,

    // Rigs: tube, guidewire, tip for outer then inner
    rig: Vec<MeshDraw>,
    rig_cache: RigMeshCache,
    tip_rings: [MeshDraw; 2],

    // Instanced
    cells:  Vec<(ParticleKind, InstancedDraw)>,
    debris: InstancedDraw,
    vortex: InstancedDraw,

    // Scene + ECS mirror
    world:   World,
    scene:   SceneHandle,
    frame:   FrameOutput,
    start:   Instant,
    elapsed: f32,
    last_update: Instant,

    // Scroll
    input:           InputState,
    region:          ScrollRegion,
    scheduler:       ProgressScheduler,
    scroll_progress: f32,
    reduced_motion:  bool,

    overlay:     DebugOverlay,
    frame_clock: FrameClock,
    draw_calls:  u32,
}

#[derive(Debug, thiserror::Error)]
enum SetupError {
    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("no suitable GPU adapter")]
    Adapter,
    #[error("failed to request device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error(transparent)]
    Scene(#[from] SceneError),
}

impl State {
    async fn new(window: Arc<Window>, scene_config: SceneConfig, reduced_motion: bool) -> Result<Self, SetupError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(SetupError::Adapter)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: None,
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        let depth_view = gpu::create_depth_texture(&device, &config);

        // ── layouts and pipelines ───────────────────────────────────────────
        let globals_layout = gpu::uniform_layout(
            &device,
            wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            "globals_layout",
        );
        let draw_layout = gpu::uniform_layout(
            &device,
            wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            "draw_layout",
        );
        let globals = UniformBinding::new(
            &device,
            &globals_layout,
            &GlobalsUniform::new(Mat4::IDENTITY, Vec3::ZERO, &[]),
            "globals",
        );

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&globals_layout, &draw_layout],
            push_constant_ranges: &[],
        });
        let particle_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Particle Pipeline Layout"),
            bind_group_layouts: &[&globals_layout],
            push_constant_ranges: &[],
        });

        let mesh_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Mesh Shader"),
            source: wgpu::ShaderSource::Wgsl(gpu::shader_source(include_str!("shaders/mesh.wgsl")).into()),
        });
        let clot_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Clot Shader"),
            source: wgpu::ShaderSource::Wgsl(gpu::shader_source(include_str!("shaders/clot.wgsl")).into()),
        });
        let particle_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Particle Shader"),
            source: wgpu::ShaderSource::Wgsl(gpu::shader_source(include_str!("shaders/particles.wgsl")).into()),
        });

        let vertex_only = [GpuVertex::desc()];
        let instanced = [GpuVertex::desc(), InstanceRaw::desc()];
        let format = config.format;
        let opaque_pipeline = gpu::create_pipeline(&device, &pipeline_layout, &mesh_shader, format, &vertex_only, PassStyle::OPAQUE, "Opaque Pipeline");
        let lumen_pipeline = gpu::create_pipeline(&device, &pipeline_layout, &mesh_shader, format, &vertex_only, PassStyle::BACK_FACES, "Lumen Pipeline");
        let translucent_pipeline = gpu::create_pipeline(&device, &pipeline_layout, &mesh_shader, format, &vertex_only, PassStyle::TRANSLUCENT, "Translucent Pipeline");
        let clot_pipeline = gpu::create_pipeline(&device, &pipeline_layout, &clot_shader, format, &vertex_only, PassStyle::OPAQUE, "Clot Pipeline");
        let particle_pipeline = gpu::create_pipeline(&device, &particle_layout, &particle_shader, format, &instanced, PassStyle::INSTANCED, "Particle Pipeline");

        // ── scene ───────────────────────────────────────────────────────────
        let build_start = Instant::now();
        let scene = VascularScene::build(&scene_config)?;
        log::info!("Scene built in {:.0} ms", build_start.elapsed().as_secs_f32() * 1000.0);

        let geometry = scene.geometry();
        let lumen = MeshDraw::new(&device, &draw_layout, &geometry.lumen,
            MaterialUniform::new(Mat4::IDENTITY, rgb(0x1a0000), 1.0, Vec3::ZERO, 0.9), "lumen");
        let vessel = MeshDraw::new(&device, &draw_layout, &geometry.vessel,
            MaterialUniform::new(Mat4::IDENTITY, rgb(0xd42020), 0.5, Vec3::ZERO, 0.4), "vessel");
        let halo = MeshDraw::new(&device, &draw_layout, &geometry.vessel,
            MaterialUniform::new(Mat4::from_scale(Vec3::splat(1.02)), Vec3::ZERO, 0.08, rgb(0xff3333), 1.0), "vessel_halo");

        let clot_center = scene.clot().center();
        let clot_mesh = MeshBuffers::new(&device, &geometry.clot, "clot");
        let noise_offset = scene.clot().noise().offset();
        let clot_uniform = ClotUniform {
            model:        Mat4::IDENTITY.to_cols_array_2d(),
            center:       clot_center.extend(0.0).to_array(),
            direction:    scene.clot().dissolve_direction().extend(0.0).to_array(),
            noise_offset: noise_offset.extend(vascular_journey::engine::noise::EDGE_WIDTH).to_array(),
            edge_color:   EDGE_COLOR.extend(1.0).to_array(),
            base_color:   rgb(0x2a1515).extend(1.0).to_array(),
        };
        let clot_binding = UniformBinding::new(&device, &draw_layout, &clot_uniform, "clot");

        let sphere = triangulate_smooth(&skin::uv_sphere(16, 16));
        let mut flash = MeshDraw::new(&device, &draw_layout, &sphere,
            MaterialUniform::new(Mat4::from_scale_rotation_translation(Vec3::splat(0.15), Quat::IDENTITY, clot_center),
                Vec3::ZERO, 0.5, SUCTION_COLOR, 1.0), "success_flash");
        flash.visible = false;

        // Rig meshes: real contents arrive with the first frame.
        let chrome = MaterialUniform::new(Mat4::IDENTITY, rgb(0xe8e8e8), 1.0, Vec3::ZERO, 0.15);
        let gold = MaterialUniform::new(Mat4::IDENTITY, rgb(0xffd700), 1.0, rgb(0xcc9900) * 0.2, 0.25);
        let empty = RenderMesh::empty();
        let rig = ["outer_tube", "outer_guidewire", "outer_tip", "inner_tube", "inner_guidewire", "inner_tip"]
            .into_iter()
            .enumerate()
            .map(|(i, label)| {
                let material = if i % 3 == 1 { gold } else { chrome };
                MeshDraw::new(&device, &draw_layout, &empty, material, label)
            })
            .collect();
        let glow = MaterialUniform::new(Mat4::IDENTITY, Vec3::ZERO, 0.6, SUCTION_COLOR, 1.0);
        let tip_rings = [
            MeshDraw::new(&device, &draw_layout, &triangulate_smooth(&skin::torus(0.18, 0.03, 8, 24)), glow, "tip_ring"),
            MeshDraw::new(&device, &draw_layout, &triangulate_smooth(&skin::torus(0.22, 0.05, 8, 24)),
                MaterialUniform::new(Mat4::IDENTITY, Vec3::ZERO, 0.2, SUCTION_COLOR, 1.0), "tip_halo"),
        ];

        let cells = scene
            .populations()
            .iter()
            .map(|pop| (pop.kind(), InstancedDraw::new(&device, &particle_mesh(pop.kind()), pop.len(), pop.kind().name())))
            .collect();
        let fragment = triangulate_flat(&skin::rough_fragment(11, Vec3::new(0.7, 0.7, 0.7), Vec3::splat(0.6)));
        let debris = InstancedDraw::new(&device, &fragment, DEBRIS_COUNT, "debris");
        let vortex = InstancedDraw::new(&device, &triangulate_flat(&skin::icosahedron()), VORTEX_COUNT, "vortex");

        let mut world = World::new();
        systems::spawn_particles(&mut world, scene.populations());

        let overlay = DebugOverlay::new(&window, &device, config.format);
        let viewport = config.height as f32;

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            depth_view,
            globals,
            opaque_pipeline,
            lumen_pipeline,
            translucent_pipeline,
            clot_pipeline,
            particle_pipeline,
            lumen,
            vessel,
            halo,
            clot_mesh,
            clot_binding,
            clot_uniform,
            clot_visible: true,
            flash,
            rig,
            rig_cache: RigMeshCache::default(),
            tip_rings,
            cells,
            debris,
            vortex,
            world,
            scene: SceneHandle::ready(scene),
            frame: FrameOutput::empty(),
            start: Instant::now(),
            elapsed: 0.0,
            last_update: Instant::now(),
            input: InputState::new(),
            region: ScrollRegion::screens(REGION_SCREENS, viewport),
            scheduler: ProgressScheduler::new(),
            scroll_progress: 0.0,
            reduced_motion,
            overlay,
            frame_clock: FrameClock::new(Instant::now()),
            draw_calls: 0,
        })
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            let old_viewport = self.config.height as f32;
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            self.depth_view = gpu::create_depth_texture(&self.device, &self.config);

            let viewport = new_size.height as f32;
            self.region.rescale(REGION_SCREENS * viewport, old_viewport, viewport);
            self.scheduler.request(self.region.progress(viewport));
            self.upload_camera();
        }
    }

    fn viewport_height(&self) -> f32 { self.config.height as f32 }

    fn update(&mut self) {
        let now = Instant::now();
        let dt = (now - self.last_update).as_secs_f32();
        self.last_update = now;
        self.frame_clock.record(dt, now);

        // Scroll → coalesced progress request, consumed once per frame.
        if !self.reduced_motion {
            let pixels = self.input.scroll_pixels(dt);
            if pixels != 0.0 {
                let viewport = self.viewport_height();
                self.region.scroll_by(pixels, viewport);
                self.scheduler.request(self.region.progress(viewport));
            }
        }
        self.input.end_frame();
        if let Some(p) = self.scheduler.take() {
            self.scroll_progress = p;
        }

        // Reduced motion: one settled still frame, then nothing animates.
        if self.reduced_motion {
            if !self.frame.is_empty() {
                return;
            }
            self.elapsed = 0.0;
            self.frame = self.scene.still_frame();
        } else {
            self.elapsed = self.start.elapsed().as_secs_f32();
            self.frame = self.scene.update(self.scroll_progress, self.elapsed);
        }

        let scene = self.scene.scene();
        systems::sync_particles(&mut self.world, &self.frame.particles, |kind, index| {
            scene
                .and_then(|s| s.populations().iter().find(|p| p.kind() == kind))
                .is_some_and(|p| p.is_stuck(index))
        });

        self.upload_frame();
    }

    /// Push this frame's dynamic state to the GPU.
    fn upload_frame(&mut self) {
        let (device, queue) = (&self.device, &self.queue);

        if let Some(rig) = &self.frame.rig {
            if let Some(scene) = self.scene.scene().filter(|_| self.rig_cache.needs_rebuild(rig)) {
                let params = scene.rig().params();
                for (pose, draws) in [&rig.outer, &rig.inner].into_iter().zip(self.rig.chunks_mut(3)) {
                    let meshes = pose.build_meshes(params);
                    draws[0].buffers.write(device, queue, &meshes.tube);
                    draws[1].buffers.write(device, queue, &meshes.guidewire);
                    draws[2].buffers.write(device, queue, &meshes.tip);
                }
            }
            let ring = Mat4::from_rotation_translation(rig.inner.rotation, rig.inner.tip);
            for draw in &mut self.tip_rings {
                draw.set_model(queue, ring);
            }
        }

        if let Some(clot) = &self.frame.clot {
            let render = &clot.render;
            self.clot_visible = render.visible();
            self.clot_uniform.model = render.model.to_cols_array_2d();
            self.clot_uniform.center[3] = self.elapsed;
            self.clot_uniform.direction = render.dissolve_direction.extend(render.shader_progress).to_array();
            self.clot_binding.write(queue, &self.clot_uniform);
            self.flash.visible = render.success_flash;

            let debris_tint = Tint::rgb(0.29, 0.165, 0.102);
            let debris: Vec<InstanceRaw> = clot.debris.iter().map(|m| InstanceRaw::new(*m, debris_tint)).collect();
            self.debris.instances.write(queue, &debris);

            let mut vortex_color = Tint::rgb(SUCTION_COLOR.x, SUCTION_COLOR.y, SUCTION_COLOR.z).to_array();
            vortex_color[3] = clot.vortex_opacity.clamp(0.0, 1.0);
            let vortex: Vec<InstanceRaw> = clot
                .vortex
                .iter()
                .map(|p| InstanceRaw {
                    model: Mat4::from_scale_rotation_translation(Vec3::splat(VORTEX_POINT_SIZE), Quat::IDENTITY, *p)
                        .to_cols_array_2d(),
                    color: vortex_color,
                })
                .collect();
            self.vortex.instances.write(queue, &vortex);
        }

        for (kind, draw) in &mut self.cells {
            let rows = systems::gather_instances(&mut self.world, *kind);
            draw.instances.write(queue, &rows);
        }

        self.upload_camera();
    }

    /// Projection and lights; also refreshed on resize.
    fn upload_camera(&mut self) {
        if let Some(camera) = &self.frame.camera {
            let aspect = self.size.width as f32 / self.size.height.max(1) as f32;
            let projection = Mat4::perspective_rh(camera.fov_degrees.to_radians(), aspect, camera.near, camera.far);
            let uniform = GlobalsUniform::new(projection * camera.view, camera.eye, &self.frame.lights);
            self.globals.write(&self.queue, &uniform);
        }
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        let mut draw_calls = 0;
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.02,
                            g: 0.02,
                            b: 0.04,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            if !self.frame.is_empty() {
                pass.set_bind_group(0, &self.globals.bind_group, &[]);

                // Opaque first: lumen interior, rigs, clot.
                pass.set_pipeline(&self.lumen_pipeline);
                draw_calls += self.lumen.draw(&mut pass);

                pass.set_pipeline(&self.opaque_pipeline);
                for draw in &self.rig {
                    draw_calls += draw.draw(&mut pass);
                }

                if self.clot_visible {
                    pass.set_pipeline(&self.clot_pipeline);
                    pass.set_bind_group(1, &self.clot_binding.bind_group, &[]);
                    self.clot_mesh.draw(&mut pass, 1);
                    draw_calls += 1;
                }

                pass.set_pipeline(&self.particle_pipeline);
                for (_, draw) in &self.cells {
                    draw_calls += draw.draw(&mut pass);
                }
                draw_calls += self.debris.draw(&mut pass);
                draw_calls += self.vortex.draw(&mut pass);

                // Translucent last: vessel wall, halo, glow rings, flash.
                pass.set_pipeline(&self.translucent_pipeline);
                draw_calls += self.vessel.draw(&mut pass);
                draw_calls += self.halo.draw(&mut pass);
                for ring in &self.tip_rings {
                    draw_calls += ring.draw(&mut pass);
                }
                draw_calls += self.flash.draw(&mut pass);
            }
        }
        self.draw_calls = draw_calls;

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: self.window.scale_factor() as f32,
        };
        let stats = self.overlay.visible.then(|| self.debug_stats());
        self.overlay.render(
            &self.device,
            &self.queue,
            &mut encoder,
            &self.window,
            &view,
            &screen_descriptor,
            self.scroll_progress,
            stats.as_ref(),
        );

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }

    fn debug_stats(&mut self) -> DebugStats {
        let mut stats = DebugStats::from_frame(&self.frame, self.scroll_progress);
        stats.timing = self.frame_clock.timing();
        stats.entity_count = self.world.entities().len() as usize;
        stats.stuck_entities = systems::stuck_entity_count(&mut self.world);
        stats.draw_calls = self.draw_calls;
        stats.resolution = (self.size.width, self.size.height);
        stats.reduced_motion = self.reduced_motion;
        stats
    }
}

// ============================================================================
// EVENT LOOP
// ============================================================================

struct App {
    options: Options,
    config:  SceneConfig,
    state:   Option<State>,
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        let window_attributes = Window::default_attributes()
            .with_title("Vascular Journey")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));
        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        match pollster::block_on(State::new(window.clone(), self.config, self.options.reduced_motion)) {
            Ok(state) => {
                self.state = Some(state);
                event_loop.set_control_flow(ControlFlow::Poll);
                window.request_redraw();
            }
            Err(e) => {
                log::error!("Setup failed: {}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        if window_id != state.window.id() {
            return;
        }

        let response = state.overlay.handle_window_event(&state.window, &event);
        if !response.consumed {
            state.input.process_event(&event);
        }

        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        ..
                    },
                ..
            } => event_loop.exit(),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(KeyCode::F3),
                        repeat: false,
                        ..
                    },
                ..
            } => state.overlay.toggle(),
            WindowEvent::Resized(physical_size) => {
                state.resize(physical_size);
            }
            WindowEvent::RedrawRequested => {
                state.update();
                match state.render() {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => state.resize(state.size),
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("Out of GPU memory, exiting");
                        event_loop.exit();
                    }
                    Err(e) => log::warn!("Surface error: {:?}", e),
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }
}

// ============================================================================
// MAIN
// ============================================================================

fn main() {
    env_logger::init();

    let options = Options::from_args(std::env::args().skip(1));
    let config = match &options.config_path {
        Some(path) => SceneConfig::load_or_default(path),
        None => SceneConfig::default(),
    };
    if options.reduced_motion {
        log::info!("Reduced motion: scrolling disabled, showing a still frame");
    }

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            log::error!("Failed to create event loop: {}", e);
            std::process::exit(1);
        }
    };

    let mut app = App { options, config, state: None };
    if let Err(e) = event_loop.run_app(&mut app) {
        log::error!("Event loop error: {}", e);
        std::process::exit(1);
    }
}
