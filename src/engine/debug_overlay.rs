// egui debug overlay (F3): frame timing plus the scene's progress, phase,
// dissolve and stuck counts. The progress bar along the bottom edge is
// always on.

use std::time::{Duration, Instant};

use egui::epaint::Shadow;
use egui::{Color32, Ui};

use super::scene::FrameOutput;

const PANEL_FILL: Color32 = Color32::from_rgba_premultiplied(0, 0, 0, 180);
const BAR_HEIGHT: f32 = 3.0;

// ============================================================================
// FRAME CLOCK
// ============================================================================

/// Timing summary of the last full second.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameTiming {
    pub fps:    u32,
    pub avg_ms: f32,
    pub min_ms: f32,
    pub max_ms: f32,
}

/// Accumulates frame durations and publishes a `FrameTiming` once a second.
pub struct FrameClock {
    window_start: Instant,
    frames:       u32,
    sum_ms:       f32,
    min_ms:       f32,
    max_ms:       f32,
    published:    FrameTiming,
}

impl FrameClock {
    pub fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            frames: 0,
            sum_ms: 0.0,
            min_ms: f32::MAX,
            max_ms: 0.0,
            published: FrameTiming::default(),
        }
    }

    /// Record one frame of `dt` seconds that ended at `now`.
    pub fn record(&mut self, dt: f32, now: Instant) {
        let ms = dt * 1000.0;
        self.frames += 1;
        self.sum_ms += ms;
        self.min_ms = self.min_ms.min(ms);
        self.max_ms = self.max_ms.max(ms);

        if now.duration_since(self.window_start) >= Duration::from_secs(1) {
            self.published = FrameTiming {
                fps:    self.frames,
                avg_ms: self.sum_ms / self.frames as f32,
                min_ms: self.min_ms,
                max_ms: self.max_ms,
            };
            *self = Self { published: self.published, ..Self::new(now) };
        }
    }

    pub fn timing(&self) -> FrameTiming { self.published }
}

// ============================================================================
// STATS
// ============================================================================

pub struct DebugStats {
    pub timing: FrameTiming,
    pub entity_count: usize,
    /// Entities carrying the ECS stuck marker.
    pub stuck_entities: usize,
    pub draw_calls: u32,
    pub resolution: (u32, u32),
    /// Progress as requested by the scroll region.
    pub scroll_progress: f32,
    /// Progress after smoothing, as the scene used it.
    pub progress: f32,
    pub phase: &'static str,
    pub phase_local: f32,
    pub dissolve: f32,
    /// Stuck particles per population name.
    pub stuck: Vec<(&'static str, usize)>,
    pub camera_eye: [f32; 3],
    pub camera_target: [f32; 3],
    pub reduced_motion: bool,
}

impl DebugStats {
    /// Scene half of the panel; the host fills in timing and counters.
    pub fn from_frame(frame: &FrameOutput, scroll_progress: f32) -> Self {
        let phase = frame.phase;
        Self {
            timing: FrameTiming::default(),
            entity_count: 0,
            stuck_entities: 0,
            draw_calls: 0,
            resolution: (0, 0),
            scroll_progress,
            progress: phase.progress,
            phase: phase.phase.name(),
            phase_local: phase.local(phase.phase),
            dissolve: phase.dissolve,
            stuck: frame.particles.iter().map(|b| (b.kind.name(), b.stuck)).collect(),
            camera_eye: frame.camera.map_or([0.0; 3], |c| c.eye.to_array()),
            camera_target: frame.camera.map_or([0.0; 3], |c| c.target.to_array()),
            reduced_motion: false,
        }
    }

    fn show(&self, ui: &mut Ui) {
        let t = &self.timing;
        ui.label(format!("FPS: {}", t.fps));
        ui.label(format!("Frame: {:.2} ms (min: {:.1} | max: {:.1})", t.avg_ms, t.min_ms, t.max_ms));
        ui.label(format!(
            "Entities: {} ({} stuck)  Draw calls: {}",
            self.entity_count, self.stuck_entities, self.draw_calls
        ));
        ui.label(format!("Resolution: {} x {}", self.resolution.0, self.resolution.1));
        ui.separator();

        ui.label(format!("Progress: {:.3}  (scroll {:.3})", self.progress, self.scroll_progress));
        ui.label(format!("Phase: {}  local {:.2}", self.phase, self.phase_local));
        ui.label(format!("Dissolve: {:.3}", self.dissolve));
        for (name, count) in &self.stuck {
            ui.label(format!("Stuck {}: {}", name, count));
        }

        let [ex, ey, ez] = self.camera_eye;
        let [tx, ty, tz] = self.camera_target;
        ui.label(format!("Camera: ({ex:.2}, {ey:.2}, {ez:.2}) -> ({tx:.2}, {ty:.2}, {tz:.2})"));
        if self.reduced_motion {
            ui.label("Reduced motion");
        }
    }
}

/// Thin suction-colored strip whose width tracks progress.
fn progress_bar(ctx: &egui::Context, progress: f32) {
    let screen = ctx.screen_rect();
    let painter = ctx.layer_painter(egui::LayerId::new(egui::Order::Background, egui::Id::new("progress_bar")));
    let bar = egui::Rect::from_min_size(
        egui::pos2(screen.left(), screen.bottom() - BAR_HEIGHT),
        egui::vec2(screen.width() * progress.clamp(0.0, 1.0), BAR_HEIGHT),
    );
    painter.rect_filled(bar, 0.0, Color32::from_rgba_unmultiplied(0, 255, 204, 200));
}

// ============================================================================
// OVERLAY
// ============================================================================

pub struct DebugOverlay {
    pub visible: bool,
    ctx: egui::Context,
    state: egui_winit::State,
    renderer: egui_wgpu::Renderer,
}

impl DebugOverlay {
    pub fn new(window: &winit::window::Window, device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> Self {
        let ctx = egui::Context::default();

        let mut visuals = egui::Visuals::dark();
        visuals.window_fill = PANEL_FILL;
        visuals.window_stroke = egui::Stroke::NONE;
        visuals.window_shadow = Shadow::NONE;
        visuals.override_text_color = Some(Color32::WHITE);
        ctx.set_visuals(visuals);
        ctx.style_mut(|style| style.override_font_id = Some(egui::FontId::monospace(13.0)));

        let state = egui_winit::State::new(
            ctx.clone(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        // Drawn straight onto the swapchain image: no depth, no MSAA.
        let renderer = egui_wgpu::Renderer::new(device, surface_format, None, 1, false);

        Self { visible: false, ctx, state, renderer }
    }

    pub fn toggle(&mut self) {
        self.visible = !self.visible;
    }

    pub fn handle_window_event(
        &mut self,
        window: &winit::window::Window,
        event: &winit::event::WindowEvent,
    ) -> egui_winit::EventResponse {
        self.state.on_window_event(window, event)
    }

    /// Draw one egui frame over `view`. `stats` is the F3 panel, `None`
    /// while it is hidden.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        window: &winit::window::Window,
        view: &wgpu::TextureView,
        screen: &egui_wgpu::ScreenDescriptor,
        progress: f32,
        stats: Option<&DebugStats>,
    ) {
        let input = self.state.take_egui_input(window);
        let output = self.ctx.run(input, |ctx| {
            progress_bar(ctx, progress);
            if let Some(stats) = stats {
                egui::Area::new(egui::Id::new("debug_overlay"))
                    .fixed_pos(egui::pos2(10.0, 10.0))
                    .show(ctx, |ui| {
                        egui::Frame::none()
                            .fill(PANEL_FILL)
                            .inner_margin(egui::Margin::same(8.0))
                            .rounding(4.0)
                            .show(ui, |ui| stats.show(ui));
                    });
            }
        });

        self.state.handle_platform_output(window, output.platform_output);
        let primitives = self.ctx.tessellate(output.shapes, output.pixels_per_point);

        for (id, delta) in &output.textures_delta.set {
            self.renderer.update_texture(device, queue, *id, delta);
        }
        self.renderer.update_buffers(device, queue, encoder, &primitives, screen);

        {
            let pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("overlay pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            self.renderer.render(&mut pass.forget_lifetime(), &primitives, screen);
        }

        for id in &output.textures_delta.free {
            self.renderer.free_texture(id);
        }
    }
}
