// Clot lifecycle: per-frame render state, debris stream and suction vortex.
//
// The clot mesh is built once (surface::generate_clot_surface) and never
// rebuilt. Everything here is a pure function of (PhaseState, tip, time):
//
//   approach / deploy   solid, scale 1
//   contact             small scale pulse, suction light at the tip, vortex
//   aspirate            noise erosion up to `dissolve`, decaying vibration,
//                       debris stream clot → tip, vortex, edge glow light
//   cleared             scale 0 (instance kept), success light and flash

use std::f32::consts::{PI, TAU};

use glam::{EulerRot, Mat4, Quat, Vec3};

use super::hash::{fract, seeded_random, GOLDEN};
use super::noise::DissolveNoise;
use super::path::RadialFrame;
use super::progress::{Phase, PhaseState};
use super::surface::ClotDescriptor;

pub const DEBRIS_COUNT: usize = 80;
pub const VORTEX_COUNT: usize = 60;

/// Peak vibration amplitude at the start of aspiration.
pub const VIBRATION_AMPLITUDE: f32 = 0.008;
/// Relative amplitude of the contact pulse.
pub const CONTACT_PULSE: f32 = 0.02;

/// Fraction of the dissolve range over which debris spawns.
const DEBRIS_SPAWN_SPAN: f32 = 0.85;

pub const SUCTION_COLOR: Vec3 = Vec3::new(0.0, 1.0, 0.8);
pub const EDGE_COLOR:    Vec3 = Vec3::new(0.8, 0.533, 0.267);

// ============================================================================
// RENDER STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position:  Vec3,
    pub color:     Vec3,
    pub intensity: f32,
    /// Distance at which the light has faded out completely.
    pub range:     f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClotRenderState {
    pub dissolve:           f32,
    /// Erosion threshold for the fragment shader.
    pub shader_progress:    f32,
    pub scale:              f32,
    /// Vibration offset applied on top of the static mesh.
    pub offset:             Vec3,
    /// Mesh-to-world transform: scale about the clot center, then offset.
    pub model:              Mat4,
    /// Unit vector from the clot toward the approaching instrument.
    pub dissolve_direction: Vec3,
    pub noise_offset:       Vec3,
    /// Draw the translucent success sphere at the clot center.
    pub success_flash:      bool,
    pub lights:             Vec<PointLight>,
}

impl ClotRenderState {
    pub fn visible(&self) -> bool { self.scale > 0.0 }
}

/// Everything the clot contributes to one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ClotFrame {
    pub render: ClotRenderState,
    /// Always DEBRIS_COUNT transforms; hidden fragments are `Mat4::ZERO`.
    pub debris: Vec<Mat4>,
    /// World positions of the vortex points; empty while the vortex is off.
    pub vortex: Vec<Vec3>,
    pub vortex_opacity: f32,
}

// ============================================================================
// DEBRIS
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct DebrisDescriptor {
    theta:           f32,
    phi:             f32,
    surface_radius:  f32,
    size:            f32,
    spawn:           f32,
    lifetime:        f32,
    spiral_speed:    f32,
    spiral_radius:   f32,
    rotation_speed:  f32,
    rotation_offset: f32,
}

impl DebrisDescriptor {
    fn new(i: usize, count: usize) -> Self {
        let fi = i as f32;
        let seed = fract(fi * GOLDEN);
        let seed2 = fract((fi + 100.0) * 0.414);
        let seed3 = fract((fi + 200.0) * 0.577);
        let seed4 = fract((fi + 300.0) * 0.732);

        Self {
            theta:           seed * TAU,
            phi:             seed2 * PI,
            surface_radius:  0.08 + seed3 * 0.08,
            size:            if seed4 < 0.2 { 0.03 + seed3 * 0.04 } else { 0.012 + seed2 * 0.018 },
            spawn:           fi / count as f32 * DEBRIS_SPAWN_SPAN,
            lifetime:        0.15 + seed3 * 0.12,
            spiral_speed:    3.0 + seed2 * 4.0,
            spiral_radius:   0.05 + seed3 * 0.08,
            rotation_speed:  4.0 + seed * 5.0,
            rotation_offset: seed * TAU,
        }
    }

    /// Local progress along this fragment's trip; outside (0, 1) it is hidden.
    fn local(&self, dissolve: f32) -> f32 {
        (dissolve - self.spawn) / self.lifetime
    }

    fn transform(&self, local: f32, center: Vec3, tip: Vec3, time: f32) -> Mat4 {
        if !(local > 0.0 && local < 1.0) {
            return Mat4::ZERO;
        }
        let start = center + Vec3::new(
            self.phi.sin() * self.theta.cos(),
            self.phi.sin() * self.theta.sin(),
            self.phi.cos(),
        ) * self.surface_radius;

        // Accelerates toward the tip; the spiral tightens on the way.
        let eased = local.powf(0.4);
        let mut pos = start.lerp(tip, eased);
        let spiral = time * self.spiral_speed + self.rotation_offset + local * PI * 3.0;
        let spiral_radius = self.spiral_radius * (1.0 - eased) * (1.0 - eased);
        pos.x += spiral.cos() * spiral_radius;
        pos.z += spiral.sin() * spiral_radius;

        let mut scale = self.size;
        if local < 0.1 {
            scale *= local / 0.1;
        } else if local > 0.85 {
            scale *= (1.0 - local) / 0.15;
        }

        let spin = time * self.rotation_speed;
        let rotation = Quat::from_euler(
            EulerRot::XYZ,
            spin + self.rotation_offset,
            spin * 1.2,
            spin * 0.8,
        );
        Mat4::from_scale_rotation_translation(Vec3::splat(scale), rotation, pos)
    }
}

// ============================================================================
// SUCTION VORTEX
// ============================================================================

/// One point spiralling inward and upward around the tip.
///
/// Each point runs a fixed cycle: it starts on an outer ring below the tip,
/// turns 0.1 rad and sinks 0.005 inward per 60 Hz frame (scaled by the
/// intensity) while rising, and restarts once it gets too close or too high.
#[derive(Debug, Clone, Copy)]
struct VortexPoint {
    angle:  f32,
    radius: f32,
    rise:   f32,
    /// Start offset within the cycle, 0..1.
    phase:  f32,
}

impl VortexPoint {
    fn new(i: usize, count: usize) -> Self {
        let base = 4000.0 + i as f32 * 4.0;
        Self {
            angle:  i as f32 / count as f32 * TAU,
            radius: 0.12 + seeded_random(base) * 0.08,
            rise:   0.01 + seeded_random(base + 1.0) * 0.02,
            phase:  seeded_random(base + 2.0),
        }
    }

    /// Offset from the tip in (radial x, axial y, radial z) coordinates.
    fn local(&self, time: f32, intensity: f32) -> Vec3 {
        let life = ((self.radius - 0.03) / 0.005).min(0.25 / self.rise).max(1.0);
        let steps = (time * 60.0 * intensity + self.phase * life).rem_euclid(life);
        let angle = self.angle + 0.1 * steps;
        let radius = (self.radius - 0.005 * steps).max(0.02);
        let height = -0.1 + self.rise * steps;
        Vec3::new(angle.cos() * radius, height * 0.5, angle.sin() * radius)
    }
}

// ============================================================================
// CONTROLLER
// ============================================================================

pub struct ClotController {
    center:    Vec3,
    direction: Vec3,
    noise:     DissolveNoise,
    debris:    Vec<DebrisDescriptor>,
    vortex:    Vec<VortexPoint>,
}

impl ClotController {
    pub fn new(clot: &ClotDescriptor, noise_seed: f32) -> Self {
        Self {
            center:    clot.center(),
            // The instrument arrives from upstream.
            direction: -clot.tangent(),
            noise:     DissolveNoise::new(noise_seed),
            debris:    (0..DEBRIS_COUNT).map(|i| DebrisDescriptor::new(i, DEBRIS_COUNT)).collect(),
            vortex:    (0..VORTEX_COUNT).map(|i| VortexPoint::new(i, VORTEX_COUNT)).collect(),
        }
    }

    pub fn center(&self) -> Vec3 { self.center }
    pub fn dissolve_direction(&self) -> Vec3 { self.direction }
    pub fn noise(&self) -> &DissolveNoise { &self.noise }

    pub fn render_state(&self, state: &PhaseState, tip: Vec3, time: f32) -> ClotRenderState {
        let dissolve = state.dissolve;
        let mut scale = 1.0;
        let mut offset = Vec3::ZERO;
        let mut lights = Vec::new();

        match state.phase {
            Phase::Approach | Phase::Deploy => {}
            Phase::Contact => {
                scale = 1.0 + (time * 12.0).sin() * CONTACT_PULSE;
                lights.push(PointLight { position: tip, color: SUCTION_COLOR, intensity: 4.0, range: 1.5 });
            }
            Phase::Aspirate => {
                let amplitude = VIBRATION_AMPLITUDE * (1.0 - dissolve);
                offset = Vec3::new(
                    (time * 25.0).sin(),
                    (time * 20.0).sin() * 0.5,
                    (time * 22.0).cos(),
                ) * amplitude;
                lights.push(PointLight { position: tip, color: SUCTION_COLOR, intensity: 12.0, range: 1.5 });
                lights.push(PointLight {
                    position:  self.center,
                    color:     EDGE_COLOR,
                    intensity: 6.0 * (1.0 - dissolve),
                    range:     0.8,
                });
            }
            Phase::Cleared => {
                scale = 0.0;
                lights.push(PointLight { position: self.center, color: SUCTION_COLOR, intensity: 10.0, range: 2.0 });
            }
        }

        let model = Mat4::from_translation(self.center + offset)
            * Mat4::from_scale(Vec3::splat(scale.max(f32::EPSILON)))
            * Mat4::from_translation(-self.center);

        ClotRenderState {
            dissolve,
            shader_progress: dissolve,
            scale,
            offset,
            model: if scale > 0.0 { model } else { Mat4::ZERO },
            dissolve_direction: self.direction,
            noise_offset: self.noise.offset(),
            success_flash: state.phase == Phase::Cleared,
            lights,
        }
    }

    /// Fragment transforms; all hidden outside the aspirate phase.
    pub fn debris(&self, state: &PhaseState, tip: Vec3, time: f32) -> Vec<Mat4> {
        if state.phase != Phase::Aspirate {
            return vec![Mat4::ZERO; self.debris.len()];
        }
        self.debris
            .iter()
            .map(|d| d.transform(d.local(state.dissolve), self.center, tip, time))
            .collect()
    }

    /// Vortex strength: strong while aspirating, faint on contact, else off.
    pub fn vortex_intensity(state: &PhaseState) -> f32 {
        match state.phase {
            Phase::Aspirate => 1.2,
            Phase::Contact => 0.3,
            _ => 0.0,
        }
    }

    /// Vortex points in world space, wrapped around the tip's axis.
    pub fn vortex(&self, state: &PhaseState, tip: Vec3, tangent: Vec3, time: f32) -> Vec<Vec3> {
        let intensity = Self::vortex_intensity(state);
        if intensity <= 0.0 {
            return Vec::new();
        }
        let frame = RadialFrame::from_tangent(tangent);
        self.vortex
            .iter()
            .map(|v| {
                let l = v.local(time, intensity);
                tip + frame.right * l.x + frame.tangent * l.y + frame.forward * l.z
            })
            .collect()
    }

    pub fn update(&self, state: &PhaseState, tip: Vec3, tangent: Vec3, time: f32) -> ClotFrame {
        ClotFrame {
            render:         self.render_state(state, tip, time),
            debris:         self.debris(state, tip, time),
            vortex:         self.vortex(state, tip, tangent, time),
            vortex_opacity: 0.6 * Self::vortex_intensity(state),
        }
    }
}
