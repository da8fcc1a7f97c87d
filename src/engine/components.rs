// ECS components mirroring the scene's particle instances on the host side
// One entity per blood-cell instance; the scene owns the simulation, the
// world only holds what the renderer needs to draw it

use bevy_ecs::prelude::*;
use glam::Mat4;

use super::particles::ParticleKind;

/// Which scene particle an entity mirrors.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticleInstance {
    pub kind:  ParticleKind,
    pub index: usize,
}

/// Model matrix for the instanced draw. `Mat4::ZERO` collapses the instance.
#[derive(Component, Debug, Clone, Copy)]
pub struct InstanceTransform {
    pub model: Mat4,
}

impl Default for InstanceTransform {
    fn default() -> Self {
        Self { model: Mat4::ZERO }
    }
}

/// Marker for instances currently held back by the clot.
#[derive(Component, Debug, Clone, Copy)]
pub struct Stuck;

/// RGB base color for rendering
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Tint {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Tint {
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn for_kind(kind: ParticleKind) -> Self {
        match kind {
            ParticleKind::RedCell   => Self::rgb(0.769, 0.118, 0.227),
            ParticleKind::WhiteCell => Self::rgb(0.961, 0.961, 0.863),
            ParticleKind::Platelet  => Self::rgb(0.722, 0.663, 0.788),
        }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, 1.0]
    }
}
