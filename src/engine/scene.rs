// Scene facade: the two entry points the host talks to.
//
//   VascularScene::build(&SceneConfig)   once: anatomy, static meshes, rigs,
//                                        particle descriptors
//   VascularScene::update(p, elapsed)    every frame: FrameOutput
//   VascularScene::still_frame()         once, instead of update, when
//                                        motion is reduced
//
// The expensive surface extraction only ever runs inside build().

use glam::{Mat4, Vec3};

use super::anatomy::{Anatomy, AORTA_RADIUS};
use super::camera::TrackingCamera;
use super::clot::{ClotController, ClotFrame, PointLight, SUCTION_COLOR};
use super::config::SceneConfig;
use super::error::SceneError;
use super::particles::{FlowTrack, Obstacle, ParticleKind, Population};
use super::progress::{PhaseState, ProgressController};
use super::rig::{CatheterRig, RigState};
use super::surface::{SceneGeometry, SURFACE_CALIBRATION};

// ============================================================================
// LIGHTING
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// Position the light shines from, toward the origin.
    pub position:  Vec3,
    pub color:     Vec3,
    pub intensity: f32,
}

pub const AMBIENT_INTENSITY: f32 = 0.45;

pub const DIRECTIONAL_LIGHTS: [DirectionalLight; 3] = [
    DirectionalLight { position: Vec3::new(4.0, 5.0, 4.0),   color: Vec3::ONE,                  intensity: 1.3 },
    DirectionalLight { position: Vec3::new(-3.0, 3.0, -3.0), color: Vec3::new(1.0, 0.667, 0.667), intensity: 0.6 },
    DirectionalLight { position: Vec3::new(0.0, -4.0, 2.0),  color: Vec3::new(1.0, 0.533, 0.533), intensity: 0.35 },
];

// ============================================================================
// FRAME OUTPUT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFrame {
    pub eye:         Vec3,
    pub target:      Vec3,
    pub view:        Mat4,
    pub fov_degrees: f32,
    pub near:        f32,
    pub far:         f32,
}

/// Instance transforms of one particle population.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleBatch {
    pub kind:       ParticleKind,
    pub transforms: Vec<Mat4>,
    pub stuck:      usize,
}

/// Everything the host needs to draw one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutput {
    pub phase:     PhaseState,
    pub rig:       Option<RigState>,
    pub clot:      Option<ClotFrame>,
    pub camera:    Option<CameraFrame>,
    pub particles: Vec<ParticleBatch>,
    /// Dynamic point lights: tip glow plus the clot's cues.
    pub lights:    Vec<PointLight>,
}

impl FrameOutput {
    /// Nothing to draw yet.
    pub fn empty() -> Self {
        Self {
            phase:     PhaseState::at(0.0),
            rig:       None,
            clot:      None,
            camera:    None,
            particles: Vec::new(),
            lights:    Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool { self.rig.is_none() }

    pub fn stuck_total(&self) -> usize {
        self.particles.iter().map(|b| b.stuck).sum()
    }
}

// ============================================================================
// SCENE
// ============================================================================

pub struct VascularScene {
    config:      SceneConfig,
    anatomy:     Anatomy,
    geometry:    SceneGeometry,
    rig:         CatheterRig,
    clot:        ClotController,
    populations: Vec<Population>,
    camera:      TrackingCamera,
    progress:    ProgressController,
    last_time:   Option<f32>,
}

impl VascularScene {
    pub fn build(config: &SceneConfig) -> Result<Self, SceneError> {
        let populations_cfg = config.flow.populations();
        let margin = populations_cfg.iter().map(|p| p.collision_margin).fold(0.0, f32::max);
        let anatomy = Anatomy::standard(margin + AORTA_RADIUS * SURFACE_CALIBRATION)?;

        let geometry = SceneGeometry::generate(&anatomy.network, &anatomy.clot, &config.surface)?;
        log::info!(
            "scene geometry: vessel {} tris, lumen {} tris, clot {} tris",
            geometry.vessel.triangle_count(),
            geometry.lumen.triangle_count(),
            geometry.clot.triangle_count(),
        );

        let track_count = anatomy.tracks.len();
        let populations: Vec<Population> = populations_cfg
            .into_iter()
            .map(|cfg| Population::new(cfg, cfg.count(config.flow.budget), track_count))
            .collect();
        for pop in &populations {
            log::debug!("{}: {} particles", pop.kind().name(), pop.len());
        }

        Ok(Self {
            rig: CatheterRig::new(anatomy.catheter.clone(), config.rig),
            clot: ClotController::new(&anatomy.clot, config.clot.noise_seed),
            camera: TrackingCamera::new(config.camera),
            progress: ProgressController::new(config.progress),
            config: *config,
            anatomy,
            geometry,
            populations,
            last_time: None,
        })
    }

    pub fn config(&self) -> &SceneConfig { &self.config }
    pub fn anatomy(&self) -> &Anatomy { &self.anatomy }
    pub fn geometry(&self) -> &SceneGeometry { &self.geometry }
    pub fn rig(&self) -> &CatheterRig { &self.rig }
    pub fn clot(&self) -> &ClotController { &self.clot }
    pub fn populations(&self) -> &[Population] { &self.populations }
    pub fn tracks(&self) -> &[FlowTrack] { &self.anatomy.tracks }
    pub fn camera(&self) -> &TrackingCamera { &self.camera }

    /// Advance to progress `p` at `elapsed` seconds since start.
    pub fn update(&mut self, p: f32, elapsed: f32) -> FrameOutput {
        let dt = self.last_time.map_or(0.0, |last| (elapsed - last).max(0.0));
        self.last_time = Some(elapsed);

        let phase = self.progress.update(p, dt);
        self.compose(phase, elapsed, Some(dt))
    }

    /// The opening wide shot with the camera already settled. A host with
    /// reduced motion draws this once instead of calling `update`.
    pub fn still_frame(&mut self) -> FrameOutput {
        self.progress = ProgressController::new(self.config.progress);
        self.last_time = None;
        for pop in &mut self.populations {
            pop.release_all();
        }
        let phase = self.progress.update(0.0, 0.0);
        self.compose(phase, 0.0, None)
    }

    /// Build one frame for `phase`. Without `dt` the camera snaps to its goal.
    fn compose(&mut self, phase: PhaseState, elapsed: f32, dt: Option<f32>) -> FrameOutput {
        let rig = self.rig.update(phase.progress, elapsed);
        let (tip, tangent) = (rig.inner.tip, rig.inner.tangent);

        let clot = self.clot.update(&phase, tip, tangent, elapsed);

        let obstacle = Obstacle {
            center:  self.anatomy.clot.center(),
            radius:  self.anatomy.clot.collision_radius(),
            cleared: phase.clot_cleared(),
        };
        let tracks = &self.anatomy.tracks;
        let particles = self
            .populations
            .iter_mut()
            .map(|pop| {
                let transforms = pop.update(tracks, Some(&obstacle), elapsed).to_vec();
                ParticleBatch { kind: pop.kind(), transforms, stuck: pop.stuck_count() }
            })
            .collect();

        match dt {
            Some(dt) => self.camera.update(phase.progress, tip, tangent, dt),
            None => self.camera.snap_to(phase.progress, tip, tangent),
        }
        let camera = CameraFrame {
            eye:         self.camera.eye(),
            target:      self.camera.target(),
            view:        self.camera.view_matrix(),
            fov_degrees: self.config.camera.fov_degrees,
            near:        self.config.camera.near,
            far:         self.config.camera.far,
        };

        let mut lights = vec![PointLight { position: tip, color: SUCTION_COLOR, intensity: rig.tip_glow, range: 2.0 }];
        lights.extend(clot.render.lights.iter().copied());

        FrameOutput {
            phase,
            rig: Some(rig),
            clot: Some(clot),
            camera: Some(camera),
            particles,
            lights,
        }
    }
}

// ============================================================================
// HANDLE
// ============================================================================

/// A scene that may not be built yet. Safe to update either way.
#[derive(Default)]
pub struct SceneHandle {
    scene: Option<VascularScene>,
}

impl SceneHandle {
    pub fn pending() -> Self { Self::default() }

    pub fn ready(scene: VascularScene) -> Self {
        Self { scene: Some(scene) }
    }

    pub fn is_ready(&self) -> bool { self.scene.is_some() }
    pub fn scene(&self) -> Option<&VascularScene> { self.scene.as_ref() }

    pub fn update(&mut self, p: f32, elapsed: f32) -> FrameOutput {
        match self.scene.as_mut() {
            Some(scene) => scene.update(p, elapsed),
            None => FrameOutput::empty(),
        }
    }

    pub fn still_frame(&mut self) -> FrameOutput {
        self.scene.as_mut().map_or_else(FrameOutput::empty, VascularScene::still_frame)
    }
}
