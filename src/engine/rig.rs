// Telescoping catheter rig on the insertion centerline.
//
// Two sub-rigs share one path:
//   outer, at min(deploy_threshold, p), advances and then holds
//   inner, at p, keeps going through deploy, contact and aspiration
//
// Each pose carries the polyline its tube is skinned along: 60 samples from
// the tip back to the path start, then 40 more straight back along the
// start tangent, so the tube's tail always lies far off-screen.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::mesh::{triangulate_smooth, RenderMesh};
use super::path::CenterlineCurve;
use super::progress::DEPLOY_START;
use super::skin::{rounded_tip, skin_tube};

/// Tip parameters stay strictly inside (0, 1).
pub const TIP_T_MIN: f32 = 0.001;
pub const TIP_T_MAX: f32 = 0.999;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigParams {
    pub outer_radius:      f32,
    pub inner_radius:      f32,
    /// Guidewire radius as a fraction of the inner catheter radius.
    pub guidewire_ratio:   f32,
    /// Progress at which the outer catheter stops advancing.
    pub deploy_threshold:  f32,
    pub tip_length:        f32,
    pub path_samples:      usize,
    pub extension_samples: usize,
    pub extension_length:  f32,
    /// Tube rings along the length when skinning.
    pub tube_segments:     usize,
}

impl Default for RigParams {
    fn default() -> Self {
        Self {
            outer_radius:      0.22,
            inner_radius:      0.14,
            guidewire_ratio:   0.35,
            deploy_threshold:  DEPLOY_START,
            tip_length:        0.35,
            path_samples:      60,
            extension_samples: 40,
            extension_length:  15.0,
            tube_segments:     100,
        }
    }
}

/// One sub-rig at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct RigPose {
    /// Clamped path parameter of the tip.
    pub parameter: f32,
    pub tip:       Vec3,
    /// Unit tangent at the tip.
    pub tangent:   Vec3,
    /// Shortest-arc rotation taking local +Y onto `tangent`.
    pub rotation:  Quat,
    pub radius:    f32,
    /// Tube skeleton from the tip backward, then past the path start.
    pub polyline:  Vec<Vec3>,
}

impl RigPose {
    /// Tube, guidewire and rounded tip meshes for this pose.
    pub fn build_meshes(&self, params: &RigParams) -> RigMeshes {
        let tube = skin_tube(&self.polyline, self.radius, params.tube_segments, 16);
        let guide = skin_tube(&self.polyline, self.radius * params.guidewire_ratio, params.tube_segments, 12);
        let mut tip = rounded_tip(self.radius, params.tip_length, 20);
        tip.transform(glam::Mat4::from_rotation_translation(self.rotation, self.tip));
        RigMeshes {
            tube:      triangulate_smooth(&tube),
            guidewire: triangulate_smooth(&guide),
            tip:       triangulate_smooth(&tip),
        }
    }
}

pub struct RigMeshes {
    pub tube:      RenderMesh,
    pub guidewire: RenderMesh,
    pub tip:       RenderMesh,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RigState {
    pub outer:    RigPose,
    pub inner:    RigPose,
    /// Point-light intensity at the inner tip.
    pub tip_glow: f32,
}

/// Path parameters the rig meshes were last built for. Poses depend on
/// nothing else, so a host rebuilds only when these move.
#[derive(Debug, Default)]
pub struct RigMeshCache {
    built: Option<(f32, f32)>,
}

impl RigMeshCache {
    /// True when `state` differs from the last built pose. Marks it built.
    pub fn needs_rebuild(&mut self, state: &RigState) -> bool {
        let key = (state.outer.parameter, state.inner.parameter);
        if self.built == Some(key) {
            return false;
        }
        self.built = Some(key);
        true
    }
}

pub struct CatheterRig {
    path:   CenterlineCurve,
    params: RigParams,
}

impl CatheterRig {
    pub fn new(path: CenterlineCurve, params: RigParams) -> Self {
        Self { path, params }
    }

    pub fn path(&self) -> &CenterlineCurve { &self.path }
    pub fn params(&self) -> &RigParams { &self.params }

    pub fn outer_parameter(&self, p: f32) -> f32 {
        clamp_tip(p.min(self.params.deploy_threshold))
    }

    pub fn inner_parameter(&self, p: f32) -> f32 {
        clamp_tip(p)
    }

    /// Tip position and tangent of the inner rig; the camera and the clot
    /// effects follow this point.
    pub fn tip(&self, p: f32) -> (Vec3, Vec3) {
        let t = self.inner_parameter(p);
        (self.path.point_at(t), self.path.tangent_at(t))
    }

    pub fn pose(&self, t: f32, radius: f32) -> RigPose {
        let t = clamp_tip(t);
        let tangent = self.path.tangent_at(t);
        RigPose {
            parameter: t,
            tip: self.path.point_at(t),
            tangent,
            rotation: Quat::from_rotation_arc(Vec3::Y, tangent),
            radius,
            polyline: self.tube_polyline(t),
        }
    }

    pub fn update(&self, p: f32, time: f32) -> RigState {
        RigState {
            outer: self.pose(self.outer_parameter(p), self.params.outer_radius),
            inner: self.pose(self.inner_parameter(p), self.params.inner_radius),
            tip_glow: 5.0 + (time * 3.0).sin() * 2.0,
        }
    }

    fn tube_polyline(&self, t: f32) -> Vec<Vec3> {
        let samples = self.params.path_samples.max(2);
        let extension = self.params.extension_samples;
        let mut points = Vec::with_capacity(samples + extension);

        for i in 0..samples {
            let along = t * (1.0 - i as f32 / (samples - 1) as f32);
            points.push(self.path.point_at(along.max(0.0)));
        }

        let start = self.path.point_at(0.0);
        let back = -self.path.tangent_at(0.0);
        for i in 1..=extension {
            let d = i as f32 / extension as f32 * self.params.extension_length;
            points.push(start + back * d);
        }
        points
    }
}

#[inline]
fn clamp_tip(t: f32) -> f32 {
    if t.is_nan() { TIP_T_MIN } else { t.clamp(TIP_T_MIN, TIP_T_MAX) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rig() -> CatheterRig {
        let path = CenterlineCurve::new(vec![
            Vec3::new(0.0, -4.0, 0.0),
            Vec3::new(0.0, -2.0, 0.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(-1.0, 2.0, 0.5),
        ])
        .unwrap();
        CatheterRig::new(path, RigParams::default())
    }

    #[test]
    fn outer_holds_after_deploy_threshold() {
        let rig = rig();
        assert_eq!(rig.outer_parameter(0.2), 0.2);
        assert_eq!(rig.outer_parameter(0.7), DEPLOY_START);
        assert_eq!(rig.inner_parameter(0.7), 0.7);
    }

    #[test]
    fn parameters_stay_inside_open_interval() {
        let rig = rig();
        assert_eq!(rig.inner_parameter(0.0), TIP_T_MIN);
        assert_eq!(rig.inner_parameter(1.0), TIP_T_MAX);
        assert_eq!(rig.inner_parameter(f32::NAN), TIP_T_MIN);
    }

    #[test]
    fn polyline_runs_from_tip_past_the_path_start() {
        let rig = rig();
        let pose = rig.pose(0.5, 0.14);
        assert_eq!(pose.polyline.len(), 100);
        assert_eq!(pose.polyline[0], pose.tip);

        let start = rig.path().point_at(0.0);
        assert!(pose.polyline[59].distance(start) < 1e-5);
        let tail = *pose.polyline.last().unwrap();
        assert!((tail.distance(start) - 15.0).abs() < 1e-3);
        assert!(tail.y < start.y);
    }

    #[test]
    fn tip_rotation_aligns_local_up_with_tangent() {
        let rig = rig();
        for p in [0.0, 0.3, 0.6, 1.0] {
            let pose = rig.pose(p, 0.2);
            assert!((pose.rotation * Vec3::Y).distance(pose.tangent) < 1e-4);
        }
    }

    #[test]
    fn glow_oscillates_around_five() {
        let rig = rig();
        for i in 0..100 {
            let glow = rig.update(0.5, i as f32 * 0.1).tip_glow;
            assert!((3.0..=7.0).contains(&glow));
        }
    }

    #[test]
    fn meshes_are_built_for_every_pose() {
        let rig = rig();
        let state = rig.update(0.45, 0.0);
        let meshes = state.inner.build_meshes(rig.params());
        assert_eq!(meshes.tube.vertices.len(), 101 * 16);
        assert_eq!(meshes.guidewire.vertices.len(), 101 * 12);
        assert!(!meshes.tip.is_empty());
    }

    #[test]
    fn meshes_rebuild_only_when_the_rig_moves() {
        let rig = rig();
        let mut cache = RigMeshCache::default();
        assert!(cache.needs_rebuild(&rig.update(0.3, 0.0)));

        // Glow changes with time; the geometry does not.
        for i in 1..30 {
            assert!(!cache.needs_rebuild(&rig.update(0.3, i as f32 * 0.1)));
        }
        assert!(cache.needs_rebuild(&rig.update(0.31, 3.0)));
        assert!(!cache.needs_rebuild(&rig.update(0.31, 3.1)));

        // Past the deploy threshold only the inner rig moves.
        assert!(cache.needs_rebuild(&rig.update(0.7, 3.2)));
        assert!(cache.needs_rebuild(&rig.update(0.8, 3.3)));
        assert!(cache.needs_rebuild(&rig.update(0.3, 3.4)));
    }
}
