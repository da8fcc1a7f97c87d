// Tracking camera for the catheter journey
//
// Camera model:
//   - Wide establishing shot at progress 0: fixed eye, looking at the middle
//     of the vessel network
//   - Close-up at progress 1: eye just behind and above the catheter tip,
//     looking at the tip
//   - Blend between the two by zoom = p^0.7, so the zoom front-loads
//   - The eye approaches its blended target exponentially, never snapping;
//     the look target follows immediately

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use super::progress::clamp_progress;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraParams {
    /// Eye position of the wide shot.
    pub wide_eye:     [f32; 3],
    /// Look target of the wide shot.
    pub wide_target:  [f32; 3],
    /// Close-up eye = tip − tangent·trail + lift.
    pub trail:        f32,
    pub lift:         [f32; 3],
    pub zoom_exponent: f32,
    /// Fraction of the remaining distance covered per 60 Hz frame.
    pub follow:       f32,
    /// Vertical field of view in degrees.
    pub fov_degrees:  f32,
    pub near:         f32,
    pub far:          f32,
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            wide_eye:      [4.0, 4.0, 10.0],
            wide_target:   [-0.5, 0.0, 0.3],
            trail:         1.2,
            lift:          [1.0, 1.5, 2.5],
            zoom_exponent: 0.7,
            follow:        0.03,
            fov_degrees:   50.0,
            near:          0.1,
            far:           100.0,
        }
    }
}

pub struct TrackingCamera {
    pub params: CameraParams,

    /// Current eye position. Private: only moved by update() and snap_to().
    eye: Vec3,

    /// Current look target.
    target: Vec3,
}

impl TrackingCamera {
    pub fn new(params: CameraParams) -> Self {
        Self {
            eye: Vec3::from_array(params.wide_eye),
            target: Vec3::from_array(params.wide_target),
            params,
        }
    }

    /// Where the eye and target want to be for progress `p` with the tip at
    /// `tip` heading along `tangent`.
    pub fn goal(&self, p: f32, tip: Vec3, tangent: Vec3) -> (Vec3, Vec3) {
        let zoom = clamp_progress(p).powf(self.params.zoom_exponent);
        let close_eye = tip - tangent * self.params.trail + Vec3::from_array(self.params.lift);
        let eye = Vec3::from_array(self.params.wide_eye).lerp(close_eye, zoom);
        let target = Vec3::from_array(self.params.wide_target).lerp(tip, zoom);
        (eye, target)
    }

    /// Advance one frame of `dt` seconds. The eye covers `follow` of the
    /// remaining distance per 60 Hz frame, independent of the actual rate.
    pub fn update(&mut self, p: f32, tip: Vec3, tangent: Vec3, dt: f32) {
        let (eye, target) = self.goal(p, tip, tangent);
        let follow = self.params.follow.clamp(0.0, 1.0);
        let alpha = 1.0 - (1.0 - follow).powf(dt.max(0.0) * 60.0);
        self.eye = self.eye.lerp(eye, alpha);
        self.target = target;
    }

    /// Jump straight to the goal, e.g. when motion is reduced.
    pub fn snap_to(&mut self, p: f32, tip: Vec3, tangent: Vec3) {
        (self.eye, self.target) = self.goal(p, tip, tangent);
    }

    pub fn eye(&self) -> Vec3 { self.eye }
    pub fn target(&self) -> Vec3 { self.target }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.params.fov_degrees.to_radians(), aspect, self.params.near, self.params.far)
    }

    /// Combined view-projection matrix ready to upload to the GPU.
    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIP: Vec3 = Vec3::new(-1.0, 2.0, 0.5);

    #[test]
    fn wide_shot_at_start_close_up_at_end() {
        let cam = TrackingCamera::new(CameraParams::default());
        let (eye, target) = cam.goal(0.0, TIP, Vec3::Y);
        assert_eq!(eye, Vec3::new(4.0, 4.0, 10.0));
        assert_eq!(target, Vec3::new(-0.5, 0.0, 0.3));

        let (eye, target) = cam.goal(1.0, TIP, Vec3::Y);
        assert!(eye.distance(TIP - Vec3::Y * 1.2 + Vec3::new(1.0, 1.5, 2.5)) < 1e-5);
        assert!(target.distance(TIP) < 1e-5);
    }

    #[test]
    fn eye_approaches_without_jumping() {
        let mut cam = TrackingCamera::new(CameraParams::default());
        let (goal, _) = cam.goal(1.0, TIP, Vec3::Y);
        let mut last = cam.eye().distance(goal);
        for _ in 0..300 {
            let before = cam.eye();
            cam.update(1.0, TIP, Vec3::Y, 1.0 / 60.0);
            let d = cam.eye().distance(goal);
            assert!(d < last);
            // One frame moves at most 3 % of the remaining distance.
            assert!(cam.eye().distance(before) <= 0.03 * before.distance(goal) + 1e-5);
            last = d;
        }
        assert!(last < 0.01);
    }

    #[test]
    fn smoothing_is_frame_rate_independent() {
        let mut a = TrackingCamera::new(CameraParams::default());
        let mut b = TrackingCamera::new(CameraParams::default());
        for _ in 0..60 {
            a.update(0.8, TIP, Vec3::Y, 1.0 / 60.0);
        }
        for _ in 0..120 {
            b.update(0.8, TIP, Vec3::Y, 1.0 / 120.0);
        }
        assert!(a.eye().distance(b.eye()) < 1e-3);
    }

    #[test]
    fn snap_reaches_goal() {
        let mut cam = TrackingCamera::new(CameraParams::default());
        cam.snap_to(0.5, TIP, Vec3::X);
        assert_eq!((cam.eye(), cam.target()), cam.goal(0.5, TIP, Vec3::X));
    }
}
