// Design-time anatomy of the scene: vessel centerlines, flow tracks,
// catheter insertion track and clot placement.
//
//                 cerebral ─┐   ┌─ left continuation
//                           left branch (clot at t = 0.6)      right branch
//                                   \                          /
//                                    └──── bifurcation (0,0,0) ┘
//                                                 │
//                                               aorta
//
// Every vessel end is pushed well beyond the visible frame.

use glam::Vec3;

use super::error::GeometryError;
use super::particles::{FlowTrack, RadialSpan};
use super::path::CenterlineCurve;
use super::surface::{ClotDescriptor, VesselNetwork, VesselSegment};

const AORTA: &[[f32; 3]] = &[
    [0.0, -8.0, 0.0],
    [0.0, -6.0, 0.0],
    [0.03, -4.0, 0.02],
    [0.05, -2.0, 0.03],
    [0.04, -1.0, 0.02],
    [0.0, 0.0, 0.0],
    [0.0, 0.3, 0.0],
];

const LEFT_BRANCH: &[[f32; 3]] = &[
    [0.0, 0.0, 0.0],
    [-0.2, 0.4, 0.1],
    [-0.5, 1.0, 0.25],
    [-0.85, 1.6, 0.42],
    [-1.2, 2.2, 0.58],
    [-1.5, 2.8, 0.72],
    [-1.8, 3.5, 0.9],
    [-2.1, 4.2, 1.1],
];

const RIGHT_BRANCH: &[[f32; 3]] = &[
    [0.0, 0.0, 0.0],
    [0.25, 0.45, -0.08],
    [0.55, 1.1, -0.18],
    [0.85, 1.75, -0.22],
    [1.1, 2.4, -0.18],
    [1.4, 3.2, -0.1],
    [1.7, 4.0, 0.0],
];

const CEREBRAL: &[[f32; 3]] = &[
    [-1.5, 2.8, 0.72],
    [-1.75, 2.9, 0.9],
    [-2.05, 3.1, 1.1],
    [-2.35, 3.35, 1.25],
    [-2.6, 3.6, 1.35],
    [-2.9, 3.9, 1.5],
];

const LEFT_CONTINUATION: &[[f32; 3]] = &[
    [-1.5, 2.8, 0.72],
    [-1.55, 3.0, 0.62],
    [-1.62, 3.3, 0.55],
    [-1.68, 3.6, 0.48],
    [-1.75, 4.0, 0.4],
];

/// Aorta into the left branch, without the off-screen tails.
const FLOW_LEFT: &[[f32; 3]] = &[
    [0.0, -6.0, 0.0],
    [0.03, -4.0, 0.02],
    [0.05, -2.0, 0.03],
    [0.04, -1.0, 0.02],
    [0.0, 0.0, 0.0],
    [-0.2, 0.4, 0.1],
    [-0.5, 1.0, 0.25],
    [-0.85, 1.6, 0.42],
    [-1.2, 2.2, 0.58],
    [-1.5, 2.8, 0.72],
];

const FLOW_RIGHT: &[[f32; 3]] = &[
    [0.0, -6.0, 0.0],
    [0.03, -4.0, 0.02],
    [0.05, -2.0, 0.03],
    [0.04, -1.0, 0.02],
    [0.0, 0.0, 0.0],
    [0.25, 0.45, -0.08],
    [0.55, 1.1, -0.18],
    [0.85, 1.75, -0.22],
    [1.1, 2.4, -0.18],
];

/// Aorta → left branch → cerebral vessel.
const CATHETER: &[[f32; 3]] = &[
    [0.0, -4.0, 0.0],
    [0.03, -3.0, 0.02],
    [0.05, -2.0, 0.03],
    [0.04, -1.0, 0.02],
    [0.0, 0.0, 0.0],
    [-0.2, 0.4, 0.1],
    [-0.5, 1.0, 0.25],
    [-0.85, 1.6, 0.42],
    [-1.2, 2.2, 0.58],
    [-1.5, 2.8, 0.72],
    [-1.75, 2.9, 0.9],
    [-2.05, 3.1, 1.1],
    [-2.35, 3.35, 1.25],
    [-2.55, 3.55, 1.33],
];

pub const AORTA_RADIUS:        f32 = 0.22;
pub const LEFT_RADIUS:         f32 = 0.16;
pub const RIGHT_RADIUS:        f32 = 0.14;
pub const CEREBRAL_RADIUS:     f32 = 0.10;
pub const CONTINUATION_RADIUS: f32 = 0.09;

/// Flow-track parameter past which the branch radius applies.
pub const BRANCH_T: f32 = 0.5;

pub const CLOT_T:      f32 = 0.6;
pub const CLOT_LENGTH: f32 = 0.5;

fn curve(points: &[[f32; 3]]) -> Result<CenterlineCurve, GeometryError> {
    CenterlineCurve::new(points.iter().copied().map(Vec3::from_array).collect())
}

/// Everything static about the scene.
#[derive(Debug, Clone)]
pub struct Anatomy {
    pub network:  VesselNetwork,
    pub tracks:   Vec<FlowTrack>,
    pub catheter: CenterlineCurve,
    pub clot:     ClotDescriptor,
}

impl Anatomy {
    /// The standard scene. A flow track is marked as colliding when it passes
    /// within `flow_reach` of the clot's collision sphere.
    pub fn standard(flow_reach: f32) -> Result<Self, GeometryError> {
        let clot = ClotDescriptor::new(curve(LEFT_BRANCH)?, CLOT_T, LEFT_RADIUS, CLOT_LENGTH)?;
        let reach = clot.collision_radius() + flow_reach;

        let tracks = [(FLOW_LEFT, LEFT_RADIUS), (FLOW_RIGHT, RIGHT_RADIUS)]
            .into_iter()
            .map(|(points, branch_radius)| {
                let track = FlowTrack::new(curve(points)?, vec![
                    RadialSpan { from_t: 0.0, radius: AORTA_RADIUS },
                    RadialSpan { from_t: BRANCH_T, radius: branch_radius },
                ]);
                let collides = track.passes_within(clot.center(), reach);
                Ok(track.with_collision(collides))
            })
            .collect::<Result<Vec<_>, GeometryError>>()?;

        Ok(Self {
            network: vessel_network()?,
            tracks,
            catheter: curve(CATHETER)?,
            clot,
        })
    }
}

pub fn vessel_network() -> Result<VesselNetwork, GeometryError> {
    let segments = [
        (AORTA, AORTA_RADIUS),
        (LEFT_BRANCH, LEFT_RADIUS),
        (RIGHT_BRANCH, RIGHT_RADIUS),
        (CEREBRAL, CEREBRAL_RADIUS),
        (LEFT_CONTINUATION, CONTINUATION_RADIUS),
    ]
    .into_iter()
    .map(|(points, radius)| VesselSegment::new(curve(points)?, radius))
    .collect::<Result<Vec<_>, _>>()?;
    Ok(VesselNetwork::new(segments))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_scene_builds() {
        let anatomy = Anatomy::standard(0.3).unwrap();
        assert_eq!(anatomy.network.segments().len(), 5);
        assert_eq!(anatomy.tracks.len(), 2);
    }

    #[test]
    fn only_the_left_track_reaches_the_clot() {
        let anatomy = Anatomy::standard(0.3).unwrap();
        assert!(anatomy.tracks[0].collides());
        assert!(!anatomy.tracks[1].collides());
    }

    #[test]
    fn branches_meet_at_the_bifurcation() {
        let network = vessel_network().unwrap();
        let segments = network.segments();
        for branch in &segments[1..3] {
            assert_eq!(branch.curve.point_at(0.0), Vec3::ZERO);
        }
        assert_eq!(segments[3].curve.point_at(0.0), segments[4].curve.point_at(0.0));
    }

    #[test]
    fn catheter_passes_the_clot() {
        let anatomy = Anatomy::standard(0.3).unwrap();
        let center = anatomy.clot.center();
        let closest = anatomy.catheter.sample(400).iter().map(|p| p.distance(center)).fold(f32::MAX, f32::min);
        assert!(closest < LEFT_RADIUS);
    }
}
