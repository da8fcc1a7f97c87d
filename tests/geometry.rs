//! Static scene geometry and configuration
//!
//! The surfaces are built once per configuration; these tests pin down
//! what the renderer can rely on without drawing anything.

use vascular_journey::engine::anatomy::Anatomy;
use vascular_journey::engine::surface::{generate_surface, SceneGeometry, SurfaceParams};
use vascular_journey::engine::{SceneConfig, VascularScene};

fn contains(outer: (glam::Vec3, glam::Vec3), inner: (glam::Vec3, glam::Vec3)) -> bool {
    outer.0.cmple(inner.0).all() && inner.1.cmple(outer.1).all()
}

#[test]
fn test_standard_scene_has_every_surface() {
    let scene = VascularScene::build(&SceneConfig::default()).expect("standard scene builds");
    let geometry = scene.geometry();

    assert!(!geometry.vessel.is_empty(), "vessel wall should not be empty");
    assert!(!geometry.lumen.is_empty(), "lumen should not be empty");
    assert!(!geometry.clot.is_empty(), "clot should not be empty");

    for mesh in [&geometry.vessel, &geometry.lumen, &geometry.clot] {
        let n = mesh.vertices.len() as u32;
        assert!(mesh.indices.iter().all(|&i| i < n), "index out of range");
        assert_eq!(mesh.indices.len() % 3, 0);
    }
}

#[test]
fn test_lumen_sits_inside_the_wall() {
    let anatomy = Anatomy::standard(0.0).expect("standard anatomy");
    let geometry = SceneGeometry::generate(&anatomy.network, &anatomy.clot, &SurfaceParams::default())
        .expect("geometry generates");

    let wall = geometry.vessel.bounds().expect("wall has vertices");
    let lumen = geometry.lumen.bounds().expect("lumen has vertices");
    assert!(contains(wall, lumen), "lumen {:?} escapes the wall {:?}", lumen, wall);
}

#[test]
fn test_clot_is_built_around_its_center() {
    let anatomy = Anatomy::standard(0.0).expect("standard anatomy");
    let geometry = SceneGeometry::generate(&anatomy.network, &anatomy.clot, &SurfaceParams::default())
        .expect("geometry generates");

    let (lo, hi) = geometry.clot.bounds().expect("clot has vertices");
    let mid = (lo + hi) * 0.5;
    let center = anatomy.clot.center();
    assert!(
        mid.distance(center) < anatomy.clot.visual_radius() * 2.0,
        "clot mesh centered at {:?}, expected near {:?}", mid, center
    );
}

#[test]
fn test_surface_generation_is_reproducible() {
    let anatomy = Anatomy::standard(0.0).expect("standard anatomy");
    let params = SurfaceParams { resolution: 40, ..Default::default() };

    let a = generate_surface(&anatomy.network, Some(&anatomy.clot), &params);
    let b = generate_surface(&anatomy.network, Some(&anatomy.clot), &params);
    assert_eq!(a.vertices.len(), b.vertices.len());
    assert_eq!(a.bounds(), b.bounds());
    assert_eq!(a, b);
}

#[test]
fn test_config_survives_a_json_round_trip() {
    let mut config = SceneConfig::default();
    config.flow.budget = 120;
    config.camera.follow = 0.1;

    let path = std::env::temp_dir().join(format!("vascular_journey_{}.json", std::process::id()));
    std::fs::write(&path, config.to_json().expect("config serializes")).expect("temp file writable");
    let loaded = SceneConfig::load(&path).expect("config parses");
    let _ = std::fs::remove_file(&path);

    assert_eq!(loaded, config);
}

#[test]
fn test_missing_or_broken_config_falls_back_to_defaults() {
    let missing = std::env::temp_dir().join("vascular_journey_does_not_exist.json");
    assert_eq!(SceneConfig::load_or_default(&missing), SceneConfig::default());

    let broken = std::env::temp_dir().join(format!("vascular_journey_broken_{}.json", std::process::id()));
    std::fs::write(&broken, "{ not json").expect("temp file writable");
    let config = SceneConfig::load_or_default(&broken);
    let _ = std::fs::remove_file(&broken);
    assert_eq!(config, SceneConfig::default());
}

#[test]
fn test_partial_config_keeps_other_defaults() {
    let config: SceneConfig = serde_json::from_str(r#"{ "camera": { "follow": 0.2 } }"#).expect("partial config parses");
    assert_eq!(config.camera.follow, 0.2);
    assert_eq!(config.camera.fov_degrees, SceneConfig::default().camera.fov_degrees);
    assert_eq!(config.surface, SceneConfig::default().surface);
}
