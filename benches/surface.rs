//! Surface extraction and per-frame update benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use vascular_journey::engine::anatomy::Anatomy;
use vascular_journey::engine::surface::{generate_surface, SceneGeometry, SurfaceParams};
use vascular_journey::engine::{SceneConfig, VascularScene};

fn bench_vessel_surface(c: &mut Criterion) {
    let anatomy = Anatomy::standard(0.0).expect("standard anatomy");
    let params = SurfaceParams::default();

    c.bench_function("vessel_surface", |b| {
        b.iter(|| generate_surface(black_box(&anatomy.network), None, black_box(&params)))
    });
}

fn bench_scene_geometry(c: &mut Criterion) {
    let anatomy = Anatomy::standard(0.0).expect("standard anatomy");
    let params = SurfaceParams { resolution: 48, ..Default::default() };

    c.bench_function("scene_geometry_48", |b| {
        b.iter(|| SceneGeometry::generate(black_box(&anatomy.network), black_box(&anatomy.clot), &params))
    });
}

fn bench_frame_update(c: &mut Criterion) {
    let mut scene = VascularScene::build(&SceneConfig::default()).expect("standard scene builds");
    let mut time = 0.0;

    c.bench_function("frame_update_aspirate", |b| {
        b.iter(|| {
            time += 1.0 / 60.0;
            black_box(scene.update(black_box(0.6), time))
        })
    });
}

criterion_group!(
    benches,
    bench_vessel_surface,
    bench_scene_geometry,
    bench_frame_update
);
criterion_main!(benches);
