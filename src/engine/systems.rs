// ECS systems for the particle mirror
// Each takes the world plus whatever the frame produced; main calls them in
// order: spawn once, then sync and gather every frame

use bevy_ecs::prelude::*;
use glam::Mat4;

use super::components::*;
use super::particles::{ParticleKind, Population};
use super::scene::ParticleBatch;

/// Per-instance GPU data: model matrix columns plus base color.
///   @location(2..5) model columns
///   @location(6)    color
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl InstanceRaw {
    pub fn new(model: Mat4, tint: Tint) -> Self {
        Self { model: model.to_cols_array_2d(), color: tint.to_array() }
    }

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
            2 => Float32x4,
            3 => Float32x4,
            4 => Float32x4,
            5 => Float32x4,
            6 => Float32x4,
        ];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &ATTRIBUTES,
        }
    }
}

/// Spawn one entity per particle of every population.
pub fn spawn_particles(world: &mut World, populations: &[Population]) -> usize {
    let mut spawned = 0;
    for pop in populations {
        let tint = Tint::for_kind(pop.kind());
        world.spawn_batch((0..pop.len()).map(move |index| {
            (ParticleInstance { kind: pop.kind(), index }, InstanceTransform::default(), tint)
        }));
        spawned += pop.len();
    }
    log::info!("Spawned {} particle entities", spawned);
    spawned
}

/// Copy this frame's transforms onto the entities and refresh the stuck
/// markers. `stuck` answers whether instance `index` of `kind` is held back.
pub fn sync_particles(
    world: &mut World,
    batches: &[ParticleBatch],
    stuck: impl Fn(ParticleKind, usize) -> bool,
) {
    let mut newly_stuck = Vec::new();
    let mut released = Vec::new();

    let mut query = world.query::<(Entity, &ParticleInstance, &mut InstanceTransform, Has<Stuck>)>();
    for (entity, instance, mut transform, was_stuck) in query.iter_mut(world) {
        let Some(batch) = batches.iter().find(|b| b.kind == instance.kind) else {
            continue;
        };
        transform.model = batch.transforms.get(instance.index).copied().unwrap_or(Mat4::ZERO);

        let is_stuck = stuck(instance.kind, instance.index);
        if is_stuck && !was_stuck {
            newly_stuck.push(entity);
        } else if !is_stuck && was_stuck {
            released.push(entity);
        }
    }

    for entity in newly_stuck {
        world.entity_mut(entity).insert(Stuck);
    }
    for entity in released {
        world.entity_mut(entity).remove::<Stuck>();
    }
}

/// Instance data of one kind, in index order.
pub fn gather_instances(world: &mut World, kind: ParticleKind) -> Vec<InstanceRaw> {
    let mut query = world.query::<(&ParticleInstance, &InstanceTransform, &Tint)>();
    let mut rows: Vec<(usize, InstanceRaw)> = query
        .iter(world)
        .filter(|(instance, _, _)| instance.kind == kind)
        .map(|(instance, transform, tint)| (instance.index, InstanceRaw::new(transform.model, *tint)))
        .collect();
    rows.sort_by_key(|(index, _)| *index);
    rows.into_iter().map(|(_, raw)| raw).collect()
}

pub fn stuck_entity_count(world: &mut World) -> usize {
    world.query_filtered::<(), With<Stuck>>().iter(world).count()
}
