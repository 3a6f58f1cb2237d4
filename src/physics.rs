//! Seam to an external rigid-body backend
//!
//! The solver only owns kinematics. Nodes of kind `RigidActor` mirror a body
//! in the backend: their state is pulled in before a step so the sweep sees
//! current positions, and pushed back out afterwards so teleports and
//! velocity changes reach the backend.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::math::{Transform2, Velocity2};
use crate::scene::{NodeId, NodeKind, Scene};

/// Opaque id of a body inside the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyHandle(pub u32);

/// What the engine needs from a physics backend. Bodies the backend does
/// not know about are skipped.
pub trait PhysicsBackend {
    /// World position and rotation of a body. Size and mirroring are owned
    /// by the scene node.
    fn body_transform(&self, body: BodyHandle) -> Option<Transform2>;
    fn set_body_transform(&mut self, body: BodyHandle, transform: Transform2);
    fn body_velocity(&self, body: BodyHandle) -> Option<Velocity2>;
    fn set_body_velocity(&mut self, body: BodyHandle, velocity: Velocity2);
    /// Force applied at a world point
    fn apply_force(&mut self, body: BodyHandle, force: Vec2, point: Vec2);
    fn apply_torque(&mut self, body: BodyHandle, torque: f32);
}

fn rigid_actors(scene: &Scene) -> Vec<(NodeId, BodyHandle)> {
    scene
        .graph
        .iter()
        .filter_map(|(id, node)| match node.kind {
            NodeKind::RigidActor { body } => Some((id, body)),
            _ => None,
        })
        .collect()
}

/// Copy body state into the scene. Returns how many nodes were updated.
pub fn pull_from_backend(scene: &mut Scene, backend: &impl PhysicsBackend) -> Result<usize> {
    let mut updated = 0;
    for (id, body) in rigid_actors(scene) {
        let Some(body_transform) = backend.body_transform(body) else {
            continue;
        };
        let current = scene.graph.world_transform(id)?;
        scene.graph.set_world_transform(
            id,
            Transform2 {
                position: body_transform.position,
                rotation: body_transform.rotation,
                ..current
            },
        )?;
        if let Some(velocity) = backend.body_velocity(body) {
            scene.graph.set_world_velocity(
                id,
                Velocity2 {
                    size_rate: 0.0,
                    ..velocity
                },
            )?;
        }
        updated += 1;
    }
    Ok(updated)
}

/// Write node state back to the backend
pub fn push_to_backend(scene: &Scene, backend: &mut impl PhysicsBackend) -> Result<usize> {
    let actors = rigid_actors(scene);
    for &(id, body) in &actors {
        backend.set_body_transform(body, scene.graph.world_transform(id)?);
        backend.set_body_velocity(body, scene.graph.world_velocity(id)?);
    }
    Ok(actors.len())
}
