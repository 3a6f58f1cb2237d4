//! Simulation stepping
//!
//! Deterministic given the scene and the step size:
//! - Nodes and portals are visited in slot order
//! - Simultaneous crossings are ordered by the configured tie break
//! - Events are collected and handed back after the step, never delivered
//!   while the scene is being mutated

pub mod bulk;
pub mod step;
pub mod sweep;

pub use bulk::step_bulk;
pub use step::{PortalEnterEvent, StepReport, step};
pub use sweep::{Crossing, PointMovement, PortalMovement, earliest_crossing};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::portal;
use crate::scene::{NodeId, Scene};

/// Advance the scene by one fixed timestep: the global clock and every
/// node's clock tick once, then everything moves.
pub fn tick(scene: &mut Scene, dt: f32, config: &EngineConfig) -> Result<StepReport> {
    scene.time_ticks += 1;
    for id in scene.graph.ids() {
        let clock = scene.graph.clock(id)?;
        scene.graph.set_clock(id, clock + 1)?;
    }

    let report = step(scene, dt, config)?;

    for id in scene.portalables() {
        separate_from_portals(scene, id, config)?;
    }
    Ok(report)
}

/// Push `node` out to at least `entity_min_distance` from every usable
/// portal, along that portal's normal and on the side it is already on.
/// Returns whether the node was moved.
pub fn separate_from_portals(scene: &mut Scene, node: NodeId, config: &EngineConfig) -> Result<bool> {
    let mut position = scene.graph.world_transform(node)?.position;
    let mut moved = false;
    for id in portal::valid_portals(scene) {
        if scene.portals.get(id)?.host() == node {
            continue;
        }
        let line = portal::world_line(scene, id)?;
        let distance = line.distance_to(position, true);
        if distance >= config.entity_min_distance {
            continue;
        }
        let normal = portal::world_normal(scene, id)?;
        let side = if (position - line.center()).dot(normal) < 0.0 {
            -1.0
        } else {
            1.0
        };
        position += normal * side * (config.entity_min_distance - distance);
        moved = true;
    }
    if moved {
        let mut transform = scene.graph.world_transform(node)?;
        transform.position = position;
        scene.graph.set_world_transform(node, transform)?;
        log::trace!("separated {} from portals", node);
    }
    Ok(moved)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::math::{Transform2, Velocity2};
    use crate::portal::PortalId;
    use crate::scene::NodeKind;
    use glam::Vec2;
    use std::f32::consts::PI;

    pub fn approx(a: Vec2, b: Vec2) -> bool {
        (a - b).length() < 1e-4
    }

    /// Portal A at (4, 0) facing +X, B at (-2, -2) facing -X, crossing A adds
    /// ten ticks. A portalable mover sits at (5, 0) heading left at 2 units/s.
    pub fn time_portal_scene() -> (Scene, NodeId, PortalId, PortalId) {
        let mut scene = Scene::new();
        let root = scene.graph.create_root("root");
        let a = scene.graph.create_node(root, "portal-a", NodeKind::Generic).unwrap();
        let b = scene.graph.create_node(root, "portal-b", NodeKind::Generic).unwrap();
        scene
            .graph
            .set_local_transform(a, Transform2::from_position(Vec2::new(4.0, 0.0)))
            .unwrap();
        scene
            .graph
            .set_local_transform(b, Transform2::from_position_rotation(Vec2::new(-2.0, -2.0), PI))
            .unwrap();
        let (pa, pb) = scene.attach_linked_pair(a, b).unwrap();
        scene.portals.set_time_offset(pa, 10).unwrap();

        let mover = scene.graph.create_node(root, "mover", NodeKind::Generic).unwrap();
        scene.graph.set_portalable(mover, true).unwrap();
        scene
            .graph
            .set_local_transform(mover, Transform2::from_position(Vec2::new(5.0, 0.0)))
            .unwrap();
        scene
            .graph
            .set_local_velocity(mover, Velocity2::linear(Vec2::new(-2.0, 0.0)))
            .unwrap();
        (scene, mover, pa, pb)
    }

    #[test]
    fn test_tick_advances_clocks() {
        let (mut scene, mover, _, _) = time_portal_scene();
        let report = tick(&mut scene, 1.0, &EngineConfig::default()).unwrap();
        assert_eq!(report.events.len(), 1);
        assert_eq!(scene.time_ticks, 1);
        // One tick of its own plus the portal's offset
        assert_eq!(scene.graph.clock(mover).unwrap(), 11);
    }

    #[test]
    fn test_separate_pushes_to_min_distance() {
        let (mut scene, mover, _, _) = time_portal_scene();
        let config = EngineConfig::default();
        scene
            .graph
            .set_local_transform(mover, Transform2::from_position(Vec2::new(4.0005, 0.1)))
            .unwrap();
        assert!(separate_from_portals(&mut scene, mover, &config).unwrap());
        let p = scene.graph.world_transform(mover).unwrap().position;
        assert!((p.x - (4.0 + config.entity_min_distance)).abs() < 1e-5);
        assert!((p.y - 0.1).abs() < 1e-6);

        scene
            .graph
            .set_local_transform(mover, Transform2::from_position(Vec2::new(4.1, 0.0)))
            .unwrap();
        assert!(!separate_from_portals(&mut scene, mover, &config).unwrap());
    }

    #[test]
    fn test_separate_keeps_side() {
        let (mut scene, mover, _, _) = time_portal_scene();
        let config = EngineConfig::default();
        scene
            .graph
            .set_local_transform(mover, Transform2::from_position(Vec2::new(3.9995, 0.0)))
            .unwrap();
        separate_from_portals(&mut scene, mover, &config).unwrap();
        let p = scene.graph.world_transform(mover).unwrap().position;
        assert!(p.x < 4.0 - config.entity_min_distance + 1e-5);
    }
}
