//! Exact continuous stepping
//!
//! A step is split at every portal crossing. Each sub-step finds the earliest
//! crossing over all movables and portals, advances everything up to that
//! moment, teleports the crossing node and continues with the time left.
//! Progress is monotonic in the step fraction; `max_sub_steps` bounds the
//! number of splits.

use serde::{Deserialize, Serialize};

use super::sweep::{Crossing, PointMovement, PortalMovement, earliest_crossing};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::math::{Line, Transform2, Velocity2};
use crate::portal::{self, PortalId};
use crate::scene::{NodeId, NodeKind, Scene};

/// Crossings closer than this (as a fraction of the remaining time) to the
/// previous one happen at the same instant
const SAME_INSTANT: f64 = 1e-6;

/// A node passing through a portal during a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalEnterEvent {
    pub node: NodeId,
    /// Portal that was entered
    pub portal: PortalId,
    /// Portal the node came out of
    pub exit: PortalId,
    /// Fraction of the whole step elapsed at the crossing
    pub time_fraction: f32,
    /// Fraction along the entry segment where it was crossed
    pub across: f32,
    pub transform_before: Transform2,
    pub velocity_before: Velocity2,
    pub transform_after: Transform2,
    pub velocity_after: Velocity2,
    /// Ticks added to the node's clock
    pub time_offset: i64,
}

/// What happened during a step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    /// Crossings in the order they happened
    pub events: Vec<PortalEnterEvent>,
    pub sub_steps: u32,
    /// Motion was dropped because `max_sub_steps` ran out
    pub truncated: bool,
}

/// Advance every moving node by `dt` seconds, teleporting portalable nodes
/// that cross a usable portal.
pub fn step(scene: &mut Scene, dt: f32, config: &EngineConfig) -> Result<StepReport> {
    let mut report = StepReport::default();
    if dt <= 0.0 {
        return Ok(report);
    }
    check_step_invariants(scene)?;

    let mut remaining = dt;
    // Exits of the crossings made at the current instant
    let mut excluded: Vec<(NodeId, PortalId)> = Vec::new();
    loop {
        if report.sub_steps >= config.max_sub_steps {
            log::warn!(
                "step truncated after {} sub-steps, dropping {:.6}s of motion",
                report.sub_steps,
                remaining
            );
            report.truncated = true;
            break;
        }
        report.sub_steps += 1;

        let moving = scene.moving_nodes();
        let (points, portals) = record_movement(scene, &moving, remaining)?;

        match earliest_crossing(&points, &portals, &excluded, config.tie_break) {
            None => {
                advance(scene, &moving, remaining)?;
                log::trace!("sub-step {}: no crossing, committed {:.6}s", report.sub_steps, remaining);
                break;
            }
            Some(crossing) => {
                debug_assert!(!excluded.contains(&(crossing.node, crossing.portal)));
                if crossing.sweep.time > SAME_INSTANT {
                    // Everything has moved off the exits it came out of
                    excluded.clear();
                }
                let t = crossing.sweep.time as f32;
                advance(scene, &moving, remaining * t)?;
                let elapsed = dt - remaining * (1.0 - t);
                let event = teleport(scene, &crossing, elapsed / dt)?;
                log::trace!(
                    "sub-step {}: {} entered {} at t={:.4}",
                    report.sub_steps,
                    event.node,
                    event.portal,
                    t
                );
                excluded.push((event.node, event.exit));
                report.events.push(event);
                remaining *= 1.0 - t;
            }
        }
    }
    Ok(report)
}

pub(super) fn check_step_invariants(scene: &Scene) -> Result<()> {
    for (id, node) in scene.graph.iter() {
        if matches!(node.kind, NodeKind::RigidActor { .. }) && node.velocity().size_rate != 0.0 {
            return Err(Error::ScaleChangeMidStep(id));
        }
    }
    Ok(())
}

/// Start and naive end of every movable and usable portal over `duration`.
/// The scene is left as it was.
fn record_movement(
    scene: &mut Scene,
    moving: &[NodeId],
    duration: f32,
) -> Result<(Vec<PointMovement>, Vec<PortalMovement>)> {
    let portalables = scene.portalables();
    let portal_ids = portal::valid_portals(scene);

    let starts = portalables
        .iter()
        .map(|&id| scene.graph.world_transform(id).map(|t| t.position))
        .collect::<Result<Vec<_>>>()?;
    let portal_starts = portal_ids
        .iter()
        .map(|&id| portal::world_line(scene, id))
        .collect::<Result<Vec<_>>>()?;

    let saved = moving
        .iter()
        .map(|&id| scene.graph.local_transform(id).map(|t| (id, t)))
        .collect::<Result<Vec<_>>>()?;
    advance(scene, moving, duration)?;

    let points = portalables
        .iter()
        .zip(starts)
        .map(|(&node, start)| {
            let end = scene.graph.world_transform(node)?.position;
            Ok(PointMovement {
                node,
                path: Line::new(start, end),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let portals = portal_ids
        .iter()
        .zip(portal_starts)
        .map(|(&id, start)| {
            Ok(PortalMovement {
                portal: id,
                host: scene.portals.get(id)?.host(),
                start,
                end: portal::world_line(scene, id)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    for (id, transform) in saved {
        scene.graph.set_local_transform(id, transform)?;
    }
    Ok((points, portals))
}

/// Integrate the local velocity of each node in `moving` over `duration`
pub(super) fn advance(scene: &mut Scene, moving: &[NodeId], duration: f32) -> Result<()> {
    if duration == 0.0 {
        return Ok(());
    }
    for &id in moving {
        let node = scene.graph.get(id)?;
        let next = node.transform().advanced(&node.velocity(), duration);
        scene.graph.set_local_transform(id, next)?;
    }
    Ok(())
}

/// Move a node through a portal: transform, velocity and clock
pub(crate) fn teleport(
    scene: &mut Scene,
    crossing: &Crossing,
    time_fraction: f32,
) -> Result<PortalEnterEvent> {
    let entry = scene.portals.get(crossing.portal)?;
    let exit = entry.linked().ok_or(Error::NotLinked(crossing.portal))?;
    let time_offset = entry.time_offset();
    let across = crossing.sweep.across as f32;

    let transform_before = scene.graph.world_transform(crossing.node)?;
    let velocity_before = scene.graph.world_velocity(crossing.node)?;
    let transform_after = portal::enter_transform(scene, crossing.portal, &transform_before)?;
    let velocity_after = portal::enter_velocity(scene, crossing.portal, across, &velocity_before)?;

    scene.graph.set_world_transform(crossing.node, transform_after)?;
    scene.graph.set_world_velocity(crossing.node, velocity_after)?;
    let clock = scene.graph.clock(crossing.node)?;
    scene.graph.set_clock(crossing.node, clock + time_offset)?;

    log::debug!(
        "{} entered {} -> {} at ({:.3}, {:.3}), clock {:+}",
        crossing.node,
        crossing.portal,
        exit,
        transform_before.position.x,
        transform_before.position.y,
        time_offset
    );

    Ok(PortalEnterEvent {
        node: crossing.node,
        portal: crossing.portal,
        exit,
        time_fraction,
        across,
        transform_before,
        velocity_before,
        transform_after,
        velocity_after,
        time_offset,
    })
}
