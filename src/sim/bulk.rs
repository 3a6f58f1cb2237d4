//! Fixed-iteration stepping for many movables at once
//!
//! Cheaper and less exact than [`step`](super::step): the step is split into
//! equal iterations and work is done on copies of the world state. Movables
//! are ray-cast against the portal lines as they stand in each iteration.
//! A moving portal sweeps a quad over the iteration and swallows anything
//! inside it, crossing at the middle of the segment. Nothing touches the
//! scene until the end.

use super::step::{PortalEnterEvent, StepReport, advance, check_step_invariants};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::math::{Line, Transform2, Velocity2, point_in_polygon};
use crate::normalize_angle;
use crate::portal::{self, PortalFrame, PortalId, matrix_between, velocity_between};
use crate::scene::{NodeId, Scene};

#[derive(Debug, Clone)]
struct MovableProxy {
    node: NodeId,
    portalable: bool,
    transform: Transform2,
    velocity: Velocity2,
    clock: i64,
    /// Portal the proxy last came out of, ignored until it has moved off it
    skip: Option<usize>,
}

#[derive(Debug, Clone)]
struct PortalProxy {
    id: PortalId,
    linked: usize,
    frame: PortalFrame,
    time_offset: i64,
}

/// Advance `nodes` (and every other moving node) by `dt` in `iterations`
/// equal parts.
pub fn step_bulk(
    scene: &mut Scene,
    nodes: &[NodeId],
    dt: f32,
    iterations: u32,
    config: &EngineConfig,
) -> Result<StepReport> {
    let mut report = StepReport::default();
    if dt <= 0.0 {
        return Ok(report);
    }
    check_step_invariants(scene)?;
    let iterations = iterations.max(1);

    let mut movables = Vec::with_capacity(nodes.len());
    for &node in nodes {
        if movables.iter().any(|m: &MovableProxy| m.node == node) {
            continue;
        }
        movables.push(MovableProxy {
            node,
            portalable: scene.graph.get(node)?.is_portalable(),
            transform: scene.graph.world_transform(node)?,
            velocity: scene.graph.world_velocity(node)?,
            clock: scene.graph.clock(node)?,
            skip: None,
        });
    }
    let mut portals = portal_proxies(scene)?;

    let h = dt / iterations as f32;
    for i in 0..iterations {
        report.sub_steps += 1;
        let iteration_start = i as f32 / iterations as f32;

        for movable in movables.iter_mut() {
            movable.transform.rotation =
                normalize_angle(movable.transform.rotation + movable.velocity.angular * h);
            movable.transform.size += movable.velocity.size_rate * h;
            let truncated = ray_cast(movable, &portals, h, config, |mut event, progress| {
                event.time_fraction = iteration_start + progress / iterations as f32;
                report.events.push(event);
            });
            report.truncated |= truncated;
        }

        for p in 0..portals.len() {
            if portals[p].frame.velocity.is_zero() {
                continue;
            }
            let start = portals[p].frame.line();
            portals[p].frame.transform = portals[p]
                .frame
                .transform
                .advanced(&portals[p].frame.velocity, h);

            // Slightly oversized so a portal cannot push things ahead of it
            let linear = portals[p].frame.velocity.linear;
            let margin = linear.normalize_or_zero() * config.min_entry_distance * 2.0;
            let end = portals[p].frame.line().translated(margin);
            let quad = [start.a, start.b, end.b, end.a];

            for movable in movables.iter_mut() {
                if !movable.portalable || movable.skip == Some(p) {
                    continue;
                }
                if point_in_polygon(movable.transform.position, &quad) {
                    let mut event = enter(movable, &portals, p, 0.5);
                    event.time_fraction = (i + 1) as f32 / iterations as f32;
                    report.events.push(event);
                }
            }
        }
    }

    // Everything else moves as in an exact step with no crossings
    let others: Vec<NodeId> = scene
        .moving_nodes()
        .into_iter()
        .filter(|id| !movables.iter().any(|m| m.node == *id))
        .collect();
    advance(scene, &others, dt)?;

    for movable in &movables {
        scene.graph.set_world_transform(movable.node, movable.transform)?;
        scene.graph.set_world_velocity(movable.node, movable.velocity)?;
        scene.graph.set_clock(movable.node, movable.clock)?;
    }
    log::trace!(
        "bulk step: {} movables, {} iterations, {} crossings",
        movables.len(),
        iterations,
        report.events.len()
    );
    Ok(report)
}

fn portal_proxies(scene: &Scene) -> Result<Vec<PortalProxy>> {
    let ids = portal::valid_portals(scene);
    let mut proxies = Vec::with_capacity(ids.len());
    for &id in &ids {
        let portal = scene.portals.get(id)?;
        let Some(linked) = portal
            .linked()
            .and_then(|l| ids.iter().position(|&other| other == l))
        else {
            continue;
        };
        let (frame, _) = portal::frames(scene, id)?;
        proxies.push(PortalProxy {
            id,
            linked,
            frame,
            time_offset: portal.time_offset(),
        });
    }
    Ok(proxies)
}

/// Move a proxy along its velocity for `h`, passing through any portal lines
/// on the way. `on_enter` receives each crossing with the fraction of the
/// iteration elapsed. Returns whether motion was cut short.
fn ray_cast(
    movable: &mut MovableProxy,
    portals: &[PortalProxy],
    h: f32,
    config: &EngineConfig,
    mut on_enter: impl FnMut(PortalEnterEvent, f32),
) -> bool {
    let mut progress = 0.0;
    for _ in 0..config.max_sub_steps {
        let remaining = 1.0 - progress;
        let start = movable.transform.position;
        let path = Line::new(start, start + movable.velocity.linear * h * remaining);

        let nearest = if movable.portalable {
            portals
                .iter()
                .enumerate()
                .filter(|(p, _)| movable.skip != Some(*p))
                .filter_map(|(p, portal)| path.intersect(&portal.frame.line(), true).map(|hit| (p, hit)))
                .min_by(|a, b| a.1.t.total_cmp(&b.1.t))
        } else {
            None
        };

        match nearest {
            None => {
                if path.length() > 0.0 {
                    movable.skip = None;
                }
                movable.transform.position = path.b;
                return false;
            }
            Some((p, hit)) => {
                movable.transform.position = hit.point;
                progress += remaining * hit.t;
                let event = enter(movable, portals, p, hit.u);
                on_enter(event, progress);
            }
        }
    }
    log::warn!("ray cast for {} stopped after {} crossings", movable.node, config.max_sub_steps);
    true
}

fn enter(movable: &mut MovableProxy, portals: &[PortalProxy], p: usize, across: f32) -> PortalEnterEvent {
    let entry = &portals[p];
    let exit = &portals[entry.linked];
    let matrix = matrix_between(&entry.frame.transform, &exit.frame.transform);

    let transform_before = movable.transform;
    let velocity_before = movable.velocity;
    movable.transform = movable.transform.in_frame(&matrix);
    movable.velocity = velocity_between(&entry.frame, &exit.frame, across, &movable.velocity);
    movable.clock += entry.time_offset;
    movable.skip = Some(entry.linked);

    log::debug!("{} entered {} -> {} (bulk)", movable.node, entry.id, exit.id);
    PortalEnterEvent {
        node: movable.node,
        portal: entry.id,
        exit: exit.id,
        time_fraction: 0.0,
        across,
        transform_before,
        velocity_before,
        transform_after: movable.transform,
        velocity_after: movable.velocity,
        time_offset: entry.time_offset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::tests::{approx, time_portal_scene};
    use glam::Vec2;

    #[test]
    fn test_bulk_time_portal_scenario() {
        let (mut scene, mover, pa, pb) = time_portal_scene();
        let report = step_bulk(&mut scene, &[mover], 1.0, 4, &EngineConfig::default()).unwrap();

        assert_eq!(report.sub_steps, 4);
        assert_eq!(report.events.len(), 1);
        assert_eq!((report.events[0].portal, report.events[0].exit), (pa, pb));
        assert!((report.events[0].time_fraction - 0.5).abs() < 1e-5);
        let end = scene.graph.world_transform(mover).unwrap();
        assert!(approx(end.position, Vec2::new(-3.0, -2.0)));
        assert_eq!(scene.graph.clock(mover).unwrap(), 10);
    }

    #[test]
    fn test_bulk_moving_portal_swallows_static_node() {
        let (mut scene, mover, pa, _) = time_portal_scene();
        scene.graph.set_local_velocity(mover, Velocity2::ZERO).unwrap();
        let host = scene.portals.get(pa).unwrap().host();
        scene
            .graph
            .set_local_velocity(host, Velocity2::linear(Vec2::new(2.0, 0.0)))
            .unwrap();

        let report = step_bulk(&mut scene, &[mover], 1.0, 4, &EngineConfig::default()).unwrap();
        assert_eq!(report.events.len(), 1);
        assert!((report.events[0].across - 0.5).abs() < 1e-6);
        assert!(approx(scene.graph.world_transform(mover).unwrap().position, Vec2::new(-3.0, -2.0)));
        assert!(approx(scene.graph.world_velocity(mover).unwrap().linear, Vec2::new(-2.0, 0.0)));
        // The portal itself was moved once, at write-back
        assert!(approx(scene.graph.world_transform(host).unwrap().position, Vec2::new(6.0, 0.0)));
    }

    #[test]
    fn test_bulk_matches_exact_step_for_static_portals() {
        let (mut exact, mover, _, _) = time_portal_scene();
        let (mut bulk, _, _, _) = time_portal_scene();
        crate::sim::step(&mut exact, 3.0, &EngineConfig::default()).unwrap();
        step_bulk(&mut bulk, &[mover], 3.0, 7, &EngineConfig::default()).unwrap();
        assert!(approx(
            exact.graph.world_transform(mover).unwrap().position,
            bulk.graph.world_transform(mover).unwrap().position
        ));
    }

    #[test]
    fn test_bulk_non_portalable_passes_through() {
        let (mut scene, mover, _, _) = time_portal_scene();
        scene.graph.set_portalable(mover, false).unwrap();
        let report = step_bulk(&mut scene, &[mover], 1.0, 4, &EngineConfig::default()).unwrap();
        assert!(report.events.is_empty());
        assert!(approx(scene.graph.world_transform(mover).unwrap().position, Vec2::new(3.0, 0.0)));
    }
}
