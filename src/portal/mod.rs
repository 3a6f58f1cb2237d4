//! Portal pairs and the transforms they induce
//!
//! A portal is a unit segment attached to a host node: the host's world
//! transform applied to the local endpoints `(0, 0.5)` and `(0, -0.5)`. Its
//! facing normal is the host's local +X. Two linked portals define the portal
//! matrix `exit * R(pi) * entry^-1`, which maps anything on the entry side
//! onto the exit side facing the other way.

use std::f32::consts::PI;
use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::math::{Line, Transform2, Velocity2};
use crate::scene::{NodeId, Scene, SceneGraph};

/// Local endpoints of every portal segment
pub const PORTAL_VERTS: [Vec2; 2] = [Vec2::new(0.0, 0.5), Vec2::new(0.0, -0.5)];

/// Portals whose world segment is shorter than this are unusable
pub const MIN_PORTAL_LENGTH: f32 = 1e-6;

/// Handle into a [`PortalSet`]. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortalId(pub(crate) u32);

impl PortalId {
    pub fn index(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for PortalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portal {
    host: NodeId,
    linked: Option<PortalId>,
    /// Ticks added to the clock of anything crossing this portal
    time_offset: i64,
}

impl Portal {
    pub fn host(&self) -> NodeId {
        self.host
    }

    pub fn linked(&self) -> Option<PortalId> {
        self.linked
    }

    pub fn time_offset(&self) -> i64 {
        self.time_offset
    }
}

/// All portals of a scene
#[derive(Debug, Clone, Default)]
pub struct PortalSet {
    portals: Vec<Option<Portal>>,
}

impl PortalSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: PortalId) -> Result<&Portal> {
        self.portals
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(Error::PortalNotFound(id))
    }

    fn get_mut(&mut self, id: PortalId) -> Result<&mut Portal> {
        self.portals
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(Error::PortalNotFound(id))
    }

    pub fn contains(&self, id: PortalId) -> bool {
        self.get(id).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PortalId, &Portal)> {
        self.portals
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.as_ref().map(|p| (PortalId(i as u32), p)))
    }

    pub fn ids(&self) -> Vec<PortalId> {
        self.iter().map(|(id, _)| id).collect()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hosted_by(&self, host: NodeId) -> Vec<PortalId> {
        self.iter()
            .filter(|(_, p)| p.host == host)
            .map(|(id, _)| id)
            .collect()
    }

    /// Attach a new, unlinked portal to `host`
    pub fn attach(&mut self, graph: &mut SceneGraph, host: NodeId) -> Result<PortalId> {
        let node = graph.node_mut(host)?;
        if node.portalable {
            return Err(Error::PortalHostPortalable(host));
        }
        node.portal_host = true;
        self.portals.push(Some(Portal {
            host,
            linked: None,
            time_offset: 0,
        }));
        Ok(PortalId((self.portals.len() - 1) as u32))
    }

    /// Remove a portal, unlinking its partner
    pub fn detach(&mut self, graph: &mut SceneGraph, id: PortalId) -> Result<Portal> {
        self.unlink(id)?;
        let portal = self.portals[id.0 as usize]
            .take()
            .ok_or(Error::PortalNotFound(id))?;
        if self.hosted_by(portal.host).is_empty() {
            if let Ok(node) = graph.node_mut(portal.host) {
                node.portal_host = false;
            }
        }
        Ok(portal)
    }

    /// Link `a` and `b` to each other
    pub fn link(&mut self, a: PortalId, b: PortalId) -> Result<()> {
        if a == b {
            return Err(Error::SelfLink(a));
        }
        for id in [a, b] {
            if self.get(id)?.linked.is_some() {
                return Err(Error::AlreadyLinked(id));
            }
        }
        self.get_mut(a)?.linked = Some(b);
        self.get_mut(b)?.linked = Some(a);
        Ok(())
    }

    /// Break the link of `id` (and its partner's). No-op when unlinked.
    pub fn unlink(&mut self, id: PortalId) -> Result<()> {
        if let Some(other) = self.get_mut(id)?.linked.take() {
            if let Ok(partner) = self.get_mut(other) {
                partner.linked = None;
            }
        }
        Ok(())
    }

    /// Make `id` a time portal. The linked partner gets the opposite offset
    /// so a round trip leaves the clock unchanged.
    pub fn set_time_offset(&mut self, id: PortalId, offset: i64) -> Result<()> {
        let portal = self.get_mut(id)?;
        portal.time_offset = offset;
        if let Some(other) = portal.linked {
            self.get_mut(other)?.time_offset = -offset;
        }
        Ok(())
    }
}

/// World segment of a portal
pub fn world_line(scene: &Scene, id: PortalId) -> Result<Line> {
    let portal = scene.portals.get(id)?;
    let host = scene.graph.world_transform(portal.host)?;
    Ok(Line::new(PORTAL_VERTS[0], PORTAL_VERTS[1]).transformed(&host))
}

/// World facing direction of a portal
pub fn world_normal(scene: &Scene, id: PortalId) -> Result<Vec2> {
    let portal = scene.portals.get(id)?;
    Ok(scene.graph.world_transform(portal.host)?.normal())
}

fn check_usable(scene: &Scene, id: PortalId) -> Result<(Transform2, Transform2)> {
    let portal = scene.portals.get(id)?;
    let exit_id = portal.linked.ok_or(Error::NotLinked(id))?;
    let exit = scene.portals.get(exit_id)?;
    let entry_world = scene.graph.world_transform(portal.host)?;
    let exit_world = scene.graph.world_transform(exit.host)?;
    if entry_world.size < MIN_PORTAL_LENGTH {
        return Err(Error::DegeneratePortal(id));
    }
    if exit_world.size < MIN_PORTAL_LENGTH {
        return Err(Error::DegeneratePortal(exit_id));
    }
    Ok((entry_world, exit_world))
}

/// Whether the portal exists, is linked to an existing portal, and both
/// segments have length
pub fn is_valid(scene: &Scene, id: PortalId) -> bool {
    check_usable(scene, id).is_ok()
}

/// Ids of every usable portal, in id order
pub fn valid_portals(scene: &Scene) -> Vec<PortalId> {
    scene
        .portals
        .ids()
        .into_iter()
        .filter(|&id| is_valid(scene, id))
        .collect()
}

/// World placement and motion of a portal's host
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PortalFrame {
    pub transform: Transform2,
    pub velocity: Velocity2,
}

impl PortalFrame {
    pub fn line(&self) -> Line {
        Line::new(PORTAL_VERTS[0], PORTAL_VERTS[1]).transformed(&self.transform)
    }

    /// Velocity of the portal surface at world `point`
    pub fn surface_velocity(&self, point: Vec2) -> Vec2 {
        self.velocity.point_velocity(self.transform.position, point)
    }
}

/// `exit * R(pi) * entry^-1`
///
/// Its mirror flag is the XOR of both portals' flags, which keeps
/// entering A then B an exact round trip.
pub fn matrix_between(entry: &Transform2, exit: &Transform2) -> Transform2 {
    let half_turn = Transform2::from_position_rotation(Vec2::ZERO, PI);
    entry.inverted().in_frame(&half_turn).in_frame(exit)
}

/// Velocity after passing from `entry` to `exit` at `across` along the
/// entry segment.
///
/// The entry portal's own surface velocity at the crossing point is removed
/// first and the exit portal's surface velocity at the image point added
/// afterwards, so a portal moving onto a resting object launches it.
pub fn velocity_between(
    entry: &PortalFrame,
    exit: &PortalFrame,
    across: f32,
    velocity: &Velocity2,
) -> Velocity2 {
    let matrix = matrix_between(&entry.transform, &exit.transform);
    let point = entry.line().lerp(across);
    let image = matrix.transform_point(point);

    let linear = velocity.linear - entry.surface_velocity(point);
    let angular = velocity.angular - entry.velocity.angular;
    let angular = if matrix.mirror_x { -angular } else { angular };

    Velocity2 {
        linear: matrix.transform_vector(linear) + exit.surface_velocity(image),
        angular: angular + exit.velocity.angular,
        size_rate: velocity.size_rate * matrix.size,
    }
}

/// World frames of a usable portal and its partner
pub fn frames(scene: &Scene, id: PortalId) -> Result<(PortalFrame, PortalFrame)> {
    let (entry, exit) = check_usable(scene, id)?;
    let entry_host = scene.portals.get(id)?.host;
    let exit_id = scene.portals.get(id)?.linked.ok_or(Error::NotLinked(id))?;
    let exit_host = scene.portals.get(exit_id)?.host;
    Ok((
        PortalFrame {
            transform: entry,
            velocity: scene.graph.world_velocity(entry_host)?,
        },
        PortalFrame {
            transform: exit,
            velocity: scene.graph.world_velocity(exit_host)?,
        },
    ))
}

/// Portal matrix of `id`, see [`matrix_between`]
pub fn portal_matrix(scene: &Scene, id: PortalId) -> Result<Transform2> {
    let (entry, exit) = check_usable(scene, id)?;
    Ok(matrix_between(&entry, &exit))
}

/// `transform` (world space) as seen after passing through `id`
pub fn enter_transform(scene: &Scene, id: PortalId, transform: &Transform2) -> Result<Transform2> {
    Ok(transform.in_frame(&portal_matrix(scene, id)?))
}

/// World velocity after passing through `id`, see [`velocity_between`]
pub fn enter_velocity(
    scene: &Scene,
    id: PortalId,
    across: f32,
    velocity: &Velocity2,
) -> Result<Velocity2> {
    let (entry, exit) = frames(scene, id)?;
    Ok(velocity_between(&entry, &exit, across, velocity))
}
