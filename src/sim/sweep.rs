//! Earliest portal crossing within one sub-step
//!
//! Every movable contributes a straight path from its start position to
//! where it would be if the whole remaining time elapsed. Every usable portal
//! contributes its segment at both ends of that interval. The earliest hit
//! over all pairs wins.

use crate::config::TieBreak;
use crate::math::{Line, Sweep, first_crossing};
use crate::portal::PortalId;
use crate::scene::NodeId;

/// Two crossings closer together than this count as simultaneous
const TIME_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointMovement {
    pub node: NodeId,
    /// Start to naive end in world space
    pub path: Line,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortalMovement {
    pub portal: PortalId,
    pub host: NodeId,
    pub start: Line,
    pub end: Line,
}

/// A movable passing through a portal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossing {
    pub node: NodeId,
    pub portal: PortalId,
    pub sweep: Sweep,
}

impl Crossing {
    fn precedes(&self, other: &Crossing, tie_break: TieBreak) -> bool {
        let dt = self.sweep.time - other.sweep.time;
        if dt.abs() > TIME_EPSILON {
            return dt < 0.0;
        }
        match tie_break {
            TieBreak::DiscoveryOrder => false,
            TieBreak::StableId => (self.node, self.portal) < (other.node, other.portal),
        }
    }
}

/// Earliest crossing with `time` in `[0, 1)`.
///
/// `excluded` holds the (movable, exit portal) pairs of crossings made at
/// the current instant: each movable sits exactly on that portal and must
/// not re-enter it.
pub fn earliest_crossing(
    points: &[PointMovement],
    portals: &[PortalMovement],
    excluded: &[(NodeId, PortalId)],
    tie_break: TieBreak,
) -> Option<Crossing> {
    let mut earliest: Option<Crossing> = None;
    for point in points {
        for portal in portals {
            if point.node == portal.host || excluded.contains(&(point.node, portal.portal)) {
                continue;
            }
            let Some(sweep) = first_crossing(&point.path, &portal.start, &portal.end) else {
                continue;
            };
            if !(0.0..1.0).contains(&sweep.time) {
                continue;
            }
            let candidate = Crossing {
                node: point.node,
                portal: portal.portal,
                sweep,
            };
            if earliest.is_none_or(|e| candidate.precedes(&e, tie_break)) {
                earliest = Some(candidate);
            }
        }
    }
    earliest
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn node(index: u32) -> NodeId {
        NodeId {
            index,
            generation: 0,
        }
    }

    fn static_portal(id: u32, x: f32) -> PortalMovement {
        let line = Line::new(Vec2::new(x, 0.5), Vec2::new(x, -0.5));
        PortalMovement {
            portal: PortalId(id),
            host: node(100 + id),
            start: line,
            end: line,
        }
    }

    fn mover(index: u32, from: Vec2, to: Vec2) -> PointMovement {
        PointMovement {
            node: node(index),
            path: Line::new(from, to),
        }
    }

    #[test]
    fn test_picks_earliest_portal() {
        let portals = [static_portal(0, 3.0), static_portal(1, 1.0)];
        let points = [mover(0, Vec2::ZERO, Vec2::new(4.0, 0.0))];
        let hit = earliest_crossing(&points, &portals, &[], TieBreak::DiscoveryOrder).unwrap();
        assert_eq!(hit.portal, PortalId(1));
        assert!((hit.sweep.time - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_excluded_pair_is_skipped() {
        let portals = [static_portal(0, 0.0)];
        let points = [mover(0, Vec2::ZERO, Vec2::new(-1.0, 0.0))];
        assert!(earliest_crossing(&points, &portals, &[], TieBreak::DiscoveryOrder).is_some());
        assert!(
            earliest_crossing(&points, &portals, &[(node(0), PortalId(0))], TieBreak::DiscoveryOrder)
                .is_none()
        );
        // Another movable's exclusion does not apply
        assert!(
            earliest_crossing(&points, &portals, &[(node(1), PortalId(0))], TieBreak::DiscoveryOrder)
                .is_some()
        );
    }

    #[test]
    fn test_end_of_interval_is_not_a_crossing() {
        let portals = [static_portal(0, 1.0)];
        let points = [mover(0, Vec2::ZERO, Vec2::new(1.0, 0.0))];
        assert!(earliest_crossing(&points, &portals, &[], TieBreak::DiscoveryOrder).is_none());
    }

    #[test]
    fn test_tie_break() {
        let portals = [static_portal(0, 1.0)];
        // Two movables reach the portal at the same time; the second has the
        // lower id
        let points = [
            mover(5, Vec2::new(0.0, 0.2), Vec2::new(2.0, 0.2)),
            mover(2, Vec2::new(0.0, -0.2), Vec2::new(2.0, -0.2)),
        ];
        let first = earliest_crossing(&points, &portals, &[], TieBreak::DiscoveryOrder).unwrap();
        assert_eq!(first.node, node(5));
        let stable = earliest_crossing(&points, &portals, &[], TieBreak::StableId).unwrap();
        assert_eq!(stable.node, node(2));
    }
}
