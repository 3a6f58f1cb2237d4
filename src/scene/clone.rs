//! Deep cloning of subtrees
//!
//! Cloning happens in two passes. The first discovers every node reachable
//! from the requested set (each node once, even if it is requested directly
//! and also reached through an ancestor) and shallow-copies it. The second
//! rewires parent and child references through the clone map, so clones point
//! at clones and never at the originals they came from.

use std::collections::{BTreeMap, BTreeSet};

use super::graph::SceneGraph;
use super::node::{NodeId, NodeKind};
use crate::error::{Error, Result};

/// Original to clone mapping produced by a deep clone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloneMap {
    map: BTreeMap<NodeId, NodeId>,
    /// Originals in discovery order, parents before children
    order: Vec<NodeId>,
}

impl CloneMap {
    pub fn get(&self, original: NodeId) -> Option<NodeId> {
        self.map.get(&original).copied()
    }

    pub fn contains(&self, original: NodeId) -> bool {
        self.map.contains_key(&original)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// `(original, clone)` pairs in discovery order
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.order.iter().map(|o| (*o, self.map[o]))
    }
}

impl SceneGraph {
    /// Clone `nodes` and all of their descendants.
    ///
    /// A clone whose original parent was not cloned is attached to that
    /// original parent. Cloned roots become new roots. Portal hosting is not
    /// carried over here; see `Scene::deep_clone`.
    ///
    /// A `RigidActor` anywhere in the set is rejected before anything is
    /// cloned: its body belongs to the backend and cannot be shared.
    pub fn deep_clone(&mut self, nodes: &[NodeId]) -> Result<CloneMap> {
        let mut seen = BTreeSet::new();
        let mut order = Vec::new();
        for &node in nodes {
            for id in self.descendants(node)? {
                if seen.insert(id) {
                    order.push(id);
                }
            }
        }

        for &id in &order {
            if matches!(self.get(id)?.kind, NodeKind::RigidActor { .. }) {
                return Err(Error::CloneBoundBody(id));
            }
        }

        let mut map = BTreeMap::new();
        for &original in &order {
            let mut copy = self.get(original)?.shallow_clone();
            copy.parent = None;
            copy.children.clear();
            copy.portal_host = false;
            map.insert(original, self.insert(copy));
        }

        for &original in &order {
            let clone = map[&original];
            let parent = match self.get(original)?.parent {
                Some(p) => Some(map.get(&p).copied().unwrap_or(p)),
                None => None,
            };
            if let Some(parent) = parent {
                self.node_mut(clone)?.parent = Some(parent);
                self.node_mut(parent)?.children.push(clone);
            }
        }

        log::debug!("deep cloned {} nodes", order.len());
        Ok(CloneMap { map, order })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Transform2;
    use crate::physics::BodyHandle;
    use glam::Vec2;

    #[test]
    fn test_clone_rewires_internal_references() {
        let mut graph = SceneGraph::new();
        let root = graph.create_root("root");
        let a = graph.create_node(root, "a", NodeKind::Generic).unwrap();
        let b = graph.create_node(a, "b", NodeKind::KinematicBlock).unwrap();
        graph
            .set_local_transform(a, Transform2::from_position(Vec2::new(1.0, 2.0)))
            .unwrap();

        let map = graph.deep_clone(&[a]).unwrap();
        assert_eq!(map.len(), 2);
        let a2 = map.get(a).unwrap();
        let b2 = map.get(b).unwrap();

        // Outside parent is shared, inside parent is the clone
        assert_eq!(graph.parent(a2).unwrap(), Some(root));
        assert_eq!(graph.parent(b2).unwrap(), Some(a2));
        assert_eq!(graph.children(a2).unwrap(), &[b2]);
        assert_eq!(graph.children(a).unwrap(), &[b]);
        assert_eq!(graph.get(b2).unwrap().kind, NodeKind::KinematicBlock);
        assert_eq!(graph.world_transform(b2).unwrap().position, Vec2::new(1.0, 2.0));
    }

    #[test]
    fn test_each_node_cloned_once() {
        let mut graph = SceneGraph::new();
        let root = graph.create_root("root");
        let a = graph.create_node(root, "a", NodeKind::Generic).unwrap();
        let b = graph.create_node(a, "b", NodeKind::Generic).unwrap();
        let before = graph.len();

        // b is requested directly and is also a descendant of a
        let map = graph.deep_clone(&[b, a]).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(graph.len(), before + 2);
        let a2 = map.get(a).unwrap();
        assert_eq!(graph.parent(map.get(b).unwrap()).unwrap(), Some(a2));
    }

    #[test]
    fn test_clone_is_independent() {
        let mut graph = SceneGraph::new();
        let root = graph.create_root("root");
        let a = graph.create_node(root, "a", NodeKind::Generic).unwrap();
        let map = graph.deep_clone(&[a]).unwrap();
        let a2 = map.get(a).unwrap();
        graph
            .set_local_transform(a2, Transform2::from_position(Vec2::new(9.0, 0.0)))
            .unwrap();
        assert_eq!(graph.world_transform(a).unwrap().position, Vec2::ZERO);
    }

    #[test]
    fn test_rigid_actor_in_set_is_rejected() {
        let mut graph = SceneGraph::new();
        let root = graph.create_root("root");
        let a = graph.create_node(root, "a", NodeKind::Generic).unwrap();
        let body = graph
            .create_node(a, "body", NodeKind::RigidActor { body: BodyHandle(7) })
            .unwrap();
        let before = graph.len();

        // Reached through its parent
        assert_eq!(graph.deep_clone(&[a]), Err(Error::CloneBoundBody(body)));
        assert_eq!(graph.len(), before);
        assert_eq!(graph.children(a).unwrap(), &[body]);
    }
}
