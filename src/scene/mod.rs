//! Scene tree and the world that owns it

mod clone;
mod graph;
mod node;

use std::collections::BTreeMap;

pub use clone::CloneMap;
pub use graph::{ChildPolicy, SceneGraph};
pub use node::{NodeId, NodeKind, SceneNode};

use crate::error::Result;
use crate::portal::{PortalId, PortalSet};

/// The whole mutable world: nodes, portals and the global clock
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub graph: SceneGraph,
    pub portals: PortalSet,
    /// Ticks elapsed since the scene was created
    pub time_ticks: i64,
}

/// Result of [`Scene::deep_clone`]
#[derive(Debug, Clone, Default)]
pub struct SceneClone {
    pub nodes: CloneMap,
    pub portals: BTreeMap<PortalId, PortalId>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach_portal(&mut self, host: NodeId) -> Result<PortalId> {
        self.portals.attach(&mut self.graph, host)
    }

    /// Attach a portal to each host and link them
    pub fn attach_linked_pair(&mut self, a: NodeId, b: NodeId) -> Result<(PortalId, PortalId)> {
        let pa = self.attach_portal(a)?;
        let pb = self.attach_portal(b)?;
        self.portals.link(pa, pb)?;
        Ok((pa, pb))
    }

    /// Remove a node along with any portals it hosts
    pub fn remove_node(&mut self, node: NodeId, policy: ChildPolicy) -> Result<SceneNode> {
        self.graph.get(node)?;
        for portal in self.portals.hosted_by(node) {
            self.portals.detach(&mut self.graph, portal)?;
        }
        self.graph.remove(node, policy)
    }

    /// Nodes that teleport when crossing a portal
    pub fn portalables(&self) -> Vec<NodeId> {
        self.graph
            .iter()
            .filter(|(_, n)| n.portalable)
            .map(|(id, _)| id)
            .collect()
    }

    /// Nodes with a non-zero local velocity
    pub fn moving_nodes(&self) -> Vec<NodeId> {
        self.graph
            .iter()
            .filter(|(_, n)| n.is_moving())
            .map(|(id, _)| id)
            .collect()
    }

    /// Deep clone nodes and the portals they host.
    ///
    /// A link survives only when both of its portals were cloned; the clones
    /// are then linked to each other. Otherwise the cloned portal starts
    /// unlinked.
    pub fn deep_clone(&mut self, nodes: &[NodeId]) -> Result<SceneClone> {
        let node_map = self.graph.deep_clone(nodes)?;

        let mut portal_map = BTreeMap::new();
        for (id, portal) in self.portals.iter().map(|(id, p)| (id, p.clone())).collect::<Vec<_>>() {
            if let Some(host) = node_map.get(portal.host()) {
                let clone = self.portals.attach(&mut self.graph, host)?;
                portal_map.insert(id, (clone, portal));
            }
        }

        for (clone, portal) in portal_map.values() {
            if let Some(partner) = portal.linked().and_then(|l| portal_map.get(&l)) {
                if self.portals.get(*clone)?.linked().is_none() {
                    self.portals.link(*clone, partner.0)?;
                }
            }
            // After linking, so the partner receives the reverse offset
            self.portals.set_time_offset(*clone, portal.time_offset())?;
        }

        Ok(SceneClone {
            nodes: node_map,
            portals: portal_map.into_iter().map(|(k, (v, _))| (k, v)).collect(),
        })
    }
}
