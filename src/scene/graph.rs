//! Arena-backed scene tree
//!
//! Parents exclusively own their children; the back reference is just an
//! index. Every operation that could create a cycle does a bounded walk up
//! the parent chain first. World transforms are cached per node and dropped
//! for a whole subtree whenever anything above it changes.

use super::node::{NodeId, NodeKind, SceneNode, WorldState};
use crate::error::{Error, Result};
use crate::math::{Transform2, Velocity2};

/// Where the children of a removed node go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildPolicy {
    /// Reattach them to the removed node's parent
    ToParent,
    /// Reattach them to the given node (which must share the root)
    To(NodeId),
}

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u32,
    node: Option<SceneNode>,
}

/// Tree of scene nodes
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn insert(&mut self, node: SceneNode) -> NodeId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId {
                index: (self.slots.len() - 1) as u32,
                generation: 0,
            }
        }
    }

    /// Create a new root. Roots have no parent and never move.
    pub fn create_root(&mut self, name: impl Into<String>) -> NodeId {
        let mut node = SceneNode::new(name, NodeKind::Generic);
        node.is_root = true;
        self.insert(node)
    }

    /// Create a node under `parent`
    pub fn create_node(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        kind: NodeKind,
    ) -> Result<NodeId> {
        self.get(parent)?;
        let mut node = SceneNode::new(name, kind);
        node.parent = Some(parent);
        let id = self.insert(node);
        self.node_mut(parent)?.children.push(id);
        Ok(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_ok()
    }

    pub fn get(&self, id: NodeId) -> Result<&SceneNode> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or(Error::NodeNotFound(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut SceneNode> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(Error::NodeNotFound(id))
    }

    /// All live nodes in slot order
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.node.as_ref().map(|node| {
                (
                    NodeId {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    node,
                )
            })
        })
    }

    pub fn ids(&self) -> Vec<NodeId> {
        self.iter().map(|(id, _)| id).collect()
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.get(id)?.parent)
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(&self.get(id)?.children)
    }

    /// Walk up to the root. Bounded by the arena size so a corrupted tree
    /// cannot loop forever.
    pub fn root_of(&self, id: NodeId) -> Result<NodeId> {
        let mut current = id;
        for _ in 0..=self.slots.len() {
            match self.get(current)?.parent {
                Some(parent) => current = parent,
                None => return Ok(current),
            }
        }
        Err(Error::Cycle {
            node: id,
            parent: current,
        })
    }

    /// Whether `ancestor` is `node` or lies above it
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> Result<bool> {
        let mut current = Some(node);
        for _ in 0..=self.slots.len() {
            match current {
                Some(id) if id == ancestor => return Ok(true),
                Some(id) => current = self.get(id)?.parent,
                None => return Ok(false),
            }
        }
        Ok(true)
    }

    /// `node` and everything below it, parents before children
    pub fn descendants(&self, node: NodeId) -> Result<Vec<NodeId>> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            let n = self.get(id)?;
            out.push(id);
            stack.extend(n.children.iter().rev().copied());
        }
        Ok(out)
    }

    pub fn find_by_name(&self, root: NodeId, name: &str) -> Result<Option<NodeId>> {
        Ok(self
            .descendants(root)?
            .into_iter()
            .find(|&id| self.get(id).map(|n| n.name == name).unwrap_or(false)))
    }

    /// Reparent `node` under `parent` within the same root
    pub fn set_parent(&mut self, node: NodeId, parent: NodeId) -> Result<()> {
        self.check_reparent(node, parent)?;
        if self.root_of(node)? != self.root_of(parent)? {
            return Err(Error::CrossRoot { node, parent });
        }
        self.attach(node, parent)
    }

    /// Move `node` (and its subtree) under a different root
    pub fn move_to_root(&mut self, node: NodeId, root: NodeId) -> Result<()> {
        if !self.get(root)?.is_root {
            return Err(Error::CrossRoot { node, parent: root });
        }
        self.check_reparent(node, root)?;
        self.attach(node, root)
    }

    fn check_reparent(&self, node: NodeId, parent: NodeId) -> Result<()> {
        if self.get(node)?.is_root {
            return Err(Error::RootImmovable(node));
        }
        self.get(parent)?;
        if self.is_ancestor(node, parent)? {
            return Err(Error::Cycle { node, parent });
        }
        Ok(())
    }

    fn attach(&mut self, node: NodeId, parent: NodeId) -> Result<()> {
        self.unlink_from_parent(node)?;
        self.node_mut(node)?.parent = Some(parent);
        self.node_mut(parent)?.children.push(node);
        self.invalidate(node);
        Ok(())
    }

    fn unlink_from_parent(&mut self, node: NodeId) -> Result<()> {
        if let Some(old) = self.get(node)?.parent {
            self.node_mut(old)?.children.retain(|&c| c != node);
        }
        self.node_mut(node)?.parent = None;
        Ok(())
    }

    /// Detach and free `node`. Its children are reattached per `policy`.
    pub fn remove(&mut self, node: NodeId, policy: ChildPolicy) -> Result<SceneNode> {
        let removed = self.get(node)?;
        if removed.is_root {
            return Err(Error::RootImmovable(node));
        }
        let target = match policy {
            ChildPolicy::ToParent => removed.parent.ok_or(Error::RootImmovable(node))?,
            ChildPolicy::To(target) => {
                if self.is_ancestor(node, target)? {
                    return Err(Error::Cycle {
                        node,
                        parent: target,
                    });
                }
                if self.root_of(node)? != self.root_of(target)? {
                    return Err(Error::CrossRoot {
                        node,
                        parent: target,
                    });
                }
                target
            }
        };

        let children = removed.children.clone();
        for child in children {
            self.attach(child, target)?;
        }
        self.unlink_from_parent(node)?;

        let slot = &mut self.slots[node.index as usize];
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(node.index);
        slot.node.take().ok_or(Error::NodeNotFound(node))
    }

    /// Drop cached world state for `node` and its subtree
    pub(crate) fn invalidate(&self, node: NodeId) {
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if let Ok(n) = self.get(id) {
                n.world.set(None);
                stack.extend(n.children.iter().copied());
            }
        }
    }

    fn world_state(&self, id: NodeId) -> Result<WorldState> {
        let node = self.get(id)?;
        if let Some(cached) = node.world.get() {
            return Ok(cached);
        }
        let state = match node.parent {
            Some(parent) => {
                let parent_state = self.world_state(parent)?;
                WorldState {
                    transform: node.transform.in_frame(&parent_state.transform),
                    velocity: node
                        .velocity
                        .in_frame(&parent_state.transform, &parent_state.velocity),
                }
            }
            None => WorldState {
                transform: node.transform,
                velocity: node.velocity,
            },
        };
        node.world.set(Some(state));
        Ok(state)
    }

    pub fn world_transform(&self, id: NodeId) -> Result<Transform2> {
        Ok(self.world_state(id)?.transform)
    }

    pub fn world_velocity(&self, id: NodeId) -> Result<Velocity2> {
        Ok(self.world_state(id)?.velocity)
    }

    pub fn local_transform(&self, id: NodeId) -> Result<Transform2> {
        Ok(self.get(id)?.transform)
    }

    pub fn local_velocity(&self, id: NodeId) -> Result<Velocity2> {
        Ok(self.get(id)?.velocity)
    }

    pub fn set_local_transform(&mut self, id: NodeId, transform: Transform2) -> Result<()> {
        self.node_mut(id)?.transform = transform;
        self.invalidate(id);
        Ok(())
    }

    pub fn set_local_velocity(&mut self, id: NodeId, velocity: Velocity2) -> Result<()> {
        self.node_mut(id)?.velocity = velocity;
        self.invalidate(id);
        Ok(())
    }

    /// Place `id` so that its world transform becomes `transform`
    pub fn set_world_transform(&mut self, id: NodeId, transform: Transform2) -> Result<()> {
        let local = match self.get(id)?.parent {
            Some(parent) => transform.relative_to(&self.world_transform(parent)?),
            None => transform,
        };
        self.set_local_transform(id, local)
    }

    /// Set `id`'s velocity so that its world velocity becomes `velocity`
    pub fn set_world_velocity(&mut self, id: NodeId, velocity: Velocity2) -> Result<()> {
        let local = match self.get(id)?.parent {
            Some(parent) => {
                velocity.relative_to(&self.world_transform(parent)?, &self.world_velocity(parent)?)
            }
            None => velocity,
        };
        self.set_local_velocity(id, local)
    }

    pub fn set_portalable(&mut self, id: NodeId, portalable: bool) -> Result<()> {
        let node = self.node_mut(id)?;
        if portalable && node.portal_host {
            return Err(Error::PortalHostPortalable(id));
        }
        node.portalable = portalable;
        Ok(())
    }

    pub fn clock(&self, id: NodeId) -> Result<i64> {
        Ok(self.get(id)?.clock)
    }

    pub fn set_clock(&mut self, id: NodeId, clock: i64) -> Result<()> {
        self.node_mut(id)?.clock = clock;
        Ok(())
    }
}
