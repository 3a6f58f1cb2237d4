//! Scene node storage types

use std::cell::Cell;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::math::{Transform2, Velocity2};
use crate::physics::BodyHandle;

/// Stable handle into a [`SceneGraph`](super::SceneGraph).
///
/// The generation detects handles that outlive the node they pointed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl NodeId {
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// What a node stands for. Closed set, dispatch is a `match`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NodeKind {
    /// Plain positioned node
    #[default]
    Generic,
    /// Driven by a rigid body in the external physics backend
    RigidActor { body: BodyHandle },
    /// Moved only by its own velocity, never by physics
    KinematicBlock,
    /// A viewpoint, usually following some other node
    Camera,
}

/// Cached world placement
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct WorldState {
    pub transform: Transform2,
    pub velocity: Velocity2,
}

/// A positioned node in the scene tree
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub kind: NodeKind,
    /// Whether this node teleports when it crosses a portal
    pub(crate) portalable: bool,
    /// Whether a portal is attached to this node
    pub(crate) portal_host: bool,
    pub(crate) transform: Transform2,
    pub(crate) velocity: Velocity2,
    /// Local clock in ticks, shifted by time portals
    pub(crate) clock: i64,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) is_root: bool,
    pub(crate) world: Cell<Option<WorldState>>,
}

impl SceneNode {
    pub(crate) fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            portalable: false,
            portal_host: false,
            transform: Transform2::IDENTITY,
            velocity: Velocity2::ZERO,
            clock: 0,
            parent: None,
            children: Vec::new(),
            is_root: false,
            world: Cell::new(None),
        }
    }

    /// Copy of this node with no cached state, same references
    pub(crate) fn shallow_clone(&self) -> Self {
        let clone = self.clone();
        clone.world.set(None);
        clone
    }

    pub fn is_portalable(&self) -> bool {
        self.portalable
    }

    pub fn is_portal_host(&self) -> bool {
        self.portal_host
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn transform(&self) -> Transform2 {
        self.transform
    }

    pub fn velocity(&self) -> Velocity2 {
        self.velocity
    }

    pub fn clock(&self) -> i64 {
        self.clock
    }

    /// Whether the node moves on its own during a step
    pub fn is_moving(&self) -> bool {
        !self.velocity.is_zero()
    }
}
