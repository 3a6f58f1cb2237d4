//! Error types
//!
//! Everything here is an invariant violation: the call is rejected and the
//! scene is left as it was. None of these are worth retrying.

use thiserror::Error;

use crate::portal::PortalId;
use crate::scene::NodeId;

/// Rejected scene, portal or step operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("node {0} does not exist")]
    NodeNotFound(NodeId),
    #[error("portal {0} does not exist")]
    PortalNotFound(PortalId),
    #[error("parenting {node} under {parent} would create a cycle")]
    Cycle { node: NodeId, parent: NodeId },
    #[error("node {node} and {parent} belong to different roots")]
    CrossRoot { node: NodeId, parent: NodeId },
    #[error("root node {0} cannot be moved or removed")]
    RootImmovable(NodeId),
    #[error("portal {0} is already linked")]
    AlreadyLinked(PortalId),
    #[error("portal {0} is not linked")]
    NotLinked(PortalId),
    #[error("portal {0} cannot be linked to itself")]
    SelfLink(PortalId),
    #[error("portal {0} has a zero-length segment")]
    DegeneratePortal(PortalId),
    #[error("node {0} hosts a portal and cannot travel through portals")]
    PortalHostPortalable(NodeId),
    #[error("node {0} is a rigid body and cannot change size during a step")]
    ScaleChangeMidStep(NodeId),
    #[error("node {0} is bound to a physics body and cannot be cloned")]
    CloneBoundBody(NodeId),
}

pub type Result<T> = std::result::Result<T, Error>;
