//! Portal Sim - portal-aware 2D scene graph and views
//!
//! Core modules:
//! - `scene`: Node hierarchy with cached world state and deep cloning
//! - `portal`: Linked portal pairs and the transforms between them
//! - `sim`: Continuous stepping that carries nodes through portals
//! - `view`: Recursive views seen through portals
//! - `renderer`: GPU-ready passes built from a view tree
//! - `physics`: Seam to an external rigid-body backend
//! - `config`: Tunable engine settings

pub mod camera;
pub mod config;
pub mod error;
pub mod math;
pub mod physics;
pub mod portal;
pub mod renderer;
pub mod scene;
pub mod sim;
pub mod view;

pub use camera::Camera2;
pub use config::{EngineConfig, TieBreak};
pub use error::{Error, Result};
pub use math::{Line, Transform2, Velocity2};
pub use portal::{Portal, PortalId, PortalSet};
pub use scene::{NodeId, NodeKind, Scene, SceneGraph};
pub use sim::{PortalEnterEvent, StepReport};
pub use view::{PortalView, PortalViewTree, ViewId};

/// Engine constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Maximum portal crossings resolved in one step
    pub const MAX_SUB_STEPS: u32 = 64;
    /// Iterations of a bulk step
    pub const BULK_ITERATIONS: u32 = 4;

    /// Clip lines and separation keep this far from a portal surface
    pub const MIN_ENTRY_DISTANCE: f32 = 0.001;
    /// Portal views nest at most this deep
    pub const MAX_VIEW_DEPTH: u32 = 4;
}

/// Normalized angle to [-π, π)
#[inline]
pub fn normalize_angle(mut angle: f32) -> f32 {
    use std::f32::consts::PI;
    while angle >= PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_normalize_angle() {
        assert!((normalize_angle(3.0 * PI) + PI).abs() < 1e-5);
        assert!((normalize_angle(-PI / 2.0) + PI / 2.0).abs() < 1e-6);
        assert!(normalize_angle(PI) < PI);
    }
}
