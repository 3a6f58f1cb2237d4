//! Geometry kernel
//!
//! Transforms, segments, convex clipping and continuous sweeps. Everything
//! here is plain data and pure functions.

pub mod line;
pub mod polygon;
pub mod sweep;
pub mod transform;

pub use line::{Line, LineHit, Side};
pub use polygon::{area, clip_by_half_plane, clip_convex, convex_contains, point_in_polygon};
pub use sweep::{Sweep, first_crossing, moving_point_line};
pub use transform::{Transform2, Velocity2};
