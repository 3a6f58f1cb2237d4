//! Camera rig

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::math::Transform2;
use crate::scene::NodeId;
use crate::sim::PortalEnterEvent;

/// A 2D viewpoint. Camera space is the world expressed relative to
/// `transform`; the eye sits at its origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera2 {
    pub transform: Transform2,
    /// Visible height in camera units
    pub view_height: f32,
    /// Width over height
    pub aspect: f32,
}

impl Default for Camera2 {
    fn default() -> Self {
        Self {
            transform: Transform2::IDENTITY,
            view_height: 10.0,
            aspect: 16.0 / 9.0,
        }
    }
}

impl Camera2 {
    pub fn new(transform: Transform2, view_height: f32, aspect: f32) -> Self {
        Self {
            transform,
            view_height,
            aspect,
        }
    }

    pub fn half_extents(&self) -> Vec2 {
        Vec2::new(self.view_height * self.aspect, self.view_height) / 2.0
    }

    /// Visible rectangle in camera space, counter-clockwise
    pub fn viewport_polygon(&self) -> Vec<Vec2> {
        let half = self.half_extents();
        vec![
            Vec2::new(-half.x, -half.y),
            Vec2::new(half.x, -half.y),
            Vec2::new(half.x, half.y),
            Vec2::new(-half.x, half.y),
        ]
    }

    /// World position to camera space
    pub fn world_to_camera(&self, point: Vec2) -> Vec2 {
        self.transform.inverse_transform_point(point)
    }

    /// Carry the camera through every portal `target` went through, so it
    /// keeps the same placement relative to the target on the far side.
    /// Returns how many entries were applied.
    pub fn follow_portal_entries(&mut self, target: NodeId, events: &[PortalEnterEvent]) -> usize {
        let mut applied = 0;
        for event in events.iter().filter(|e| e.node == target) {
            let jump = event
                .transform_before
                .inverted()
                .in_frame(&event.transform_after);
            self.transform = self.transform.in_frame(&jump);
            applied += 1;
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::math::polygon;
    use crate::sim::step;
    use crate::sim::tests::{approx, time_portal_scene};

    #[test]
    fn test_viewport_polygon() {
        let camera = Camera2::new(Transform2::IDENTITY, 4.0, 2.0);
        let poly = camera.viewport_polygon();
        assert!((polygon::area(&poly) - 32.0).abs() < 1e-5);
        assert!(!polygon::is_clockwise(&poly));
    }

    #[test]
    fn test_follows_target_through_portal() {
        let (mut scene, mover, _, _) = time_portal_scene();
        // Camera one unit above the point where the mover crosses A
        let mut camera = Camera2::new(Transform2::from_position(Vec2::new(4.0, 1.0)), 10.0, 1.0);
        let report = step(&mut scene, 1.0, &EngineConfig::default()).unwrap();
        assert_eq!(camera.follow_portal_entries(mover, &report.events), 1);

        let event = &report.events[0];
        let offset = camera.transform.position - event.transform_after.position;
        // Same placement relative to the mover on the far side
        assert!(approx(offset, Vec2::new(0.0, 1.0)));
        assert!(approx(camera.world_to_camera(event.transform_after.position), Vec2::new(0.0, -1.0)));
    }

    #[test]
    fn test_ignores_other_nodes() {
        let (mut scene, _, _, _) = time_portal_scene();
        let report = step(&mut scene, 1.0, &EngineConfig::default()).unwrap();
        let mut camera = Camera2::default();
        let other = scene.graph.ids()[0];
        assert_eq!(camera.follow_portal_entries(other, &report.events), 0);
        assert_eq!(camera.transform, Transform2::IDENTITY);
    }
}
