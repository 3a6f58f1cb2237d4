//! Render seam
//!
//! Flattens a portal view tree into per-view draw passes: a stencil mask for
//! the view's screen region, the matrix the scene is drawn with and the cut
//! lines the fragment stage discards against. Cut lines are in the world
//! space the pass draws, so fragments can be tested before projection.

pub mod vertex;

pub use vertex::{ClipLineGpu, CutLines, MAX_CUT_LINES, StencilVertex, ViewUniforms};

use glam::{Mat3, Vec2};

use crate::math::Line;
use crate::view::{PortalViewTree, ViewId};

/// Everything needed to draw the scene once for one view
#[derive(Debug, Clone, PartialEq)]
pub struct DrawPass {
    pub view: ViewId,
    /// Stencil value the pass draws at
    pub stencil_ref: u32,
    pub uniforms: ViewUniforms,
    /// Triangle list covering the view's region, clip space
    pub stencil: Vec<StencilVertex>,
}

/// Passes in drawing order. `viewport_size` is the visible width and height
/// in camera units.
pub fn draw_passes(tree: &PortalViewTree, viewport_size: Vec2) -> Vec<DrawPass> {
    let to_clip = Vec2::splat(2.0) / viewport_size.max(Vec2::splat(f32::EPSILON));
    tree.render_order(Vec2::ZERO)
        .into_iter()
        .filter_map(|id| tree.get(id).map(|view| (id, view)))
        .map(|(id, view)| {
            let world_to_camera = Mat3::from(view.view.inverted().to_affine());
            let matrix = Mat3::from_scale(to_clip) * world_to_camera;

            let cut: Vec<Line> = view
                .clip_lines
                .iter()
                .map(|line| {
                    let world = line.transformed(&view.view);
                    if view.view.mirror_x {
                        world.reversed()
                    } else {
                        world
                    }
                })
                .collect();

            DrawPass {
                view: id,
                stencil_ref: view.depth,
                uniforms: ViewUniforms::new(matrix, CutLines::new(&cut)),
                stencil: fan(&view.clip_polygon, to_clip),
            }
        })
        .collect()
}

/// Triangle fan of a convex polygon as a list
fn fan(polygon: &[Vec2], scale: Vec2) -> Vec<StencilVertex> {
    if polygon.len() < 3 {
        return Vec::new();
    }
    let vertex = |p: Vec2| {
        let p = p * scale;
        StencilVertex::new(p.x, p.y)
    };
    let mut vertices = Vec::with_capacity((polygon.len() - 2) * 3);
    for i in 1..polygon.len() - 1 {
        vertices.push(vertex(polygon[0]));
        vertices.push(vertex(polygon[i]));
        vertices.push(vertex(polygon[i + 1]));
    }
    vertices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera2;
    use crate::config::EngineConfig;
    use crate::math::Transform2;
    use crate::scene::{NodeKind, Scene};
    use crate::view;
    use std::f32::consts::PI;

    fn mirrored_hall() -> Scene {
        let mut scene = Scene::new();
        let root = scene.graph.create_root("root");
        let a = scene.graph.create_node(root, "a", NodeKind::Generic).unwrap();
        let b = scene.graph.create_node(root, "b", NodeKind::Generic).unwrap();
        scene
            .graph
            .set_local_transform(a, Transform2::new(Vec2::new(2.0, 0.0), PI, 1.0, true))
            .unwrap();
        scene
            .graph
            .set_local_transform(b, Transform2::from_position(Vec2::new(-2.0, 0.0)))
            .unwrap();
        scene.attach_linked_pair(a, b).unwrap();
        scene
    }

    #[test]
    fn test_root_pass() {
        let mut scene = Scene::new();
        scene.graph.create_root("root");
        let camera = Camera2::new(Transform2::from_position(Vec2::new(3.0, 0.0)), 4.0, 2.0);
        let tree = view::build(&scene, &camera, &EngineConfig::default()).unwrap();
        let passes = draw_passes(&tree, camera.half_extents() * 2.0);
        assert_eq!(passes.len(), 1);

        let pass = &passes[0];
        assert_eq!(pass.view, ViewId::ROOT);
        assert_eq!(pass.stencil_ref, 0);
        assert_eq!(pass.stencil.len(), 6);
        // The viewport fills clip space
        for v in &pass.stencil {
            assert!((v.position[0].abs() - 1.0).abs() < 1e-5);
            assert!((v.position[1].abs() - 1.0).abs() < 1e-5);
        }
        let m = pass.uniforms.view_matrix();
        let corner = m.transform_point2(Vec2::new(7.0, 2.0));
        assert!((corner - Vec2::new(1.0, 1.0)).length() < 1e-5);
        assert_eq!(pass.uniforms.cut.count, 0);
    }

    #[test]
    fn test_passes_follow_render_order() {
        let scene = mirrored_hall();
        let camera = Camera2::new(Transform2::IDENTITY, 100.0, 1.0);
        let tree = view::build(&scene, &camera, &EngineConfig::default()).unwrap();
        let passes = draw_passes(&tree, Vec2::splat(100.0));
        assert_eq!(passes.len(), tree.count());
        let order = tree.render_order(Vec2::ZERO);
        assert_eq!(passes.iter().map(|p| p.view).collect::<Vec<_>>(), order);
        assert_eq!(passes[0].uniforms.cut.count as usize, tree.root().clip_lines.len());
    }

    #[test]
    fn test_cut_lines_keep_world_side() {
        let scene = mirrored_hall();
        let camera = Camera2::new(Transform2::IDENTITY, 100.0, 1.0);
        let tree = view::build(&scene, &camera, &EngineConfig::default()).unwrap();
        let passes = draw_passes(&tree, Vec2::splat(100.0));
        for pass in &passes {
            let view = tree.get(pass.view).unwrap();
            // The eye's world position stays on the same side of every cut
            let eye_world = view.view.transform_point(Vec2::ZERO);
            for (camera_line, world_line) in view.clip_lines.iter().zip(pass.uniforms.cut.iter()) {
                let camera_side = camera_line.side_value(Vec2::ZERO) > 0.0;
                let world_side = world_line.side_value(eye_world) > 0.0;
                assert_eq!(camera_side, world_side);
            }
        }
        assert!(tree.iter().any(|(_, v)| v.view.mirror_x));
    }
}
