//! Recursive portal views
//!
//! Everything is built in camera space, where the eye sits at the origin.
//! Looking through a portal is modelled by carrying the camera through it:
//! the child's view transform is the parent's with the portal matrix applied,
//! so the scene behind the exit portal lands behind the entry portal on
//! screen. Each child is clipped to the part of its parent's region that is
//! seen through the portal, which keeps regions nested and the tree finite.
//!
//! Clip lines keep the half-plane to their left.

use glam::Vec2;

use crate::camera::Camera2;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::math::{Line, Transform2, area, clip_convex, polygon};
use crate::portal::{self, PortalId};
use crate::scene::Scene;

/// Child clip regions smaller than this are not worth a view
const AREA_EPSILON: f32 = 1e-6;

/// Index of a view in its [`PortalViewTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(usize);

impl ViewId {
    pub const ROOT: ViewId = ViewId(0);

    pub fn index(&self) -> usize {
        self.0
    }
}

/// One viewpoint of the tree
#[derive(Debug, Clone, PartialEq)]
pub struct PortalView {
    /// World transform of the (virtual) camera for this view
    pub view: Transform2,
    /// Screen region this view may draw into, camera space, counter-clockwise
    pub clip_polygon: Vec<Vec2>,
    /// Lines cutting away what this view must not draw, camera space
    pub clip_lines: Vec<Line>,
    /// Edges of the wedge seen through `portal`, from its endpoints outward
    pub fov_lines: Option<[Line; 2]>,
    /// Portal this view looks through, `None` at the root
    pub portal: Option<PortalId>,
    /// That portal's segment in camera space
    pub portal_line: Option<Line>,
    /// Nesting level, 0 at the root
    pub depth: u32,
    pub parent: Option<ViewId>,
    pub children: Vec<ViewId>,
}

/// Views produced for one camera, rebuilt per query
#[derive(Debug, Clone, PartialEq)]
pub struct PortalViewTree {
    views: Vec<PortalView>,
}

impl PortalViewTree {
    pub fn root(&self) -> &PortalView {
        &self.views[0]
    }

    pub fn get(&self, id: ViewId) -> Option<&PortalView> {
        self.views.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ViewId, &PortalView)> {
        self.views.iter().enumerate().map(|(i, v)| (ViewId(i), v))
    }

    /// Number of views, root included
    pub fn count(&self) -> usize {
        self.views.len()
    }

    pub fn max_depth(&self) -> u32 {
        self.views.iter().map(|v| v.depth).max().unwrap_or(0)
    }

    /// Depth-first order for drawing: each view before its children, and
    /// children nearest to `position` (camera space) first.
    pub fn render_order(&self, position: Vec2) -> Vec<ViewId> {
        let mut order = Vec::with_capacity(self.views.len());
        self.collect_order(ViewId::ROOT, position, &mut order);
        order
    }

    fn collect_order(&self, id: ViewId, position: Vec2, order: &mut Vec<ViewId>) {
        order.push(id);
        let mut children = self.views[id.0].children.clone();
        children.sort_by(|a, b| {
            let da = self.portal_distance(*a, position);
            let db = self.portal_distance(*b, position);
            da.total_cmp(&db)
        });
        for child in children {
            self.collect_order(child, position, order);
        }
    }

    fn portal_distance(&self, id: ViewId, position: Vec2) -> f32 {
        self.views[id.0]
            .portal_line
            .map_or(0.0, |line| (line.center() - position).length())
    }

    fn push(&mut self, view: PortalView) -> ViewId {
        let id = ViewId(self.views.len());
        if let Some(parent) = view.parent {
            self.views[parent.0].children.push(id);
        }
        self.views.push(view);
        id
    }
}

/// A usable portal as the builder needs it
#[derive(Debug, Clone)]
struct ViewPortal {
    id: PortalId,
    linked: Option<PortalId>,
    world_line: Line,
    matrix: Transform2,
}

#[derive(Debug, Clone)]
struct Candidate {
    portal: usize,
    line: Line,
    distance: f32,
}

/// Build the view tree seen by `camera`
pub fn build(scene: &Scene, camera: &Camera2, config: &EngineConfig) -> Result<PortalViewTree> {
    let portals = portal::valid_portals(scene)
        .into_iter()
        .map(|id| {
            Ok(ViewPortal {
                id,
                linked: scene.portals.get(id)?.linked(),
                world_line: portal::world_line(scene, id)?,
                matrix: portal::portal_matrix(scene, id)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut tree = PortalViewTree {
        views: vec![PortalView {
            view: camera.transform,
            clip_polygon: polygon::to_counter_clockwise(camera.viewport_polygon()),
            clip_lines: Vec::new(),
            fov_lines: None,
            portal: None,
            portal_line: None,
            depth: 0,
            parent: None,
            children: Vec::new(),
        }],
    };
    build_level(&mut tree, ViewId::ROOT, &portals, config);
    log::trace!("built {} portal views", tree.count());
    Ok(tree)
}

fn build_level(tree: &mut PortalViewTree, id: ViewId, portals: &[ViewPortal], config: &EngineConfig) {
    let current = &tree.views[id.0];
    if current.depth >= config.max_view_depth {
        return;
    }
    let view = current.view;
    let clip = current.clip_polygon.clone();
    let depth = current.depth;
    let entry_link = current
        .portal
        .and_then(|entry| portals.iter().find(|p| p.id == entry))
        .and_then(|p| p.linked);

    // The entry's link lies on the edge of this view's region, so it is
    // always a candidate
    let inverse = view.inverted();
    let mut candidates: Vec<Candidate> = portals
        .iter()
        .enumerate()
        .filter_map(|(i, p)| {
            let line = p.world_line.transformed(&inverse);
            let visible = Some(p.id) == entry_link || line.is_inside_polygon(&clip);
            visible.then(|| Candidate {
                portal: i,
                line,
                distance: line.distance_to(Vec2::ZERO, true),
            })
        })
        .collect();
    candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));

    // The entry's link sits on the portal being looked through, so it never
    // hides anything in this view
    let mut survivors: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let hidden = survivors.iter().any(|near| {
            Some(portals[near.portal].id) != entry_link && occludes(&near.line, &candidate.line)
        });
        if !hidden {
            survivors.push(candidate);
        }
    }

    let reach = clip.iter().map(|p| p.length()).fold(0.0, f32::max) * 2.0 + 1.0;
    for candidate in survivors {
        let portal = &portals[candidate.portal];
        let is_entry_link = Some(portal.id) == entry_link;
        tree.views[id.0].clip_lines.push(clip_line(
            &candidate.line,
            !is_entry_link,
            config.min_entry_distance,
        ));
        if is_entry_link {
            continue;
        }

        let Some((wedge, fov_lines)) = fov_wedge(&candidate.line, reach) else {
            continue;
        };
        let child_clip = clip_convex(&clip, &wedge);
        if child_clip.len() < 3 || area(&child_clip) < AREA_EPSILON {
            continue;
        }
        let child = tree.push(PortalView {
            view: view.in_frame(&portal.matrix),
            clip_polygon: child_clip,
            clip_lines: Vec::new(),
            fov_lines: Some(fov_lines),
            portal: Some(portal.id),
            portal_line: Some(candidate.line),
            depth: depth + 1,
            parent: Some(id),
            children: Vec::new(),
        });
        build_level(tree, child, portals, config);
    }
}

/// Whether `far` is fully hidden behind `near` as seen from the eye: beyond
/// its line and inside the wedge it spans.
fn occludes(near: &Line, far: &Line) -> bool {
    let eye_side = near.side_value(Vec2::ZERO);
    if eye_side == 0.0 {
        return false;
    }
    let beyond = |p: Vec2| near.side_value(p) * eye_side < 0.0;
    let span = near.a.perp_dot(near.b);
    let within = |p: Vec2| near.a.perp_dot(p) * span >= 0.0 && p.perp_dot(near.b) * span >= 0.0;
    beyond(far.a) && beyond(far.b) && within(far.a) && within(far.b)
}

/// Clip line for a portal seen in camera space, turned to keep the eye side
/// (or the far side, for the exit of the portal being looked through) and
/// pushed `margin` into the discarded side.
fn clip_line(line: &Line, keep_eye: bool, margin: f32) -> Line {
    let mut oriented = *line;
    let eye_left = oriented.side_value(Vec2::ZERO) > 0.0;
    if eye_left != keep_eye {
        oriented = oriented.reversed();
    }
    oriented.translated(oriented.normal() * margin)
}

/// Region seen from the eye through `line`, cut off `reach` past it.
/// Counter-clockwise, with the wedge edges. `None` when the segment is seen
/// edge-on or touches the eye.
fn fov_wedge(line: &Line, reach: f32) -> Option<(Vec<Vec2>, [Line; 2])> {
    let (a, b) = (line.a, line.b);
    if a.length() < 1e-6 || b.length() < 1e-6 || a.perp_dot(b).abs() < 1e-9 {
        return None;
    }
    let far_a = a + a.normalize() * reach;
    let far_b = b + b.normalize() * reach;
    let wedge = polygon::to_counter_clockwise(vec![a, b, far_b, far_a]);
    Some((wedge, [Line::new(a, far_a), Line::new(b, far_b)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::convex_contains;
    use crate::scene::{NodeId, NodeKind};
    use crate::sim::tests::time_portal_scene;
    use std::f32::consts::PI;

    fn wide_camera() -> Camera2 {
        Camera2::new(Transform2::IDENTITY, 100.0, 1.0)
    }

    fn host(scene: &mut Scene, transform: Transform2) -> NodeId {
        let root = scene.graph.ids()[0];
        let node = scene.graph.create_node(root, "host", NodeKind::Generic).unwrap();
        scene.graph.set_local_transform(node, transform).unwrap();
        node
    }

    /// Two portals facing each other across the eye
    fn hall_of_mirrors() -> (Scene, PortalId, PortalId) {
        let mut scene = Scene::new();
        scene.graph.create_root("root");
        let a = host(&mut scene, Transform2::from_position_rotation(Vec2::new(2.0, 0.0), PI));
        let b = host(&mut scene, Transform2::from_position(Vec2::new(-2.0, 0.0)));
        let (pa, pb) = scene.attach_linked_pair(a, b).unwrap();
        (scene, pa, pb)
    }

    fn check_nested(tree: &PortalViewTree) {
        for (_, view) in tree.iter() {
            if let Some(parent) = view.parent {
                let outer = &tree.get(parent).unwrap().clip_polygon;
                assert!(convex_contains(outer, &view.clip_polygon, 1e-3));
                assert_eq!(view.depth, tree.get(parent).unwrap().depth + 1);
            }
        }
    }

    #[test]
    fn test_no_portals_is_just_the_root() {
        let mut scene = Scene::new();
        scene.graph.create_root("root");
        let tree = build(&scene, &wide_camera(), &EngineConfig::default()).unwrap();
        assert_eq!(tree.count(), 1);
        assert_eq!(tree.root().clip_polygon, wide_camera().viewport_polygon());
    }

    #[test]
    fn test_hall_of_mirrors_terminates_at_max_depth() {
        let (scene, _, _) = hall_of_mirrors();
        for max_view_depth in [0, 1, 4] {
            let config = EngineConfig {
                max_view_depth,
                ..Default::default()
            };
            let tree = build(&scene, &wide_camera(), &config).unwrap();
            assert_eq!(tree.max_depth(), max_view_depth);
            // One chain of reflections in each direction
            assert_eq!(tree.count(), 1 + 2 * max_view_depth as usize);
            check_nested(&tree);
        }
    }

    #[test]
    fn test_hall_of_mirrors_images_recede() {
        let (scene, pa, _) = hall_of_mirrors();
        let tree = build(&scene, &wide_camera(), &EngineConfig::default()).unwrap();
        let mut x = Vec::new();
        let mut id = ViewId::ROOT;
        loop {
            let view = tree.get(id).unwrap();
            let Some(next) = view
                .children
                .iter()
                .copied()
                .find(|c| tree.get(*c).unwrap().portal == Some(pa))
            else {
                break;
            };
            x.push(tree.get(next).unwrap().portal_line.unwrap().center().x);
            id = next;
        }
        assert_eq!(x.len(), 4);
        for (i, x) in x.iter().enumerate() {
            assert!((x - (2.0 + 4.0 * i as f32)).abs() < 1e-3, "{x}");
        }
    }

    #[test]
    fn test_time_portal_pair_views() {
        let (scene, _, pa, pb) = time_portal_scene();
        let tree = build(&scene, &wide_camera(), &EngineConfig::default()).unwrap();
        let root = tree.root();
        let portals: Vec<_> = root
            .children
            .iter()
            .map(|c| tree.get(*c).unwrap().portal.unwrap())
            .collect();
        assert!(portals.contains(&pa) && portals.contains(&pb));
        assert_eq!(root.clip_lines.len(), 2);
        // Root clip lines keep the eye
        for line in &root.clip_lines {
            assert!(line.side_value(Vec2::ZERO) > 0.0);
        }
        check_nested(&tree);

        // Through A the camera is carried to B's side
        let through_a = root
            .children
            .iter()
            .map(|c| tree.get(*c).unwrap())
            .find(|v| v.portal == Some(pa))
            .unwrap();
        let expected = portal::portal_matrix(&scene, pa).unwrap();
        assert!(through_a.view.almost_eq(&expected, 1e-4, 1e-4));
        assert!(through_a.fov_lines.is_some());
    }

    #[test]
    fn test_entry_link_keeps_far_side() {
        let (scene, pa, _) = hall_of_mirrors();
        let config = EngineConfig {
            max_view_depth: 1,
            ..Default::default()
        };
        let tree = build(&scene, &wide_camera(), &config).unwrap();
        let child = tree
            .iter()
            .map(|(_, v)| v)
            .find(|v| v.portal == Some(pa))
            .unwrap();
        // Leaf: no recursion but the exit's clip line faces away from the eye
        assert!(child.children.is_empty());
        assert!(child.clip_lines.is_empty());

        let config = EngineConfig {
            max_view_depth: 2,
            ..Default::default()
        };
        let tree = build(&scene, &wide_camera(), &config).unwrap();
        let child = tree
            .iter()
            .map(|(_, v)| v)
            .find(|v| v.portal == Some(pa) && v.depth == 1)
            .unwrap();
        assert_eq!(child.clip_lines.len(), 2);
        let far_keeping = child
            .clip_lines
            .iter()
            .filter(|l| l.side_value(Vec2::ZERO) < 0.0)
            .count();
        assert_eq!(far_keeping, 1);
    }

    #[test]
    fn test_far_portal_hidden_behind_near_one() {
        let mut scene = Scene::new();
        scene.graph.create_root("root");
        let near = host(&mut scene, Transform2::from_position(Vec2::new(2.0, 0.0)));
        let far = host(&mut scene, Transform2::from_position(Vec2::new(6.0, 0.0)));
        let aside = host(&mut scene, Transform2::from_position(Vec2::new(6.0, 10.0)));
        let exit = host(&mut scene, Transform2::from_position_rotation(Vec2::new(-20.0, 0.0), PI));
        let exit2 = host(&mut scene, Transform2::from_position_rotation(Vec2::new(-20.0, 20.0), PI));
        let exit3 = host(&mut scene, Transform2::from_position_rotation(Vec2::new(-20.0, -20.0), PI));
        let (p_near, _) = scene.attach_linked_pair(near, exit).unwrap();
        let (p_far, _) = scene.attach_linked_pair(far, exit2).unwrap();
        let (p_aside, _) = scene.attach_linked_pair(aside, exit3).unwrap();

        let config = EngineConfig {
            max_view_depth: 1,
            ..Default::default()
        };
        let tree = build(&scene, &wide_camera(), &config).unwrap();
        let seen: Vec<_> = tree
            .root()
            .children
            .iter()
            .map(|c| tree.get(*c).unwrap().portal.unwrap())
            .collect();
        assert!(seen.contains(&p_near));
        assert!(seen.contains(&p_aside));
        assert!(!seen.contains(&p_far));
    }

    #[test]
    fn test_render_order_parent_first() {
        let (scene, _, _) = hall_of_mirrors();
        let tree = build(&scene, &wide_camera(), &EngineConfig::default()).unwrap();
        let order = tree.render_order(Vec2::new(1.0, 0.0));
        assert_eq!(order.len(), tree.count());
        assert_eq!(order[0], ViewId::ROOT);
        // Nearest child of the root comes first
        let first = tree.get(order[1]).unwrap();
        assert!(first.portal_line.unwrap().center().x > 0.0);
        for (i, id) in order.iter().enumerate() {
            if let Some(parent) = tree.get(*id).unwrap().parent {
                assert!(order[..i].contains(&parent));
            }
        }
    }

    #[test]
    fn test_clip_line_orientation() {
        let line = Line::new(Vec2::new(2.0, 1.0), Vec2::new(2.0, -1.0));
        for line in [line, line.reversed()] {
            let keep = clip_line(&line, true, 0.1);
            assert!(keep.side_value(Vec2::ZERO) > 0.0);
            // Pushed away from the eye
            assert!((keep.a.x - 2.1).abs() < 1e-6);
            let far = clip_line(&line, false, 0.1);
            assert!(far.side_value(Vec2::ZERO) < 0.0);
            assert!((far.a.x - 1.9).abs() < 1e-6);
        }
    }

    #[test]
    fn test_mirrored_pair_mirrors_child_view() {
        let mut scene = Scene::new();
        scene.graph.create_root("root");
        let a = host(
            &mut scene,
            Transform2::new(Vec2::new(2.0, 0.0), PI, 1.0, true),
        );
        let b = host(&mut scene, Transform2::from_position(Vec2::new(-2.0, 0.0)));
        let (pa, _) = scene.attach_linked_pair(a, b).unwrap();
        let tree = build(&scene, &wide_camera(), &EngineConfig::default()).unwrap();
        assert!(!tree.root().view.mirror_x);
        let child = tree
            .iter()
            .map(|(_, v)| v)
            .find(|v| v.portal == Some(pa) && v.depth == 1)
            .unwrap();
        assert!(child.view.mirror_x);
        check_nested(&tree);
    }
}
