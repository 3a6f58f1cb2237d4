//! Convex polygon clipping and point containment
//!
//! Clip regions are always convex: they start as the viewport rectangle and
//! are only ever intersected with half-planes, so Sutherland-Hodgman against
//! one edge at a time is enough.

use glam::Vec2;

use super::line::Line;

const INSIDE_EPSILON: f32 = 1e-5;

/// Even-odd crossing test. Points exactly on an edge may go either way.
pub fn point_in_polygon(point: Vec2, polygon: &[Vec2]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (polygon[i], polygon[j]);
        if (pi.y > point.y) != (pj.y > point.y)
            && point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Twice the signed area (positive for counter-clockwise winding)
pub fn signed_area(polygon: &[Vec2]) -> f32 {
    let n = polygon.len();
    if n < 3 {
        return 0.0;
    }
    (0..n)
        .map(|i| polygon[i].perp_dot(polygon[(i + 1) % n]))
        .sum::<f32>()
        / 2.0
}

pub fn area(polygon: &[Vec2]) -> f32 {
    signed_area(polygon).abs()
}

pub fn is_clockwise(polygon: &[Vec2]) -> bool {
    signed_area(polygon) < 0.0
}

/// Whether `point` is inside the half-plane left of `edge` (inclusive)
#[inline(always)]
fn is_inside(point: Vec2, edge: &Line) -> bool {
    edge.side_value(point) >= -INSIDE_EPSILON
}

fn edge_intersection(p1: Vec2, p2: Vec2, edge: &Line) -> Option<Vec2> {
    Line::new(p1, p2).intersect(edge, false).map(|hit| hit.point)
}

/// Keep the part of `subject` left of `edge`
pub fn clip_by_half_plane(subject: &[Vec2], edge: &Line) -> Vec<Vec2> {
    if subject.is_empty() {
        return Vec::new();
    }
    if subject.iter().all(|&p| is_inside(p, edge)) {
        return subject.to_vec();
    }

    let mut output = Vec::with_capacity(subject.len() + 1);
    let mut prev = subject[subject.len() - 1];
    for &current in subject {
        let prev_inside = is_inside(prev, edge);
        let current_inside = is_inside(current, edge);
        match (prev_inside, current_inside) {
            (true, true) => output.push(current),
            (true, false) => output.extend(edge_intersection(prev, current, edge)),
            (false, true) => {
                output.extend(edge_intersection(prev, current, edge));
                output.push(current);
            }
            (false, false) => {}
        }
        prev = current;
    }
    output
}

/// Intersection of `subject` with the convex polygon `clip` (counter-clockwise)
pub fn clip_convex(subject: &[Vec2], clip: &[Vec2]) -> Vec<Vec2> {
    if clip.len() < 3 {
        return subject.to_vec();
    }
    let n = clip.len();
    let mut result = subject.to_vec();
    for i in 0..n {
        if result.is_empty() {
            break;
        }
        result = clip_by_half_plane(&result, &Line::new(clip[i], clip[(i + 1) % n]));
    }
    result
}

/// Returns the polygon wound counter-clockwise
pub fn to_counter_clockwise(mut polygon: Vec<Vec2>) -> Vec<Vec2> {
    if is_clockwise(&polygon) {
        polygon.reverse();
    }
    polygon
}

/// Whether every vertex of `inner` lies inside convex counter-clockwise
/// `outer`, allowing `eps` of slack
pub fn convex_contains(outer: &[Vec2], inner: &[Vec2], eps: f32) -> bool {
    let n = outer.len();
    if n < 3 {
        return inner.is_empty();
    }
    inner.iter().all(|&p| {
        (0..n).all(|i| {
            let edge = Line::new(outer[i], outer[(i + 1) % n]);
            edge.side_value(p) >= -eps * edge.length().max(1.0)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(half: f32) -> Vec<Vec2> {
        vec![
            Vec2::new(-half, -half),
            Vec2::new(half, -half),
            Vec2::new(half, half),
            Vec2::new(-half, half),
        ]
    }

    #[test]
    fn test_point_in_polygon() {
        let sq = square(1.0);
        assert!(point_in_polygon(Vec2::ZERO, &sq));
        assert!(!point_in_polygon(Vec2::new(2.0, 0.0), &sq));
        assert!(!point_in_polygon(Vec2::ZERO, &sq[..2]));
    }

    #[test]
    fn test_area_and_winding() {
        let sq = square(1.0);
        assert!((area(&sq) - 4.0).abs() < 1e-6);
        assert!(!is_clockwise(&sq));
        let mut cw = sq.clone();
        cw.reverse();
        assert!(is_clockwise(&cw));
        assert!(!is_clockwise(&to_counter_clockwise(cw)));
    }

    #[test]
    fn test_clip_by_half_plane_halves_square() {
        // Keep the left of an upward line through the origin: x <= 0
        let edge = Line::new(Vec2::ZERO, Vec2::Y);
        let clipped = clip_by_half_plane(&square(1.0), &edge);
        assert!((area(&clipped) - 2.0).abs() < 1e-5);
        assert!(clipped.iter().all(|p| p.x <= 1e-5));
    }

    #[test]
    fn test_clip_convex_overlap() {
        let a = square(1.0);
        let b: Vec<Vec2> = square(1.0).iter().map(|p| *p + Vec2::new(1.0, 1.0)).collect();
        let clipped = clip_convex(&a, &b);
        assert!((area(&clipped) - 1.0).abs() < 1e-5);
        assert!(convex_contains(&a, &clipped, 1e-4));
        assert!(convex_contains(&b, &clipped, 1e-4));
    }

    #[test]
    fn test_clip_convex_disjoint_is_empty() {
        let a = square(1.0);
        let b: Vec<Vec2> = square(1.0).iter().map(|p| *p + Vec2::new(5.0, 0.0)).collect();
        assert!(area(&clip_convex(&a, &b)) < 1e-6);
    }
}
