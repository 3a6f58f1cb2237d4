//! Line segments in 2D

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::polygon::point_in_polygon;
use super::transform::Transform2;

/// Which side of a directed line something lies on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
    /// Straddles the line (only returned for segments)
    Neither,
}

/// Intersection of two lines
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineHit {
    pub point: Vec2,
    /// Fraction along the first line
    pub t: f32,
    /// Fraction along the second line
    pub u: f32,
}

/// A directed segment from `a` to `b`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub a: Vec2,
    pub b: Vec2,
}

impl Line {
    pub const fn new(a: Vec2, b: Vec2) -> Self {
        Self { a, b }
    }

    #[inline]
    pub fn delta(&self) -> Vec2 {
        self.b - self.a
    }

    pub fn length(&self) -> f32 {
        self.delta().length()
    }

    pub fn center(&self) -> Vec2 {
        (self.a + self.b) / 2.0
    }

    pub fn lerp(&self, t: f32) -> Vec2 {
        self.a.lerp(self.b, t)
    }

    pub fn reversed(&self) -> Line {
        Line::new(self.b, self.a)
    }

    /// Right-hand unit normal of the direction `a -> b`
    pub fn normal(&self) -> Vec2 {
        -self.delta().perp().normalize_or_zero()
    }

    pub fn transformed(&self, transform: &Transform2) -> Line {
        Line::new(
            transform.transform_point(self.a),
            transform.transform_point(self.b),
        )
    }

    pub fn translated(&self, offset: Vec2) -> Line {
        Line::new(self.a + offset, self.b + offset)
    }

    /// Signed area test: positive when `point` is left of `a -> b`
    #[inline]
    pub fn side_value(&self, point: Vec2) -> f32 {
        self.delta().perp_dot(point - self.a)
    }

    pub fn side_of(&self, point: Vec2) -> Side {
        if self.side_value(point) > 0.0 {
            Side::Left
        } else {
            Side::Right
        }
    }

    /// Side of a whole segment, `Neither` when it straddles this line
    pub fn side_of_line(&self, other: &Line) -> Side {
        let s0 = self.side_of(other.a);
        let s1 = self.side_of(other.b);
        if s0 == s1 { s0 } else { Side::Neither }
    }

    /// Intersection of the two lines. With `segment_only` both fractions must
    /// lie in `[0, 1]`. Parallel lines never intersect.
    pub fn intersect(&self, other: &Line, segment_only: bool) -> Option<LineHit> {
        let d0 = self.delta();
        let d1 = other.delta();
        let denom = d0.perp_dot(d1);
        if denom.abs() < 1e-10 {
            return None;
        }
        let offset = other.a - self.a;
        let t = offset.perp_dot(d1) / denom;
        let u = offset.perp_dot(d0) / denom;
        if segment_only && !((0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u)) {
            return None;
        }
        Some(LineHit {
            point: self.lerp(t),
            t,
            u,
        })
    }

    /// First intersection with the edges of a closed polygon
    pub fn intersect_polygon(&self, polygon: &[Vec2]) -> Option<LineHit> {
        let n = polygon.len();
        (0..n).find_map(|i| self.intersect(&Line::new(polygon[i], polygon[(i + 1) % n]), true))
    }

    /// Whether the segment is at least partially inside the polygon
    pub fn is_inside_polygon(&self, polygon: &[Vec2]) -> bool {
        point_in_polygon(self.a, polygon)
            || point_in_polygon(self.b, polygon)
            || self.intersect_polygon(polygon).is_some()
    }

    /// Distance from `point` to the line (or the segment when `segment`)
    pub fn distance_to(&self, point: Vec2, segment: bool) -> f32 {
        let delta = self.delta();
        let len_sq = delta.length_squared();
        if len_sq == 0.0 {
            return (point - self.a).length();
        }
        let mut t = (point - self.a).dot(delta) / len_sq;
        if segment {
            t = t.clamp(0.0, 1.0);
        }
        (point - self.lerp(t)).length()
    }

    /// Fraction along the line of the point nearest to `point`
    pub fn nearest_t(&self, point: Vec2) -> f32 {
        let delta = self.delta();
        let len_sq = delta.length_squared();
        if len_sq == 0.0 {
            0.0
        } else {
            (point - self.a).dot(delta) / len_sq
        }
    }
}
