//! Continuous intersection of a moving point with a moving segment
//!
//! Both segment endpoints and the point move linearly over the interval
//! `[0, 1]`. The point is on the segment's line when
//! `cross(b(t) - a(t), p(t) - a(t)) == 0`, which is quadratic in `t`. Each
//! root is then accepted if the point lies between the endpoints at that time.
//! Work is done in `f64` since the roots feed back into the remaining step.

use glam::Vec2;

use super::line::Line;

const COEFF_EPSILON: f64 = 1e-12;

/// A crossing found by a sweep test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sweep {
    /// Fraction of the interval at which the crossing happens
    pub time: f64,
    /// Fraction along the segment (from `a` to `b`) where it is crossed
    pub across: f64,
}

/// All crossings of `point` (start to end) against a segment moving from
/// `line_start` to `line_end`, sorted by time.
///
/// Degenerate input (zero-length segment, or motion that keeps the point on
/// the line for the whole interval) reports no crossing.
pub fn moving_point_line(point: &Line, line_start: &Line, line_end: &Line) -> Vec<Sweep> {
    let p0 = point.a.as_dvec2();
    let dp = point.b.as_dvec2() - p0;
    let a0 = line_start.a.as_dvec2();
    let da = line_end.a.as_dvec2() - a0;
    let e0 = line_start.b.as_dvec2() - a0;
    let de = (line_end.b.as_dvec2() - line_end.a.as_dvec2()) - e0;

    // q(t) = p(t) - a(t), e(t) = b(t) - a(t)
    let q0 = p0 - a0;
    let dq = dp - da;

    let c2 = de.perp_dot(dq);
    let c1 = e0.perp_dot(dq) + de.perp_dot(q0);
    let c0 = e0.perp_dot(q0);

    let mut hits: Vec<Sweep> = solve_quadratic(c2, c1, c0)
        .into_iter()
        .filter(|t| (0.0..=1.0).contains(t))
        .filter_map(|t| {
            let e = e0 + de * t;
            let len_sq = e.length_squared();
            if len_sq < COEFF_EPSILON {
                return None;
            }
            let q = q0 + dq * t;
            let across = q.dot(e) / len_sq;
            (0.0..=1.0).contains(&across).then_some(Sweep { time: t, across })
        })
        .collect();
    hits.sort_by(|a, b| a.time.total_cmp(&b.time));
    hits
}

/// Earliest crossing, see [`moving_point_line`]
pub fn first_crossing(point: &Line, line_start: &Line, line_end: &Line) -> Option<Sweep> {
    moving_point_line(point, line_start, line_end).into_iter().next()
}

/// Real roots of `a t^2 + b t + c`, falling back to the linear case
fn solve_quadratic(a: f64, b: f64, c: f64) -> Vec<f64> {
    let scale = a.abs().max(b.abs()).max(c.abs());
    if scale < COEFF_EPSILON {
        return Vec::new();
    }
    let (a, b, c) = (a / scale, b / scale, c / scale);
    if a.abs() < COEFF_EPSILON {
        if b.abs() < COEFF_EPSILON {
            return Vec::new();
        }
        return vec![-c / b];
    }
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return Vec::new();
    }
    // Numerically stable form, avoids cancellation when b^2 >> 4ac
    let sqrt = disc.sqrt();
    let q = -0.5 * (b + b.signum() * sqrt);
    if q == 0.0 {
        return vec![0.0];
    }
    let r0 = q / a;
    let r1 = c / q;
    if (r0 - r1).abs() < COEFF_EPSILON {
        vec![r0]
    } else {
        vec![r0, r1]
    }
}

/// Point reached at `time` along a straight sweep
pub fn point_at(point: &Line, time: f64) -> Vec2 {
    let p0 = point.a.as_dvec2();
    let p1 = point.b.as_dvec2();
    (p0 + (p1 - p0) * time).as_vec2()
}
