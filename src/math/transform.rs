//! 2D transforms and velocities
//!
//! A `Transform2` is position, rotation, uniform size and an X mirror flag.
//! The matrix it represents is `T * R * S` where `S = diag(±size, size)`.
//! Composition is done analytically on the components instead of through a
//! matrix decomposition so that round trips stay exact enough for the portal
//! involution.

use glam::{Affine2, Vec2};
use serde::{Deserialize, Serialize};

use crate::normalize_angle;

/// Position, rotation, uniform size and mirroring in 2D
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform2 {
    pub position: Vec2,
    /// Rotation in radians
    pub rotation: f32,
    /// Uniform scale magnitude (never negative, mirroring is separate)
    pub size: f32,
    /// Reflects the local X axis
    pub mirror_x: bool,
}

impl Default for Transform2 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform2 {
    pub const IDENTITY: Self = Self {
        position: Vec2::ZERO,
        rotation: 0.0,
        size: 1.0,
        mirror_x: false,
    };

    pub fn new(position: Vec2, rotation: f32, size: f32, mirror_x: bool) -> Self {
        Self {
            position,
            rotation,
            size,
            mirror_x,
        }
    }

    pub fn from_position(position: Vec2) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    pub fn from_position_rotation(position: Vec2, rotation: f32) -> Self {
        Self {
            position,
            rotation,
            ..Self::IDENTITY
        }
    }

    /// Signed X scale (negative when mirrored)
    #[inline]
    pub fn scale(&self) -> Vec2 {
        if self.mirror_x {
            Vec2::new(-self.size, self.size)
        } else {
            Vec2::splat(self.size)
        }
    }

    /// Column-major affine matrix for this transform
    pub fn to_affine(&self) -> Affine2 {
        Affine2::from_scale_angle_translation(self.scale(), self.rotation, self.position)
    }

    /// Map a local point into the parent space
    #[inline]
    pub fn transform_point(&self, point: Vec2) -> Vec2 {
        self.position + self.transform_vector(point)
    }

    /// Map a local direction into the parent space (no translation)
    #[inline]
    pub fn transform_vector(&self, v: Vec2) -> Vec2 {
        Vec2::from_angle(self.rotation).rotate(v * self.scale())
    }

    /// Inverse of `transform_point`
    pub fn inverse_transform_point(&self, point: Vec2) -> Vec2 {
        self.inverse_transform_vector(point - self.position)
    }

    /// Inverse of `transform_vector`
    pub fn inverse_transform_vector(&self, v: Vec2) -> Vec2 {
        if self.size == 0.0 {
            return Vec2::ZERO;
        }
        Vec2::from_angle(-self.rotation).rotate(v) / self.scale()
    }

    /// Express `self` (given relative to `frame`) in the space `frame` lives in.
    ///
    /// Equivalent to the matrix product `frame * self`.
    pub fn in_frame(&self, frame: &Transform2) -> Transform2 {
        let rotation = if frame.mirror_x {
            frame.rotation - self.rotation
        } else {
            frame.rotation + self.rotation
        };
        Transform2 {
            position: frame.transform_point(self.position),
            rotation: normalize_angle(rotation),
            size: self.size * frame.size,
            mirror_x: self.mirror_x != frame.mirror_x,
        }
    }

    /// Express `self` relative to `frame` (inverse of `in_frame`)
    pub fn relative_to(&self, frame: &Transform2) -> Transform2 {
        self.in_frame(&frame.inverted())
    }

    /// Matrix inverse
    pub fn inverted(&self) -> Transform2 {
        let size = if self.size == 0.0 { 0.0 } else { 1.0 / self.size };
        let rotation = if self.mirror_x {
            self.rotation
        } else {
            -self.rotation
        };
        let mut inverse = Transform2 {
            position: Vec2::ZERO,
            rotation: normalize_angle(rotation),
            size,
            mirror_x: self.mirror_x,
        };
        inverse.position = -inverse.transform_vector(self.position);
        inverse
    }

    /// Integrate a velocity over `dt`
    pub fn advanced(&self, velocity: &Velocity2, dt: f32) -> Transform2 {
        Transform2 {
            position: self.position + velocity.linear * dt,
            rotation: normalize_angle(self.rotation + velocity.angular * dt),
            size: self.size + velocity.size_rate * dt,
            mirror_x: self.mirror_x,
        }
    }

    /// Unit normal of the local +X axis in parent space
    pub fn normal(&self) -> Vec2 {
        self.transform_vector(Vec2::X).normalize_or_zero()
    }

    /// Component-wise comparison with tolerances for position/size and angle
    pub fn almost_eq(&self, other: &Transform2, eps: f32, angle_eps: f32) -> bool {
        self.mirror_x == other.mirror_x
            && (self.position - other.position).length() <= eps
            && (self.size - other.size).abs() <= eps
            && normalize_angle(self.rotation - other.rotation).abs() <= angle_eps
    }
}

/// Rate of change of a `Transform2`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity2 {
    pub linear: Vec2,
    /// Radians per second
    pub angular: f32,
    /// Size units per second
    pub size_rate: f32,
}

impl Velocity2 {
    pub const ZERO: Self = Self {
        linear: Vec2::ZERO,
        angular: 0.0,
        size_rate: 0.0,
    };

    pub fn linear(linear: Vec2) -> Self {
        Self {
            linear,
            ..Self::ZERO
        }
    }

    pub fn is_zero(&self) -> bool {
        self.linear == Vec2::ZERO && self.angular == 0.0 && self.size_rate == 0.0
    }

    /// Velocity of the material point at world `point` of a body at `origin`
    pub fn point_velocity(&self, origin: Vec2, point: Vec2) -> Vec2 {
        self.linear + (point - origin).perp() * self.angular
    }

    /// Express a local velocity in the space of `frame`, which itself moves
    /// with `frame_velocity`.
    pub fn in_frame(&self, frame: &Transform2, frame_velocity: &Velocity2) -> Velocity2 {
        let angular = if frame.mirror_x {
            -self.angular
        } else {
            self.angular
        };
        Velocity2 {
            linear: frame.transform_vector(self.linear) + frame_velocity.linear,
            angular: angular + frame_velocity.angular,
            size_rate: self.size_rate * frame.size + frame_velocity.size_rate,
        }
    }

    /// Inverse of `in_frame`
    pub fn relative_to(&self, frame: &Transform2, frame_velocity: &Velocity2) -> Velocity2 {
        let angular = self.angular - frame_velocity.angular;
        Velocity2 {
            linear: frame.inverse_transform_vector(self.linear - frame_velocity.linear),
            angular: if frame.mirror_x { -angular } else { angular },
            size_rate: if frame.size == 0.0 {
                0.0
            } else {
                (self.size_rate - frame_velocity.size_rate) / frame.size
            },
        }
    }
}
