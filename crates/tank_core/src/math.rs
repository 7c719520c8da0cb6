//! World math utilities for the combat simulation.
//!
//! Positions and directions use `glam` single-precision vectors. +Y is up,
//! +Z is forward, and yaw is measured in degrees about +Y (0° faces +Z,
//! 90° faces +X).

use serde::{Deserialize, Serialize};

pub use glam::{Quat, Vec3};

/// World up axis.
pub const UP: Vec3 = Vec3::Y;

/// Local forward axis.
pub const FORWARD: Vec3 = Vec3::Z;

/// Lengths below this are treated as zero.
pub const EPSILON: f32 = 1e-6;

/// Clamp a value into `[0, 1]`.
#[must_use]
pub fn clamp01(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

/// Drop the vertical component of a vector.
#[must_use]
pub fn flatten(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

/// Horizontal distance between two points.
#[must_use]
pub fn horizontal_distance(a: Vec3, b: Vec3) -> f32 {
    flatten(b - a).length()
}

/// Heading of a direction in degrees, ignoring its vertical component.
///
/// Returns 0 for vectors without a horizontal component.
#[must_use]
pub fn yaw_of(direction: Vec3) -> f32 {
    if direction.x.abs() < EPSILON && direction.z.abs() < EPSILON {
        return 0.0;
    }
    direction.x.atan2(direction.z).to_degrees()
}

/// Rotation about the up axis by `yaw` degrees.
#[must_use]
pub fn yaw_rotation(yaw: f32) -> Quat {
    Quat::from_rotation_y(yaw.to_radians())
}

/// Unit horizontal direction for a heading in degrees.
#[must_use]
pub fn direction_from_yaw(yaw: f32) -> Vec3 {
    let radians = yaw.to_radians();
    Vec3::new(radians.sin(), 0.0, radians.cos())
}

/// Unsigned angle between two vectors in degrees.
///
/// Returns 0 when either vector has zero length.
#[must_use]
pub fn angle_between(a: Vec3, b: Vec3) -> f32 {
    let denominator = (a.length_squared() * b.length_squared()).sqrt();
    if denominator < EPSILON {
        return 0.0;
    }
    (a.dot(b) / denominator).clamp(-1.0, 1.0).acos().to_degrees()
}

/// Shortest signed difference from `from` to `to` in degrees, in `(-180, 180]`.
#[must_use]
pub fn delta_angle(from: f32, to: f32) -> f32 {
    let mut delta = (to - from).rem_euclid(360.0);
    if delta > 180.0 {
        delta -= 360.0;
    }
    delta
}

/// Rotate `current` toward `target` by at most `max_delta` degrees.
#[must_use]
pub fn move_towards_angle(current: f32, target: f32, max_delta: f32) -> f32 {
    let delta = delta_angle(current, target);
    if delta.abs() <= max_delta {
        normalize_angle(current + delta)
    } else {
        normalize_angle(current + max_delta.copysign(delta))
    }
}

/// Interpolate between two headings along the shortest arc.
///
/// `t` is clamped to `[0, 1]`.
#[must_use]
pub fn lerp_angle(current: f32, target: f32, t: f32) -> f32 {
    normalize_angle(current + delta_angle(current, target) * clamp01(t))
}

/// Wrap an angle into `(-180, 180]`.
#[must_use]
pub fn normalize_angle(angle: f32) -> f32 {
    delta_angle(0.0, angle)
}

/// Position and orientation of an object in world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// World position.
    pub position: Vec3,
    /// World orientation.
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    /// Transform at the origin facing +Z.
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    /// Create a transform from a position and rotation.
    #[must_use]
    pub const fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Create a transform at `position` facing the heading `yaw` (degrees).
    #[must_use]
    pub fn from_yaw(position: Vec3, yaw: f32) -> Self {
        Self::new(position, yaw_rotation(yaw))
    }

    /// Forward axis in world space.
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        self.rotation * FORWARD
    }

    /// Heading in degrees.
    #[must_use]
    pub fn yaw(&self) -> f32 {
        yaw_of(self.forward())
    }

    /// Convert a world-space direction into this transform's local frame.
    #[must_use]
    pub fn inverse_transform_direction(&self, direction: Vec3) -> Vec3 {
        self.rotation.inverse() * direction
    }

    /// Convert a local-space point into world space.
    #[must_use]
    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.position + self.rotation * local
    }
}

// ============================================================================
// Ray Intersection
// ============================================================================

/// Distance along a ray to the first intersection with a sphere.
///
/// `direction` must be normalized. Like engine raycasts, a ray starting
/// inside the sphere does not hit it.
#[must_use]
pub fn ray_sphere(
    origin: Vec3,
    direction: Vec3,
    max_distance: f32,
    center: Vec3,
    radius: f32,
) -> Option<f32> {
    let offset = origin - center;
    let c = offset.length_squared() - radius * radius;
    let b = offset.dot(direction);
    if c <= 0.0 || b > 0.0 {
        return None;
    }
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let t = -b - discriminant.sqrt();
    (t <= max_distance).then_some(t)
}

/// Distance and surface normal of the first intersection with an
/// axis-aligned box.
///
/// `direction` must be normalized. A ray starting inside the box does not
/// hit it.
#[must_use]
pub fn ray_aabb(
    origin: Vec3,
    direction: Vec3,
    max_distance: f32,
    min: Vec3,
    max: Vec3,
) -> Option<(f32, Vec3)> {
    if origin.cmpge(min).all() && origin.cmple(max).all() {
        return None;
    }

    let mut t_min = 0.0_f32;
    let mut t_max = max_distance;
    let mut normal = -direction;

    for axis in 0..3 {
        let o = origin[axis];
        let d = direction[axis];
        if d.abs() < EPSILON {
            if o < min[axis] || o > max[axis] {
                return None;
            }
            continue;
        }

        let inverse = 1.0 / d;
        let mut t1 = (min[axis] - o) * inverse;
        let mut t2 = (max[axis] - o) * inverse;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }

        if t1 > t_min {
            t_min = t1;
            normal = Vec3::ZERO;
            normal[axis] = -d.signum();
        }
        t_max = t_max.min(t2);

        if t_min > t_max {
            return None;
        }
    }

    Some((t_min, normal))
}
