//! Vector math for bay geometry and approach control.
//!
//! All positions and directions are world-space `f64` triples backed by
//! [`nalgebra::Vector3`]. Directions are expected to be unit length where
//! noted; helpers normalize only where a degenerate input has a defined
//! fallback.

use nalgebra::{Rotation3, Unit, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Deref, Div, Mul, Neg, Sub};

/// Magnitude below which a cross product is treated as degenerate.
pub const DEGENERATE_EPSILON: f64 = 1e-6;

/// Three-component vector.
///
/// Serialized as `{ x, y, z }` so configuration files stay readable.
/// Component reads go through [`Deref`] to the inner vector (`v.x`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "Components", into = "Components")]
pub struct Vec3(pub Vector3<f64>);

#[derive(Serialize, Deserialize)]
struct Components {
    x: f64,
    y: f64,
    z: f64,
}

impl From<Components> for Vec3 {
    fn from(c: Components) -> Self {
        Vec3::new(c.x, c.y, c.z)
    }
}

impl From<Vec3> for Components {
    fn from(v: Vec3) -> Self {
        Components { x: v.x, y: v.y, z: v.z }
    }
}

impl Vec3 {
    /// The zero vector.
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);
    /// Unit X.
    pub const UNIT_X: Vec3 = Vec3::new(1.0, 0.0, 0.0);
    /// Unit Y.
    pub const UNIT_Y: Vec3 = Vec3::new(0.0, 1.0, 0.0);
    /// Unit Z.
    pub const UNIT_Z: Vec3 = Vec3::new(0.0, 0.0, 1.0);

    /// Build a vector from components.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self(Vector3::new(x, y, z))
    }

    pub fn dot(self, other: Vec3) -> f64 {
        self.0.dot(&other.0)
    }

    /// Cross product (right-handed).
    pub fn cross(self, other: Vec3) -> Vec3 {
        Vec3(self.0.cross(&other.0))
    }

    /// Euclidean length.
    pub fn length(self) -> f64 {
        self.0.norm()
    }

    pub fn distance(self, other: Vec3) -> f64 {
        (self.0 - other.0).norm()
    }

    /// Unit vector in the same direction, or `None` for a zero vector.
    pub fn try_normalize(self) -> Option<Vec3> {
        if !self.is_finite() {
            return None;
        }
        self.0.try_normalize(f64::EPSILON).map(Vec3)
    }

    /// Unit vector in the same direction, zero for a zero vector.
    pub fn normalize_or_zero(self) -> Vec3 {
        self.try_normalize().unwrap_or(Vec3::ZERO)
    }

    /// True when every component is finite.
    pub fn is_finite(self) -> bool {
        self.0.iter().all(|c| c.is_finite())
    }

    /// Rotate by `angle` radians about `axis` (right-hand rule). A zero axis
    /// leaves the vector unchanged.
    pub fn rotate_about(self, axis: Vec3, angle: f64) -> Vec3 {
        match Unit::try_new(axis.0, DEGENERATE_EPSILON) {
            Some(axis) => Vec3(Rotation3::from_axis_angle(&axis, angle) * self.0),
            None => self,
        }
    }
}

impl Default for Vec3 {
    fn default() -> Self {
        Vec3::ZERO
    }
}

impl Deref for Vec3 {
    type Target = Vector3<f64>;

    fn deref(&self) -> &Vector3<f64> {
        &self.0
    }
}

impl From<Vector3<f64>> for Vec3 {
    fn from(v: Vector3<f64>) -> Self {
        Vec3(v)
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3(self.0 + rhs.0)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Vec3) {
        self.0 += rhs.0;
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3(self.0 - rhs.0)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;
    fn mul(self, rhs: f64) -> Vec3 {
        Vec3(self.0 * rhs)
    }
}

impl Div<f64> for Vec3 {
    type Output = Vec3;
    fn div(self, rhs: f64) -> Vec3 {
        Vec3(self.0 / rhs)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;
    fn neg(self) -> Vec3 {
        Vec3(-self.0)
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

/// Angle in radians between two directions.
///
/// nalgebra clamps the cosine before `acos`, so rounding noise on nearly
/// parallel vectors never yields NaN. Zero-length input is treated as fully
/// misaligned (`PI`).
pub fn angle_between(a: Vec3, b: Vec3) -> f64 {
    if a.length() * b.length() <= f64::EPSILON {
        return std::f64::consts::PI;
    }
    a.0.angle(&b.0)
}

/// Unit axis that rotates `from` toward `to`.
///
/// Falls back to `fallback` (normalized) when the cross product is degenerate,
/// which happens for parallel and anti-parallel directions.
pub fn rotation_axis(from: Vec3, to: Vec3, fallback: Vec3) -> Vec3 {
    let axis = from.cross(to);
    if axis.length() < DEGENERATE_EPSILON {
        fallback.normalize_or_zero()
    } else {
        axis.normalize_or_zero()
    }
}

/// Linear interpolation, `t = 0` yields `a`, `t = 1` yields `b`.
pub fn lerp(a: Vec3, b: Vec3, t: f64) -> Vec3 {
    Vec3(a.0.lerp(&b.0, t))
}

/// `segments + 1` evenly spaced points from `start` to `end` inclusive.
pub fn interpolate_path(start: Vec3, end: Vec3, segments: usize) -> Vec<Vec3> {
    if segments == 0 {
        return vec![end];
    }
    (0..=segments)
        .map(|i| lerp(start, end, i as f64 / segments as f64))
        .collect()
}

/// Human-readable distance: metres below one kilometre, kilometres above.
pub fn format_distance(metres: f64) -> String {
    if metres.abs() < 1000.0 {
        format!("{:.0} m", metres)
    } else {
        format!("{:.2} km", metres / 1000.0)
    }
}
