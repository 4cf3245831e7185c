//! Primitive value types shared by every entity and wire message.
//!
//! Components are `f64` so that a record survives a JSON round trip
//! bit-for-bit.

use serde::{Deserialize, Serialize};

/// 3D vector - positions, orientations, gravity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    /// X component
    pub x: f64,
    /// Y component
    pub y: f64,
    /// Z component
    pub z: f64,
}

impl Vector3 {
    /// Creates a new vector
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Zero vector
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Converts to array
    #[must_use]
    pub const fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Creates from array
    #[must_use]
    pub const fn from_array(arr: [f64; 3]) -> Self {
        Self::new(arr[0], arr[1], arr[2])
    }

    /// True when every component is a finite number.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Distance squared (avoids sqrt)
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }
}

/// RGB color with components nominally in `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Color3 {
    /// Red
    pub r: f64,
    /// Green
    pub g: f64,
    /// Blue
    pub b: f64,
}

impl Color3 {
    /// Creates a new color
    #[must_use]
    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// Black
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0);

    /// True when every channel lies in `[0, 1]`.
    #[must_use]
    pub fn is_normalized(self) -> bool {
        [self.r, self.g, self.b]
            .iter()
            .all(|c| (0.0..=1.0).contains(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector3_wire_shape() {
        let v = Vector3::new(1.0, 2.5, -3.0);
        let json = serde_json::to_value(v).unwrap();
        assert_eq!(json, serde_json::json!({"x": 1.0, "y": 2.5, "z": -3.0}));

        let back: Vector3 = serde_json::from_value(json).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn test_vector3_distance() {
        let a = Vector3::new(1.0, 2.0, 3.0);
        let b = Vector3::from_array([4.0, 6.0, 3.0]);
        assert_eq!(a.distance_squared(b), 25.0);
        assert!(!Vector3::new(f64::NAN, 0.0, 0.0).is_finite());
    }

    #[test]
    fn test_color3_normalized() {
        assert!(Color3::new(0.2, 1.0, 0.0).is_normalized());
        assert!(!Color3::new(1.2, 0.0, 0.0).is_normalized());
    }
}
