use crate::{Plane, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// A right-handed orthonormal frame in 3D space.
///
/// Used as the local coordinate system of a sweep profile or a mounting
/// plane along a spine: `x`/`y` span the plane, `z` is its normal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Frame {
    pub origin: Point3,
    pub x: Vector3,
    pub y: Vector3,
    pub z: Vector3,
}

impl Frame {
    /// Build a frame from an origin and two independent directions.
    ///
    /// `x_hint` is normalised as the X axis; the Y axis is the part of
    /// `y_hint` orthogonal to X; Z completes the right-handed triad.
    /// Returns `None` when the hints are parallel or degenerate.
    pub fn from_xy(origin: Point3, x_hint: Vector3, y_hint: Vector3) -> Option<Self> {
        let x = x_hint.try_normalize()?;
        let y = (y_hint - y_hint.dot(x) * x).try_normalize()?;
        let z = x.cross(y);
        Some(Self { origin, x, y, z })
    }

    /// Build a frame from an origin and a Z axis, with an arbitrary
    /// stable choice of X in the plane.
    pub fn from_z(origin: Point3, z_hint: Vector3) -> Option<Self> {
        let z = z_hint.try_normalize()?;
        let seed = if z.x.abs() < 0.9 { Vector3::X } else { Vector3::Y };
        let x = (seed - seed.dot(z) * z).normalize();
        let y = z.cross(x);
        Some(Self { origin, x, y, z })
    }

    /// Express a global point in this frame's coordinates.
    pub fn to_local(&self, p: Point3) -> Point3 {
        let d = p - self.origin;
        Point3::new(d.dot(self.x), d.dot(self.y), d.dot(self.z))
    }

    /// Map a local point back to global coordinates.
    pub fn to_global(&self, p: Point3) -> Point3 {
        self.origin + p.x * self.x + p.y * self.y + p.z * self.z
    }

    /// Rotate a global vector into frame coordinates (no translation).
    pub fn vector_to_local(&self, v: Vector3) -> Vector3 {
        Vector3::new(v.dot(self.x), v.dot(self.y), v.dot(self.z))
    }

    /// Rotate a local vector back to global coordinates.
    pub fn vector_to_global(&self, v: Vector3) -> Vector3 {
        v.x * self.x + v.y * self.y + v.z * self.z
    }

    /// The plane spanned by the frame's X and Y axes.
    pub fn plane(&self) -> Plane {
        Plane::new(self.origin, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use glam::dvec3;

    #[test]
    fn test_roundtrip() {
        let f = Frame::from_xy(
            dvec3(1.0, 2.0, 3.0),
            dvec3(0.0, 1.0, 1.0),
            dvec3(1.0, 0.0, 0.0),
        )
        .unwrap();
        let p = dvec3(-2.0, 0.5, 4.0);
        let back = f.to_global(f.to_local(p));
        assert!((back - p).length() < 1e-12, "roundtrip failed: {:?}", back);
    }

    #[test]
    fn test_orthonormal() {
        let f = Frame::from_z(dvec3(0.0, 0.0, 0.0), dvec3(1.0, 1.0, 1.0)).unwrap();
        assert_abs_diff_eq!(f.x.dot(f.y), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(f.y.dot(f.z), 0.0, epsilon = 1e-12);
        assert!((f.x.cross(f.y) - f.z).length() < 1e-12);
    }

    #[test]
    fn test_degenerate_hints() {
        assert!(Frame::from_xy(Point3::ZERO, Vector3::X, Vector3::X).is_none());
        assert!(Frame::from_z(Point3::ZERO, Vector3::ZERO).is_none());
    }
}
