//! Endpoint constraints for blend constructions.

use serde::{Deserialize, Serialize};
use skein_core::{Result, SkeinError};
use skein_math::{Point3, Vector3};
use skein_nurbs::BSplineCurve;

/// A parametric location on an edge together with its first `k`
/// derivative vectors. The `size` factor rescales the derivatives as
/// a parameter-speed change: derivative `j` scales by `size^j`, so a
/// negative size also reverses the travelling direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointOnEdge {
    pub point: Point3,
    /// Derivatives 1..=k of the underlying curve at the location.
    pub derivs: Vec<Vector3>,
    pub size: f64,
}

impl PointOnEdge {
    pub fn new(point: Point3, derivs: Vec<Vector3>) -> Result<Self> {
        if derivs.len() > 5 {
            return Err(SkeinError::Domain(format!(
                "continuity {} exceeds the supported maximum of 5",
                derivs.len()
            )));
        }
        Ok(Self {
            point,
            derivs,
            size: 1.0,
        })
    }

    /// Sample a curve at `t` with `continuity` derivatives.
    pub fn from_curve(curve: &BSplineCurve, t: f64, continuity: usize) -> Result<Self> {
        if continuity > 5 {
            return Err(SkeinError::Domain(format!(
                "continuity {} exceeds the supported maximum of 5",
                continuity
            )));
        }
        let d = curve.derivatives(t, continuity);
        Ok(Self {
            point: d[0],
            derivs: d[1..].to_vec(),
            size: 1.0,
        })
    }

    /// The continuity level carried by this point.
    pub fn continuity(&self) -> usize {
        self.derivs.len()
    }

    pub fn tangent(&self) -> Option<Vector3> {
        self.derivs.first().copied()
    }

    /// Derivatives with the size scaling applied: `derivs[j] * size^(j+1)`.
    pub fn scaled_derivs(&self) -> Vec<Vector3> {
        self.derivs
            .iter()
            .enumerate()
            .map(|(j, d)| *d * self.size.powi(j as i32 + 1))
            .collect()
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }
}
