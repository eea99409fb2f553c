//! Rational Bezier curves over the [0, 1] parameter range.

use serde::{Deserialize, Serialize};
use skein_core::{Result, SkeinError};
use skein_math::{DVec4, Point3};

use crate::curve::{bezier_elevate, BSplineCurve};
use crate::knot::KnotVector;

/// A rational Bezier curve of degree `poles.len() - 1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BezierCurve {
    pub poles: Vec<Point3>,
    pub weights: Vec<f64>,
}

impl BezierCurve {
    pub fn new(poles: Vec<Point3>) -> Result<Self> {
        let weights = vec![1.0; poles.len()];
        Self::rational(poles, weights)
    }

    pub fn rational(poles: Vec<Point3>, weights: Vec<f64>) -> Result<Self> {
        if poles.len() < 2 {
            return Err(SkeinError::Domain(
                "a Bezier curve needs at least two poles".into(),
            ));
        }
        if poles.len() != weights.len() {
            return Err(SkeinError::Domain(format!(
                "pole/weight count mismatch: {} vs {}",
                poles.len(),
                weights.len()
            )));
        }
        if weights.iter().any(|&w| w <= 0.0) {
            return Err(SkeinError::Domain(
                "weights must be strictly positive".into(),
            ));
        }
        Ok(Self { poles, weights })
    }

    pub fn degree(&self) -> usize {
        self.poles.len() - 1
    }

    fn homogeneous(&self) -> Vec<DVec4> {
        self.poles
            .iter()
            .zip(&self.weights)
            .map(|(p, &w)| DVec4::new(p.x * w, p.y * w, p.z * w, w))
            .collect()
    }

    /// De Casteljau evaluation.
    pub fn point_at(&self, t: f64) -> Point3 {
        let mut h = self.homogeneous();
        for r in 1..h.len() {
            for i in 0..h.len() - r {
                h[i] = (1.0 - t) * h[i] + t * h[i + 1];
            }
        }
        h[0].truncate() / h[0].w
    }

    /// Raise the degree without changing the geometry.
    pub fn elevate(&mut self, target_degree: usize) {
        if target_degree <= self.degree() {
            return;
        }
        let h = bezier_elevate(&self.homogeneous(), target_degree);
        self.poles = h.iter().map(|v| v.truncate() / v.w).collect();
        self.weights = h.iter().map(|v| v.w).collect();
    }

    /// The same curve as a clamped B-spline over [0, 1].
    pub fn to_bspline(&self) -> BSplineCurve {
        let p = self.degree();
        BSplineCurve {
            degree: p,
            poles: self.poles.clone(),
            weights: self.weights.clone(),
            knots: KnotVector::new(vec![0.0, 1.0], vec![p + 1, p + 1]).unwrap(),
            periodic: false,
        }
    }
}
