//! Scalar laws sampled along an edge, rebuilt lazily on change.

use serde::{Deserialize, Serialize};
use skein_core::{Result, SkeinError};
use skein_math::Point3;
use skein_nurbs::BSplineCurve;

use crate::interpolate::{interpolate_curve, InterpOptions};
use crate::params::Parametrization;

/// A 1D interpolator of scalar samples placed along an edge's
/// parameter range, queried by real or normalised parameter. The
/// interpolating spline is rebuilt lazily after samples change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueOnEdge {
    range: (f64, f64),
    samples: Vec<(f64, f64)>,
    #[serde(skip)]
    curve: Option<BSplineCurve>,
}

impl ValueOnEdge {
    pub fn new(range: (f64, f64)) -> Self {
        Self {
            range,
            samples: Vec::new(),
            curve: None,
        }
    }

    /// A law holding the same value over the whole range.
    pub fn constant(range: (f64, f64), value: f64) -> Self {
        let mut v = Self::new(range);
        v.add(range.0, value);
        v.add(range.1, value);
        v
    }

    pub fn from_samples(range: (f64, f64), samples: &[(f64, f64)]) -> Self {
        let mut v = Self::new(range);
        for &(t, val) in samples {
            v.add(t, val);
        }
        v
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn range(&self) -> (f64, f64) {
        self.range
    }

    /// Add a sample, replacing any existing sample at the same
    /// parameter. Invalidates the cached interpolator.
    pub fn add(&mut self, t: f64, value: f64) {
        self.curve = None;
        if let Some(s) = self.samples.iter_mut().find(|s| (s.0 - t).abs() < 1e-12) {
            s.1 = value;
            return;
        }
        let pos = self.samples.iter().take_while(|s| s.0 < t).count();
        self.samples.insert(pos, (t, value));
    }

    /// Add a sample at a normalised position of the range.
    pub fn add_normalized(&mut self, s: f64, value: f64) {
        let t = self.range.0 + s * (self.range.1 - self.range.0);
        self.add(t, value);
    }

    /// The law's value at parameter `t`, rebuilding the interpolator if
    /// needed.
    pub fn value_at(&mut self, t: f64) -> Result<f64> {
        if self.curve.is_none() {
            self.rebuild()?;
        }
        match (self.samples.len(), &self.curve) {
            (1, _) => Ok(self.samples[0].1),
            (_, Some(c)) => Ok(c.point_at(t).y),
            _ => Err(SkeinError::Domain("empty value law".into())),
        }
    }

    /// The law's value at a normalised position of the range.
    pub fn value_at_normalized(&mut self, s: f64) -> Result<f64> {
        let t = self.range.0 + s * (self.range.1 - self.range.0);
        self.value_at(t)
    }

    fn rebuild(&mut self) -> Result<()> {
        match self.samples.len() {
            0 => Err(SkeinError::Domain("empty value law".into())),
            1 => Ok(()),
            n => {
                let points: Vec<Point3> = self
                    .samples
                    .iter()
                    .map(|&(t, v)| Point3::new(t, v, 0.0))
                    .collect();
                let params: Vec<f64> = self.samples.iter().map(|s| s.0).collect();
                let opts = InterpOptions {
                    parametrization: Parametrization::Explicit(params),
                    degree: 3.min(n - 1),
                    ..Default::default()
                };
                self.curve = Some(interpolate_curve(&points, &opts)?);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_law() {
        let mut law = ValueOnEdge::from_samples((0.0, 2.0), &[(0.0, 1.0), (2.0, 3.0)]);
        assert!((law.value_at(0.0).unwrap() - 1.0).abs() < 1e-10);
        assert!((law.value_at(2.0).unwrap() - 3.0).abs() < 1e-10);
        assert!((law.value_at(1.0).unwrap() - 2.0).abs() < 1e-9);
        assert!((law.value_at_normalized(0.5).unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_interpolates_samples() {
        let samples = [(0.0, 0.0), (0.5, 1.2), (1.0, 0.4), (2.0, -0.5)];
        let mut law = ValueOnEdge::from_samples((0.0, 2.0), &samples);
        for &(t, v) in &samples {
            assert!(
                (law.value_at(t).unwrap() - v).abs() < 1e-8,
                "law missed sample at {}",
                t
            );
        }
    }

    #[test]
    fn test_lazy_rebuild_after_edit() {
        let mut law = ValueOnEdge::constant((0.0, 1.0), 2.0);
        assert!((law.value_at(0.3).unwrap() - 2.0).abs() < 1e-10);
        law.add(0.5, 4.0);
        assert!((law.value_at(0.5).unwrap() - 4.0).abs() < 1e-8);
        // Replacing an existing sample takes the new value
        law.add(0.5, 1.0);
        assert!((law.value_at(0.5).unwrap() - 1.0).abs() < 1e-8);
    }

    #[test]
    fn test_single_sample_is_constant() {
        let mut law = ValueOnEdge::new((0.0, 1.0));
        law.add(0.5, 7.0);
        assert!((law.value_at(0.1).unwrap() - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_law_errors() {
        let mut law = ValueOnEdge::new((0.0, 1.0));
        assert!(law.value_at(0.5).is_err());
    }
}
