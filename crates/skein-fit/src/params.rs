//! Parameter sequences for interpolation and approximation.

use serde::{Deserialize, Serialize};
use skein_core::{Result, SkeinError};
use skein_math::Point3;

/// How sample parameters are assigned to a point sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Parametrization {
    Uniform,
    ChordLength,
    Centripetal,
    /// Caller-supplied parameters, validated for count and monotonicity.
    Explicit(Vec<f64>),
}

impl Default for Parametrization {
    fn default() -> Self {
        Parametrization::ChordLength
    }
}

/// Parameter sequence for `points`, normalised to [0, 1].
///
/// For a periodic sequence the closing chord back to the first point is
/// included and the result has `points.len() + 1` entries.
pub fn parameters(
    points: &[Point3],
    parametrization: &Parametrization,
    periodic: bool,
) -> Result<Vec<f64>> {
    let n = points.len();
    if n < 2 {
        return Err(SkeinError::InsufficientSamples { got: n, need: 2 });
    }
    let count = if periodic { n + 1 } else { n };
    match parametrization {
        Parametrization::Uniform => Ok((0..count)
            .map(|i| i as f64 / (count - 1) as f64)
            .collect()),
        Parametrization::ChordLength => chordal(points, periodic, 1.0),
        Parametrization::Centripetal => chordal(points, periodic, 0.5),
        Parametrization::Explicit(params) => {
            validate_explicit(params, count)?;
            Ok(params.clone())
        }
    }
}

fn chordal(points: &[Point3], periodic: bool, exponent: f64) -> Result<Vec<f64>> {
    let mut params = vec![0.0];
    for w in points.windows(2) {
        let d = w[0].distance(w[1]).powf(exponent);
        if d == 0.0 {
            return Err(SkeinError::Parametrization(
                "coincident consecutive points give a zero chord".into(),
            ));
        }
        params.push(params.last().unwrap() + d);
    }
    if periodic {
        let d = points.last().unwrap().distance(points[0]).powf(exponent);
        if d == 0.0 {
            return Err(SkeinError::Parametrization(
                "closing chord is zero; drop the duplicate seam point".into(),
            ));
        }
        params.push(params.last().unwrap() + d);
    }
    let total = *params.last().unwrap();
    for p in &mut params {
        *p /= total;
    }
    Ok(params)
}

/// Explicit parameters must be strictly increasing and match the
/// expected count.
pub fn validate_explicit(params: &[f64], expected: usize) -> Result<()> {
    if params.len() != expected {
        return Err(SkeinError::Parametrization(format!(
            "expected {} parameters, got {}",
            expected,
            params.len()
        )));
    }
    if params.windows(2).any(|w| w[1] <= w[0]) {
        return Err(SkeinError::Parametrization(
            "parameters must be strictly increasing".into(),
        ));
    }
    Ok(())
}
