//! Bezier bridges between two derivative-carrying endpoints.
//!
//! The bridge matches the endpoint derivatives exactly: for continuity
//! levels `k_a` and `k_b` it is the unique Bezier curve of degree
//! `k_a + k_b + 1` whose derivatives at t = 0 equal the A-side scaled
//! derivatives and at t = 1 the B-side ones.

use serde::{Deserialize, Serialize};
use skein_core::{Result, SkeinError, Warned, Warning};
use skein_math::{Point3, Vector3};
use skein_nurbs::BezierCurve;

use crate::optimize::Optimizer;
use crate::point_on_edge::PointOnEdge;

/// How the endpoint scale factors are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScaleLaw {
    /// Scales of one chord length per side. Cheap default.
    #[default]
    AutoScale,
    /// Minimise max - min curvature over 32 samples.
    MinimizeCurvature,
    /// Drive consecutive pole distances toward uniformity.
    RegularPoles,
    /// Minimise the spread of consecutive pole direction angles.
    AngularVariation,
}

impl ScaleLaw {
    /// Whether this law searches the scale plane iteratively.
    pub fn needs_optimizer(&self) -> bool {
        !matches!(self, ScaleLaw::AutoScale)
    }
}

pub struct BlendOptions<'a> {
    pub law: ScaleLaw,
    /// Flip a scale sign when its tangent points away from the other
    /// endpoint.
    pub auto_orient: bool,
    pub max_iter: usize,
    pub optimizer: Option<&'a dyn Optimizer>,
}

impl Default for BlendOptions<'_> {
    fn default() -> Self {
        Self {
            law: ScaleLaw::AutoScale,
            auto_orient: true,
            max_iter: 2000,
            optimizer: None,
        }
    }
}

fn binomial(n: usize, k: usize) -> f64 {
    let k = k.min(n - k);
    let mut out = 1.0;
    for i in 0..k {
        out = out * (n - i) as f64 / (i + 1) as f64;
    }
    out
}

/// The first `derivs.len() + 1` poles of a degree `degree` Bezier
/// curve starting at `point` with the given start derivatives.
///
/// With forward differences `d_j` of the pole row, the j-th start
/// derivative is `n!/(n-j)! * d_j`; inverting gives the pole cascade
/// `b_i = sum_j C(i,j) d_j`.
fn cascade(point: Point3, derivs: &[Vector3], degree: usize) -> Vec<Point3> {
    let k = derivs.len();
    let mut delta: Vec<Vector3> = Vec::with_capacity(k + 1);
    delta.push(Vector3::ZERO);
    for j in 1..=k {
        let mut fall = 1.0;
        for m in 0..j {
            fall *= (degree - m) as f64;
        }
        delta.push(derivs[j - 1] / fall);
    }
    (0..=k)
        .map(|i| {
            let mut b = point;
            for (j, d) in delta.iter().enumerate().take(i + 1).skip(1) {
                b += binomial(i, j) * *d;
            }
            b
        })
        .collect()
}

/// The Bezier bridge for the endpoint sizes already stored on `a` and
/// `b`. Degree is `a.continuity() + b.continuity() + 1`; derivatives
/// at t = 0 equal `a.scaled_derivs()` and at t = 1 `b.scaled_derivs()`.
pub fn hermite_bezier(a: &PointOnEdge, b: &PointOnEdge) -> Result<BezierCurve> {
    let degree = a.continuity() + b.continuity() + 1;
    let front = cascade(a.point, &a.scaled_derivs(), degree);

    // The B-side rows are the start of the reversed curve, whose j-th
    // derivative is (-1)^j times the forward one.
    let reversed: Vec<Vector3> = b
        .scaled_derivs()
        .iter()
        .enumerate()
        .map(|(j, d)| if j % 2 == 0 { -*d } else { *d })
        .collect();
    let mut back = cascade(b.point, &reversed, degree);
    back.reverse();

    BezierCurve::new(front.into_iter().chain(back).collect())
}

fn orient_sign(tangent: Option<Vector3>, travel: Vector3) -> f64 {
    match tangent {
        Some(d) if d.dot(travel) < 0.0 => -1.0,
        _ => 1.0,
    }
}

fn auto_magnitude(p: &PointOnEdge, chord: f64) -> f64 {
    match p.tangent() {
        Some(d) if d.length() > 1e-12 => chord / d.length(),
        _ => 1.0,
    }
}

fn pole_distances(c: &BezierCurve) -> Vec<f64> {
    c.poles.windows(2).map(|w| w[0].distance(w[1])).collect()
}

fn spread(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for v in values {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if hi >= lo {
        hi - lo
    } else {
        0.0
    }
}

/// Max - min curvature of the bridge sampled at `samples + 1`
/// parameters.
pub fn curvature_spread(c: &BezierCurve, samples: usize) -> f64 {
    let s = c.to_bspline();
    spread((0..=samples).map(|i| s.curvature_at(i as f64 / samples as f64)))
}

fn law_objective(law: ScaleLaw, c: &BezierCurve) -> f64 {
    match law {
        ScaleLaw::AutoScale => 0.0,
        ScaleLaw::MinimizeCurvature => curvature_spread(c, 32),
        ScaleLaw::RegularPoles => spread(pole_distances(c)),
        ScaleLaw::AngularVariation => {
            let segs: Vec<Vector3> = c
                .poles
                .windows(2)
                .map(|w| w[1] - w[0])
                .filter(|v| v.length() > 1e-12)
                .collect();
            spread(
                segs.windows(2)
                    .map(|w| w[0].angle_between(w[1])),
            )
        }
    }
}

/// Pick the endpoint sizes for the requested law. The returned sizes
/// carry the orientation sign; warnings report an optimiser stopping
/// at its iteration cap.
pub fn solve_sizes(
    a: &PointOnEdge,
    b: &PointOnEdge,
    opts: &BlendOptions,
) -> Result<Warned<(f64, f64)>> {
    let travel = b.point - a.point;
    let chord = travel.length();
    let (sign_a, sign_b) = if opts.auto_orient {
        (
            orient_sign(a.tangent(), travel),
            orient_sign(b.tangent(), travel),
        )
    } else {
        (1.0, 1.0)
    };
    let ma = auto_magnitude(a, chord);
    let mb = auto_magnitude(b, chord);

    if !opts.law.needs_optimizer() {
        return Ok(Warned::clean((sign_a * ma, sign_b * mb)));
    }
    let optimizer = opts.optimizer.ok_or_else(|| {
        SkeinError::OptimizerUnavailable(format!(
            "scale law {:?} needs a minimiser; only AutoScale works without one",
            opts.law
        ))
    })?;

    let mut objective = |x: &[f64]| {
        if x[0] <= 0.0 || x[1] <= 0.0 {
            return 1e12;
        }
        let aa = a.clone().with_size(sign_a * x[0]);
        let bb = b.clone().with_size(sign_b * x[1]);
        match hermite_bezier(&aa, &bb) {
            Ok(c) => law_objective(opts.law, &c),
            Err(_) => 1e12,
        }
    };
    let out = optimizer.minimize(&mut objective, &[ma, mb], opts.max_iter);
    let mut result = Warned::clean((sign_a * out.x[0], sign_b * out.x[1]));
    if !out.converged {
        result.push(Warning::MaxIterations {
            cap: opts.max_iter,
        });
    }
    Ok(result)
}

/// The Bezier bridge with sizes chosen by the scale law.
pub fn blend_curve(
    a: &PointOnEdge,
    b: &PointOnEdge,
    opts: &BlendOptions,
) -> Result<Warned<BezierCurve>> {
    let sizes = solve_sizes(a, b, opts)?;
    let (sa, sb) = sizes.value;
    let curve = hermite_bezier(&a.clone().with_size(sa), &b.clone().with_size(sb))?;
    Ok(Warned::with(curve, sizes.warnings))
}
