//! Global curve interpolation through ordered point samples.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use skein_core::{Result, SkeinError};
use skein_math::{Point3, Vector3};
use skein_nurbs::basis::basis_row;
use skein_nurbs::{periodic_basis_row, BSplineCurve, KnotVector};

use crate::params::{parameters, Parametrization};

/// Tangent constraints attached to the interpolation points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Tangents {
    /// First derivative prescribed at the first and last point.
    Endpoints(Vector3, Vector3),
    /// One optional first derivative per point; None entries are free.
    PerPoint(Vec<Option<Vector3>>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterpOptions {
    pub parametrization: Parametrization,
    pub periodic: bool,
    pub tangents: Option<Tangents>,
    /// Geometric tolerance: seam detection for periodic input.
    pub tolerance: f64,
    pub degree: usize,
}

impl Default for InterpOptions {
    fn default() -> Self {
        Self {
            parametrization: Parametrization::default(),
            periodic: false,
            tangents: None,
            tolerance: 1e-7,
            degree: 3,
        }
    }
}

/// Interpolate a B-spline through `points` at the parameters given by
/// the chosen parametrisation.
pub fn interpolate_curve(points: &[Point3], opts: &InterpOptions) -> Result<BSplineCurve> {
    if opts.periodic {
        interpolate_periodic(points, opts)
    } else {
        interpolate_open(points, opts)
    }
}

fn interpolate_open(points: &[Point3], opts: &InterpOptions) -> Result<BSplineCurve> {
    let n = points.len();
    if n < 2 {
        return Err(SkeinError::InsufficientSamples { got: n, need: 2 });
    }
    let degree = opts.degree.clamp(1, n - 1);
    let params = parameters(points, &opts.parametrization, false)?;
    let tangents = per_point_tangents(opts.tangents.as_ref(), n)?;

    // Each tangent constraint adds one unknown pole; the knot vector
    // comes from window averaging over the parameter list with
    // constrained parameters counted twice.
    let mut aug = Vec::with_capacity(n + 2);
    for (i, &t) in params.iter().enumerate() {
        aug.push(t);
        if tangents[i].is_some() {
            aug.push(t);
        }
    }
    let m = aug.len();
    if m <= degree {
        return Err(SkeinError::InsufficientSamples {
            got: n,
            need: degree + 1,
        });
    }
    let mut flat = vec![params[0]; degree + 1];
    for j in 1..=(m - degree - 1) {
        let window = &aug[j..j + degree];
        flat.push(window.iter().sum::<f64>() / degree as f64);
    }
    flat.extend(std::iter::repeat(*params.last().unwrap()).take(degree + 1));
    let kv = KnotVector::from_flat(&flat, 1e-12)?;
    let flat = kv.flat();

    let mut a = DMatrix::<f64>::zeros(m, m);
    let mut b = DMatrix::<f64>::zeros(m, 3);
    let mut row = 0;
    for (i, &t) in params.iter().enumerate() {
        fill_row(&mut a, row, &basis_row(degree, &flat, m, t, 0));
        fill_rhs(&mut b, row, points[i]);
        row += 1;
        if let Some(d) = tangents[i] {
            fill_row(&mut a, row, &basis_row(degree, &flat, m, t, 1));
            fill_rhs(&mut b, row, d);
            row += 1;
        }
    }
    let poles = solve_poles(a, &b)?;
    BSplineCurve::new(degree, poles, kv)
}

fn interpolate_periodic(points: &[Point3], opts: &InterpOptions) -> Result<BSplineCurve> {
    if opts.tangents.is_some() {
        return Err(SkeinError::Domain(
            "tangent constraints are not supported with periodic interpolation".into(),
        ));
    }
    let mut pts = points.to_vec();
    if pts.len() > 2 && pts[0].distance(*pts.last().unwrap()) < opts.tolerance {
        pts.pop();
    }
    let n = pts.len();
    if n < 3 {
        return Err(SkeinError::InsufficientSamples { got: n, need: 3 });
    }
    let degree = opts.degree.clamp(1, n);
    let params = parameters(&pts, &opts.parametrization, true)?;

    if n <= degree + 1 {
        // Too few points for a well-conditioned direct solve: tile the
        // sequence over two turns, interpolate the doubled problem and
        // keep the first turn's poles.
        let period = params[n] - params[0];
        let mut pts2 = pts.clone();
        pts2.extend_from_slice(&pts);
        let mut params2: Vec<f64> = params[..n].to_vec();
        params2.extend(params[..n].iter().map(|&t| t + period));
        params2.push(params[0] + 2.0 * period);

        let kv2 = KnotVector::new(params2.clone(), vec![1; params2.len()])?;
        let poles2 = solve_periodic(degree, &kv2, &pts2, &params2[..2 * n])?;
        let kv = KnotVector::new(params.clone(), vec![1; params.len()])?;
        return BSplineCurve::periodic(degree, poles2[..n].to_vec(), vec![1.0; n], kv);
    }

    let kv = KnotVector::new(params.clone(), vec![1; params.len()])?;
    let poles = solve_periodic(degree, &kv, &pts, &params[..n])?;
    BSplineCurve::periodic(degree, poles, vec![1.0; n], kv)
}

fn solve_periodic(
    degree: usize,
    kv: &KnotVector,
    points: &[Point3],
    params: &[f64],
) -> Result<Vec<Point3>> {
    let n = points.len();
    let mut a = DMatrix::<f64>::zeros(n, n);
    let mut b = DMatrix::<f64>::zeros(n, 3);
    for (i, &t) in params.iter().enumerate() {
        fill_row(&mut a, i, &periodic_basis_row(degree, kv, t, 0));
        fill_rhs(&mut b, i, points[i]);
    }
    solve_poles(a, &b)
}

fn per_point_tangents(
    tangents: Option<&Tangents>,
    n: usize,
) -> Result<Vec<Option<Vector3>>> {
    match tangents {
        None => Ok(vec![None; n]),
        Some(Tangents::Endpoints(first, last)) => {
            let mut v = vec![None; n];
            v[0] = Some(*first);
            v[n - 1] = Some(*last);
            Ok(v)
        }
        Some(Tangents::PerPoint(list)) => {
            if list.len() != n {
                return Err(SkeinError::Domain(format!(
                    "tangent list length {} does not match {} points",
                    list.len(),
                    n
                )));
            }
            Ok(list.clone())
        }
    }
}

fn fill_row(a: &mut DMatrix<f64>, row: usize, values: &[f64]) {
    for (j, &v) in values.iter().enumerate() {
        a[(row, j)] = v;
    }
}

fn fill_rhs(b: &mut DMatrix<f64>, row: usize, v: Vector3) {
    b[(row, 0)] = v.x;
    b[(row, 1)] = v.y;
    b[(row, 2)] = v.z;
}

fn solve_poles(a: DMatrix<f64>, b: &DMatrix<f64>) -> Result<Vec<Point3>> {
    let sol = a.lu().solve(b).ok_or_else(|| {
        SkeinError::Parametrization("interpolation system is singular".into())
    })?;
    Ok((0..sol.nrows())
        .map(|i| Point3::new(sol[(i, 0)], sol[(i, 1)], sol[(i, 2)]))
        .collect())
}
