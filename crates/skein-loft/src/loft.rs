//! Skinning a compatible curve family into a surface.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use skein_core::{Result, SkeinError, Tolerance};
use skein_fit::params::{validate_explicit, Parametrization};
use skein_math::{DVec4, Point3};
use skein_nurbs::basis::basis_row;
use skein_nurbs::{periodic_basis_row, BSplineCurve, BSplineSurface, KnotVector};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoftOptions {
    /// Transverse parametrisation. The default, averaged chord length,
    /// lets every pole column vote on the parameter of each section.
    pub parametrization: Option<Parametrization>,
    /// Close the loft across the last section back to the first.
    pub periodic: bool,
    /// Transverse degree (limited by the section count).
    pub degree: usize,
    pub tol: Tolerance,
}

impl Default for LoftOptions {
    fn default() -> Self {
        Self {
            parametrization: None,
            periodic: false,
            degree: 3,
            tol: Tolerance::default(),
        }
    }
}

/// Interpolate a family of compatible curves into a surface. U runs
/// along the sections, V across them; the V-iso at each section
/// parameter reproduces that section.
pub fn loft(curves: &[BSplineCurve], opts: &LoftOptions) -> Result<BSplineSurface> {
    let n = curves.len();
    if n < 2 {
        return Err(SkeinError::Domain("loft needs at least two curves".into()));
    }
    let first = &curves[0];
    for c in &curves[1..] {
        if c.degree != first.degree
            || c.nb_poles() != first.nb_poles()
            || c.periodic != first.periodic
            || c.knots.mults != first.knots.mults
            || c.knots
                .knots
                .iter()
                .zip(&first.knots.knots)
                .any(|(a, b)| (a - b).abs() > opts.tol.par)
        {
            return Err(SkeinError::Compatibility(
                "loft sections are not compatible; run compatibilize first".into(),
            ));
        }
    }

    let ncp_u = first.nb_poles();
    let params = transverse_params(curves, opts)?;
    let v_degree = opts.degree.clamp(1, n - 1);

    // Shared transverse collocation matrix; every pole column reuses it
    let (v_knots, a) = if opts.periodic {
        let kv = KnotVector::new(params.clone(), vec![1; params.len()])?;
        let mut a = DMatrix::<f64>::zeros(n, n);
        for (i, &t) in params[..n].iter().enumerate() {
            for (j, &val) in periodic_basis_row(v_degree, &kv, t, 0).iter().enumerate() {
                a[(i, j)] = val;
            }
        }
        (kv, a)
    } else {
        let mut flat = vec![params[0]; v_degree + 1];
        for j in 1..=(n - v_degree - 1) {
            let window = &params[j..j + v_degree];
            flat.push(window.iter().sum::<f64>() / v_degree as f64);
        }
        flat.extend(std::iter::repeat(*params.last().unwrap()).take(v_degree + 1));
        let kv = KnotVector::from_flat(&flat, 1e-12)?;
        let flat = kv.flat();
        let mut a = DMatrix::<f64>::zeros(n, n);
        for (i, &t) in params.iter().enumerate() {
            for (j, &val) in basis_row(v_degree, &flat, n, t, 0).iter().enumerate() {
                a[(i, j)] = val;
            }
        }
        (kv, a)
    };
    let lu = a.lu();

    // Per column: interpolate weighted poles and weights separately,
    // then divide elementwise
    let mut grid_poles: Vec<Vec<Point3>> = Vec::with_capacity(ncp_u);
    let mut grid_weights: Vec<Vec<f64>> = Vec::with_capacity(ncp_u);
    for col in 0..ncp_u {
        let column: Vec<DVec4> = curves
            .iter()
            .map(|c| {
                let p = c.poles[col];
                let w = c.weights[col];
                DVec4::new(p.x * w, p.y * w, p.z * w, w)
            })
            .collect();

        let degenerate = curves[1..]
            .iter()
            .all(|c| c.poles[col].distance(curves[0].poles[col]) < opts.tol.geo);

        let mut b = DMatrix::<f64>::zeros(n, 4);
        for (i, h) in column.iter().enumerate() {
            b[(i, 0)] = h.x;
            b[(i, 1)] = h.y;
            b[(i, 2)] = h.z;
            b[(i, 3)] = h.w;
        }
        let sol = lu.solve(&b).ok_or_else(|| {
            SkeinError::Parametrization("loft interpolation system is singular".into())
        })?;

        let mut prow = Vec::with_capacity(n);
        let mut wrow = Vec::with_capacity(n);
        for i in 0..n {
            let w = sol[(i, 3)];
            if w <= opts.tol.geo {
                return Err(SkeinError::Domain(format!(
                    "loft produced a non-positive weight {} in column {}",
                    w, col
                )));
            }
            if degenerate {
                // Collapsed column: constant position, interpolated weight
                prow.push(curves[0].poles[col]);
            } else {
                prow.push(Point3::new(sol[(i, 0)], sol[(i, 1)], sol[(i, 2)]) / w);
            }
            wrow.push(w);
        }
        grid_poles.push(prow);
        grid_weights.push(wrow);
    }

    BSplineSurface::rational(
        first.degree,
        v_degree,
        grid_poles,
        grid_weights,
        first.knots.clone(),
        v_knots,
        first.periodic,
        opts.periodic,
    )
}

/// The transverse parameter sequence: explicit (validated), uniform, or
/// the per-column averaged chordal vote.
fn transverse_params(curves: &[BSplineCurve], opts: &LoftOptions) -> Result<Vec<f64>> {
    let n = curves.len();
    let expected = if opts.periodic { n + 1 } else { n };
    match &opts.parametrization {
        Some(Parametrization::Explicit(params)) => {
            validate_explicit(params, expected)?;
            Ok(params.clone())
        }
        Some(Parametrization::Uniform) => Ok((0..expected)
            .map(|i| i as f64 / (expected - 1) as f64)
            .collect()),
        Some(Parametrization::Centripetal) => averaged_params(curves, opts, 0.5),
        Some(Parametrization::ChordLength) | None => averaged_params(curves, opts, 1.0),
    }
}

/// Each non-degenerate pole column contributes a normalised chordal
/// parameter list; the result is the per-index mean.
fn averaged_params(curves: &[BSplineCurve], opts: &LoftOptions, exponent: f64) -> Result<Vec<f64>> {
    let n = curves.len();
    let count = if opts.periodic { n + 1 } else { n };
    let ncp = curves[0].nb_poles();
    let mut sums = vec![0.0; count];
    let mut votes = 0usize;
    for col in 0..ncp {
        let pts: Vec<Point3> = curves.iter().map(|c| c.poles[col]).collect();
        let mut lengths = vec![0.0];
        let mut ok = true;
        for w in pts.windows(2) {
            let d = w[0].distance(w[1]);
            if d < opts.tol.geo {
                ok = false;
                break;
            }
            lengths.push(lengths.last().unwrap() + d.powf(exponent));
        }
        if ok && opts.periodic {
            let d = pts.last().unwrap().distance(pts[0]);
            if d < opts.tol.geo {
                ok = false;
            } else {
                lengths.push(lengths.last().unwrap() + d.powf(exponent));
            }
        }
        if !ok {
            continue;
        }
        let total = *lengths.last().unwrap();
        for (i, l) in lengths.iter().enumerate() {
            sums[i] += l / total;
        }
        votes += 1;
    }
    if votes == 0 {
        return Err(SkeinError::Parametrization(
            "every pole column is degenerate; supply explicit parameters".into(),
        ));
    }
    Ok(sums.iter().map(|s| s / votes as f64).collect())
}
