//! Making a family of curves compatible: shared degree, knots,
//! orientation and origin.

use serde::{Deserialize, Serialize};
use skein_core::{Result, SkeinError, Tolerance};
use skein_nurbs::{unify_knots, BSplineCurve};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatOptions {
    pub tol: Tolerance,
    /// Force geometrically closed inputs to the periodic representation.
    pub force_periodic: bool,
    /// Reverse curves whose orientation crosses the previous curve.
    pub auto_orient: bool,
    /// Shift periodic origins to minimise twist between neighbours.
    pub auto_twist: bool,
    pub twist_samples: usize,
}

impl Default for CompatOptions {
    fn default() -> Self {
        Self {
            tol: Tolerance::default(),
            force_periodic: false,
            auto_orient: true,
            auto_twist: true,
            twist_samples: 36,
        }
    }
}

/// Bring `curves` to a common degree, knot vector, orientation and
/// origin. Inputs are copied; the pipeline order is fixed: periodic
/// force, orientation, twist, degree match, knot normalisation, knot
/// merge.
pub fn compatibilize(curves: &[BSplineCurve], opts: &CompatOptions) -> Result<Vec<BSplineCurve>> {
    if curves.len() < 2 {
        return Err(SkeinError::Domain(
            "compatibility needs at least two curves".into(),
        ));
    }
    let mut out: Vec<BSplineCurve> = curves.to_vec();

    if opts.force_periodic && out.iter().all(|c| c.is_closed(opts.tol.geo)) {
        for c in &mut out {
            c.to_periodic()?;
        }
    }

    if opts.auto_orient {
        orient_chain(&mut out);
    }

    let all_periodic = out.iter().all(|c| c.periodic);
    if opts.auto_twist && all_periodic {
        untwist_chain(&mut out, opts.twist_samples, opts.tol.par)?;
    }

    let max_degree = out.iter().map(|c| c.degree).max().unwrap();
    if out.iter().any(|c| c.periodic && c.degree != max_degree) {
        return Err(SkeinError::Compatibility(
            "periodic curves of differing degree cannot be elevated to match".into(),
        ));
    }
    for c in &mut out {
        c.elevate_degree(max_degree, opts.tol.par)?;
        c.normalize_knots();
    }

    unify_knots(&mut out, opts.tol.par)?;
    Ok(out)
}

/// Reverse each curve whose crossed-diagonal distance to the previous
/// curve is shorter than the parallel one.
fn orient_chain(curves: &mut [BSplineCurve]) {
    for i in 1..curves.len() {
        let a = curves[i - 1].start_point();
        let b = curves[i - 1].end_point();
        let c = curves[i].start_point();
        let d = curves[i].end_point();
        let parallel = a.distance(c) + b.distance(d);
        let crossed = a.distance(d) + b.distance(c);
        if crossed < parallel {
            curves[i].reverse();
        }
    }
}

/// Shift each periodic curve's origin so that sampled distances to the
/// previous curve are minimal.
fn untwist_chain(curves: &mut [BSplineCurve], samples: usize, tol: f64) -> Result<()> {
    for i in 1..curves.len() {
        let prev: Vec<_> = curves[i - 1].sample(samples);
        let cur: Vec<_> = curves[i].sample(samples);
        let mut best = (0usize, f64::INFINITY);
        for offset in 0..samples {
            let cost: f64 = prev
                .iter()
                .enumerate()
                .map(|(k, p)| p.distance(cur[(k + offset) % samples]))
                .sum();
            if cost < best.1 {
                best = (offset, cost);
            }
        }
        if best.0 != 0 {
            let lo = curves[i].first_parameter();
            let span = curves[i].last_parameter() - lo;
            let u = lo + span * best.0 as f64 / samples as f64;
            curves[i].shift_origin(u, tol)?;
        }
    }
    Ok(())
}
