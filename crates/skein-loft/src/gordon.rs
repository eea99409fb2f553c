//! Gordon surfaces: the weighted Boolean sum of two lofts and a
//! correction patch.

use skein_core::{Result, SkeinError, Tolerance};
use skein_math::Point3;
use skein_nurbs::{unify_knots, BSplineSurface, KnotVector, SurfDirection, SurfaceAdapter};

/// Bilinear patch through four corner points, ordered (0,0), (1,0),
/// (0,1), (1,1). The usual correction surface for a 2x2 network.
pub fn corner_patch(c00: Point3, c10: Point3, c01: Point3, c11: Point3) -> BSplineSurface {
    BSplineSurface {
        u_degree: 1,
        v_degree: 1,
        poles: vec![vec![c00, c01], vec![c10, c11]],
        weights: vec![vec![1.0, 1.0], vec![1.0, 1.0]],
        u_knots: KnotVector::new(vec![0.0, 1.0], vec![2, 2]).unwrap(),
        v_knots: KnotVector::new(vec![0.0, 1.0], vec![2, 2]).unwrap(),
        u_periodic: false,
        v_periodic: false,
    }
}

/// Combine a U-curve loft `s1`, a V-curve loft `s2` and a correction
/// surface `s3` into the Boolean-sum Gordon surface.
///
/// `s2` and `s3` are brought into `s1`'s orientation first (any of the
/// eight exchange/reverse candidates), then all three are matched in
/// degree and knots per direction.
pub fn gordon(
    s1: &BSplineSurface,
    s2: &BSplineSurface,
    s3: &BSplineSurface,
    tol: &Tolerance,
) -> Result<BSplineSurface> {
    let mut s1 = s1.clone();
    normalize_surface(&mut s1)?;
    let s2 = reorient_to(&s1, s2, tol, "second loft")?;
    let s3 = reorient_to(&s1, s3, tol, "correction patch")?;
    check_corners(&s1, &s2, &s3, tol)?;

    let mut surfaces = [s1, s2, s3];
    // Degree match per direction, then knot match through the adapters
    let max_u = surfaces.iter().map(|s| s.u_degree).max().unwrap();
    let max_v = surfaces.iter().map(|s| s.v_degree).max().unwrap();
    for s in &mut surfaces {
        s.elevate_degree_u(max_u, tol.par)?;
        s.elevate_degree_v(max_v, tol.par)?;
    }
    let mut adapters: Vec<SurfaceAdapter> = surfaces
        .iter()
        .map(|s| SurfaceAdapter::new(s.clone(), SurfDirection::U))
        .collect();
    unify_knots(&mut adapters, tol.par)?;
    let mut adapters: Vec<SurfaceAdapter> = adapters
        .into_iter()
        .map(|a| SurfaceAdapter::new(a.into_surface(), SurfDirection::V))
        .collect();
    unify_knots(&mut adapters, tol.par)?;
    let mut it = adapters.into_iter().map(|a| a.into_surface());
    let (s1, s2, s3) = (it.next().unwrap(), it.next().unwrap(), it.next().unwrap());

    // Boolean sum on homogeneous data: w' = w1 + w2 - w3
    let nu = s1.nb_u_poles();
    let nv = s1.nb_v_poles();
    let mut poles = vec![vec![Point3::ZERO; nv]; nu];
    let mut weights = vec![vec![0.0; nv]; nu];
    for i in 0..nu {
        for j in 0..nv {
            let (w1, w2, w3) = (s1.weights[i][j], s2.weights[i][j], s3.weights[i][j]);
            let w = w1 + w2 - w3;
            if w < tol.geo {
                return Err(SkeinError::DegenerateGordon {
                    u_idx: i,
                    v_idx: j,
                    weight: w,
                });
            }
            let p =
                (w1 * s1.poles[i][j] + w2 * s2.poles[i][j] - w3 * s3.poles[i][j]) / w;
            poles[i][j] = p;
            weights[i][j] = w;
        }
    }
    BSplineSurface::rational(
        s1.u_degree,
        s1.v_degree,
        poles,
        weights,
        s1.u_knots.clone(),
        s1.v_knots.clone(),
        s1.u_periodic,
        s1.v_periodic,
    )
}

fn normalize_surface(s: &mut BSplineSurface) -> Result<()> {
    s.u_knots.scale_to_bounds(0.0, 1.0)?;
    s.v_knots.scale_to_bounds(0.0, 1.0)?;
    Ok(())
}

/// Try the eight canonical reorientations of `candidate` until its
/// (0,0), (1,0) and (0,1) corner samples match `reference`.
fn reorient_to(
    reference: &BSplineSurface,
    candidate: &BSplineSurface,
    tol: &Tolerance,
    label: &str,
) -> Result<BSplineSurface> {
    let r00 = reference.point_at(0.0, 0.0);
    let r10 = reference.point_at(1.0, 0.0);
    let r01 = reference.point_at(0.0, 1.0);
    let mut base = candidate.clone();
    normalize_surface(&mut base)?;

    for exchange in [false, true] {
        for rev_u in [false, true] {
            for rev_v in [false, true] {
                let mut s = base.clone();
                if exchange {
                    s.exchange_uv();
                }
                if rev_u {
                    s.reverse_u();
                }
                if rev_v {
                    s.reverse_v();
                }
                normalize_surface(&mut s)?;
                if s.point_at(0.0, 0.0).distance(r00) < tol.geo
                    && s.point_at(1.0, 0.0).distance(r10) < tol.geo
                    && s.point_at(0.0, 1.0).distance(r01) < tol.geo
                {
                    return Ok(s);
                }
            }
        }
    }
    Err(SkeinError::Orientation(format!(
        "no canonical reorientation of the {} matches the first loft",
        label
    )))
}

fn check_corners(
    s1: &BSplineSurface,
    s2: &BSplineSurface,
    s3: &BSplineSurface,
    tol: &Tolerance,
) -> Result<()> {
    for &(u, v) in &[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)] {
        let p1 = s1.point_at(u, v);
        let p2 = s2.point_at(u, v);
        let p3 = s3.point_at(u, v);
        if p1.distance(p2) > tol.geo || p1.distance(p3) > tol.geo {
            return Err(SkeinError::Compatibility(format!(
                "surface corners at ({}, {}) do not coincide",
                u, v
            )));
        }
    }
    Ok(())
}
