//! Rotation sweep: profiles carried around a path in rotating local
//! frames.
//!
//! Each profile is expressed in the frame anchored at its intersection
//! with the path (X toward the centre, Y along the path tangent). The
//! profile family is lofted in that shared local system, densely
//! re-sampled, and every station is mapped back through the frame at
//! its own path parameter. With a circular path and the centre on its
//! axis this reproduces a surface of revolution.

use serde::{Deserialize, Serialize};
use skein_core::{Result, SkeinError, Tolerance};
use skein_fit::Parametrization;
use skein_loft::{compatibilize, loft, CompatOptions, LoftOptions};
use skein_math::{Frame, Point3};
use skein_nurbs::{BSplineCurve, BSplineSurface};

/// Which span of the path the swept surface covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SweepRange {
    /// From the first to the last profile station.
    #[default]
    Profiles,
    /// The whole path; beyond the outermost profiles the local shape
    /// is held constant.
    Path,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationSweepOptions {
    pub range: SweepRange,
    /// Station count for the dense re-sampling pass.
    pub sections: usize,
    /// Sample count when searching a profile/path intersection.
    pub profile_samples: usize,
    pub tol: Tolerance,
}

impl Default for RotationSweepOptions {
    fn default() -> Self {
        Self {
            range: SweepRange::Profiles,
            sections: 36,
            profile_samples: 64,
            tol: Tolerance::default(),
        }
    }
}

/// The sweep frame at path parameter `t`: origin on the path, X toward
/// the centre, Y along the tangent.
fn sweep_frame(path: &BSplineCurve, center: Point3, t: f64) -> Result<Frame> {
    let p = path.point_at(t);
    Frame::from_xy(p, center - p, path.tangent_at(t)).ok_or_else(|| {
        SkeinError::Domain(format!(
            "degenerate sweep frame at parameter {}: path point coincides with the centre \
             or the tangent aims at it",
            t
        ))
    })
}

/// The path parameter where a profile meets the path, with the closest
/// approach distance.
fn intersection_parameter(
    path: &BSplineCurve,
    profile: &BSplineCurve,
    samples: usize,
) -> (f64, f64) {
    let mut best = (path.first_parameter(), f64::INFINITY);
    for p in profile.sample(samples) {
        let (t, d) = path.closest_parameter(p, 64);
        if d < best.1 {
            best = (t, d);
        }
    }
    best
}

fn map_poles(curve: &BSplineCurve, f: impl Fn(Point3) -> Point3) -> BSplineCurve {
    let mut out = curve.clone();
    for p in &mut out.poles {
        *p = f(*p);
    }
    out
}

/// Sweep `profiles` around `path` with the rotation centre `center`.
pub fn rotation_sweep(
    path: &BSplineCurve,
    profiles: &[BSplineCurve],
    center: Point3,
    opts: &RotationSweepOptions,
) -> Result<BSplineSurface> {
    if profiles.is_empty() {
        return Err(SkeinError::Domain("rotation sweep needs a profile".into()));
    }
    if opts.sections < 1 {
        return Err(SkeinError::Domain("rotation sweep needs sections".into()));
    }

    // Anchor every profile on the path and express it in its frame
    let mut stations: Vec<(f64, BSplineCurve)> = Vec::with_capacity(profiles.len());
    for (i, profile) in profiles.iter().enumerate() {
        let (t, d) = intersection_parameter(path, profile, opts.profile_samples);
        if d > opts.tol.geo {
            return Err(SkeinError::Domain(format!(
                "profile {} misses the path: closest approach {}",
                i, d
            )));
        }
        let frame = sweep_frame(path, center, t)?;
        stations.push((t, map_poles(profile, |p| frame.to_local(p))));
    }
    stations.sort_by(|a, b| a.0.total_cmp(&b.0));
    for w in stations.windows(2) {
        if w[1].0 - w[0].0 < opts.tol.par {
            return Err(SkeinError::Domain(format!(
                "two profiles meet the path at the same parameter {}",
                w[0].0
            )));
        }
    }

    // Loft the local profiles across the path parameter; one profile
    // sweeps unchanged
    let local_params: Vec<f64> = stations.iter().map(|s| s.0).collect();
    let locals: Vec<BSplineCurve> = stations.into_iter().map(|s| s.1).collect();
    let local_loft = if locals.len() > 1 {
        let sections = compatibilize(
            &locals,
            &CompatOptions {
                tol: opts.tol,
                ..Default::default()
            },
        )?;
        Some(loft(
            &sections,
            &LoftOptions {
                parametrization: Some(Parametrization::Explicit(local_params.clone())),
                tol: opts.tol,
                ..Default::default()
            },
        )?)
    } else {
        None
    };

    // Dense stations: uniform over the requested span, plus every
    // profile parameter
    let (a, b) = if locals.len() == 1 || opts.range == SweepRange::Path {
        (path.first_parameter(), path.last_parameter())
    } else {
        (local_params[0], *local_params.last().unwrap())
    };
    let mut params: Vec<f64> = (0..=opts.sections)
        .map(|i| a + (b - a) * i as f64 / opts.sections as f64)
        .collect();
    params.extend(local_params.iter().copied());
    params.sort_by(|x, y| x.total_cmp(y));
    params.dedup_by(|x, y| (*x - *y).abs() < opts.tol.par);

    let (lo, hi) = (local_params[0], *local_params.last().unwrap());
    let mut sections = Vec::with_capacity(params.len());
    for &t in &params {
        let local = match &local_loft {
            // Hold the outermost shape beyond the profile span
            Some(surface) => surface.iso_v(t.clamp(lo, hi)),
            None => locals[0].clone(),
        };
        let frame = sweep_frame(path, center, t)?;
        sections.push(map_poles(&local, |p| frame.to_global(p)));
    }

    loft(
        &sections,
        &LoftOptions {
            parametrization: Some(Parametrization::Explicit(params)),
            tol: opts.tol,
            ..Default::default()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_math::DVec3;

    fn frustum_radius_check(s: &BSplineSurface, tol: f64) {
        for i in 0..=8 {
            for j in 0..=24 {
                let u = i as f64 / 8.0;
                let v = j as f64 / 24.0;
                let p = s.point_at(u, v);
                let r = (p.x * p.x + p.y * p.y).sqrt();
                let expect = 1.0 - 0.5 * p.z;
                assert!(
                    (r - expect).abs() < tol,
                    "radius {} at z={} (uv {} {}), expected {}",
                    r,
                    p.z,
                    u,
                    v,
                    expect
                );
            }
        }
    }

    #[test]
    fn test_single_profile_revolves_into_frustum() {
        let path = BSplineCurve::circle(DVec3::ZERO, DVec3::Z, 1.0).unwrap();
        let profile = BSplineCurve::line(DVec3::new(1.0, 0.0, 0.0), DVec3::new(0.5, 0.0, 1.0));
        let s = rotation_sweep(
            &path,
            &[profile],
            DVec3::ZERO,
            &RotationSweepOptions::default(),
        )
        .unwrap();
        // One profile covers the whole path: a surface of revolution
        frustum_radius_check(&s, 1e-3);
    }

    #[test]
    fn test_opposed_profiles_agree() {
        let path = BSplineCurve::circle(DVec3::ZERO, DVec3::Z, 1.0).unwrap();
        let p1 = BSplineCurve::line(DVec3::new(1.0, 0.0, 0.0), DVec3::new(0.5, 0.0, 1.0));
        let p2 = BSplineCurve::line(DVec3::new(-1.0, 0.0, 0.0), DVec3::new(-0.5, 0.0, 1.0));
        let opts = RotationSweepOptions {
            range: SweepRange::Path,
            ..Default::default()
        };
        let s = rotation_sweep(&path, &[p1, p2], DVec3::ZERO, &opts).unwrap();
        // Both profiles are the same shape in their local frames, so
        // the sweep over the whole path is still the frustum
        frustum_radius_check(&s, 1e-3);
    }

    #[test]
    fn test_profile_sits_on_its_station() {
        let path = BSplineCurve::line(DVec3::ZERO, DVec3::new(4.0, 0.0, 0.0));
        let mk = |x: f64, top: f64| {
            BSplineCurve::line(DVec3::new(x, 0.0, -1.0), DVec3::new(x, top, 1.0))
        };
        let s = rotation_sweep(
            &path,
            &[mk(1.0, 0.0), mk(3.0, 2.0)],
            DVec3::new(0.0, -10.0, 0.0),
            &RotationSweepOptions::default(),
        )
        .unwrap();
        // The V domain spans the two station parameters; the first
        // station reproduces the first profile's plane x = 1
        for i in 0..=6 {
            let u = i as f64 / 6.0;
            let p0 = s.point_at(u, 0.25);
            assert!(
                (p0.x - 1.0).abs() < 1e-6,
                "first station drifted off its plane: {:?}",
                p0
            );
            let p1 = s.point_at(u, 0.75);
            assert!(
                (p1.x - 3.0).abs() < 1e-6,
                "last station drifted off its plane: {:?}",
                p1
            );
        }
    }

    #[test]
    fn test_detached_profile_rejected() {
        let path = BSplineCurve::circle(DVec3::ZERO, DVec3::Z, 1.0).unwrap();
        let far = BSplineCurve::line(DVec3::new(3.0, 0.0, 0.0), DVec3::new(3.0, 0.0, 1.0));
        let err = rotation_sweep(
            &path,
            &[far],
            DVec3::ZERO,
            &RotationSweepOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SkeinError::Domain(_)));
    }

    #[test]
    fn test_no_profiles_rejected() {
        let path = BSplineCurve::line(DVec3::ZERO, DVec3::X);
        assert!(rotation_sweep(&path, &[], DVec3::ZERO, &RotationSweepOptions::default()).is_err());
    }
}
