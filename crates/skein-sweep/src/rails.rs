//! Two-rail sweeps: a profile family stretched between two rails,
//! assembled through a Gordon sum over the ruled spine.

use serde::{Deserialize, Serialize};
use skein_core::{Result, SkeinError, Tolerance};
use skein_fit::Parametrization;
use skein_loft::{
    compatibilize, corner_patch, gordon, loft, ruled_spine, CompatOptions, LoftOptions,
    RuledOptions,
};
use skein_nurbs::{BSplineCurve, BSplineSurface};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RailsOptions {
    /// Sample count when locating a profile on the first rail.
    pub profile_samples: usize,
    pub tol: Tolerance,
}

impl Default for RailsOptions {
    fn default() -> Self {
        Self {
            profile_samples: 64,
            tol: Tolerance::default(),
        }
    }
}

fn closest_distance(curve: &BSplineCurve, p: skein_math::Point3, samples: usize) -> (f64, f64) {
    curve.closest_parameter(p, samples)
}

/// Sweep `profiles` between two rails. Every profile must touch both
/// rails; profiles are parameterised by their first-rail station and
/// the two rulings are supplied as flat boundary profiles where the
/// family leaves a gap.
pub fn sweep_two_rails(
    rail1: &BSplineCurve,
    rail2: &BSplineCurve,
    profiles: &[BSplineCurve],
    opts: &RailsOptions,
) -> Result<BSplineSurface> {
    if profiles.is_empty() {
        return Err(SkeinError::Domain("two-rail sweep needs a profile".into()));
    }
    let spine = ruled_spine(
        rail1,
        rail2,
        &RuledOptions {
            tol: opts.tol,
            ..Default::default()
        },
    )?;
    // Station lookup against the normalised first rail, matching the
    // spine's U parameter
    let mut r1 = rail1.clone();
    r1.normalize_knots();

    let mut stations: Vec<(f64, BSplineCurve)> = Vec::with_capacity(profiles.len() + 2);
    for (i, profile) in profiles.iter().enumerate() {
        let (mut t, d) = {
            let mut best = (0.0, f64::INFINITY);
            for p in profile.sample(opts.profile_samples) {
                let hit = closest_distance(&r1, p, 64);
                if hit.1 < best.1 {
                    best = hit;
                }
            }
            best
        };
        if d > opts.tol.geo {
            return Err(SkeinError::Domain(format!(
                "profile {} does not touch the first rail: closest approach {}",
                i, d
            )));
        }
        // Run every profile from rail 1 toward rail 2
        let mut profile = profile.clone();
        let d_start = closest_distance(&r1, profile.start_point(), 64).1;
        let d_end = closest_distance(&r1, profile.end_point(), 64).1;
        if d_end < d_start {
            profile.reverse();
            t = closest_distance(&r1, profile.start_point(), 64).0;
        }
        profile.normalize_knots();
        stations.push((t, profile));
    }
    stations.sort_by(|a, b| a.0.total_cmp(&b.0));
    for w in stations.windows(2) {
        if w[1].0 - w[0].0 < opts.tol.par {
            return Err(SkeinError::Domain(format!(
                "two profiles share the rail station {}",
                w[0].0
            )));
        }
    }

    // Close gaps at the rail ends with the boundary rulings
    if stations[0].0 > opts.tol.par {
        stations.insert(0, (0.0, spine.iso_u(0.0)));
    }
    if stations.last().map(|s| s.0) < Some(1.0 - opts.tol.par) {
        stations.push((1.0, spine.iso_u(1.0)));
    }

    let params: Vec<f64> = stations.iter().map(|s| s.0).collect();
    let curves: Vec<BSplineCurve> = stations.into_iter().map(|s| s.1).collect();
    let sections = compatibilize(
        &curves,
        &CompatOptions {
            tol: opts.tol,
            auto_orient: false,
            auto_twist: false,
            ..Default::default()
        },
    )?;
    let mut transverse = loft(
        &sections,
        &LoftOptions {
            parametrization: Some(Parametrization::Explicit(params)),
            tol: opts.tol,
            ..Default::default()
        },
    )?;
    transverse.exchange_uv();

    let corners = corner_patch(
        spine.point_at(0.0, 0.0),
        spine.point_at(1.0, 0.0),
        spine.point_at(0.0, 1.0),
        spine.point_at(1.0, 1.0),
    );
    gordon(&spine, &transverse, &corners, &opts.tol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_math::DVec3;
    use skein_nurbs::KnotVector;

    fn rails() -> (BSplineCurve, BSplineCurve) {
        (
            BSplineCurve::line(DVec3::ZERO, DVec3::new(2.0, 0.0, 0.0)),
            BSplineCurve::line(DVec3::new(0.0, 1.0, 0.0), DVec3::new(2.0, 1.0, 0.0)),
        )
    }

    fn bump() -> BSplineCurve {
        BSplineCurve::new(
            2,
            vec![
                DVec3::new(1.0, 0.0, 0.0),
                DVec3::new(1.0, 0.5, 1.0),
                DVec3::new(1.0, 1.0, 0.0),
            ],
            KnotVector::new(vec![0.0, 1.0], vec![3, 3]).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_single_bump_profile() {
        let (r1, r2) = rails();
        let s = sweep_two_rails(&r1, &r2, &[bump()], &RailsOptions::default()).unwrap();

        // Rails at the V boundaries
        assert!(s.point_at(0.5, 0.0).distance(DVec3::new(1.0, 0.0, 0.0)) < 1e-6);
        assert!(s.point_at(0.5, 1.0).distance(DVec3::new(1.0, 1.0, 0.0)) < 1e-6);
        // Boundary rulings are flat
        assert!(s.point_at(0.0, 0.5).distance(DVec3::new(0.0, 0.5, 0.0)) < 1e-6);
        assert!(s.point_at(1.0, 0.5).distance(DVec3::new(2.0, 0.5, 0.0)) < 1e-6);
        // The profile is reproduced at its station
        let profile = bump();
        for j in 0..=8 {
            let v = j as f64 / 8.0;
            let d = s.point_at(0.5, v).distance(profile.point_at(v));
            assert!(d < 1e-6, "profile missed at v={}: distance {}", v, d);
        }
    }

    #[test]
    fn test_backward_profile_is_reversed() {
        let (r1, r2) = rails();
        let mut p = bump();
        p.reverse();
        let s = sweep_two_rails(&r1, &r2, &[p], &RailsOptions::default()).unwrap();
        // Still runs rail1 -> rail2 at its station
        assert!(s.point_at(0.5, 0.0).distance(DVec3::new(1.0, 0.0, 0.0)) < 1e-6);
        assert!(s.point_at(0.5, 1.0).distance(DVec3::new(1.0, 1.0, 0.0)) < 1e-6);
    }

    #[test]
    fn test_floating_profile_rejected() {
        let (r1, r2) = rails();
        let floater = BSplineCurve::line(DVec3::new(1.0, 0.3, 2.0), DVec3::new(1.0, 0.7, 2.0));
        let err = sweep_two_rails(&r1, &r2, &[floater], &RailsOptions::default()).unwrap_err();
        assert!(matches!(err, SkeinError::Domain(_)));
    }

    #[test]
    fn test_profiles_at_both_ends_skip_completion() {
        let (r1, r2) = rails();
        let end1 = BSplineCurve::line(DVec3::ZERO, DVec3::new(0.0, 1.0, 0.0));
        let end2 = BSplineCurve::line(DVec3::new(2.0, 0.0, 0.0), DVec3::new(2.0, 1.0, 0.0));
        let s = sweep_two_rails(&r1, &r2, &[end1, end2], &RailsOptions::default()).unwrap();
        // Two straight end profiles over straight rails: a plane
        let p = s.point_at(0.3, 0.7);
        assert!(p.distance(DVec3::new(0.6, 0.7, 0.0)) < 1e-6, "{:?}", p);
    }
}
