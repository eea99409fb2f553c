//! Blend surfaces: a smooth sheet between two edge-on-face carriers.
//!
//! The construction follows the ruled spine between the two edges:
//! blend curves are built at sampled spine parameters, their scales are
//! recorded back into the carriers' size laws, and the family is
//! combined with the spine and a corner patch through a Gordon sum.

use skein_core::{Result, SkeinError, Tolerance, Warned};
use skein_fit::{Parametrization, ValueOnEdge};
use skein_loft::{corner_patch, gordon, loft, ruled_spine, LoftOptions, RuledOptions};
use skein_nurbs::{BSplineCurve, BSplineSurface};

use crate::blend_curve::{hermite_bezier, solve_sizes, BlendOptions, ScaleLaw};
use crate::edge_on_face::EdgeOnFace;
use crate::optimize::Optimizer;

pub struct BlendSurfaceOptions<'a> {
    pub law: ScaleLaw,
    /// Blend curve count for the final build.
    pub samples: usize,
    /// Sample count for the scale-design pass.
    pub design_samples: usize,
    /// Sample count when interpolating each edge as a 3D curve.
    pub edge_samples: usize,
    pub optimizer: Option<&'a dyn Optimizer>,
    pub max_iter: usize,
    pub tol: Tolerance,
}

impl Default for BlendSurfaceOptions<'_> {
    fn default() -> Self {
        Self {
            law: ScaleLaw::AutoScale,
            samples: 21,
            design_samples: 5,
            edge_samples: 33,
            optimizer: None,
            max_iter: 2000,
            tol: Tolerance::default(),
        }
    }
}

/// Map a spine rail point back to the edge's own parameter.
fn rail_parameter(edge_curve: &BSplineCurve, spine: &BSplineSurface, u: f64, v: f64) -> f64 {
    edge_curve.closest_parameter(spine.point_at(u, v), 64).0
}

/// Build the blend surface between two carriers.
///
/// The carriers' size laws are overwritten with the scales chosen by
/// the design pass, so a caller can inspect or re-sample them
/// afterwards.
pub fn blend_surface(
    e1: &mut EdgeOnFace,
    e2: &mut EdgeOnFace,
    opts: &BlendSurfaceOptions,
) -> Result<Warned<BSplineSurface>> {
    if opts.samples < 2 || opts.design_samples < 2 {
        return Err(SkeinError::Domain(
            "blend surface needs at least two samples per pass".into(),
        ));
    }

    let r1 = e1.edge_3d(opts.edge_samples)?;
    let r2 = e2.edge_3d(opts.edge_samples)?;
    let spine = ruled_spine(
        &r1,
        &r2,
        &RuledOptions {
            tol: opts.tol,
            ..Default::default()
        },
    )?;

    // Design pass: pick the scale at a few stations and record it into
    // the carriers' size laws
    let blend_opts = BlendOptions {
        law: opts.law,
        auto_orient: true,
        max_iter: opts.max_iter,
        optimizer: opts.optimizer,
    };
    let mut warnings = Vec::new();
    let mut sizes1 = Vec::with_capacity(opts.design_samples);
    let mut sizes2 = Vec::with_capacity(opts.design_samples);
    for i in 0..opts.design_samples {
        let u = i as f64 / (opts.design_samples - 1) as f64;
        let t1 = rail_parameter(&r1, &spine, u, 0.0);
        let t2 = rail_parameter(&r2, &spine, u, 1.0);
        let a = e1.point_on_edge(t1)?;
        let b = e2.point_on_edge(t2)?;
        let solved = solve_sizes(&a, &b, &blend_opts)?;
        warnings.extend(solved.warnings);
        sizes1.push((t1, solved.value.0));
        sizes2.push((t2, solved.value.1));
    }
    let range1 = (e1.first_parameter(), e1.last_parameter());
    let range2 = (e2.first_parameter(), e2.last_parameter());
    e1.size = ValueOnEdge::from_samples(range1, &sizes1);
    e2.size = ValueOnEdge::from_samples(range2, &sizes2);

    // Final pass: one blend curve per station, sized by the laws
    let mut params = Vec::with_capacity(opts.samples);
    let mut blends = Vec::with_capacity(opts.samples);
    for i in 0..opts.samples {
        let u = i as f64 / (opts.samples - 1) as f64;
        let t1 = rail_parameter(&r1, &spine, u, 0.0);
        let t2 = rail_parameter(&r2, &spine, u, 1.0);
        let a = e1.point_on_edge(t1)?;
        let b = e2.point_on_edge(t2)?;
        params.push(u);
        blends.push(hermite_bezier(&a, &b)?.to_bspline());
    }

    let mut transverse = loft(
        &blends,
        &LoftOptions {
            parametrization: Some(Parametrization::Explicit(params)),
            tol: opts.tol,
            ..Default::default()
        },
    )?;
    // Align with the spine: U along the edges, V across
    transverse.exchange_uv();

    let corners = corner_patch(
        spine.point_at(0.0, 0.0),
        spine.point_at(1.0, 0.0),
        spine.point_at(0.0, 1.0),
        spine.point_at(1.0, 1.0),
    );
    let surface = gordon(&spine, &transverse, &corners, &opts.tol)?;
    Ok(Warned::with(surface, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_math::DVec3;
    use skein_nurbs::KnotVector;

    fn bilinear(c00: DVec3, c10: DVec3, c01: DVec3, c11: DVec3) -> BSplineSurface {
        let k = KnotVector::new(vec![0.0, 1.0], vec![2, 2]).unwrap();
        BSplineSurface::new(1, 1, vec![vec![c00, c01], vec![c10, c11]], k.clone(), k).unwrap()
    }

    /// Two parallel planes, z = 0 and z = 1, blended across a unit gap
    /// in y. Every station sees the same chord, so the whole setup is
    /// translation-invariant in x.
    fn parallel_planes() -> (EdgeOnFace, EdgeOnFace) {
        let f1 = bilinear(
            DVec3::ZERO,
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(1.0, 1.0, 0.0),
        );
        let f2 = bilinear(
            DVec3::new(0.0, 1.0, 1.0),
            DVec3::new(1.0, 1.0, 1.0),
            DVec3::new(0.0, 2.0, 1.0),
            DVec3::new(1.0, 2.0, 1.0),
        );
        let pc1 = BSplineCurve::line(DVec3::ZERO, DVec3::new(1.0, 0.0, 0.0));
        let pc2 = BSplineCurve::line(DVec3::ZERO, DVec3::new(1.0, 0.0, 0.0));
        (
            EdgeOnFace::new(pc1, f1, 1).unwrap(),
            EdgeOnFace::new(pc2, f2, 1).unwrap(),
        )
    }

    #[test]
    fn test_blend_spans_the_gap_tangentially() {
        let (mut e1, mut e2) = parallel_planes();
        let out = blend_surface(&mut e1, &mut e2, &BlendSurfaceOptions::default()).unwrap();
        assert!(out.is_clean());
        let s = out.value;

        // Corners on the two edges
        assert!(s.point_at(0.0, 0.0).distance(DVec3::ZERO) < 1e-6);
        assert!(s.point_at(1.0, 0.0).distance(DVec3::new(1.0, 0.0, 0.0)) < 1e-6);
        assert!(s.point_at(0.0, 1.0).distance(DVec3::new(0.0, 1.0, 1.0)) < 1e-6);
        assert!(s.point_at(1.0, 1.0).distance(DVec3::new(1.0, 1.0, 1.0)) < 1e-6);

        // Boundaries ride the edges
        assert!(s.point_at(0.5, 0.0).distance(DVec3::new(0.5, 0.0, 0.0)) < 1e-6);
        assert!(s.point_at(0.5, 1.0).distance(DVec3::new(0.5, 1.0, 1.0)) < 1e-6);

        // Tangent to both planes across the whole width
        for i in 0..=4 {
            let u = i as f64 / 4.0;
            let d0 = s.derivatives(u, 0.0, 1);
            assert!(d0[0][1].z.abs() < 1e-6, "not tangent to z=0 at u={}", u);
            let d1 = s.derivatives(u, 1.0, 1);
            assert!(d1[0][1].z.abs() < 1e-6, "not tangent to z=1 at u={}", u);
        }
    }

    #[test]
    fn test_design_pass_records_size_laws() {
        let (mut e1, mut e2) = parallel_planes();
        blend_surface(&mut e1, &mut e2, &BlendSurfaceOptions::default()).unwrap();
        // Chord sqrt(2), unit cross tangent: auto scale is sqrt(2)
        let s = e1.size.value_at(0.5).unwrap();
        assert!(
            (s - 2.0_f64.sqrt()).abs() < 1e-6,
            "recorded size {} differs from the chord",
            s
        );
        assert!(e2.size.len() >= 2);
    }

    #[test]
    fn test_mixed_continuity_blend() {
        let (mut e1, mut e2) = parallel_planes();
        e2.continuity = 2;
        let s = blend_surface(&mut e1, &mut e2, &BlendSurfaceOptions::default())
            .unwrap()
            .value;
        assert!(s.point_at(0.0, 0.0).distance(DVec3::ZERO) < 1e-6);
        assert!(s.point_at(1.0, 1.0).distance(DVec3::new(1.0, 1.0, 1.0)) < 1e-6);
    }

    #[test]
    fn test_sample_floor() {
        let (mut e1, mut e2) = parallel_planes();
        let opts = BlendSurfaceOptions {
            samples: 1,
            ..Default::default()
        };
        assert!(blend_surface(&mut e1, &mut e2, &opts).is_err());
    }
}
