//! Edges carried by a face, with cross-direction derivatives taken on
//! the face itself.
//!
//! The edge lives in the face's 2D parameter domain as a planar
//! B-spline (z = 0). Querying a parameter yields a [`PointOnEdge`]
//! whose derivatives are those of the surface along a straight 2D ray
//! across the edge, so blends built on them stay in contact with the
//! face up to the requested continuity.

use std::f64::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};
use skein_core::{Result, SkeinError};
use skein_fit::{interpolate_curve, InterpOptions, Parametrization, ValueOnEdge};
use skein_math::{Point3, Vector3};
use skein_nurbs::{BSplineCurve, BSplineSurface};

use crate::point_on_edge::PointOnEdge;

/// Set partitions of {1..m} grouped by block-size type, with the
/// number of partitions of each type, for m = 1..4.
const PARTITIONS: [&[(&[usize], f64)]; 4] = [
    &[(&[1], 1.0)],
    &[(&[2], 1.0), (&[1, 1], 1.0)],
    &[(&[3], 1.0), (&[2, 1], 3.0), (&[1, 1, 1], 1.0)],
    &[
        (&[4], 1.0),
        (&[3, 1], 4.0),
        (&[2, 2], 3.0),
        (&[2, 1, 1], 6.0),
        (&[1, 1, 1, 1], 1.0),
    ],
];

/// The k-linear derivative form `D^k S(w_1, .., w_k)` at a fixed
/// surface point, with `table[i][j]` holding the partial taken i times
/// in u and j times in v. Expanding each 2D argument over its u and v
/// components gives 2^k terms.
fn multilinear(table: &[Vec<Vector3>], args: &[Vector3]) -> Vector3 {
    let k = args.len();
    let mut out = Vector3::ZERO;
    for mask in 0..(1usize << k) {
        let mut coeff = 1.0;
        let mut nu = 0;
        for (i, arg) in args.iter().enumerate() {
            if mask & (1 << i) != 0 {
                coeff *= arg.x;
                nu += 1;
            } else {
                coeff *= arg.y;
            }
        }
        out += coeff * table[nu][k - nu];
    }
    out
}

/// Derivatives 0..=order of `S(gamma(t))` at one parameter, by the
/// bivariate Faa di Bruno formula.
///
/// `gamma_derivs` holds the 2D curve derivatives 1..=order with the v
/// component in `y` (z is ignored). Orders above 4 are not supported.
pub fn compose_on_surface(
    face: &BSplineSurface,
    u: f64,
    v: f64,
    gamma_derivs: &[Vector3],
    order: usize,
) -> Result<Vec<Vector3>> {
    if order > 4 {
        return Err(SkeinError::Domain(format!(
            "surface composition supports derivatives up to order 4, got {}",
            order
        )));
    }
    if gamma_derivs.len() < order {
        return Err(SkeinError::Domain(format!(
            "composition to order {} needs {} curve derivatives, got {}",
            order,
            order,
            gamma_derivs.len()
        )));
    }
    let table = face.derivatives(u, v, order);
    let mut out = Vec::with_capacity(order + 1);
    out.push(table[0][0]);
    for m in 1..=order {
        let mut acc = Vector3::ZERO;
        for (blocks, count) in PARTITIONS[m - 1] {
            let args: Vec<Vector3> = blocks.iter().map(|&b| gamma_derivs[b - 1]).collect();
            acc += *count * multilinear(&table, &args);
        }
        out.push(acc);
    }
    Ok(out)
}

/// An edge on a face, queried for cross-direction derivative carriers.
///
/// `angle` rotates the cross direction away from the edge's 2D tangent
/// (default a quarter turn, pointing across the edge); `size` feeds the
/// scale of the PointOnEdge produced at each parameter. Both are laws
/// over the edge's parameter range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeOnFace {
    /// The edge in the face's parameter domain, z = 0.
    pub pcurve: BSplineCurve,
    pub face: BSplineSurface,
    pub continuity: usize,
    pub angle: ValueOnEdge,
    pub size: ValueOnEdge,
}

impl EdgeOnFace {
    pub fn new(pcurve: BSplineCurve, face: BSplineSurface, continuity: usize) -> Result<Self> {
        if continuity > 4 {
            return Err(SkeinError::Domain(format!(
                "edge-on-face continuity {} exceeds the supported maximum of 4",
                continuity
            )));
        }
        let range = (pcurve.first_parameter(), pcurve.last_parameter());
        Ok(Self {
            pcurve,
            face,
            continuity,
            angle: ValueOnEdge::constant(range, FRAC_PI_2),
            size: ValueOnEdge::constant(range, 1.0),
        })
    }

    pub fn first_parameter(&self) -> f64 {
        self.pcurve.first_parameter()
    }

    pub fn last_parameter(&self) -> f64 {
        self.pcurve.last_parameter()
    }

    /// The edge point on the face at parameter `t`.
    pub fn point_3d(&self, t: f64) -> Point3 {
        let uv = self.pcurve.point_at(t);
        self.face.point_at(uv.x, uv.y)
    }

    /// The unit cross direction in the parameter plane at `t`: the
    /// edge's 2D tangent rotated by the angle law.
    pub fn cross_direction(&mut self, t: f64) -> Result<Vector3> {
        let tan = self.pcurve.tangent_at(t);
        if tan.length() < 1e-12 {
            return Err(SkeinError::Domain(format!(
                "degenerate edge tangent at parameter {}",
                t
            )));
        }
        let theta = self.angle.value_at(t)?;
        let (sin, cos) = theta.sin_cos();
        let dir = Vector3::new(
            cos * tan.x - sin * tan.y,
            sin * tan.x + cos * tan.y,
            0.0,
        );
        Ok(dir / dir.length())
    }

    /// The derivative carrier at `t`: surface derivatives along the
    /// straight cross-direction ray, sized by the size law.
    pub fn point_on_edge(&mut self, t: f64) -> Result<PointOnEdge> {
        let uv = self.pcurve.point_at(t);
        let dir = self.cross_direction(t)?;
        // The ray is linear, so its higher derivatives vanish
        let mut gamma = vec![Vector3::ZERO; self.continuity.max(1)];
        gamma[0] = dir;
        let d = compose_on_surface(&self.face, uv.x, uv.y, &gamma, self.continuity)?;
        let size = self.size.value_at(t)?;
        Ok(PointOnEdge::new(d[0], d[1..].to_vec())?.with_size(size))
    }

    /// The 3D edge as a B-spline sharing the pcurve's parameter range,
    /// interpolated through `samples` composed points.
    pub fn edge_3d(&self, samples: usize) -> Result<BSplineCurve> {
        if samples < 2 {
            return Err(SkeinError::Domain(
                "edge interpolation needs at least two samples".into(),
            ));
        }
        let (t0, t1) = (self.first_parameter(), self.last_parameter());
        let params: Vec<f64> = (0..samples)
            .map(|i| t0 + (t1 - t0) * i as f64 / (samples - 1) as f64)
            .collect();
        let points: Vec<Point3> = params.iter().map(|&t| self.point_3d(t)).collect();
        let opts = InterpOptions {
            parametrization: Parametrization::Explicit(params),
            ..Default::default()
        };
        interpolate_curve(&points, &opts)
    }
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

    #[test]
    fn test_composition_on_saddle() {
        // S(u,v) = (u, v, uv) composed with gamma(t) = (t, t^2) gives
        // f(t) = (t, t^2, t^3), checked at t = 0.5 up to order 4
        let s = bilinear(
            DVec3::ZERO,
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(1.0, 1.0, 1.0),
        );
        let gamma = [
            DVec3::new(1.0, 1.0, 0.0),
            DVec3::new(0.0, 2.0, 0.0),
            DVec3::ZERO,
            DVec3::ZERO,
        ];
        let d = compose_on_surface(&s, 0.5, 0.25, &gamma, 4).unwrap();
        let expect = [
            DVec3::new(0.5, 0.25, 0.125),
            DVec3::new(1.0, 1.0, 0.75),
            DVec3::new(0.0, 2.0, 3.0),
            DVec3::new(0.0, 0.0, 6.0),
            DVec3::ZERO,
        ];
        for (m, (got, want)) in d.iter().zip(&expect).enumerate() {
            assert!(
                (*got - *want).length() < 1e-10,
                "order {}: got {:?}, want {:?}",
                m,
                got,
                want
            );
        }
    }

    #[test]
    fn test_cross_carrier_on_plane() {
        let plane = bilinear(
            DVec3::ZERO,
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(1.0, 1.0, 0.0),
        );
        let pcurve = BSplineCurve::line(DVec3::new(0.0, 0.2, 0.0), DVec3::new(1.0, 0.2, 0.0));
        let mut edge = EdgeOnFace::new(pcurve, plane, 2).unwrap();
        edge.size = ValueOnEdge::constant((0.0, 1.0), 2.0);

        let p = edge.point_on_edge(0.5).unwrap();
        assert!((p.point - DVec3::new(0.5, 0.2, 0.0)).length() < 1e-12);
        // Quarter-turn cross direction maps to the surface v-derivative
        let s = p.scaled_derivs();
        assert!((s[0] - DVec3::new(0.0, 2.0, 0.0)).length() < 1e-10, "{:?}", s[0]);
        assert!(s[1].length() < 1e-10, "plane has no second derivative");
    }

    #[test]
    fn test_angle_law_aligns_with_edge() {
        let plane = bilinear(
            DVec3::ZERO,
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(1.0, 1.0, 0.0),
        );
        let pcurve = BSplineCurve::line(DVec3::new(0.0, 0.5, 0.0), DVec3::new(1.0, 0.5, 0.0));
        let mut edge = EdgeOnFace::new(pcurve, plane, 1).unwrap();
        edge.angle = ValueOnEdge::constant((0.0, 1.0), 0.0);

        let p = edge.point_on_edge(0.3).unwrap();
        let t = p.tangent().unwrap();
        assert!(
            (t - DVec3::new(1.0, 0.0, 0.0)).length() < 1e-10,
            "zero angle follows the edge direction, got {:?}",
            t
        );
    }

    #[test]
    fn test_edge_3d_follows_surface() {
        // Saddle surface, diagonal edge
        let s = bilinear(
            DVec3::ZERO,
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(1.0, 1.0, 1.0),
        );
        let pcurve = BSplineCurve::line(DVec3::ZERO, DVec3::new(1.0, 1.0, 0.0));
        let edge = EdgeOnFace::new(pcurve, s, 1).unwrap();
        let c = edge.edge_3d(17).unwrap();
        for i in 0..=16 {
            let t = i as f64 / 16.0;
            assert!(
                c.point_at(t).distance(edge.point_3d(t)) < 1e-9,
                "edge curve off at t={}",
                t
            );
        }
    }

    #[test]
    fn test_order_cap() {
        let plane = bilinear(
            DVec3::ZERO,
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(1.0, 1.0, 0.0),
        );
        let pcurve = BSplineCurve::line(DVec3::ZERO, DVec3::new(1.0, 0.0, 0.0));
        assert!(EdgeOnFace::new(pcurve, plane, 5).is_err());
    }
}
