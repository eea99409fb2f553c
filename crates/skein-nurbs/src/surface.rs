//! Tensor-product rational B-spline surfaces.

use serde::{Deserialize, Serialize};
use skein_core::{Result, SkeinError};
use skein_math::{DVec4, Point3, Vector3};

use crate::basis::{ders_basis_functions, find_span};
use crate::curve::{
    bezier_elevate, binomial, boehm_clamped, boehm_periodic, extended_flat, BSplineCurve,
};
use crate::knot::{unify_knots, KnotVector, KnotWorkpiece};

/// A rational B-spline surface. `poles[i][j]` is the pole at u-index
/// `i` and v-index `j`; each direction carries the same clamped or
/// periodic invariant as a curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BSplineSurface {
    pub u_degree: usize,
    pub v_degree: usize,
    pub poles: Vec<Vec<Point3>>,
    pub weights: Vec<Vec<f64>>,
    pub u_knots: KnotVector,
    pub v_knots: KnotVector,
    pub u_periodic: bool,
    pub v_periodic: bool,
}

impl BSplineSurface {
    pub fn new(
        u_degree: usize,
        v_degree: usize,
        poles: Vec<Vec<Point3>>,
        u_knots: KnotVector,
        v_knots: KnotVector,
    ) -> Result<Self> {
        let weights = poles.iter().map(|row| vec![1.0; row.len()]).collect();
        Self::rational(u_degree, v_degree, poles, weights, u_knots, v_knots, false, false)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn rational(
        u_degree: usize,
        v_degree: usize,
        poles: Vec<Vec<Point3>>,
        weights: Vec<Vec<f64>>,
        u_knots: KnotVector,
        v_knots: KnotVector,
        u_periodic: bool,
        v_periodic: bool,
    ) -> Result<Self> {
        let s = Self {
            u_degree,
            v_degree,
            poles,
            weights,
            u_knots,
            v_knots,
            u_periodic,
            v_periodic,
        };
        s.validate()?;
        Ok(s)
    }

    fn validate(&self) -> Result<()> {
        if self.u_degree == 0 || self.v_degree == 0 {
            return Err(SkeinError::Domain("surface degrees must be >= 1".into()));
        }
        let nu = self.poles.len();
        if nu == 0 {
            return Err(SkeinError::Domain("empty pole grid".into()));
        }
        let nv = self.poles[0].len();
        if self.poles.iter().any(|row| row.len() != nv) {
            return Err(SkeinError::Domain("ragged pole grid".into()));
        }
        if self.weights.len() != nu || self.weights.iter().any(|row| row.len() != nv) {
            return Err(SkeinError::Domain(
                "weight grid shape differs from pole grid".into(),
            ));
        }
        if self.weights.iter().flatten().any(|&w| w <= 0.0) {
            return Err(SkeinError::Domain(
                "weights must be strictly positive".into(),
            ));
        }
        check_direction(self.u_degree, nu, &self.u_knots, self.u_periodic, "u")?;
        check_direction(self.v_degree, nv, &self.v_knots, self.v_periodic, "v")?;
        Ok(())
    }

    pub fn nb_u_poles(&self) -> usize {
        self.poles.len()
    }

    pub fn nb_v_poles(&self) -> usize {
        self.poles[0].len()
    }

    pub fn u_range(&self) -> (f64, f64) {
        (self.u_knots.first(), self.u_knots.last())
    }

    pub fn v_range(&self) -> (f64, f64) {
        (self.v_knots.first(), self.v_knots.last())
    }

    fn homogeneous(&self) -> Vec<Vec<DVec4>> {
        self.poles
            .iter()
            .zip(&self.weights)
            .map(|(prow, wrow)| {
                prow.iter()
                    .zip(wrow)
                    .map(|(p, &w)| DVec4::new(p.x * w, p.y * w, p.z * w, w))
                    .collect()
            })
            .collect()
    }

    fn set_homogeneous(&mut self, h: Vec<Vec<DVec4>>) {
        self.poles = h
            .iter()
            .map(|row| row.iter().map(|v| v.truncate() / v.w).collect())
            .collect();
        self.weights = h
            .iter()
            .map(|row| row.iter().map(|v| v.w).collect())
            .collect();
    }

    fn wrap_u(&self, u: f64) -> f64 {
        if !self.u_periodic {
            return u;
        }
        let lo = self.u_knots.first();
        lo + (u - lo).rem_euclid(self.u_knots.span())
    }

    fn wrap_v(&self, v: f64) -> f64 {
        if !self.v_periodic {
            return v;
        }
        let lo = self.v_knots.first();
        lo + (v - lo).rem_euclid(self.v_knots.span())
    }

    /// Flat knots per direction and the homogeneous pole grid, wrapped
    /// where a direction is periodic.
    fn eval_arrays(&self) -> (Vec<f64>, Vec<f64>, Vec<Vec<DVec4>>) {
        let h = self.homogeneous();
        let nu = h.len();
        let nv = h[0].len();
        let fu = if self.u_periodic {
            extended_flat(&self.u_knots, self.u_degree)
        } else {
            self.u_knots.flat()
        };
        let fv = if self.v_periodic {
            extended_flat(&self.v_knots, self.v_degree)
        } else {
            self.v_knots.flat()
        };
        let rows = if self.u_periodic { nu + self.u_degree } else { nu };
        let cols = if self.v_periodic { nv + self.v_degree } else { nv };
        let ri = |i: usize| {
            if self.u_periodic {
                (i + nu - self.u_degree) % nu
            } else {
                i
            }
        };
        let ci = |j: usize| {
            if self.v_periodic {
                (j + nv - self.v_degree) % nv
            } else {
                j
            }
        };
        let grid = (0..rows)
            .map(|i| (0..cols).map(|j| h[ri(i)][ci(j)]).collect())
            .collect();
        (fu, fv, grid)
    }

    /// Evaluate all partial derivatives up to total order `d` (at most
    /// 4). Returns a `(d + 1) x (d + 1)` table whose `[k][l]` entry is
    /// the mixed partial of order `k` in u and `l` in v; entries with
    /// `k + l > d` stay zero.
    pub fn derivatives(&self, u: f64, v: f64, d: usize) -> Vec<Vec<Vector3>> {
        let u = self.wrap_u(u);
        let v = self.wrap_v(v);
        let (fu, fv, h) = self.eval_arrays();
        let pu = self.u_degree;
        let pv = self.v_degree;
        let su = find_span(pu, &fu, h.len() - 1, u);
        let sv = find_span(pv, &fv, h[0].len() - 1, v);
        let du = ders_basis_functions(pu, &fu, su, u, d);
        let dv = ders_basis_functions(pv, &fv, sv, v, d);

        // Homogeneous mixed partials A[k][l]
        let mut a = vec![vec![DVec4::ZERO; d + 1]; d + 1];
        for k in 0..=d {
            for l in 0..=(d - k) {
                let mut acc = DVec4::ZERO;
                for (i, &bu) in du[k].iter().enumerate() {
                    let mut inner = DVec4::ZERO;
                    for (j, &bv) in dv[l].iter().enumerate() {
                        inner += bv * h[su - pu + i][sv - pv + j];
                    }
                    acc += bu * inner;
                }
                a[k][l] = acc;
            }
        }

        // Rational correction: two-dimensional Leibniz on A = w S
        let w0 = a[0][0].w;
        let mut out = vec![vec![Vector3::ZERO; d + 1]; d + 1];
        for order in 0..=d {
            for k in 0..=order {
                let l = order - k;
                let mut val = a[k][l].truncate();
                for i in 0..=k {
                    for j in 0..=l {
                        if i == 0 && j == 0 {
                            continue;
                        }
                        val -= binomial(k, i) * binomial(l, j) * a[i][j].w * out[k - i][l - j];
                    }
                }
                out[k][l] = val / w0;
            }
        }
        out
    }

    pub fn point_at(&self, u: f64, v: f64) -> Point3 {
        self.derivatives(u, v, 0)[0][0]
    }

    /// Unit normal, or None where the first partials are parallel.
    pub fn normal_at(&self, u: f64, v: f64) -> Option<Vector3> {
        let d = self.derivatives(u, v, 1);
        d[1][0].cross(d[0][1]).try_normalize()
    }

    /// The iso-parameter curve at fixed `v`, running in u.
    pub fn iso_v(&self, v: f64) -> BSplineCurve {
        let v = self.wrap_v(v);
        let h = self.homogeneous();
        let nv = h[0].len();
        let pv = self.v_degree;
        let fv = if self.v_periodic {
            extended_flat(&self.v_knots, pv)
        } else {
            self.v_knots.flat()
        };
        let cols = if self.v_periodic { nv + pv } else { nv };
        let sv = find_span(pv, &fv, cols - 1, v);
        let basis = ders_basis_functions(pv, &fv, sv, v, 0);
        let ci = |j: usize| {
            if self.v_periodic {
                (j + nv - pv) % nv
            } else {
                j
            }
        };
        let hp: Vec<DVec4> = h
            .iter()
            .map(|row| {
                let mut acc = DVec4::ZERO;
                for (j, &b) in basis[0].iter().enumerate() {
                    acc += b * row[ci(sv - pv + j)];
                }
                acc
            })
            .collect();
        BSplineCurve {
            degree: self.u_degree,
            poles: hp.iter().map(|h| h.truncate() / h.w).collect(),
            weights: hp.iter().map(|h| h.w).collect(),
            knots: self.u_knots.clone(),
            periodic: self.u_periodic,
        }
    }

    /// The iso-parameter curve at fixed `u`, running in v.
    pub fn iso_u(&self, u: f64) -> BSplineCurve {
        let mut flipped = self.clone();
        flipped.exchange_uv();
        flipped.iso_v(u)
    }

    /// Swap the two parameter directions in place.
    pub fn exchange_uv(&mut self) {
        let nu = self.nb_u_poles();
        let nv = self.nb_v_poles();
        let mut poles = vec![vec![Point3::ZERO; nu]; nv];
        let mut weights = vec![vec![0.0; nu]; nv];
        for i in 0..nu {
            for j in 0..nv {
                poles[j][i] = self.poles[i][j];
                weights[j][i] = self.weights[i][j];
            }
        }
        self.poles = poles;
        self.weights = weights;
        std::mem::swap(&mut self.u_knots, &mut self.v_knots);
        std::mem::swap(&mut self.u_degree, &mut self.v_degree);
        std::mem::swap(&mut self.u_periodic, &mut self.v_periodic);
    }

    /// Reverse the u direction in place.
    pub fn reverse_u(&mut self) {
        self.poles.reverse();
        self.weights.reverse();
        if self.u_periodic {
            self.poles.rotate_right(1);
            self.weights.rotate_right(1);
        }
        self.u_knots.reverse();
    }

    /// Reverse the v direction in place.
    pub fn reverse_v(&mut self) {
        self.exchange_uv();
        self.reverse_u();
        self.exchange_uv();
    }

    /// Insert `u` in the u direction until its multiplicity reaches
    /// `target_mult`; the geometry is unchanged.
    pub fn insert_knot_u(&mut self, u: f64, target_mult: usize, tol: f64) -> Result<()> {
        let (lo, hi) = self.u_range();
        let u = self.wrap_u(u);
        if !self.u_periodic && (u < lo - tol || u > hi + tol) {
            return Err(SkeinError::Domain(format!(
                "knot {} out of range [{}, {}]",
                u, lo, hi
            )));
        }
        let target = target_mult.min(self.u_degree);
        loop {
            let current = self
                .u_knots
                .find(u, tol)
                .map(|i| self.u_knots.mults[i])
                .unwrap_or(0);
            if current >= target {
                return Ok(());
            }
            self.insert_once_u(u, tol)?;
        }
    }

    /// Insert `v` in the v direction until its multiplicity reaches
    /// `target_mult`.
    pub fn insert_knot_v(&mut self, v: f64, target_mult: usize, tol: f64) -> Result<()> {
        self.exchange_uv();
        let r = self.insert_knot_u(v, target_mult, tol);
        self.exchange_uv();
        r
    }

    fn insert_once_u(&mut self, u: f64, tol: f64) -> Result<()> {
        let h = self.homogeneous();
        let nu = h.len();
        let nv = h[0].len();
        let flat = self.u_knots.flat();
        let mut new_cols: Vec<Vec<DVec4>> = Vec::with_capacity(nv);
        for j in 0..nv {
            let col: Vec<DVec4> = (0..nu).map(|i| h[i][j]).collect();
            let out = if self.u_periodic {
                boehm_periodic(self.u_degree, &self.u_knots, &col, u)
            } else {
                boehm_clamped(self.u_degree, &flat, &col, u)
            };
            new_cols.push(out);
        }
        let new_nu = new_cols[0].len();
        let grid: Vec<Vec<DVec4>> = (0..new_nu)
            .map(|i| (0..nv).map(|j| new_cols[j][i]).collect())
            .collect();
        self.set_homogeneous(grid);

        let nb = self.u_knots.nb_knots();
        if let Some(idx) = self.u_knots.find(u, tol) {
            self.u_knots.mults[idx] += 1;
            if self.u_periodic && idx == 0 {
                self.u_knots.mults[nb - 1] += 1;
            }
        } else {
            self.u_knots.insert_raw(u, tol);
        }
        Ok(())
    }

    /// Elevate the u degree of a clamped direction, by Bezier
    /// decomposition of every pole column.
    pub fn elevate_degree_u(&mut self, target_degree: usize, tol: f64) -> Result<()> {
        if target_degree <= self.u_degree {
            return Ok(());
        }
        if self.u_periodic {
            return Err(SkeinError::Domain(
                "degree elevation of a periodic direction is not supported".into(),
            ));
        }
        let p = self.u_degree;
        let q = target_degree;

        let mut work = self.clone();
        let interior: Vec<f64> = work.u_knots.knots[1..work.u_knots.nb_knots() - 1].to_vec();
        for u in interior {
            work.insert_knot_u(u, p, tol)?;
        }
        let h = work.homogeneous();
        let nv = h[0].len();
        let nb_spans = work.u_knots.nb_knots() - 1;

        let mut cols: Vec<Vec<DVec4>> = vec![Vec::with_capacity(nb_spans * q + 1); nv];
        for s in 0..nb_spans {
            for (j, col) in cols.iter_mut().enumerate() {
                let seg: Vec<DVec4> = (s * p..s * p + p + 1).map(|i| h[i][j]).collect();
                let elevated = bezier_elevate(&seg, q);
                let skip = if s == 0 { 0 } else { 1 };
                col.extend_from_slice(&elevated[skip..]);
            }
        }
        let new_nu = cols[0].len();
        let grid: Vec<Vec<DVec4>> = (0..new_nu)
            .map(|i| (0..nv).map(|j| cols[j][i]).collect())
            .collect();

        let mults: Vec<usize> = (0..work.u_knots.nb_knots())
            .map(|i| {
                if i == 0 || i + 1 == work.u_knots.nb_knots() {
                    q + 1
                } else {
                    q
                }
            })
            .collect();
        self.u_degree = q;
        self.u_knots = KnotVector::new(work.u_knots.knots.clone(), mults)?;
        self.set_homogeneous(grid);
        Ok(())
    }

    pub fn elevate_degree_v(&mut self, target_degree: usize, tol: f64) -> Result<()> {
        self.exchange_uv();
        let r = self.elevate_degree_u(target_degree, tol);
        self.exchange_uv();
        r
    }

    /// Linear blend of two curves: u follows the curves, v runs from
    /// `a` (v=0) to `b` (v=1). The inputs are elevated and refined to a
    /// common knot structure first.
    pub fn ruled(a: &BSplineCurve, b: &BSplineCurve, tol: f64) -> Result<BSplineSurface> {
        if a.periodic != b.periodic {
            return Err(SkeinError::Compatibility(
                "cannot rule between a periodic and a clamped curve".into(),
            ));
        }
        let mut ca = a.clone();
        let mut cb = b.clone();
        let q = ca.degree.max(cb.degree);
        ca.elevate_degree(q, tol)?;
        cb.elevate_degree(q, tol)?;
        ca.normalize_knots();
        cb.normalize_knots();
        let mut pair = [ca, cb];
        unify_knots(&mut pair, tol)?;
        let [ca, cb] = pair;

        let poles = ca
            .poles
            .iter()
            .zip(&cb.poles)
            .map(|(&pa, &pb)| vec![pa, pb])
            .collect();
        let weights = ca
            .weights
            .iter()
            .zip(&cb.weights)
            .map(|(&wa, &wb)| vec![wa, wb])
            .collect();
        BSplineSurface::rational(
            ca.degree,
            1,
            poles,
            weights,
            ca.knots.clone(),
            KnotVector::new(vec![0.0, 1.0], vec![2, 2])?,
            ca.periodic,
            false,
        )
    }
}

fn check_direction(
    degree: usize,
    nb_poles: usize,
    kv: &KnotVector,
    periodic: bool,
    name: &str,
) -> Result<()> {
    let total = kv.total_mult();
    if periodic {
        let m_first = kv.mults[0];
        let m_last = *kv.mults.last().unwrap();
        if m_first != m_last {
            return Err(SkeinError::Domain(format!(
                "periodic {} direction needs equal boundary multiplicities",
                name
            )));
        }
        if nb_poles != total - m_last || nb_poles < degree {
            return Err(SkeinError::Domain(format!(
                "periodic {} direction pole count {} does not match knot structure",
                name, nb_poles
            )));
        }
    } else if total != nb_poles + degree + 1 {
        return Err(SkeinError::Domain(format!(
            "{} direction: sum of multiplicities {} != nb_poles {} + degree {} + 1",
            name, total, nb_poles, degree
        )));
    }
    Ok(())
}

/// Which parameter direction of a surface an adapter exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfDirection {
    U,
    V,
}

/// A surface viewed along one parameter direction, so that surfaces and
/// curves can go through the same knot unification.
#[derive(Debug, Clone)]
pub struct SurfaceAdapter {
    pub surface: BSplineSurface,
    pub dir: SurfDirection,
}

impl SurfaceAdapter {
    pub fn new(surface: BSplineSurface, dir: SurfDirection) -> Self {
        Self { surface, dir }
    }

    pub fn into_surface(self) -> BSplineSurface {
        self.surface
    }
}

impl KnotWorkpiece for SurfaceAdapter {
    fn degree(&self) -> usize {
        match self.dir {
            SurfDirection::U => self.surface.u_degree,
            SurfDirection::V => self.surface.v_degree,
        }
    }

    fn knot_vector(&self) -> &KnotVector {
        match self.dir {
            SurfDirection::U => &self.surface.u_knots,
            SurfDirection::V => &self.surface.v_knots,
        }
    }

    fn insert_knot(&mut self, u: f64, mult: usize, tol: f64) -> Result<()> {
        match self.dir {
            SurfDirection::U => self.surface.insert_knot_u(u, mult, tol),
            SurfDirection::V => self.surface.insert_knot_v(u, mult, tol),
        }
    }
}
