//! Rational B-spline curves.

use serde::{Deserialize, Serialize};
use skein_core::{Result, SkeinError};
use skein_math::{DVec4, Frame, Point3, Vector3};

use crate::basis::{ders_basis_functions, find_span};
use crate::knot::{KnotVector, KnotWorkpiece};

/// A rational B-spline curve.
///
/// Clamped invariant: `sum(mults) == nb_poles + degree + 1`.
/// Periodic invariant: first and last multiplicities are equal and
/// `nb_poles == sum(mults) - mults[last]`; poles wrap around the seam.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BSplineCurve {
    pub degree: usize,
    pub poles: Vec<Point3>,
    pub weights: Vec<f64>,
    pub knots: KnotVector,
    pub periodic: bool,
}

impl BSplineCurve {
    /// Non-rational clamped curve.
    pub fn new(degree: usize, poles: Vec<Point3>, knots: KnotVector) -> Result<Self> {
        let weights = vec![1.0; poles.len()];
        Self::rational(degree, poles, weights, knots)
    }

    /// Rational clamped curve.
    pub fn rational(
        degree: usize,
        poles: Vec<Point3>,
        weights: Vec<f64>,
        knots: KnotVector,
    ) -> Result<Self> {
        let c = Self {
            degree,
            poles,
            weights,
            knots,
            periodic: false,
        };
        c.validate()?;
        Ok(c)
    }

    /// Rational periodic curve; poles wrap across the seam.
    pub fn periodic(
        degree: usize,
        poles: Vec<Point3>,
        weights: Vec<f64>,
        knots: KnotVector,
    ) -> Result<Self> {
        let c = Self {
            degree,
            poles,
            weights,
            knots,
            periodic: true,
        };
        c.validate()?;
        Ok(c)
    }

    /// Straight segment as a degree-1 spline over [0, 1].
    pub fn line(a: Point3, b: Point3) -> Self {
        Self {
            degree: 1,
            poles: vec![a, b],
            weights: vec![1.0, 1.0],
            knots: KnotVector::new(vec![0.0, 1.0], vec![2, 2]).unwrap(),
            periodic: false,
        }
    }

    /// Full circle as a clamped rational quadratic over [0, 1]
    /// (nine poles, four arcs).
    pub fn circle(center: Point3, normal: Vector3, radius: f64) -> Result<Self> {
        let frame = Frame::from_z(center, normal)
            .ok_or_else(|| SkeinError::Domain("circle normal is degenerate".into()))?;
        if radius <= 0.0 {
            return Err(SkeinError::Domain(format!(
                "circle radius must be positive, got {}",
                radius
            )));
        }
        let w = 1.0 / 2.0_f64.sqrt();
        let local = [
            (1.0, 0.0, 1.0),
            (1.0, 1.0, w),
            (0.0, 1.0, 1.0),
            (-1.0, 1.0, w),
            (-1.0, 0.0, 1.0),
            (-1.0, -1.0, w),
            (0.0, -1.0, 1.0),
            (1.0, -1.0, w),
            (1.0, 0.0, 1.0),
        ];
        let poles = local
            .iter()
            .map(|&(x, y, _)| frame.to_global(Point3::new(x * radius, y * radius, 0.0)))
            .collect();
        let weights = local.iter().map(|&(_, _, w)| w).collect();
        let knots = KnotVector::new(vec![0.0, 0.25, 0.5, 0.75, 1.0], vec![3, 2, 2, 2, 3])?;
        Self::rational(2, poles, weights, knots)
    }

    fn validate(&self) -> Result<()> {
        if self.degree == 0 {
            return Err(SkeinError::Domain("degree must be >= 1".into()));
        }
        if self.poles.len() != self.weights.len() {
            return Err(SkeinError::Domain(format!(
                "pole/weight count mismatch: {} vs {}",
                self.poles.len(),
                self.weights.len()
            )));
        }
        if self.weights.iter().any(|&w| w <= 0.0) {
            return Err(SkeinError::Domain(
                "weights must be strictly positive".into(),
            ));
        }
        let total = self.knots.total_mult();
        if self.periodic {
            let m_first = self.knots.mults[0];
            let m_last = *self.knots.mults.last().unwrap();
            if m_first != m_last {
                return Err(SkeinError::Domain(format!(
                    "periodic curve needs equal boundary multiplicities, got {} and {}",
                    m_first, m_last
                )));
            }
            if self.poles.len() != total - m_last {
                return Err(SkeinError::Domain(format!(
                    "periodic pole count {} does not match knot structure (expected {})",
                    self.poles.len(),
                    total - m_last
                )));
            }
            if self.poles.len() < self.degree {
                return Err(SkeinError::Domain(
                    "periodic curve needs at least `degree` poles".into(),
                ));
            }
        } else if total != self.poles.len() + self.degree + 1 {
            return Err(SkeinError::Domain(format!(
                "sum of multiplicities {} != nb_poles {} + degree {} + 1",
                total,
                self.poles.len(),
                self.degree
            )));
        }
        Ok(())
    }

    pub fn nb_poles(&self) -> usize {
        self.poles.len()
    }

    pub fn first_parameter(&self) -> f64 {
        self.knots.first()
    }

    pub fn last_parameter(&self) -> f64 {
        self.knots.last()
    }

    pub fn is_rational(&self) -> bool {
        self.weights.iter().any(|&w| (w - 1.0).abs() > 1e-15)
    }

    fn homogeneous(&self) -> Vec<DVec4> {
        self.poles
            .iter()
            .zip(&self.weights)
            .map(|(p, &w)| DVec4::new(p.x * w, p.y * w, p.z * w, w))
            .collect()
    }

    /// Flat knots and (possibly wrapped) homogeneous poles ready for
    /// span/basis evaluation.
    fn eval_arrays(&self) -> (Vec<f64>, Vec<DVec4>) {
        let h = self.homogeneous();
        if !self.periodic {
            return (self.knots.flat(), h);
        }
        (
            extended_flat(&self.knots, self.degree),
            wrap_poles(&h, self.degree),
        )
    }

    /// Wrap a parameter into the period for periodic curves.
    fn wrap(&self, t: f64) -> f64 {
        if !self.periodic {
            return t;
        }
        let lo = self.first_parameter();
        let period = self.knots.span();
        lo + (t - lo).rem_euclid(period)
    }

    /// Evaluate the curve and its derivatives up to order `d`.
    ///
    /// Returns `d + 1` vectors: point, first derivative, and so on. The
    /// rational correction follows the Leibniz expansion of `A = w C`.
    pub fn derivatives(&self, t: f64, d: usize) -> Vec<Vector3> {
        let t = self.wrap(t);
        let (flat, hp) = self.eval_arrays();
        let p = self.degree;
        let n = hp.len() - 1;
        let span = find_span(p, &flat, n, t);
        let ders = ders_basis_functions(p, &flat, span, t, d);

        let mut hders = vec![DVec4::ZERO; d + 1];
        for (k, row) in ders.iter().enumerate() {
            for (j, &b) in row.iter().enumerate() {
                hders[k] += b * hp[span - p + j];
            }
        }

        let mut out = vec![Vector3::ZERO; d + 1];
        let w0 = hders[0].w;
        for k in 0..=d {
            let mut v = hders[k].truncate();
            for i in 1..=k {
                v -= binomial(k, i) * hders[i].w * out[k - i];
            }
            out[k] = v / w0;
        }
        out
    }

    pub fn point_at(&self, t: f64) -> Point3 {
        self.derivatives(t, 0)[0]
    }

    pub fn tangent_at(&self, t: f64) -> Vector3 {
        self.derivatives(t, 1)[1]
    }

    /// Curvature magnitude |C' x C''| / |C'|^3.
    pub fn curvature_at(&self, t: f64) -> f64 {
        let d = self.derivatives(t, 2);
        let v = d[1].length();
        if v < 1e-15 {
            return 0.0;
        }
        d[1].cross(d[2]).length() / (v * v * v)
    }

    pub fn start_point(&self) -> Point3 {
        self.point_at(self.first_parameter())
    }

    pub fn end_point(&self) -> Point3 {
        self.point_at(self.last_parameter())
    }

    /// Whether start and end points coincide within `tol`.
    pub fn is_closed(&self, tol: f64) -> bool {
        self.periodic || self.start_point().distance(self.end_point()) < tol
    }

    /// `n` points sampled uniformly in parameter over the full range.
    pub fn sample(&self, n: usize) -> Vec<Point3> {
        let lo = self.first_parameter();
        let hi = self.last_parameter();
        (0..n)
            .map(|i| self.point_at(lo + (hi - lo) * i as f64 / (n - 1).max(1) as f64))
            .collect()
    }

    /// Reverse the curve's orientation in place.
    pub fn reverse(&mut self) {
        self.poles.reverse();
        self.weights.reverse();
        if self.periodic {
            // Periodic pole ordering wraps; reversing the list shifts the
            // seam pole, so rotate it back to the front.
            self.poles.rotate_right(1);
            self.weights.rotate_right(1);
        }
        self.knots.reverse();
    }

    /// Affine remap of the parameter range.
    pub fn scale_knots(&mut self, a: f64, b: f64) -> Result<()> {
        self.knots.scale_to_bounds(a, b)
    }

    /// Remap the parameter range onto [0, 1].
    pub fn normalize_knots(&mut self) {
        self.knots.normalize();
    }

    /// Insert knot `u` until its multiplicity reaches `target_mult`
    /// (Boehm's algorithm on homogeneous poles). The geometry is
    /// unchanged.
    pub fn insert_knot(&mut self, u: f64, target_mult: usize, tol: f64) -> Result<()> {
        let lo = self.first_parameter();
        let hi = self.last_parameter();
        let u = self.wrap(u);
        if !self.periodic && (u < lo - tol || u > hi + tol) {
            return Err(SkeinError::Domain(format!(
                "knot {} out of range [{}, {}]",
                u, lo, hi
            )));
        }
        let cap = if self.periodic {
            self.degree
        } else if self.knots.find(u, tol) == Some(0)
            || self.knots.find(u, tol) == Some(self.knots.nb_knots() - 1)
        {
            self.degree + 1
        } else {
            self.degree
        };
        let target = target_mult.min(cap);
        loop {
            let current = self
                .knots
                .find(u, tol)
                .map(|i| self.knots.mults[i])
                .unwrap_or(0);
            if current >= target {
                return Ok(());
            }
            if self.periodic {
                self.insert_once_periodic(u, tol)?;
            } else {
                self.insert_once_clamped(u, tol)?;
            }
        }
    }

    fn insert_once_clamped(&mut self, u: f64, tol: f64) -> Result<()> {
        let flat = self.knots.flat();
        let new_h = boehm_clamped(self.degree, &flat, &self.homogeneous(), u);
        self.set_homogeneous(new_h);
        self.knots.insert_raw(u, tol);
        Ok(())
    }

    fn insert_once_periodic(&mut self, u: f64, tol: f64) -> Result<()> {
        let new_h = boehm_periodic(self.degree, &self.knots, &self.homogeneous(), u);
        self.set_homogeneous(new_h);
        // Raising the seam knot raises both boundary entries
        let nb = self.knots.nb_knots();
        if let Some(idx) = self.knots.find(u, tol) {
            self.knots.mults[idx] += 1;
            if idx == 0 {
                self.knots.mults[nb - 1] += 1;
            }
        } else {
            self.knots.insert_raw(u, tol);
        }
        Ok(())
    }

    fn set_homogeneous(&mut self, h: Vec<DVec4>) {
        self.poles = h.iter().map(|v| v.truncate() / v.w).collect();
        self.weights = h.iter().map(|v| v.w).collect();
    }

    /// Elevate a clamped curve to `target_degree` (no-op when already
    /// there). Works by Bezier decomposition: each span is elevated
    /// independently and the spans reassembled with full interior
    /// multiplicities.
    pub fn elevate_degree(&mut self, target_degree: usize, tol: f64) -> Result<()> {
        if target_degree <= self.degree {
            return Ok(());
        }
        if self.periodic {
            return Err(SkeinError::Domain(
                "degree elevation of a periodic curve is not supported".into(),
            ));
        }
        let p = self.degree;
        let q = target_degree;

        // Decompose into Bezier spans
        let mut work = self.clone();
        let interior: Vec<f64> = work.knots.knots[1..work.knots.nb_knots() - 1].to_vec();
        for u in interior {
            work.insert_knot(u, p, tol)?;
        }
        let h = work.homogeneous();
        let nb_spans = work.knots.nb_knots() - 1;

        // Elevate each Bezier span, sharing boundary poles
        let mut new_h: Vec<DVec4> = Vec::with_capacity(nb_spans * q + 1);
        for s in 0..nb_spans {
            let seg: Vec<DVec4> = h[s * p..s * p + p + 1].to_vec();
            let elevated = bezier_elevate(&seg, q);
            let skip = if s == 0 { 0 } else { 1 };
            new_h.extend_from_slice(&elevated[skip..]);
        }

        let mults: Vec<usize> = (0..work.knots.nb_knots())
            .map(|i| {
                if i == 0 || i + 1 == work.knots.nb_knots() {
                    q + 1
                } else {
                    q
                }
            })
            .collect();
        self.degree = q;
        self.knots = KnotVector::new(work.knots.knots.clone(), mults)?;
        self.set_homogeneous(new_h);
        Ok(())
    }

    /// Extract the sub-curve over `[u1, u2]` as a clamped curve.
    pub fn segment(&self, u1: f64, u2: f64, tol: f64) -> Result<BSplineCurve> {
        if self.periodic {
            return Err(SkeinError::Domain(
                "segment of a periodic curve is not supported; shift the origin instead".into(),
            ));
        }
        let lo = self.first_parameter();
        let hi = self.last_parameter();
        if u1 >= u2 || u1 < lo - tol || u2 > hi + tol {
            return Err(SkeinError::Domain(format!(
                "segment range [{}, {}] invalid within [{}, {}]",
                u1, u2, lo, hi
            )));
        }
        let p = self.degree;
        let mut work = self.clone();
        if !work.knots.find(u1, tol).map(|i| i == 0).unwrap_or(false) {
            work.insert_knot(u1, p, tol)?;
        }
        if !work
            .knots
            .find(u2, tol)
            .map(|i| i + 1 == work.knots.nb_knots())
            .unwrap_or(false)
        {
            work.insert_knot(u2, p, tol)?;
        }

        let flat = work.knots.flat();
        let first_idx = flat.iter().take_while(|&&k| k < u1 - tol).count();
        let mult_u1 = flat[first_idx..]
            .iter()
            .take_while(|&&k| (k - u1).abs() <= tol)
            .count();
        let start = first_idx - (p + 1 - mult_u1.min(p + 1));
        let interior: Vec<(f64, usize)> = work
            .knots
            .knots
            .iter()
            .zip(&work.knots.mults)
            .filter(|(&k, _)| k > u1 + tol && k < u2 - tol)
            .map(|(&k, &m)| (k, m))
            .collect();
        let nb_interior: usize = interior.iter().map(|(_, m)| m).sum();
        let count = nb_interior + p + 1;

        let poles = work.poles[start..start + count].to_vec();
        let weights = work.weights[start..start + count].to_vec();
        let mut knots = vec![u1];
        let mut mults = vec![p + 1];
        for (k, m) in interior {
            knots.push(k);
            mults.push(m);
        }
        knots.push(u2);
        mults.push(p + 1);
        BSplineCurve::rational(p, poles, weights, KnotVector::new(knots, mults)?)
    }

    /// Split the curve at every parameter in `params`.
    pub fn split(&self, params: &[f64], tol: f64) -> Result<Vec<BSplineCurve>> {
        let mut cuts: Vec<f64> = params
            .iter()
            .copied()
            .filter(|&u| u > self.first_parameter() + tol && u < self.last_parameter() - tol)
            .collect();
        cuts.sort_by(|a, b| a.total_cmp(b));
        cuts.dedup_by(|a, b| (*a - *b).abs() < tol);
        let mut bounds = vec![self.first_parameter()];
        bounds.extend(cuts);
        bounds.push(self.last_parameter());
        bounds
            .windows(2)
            .map(|w| self.segment(w[0], w[1], tol))
            .collect()
    }

    /// Chain C0-connected curves into a single spline. Curves are taken
    /// in order; each must start where the previous one ends (within
    /// `tol`). All inputs are elevated to the maximum degree first.
    pub fn join(curves: &[BSplineCurve], tol: f64) -> Result<BSplineCurve> {
        if curves.is_empty() {
            return Err(SkeinError::Domain("join of zero curves".into()));
        }
        if curves.iter().any(|c| c.periodic) {
            return Err(SkeinError::Domain("cannot join periodic curves".into()));
        }
        let max_degree = curves.iter().map(|c| c.degree).max().unwrap();
        let mut parts: Vec<BSplineCurve> = curves.to_vec();
        for c in &mut parts {
            c.elevate_degree(max_degree, tol)?;
            c.normalize_knots();
        }
        let mut result = parts[0].clone();
        for part in &parts[1..] {
            let gap = result.end_point().distance(part.start_point());
            if gap > tol {
                return Err(SkeinError::Domain(format!(
                    "curves are not C0-connected: gap {}",
                    gap
                )));
            }
            let offset = result.last_parameter();
            // Average the shared pole; drop the duplicate
            let seam = (result.poles.pop().unwrap() + part.poles[0]) / 2.0;
            result.poles.push(seam);
            result.poles.extend_from_slice(&part.poles[1..]);
            let wl = result.weights.pop().unwrap();
            result.weights.push((wl + part.weights[0]) / 2.0);
            result.weights.extend_from_slice(&part.weights[1..]);

            let last_idx = result.knots.nb_knots() - 1;
            result.knots.mults[last_idx] = max_degree;
            for (i, (&k, &m)) in part.knots.knots.iter().zip(&part.knots.mults).enumerate() {
                if i == 0 {
                    continue;
                }
                result.knots.knots.push(offset + k);
                result.knots.mults.push(m);
            }
        }
        result.validate()?;
        Ok(result)
    }

    /// Shift the origin of a periodic curve to the knot nearest `u`,
    /// inserting a knot there when none exists.
    pub fn shift_origin(&mut self, u: f64, tol: f64) -> Result<()> {
        if !self.periodic {
            return Err(SkeinError::Domain(
                "origin shift requires a periodic curve".into(),
            ));
        }
        let u = self.wrap(u);
        if self.knots.find(u, tol).is_none() {
            self.insert_knot(u, 1, tol)?;
        }
        let idx = self.knots.find(u, tol).unwrap();
        self.set_origin(idx)
    }

    /// Rotate a periodic curve so that knot `index` becomes the start.
    pub fn set_origin(&mut self, index: usize) -> Result<()> {
        if !self.periodic {
            return Err(SkeinError::Domain(
                "origin shift requires a periodic curve".into(),
            ));
        }
        if index == 0 || index + 1 >= self.knots.nb_knots() {
            return Ok(());
        }
        let period = self.knots.span();
        let k0 = self.knots.knots[0];
        let uk = self.knots.knots[index];

        let mut knots = Vec::with_capacity(self.knots.nb_knots());
        let mut mults = Vec::with_capacity(self.knots.nb_knots());
        for i in index..self.knots.nb_knots() - 1 {
            knots.push(self.knots.knots[i] - uk + k0);
            mults.push(self.knots.mults[i]);
        }
        for i in 0..index {
            knots.push(self.knots.knots[i] + period - uk + k0);
            mults.push(self.knots.mults[i]);
        }
        knots.push(k0 + period);
        mults.push(self.knots.mults[index]);

        let shift: usize = self.knots.mults[..index].iter().sum();
        let (np, nw) = (self.poles.len(), self.weights.len());
        self.poles.rotate_left(shift % np);
        self.weights.rotate_left(shift % nw);
        self.knots = KnotVector::new(knots, mults)?;
        self.validate()
    }

    /// Force the periodic representation of a geometrically closed
    /// clamped curve: boundary multiplicities drop to 1 and the
    /// wrapped pole count follows. Like the kernels, this may move the
    /// curve slightly when the seam is not smooth.
    pub fn to_periodic(&mut self) -> Result<()> {
        if self.periodic {
            return Ok(());
        }
        let mut mults = self.knots.mults.clone();
        let last = mults.len() - 1;
        mults[0] = 1;
        mults[last] = 1;
        let kv = KnotVector::new(self.knots.knots.clone(), mults)?;
        let nb = kv.total_mult() - 1;
        if nb < self.degree + 1 {
            return Err(SkeinError::Domain(
                "not enough knots for a periodic representation".into(),
            ));
        }
        self.poles.truncate(nb);
        self.weights.truncate(nb);
        self.knots = kv;
        self.periodic = true;
        self.validate()
    }

    /// Newton projection of `point` onto the curve, starting at `t0`.
    /// Returns the parameter and the distance.
    pub fn project_point(&self, point: Point3, t0: f64, max_iter: usize) -> (f64, f64) {
        let eps = 1e-10;
        let lo = self.first_parameter();
        let hi = self.last_parameter();
        let mut t = t0;
        for _ in 0..max_iter {
            let d = self.derivatives(t, 2);
            let r = d[0] - point;
            let df = r.dot(d[1]);
            let d2f = r.dot(d[2]) + d[1].length_squared();
            if d2f.abs() < 1e-15 {
                break;
            }
            let dt = -df / d2f;
            let mut t_new = t + dt;
            if !self.periodic {
                t_new = t_new.clamp(lo, hi);
            }
            let done = (t_new - t).abs() < eps;
            t = t_new;
            if done {
                break;
            }
        }
        (t, self.point_at(t).distance(point))
    }

    /// Coarse-sampled then Newton-refined closest parameter.
    pub fn closest_parameter(&self, point: Point3, samples: usize) -> (f64, f64) {
        let lo = self.first_parameter();
        let hi = self.last_parameter();
        let mut best = (lo, self.point_at(lo).distance(point));
        for i in 0..samples {
            let t = lo + (hi - lo) * i as f64 / (samples - 1).max(1) as f64;
            let d = self.point_at(t).distance(point);
            if d < best.1 {
                best = (t, d);
            }
        }
        self.project_point(point, best.0, 16)
    }
}

impl KnotWorkpiece for BSplineCurve {
    fn degree(&self) -> usize {
        self.degree
    }

    fn knot_vector(&self) -> &KnotVector {
        &self.knots
    }

    fn insert_knot(&mut self, u: f64, mult: usize, tol: f64) -> Result<()> {
        BSplineCurve::insert_knot(self, u, mult, tol)
    }
}

impl KnotVector {
    /// Insert a single occurrence of `u`, growing an existing knot's
    /// multiplicity by one when present. Internal helper for Boehm
    /// insertion; `insert` is the public max-multiplicity variant.
    pub(crate) fn insert_raw(&mut self, u: f64, tol: f64) {
        match self.find(u, tol) {
            Some(idx) => self.mults[idx] += 1,
            None => {
                let pos = self.knots.iter().take_while(|&&k| k < u).count();
                self.knots.insert(pos, u);
                self.mults.insert(pos, 1);
            }
        }
    }
}

/// Flat knots of one period, last knot's repetitions excluded.
pub(crate) fn period_flat(kv: &KnotVector) -> Vec<f64> {
    let mut g = Vec::with_capacity(kv.total_mult() - kv.mults[kv.nb_knots() - 1]);
    for (i, (&k, &m)) in kv.knots.iter().zip(&kv.mults).enumerate() {
        if i + 1 == kv.nb_knots() {
            break;
        }
        g.extend(std::iter::repeat(k).take(m));
    }
    g
}

/// Extended flat knot sequence of a periodic direction: one period plus
/// `degree` knots unwrapped on each side (and one closing knot).
pub(crate) fn extended_flat(kv: &KnotVector, degree: usize) -> Vec<f64> {
    let g = period_flat(kv);
    let n = g.len();
    let period = kv.span();
    let mut flat = Vec::with_capacity(n + 2 * degree + 1);
    for i in (n - degree)..n {
        flat.push(g[i] - period);
    }
    flat.extend_from_slice(&g);
    for i in 0..=degree {
        flat.push(g[i] + period);
    }
    flat
}

/// Collocation row of the `d`-th basis derivative for a periodic knot
/// vector: the wrapped basis columns fold onto the period's poles.
pub fn periodic_basis_row(degree: usize, kv: &KnotVector, t: f64, d: usize) -> Vec<f64> {
    let flat = extended_flat(kv, degree);
    let n = kv.total_mult() - kv.mults[kv.nb_knots() - 1];
    let span = find_span(degree, &flat, n + degree - 1, t);
    let ders = ders_basis_functions(degree, &flat, span, t, d);
    let mut row = vec![0.0; n];
    for (j, &val) in ders[d].iter().enumerate() {
        let i = span - degree + j;
        row[(i + n - degree) % n] += val;
    }
    row
}

/// Pole window aligned with `extended_flat`: the `n` poles of the
/// period, wrapped to `n + degree` entries.
pub(crate) fn wrap_poles(h: &[DVec4], degree: usize) -> Vec<DVec4> {
    let n = h.len();
    (0..n + degree).map(|i| h[(i + n - degree) % n]).collect()
}

/// One Boehm insertion of `u` into a clamped homogeneous pole row.
pub(crate) fn boehm_clamped(degree: usize, flat: &[f64], h: &[DVec4], u: f64) -> Vec<DVec4> {
    let p = degree;
    let n = h.len() - 1;
    let k = find_span(p, flat, n, u);
    let mut new_h = Vec::with_capacity(h.len() + 1);
    new_h.extend_from_slice(&h[..=k - p]);
    for i in (k - p + 1)..=k {
        let a = (u - flat[i]) / (flat[i + p] - flat[i]);
        new_h.push(a * h[i] + (1.0 - a) * h[i - 1]);
    }
    new_h.extend_from_slice(&h[k..]);
    new_h
}

/// One Boehm insertion of `u` into a periodic homogeneous pole row.
/// `u` must already lie within the knot range.
pub(crate) fn boehm_periodic(degree: usize, kv: &KnotVector, h: &[DVec4], u: f64) -> Vec<DVec4> {
    let p = degree;
    let n = h.len();
    let period = kv.span();
    // One-period flat knots g[0..n], tiled as g(x) = g[x mod n] + k*T
    let g = period_flat(kv);
    let gt = |x: isize| -> f64 {
        let idx = x.rem_euclid(n as isize) as usize;
        g[idx] + period * ((x - idx as isize) / n as isize) as f64
    };
    // Span j in [0, n): g(j) <= u < g(j+1)
    let mut j = n as isize - 1;
    for i in 0..n as isize {
        if gt(i) <= u && u < gt(i + 1) {
            j = i;
            break;
        }
    }

    let blend = |i: isize| -> DVec4 {
        let a = (u - gt(i)) / (gt(i + p as isize) - gt(i));
        let cur = i.rem_euclid(n as isize) as usize;
        let prev = (i - 1).rem_euclid(n as isize) as usize;
        a * h[cur] + (1.0 - a) * h[prev]
    };

    let n1 = n + 1;
    let mut out = vec![DVec4::ZERO; n1];
    let i0 = j - p as isize + 1;
    for i in i0..(i0 + n1 as isize) {
        let val = if i <= j {
            blend(i)
        } else {
            h[(i - 1).rem_euclid(n as isize) as usize]
        };
        out[i.rem_euclid(n1 as isize) as usize] = val;
    }
    out
}

pub(crate) fn binomial(n: usize, k: usize) -> f64 {
    let k = k.min(n - k);
    let mut r = 1.0;
    for i in 0..k {
        r = r * (n - i) as f64 / (i + 1) as f64;
    }
    r
}

/// Elevate a Bezier span (homogeneous poles) to degree `q`.
pub(crate) fn bezier_elevate(poles: &[DVec4], q: usize) -> Vec<DVec4> {
    let mut cur = poles.to_vec();
    while cur.len() - 1 < q {
        let p = cur.len() - 1;
        let mut next = Vec::with_capacity(p + 2);
        next.push(cur[0]);
        for i in 1..=p {
            let a = i as f64 / (p + 1) as f64;
            next.push(a * cur[i - 1] + (1.0 - a) * cur[i]);
        }
        next.push(cur[p]);
        cur = next;
    }
    cur
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_math::DVec3;

    fn quadratic_bezier() -> BSplineCurve {
        BSplineCurve::new(
            2,
            vec![
                DVec3::new(0.0, 0.0, 0.0),
                DVec3::new(0.5, 1.0, 0.0),
                DVec3::new(1.0, 0.0, 0.0),
            ],
            KnotVector::new(vec![0.0, 1.0], vec![3, 3]).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_quadratic_evaluation() {
        let c = quadratic_bezier();
        let p0 = c.point_at(0.0);
        assert!((p0 - DVec3::ZERO).length() < 1e-12);
        let p1 = c.point_at(1.0);
        assert!((p1 - DVec3::new(1.0, 0.0, 0.0)).length() < 1e-12);
        // Midpoint of quadratic Bezier: 0.25 P0 + 0.5 P1 + 0.25 P2
        let pm = c.point_at(0.5);
        assert!((pm - DVec3::new(0.5, 0.5, 0.0)).length() < 1e-12);
    }

    #[test]
    fn test_invariant_rejected() {
        let bad = BSplineCurve::new(
            2,
            vec![DVec3::ZERO, DVec3::X],
            KnotVector::new(vec![0.0, 1.0], vec![3, 3]).unwrap(),
        );
        assert!(bad.is_err());
        let bad_weight = BSplineCurve::rational(
            1,
            vec![DVec3::ZERO, DVec3::X],
            vec![1.0, -2.0],
            KnotVector::new(vec![0.0, 1.0], vec![2, 2]).unwrap(),
        );
        assert!(matches!(bad_weight, Err(SkeinError::Domain(_))));
    }

    #[test]
    fn test_circle_radius() {
        let c = BSplineCurve::circle(DVec3::new(1.0, 2.0, 3.0), DVec3::Z, 2.0).unwrap();
        for i in 0..=20 {
            let t = i as f64 / 20.0;
            let p = c.point_at(t);
            let r = ((p.x - 1.0).powi(2) + (p.y - 2.0).powi(2)).sqrt();
            assert!(
                (r - 2.0).abs() < 1e-9,
                "circle point at t={} has radius {}",
                t,
                r
            );
            assert!((p.z - 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_insert_knot_preserves_shape() {
        let mut c = quadratic_bezier();
        let before: Vec<DVec3> = (0..=10).map(|i| c.point_at(i as f64 / 10.0)).collect();
        c.insert_knot(0.3, 1, 1e-9).unwrap();
        c.insert_knot(0.7, 2, 1e-9).unwrap();
        assert_eq!(c.nb_poles(), 2 + 3 + 1);
        for (i, b) in before.iter().enumerate() {
            let after = c.point_at(i as f64 / 10.0);
            assert!(
                (after - *b).length() < 1e-12,
                "shape changed at t={}",
                i as f64 / 10.0
            );
        }
    }

    #[test]
    fn test_rational_insert_preserves_circle() {
        let mut c = BSplineCurve::circle(DVec3::ZERO, DVec3::Z, 1.0).unwrap();
        c.insert_knot(0.1, 1, 1e-9).unwrap();
        c.insert_knot(0.6, 1, 1e-9).unwrap();
        for i in 0..=40 {
            let t = i as f64 / 40.0;
            let r = c.point_at(t).length();
            assert!((r - 1.0).abs() < 1e-9, "radius drifted at t={}: {}", t, r);
        }
    }

    #[test]
    fn test_elevate_degree_preserves_shape() {
        let mut c = quadratic_bezier();
        c.insert_knot(0.5, 1, 1e-9).unwrap();
        let before: Vec<DVec3> = (0..=10).map(|i| c.point_at(i as f64 / 10.0)).collect();
        c.elevate_degree(4, 1e-9).unwrap();
        assert_eq!(c.degree, 4);
        for (i, b) in before.iter().enumerate() {
            let after = c.point_at(i as f64 / 10.0);
            assert!(
                (after - *b).length() < 1e-10,
                "shape changed at t={}",
                i as f64 / 10.0
            );
        }
    }

    #[test]
    fn test_segment() {
        let c = quadratic_bezier();
        let seg = c.segment(0.25, 0.75, 1e-9).unwrap();
        assert!((seg.first_parameter() - 0.25).abs() < 1e-12);
        assert!((seg.last_parameter() - 0.75).abs() < 1e-12);
        for i in 0..=8 {
            let t = 0.25 + 0.5 * i as f64 / 8.0;
            assert!(
                (seg.point_at(t) - c.point_at(t)).length() < 1e-12,
                "segment deviates at t={}",
                t
            );
        }
    }

    #[test]
    fn test_split_and_join_roundtrip() {
        let c = quadratic_bezier();
        let parts = c.split(&[0.4], 1e-9).unwrap();
        assert_eq!(parts.len(), 2);
        let joined = BSplineCurve::join(&parts, 1e-9).unwrap();
        // The joined curve's parameter range differs; compare by sampling
        let lo = joined.first_parameter();
        let hi = joined.last_parameter();
        let a = joined.point_at(lo);
        let b = joined.point_at(hi);
        assert!((a - c.start_point()).length() < 1e-10);
        assert!((b - c.end_point()).length() < 1e-10);
    }

    #[test]
    fn test_reverse_endpoints() {
        let mut c = quadratic_bezier();
        let s = c.start_point();
        let e = c.end_point();
        c.reverse();
        assert!((c.start_point() - e).length() < 1e-12);
        assert!((c.end_point() - s).length() < 1e-12);
        // Reversing twice restores the geometry
        c.reverse();
        for i in 0..=10 {
            let t = i as f64 / 10.0;
            assert!((c.point_at(t) - quadratic_bezier().point_at(t)).length() < 1e-12);
        }
    }

    #[test]
    fn test_periodic_uniform_cubic() {
        // Closed uniform cubic with 4 poles over 4 spans
        let c = BSplineCurve::periodic(
            3,
            vec![
                DVec3::new(1.0, 0.0, 0.0),
                DVec3::new(0.0, 1.0, 0.0),
                DVec3::new(-1.0, 0.0, 0.0),
                DVec3::new(0.0, -1.0, 0.0),
            ],
            vec![1.0; 4],
            KnotVector::new(vec![0.0, 1.0, 2.0, 3.0, 4.0], vec![1, 1, 1, 1, 1]).unwrap(),
        )
        .unwrap();
        // Periodicity: same value one period apart
        for i in 0..8 {
            let t = i as f64 * 0.37;
            let a = c.point_at(t);
            let b = c.point_at(t + 4.0);
            assert!((a - b).length() < 1e-12, "not periodic at t={}", t);
        }
        // Closed uniform B-spline through symmetric poles stays bounded
        let p = c.point_at(0.0);
        assert!(p.length() < 1.0);
    }

    #[test]
    fn test_periodic_insert_preserves_shape() {
        let mut c = BSplineCurve::periodic(
            3,
            vec![
                DVec3::new(1.0, 0.0, 0.0),
                DVec3::new(0.0, 1.0, 0.5),
                DVec3::new(-1.0, 0.0, 0.0),
                DVec3::new(0.0, -1.0, -0.5),
                DVec3::new(0.5, -0.5, 0.2),
            ],
            vec![1.0; 5],
            KnotVector::new(
                vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
                vec![1, 1, 1, 1, 1, 1],
            )
            .unwrap(),
        )
        .unwrap();
        let before: Vec<DVec3> = (0..=25).map(|i| c.point_at(i as f64 / 5.0)).collect();
        c.insert_knot(2.5, 1, 1e-9).unwrap();
        assert_eq!(c.nb_poles(), 6);
        for (i, b) in before.iter().enumerate() {
            let after = c.point_at(i as f64 / 5.0);
            assert!(
                (after - *b).length() < 1e-10,
                "periodic shape changed at t={}: {:?} vs {:?}",
                i as f64 / 5.0,
                after,
                b
            );
        }
    }

    #[test]
    fn test_periodic_set_origin_preserves_geometry() {
        let mut c = BSplineCurve::periodic(
            2,
            vec![
                DVec3::new(1.0, 0.0, 0.0),
                DVec3::new(0.0, 1.0, 0.0),
                DVec3::new(-1.0, 0.0, 0.0),
                DVec3::new(0.0, -1.0, 0.0),
            ],
            vec![1.0; 4],
            KnotVector::new(vec![0.0, 1.0, 2.0, 3.0, 4.0], vec![1, 1, 1, 1, 1]).unwrap(),
        )
        .unwrap();
        let orig = c.clone();
        c.set_origin(2).unwrap();
        // Same point set, shifted parameter
        for i in 0..=20 {
            let t = 4.0 * i as f64 / 20.0;
            let a = c.point_at(t);
            let b = orig.point_at(t + 2.0);
            assert!(
                (a - b).length() < 1e-10,
                "origin shift broke geometry at t={}",
                t
            );
        }
    }

    #[test]
    fn test_projection() {
        let c = BSplineCurve::line(DVec3::ZERO, DVec3::new(2.0, 0.0, 0.0));
        let (t, d) = c.closest_parameter(DVec3::new(0.5, 1.0, 0.0), 16);
        assert!((t - 0.25).abs() < 1e-8, "projected parameter {}", t);
        assert!((d - 1.0).abs() < 1e-8);
    }

    #[test]
    fn test_curvature_of_circle() {
        let c = BSplineCurve::circle(DVec3::ZERO, DVec3::Z, 2.0).unwrap();
        for i in 0..10 {
            let t = i as f64 / 10.0;
            let k = c.curvature_at(t);
            assert!(
                (k - 0.5).abs() < 1e-6,
                "circle curvature at t={} is {}",
                t,
                k
            );
        }
    }
}
