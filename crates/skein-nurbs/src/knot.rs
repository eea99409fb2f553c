//! Knot vectors with multiplicities and the multi-curve merge primitive.

use serde::{Deserialize, Serialize};
use skein_core::{Result, SkeinError};

/// An ordered knot vector with per-knot multiplicities.
///
/// Invariants: `knots` strictly increasing, `mults` all >= 1, both the
/// same length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnotVector {
    pub knots: Vec<f64>,
    pub mults: Vec<usize>,
}

impl KnotVector {
    pub fn new(knots: Vec<f64>, mults: Vec<usize>) -> Result<Self> {
        if knots.len() != mults.len() {
            return Err(SkeinError::Domain(format!(
                "knot/mult length mismatch: {} vs {}",
                knots.len(),
                mults.len()
            )));
        }
        if knots.len() < 2 {
            return Err(SkeinError::Domain(
                "a knot vector needs at least two distinct knots".into(),
            ));
        }
        if knots.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SkeinError::Domain(
                "knot values must be strictly increasing".into(),
            ));
        }
        if mults.iter().any(|&m| m == 0) {
            return Err(SkeinError::Domain("multiplicities must be >= 1".into()));
        }
        Ok(Self { knots, mults })
    }

    /// Clamped uniform knot vector for a given degree and pole count,
    /// spanning [0, 1].
    pub fn uniform(degree: usize, nb_poles: usize) -> Result<Self> {
        if degree >= nb_poles {
            return Err(SkeinError::Domain(format!(
                "uniform knots: degree {} >= nb_poles {}",
                degree, nb_poles
            )));
        }
        let nb_int = nb_poles - degree - 1;
        let mut knots = Vec::with_capacity(nb_int + 2);
        let mut mults = Vec::with_capacity(nb_int + 2);
        knots.push(0.0);
        mults.push(degree + 1);
        for k in 1..=nb_int {
            knots.push(k as f64 / (nb_int + 1) as f64);
            mults.push(1);
        }
        knots.push(1.0);
        mults.push(degree + 1);
        Self::new(knots, mults)
    }

    /// Build from a flat (repeated) knot sequence.
    pub fn from_flat(flat: &[f64], tol: f64) -> Result<Self> {
        if flat.is_empty() {
            return Err(SkeinError::Domain("empty flat knot sequence".into()));
        }
        let mut knots = vec![flat[0]];
        let mut mults = vec![1usize];
        for &k in &flat[1..] {
            let last = *knots.last().unwrap();
            if (k - last).abs() <= tol {
                *mults.last_mut().unwrap() += 1;
            } else if k > last {
                knots.push(k);
                mults.push(1);
            } else {
                return Err(SkeinError::Domain(
                    "flat knot sequence must be non-decreasing".into(),
                ));
            }
        }
        Self::new(knots, mults)
    }

    pub fn first(&self) -> f64 {
        self.knots[0]
    }

    pub fn last(&self) -> f64 {
        *self.knots.last().unwrap()
    }

    pub fn span(&self) -> f64 {
        self.last() - self.first()
    }

    pub fn nb_knots(&self) -> usize {
        self.knots.len()
    }

    pub fn total_mult(&self) -> usize {
        self.mults.iter().sum()
    }

    /// The flat knot sequence, each knot repeated by its multiplicity.
    pub fn flat(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.total_mult());
        for (&k, &m) in self.knots.iter().zip(&self.mults) {
            out.extend(std::iter::repeat(k).take(m));
        }
        out
    }

    /// Smallest spacing between consecutive distinct knots.
    pub fn min_spacing(&self) -> f64 {
        self.knots
            .windows(2)
            .map(|w| w[1] - w[0])
            .fold(f64::INFINITY, f64::min)
    }

    /// Search for a knot value. Returns its index or None.
    pub fn find(&self, u: f64, tol: f64) -> Option<usize> {
        self.knots.iter().position(|&k| (k - u).abs() < tol)
    }

    /// Insert `u` with multiplicity `m`, or raise an existing knot's
    /// multiplicity to `max(current, m)`.
    pub fn insert(&mut self, u: f64, m: usize, tol: f64) -> Result<()> {
        check_tolerance(self, tol)?;
        match self.find(u, tol) {
            Some(idx) => {
                self.mults[idx] = self.mults[idx].max(m);
            }
            None => {
                let pos = self.knots.iter().take_while(|&&k| k < u).count();
                self.knots.insert(pos, u);
                self.mults.insert(pos, m);
            }
        }
        Ok(())
    }

    /// Affine remap of the knot values onto `[a, b]`.
    pub fn scale_to_bounds(&mut self, a: f64, b: f64) -> Result<()> {
        if b <= a {
            return Err(SkeinError::Domain(format!(
                "scale_to_bounds: empty target range [{}, {}]",
                a, b
            )));
        }
        let lo = self.first();
        let ran = self.span();
        for k in &mut self.knots {
            *k = a + (b - a) * (*k - lo) / ran;
        }
        Ok(())
    }

    /// Normalize the knot values onto [0, 1].
    pub fn normalize(&mut self) {
        // span() > 0 by construction
        self.scale_to_bounds(0.0, 1.0).unwrap();
    }

    /// Reverse the knot vector in place, mirroring values about the
    /// parameter midrange.
    pub fn reverse(&mut self) {
        let lo = self.first();
        let hi = self.last();
        for k in &mut self.knots {
            *k = lo + hi - *k;
        }
        self.knots.reverse();
        self.mults.reverse();
    }

    /// The image of parameter `u` when the knot vector is reversed.
    pub fn reversed_param(&self, u: f64) -> f64 {
        self.first() + self.last() - u
    }

    /// Union of several knot vectors: at each knot value, the maximum
    /// multiplicity across inputs.
    pub fn merged(inputs: &[&KnotVector], tol: f64) -> Result<KnotVector> {
        if inputs.is_empty() {
            return Err(SkeinError::Domain("merge of zero knot vectors".into()));
        }
        for kv in inputs {
            check_tolerance(kv, tol)?;
        }
        let mut all: Vec<f64> = inputs.iter().flat_map(|kv| kv.knots.iter().copied()).collect();
        all.sort_by(|a, b| a.total_cmp(b));
        let mut knots: Vec<f64> = vec![all[0]];
        for &k in &all[1..] {
            if k - *knots.last().unwrap() > tol {
                knots.push(k);
            }
        }
        let mut mults = vec![0usize; knots.len()];
        for kv in inputs {
            for (i, &k) in knots.iter().enumerate() {
                if let Some(j) = kv.find(k, tol) {
                    mults[i] = mults[i].max(kv.mults[j]);
                }
            }
        }
        KnotVector::new(knots, mults)
    }
}

/// Tolerance must be strictly positive and smaller than the minimum
/// knot spacing, otherwise distinct knots would collapse.
pub fn check_tolerance(kv: &KnotVector, tol: f64) -> Result<()> {
    if tol <= 0.0 {
        return Err(SkeinError::KnotCollision(format!(
            "tolerance must be strictly positive, got {}",
            tol
        )));
    }
    let spacing = kv.min_spacing();
    if tol >= spacing {
        return Err(SkeinError::KnotCollision(format!(
            "tolerance {} not below minimum knot spacing {}",
            tol, spacing
        )));
    }
    Ok(())
}

/// A curve or surface direction whose knot structure can be unified with
/// others. Implemented by `BSplineCurve` and the surface direction views.
pub trait KnotWorkpiece {
    fn degree(&self) -> usize;
    fn knot_vector(&self) -> &KnotVector;
    /// Insert a knot (or raise an existing one) to the given multiplicity.
    fn insert_knot(&mut self, u: f64, mult: usize, tol: f64) -> Result<()>;
}

/// Push the merged knot vector back into every workpiece so that all of
/// them end up with identical knots and multiplicities.
///
/// Preconditions: same degree and same parameter range on every input.
pub fn unify_knots<W: KnotWorkpiece>(items: &mut [W], tol: f64) -> Result<()> {
    if items.is_empty() {
        return Err(SkeinError::Domain("unify_knots on empty input".into()));
    }
    let degree = items[0].degree();
    let lo = items[0].knot_vector().first();
    let hi = items[0].knot_vector().last();
    for it in items.iter() {
        if it.degree() != degree {
            return Err(SkeinError::Compatibility(format!(
                "degree mismatch: {} vs {}",
                it.degree(),
                degree
            )));
        }
        let kv = it.knot_vector();
        if (kv.first() - lo).abs() > tol || (kv.last() - hi).abs() > tol {
            return Err(SkeinError::Compatibility(format!(
                "parameter range mismatch: [{}, {}] vs [{}, {}]",
                kv.first(),
                kv.last(),
                lo,
                hi
            )));
        }
    }
    let merged = {
        let kvs: Vec<&KnotVector> = items.iter().map(|it| it.knot_vector()).collect();
        KnotVector::merged(&kvs, tol)?
    };
    for it in items.iter_mut() {
        for (idx, &u) in merged.knots.iter().enumerate() {
            let target = merged.mults[idx];
            let current = it
                .knot_vector()
                .find(u, tol)
                .map(|j| it.knot_vector().mults[j])
                .unwrap_or(0);
            if current < target {
                it.insert_knot(u, target, tol)?;
            }
        }
        // The push-back must have converged onto the merged vector
        let got = it.knot_vector();
        if got.nb_knots() != merged.nb_knots() || got.mults != merged.mults {
            return Err(SkeinError::Compatibility(format!(
                "knot unification did not converge: {:?} vs {:?}",
                got.knots, merged.knots
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kv(knots: &[f64], mults: &[usize]) -> KnotVector {
        KnotVector::new(knots.to_vec(), mults.to_vec()).unwrap()
    }

    #[test]
    fn test_uniform() {
        let k = KnotVector::uniform(3, 6).unwrap();
        assert_eq!(k.knots.len(), 4);
        assert_eq!(k.mults, vec![4, 1, 1, 4]);
        assert_eq!(k.total_mult(), 6 + 3 + 1);
    }

    #[test]
    fn test_flat_roundtrip() {
        let k = kv(&[0.0, 0.25, 1.0], &[3, 1, 3]);
        let flat = k.flat();
        assert_eq!(flat, vec![0.0, 0.0, 0.0, 0.25, 1.0, 1.0, 1.0]);
        let back = KnotVector::from_flat(&flat, 1e-9).unwrap();
        assert_eq!(back, k);
    }

    #[test]
    fn test_insert_raises_multiplicity() {
        let mut k = kv(&[0.0, 0.5, 1.0], &[3, 1, 3]);
        k.insert(0.5, 2, 1e-9).unwrap();
        assert_eq!(k.mults, vec![3, 2, 3]);
        // inserting below current multiplicity is a no-op
        k.insert(0.5, 1, 1e-9).unwrap();
        assert_eq!(k.mults, vec![3, 2, 3]);
        k.insert(0.25, 1, 1e-9).unwrap();
        assert_eq!(k.knots, vec![0.0, 0.25, 0.5, 1.0]);
        assert_eq!(k.mults, vec![3, 1, 2, 3]);
    }

    #[test]
    fn test_merge_max_multiplicity() {
        let a = kv(&[0.0, 0.5, 1.0], &[3, 1, 3]);
        let b = kv(&[0.0, 0.25, 0.5, 1.0], &[3, 1, 2, 3]);
        let m = KnotVector::merged(&[&a, &b], 1e-9).unwrap();
        assert_eq!(m.knots, vec![0.0, 0.25, 0.5, 1.0]);
        assert_eq!(m.mults, vec![3, 1, 2, 3]);
    }

    #[test]
    fn test_merge_idempotent() {
        let a = kv(&[0.0, 0.3, 1.0], &[4, 2, 4]);
        let b = kv(&[0.0, 0.7, 1.0], &[4, 1, 4]);
        let once = KnotVector::merged(&[&a, &b], 1e-9).unwrap();
        let twice = KnotVector::merged(&[&once, &once], 1e-9).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_tolerance_collision() {
        let a = kv(&[0.0, 1e-4, 1.0], &[2, 1, 2]);
        let err = KnotVector::merged(&[&a], 1e-3).unwrap_err();
        assert!(matches!(err, SkeinError::KnotCollision(_)));
        let err = KnotVector::merged(&[&a], -1.0).unwrap_err();
        assert!(matches!(err, SkeinError::KnotCollision(_)));
    }

    #[test]
    fn test_scale_and_normalize() {
        let mut k = kv(&[2.0, 3.0, 4.0], &[3, 1, 3]);
        k.scale_to_bounds(0.0, 10.0).unwrap();
        assert_eq!(k.knots, vec![0.0, 5.0, 10.0]);
        k.normalize();
        assert_eq!(k.knots, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_reverse() {
        let mut k = kv(&[0.0, 0.25, 1.0], &[3, 2, 3]);
        k.reverse();
        assert_eq!(k.knots, vec![0.0, 0.75, 1.0]);
        assert_eq!(k.mults, vec![3, 2, 3]);
        assert!((k.reversed_param(0.25) - 0.75).abs() < 1e-12);
    }
}
