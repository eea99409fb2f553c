//! Ruled spines: the oriented, twist-minimised surface between two
//! rails.

use serde::{Deserialize, Serialize};
use skein_core::{Result, Tolerance};
use skein_nurbs::{BSplineCurve, BSplineSurface};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuledOptions {
    pub tol: Tolerance,
    /// Normalise both rails to [0, 1] before ruling.
    pub normalize: bool,
    /// Minimise twist between periodic rails by shifting origins.
    pub twist: bool,
    pub twist_samples: usize,
}

impl Default for RuledOptions {
    fn default() -> Self {
        Self {
            tol: Tolerance::default(),
            normalize: true,
            twist: true,
            twist_samples: 36,
        }
    }
}

/// Build the ruled surface between two rails after orienting them
/// consistently. The rails sit at v = 0 and v = 1.
pub fn ruled_spine(
    rail1: &BSplineCurve,
    rail2: &BSplineCurve,
    opts: &RuledOptions,
) -> Result<BSplineSurface> {
    let mut a = rail1.clone();
    let mut b = rail2.clone();

    // Orient: reverse the second rail when the diagonals are shorter
    let parallel =
        a.start_point().distance(b.start_point()) + a.end_point().distance(b.end_point());
    let crossed =
        a.start_point().distance(b.end_point()) + a.end_point().distance(b.start_point());
    if crossed < parallel {
        b.reverse();
    }

    if opts.twist && a.periodic && b.periodic {
        let n = opts.twist_samples;
        let pa = a.sample(n);
        let pb = b.sample(n);
        let mut best = (0usize, f64::INFINITY);
        for offset in 0..n {
            let cost: f64 = pa
                .iter()
                .enumerate()
                .map(|(k, p)| p.distance(pb[(k + offset) % n]))
                .sum();
            if cost < best.1 {
                best = (offset, cost);
            }
        }
        if best.0 != 0 {
            let lo = b.first_parameter();
            let span = b.last_parameter() - lo;
            b.shift_origin(lo + span * best.0 as f64 / n as f64, opts.tol.par)?;
        }
    }

    if opts.normalize {
        a.normalize_knots();
        b.normalize_knots();
    }
    BSplineSurface::ruled(&a, &b, opts.tol.par)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_math::DVec3;

    #[test]
    fn test_rails_sit_on_boundaries() {
        let r1 = BSplineCurve::line(DVec3::ZERO, DVec3::new(2.0, 0.0, 0.0));
        let r2 = BSplineCurve::line(DVec3::new(0.0, 1.0, 1.0), DVec3::new(2.0, 1.0, 1.0));
        let s = ruled_spine(&r1, &r2, &RuledOptions::default()).unwrap();
        for i in 0..=8 {
            let u = i as f64 / 8.0;
            assert!(
                s.point_at(u, 0.0).distance(r1.point_at(2.0 * u)) < 1e-10,
                "rail 1 off at u={}",
                u
            );
            assert!(
                s.point_at(u, 1.0).distance(r2.point_at(2.0 * u)) < 1e-10,
                "rail 2 off at u={}",
                u
            );
        }
    }

    #[test]
    fn test_flipped_rail_is_reoriented() {
        let r1 = BSplineCurve::line(DVec3::ZERO, DVec3::new(2.0, 0.0, 0.0));
        // Second rail runs backwards
        let r2 = BSplineCurve::line(DVec3::new(2.0, 1.0, 0.0), DVec3::new(0.0, 1.0, 0.0));
        let s = ruled_spine(&r1, &r2, &RuledOptions::default()).unwrap();
        // Without reorientation the ruling would cross; the start edge
        // must connect (0,0,0) to (0,1,0)
        assert!(s.point_at(0.0, 1.0).distance(DVec3::new(0.0, 1.0, 0.0)) < 1e-10);
    }

    #[test]
    fn test_twisted_periodic_rails_untwist() {
        let c1 = {
            let mut c = BSplineCurve::circle(DVec3::ZERO, DVec3::Z, 1.0).unwrap();
            c.to_periodic().unwrap();
            c
        };
        let mut c2 = {
            let mut c = BSplineCurve::circle(DVec3::new(0.0, 0.0, 1.0), DVec3::Z, 1.0).unwrap();
            c.to_periodic().unwrap();
            c
        };
        c2.shift_origin(0.5, 1e-9).unwrap();
        let s = ruled_spine(&c1, &c2, &RuledOptions::default()).unwrap();
        // Rulings stay short after untwisting
        for i in 0..10 {
            let u = i as f64 / 10.0;
            let d = s.point_at(u, 0.0).distance(s.point_at(u, 1.0));
            assert!(d < 1.3, "ruling at u={} spans {}", u, d);
        }
    }
}
