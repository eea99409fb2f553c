//! Derivative-free minimisation as a capability.
//!
//! Scale laws that search the (size_a, size_b) plane take the
//! optimiser as an explicit parameter; callers can query
//! `can_minimize` before requesting such a law.

/// Outcome of a minimisation run.
#[derive(Debug, Clone)]
pub struct OptimOutcome {
    pub x: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// A derivative-free minimiser over a small number of variables.
pub trait Optimizer {
    fn minimize(
        &self,
        f: &mut dyn FnMut(&[f64]) -> f64,
        x0: &[f64],
        max_iter: usize,
    ) -> OptimOutcome;
}

/// Whether a build carries an optimiser for the iterative scale laws.
pub fn can_minimize(optimizer: Option<&dyn Optimizer>) -> bool {
    optimizer.is_some()
}

/// Downhill simplex (Nelder-Mead) with the standard reflection,
/// expansion, contraction and shrink coefficients.
#[derive(Debug, Clone)]
pub struct NelderMead {
    /// Relative simplex spread at which the search stops.
    pub tolerance: f64,
    /// Initial simplex step per coordinate.
    pub step: f64,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            tolerance: 1e-8,
            step: 0.1,
        }
    }
}

impl Optimizer for NelderMead {
    fn minimize(
        &self,
        f: &mut dyn FnMut(&[f64]) -> f64,
        x0: &[f64],
        max_iter: usize,
    ) -> OptimOutcome {
        let n = x0.len();
        let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n + 1);
        simplex.push((x0.to_vec(), f(x0)));
        for i in 0..n {
            let mut x = x0.to_vec();
            x[i] += if x[i].abs() > 1e-12 {
                self.step * x[i].abs()
            } else {
                self.step
            };
            let fx = f(&x);
            simplex.push((x, fx));
        }

        let mut iterations = 0;
        let mut converged = false;
        while iterations < max_iter {
            iterations += 1;
            simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
            let spread = (simplex[n].1 - simplex[0].1).abs();
            if spread < self.tolerance * (1.0 + simplex[0].1.abs()) {
                converged = true;
                break;
            }

            // Centroid of all but the worst vertex
            let mut centroid = vec![0.0; n];
            for (x, _) in &simplex[..n] {
                for i in 0..n {
                    centroid[i] += x[i] / n as f64;
                }
            }
            let worst = simplex[n].clone();
            let combine = |a: f64| -> Vec<f64> {
                (0..n)
                    .map(|i| centroid[i] + a * (centroid[i] - worst.0[i]))
                    .collect()
            };

            let reflected = combine(1.0);
            let fr = f(&reflected);
            if fr < simplex[0].1 {
                let expanded = combine(2.0);
                let fe = f(&expanded);
                simplex[n] = if fe < fr {
                    (expanded, fe)
                } else {
                    (reflected, fr)
                };
            } else if fr < simplex[n - 1].1 {
                simplex[n] = (reflected, fr);
            } else {
                let contracted = combine(-0.5);
                let fc = f(&contracted);
                if fc < worst.1 {
                    simplex[n] = (contracted, fc);
                } else {
                    // Shrink toward the best vertex
                    let best = simplex[0].0.clone();
                    for vertex in simplex.iter_mut().skip(1) {
                        for i in 0..n {
                            vertex.0[i] = best[i] + 0.5 * (vertex.0[i] - best[i]);
                        }
                        vertex.1 = f(&vertex.0);
                    }
                }
            }
        }

        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        OptimOutcome {
            x: simplex[0].0.clone(),
            value: simplex[0].1,
            iterations,
            converged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quadratic_bowl() {
        let nm = NelderMead::default();
        let mut f = |x: &[f64]| (x[0] - 3.0).powi(2) + 2.0 * (x[1] + 1.0).powi(2);
        let out = nm.minimize(&mut f, &[0.0, 0.0], 2000);
        assert!(out.converged, "did not converge in {}", out.iterations);
        assert!((out.x[0] - 3.0).abs() < 1e-3, "x0 = {}", out.x[0]);
        assert!((out.x[1] + 1.0).abs() < 1e-3, "x1 = {}", out.x[1]);
    }

    #[test]
    fn test_rosenbrock_improves() {
        let nm = NelderMead::default();
        let mut f = |x: &[f64]| {
            let (a, b) = (x[0], x[1]);
            (1.0 - a).powi(2) + 100.0 * (b - a * a).powi(2)
        };
        let start = f(&[-1.0, 1.0]);
        let out = nm.minimize(&mut f, &[-1.0, 1.0], 2000);
        assert!(out.value < start * 0.01, "no progress: {}", out.value);
    }

    #[test]
    fn test_capability_query() {
        let nm = NelderMead::default();
        assert!(can_minimize(Some(&nm)));
        assert!(!can_minimize(None));
    }
}
