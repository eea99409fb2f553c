/// Parametric / geometric tolerance pair threaded through every operation.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct Tolerance {
    /// Parametric tolerance (knot comparisons, 2D pcurve domain)
    pub par: f64,
    /// Geometric tolerance (3D point comparisons, in model units)
    pub geo: f64,
}

impl Tolerance {
    pub const DEFAULT_PAR: f64 = 1e-9;
    pub const DEFAULT_GEO: f64 = 1e-7;

    pub fn new(par: f64, geo: f64) -> Self {
        Self { par, geo }
    }

    pub fn default_precision() -> Self {
        Self {
            par: Self::DEFAULT_PAR,
            geo: Self::DEFAULT_GEO,
        }
    }

    pub fn loose() -> Self {
        Self {
            par: 1e-6,
            geo: 1e-4,
        }
    }

    /// Check if two parameters are equal within parametric tolerance
    pub fn par_eq(self, a: f64, b: f64) -> bool {
        (a - b).abs() < self.par
    }

    /// Check if two distances are equal within geometric tolerance
    pub fn geo_eq(self, a: f64, b: f64) -> bool {
        (a - b).abs() < self.geo
    }

    /// Check if a distance is zero within geometric tolerance
    pub fn is_zero(self, v: f64) -> bool {
        v.abs() < self.geo
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::default_precision()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tolerances() {
        let tol = Tolerance::default();
        assert!(tol.par_eq(0.5, 0.5 + 1e-12));
        assert!(!tol.par_eq(0.5, 0.5 + 1e-6));
        assert!(tol.is_zero(1e-9));
        assert!(!tol.is_zero(1e-3));
    }
}
