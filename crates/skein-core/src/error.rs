use thiserror::Error;

#[derive(Debug, Error)]
pub enum SkeinError {
    /// Input violates a precondition the caller can check (empty curve
    /// list, negative weight, non-increasing parameters).
    #[error("Domain error: {0}")]
    Domain(String),

    /// Knot-vector tolerance collides with the minimum knot spacing.
    #[error("Knot collision: {0}")]
    KnotCollision(String),

    /// Curves could not reach a common knot set within tolerance.
    #[error("Compatibility error: {0}")]
    Compatibility(String),

    /// Length or monotonicity mismatch between supplied parameters and
    /// curve count.
    #[error("Parametrization error: {0}")]
    Parametrization(String),

    /// Approximation sample count below degree_min + 1.
    #[error("Insufficient samples: got {got}, need at least {need}")]
    InsufficientSamples { got: usize, need: usize },

    /// Gordon weight sum underflows the 3D tolerance.
    #[error("Degenerate Gordon surface: weight sum {weight} at pole ({u_idx}, {v_idx})")]
    DegenerateGordon {
        u_idx: usize,
        v_idx: usize,
        weight: f64,
    },

    /// Gordon precheck could not match surfaces by any canonical
    /// reorientation.
    #[error("Orientation error: {0}")]
    Orientation(String),

    /// A scale law requiring an optimiser was requested without one.
    #[error("Optimizer unavailable: {0}")]
    OptimizerUnavailable(String),
}

pub type Result<T> = std::result::Result<T, SkeinError>;
