//! Sweep kernels built on the loft and Gordon layers: rotation sweeps
//! in rotating path frames, two-rail sweeps, and mounting planes for
//! sketched profiles.

pub mod profile;
pub mod rails;
pub mod rotation;

pub use profile::{profile_support_frames, SupportOptions, SupportPlacement};
pub use rails::{sweep_two_rails, RailsOptions};
pub use rotation::{rotation_sweep, RotationSweepOptions, SweepRange};
