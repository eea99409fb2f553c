//! NURBS data model: knot vectors, basis functions, rational B-spline
//! curves and tensor-product surfaces.
//!
//! Curves and surfaces expose the operations the assembly layers build
//! on: evaluation with derivatives, Boehm knot insertion, degree
//! elevation, segmentation, reversal and periodic bookkeeping. Knot
//! unification across mixed curve/surface inputs goes through the
//! [`KnotWorkpiece`] trait.

pub mod basis;
pub mod bezier;
pub mod curve;
pub mod knot;
pub mod surface;

pub use bezier::BezierCurve;
pub use curve::{periodic_basis_row, BSplineCurve};
pub use knot::{check_tolerance, unify_knots, KnotVector, KnotWorkpiece};
pub use surface::{BSplineSurface, SurfDirection, SurfaceAdapter};
