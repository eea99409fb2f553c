//! Curve fitting: global interpolation, least-squares approximation
//! and scalar laws along edges.

pub mod approximate;
pub mod interpolate;
pub mod params;
pub mod value_on_edge;

pub use approximate::{approximate_curve, ApproxMethod, ApproxOptions, Continuity};
pub use interpolate::{interpolate_curve, InterpOptions, Tangents};
pub use params::{parameters, validate_explicit, Parametrization};
pub use value_on_edge::ValueOnEdge;
