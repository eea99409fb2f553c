//! Blend constructions: derivative carriers on edges and faces, Bezier
//! bridges between them, and the Gordon-combined blend surface.

pub mod blend_curve;
pub mod blend_surface;
pub mod edge_on_face;
pub mod optimize;
pub mod point_on_edge;

pub use blend_curve::{
    blend_curve, curvature_spread, hermite_bezier, solve_sizes, BlendOptions, ScaleLaw,
};
pub use blend_surface::{blend_surface, BlendSurfaceOptions};
pub use edge_on_face::{compose_on_surface, EdgeOnFace};
pub use optimize::{can_minimize, NelderMead, OptimOutcome, Optimizer};
pub use point_on_edge::PointOnEdge;
