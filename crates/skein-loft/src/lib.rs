//! Surface assembly from curve families: compatibility, lofting,
//! Gordon combination and ruled spines.

pub mod compat;
pub mod gordon;
pub mod loft;
pub mod ruled;

pub use compat::{compatibilize, CompatOptions};
pub use gordon::{corner_patch, gordon};
pub use loft::{loft, LoftOptions};
pub use ruled::{ruled_spine, RuledOptions};
