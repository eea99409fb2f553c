pub mod error;
pub mod tolerance;
pub mod warn;

pub use error::{Result, SkeinError};
pub use tolerance::Tolerance;
pub use warn::{Warned, Warning};
