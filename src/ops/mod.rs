pub mod adjustments;

pub use adjustments::*;
