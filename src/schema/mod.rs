//! Schema module - Configuration, genome and round types for the vivarium.

mod config;
mod genome;
mod round;
mod scenario;

pub use config::*;
pub use genome::*;
pub use round::*;
pub use scenario::*;
