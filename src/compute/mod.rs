//! Compute module - World, decision policy and round cycle of the vivarium.

mod behavior;
mod collaborators;
mod round;
mod vivarium;
mod world;

pub mod evolution;

pub use behavior::*;
pub use collaborators::*;
pub use round::*;
pub use vivarium::*;
pub use world::*;
