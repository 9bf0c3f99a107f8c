//! Vivarium - Critters that evolve foraging, raiding and cannibalism.
//!
//! Cities hold populations of critters. Each round the critters forage for
//! food, fight critters of other cities or eat their own siblings, then head
//! home to be scored. The fittest half breeds the next generation through
//! gene crossover and mutation.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Genes, genomes, configuration and round statistics
//! - `compute`: The world, decision policy, round state machine and
//!   genetic operators
//!
//! Rendering, physics and time are reached through the collaborator traits
//! in [`compute`] (`SpatialQuery`, `PhysicalActuator`, `PresentationSink`,
//! `Clock`); headless implementations are included.
//!
//! # Example
//!
//! ```rust,no_run
//! use vivarium::{
//!     compute::{HeadlessVivarium, Terrain},
//!     schema::VivariumConfig,
//! };
//!
//! let config = VivariumConfig {
//!     random_seed: Some(42),
//!     ..Default::default()
//! };
//! let mut vivarium = HeadlessVivarium::headless(config, Terrain::flat(512.0, 512.0), 1.0 / 30.0)?;
//! vivarium.add_city(100.0, 100.0)?;
//! vivarium.add_city(400.0, 400.0)?;
//!
//! vivarium.start();
//! vivarium.run_round(10_000);
//!
//! if let Some(summary) = vivarium.last_summary() {
//!     println!("Best fitness after one round: {}", summary.best_fitness);
//! }
//! # Ok::<(), vivarium::compute::VivariumError>(())
//! ```

pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compute::{HeadlessVivarium, Vivarium, VivariumError, World};
pub use schema::{Gene, Genome, Phase, RoundSummary, VivariumConfig};
