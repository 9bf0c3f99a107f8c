//! Genetic machinery for the critter population.
//!
//! # Overview
//!
//! - **Genome Operations** (`genome`): mutation, crossover and decay of genes
//! - **Fitness** (`fitness`): scoring a critter's round
//! - **Reproduction** (`reproduction`): ranking survivors and pairing the top half
//! - **Genome Archive** (`archive`): keeping the best genomes across rounds and runs
//!
//! # Example
//!
//! ```rust
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//! use vivarium::compute::evolution::crossover_genomes;
//! use vivarium::schema::{Gene, Genome};
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let a = Genome::new(vec![Gene::number("Speed", 4.0, 1.0, 5.0).with_dominance(2.0)]).unwrap();
//! let b = Genome::new(vec![Gene::number("Speed", 1.0, 1.0, 5.0)]).unwrap();
//!
//! let child = crossover_genomes(&a, &b, &mut rng).unwrap();
//! let speed = child.gene("Speed").unwrap();
//! assert_eq!(speed.generation, 1);
//! assert!(speed.number_value().unwrap() >= 1.0);
//! ```

mod archive;
mod fitness;
mod genome;
mod reproduction;

pub use archive::{ArchiveError, ArchivedGenome, GenomeArchive, auto_categorize};
pub use fitness::{BehaviorRecord, FitnessEvaluator};
pub use genome::{
    GenomeRng, crossover_genomes, decay_genome, genome_distance, mutate_genome,
    population_diversity,
};
pub use reproduction::{OffspringPlan, ParentRecord, ReproductionEngine};
