//! Truncation selection with consecutive pairing.

use glam::Vec3;
use rand::prelude::*;

use crate::compute::world::EntityId;
use crate::schema::Genome;

use super::genome::crossover_genomes;

/// A scored survivor offered for breeding.
#[derive(Debug, Clone)]
pub struct ParentRecord {
    pub serial: u64,
    pub genome: Genome,
    pub position: Vec3,
    pub fitness: f32,
    pub city: Option<EntityId>,
}

/// One offspring to spawn.
#[derive(Debug, Clone)]
pub struct OffspringPlan {
    pub genome: Genome,
    pub position: Vec3,
    /// Home city, inherited from the first parent.
    pub city: Option<EntityId>,
    /// Serials of both parents.
    pub parents: [u64; 2],
}

/// Breeds the next generation from a ranked population.
#[derive(Debug, Clone)]
pub struct ReproductionEngine {
    jitter: f32,
}

impl ReproductionEngine {
    /// `jitter` bounds the random offset of an offspring from its parents'
    /// midpoint on each horizontal axis.
    pub fn new(jitter: f32) -> Self {
        Self {
            jitter: jitter.abs(),
        }
    }

    /// Number of offspring `population` parents produce.
    pub fn offspring_count(population: usize) -> usize {
        population / 4
    }

    /// Rank by fitness, keep the top half and pair it consecutively.
    ///
    /// Pairs `(0, 1), (2, 3), ...` each produce one child, so `N` parents
    /// give `N / 4` offspring. An odd survivor of the top half is dropped.
    pub fn breed<R: Rng + ?Sized>(
        &self,
        mut parents: Vec<ParentRecord>,
        rng: &mut R,
    ) -> Vec<OffspringPlan> {
        parents.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
        parents.truncate(parents.len() / 2);

        let mut offspring = Vec::with_capacity(parents.len() / 2);
        for pair in parents.chunks_exact(2) {
            let (a, b) = (&pair[0], &pair[1]);

            let genome = match crossover_genomes(&a.genome, &b.genome, rng) {
                Ok(genome) => genome,
                Err(err) => {
                    log::warn!(
                        "Crossover of {} and {} failed ({}), cloning the fitter parent",
                        a.serial,
                        b.serial,
                        err
                    );
                    a.genome.clone()
                }
            };

            let mut position = (a.position + b.position) / 2.0;
            if self.jitter > 0.0 {
                position.x += rng.gen_range(-self.jitter..=self.jitter);
                position.y += rng.gen_range(-self.jitter..=self.jitter);
            }

            log::debug!(
                "Offspring of {} ({:.3}) and {} ({:.3})",
                a.serial,
                a.fitness,
                b.serial,
                b.fitness
            );

            offspring.push(OffspringPlan {
                genome,
                position,
                city: a.city,
                parents: [a.serial, b.serial],
            });
        }

        offspring
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parent(serial: u64, fitness: f32, x: f32) -> ParentRecord {
        ParentRecord {
            serial,
            genome: Genome::standard(),
            position: Vec3::new(x, x, 0.0),
            fitness,
            city: None,
        }
    }

    #[test]
    fn test_pairs_top_half_consecutively() {
        let mut rng = StdRng::seed_from_u64(1);
        let engine = ReproductionEngine::new(0.0);
        let parents: Vec<_> = (0..8).map(|i| parent(i, i as f32, 0.0)).collect();

        let offspring = engine.breed(parents, &mut rng);
        assert_eq!(offspring.len(), 2);
        assert_eq!(offspring[0].parents, [7, 6]);
        assert_eq!(offspring[1].parents, [5, 4]);
    }

    #[test]
    fn test_offspring_count_is_quarter() {
        let mut rng = StdRng::seed_from_u64(2);
        let engine = ReproductionEngine::new(10.0);
        for n in 0..23u64 {
            let parents: Vec<_> = (0..n).map(|i| parent(i, (i * 7 % 13) as f32 + i as f32 * 0.01, 0.0)).collect();
            let offspring = engine.breed(parents, &mut rng);
            assert_eq!(offspring.len(), ReproductionEngine::offspring_count(n as usize));
            assert_eq!(offspring.len(), n as usize / 4);
        }
    }

    #[test]
    fn test_odd_top_half_drops_last() {
        let mut rng = StdRng::seed_from_u64(3);
        let engine = ReproductionEngine::new(0.0);
        // Top half of 10 is 5: pairs (9, 8), (7, 6); 5 is dropped.
        let parents: Vec<_> = (0..10).map(|i| parent(i, i as f32, 0.0)).collect();
        let offspring = engine.breed(parents, &mut rng);
        assert_eq!(offspring.len(), 2);
        assert!(offspring.iter().all(|o| !o.parents.contains(&5)));
    }

    #[test]
    fn test_offspring_near_midpoint() {
        let mut rng = StdRng::seed_from_u64(4);
        let engine = ReproductionEngine::new(10.0);
        let parents = vec![
            parent(0, 4.0, 100.0),
            parent(1, 3.0, 200.0),
            parent(2, 0.0, 0.0),
            parent(3, 0.0, 0.0),
        ];
        let offspring = engine.breed(parents, &mut rng);
        assert_eq!(offspring.len(), 1);
        let p = offspring[0].position;
        assert!((p.x - 150.0).abs() <= 10.0);
        assert!((p.y - 150.0).abs() <= 10.0);
    }
}
