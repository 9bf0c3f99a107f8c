//! Genetic operators: mutation, crossover and decay.
//!
//! Gene-level operators are inherent methods on [`Gene`]; the genome-level
//! helpers pair genes positionally.

use rand::prelude::*;

use crate::schema::{Gene, GeneValue, Genome, GenomeError};

/// Random number generator shared by the vivarium and its genetic operators.
#[derive(Debug, Clone)]
pub struct GenomeRng {
    rng: StdRng,
}

impl GenomeRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create with random seed.
    pub fn random() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// True with probability `p`. Values outside `[0, 1]` saturate.
    pub fn chance(&mut self, p: f32) -> bool {
        self.rng.r#gen::<f32>() < p
    }

    /// Integer roll in `0..=100` compared against a percentage gene.
    pub fn percent(&mut self, p: f32) -> bool {
        (self.rng.gen_range(0..=100) as f32) < p
    }

    /// Uniform value in `[-a, b]`. Returns 0 for an empty or unbounded range.
    pub fn spread(&mut self, a: f32, b: f32) -> f32 {
        if -a < b && (a + b).is_finite() {
            self.rng.gen_range(-a..=b)
        } else {
            0.0
        }
    }

    /// Uniform value in `bounds`, inclusive.
    pub fn uniform(&mut self, bounds: (f32, f32)) -> f32 {
        if bounds.0 < bounds.1 && (bounds.1 - bounds.0).is_finite() {
            self.rng.gen_range(bounds.0..=bounds.1)
        } else {
            bounds.0
        }
    }
}

impl RngCore for GenomeRng {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.rng.try_fill_bytes(dest)
    }
}

impl Gene {
    /// With probability `mutation_rate`, perturb a numeric value by uniform
    /// noise in `±mutation_step` and clamp, or re-pick a categorical value
    /// from `options`. Inactive genes never change.
    ///
    /// Returns whether a mutation was applied.
    pub fn mutate<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        if !self.active || rng.r#gen::<f32>() >= self.mutation_rate {
            return false;
        }

        match &mut self.value {
            GeneValue::Number(v) => {
                let step = self.mutation_step.abs();
                if step > 0.0 {
                    *v += rng.gen_range(-step..=step);
                }
            }
            GeneValue::Choice(current) => {
                if let Some(pick) = self.options.choose(rng) {
                    *current = pick.clone();
                }
            }
        }
        self.clamp_value();
        true
    }

    /// Child gene of `self` and `other`.
    ///
    /// The value comes from the more dominant side, ties going to `self`.
    /// Rates and steps are averaged, dominance is the larger of the two.
    /// Bounds and options are taken from `self`.
    pub fn crossover(&self, other: &Gene) -> Gene {
        let value = if self.dominance >= other.dominance {
            self.value.clone()
        } else {
            other.value.clone()
        };

        let mut child = Gene {
            name: self.name.clone(),
            value,
            min: self.min,
            max: self.max,
            mutation_rate: (self.mutation_rate + other.mutation_rate) / 2.0,
            mutation_step: (self.mutation_step + other.mutation_step) / 2.0,
            options: self.options.clone(),
            dominance: self.dominance.max(other.dominance),
            generation: self.generation.max(other.generation) + 1,
            parent_names: vec![self.name.clone(), other.name.clone()],
            active: self.active,
        };
        child.clamp_value();
        child
    }

    /// Lower a numeric value by `rate`, stopping at `min`.
    pub fn decay(&mut self, rate: f32) {
        if let GeneValue::Number(v) = &mut self.value {
            let lowered = *v - rate.max(0.0);
            *v = match self.min {
                Some(min) => lowered.max(min.min(*v)),
                None => lowered,
            };
        }
    }
}

/// Offspring genome of two parents, paired gene by gene in order.
///
/// Each child gene is crossed then mutated. Pairs whose names disagree are
/// still crossed; that is logged since it blends unrelated traits.
pub fn crossover_genomes<R: Rng + ?Sized>(
    a: &Genome,
    b: &Genome,
    rng: &mut R,
) -> Result<Genome, GenomeError> {
    if a.len() != b.len() {
        log::warn!(
            "Crossing genomes of different lengths ({} and {}), extra genes are dropped",
            a.len(),
            b.len()
        );
    }

    let genes = a
        .genes()
        .iter()
        .zip(b.genes())
        .map(|(ga, gb)| {
            if ga.name != gb.name {
                log::warn!("Positional crossover pairs '{}' with '{}'", ga.name, gb.name);
            }
            let mut child = ga.crossover(gb);
            child.mutate(rng);
            child
        })
        .collect();

    Genome::new(genes)
}

/// Mutate every gene once. Returns the number of genes changed.
pub fn mutate_genome<R: Rng + ?Sized>(genome: &mut Genome, rng: &mut R) -> usize {
    genome
        .genes_mut()
        .iter_mut()
        .map(|g| g.mutate(rng))
        .filter(|&changed| changed)
        .count()
}

/// Decay every numeric gene by `rate`.
pub fn decay_genome(genome: &mut Genome, rate: f32) {
    for gene in genome.genes_mut() {
        gene.decay(rate);
    }
}

/// Mean range-normalised difference of the bounded numeric genes two
/// genomes share by name.
pub fn genome_distance(a: &Genome, b: &Genome) -> f32 {
    let mut total = 0.0;
    let mut count = 0usize;

    for ga in a.genes() {
        let Some(gb) = b.gene(&ga.name) else {
            continue;
        };
        let (Some(va), Some(vb), Some((min, max))) =
            (ga.number_value(), gb.number_value(), ga.bounds())
        else {
            continue;
        };
        let range = max - min;
        if range > 0.0 {
            total += (va - vb).abs() / range;
            count += 1;
        }
    }

    if count == 0 { 0.0 } else { total / count as f32 }
}

/// Mean pairwise [`genome_distance`] of a population.
pub fn population_diversity(genomes: &[&Genome]) -> f32 {
    let n = genomes.len();
    if n < 2 {
        return 0.0;
    }

    let mut total = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            total += genome_distance(genomes[i], genomes[j]);
        }
    }
    total / (n * (n - 1) / 2) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::names;
    use proptest::prelude::*;

    #[test]
    fn test_dominant_value_wins() {
        let strong = Gene::number("Speed", 4.0, 1.0, 5.0).with_dominance(2.0);
        let weak = Gene::number("Speed", 2.0, 1.0, 5.0).with_dominance(1.0);

        assert_eq!(strong.crossover(&weak).number_value(), Some(4.0));
        assert_eq!(weak.crossover(&strong).number_value(), Some(4.0));
    }

    #[test]
    fn test_crossover_lineage() {
        let a = Gene::number("Speed", 4.0, 1.0, 5.0)
            .with_mutation_rate(0.2)
            .with_mutation_step(0.4);
        let mut b = Gene::number("Speed", 2.0, 1.0, 5.0)
            .with_mutation_rate(0.6)
            .with_dominance(3.0);
        b.generation = 4;

        let child = a.crossover(&b);
        assert!((child.mutation_rate - 0.4).abs() < 1e-6);
        assert!((child.mutation_step - 0.25).abs() < 1e-6);
        assert_eq!(child.dominance, 3.0);
        assert_eq!(child.generation, 5);
        assert_eq!(child.parent_names, vec!["Speed".to_string(), "Speed".to_string()]);
    }

    #[test]
    fn test_inactive_gene_never_mutates() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut gene = Gene::number("Speed", 2.0, 1.0, 5.0).with_mutation_rate(1.0);
        gene.active = false;
        for _ in 0..100 {
            assert!(!gene.mutate(&mut rng));
        }
        assert_eq!(gene.number_value(), Some(2.0));
    }

    #[test]
    fn test_categorical_mutation_picks_option() {
        let mut rng = StdRng::seed_from_u64(3);
        let options = vec!["plants".to_string(), "meat".to_string()];
        let mut gene = Gene::choice("Diet", "plants", options.clone()).with_mutation_rate(1.0);
        for _ in 0..20 {
            gene.mutate(&mut rng);
            let value = gene.value.as_choice().unwrap().to_string();
            assert!(options.contains(&value));
        }
    }

    #[test]
    fn test_decay_stops_at_min() {
        let mut gene = Gene::number("Speed", 1.5, 1.0, 5.0);
        gene.decay(0.3);
        assert!((gene.number_value().unwrap() - 1.2).abs() < 1e-6);
        gene.decay(10.0);
        assert_eq!(gene.number_value(), Some(1.0));
    }

    #[test]
    fn test_crossover_genomes_keeps_names_and_bounds() {
        let mut rng = StdRng::seed_from_u64(11);
        let a = Genome::standard();
        let mut b = Genome::standard();
        mutate_genome(&mut b, &mut rng);

        let child = crossover_genomes(&a, &b, &mut rng).unwrap();
        assert_eq!(child.len(), a.len());
        for (gene, parent) in child.genes().iter().zip(a.genes()) {
            assert_eq!(gene.name, parent.name);
            assert_eq!(gene.generation, 1);
            let (min, max) = gene.bounds().unwrap();
            let v = gene.number_value().unwrap();
            assert!(v >= min && v <= max);
        }
    }

    #[test]
    fn test_genome_distance() {
        let a = Genome::standard();
        assert_eq!(genome_distance(&a, &a), 0.0);

        let mut b = a.clone();
        if let Some(gene) = b.gene_mut(names::CHECKS_EATEN) {
            gene.value = GeneValue::Number(1.0);
        }
        let d = genome_distance(&a, &b);
        // One gene of 23 moved by half its range.
        assert!((d - 0.5 / 23.0).abs() < 1e-6);
        assert!((population_diversity(&[&a, &b]) - d).abs() < 1e-6);
    }

    #[test]
    fn test_decay_genome() {
        let start = Genome::standard();

        let mut partial = start.clone();
        decay_genome(&mut partial, 100.0);
        for (before, after) in start.genes().iter().zip(partial.genes()) {
            let expected = (before.number_value().unwrap() - 100.0).max(before.min.unwrap());
            assert_eq!(after.number_value(), Some(expected), "{}", after.name);
        }

        let mut floored = start.clone();
        decay_genome(&mut floored, 1000.0);
        for gene in floored.genes() {
            assert_eq!(gene.number_value(), gene.min);
        }
    }

    #[test]
    fn test_spread_ignores_unbounded_range() {
        let mut rng = GenomeRng::new(3);
        assert_eq!(rng.spread(f32::MAX, f32::MAX), 0.0);
        assert_eq!(rng.spread(1.0, -2.0), 0.0);
        let v = rng.spread(1.0, 1.0);
        assert!((-1.0..=1.0).contains(&v));
    }

    proptest! {
        #[test]
        fn prop_mutation_respects_bounds(
            seed in any::<u64>(),
            min in -100.0f32..100.0,
            span in 0.0f32..50.0,
            step in 0.0f32..200.0,
            rate in 0.0f32..=1.0,
            calls in 1usize..200,
        ) {
            let max = min + span;
            let mut rng = StdRng::seed_from_u64(seed);
            let mut gene = Gene::number("X", min, min, max)
                .with_mutation_rate(rate)
                .with_mutation_step(step);
            for _ in 0..calls {
                gene.mutate(&mut rng);
                let v = gene.number_value().unwrap();
                prop_assert!(v >= min && v <= max);
            }
        }
    }
}
