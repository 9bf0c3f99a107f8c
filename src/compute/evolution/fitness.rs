//! Fitness scoring of critters at the end of a round.

#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// What a critter achieved during one round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BehaviorRecord {
    /// Food carried, never above the critter's Max Food gene.
    pub food_eaten: f32,
    /// Half a point per fight won against another city's critter.
    pub enemies_eaten: f32,
    /// Ate at least one food item this round.
    pub got_food: bool,
    /// Phase seconds at which the first food item was eaten.
    pub time_to_first_food: Option<f32>,
    /// Reached its home city before evaluation.
    pub at_city: bool,
}

impl BehaviorRecord {
    /// Record one food item eaten `elapsed` seconds into the phase.
    pub fn record_food(&mut self, elapsed: f32, max_food: f32) {
        self.got_food = true;
        self.food_eaten = (self.food_eaten + 1.0).min(max_food.max(0.0));
        self.time_to_first_food = Some(match self.time_to_first_food {
            Some(t) => t.min(elapsed),
            None => elapsed,
        });
    }

    /// Record a won fight. Kills across city lines also count as enemies.
    pub fn record_kill(&mut self, foreign: bool, max_food: f32) {
        self.food_eaten = (self.food_eaten + 0.5).min(max_food.max(0.0));
        if foreign {
            self.enemies_eaten += 0.5;
        }
    }
}

/// Scores a [`BehaviorRecord`].
#[derive(Debug, Clone)]
pub struct FitnessEvaluator {
    phase_time_limit: f32,
}

impl FitnessEvaluator {
    /// Evaluator for rounds whose Simulation phase lasts `phase_time_limit`.
    pub fn new(phase_time_limit: f32) -> Self {
        Self { phase_time_limit }
    }

    /// Fitness of one critter.
    ///
    /// One point for eating anything, plus the filled share of capacity, plus
    /// enemies eaten, plus first-food time over the phase limit. A critter
    /// that is not home scores zero regardless of the rest.
    pub fn evaluate(&self, record: &BehaviorRecord, max_food: f32) -> f32 {
        if !record.at_city {
            return 0.0;
        }

        let mut fitness = if record.got_food { 1.0 } else { 0.0 };
        if max_food > 0.0 {
            fitness += record.food_eaten / max_food;
        }
        fitness += record.enemies_eaten;
        if let Some(t) = record.time_to_first_food {
            if self.phase_time_limit > 0.0 {
                fitness += t / self.phase_time_limit;
            }
        }
        fitness
    }

    /// Score `(record, max_food)` pairs.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn evaluate_population(&self, entries: &[(BehaviorRecord, f32)]) -> Vec<f32> {
        entries
            .par_iter()
            .map(|(record, max_food)| self.evaluate(record, *max_food))
            .collect()
    }

    #[cfg(target_arch = "wasm32")]
    pub fn evaluate_population(&self, entries: &[(BehaviorRecord, f32)]) -> Vec<f32> {
        entries
            .iter()
            .map(|(record, max_food)| self.evaluate(record, *max_food))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fed_record() -> BehaviorRecord {
        BehaviorRecord {
            food_eaten: 1.0,
            enemies_eaten: 0.5,
            got_food: true,
            time_to_first_food: Some(15.0),
            at_city: true,
        }
    }

    #[test]
    fn test_fitness_formula() {
        let evaluator = FitnessEvaluator::new(30.0);
        let fitness = evaluator.evaluate(&fed_record(), 2.0);
        // 1 + 1/2 + 0.5 + 15/30
        assert!((fitness - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_never_ate_scores_zero_time_term() {
        let evaluator = FitnessEvaluator::new(30.0);
        let record = BehaviorRecord {
            at_city: true,
            ..Default::default()
        };
        assert_eq!(evaluator.evaluate(&record, 1.0), 0.0);
    }

    #[test]
    fn test_zero_max_food_skips_ratio() {
        let evaluator = FitnessEvaluator::new(30.0);
        let fitness = evaluator.evaluate(&fed_record(), 0.0);
        assert!(fitness.is_finite());
        assert!((fitness - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_record_food_clamps_and_keeps_first_time() {
        let mut record = BehaviorRecord::default();
        record.record_food(4.0, 1.5);
        record.record_food(9.0, 1.5);
        assert_eq!(record.food_eaten, 1.5);
        assert_eq!(record.time_to_first_food, Some(4.0));
        assert!(record.got_food);
    }

    #[test]
    fn test_record_kill() {
        let mut record = BehaviorRecord::default();
        record.record_kill(false, 5.0);
        record.record_kill(true, 5.0);
        assert_eq!(record.food_eaten, 1.0);
        assert_eq!(record.enemies_eaten, 0.5);
    }

    #[test]
    fn test_evaluate_population_matches_single() {
        let evaluator = FitnessEvaluator::new(30.0);
        let entries = vec![(fed_record(), 2.0), (BehaviorRecord::default(), 1.0)];
        let scores = evaluator.evaluate_population(&entries);
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0], evaluator.evaluate(&entries[0].0, 2.0));
        assert_eq!(scores[1], 0.0);
    }

    proptest! {
        #[test]
        fn prop_not_home_scores_zero(
            food in 0.0f32..100.0,
            enemies in 0.0f32..50.0,
            got_food in any::<bool>(),
            first in proptest::option::of(0.0f32..30.0),
            max_food in 0.0f32..10.0,
        ) {
            let evaluator = FitnessEvaluator::new(30.0);
            let record = BehaviorRecord {
                food_eaten: food,
                enemies_eaten: enemies,
                got_food,
                time_to_first_food: first,
                at_city: false,
            };
            prop_assert_eq!(evaluator.evaluate(&record, max_food), 0.0);
        }
    }
}
