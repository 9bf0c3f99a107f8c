//! Configuration types for vivarium rounds.

use serde::{Deserialize, Serialize};

use super::genome::{Gene, Genome, GenomeError};

fn default_phase_time_limit() -> f32 {
    30.0
}
fn default_critters_per_city() -> usize {
    10
}
fn default_food_per_critter() -> f32 {
    1.0
}
fn default_city_bounds_radius() -> f32 {
    50.0
}
fn default_arrival_threshold() -> f32 {
    20.0
}
fn default_fight_random_chance() -> f32 {
    0.01
}
fn default_base_speed() -> f32 {
    100.0
}
fn default_offspring_jitter() -> f32 {
    10.0
}
fn default_max_reselect_depth() -> usize {
    100
}
fn default_raid_city_retries() -> usize {
    10
}
fn default_jump_lookahead_distance() -> f32 {
    10.0
}
fn default_jump_lookahead_samples() -> usize {
    20
}
fn default_fall_threshold() -> f32 {
    30.0
}
fn default_max_spawn_attempts() -> usize {
    32
}
fn default_evaluation_divisor() -> f32 {
    5.0
}

/// Top-level configuration of a vivarium.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VivariumConfig {
    /// Simulation phase budget in seconds.
    #[serde(default = "default_phase_time_limit")]
    pub phase_time_limit: f32,
    /// Evaluation ends after `phase_time_limit / evaluation_divisor`.
    #[serde(default = "default_evaluation_divisor")]
    pub evaluation_divisor: f32,
    /// Critters spawned per city on the first round.
    #[serde(default = "default_critters_per_city")]
    pub critters_per_city: usize,
    /// Food items seeded per critter at Initialization.
    #[serde(default = "default_food_per_critter")]
    pub food_per_critter: f32,
    /// Half-width of the square a city spawns its critters in.
    #[serde(default = "default_city_bounds_radius")]
    pub city_bounds_radius: f32,
    /// Distance below which a mover has arrived.
    #[serde(default = "default_arrival_threshold")]
    pub arrival_threshold: f32,
    /// Half-width of the noise added to a fight's strength difference.
    #[serde(default = "default_fight_random_chance")]
    pub fight_random_chance: f32,
    /// Distance per second at Speed gene 1.0.
    #[serde(default = "default_base_speed")]
    pub base_speed: f32,
    /// Offspring spawn within this distance of their parents' midpoint.
    #[serde(default = "default_offspring_jitter")]
    pub offspring_jitter: f32,
    /// Upper bound on target re-selections in one decision.
    #[serde(default = "default_max_reselect_depth")]
    pub max_reselect_depth: usize,
    /// Attempts to pick a foreign city before a raid is abandoned.
    #[serde(default = "default_raid_city_retries")]
    pub raid_city_retries: usize,
    /// How far ahead terrain is sampled when deciding to jump.
    #[serde(default = "default_jump_lookahead_distance")]
    pub jump_lookahead_distance: f32,
    /// Number of look-ahead samples.
    #[serde(default = "default_jump_lookahead_samples")]
    pub jump_lookahead_samples: usize,
    /// Height above ground after which a critter is pushed down.
    #[serde(default = "default_fall_threshold")]
    pub fall_threshold: f32,
    /// Random placements tried before a spawn is given up.
    #[serde(default = "default_max_spawn_attempts")]
    pub max_spawn_attempts: usize,
    /// Minimum critters per city, topped up with fresh genomes.
    #[serde(default)]
    pub population_floor: Option<usize>,
    /// Periodic food spawning during Simulation.
    #[serde(default)]
    pub food_spawn: Option<FoodSpawnConfig>,
    /// Seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
    /// Genome for first-round critters. The standard table when absent.
    #[serde(default)]
    pub base_genome: Option<Vec<Gene>>,
    /// Retention of the best genomes across rounds.
    #[serde(default)]
    pub archive: ArchiveConfig,
}

impl Default for VivariumConfig {
    fn default() -> Self {
        Self {
            phase_time_limit: default_phase_time_limit(),
            evaluation_divisor: default_evaluation_divisor(),
            critters_per_city: default_critters_per_city(),
            food_per_critter: default_food_per_critter(),
            city_bounds_radius: default_city_bounds_radius(),
            arrival_threshold: default_arrival_threshold(),
            fight_random_chance: default_fight_random_chance(),
            base_speed: default_base_speed(),
            offspring_jitter: default_offspring_jitter(),
            max_reselect_depth: default_max_reselect_depth(),
            raid_city_retries: default_raid_city_retries(),
            jump_lookahead_distance: default_jump_lookahead_distance(),
            jump_lookahead_samples: default_jump_lookahead_samples(),
            fall_threshold: default_fall_threshold(),
            max_spawn_attempts: default_max_spawn_attempts(),
            population_floor: None,
            food_spawn: None,
            random_seed: None,
            base_genome: None,
            archive: ArchiveConfig::default(),
        }
    }
}

impl VivariumConfig {
    /// Evaluation phase budget in seconds.
    #[inline]
    /// Evaluation budget: the phase limit divided by `evaluation_divisor`.
    pub fn evaluation_time_limit(&self) -> f32 {
        self.phase_time_limit / self.evaluation_divisor
    }

    /// Genome given to first-round critters.
    pub fn initial_genome(&self) -> Result<Genome, GenomeError> {
        match &self.base_genome {
            Some(genes) => Genome::new(genes.clone()),
            None => Ok(Genome::standard()),
        }
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.phase_time_limit > 0.0) {
            return Err(ConfigError::InvalidPhaseTimeLimit(self.phase_time_limit));
        }
        if !(self.evaluation_divisor > 0.0) {
            return Err(ConfigError::InvalidEvaluationDivisor(self.evaluation_divisor));
        }
        if !(self.food_per_critter >= 0.0) {
            return Err(ConfigError::InvalidFoodRatio(self.food_per_critter));
        }
        if !(self.city_bounds_radius > 0.0) {
            return Err(ConfigError::InvalidCityRadius(self.city_bounds_radius));
        }
        if !(self.arrival_threshold > 0.0) {
            return Err(ConfigError::InvalidArrivalThreshold(self.arrival_threshold));
        }
        if !(self.fight_random_chance >= 0.0) {
            return Err(ConfigError::InvalidFightChance(self.fight_random_chance));
        }
        if !(self.base_speed > 0.0) {
            return Err(ConfigError::InvalidSpeed(self.base_speed));
        }
        if !(self.offspring_jitter.is_finite() && self.offspring_jitter >= 0.0) {
            return Err(ConfigError::InvalidOffspringJitter(self.offspring_jitter));
        }
        if self.max_reselect_depth == 0 {
            return Err(ConfigError::InvalidReselectDepth);
        }
        if self.max_spawn_attempts == 0 {
            return Err(ConfigError::InvalidSpawnAttempts);
        }
        if let Some(food) = &self.food_spawn {
            food.validate()?;
        }
        self.initial_genome()?;
        self.archive.validate()?;
        Ok(())
    }
}

fn default_min_interval() -> f32 {
    3.0
}
fn default_max_interval() -> f32 {
    5.0
}
fn default_max_food() -> usize {
    50
}

/// Periodic food spawning during the Simulation phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodSpawnConfig {
    /// Shortest wait between spawns, in seconds.
    #[serde(default = "default_min_interval")]
    pub min_interval: f32,
    /// Longest wait between spawns, in seconds.
    #[serde(default = "default_max_interval")]
    pub max_interval: f32,
    /// No spawn happens while this many food items exist.
    #[serde(default = "default_max_food")]
    pub max_food: usize,
}

impl Default for FoodSpawnConfig {
    fn default() -> Self {
        Self {
            min_interval: default_min_interval(),
            max_interval: default_max_interval(),
            max_food: default_max_food(),
        }
    }
}

impl FoodSpawnConfig {
    /// Validate the spawn interval.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_interval > 0.0) || self.min_interval > self.max_interval {
            return Err(ConfigError::InvalidFoodInterval {
                min: self.min_interval,
                max: self.max_interval,
            });
        }
        Ok(())
    }
}

fn default_archive_capacity() -> usize {
    20
}
fn default_archive_per_round() -> usize {
    3
}

/// Retention of top genomes across rounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Keep genomes at all.
    #[serde(default)]
    pub enabled: bool,
    /// Maximum genomes retained.
    #[serde(default = "default_archive_capacity")]
    pub capacity: usize,
    /// Best genomes offered to the archive after each Evaluation.
    #[serde(default = "default_archive_per_round")]
    pub per_round: usize,
    /// Only genomes with at least this fitness are kept.
    #[serde(default)]
    pub min_fitness: f32,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: default_archive_capacity(),
            per_round: default_archive_per_round(),
            min_fitness: 0.0,
        }
    }
}

impl ArchiveConfig {
    /// A retained archive needs room.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.capacity == 0 {
            return Err(ConfigError::InvalidArchiveCapacity);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Phase time limit must be positive, got {0}")]
    InvalidPhaseTimeLimit(f32),
    #[error("Evaluation divisor must be positive, got {0}")]
    InvalidEvaluationDivisor(f32),
    #[error("Food per critter must be non-negative, got {0}")]
    InvalidFoodRatio(f32),
    #[error("City bounds radius must be positive, got {0}")]
    InvalidCityRadius(f32),
    #[error("Arrival threshold must be positive, got {0}")]
    InvalidArrivalThreshold(f32),
    #[error("Fight random chance must be non-negative, got {0}")]
    InvalidFightChance(f32),
    #[error("Base speed must be positive, got {0}")]
    InvalidSpeed(f32),
    #[error("Offspring jitter must be finite and non-negative, got {0}")]
    InvalidOffspringJitter(f32),
    #[error("Re-selection depth must be non-zero")]
    InvalidReselectDepth,
    #[error("Spawn attempts must be non-zero")]
    InvalidSpawnAttempts,
    #[error("Food spawn interval [{min}, {max}] is invalid")]
    InvalidFoodInterval { min: f32, max: f32 },
    #[error("Archive capacity must be non-zero when enabled")]
    InvalidArchiveCapacity,
    #[error("Tick length must be positive, got {0}")]
    InvalidTickSeconds(f32),
    #[error("Scenario declares no cities")]
    NoCities,
    #[error("Invalid terrain: {0}")]
    InvalidTerrain(String),
    #[error("Base genome is invalid: {0}")]
    InvalidGenome(#[from] GenomeError),
}
