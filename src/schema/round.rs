//! Round phases and per-round statistics.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Stage of a round. Phases advance cyclically and never move backwards.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    /// Clearing the world and spawning the population.
    #[default]
    Initialization,
    /// Critters forage, fight and cannibalize.
    Simulation,
    /// Survivors head home and are scored.
    Evaluation,
    /// The fittest half breeds the next generation.
    Reproduction,
}

impl Phase {
    /// The phase that follows this one.
    pub fn next(self) -> Self {
        match self {
            Phase::Initialization => Phase::Simulation,
            Phase::Simulation => Phase::Evaluation,
            Phase::Evaluation => Phase::Reproduction,
            Phase::Reproduction => Phase::Initialization,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Initialization => "initialization",
            Phase::Simulation => "simulation",
            Phase::Evaluation => "evaluation",
            Phase::Reproduction => "reproduction",
        };
        f.write_str(name)
    }
}

/// Statistics recorded at the end of a round's Evaluation phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundSummary {
    /// Round index, starting at 0.
    pub round: u64,
    /// Critters alive at evaluation time.
    pub population: usize,
    /// Critters that made it home.
    pub critters_home: usize,
    /// Critters eaten during the round.
    pub critters_eaten: usize,
    /// Best fitness of the round.
    pub best_fitness: f32,
    /// Mean fitness over surviving critters.
    pub mean_fitness: f32,
    /// Total food carried home or not.
    pub food_eaten: f32,
    /// Total enemies eaten.
    pub enemies_eaten: f32,
    /// Mean pairwise genome distance.
    pub diversity: f32,
    /// Simulated seconds spent in Simulation.
    pub simulation_seconds: f32,
}

/// Series of round summaries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoundHistory {
    pub rounds: Vec<RoundSummary>,
}

impl RoundHistory {
    /// Append a finished round.
    pub fn push(&mut self, summary: RoundSummary) {
        self.rounds.push(summary);
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    /// Most recent round, if any.
    pub fn last(&self) -> Option<&RoundSummary> {
        self.rounds.last()
    }

    /// Best fitness per round.
    pub fn best_fitness(&self) -> Vec<f32> {
        self.rounds.iter().map(|r| r.best_fitness).collect()
    }

    /// Population per round.
    pub fn population(&self) -> Vec<usize> {
        self.rounds.iter().map(|r| r.population).collect()
    }

    /// Write the history as pretty JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
    }
}
