//! Headless scenario description used by the command-line runner.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::config::{ConfigError, VivariumConfig};

fn default_rounds() -> u64 {
    10
}
fn default_tick_seconds() -> f32 {
    1.0 / 30.0
}
fn default_max_ticks_per_round() -> usize {
    10_000
}

/// A complete headless run: terrain, cities and vivarium settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub vivarium: VivariumConfig,
    #[serde(default)]
    pub terrain: TerrainConfig,
    /// City centres in world (x, y).
    pub cities: Vec<(f32, f32)>,
    /// Rounds to run.
    #[serde(default = "default_rounds")]
    pub rounds: u64,
    /// Simulated seconds per tick.
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: f32,
    /// Ticks after which a stuck round is abandoned.
    #[serde(default = "default_max_ticks_per_round")]
    pub max_ticks_per_round: usize,
    /// Where to write the round history as JSON.
    #[serde(default)]
    pub history_path: Option<PathBuf>,
    /// Directory the genome archive is saved to after the run.
    #[serde(default)]
    pub archive_dir: Option<PathBuf>,
    /// Directory of archived genomes that seed the first round.
    #[serde(default)]
    pub seed_archive_dir: Option<PathBuf>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            vivarium: VivariumConfig::default(),
            terrain: TerrainConfig::default(),
            cities: vec![(100.0, 100.0), (400.0, 400.0)],
            rounds: default_rounds(),
            tick_seconds: default_tick_seconds(),
            max_ticks_per_round: default_max_ticks_per_round(),
            history_path: None,
            archive_dir: None,
            seed_archive_dir: None,
        }
    }
}

impl ScenarioConfig {
    /// Vivarium settings for this run. Naming an archive directory turns
    /// archiving on.
    pub fn vivarium_config(&self) -> VivariumConfig {
        let mut config = self.vivarium.clone();
        if self.archive_dir.is_some() && !config.archive.enabled {
            log::warn!("archive_dir is set but archiving is disabled, enabling it");
            config.archive.enabled = true;
        }
        config
    }

    /// Validate the scenario and the vivarium settings it will run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.vivarium_config().validate()?;
        self.terrain.validate()?;
        if !(self.tick_seconds > 0.0) {
            return Err(ConfigError::InvalidTickSeconds(self.tick_seconds));
        }
        if self.cities.is_empty() {
            return Err(ConfigError::NoCities);
        }
        Ok(())
    }
}

/// Ground the scenario runs on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TerrainConfig {
    /// Level plane of the given extent.
    Flat {
        width: f32,
        depth: f32,
        #[serde(default)]
        elevation: f32,
    },
    /// Rolling sinusoidal hills.
    Hills {
        width: f32,
        depth: f32,
        amplitude: f32,
        wavelength: f32,
    },
    /// Explicit height samples on a regular grid, row-major.
    Grid {
        columns: usize,
        rows: usize,
        cell_size: f32,
        heights: Vec<f32>,
    },
}

impl Default for TerrainConfig {
    fn default() -> Self {
        TerrainConfig::Flat {
            width: 512.0,
            depth: 512.0,
            elevation: 0.0,
        }
    }
}

impl TerrainConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            TerrainConfig::Flat { width, depth, .. } | TerrainConfig::Hills { width, depth, .. } => {
                if !(*width > 0.0 && *depth > 0.0) {
                    return Err(ConfigError::InvalidTerrain("extent must be positive".into()));
                }
            }
            TerrainConfig::Grid {
                columns,
                rows,
                cell_size,
                heights,
            } => {
                if *columns < 2 || *rows < 2 {
                    return Err(ConfigError::InvalidTerrain(
                        "grid needs at least 2x2 samples".into(),
                    ));
                }
                if heights.len() != columns * rows {
                    return Err(ConfigError::InvalidTerrain(format!(
                        "expected {} heights, got {}",
                        columns * rows,
                        heights.len()
                    )));
                }
                if !(*cell_size > 0.0) {
                    return Err(ConfigError::InvalidTerrain("cell size must be positive".into()));
                }
            }
        }
        Ok(())
    }
}
