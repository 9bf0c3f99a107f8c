//! The vivarium: world, round cycle and genetic loop behind one tick method.

use std::io;

use glam::Vec3;

use crate::schema::{
    ConfigError, Genome, GenomeError, Phase, RoundHistory, RoundSummary, VivariumConfig,
};

use super::behavior::{self, CritterState, Decision, Intent, Target, plan_motion};
use super::collaborators::{
    ArrivalStatus, Clock, HeadlessPresentation, KinematicActuator, ManualClock, PhysicalActuator,
    PresentationSink, SpatialQuery, Terrain,
};
use super::evolution::{
    ArchiveError, ArchivedGenome, BehaviorRecord, FitnessEvaluator, GenomeArchive, GenomeRng,
    ParentRecord, ReproductionEngine, auto_categorize, mutate_genome, population_diversity,
};
use super::round::RoundState;
use super::world::{EntityId, Genomic, Kind, Mobile, SpawnRejected, World};

/// Errors building or running a vivarium.
#[derive(Debug, thiserror::Error)]
pub enum VivariumError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Invalid genome: {0}")]
    Genome(#[from] GenomeError),
    #[error("Spawn rejected: {0}")]
    Spawn(#[from] SpawnRejected),
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A vivarium wired to the headless collaborators.
pub type HeadlessVivarium = Vivarium<Terrain, KinematicActuator, HeadlessPresentation, ManualClock>;

/// Drives critters through Initialization, Simulation, Evaluation and
/// Reproduction, one tick at a time.
pub struct Vivarium<S, A, P, C>
where
    S: SpatialQuery,
    A: PhysicalActuator,
    P: PresentationSink,
    C: Clock,
{
    config: VivariumConfig,
    world: World,
    round: RoundState,
    rng: GenomeRng,
    evaluator: FitnessEvaluator,
    engine: ReproductionEngine,
    archive: GenomeArchive,
    history: RoundHistory,
    base_genome: Genome,
    /// Genomes for first-round critters, used in turn.
    seeds: Vec<Genome>,
    next_food_at: Option<f64>,
    simulation_seconds: f32,
    started: bool,
    spatial: S,
    actuator: A,
    presentation: P,
    clock: C,
}

impl HeadlessVivarium {
    /// Vivarium on `terrain` with a kinematic actuator and a fixed-step clock.
    pub fn headless(
        config: VivariumConfig,
        terrain: Terrain,
        tick_seconds: f32,
    ) -> Result<Self, VivariumError> {
        let actuator = KinematicActuator::new(config.arrival_threshold);
        Self::new(
            config,
            terrain,
            actuator,
            HeadlessPresentation::new(),
            ManualClock::new(tick_seconds),
        )
    }
}

impl<S, A, P, C> Vivarium<S, A, P, C>
where
    S: SpatialQuery,
    A: PhysicalActuator,
    P: PresentationSink,
    C: Clock,
{
    /// Create a vivarium with no cities.
    pub fn new(
        config: VivariumConfig,
        spatial: S,
        actuator: A,
        presentation: P,
        clock: C,
    ) -> Result<Self, VivariumError> {
        config.validate()?;
        let base_genome = config.initial_genome()?;

        let seed = config.random_seed.unwrap_or_else(rand::random);
        log::debug!("Vivarium seeded with {}", seed);

        Ok(Self {
            round: RoundState::new(config.phase_time_limit, config.evaluation_time_limit()),
            rng: GenomeRng::new(seed),
            evaluator: FitnessEvaluator::new(config.phase_time_limit),
            engine: ReproductionEngine::new(config.offspring_jitter),
            archive: GenomeArchive::new(config.archive.capacity),
            history: RoundHistory::default(),
            world: World::new(),
            base_genome,
            seeds: Vec::new(),
            next_food_at: None,
            simulation_seconds: 0.0,
            started: false,
            config,
            spatial,
            actuator,
            presentation,
            clock,
        })
    }

    /// First-round critters take these genomes in turn instead of mutants of
    /// the base genome.
    pub fn with_seed_genomes(mut self, genomes: Vec<Genome>) -> Self {
        self.seeds = genomes;
        self
    }

    /// Replace the genome archive, e.g. one with an output directory.
    pub fn with_archive(mut self, archive: GenomeArchive) -> Self {
        self.archive = archive;
        self
    }

    pub fn config(&self) -> &VivariumConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn round(&self) -> &RoundState {
        &self.round
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.round.phase
    }

    /// Summaries of completed rounds.
    pub fn history(&self) -> &RoundHistory {
        &self.history
    }

    pub fn archive(&self) -> &GenomeArchive {
        &self.archive
    }

    pub fn archive_mut(&mut self) -> &mut GenomeArchive {
        &mut self.archive
    }

    pub fn presentation(&self) -> &P {
        &self.presentation
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Found a city centred on `(x, y)`.
    pub fn add_city(&mut self, x: f32, y: f32) -> Result<EntityId, SpawnRejected> {
        let radius = self.config.city_bounds_radius;
        let city = self
            .world
            .spawn_city(&self.spatial, &mut self.presentation, x, y, radius)?;
        log::info!("City {} placed at ({:.1}, {:.1})", self.world.cities().len(), x, y);
        Ok(city)
    }

    /// Place a critter with `genome` at `(x, y)` as a child of `city`.
    pub fn spawn_critter(
        &mut self,
        city: EntityId,
        x: f32,
        y: f32,
        genome: Genome,
    ) -> Result<EntityId, SpawnRejected> {
        self.world
            .spawn_critter(&self.spatial, &mut self.presentation, x, y, genome, city)
    }

    /// Place a food item at `(x, y)`.
    pub fn spawn_food(&mut self, x: f32, y: f32) -> Result<EntityId, SpawnRejected> {
        self.world.spawn_food(&self.spatial, &mut self.presentation, x, y)
    }

    /// Run Initialization and enter Simulation.
    pub fn start(&mut self) -> Phase {
        if self.round.phase != Phase::Initialization {
            log::warn!("Vivarium already started ({} phase)", self.round.phase);
            return self.round.phase;
        }
        self.started = true;
        self.round.phase_start_time = self.clock.now();
        self.initialize_round();
        self.next_phase()
    }

    /// Leave the current phase and run the entry action of the next one.
    pub fn next_phase(&mut self) -> Phase {
        let now = self.clock.now();
        let leaving = self.round.phase;
        if leaving == Phase::Simulation {
            self.simulation_seconds = self.round.elapsed(now);
        }

        let phase = self.round.advance(now);
        log::info!(
            "Round {}: {} -> {}",
            self.round.round_count,
            leaving,
            phase
        );

        match phase {
            Phase::Initialization => self.initialize_round(),
            Phase::Simulation => self.next_food_at = None,
            Phase::Evaluation => self.send_everyone_home(),
            Phase::Reproduction => {
                self.evaluate_round();
                self.reproduce();
            }
        }
        phase
    }

    /// Advance one tick and return the phase afterwards.
    ///
    /// Initialization and Reproduction finish without ticking the clock. The
    /// first step of a vivarium that was never started starts it.
    pub fn step(&mut self) -> Phase {
        match self.round.phase {
            Phase::Initialization if !self.started => return self.start(),
            Phase::Initialization => return self.next_phase(),
            Phase::Reproduction if self.round.reproduction_done() => return self.next_phase(),
            _ => {}
        }

        self.clock.tick();
        let now = self.clock.now();
        let dt = self.clock.delta_time();
        let elapsed = self.round.elapsed(now);

        let done = match self.round.phase {
            Phase::Simulation => {
                self.spawn_scheduled_food(now);
                self.simulation_tick(elapsed, dt);
                self.round.simulation_done(
                    now,
                    self.world.food().len(),
                    self.world.all_alive_critters_home(),
                )
            }
            Phase::Evaluation => {
                self.evaluation_tick(elapsed, dt);
                self.round
                    .evaluation_done(now, self.world.all_alive_critters_home())
            }
            Phase::Initialization | Phase::Reproduction => false,
        };

        if done {
            self.next_phase()
        } else {
            self.round.phase
        }
    }

    /// Step until the current round completes.
    ///
    /// After `max_ticks` the round is forced through its remaining phases.
    /// Returns false in that case.
    pub fn run_round(&mut self, max_ticks: usize) -> bool {
        let round = self.round.round_count;
        for _ in 0..max_ticks {
            self.step();
            if self.round.round_count > round {
                return true;
            }
        }

        log::warn!(
            "Round {} still in {} after {} ticks, forcing it to finish",
            round,
            self.round.phase,
            max_ticks
        );
        while self.round.round_count == round {
            self.next_phase();
        }
        false
    }

    /// Summary of the last completed Evaluation.
    pub fn last_summary(&self) -> Option<&RoundSummary> {
        self.history.last()
    }

    fn initialize_round(&mut self) {
        let mut carried: Vec<(EntityId, Vec<Genome>)> =
            self.world.cities().iter().map(|c| (c, Vec::new())).collect();
        for id in self.world.critters().iter() {
            let Some(individual) = self.world.get(id) else {
                continue;
            };
            let (Some(genome), Some(critter)) = (individual.genome(), individual.as_critter())
            else {
                continue;
            };
            if let Some((_, genomes)) = carried.iter_mut().find(|(c, _)| *c == critter.city) {
                genomes.push(genome.clone());
            }
        }

        self.world.clear(Kind::Critter, &mut self.presentation);
        self.world.clear(Kind::Food, &mut self.presentation);
        self.world.clear(Kind::Corpse, &mut self.presentation);
        let purged = self.world.purge_despawned();
        log::debug!("Purged {} despawned individuals", purged);

        let first_round = self.round.round_count == 0;
        let mut seed_index = 0;
        for (city, mut genomes) in carried {
            if first_round && genomes.is_empty() {
                for _ in 0..self.config.critters_per_city {
                    let genome = self.fresh_genome(&mut seed_index);
                    genomes.push(genome);
                }
            }
            if let Some(floor) = self.config.population_floor {
                while genomes.len() < floor {
                    let genome = self.fresh_genome(&mut seed_index);
                    genomes.push(genome);
                }
            }
            for genome in genomes {
                self.spawn_in_city(city, genome);
            }
        }

        let critters = self.world.critters().len();
        let food = (critters as f32 * self.config.food_per_critter).round() as usize;
        for _ in 0..food {
            let point = World::random_point(
                &self.spatial,
                &mut self.rng,
                self.config.max_spawn_attempts,
            );
            let spawned = point.and_then(|(x, y)| {
                self.world
                    .spawn_food(&self.spatial, &mut self.presentation, x, y)
            });
            if let Err(err) = spawned {
                log::warn!("Food not placed: {}", err);
            }
        }

        let ids: Vec<EntityId> = self.world.critters().iter().collect();
        for id in ids {
            let nearest = self
                .world
                .position(id)
                .and_then(|from| self.world.nearest_food(from, &self.spatial));
            let decision = nearest.map(|food| Decision {
                target: Target::Entity(food),
                intent: Intent::Forage,
            });
            behavior::apply_decision(&mut self.world, id, decision);
        }

        log::info!(
            "Round {} initialized: {} critters, {} food, {} cities",
            self.round.round_count,
            self.world.critters().len(),
            self.world.food().len(),
            self.world.cities().len()
        );
    }

    /// A seed genome in turn, or a mutant of the base genome.
    fn fresh_genome(&mut self, seed_index: &mut usize) -> Genome {
        if !self.seeds.is_empty() {
            let genome = self.seeds[*seed_index % self.seeds.len()].clone();
            *seed_index += 1;
            return genome;
        }
        let mut genome = self.base_genome.clone();
        mutate_genome(&mut genome, &mut self.rng);
        genome
    }

    fn spawn_in_city(&mut self, city: EntityId, genome: Genome) -> Option<EntityId> {
        let spawned = self
            .world
            .random_point_in_city(city, &self.spatial, &mut self.rng, self.config.max_spawn_attempts)
            .and_then(|(x, y)| {
                self.world
                    .spawn_critter(&self.spatial, &mut self.presentation, x, y, genome, city)
            });
        match spawned {
            Ok(id) => Some(id),
            Err(err) => {
                log::warn!("Critter not placed in city {:?}: {}", city, err);
                None
            }
        }
    }

    fn spawn_scheduled_food(&mut self, now: f64) {
        let Some(spawn) = &self.config.food_spawn else {
            return;
        };
        let (min, max, cap) = (spawn.min_interval, spawn.max_interval, spawn.max_food);

        let due = match self.next_food_at {
            Some(at) => at,
            None => {
                self.next_food_at = Some(now + self.rng.uniform((min, max)) as f64);
                return;
            }
        };
        if now < due {
            return;
        }

        if self.world.food().len() < cap {
            let point = World::random_point(
                &self.spatial,
                &mut self.rng,
                self.config.max_spawn_attempts,
            );
            match point.and_then(|(x, y)| self.spawn_food(x, y)) {
                Ok(_) => log::debug!("Food spawned, {} in world", self.world.food().len()),
                Err(err) => log::warn!("Scheduled food not placed: {}", err),
            }
        }
        self.next_food_at = Some(now + self.rng.uniform((min, max)) as f64);
    }

    fn simulation_tick(&mut self, elapsed: f32, dt: f32) {
        let ids: Vec<EntityId> = self.world.critters().iter().collect();
        for id in ids {
            // Eaten earlier this tick.
            if !self.world.is_alive(id) {
                continue;
            }
            behavior::decide(
                &mut self.world,
                id,
                elapsed,
                &self.config,
                &self.spatial,
                &mut self.rng,
            );
            if self.move_critter(id, dt) == ArrivalStatus::Arrived {
                behavior::arrive(
                    &mut self.world,
                    id,
                    elapsed,
                    &self.config,
                    &mut self.presentation,
                    &mut self.rng,
                );
            }
        }
    }

    fn evaluation_tick(&mut self, elapsed: f32, dt: f32) {
        let ids: Vec<EntityId> = self.world.critters().iter().collect();
        for id in ids {
            let returning = self
                .world
                .critter(id)
                .is_some_and(|c| c.state == CritterState::ReturningHome);
            if returning && self.move_critter(id, dt) == ArrivalStatus::Arrived {
                behavior::arrive(
                    &mut self.world,
                    id,
                    elapsed,
                    &self.config,
                    &mut self.presentation,
                    &mut self.rng,
                );
            }
        }
    }

    /// Move one critter a tick toward its goal.
    fn move_critter(&mut self, id: EntityId, dt: f32) -> ArrivalStatus {
        let Some(individual) = self.world.get(id) else {
            return ArrivalStatus::Traveling;
        };
        let (Some(critter), Some(goal)) = (individual.as_critter(), individual.goal()) else {
            return ArrivalStatus::Traveling;
        };
        if critter.state == CritterState::AtHome {
            return ArrivalStatus::Traveling;
        }
        let target = match goal {
            Target::Entity(target) => match self.world.position(target) {
                Some(p) => p,
                None => return ArrivalStatus::Traveling,
            },
            Target::Point(p) => p,
        };

        let params = critter.params;
        let mut position = individual.position;
        let mut velocity = individual.velocity;
        let handle = individual.handle;

        let plan = plan_motion(
            &params,
            position,
            target,
            &self.spatial,
            &self.config,
            dt,
            &mut self.rng,
        );

        if plan.hop > 0.0 {
            let lifted = position + Vec3::Z * plan.hop;
            self.actuator.teleport(&mut position, &mut velocity, lifted);
        }
        if plan.vertical != 0.0 {
            self.actuator
                .apply_impulse(&mut velocity, Vec3::Z * plan.vertical * plan.step);
        }
        let step = match plan.jitter {
            Some(jitter) => {
                self.actuator.apply_impulse(&mut velocity, jitter * plan.step);
                0.0
            }
            None => plan.step,
        };

        let status =
            self.actuator
                .move_toward(&mut position, &mut velocity, target, step, dt, &self.spatial);

        if let Some(individual) = self.world.get_mut(id) {
            individual.position = position;
            individual.velocity = velocity;
        }
        if let Some(handle) = handle {
            self.presentation.set_position(handle, position);
        }
        status
    }

    fn send_everyone_home(&mut self) {
        let ids: Vec<EntityId> = self.world.critters().iter().collect();
        for &id in &ids {
            behavior::return_home(&mut self.world, id);
        }
        log::debug!(
            "{} critters heading home, {} already there",
            ids.len() - self.world.critters_home_count(),
            self.world.critters_home_count()
        );
    }

    /// Score survivors, record the round and feed the archive.
    fn evaluate_round(&mut self) {
        let survivors: Vec<(EntityId, BehaviorRecord, f32)> = self
            .world
            .critters()
            .iter()
            .filter_map(|id| {
                let critter = self.world.critter(id)?;
                Some((id, critter.record.clone(), critter.params.max_food))
            })
            .collect();

        let entries: Vec<(BehaviorRecord, f32)> = survivors
            .iter()
            .map(|(_, record, max_food)| (record.clone(), *max_food))
            .collect();
        let scores = self.evaluator.evaluate_population(&entries);

        for ((id, _, _), &fitness) in survivors.iter().zip(&scores) {
            if let Some(critter) = self.world.critter_mut(*id) {
                critter.fitness = fitness;
            }
        }

        let genomes: Vec<&Genome> = survivors
            .iter()
            .filter_map(|(id, _, _)| self.world.critter(*id).map(|c| &c.genome))
            .collect();
        let population = survivors.len();
        let summary = RoundSummary {
            round: self.round.round_count,
            population,
            critters_home: self.world.critters_home_count(),
            critters_eaten: self.world.corpses().len(),
            best_fitness: scores.iter().copied().fold(0.0, f32::max),
            mean_fitness: if population > 0 {
                scores.iter().sum::<f32>() / population as f32
            } else {
                0.0
            },
            food_eaten: entries.iter().map(|(r, _)| r.food_eaten).sum(),
            enemies_eaten: entries.iter().map(|(r, _)| r.enemies_eaten).sum(),
            diversity: population_diversity(&genomes),
            simulation_seconds: self.simulation_seconds,
        };

        log::info!(
            "Round {} | population {} | home {} | eaten {} | best {:.3} | mean {:.3} | diversity {:.3}",
            summary.round,
            summary.population,
            summary.critters_home,
            summary.critters_eaten,
            summary.best_fitness,
            summary.mean_fitness,
            summary.diversity
        );
        self.history.push(summary);

        if self.config.archive.enabled {
            self.archive_best(&survivors, &scores);
        }
    }

    fn archive_best(&mut self, survivors: &[(EntityId, BehaviorRecord, f32)], scores: &[f32]) {
        let mut ranked: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut kept = 0;
        for (index, fitness) in ranked.into_iter().take(self.config.archive.per_round) {
            if fitness < self.config.archive.min_fitness {
                break;
            }
            let (id, record, max_food) = &survivors[index];
            let Some(individual) = self.world.get(*id) else {
                continue;
            };
            let Some(genome) = individual.genome() else {
                continue;
            };
            let entry = ArchivedGenome {
                serial: individual.serial,
                round: self.round.round_count,
                fitness,
                genome: genome.clone(),
                record: record.clone(),
                tags: auto_categorize(record, *max_food),
                saved_path: None,
            };
            if self.archive.add(entry).is_some() {
                kept += 1;
            }
        }
        log::debug!("Archived {} genomes ({} total)", kept, self.archive.len());
    }

    /// Replace the population with the offspring of its fittest half.
    fn reproduce(&mut self) {
        let parents: Vec<ParentRecord> = self
            .world
            .critters()
            .iter()
            .filter_map(|id| {
                let individual = self.world.get(id)?;
                let critter = individual.as_critter()?;
                Some(ParentRecord {
                    serial: individual.serial,
                    genome: critter.genome.clone(),
                    position: individual.position,
                    fitness: critter.fitness,
                    city: Some(critter.city),
                })
            })
            .collect();
        let survivors = parents.len();

        let offspring = self.engine.breed(parents, &mut self.rng);
        self.world.clear(Kind::Critter, &mut self.presentation);

        let mut placed = 0;
        for plan in offspring {
            let Some(city) = plan.city else {
                log::warn!("Offspring of {:?} has no city", plan.parents);
                continue;
            };
            let (x, y) = (plan.position.x, plan.position.y);
            let spawned = if self.spatial.is_valid_coordinate(x, y) {
                self.spawn_critter(city, x, y, plan.genome).ok()
            } else {
                self.spawn_in_city(city, plan.genome)
            };
            if spawned.is_some() {
                placed += 1;
            }
        }

        if placed == 0 && survivors > 0 {
            log::warn!("Population of {} produced no offspring", survivors);
        }
        log::info!("Bred {} offspring from {} survivors", placed, survivors);
    }
}
