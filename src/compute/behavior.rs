//! Per-critter decision policy: target selection, motion planning, fighting.
//!
//! A critter's genes are projected onto [`BehaviorParams`] once at spawn. Each
//! Simulation tick the vivarium calls [`decide`], moves the critter toward its
//! goal and, on arrival, calls [`arrive`].

use glam::{Vec3, Vec4};
use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::{GeneCatalog, GeneTarget, GeneValue, Genome, VivariumConfig, names};

use super::collaborators::{PresentationSink, SpatialQuery};
use super::evolution::GenomeRng;
use super::world::{EntityId, Kind, Mobile, World};

/// Attacker colour after winning a fight.
pub const WINNER_COLOR: Vec4 = Vec4::new(1.0, 1.0, 1.0, 1.0);
/// Attacker colour after losing a fight.
pub const LOSER_COLOR: Vec4 = Vec4::new(1.0, 0.0, 0.0, 1.0);

/// Gene values a critter acts on, one field per standard gene.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BehaviorParams {
    pub strength: f32,
    pub jump_strength: f32,
    pub speed: f32,
    /// Percent chance per tick of a random hop.
    pub jump_chance: f32,
    /// Percent chance per tick of random motion.
    pub random_motion_chance: f32,
    pub random_motion_neg_x: f32,
    pub random_motion_pos_x: f32,
    pub random_motion_neg_y: f32,
    pub random_motion_pos_y: f32,
    pub random_motion_neg_z: f32,
    pub random_motion_pos_z: f32,
    pub max_food: f32,
    pub closest_food_first: f32,
    pub random_food_first: f32,
    pub checks_eaten: f32,
    pub close_threshold: f32,
    pub change_mind_chance: f32,
    pub eat_other_tribes_chance: f32,
    pub cannibalism_chance: f32,
    /// Phase seconds before cannibalism is considered.
    pub cannibalism_wait: f32,
    pub smart_cannibalism: f32,
    pub nest_offset_x: f32,
    pub nest_offset_y: f32,
}

impl BehaviorParams {
    /// Every field at the catalog default of its gene.
    pub fn floor(catalog: &GeneCatalog) -> Self {
        let mut params = Self::default();
        for name in names::ALL {
            params.set_gene(name, &GeneValue::Number(catalog.default_for(name)));
        }
        params
    }

    /// Project `genome` onto a fresh set of parameters. Genes the genome
    /// lacks keep their catalog default.
    pub fn from_genome(genome: &Genome, catalog: &GeneCatalog) -> Self {
        let mut params = Self::floor(catalog);
        genome.apply_to(&mut params);
        params
    }
}

impl GeneTarget for BehaviorParams {
    fn set_gene(&mut self, name: &str, value: &GeneValue) -> bool {
        let Some(v) = value.as_number() else {
            return false;
        };
        let field = match name {
            names::STRENGTH => &mut self.strength,
            names::JUMP_STRENGTH => &mut self.jump_strength,
            names::SPEED => &mut self.speed,
            names::JUMP_CHANCE => &mut self.jump_chance,
            names::RANDOM_MOTION_CHANCE => &mut self.random_motion_chance,
            names::RANDOM_MOTION_NEG_X => &mut self.random_motion_neg_x,
            names::RANDOM_MOTION_POS_X => &mut self.random_motion_pos_x,
            names::RANDOM_MOTION_NEG_Y => &mut self.random_motion_neg_y,
            names::RANDOM_MOTION_POS_Y => &mut self.random_motion_pos_y,
            names::RANDOM_MOTION_NEG_Z => &mut self.random_motion_neg_z,
            names::RANDOM_MOTION_POS_Z => &mut self.random_motion_pos_z,
            names::MAX_FOOD => &mut self.max_food,
            names::CLOSEST_FOOD_FIRST => &mut self.closest_food_first,
            names::RANDOM_FOOD_FIRST => &mut self.random_food_first,
            names::CHECKS_EATEN => &mut self.checks_eaten,
            names::CLOSE_THRESHOLD => &mut self.close_threshold,
            names::CHANGE_MIND_CHANCE => &mut self.change_mind_chance,
            names::EAT_OTHER_TRIBES_CHANCE => &mut self.eat_other_tribes_chance,
            names::CANNIBALISM_CHANCE => &mut self.cannibalism_chance,
            names::CANNIBALISM_WAIT => &mut self.cannibalism_wait,
            names::SMART_CANNIBALISM => &mut self.smart_cannibalism,
            names::NEST_OFFSET_X => &mut self.nest_offset_x,
            names::NEST_OFFSET_Y => &mut self.nest_offset_y,
            _ => return false,
        };
        *field = v;
        true
    }
}

/// Where a critter is in its forage cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CritterState {
    #[default]
    Idle,
    Seeking,
    Traveling,
    Consuming,
    ReturningHome,
    AtHome,
}

/// Why a critter chose its current goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Intent {
    #[default]
    Forage,
    Cannibalize,
    Raid,
    Nest,
    ReturnHome,
}

/// A movement goal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Target {
    Entity(EntityId),
    Point(Vec3),
}

/// Outcome of [`select_target`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub target: Target,
    pub intent: Intent,
}

/// Result of a fight from the attacker's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FightOutcome {
    /// The defender was already eaten or safe at home.
    Avoided,
    Won,
    Lost,
}

/// Choose a goal for `critter`.
///
/// Branches are tried in priority order and the first that yields a target
/// wins: cannibalism, closest food, raiding another city, random food, then
/// close-or-nearest food, and finally the nest point. When the Checks Eaten
/// roll passes and the chosen entity is already eaten, selection runs again,
/// at most `config.max_reselect_depth` times.
pub fn select_target(
    world: &World,
    critter: EntityId,
    elapsed: f32,
    config: &VivariumConfig,
    spatial: &dyn SpatialQuery,
    rng: &mut GenomeRng,
) -> Option<Decision> {
    let params = world.critter(critter)?.params;
    let mut decision = None;

    for depth in 0..config.max_reselect_depth {
        decision = pick_once(world, critter, elapsed, config, spatial, rng);
        match decision {
            Some(Decision {
                target: Target::Entity(id),
                ..
            }) if !world.is_alive(id) && rng.chance(params.checks_eaten) => {
                log::trace!("Target already eaten, re-selecting (depth {})", depth + 1);
            }
            _ => break,
        }
    }

    decision
}

fn pick_once(
    world: &World,
    id: EntityId,
    elapsed: f32,
    config: &VivariumConfig,
    spatial: &dyn SpatialQuery,
    rng: &mut GenomeRng,
) -> Option<Decision> {
    let individual = world.get(id)?;
    let critter = individual.as_critter()?;
    let params = critter.params;
    let from = individual.position;

    if rng.chance(params.cannibalism_chance) && elapsed >= params.cannibalism_wait {
        let smart = rng.chance(params.smart_cannibalism);
        if let Some(sibling) = pick_sibling(world, id, critter.city, smart, rng) {
            return Some(Decision {
                target: Target::Entity(sibling),
                intent: Intent::Cannibalize,
            });
        }
    }

    if rng.chance(params.closest_food_first) {
        if let Some(food) = world.nearest_food(from, spatial) {
            return Some(Decision {
                target: Target::Entity(food),
                intent: Intent::Forage,
            });
        }
    }

    if rng.chance(params.eat_other_tribes_chance) && !world.is_last_survivor(id) {
        if let Some(enemy) = pick_raid_target(world, critter.city, config.raid_city_retries, rng) {
            return Some(Decision {
                target: Target::Entity(enemy),
                intent: Intent::Raid,
            });
        }
    }

    if rng.chance(params.random_food_first) {
        if let Some(&food) = world.food().as_slice().choose(rng) {
            return Some(Decision {
                target: Target::Entity(food),
                intent: Intent::Forage,
            });
        }
    }

    if let Some(food) = world.close_food(from, params.close_threshold, spatial) {
        return Some(Decision {
            target: Target::Entity(food),
            intent: Intent::Forage,
        });
    }

    nest_point(world, critter.city, &params, spatial).map(|point| Decision {
        target: Target::Point(point),
        intent: Intent::Nest,
    })
}

/// A sibling other than `id`. Smart picks prefer the least-eaten.
fn pick_sibling(
    world: &World,
    id: EntityId,
    city: EntityId,
    smart: bool,
    rng: &mut GenomeRng,
) -> Option<EntityId> {
    let mut siblings: Vec<EntityId> = world
        .city_children(city)
        .iter()
        .copied()
        .filter(|&child| child != id)
        .collect();
    siblings.shuffle(rng);

    if smart {
        siblings
            .into_iter()
            .min_by_key(|&s| world.get(s).map_or(u32::MAX, |i| i.times_eaten))
    } else {
        siblings.first().copied()
    }
}

/// A random child of a random city other than `home`.
fn pick_raid_target(
    world: &World,
    home: EntityId,
    retries: usize,
    rng: &mut GenomeRng,
) -> Option<EntityId> {
    let cities = world.cities().as_slice();
    let mut city = *cities.choose(rng)?;
    let mut attempts = 0;
    while city == home && attempts < retries {
        city = *cities.choose(rng)?;
        attempts += 1;
    }
    if city == home {
        return None;
    }
    world.city_children(city).choose(rng).copied()
}

/// Home city offset by the nest genes, on the ground.
fn nest_point(
    world: &World,
    city: EntityId,
    params: &BehaviorParams,
    spatial: &dyn SpatialQuery,
) -> Option<Vec3> {
    let home = world.position(city)?;
    let x = home.x + params.nest_offset_x;
    let y = home.y + params.nest_offset_y;
    if spatial.is_valid_coordinate(x, y) {
        Some(spatial.ground_point(x, y))
    } else {
        Some(home)
    }
}

/// Per-tick steering for one critter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionPlan {
    /// Horizontal unit direction toward the goal.
    pub direction: Vec3,
    /// Distance to cover this tick.
    pub step: f32,
    /// Upward (positive) or downward push, in Jump Strength units.
    pub vertical: f32,
    /// Instant upward displacement from a random hop.
    pub hop: f32,
    /// Random velocity replacing straight travel this tick.
    pub jitter: Option<Vec3>,
}

/// Plan one tick of movement from `position` toward `goal`.
///
/// Terrain ahead is sampled along the travel direction; rising ground asks
/// for an upward push, and hovering more than `fall_threshold` above ground
/// asks for a downward one.
pub fn plan_motion(
    params: &BehaviorParams,
    position: Vec3,
    goal: Vec3,
    spatial: &dyn SpatialQuery,
    config: &VivariumConfig,
    dt: f32,
    rng: &mut GenomeRng,
) -> MotionPlan {
    let direction = (goal - position).truncate().normalize_or_zero().extend(0.0);
    let step = params.speed * config.base_speed * dt;

    let here = spatial.height_at(position.x, position.y);
    let samples = config.jump_lookahead_samples.max(1);
    let should_jump = (0..samples).any(|i| {
        let t = if samples == 1 {
            0.0
        } else {
            i as f32 / (samples - 1) as f32
        };
        let distance = 0.1 + (config.jump_lookahead_distance - 0.1) * t;
        let ahead = position + direction * distance;
        spatial.height_at(ahead.x, ahead.y) - here > 0.0
    });

    let vertical = if should_jump {
        params.jump_strength
    } else if position.z - here > config.fall_threshold {
        -params.jump_strength
    } else {
        0.0
    };

    let hop = if rng.percent(params.jump_chance) {
        params.jump_strength
    } else {
        0.0
    };

    let jitter = rng.percent(params.random_motion_chance).then(|| {
        Vec3::new(
            rng.spread(params.random_motion_neg_x, params.random_motion_pos_x),
            rng.spread(params.random_motion_neg_y, params.random_motion_pos_y),
            rng.spread(params.random_motion_neg_z, params.random_motion_pos_z),
        )
    });

    MotionPlan {
        direction,
        step,
        vertical,
        hop,
        jitter,
    }
}

/// Whether the attacker wins: strength difference plus uniform noise in
/// `±random_chance` must be strictly positive.
pub fn resolve_fight(
    self_strength: f32,
    other_strength: f32,
    random_chance: f32,
    rng: &mut GenomeRng,
) -> bool {
    let mut result = self_strength - other_strength;
    let c = random_chance.abs();
    result += rng.spread(c, c);
    result > 0.0
}

/// Run one decision tick for `id` during Simulation.
pub fn decide(
    world: &mut World,
    id: EntityId,
    elapsed: f32,
    config: &VivariumConfig,
    spatial: &dyn SpatialQuery,
    rng: &mut GenomeRng,
) {
    let Some(critter) = world.critter(id) else {
        return;
    };
    if matches!(
        critter.state,
        CritterState::AtHome | CritterState::ReturningHome
    ) {
        return;
    }
    if critter.is_full() {
        return_home(world, id);
        return;
    }

    let mut goal = critter.goal;
    let change_mind = critter.params.change_mind_chance;

    // Critters that made it home are safe, and eaten ones are gone.
    if let Some(Target::Entity(target)) = goal {
        let safe = world.critter(target).is_some_and(|c| c.record.at_city);
        if safe || !world.is_alive(target) {
            goal = None;
        }
    }

    // A nest point is a fallback; keep looking for food while heading there.
    let nesting = matches!(goal, Some(Target::Point(_)));
    if goal.is_none() || nesting || rng.chance(change_mind) {
        if let Some(c) = world.critter_mut(id) {
            c.state = CritterState::Seeking;
        }
        let decision = select_target(world, id, elapsed, config, spatial, rng);
        apply_decision(world, id, decision);
    }
}

/// Point `id` at its decision, or leave it idle without one.
pub fn apply_decision(world: &mut World, id: EntityId, decision: Option<Decision>) {
    let Some(individual) = world.get_mut(id) else {
        return;
    };
    individual.set_goal(decision.map(|d| d.target));
    if let Some(critter) = individual.as_critter_mut() {
        match decision {
            Some(d) => {
                critter.intent = d.intent;
                critter.state = CritterState::Traveling;
                log::trace!("Critter {:?} now {:?}", id, d.intent);
            }
            None => critter.state = CritterState::Idle,
        }
    }
}

/// Send `id` back to its city.
pub fn return_home(world: &mut World, id: EntityId) {
    if let Some(critter) = world.critter_mut(id) {
        if critter.record.at_city {
            critter.state = CritterState::AtHome;
            critter.goal = None;
            return;
        }
        critter.goal = Some(Target::Entity(critter.city));
        critter.state = CritterState::ReturningHome;
        critter.intent = Intent::ReturnHome;
    }
}

/// Resolve the goal a critter has just reached.
pub fn arrive(
    world: &mut World,
    id: EntityId,
    elapsed: f32,
    config: &VivariumConfig,
    presentation: &mut dyn PresentationSink,
    rng: &mut GenomeRng,
) {
    let Some(critter) = world.critter_mut(id) else {
        return;
    };
    let goal = critter.goal.take();

    if critter.state == CritterState::ReturningHome {
        critter.record.at_city = true;
        critter.state = CritterState::AtHome;
        log::debug!("Critter {:?} is home", id);
        return;
    }

    let Some(Target::Entity(target)) = goal else {
        critter.state = CritterState::Idle;
        return;
    };
    critter.state = CritterState::Consuming;

    match world.get(target).map(|i| i.kind()) {
        Some(Kind::Critter) => {
            let outcome = fight(world, id, target, config.fight_random_chance, presentation, rng);
            log::debug!("Critter {:?} fought {:?}: {:?}", id, target, outcome);
        }
        Some(Kind::Food) => {
            consume(world, id, target, elapsed, presentation);
        }
        _ => {}
    }

    if let Some(critter) = world.critter_mut(id) {
        if critter.state == CritterState::Consuming {
            critter.state = CritterState::Idle;
        }
    }
}

/// Eat a food item. Returns whether a bite happened.
pub fn consume(
    world: &mut World,
    eater: EntityId,
    food: EntityId,
    elapsed: f32,
    presentation: &mut dyn PresentationSink,
) -> bool {
    if !world.eat(food, presentation) {
        return false;
    }
    if let Some(critter) = world.critter_mut(eater) {
        let max_food = critter.params.max_food;
        critter.record.record_food(elapsed, max_food);
    }
    true
}

/// `attacker` fights `defender`; the winner eats the loser.
///
/// No fight happens when the defender is already eaten or at home. The
/// attacker is recoloured white when it wins and red when it loses.
pub fn fight(
    world: &mut World,
    attacker: EntityId,
    defender: EntityId,
    random_chance: f32,
    presentation: &mut dyn PresentationSink,
    rng: &mut GenomeRng,
) -> FightOutcome {
    let (Some(a), Some(d)) = (world.critter(attacker), world.critter(defender)) else {
        return FightOutcome::Avoided;
    };
    if !world.is_alive(defender) || !world.is_alive(attacker) || d.record.at_city {
        return FightOutcome::Avoided;
    }

    let won = resolve_fight(a.params.strength, d.params.strength, random_chance, rng);
    let (winner, loser, color, outcome) = if won {
        (attacker, defender, WINNER_COLOR, FightOutcome::Won)
    } else {
        (defender, attacker, LOSER_COLOR, FightOutcome::Lost)
    };

    world.set_color(attacker, color, presentation);
    eat_other(world, winner, loser, presentation);
    outcome
}

fn eat_other(
    world: &mut World,
    winner: EntityId,
    loser: EntityId,
    presentation: &mut dyn PresentationSink,
) {
    let loser_city = world.critter(loser).map(|c| c.city);
    if let Some(critter) = world.critter_mut(winner) {
        let foreign = loser_city != Some(critter.city);
        let max_food = critter.params.max_food;
        critter.record.record_kill(foreign, max_food);
    }
    world.eat(loser, presentation);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::collaborators::{HeadlessPresentation, Terrain};
    use crate::schema::Gene;

    struct Fixture {
        world: World,
        terrain: Terrain,
        sink: HeadlessPresentation,
        rng: GenomeRng,
        config: VivariumConfig,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                world: World::new(),
                terrain: Terrain::flat(1000.0, 1000.0),
                sink: HeadlessPresentation::new(),
                rng: GenomeRng::new(17),
                config: VivariumConfig::default(),
            }
        }

        fn city(&mut self, x: f32, y: f32) -> EntityId {
            self.world
                .spawn_city(&self.terrain, &mut self.sink, x, y, 50.0)
                .unwrap()
        }

        fn critter(&mut self, city: EntityId, x: f32, y: f32, genes: &[(&str, f32)]) -> EntityId {
            let mut genome = Genome::standard();
            for (name, value) in genes {
                if let Some(gene) = genome.gene_mut(name) {
                    gene.value = GeneValue::Number(*value);
                }
            }
            self.world
                .spawn_critter(&self.terrain, &mut self.sink, x, y, genome, city)
                .unwrap()
        }

        fn food(&mut self, x: f32, y: f32) -> EntityId {
            self.world
                .spawn_food(&self.terrain, &mut self.sink, x, y)
                .unwrap()
        }

        fn select(&mut self, id: EntityId, elapsed: f32) -> Option<Decision> {
            select_target(
                &self.world,
                id,
                elapsed,
                &self.config,
                &self.terrain,
                &mut self.rng,
            )
        }
    }

    /// Genes that make every random branch fail.
    const CAUTIOUS: [(&str, f32); 5] = [
        (names::CANNIBALISM_CHANCE, 0.0),
        (names::CLOSEST_FOOD_FIRST, 0.0),
        (names::EAT_OTHER_TRIBES_CHANCE, 0.0),
        (names::RANDOM_FOOD_FIRST, 0.0),
        (names::CHECKS_EATEN, 0.0),
    ];

    fn with(base: &[(&'static str, f32)], extra: &[(&'static str, f32)]) -> Vec<(&'static str, f32)> {
        let mut genes = base.to_vec();
        genes.extend_from_slice(extra);
        genes
    }

    #[test]
    fn test_params_from_standard_genome() {
        let catalog = GeneCatalog::standard();
        let params = BehaviorParams::from_genome(&Genome::standard(), &catalog);
        assert_eq!(params.strength, 0.5);
        assert_eq!(params.close_threshold, 30.0);
        assert_eq!(params.cannibalism_wait, 3.0);
    }

    #[test]
    fn test_params_fall_back_to_catalog_minimum() {
        let catalog = GeneCatalog::standard();
        let sparse = Genome::new(vec![Gene::number(names::SPEED, 3.0, 1.0, 5.0)]).unwrap();
        let params = BehaviorParams::from_genome(&sparse, &catalog);
        assert_eq!(params.speed, 3.0);
        assert_eq!(params.max_food, 0.7);
        assert_eq!(params.jump_strength, 1.0);
        assert_eq!(params.nest_offset_x, -200.0);
    }

    #[test]
    fn test_cannibal_picks_sibling_on_first_tick() {
        let mut f = Fixture::new();
        let city = f.city(100.0, 100.0);
        let genes = with(
            &CAUTIOUS,
            &[(names::CANNIBALISM_CHANCE, 1.0), (names::CANNIBALISM_WAIT, 0.0)],
        );
        let cannibal = f.critter(city, 100.0, 100.0, &genes);
        let sibling = f.critter(city, 110.0, 100.0, &CAUTIOUS);
        f.food(120.0, 100.0);

        for _ in 0..20 {
            let decision = f.select(cannibal, 0.0).unwrap();
            assert_eq!(decision.target, Target::Entity(sibling));
            assert_eq!(decision.intent, Intent::Cannibalize);
        }
    }

    #[test]
    fn test_cannibal_waits() {
        let mut f = Fixture::new();
        let city = f.city(100.0, 100.0);
        let genes = with(
            &CAUTIOUS,
            &[(names::CANNIBALISM_CHANCE, 1.0), (names::CANNIBALISM_WAIT, 10.0)],
        );
        let cannibal = f.critter(city, 100.0, 100.0, &genes);
        f.critter(city, 110.0, 100.0, &CAUTIOUS);
        let food = f.food(120.0, 100.0);

        let decision = f.select(cannibal, 5.0).unwrap();
        assert_eq!(decision.target, Target::Entity(food));
        assert_eq!(decision.intent, Intent::Forage);
    }

    #[test]
    fn test_lone_cannibal_falls_through() {
        let mut f = Fixture::new();
        let city = f.city(100.0, 100.0);
        let genes = with(&CAUTIOUS, &[(names::CANNIBALISM_CHANCE, 1.0), (names::CANNIBALISM_WAIT, 0.0)]);
        let cannibal = f.critter(city, 100.0, 100.0, &genes);
        let food = f.food(400.0, 400.0);

        let decision = f.select(cannibal, 0.0).unwrap();
        assert_eq!(decision.target, Target::Entity(food));
    }

    #[test]
    fn test_smart_cannibal_prefers_uneaten() {
        let mut f = Fixture::new();
        let city = f.city(100.0, 100.0);
        let genes = with(
            &CAUTIOUS,
            &[
                (names::CANNIBALISM_CHANCE, 1.0),
                (names::CANNIBALISM_WAIT, 0.0),
                (names::SMART_CANNIBALISM, 1.0),
            ],
        );
        let cannibal = f.critter(city, 100.0, 100.0, &genes);
        let eaten = f.critter(city, 105.0, 100.0, &CAUTIOUS);
        let fresh = f.critter(city, 110.0, 100.0, &CAUTIOUS);
        f.world.eat(eaten, &mut f.sink);

        for _ in 0..20 {
            assert_eq!(f.select(cannibal, 0.0).unwrap().target, Target::Entity(fresh));
        }
    }

    #[test]
    fn test_closest_food_first() {
        let mut f = Fixture::new();
        let city = f.city(100.0, 100.0);
        let genes = with(&CAUTIOUS, &[(names::CLOSEST_FOOD_FIRST, 1.0)]);
        let critter = f.critter(city, 100.0, 100.0, &genes);
        f.food(300.0, 300.0);
        let near = f.food(150.0, 100.0);

        assert_eq!(f.select(critter, 0.0).unwrap().target, Target::Entity(near));
    }

    #[test]
    fn test_raid_targets_other_city() {
        let mut f = Fixture::new();
        let home = f.city(100.0, 100.0);
        let away = f.city(600.0, 600.0);
        let genes = with(&CAUTIOUS, &[(names::EAT_OTHER_TRIBES_CHANCE, 1.0)]);
        let raider = f.critter(home, 100.0, 100.0, &genes);
        f.critter(home, 110.0, 100.0, &CAUTIOUS);
        let enemy = f.critter(away, 600.0, 600.0, &CAUTIOUS);

        let decision = f.select(raider, 0.0).unwrap();
        assert_eq!(decision.target, Target::Entity(enemy));
        assert_eq!(decision.intent, Intent::Raid);
    }

    #[test]
    fn test_last_survivor_does_not_raid() {
        let mut f = Fixture::new();
        let home = f.city(100.0, 100.0);
        let away = f.city(600.0, 600.0);
        let genes = with(&CAUTIOUS, &[(names::EAT_OTHER_TRIBES_CHANCE, 1.0)]);
        let raider = f.critter(home, 100.0, 100.0, &genes);
        f.critter(away, 600.0, 600.0, &CAUTIOUS);

        let decision = f.select(raider, 0.0).unwrap();
        assert_eq!(decision.intent, Intent::Nest);
    }

    #[test]
    fn test_no_food_goes_to_nest() {
        let mut f = Fixture::new();
        let city = f.city(300.0, 300.0);
        let genes = with(
            &CAUTIOUS,
            &[(names::NEST_OFFSET_X, 100.0), (names::NEST_OFFSET_Y, -100.0)],
        );
        let critter = f.critter(city, 300.0, 300.0, &genes);

        let decision = f.select(critter, 0.0).unwrap();
        assert_eq!(decision.intent, Intent::Nest);
        assert_eq!(decision.target, Target::Point(Vec3::new(400.0, 200.0, 0.0)));
    }

    #[test]
    fn test_random_food_before_close_food() {
        let mut f = Fixture::new();
        let city = f.city(100.0, 100.0);
        let genes = with(&CAUTIOUS, &[(names::RANDOM_FOOD_FIRST, 1.0)]);
        let critter = f.critter(city, 100.0, 100.0, &genes);
        let near = f.food(110.0, 100.0);
        let far: Vec<EntityId> = (0..3)
            .map(|i| f.food(500.0 + 100.0 * i as f32, 500.0))
            .collect();

        let mut picked_far = false;
        for _ in 0..50 {
            let decision = f.select(critter, 0.0).unwrap();
            assert_eq!(decision.intent, Intent::Forage);
            match decision.target {
                Target::Entity(id) if far.contains(&id) => picked_far = true,
                Target::Entity(id) => assert_eq!(id, near),
                Target::Point(_) => panic!("food was available"),
            }
        }
        assert!(picked_far);
    }

    #[test]
    fn test_change_mind_switches_target() {
        let mut f = Fixture::new();
        let city = f.city(100.0, 100.0);
        let steady = with(&CAUTIOUS, &[(names::CHANGE_MIND_CHANCE, 0.0)]);
        let fickle = with(&CAUTIOUS, &[(names::CHANGE_MIND_CHANCE, 1.0)]);
        let a = f.critter(city, 100.0, 100.0, &steady);
        let b = f.critter(city, 100.0, 100.0, &fickle);
        let distant = f.food(800.0, 800.0);
        let close = f.food(110.0, 100.0);

        for id in [a, b] {
            apply_decision(
                &mut f.world,
                id,
                Some(Decision {
                    target: Target::Entity(distant),
                    intent: Intent::Forage,
                }),
            );
            decide(&mut f.world, id, 1.0, &f.config, &f.terrain, &mut f.rng);
        }

        assert_eq!(f.world.critter(a).unwrap().goal, Some(Target::Entity(distant)));
        assert_eq!(f.world.critter(b).unwrap().goal, Some(Target::Entity(close)));
    }

    #[test]
    fn test_nesting_critter_notices_new_food() {
        let mut f = Fixture::new();
        let city = f.city(300.0, 300.0);
        let genes = with(&CAUTIOUS, &[(names::CHANGE_MIND_CHANCE, 0.0)]);
        let critter = f.critter(city, 300.0, 300.0, &genes);

        decide(&mut f.world, critter, 1.0, &f.config, &f.terrain, &mut f.rng);
        let nesting = f.world.critter(critter).unwrap();
        assert_eq!(nesting.intent, Intent::Nest);
        assert!(matches!(nesting.goal, Some(Target::Point(_))));

        let food = f.food(600.0, 600.0);
        decide(&mut f.world, critter, 2.0, &f.config, &f.terrain, &mut f.rng);
        let foraging = f.world.critter(critter).unwrap();
        assert_eq!(foraging.goal, Some(Target::Entity(food)));
        assert_eq!(foraging.intent, Intent::Forage);
    }

    #[test]
    fn test_checks_eaten_reselects() {
        let mut f = Fixture::new();
        let city = f.city(100.0, 100.0);
        let genes = with(
            &CAUTIOUS,
            &[
                (names::CANNIBALISM_CHANCE, 1.0),
                (names::CANNIBALISM_WAIT, 0.0),
                (names::CHECKS_EATEN, 1.0),
            ],
        );
        let cannibal = f.critter(city, 100.0, 100.0, &genes);
        let sibling = f.critter(city, 105.0, 100.0, &CAUTIOUS);
        f.world.eat(sibling, &mut f.sink);

        // The only sibling is eaten, so every pick re-selects until the cap
        // and the last pick stands.
        f.config.max_reselect_depth = 5;
        let decision = f.select(cannibal, 0.0).unwrap();
        assert_eq!(decision.target, Target::Entity(sibling));
    }

    #[test]
    fn test_tied_fight_is_lost() {
        let mut rng = GenomeRng::new(0);
        for _ in 0..10 {
            assert!(!resolve_fight(1.0, 1.0, 0.0, &mut rng));
        }
        assert!(resolve_fight(2.0, 1.0, 0.01, &mut rng));
        assert!(!resolve_fight(1.0, 2.0, 0.01, &mut rng));
    }

    #[test]
    fn test_fight_winner_eats_loser() {
        let mut f = Fixture::new();
        let home = f.city(100.0, 100.0);
        let away = f.city(600.0, 600.0);
        let strong = f.critter(home, 100.0, 100.0, &[(names::STRENGTH, 2.0), (names::MAX_FOOD, 5.0)]);
        let weak = f.critter(away, 110.0, 100.0, &[(names::STRENGTH, 0.5)]);

        let outcome = fight(&mut f.world, strong, weak, 0.01, &mut f.sink, &mut f.rng);
        assert_eq!(outcome, FightOutcome::Won);
        assert!(!f.world.is_alive(weak));
        assert_eq!(f.world.corpses().len(), 1);

        let record = &f.world.critter(strong).unwrap().record;
        assert_eq!(record.food_eaten, 0.5);
        assert_eq!(record.enemies_eaten, 0.5);
        assert_eq!(f.world.get(strong).unwrap().color, WINNER_COLOR);

        let again = fight(&mut f.world, strong, weak, 0.01, &mut f.sink, &mut f.rng);
        assert_eq!(again, FightOutcome::Avoided);
    }

    #[test]
    fn test_attacker_loses_tie_and_is_eaten() {
        let mut f = Fixture::new();
        let city = f.city(100.0, 100.0);
        let a = f.critter(city, 100.0, 100.0, &[]);
        let b = f.critter(city, 110.0, 100.0, &[]);

        let outcome = fight(&mut f.world, a, b, 0.0, &mut f.sink, &mut f.rng);
        assert_eq!(outcome, FightOutcome::Lost);
        assert!(!f.world.is_alive(a));
        let record = &f.world.critter(b).unwrap().record;
        assert_eq!(record.food_eaten, 0.5);
        // Same city, so no enemy credit.
        assert_eq!(record.enemies_eaten, 0.0);
    }

    #[test]
    fn test_no_fight_with_critter_at_home() {
        let mut f = Fixture::new();
        let city = f.city(100.0, 100.0);
        let a = f.critter(city, 100.0, 100.0, &[(names::STRENGTH, 2.0)]);
        let b = f.critter(city, 110.0, 100.0, &[]);
        f.world.critter_mut(b).unwrap().record.at_city = true;

        let outcome = fight(&mut f.world, a, b, 0.0, &mut f.sink, &mut f.rng);
        assert_eq!(outcome, FightOutcome::Avoided);
        assert!(f.world.is_alive(b));
    }

    #[test]
    fn test_decide_returns_full_critter_home() {
        let mut f = Fixture::new();
        let city = f.city(100.0, 100.0);
        let c = f.critter(city, 300.0, 300.0, &[]);
        f.world.critter_mut(c).unwrap().record.food_eaten = 0.7;

        decide(&mut f.world, c, 1.0, &f.config, &f.terrain, &mut f.rng);
        let critter = f.world.critter(c).unwrap();
        assert_eq!(critter.state, CritterState::ReturningHome);
        assert_eq!(critter.goal, Some(Target::Entity(city)));
    }

    #[test]
    fn test_arrive_consumes_food() {
        let mut f = Fixture::new();
        let city = f.city(100.0, 100.0);
        let c = f.critter(city, 100.0, 100.0, &[(names::MAX_FOOD, 2.0)]);
        let food = f.food(105.0, 100.0);
        apply_decision(
            &mut f.world,
            c,
            Some(Decision {
                target: Target::Entity(food),
                intent: Intent::Forage,
            }),
        );

        arrive(&mut f.world, c, 4.0, &f.config, &mut f.sink, &mut f.rng);
        let critter = f.world.critter(c).unwrap();
        assert_eq!(critter.record.food_eaten, 1.0);
        assert_eq!(critter.record.time_to_first_food, Some(4.0));
        assert_eq!(critter.state, CritterState::Idle);
        assert!(f.world.food().is_empty());
    }

    #[test]
    fn test_arrive_home_marks_at_city() {
        let mut f = Fixture::new();
        let city = f.city(100.0, 100.0);
        let c = f.critter(city, 100.0, 100.0, &[]);
        return_home(&mut f.world, c);
        arrive(&mut f.world, c, 4.0, &f.config, &mut f.sink, &mut f.rng);

        let critter = f.world.critter(c).unwrap();
        assert!(critter.record.at_city);
        assert_eq!(critter.state, CritterState::AtHome);
    }

    #[test]
    fn test_motion_plan_jumps_uphill() {
        let terrain = Terrain::Hills {
            width: 1000.0,
            depth: 1000.0,
            amplitude: 50.0,
            wavelength: 400.0,
        };
        let config = VivariumConfig::default();
        let params = BehaviorParams {
            speed: 1.0,
            jump_strength: 2.0,
            ..Default::default()
        };
        let mut rng = GenomeRng::new(9);

        // sin rises from x = 0 toward x = 100.
        let position = terrain.ground_point(10.0, 500.0);
        let plan = plan_motion(
            &params,
            position,
            Vec3::new(90.0, 500.0, 0.0),
            &terrain,
            &config,
            0.1,
            &mut rng,
        );
        assert_eq!(plan.vertical, 2.0);
        assert!((plan.step - 10.0).abs() < 1e-4);
        assert!((plan.direction - Vec3::X).length() < 1e-5);
        assert!(plan.jitter.is_none());
        assert_eq!(plan.hop, 0.0);
    }

    #[test]
    fn test_motion_plan_falls_when_high() {
        let terrain = Terrain::flat(1000.0, 1000.0);
        let config = VivariumConfig::default();
        let params = BehaviorParams {
            speed: 1.0,
            jump_strength: 1.5,
            ..Default::default()
        };
        let mut rng = GenomeRng::new(9);
        let plan = plan_motion(
            &params,
            Vec3::new(10.0, 10.0, 100.0),
            Vec3::new(90.0, 10.0, 0.0),
            &terrain,
            &config,
            0.1,
            &mut rng,
        );
        assert_eq!(plan.vertical, -1.5);
    }
}
