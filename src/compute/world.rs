//! The world: every individual in one arena, indexed by four registries.
//!
//! Individuals are never referenced directly across the world. Critters know
//! their city by [`EntityId`], cities list their children by id, and goals point
//! at ids too. Removing an individual takes it out of its registry and leaves a
//! tombstone (`spawned == false`) in the arena until [`World::purge_despawned`],
//! so stale ids resolve to "not alive" instead of dangling.

use glam::{Vec3, Vec4};
use rand::prelude::*;
use slotmap::{SlotMap, new_key_type};

use crate::schema::{GeneCatalog, Genome};

use super::behavior::{BehaviorParams, CritterState, Intent, Target};
use super::collaborators::{Handle, PresentationSink, SpatialQuery};
use super::evolution::BehaviorRecord;

new_key_type! {
    /// Key of an individual in the world arena.
    pub struct EntityId;
}

/// City colours, assigned in order.
pub const CITY_COLORS: [Vec4; 4] = [
    Vec4::new(1.0, 0.0, 0.0, 1.0),
    Vec4::new(0.0, 1.0, 0.0, 1.0),
    Vec4::new(0.0, 0.0, 1.0, 1.0),
    Vec4::new(1.0, 1.0, 0.0, 1.0),
];
pub const FOOD_COLOR: Vec4 = Vec4::new(0.3, 0.8, 0.2, 1.0);
pub const CORPSE_COLOR: Vec4 = Vec4::new(0.35, 0.3, 0.3, 1.0);

/// Variant tag of an individual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Critter,
    Food,
    Corpse,
    City,
}

/// Spawn failures. None of them are fatal to the vivarium.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpawnRejected {
    #[error("Coordinate ({x}, {y}) is outside the terrain")]
    InvalidCoordinate { x: f32, y: f32 },
    #[error("City {0:?} does not exist")]
    UnknownCity(EntityId),
    #[error("No valid position found after {0} attempts")]
    NoValidPosition(usize),
}

/// A genome-carrying forager.
#[derive(Debug, Clone)]
pub struct Critter {
    pub genome: Genome,
    /// Typed projection of `genome`.
    pub params: BehaviorParams,
    /// Home city.
    pub city: EntityId,
    pub goal: Option<Target>,
    pub state: CritterState,
    pub intent: Intent,
    pub record: BehaviorRecord,
    pub fitness: f32,
}

impl Critter {
    /// Idle critter belonging to `city`.
    pub fn new(genome: Genome, params: BehaviorParams, city: EntityId) -> Self {
        Self {
            genome,
            params,
            city,
            goal: None,
            state: CritterState::Idle,
            intent: Intent::Forage,
            record: BehaviorRecord::default(),
            fitness: 0.0,
        }
    }

    /// Carrying capacity reached.
    pub fn is_full(&self) -> bool {
        self.record.food_eaten >= self.params.max_food
    }

    /// Clear per-round state.
    pub fn reset(&mut self) {
        self.goal = None;
        self.state = CritterState::Idle;
        self.intent = Intent::Forage;
        self.record = BehaviorRecord::default();
        self.fitness = 0.0;
    }
}

/// A home base. Lists its critters but does not own them.
#[derive(Debug, Clone)]
pub struct City {
    pub children: Vec<EntityId>,
    /// Half-width of the square critters spawn in.
    pub bounds_radius: f32,
}

/// Variant payload of an individual.
#[derive(Debug, Clone)]
pub enum Body {
    Critter(Critter),
    Food,
    Corpse,
    City(City),
}

impl Body {
    /// Tag of this body.
    pub fn kind(&self) -> Kind {
        match self {
            Body::Critter(_) => Kind::Critter,
            Body::Food => Kind::Food,
            Body::Corpse => Kind::Corpse,
            Body::City(_) => Kind::City,
        }
    }
}

/// Anything placed in the world.
#[derive(Debug, Clone)]
pub struct Individual {
    /// Monotonic id, unique for the lifetime of the world.
    pub serial: u64,
    pub body: Body,
    pub position: Vec3,
    pub velocity: Vec3,
    pub color: Vec4,
    pub eaten: bool,
    pub spawned: bool,
    pub times_eaten: u32,
    /// `None` for individuals that cannot be eaten.
    pub max_times_eaten: Option<u32>,
    pub handle: Option<Handle>,
}

impl Individual {
    fn new(serial: u64, body: Body, position: Vec3, color: Vec4) -> Self {
        let max_times_eaten = match body.kind() {
            Kind::Critter | Kind::Food => Some(1),
            Kind::Corpse | Kind::City => None,
        };
        Self {
            serial,
            body,
            position,
            velocity: Vec3::ZERO,
            color,
            eaten: false,
            spawned: true,
            times_eaten: 0,
            max_times_eaten,
            handle: None,
        }
    }

    pub fn kind(&self) -> Kind {
        self.body.kind()
    }

    /// Spawned and not eaten.
    pub fn is_alive(&self) -> bool {
        self.spawned && !self.eaten
    }

    /// Critter state, if this is a critter.
    pub fn as_critter(&self) -> Option<&Critter> {
        match &self.body {
            Body::Critter(c) => Some(c),
            _ => None,
        }
    }

    /// Mutable critter state, if this is a critter.
    pub fn as_critter_mut(&mut self) -> Option<&mut Critter> {
        match &mut self.body {
            Body::Critter(c) => Some(c),
            _ => None,
        }
    }

    /// City state, if this is a city.
    pub fn as_city(&self) -> Option<&City> {
        match &self.body {
            Body::City(c) => Some(c),
            _ => None,
        }
    }
}

/// Individuals other critters can eat.
pub trait Consumable {
    fn can_be_eaten(&self) -> bool;
    /// Take one bite. Returns whether the bite happened.
    fn eat(&mut self) -> bool;
}

/// Individuals that steer toward a goal.
pub trait Mobile {
    fn goal(&self) -> Option<Target>;
    /// Returns false for individuals that cannot move.
    fn set_goal(&mut self, goal: Option<Target>) -> bool;
}

/// Individuals that carry a genome.
pub trait Genomic {
    fn genome(&self) -> Option<&Genome>;
}

impl Consumable for Individual {
    fn can_be_eaten(&self) -> bool {
        self.is_alive() && self.max_times_eaten.is_some_and(|max| self.times_eaten < max)
    }

    fn eat(&mut self) -> bool {
        if !self.can_be_eaten() {
            return false;
        }
        self.times_eaten += 1;
        if self.max_times_eaten.is_some_and(|max| self.times_eaten >= max) {
            self.eaten = true;
        }
        true
    }
}

impl Mobile for Individual {
    fn goal(&self) -> Option<Target> {
        self.as_critter().and_then(|c| c.goal)
    }

    fn set_goal(&mut self, goal: Option<Target>) -> bool {
        match self.as_critter_mut() {
            Some(c) => {
                c.goal = goal;
                true
            }
            None => false,
        }
    }
}

impl Genomic for Individual {
    fn genome(&self) -> Option<&Genome> {
        self.as_critter().map(|c| &c.genome)
    }
}

/// Ordered list of ids of one kind.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    ids: Vec<EntityId>,
}

impl Registry {
    /// Register `id` at the end.
    pub fn push(&mut self, id: EntityId) {
        self.ids.push(id);
    }

    /// Linear removal. Returns whether `id` was present.
    pub fn remove(&mut self, id: EntityId) -> bool {
        match self.ids.iter().position(|&x| x == id) {
            Some(index) => {
                self.ids.remove(index);
                true
            }
            None => false,
        }
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: EntityId) -> bool {
        self.ids.contains(&id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.ids.iter().copied()
    }

    pub fn as_slice(&self) -> &[EntityId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Owner of every individual and the gene catalog.
#[derive(Debug, Default)]
pub struct World {
    arena: SlotMap<EntityId, Individual>,
    critters: Registry,
    food: Registry,
    cities: Registry,
    corpses: Registry,
    next_serial: u64,
    catalog: GeneCatalog,
}

impl World {
    /// Empty world with the standard gene catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fallback values for undeclared genes.
    pub fn catalog(&self) -> &GeneCatalog {
        &self.catalog
    }

    pub fn get(&self, id: EntityId) -> Option<&Individual> {
        self.arena.get(id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Individual> {
        self.arena.get_mut(id)
    }

    /// Critter state of `id`, if it is a critter.
    pub fn critter(&self, id: EntityId) -> Option<&Critter> {
        self.arena.get(id).and_then(Individual::as_critter)
    }

    pub fn critter_mut(&mut self, id: EntityId) -> Option<&mut Critter> {
        self.arena.get_mut(id).and_then(Individual::as_critter_mut)
    }

    pub fn city(&self, id: EntityId) -> Option<&City> {
        self.arena.get(id).and_then(Individual::as_city)
    }

    /// Position of `id`, if it exists.
    pub fn position(&self, id: EntityId) -> Option<Vec3> {
        self.arena.get(id).map(|i| i.position)
    }

    /// Spawned and not eaten.
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.arena.get(id).is_some_and(Individual::is_alive)
    }

    /// Registered individuals of `kind`, in spawn order.
    pub fn registry(&self, kind: Kind) -> &Registry {
        match kind {
            Kind::Critter => &self.critters,
            Kind::Food => &self.food,
            Kind::Corpse => &self.corpses,
            Kind::City => &self.cities,
        }
    }

    fn registry_mut(&mut self, kind: Kind) -> &mut Registry {
        match kind {
            Kind::Critter => &mut self.critters,
            Kind::Food => &mut self.food,
            Kind::Corpse => &mut self.corpses,
            Kind::City => &mut self.cities,
        }
    }

    pub fn critters(&self) -> &Registry {
        &self.critters
    }

    pub fn food(&self) -> &Registry {
        &self.food
    }

    pub fn cities(&self) -> &Registry {
        &self.cities
    }

    pub fn corpses(&self) -> &Registry {
        &self.corpses
    }

    /// Entries in the arena, tombstones included.
    pub fn arena_len(&self) -> usize {
        self.arena.len()
    }

    fn insert(
        &mut self,
        body: Body,
        position: Vec3,
        color: Vec4,
        presentation: &mut dyn PresentationSink,
    ) -> EntityId {
        let serial = self.next_serial;
        self.next_serial += 1;

        let kind = body.kind();
        let mut individual = Individual::new(serial, body, position, color);
        individual.handle = Some(presentation.spawn(kind, color, position));

        let id = self.arena.insert(individual);
        self.registry_mut(kind).push(id);
        log::trace!("Spawned {:?} #{} at {}", kind, serial, position);
        id
    }

    fn ground(spatial: &dyn SpatialQuery, x: f32, y: f32) -> Result<Vec3, SpawnRejected> {
        if spatial.is_valid_coordinate(x, y) {
            Ok(spatial.ground_point(x, y))
        } else {
            Err(SpawnRejected::InvalidCoordinate { x, y })
        }
    }

    /// Place a city. Colours cycle through [`CITY_COLORS`].
    pub fn spawn_city(
        &mut self,
        spatial: &dyn SpatialQuery,
        presentation: &mut dyn PresentationSink,
        x: f32,
        y: f32,
        bounds_radius: f32,
    ) -> Result<EntityId, SpawnRejected> {
        let position = Self::ground(spatial, x, y)?;
        let color = CITY_COLORS[self.cities.len() % CITY_COLORS.len()];
        let city = City {
            children: Vec::new(),
            bounds_radius,
        };
        Ok(self.insert(Body::City(city), position, color, presentation))
    }

    /// Place one food item at ground level.
    pub fn spawn_food(
        &mut self,
        spatial: &dyn SpatialQuery,
        presentation: &mut dyn PresentationSink,
        x: f32,
        y: f32,
    ) -> Result<EntityId, SpawnRejected> {
        let position = Self::ground(spatial, x, y)?;
        Ok(self.insert(Body::Food, position, FOOD_COLOR, presentation))
    }

    /// Corpses mark where a critter was eaten. The position is not validated.
    pub fn spawn_corpse(
        &mut self,
        presentation: &mut dyn PresentationSink,
        position: Vec3,
    ) -> EntityId {
        self.insert(Body::Corpse, position, CORPSE_COLOR, presentation)
    }

    /// Spawn a critter and register it as a child of `city`.
    pub fn spawn_critter(
        &mut self,
        spatial: &dyn SpatialQuery,
        presentation: &mut dyn PresentationSink,
        x: f32,
        y: f32,
        genome: Genome,
        city: EntityId,
    ) -> Result<EntityId, SpawnRejected> {
        let color = match self.arena.get(city) {
            Some(ind) if ind.spawned && ind.kind() == Kind::City => ind.color,
            _ => return Err(SpawnRejected::UnknownCity(city)),
        };
        let position = Self::ground(spatial, x, y)?;

        self.catalog.declare(&genome);
        let params = BehaviorParams::from_genome(&genome, &self.catalog);
        let critter = Critter::new(genome, params, city);
        let id = self.insert(Body::Critter(critter), position, color, presentation);

        if let Some(Body::City(c)) = self.arena.get_mut(city).map(|i| &mut i.body) {
            c.children.push(id);
        }
        Ok(id)
    }

    /// Take `id` out of its registry and leave a tombstone.
    ///
    /// Removing something already removed logs a warning and returns false.
    pub fn remove(&mut self, id: EntityId, presentation: &mut dyn PresentationSink) -> bool {
        let Some(individual) = self.arena.get(id) else {
            log::warn!("Removal of unknown entity {:?}", id);
            return false;
        };
        if !individual.spawned {
            log::warn!("Entity #{} removed twice", individual.serial);
            return false;
        }

        let kind = individual.kind();
        let serial = individual.serial;
        if !self.registry_mut(kind).remove(id) {
            log::warn!("Entity #{} was missing from the {:?} registry", serial, kind);
        }

        if let Some(individual) = self.arena.get_mut(id) {
            individual.spawned = false;
            individual.velocity = Vec3::ZERO;
            if let Some(handle) = individual.handle.take() {
                presentation.despawn(handle);
            }
        }
        true
    }

    /// Take one bite out of `id`. A critter eaten this way leaves a corpse.
    ///
    /// Returns whether the bite happened.
    pub fn eat(&mut self, id: EntityId, presentation: &mut dyn PresentationSink) -> bool {
        let (eaten, position, kind) = match self.arena.get_mut(id) {
            Some(individual) => {
                if !individual.eat() {
                    return false;
                }
                (individual.eaten, individual.position, individual.kind())
            }
            None => return false,
        };

        if eaten {
            if kind == Kind::Critter {
                self.spawn_corpse(presentation, position);
            }
            self.remove(id, presentation);
        }
        true
    }

    /// Remove every individual of `kind`.
    pub fn clear(&mut self, kind: Kind, presentation: &mut dyn PresentationSink) {
        let ids: Vec<EntityId> = self.registry(kind).iter().collect();
        for id in ids {
            self.remove(id, presentation);
        }
    }

    /// Drop tombstones from the arena and from city child lists.
    pub fn purge_despawned(&mut self) -> usize {
        let before = self.arena.len();
        self.arena.retain(|_, individual| individual.spawned);

        let cities: Vec<EntityId> = self.cities.iter().collect();
        for city in cities {
            let kept: Vec<EntityId> = self
                .city_children(city)
                .iter()
                .copied()
                .filter(|&child| self.arena.contains_key(child))
                .collect();
            if let Some(Body::City(c)) = self.arena.get_mut(city).map(|i| &mut i.body) {
                c.children = kept;
            }
        }

        before - self.arena.len()
    }

    /// Children of `city`, tombstones included until the next purge.
    pub fn city_children(&self, city: EntityId) -> &[EntityId] {
        self.city(city).map(|c| c.children.as_slice()).unwrap_or(&[])
    }

    /// `(xmin, xmax, ymin, ymax)` of a city's spawn square.
    pub fn city_bounds(&self, city: EntityId) -> Option<(f32, f32, f32, f32)> {
        let individual = self.arena.get(city)?;
        let r = individual.as_city()?.bounds_radius;
        let p = individual.position;
        Some((p.x - r, p.x + r, p.y - r, p.y + r))
    }

    /// Random valid point inside a city's spawn square.
    pub fn random_point_in_city<R: Rng + ?Sized>(
        &self,
        city: EntityId,
        spatial: &dyn SpatialQuery,
        rng: &mut R,
        attempts: usize,
    ) -> Result<(f32, f32), SpawnRejected> {
        let (xmin, xmax, ymin, ymax) =
            self.city_bounds(city).ok_or(SpawnRejected::UnknownCity(city))?;
        random_valid_point(spatial, rng, attempts, (xmin, xmax), (ymin, ymax))
    }

    /// Random valid point anywhere on the terrain.
    pub fn random_point<R: Rng + ?Sized>(
        spatial: &dyn SpatialQuery,
        rng: &mut R,
        attempts: usize,
    ) -> Result<(f32, f32), SpawnRejected> {
        let (width, depth) = spatial.extent();
        random_valid_point(spatial, rng, attempts, (0.0, width), (0.0, depth))
    }

    /// Closest live food by horizontal distance.
    pub fn nearest_food(&self, from: Vec3, spatial: &dyn SpatialQuery) -> Option<EntityId> {
        self.food
            .iter()
            .filter_map(|id| {
                let ind = self.arena.get(id)?;
                ind.is_alive()
                    .then(|| (id, spatial.distance_2d(from, ind.position)))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    /// First live food within `threshold` in registry order, else the nearest.
    pub fn close_food(
        &self,
        from: Vec3,
        threshold: f32,
        spatial: &dyn SpatialQuery,
    ) -> Option<EntityId> {
        self.food
            .iter()
            .find(|&id| {
                self.arena
                    .get(id)
                    .is_some_and(|i| i.is_alive() && spatial.distance_2d(from, i.position) < threshold)
            })
            .or_else(|| self.nearest_food(from, spatial))
    }

    /// True when at most one member of the critter's city, itself included,
    /// is alive and still away from home.
    pub fn is_last_survivor(&self, critter: EntityId) -> bool {
        let Some(c) = self.critter(critter) else {
            return false;
        };
        let away = self
            .city_children(c.city)
            .iter()
            .filter_map(|&child| self.arena.get(child))
            .filter(|ind| ind.is_alive())
            .filter(|ind| ind.as_critter().is_some_and(|c| !c.record.at_city))
            .count();
        away <= 1
    }

    /// Every critter still in the world has made it home.
    pub fn all_alive_critters_home(&self) -> bool {
        self.critters.iter().all(|id| {
            self.arena
                .get(id)
                .and_then(Individual::as_critter)
                .is_none_or(|c| c.record.at_city)
        })
    }

    /// Live critters that have reached their city.
    pub fn critters_home_count(&self) -> usize {
        self.critters
            .iter()
            .filter(|&id| self.critter(id).is_some_and(|c| c.record.at_city))
            .count()
    }

    /// Recolour an individual and tell the presentation layer.
    pub fn set_color(
        &mut self,
        id: EntityId,
        color: Vec4,
        presentation: &mut dyn PresentationSink,
    ) {
        if let Some(individual) = self.arena.get_mut(id) {
            individual.color = color;
            if let Some(handle) = individual.handle {
                presentation.set_color(handle, color);
            }
        }
    }
}

fn random_valid_point<R: Rng + ?Sized>(
    spatial: &dyn SpatialQuery,
    rng: &mut R,
    attempts: usize,
    xs: (f32, f32),
    ys: (f32, f32),
) -> Result<(f32, f32), SpawnRejected> {
    for _ in 0..attempts {
        let x = if xs.0 < xs.1 { rng.gen_range(xs.0..xs.1) } else { xs.0 };
        let y = if ys.0 < ys.1 { rng.gen_range(ys.0..ys.1) } else { ys.0 };
        if spatial.is_valid_coordinate(x, y) {
            return Ok((x, y));
        }
    }
    Err(SpawnRejected::NoValidPosition(attempts))
}
