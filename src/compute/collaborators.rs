//! Interfaces to the world outside the GA core, plus headless implementations.
//!
//! The vivarium never talks to a renderer, a physics engine or a wall clock
//! directly. It goes through four narrow traits:
//!
//! - [`SpatialQuery`]: terrain height and coordinate validity
//! - [`PhysicalActuator`]: moving bodies toward points
//! - [`PresentationSink`]: what a viewer shows
//! - [`Clock`]: simulated or wall-clock time
//!
//! The headless implementations here are enough to run whole rounds in tests,
//! benches and the command-line runner.

use std::collections::HashMap;

use glam::{Vec3, Vec4};

use crate::schema::TerrainConfig;

use super::world::Kind;

/// Read-only questions about the ground.
pub trait SpatialQuery {
    /// Ground height at `(x, y)`. Out-of-range coordinates read the nearest edge.
    fn height_at(&self, x: f32, y: f32) -> f32;

    /// Whether `(x, y)` lies on the terrain.
    fn is_valid_coordinate(&self, x: f32, y: f32) -> bool;

    /// Playable `(width, depth)`, measured from the origin.
    fn extent(&self) -> (f32, f32);

    /// Horizontal distance, ignoring height.
    fn distance_2d(&self, a: Vec3, b: Vec3) -> f32 {
        a.truncate().distance(b.truncate())
    }

    /// `(x, y)` lifted onto the ground.
    fn ground_point(&self, x: f32, y: f32) -> Vec3 {
        Vec3::new(x, y, self.height_at(x, y))
    }
}

/// Result of one movement step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrivalStatus {
    Traveling,
    Arrived,
}

/// Moves bodies. Implementations own the notion of "close enough".
pub trait PhysicalActuator {
    /// Advance `position` toward `target` by at most `step` world units.
    fn move_toward(
        &mut self,
        position: &mut Vec3,
        velocity: &mut Vec3,
        target: Vec3,
        step: f32,
        dt: f32,
        spatial: &dyn SpatialQuery,
    ) -> ArrivalStatus;

    /// Place a body at `point` and stop it.
    fn teleport(&mut self, position: &mut Vec3, velocity: &mut Vec3, point: Vec3);

    /// Add `impulse` to a body's velocity.
    fn apply_impulse(&mut self, velocity: &mut Vec3, impulse: Vec3);

    /// Distance below which a body counts as arrived.
    fn arrival_threshold(&self) -> f32;
}

/// Opaque handle into a presentation layer.
pub type Handle = u64;

/// Receives visual state changes.
pub trait PresentationSink {
    fn spawn(&mut self, kind: Kind, color: Vec4, position: Vec3) -> Handle;
    fn despawn(&mut self, handle: Handle);
    fn set_color(&mut self, handle: Handle, color: Vec4);

    /// Called after a body moved. Headless sinks may ignore it.
    fn set_position(&mut self, _handle: Handle, _position: Vec3) {}
}

/// Time source driving phase timers.
pub trait Clock {
    /// Seconds since an arbitrary epoch.
    fn now(&self) -> f64;
    /// Seconds covered by the last tick.
    fn delta_time(&self) -> f32;
    /// Advance to the next tick.
    fn tick(&mut self);
}

/// Ground built from a [`TerrainConfig`].
#[derive(Debug, Clone)]
pub enum Terrain {
    Flat {
        width: f32,
        depth: f32,
        elevation: f32,
    },
    Hills {
        width: f32,
        depth: f32,
        amplitude: f32,
        wavelength: f32,
    },
    Grid(Heightmap),
}

impl Terrain {
    /// Build the terrain a scenario describes.
    pub fn from_config(config: &TerrainConfig) -> Self {
        match config {
            TerrainConfig::Flat {
                width,
                depth,
                elevation,
            } => Terrain::Flat {
                width: *width,
                depth: *depth,
                elevation: *elevation,
            },
            TerrainConfig::Hills {
                width,
                depth,
                amplitude,
                wavelength,
            } => Terrain::Hills {
                width: *width,
                depth: *depth,
                amplitude: *amplitude,
                wavelength: *wavelength,
            },
            TerrainConfig::Grid {
                columns,
                rows,
                cell_size,
                heights,
            } => Terrain::Grid(Heightmap::new(*columns, *rows, *cell_size, heights.clone())),
        }
    }

    /// A level plane, handy for tests.
    pub fn flat(width: f32, depth: f32) -> Self {
        Terrain::Flat {
            width,
            depth,
            elevation: 0.0,
        }
    }
}

impl SpatialQuery for Terrain {
    fn height_at(&self, x: f32, y: f32) -> f32 {
        match self {
            Terrain::Flat { elevation, .. } => *elevation,
            Terrain::Hills {
                width,
                depth,
                amplitude,
                wavelength,
            } => {
                let x = x.clamp(0.0, *width);
                let y = y.clamp(0.0, *depth);
                let k = std::f32::consts::TAU / wavelength.max(f32::EPSILON);
                // Offset so the lowest valley sits at zero.
                amplitude * (1.0 + 0.5 * ((x * k).sin() + (y * k).cos()))
            }
            Terrain::Grid(map) => map.height_at(x, y),
        }
    }

    fn is_valid_coordinate(&self, x: f32, y: f32) -> bool {
        let (width, depth) = self.extent();
        x.is_finite() && y.is_finite() && (0.0..width).contains(&x) && (0.0..depth).contains(&y)
    }

    fn extent(&self) -> (f32, f32) {
        match self {
            Terrain::Flat { width, depth, .. } | Terrain::Hills { width, depth, .. } => {
                (*width, *depth)
            }
            Terrain::Grid(map) => map.extent(),
        }
    }
}

/// Regular grid of height samples, bilinearly interpolated.
#[derive(Debug, Clone)]
pub struct Heightmap {
    columns: usize,
    rows: usize,
    cell_size: f32,
    heights: Vec<f32>,
}

impl Heightmap {
    /// `heights` is row-major with `columns * rows` entries. Missing samples
    /// read as zero.
    pub fn new(columns: usize, rows: usize, cell_size: f32, mut heights: Vec<f32>) -> Self {
        let columns = columns.max(1);
        let rows = rows.max(1);
        heights.resize(columns * rows, 0.0);
        Self {
            columns,
            rows,
            cell_size,
            heights,
        }
    }

    #[inline]
    fn sample(&self, col: usize, row: usize) -> f32 {
        let col = col.min(self.columns - 1);
        let row = row.min(self.rows - 1);
        self.heights[row * self.columns + col]
    }

    /// Bilinear height at `(x, y)`, clamped to the grid.
    pub fn height_at(&self, x: f32, y: f32) -> f32 {
        let max_col = (self.columns - 1) as f32;
        let max_row = (self.rows - 1) as f32;
        let gx = (x / self.cell_size).clamp(0.0, max_col);
        let gy = (y / self.cell_size).clamp(0.0, max_row);

        let c0 = gx.floor() as usize;
        let r0 = gy.floor() as usize;
        let tx = gx - c0 as f32;
        let ty = gy - r0 as f32;

        let top = self.sample(c0, r0) * (1.0 - tx) + self.sample(c0 + 1, r0) * tx;
        let bottom = self.sample(c0, r0 + 1) * (1.0 - tx) + self.sample(c0 + 1, r0 + 1) * tx;
        top * (1.0 - ty) + bottom * ty
    }

    pub fn extent(&self) -> (f32, f32) {
        (
            (self.columns - 1) as f32 * self.cell_size,
            (self.rows - 1) as f32 * self.cell_size,
        )
    }
}

/// Headless physics: straight-line steering with gravity and drag.
#[derive(Debug, Clone)]
pub struct KinematicActuator {
    /// Arrival distance.
    pub arrival_threshold: f32,
    /// Downward acceleration, world units per second squared.
    pub gravity: f32,
    /// Fraction of horizontal velocity kept after one second.
    pub drag: f32,
}

impl KinematicActuator {
    /// Actuator that reports arrival within `arrival_threshold`.
    pub fn new(arrival_threshold: f32) -> Self {
        Self {
            arrival_threshold,
            gravity: 98.0,
            drag: 0.05,
        }
    }
}

impl Default for KinematicActuator {
    fn default() -> Self {
        Self::new(20.0)
    }
}

impl PhysicalActuator for KinematicActuator {
    fn move_toward(
        &mut self,
        position: &mut Vec3,
        velocity: &mut Vec3,
        target: Vec3,
        step: f32,
        dt: f32,
        spatial: &dyn SpatialQuery,
    ) -> ArrivalStatus {
        if spatial.distance_2d(*position, target) < self.arrival_threshold {
            return ArrivalStatus::Arrived;
        }

        let heading = (target - *position).truncate();
        let remaining = heading.length();
        let advance = if remaining > 0.0 {
            heading / remaining * step.min(remaining)
        } else {
            glam::Vec2::ZERO
        };

        let mut next = *position + advance.extend(0.0) + *velocity * dt;
        if !spatial.is_valid_coordinate(next.x, next.y) {
            next.x = position.x;
            next.y = position.y;
            velocity.x = 0.0;
            velocity.y = 0.0;
        }

        velocity.z -= self.gravity * dt;
        let keep = self.drag.clamp(0.0, 1.0).powf(dt);
        velocity.x *= keep;
        velocity.y *= keep;

        let ground = spatial.height_at(next.x, next.y).max(0.0);
        if next.z <= ground {
            next.z = ground;
            velocity.z = velocity.z.max(0.0);
        }
        *position = next;

        if spatial.distance_2d(*position, target) < self.arrival_threshold {
            ArrivalStatus::Arrived
        } else {
            ArrivalStatus::Traveling
        }
    }

    fn teleport(&mut self, position: &mut Vec3, velocity: &mut Vec3, point: Vec3) {
        *position = point;
        *velocity = Vec3::ZERO;
    }

    fn apply_impulse(&mut self, velocity: &mut Vec3, impulse: Vec3) {
        *velocity += impulse;
    }

    fn arrival_threshold(&self) -> f32 {
        self.arrival_threshold
    }
}

/// What a headless sink remembers about one spawned body.
#[derive(Debug, Clone, PartialEq)]
pub struct Renderable {
    pub kind: Kind,
    pub color: Vec4,
    pub position: Vec3,
}

/// Presentation sink that only keeps a table of live bodies.
#[derive(Debug, Default)]
pub struct HeadlessPresentation {
    live: HashMap<Handle, Renderable>,
    next_handle: Handle,
}

impl HeadlessPresentation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles not yet despawned.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn get(&self, handle: Handle) -> Option<&Renderable> {
        self.live.get(&handle)
    }

    /// Live handles showing `kind`.
    pub fn count_of(&self, kind: Kind) -> usize {
        self.live.values().filter(|r| r.kind == kind).count()
    }
}

impl PresentationSink for HeadlessPresentation {
    fn spawn(&mut self, kind: Kind, color: Vec4, position: Vec3) -> Handle {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.live.insert(
            handle,
            Renderable {
                kind,
                color,
                position,
            },
        );
        handle
    }

    fn despawn(&mut self, handle: Handle) {
        if self.live.remove(&handle).is_none() {
            log::warn!("Despawn of unknown handle {}", handle);
        }
    }

    fn set_color(&mut self, handle: Handle, color: Vec4) {
        if let Some(r) = self.live.get_mut(&handle) {
            r.color = color;
        }
    }

    fn set_position(&mut self, handle: Handle, position: Vec3) {
        if let Some(r) = self.live.get_mut(&handle) {
            r.position = position;
        }
    }
}

/// Clock advanced by a fixed step per tick. Deterministic.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: f64,
    step: f32,
}

impl ManualClock {
    /// Clock at zero that advances `step` seconds per tick.
    pub fn new(step: f32) -> Self {
        Self { now: 0.0, step }
    }

    /// Jump forward without ticking.
    pub fn advance(&mut self, seconds: f64) {
        self.now += seconds;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.now
    }

    fn delta_time(&self) -> f32 {
        self.step
    }

    fn tick(&mut self) {
        self.now += self.step as f64;
    }
}

/// Wall-clock time.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone)]
pub struct SystemClock {
    start: std::time::Instant,
    last: std::time::Instant,
    delta: f32,
}

#[cfg(not(target_arch = "wasm32"))]
impl SystemClock {
    /// Clock anchored at the current instant.
    pub fn new() -> Self {
        let now = std::time::Instant::now();
        Self {
            start: now,
            last: now,
            delta: 0.0,
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.last.duration_since(self.start).as_secs_f64()
    }

    fn delta_time(&self) -> f32 {
        self.delta
    }

    fn tick(&mut self) {
        let now = std::time::Instant::now();
        self.delta = now.duration_since(self.last).as_secs_f32();
        self.last = now;
    }
}
