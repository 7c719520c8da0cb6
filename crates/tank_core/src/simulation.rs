//! Reference world and fixed-rate tick loop.
//!
//! [`Simulation`] owns every tank and the [`BallisticResolver`], implements
//! the collaborator traits on top of a simple kinematic world (sphere hulls,
//! box obstacles, a square arena) and drives all components once per tick.
//!
//! # Determinism
//!
//! - Tanks are processed in ascending id order
//! - Every random draw comes from a ChaCha stream seeded with the scenario
//!   seed and the tank id
//! - Time only advances through [`Simulation::tick`]
//!
//! The same scenario and seed always produce the same [`Simulation::state_hash`]
//! sequence.
//!
//! # Example
//!
//! ```
//! use tank_core::data::TankData;
//! use tank_core::math::Vec3;
//! use tank_core::simulation::Simulation;
//!
//! let mut sim = Simulation::new(42);
//! let tank = sim.spawn_tank(&TankData::new("light"), Vec3::ZERO, 0.0).unwrap();
//!
//! sim.tick();
//! assert_eq!(sim.get_tick(), 1);
//! assert!(sim.tank(tank).is_some());
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::armament::{Armament, ArmamentEvent, SlotId};
use crate::ballistics::{BallisticResolver, BallisticsConfig, Contact, Resolution};
use crate::behavior::{BehaviorController, BehaviorEvent, BehaviorMode, MovementIntent, Unit};
use crate::collaborators::{
    EffectRequest, EffectsLog, EffectsSink, EntityDirectory, EntityDirectoryMut, EntityId, Layer,
    LayerMask, Navigation, PhysicalBody, RayHit, SpatialQuery,
};
use crate::data::{ArenaData, ChassisData, ObstacleData, ScenarioData, TankData};
use crate::error::{CombatError, Result};
use crate::math::{
    clamp01, flatten, move_towards_angle, ray_aabb, ray_sphere, yaw_of, yaw_rotation, Transform,
    Vec3, EPSILON, UP,
};
use crate::vitality::{Vitality, VitalityEvent};

/// Ticks per second for the simulation.
pub const TICK_RATE: u32 = 50;

/// Simulated seconds per tick at a time scale of 1.
pub const TICK_DURATION: f32 = 1.0 / TICK_RATE as f32;

/// Fraction of knockback velocity shed per second.
const KNOCKBACK_DAMPING: f32 = 4.0;

// ============================================================================
// Tanks
// ============================================================================

/// One tank and all of its components.
#[derive(Debug, Clone)]
pub struct Tank {
    id: EntityId,
    loadout: String,
    hull: Transform,
    turret: Transform,
    chassis: ChassisData,
    vitality: Vitality,
    armament: Armament,
    behavior: Option<BehaviorController>,
    intent: MovementIntent,
    motion: Vec3,
    knockback: Vec3,
}

impl Tank {
    /// Entity id.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// ID of the loadout this tank was spawned from.
    #[must_use]
    pub fn loadout(&self) -> &str {
        &self.loadout
    }

    /// Hull transform.
    #[must_use]
    pub const fn hull(&self) -> &Transform {
        &self.hull
    }

    /// Weapon mount transform.
    #[must_use]
    pub const fn turret(&self) -> &Transform {
        &self.turret
    }

    /// Hull properties.
    #[must_use]
    pub const fn chassis(&self) -> &ChassisData {
        &self.chassis
    }

    /// Health tracker.
    #[must_use]
    pub const fn vitality(&self) -> &Vitality {
        &self.vitality
    }

    /// Weapons.
    #[must_use]
    pub const fn armament(&self) -> &Armament {
        &self.armament
    }

    /// AI controller, `None` for manually driven tanks.
    #[must_use]
    pub const fn behavior(&self) -> Option<&BehaviorController> {
        self.behavior.as_ref()
    }

    /// Movement the tank attempts this tick.
    #[must_use]
    pub const fn intent(&self) -> MovementIntent {
        self.intent
    }

    /// Linear velocity over the last tick, knockback included.
    #[must_use]
    pub const fn velocity(&self) -> Vec3 {
        self.motion
    }

    fn sync_turret(&mut self) {
        self.turret.position = self.hull.position + UP * self.chassis.turret_height;
    }
}

impl PhysicalBody for Tank {
    fn velocity(&self) -> Vec3 {
        self.motion
    }

    fn apply_impulse(&mut self, impulse: Vec3, _point: Vec3) {
        self.knockback += impulse / self.chassis.mass;
    }

    fn apply_explosive_impulse(&mut self, force: f32, origin: Vec3, radius: f32, upwards_modifier: f32) {
        let distance = self.hull.position.distance(origin);
        let falloff = if radius > 0.0 {
            1.0 - clamp01(distance / radius)
        } else {
            1.0
        };
        let lifted_origin = origin - UP * upwards_modifier;
        let direction = (self.hull.position - lifted_origin).normalize_or_zero();
        self.knockback += direction * (force * falloff / self.chassis.mass);
    }
}

/// Storage for all tanks, keyed by id.
#[derive(Debug, Clone)]
pub struct TankStorage {
    tanks: HashMap<EntityId, Tank>,
    next_id: EntityId,
}

impl TankStorage {
    /// Create empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tanks: HashMap::new(),
            next_id: 1,
        }
    }

    fn allocate_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn insert(&mut self, tank: Tank) {
        self.tanks.insert(tank.id, tank);
    }

    fn remove(&mut self, id: EntityId) -> Option<Tank> {
        self.tanks.remove(&id)
    }

    /// Get a tank by id.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Tank> {
        self.tanks.get(&id)
    }

    fn get_mut(&mut self, id: EntityId) -> Option<&mut Tank> {
        self.tanks.get_mut(&id)
    }

    /// Check if a tank exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.tanks.contains_key(&id)
    }

    /// Number of tanks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tanks.len()
    }

    /// Check if there are no tanks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tanks.is_empty()
    }

    /// Tank ids in ascending order, for deterministic iteration.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.tanks.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Iterate tanks in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Tank> {
        self.sorted_ids().into_iter().filter_map(|id| self.tanks.get(&id))
    }
}

impl Default for TankStorage {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// World Queries
// ============================================================================

/// Sphere collider of a live tank.
#[derive(Debug, Clone, Copy)]
struct Collider {
    id: EntityId,
    center: Vec3,
    radius: f32,
    layer: Layer,
}

/// Colliders in ascending id order plus static geometry.
#[derive(Debug)]
struct ColliderSet<'a> {
    colliders: Vec<Collider>,
    obstacles: &'a [ObstacleData],
}

impl<'a> ColliderSet<'a> {
    fn capture(tanks: &TankStorage, obstacles: &'a [ObstacleData]) -> Self {
        let colliders = tanks
            .iter()
            .filter(|t| t.vitality.is_collidable())
            .map(|t| Collider {
                id: t.id,
                center: t.hull.position,
                radius: t.chassis.collider_radius,
                layer: t.chassis.layer,
            })
            .collect();
        Self {
            colliders,
            obstacles,
        }
    }

    fn overlap_sphere(&self, center: Vec3, radius: f32, mask: LayerMask) -> Vec<EntityId> {
        self.colliders
            .iter()
            .filter(|c| mask.contains_layer(c.layer))
            .filter(|c| c.center.distance(center) <= radius + c.radius)
            .map(|c| c.id)
            .collect()
    }

    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32, mask: LayerMask) -> Option<RayHit> {
        let mut best: Option<RayHit> = None;
        let mut consider = |distance: f32, normal: Vec3, entity: Option<EntityId>| {
            if best.map_or(true, |b| distance < b.distance) {
                best = Some(RayHit {
                    distance,
                    point: origin + direction * distance,
                    normal,
                    entity,
                });
            }
        };

        if mask.contains_layer(Layer::Obstacle) {
            for obstacle in self.obstacles {
                if let Some((distance, normal)) =
                    ray_aabb(origin, direction, max_distance, obstacle.min, obstacle.max)
                {
                    consider(distance, normal, None);
                }
            }
        }

        for collider in self.colliders.iter().filter(|c| mask.contains_layer(c.layer)) {
            if let Some(distance) = ray_sphere(origin, direction, max_distance, collider.center, collider.radius) {
                let point = origin + direction * distance;
                consider(distance, (point - collider.center).normalize_or_zero(), Some(collider.id));
            }
        }

        best
    }
}

/// Read-only record of one tank for AI perception.
#[derive(Debug, Clone, Copy)]
struct Sighting {
    id: EntityId,
    hull: Transform,
    velocity: Vec3,
    targetable: bool,
}

/// Frozen copy of the world that AI controllers perceive during a tick.
///
/// Owning its data lets controllers run while their own tank is borrowed
/// mutably.
#[derive(Debug)]
struct WorldView<'a> {
    colliders: ColliderSet<'a>,
    sightings: Vec<Sighting>,
    half_extent: f32,
}

impl<'a> WorldView<'a> {
    fn capture(tanks: &TankStorage, obstacles: &'a [ObstacleData], half_extent: f32) -> Self {
        let sightings = tanks
            .iter()
            .map(|t| Sighting {
                id: t.id,
                hull: t.hull,
                velocity: t.motion,
                targetable: !t.vitality.is_dead(),
            })
            .collect();
        Self {
            colliders: ColliderSet::capture(tanks, obstacles),
            sightings,
            half_extent,
        }
    }

    fn sighting(&self, id: EntityId) -> Option<&Sighting> {
        self.sightings
            .binary_search_by_key(&id, |s| s.id)
            .ok()
            .map(|index| &self.sightings[index])
    }
}

impl SpatialQuery for WorldView<'_> {
    fn overlap_sphere(&self, center: Vec3, radius: f32, mask: LayerMask) -> Vec<EntityId> {
        self.colliders.overlap_sphere(center, radius, mask)
    }

    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32, mask: LayerMask) -> Option<RayHit> {
        self.colliders.raycast(origin, direction, max_distance, mask)
    }
}

impl EntityDirectory for WorldView<'_> {
    fn transform(&self, id: EntityId) -> Option<Transform> {
        self.sighting(id).map(|s| s.hull)
    }

    fn velocity(&self, id: EntityId) -> Option<Vec3> {
        self.sighting(id).map(|s| s.velocity)
    }

    fn is_targetable(&self, id: EntityId) -> bool {
        self.sighting(id).is_some_and(|s| s.targetable)
    }
}

impl Navigation for WorldView<'_> {
    fn sample_position(&self, point: Vec3, max_distance: f32) -> Option<Vec3> {
        let limit = self.half_extent;
        let mut candidate = Vec3::new(point.x.clamp(-limit, limit), point.y, point.z.clamp(-limit, limit));

        for obstacle in self.colliders.obstacles {
            if let Some(outside) = push_out_of_footprint(obstacle, candidate) {
                candidate = outside;
            }
        }
        candidate.x = candidate.x.clamp(-limit, limit);
        candidate.z = candidate.z.clamp(-limit, limit);

        (candidate.distance(point) <= max_distance).then_some(candidate)
    }
}

/// Nearest point outside an obstacle's floor footprint, if `point` is inside it.
fn push_out_of_footprint(obstacle: &ObstacleData, point: Vec3) -> Option<Vec3> {
    let inside = point.x > obstacle.min.x
        && point.x < obstacle.max.x
        && point.z > obstacle.min.z
        && point.z < obstacle.max.z;
    if !inside {
        return None;
    }

    let exits = [
        (point.x - obstacle.min.x, Vec3::new(obstacle.min.x, point.y, point.z)),
        (obstacle.max.x - point.x, Vec3::new(obstacle.max.x, point.y, point.z)),
        (point.z - obstacle.min.z, Vec3::new(point.x, point.y, obstacle.min.z)),
        (obstacle.max.z - point.z, Vec3::new(point.x, point.y, obstacle.max.z)),
    ];
    exits
        .into_iter()
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, exit)| exit)
}

/// Whether a hull circle of `radius` at `position` overlaps an obstacle footprint.
fn footprint_blocks(obstacle: &ObstacleData, position: Vec3, radius: f32) -> bool {
    let closest_x = position.x.clamp(obstacle.min.x, obstacle.max.x);
    let closest_z = position.z.clamp(obstacle.min.z, obstacle.max.z);
    let dx = position.x - closest_x;
    let dz = position.z - closest_z;
    dx * dx + dz * dz < radius * radius
}

/// Mutable access to tanks for hazard resolution.
struct Arena<'a> {
    colliders: ColliderSet<'a>,
    tanks: &'a mut TankStorage,
}

impl<'a> Arena<'a> {
    fn new(tanks: &'a mut TankStorage, obstacles: &'a [ObstacleData]) -> Self {
        Self {
            colliders: ColliderSet::capture(tanks, obstacles),
            tanks,
        }
    }
}

impl SpatialQuery for Arena<'_> {
    fn overlap_sphere(&self, center: Vec3, radius: f32, mask: LayerMask) -> Vec<EntityId> {
        self.colliders.overlap_sphere(center, radius, mask)
    }

    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32, mask: LayerMask) -> Option<RayHit> {
        self.colliders.raycast(origin, direction, max_distance, mask)
    }
}

impl EntityDirectory for Arena<'_> {
    fn transform(&self, id: EntityId) -> Option<Transform> {
        self.tanks.get(id).map(|t| t.hull)
    }

    fn velocity(&self, id: EntityId) -> Option<Vec3> {
        self.tanks.get(id).map(|t| t.motion)
    }

    fn is_targetable(&self, id: EntityId) -> bool {
        self.tanks.get(id).is_some_and(|t| !t.vitality.is_dead())
    }
}

impl EntityDirectoryMut for Arena<'_> {
    fn vitality_mut(&mut self, id: EntityId) -> Option<&mut Vitality> {
        self.tanks.get_mut(id).map(|t| &mut t.vitality)
    }

    fn body_mut(&mut self, id: EntityId) -> Option<&mut dyn PhysicalBody> {
        self.tanks
            .get_mut(id)
            .map(|t| t as &mut dyn PhysicalBody)
    }
}

// ============================================================================
// Tick Events
// ============================================================================

/// Events generated during a simulation tick.
///
/// These are what a presentation layer subscribes to: health bars, ammo
/// counters, camera shake and score keeping all read from here.
#[derive(Debug, Clone, Default)]
pub struct TickEvents {
    /// Health notifications, tagged with the tank.
    pub vitality: Vec<(EntityId, VitalityEvent)>,
    /// Weapon notifications, tagged with the tank.
    pub armament: Vec<(EntityId, ArmamentEvent)>,
    /// AI notifications, tagged with the tank.
    pub behavior: Vec<(EntityId, BehaviorEvent)>,
    /// Hazards that resolved this tick.
    pub resolutions: Vec<Resolution>,
    /// Sound and visual effect requests.
    pub effects: Vec<EffectRequest>,
    /// Tanks that died this tick.
    pub deaths: Vec<EntityId>,
    /// Tanks removed from the world this tick.
    pub removals: Vec<EntityId>,
    /// Items dropped by dying tanks.
    pub drops: Vec<(EntityId, String)>,
}

impl TickEvents {
    /// Number of shots fired this tick.
    #[must_use]
    pub fn shots_fired(&self) -> usize {
        self.armament
            .iter()
            .filter(|(_, e)| matches!(e, ArmamentEvent::Fired { .. }))
            .count()
    }

    /// Total effective damage dealt this tick.
    #[must_use]
    pub fn damage_dealt(&self) -> f32 {
        self.vitality
            .iter()
            .filter_map(|(_, e)| match e {
                VitalityEvent::Damaged { amount } => Some(*amount),
                _ => None,
            })
            .sum()
    }
}

// ============================================================================
// Simulation
// ============================================================================

/// The combat world.
///
/// # System Execution Order
///
/// Each tick, systems run in this order:
/// 1. **Timers** - Vitality and armament countdowns
/// 2. **Behavior** - AI perception, mode transitions, aiming and firing
/// 3. **Movement** - Hull turning, driving and knockback
/// 4. **Ballistics** - Hazard flight and resolution
/// 5. **Notifications** - Damage reactions, event collection, removals
#[derive(Debug)]
pub struct Simulation {
    tick: u64,
    elapsed: f64,
    time_scale: f32,
    seed: u64,
    tanks: TankStorage,
    resolver: BallisticResolver,
    obstacles: Vec<ObstacleData>,
    half_extent: f32,
    effects: Arc<EffectsLog>,
}

impl Simulation {
    /// Create an empty world with the default arena.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_arena(seed, &ArenaData::default())
    }

    /// Create an empty world on the given arena.
    #[must_use]
    pub fn with_arena(seed: u64, arena: &ArenaData) -> Self {
        let effects = Arc::new(EffectsLog::new());
        let sink: Arc<dyn EffectsSink> = effects.clone();
        Self {
            tick: 0,
            elapsed: 0.0,
            time_scale: 1.0,
            seed,
            tanks: TankStorage::new(),
            resolver: BallisticResolver::new(BallisticsConfig::default()).with_effects(sink),
            obstacles: arena.obstacles.clone(),
            half_extent: arena.half_extent,
            effects,
        }
    }

    /// Build a world from a scenario, spawning every placement in order.
    ///
    /// # Errors
    ///
    /// Returns [`CombatError::InvalidConfig`] if the scenario fails validation.
    pub fn from_scenario(scenario: &ScenarioData) -> Result<Self> {
        scenario.validate()?;

        let mut sim = Self::with_arena(scenario.seed, &scenario.arena);
        for placement in &scenario.tanks {
            let tank = scenario.resolve(placement)?;
            sim.spawn_tank(&tank, placement.position, placement.yaw)?;
        }

        tracing::debug!(
            scenario = %scenario.name,
            tanks = sim.tanks.len(),
            seed = scenario.seed,
            "Scenario loaded"
        );
        Ok(sim)
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Get the current tick number.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.tick
    }

    /// Simulated seconds since the start.
    #[must_use]
    pub const fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Current time scale.
    #[must_use]
    pub const fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Seed every per-tank random stream derives from.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Get a tank by id.
    #[must_use]
    pub fn tank(&self, id: EntityId) -> Option<&Tank> {
        self.tanks.get(id)
    }

    /// All tanks.
    #[must_use]
    pub const fn tanks(&self) -> &TankStorage {
        &self.tanks
    }

    /// Number of tanks still alive.
    #[must_use]
    pub fn living_tanks(&self) -> usize {
        self.tanks.iter().filter(|t| !t.vitality.is_dead()).count()
    }

    /// Hazards in flight.
    #[must_use]
    pub const fn resolver(&self) -> &BallisticResolver {
        &self.resolver
    }

    /// Static obstacles.
    #[must_use]
    pub fn obstacles(&self) -> &[ObstacleData] {
        &self.obstacles
    }

    /// Half the side length of the arena floor.
    #[must_use]
    pub const fn half_extent(&self) -> f32 {
        self.half_extent
    }

    // ------------------------------------------------------------------------
    // Spawning
    // ------------------------------------------------------------------------

    /// Spawn a tank from a loadout.
    ///
    /// The loadout is cloned into the tank; later edits to `data` do not
    /// affect it.
    ///
    /// # Errors
    ///
    /// Returns [`CombatError::InvalidConfig`] if the loadout fails validation.
    pub fn spawn_tank(&mut self, data: &TankData, position: Vec3, yaw: f32) -> Result<EntityId> {
        data.validate()?;

        let id = self.tanks.allocate_id();
        let stream = entity_seed(self.seed, id);
        let sink: Arc<dyn EffectsSink> = self.effects.clone();

        let hull = Transform::from_yaw(position, yaw);
        let mut tank = Tank {
            id,
            loadout: data.id.clone(),
            hull,
            turret: hull,
            chassis: data.chassis.clone(),
            vitality: Vitality::new(id, data.vitality.clone())
                .with_effects(sink.clone())
                .with_seed(stream),
            armament: Armament::new(id, data.primary.clone(), data.secondary.clone()).with_effects(sink),
            behavior: data
                .behavior
                .clone()
                .map(|config| BehaviorController::new(id, config).with_seed(stream.wrapping_add(1))),
            intent: MovementIntent::Hold,
            motion: Vec3::ZERO,
            knockback: Vec3::ZERO,
        };
        tank.sync_turret();
        self.tanks.insert(tank);

        tracing::debug!(entity = id, loadout = %data.id, ?position, yaw, "Tank spawned");
        Ok(id)
    }

    /// Remove a tank immediately.
    ///
    /// # Errors
    ///
    /// Returns [`CombatError::EntityNotFound`] if the tank doesn't exist.
    pub fn despawn(&mut self, id: EntityId) -> Result<()> {
        if self.tanks.remove(id).is_some() {
            Ok(())
        } else {
            Err(CombatError::EntityNotFound(id))
        }
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Fire a weapon slot from the tank's turret.
    ///
    /// Returns `Ok(false)` for every gameplay refusal: dead tank, missing
    /// slot, reloading, rate limit or empty magazine.
    ///
    /// # Errors
    ///
    /// Returns [`CombatError::EntityNotFound`] if the tank doesn't exist.
    pub fn fire(&mut self, id: EntityId, slot: SlotId) -> Result<bool> {
        let tank = self.tanks.get_mut(id).ok_or(CombatError::EntityNotFound(id))?;
        if tank.vitality.is_dead() {
            return Ok(false);
        }
        Ok(tank.armament.fire(slot, &tank.turret, &mut self.resolver))
    }

    /// Request a manual reload.
    ///
    /// # Errors
    ///
    /// Returns [`CombatError::EntityNotFound`] if the tank doesn't exist.
    pub fn reload(&mut self, id: EntityId, slot: SlotId) -> Result<bool> {
        let tank = self.tanks.get_mut(id).ok_or(CombatError::EntityNotFound(id))?;
        if tank.vitality.is_dead() {
            return Ok(false);
        }
        Ok(tank.armament.reload(slot))
    }

    /// Set the movement of a manually driven tank.
    ///
    /// # Errors
    ///
    /// Returns [`CombatError::EntityNotFound`] if the tank doesn't exist, or
    /// [`CombatError::InvalidState`] if an AI controller drives it.
    pub fn set_intent(&mut self, id: EntityId, intent: MovementIntent) -> Result<()> {
        let tank = self.tanks.get_mut(id).ok_or(CombatError::EntityNotFound(id))?;
        if tank.behavior.is_some() {
            return Err(CombatError::InvalidState(format!("Tank {id} is AI-driven")));
        }
        tank.intent = intent;
        Ok(())
    }

    /// Turn a tank's weapon mount to a world yaw in degrees.
    ///
    /// # Errors
    ///
    /// Returns [`CombatError::EntityNotFound`] if the tank doesn't exist.
    pub fn aim_turret(&mut self, id: EntityId, yaw: f32) -> Result<()> {
        let tank = self.tanks.get_mut(id).ok_or(CombatError::EntityNotFound(id))?;
        tank.turret.rotation = yaw_rotation(yaw);
        Ok(())
    }

    /// Switch an AI tank's behavior mode.
    ///
    /// # Errors
    ///
    /// Returns [`CombatError::EntityNotFound`] if the tank doesn't exist, or
    /// [`CombatError::MissingComponent`] if it has no AI.
    pub fn set_mode(&mut self, id: EntityId, mode: BehaviorMode) -> Result<()> {
        self.controller_mut(id)?.set_mode(mode);
        Ok(())
    }

    /// Replace an AI tank's patrol route.
    ///
    /// # Errors
    ///
    /// Same as [`set_mode`](Self::set_mode).
    pub fn set_patrol_points(&mut self, id: EntityId, points: Vec<Vec3>) -> Result<()> {
        self.controller_mut(id)?.set_patrol_points(points);
        Ok(())
    }

    /// Apply damage from outside the ballistics pipeline.
    ///
    /// `direction` is the hit's travel direction in world space. Returns
    /// the effective damage dealt.
    ///
    /// # Errors
    ///
    /// Returns [`CombatError::EntityNotFound`] if the tank doesn't exist.
    pub fn apply_damage(&mut self, id: EntityId, raw: f32, direction: Option<Vec3>) -> Result<f32> {
        let tank = self.tanks.get_mut(id).ok_or(CombatError::EntityNotFound(id))?;
        let local = direction.map(|d| tank.hull.inverse_transform_direction(d));
        Ok(tank.vitality.apply_damage(raw, local))
    }

    /// Heal a tank. Returns the health actually restored.
    ///
    /// # Errors
    ///
    /// Returns [`CombatError::EntityNotFound`] if the tank doesn't exist.
    pub fn heal(&mut self, id: EntityId, amount: f32) -> Result<f32> {
        let tank = self.tanks.get_mut(id).ok_or(CombatError::EntityNotFound(id))?;
        Ok(tank.vitality.heal(amount))
    }

    /// Toggle a tank's global invulnerability.
    ///
    /// # Errors
    ///
    /// Returns [`CombatError::EntityNotFound`] if the tank doesn't exist.
    pub fn set_invulnerable(&mut self, id: EntityId, invulnerable: bool) -> Result<()> {
        let tank = self.tanks.get_mut(id).ok_or(CombatError::EntityNotFound(id))?;
        tank.vitality.set_invulnerable(invulnerable);
        Ok(())
    }

    /// Resolve a collision reported by an external physics engine.
    pub fn report_contact(&mut self, contact: Contact) -> Option<Resolution> {
        let mut arena = Arena::new(&mut self.tanks, &self.obstacles);
        self.resolver.report_contact(contact, &mut arena)
    }

    /// Scale simulated time per tick. 0 pauses; negative values clamp to 0.
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    fn controller_mut(&mut self, id: EntityId) -> Result<&mut BehaviorController> {
        let tank = self.tanks.get_mut(id).ok_or(CombatError::EntityNotFound(id))?;
        tank.behavior.as_mut().ok_or(CombatError::MissingComponent {
            entity: id,
            component: "behavior",
        })
    }

    // ------------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------------

    /// Advance the simulation by one tick.
    ///
    /// While paused (time scale 0) nothing happens and the tick counter
    /// does not advance.
    pub fn tick(&mut self) -> TickEvents {
        let mut events = TickEvents::default();
        let dt = TICK_DURATION * self.time_scale;
        if dt <= 0.0 {
            return events;
        }

        // Get sorted ids for deterministic processing
        let ids = self.tanks.sorted_ids();

        // 1. Timers
        self.run_timers(&ids, dt);

        // 2. Behavior
        self.run_behavior(&ids, dt);

        // 3. Movement
        self.run_movement(&ids, dt);

        // 4. Ballistics
        let mut arena = Arena::new(&mut self.tanks, &self.obstacles);
        events.resolutions = self.resolver.advance(dt, &mut arena);

        // 5. Notifications
        self.collect_events(&ids, &mut events);
        for &id in &events.removals {
            self.tanks.remove(id);
            tracing::debug!(entity = id, "Tank removed");
        }
        events.effects = self.effects.drain();

        self.tick += 1;
        self.elapsed += f64::from(dt);

        #[cfg(feature = "debug-validation")]
        self.check_invariants();

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.tick, state_hash = hash, "Simulation state hash");
        }

        events
    }

    /// Run ticks until `seconds` of simulated time have passed or every
    /// tank but one is dead. Returns the number of ticks run.
    #[allow(clippy::cast_sign_loss)]
    pub fn run_for(&mut self, seconds: f32, mut on_tick: impl FnMut(&TickEvents)) -> u64 {
        let start = self.tick;
        let ticks = (seconds.max(0.0) / TICK_DURATION).ceil() as u64;
        for _ in 0..ticks {
            let events = self.tick();
            on_tick(&events);
            if self.living_tanks() <= 1 {
                break;
            }
        }
        self.tick - start
    }

    fn run_timers(&mut self, ids: &[EntityId], dt: f32) {
        for &id in ids {
            if let Some(tank) = self.tanks.get_mut(id) {
                tank.vitality.tick(dt);
                tank.armament.tick(dt);
                tank.sync_turret();
            }
        }
    }

    fn run_behavior(&mut self, ids: &[EntityId], dt: f32) {
        let view = WorldView::capture(&self.tanks, &self.obstacles, self.half_extent);

        for &id in ids {
            let Some(tank) = self.tanks.get_mut(id) else {
                continue;
            };
            if tank.vitality.is_dead() {
                tank.intent = MovementIntent::Hold;
                continue;
            }
            let Some(controller) = tank.behavior.as_mut() else {
                continue;
            };

            let unit = Unit {
                hull: tank.hull,
                turret: &mut tank.turret,
                vitality: &tank.vitality,
                armament: &mut tank.armament,
            };
            tank.intent = controller.tick(dt, unit, &view, &mut self.resolver);
        }
    }

    fn run_movement(&mut self, ids: &[EntityId], dt: f32) {
        for &id in ids {
            if let Some(tank) = self.tanks.get_mut(id) {
                integrate_motion(tank, dt, self.half_extent, &self.obstacles);
            }
        }
    }

    fn collect_events(&mut self, ids: &[EntityId], events: &mut TickEvents) {
        let view = WorldView::capture(&self.tanks, &self.obstacles, self.half_extent);

        for &id in ids {
            let Some(tank) = self.tanks.get_mut(id) else {
                continue;
            };

            for event in tank.vitality.drain_events() {
                match &event {
                    VitalityEvent::Damaged { amount } if *amount > 0.0 => {
                        if let Some(controller) = tank.behavior.as_mut() {
                            if !tank.vitality.is_dead() {
                                controller.notify_damaged(&tank.hull, &view);
                            }
                        }
                    }
                    VitalityEvent::Died => events.deaths.push(id),
                    VitalityEvent::ItemDropped { item } => events.drops.push((id, item.clone())),
                    VitalityEvent::RemovalDue => events.removals.push(id),
                    _ => {}
                }
                events.vitality.push((id, event));
            }

            events
                .armament
                .extend(tank.armament.drain_events().into_iter().map(|e| (id, e)));

            if let Some(controller) = tank.behavior.as_mut() {
                events
                    .behavior
                    .extend(controller.drain_events().into_iter().map(|e| (id, e)));
            }
        }
    }

    #[cfg(feature = "debug-validation")]
    fn check_invariants(&self) {
        for tank in self.tanks.iter() {
            let health = tank.vitality.current_health();
            if !(0.0..=tank.vitality.max_health()).contains(&health) {
                tracing::error!(entity = tank.id, health, "Health out of range");
            }
            for slot in [SlotId::Primary, SlotId::Secondary] {
                if let Some(weapon) = tank.armament.slot(slot) {
                    if weapon.current_ammo() > weapon.config().max_ammo {
                        tracing::error!(entity = tank.id, ?slot, "Ammo above magazine size");
                    }
                }
            }
            if let Some(controller) = &tank.behavior {
                if controller.fallback_mode().is_transient() {
                    tracing::error!(entity = tank.id, "Transient fallback mode");
                }
            }
        }
    }

    /// Calculate a hash of the current simulation state.
    ///
    /// Two simulations with identical state produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);

        let ids = self.tanks.sorted_ids();
        ids.len().hash(&mut hasher);

        for tank in self.tanks.iter() {
            tank.id.hash(&mut hasher);
            hash_vec3(tank.hull.position, &mut hasher);
            tank.hull.yaw().to_bits().hash(&mut hasher);
            tank.turret.yaw().to_bits().hash(&mut hasher);
            tank.vitality.current_health().to_bits().hash(&mut hasher);
            tank.vitality.is_dead().hash(&mut hasher);

            for slot in [SlotId::Primary, SlotId::Secondary] {
                tank.armament.current_ammo(slot).hash(&mut hasher);
            }

            if let Some(controller) = &tank.behavior {
                controller.mode().hash(&mut hasher);
                controller.target().hash(&mut hasher);
                controller.patrol_index().hash(&mut hasher);
            }
        }

        self.resolver.len().hash(&mut hasher);
        for hazard in self.resolver.hazards() {
            hazard.id().hash(&mut hasher);
            hash_vec3(hazard.position(), &mut hasher);
        }

        hasher.finish()
    }
}

fn hash_vec3<H: Hasher>(v: Vec3, hasher: &mut H) {
    v.x.to_bits().hash(hasher);
    v.y.to_bits().hash(hasher);
    v.z.to_bits().hash(hasher);
}

/// Derive an independent random stream for one tank (SplitMix64 finalizer).
fn entity_seed(seed: u64, id: EntityId) -> u64 {
    let mut z = seed ^ id.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Turn the hull toward `point` by at most `max_delta` degrees.
fn turn_towards(hull: &mut Transform, point: Vec3, max_delta: f32) {
    let direction = flatten(point - hull.position);
    if direction.length_squared() < EPSILON {
        return;
    }
    let yaw = move_towards_angle(hull.yaw(), yaw_of(direction), max_delta);
    hull.rotation = yaw_rotation(yaw);
}

/// Kinematic drive: turn, step toward the goal, add knockback, then clamp
/// to the arena and stop at obstacles.
fn integrate_motion(tank: &mut Tank, dt: f32, half_extent: f32, obstacles: &[ObstacleData]) {
    if tank.vitality.is_dead() {
        tank.motion = Vec3::ZERO;
        tank.knockback = Vec3::ZERO;
        return;
    }

    let start = tank.hull.position;
    let max_turn = tank.chassis.turn_speed * dt;
    let mut step = Vec3::ZERO;

    match tank.intent {
        MovementIntent::Hold => {}
        MovementIntent::Face(point) => turn_towards(&mut tank.hull, point, max_turn),
        MovementIntent::MoveTo(point) => {
            turn_towards(&mut tank.hull, point, max_turn);
            let offset = flatten(point - start);
            let distance = offset.length();
            if distance > EPSILON {
                step = offset / distance * distance.min(tank.chassis.move_speed * dt);
            }
        }
    }
    step += flatten(tank.knockback) * dt;

    let radius = tank.chassis.collider_radius;
    let limit = (half_extent - radius).max(0.0);
    let mut next = start + step;
    next.x = next.x.clamp(-limit, limit);
    next.z = next.z.clamp(-limit, limit);
    if obstacles.iter().any(|o| footprint_blocks(o, next, radius)) {
        next = start;
    }

    tank.hull.position = next;
    tank.motion = (next - start) / dt;
    tank.knockback *= (1.0 - KNOCKBACK_DAMPING * dt).max(0.0);
    tank.sync_turret();
}
