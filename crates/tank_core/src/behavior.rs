//! AI behavior state machine.
//!
//! A [`BehaviorController`] drives one tank. Every tick it:
//!
//! 1. scans for a target (see [`crate::targeting`]),
//! 2. evaluates mode transitions in priority order,
//! 3. produces a [`MovementIntent`] for the current mode,
//! 4. turns the weapon mount toward the lead point and fires when aimed.
//!
//! # Modes
//!
//! | Mode   | Movement                          | Escalates to Chase when      |
//! |--------|-----------------------------------|------------------------------|
//! | Patrol | waypoint to waypoint, with waits  | a target is visible          |
//! | Guard  | stationary, faces visible targets | a target is visible          |
//! | Chase  | holds a distance band             | -                            |
//! | Ambush | stationary                        | a visible target is close    |
//! | Flee   | away from the threat              | -                            |
//!
//! Chase and Flee are transient: the controller remembers the last
//! non-transient mode as its fallback and returns to it when the episode
//! ends.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::armament::{Armament, SlotId};
use crate::ballistics::HazardSpawner;
use crate::collaborators::{EntityDirectory, EntityId, Navigation, SpatialQuery};
use crate::error::{ensure_fraction, ensure_non_negative, ensure_positive, CombatError, Result};
use crate::math::{
    angle_between, flatten, horizontal_distance, lerp_angle, yaw_rotation, Transform, Vec3,
};
use crate::targeting::{aim_yaw, predict_lead_point, scan, ScanPolicy, ScanResult, TargetingConfig};
use crate::vitality::Vitality;

/// Health must climb above `flee_threshold * FLEE_RECOVERY_FACTOR` to end
/// a flee episode while a threat remains.
pub const FLEE_RECOVERY_FACTOR: f32 = 1.5;

/// Projectile speed assumed when the fire slot is not fitted.
const FALLBACK_PROJECTILE_SPEED: f32 = 50.0;

// ============================================================================
// Modes
// ============================================================================

/// Top-level AI behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BehaviorMode {
    /// Walk a waypoint loop.
    Patrol,
    /// Hold position and watch.
    Guard,
    /// Engage a target.
    #[default]
    Chase,
    /// Wait hidden until a target comes close.
    Ambush,
    /// Run from a threat.
    Flee,
}

impl BehaviorMode {
    /// Whether this mode is an episode that ends in the fallback mode.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::Chase | Self::Flee)
    }

    /// Visibility relaxations used when scanning in this mode.
    #[must_use]
    pub const fn scan_policy(self) -> ScanPolicy {
        ScanPolicy {
            ignore_field_of_view: matches!(self, Self::Chase),
            accept_unseen: matches!(self, Self::Ambush),
        }
    }
}

/// Where the tank wants to go this tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum MovementIntent {
    /// Stay put.
    #[default]
    Hold,
    /// Drive toward a point.
    MoveTo(Vec3),
    /// Stay put and turn the hull toward a point.
    Face(Vec3),
}

/// Notifications emitted by a [`BehaviorController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BehaviorEvent {
    /// The mode changed.
    ModeChanged {
        /// Previous mode.
        from: BehaviorMode,
        /// New mode.
        to: BehaviorMode,
    },
    /// The tracked target changed.
    TargetChanged {
        /// New target, `None` when lost.
        target: Option<EntityId>,
    },
}

// ============================================================================
// Configuration
// ============================================================================

/// AI tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorConfig {
    /// Mode at spawn.
    #[serde(default)]
    pub initial_mode: BehaviorMode,
    /// Mode to fall back to when the initial mode is transient.
    #[serde(default = "default_fallback_mode")]
    pub fallback_mode: BehaviorMode,
    /// Furthest distance at which the tank fires.
    #[serde(default = "default_attack_range")]
    pub attack_range: f32,
    /// Chase backs off when closer than this.
    #[serde(default = "default_min_distance")]
    pub min_distance: f32,
    /// Health fraction at or below which the tank flees.
    #[serde(default = "default_flee_threshold")]
    pub flee_threshold: f32,
    /// Fraction of attack range that springs an ambush.
    #[serde(default = "default_ambush_activation_fraction")]
    pub ambush_activation_fraction: f32,
    /// How far from the threat a flee point is placed.
    #[serde(default = "default_flee_distance")]
    pub flee_distance: f32,
    /// Search radius for a walkable flee point.
    #[serde(default = "default_flee_sample_radius")]
    pub flee_sample_radius: f32,
    /// Distance at which a waypoint or last known position counts as reached.
    #[serde(default = "default_waypoint_reached_distance")]
    pub waypoint_reached_distance: f32,
    /// Seconds to wait at each waypoint.
    #[serde(default = "default_patrol_wait")]
    pub patrol_wait: f32,
    /// Pick waypoints at random instead of in order.
    #[serde(default)]
    pub random_patrol: bool,
    /// Patrol route.
    #[serde(default)]
    pub patrol_points: Vec<Vec3>,
    /// Minimum seconds between AI fire commands.
    #[serde(default = "default_firing_cooldown")]
    pub firing_cooldown: f32,
    /// Interpolation rate of the weapon mount toward its aim heading.
    #[serde(default = "default_turret_rotation_speed")]
    pub turret_rotation_speed: f32,
    /// Weapon the AI fires.
    #[serde(default)]
    pub fire_slot: SlotId,
    /// Perception and aiming.
    #[serde(default)]
    pub targeting: TargetingConfig,
}

const fn default_fallback_mode() -> BehaviorMode {
    BehaviorMode::Guard
}

const fn default_attack_range() -> f32 {
    20.0
}

const fn default_min_distance() -> f32 {
    10.0
}

const fn default_flee_threshold() -> f32 {
    0.3
}

const fn default_ambush_activation_fraction() -> f32 {
    0.7
}

const fn default_flee_distance() -> f32 {
    20.0
}

const fn default_flee_sample_radius() -> f32 {
    10.0
}

const fn default_waypoint_reached_distance() -> f32 {
    3.0
}

const fn default_patrol_wait() -> f32 {
    3.0
}

const fn default_firing_cooldown() -> f32 {
    2.0
}

const fn default_turret_rotation_speed() -> f32 {
    3.0
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            initial_mode: BehaviorMode::default(),
            fallback_mode: default_fallback_mode(),
            attack_range: default_attack_range(),
            min_distance: default_min_distance(),
            flee_threshold: default_flee_threshold(),
            ambush_activation_fraction: default_ambush_activation_fraction(),
            flee_distance: default_flee_distance(),
            flee_sample_radius: default_flee_sample_radius(),
            waypoint_reached_distance: default_waypoint_reached_distance(),
            patrol_wait: default_patrol_wait(),
            random_patrol: false,
            patrol_points: Vec::new(),
            firing_cooldown: default_firing_cooldown(),
            turret_rotation_speed: default_turret_rotation_speed(),
            fire_slot: SlotId::Primary,
            targeting: TargetingConfig::default(),
        }
    }
}

impl BehaviorConfig {
    /// Config starting in `mode`.
    #[must_use]
    pub fn with_mode(mode: BehaviorMode) -> Self {
        Self {
            initial_mode: mode,
            ..Self::default()
        }
    }

    /// Builder method to set the patrol route.
    #[must_use]
    pub fn with_patrol_points(mut self, points: Vec<Vec3>) -> Self {
        self.patrol_points = points;
        self
    }

    /// Check every field is in range.
    pub fn validate(&self) -> Result<()> {
        if self.fallback_mode.is_transient() {
            return Err(CombatError::invalid_config(
                "behavior.fallback_mode",
                "must be Patrol, Guard or Ambush",
            ));
        }
        ensure_positive("behavior.attack_range", self.attack_range)?;
        ensure_non_negative("behavior.min_distance", self.min_distance)?;
        ensure_fraction("behavior.flee_threshold", self.flee_threshold)?;
        ensure_fraction(
            "behavior.ambush_activation_fraction",
            self.ambush_activation_fraction,
        )?;
        ensure_non_negative("behavior.flee_distance", self.flee_distance)?;
        ensure_non_negative("behavior.flee_sample_radius", self.flee_sample_radius)?;
        ensure_non_negative(
            "behavior.waypoint_reached_distance",
            self.waypoint_reached_distance,
        )?;
        ensure_non_negative("behavior.patrol_wait", self.patrol_wait)?;
        ensure_non_negative("behavior.firing_cooldown", self.firing_cooldown)?;
        ensure_non_negative("behavior.turret_rotation_speed", self.turret_rotation_speed)?;
        self.targeting.validate()
    }
}

// ============================================================================
// Controller
// ============================================================================

/// Mutable handles to the tank a controller drives.
#[derive(Debug)]
pub struct Unit<'a> {
    /// Hull transform.
    pub hull: Transform,
    /// Weapon mount transform. Its rotation is updated by the controller.
    pub turret: &'a mut Transform,
    /// The tank's health.
    pub vitality: &'a Vitality,
    /// The tank's weapons.
    pub armament: &'a mut Armament,
}

/// Target currently tracked.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Tracked {
    id: EntityId,
    position: Vec3,
    visible: bool,
}

/// Per-tank AI state.
#[derive(Debug, Clone)]
pub struct BehaviorController {
    owner: EntityId,
    config: BehaviorConfig,
    mode: BehaviorMode,
    fallback: BehaviorMode,
    target: Option<Tracked>,
    last_known_position: Option<Vec3>,
    patrol_index: usize,
    patrol_wait_remaining: Option<f32>,
    scan_cooldown: f32,
    last_fire_time: Option<f64>,
    clock: f64,
    rng: ChaCha8Rng,
    events: Vec<BehaviorEvent>,
}

impl BehaviorController {
    /// Create a controller seeded from its owner id.
    #[must_use]
    pub fn new(owner: EntityId, config: BehaviorConfig) -> Self {
        let mode = config.initial_mode;
        let fallback = if mode.is_transient() {
            config.fallback_mode
        } else {
            mode
        };
        let mut controller = Self {
            owner,
            config,
            mode,
            fallback,
            target: None,
            last_known_position: None,
            patrol_index: 0,
            patrol_wait_remaining: None,
            scan_cooldown: 0.0,
            last_fire_time: None,
            clock: 0.0,
            rng: ChaCha8Rng::seed_from_u64(owner),
            events: Vec::new(),
        };
        controller.reset_patrol();
        controller
    }

    /// Builder method to reseed the controller's random source.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self.reset_patrol();
        self
    }

    /// Entity this controller drives.
    #[must_use]
    pub const fn owner(&self) -> EntityId {
        self.owner
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &BehaviorConfig {
        &self.config
    }

    /// Current mode.
    #[must_use]
    pub const fn mode(&self) -> BehaviorMode {
        self.mode
    }

    /// Mode resumed when a Chase or Flee episode ends.
    #[must_use]
    pub const fn fallback_mode(&self) -> BehaviorMode {
        self.fallback
    }

    /// Currently tracked target.
    #[must_use]
    pub fn target(&self) -> Option<EntityId> {
        self.target.map(|t| t.id)
    }

    /// Whether the tracked target is in sight.
    #[must_use]
    pub fn target_visible(&self) -> bool {
        self.target.is_some_and(|t| t.visible)
    }

    /// Where the target was last seen.
    #[must_use]
    pub const fn last_known_target_position(&self) -> Option<Vec3> {
        self.last_known_position
    }

    /// Index of the current waypoint.
    #[must_use]
    pub const fn patrol_index(&self) -> usize {
        self.patrol_index
    }

    /// Whether the controller is waiting at a waypoint.
    #[must_use]
    pub const fn is_waiting(&self) -> bool {
        self.patrol_wait_remaining.is_some()
    }

    /// Controller time of the last successful AI shot.
    #[must_use]
    pub const fn last_fire_time(&self) -> Option<f64> {
        self.last_fire_time
    }

    /// Switch mode from outside, e.g. a mission script.
    pub fn set_mode(&mut self, mode: BehaviorMode) {
        self.switch_mode(mode);
    }

    /// Replace the patrol route and restart it from the first waypoint.
    pub fn set_patrol_points(&mut self, points: Vec<Vec3>) {
        self.config.patrol_points = points;
        self.patrol_index = 0;
        self.patrol_wait_remaining = None;
        if self.mode == BehaviorMode::Patrol && self.config.patrol_points.is_empty() {
            tracing::warn!(entity = self.owner, "Patrol route cleared while patrolling");
        }
    }

    /// Take every buffered notification.
    pub fn drain_events(&mut self) -> Vec<BehaviorEvent> {
        std::mem::take(&mut self.events)
    }

    /// React to the tank taking damage.
    ///
    /// In Patrol or Guard with nothing tracked, runs an immediate scan and
    /// switches to Chase if it finds a target. Returns `true` on a switch.
    pub fn notify_damaged<W>(&mut self, hull: &Transform, world: &W) -> bool
    where
        W: SpatialQuery + EntityDirectory,
    {
        if !matches!(self.mode, BehaviorMode::Patrol | BehaviorMode::Guard) || self.target.is_some() {
            return false;
        }

        let found = scan(
            self.owner,
            hull,
            &self.config.targeting,
            self.mode.scan_policy(),
            world,
        );
        self.apply_scan(found);
        if self.target.is_some() {
            self.switch_mode(BehaviorMode::Chase);
            return true;
        }
        false
    }

    /// Run one AI step.
    ///
    /// Returns the movement the tank should attempt this tick. The weapon
    /// mount is turned in place and fire commands go straight to the
    /// armament, which hands projectiles to `spawner`.
    pub fn tick<W, S>(&mut self, dt: f32, unit: Unit<'_>, world: &W, spawner: &mut S) -> MovementIntent
    where
        W: SpatialQuery + EntityDirectory + Navigation,
        S: HazardSpawner,
    {
        self.clock += f64::from(dt);

        self.perceive(dt, &unit.hull, world);
        self.evaluate_transitions(&unit.hull, unit.vitality);
        let intent = self.plan_movement(dt, &unit.hull, world);

        if let Some(target) = self.target {
            self.aim_and_fire(dt, target, &unit.hull, unit.turret, unit.armament, world, spawner);
        }

        intent
    }

    // ------------------------------------------------------------------------
    // Perception
    // ------------------------------------------------------------------------

    fn perceive<W>(&mut self, dt: f32, hull: &Transform, world: &W)
    where
        W: SpatialQuery + EntityDirectory,
    {
        self.scan_cooldown -= dt;
        if self.scan_cooldown > 0.0 {
            self.refresh_target(world);
            return;
        }
        self.scan_cooldown = self.config.targeting.scan_interval;

        let found = scan(
            self.owner,
            hull,
            &self.config.targeting,
            self.mode.scan_policy(),
            world,
        );

        if found.is_none() && self.mode == BehaviorMode::Chase {
            if let Some(mut kept) = self.target {
                let range = self.config.targeting.detection_range;
                let still_near = world.is_targetable(kept.id)
                    && world
                        .transform(kept.id)
                        .is_some_and(|t| t.position.distance(hull.position) <= range);
                if still_near {
                    // Pursue toward the last sighting.
                    kept.visible = false;
                    self.target = Some(kept);
                    return;
                }
            }
        }

        self.apply_scan(found);
    }

    fn apply_scan(&mut self, found: Option<ScanResult>) {
        let previous = self.target();
        self.target = found.map(|r| Tracked {
            id: r.target,
            position: r.position,
            visible: r.visible,
        });
        if let Some(tracked) = self.target.filter(|t| t.visible) {
            self.last_known_position = Some(tracked.position);
        }
        if self.target() != previous {
            self.events.push(BehaviorEvent::TargetChanged {
                target: self.target(),
            });
        }
    }

    /// Keep the previous scan's target between staggered scans.
    fn refresh_target<W: EntityDirectory>(&mut self, world: &W) {
        let Some(mut tracked) = self.target else {
            return;
        };
        match world
            .transform(tracked.id)
            .filter(|_| world.is_targetable(tracked.id))
        {
            Some(transform) => {
                tracked.position = transform.position;
                if tracked.visible {
                    self.last_known_position = Some(tracked.position);
                }
                self.target = Some(tracked);
            }
            None => self.apply_scan(None),
        }
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    fn evaluate_transitions(&mut self, hull: &Transform, vitality: &Vitality) {
        let health = vitality.health_fraction();
        let threshold = self.config.flee_threshold;

        if health <= threshold && self.mode != BehaviorMode::Flee {
            self.switch_mode(BehaviorMode::Flee);
            return;
        }

        match self.mode {
            BehaviorMode::Flee => {
                let threat_gone = self.target.is_none() && health > threshold;
                if threat_gone || health > threshold * FLEE_RECOVERY_FACTOR {
                    self.switch_mode(self.fallback);
                }
            }
            BehaviorMode::Patrol | BehaviorMode::Guard => {
                if self.target_visible() {
                    self.switch_mode(BehaviorMode::Chase);
                }
            }
            BehaviorMode::Ambush => {
                let activation = self.config.attack_range * self.config.ambush_activation_fraction;
                let sprung = self
                    .target
                    .is_some_and(|t| t.visible && t.position.distance(hull.position) <= activation);
                if sprung {
                    self.switch_mode(BehaviorMode::Chase);
                }
            }
            BehaviorMode::Chase => {
                let lost = match self.target {
                    None => true,
                    Some(t) if !t.visible => self.last_known_position.map_or(true, |p| {
                        hull.position.distance(p) <= self.config.waypoint_reached_distance
                    }),
                    Some(_) => false,
                };
                if lost {
                    self.switch_mode(self.fallback);
                }
            }
        }
    }

    fn switch_mode(&mut self, mode: BehaviorMode) {
        if self.mode == mode {
            return;
        }

        if mode.is_transient() && !self.mode.is_transient() {
            self.fallback = self.mode;
        }

        let from = self.mode;
        self.mode = mode;
        tracing::debug!(entity = self.owner, ?from, to = ?mode, "Behavior mode changed");
        self.events.push(BehaviorEvent::ModeChanged { from, to: mode });

        if mode == BehaviorMode::Patrol && self.config.patrol_points.is_empty() {
            tracing::warn!(entity = self.owner, "Patrol mode without patrol points");
        }
    }

    // ------------------------------------------------------------------------
    // Movement
    // ------------------------------------------------------------------------

    fn plan_movement<N: Navigation>(&mut self, dt: f32, hull: &Transform, navigation: &N) -> MovementIntent {
        match self.mode {
            BehaviorMode::Patrol => self.patrol(dt, hull),
            BehaviorMode::Guard => match self.target {
                Some(t) if t.visible => MovementIntent::Face(t.position),
                _ => MovementIntent::Hold,
            },
            BehaviorMode::Chase => self.chase(hull),
            BehaviorMode::Ambush => MovementIntent::Hold,
            BehaviorMode::Flee => self.flee(hull, navigation),
        }
    }

    fn patrol(&mut self, dt: f32, hull: &Transform) -> MovementIntent {
        let count = self.config.patrol_points.len();
        if count == 0 {
            return MovementIntent::Hold;
        }

        if let Some(remaining) = self.patrol_wait_remaining.as_mut() {
            *remaining -= dt;
            if *remaining > 0.0 {
                return MovementIntent::Hold;
            }
            self.patrol_wait_remaining = None;
            self.advance_waypoint();
        }

        let waypoint = self.config.patrol_points[self.patrol_index % count];
        if horizontal_distance(hull.position, waypoint) <= self.config.waypoint_reached_distance {
            self.patrol_wait_remaining = Some(self.config.patrol_wait);
            return MovementIntent::Hold;
        }
        MovementIntent::MoveTo(waypoint)
    }

    fn advance_waypoint(&mut self) {
        let count = self.config.patrol_points.len();
        if count == 0 {
            return;
        }
        self.patrol_index = if self.config.random_patrol && count > 1 {
            // Draw from the other points only, so the route never repeats.
            let pick = self.rng.gen_range(0..count - 1);
            if pick >= self.patrol_index {
                pick + 1
            } else {
                pick
            }
        } else {
            (self.patrol_index + 1) % count
        };
    }

    fn reset_patrol(&mut self) {
        self.patrol_index = 0;
        self.patrol_wait_remaining = None;
        let count = self.config.patrol_points.len();
        if self.config.random_patrol && count > 0 {
            self.patrol_index = self.rng.gen_range(0..count);
        }
        if self.mode == BehaviorMode::Patrol && count == 0 {
            tracing::warn!(entity = self.owner, "Patrol mode without patrol points");
        }
    }

    fn chase(&self, hull: &Transform) -> MovementIntent {
        let Some(target) = self.target else {
            return MovementIntent::Hold;
        };

        if !target.visible {
            return self
                .last_known_position
                .map_or(MovementIntent::Hold, MovementIntent::MoveTo);
        }

        let distance = hull.position.distance(target.position);
        if distance > self.config.attack_range {
            MovementIntent::MoveTo(target.position)
        } else if distance < self.config.min_distance {
            let away = (hull.position - target.position).normalize_or_zero();
            MovementIntent::MoveTo(hull.position + away * self.config.min_distance)
        } else {
            MovementIntent::Face(target.position)
        }
    }

    fn flee<N: Navigation>(&self, hull: &Transform, navigation: &N) -> MovementIntent {
        let Some(threat) = self.target else {
            return MovementIntent::Hold;
        };
        let away = (hull.position - threat.position).normalize_or_zero();
        let flee_point = hull.position + away * self.config.flee_distance;
        navigation
            .sample_position(flee_point, self.config.flee_sample_radius)
            .map_or(MovementIntent::Hold, MovementIntent::MoveTo)
    }

    // ------------------------------------------------------------------------
    // Weapons
    // ------------------------------------------------------------------------

    fn aim_and_fire<W, S>(
        &mut self,
        dt: f32,
        target: Tracked,
        hull: &Transform,
        turret: &mut Transform,
        armament: &mut Armament,
        world: &W,
        spawner: &mut S,
    ) where
        W: EntityDirectory,
        S: HazardSpawner,
    {
        let targeting = &self.config.targeting;
        let aim_point = if targeting.lead_target {
            let speed = armament
                .projectile_speed(self.config.fire_slot)
                .unwrap_or(FALLBACK_PROJECTILE_SPEED);
            predict_lead_point(
                turret.position,
                target.position,
                world.velocity(target.id),
                speed,
                targeting.max_prediction_time,
            )
        } else {
            target.position
        };

        let desired = aim_yaw(
            turret.position,
            aim_point,
            targeting.aim_error_margin,
            &mut self.rng,
        );
        let yaw = lerp_angle(turret.yaw(), desired, self.config.turret_rotation_speed * dt);
        turret.rotation = yaw_rotation(yaw);

        if self.mode == BehaviorMode::Flee || !target.visible {
            return;
        }
        let cooled = self
            .last_fire_time
            .map_or(true, |t| self.clock - t >= f64::from(self.config.firing_cooldown));
        if !cooled {
            return;
        }
        // Range is hull to target, the same distance transitions use.
        if hull.position.distance(target.position) > self.config.attack_range {
            return;
        }
        let bearing_error = angle_between(flatten(turret.forward()), flatten(aim_point - turret.position));
        if bearing_error > targeting.aim_tolerance {
            return;
        }

        if armament.fire(self.config.fire_slot, turret, spawner) {
            self.last_fire_time = Some(self.clock);
            tracing::trace!(entity = self.owner, target = target.id, "AI fired");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::armament::WeaponConfig;
    use crate::ballistics::HazardSpec;
    use crate::collaborators::{LayerMask, RayHit};
    use crate::math::ray_aabb;
    use crate::vitality::VitalityConfig;

    #[derive(Default)]
    struct TestWorld {
        tanks: Vec<(EntityId, Vec3, Vec3)>,
        walls: Vec<(Vec3, Vec3)>,
    }

    impl TestWorld {
        fn with_tank(mut self, id: EntityId, position: Vec3) -> Self {
            self.tanks.push((id, position, Vec3::ZERO));
            self
        }

        fn move_tank(&mut self, id: EntityId, position: Vec3) {
            if let Some(tank) = self.tanks.iter_mut().find(|t| t.0 == id) {
                tank.1 = position;
            }
        }

        fn remove_tank(&mut self, id: EntityId) {
            self.tanks.retain(|t| t.0 != id);
        }
    }

    impl SpatialQuery for TestWorld {
        fn overlap_sphere(&self, center: Vec3, radius: f32, _mask: LayerMask) -> Vec<EntityId> {
            let mut ids: Vec<_> = self
                .tanks
                .iter()
                .filter(|t| t.1.distance(center) <= radius)
                .map(|t| t.0)
                .collect();
            ids.sort_unstable();
            ids
        }

        fn raycast(&self, origin: Vec3, direction: Vec3, max: f32, _mask: LayerMask) -> Option<RayHit> {
            self.walls.iter().find_map(|(min, max_corner)| {
                ray_aabb(origin, direction, max, *min, *max_corner).map(|(distance, normal)| RayHit {
                    distance,
                    point: origin + direction * distance,
                    normal,
                    entity: None,
                })
            })
        }
    }

    impl EntityDirectory for TestWorld {
        fn transform(&self, id: EntityId) -> Option<Transform> {
            self.tanks
                .iter()
                .find(|t| t.0 == id)
                .map(|t| Transform::from_yaw(t.1, 0.0))
        }

        fn velocity(&self, id: EntityId) -> Option<Vec3> {
            self.tanks.iter().find(|t| t.0 == id).map(|t| t.2)
        }

        fn is_targetable(&self, id: EntityId) -> bool {
            self.tanks.iter().any(|t| t.0 == id)
        }
    }

    impl Navigation for TestWorld {
        fn sample_position(&self, point: Vec3, _max: f32) -> Option<Vec3> {
            Some(point)
        }
    }

    struct Rig {
        hull: Transform,
        turret: Transform,
        vitality: Vitality,
        armament: Armament,
        spawned: Vec<HazardSpec>,
    }

    impl Rig {
        fn at(position: Vec3) -> Self {
            let hull = Transform::from_yaw(position, 0.0);
            Self {
                hull,
                turret: Transform::from_yaw(position + Vec3::Y, 0.0),
                vitality: Vitality::new(1, VitalityConfig::default().with_invulnerability_time(0.0)),
                armament: Armament::new(1, WeaponConfig::default(), None),
                spawned: Vec::new(),
            }
        }

        fn tick(&mut self, controller: &mut BehaviorController, dt: f32, world: &TestWorld) -> MovementIntent {
            self.armament.tick(dt);
            let unit = Unit {
                hull: self.hull,
                turret: &mut self.turret,
                vitality: &self.vitality,
                armament: &mut self.armament,
            };
            controller.tick(dt, unit, world, &mut self.spawned)
        }
    }

    fn precise(mode: BehaviorMode) -> BehaviorConfig {
        let mut config = BehaviorConfig::with_mode(mode);
        config.targeting.aim_error_margin = 0.0;
        config
    }

    #[test]
    fn test_patrol_spots_target_and_chases() {
        let world = TestWorld::default()
            .with_tank(1, Vec3::ZERO)
            .with_tank(2, Vec3::new(0.0, 0.0, 15.0));
        let config = precise(BehaviorMode::Patrol).with_patrol_points(vec![Vec3::new(50.0, 0.0, 0.0)]);
        let mut controller = BehaviorController::new(1, config);
        let mut rig = Rig::at(Vec3::ZERO);

        let intent = rig.tick(&mut controller, 0.02, &world);

        assert_eq!(controller.mode(), BehaviorMode::Chase);
        assert_eq!(controller.fallback_mode(), BehaviorMode::Patrol);
        assert_eq!(controller.target(), Some(2));
        // Inside the distance band: hold and face.
        assert_eq!(intent, MovementIntent::Face(Vec3::new(0.0, 0.0, 15.0)));
        assert!(controller.drain_events().contains(&BehaviorEvent::ModeChanged {
            from: BehaviorMode::Patrol,
            to: BehaviorMode::Chase,
        }));
    }

    #[test]
    fn test_chase_distance_band() {
        let mut controller = BehaviorController::new(1, precise(BehaviorMode::Guard));
        let mut rig = Rig::at(Vec3::ZERO);

        let far = TestWorld::default()
            .with_tank(1, Vec3::ZERO)
            .with_tank(2, Vec3::new(0.0, 0.0, 25.0));
        assert_eq!(
            rig.tick(&mut controller, 0.02, &far),
            MovementIntent::MoveTo(Vec3::new(0.0, 0.0, 25.0))
        );

        let close = TestWorld::default()
            .with_tank(1, Vec3::ZERO)
            .with_tank(2, Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(
            rig.tick(&mut controller, 0.02, &close),
            MovementIntent::MoveTo(Vec3::new(0.0, 0.0, -10.0))
        );
    }

    #[test]
    fn test_guard_faces_without_chasing_when_out_of_view() {
        // Behind the guard: not visible, stays in Guard.
        let world = TestWorld::default()
            .with_tank(1, Vec3::ZERO)
            .with_tank(2, Vec3::new(0.0, 0.0, -10.0));
        let mut controller = BehaviorController::new(1, precise(BehaviorMode::Guard));
        let mut rig = Rig::at(Vec3::ZERO);

        assert_eq!(rig.tick(&mut controller, 0.02, &world), MovementIntent::Hold);
        assert_eq!(controller.mode(), BehaviorMode::Guard);
        assert_eq!(controller.target(), None);
    }

    #[test]
    fn test_chase_pursues_last_known_then_falls_back() {
        let mut world = TestWorld::default()
            .with_tank(1, Vec3::ZERO)
            .with_tank(2, Vec3::new(0.0, 0.0, 15.0));
        let mut controller = BehaviorController::new(1, precise(BehaviorMode::Guard));
        let mut rig = Rig::at(Vec3::ZERO);

        rig.tick(&mut controller, 0.02, &world);
        assert_eq!(controller.mode(), BehaviorMode::Chase);

        // Target slips behind a wall.
        world.walls.push((Vec3::new(-5.0, 0.0, 8.0), Vec3::new(5.0, 5.0, 9.0)));
        world.move_tank(2, Vec3::new(0.0, 0.0, 20.0));
        let intent = rig.tick(&mut controller, 0.02, &world);
        assert_eq!(controller.mode(), BehaviorMode::Chase);
        assert!(!controller.target_visible());
        assert_eq!(intent, MovementIntent::MoveTo(Vec3::new(0.0, 0.0, 15.0)));

        // Arrive at the last sighting without finding it.
        world.walls[0] = (Vec3::new(-5.0, 0.0, 16.0), Vec3::new(5.0, 5.0, 17.0));
        rig.hull.position = Vec3::new(0.0, 0.0, 14.0);
        world.move_tank(1, rig.hull.position);
        rig.tick(&mut controller, 0.02, &world);
        assert_eq!(controller.mode(), BehaviorMode::Guard);
    }

    #[test]
    fn test_chase_drops_removed_target() {
        let mut world = TestWorld::default()
            .with_tank(1, Vec3::ZERO)
            .with_tank(2, Vec3::new(0.0, 0.0, 15.0));
        let mut controller = BehaviorController::new(1, precise(BehaviorMode::Patrol));
        let mut rig = Rig::at(Vec3::ZERO);

        rig.tick(&mut controller, 0.02, &world);
        assert_eq!(controller.mode(), BehaviorMode::Chase);

        world.remove_tank(2);
        rig.tick(&mut controller, 0.02, &world);
        assert_eq!(controller.target(), None);
        assert_eq!(controller.mode(), BehaviorMode::Patrol);
    }

    #[test]
    fn test_ambush_waits_for_close_target() {
        let mut world = TestWorld::default()
            .with_tank(1, Vec3::ZERO)
            .with_tank(2, Vec3::new(0.0, 0.0, 18.0));
        let mut controller = BehaviorController::new(1, precise(BehaviorMode::Ambush));
        let mut rig = Rig::at(Vec3::ZERO);

        // 18 > 20 * 0.7: tracked but not sprung.
        assert_eq!(rig.tick(&mut controller, 0.02, &world), MovementIntent::Hold);
        assert_eq!(controller.mode(), BehaviorMode::Ambush);
        assert_eq!(controller.target(), Some(2));

        world.move_tank(2, Vec3::new(0.0, 0.0, 12.0));
        rig.tick(&mut controller, 0.02, &world);
        assert_eq!(controller.mode(), BehaviorMode::Chase);
        assert_eq!(controller.fallback_mode(), BehaviorMode::Ambush);
    }

    #[test]
    fn test_ambush_senses_unseen_targets() {
        // Behind the tank: out of view, still tracked.
        let world = TestWorld::default()
            .with_tank(1, Vec3::ZERO)
            .with_tank(2, Vec3::new(0.0, 0.0, -5.0));
        let mut controller = BehaviorController::new(1, precise(BehaviorMode::Ambush));
        let mut rig = Rig::at(Vec3::ZERO);

        rig.tick(&mut controller, 0.02, &world);
        assert_eq!(controller.target(), Some(2));
        assert!(!controller.target_visible());
        assert_eq!(controller.mode(), BehaviorMode::Ambush);
        assert!(rig.spawned.is_empty());
    }

    #[test]
    fn test_low_health_forces_flee_and_recovery_returns() {
        let world = TestWorld::default()
            .with_tank(1, Vec3::ZERO)
            .with_tank(2, Vec3::new(0.0, 0.0, 15.0));
        let mut controller = BehaviorController::new(1, precise(BehaviorMode::Guard));
        let mut rig = Rig::at(Vec3::ZERO);

        rig.tick(&mut controller, 0.02, &world);
        assert_eq!(controller.mode(), BehaviorMode::Chase);

        rig.vitality.apply_damage(75.0, None);
        let intent = rig.tick(&mut controller, 0.02, &world);
        assert_eq!(controller.mode(), BehaviorMode::Flee);
        // Chase was transient, so Guard is kept.
        assert_eq!(controller.fallback_mode(), BehaviorMode::Guard);
        assert_eq!(intent, MovementIntent::MoveTo(Vec3::new(0.0, 0.0, -20.0)));

        // 0.4 is above the threshold but not above 1.5x with a threat present.
        rig.vitality.heal(15.0);
        rig.tick(&mut controller, 0.02, &world);
        assert_eq!(controller.mode(), BehaviorMode::Flee);

        rig.vitality.heal(10.0);
        rig.tick(&mut controller, 0.02, &world);
        assert_ne!(controller.mode(), BehaviorMode::Flee);
    }

    #[test]
    fn test_flee_moves_away_and_never_fires() {
        let world = TestWorld::default()
            .with_tank(1, Vec3::ZERO)
            .with_tank(2, Vec3::new(0.0, 0.0, 10.0));
        let mut controller = BehaviorController::new(1, precise(BehaviorMode::Guard));
        let mut rig = Rig::at(Vec3::ZERO);
        rig.vitality.apply_damage(80.0, None);

        for _ in 0..200 {
            let intent = rig.tick(&mut controller, 0.02, &world);
            assert_eq!(controller.mode(), BehaviorMode::Flee);
            assert_eq!(intent, MovementIntent::MoveTo(Vec3::new(0.0, 0.0, -20.0)));
        }
        assert!(rig.spawned.is_empty());
    }

    #[test]
    fn test_flee_without_threat_holds_while_critical() {
        let world = TestWorld::default().with_tank(1, Vec3::ZERO);
        let mut controller = BehaviorController::new(1, precise(BehaviorMode::Patrol));
        let mut rig = Rig::at(Vec3::ZERO);
        rig.vitality.apply_damage(90.0, None);

        assert_eq!(rig.tick(&mut controller, 0.02, &world), MovementIntent::Hold);
        assert_eq!(controller.mode(), BehaviorMode::Flee);
        rig.tick(&mut controller, 0.02, &world);
        assert_eq!(controller.mode(), BehaviorMode::Flee);

        // Above the threshold with no threat: episode over.
        rig.vitality.heal(25.0);
        rig.tick(&mut controller, 0.02, &world);
        assert_eq!(controller.mode(), BehaviorMode::Patrol);
    }

    #[test]
    fn test_patrol_waits_then_advances() {
        let world = TestWorld::default().with_tank(1, Vec3::ZERO);
        let points = vec![Vec3::new(1.0, 0.0, 0.0), Vec3::new(30.0, 0.0, 0.0)];
        let config = precise(BehaviorMode::Patrol).with_patrol_points(points);
        let mut controller = BehaviorController::new(1, config);
        let mut rig = Rig::at(Vec3::ZERO);

        // Already at the first waypoint.
        assert_eq!(rig.tick(&mut controller, 0.5, &world), MovementIntent::Hold);
        assert!(controller.is_waiting());

        for _ in 0..5 {
            assert_eq!(rig.tick(&mut controller, 0.5, &world), MovementIntent::Hold);
        }
        assert_eq!(
            rig.tick(&mut controller, 0.5, &world),
            MovementIntent::MoveTo(Vec3::new(30.0, 0.0, 0.0))
        );
        assert_eq!(controller.patrol_index(), 1);
        assert!(!controller.is_waiting());
    }

    #[test]
    fn test_random_patrol_never_repeats() {
        let points: Vec<Vec3> = (0..4).map(|i| Vec3::new(i as f32 * 10.0, 0.0, 0.0)).collect();
        let mut config = precise(BehaviorMode::Patrol).with_patrol_points(points);
        config.random_patrol = true;
        let mut controller = BehaviorController::new(1, config).with_seed(42);

        let mut previous = controller.patrol_index();
        for _ in 0..50 {
            controller.advance_waypoint();
            assert_ne!(controller.patrol_index(), previous);
            assert!(controller.patrol_index() < 4);
            previous = controller.patrol_index();
        }
    }

    #[test]
    fn test_damage_in_patrol_triggers_scan_and_chase() {
        let world = TestWorld::default()
            .with_tank(1, Vec3::ZERO)
            .with_tank(2, Vec3::new(0.0, 0.0, 12.0));
        let mut controller = BehaviorController::new(1, precise(BehaviorMode::Patrol));

        assert!(controller.notify_damaged(&Transform::from_yaw(Vec3::ZERO, 0.0), &world));
        assert_eq!(controller.mode(), BehaviorMode::Chase);
        assert_eq!(controller.target(), Some(2));

        // Already tracking: no rescan.
        assert!(!controller.notify_damaged(&Transform::from_yaw(Vec3::ZERO, 0.0), &world));
    }

    #[test]
    fn test_fires_when_aimed_and_respects_cooldown() {
        let world = TestWorld::default()
            .with_tank(1, Vec3::ZERO)
            .with_tank(2, Vec3::new(0.0, 0.0, 15.0));
        let mut controller = BehaviorController::new(1, precise(BehaviorMode::Guard));
        let mut rig = Rig::at(Vec3::ZERO);

        rig.tick(&mut controller, 0.02, &world);
        assert_eq!(rig.spawned.len(), 1);
        assert!(controller.last_fire_time().is_some());

        // 2s cooldown: nothing for the next 99 ticks.
        for _ in 0..99 {
            rig.tick(&mut controller, 0.02, &world);
        }
        assert_eq!(rig.spawned.len(), 1);

        rig.tick(&mut controller, 0.02, &world);
        rig.tick(&mut controller, 0.02, &world);
        assert_eq!(rig.spawned.len(), 2);
    }

    #[test]
    fn test_fires_at_exact_attack_range() {
        // Hull distance equals attack range; the raised mount is farther.
        let world = TestWorld::default()
            .with_tank(1, Vec3::ZERO)
            .with_tank(2, Vec3::new(0.0, 0.0, 20.0));
        let mut controller = BehaviorController::new(1, precise(BehaviorMode::Chase));
        let mut rig = Rig::at(Vec3::ZERO);

        let intent = rig.tick(&mut controller, 0.02, &world);

        assert_eq!(intent, MovementIntent::Face(Vec3::new(0.0, 0.0, 20.0)));
        assert!(rig.turret.position.distance(Vec3::new(0.0, 0.0, 20.0)) > 20.0);
        assert_eq!(rig.spawned.len(), 1);
    }

    #[test]
    fn test_holds_fire_until_turret_aligned() {
        // Target at 90 degrees; the turret starts facing +Z.
        let world = TestWorld::default()
            .with_tank(1, Vec3::ZERO)
            .with_tank(2, Vec3::new(15.0, 0.0, 0.0));
        let mut config = precise(BehaviorMode::Chase);
        config.turret_rotation_speed = 1.0;
        let mut controller = BehaviorController::new(1, config);
        let mut rig = Rig::at(Vec3::ZERO);

        rig.tick(&mut controller, 0.1, &world);
        assert!(rig.spawned.is_empty());
        assert!(rig.turret.yaw() > 0.0 && rig.turret.yaw() < 90.0);

        for _ in 0..30 {
            rig.tick(&mut controller, 0.1, &world);
        }
        assert_eq!(rig.spawned.len(), 1);
        assert!((rig.turret.yaw() - 90.0).abs() < 10.0);
    }

    #[test]
    fn test_initial_transient_mode_uses_configured_fallback() {
        let controller = BehaviorController::new(1, BehaviorConfig::default());
        assert_eq!(controller.mode(), BehaviorMode::Chase);
        assert_eq!(controller.fallback_mode(), BehaviorMode::Guard);
        assert!(!controller.fallback_mode().is_transient());
    }

    #[test]
    fn test_set_mode_and_patrol_points() {
        let mut controller = BehaviorController::new(1, precise(BehaviorMode::Guard));
        controller.set_mode(BehaviorMode::Ambush);
        assert_eq!(controller.mode(), BehaviorMode::Ambush);

        controller.set_mode(BehaviorMode::Flee);
        assert_eq!(controller.fallback_mode(), BehaviorMode::Ambush);

        controller.set_patrol_points(vec![Vec3::X, Vec3::Z]);
        assert_eq!(controller.patrol_index(), 0);
        assert_eq!(controller.config().patrol_points.len(), 2);
    }

    #[test]
    fn test_config_validation() {
        assert!(BehaviorConfig::default().validate().is_ok());

        let bad = BehaviorConfig {
            fallback_mode: BehaviorMode::Chase,
            ..BehaviorConfig::default()
        };
        assert!(bad.validate().is_err());

        let bad = BehaviorConfig {
            flee_threshold: 1.5,
            ..BehaviorConfig::default()
        };
        assert!(bad.validate().is_err());

        let parsed: BehaviorConfig =
            ron::from_str("(initial_mode: Patrol, patrol_points: [(1.0, 0.0, 2.0)], random_patrol: true)").unwrap();
        assert_eq!(parsed.initial_mode, BehaviorMode::Patrol);
        assert_eq!(parsed.patrol_points, vec![Vec3::new(1.0, 0.0, 2.0)]);
        assert_eq!(parsed.attack_range, 20.0);
    }
}
