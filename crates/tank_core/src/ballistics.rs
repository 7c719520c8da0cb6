//! Projectile lifecycle: spawning, flight, and one-shot resolution.
//!
//! The [`BallisticResolver`] owns every [`Hazard`] in flight. Each tick
//! it sweeps hazards along their velocity with a raycast, resolving the
//! first contact that is not the hazard's owner, and expires hazards that
//! outlive their lifetime.
//!
//! # Resolution Modes
//!
//! - **Direct**: non-explosive hazards (or explosive ones with no radius)
//!   apply their full damage to the struck entity and push it along the
//!   travel direction.
//! - **Burst**: explosive hazards query a sphere around the resolution
//!   point and apply `damage * (1 - clamp01(distance / radius))` to every
//!   entity found, plus an explosive impulse to every physical body.
//!
//! A hazard resolves at most once; anything reported after that is
//! ignored.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::collaborators::{
    null_effects, EffectAnchor, EffectsSink, EntityDirectoryMut, EntityId, LayerMask, RayHit,
    SpatialQuery,
};
use crate::math::{clamp01, Vec3, EPSILON};

/// Unique identifier for hazards in flight.
pub type HazardId = u64;

/// How far past an owner hit a sweep restarts.
const SWEEP_SKIP: f32 = 0.01;

/// Maximum owner colliders skipped per sweep.
const MAX_SWEEP_SKIPS: usize = 4;

/// Everything needed to launch a hazard.
#[derive(Debug, Clone, PartialEq)]
pub struct HazardSpec {
    /// Entity that fired it. Never damaged by its own hazard.
    pub owner: EntityId,
    /// Launch position.
    pub position: Vec3,
    /// Launch velocity.
    pub velocity: Vec3,
    /// Damage at the point of impact.
    pub damage: f32,
    /// Seconds before expiry.
    pub lifetime: f32,
    /// Splash radius (0 = no splash).
    pub explosion_radius: f32,
    /// Bursts on impact.
    pub explosive: bool,
    /// Bursts when the lifetime runs out.
    pub explode_on_expiry: bool,
    /// Projectile model id.
    pub model: String,
    /// Sound for direct impacts.
    pub impact_sound: Option<String>,
    /// Effect for bursts.
    pub explosion_effect: Option<String>,
}

/// Receives launch requests from weapons.
pub trait HazardSpawner {
    /// Launch a hazard and return its id.
    fn spawn_hazard(&mut self, spec: HazardSpec) -> HazardId;
}

/// Collects specs without simulating them.
impl HazardSpawner for Vec<HazardSpec> {
    fn spawn_hazard(&mut self, spec: HazardSpec) -> HazardId {
        self.push(spec);
        self.len() as HazardId
    }
}

// ============================================================================
// Hazards
// ============================================================================

/// A projectile in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct Hazard {
    id: HazardId,
    spec: HazardSpec,
    position: Vec3,
    age: f32,
    resolved: bool,
}

impl Hazard {
    fn new(id: HazardId, spec: HazardSpec) -> Self {
        Self {
            id,
            position: spec.position,
            spec,
            age: 0.0,
            resolved: false,
        }
    }

    /// Hazard id.
    #[must_use]
    pub const fn id(&self) -> HazardId {
        self.id
    }

    /// Entity that fired it.
    #[must_use]
    pub const fn owner(&self) -> EntityId {
        self.spec.owner
    }

    /// Current position.
    #[must_use]
    pub const fn position(&self) -> Vec3 {
        self.position
    }

    /// Current velocity.
    #[must_use]
    pub const fn velocity(&self) -> Vec3 {
        self.spec.velocity
    }

    /// Seconds since launch.
    #[must_use]
    pub const fn age(&self) -> f32 {
        self.age
    }

    /// Launch parameters.
    #[must_use]
    pub const fn spec(&self) -> &HazardSpec {
        &self.spec
    }

    /// Whether the hazard has already resolved.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Whether contacts resolve as a burst.
    #[must_use]
    pub fn bursts(&self) -> bool {
        self.spec.explosive && self.spec.explosion_radius > 0.0
    }
}

// ============================================================================
// Resolution Reports
// ============================================================================

/// What set off a burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BurstCause {
    /// Contact with a collider.
    Impact,
    /// Lifetime ran out.
    Expiry,
}

/// How a hazard left the world.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ResolutionKind {
    /// Struck a collider without bursting.
    DirectHit {
        /// Entity struck, `None` for static geometry.
        target: Option<EntityId>,
    },
    /// Area burst.
    Burst {
        /// What set it off.
        cause: BurstCause,
    },
    /// Lifetime ran out with nothing to resolve.
    Expired,
}

/// Damage one entity took from a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitRecord {
    /// Entity hit.
    pub target: EntityId,
    /// Damage offered before armor.
    pub raw: f32,
    /// Damage the target's vitality accepted.
    pub applied: f32,
    /// Distance from the resolution point.
    pub distance: f32,
}

/// Outcome of resolving one hazard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// Hazard that resolved.
    pub hazard: HazardId,
    /// Entity that fired it.
    pub owner: EntityId,
    /// Where it resolved.
    pub point: Vec3,
    /// How it resolved.
    pub kind: ResolutionKind,
    /// Damage dealt.
    pub hits: Vec<HitRecord>,
}

/// A collision reported for a hazard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// Hazard that collided.
    pub hazard: HazardId,
    /// Entity struck, `None` for static geometry.
    pub entity: Option<EntityId>,
    /// Contact point.
    pub point: Vec3,
}

// ============================================================================
// Resolver
// ============================================================================

/// Tunables shared by every hazard.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallisticsConfig {
    /// Explosive force per point of damage.
    #[serde(default = "default_explosion_force_scale")]
    pub explosion_force_scale: f32,
    /// Upwards modifier passed to explosive impulses.
    #[serde(default = "default_explosion_upwards_modifier")]
    pub explosion_upwards_modifier: f32,
    /// Lifetime of burst effects in seconds.
    #[serde(default = "default_explosion_effect_duration")]
    pub explosion_effect_duration: f32,
    /// Layers hazards collide with.
    #[serde(default = "default_collision_mask")]
    pub collision_mask: LayerMask,
    /// Layers bursts damage.
    #[serde(default = "default_burst_mask")]
    pub burst_mask: LayerMask,
}

const fn default_explosion_force_scale() -> f32 {
    10.0
}

const fn default_explosion_upwards_modifier() -> f32 {
    1.0
}

const fn default_explosion_effect_duration() -> f32 {
    3.0
}

const fn default_collision_mask() -> LayerMask {
    LayerMask::ALL.without(LayerMask::HAZARD)
}

const fn default_burst_mask() -> LayerMask {
    LayerMask::PLAYER
        .union(LayerMask::ENEMY)
        .union(LayerMask::DEFAULT)
}

impl Default for BallisticsConfig {
    fn default() -> Self {
        Self {
            explosion_force_scale: default_explosion_force_scale(),
            explosion_upwards_modifier: default_explosion_upwards_modifier(),
            explosion_effect_duration: default_explosion_effect_duration(),
            collision_mask: default_collision_mask(),
            burst_mask: default_burst_mask(),
        }
    }
}

/// Owns and resolves every hazard in flight.
#[derive(Debug, Clone)]
pub struct BallisticResolver {
    config: BallisticsConfig,
    hazards: Vec<Hazard>,
    next_id: HazardId,
    effects: Arc<dyn EffectsSink>,
}

impl Default for BallisticResolver {
    fn default() -> Self {
        Self::new(BallisticsConfig::default())
    }
}

impl HazardSpawner for BallisticResolver {
    fn spawn_hazard(&mut self, spec: HazardSpec) -> HazardId {
        let id = self.next_id;
        self.next_id += 1;
        tracing::trace!(hazard = id, owner = spec.owner, model = %spec.model, "Hazard spawned");
        self.hazards.push(Hazard::new(id, spec));
        id
    }
}

impl BallisticResolver {
    /// Create an empty resolver.
    #[must_use]
    pub fn new(config: BallisticsConfig) -> Self {
        Self {
            config,
            hazards: Vec::new(),
            next_id: 1,
            effects: null_effects(),
        }
    }

    /// Builder method to attach an effects sink.
    #[must_use]
    pub fn with_effects(mut self, effects: Arc<dyn EffectsSink>) -> Self {
        self.effects = effects;
        self
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &BallisticsConfig {
        &self.config
    }

    /// Hazards in flight, in launch order.
    #[must_use]
    pub fn hazards(&self) -> &[Hazard] {
        &self.hazards
    }

    /// Get a hazard by id.
    #[must_use]
    pub fn get(&self, id: HazardId) -> Option<&Hazard> {
        self.hazards.iter().find(|h| h.id == id)
    }

    /// Number of hazards in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hazards.len()
    }

    /// Whether nothing is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hazards.is_empty()
    }

    /// Advance every hazard by `dt` seconds.
    ///
    /// Hazards move along their velocity; the first non-owner collider on
    /// the swept segment resolves them. Hazards that reach their lifetime
    /// without contact expire. Resolved hazards are removed before this
    /// returns.
    pub fn advance<W>(&mut self, dt: f32, world: &mut W) -> Vec<Resolution>
    where
        W: SpatialQuery + EntityDirectoryMut,
    {
        let mut resolutions = Vec::new();

        for hazard in &mut self.hazards {
            if hazard.resolved {
                continue;
            }

            let step = hazard.spec.velocity * dt;
            let length = step.length();
            if length > EPSILON {
                let direction = step / length;
                if let Some(hit) = sweep(
                    world,
                    hazard.spec.owner,
                    hazard.position,
                    direction,
                    length,
                    self.config.collision_mask,
                ) {
                    hazard.position = hit.point;
                    let contact = Contact {
                        hazard: hazard.id,
                        entity: hit.entity,
                        point: hit.point,
                    };
                    resolutions.push(resolve_contact(
                        hazard,
                        contact,
                        &self.config,
                        self.effects.as_ref(),
                        world,
                    ));
                    continue;
                }
            }

            hazard.position += step;
            hazard.age += dt;
            if hazard.age >= hazard.spec.lifetime {
                resolutions.push(resolve_expiry(
                    hazard,
                    &self.config,
                    self.effects.as_ref(),
                    world,
                ));
            }
        }

        self.hazards.retain(|h| !h.resolved);
        resolutions
    }

    /// Resolve a contact reported by an external physics engine.
    ///
    /// Returns `None` if the hazard is unknown, already resolved, or the
    /// contact is with its owner.
    pub fn report_contact<W>(&mut self, contact: Contact, world: &mut W) -> Option<Resolution>
    where
        W: SpatialQuery + EntityDirectoryMut,
    {
        let hazard = self
            .hazards
            .iter_mut()
            .find(|h| h.id == contact.hazard && !h.resolved)?;
        if contact.entity == Some(hazard.spec.owner) {
            return None;
        }

        hazard.position = contact.point;
        let resolution = resolve_contact(
            hazard,
            contact,
            &self.config,
            self.effects.as_ref(),
            world,
        );
        self.hazards.retain(|h| !h.resolved);
        Some(resolution)
    }
}

/// Raycast along a segment, skipping the owner's colliders.
fn sweep<W: SpatialQuery>(
    world: &W,
    owner: EntityId,
    from: Vec3,
    direction: Vec3,
    distance: f32,
    mask: LayerMask,
) -> Option<RayHit> {
    let mut origin = from;
    let mut remaining = distance;

    for _ in 0..MAX_SWEEP_SKIPS {
        let hit = world.raycast(origin, direction, remaining, mask)?;
        if hit.entity != Some(owner) {
            return Some(hit);
        }
        let skip = hit.distance + SWEEP_SKIP;
        origin += direction * skip;
        remaining -= skip;
        if remaining <= 0.0 {
            return None;
        }
    }

    None
}

fn resolve_contact<W>(
    hazard: &mut Hazard,
    contact: Contact,
    config: &BallisticsConfig,
    effects: &dyn EffectsSink,
    world: &mut W,
) -> Resolution
where
    W: SpatialQuery + EntityDirectoryMut,
{
    if hazard.bursts() {
        return burst(hazard, contact.point, BurstCause::Impact, config, effects, world);
    }

    hazard.resolved = true;
    let damage = hazard.spec.damage;
    let direction = hazard.spec.velocity.normalize_or_zero();
    let mut hits = Vec::new();

    if let Some(target) = contact.entity {
        let local_direction = world
            .transform(target)
            .map(|t| t.inverse_transform_direction(direction));
        if let Some(vitality) = world.vitality_mut(target) {
            let applied = vitality.apply_damage(damage, local_direction);
            hits.push(HitRecord {
                target,
                raw: damage,
                applied,
                distance: 0.0,
            });
        }
        if let Some(body) = world.body_mut(target) {
            body.apply_impulse(direction * damage, contact.point);
        }
    }

    if let Some(sound) = &hazard.spec.impact_sound {
        effects.play_sound(sound, EffectAnchor::Point(contact.point));
    }

    tracing::debug!(
        hazard = hazard.id,
        owner = hazard.spec.owner,
        target = ?contact.entity,
        "Hazard struck"
    );

    Resolution {
        hazard: hazard.id,
        owner: hazard.spec.owner,
        point: contact.point,
        kind: ResolutionKind::DirectHit {
            target: contact.entity,
        },
        hits,
    }
}

fn resolve_expiry<W>(
    hazard: &mut Hazard,
    config: &BallisticsConfig,
    effects: &dyn EffectsSink,
    world: &mut W,
) -> Resolution
where
    W: SpatialQuery + EntityDirectoryMut,
{
    if hazard.bursts() && hazard.spec.explode_on_expiry {
        let point = hazard.position;
        return burst(hazard, point, BurstCause::Expiry, config, effects, world);
    }

    hazard.resolved = true;
    tracing::trace!(hazard = hazard.id, "Hazard expired");
    Resolution {
        hazard: hazard.id,
        owner: hazard.spec.owner,
        point: hazard.position,
        kind: ResolutionKind::Expired,
        hits: Vec::new(),
    }
}

fn burst<W>(
    hazard: &mut Hazard,
    center: Vec3,
    cause: BurstCause,
    config: &BallisticsConfig,
    effects: &dyn EffectsSink,
    world: &mut W,
) -> Resolution
where
    W: SpatialQuery + EntityDirectoryMut,
{
    hazard.resolved = true;
    let damage = hazard.spec.damage;
    let radius = hazard.spec.explosion_radius;
    let owner = hazard.spec.owner;
    let mut hits = Vec::new();

    for target in world.overlap_sphere(center, radius, config.burst_mask) {
        if target == owner {
            continue;
        }
        // Removed since the query; skip it and keep going.
        let Some(transform) = world.transform(target) else {
            continue;
        };

        let distance = center.distance(transform.position);
        let amount = damage * (1.0 - clamp01(distance / radius));
        if amount > 0.0 {
            if let Some(vitality) = world.vitality_mut(target) {
                let applied = vitality.apply_damage(amount, None);
                hits.push(HitRecord {
                    target,
                    raw: amount,
                    applied,
                    distance,
                });
            }
        }
        if let Some(body) = world.body_mut(target) {
            body.apply_explosive_impulse(
                damage * config.explosion_force_scale,
                center,
                radius,
                config.explosion_upwards_modifier,
            );
        }
    }

    if let Some(effect) = &hazard.spec.explosion_effect {
        effects.spawn_effect(
            effect,
            EffectAnchor::Point(center),
            config.explosion_effect_duration,
        );
    }

    tracing::debug!(
        hazard = hazard.id,
        owner,
        ?cause,
        hits = hits.len(),
        "Hazard burst"
    );

    Resolution {
        hazard: hazard.id,
        owner,
        point: center,
        kind: ResolutionKind::Burst { cause },
        hits,
    }
}
