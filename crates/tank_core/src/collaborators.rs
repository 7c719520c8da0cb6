//! Interfaces the combat core requires from its host world.
//!
//! The core never reaches into global state. Spatial queries, physical
//! bodies, entity lookups and the effects/audio sink are passed in
//! explicitly: effects sinks at construction (they are fire-and-forget
//! and shared behind an [`Arc`]), world queries as arguments on every
//! tick call.
//!
//! [`crate::simulation::Simulation`] provides a reference implementation
//! of every trait here; a game engine would implement them on top of its
//! own physics and scene graph.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::math::{Transform, Vec3};
use crate::vitality::Vitality;

/// Unique identifier for simulation entities.
pub type EntityId = u64;

// ============================================================================
// Layers
// ============================================================================

/// Physics layer an object lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Layer {
    /// Untagged geometry.
    #[default]
    Default,
    /// Walls, rocks and other line-of-sight blockers.
    Obstacle,
    /// Player-controlled tanks.
    Player,
    /// AI-controlled tanks.
    Enemy,
    /// Projectiles in flight.
    Hazard,
}

impl Layer {
    /// All layers, in bit order.
    pub const ALL: [Layer; 5] = [
        Layer::Default,
        Layer::Obstacle,
        Layer::Player,
        Layer::Enemy,
        Layer::Hazard,
    ];

    /// Mask containing only this layer.
    #[must_use]
    pub const fn mask(self) -> LayerMask {
        LayerMask(1 << self as u32)
    }
}

/// Bitmask of physics layers used to filter queries.
///
/// Serialized as a list of layer names so loadouts read naturally in RON:
/// `target_layers: [Player, Enemy]`.
///
/// # Example
///
/// ```
/// use tank_core::collaborators::{Layer, LayerMask};
///
/// let mask = LayerMask::PLAYER.union(LayerMask::ENEMY);
/// assert!(mask.contains_layer(Layer::Enemy));
/// assert!(!mask.contains_layer(Layer::Obstacle));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Layer>", into = "Vec<Layer>")]
pub struct LayerMask(u32);

impl LayerMask {
    /// Untagged geometry.
    pub const DEFAULT: Self = Layer::Default.mask();
    /// Line-of-sight blockers.
    pub const OBSTACLE: Self = Layer::Obstacle.mask();
    /// Player tanks.
    pub const PLAYER: Self = Layer::Player.mask();
    /// AI tanks.
    pub const ENEMY: Self = Layer::Enemy.mask();
    /// Projectiles.
    pub const HAZARD: Self = Layer::Hazard.mask();
    /// Every layer.
    pub const ALL: Self = Self(u32::MAX);

    /// Empty mask.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Check if any layer in `other` is set in `self`.
    #[inline]
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    /// Check if a single layer is set.
    #[inline]
    #[must_use]
    pub const fn contains_layer(self, layer: Layer) -> bool {
        self.intersects(layer.mask())
    }

    /// Combine two masks.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Remove the layers of `other` from this mask.
    #[inline]
    #[must_use]
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Get raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl From<Vec<Layer>> for LayerMask {
    fn from(layers: Vec<Layer>) -> Self {
        layers
            .into_iter()
            .fold(Self::empty(), |mask, layer| mask.union(layer.mask()))
    }
}

impl From<LayerMask> for Vec<Layer> {
    fn from(mask: LayerMask) -> Self {
        Layer::ALL
            .into_iter()
            .filter(|layer| mask.contains_layer(*layer))
            .collect()
    }
}

// ============================================================================
// Spatial Queries
// ============================================================================

/// First surface struck by a ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Distance from the ray origin.
    pub distance: f32,
    /// World-space contact point.
    pub point: Vec3,
    /// Surface normal at the contact point.
    pub normal: Vec3,
    /// Entity that owns the struck collider, if any.
    pub entity: Option<EntityId>,
}

/// Physics scene queries.
pub trait SpatialQuery {
    /// Every entity with a collider on `mask` overlapping the sphere.
    ///
    /// Implementations must return ids in ascending order so callers
    /// iterate deterministically.
    fn overlap_sphere(&self, center: Vec3, radius: f32, mask: LayerMask) -> Vec<EntityId>;

    /// First collider on `mask` hit by a ray. `direction` is normalized.
    fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        mask: LayerMask,
    ) -> Option<RayHit>;
}

/// Walkable-surface queries.
pub trait Navigation {
    /// Nearest walkable position within `max_distance` of `point`.
    fn sample_position(&self, point: Vec3, max_distance: f32) -> Option<Vec3>;
}

// ============================================================================
// Entities
// ============================================================================

/// A simulated rigid body.
pub trait PhysicalBody {
    /// Current linear velocity.
    fn velocity(&self) -> Vec3;

    /// Apply an instantaneous impulse at a world-space point.
    fn apply_impulse(&mut self, impulse: Vec3, point: Vec3);

    /// Apply an explosion impulse that falls off over `radius`.
    ///
    /// `upwards_modifier` lifts the effective explosion origin below the
    /// body so blasts throw objects up as well as out.
    fn apply_explosive_impulse(&mut self, force: f32, origin: Vec3, radius: f32, upwards_modifier: f32);
}

/// Read access to entities by id.
pub trait EntityDirectory {
    /// World transform, or `None` if the entity no longer exists.
    fn transform(&self, id: EntityId) -> Option<Transform>;

    /// Linear velocity, or `None` if the entity has no physical body.
    fn velocity(&self, id: EntityId) -> Option<Vec3>;

    /// Whether the entity exists and may be selected as a target.
    fn is_targetable(&self, id: EntityId) -> bool;
}

/// Write access to the components hazards act upon.
pub trait EntityDirectoryMut: EntityDirectory {
    /// Health tracker of an entity, if it has one.
    fn vitality_mut(&mut self, id: EntityId) -> Option<&mut Vitality>;

    /// Physical body of an entity, if it has one.
    fn body_mut(&mut self, id: EntityId) -> Option<&mut dyn PhysicalBody>;
}

// ============================================================================
// Effects
// ============================================================================

/// Where an effect plays.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EffectAnchor {
    /// Fixed world position.
    Point(Vec3),
    /// Attached to an entity, resolved by the sink.
    Entity(EntityId),
}

/// Fire-and-forget sound and visual effect requests.
///
/// Methods take `&self` so one sink can be shared by many components.
pub trait EffectsSink: Send + Sync + fmt::Debug {
    /// Play a sound cue.
    fn play_sound(&self, cue: &str, anchor: EffectAnchor);

    /// Spawn a visual effect that lives for `duration` seconds.
    fn spawn_effect(&self, effect: &str, anchor: EffectAnchor, duration: f32);
}

/// Sink that discards every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEffects;

impl EffectsSink for NullEffects {
    fn play_sound(&self, _cue: &str, _anchor: EffectAnchor) {}

    fn spawn_effect(&self, _effect: &str, _anchor: EffectAnchor, _duration: f32) {}
}

/// Shared handle to a sink that discards everything.
#[must_use]
pub fn null_effects() -> Arc<dyn EffectsSink> {
    Arc::new(NullEffects)
}

/// A recorded effect request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EffectRequest {
    /// A sound cue.
    Sound {
        /// Cue name.
        cue: String,
        /// Where it plays.
        anchor: EffectAnchor,
    },
    /// A timed visual effect.
    Visual {
        /// Effect name.
        effect: String,
        /// Where it spawns.
        anchor: EffectAnchor,
        /// Lifetime in seconds.
        duration: f32,
    },
}

impl EffectRequest {
    /// Name of the cue or effect.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Sound { cue, .. } => cue,
            Self::Visual { effect, .. } => effect,
        }
    }
}

/// Sink that records requests until drained.
///
/// Used by the simulation to hand effect requests to the presentation
/// layer once per tick, and by tests to observe side effects.
#[derive(Debug, Default)]
pub struct EffectsLog {
    requests: Mutex<Vec<EffectRequest>>,
}

impl EffectsLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every recorded request.
    pub fn drain(&self) -> Vec<EffectRequest> {
        std::mem::take(&mut *self.lock())
    }

    /// Number of requests waiting to be drained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no requests are waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count recorded requests with the given name.
    #[must_use]
    pub fn count(&self, name: &str) -> usize {
        self.lock().iter().filter(|r| r.name() == name).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<EffectRequest>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EffectsSink for EffectsLog {
    fn play_sound(&self, cue: &str, anchor: EffectAnchor) {
        self.lock().push(EffectRequest::Sound {
            cue: cue.to_string(),
            anchor,
        });
    }

    fn spawn_effect(&self, effect: &str, anchor: EffectAnchor, duration: f32) {
        self.lock().push(EffectRequest::Visual {
            effect: effect.to_string(),
            anchor,
            duration,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_mask_ops() {
        let mask = LayerMask::PLAYER.union(LayerMask::ENEMY);
        assert!(mask.contains_layer(Layer::Player));
        assert!(mask.contains_layer(Layer::Enemy));
        assert!(!mask.contains_layer(Layer::Obstacle));
        assert!(!mask.without(LayerMask::ENEMY).contains_layer(Layer::Enemy));
        assert!(LayerMask::ALL.contains_layer(Layer::Hazard));
        assert!(!LayerMask::empty().intersects(LayerMask::ALL));
    }

    #[test]
    fn test_layer_mask_ron_names() {
        let mask: LayerMask = ron::from_str("[Player, Obstacle]").unwrap();
        assert_eq!(mask, LayerMask::PLAYER.union(LayerMask::OBSTACLE));

        let text = ron::to_string(&LayerMask::ENEMY).unwrap();
        assert_eq!(text, "[Enemy]");
    }

    #[test]
    fn test_effects_log_records_and_drains() {
        let log = EffectsLog::new();
        log.play_sound("cannon_fire", EffectAnchor::Entity(3));
        log.spawn_effect("explosion", EffectAnchor::Point(Vec3::ZERO), 3.0);
        log.play_sound("cannon_fire", EffectAnchor::Entity(4));

        assert_eq!(log.len(), 3);
        assert_eq!(log.count("cannon_fire"), 2);

        let drained = log.drain();
        assert_eq!(drained.len(), 3);
        assert!(log.is_empty());
        assert_eq!(drained[1].name(), "explosion");
    }
}
