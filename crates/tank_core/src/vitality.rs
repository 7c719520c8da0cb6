//! Per-entity health and armor tracking.
//!
//! A [`Vitality`] owns current/max health, the post-hit invulnerability
//! window, the damage flash timer and the death transition. All timers are
//! countdowns advanced by [`Vitality::tick`]; nothing blocks.
//!
//! Outward notifications are buffered as [`VitalityEvent`]s and collected
//! by the owner with [`Vitality::drain_events`].

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::collaborators::{null_effects, EffectAnchor, EffectsSink, EntityId};
use crate::damage::{effective_damage, ArmorProfile};
use crate::error::{ensure_fraction, ensure_non_negative, ensure_positive, Result};
use crate::math::Vec3;

// ============================================================================
// Configuration
// ============================================================================

/// Items that may drop when an entity dies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropTable {
    /// Probability in `[0, 1]` that anything drops.
    #[serde(default = "default_drop_chance")]
    pub chance: f32,
    /// Candidate item ids, picked uniformly.
    #[serde(default)]
    pub items: Vec<String>,
}

const fn default_drop_chance() -> f32 {
    0.5
}

impl DropTable {
    /// Roll for a drop.
    ///
    /// Succeeds when a uniform draw is at most [`chance`](Self::chance),
    /// then picks one item uniformly.
    pub fn roll<R: Rng>(&self, rng: &mut R) -> Option<&str> {
        if self.items.is_empty() {
            return None;
        }
        if rng.gen::<f32>() > self.chance {
            return None;
        }
        let index = rng.gen_range(0..self.items.len());
        Some(self.items[index].as_str())
    }
}

/// What happens when health reaches zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeathConfig {
    /// Whether the entity is removed from the world after dying.
    #[serde(default = "default_true")]
    pub destroy_on_death: bool,
    /// Seconds between death and removal.
    #[serde(default = "default_destroy_delay")]
    pub destroy_delay: f32,
    /// Visual effect spawned on death.
    #[serde(default)]
    pub effect: Option<String>,
    /// Lifetime of the death effect in seconds.
    #[serde(default = "default_death_effect_duration")]
    pub effect_duration: f32,
    /// Sound played on death.
    #[serde(default)]
    pub sound: Option<String>,
    /// Optional item drop.
    #[serde(default)]
    pub drops: Option<DropTable>,
}

const fn default_true() -> bool {
    true
}

const fn default_destroy_delay() -> f32 {
    2.0
}

const fn default_death_effect_duration() -> f32 {
    5.0
}

impl Default for DeathConfig {
    fn default() -> Self {
        Self {
            destroy_on_death: true,
            destroy_delay: default_destroy_delay(),
            effect: None,
            effect_duration: default_death_effect_duration(),
            sound: None,
            drops: None,
        }
    }
}

/// Health and armor configuration for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalityConfig {
    /// Maximum (and starting) health.
    #[serde(default = "default_max_health")]
    pub max_health: f32,
    /// Seconds of immunity after each damaging hit.
    #[serde(default = "default_invulnerability_time")]
    pub invulnerability_time: f32,
    /// Armor applied to incoming hits.
    #[serde(default)]
    pub armor: ArmorProfile,
    /// Seconds the hull flashes after a hit.
    #[serde(default = "default_flash_time")]
    pub flash_time: f32,
    /// Visual effect spawned on each damaging hit.
    #[serde(default)]
    pub damage_effect: Option<String>,
    /// Sound played on each damaging hit.
    #[serde(default)]
    pub damage_sound: Option<String>,
    /// Death behavior.
    #[serde(default)]
    pub death: DeathConfig,
}

const fn default_max_health() -> f32 {
    100.0
}

const fn default_invulnerability_time() -> f32 {
    0.5
}

const fn default_flash_time() -> f32 {
    0.1
}

/// Lifetime of the per-hit damage effect.
const DAMAGE_EFFECT_DURATION: f32 = 2.0;

impl Default for VitalityConfig {
    fn default() -> Self {
        Self {
            max_health: default_max_health(),
            invulnerability_time: default_invulnerability_time(),
            armor: ArmorProfile::default(),
            flash_time: default_flash_time(),
            damage_effect: None,
            damage_sound: None,
            death: DeathConfig::default(),
        }
    }
}

impl VitalityConfig {
    /// Create a config with the given max health and defaults elsewhere.
    #[must_use]
    pub fn with_max_health(max_health: f32) -> Self {
        Self {
            max_health,
            ..Self::default()
        }
    }

    /// Builder method to set armor.
    #[must_use]
    pub fn with_armor(mut self, armor: ArmorProfile) -> Self {
        self.armor = armor;
        self
    }

    /// Builder method to set the post-hit invulnerability window.
    #[must_use]
    pub fn with_invulnerability_time(mut self, seconds: f32) -> Self {
        self.invulnerability_time = seconds;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        ensure_positive("vitality.max_health", self.max_health)?;
        ensure_non_negative("vitality.invulnerability_time", self.invulnerability_time)?;
        ensure_non_negative("vitality.flash_time", self.flash_time)?;
        ensure_non_negative("vitality.death.destroy_delay", self.death.destroy_delay)?;
        if let Some(drops) = &self.death.drops {
            ensure_fraction("vitality.death.drops.chance", drops.chance)?;
        }
        self.armor.validate()
    }
}

// ============================================================================
// Vitality Events
// ============================================================================

/// Notifications emitted by a [`Vitality`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VitalityEvent {
    /// Health changed.
    HealthChanged {
        /// Health after the change.
        current: f32,
        /// Max health after the change.
        max: f32,
    },
    /// A hit got through.
    Damaged {
        /// Effective damage after armor.
        amount: f32,
    },
    /// Health was restored.
    Healed {
        /// Health actually restored.
        amount: f32,
    },
    /// Health reached zero. Emitted exactly once.
    Died,
    /// The death roll produced an item.
    ItemDropped {
        /// Dropped item id.
        item: String,
    },
    /// The post-death delay elapsed; the entity should leave the world.
    RemovalDue,
}

// ============================================================================
// Vitality
// ============================================================================

/// Health state of one entity.
///
/// # Example
///
/// ```
/// use tank_core::damage::ArmorProfile;
/// use tank_core::vitality::{Vitality, VitalityConfig};
///
/// let config = VitalityConfig::with_max_health(100.0).with_armor(ArmorProfile::new(10.0, 0.5));
/// let mut vitality = Vitality::new(1, config);
///
/// assert_eq!(vitality.apply_damage(20.0, None), 15.0);
/// assert_eq!(vitality.current_health(), 85.0);
///
/// // Second hit lands inside the invulnerability window
/// assert_eq!(vitality.apply_damage(20.0, None), 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct Vitality {
    owner: EntityId,
    config: VitalityConfig,
    current_health: f32,
    invulnerable: bool,
    invulnerability_remaining: f32,
    flash_remaining: f32,
    dead: bool,
    removal_countdown: Option<f32>,
    removal_due: bool,
    effects: Arc<dyn EffectsSink>,
    rng: ChaCha8Rng,
    events: Vec<VitalityEvent>,
}

impl Vitality {
    /// Create a vitality at full health.
    #[must_use]
    pub fn new(owner: EntityId, config: VitalityConfig) -> Self {
        Self {
            owner,
            current_health: config.max_health,
            config,
            invulnerable: false,
            invulnerability_remaining: 0.0,
            flash_remaining: 0.0,
            dead: false,
            removal_countdown: None,
            removal_due: false,
            effects: null_effects(),
            rng: ChaCha8Rng::seed_from_u64(owner),
            events: Vec::new(),
        }
    }

    /// Builder method to attach an effects sink.
    #[must_use]
    pub fn with_effects(mut self, effects: Arc<dyn EffectsSink>) -> Self {
        self.effects = effects;
        self
    }

    /// Builder method to reseed the drop roll.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self
    }

    /// Entity this vitality belongs to.
    #[must_use]
    pub const fn owner(&self) -> EntityId {
        self.owner
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &VitalityConfig {
        &self.config
    }

    /// Current health.
    #[must_use]
    pub const fn current_health(&self) -> f32 {
        self.current_health
    }

    /// Maximum health.
    #[must_use]
    pub const fn max_health(&self) -> f32 {
        self.config.max_health
    }

    /// Current health as a fraction of max.
    #[must_use]
    pub fn health_fraction(&self) -> f32 {
        self.current_health / self.config.max_health
    }

    /// Whether the entity has died.
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.dead
    }

    /// Whether hits are currently ignored.
    #[must_use]
    pub fn is_invulnerable(&self) -> bool {
        self.invulnerable || self.invulnerability_remaining > 0.0
    }

    /// Whether the damage flash is showing.
    #[must_use]
    pub fn is_flashing(&self) -> bool {
        self.flash_remaining > 0.0
    }

    /// Whether the entity still takes part in collisions.
    #[must_use]
    pub const fn is_collidable(&self) -> bool {
        !self.dead
    }

    /// Whether the post-death delay has elapsed.
    #[must_use]
    pub const fn is_removal_due(&self) -> bool {
        self.removal_due
    }

    /// Toggle global invulnerability (independent of the post-hit window).
    pub fn set_invulnerable(&mut self, invulnerable: bool) {
        self.invulnerable = invulnerable;
    }

    /// Apply a hit and return the effective damage it dealt.
    ///
    /// Returns 0 without changing state while dead or invulnerable, or
    /// when `raw` is not a positive number. `local_hit_direction` is the hit's travel direction in this
    /// entity's local frame and only matters for directional armor. The
    /// returned amount is not clamped to remaining health.
    pub fn apply_damage(&mut self, raw: f32, local_hit_direction: Option<Vec3>) -> f32 {
        if self.dead || self.is_invulnerable() || raw.is_nan() || raw <= 0.0 {
            return 0.0;
        }

        let actual = effective_damage(raw, &self.config.armor, local_hit_direction);
        self.current_health = (self.current_health - actual).max(0.0);

        self.events.push(VitalityEvent::HealthChanged {
            current: self.current_health,
            max: self.config.max_health,
        });
        self.events.push(VitalityEvent::Damaged { amount: actual });

        if actual > 0.0 {
            self.invulnerability_remaining = self.config.invulnerability_time;
            self.flash_remaining = self.config.flash_time;
            self.play_damage_feedback();
        }

        if self.current_health <= 0.0 {
            self.die();
        }

        actual
    }

    /// Restore health and return the amount actually restored.
    ///
    /// No-op while dead. Clamped at max health.
    pub fn heal(&mut self, amount: f32) -> f32 {
        if self.dead || amount <= 0.0 {
            return 0.0;
        }

        let actual = amount.min(self.config.max_health - self.current_health);
        if actual <= 0.0 {
            return 0.0;
        }

        self.current_health += actual;
        self.events.push(VitalityEvent::HealthChanged {
            current: self.current_health,
            max: self.config.max_health,
        });
        self.events.push(VitalityEvent::Healed { amount: actual });
        actual
    }

    /// Change max health.
    ///
    /// With `full_heal` the entity is restored to the new max; otherwise
    /// current health is clamped to it. Dead entities keep zero health.
    /// Non-positive values are ignored.
    pub fn set_max_health(&mut self, max_health: f32, full_heal: bool) {
        if max_health <= 0.0 {
            return;
        }

        self.config.max_health = max_health;
        if !self.dead {
            self.current_health = if full_heal {
                max_health
            } else {
                self.current_health.min(max_health)
            };
        }

        self.events.push(VitalityEvent::HealthChanged {
            current: self.current_health,
            max: self.config.max_health,
        });
    }

    /// Advance timers by `dt` seconds of simulation time.
    pub fn tick(&mut self, dt: f32) {
        self.invulnerability_remaining = (self.invulnerability_remaining - dt).max(0.0);
        self.flash_remaining = (self.flash_remaining - dt).max(0.0);

        if let Some(remaining) = self.removal_countdown.as_mut() {
            *remaining -= dt;
            if *remaining <= 0.0 {
                self.removal_countdown = None;
                self.removal_due = true;
                self.events.push(VitalityEvent::RemovalDue);
            }
        }
    }

    /// Take every buffered notification.
    pub fn drain_events(&mut self) -> Vec<VitalityEvent> {
        std::mem::take(&mut self.events)
    }

    fn play_damage_feedback(&self) {
        let anchor = EffectAnchor::Entity(self.owner);
        if let Some(effect) = &self.config.damage_effect {
            self.effects
                .spawn_effect(effect, anchor, DAMAGE_EFFECT_DURATION);
        }
        if let Some(sound) = &self.config.damage_sound {
            self.effects.play_sound(sound, anchor);
        }
    }

    fn die(&mut self) {
        if self.dead {
            return;
        }

        self.dead = true;
        self.current_health = 0.0;
        self.invulnerability_remaining = 0.0;
        self.events.push(VitalityEvent::Died);
        tracing::debug!(entity = self.owner, "Entity destroyed");

        let death = &self.config.death;
        let anchor = EffectAnchor::Entity(self.owner);
        if let Some(effect) = &death.effect {
            self.effects
                .spawn_effect(effect, anchor, death.effect_duration);
        }
        if let Some(sound) = &death.sound {
            self.effects.play_sound(sound, anchor);
        }

        if let Some(drops) = &death.drops {
            if let Some(item) = drops.roll(&mut self.rng) {
                tracing::debug!(entity = self.owner, item, "Item dropped");
                self.events.push(VitalityEvent::ItemDropped {
                    item: item.to_string(),
                });
            }
        }

        if death.destroy_on_death {
            self.removal_countdown = Some(death.destroy_delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::EffectsLog;
    use crate::damage::DirectionalArmor;

    fn armored(rating: f32) -> Vitality {
        Vitality::new(
            1,
            VitalityConfig::with_max_health(100.0).with_armor(ArmorProfile::new(rating, 0.5)),
        )
    }

    #[test]
    fn test_spawns_at_full_health() {
        let vitality = Vitality::new(1, VitalityConfig::default());
        assert_eq!(vitality.current_health(), 100.0);
        assert_eq!(vitality.health_fraction(), 1.0);
        assert!(!vitality.is_dead());
    }

    #[test]
    fn test_unarmored_takes_raw_damage() {
        let mut vitality = armored(0.0);
        assert_eq!(vitality.apply_damage(37.5, None), 37.5);
        assert_eq!(vitality.current_health(), 62.5);
    }

    #[test]
    fn test_armor_reduction_example() {
        let mut vitality = armored(10.0);
        assert_eq!(vitality.apply_damage(20.0, None), 15.0);
        assert_eq!(vitality.current_health(), 85.0);
    }

    #[test]
    fn test_invulnerability_window() {
        let mut vitality = armored(0.0);
        assert_eq!(vitality.apply_damage(10.0, None), 10.0);
        assert!(vitality.is_invulnerable());
        assert_eq!(vitality.apply_damage(10.0, None), 0.0);
        assert_eq!(vitality.current_health(), 90.0);

        vitality.tick(0.25);
        assert_eq!(vitality.apply_damage(10.0, None), 0.0);

        vitality.tick(0.25);
        assert!(!vitality.is_invulnerable());
        assert_eq!(vitality.apply_damage(10.0, None), 10.0);
    }

    #[test]
    fn test_global_invulnerability() {
        let mut vitality = armored(0.0);
        vitality.set_invulnerable(true);
        assert_eq!(vitality.apply_damage(50.0, None), 0.0);
        assert!(vitality.drain_events().is_empty());

        vitality.set_invulnerable(false);
        assert_eq!(vitality.apply_damage(50.0, None), 50.0);
    }

    #[test]
    fn test_directional_hit_from_behind() {
        let config = VitalityConfig::with_max_health(100.0).with_armor(
            ArmorProfile::new(10.0, 0.5).with_directional(DirectionalArmor::default()),
        );
        let mut rear = Vitality::new(1, config.clone());
        let mut front = Vitality::new(2, config);

        // 20 * 1.5 - 5 = 25, 20 * 0.75 - 5 = 10
        assert_eq!(rear.apply_damage(20.0, Some(Vec3::Z)), 25.0);
        assert_eq!(front.apply_damage(20.0, Some(-Vec3::Z)), 10.0);
    }

    #[test]
    fn test_non_positive_damage_is_ignored() {
        for raw in [0.0, -50.0, f32::NAN, f32::NEG_INFINITY] {
            let mut bare = armored(0.0);
            let mut plated = armored(10.0);

            assert_eq!(bare.apply_damage(raw, None), 0.0);
            assert_eq!(plated.apply_damage(raw, Some(Vec3::Z)), 0.0);
            assert_eq!(bare.current_health(), 100.0);
            assert_eq!(plated.current_health(), 100.0);
            assert!(bare.drain_events().is_empty());
            assert!(!bare.is_invulnerable());
        }
    }

    #[test]
    fn test_damage_events() {
        let mut vitality = armored(10.0);
        vitality.apply_damage(20.0, None);

        let events = vitality.drain_events();
        assert_eq!(
            events,
            vec![
                VitalityEvent::HealthChanged {
                    current: 85.0,
                    max: 100.0
                },
                VitalityEvent::Damaged { amount: 15.0 },
            ]
        );
        assert!(vitality.drain_events().is_empty());
    }

    #[test]
    fn test_death_is_terminal_and_fires_once() {
        let mut vitality = armored(0.0).with_effects(null_effects());
        vitality.apply_damage(150.0, None);
        assert!(vitality.is_dead());
        assert_eq!(vitality.current_health(), 0.0);
        assert!(!vitality.is_collidable());

        vitality.tick(1.0);
        assert_eq!(vitality.apply_damage(10.0, None), 0.0);
        assert_eq!(vitality.heal(10.0), 0.0);

        let deaths = vitality
            .drain_events()
            .into_iter()
            .filter(|e| *e == VitalityEvent::Died)
            .count();
        assert_eq!(deaths, 1);
    }

    #[test]
    fn test_removal_scheduled_after_delay() {
        let mut vitality = armored(0.0);
        vitality.apply_damage(100.0, None);
        vitality.drain_events();

        vitality.tick(1.5);
        assert!(!vitality.is_removal_due());

        vitality.tick(0.5);
        assert!(vitality.is_removal_due());
        assert_eq!(vitality.drain_events(), vec![VitalityEvent::RemovalDue]);

        vitality.tick(1.0);
        assert!(vitality.drain_events().is_empty());
    }

    #[test]
    fn test_no_removal_when_not_destroyed_on_death() {
        let mut config = VitalityConfig::default();
        config.death.destroy_on_death = false;
        let mut vitality = Vitality::new(1, config);
        vitality.apply_damage(200.0, None);
        vitality.tick(10.0);
        assert!(!vitality.is_removal_due());
    }

    #[test]
    fn test_heal_clamps_and_notifies() {
        let mut vitality = armored(0.0);
        vitality.apply_damage(30.0, None);
        vitality.drain_events();

        assert_eq!(vitality.heal(50.0), 30.0);
        assert_eq!(vitality.current_health(), 100.0);
        assert_eq!(
            vitality.drain_events(),
            vec![
                VitalityEvent::HealthChanged {
                    current: 100.0,
                    max: 100.0
                },
                VitalityEvent::Healed { amount: 30.0 },
            ]
        );

        // At full health nothing is healed and nothing is emitted.
        assert_eq!(vitality.heal(10.0), 0.0);
        assert!(vitality.drain_events().is_empty());
    }

    #[test]
    fn test_set_max_health() {
        let mut vitality = armored(0.0);
        vitality.set_max_health(50.0, false);
        assert_eq!(vitality.current_health(), 50.0);

        vitality.apply_damage(20.0, None);
        vitality.set_max_health(200.0, false);
        assert_eq!(vitality.current_health(), 30.0);

        vitality.set_max_health(200.0, true);
        assert_eq!(vitality.current_health(), 200.0);

        vitality.set_max_health(0.0, true);
        assert_eq!(vitality.max_health(), 200.0);
    }

    #[test]
    fn test_flash_and_effects() {
        let log = Arc::new(EffectsLog::new());
        let mut config = VitalityConfig::default();
        config.damage_effect = Some("sparks".to_string());
        config.damage_sound = Some("hull_hit".to_string());
        config.death.effect = Some("wreck_fire".to_string());

        let mut vitality = Vitality::new(7, config).with_effects(log.clone());
        vitality.apply_damage(10.0, None);
        assert!(vitality.is_flashing());
        vitality.tick(0.1);
        assert!(!vitality.is_flashing());

        assert_eq!(log.count("sparks"), 1);
        assert_eq!(log.count("hull_hit"), 1);
        assert_eq!(log.count("wreck_fire"), 0);

        vitality.tick(1.0);
        vitality.apply_damage(500.0, None);
        assert_eq!(log.count("wreck_fire"), 1);
    }

    #[test]
    fn test_drop_table_roll() {
        let table = DropTable {
            chance: 1.0,
            items: vec!["repair_kit".to_string()],
        };
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert_eq!(table.roll(&mut rng), Some("repair_kit"));

        let never = DropTable {
            chance: 0.0,
            items: vec!["repair_kit".to_string()],
        };
        // A uniform draw of exactly 0.0 is vanishingly unlikely.
        assert_eq!(never.roll(&mut rng), None);

        let empty = DropTable {
            chance: 1.0,
            items: Vec::new(),
        };
        assert_eq!(empty.roll(&mut rng), None);
    }

    #[test]
    fn test_death_rolls_guaranteed_drop() {
        let mut config = VitalityConfig::default();
        config.death.drops = Some(DropTable {
            chance: 1.0,
            items: vec!["ammo_crate".to_string()],
        });
        let mut vitality = Vitality::new(1, config);
        vitality.apply_damage(100.0, None);

        let events = vitality.drain_events();
        assert!(events.contains(&VitalityEvent::ItemDropped {
            item: "ammo_crate".to_string()
        }));
    }

    #[test]
    fn test_config_validation() {
        assert!(VitalityConfig::default().validate().is_ok());
        assert!(VitalityConfig::with_max_health(0.0).validate().is_err());
        assert!(VitalityConfig::default()
            .with_invulnerability_time(-1.0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_config_from_ron() {
        let config: VitalityConfig = ron::from_str(
            "(max_health: 250.0, armor: (rating: 20.0), death: (destroy_delay: 3.0))",
        )
        .unwrap();
        assert_eq!(config.max_health, 250.0);
        assert_eq!(config.invulnerability_time, 0.5);
        assert_eq!(config.armor.reduction(), 10.0);
        assert_eq!(config.death.destroy_delay, 3.0);
        assert!(config.death.destroy_on_death);
    }
}
