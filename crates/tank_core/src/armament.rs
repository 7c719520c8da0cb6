//! Weapon slots with ammunition, fire-rate limiting and timed reloads.
//!
//! Each tank carries an [`Armament`] with a primary and an optional
//! secondary [`WeaponSlot`]. Slots cycle through [`SlotState`]:
//!
//! ```text
//! Ready --fire--> Cooling --(1 / fire_rate)--> Ready
//!   |                                            ^
//!   +--ammo hits 0 / reload()--> Reloading --(reload_duration)--+
//! ```
//!
//! Time only advances through [`Armament::tick`], so pausing or scaling
//! the simulation clock pauses or scales reloads too.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ballistics::{HazardSpawner, HazardSpec};
use crate::collaborators::{null_effects, EffectAnchor, EffectsSink, EntityId};
use crate::error::{ensure_non_negative, ensure_positive, CombatError, Result};
use crate::math::{Transform, Vec3};

/// Muzzle position used when a weapon has no configured fire point.
pub const DEFAULT_MUZZLE_OFFSET: Vec3 = Vec3::new(0.0, 0.0, 2.0);

/// Slack applied to fire-interval comparisons so accumulated tick
/// rounding never delays a shot by a whole tick.
const TIME_EPSILON: f64 = 1e-6;

/// Lifetime of the muzzle flash effect.
const MUZZLE_FLASH_DURATION: f32 = 0.2;

/// Weapon slot identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SlotId {
    /// Main gun.
    #[default]
    Primary,
    /// Coaxial or auxiliary weapon.
    Secondary,
}

/// Firing readiness of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotState {
    /// Can fire.
    Ready,
    /// Fired too recently; waiting out the fire interval.
    Cooling,
    /// Reload in progress.
    Reloading,
}

// ============================================================================
// Weapon Configuration
// ============================================================================

/// Stat block for one weapon.
///
/// Every entity owns its own copy; mutating one tank's weapon never
/// touches another's.
///
/// # Example RON
///
/// ```ron
/// WeaponConfig(
///     name: "main_gun",
///     damage: 100.0,
///     fire_rate: 1.0,
///     reload_duration: 2.0,
///     max_ammo: 10,
///     projectile_speed: 50.0,
///     explosion_radius: 2.0,
///     fire_sound: Some("cannon_fire"),
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponConfig {
    /// Display name.
    #[serde(default = "default_weapon_name")]
    pub name: String,
    /// Damage carried by each projectile.
    #[serde(default = "default_damage")]
    pub damage: f32,
    /// Shots per second.
    #[serde(default = "default_fire_rate")]
    pub fire_rate: f32,
    /// Seconds to refill the magazine.
    #[serde(default = "default_reload_duration")]
    pub reload_duration: f32,
    /// Magazine size.
    #[serde(default = "default_max_ammo")]
    pub max_ammo: u32,
    /// Never consumes ammunition.
    #[serde(default)]
    pub infinite_ammo: bool,
    /// Muzzle velocity in units per second.
    #[serde(default = "default_projectile_speed")]
    pub projectile_speed: f32,
    /// Seconds a projectile lives before expiring.
    #[serde(default = "default_projectile_lifetime")]
    pub projectile_lifetime: f32,
    /// Splash radius (0 = no splash).
    #[serde(default = "default_explosion_radius")]
    pub explosion_radius: f32,
    /// Projectiles burst on impact instead of striking one target.
    #[serde(default = "default_true")]
    pub explosive: bool,
    /// Projectiles burst when their lifetime runs out.
    #[serde(default = "default_true")]
    pub explode_on_expiry: bool,
    /// Projectile model. `None` fires without spawning anything.
    #[serde(default = "default_projectile_model")]
    pub projectile: Option<String>,
    /// Fire point relative to the weapon mount.
    #[serde(default)]
    pub muzzle_offset: Option<Vec3>,
    /// Sound played on each shot.
    #[serde(default)]
    pub fire_sound: Option<String>,
    /// Sound played when a reload starts.
    #[serde(default)]
    pub reload_sound: Option<String>,
    /// Sound played on a refused shot.
    #[serde(default)]
    pub empty_sound: Option<String>,
    /// Effect spawned at the muzzle on each shot.
    #[serde(default)]
    pub muzzle_flash: Option<String>,
    /// Sound played when a projectile strikes directly.
    #[serde(default)]
    pub impact_sound: Option<String>,
    /// Effect spawned when a projectile bursts.
    #[serde(default)]
    pub explosion_effect: Option<String>,
}

fn default_weapon_name() -> String {
    "main_gun".to_string()
}

const fn default_damage() -> f32 {
    100.0
}

const fn default_fire_rate() -> f32 {
    1.0
}

const fn default_reload_duration() -> f32 {
    2.0
}

const fn default_max_ammo() -> u32 {
    10
}

const fn default_projectile_speed() -> f32 {
    50.0
}

const fn default_projectile_lifetime() -> f32 {
    5.0
}

const fn default_explosion_radius() -> f32 {
    2.0
}

const fn default_true() -> bool {
    true
}

#[allow(clippy::unnecessary_wraps)]
fn default_projectile_model() -> Option<String> {
    Some("shell".to_string())
}

impl Default for WeaponConfig {
    fn default() -> Self {
        Self {
            name: default_weapon_name(),
            damage: default_damage(),
            fire_rate: default_fire_rate(),
            reload_duration: default_reload_duration(),
            max_ammo: default_max_ammo(),
            infinite_ammo: false,
            projectile_speed: default_projectile_speed(),
            projectile_lifetime: default_projectile_lifetime(),
            explosion_radius: default_explosion_radius(),
            explosive: true,
            explode_on_expiry: true,
            projectile: default_projectile_model(),
            muzzle_offset: None,
            fire_sound: None,
            reload_sound: None,
            empty_sound: None,
            muzzle_flash: None,
            impact_sound: None,
            explosion_effect: None,
        }
    }
}

impl WeaponConfig {
    /// Minimum seconds between shots.
    #[must_use]
    pub fn fire_interval(&self) -> f32 {
        1.0 / self.fire_rate
    }

    /// Muzzle velocity used for lead prediction.
    #[must_use]
    pub const fn projectile_speed(&self) -> f32 {
        self.projectile_speed
    }

    /// Validate the stat block. `prefix` names the slot in error messages.
    pub fn validate(&self, prefix: &str) -> Result<()> {
        ensure_non_negative(&format!("{prefix}.damage"), self.damage)?;
        ensure_positive(&format!("{prefix}.fire_rate"), self.fire_rate)?;
        ensure_non_negative(&format!("{prefix}.reload_duration"), self.reload_duration)?;
        ensure_non_negative(&format!("{prefix}.projectile_speed"), self.projectile_speed)?;
        ensure_positive(&format!("{prefix}.projectile_lifetime"), self.projectile_lifetime)?;
        ensure_non_negative(&format!("{prefix}.explosion_radius"), self.explosion_radius)?;
        if self.max_ammo == 0 && !self.infinite_ammo {
            return Err(CombatError::invalid_config(
                format!("{prefix}.max_ammo"),
                "must be at least 1 unless infinite_ammo is set",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Armament Events
// ============================================================================

/// Notifications emitted by an [`Armament`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArmamentEvent {
    /// Magazine count changed.
    AmmoChanged {
        /// Rounds left.
        current: u32,
        /// Magazine size.
        max: u32,
        /// Slot affected.
        slot: SlotId,
    },
    /// A shot was fired.
    Fired {
        /// Slot that fired.
        slot: SlotId,
    },
    /// Reload started or finished.
    Reloading {
        /// `true` on start, `false` on completion.
        is_reloading: bool,
        /// Reload duration on start, 0 on completion.
        duration: f32,
        /// Slot affected.
        slot: SlotId,
    },
    /// A shot was refused because the slot was empty or reloading.
    DryFire {
        /// Slot that refused.
        slot: SlotId,
    },
}

// ============================================================================
// Weapon Slot
// ============================================================================

/// Runtime state of one weapon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponSlot {
    config: WeaponConfig,
    current_ammo: u32,
    last_fire_time: Option<f64>,
    reload_remaining: Option<f32>,
    muzzle_warned: bool,
}

impl WeaponSlot {
    /// Create a slot with a full magazine.
    #[must_use]
    pub fn new(config: WeaponConfig) -> Self {
        Self {
            current_ammo: config.max_ammo,
            config,
            last_fire_time: None,
            reload_remaining: None,
            muzzle_warned: false,
        }
    }

    /// Stat block.
    #[must_use]
    pub const fn config(&self) -> &WeaponConfig {
        &self.config
    }

    /// Rounds left in the magazine.
    #[must_use]
    pub const fn current_ammo(&self) -> u32 {
        self.current_ammo
    }

    /// Seconds until the running reload completes.
    #[must_use]
    pub const fn reload_remaining(&self) -> Option<f32> {
        self.reload_remaining
    }

    /// Clock time of the last successful shot.
    #[must_use]
    pub const fn last_fire_time(&self) -> Option<f64> {
        self.last_fire_time
    }

    /// Readiness at clock time `now`.
    #[must_use]
    pub fn state(&self, now: f64) -> SlotState {
        if self.reload_remaining.is_some() {
            return SlotState::Reloading;
        }
        match self.last_fire_time {
            Some(fired_at) if now - fired_at + TIME_EPSILON < f64::from(self.config.fire_interval()) => {
                SlotState::Cooling
            }
            _ => SlotState::Ready,
        }
    }

    fn is_full(&self) -> bool {
        self.current_ammo >= self.config.max_ammo
    }
}

// ============================================================================
// Armament
// ============================================================================

/// All weapons carried by one entity.
///
/// # Example
///
/// ```
/// use tank_core::armament::{Armament, SlotId, WeaponConfig};
/// use tank_core::ballistics::HazardSpec;
/// use tank_core::math::Transform;
///
/// let mut armament = Armament::new(1, WeaponConfig::default(), None);
/// let mut spawned: Vec<HazardSpec> = Vec::new();
///
/// assert!(armament.fire(SlotId::Primary, &Transform::IDENTITY, &mut spawned));
/// assert_eq!(armament.current_ammo(SlotId::Primary), Some(9));
/// assert_eq!(spawned.len(), 1);
///
/// // Rate limited until a full fire interval has elapsed
/// assert!(!armament.fire(SlotId::Primary, &Transform::IDENTITY, &mut spawned));
/// armament.tick(1.0);
/// assert!(armament.fire(SlotId::Primary, &Transform::IDENTITY, &mut spawned));
/// ```
#[derive(Debug, Clone)]
pub struct Armament {
    owner: EntityId,
    primary: WeaponSlot,
    secondary: Option<WeaponSlot>,
    clock: f64,
    effects: Arc<dyn EffectsSink>,
    events: Vec<ArmamentEvent>,
}

impl Armament {
    /// Create an armament with full magazines.
    #[must_use]
    pub fn new(owner: EntityId, primary: WeaponConfig, secondary: Option<WeaponConfig>) -> Self {
        Self {
            owner,
            primary: WeaponSlot::new(primary),
            secondary: secondary.map(WeaponSlot::new),
            clock: 0.0,
            effects: null_effects(),
            events: Vec::new(),
        }
    }

    /// Builder method to attach an effects sink.
    #[must_use]
    pub fn with_effects(mut self, effects: Arc<dyn EffectsSink>) -> Self {
        self.effects = effects;
        self
    }

    /// Entity this armament belongs to.
    #[must_use]
    pub const fn owner(&self) -> EntityId {
        self.owner
    }

    /// Seconds of simulation time this armament has seen.
    #[must_use]
    pub const fn clock(&self) -> f64 {
        self.clock
    }

    /// Get a slot, if fitted.
    #[must_use]
    pub fn slot(&self, slot: SlotId) -> Option<&WeaponSlot> {
        match slot {
            SlotId::Primary => Some(&self.primary),
            SlotId::Secondary => self.secondary.as_ref(),
        }
    }

    /// Readiness of a slot.
    #[must_use]
    pub fn state(&self, slot: SlotId) -> Option<SlotState> {
        self.slot(slot).map(|s| s.state(self.clock))
    }

    /// Rounds left in a slot.
    #[must_use]
    pub fn current_ammo(&self, slot: SlotId) -> Option<u32> {
        self.slot(slot).map(WeaponSlot::current_ammo)
    }

    /// Muzzle velocity of a slot's projectiles.
    #[must_use]
    pub fn projectile_speed(&self, slot: SlotId) -> Option<f32> {
        self.slot(slot).map(|s| s.config.projectile_speed())
    }

    /// Try to fire a slot.
    ///
    /// `mount` is the world transform of the weapon mount (turret); the
    /// projectile leaves from the slot's muzzle offset along the mount's
    /// forward axis. Returns `true` if a shot was fired.
    ///
    /// Refusals never fail hard:
    /// - reloading: empty signal, `false`
    /// - fire interval not elapsed: silent `false`
    /// - magazine empty: empty signal, reload starts, `false`
    pub fn fire<S: HazardSpawner>(&mut self, slot_id: SlotId, mount: &Transform, spawner: &mut S) -> bool {
        let now = self.clock;
        let owner = self.owner;
        let primary_offset = self.primary.config.muzzle_offset;
        let Self {
            primary,
            secondary,
            effects,
            events,
            ..
        } = self;
        let slot = match slot_id {
            SlotId::Primary => primary,
            SlotId::Secondary => match secondary.as_mut() {
                Some(slot) => slot,
                None => return false,
            },
        };

        match slot.state(now) {
            SlotState::Reloading => {
                dry_fire(owner, slot, slot_id, effects.as_ref(), events);
                return false;
            }
            SlotState::Cooling => return false,
            SlotState::Ready => {}
        }

        if slot.current_ammo == 0 && !slot.config.infinite_ammo {
            dry_fire(owner, slot, slot_id, effects.as_ref(), events);
            begin_reload(owner, slot, slot_id, effects.as_ref(), events);
            return false;
        }

        if !slot.config.infinite_ammo {
            slot.current_ammo -= 1;
            events.push(ArmamentEvent::AmmoChanged {
                current: slot.current_ammo,
                max: slot.config.max_ammo,
                slot: slot_id,
            });
        }
        slot.last_fire_time = Some(now);

        let configured = match slot_id {
            SlotId::Primary => slot.config.muzzle_offset,
            SlotId::Secondary => slot.config.muzzle_offset.or(primary_offset),
        };
        let offset = match configured {
            Some(offset) => offset,
            None => {
                if !slot.muzzle_warned {
                    slot.muzzle_warned = true;
                    tracing::warn!(
                        entity = owner,
                        slot = ?slot_id,
                        "No fire point configured, using default muzzle offset"
                    );
                }
                DEFAULT_MUZZLE_OFFSET
            }
        };
        let muzzle = mount.transform_point(offset);
        let direction = mount.forward();

        match &slot.config.projectile {
            Some(model) => {
                spawner.spawn_hazard(HazardSpec {
                    owner,
                    position: muzzle,
                    velocity: direction * slot.config.projectile_speed,
                    damage: slot.config.damage,
                    lifetime: slot.config.projectile_lifetime,
                    explosion_radius: slot.config.explosion_radius,
                    explosive: slot.config.explosive,
                    explode_on_expiry: slot.config.explode_on_expiry,
                    model: model.clone(),
                    impact_sound: slot.config.impact_sound.clone(),
                    explosion_effect: slot.config.explosion_effect.clone(),
                });
            }
            None => {
                tracing::warn!(entity = owner, slot = ?slot_id, "Weapon has no projectile model, nothing spawned");
            }
        }

        if let Some(sound) = &slot.config.fire_sound {
            effects.play_sound(sound, EffectAnchor::Entity(owner));
        }
        if let Some(flash) = &slot.config.muzzle_flash {
            effects.spawn_effect(flash, EffectAnchor::Point(muzzle), MUZZLE_FLASH_DURATION);
        }
        events.push(ArmamentEvent::Fired { slot: slot_id });

        if slot.current_ammo == 0 && !slot.config.infinite_ammo {
            begin_reload(owner, slot, slot_id, effects.as_ref(), events);
        }

        true
    }

    /// Request a manual reload.
    ///
    /// No-op if the slot is missing, already reloading or already full.
    /// Returns `true` if a reload started.
    pub fn reload(&mut self, slot_id: SlotId) -> bool {
        let owner = self.owner;
        let Self {
            primary,
            secondary,
            effects,
            events,
            ..
        } = self;
        let slot = match slot_id {
            SlotId::Primary => primary,
            SlotId::Secondary => match secondary.as_mut() {
                Some(slot) => slot,
                None => return false,
            },
        };
        begin_reload(owner, slot, slot_id, effects.as_ref(), events)
    }

    /// Advance the clock and running reloads by `dt` seconds of
    /// simulation time.
    pub fn tick(&mut self, dt: f32) {
        self.clock += f64::from(dt);

        let owner = self.owner;
        let slots = std::iter::once((SlotId::Primary, &mut self.primary))
            .chain(self.secondary.as_mut().map(|slot| (SlotId::Secondary, slot)));

        for (slot_id, slot) in slots {
            let Some(remaining) = slot.reload_remaining.as_mut() else {
                continue;
            };
            *remaining -= dt;
            if *remaining > 0.0 {
                continue;
            }

            slot.reload_remaining = None;
            slot.current_ammo = slot.config.max_ammo;
            tracing::debug!(entity = owner, slot = ?slot_id, "Reload complete");
            self.events.push(ArmamentEvent::Reloading {
                is_reloading: false,
                duration: 0.0,
                slot: slot_id,
            });
            self.events.push(ArmamentEvent::AmmoChanged {
                current: slot.current_ammo,
                max: slot.config.max_ammo,
                slot: slot_id,
            });
        }
    }

    /// Take every buffered notification.
    pub fn drain_events(&mut self) -> Vec<ArmamentEvent> {
        std::mem::take(&mut self.events)
    }
}

fn dry_fire(
    owner: EntityId,
    slot: &WeaponSlot,
    slot_id: SlotId,
    effects: &dyn EffectsSink,
    events: &mut Vec<ArmamentEvent>,
) {
    if let Some(sound) = &slot.config.empty_sound {
        effects.play_sound(sound, EffectAnchor::Entity(owner));
    }
    events.push(ArmamentEvent::DryFire { slot: slot_id });
}

fn begin_reload(
    owner: EntityId,
    slot: &mut WeaponSlot,
    slot_id: SlotId,
    effects: &dyn EffectsSink,
    events: &mut Vec<ArmamentEvent>,
) -> bool {
    if slot.reload_remaining.is_some() || slot.is_full() {
        return false;
    }

    let duration = slot.config.reload_duration;
    slot.reload_remaining = Some(duration);
    tracing::debug!(entity = owner, slot = ?slot_id, duration, "Reload started");

    if let Some(sound) = &slot.config.reload_sound {
        effects.play_sound(sound, EffectAnchor::Entity(owner));
    }
    events.push(ArmamentEvent::Reloading {
        is_reloading: true,
        duration,
        slot: slot_id,
    });
    true
}
