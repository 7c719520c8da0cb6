//! Tank loadout definitions.

use serde::{Deserialize, Serialize};

use crate::armament::{SlotId, WeaponConfig};
use crate::behavior::BehaviorConfig;
use crate::collaborators::Layer;
use crate::error::{ensure_non_negative, ensure_positive, CombatError, Result};
use crate::vitality::VitalityConfig;

/// Hull and movement properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChassisData {
    /// Top speed in units per second.
    #[serde(default = "default_move_speed")]
    pub move_speed: f32,

    /// Hull turn rate in degrees per second.
    #[serde(default = "default_turn_speed")]
    pub turn_speed: f32,

    /// Radius of the hull collider.
    #[serde(default = "default_collider_radius")]
    pub collider_radius: f32,

    /// Height of the weapon mount above the hull origin.
    #[serde(default = "default_turret_height")]
    pub turret_height: f32,

    /// Physics layer of the hull.
    #[serde(default = "default_layer")]
    pub layer: Layer,

    /// Hull mass used to turn impulses into velocity.
    #[serde(default = "default_mass")]
    pub mass: f32,
}

const fn default_move_speed() -> f32 {
    5.0
}

const fn default_turn_speed() -> f32 {
    100.0
}

const fn default_collider_radius() -> f32 {
    2.0
}

const fn default_turret_height() -> f32 {
    1.5
}

const fn default_layer() -> Layer {
    Layer::Enemy
}

const fn default_mass() -> f32 {
    1000.0
}

impl Default for ChassisData {
    fn default() -> Self {
        Self {
            move_speed: default_move_speed(),
            turn_speed: default_turn_speed(),
            collider_radius: default_collider_radius(),
            turret_height: default_turret_height(),
            layer: default_layer(),
            mass: default_mass(),
        }
    }
}

impl ChassisData {
    fn validate(&self) -> Result<()> {
        ensure_non_negative("chassis.move_speed", self.move_speed)?;
        ensure_non_negative("chassis.turn_speed", self.turn_speed)?;
        ensure_positive("chassis.collider_radius", self.collider_radius)?;
        ensure_non_negative("chassis.turret_height", self.turret_height)?;
        ensure_positive("chassis.mass", self.mass)
    }
}

/// Data-driven tank definition.
///
/// A tank without a `behavior` block is driven manually through the
/// simulation's command API.
///
/// # Example RON
///
/// ```ron
/// TankData(
///     id: "heavy",
///     name: "Heavy Tank",
///     vitality: (
///         max_health: 250.0,
///         armor: (rating: 10.0, directional: Some((rear: 2.0))),
///     ),
///     primary: (damage: 120.0, fire_rate: 0.5, explosion_radius: 4.0),
///     secondary: Some((name: "coax", damage: 8.0, fire_rate: 8.0, explosive: false)),
///     chassis: (move_speed: 3.5, layer: Enemy),
///     behavior: Some((initial_mode: Guard)),
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TankData {
    /// Unique string identifier, referenced by scenarios.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Health and armor.
    #[serde(default)]
    pub vitality: VitalityConfig,

    /// Main weapon.
    #[serde(default)]
    pub primary: WeaponConfig,

    /// Optional second weapon.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<WeaponConfig>,

    /// Hull properties.
    #[serde(default)]
    pub chassis: ChassisData,

    /// AI settings (None for manually driven tanks).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<BehaviorConfig>,
}

impl TankData {
    /// Create a loadout with default stats.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            vitality: VitalityConfig::default(),
            primary: WeaponConfig::default(),
            secondary: None,
            chassis: ChassisData::default(),
            behavior: None,
        }
    }

    /// Builder method to attach AI settings.
    #[must_use]
    pub fn with_behavior(mut self, behavior: BehaviorConfig) -> Self {
        self.behavior = Some(behavior);
        self
    }

    /// Check if this tank is AI-driven.
    #[must_use]
    pub fn is_ai(&self) -> bool {
        self.behavior.is_some()
    }

    /// Validate every nested configuration.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(CombatError::invalid_config("id", "must not be empty"));
        }
        self.vitality.validate()?;
        self.primary.validate("primary")?;
        if let Some(secondary) = &self.secondary {
            secondary.validate("secondary")?;
        }
        self.chassis.validate()?;
        if let Some(behavior) = &self.behavior {
            behavior.validate()?;
            if behavior.fire_slot == SlotId::Secondary && self.secondary.is_none() {
                return Err(CombatError::invalid_config(
                    "behavior.fire_slot",
                    "fires the secondary slot but no secondary weapon is fitted",
                ));
            }
        }
        Ok(())
    }
}
