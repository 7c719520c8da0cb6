//! # Tank Core
//!
//! Combat simulation core for a tank-battle game.
//!
//! This crate decides what an autonomous tank does, whether and how it can
//! fire, how much damage a hit inflicts and how a projectile resolves
//! against the world. It contains **no** rendering, audio playback or IO:
//! - World queries come in through the traits in [`collaborators`]
//! - Sound and visual effects go out as fire-and-forget requests
//! - Timers are countdowns advanced by explicit `tick` calls
//! - Randomness comes from seeded streams
//!
//! ## Crate Structure
//!
//! - [`damage`] - Armor and directional damage model
//! - [`vitality`] - Health, invulnerability and death
//! - [`armament`] - Weapon slots, ammo and reload
//! - [`ballistics`] - Projectile flight and hit resolution
//! - [`targeting`] - Target scans and lead prediction
//! - [`behavior`] - AI state machine
//! - [`simulation`] - Reference world and tick loop
//! - [`data`] - RON loadouts and scenarios

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod armament;
pub mod ballistics;
pub mod behavior;
pub mod collaborators;
pub mod damage;
pub mod data;
pub mod error;
pub mod math;
pub mod simulation;
pub mod targeting;
pub mod vitality;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::armament::{Armament, ArmamentEvent, SlotId, SlotState, WeaponConfig};
    pub use crate::ballistics::{
        BallisticResolver, BallisticsConfig, HazardSpawner, HazardSpec, Resolution, ResolutionKind,
    };
    pub use crate::behavior::{
        BehaviorConfig, BehaviorController, BehaviorEvent, BehaviorMode, MovementIntent, Unit,
    };
    pub use crate::collaborators::{
        EffectAnchor, EffectsLog, EffectsSink, EntityDirectory, EntityDirectoryMut, EntityId,
        Layer, LayerMask, Navigation, NullEffects, PhysicalBody, RayHit, SpatialQuery,
    };
    pub use crate::damage::{effective_damage, ArmorProfile, DirectionalArmor, HitFace};
    pub use crate::data::{ArenaData, ScenarioData, TankData};
    pub use crate::error::{CombatError, Result};
    pub use crate::math::{Transform, Vec3};
    pub use crate::simulation::{Simulation, TickEvents, TICK_DURATION, TICK_RATE};
    pub use crate::targeting::{predict_lead_point, TargetingConfig};
    pub use crate::vitality::{Vitality, VitalityConfig, VitalityEvent};
}
