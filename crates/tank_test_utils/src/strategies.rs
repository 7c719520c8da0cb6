//! Proptest strategies for combat properties.
//!
//! These strategies generate random but reproducible inputs for
//! property-based testing of the damage model, vitality and armament.

use glam::Vec3;
use proptest::prelude::*;
use tank_core::damage::{ArmorProfile, DirectionalArmor};

/// One operation applied to a vitality.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HealthOp {
    /// Apply raw damage, optionally with a world hit direction.
    Damage(f32, Option<Vec3>),
    /// Heal by an amount.
    Heal(f32),
    /// Advance timers by seconds.
    Wait(f32),
}

/// One operation applied to an armament.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeaponOp {
    /// Try to fire the primary slot.
    Fire,
    /// Request a manual reload.
    Reload,
    /// Advance timers by seconds.
    Wait(f32),
}

/// Generate raw damage values (0-500).
pub fn arb_damage() -> impl Strategy<Value = f32> {
    0.0f32..500.0
}

/// Generate hostile damage inputs: mostly in range, but also negative,
/// infinite and NaN amounts.
pub fn arb_untrusted_damage() -> impl Strategy<Value = f32> {
    prop_oneof![
        6 => arb_damage(),
        2 => -500.0f32..0.0,
        1 => Just(f32::NAN),
        1 => Just(f32::NEG_INFINITY),
    ]
}

/// Generate max health values (1-1000).
pub fn arb_max_health() -> impl Strategy<Value = f32> {
    1.0f32..1000.0
}

/// Generate a hit direction, including degenerate zero vectors.
pub fn arb_direction() -> impl Strategy<Value = Vec3> {
    (-1.0f32..1.0, -1.0f32..1.0, -1.0f32..1.0).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

/// Generate directional multipliers (all strictly positive).
pub fn arb_directional() -> impl Strategy<Value = DirectionalArmor> {
    (0.1f32..3.0, 0.1f32..3.0, 0.1f32..3.0, 0.1f32..3.0).prop_map(|(front, rear, side, top)| {
        DirectionalArmor {
            front,
            rear,
            side,
            top,
        }
    })
}

/// Generate armor with a strictly positive rating.
pub fn arb_positive_armor() -> impl Strategy<Value = ArmorProfile> {
    (0.01f32..200.0, 0.0f32..2.0, proptest::option::of(arb_directional())).prop_map(
        |(rating, reduction_factor, directional)| ArmorProfile {
            rating,
            reduction_factor,
            directional,
        },
    )
}

/// Generate armor that is switched off (rating at or below zero).
pub fn arb_disabled_armor() -> impl Strategy<Value = ArmorProfile> {
    (-50.0f32..=0.0, 0.0f32..2.0, proptest::option::of(arb_directional())).prop_map(
        |(rating, reduction_factor, directional)| ArmorProfile {
            rating,
            reduction_factor,
            directional,
        },
    )
}

/// Generate a single health operation.
pub fn arb_health_op() -> impl Strategy<Value = HealthOp> {
    prop_oneof![
        4 => (arb_untrusted_damage(), proptest::option::of(arb_direction()))
            .prop_map(|(raw, dir)| HealthOp::Damage(raw, dir)),
        2 => (0.0f32..200.0).prop_map(HealthOp::Heal),
        2 => (0.0f32..1.0).prop_map(HealthOp::Wait),
    ]
}

/// Generate a sequence of health operations.
pub fn arb_health_ops(max_len: usize) -> impl Strategy<Value = Vec<HealthOp>> {
    proptest::collection::vec(arb_health_op(), 0..max_len)
}

/// Generate a single weapon operation.
pub fn arb_weapon_op() -> impl Strategy<Value = WeaponOp> {
    prop_oneof![
        4 => Just(WeaponOp::Fire),
        1 => Just(WeaponOp::Reload),
        3 => (0.0f32..1.5).prop_map(WeaponOp::Wait),
    ]
}

/// Generate a sequence of weapon operations.
pub fn arb_weapon_ops(max_len: usize) -> impl Strategy<Value = Vec<WeaponOp>> {
    proptest::collection::vec(arb_weapon_op(), 0..max_len)
}
