//! Property tests for the damage model, vitality and armament.

use proptest::prelude::*;
use tank_core::armament::{Armament, ArmamentEvent, SlotId, SlotState, WeaponConfig};
use tank_core::ballistics::HazardSpec;
use tank_core::damage::{effective_damage, MIN_ARMORED_DAMAGE};
use tank_core::math::Transform;
use tank_core::vitality::{Vitality, VitalityConfig};
use tank_test_utils::strategies::{
    arb_damage, arb_direction, arb_disabled_armor, arb_health_ops, arb_max_health,
    arb_positive_armor, arb_weapon_ops, HealthOp, WeaponOp,
};

proptest! {
    #[test]
    fn prop_disabled_armor_passes_raw_damage(
        raw in arb_damage(),
        armor in arb_disabled_armor(),
        direction in proptest::option::of(arb_direction()),
    ) {
        prop_assert_eq!(effective_damage(raw, &armor, direction), raw);
    }

    #[test]
    fn prop_armor_never_reduces_below_floor(
        raw in arb_damage(),
        armor in arb_positive_armor(),
        direction in proptest::option::of(arb_direction()),
    ) {
        prop_assert!(effective_damage(raw, &armor, direction) >= MIN_ARMORED_DAMAGE);
    }

    #[test]
    fn prop_health_stays_in_bounds_and_death_is_terminal(
        max_health in arb_max_health(),
        armor in proptest::option::of(arb_positive_armor()),
        ops in arb_health_ops(80),
    ) {
        let mut config = VitalityConfig::with_max_health(max_health);
        if let Some(armor) = armor {
            config = config.with_armor(armor);
        }
        let mut vitality = Vitality::new(1, config);
        let mut deaths = 0;

        for op in ops {
            let was_dead = vitality.is_dead();
            let before = vitality.current_health();
            match op {
                HealthOp::Damage(raw, direction) => {
                    let applied = vitality.apply_damage(raw, direction);
                    prop_assert!(applied >= 0.0);
                    if was_dead {
                        prop_assert_eq!(applied, 0.0);
                    }
                }
                HealthOp::Heal(amount) => {
                    let healed = vitality.heal(amount);
                    if was_dead {
                        prop_assert_eq!(healed, 0.0);
                    }
                    prop_assert!(healed >= 0.0);
                }
                HealthOp::Wait(seconds) => vitality.tick(seconds),
            }

            let health = vitality.current_health();
            prop_assert!(health >= 0.0);
            prop_assert!(health <= vitality.max_health());
            if was_dead {
                prop_assert!(vitality.is_dead());
                prop_assert_eq!(health, before);
            }
            deaths += vitality
                .drain_events()
                .iter()
                .filter(|e| matches!(e, tank_core::vitality::VitalityEvent::Died))
                .count();
        }

        prop_assert!(deaths <= 1);
        prop_assert_eq!(deaths == 1, vitality.is_dead());
    }

    #[test]
    fn prop_ammo_accounting(max_ammo in 1u32..20, ops in arb_weapon_ops(60)) {
        let config = WeaponConfig {
            max_ammo,
            fire_rate: 4.0,
            reload_duration: 1.0,
            ..WeaponConfig::default()
        };
        let mut armament = Armament::new(1, config, None);
        let mut spawned: Vec<HazardSpec> = Vec::new();
        let mut fired_count = 0;

        for op in ops {
            let before = armament.current_ammo(SlotId::Primary).unwrap();
            match op {
                WeaponOp::Fire => {
                    let reloading = armament.state(SlotId::Primary) == Some(SlotState::Reloading);
                    let fired = armament.fire(SlotId::Primary, &Transform::IDENTITY, &mut spawned);
                    let after = armament.current_ammo(SlotId::Primary).unwrap();
                    if reloading {
                        prop_assert!(!fired);
                    }
                    if fired {
                        fired_count += 1;
                        prop_assert_eq!(after, before - 1);
                    } else {
                        prop_assert_eq!(after, before);
                    }
                }
                WeaponOp::Reload => {
                    armament.reload(SlotId::Primary);
                    prop_assert_eq!(armament.current_ammo(SlotId::Primary).unwrap(), before);
                }
                WeaponOp::Wait(seconds) => armament.tick(seconds),
            }
            prop_assert!(armament.current_ammo(SlotId::Primary).unwrap() <= max_ammo);
        }

        prop_assert_eq!(spawned.len(), fired_count);
    }
}

#[test]
fn test_emptying_magazine_starts_exactly_one_reload() {
    let config = WeaponConfig {
        max_ammo: 5,
        fire_rate: 100.0,
        reload_duration: 2.0,
        ..WeaponConfig::default()
    };
    let mut armament = Armament::new(1, config, None);
    let mut spawned: Vec<HazardSpec> = Vec::new();

    for _ in 0..5 {
        assert!(armament.fire(SlotId::Primary, &Transform::IDENTITY, &mut spawned));
        armament.tick(0.05);
    }
    assert_eq!(armament.current_ammo(SlotId::Primary), Some(0));
    assert_eq!(armament.state(SlotId::Primary), Some(SlotState::Reloading));

    // Firing while reloading fails and never touches ammo
    for _ in 0..3 {
        assert!(!armament.fire(SlotId::Primary, &Transform::IDENTITY, &mut spawned));
    }

    let reload_starts = armament
        .drain_events()
        .iter()
        .filter(|e| matches!(e, ArmamentEvent::Reloading { is_reloading: true, .. }))
        .count();
    assert_eq!(reload_starts, 1);

    // 0.05 of the reload already ran after the last shot
    armament.tick(1.96);
    assert_eq!(armament.current_ammo(SlotId::Primary), Some(5));
    assert_eq!(armament.state(SlotId::Primary), Some(SlotState::Ready));
}
