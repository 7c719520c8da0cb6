//! Test fixtures and helpers.
//!
//! Standard loadouts, arenas and scenarios for consistent testing.
//! Fixture shells burst with a radius well beyond the hull collider so a
//! contact hit deals meaningful splash damage.

use glam::Vec3;
use tank_core::armament::WeaponConfig;
use tank_core::behavior::{BehaviorConfig, BehaviorMode};
use tank_core::collaborators::{Layer, LayerMask};
use tank_core::data::{from_ron_str, ArenaData, ObstacleData, ScenarioData, TankData, TankPlacement};
use tank_core::damage::{ArmorProfile, DirectionalArmor};
use tank_core::simulation::Simulation;
use tank_core::vitality::VitalityConfig;

/// Seed used by fixtures that don't take one.
pub const DEFAULT_SEED: u64 = 12345;

/// A scenario in RON, as a designer would write it.
pub const SKIRMISH_RON: &str = r#"
ScenarioData(
    name: "Quarry Skirmish",
    seed: 99,
    duration_secs: 30.0,
    arena: (
        half_extent: 60.0,
        obstacles: [
            (min: (-8.0, 0.0, 12.0), max: (8.0, 4.0, 14.0)),
            (min: (20.0, 0.0, -4.0), max: (22.0, 4.0, 4.0)),
        ],
    ),
    loadouts: [
        (
            id: "player",
            name: "Player Tank",
            vitality: (max_health: 150.0, armor: (rating: 4.0)),
            primary: (damage: 60.0, explosion_radius: 6.0, infinite_ammo: true),
            chassis: (layer: Player),
        ),
        (
            id: "raider",
            name: "Raider",
            primary: (damage: 40.0, fire_rate: 0.5, explosion_radius: 6.0),
            behavior: Some((
                initial_mode: Patrol,
                patrol_points: [(-20.0, 0.0, 30.0), (20.0, 0.0, 30.0)],
                targeting: (target_layers: [Player]),
            )),
        ),
    ],
    tanks: [
        (loadout: "player", position: (0.0, 0.0, 0.0)),
        (loadout: "raider", position: (-20.0, 0.0, 30.0), yaw: 180.0),
        (loadout: "raider", position: (30.0, 0.0, 20.0), yaw: 270.0, mode: Some(Guard)),
        (loadout: "raider", position: (0.0, 0.0, 40.0), yaw: 180.0, mode: Some(Ambush)),
    ],
)
"#;

/// Main gun used by fixture tanks.
#[must_use]
pub fn cannon(damage: f32) -> WeaponConfig {
    WeaponConfig {
        damage,
        explosion_radius: 6.0,
        ..WeaponConfig::default()
    }
}

/// Non-explosive gun: every contact is a direct hit.
#[must_use]
pub fn solid_shot(damage: f32) -> WeaponConfig {
    WeaponConfig {
        name: "solid_shot".to_string(),
        damage,
        explosive: false,
        explode_on_expiry: false,
        ..WeaponConfig::default()
    }
}

/// Manually driven player tank.
#[must_use]
pub fn player_tank() -> TankData {
    let mut tank = TankData::new("player");
    tank.name = "Player Tank".to_string();
    tank.vitality = VitalityConfig::with_max_health(150.0);
    tank.primary = cannon(60.0);
    tank.chassis.layer = Layer::Player;
    tank
}

/// Fast, unarmored AI tank.
#[must_use]
pub fn light_tank(mode: BehaviorMode) -> TankData {
    let mut tank = TankData::new("light");
    tank.name = "Light Tank".to_string();
    tank.primary = cannon(40.0);
    tank.chassis.move_speed = 7.0;
    tank.with_behavior(BehaviorConfig::with_mode(mode))
}

/// Slow AI tank with directional armor and a coaxial gun.
#[must_use]
pub fn heavy_tank(mode: BehaviorMode) -> TankData {
    let mut tank = TankData::new("heavy");
    tank.name = "Heavy Tank".to_string();
    tank.vitality = VitalityConfig::with_max_health(250.0)
        .with_armor(ArmorProfile::new(10.0, 0.5).with_directional(DirectionalArmor::default()));
    tank.primary = cannon(120.0);
    tank.primary.fire_rate = 0.5;
    tank.secondary = Some(solid_shot(8.0));
    tank.chassis.move_speed = 3.5;
    tank.chassis.mass = 2000.0;
    tank.with_behavior(BehaviorConfig::with_mode(mode))
}

/// AI tank that only hunts player-layer tanks.
#[must_use]
pub fn hunter(mode: BehaviorMode) -> TankData {
    let mut tank = light_tank(mode);
    tank.id = "hunter".to_string();
    if let Some(behavior) = tank.behavior.as_mut() {
        behavior.targeting.target_layers = LayerMask::PLAYER;
    }
    tank
}

/// Square arena with nothing in it.
#[must_use]
pub fn open_arena(half_extent: f32) -> ArenaData {
    ArenaData {
        half_extent,
        obstacles: Vec::new(),
    }
}

/// Arena with a wall across the +Z axis between z = 9 and z = 11.
#[must_use]
pub fn walled_arena() -> ArenaData {
    ArenaData {
        half_extent: 60.0,
        obstacles: vec![ObstacleData {
            min: Vec3::new(-6.0, 0.0, 9.0),
            max: Vec3::new(6.0, 4.0, 11.0),
        }],
    }
}

/// Parse [`SKIRMISH_RON`].
///
/// # Panics
///
/// Panics if the fixture text no longer parses.
#[must_use]
pub fn skirmish_scenario() -> ScenarioData {
    from_ron_str("skirmish.ron", SKIRMISH_RON).expect("skirmish fixture parses")
}

/// Free-for-all between `count` light tanks on a ring, all chasing.
#[must_use]
pub fn melee_scenario(seed: u64, count: usize) -> ScenarioData {
    let radius = 15.0;
    let tanks = (0..count)
        .map(|i| {
            let angle = i as f32 / count.max(1) as f32 * std::f32::consts::TAU;
            let position = Vec3::new(angle.sin() * radius, 0.0, angle.cos() * radius);
            TankPlacement {
                loadout: "light".to_string(),
                position,
                yaw: angle.to_degrees() + 180.0,
                mode: None,
                patrol_points: None,
            }
        })
        .collect();

    ScenarioData {
        name: "Melee".to_string(),
        seed,
        duration_secs: 30.0,
        arena: open_arena(40.0),
        loadouts: vec![light_tank(BehaviorMode::Chase)],
        tanks,
    }
}

/// Player at the origin facing +Z with one AI tank `distance` ahead,
/// facing back toward the player.
///
/// # Panics
///
/// Panics if a fixture loadout fails validation.
#[must_use]
pub fn duel(seed: u64, enemy: &TankData, distance: f32) -> Simulation {
    let mut sim = Simulation::with_arena(seed, &open_arena(100.0));
    sim.spawn_tank(&player_tank(), Vec3::ZERO, 0.0)
        .expect("player fixture is valid");
    sim.spawn_tank(enemy, Vec3::new(0.0, 0.0, distance), 180.0)
        .expect("enemy fixture is valid");
    sim
}

/// Simulation built from [`melee_scenario`].
///
/// # Panics
///
/// Panics if the fixture scenario fails validation.
#[must_use]
pub fn melee(seed: u64, count: usize) -> Simulation {
    Simulation::from_scenario(&melee_scenario(seed, count)).expect("melee fixture is valid")
}
