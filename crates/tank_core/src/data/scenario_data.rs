//! Battle scenario definitions.

use serde::{Deserialize, Serialize};

use super::tank_data::TankData;
use crate::behavior::BehaviorMode;
use crate::error::{ensure_non_negative, ensure_positive, CombatError, Result};
use crate::math::Vec3;

/// An axis-aligned box that blocks movement, projectiles and sight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObstacleData {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

/// The battlefield.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaData {
    /// Half the side length of the square, walkable floor.
    #[serde(default = "default_half_extent")]
    pub half_extent: f32,

    /// Static obstacles.
    #[serde(default)]
    pub obstacles: Vec<ObstacleData>,
}

const fn default_half_extent() -> f32 {
    100.0
}

impl Default for ArenaData {
    fn default() -> Self {
        Self {
            half_extent: default_half_extent(),
            obstacles: Vec::new(),
        }
    }
}

/// A tank placed at scenario start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TankPlacement {
    /// ID of the loadout to spawn.
    pub loadout: String,

    /// Spawn position.
    pub position: Vec3,

    /// Initial heading in degrees.
    #[serde(default)]
    pub yaw: f32,

    /// Overrides the loadout's initial AI mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<BehaviorMode>,

    /// Overrides the loadout's patrol route.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patrol_points: Option<Vec<Vec3>>,
}

/// Complete battle definition.
///
/// # Example RON
///
/// ```ron
/// ScenarioData(
///     name: "Ridge Ambush",
///     seed: 7,
///     duration_secs: 60.0,
///     arena: (half_extent: 80.0, obstacles: [(min: (-5.0, 0.0, 10.0), max: (5.0, 4.0, 12.0))]),
///     loadouts: [(id: "light", name: "Light Tank", behavior: Some((initial_mode: Patrol)))],
///     tanks: [
///         (loadout: "light", position: (0.0, 0.0, 0.0)),
///         (loadout: "light", position: (0.0, 0.0, 30.0), yaw: 180.0, mode: Some(Ambush)),
///     ],
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioData {
    /// Display name.
    pub name: String,

    /// Seed for every random draw in the run.
    #[serde(default)]
    pub seed: u64,

    /// Length of a headless run in seconds.
    #[serde(default = "default_duration_secs")]
    pub duration_secs: f32,

    /// The battlefield.
    #[serde(default)]
    pub arena: ArenaData,

    /// Loadouts available to placements.
    pub loadouts: Vec<TankData>,

    /// Tanks present at start.
    pub tanks: Vec<TankPlacement>,
}

const fn default_duration_secs() -> f32 {
    60.0
}

impl ScenarioData {
    /// Find a loadout by its ID.
    #[must_use]
    pub fn get_loadout(&self, id: &str) -> Option<&TankData> {
        self.loadouts.iter().find(|t| t.id == id)
    }

    /// Resolve a placement into the loadout it spawns, with overrides applied.
    pub fn resolve(&self, placement: &TankPlacement) -> Result<TankData> {
        let mut tank = self
            .get_loadout(&placement.loadout)
            .cloned()
            .ok_or_else(|| {
                CombatError::invalid_config(
                    "tanks.loadout",
                    format!("unknown loadout '{}'", placement.loadout),
                )
            })?;

        if let Some(behavior) = tank.behavior.as_mut() {
            if let Some(mode) = placement.mode {
                behavior.initial_mode = mode;
            }
            if let Some(points) = &placement.patrol_points {
                behavior.patrol_points.clone_from(points);
            }
        }
        Ok(tank)
    }

    /// Validate the arena, every loadout and every placement.
    ///
    /// Checks for:
    /// - Duplicate loadout IDs
    /// - Placements referencing unknown loadouts
    /// - Placements outside the arena
    /// - AI overrides on manually driven loadouts
    pub fn validate(&self) -> Result<()> {
        ensure_positive("arena.half_extent", self.arena.half_extent)?;
        ensure_non_negative("duration_secs", self.duration_secs)?;

        for obstacle in &self.arena.obstacles {
            if !obstacle.min.cmple(obstacle.max).all() {
                return Err(CombatError::invalid_config(
                    "arena.obstacles",
                    format!("min {} exceeds max {}", obstacle.min, obstacle.max),
                ));
            }
        }

        for (index, tank) in self.loadouts.iter().enumerate() {
            if self.loadouts[..index].iter().any(|t| t.id == tank.id) {
                return Err(CombatError::invalid_config(
                    "loadouts",
                    format!("duplicate loadout id '{}'", tank.id),
                ));
            }
            tank.validate()?;
        }

        let extent = self.arena.half_extent;
        for placement in &self.tanks {
            let tank = self.resolve(placement)?;
            if placement.position.x.abs() > extent || placement.position.z.abs() > extent {
                return Err(CombatError::invalid_config(
                    "tanks.position",
                    format!("{} lies outside the arena", placement.position),
                ));
            }
            if !tank.is_ai() && (placement.mode.is_some() || placement.patrol_points.is_some()) {
                return Err(CombatError::invalid_config(
                    "tanks.mode",
                    format!("loadout '{}' has no AI to configure", tank.id),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::from_ron_str;

    const RIDGE: &str = r#"
        ScenarioData(
            name: "Ridge Ambush",
            seed: 7,
            arena: (half_extent: 80.0, obstacles: [(min: (-5.0, 0.0, 10.0), max: (5.0, 4.0, 12.0))]),
            loadouts: [
                (id: "light", name: "Light Tank", behavior: Some((initial_mode: Patrol))),
                (id: "player", name: "Player Tank", chassis: (layer: Player)),
            ],
            tanks: [
                (loadout: "player", position: (0.0, 0.0, 0.0)),
                (loadout: "light", position: (0.0, 0.0, 30.0), yaw: 180.0, mode: Some(Ambush)),
                (loadout: "light", position: (20.0, 0.0, 30.0), patrol_points: Some([(20.0, 0.0, 0.0)])),
            ],
        )
    "#;

    #[test]
    fn test_parse_and_validate() {
        let scenario: ScenarioData = from_ron_str("ridge.ron", RIDGE).unwrap();
        assert_eq!(scenario.seed, 7);
        assert_eq!(scenario.duration_secs, 60.0);
        assert_eq!(scenario.arena.obstacles.len(), 1);
        assert_eq!(scenario.tanks.len(), 3);
        assert!(scenario.validate().is_ok());
    }

    #[test]
    fn test_resolve_applies_overrides() {
        let scenario: ScenarioData = from_ron_str("ridge.ron", RIDGE).unwrap();

        let ambusher = scenario.resolve(&scenario.tanks[1]).unwrap();
        let behavior = ambusher.behavior.unwrap();
        assert_eq!(behavior.initial_mode, BehaviorMode::Ambush);

        let patroller = scenario.resolve(&scenario.tanks[2]).unwrap();
        let behavior = patroller.behavior.unwrap();
        assert_eq!(behavior.initial_mode, BehaviorMode::Patrol);
        assert_eq!(behavior.patrol_points, vec![Vec3::new(20.0, 0.0, 0.0)]);
    }

    #[test]
    fn test_validate_catches_bad_references() {
        let mut scenario: ScenarioData = from_ron_str("ridge.ron", RIDGE).unwrap();
        scenario.tanks[0].loadout = "missing".to_string();
        let err = scenario.validate().unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_validate_catches_layout_errors() {
        let mut scenario: ScenarioData = from_ron_str("ridge.ron", RIDGE).unwrap();
        scenario.tanks[0].position = Vec3::new(500.0, 0.0, 0.0);
        assert!(scenario.validate().is_err());

        let mut scenario: ScenarioData = from_ron_str("ridge.ron", RIDGE).unwrap();
        scenario.tanks[0].mode = Some(BehaviorMode::Guard);
        assert!(scenario.validate().is_err());

        let mut scenario: ScenarioData = from_ron_str("ridge.ron", RIDGE).unwrap();
        scenario.loadouts.push(scenario.loadouts[0].clone());
        assert!(scenario.validate().is_err());
    }
}
