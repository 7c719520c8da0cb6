//! Perception and aiming.
//!
//! [`scan`] picks the nearest qualifying candidate around an observer;
//! [`predict_lead_point`] and [`aim_yaw`] turn a target into a heading for
//! the weapon mount.
//!
//! # Visibility Rules
//!
//! A candidate is in view when the angle between the observer's forward
//! axis and the direction to the candidate is at most half the field of
//! view. In-view candidates are then checked for line of sight with a
//! single ray from eye height, blocked by any obstacle-layer hit short of
//! the candidate. [`ScanPolicy`] relaxes both rules for the modes that
//! need it.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::collaborators::{EntityDirectory, EntityId, LayerMask, SpatialQuery};
use crate::error::{ensure_non_negative, ensure_positive, Result};
use crate::math::{angle_between, yaw_of, Transform, Vec3, EPSILON, UP};

/// Perception and aiming tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetingConfig {
    /// Radius of the perception query.
    #[serde(default = "default_detection_range")]
    pub detection_range: f32,
    /// Full view cone in degrees.
    #[serde(default = "default_field_of_view")]
    pub field_of_view: f32,
    /// Height of the line-of-sight ray above the observer.
    #[serde(default = "default_eye_height")]
    pub eye_height: f32,
    /// Layers that hold candidate targets.
    #[serde(default = "default_target_layers")]
    pub target_layers: LayerMask,
    /// Layers that block line of sight.
    #[serde(default = "default_obstacle_layers")]
    pub obstacle_layers: LayerMask,
    /// Aim at the predicted position instead of the current one.
    #[serde(default = "default_true")]
    pub lead_target: bool,
    /// Upper bound on lead time in seconds.
    #[serde(default = "default_max_prediction_time")]
    pub max_prediction_time: f32,
    /// Random heading error in degrees, drawn per aim update.
    #[serde(default = "default_aim_error_margin")]
    pub aim_error_margin: f32,
    /// Largest mount bearing error that still allows firing, in degrees.
    #[serde(default = "default_aim_tolerance")]
    pub aim_tolerance: f32,
    /// Seconds between scans; 0 scans every tick.
    #[serde(default)]
    pub scan_interval: f32,
}

const fn default_detection_range() -> f32 {
    30.0
}

const fn default_field_of_view() -> f32 {
    90.0
}

const fn default_eye_height() -> f32 {
    1.0
}

const fn default_target_layers() -> LayerMask {
    LayerMask::PLAYER.union(LayerMask::ENEMY)
}

const fn default_obstacle_layers() -> LayerMask {
    LayerMask::OBSTACLE
}

const fn default_true() -> bool {
    true
}

const fn default_max_prediction_time() -> f32 {
    2.0
}

const fn default_aim_error_margin() -> f32 {
    5.0
}

const fn default_aim_tolerance() -> f32 {
    10.0
}

impl Default for TargetingConfig {
    fn default() -> Self {
        Self {
            detection_range: default_detection_range(),
            field_of_view: default_field_of_view(),
            eye_height: default_eye_height(),
            target_layers: default_target_layers(),
            obstacle_layers: default_obstacle_layers(),
            lead_target: true,
            max_prediction_time: default_max_prediction_time(),
            aim_error_margin: default_aim_error_margin(),
            aim_tolerance: default_aim_tolerance(),
            scan_interval: 0.0,
        }
    }
}

impl TargetingConfig {
    /// Check every field is in range.
    pub fn validate(&self) -> Result<()> {
        ensure_positive("targeting.detection_range", self.detection_range)?;
        ensure_positive("targeting.field_of_view", self.field_of_view)?;
        ensure_non_negative("targeting.eye_height", self.eye_height)?;
        ensure_non_negative("targeting.max_prediction_time", self.max_prediction_time)?;
        ensure_non_negative("targeting.aim_error_margin", self.aim_error_margin)?;
        ensure_non_negative("targeting.aim_tolerance", self.aim_tolerance)?;
        ensure_non_negative("targeting.scan_interval", self.scan_interval)
    }
}

/// Mode-dependent relaxations of the visibility rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanPolicy {
    /// Check line of sight regardless of bearing.
    pub ignore_field_of_view: bool,
    /// Accept candidates that are sensed but not visible.
    pub accept_unseen: bool,
}

/// The best candidate found by a scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanResult {
    /// Selected entity.
    pub target: EntityId,
    /// Its position at scan time.
    pub position: Vec3,
    /// Straight-line distance from the observer.
    pub distance: f32,
    /// Whether it passed the view and line-of-sight checks.
    pub visible: bool,
}

/// Select the nearest qualifying candidate around `observer`.
///
/// Candidates come from a sphere query on the target layers. The observer
/// itself and untargetable entities are skipped. Candidates are visited in
/// the order the query returns them (ascending id) and only a strictly
/// nearer one replaces the current best, so the lowest id wins ties.
pub fn scan<W>(
    observer: EntityId,
    transform: &Transform,
    config: &TargetingConfig,
    policy: ScanPolicy,
    world: &W,
) -> Option<ScanResult>
where
    W: SpatialQuery + EntityDirectory,
{
    let origin = transform.position;
    let forward = transform.forward();
    let half_fov = config.field_of_view * 0.5;
    let mut best: Option<ScanResult> = None;

    for candidate in world.overlap_sphere(origin, config.detection_range, config.target_layers) {
        if candidate == observer || !world.is_targetable(candidate) {
            continue;
        }
        let Some(candidate_transform) = world.transform(candidate) else {
            continue;
        };
        let position = candidate_transform.position;

        let in_view = angle_between(forward, position - origin) <= half_fov;
        let visible = (policy.ignore_field_of_view || in_view)
            && line_of_sight(origin, position, config.eye_height, config.obstacle_layers, world);

        if !visible && !policy.accept_unseen {
            continue;
        }

        let distance = origin.distance(position);
        if best.map_or(true, |b| distance < b.distance) {
            best = Some(ScanResult {
                target: candidate,
                position,
                distance,
                visible,
            });
        }
    }

    tracing::trace!(
        entity = observer,
        target = ?best.map(|b| b.target),
        visible = best.map_or(false, |b| b.visible),
        "Scan complete"
    );
    best
}

/// Whether nothing on `obstacles` blocks the view from `from` to `to`.
///
/// The ray starts `eye_height` above `from` and runs parallel to the
/// ground-level line between the two points, for that line's length.
pub fn line_of_sight<W: SpatialQuery>(
    from: Vec3,
    to: Vec3,
    eye_height: f32,
    obstacles: LayerMask,
    world: &W,
) -> bool {
    let offset = to - from;
    let distance = offset.length();
    if distance < EPSILON {
        return true;
    }
    world
        .raycast(from + UP * eye_height, offset / distance, distance, obstacles)
        .is_none()
}

/// Predict where a moving target will be when a projectile arrives.
///
/// With no velocity, or a non-positive projectile speed, the target's
/// current position is returned unchanged.
///
/// ```
/// use tank_core::math::Vec3;
/// use tank_core::targeting::predict_lead_point;
///
/// // 50 units away at 50 u/s: one second of travel.
/// let aim = predict_lead_point(
///     Vec3::ZERO,
///     Vec3::new(0.0, 0.0, 50.0),
///     Some(Vec3::new(4.0, 0.0, 0.0)),
///     50.0,
///     2.0,
/// );
/// assert_eq!(aim, Vec3::new(4.0, 0.0, 50.0));
/// ```
#[must_use]
pub fn predict_lead_point(
    shooter: Vec3,
    target_position: Vec3,
    target_velocity: Option<Vec3>,
    projectile_speed: f32,
    max_prediction_time: f32,
) -> Vec3 {
    let Some(velocity) = target_velocity else {
        return target_position;
    };
    if projectile_speed <= 0.0 {
        return target_position;
    }
    let time_to_hit = (shooter.distance(target_position) / projectile_speed).min(max_prediction_time);
    target_position + velocity * time_to_hit
}

/// Heading in degrees from `from` toward `aim_point`, perturbed by a
/// uniform draw in `[-error_margin, error_margin]`.
pub fn aim_yaw<R: Rng>(from: Vec3, aim_point: Vec3, error_margin: f32, rng: &mut R) -> f32 {
    let yaw = yaw_of(aim_point - from);
    if error_margin > 0.0 {
        yaw + rng.gen_range(-error_margin..=error_margin)
    } else {
        yaw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::RayHit;
    use crate::math::{ray_aabb, ray_sphere};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[derive(Default)]
    struct TestWorld {
        tanks: Vec<(EntityId, Vec3)>,
        walls: Vec<(Vec3, Vec3)>,
        hidden: Vec<EntityId>,
    }

    impl SpatialQuery for TestWorld {
        fn overlap_sphere(&self, center: Vec3, radius: f32, _mask: LayerMask) -> Vec<EntityId> {
            let mut ids: Vec<_> = self
                .tanks
                .iter()
                .filter(|(_, p)| p.distance(center) <= radius)
                .map(|(id, _)| *id)
                .collect();
            ids.sort_unstable();
            ids
        }

        fn raycast(&self, origin: Vec3, direction: Vec3, max: f32, mask: LayerMask) -> Option<RayHit> {
            if mask.intersects(LayerMask::OBSTACLE) {
                for (min, max_corner) in &self.walls {
                    if let Some((distance, normal)) = ray_aabb(origin, direction, max, *min, *max_corner) {
                        return Some(RayHit {
                            distance,
                            point: origin + direction * distance,
                            normal,
                            entity: None,
                        });
                    }
                }
            }
            if mask.intersects(LayerMask::ENEMY) {
                for (id, p) in &self.tanks {
                    if let Some(distance) = ray_sphere(origin, direction, max, *p, 1.0) {
                        return Some(RayHit {
                            distance,
                            point: origin + direction * distance,
                            normal: -direction,
                            entity: Some(*id),
                        });
                    }
                }
            }
            None
        }
    }

    impl EntityDirectory for TestWorld {
        fn transform(&self, id: EntityId) -> Option<Transform> {
            self.tanks
                .iter()
                .find(|(tank, _)| *tank == id)
                .map(|(_, p)| Transform::from_yaw(*p, 0.0))
        }

        fn velocity(&self, _id: EntityId) -> Option<Vec3> {
            None
        }

        fn is_targetable(&self, id: EntityId) -> bool {
            !self.hidden.contains(&id)
        }
    }

    fn observer() -> Transform {
        Transform::from_yaw(Vec3::ZERO, 0.0)
    }

    #[test]
    fn test_scan_picks_nearest_visible() {
        let world = TestWorld {
            tanks: vec![(1, Vec3::ZERO), (2, Vec3::new(0.0, 0.0, 20.0)), (3, Vec3::new(0.0, 0.0, 10.0))],
            ..Default::default()
        };

        let result = scan(1, &observer(), &TargetingConfig::default(), ScanPolicy::default(), &world).unwrap();
        assert_eq!(result.target, 3);
        assert!(result.visible);
        assert!((result.distance - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_scan_respects_field_of_view() {
        // Directly behind the observer.
        let world = TestWorld {
            tanks: vec![(1, Vec3::ZERO), (2, Vec3::new(0.0, 0.0, -10.0))],
            ..Default::default()
        };
        let config = TargetingConfig::default();

        assert!(scan(1, &observer(), &config, ScanPolicy::default(), &world).is_none());

        let chase = ScanPolicy {
            ignore_field_of_view: true,
            accept_unseen: false,
        };
        let result = scan(1, &observer(), &config, chase, &world).unwrap();
        assert_eq!(result.target, 2);
        assert!(result.visible);
    }

    #[test]
    fn test_scan_blocked_by_obstacle() {
        let world = TestWorld {
            tanks: vec![(1, Vec3::ZERO), (2, Vec3::new(0.0, 0.0, 10.0))],
            walls: vec![(Vec3::new(-2.0, 0.0, 4.0), Vec3::new(2.0, 3.0, 5.0))],
            ..Default::default()
        };
        let config = TargetingConfig::default();

        assert!(scan(1, &observer(), &config, ScanPolicy::default(), &world).is_none());

        let ambush = ScanPolicy {
            ignore_field_of_view: false,
            accept_unseen: true,
        };
        let result = scan(1, &observer(), &config, ambush, &world).unwrap();
        assert_eq!(result.target, 2);
        assert!(!result.visible);
    }

    #[test]
    fn test_scan_tie_goes_to_lowest_id() {
        let world = TestWorld {
            tanks: vec![
                (1, Vec3::ZERO),
                (7, Vec3::new(3.0, 0.0, 5.0)),
                (4, Vec3::new(-3.0, 0.0, 5.0)),
            ],
            ..Default::default()
        };

        let result = scan(1, &observer(), &TargetingConfig::default(), ScanPolicy::default(), &world).unwrap();
        assert_eq!(result.target, 4);
    }

    #[test]
    fn test_scan_skips_untargetable() {
        let world = TestWorld {
            tanks: vec![(1, Vec3::ZERO), (2, Vec3::new(0.0, 0.0, 5.0)), (3, Vec3::new(0.0, 0.0, 8.0))],
            hidden: vec![2],
            ..Default::default()
        };

        let result = scan(1, &observer(), &TargetingConfig::default(), ScanPolicy::default(), &world).unwrap();
        assert_eq!(result.target, 3);
    }

    #[test]
    fn test_line_of_sight_ignores_non_obstacle_layers() {
        let world = TestWorld {
            tanks: vec![(5, Vec3::new(0.0, 1.0, 5.0))],
            ..Default::default()
        };
        assert!(line_of_sight(Vec3::ZERO, Vec3::new(0.0, 0.0, 10.0), 1.0, LayerMask::OBSTACLE, &world));
        assert!(!line_of_sight(Vec3::ZERO, Vec3::new(0.0, 0.0, 10.0), 1.0, LayerMask::ENEMY, &world));
    }

    #[test]
    fn test_predict_lead_point() {
        let target = Vec3::new(0.0, 0.0, 100.0);

        // No velocity: unchanged.
        assert_eq!(predict_lead_point(Vec3::ZERO, target, None, 50.0, 2.0), target);

        // 2s of travel at 3 u/s sideways.
        let aim = predict_lead_point(Vec3::ZERO, target, Some(Vec3::X * 3.0), 50.0, 5.0);
        assert!((aim.x - 6.0).abs() < 1e-4);

        // Clamped to the prediction limit.
        let aim = predict_lead_point(Vec3::ZERO, target, Some(Vec3::X * 3.0), 10.0, 2.0);
        assert!((aim.x - 6.0).abs() < 1e-4);

        // Degenerate projectile speed.
        assert_eq!(predict_lead_point(Vec3::ZERO, target, Some(Vec3::X), 0.0, 2.0), target);
    }

    #[test]
    fn test_aim_yaw_error_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let aim = Vec3::new(10.0, 0.0, 0.0);

        assert!((aim_yaw(Vec3::ZERO, aim, 0.0, &mut rng) - 90.0).abs() < 1e-4);
        for _ in 0..100 {
            let yaw = aim_yaw(Vec3::ZERO, aim, 5.0, &mut rng);
            assert!((85.0..=95.0).contains(&yaw));
        }
    }

    #[test]
    fn test_config_from_ron() {
        let config: TargetingConfig = ron::from_str("(field_of_view: 120.0, target_layers: [Player])").unwrap();
        assert_eq!(config.field_of_view, 120.0);
        assert_eq!(config.target_layers, LayerMask::PLAYER);
        assert_eq!(config.detection_range, 30.0);
        assert!(config.validate().is_ok());

        let bad = TargetingConfig {
            detection_range: 0.0,
            ..TargetingConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
