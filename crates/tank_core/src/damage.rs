//! Armor-based damage model with directional multipliers.
//!
//! Effective damage is computed from raw damage, a flat armor reduction
//! and an optional per-face multiplier:
//! - Unarmored targets take raw damage unmodified
//! - Armored targets subtract `rating * reduction_factor` from the hit
//! - Directional armor scales the hit by the face that was struck
//! - Armor can never reduce a hit below [`MIN_ARMORED_DAMAGE`]

use serde::{Deserialize, Serialize};

use crate::error::{ensure_non_negative, ensure_positive, Result};
use crate::math::{Vec3, EPSILON};

/// Minimum damage floor - hits against armor always deal at least 1 damage.
pub const MIN_ARMORED_DAMAGE: f32 = 1.0;

/// Face of a hull struck by a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HitFace {
    /// Glacis plate, the thickest armor.
    Front,
    /// Engine deck, the weakest armor.
    Rear,
    /// Hull sides (also the catch-all face).
    Side,
    /// Turret roof.
    Top,
}

/// Classify a hit into the face it struck.
///
/// `local_direction` is the hit's travel direction expressed in the
/// target's local frame. A shell fired from behind travels along the
/// target's forward axis, so a dominant positive forward component is a
/// rear hit. Vertical dominance selects top (positive) or side. Anything
/// else is a side hit.
#[must_use]
pub fn classify_hit_face(local_direction: Vec3) -> HitFace {
    let d = local_direction.normalize_or_zero();
    let (x, y, z) = (d.x.abs(), d.y.abs(), d.z.abs());

    if z > x && z > y {
        if d.z > 0.0 {
            HitFace::Rear
        } else {
            HitFace::Front
        }
    } else if y > x {
        if d.y > 0.0 {
            HitFace::Top
        } else {
            HitFace::Side
        }
    } else {
        HitFace::Side
    }
}

/// Per-face damage multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionalArmor {
    /// Multiplier for front hits.
    #[serde(default = "default_front")]
    pub front: f32,
    /// Multiplier for rear hits.
    #[serde(default = "default_rear")]
    pub rear: f32,
    /// Multiplier for side hits.
    #[serde(default = "default_side")]
    pub side: f32,
    /// Multiplier for top hits.
    #[serde(default = "default_top")]
    pub top: f32,
}

const fn default_front() -> f32 {
    0.75
}

const fn default_rear() -> f32 {
    1.5
}

const fn default_side() -> f32 {
    1.0
}

const fn default_top() -> f32 {
    1.25
}

impl Default for DirectionalArmor {
    fn default() -> Self {
        Self {
            front: default_front(),
            rear: default_rear(),
            side: default_side(),
            top: default_top(),
        }
    }
}

impl DirectionalArmor {
    /// Get the multiplier for a hull face.
    #[must_use]
    pub const fn multiplier(&self, face: HitFace) -> f32 {
        match face {
            HitFace::Front => self.front,
            HitFace::Rear => self.rear,
            HitFace::Side => self.side,
            HitFace::Top => self.top,
        }
    }

    /// Validate that every multiplier is positive.
    pub fn validate(&self) -> Result<()> {
        ensure_positive("armor.directional.front", self.front)?;
        ensure_positive("armor.directional.rear", self.rear)?;
        ensure_positive("armor.directional.side", self.side)?;
        ensure_positive("armor.directional.top", self.top)
    }
}

/// Armor configuration of a damageable entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArmorProfile {
    /// Flat armor rating. Zero or less disables the whole armor model.
    #[serde(default)]
    pub rating: f32,
    /// Fraction of the rating subtracted from each hit.
    #[serde(default = "default_reduction_factor")]
    pub reduction_factor: f32,
    /// Per-face multipliers. `None` disables directional armor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directional: Option<DirectionalArmor>,
}

const fn default_reduction_factor() -> f32 {
    0.5
}

impl Default for ArmorProfile {
    fn default() -> Self {
        Self::unarmored()
    }
}

impl ArmorProfile {
    /// Armor profile that lets every hit through unmodified.
    #[must_use]
    pub const fn unarmored() -> Self {
        Self {
            rating: 0.0,
            reduction_factor: default_reduction_factor(),
            directional: None,
        }
    }

    /// Create a flat armor profile.
    #[must_use]
    pub const fn new(rating: f32, reduction_factor: f32) -> Self {
        Self {
            rating,
            reduction_factor,
            directional: None,
        }
    }

    /// Builder method to enable directional armor.
    #[must_use]
    pub const fn with_directional(mut self, directional: DirectionalArmor) -> Self {
        self.directional = Some(directional);
        self
    }

    /// Flat damage subtracted from each hit.
    #[must_use]
    pub fn reduction(&self) -> f32 {
        self.rating * self.reduction_factor
    }

    /// Whether the armor model applies at all.
    #[must_use]
    pub fn is_armored(&self) -> bool {
        self.rating > 0.0
    }

    /// Validate the armor configuration.
    pub fn validate(&self) -> Result<()> {
        ensure_non_negative("armor.reduction_factor", self.reduction_factor)?;
        if let Some(directional) = &self.directional {
            directional.validate()?;
        }
        Ok(())
    }
}

/// Calculate the damage a hit actually inflicts.
///
/// Formula:
/// ```text
/// rating <= 0         : damage = raw
/// otherwise           : damage = max(1, raw * face_multiplier - rating * reduction_factor)
/// face_multiplier     : 1 unless directional armor is enabled and a direction is given
/// ```
///
/// # Arguments
/// * `raw` - Damage carried by the hit
/// * `armor` - Target's armor profile
/// * `local_hit_direction` - Hit travel direction in the target's local frame
#[must_use]
pub fn effective_damage(raw: f32, armor: &ArmorProfile, local_hit_direction: Option<Vec3>) -> f32 {
    if !armor.is_armored() {
        return raw;
    }

    // Step 1: Scale by the struck face
    let scaled = match (armor.directional, local_hit_direction) {
        (Some(directional), Some(direction)) if direction.length_squared() > EPSILON => {
            raw * directional.multiplier(classify_hit_face(direction))
        }
        _ => raw,
    };

    // Step 2: Flat reduction, floored
    (scaled - armor.reduction()).max(MIN_ARMORED_DAMAGE)
}
