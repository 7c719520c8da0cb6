//! Data structures for tank loadouts and battle scenarios.
//!
//! Everything here is plain serde data designed to be deserialized from
//! RON. Parsing takes text the caller has already read; file loading is
//! handled by `tank_tools`.

mod scenario_data;
mod tank_data;

pub use scenario_data::{ArenaData, ObstacleData, ScenarioData, TankPlacement};
pub use tank_data::{ChassisData, TankData};

use crate::error::{CombatError, Result};

/// Parse any data structure from RON text.
///
/// `label` names the source (usually a file path) in error messages.
pub fn from_ron_str<T: serde::de::DeserializeOwned>(label: &str, text: &str) -> Result<T> {
    ron::from_str(text).map_err(|e| CombatError::DataParse {
        path: label.to_string(),
        message: e.to_string(),
    })
}
