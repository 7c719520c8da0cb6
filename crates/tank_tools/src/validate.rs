//! Data validation utilities.
//!
//! A data file holds either a single `TankData` loadout or a whole
//! `ScenarioData`. The kind is detected by parsing; validation then runs
//! the core's own range checks.

use std::path::{Path, PathBuf};

use tank_core::data::{ScenarioData, TankData};

use crate::error::{ToolError, ToolResult};

/// What a data file turned out to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    /// A single tank loadout.
    Loadout,
    /// A battle scenario.
    Scenario,
}

/// Outcome of validating a file or directory tree.
#[derive(Debug, Default)]
pub struct ValidationSummary {
    /// Files that held a valid loadout.
    pub loadouts: usize,
    /// Files that held a valid scenario.
    pub scenarios: usize,
    /// Every file that failed, in path order.
    pub failures: Vec<(PathBuf, ToolError)>,
}

impl ValidationSummary {
    /// Whether every file passed.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of files checked.
    #[must_use]
    pub fn checked(&self) -> usize {
        self.loadouts + self.scenarios + self.failures.len()
    }
}

/// Read and parse a scenario file without validating it.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_scenario(path: &Path) -> ToolResult<ScenarioData> {
    let text = std::fs::read_to_string(path).map_err(|e| ToolError::io(path, e))?;
    ron::from_str(&text).map_err(|source| ToolError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse and validate one RON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parses as neither a
/// scenario nor a loadout, or fails validation.
pub fn validate_file(path: &Path) -> ToolResult<DataKind> {
    let text = std::fs::read_to_string(path).map_err(|e| ToolError::io(path, e))?;

    let (kind, result) = match ron::from_str::<ScenarioData>(&text) {
        Ok(scenario) => (DataKind::Scenario, scenario.validate()),
        Err(scenario_err) => match ron::from_str::<TankData>(&text) {
            Ok(tank) => (DataKind::Loadout, tank.validate()),
            Err(tank_err) => {
                // Report whichever parse got further into the file
                let source = if (tank_err.position.line, tank_err.position.col)
                    > (scenario_err.position.line, scenario_err.position.col)
                {
                    tank_err
                } else {
                    scenario_err
                };
                return Err(ToolError::Parse {
                    path: path.to_path_buf(),
                    source,
                });
            }
        },
    };

    result.map_err(|e| ToolError::invalid(path, e))?;
    tracing::debug!(path = %path.display(), ?kind, "Validated");
    Ok(kind)
}

/// Validate a single file, or every `.ron` file under a directory.
///
/// Failures in individual files are collected rather than returned, so
/// one bad file doesn't hide the rest.
///
/// # Errors
///
/// Returns an error only if the path itself or a directory under it
/// cannot be read.
pub fn validate_data_directory(path: &Path) -> ToolResult<ValidationSummary> {
    let files = if path.is_dir() {
        let mut files = Vec::new();
        collect_ron_files(path, &mut files)?;
        files.sort();
        files
    } else {
        vec![path.to_path_buf()]
    };

    let mut summary = ValidationSummary::default();
    for file in files {
        match validate_file(&file) {
            Ok(DataKind::Loadout) => summary.loadouts += 1,
            Ok(DataKind::Scenario) => summary.scenarios += 1,
            Err(e) => {
                tracing::warn!(path = %file.display(), "{e}");
                summary.failures.push((file, e));
            }
        }
    }

    tracing::info!(
        "Checked {} files: {} loadouts, {} scenarios, {} failed",
        summary.checked(),
        summary.loadouts,
        summary.scenarios,
        summary.failures.len()
    );
    Ok(summary)
}

fn collect_ron_files(dir: &Path, out: &mut Vec<PathBuf>) -> ToolResult<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| ToolError::io(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| ToolError::io(dir, e))?.path();
        if path.is_dir() {
            collect_ron_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "ron") {
            out.push(path);
        }
    }
    Ok(())
}
