//! Headless scenario runs.
//!
//! Runs a scenario to completion (or a tick budget) and summarizes the
//! battle as a serializable report.

use serde::{Deserialize, Serialize};
use tank_core::ballistics::ResolutionKind;
use tank_core::behavior::BehaviorMode;
use tank_core::collaborators::EntityId;
use tank_core::data::ScenarioData;
use tank_core::math::Vec3;
use tank_core::simulation::{Simulation, TICK_RATE};

/// Overrides for a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Stop after this many ticks instead of the scenario's duration.
    pub ticks: Option<u64>,
    /// Replace the scenario's seed.
    pub seed: Option<u64>,
}

/// A tank that died during the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeathRecord {
    /// Tick the death happened on.
    pub tick: u64,
    /// Entity that died.
    pub entity: EntityId,
    /// Loadout it was spawned from.
    pub loadout: String,
}

/// A tank still alive when the run ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurvivorReport {
    /// Entity id.
    pub entity: EntityId,
    /// Loadout it was spawned from.
    pub loadout: String,
    /// Health left.
    pub health: f32,
    /// Health it started with.
    pub max_health: f32,
    /// Where it ended up.
    pub position: Vec3,
    /// Final AI mode, absent for manual tanks.
    pub mode: Option<BehaviorMode>,
}

/// Summary of one headless battle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    /// Scenario name.
    pub scenario: String,
    /// Random seed used.
    pub seed: u64,
    /// Ticks simulated.
    pub ticks: u64,
    /// Simulated seconds.
    pub elapsed_secs: f64,
    /// Whether the run stopped because at most one tank was left.
    pub decided: bool,
    /// Shots fired by every tank.
    pub shots_fired: usize,
    /// Hazards that struck something without bursting.
    pub direct_hits: usize,
    /// Hazards that burst.
    pub bursts: usize,
    /// Total effective damage dealt.
    pub damage_dealt: f32,
    /// Deaths in order.
    pub deaths: Vec<DeathRecord>,
    /// Items dropped by dying tanks.
    pub drops: Vec<String>,
    /// Tanks alive at the end, in id order.
    pub survivors: Vec<SurvivorReport>,
    /// Final simulation state hash (for determinism validation).
    pub final_state_hash: u64,
}

/// Build the simulation for a scenario with `options` applied.
///
/// # Errors
///
/// Returns the core's validation error if the scenario is invalid.
pub fn build_simulation(scenario: &ScenarioData, options: RunOptions) -> tank_core::error::Result<Simulation> {
    match options.seed {
        Some(seed) => {
            let mut scenario = scenario.clone();
            scenario.seed = seed;
            Simulation::from_scenario(&scenario)
        }
        None => Simulation::from_scenario(scenario),
    }
}

/// Run a scenario headlessly and summarize it.
///
/// Stops after the tick budget, or as soon as at most one tank is alive.
///
/// # Errors
///
/// Returns the core's validation error if the scenario is invalid.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
pub fn run_scenario(scenario: &ScenarioData, options: RunOptions) -> tank_core::error::Result<SimulationReport> {
    let mut sim = build_simulation(scenario, options)?;
    let budget = options
        .ticks
        .unwrap_or_else(|| (f64::from(scenario.duration_secs.max(0.0)) * f64::from(TICK_RATE)).ceil() as u64);

    let mut report = SimulationReport {
        scenario: scenario.name.clone(),
        seed: sim.seed(),
        ..SimulationReport::default()
    };

    tracing::info!(
        scenario = %scenario.name,
        seed = report.seed,
        tanks = sim.tanks().len(),
        budget,
        "Starting headless run"
    );

    while report.ticks < budget && sim.living_tanks() > 1 {
        let tick = sim.get_tick();
        let events = sim.tick();
        report.ticks += 1;

        report.shots_fired += events.shots_fired();
        report.damage_dealt += events.damage_dealt();
        for resolution in &events.resolutions {
            match resolution.kind {
                ResolutionKind::DirectHit { .. } => report.direct_hits += 1,
                ResolutionKind::Burst { .. } => report.bursts += 1,
                ResolutionKind::Expired => {}
            }
        }
        for &entity in &events.deaths {
            let loadout = sim
                .tank(entity)
                .map(|t| t.loadout().to_string())
                .unwrap_or_default();
            tracing::info!(tick, entity, %loadout, "Tank destroyed");
            report.deaths.push(DeathRecord { tick, entity, loadout });
        }
        report
            .drops
            .extend(events.drops.into_iter().map(|(_, item)| item));
    }

    report.decided = sim.living_tanks() <= 1;
    report.elapsed_secs = sim.elapsed();
    report.final_state_hash = sim.state_hash();
    report.survivors = sim
        .tanks()
        .iter()
        .filter(|t| !t.vitality().is_dead())
        .map(|t| SurvivorReport {
            entity: t.id(),
            loadout: t.loadout().to_string(),
            health: t.vitality().current_health(),
            max_health: t.vitality().max_health(),
            position: t.hull().position,
            mode: t.behavior().map(|b| b.mode()),
        })
        .collect();

    tracing::info!(
        ticks = report.ticks,
        survivors = report.survivors.len(),
        decided = report.decided,
        "Headless run finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tank_test_utils::fixtures::{melee_scenario, skirmish_scenario};

    #[test]
    fn test_tick_budget_is_respected() {
        let report = run_scenario(
            &skirmish_scenario(),
            RunOptions {
                ticks: Some(25),
                seed: None,
            },
        )
        .unwrap();

        assert_eq!(report.ticks, 25);
        assert_eq!(report.seed, 99);
        assert_eq!(report.scenario, "Quarry Skirmish");
        assert!(!report.decided);
        assert_eq!(report.survivors.len(), 4);
    }

    #[test]
    fn test_seed_override() {
        let options = RunOptions {
            ticks: Some(10),
            seed: Some(5),
        };
        let report = run_scenario(&skirmish_scenario(), options).unwrap();
        assert_eq!(report.seed, 5);
    }

    #[test]
    fn test_reports_are_reproducible() {
        let options = RunOptions {
            ticks: Some(600),
            seed: None,
        };
        let a = run_scenario(&melee_scenario(3, 6), options).unwrap();
        let b = run_scenario(&melee_scenario(3, 6), options).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.survivors.len() + a.deaths.len(), 6);
    }

    #[test]
    fn test_invalid_scenario_is_rejected() {
        let mut scenario = skirmish_scenario();
        scenario.tanks[0].loadout = "missing".to_string();
        assert!(run_scenario(&scenario, RunOptions::default()).is_err());
    }

    #[test]
    fn test_report_serializes_to_json() {
        let report = run_scenario(
            &skirmish_scenario(),
            RunOptions {
                ticks: Some(5),
                seed: None,
            },
        )
        .unwrap();
        let json = serde_json::to_string(&report).unwrap();
        let back: SimulationReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.ticks, report.ticks);
        assert_eq!(back.survivors.len(), report.survivors.len());
    }
}
