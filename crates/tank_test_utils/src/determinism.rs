//! Replay checks for seeded battles.
//!
//! A seeded battle must replay exactly: bug reports, balance runs and the
//! CLI's reports all depend on it. Comparing only the final state misses
//! runs that reach the same end by a different route, so every run is
//! fingerprinted twice: the final [`Simulation::state_hash`] and a rolling
//! hash over each tick's [`TickEvents`].
//!
//! Known sources of drift this guards against:
//!
//! - **HashMap iteration order**: tank storage is a `HashMap`, so every
//!   phase walks sorted ids instead.
//! - **Unseeded randomness**: aim error, patrol choice and drop rolls all
//!   draw from ChaCha streams seeded by the scenario seed and entity id.
//! - **Shared config**: each tank clones its loadout, so one tank's ammo
//!   or cooldown never leaks into another.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use tank_core::simulation::{Simulation, TickEvents};

/// What one run of a battle looked like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunFingerprint {
    /// Ticks actually simulated.
    pub ticks: u64,
    /// State hash after the last tick.
    pub state_hash: u64,
    /// Rolling hash over every tick's events.
    pub event_hash: u64,
    /// Shots fired over the run.
    pub shots: usize,
    /// Tanks that died over the run.
    pub deaths: usize,
}

/// Fold one tick's events into a rolling hash.
///
/// Floats are hashed through their `Debug` text, which is exact for
/// identical bit patterns.
pub fn hash_tick_events(hasher: &mut DefaultHasher, events: &TickEvents) {
    format!("{:?}", events.vitality).hash(hasher);
    format!("{:?}", events.armament).hash(hasher);
    format!("{:?}", events.behavior).hash(hasher);
    format!("{:?}", events.resolutions).hash(hasher);
    events.deaths.hash(hasher);
    events.removals.hash(hasher);
    events.drops.hash(hasher);
}

/// Run `sim` for `ticks` and fingerprint the run.
pub fn fingerprint(mut sim: Simulation, ticks: u64) -> RunFingerprint {
    let mut hasher = DefaultHasher::new();
    let mut shots = 0;
    let mut deaths = 0;

    for _ in 0..ticks {
        let events = sim.tick();
        shots += events.shots_fired();
        deaths += events.deaths.len();
        hash_tick_events(&mut hasher, &events);
    }

    RunFingerprint {
        ticks,
        state_hash: sim.state_hash(),
        event_hash: hasher.finish(),
        shots,
        deaths,
    }
}

/// Fingerprints of repeated runs of the same battle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayReport {
    /// One fingerprint per run, in run order.
    pub runs: Vec<RunFingerprint>,
}

impl ReplayReport {
    /// Whether every run matched the first.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.runs.windows(2).all(|w| w[0] == w[1])
    }

    /// Index of the first run that differs from run 0.
    #[must_use]
    pub fn first_mismatch(&self) -> Option<usize> {
        let first = self.runs.first()?;
        self.runs.iter().position(|run| run != first)
    }

    /// # Panics
    ///
    /// Panics with every fingerprint if any run differed.
    pub fn assert_consistent(&self) {
        if let Some(index) = self.first_mismatch() {
            panic!(
                "Battle did not replay: run {index} differs from run 0\n{:#?}",
                self.runs
            );
        }
    }
}

/// Build and run the same battle `runs` times in sequence.
///
/// # Example
///
/// ```
/// use tank_test_utils::determinism::verify_replay;
/// use tank_test_utils::fixtures::melee;
///
/// verify_replay(|| melee(7, 4), 3, 100).assert_consistent();
/// ```
pub fn verify_replay<F>(setup: F, runs: usize, ticks: u64) -> ReplayReport
where
    F: Fn() -> Simulation,
{
    ReplayReport {
        runs: (0..runs).map(|_| fingerprint(setup(), ticks)).collect(),
    }
}

/// Same as [`verify_replay`], with each run on its own scoped thread.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn verify_replay_parallel<F>(setup: F, runs: usize, ticks: u64) -> ReplayReport
where
    F: Fn() -> Simulation + Sync,
{
    let runs = thread::scope(|s| {
        let handles: Vec<_> = (0..runs)
            .map(|_| s.spawn(|| fingerprint(setup(), ticks)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("simulation thread panicked"))
            .collect()
    });
    ReplayReport { runs }
}

/// Step two copies of a battle in lockstep and return the first tick
/// where their state or events differ. Tick 0 means the setups differ.
pub fn find_first_divergence<F>(setup: F, ticks: u64) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut a = setup();
    let mut b = setup();
    if a.state_hash() != b.state_hash() {
        return Some(0);
    }

    for tick in 1..=ticks {
        let mut left = DefaultHasher::new();
        let mut right = DefaultHasher::new();
        hash_tick_events(&mut left, &a.tick());
        hash_tick_events(&mut right, &b.tick());

        if a.state_hash() != b.state_hash() || left.finish() != right.finish() {
            tracing::warn!(tick, "Simulations diverged");
            return Some(tick);
        }
    }
    None
}
