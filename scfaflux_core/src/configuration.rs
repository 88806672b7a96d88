//! Process-wide solver configuration
use std::sync::{LazyLock, RwLock};

pub static CONFIGURATION: LazyLock<RwLock<Configuration>> =
    LazyLock::new(|| RwLock::new(Configuration::default()));

#[derive(Clone, Debug)]
pub struct Configuration {
    /// Default lower bound for reactions built without an explicit bound
    pub lower_bound: f64,
    /// Default upper bound for reactions built without an explicit bound
    pub upper_bound: f64,
    /// Values with a smaller magnitude than this are reported as zero
    pub tolerance: f64,
    /// Solver used by [`crate::optimize::problem::Problem::solve`]
    pub solver: Solver,
}

impl Configuration {
    /// Snapshot of the current global configuration
    ///
    /// A poisoned lock still holds a usable configuration, so it is read anyway.
    pub fn current() -> Configuration {
        match CONFIGURATION.read() {
            Ok(config) => config.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the global solver selection
    pub fn set_solver(solver: Solver) {
        match CONFIGURATION.write() {
            Ok(mut config) => config.solver = solver,
            Err(poisoned) => poisoned.into_inner().solver = solver,
        }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            lower_bound: -1000.,
            upper_bound: 1000.,
            tolerance: 1e-07,
            solver: Solver::Clarabel,
        }
    }
}

/// Enum used to specify the default solver to use
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Solver {
    /// Use the Clarabel interior point solver
    Clarabel,
    /// Use the microlp simplex solver, requires the minilp feature to be enabled
    MicroLp,
}
