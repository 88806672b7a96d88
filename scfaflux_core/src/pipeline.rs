//! The four pipeline stages, each reading the previous stage's files from disk
use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use crate::dose::{DoseTable, ValidationError};
use crate::figures::make_figures;
use crate::io::{load_model, ModelLoadError};
use crate::project::{Paths, ProjectConfig, ProjectError};
use crate::results::{
    write_flux_results, write_host_fluxes, write_merged, FluxRecord, HostFluxRow, RenderError,
};
use crate::simulation::{HostSimulator, SimulationError};
use crate::tables::make_tables;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    ModelLoad(#[from] ModelLoadError),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Summary line of one simulated condition
#[derive(Clone, Debug, PartialEq)]
pub struct ConditionSummary {
    pub condition: String,
    pub objective_value: Option<f64>,
    pub objective_pct_change: Option<f64>,
}

/// A project on disk with its configuration loaded
#[derive(Clone, Debug)]
pub struct Pipeline {
    pub config: ProjectConfig,
    pub paths: Paths,
    /// Go through the parsed model cache
    pub use_cache: bool,
}

impl Pipeline {
    /// Load the configuration at `config_path` and create the output directories under `root`
    pub fn open(root: PathBuf, config_path: PathBuf) -> Result<Pipeline, PipelineError> {
        let config = ProjectConfig::load(&config_path)?;
        let paths = Paths::new(&root, &config_path, &config);
        paths.create_output_dirs()?;
        Ok(Pipeline {
            config,
            paths,
            use_cache: true,
        })
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    fn conditions(&self) -> &[String] {
        &self.config.project.conditions
    }

    /// Validate the dose table and write its canonical copy
    pub fn prepare_inputs(&self) -> Result<DoseTable, PipelineError> {
        let doses = DoseTable::read(&self.paths.dose_table, self.conditions())?;
        let out = self.paths.canonical_inputs();
        doses.write(&out)?;
        info!(path = %out.display(), "wrote canonical dose table");
        Ok(doses)
    }

    /// Simulate every condition of the canonical dose table and write the results files
    pub fn run_simulation(&self) -> Result<Vec<ConditionSummary>, PipelineError> {
        let doses = DoseTable::read(&self.paths.canonical_inputs(), self.conditions())?;
        info!(path = %self.paths.model.display(), "loading model");
        let model = load_model(&self.paths.model, self.use_cache)?;
        info!(
            reactions = model.reactions.len(),
            metabolites = model.metabolites.len(),
            "model loaded"
        );

        let mut simulator = HostSimulator::prepare(model, &self.config.host_simulation)?;
        let outcome = simulator.run_all(&doses)?;
        let rows = HostFluxRow::rows(&outcome, simulator.lookup());

        write_host_fluxes(&self.paths.host_fluxes(), &rows)?;
        write_merged(&self.paths.merged(), &doses, &rows)?;
        write_flux_results(&self.paths.flux_results(), &FluxRecord::records(&outcome))?;
        info!(path = %self.paths.results.display(), "wrote simulation results");

        Ok(rows
            .into_iter()
            .map(|row| ConditionSummary {
                condition: row.condition,
                objective_value: row.objective_value,
                objective_pct_change: row.objective_pct_change,
            })
            .collect())
    }

    pub fn make_figures(&self) -> Result<Vec<PathBuf>, PipelineError> {
        Ok(make_figures(
            &self.paths.merged(),
            &self.paths.figs,
            self.conditions(),
        )?)
    }

    pub fn make_tables(&self) -> Result<Vec<PathBuf>, PipelineError> {
        Ok(make_tables(
            &self.paths.merged(),
            &self.paths.tables,
            self.conditions(),
        )?)
    }

    /// All four stages in order, stopping at the first error
    pub fn run_all(&self) -> Result<Vec<ConditionSummary>, PipelineError> {
        self.prepare_inputs()?;
        let summary = self.run_simulation()?;
        self.make_figures()?;
        self.make_tables()?;
        Ok(summary)
    }
}
