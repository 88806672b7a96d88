//! Project configuration file and the on-disk layout of a project
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Location of the configuration file relative to the project root
pub const CONFIG_FILE: &str = "data/inputs/project_config.yml";
/// Location of the dose table relative to the project root
pub const DOSE_FILE: &str = "data/inputs/scfa_inputs.csv";

#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("Unable to read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid configuration {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Unable to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Contents of `project_config.yml`; every section and key is optional
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub project: ProjectSection,
    pub human_model: HumanModel,
    pub host_simulation: HostSimulation,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSection {
    /// Dose condition labels, in the order they are simulated and plotted
    pub conditions: Vec<String>,
}

impl Default for ProjectSection {
    fn default() -> Self {
        ProjectSection {
            conditions: vec!["Low".to_string(), "Mid".to_string(), "High".to_string()],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HumanModel {
    /// Model file, relative to the project root unless absolute
    pub sbml_path: PathBuf,
}

impl Default for HumanModel {
    fn default() -> Self {
        HumanModel {
            sbml_path: PathBuf::from("data/models/Recon3D.xml.gz"),
        }
    }
}

/// Medium and objective settings, all rates in mmol/gDW/hr
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSimulation {
    pub oxygen_uptake: f64,
    pub glucose_uptake: f64,
    pub amino_acid_uptake: f64,
    pub vitamin_uptake: f64,
    /// Upper bound of the SCFA exchanges while dosed; 0 allows uptake only
    pub scfa_upper_bound: f64,
    pub atpm_upper_bound: f64,
    /// Magnitude internal reaction bounds are capped to
    pub internal_bound_cap: f64,
}

impl Default for HostSimulation {
    fn default() -> Self {
        HostSimulation {
            oxygen_uptake: 20.,
            glucose_uptake: 1.,
            amino_acid_uptake: 0.01,
            vitamin_uptake: 0.01,
            scfa_upper_bound: 0.,
            atpm_upper_bound: 500.,
            internal_bound_cap: 500.,
        }
    }
}

impl ProjectConfig {
    /// Read a configuration file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<ProjectConfig, ProjectError> {
        if !path.exists() {
            info!(path = %path.display(), "no configuration file, using defaults");
            return Ok(ProjectConfig::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ProjectError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = ProjectConfig::from_yaml(&content).map_err(|err| match err {
            ProjectError::Yaml { source, .. } => ProjectError::Yaml {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        debug!(?config, "loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<ProjectConfig, ProjectError> {
        // An empty document deserializes to unit, not to an empty map
        if content.trim().is_empty() {
            return Ok(ProjectConfig::default());
        }
        let config: ProjectConfig =
            serde_yaml::from_str(content).map_err(|source| ProjectError::Yaml {
                path: PathBuf::new(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ProjectError> {
        let conditions = &self.project.conditions;
        if conditions.is_empty() {
            return Err(ProjectError::Invalid(
                "project.conditions must not be empty".to_string(),
            ));
        }
        for (i, label) in conditions.iter().enumerate() {
            if conditions[..i].contains(label) {
                return Err(ProjectError::Invalid(format!(
                    "condition {label} is listed twice"
                )));
            }
        }
        let sim = &self.host_simulation;
        for (key, value) in [
            ("oxygen_uptake", sim.oxygen_uptake),
            ("glucose_uptake", sim.glucose_uptake),
            ("amino_acid_uptake", sim.amino_acid_uptake),
            ("vitamin_uptake", sim.vitamin_uptake),
            ("atpm_upper_bound", sim.atpm_upper_bound),
            ("internal_bound_cap", sim.internal_bound_cap),
        ] {
            if !value.is_finite() || value < 0. {
                return Err(ProjectError::Invalid(format!(
                    "host_simulation.{key} must be a non-negative number, got {value}"
                )));
            }
        }
        if !sim.scfa_upper_bound.is_finite() {
            return Err(ProjectError::Invalid(
                "host_simulation.scfa_upper_bound must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// Every file and directory the pipeline stages read or write
#[derive(Clone, Debug, PartialEq)]
pub struct Paths {
    pub root: PathBuf,
    pub config: PathBuf,
    pub dose_table: PathBuf,
    pub model: PathBuf,
    pub results: PathBuf,
    pub figs: PathBuf,
    pub tables: PathBuf,
}

impl Paths {
    /// Resolve the layout under `root`, without touching the filesystem
    pub fn new(root: &Path, config_path: &Path, config: &ProjectConfig) -> Paths {
        Paths {
            root: root.to_path_buf(),
            config: config_path.to_path_buf(),
            dose_table: root.join(DOSE_FILE),
            model: root.join(&config.human_model.sbml_path),
            results: root.join("results"),
            figs: root.join("outputs").join("figs"),
            tables: root.join("outputs").join("tables"),
        }
    }

    /// Create the output directories when missing
    pub fn create_output_dirs(&self) -> Result<(), ProjectError> {
        for dir in [&self.results, &self.figs, &self.tables] {
            fs::create_dir_all(dir).map_err(|source| ProjectError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    pub fn canonical_inputs(&self) -> PathBuf {
        self.results.join("scfa_inputs_canonical.csv")
    }

    pub fn host_fluxes(&self) -> PathBuf {
        self.results.join("host_fluxes_by_condition.csv")
    }

    pub fn merged(&self) -> PathBuf {
        self.results.join("merged_dose_scfa_host.csv")
    }

    pub fn flux_results(&self) -> PathBuf {
        self.results.join("flux_results.csv")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ProjectConfig::default();
        assert_eq!(config.project.conditions, vec!["Low", "Mid", "High"]);
        assert_eq!(config.host_simulation.oxygen_uptake, 20.);
        assert_eq!(config.host_simulation.glucose_uptake, 1.);
        assert_eq!(config.host_simulation.atpm_upper_bound, 500.);
        assert_eq!(
            config.human_model.sbml_path,
            PathBuf::from("data/models/Recon3D.xml.gz")
        );
        assert_eq!(ProjectConfig::from_yaml("").unwrap(), config);
    }

    #[test]
    fn partial_yaml() {
        let yaml = r#"
project:
  conditions: [Low, Mid, High]
host_simulation:
  oxygen_uptake: 5.0
"#;
        let config = ProjectConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.host_simulation.oxygen_uptake, 5.);
        assert_eq!(config.host_simulation.glucose_uptake, 1.);
        assert_eq!(config.host_simulation.internal_bound_cap, 500.);
    }

    #[test]
    fn invalid_yaml() {
        assert!(matches!(
            ProjectConfig::from_yaml("host_simulation:\n  oxygen_uptake: -1\n"),
            Err(ProjectError::Invalid(_))
        ));
        assert!(matches!(
            ProjectConfig::from_yaml("project:\n  conditions: [Low, Low]\n"),
            Err(ProjectError::Invalid(_))
        ));
        assert!(matches!(
            ProjectConfig::from_yaml("host_simulation: [1, 2]"),
            Err(ProjectError::Yaml { .. })
        ));
    }

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProjectConfig::load(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, ProjectConfig::default());
    }

    #[test]
    fn layout() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProjectConfig::default();
        let paths = Paths::new(dir.path(), &dir.path().join(CONFIG_FILE), &config);
        paths.create_output_dirs().unwrap();
        assert!(paths.results.is_dir());
        assert!(paths.figs.is_dir());
        assert!(paths.tables.is_dir());
        assert_eq!(
            paths.merged(),
            dir.path().join("results").join("merged_dose_scfa_host.csv")
        );
        assert_eq!(
            paths.model,
            dir.path().join("data/models/Recon3D.xml.gz")
        );
    }
}
