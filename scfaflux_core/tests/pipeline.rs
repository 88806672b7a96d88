use std::fs;
use std::path::{Path, PathBuf};

use scfaflux_core::dose::{Scfa, ValidationError};
use scfaflux_core::figures::{
    EXCHANGE_FIG, HEATMAP_FIG, OBJECTIVE_DELTA_FIG, OBJECTIVE_FIG, SCFA_INPUTS_FIG,
    SCFA_RATIOS_FIG,
};
use scfaflux_core::pipeline::{Pipeline, PipelineError};
use scfaflux_core::project::{CONFIG_FILE, DOSE_FILE};
use scfaflux_core::results::ResultsTable;
use scfaflux_core::tables::{HOST_FLUXES_TABLE, SCFA_INPUTS_TABLE, SUMMARY_TABLE};

const CONFIG: &str = "\
project:
  conditions: [Low, Mid, High]
human_model:
  sbml_path: data/models/toy_hepatocyte.json
";

const DOSES: &str = "\
condition,acetate_mmol_gDW_hr,propionate_mmol_gDW_hr,butyrate_mmol_gDW_hr
High,8.0,2.8,1.6
Low,2.0,0.7,0.4
Mid,4.0,1.4,0.8
";

/// A project root with the toy model, a configuration and a dose table
fn project(doses: &str) -> tempfile::TempDir {
    let root = tempfile::tempdir().unwrap();
    let models = root.path().join("data").join("models");
    fs::create_dir_all(&models).unwrap();
    fs::create_dir_all(root.path().join("data").join("inputs")).unwrap();
    fs::copy(
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("test_data")
            .join("test_models")
            .join("toy_hepatocyte.json"),
        models.join("toy_hepatocyte.json"),
    )
    .unwrap();
    fs::write(root.path().join(CONFIG_FILE), CONFIG).unwrap();
    fs::write(root.path().join(DOSE_FILE), doses).unwrap();
    root
}

fn open(root: &Path) -> Pipeline {
    Pipeline::open(root.to_path_buf(), root.join(CONFIG_FILE)).unwrap()
}

#[test]
fn end_to_end() {
    let root = project(DOSES);
    let pipeline = open(root.path());
    assert!(pipeline.paths.figs.is_dir());
    assert!(pipeline.paths.tables.is_dir());

    let doses = pipeline.prepare_inputs().unwrap();
    assert_eq!(doses.labels(), vec!["Low", "Mid", "High"]);
    let canonical = fs::read_to_string(pipeline.paths.canonical_inputs()).unwrap();
    assert!(canonical.lines().nth(1).unwrap().starts_with("Low,"));

    let summary = pipeline.run_simulation().unwrap();
    assert_eq!(summary.len(), 3);
    assert!(summary.iter().all(|row| row.objective_value.is_some()));
    let low = &summary[0];
    assert_eq!(low.condition, "Low");
    assert!((low.objective_pct_change.unwrap() - 100. * 25.6 / 22.).abs() < 1e-3);

    let host = ResultsTable::read(&pipeline.paths.host_fluxes()).unwrap();
    assert_eq!(host.len(), 3);
    assert!(host.has_column("pathway_PYK"));
    let merged = ResultsTable::read(&pipeline.paths.merged()).unwrap();
    assert_eq!(
        merged.text_column("condition").unwrap(),
        vec!["Low", "Mid", "High"]
    );
    let doses_column = merged.column(Scfa::Acetate.column()).unwrap();
    let fluxes = merged.column("acetate_flux").unwrap();
    for (dose, flux) in doses_column.iter().zip(&fluxes) {
        let (dose, flux) = (dose.unwrap(), flux.unwrap());
        assert!(flux >= -dose - 1e-6 && flux <= 1e-6, "{flux} outside [-{dose}, 0]");
    }
    // The toy model has no pathway reactions, so those cells stay empty
    assert!(merged.column("pathway_PYK").unwrap().iter().all(Option::is_none));

    let records = fs::read_to_string(pipeline.paths.flux_results()).unwrap();
    assert_eq!(
        records.lines().next().unwrap(),
        "condition,reaction_id,flux,objective_value"
    );
    assert_eq!(records.lines().count(), 1 + 3 * 26);

    let tables = pipeline.make_tables().unwrap();
    assert_eq!(tables.len(), 3);
    for name in [SCFA_INPUTS_TABLE, HOST_FLUXES_TABLE, SUMMARY_TABLE] {
        assert!(pipeline.paths.tables.join(name).is_file(), "{name}");
    }

    let figures = pipeline.make_figures().unwrap();
    assert_eq!(figures.len(), 5);
    for name in [
        SCFA_INPUTS_FIG,
        SCFA_RATIOS_FIG,
        OBJECTIVE_FIG,
        OBJECTIVE_DELTA_FIG,
        EXCHANGE_FIG,
    ] {
        let path = pipeline.paths.figs.join(name);
        assert!(figures.contains(&path), "{name}");
        assert!(fs::metadata(&path).unwrap().len() > 0, "{name}");
    }
    // No pathway fluxes to draw
    assert!(!pipeline.paths.figs.join(HEATMAP_FIG).exists());
}

#[test]
fn invalid_dose_table_stops_the_run() {
    let root = project(
        "condition,acetate_mmol_gDW_hr,propionate_mmol_gDW_hr,butyrate_mmol_gDW_hr\n\
         Low,2,0.7,0.4\nMid,1,1.4,0.8\nHigh,8,2.8,1.6\n",
    );
    let pipeline = open(root.path());
    assert!(matches!(
        pipeline.prepare_inputs(),
        Err(PipelineError::Validation(ValidationError::NonMonotonic { .. }))
    ));
    assert!(!pipeline.paths.canonical_inputs().exists());
}

#[test]
fn simulation_needs_prepared_inputs() {
    let root = project(DOSES);
    let pipeline = open(root.path());
    assert!(matches!(
        pipeline.run_simulation(),
        Err(PipelineError::Validation(ValidationError::Io(_)))
    ));
}

#[test]
fn missing_model_is_reported() {
    let root = project(DOSES);
    fs::remove_file(root.path().join("data/models/toy_hepatocyte.json")).unwrap();
    let pipeline = open(root.path());
    pipeline.prepare_inputs().unwrap();
    let err = pipeline.run_simulation().unwrap_err();
    assert!(matches!(err, PipelineError::ModelLoad(_)));
    assert!(err.to_string().contains("toy_hepatocyte.json"));
}
