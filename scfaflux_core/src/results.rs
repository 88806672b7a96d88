//! Simulation result rows and the CSV files they are written to
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dose::{DoseTable, REQUIRED_COLUMNS};
use crate::simulation::{ConditionResult, ReactionLookup, SimulationOutcome, PATHWAYS};

pub const PATHWAY_PREFIX: &str = "pathway_";

/// Fixed host columns, in file order; the pathway columns follow them
pub const HOST_COLUMNS: [&str; 12] = [
    "condition",
    "objective_id",
    "objective_value",
    "baseline_objective",
    "objective_delta",
    "objective_pct_change",
    "glucose_flux",
    "oxygen_flux",
    "co2_flux",
    "acetate_flux",
    "propionate_flux",
    "butyrate_flux",
];

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Column {column} is missing from {}", path.display())]
    MissingColumn { column: String, path: PathBuf },
    #[error("{}: row {row}, column {column}: {value:?} is not a number", path.display())]
    NotNumeric {
        path: PathBuf,
        row: usize,
        column: String,
        value: String,
    },
    #[error("Unable to read {}: {source}", path.display())]
    Read { path: PathBuf, source: csv::Error },
    #[error("Unable to draw {}: {message}", path.display())]
    Draw { path: PathBuf, message: String },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Empty cell for missing values
fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// One row of `host_fluxes_by_condition.csv`
#[derive(Clone, Debug, PartialEq)]
pub struct HostFluxRow {
    pub condition: String,
    pub objective_id: String,
    pub objective_value: Option<f64>,
    pub baseline_objective: Option<f64>,
    pub objective_delta: Option<f64>,
    /// Percent change against the baseline, `None` when the baseline is zero or missing
    pub objective_pct_change: Option<f64>,
    pub glucose_flux: Option<f64>,
    pub oxygen_flux: Option<f64>,
    pub co2_flux: Option<f64>,
    pub acetate_flux: Option<f64>,
    pub propionate_flux: Option<f64>,
    pub butyrate_flux: Option<f64>,
    /// `pathway_<reaction id>` -> flux
    pub pathways: IndexMap<String, Option<f64>>,
}

impl HostFluxRow {
    pub fn new(result: &ConditionResult, baseline: &ConditionResult, lookup: &ReactionLookup) -> Self {
        let flux = |id: Option<&str>| id.and_then(|id| result.flux(id));
        let objective_value = result.objective_value;
        let baseline_objective = baseline.objective_value;
        let objective_delta = objective_value
            .zip(baseline_objective)
            .map(|(value, base)| value - base);
        let objective_pct_change = objective_delta
            .zip(baseline_objective)
            .filter(|(_, base)| *base != 0.)
            .map(|(delta, base)| 100. * delta / base);
        let pathways = PATHWAYS
            .iter()
            .map(|(id, _)| (format!("{PATHWAY_PREFIX}{id}"), result.flux(id)))
            .collect();
        HostFluxRow {
            condition: result.label.clone(),
            objective_id: lookup.objective.clone(),
            objective_value,
            baseline_objective,
            objective_delta,
            objective_pct_change,
            glucose_flux: flux(lookup.glucose.as_deref()),
            oxygen_flux: flux(lookup.oxygen.as_deref()),
            co2_flux: flux(lookup.co2.as_deref()),
            acetate_flux: flux(lookup.acetate.as_deref()),
            propionate_flux: flux(lookup.propionate.as_deref()),
            butyrate_flux: flux(lookup.butyrate.as_deref()),
            pathways,
        }
    }

    pub fn rows(outcome: &SimulationOutcome, lookup: &ReactionLookup) -> Vec<HostFluxRow> {
        outcome
            .conditions
            .iter()
            .map(|result| HostFluxRow::new(result, &outcome.baseline, lookup))
            .collect()
    }

    fn header() -> Vec<String> {
        HOST_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(PATHWAYS.iter().map(|(id, _)| format!("{PATHWAY_PREFIX}{id}")))
            .collect()
    }

    /// Cells in [`HostFluxRow::header`] order
    fn record(&self) -> Vec<String> {
        let mut record = vec![self.condition.clone(), self.objective_id.clone()];
        record.extend(
            [
                self.objective_value,
                self.baseline_objective,
                self.objective_delta,
                self.objective_pct_change,
                self.glucose_flux,
                self.oxygen_flux,
                self.co2_flux,
                self.acetate_flux,
                self.propionate_flux,
                self.butyrate_flux,
            ]
            .into_iter()
            .map(cell),
        );
        record.extend(PATHWAYS.iter().map(|(id, _)| {
            cell(
                self.pathways
                    .get(&format!("{PATHWAY_PREFIX}{id}"))
                    .copied()
                    .flatten(),
            )
        }));
        record
    }
}

/// Write `host_fluxes_by_condition.csv`
pub fn write_host_fluxes(path: &Path, rows: &[HostFluxRow]) -> Result<(), RenderError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(HostFluxRow::header())?;
    for row in rows {
        writer.write_record(row.record())?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the dose table left-joined with the host rows on the condition label
pub fn write_merged(path: &Path, doses: &DoseTable, rows: &[HostFluxRow]) -> Result<(), RenderError> {
    let host_header = HostFluxRow::header();
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(
        REQUIRED_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(host_header.iter().skip(1).cloned()),
    )?;
    for condition in doses.iter() {
        let mut record = vec![
            condition.label.clone(),
            condition.acetate.to_string(),
            condition.propionate.to_string(),
            condition.butyrate.to_string(),
        ];
        match rows.iter().find(|r| r.condition == condition.label) {
            Some(row) => record.extend(row.record().into_iter().skip(1)),
            None => record.extend(std::iter::repeat(String::new()).take(host_header.len() - 1)),
        }
        writer.write_record(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// One row of `flux_results.csv`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FluxRecord {
    pub condition: String,
    pub reaction_id: String,
    pub flux: f64,
    pub objective_value: f64,
}

impl FluxRecord {
    /// One record per reaction of every condition that had a solution
    pub fn records(outcome: &SimulationOutcome) -> Vec<FluxRecord> {
        outcome
            .conditions
            .iter()
            .filter_map(|result| result.objective_value.map(|objective| (result, objective)))
            .flat_map(|(result, objective_value)| {
                result.fluxes.iter().map(move |(id, flux)| FluxRecord {
                    condition: result.label.clone(),
                    reaction_id: id.clone(),
                    flux: *flux,
                    objective_value,
                })
            })
            .collect()
    }
}

/// Column names of `flux_results.csv`
pub const FLUX_RESULTS_COLUMNS: [&str; 4] = ["condition", "reaction_id", "flux", "objective_value"];

/// Write `flux_results.csv`, header included even when no condition was feasible
pub fn write_flux_results(path: &Path, records: &[FluxRecord]) -> Result<(), RenderError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(FLUX_RESULTS_COLUMNS)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// A results CSV held as text, columns looked up by name
#[derive(Clone, Debug, PartialEq)]
pub struct ResultsTable {
    path: PathBuf,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ResultsTable {
    pub fn read(path: &Path) -> Result<ResultsTable, RenderError> {
        let file = File::open(path).map_err(|err| RenderError::Read {
            path: path.to_path_buf(),
            source: csv::Error::from(err),
        })?;
        ResultsTable::from_reader(file, path)
    }

    pub fn from_reader<R: Read>(reader: R, path: &Path) -> Result<ResultsTable, RenderError> {
        let read_error = |source| RenderError::Read {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = csv::Reader::from_reader(reader);
        let headers = reader
            .headers()
            .map_err(read_error)?
            .iter()
            .map(String::from)
            .collect();
        let rows = reader
            .records()
            .map(|record| {
                record
                    .map(|r| r.iter().map(String::from).collect())
                    .map_err(read_error)
            })
            .collect::<Result<Vec<Vec<String>>, _>>()?;
        Ok(ResultsTable {
            path: path.to_path_buf(),
            headers,
            rows,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }

    fn position(&self, name: &str) -> Result<usize, RenderError> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| RenderError::MissingColumn {
                column: name.to_string(),
                path: self.path.clone(),
            })
    }

    /// Raw cells of a column
    pub fn text_column(&self, name: &str) -> Result<Vec<String>, RenderError> {
        let at = self.position(name)?;
        Ok(self
            .rows
            .iter()
            .map(|row| row.get(at).cloned().unwrap_or_default())
            .collect())
    }

    /// Numeric cells of a column; empty and `NaN` cells are `None`
    pub fn column(&self, name: &str) -> Result<Vec<Option<f64>>, RenderError> {
        let at = self.position(name)?;
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let raw = row.get(at).map(|s| s.trim()).unwrap_or_default();
                if raw.is_empty() {
                    return Ok(None);
                }
                raw.parse::<f64>()
                    .map(|v| Some(v).filter(|v| !v.is_nan()))
                    .map_err(|_| RenderError::NotNumeric {
                        path: self.path.clone(),
                        row: i + 2,
                        column: name.to_string(),
                        value: raw.to_string(),
                    })
            })
            .collect()
    }

    /// Reorder rows to follow `order` on the `condition` column; unlisted labels go last
    pub fn sort_by_conditions(&mut self, order: &[String]) -> Result<(), RenderError> {
        let at = self.position("condition")?;
        self.rows.sort_by_key(|row| {
            row.get(at)
                .and_then(|label| order.iter().position(|o| o == label))
                .unwrap_or(order.len())
        });
        Ok(())
    }

    /// Copy the named columns, renamed, to a new CSV; every column must exist
    pub fn write_columns(&self, path: &Path, columns: &[(&str, &str)]) -> Result<(), RenderError> {
        let positions = columns
            .iter()
            .map(|(name, _)| self.position(name))
            .collect::<Result<Vec<usize>, _>>()?;
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(columns.iter().map(|(_, renamed)| *renamed))?;
        for row in &self.rows {
            writer.write_record(
                positions
                    .iter()
                    .map(|at| row.get(*at).map(String::as_str).unwrap_or_default()),
            )?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::OptimizationStatus;

    fn lookup() -> ReactionLookup {
        ReactionLookup {
            objective: "ATPM".to_string(),
            glucose: Some("EX_glc__D_e".to_string()),
            oxygen: Some("EX_o2_e".to_string()),
            co2: None,
            acetate: Some("EX_ac_e".to_string()),
            propionate: None,
            butyrate: None,
        }
    }

    fn result(label: &str, objective: Option<f64>, fluxes: &[(&str, f64)]) -> ConditionResult {
        ConditionResult {
            label: label.to_string(),
            status: if objective.is_some() {
                OptimizationStatus::Optimal
            } else {
                OptimizationStatus::Infeasible
            },
            objective_value: objective,
            fluxes: fluxes.iter().map(|(id, v)| (id.to_string(), *v)).collect(),
        }
    }

    #[test]
    fn host_row_changes() {
        let baseline = result("baseline", Some(20.), &[]);
        let low = result(
            "Low",
            Some(25.),
            &[("EX_glc__D_e", -1.), ("EX_ac_e", -2.), ("PYK", 3.)],
        );
        let row = HostFluxRow::new(&low, &baseline, &lookup());
        assert_eq!(row.objective_delta, Some(5.));
        assert_eq!(row.objective_pct_change, Some(25.));
        assert_eq!(row.glucose_flux, Some(-1.));
        // absent from the result
        assert_eq!(row.oxygen_flux, None);
        // absent from the model
        assert_eq!(row.co2_flux, None);
        assert_eq!(row.pathways["pathway_PYK"], Some(3.));
        assert_eq!(row.pathways["pathway_PDHm"], None);
        assert_eq!(row.pathways.len(), PATHWAYS.len());
    }

    #[test]
    fn null_policy() {
        let zero_baseline = result("baseline", Some(0.), &[]);
        let low = result("Low", Some(5.), &[]);
        let row = HostFluxRow::new(&low, &zero_baseline, &lookup());
        assert_eq!(row.objective_delta, Some(5.));
        assert_eq!(row.objective_pct_change, None);

        let infeasible_baseline = result("baseline", None, &[]);
        let row = HostFluxRow::new(&low, &infeasible_baseline, &lookup());
        assert_eq!(row.baseline_objective, None);
        assert_eq!(row.objective_delta, None);
        assert_eq!(row.objective_pct_change, None);

        let infeasible = result("Mid", None, &[]);
        let row = HostFluxRow::new(&infeasible, &zero_baseline, &lookup());
        assert_eq!(row.objective_value, None);
        assert_eq!(row.acetate_flux, None);
    }

    #[test]
    fn merged_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merged.csv");
        let baseline = result("baseline", Some(20.), &[]);
        let rows = vec![
            HostFluxRow::new(&result("Low", Some(25.), &[("EX_ac_e", -2.)]), &baseline, &lookup()),
            HostFluxRow::new(&result("High", None, &[]), &baseline, &lookup()),
        ];
        write_merged(&path, &DoseTable::reference(), &rows).unwrap();

        let table = ResultsTable::read(&path).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.headers().len(), 4 + HOST_COLUMNS.len() - 1 + PATHWAYS.len());
        assert_eq!(table.text_column("condition").unwrap(), vec!["Low", "Mid", "High"]);
        assert_eq!(
            table.column("objective_value").unwrap(),
            vec![Some(25.), None, None]
        );
        assert_eq!(
            table.column("acetate_mmol_gDW_hr").unwrap(),
            vec![Some(2.), Some(4.), Some(8.)]
        );
        assert_eq!(table.text_column("objective_id").unwrap()[1], "");
        assert!(matches!(
            table.column("biomass"),
            Err(RenderError::MissingColumn { .. })
        ));
    }

    #[test]
    fn flux_records_skip_infeasible() {
        let outcome = SimulationOutcome {
            baseline: result("baseline", Some(1.), &[]),
            conditions: vec![
                result("Low", Some(2.), &[("A", 1.), ("B", 0.)]),
                result("Mid", None, &[]),
            ],
        };
        let records = FluxRecord::records(&outcome);
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.condition == "Low" && r.objective_value == 2.));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flux_results.csv");
        write_flux_results(&path, &records).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.starts_with("condition,reaction_id,flux,objective_value\n"));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn all_infeasible_flux_results_keep_header() {
        let outcome = SimulationOutcome {
            baseline: result("baseline", Some(1.), &[]),
            conditions: vec![result("Low", None, &[]), result("Mid", None, &[])],
        };
        let records = FluxRecord::records(&outcome);
        assert!(records.is_empty());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flux_results.csv");
        write_flux_results(&path, &records).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text, "condition,reaction_id,flux,objective_value\n");
    }

    #[test]
    fn sort_and_parse() {
        let csv = "condition,x\nHigh,3\nLow,\nMid,NaN\n";
        let mut table = ResultsTable::from_reader(csv.as_bytes(), Path::new("t.csv")).unwrap();
        table
            .sort_by_conditions(&["Low".to_string(), "Mid".to_string(), "High".to_string()])
            .unwrap();
        assert_eq!(table.column("x").unwrap(), vec![None, None, Some(3.)]);
        let bad = ResultsTable::from_reader("condition,x\nLow,abc\n".as_bytes(), Path::new("t.csv"))
            .unwrap();
        assert!(matches!(bad.column("x"), Err(RenderError::NotNumeric { row: 2, .. })));
    }
}
