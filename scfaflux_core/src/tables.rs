//! Publication tables drawn from the merged results table
use std::path::{Path, PathBuf};

use tracing::info;

use crate::dose::{Scfa, ACETATE_COLUMN, BUTYRATE_COLUMN, CONDITION_COLUMN, PROPIONATE_COLUMN};
use crate::results::{RenderError, ResultsTable, HOST_COLUMNS};

pub const SCFA_INPUTS_TABLE: &str = "table_scfa_inputs.csv";
pub const HOST_FLUXES_TABLE: &str = "table_host_fluxes.csv";
pub const SUMMARY_TABLE: &str = "table_summary.csv";

const SCFA_INPUT_COLUMNS: [(&str, &str); 4] = [
    (CONDITION_COLUMN, "Condition"),
    (ACETATE_COLUMN, "Acetate (mmol/gDW/hr)"),
    (PROPIONATE_COLUMN, "Propionate (mmol/gDW/hr)"),
    (BUTYRATE_COLUMN, "Butyrate (mmol/gDW/hr)"),
];

/// Host columns present in the table, in [`HOST_COLUMNS`] order
fn host_columns(table: &ResultsTable) -> Vec<(&'static str, &'static str)> {
    HOST_COLUMNS
        .iter()
        .filter(|c| table.has_column(c))
        .map(|c| (*c, *c))
        .collect()
}

/// Condition and objective, then dose and flux of each SCFA, for the columns present
fn summary_columns(table: &ResultsTable) -> Vec<(String, String)> {
    let mut columns: Vec<String> = vec![CONDITION_COLUMN.to_string(), "objective_value".to_string()];
    for scfa in Scfa::ALL {
        columns.push(scfa.column().to_string());
        columns.push(format!("{}_flux", scfa.name()));
    }
    columns
        .into_iter()
        .filter(|c| table.has_column(c))
        .map(|c| (c.clone(), c))
        .collect()
}

/// Write the three tables into `tables_dir`, returning the files written
pub fn make_tables(
    merged: &Path,
    tables_dir: &Path,
    conditions: &[String],
) -> Result<Vec<PathBuf>, RenderError> {
    let mut table = ResultsTable::read(merged)?;
    table.sort_by_conditions(conditions)?;

    let inputs = tables_dir.join(SCFA_INPUTS_TABLE);
    table.write_columns(&inputs, &SCFA_INPUT_COLUMNS)?;
    info!(path = %inputs.display(), "wrote table");

    let host = tables_dir.join(HOST_FLUXES_TABLE);
    table.write_columns(&host, &host_columns(&table))?;
    info!(path = %host.display(), "wrote table");

    let summary = tables_dir.join(SUMMARY_TABLE);
    let summary_columns = summary_columns(&table);
    let borrowed: Vec<(&str, &str)> = summary_columns
        .iter()
        .map(|(name, renamed)| (name.as_str(), renamed.as_str()))
        .collect();
    table.write_columns(&summary, &borrowed)?;
    info!(path = %summary.display(), "wrote table");

    Ok(vec![inputs, host, summary])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const MERGED: &str = "\
condition,acetate_mmol_gDW_hr,propionate_mmol_gDW_hr,butyrate_mmol_gDW_hr,objective_id,objective_value,acetate_flux,butyrate_flux,pathway_PYK
Mid,4,1.4,0.8,ATPM,73.2,-4,-0.8,0
Low,2,0.7,0.4,ATPM,47.6,-2,-0.4,0
High,8,2.8,1.6,ATPM,,,,
";

    fn conditions() -> Vec<String> {
        vec!["Low".to_string(), "Mid".to_string(), "High".to_string()]
    }

    #[test]
    fn writes_three_tables() {
        let dir = tempfile::tempdir().unwrap();
        let merged = dir.path().join("merged.csv");
        fs::write(&merged, MERGED).unwrap();
        let written = make_tables(&merged, dir.path(), &conditions()).unwrap();
        assert_eq!(written.len(), 3);

        let inputs = fs::read_to_string(dir.path().join(SCFA_INPUTS_TABLE)).unwrap();
        assert_eq!(
            inputs,
            "Condition,Acetate (mmol/gDW/hr),Propionate (mmol/gDW/hr),Butyrate (mmol/gDW/hr)\n\
             Low,2,0.7,0.4\nMid,4,1.4,0.8\nHigh,8,2.8,1.6\n"
        );

        let host = fs::read_to_string(dir.path().join(HOST_FLUXES_TABLE)).unwrap();
        let mut lines = host.lines();
        assert_eq!(
            lines.next().unwrap(),
            "condition,objective_id,objective_value,acetate_flux,butyrate_flux"
        );
        assert_eq!(lines.next().unwrap(), "Low,ATPM,47.6,-2,-0.4");
        assert_eq!(lines.nth(1).unwrap(), "High,ATPM,,,");

        let summary = fs::read_to_string(dir.path().join(SUMMARY_TABLE)).unwrap();
        assert_eq!(
            summary.lines().next().unwrap(),
            "condition,objective_value,acetate_mmol_gDW_hr,acetate_flux,\
             propionate_mmol_gDW_hr,butyrate_mmol_gDW_hr,butyrate_flux"
        );
    }

    #[test]
    fn dose_columns_required() {
        let dir = tempfile::tempdir().unwrap();
        let merged = dir.path().join("merged.csv");
        fs::write(&merged, "condition,objective_value\nLow,1\n").unwrap();
        assert!(matches!(
            make_tables(&merged, dir.path(), &conditions()),
            Err(RenderError::MissingColumn { .. })
        ));
    }

    #[test]
    fn unreadable_merged_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            make_tables(&dir.path().join("absent.csv"), dir.path(), &conditions()),
            Err(RenderError::Read { .. })
        ));
    }
}
