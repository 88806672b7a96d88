//! SCFA dose table: reading, validation and the canonical copy
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

pub const CONDITION_COLUMN: &str = "condition";
pub const ACETATE_COLUMN: &str = "acetate_mmol_gDW_hr";
pub const PROPIONATE_COLUMN: &str = "propionate_mmol_gDW_hr";
pub const BUTYRATE_COLUMN: &str = "butyrate_mmol_gDW_hr";

/// Columns the dose table must carry; any others are ignored
pub const REQUIRED_COLUMNS: [&str; 4] = [
    CONDITION_COLUMN,
    ACETATE_COLUMN,
    PROPIONATE_COLUMN,
    BUTYRATE_COLUMN,
];

/// The three short-chain fatty acids dosed to the host
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scfa {
    Acetate,
    Propionate,
    Butyrate,
}

impl Scfa {
    pub const ALL: [Scfa; 3] = [Scfa::Acetate, Scfa::Propionate, Scfa::Butyrate];

    pub fn name(&self) -> &'static str {
        match self {
            Scfa::Acetate => "acetate",
            Scfa::Propionate => "propionate",
            Scfa::Butyrate => "butyrate",
        }
    }

    /// Dose column of this SCFA in the input table
    pub fn column(&self) -> &'static str {
        match self {
            Scfa::Acetate => ACETATE_COLUMN,
            Scfa::Propionate => PROPIONATE_COLUMN,
            Scfa::Butyrate => BUTYRATE_COLUMN,
        }
    }
}

/// One dose condition, doses in mmol/gDW/hr
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DoseCondition {
    #[serde(rename = "condition")]
    pub label: String,
    #[serde(rename = "acetate_mmol_gDW_hr")]
    pub acetate: f64,
    #[serde(rename = "propionate_mmol_gDW_hr")]
    pub propionate: f64,
    #[serde(rename = "butyrate_mmol_gDW_hr")]
    pub butyrate: f64,
}

impl DoseCondition {
    pub fn new(label: &str, acetate: f64, propionate: f64, butyrate: f64) -> Self {
        DoseCondition {
            label: label.to_string(),
            acetate,
            propionate,
            butyrate,
        }
    }

    pub fn dose(&self, scfa: Scfa) -> f64 {
        match scfa {
            Scfa::Acetate => self.acetate,
            Scfa::Propionate => self.propionate,
            Scfa::Butyrate => self.butyrate,
        }
    }
}

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Dose table is missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("Dose table has no row for condition {0}")]
    MissingCondition(String),
    #[error("Row {row}: unexpected condition {label}")]
    UnexpectedCondition { row: usize, label: String },
    #[error("Row {row}: condition {label} appears more than once")]
    DuplicateCondition { row: usize, label: String },
    #[error("Row {row}: {column} value {value:?} is not a number")]
    NotNumeric {
        row: usize,
        column: String,
        value: String,
    },
    #[error("Row {row}: {column} is negative ({value})")]
    Negative {
        row: usize,
        column: String,
        value: f64,
    },
    #[error("{column} decreases from {previous} ({previous_value}) to {label} ({value})")]
    NonMonotonic {
        column: String,
        previous: String,
        previous_value: f64,
        label: String,
        value: f64,
    },
    #[error("Unable to read dose table: {0}")]
    Csv(#[from] csv::Error),
    #[error("Unable to access dose table: {0}")]
    Io(#[from] std::io::Error),
}

/// Validated dose conditions, in configured condition order
#[derive(Clone, Debug, PartialEq)]
pub struct DoseTable {
    conditions: Vec<DoseCondition>,
}

impl DoseTable {
    /// The reference Low / Mid / High dose table
    pub fn reference() -> DoseTable {
        DoseTable {
            conditions: vec![
                DoseCondition::new("Low", 2.0, 0.7, 0.4),
                DoseCondition::new("Mid", 4.0, 1.4, 0.8),
                DoseCondition::new("High", 8.0, 2.8, 1.6),
            ],
        }
    }

    /// Read and validate a dose table CSV against the expected condition labels
    pub fn read(path: &Path, expected: &[String]) -> Result<DoseTable, ValidationError> {
        let table = DoseTable::from_reader(File::open(path)?, expected)?;
        info!(path = %path.display(), conditions = table.len(), "validated dose table");
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R, expected: &[String]) -> Result<DoseTable, ValidationError> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers = reader.headers()?.clone();
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|col| !headers.iter().any(|h| h == **col))
            .map(|col| col.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ValidationError::MissingColumns(missing));
        }
        let position = |name: &str| headers.iter().position(|h| h == name).unwrap_or_default();
        let label_at = position(CONDITION_COLUMN);
        let dose_at: Vec<(Scfa, usize)> = Scfa::ALL
            .iter()
            .map(|scfa| (*scfa, position(scfa.column())))
            .collect();

        let mut rows: Vec<DoseCondition> = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record?;
            // Header is line 1
            let row = i + 2;
            let label = record.get(label_at).unwrap_or_default().to_string();
            if !expected.contains(&label) {
                return Err(ValidationError::UnexpectedCondition { row, label });
            }
            if rows.iter().any(|r| r.label == label) {
                return Err(ValidationError::DuplicateCondition { row, label });
            }
            let mut doses = [0.; 3];
            for (slot, (scfa, at)) in doses.iter_mut().zip(&dose_at) {
                let raw = record.get(*at).unwrap_or_default();
                let value = raw
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| ValidationError::NotNumeric {
                        row,
                        column: scfa.column().to_string(),
                        value: raw.to_string(),
                    })?;
                if value < 0. {
                    return Err(ValidationError::Negative {
                        row,
                        column: scfa.column().to_string(),
                        value,
                    });
                }
                *slot = value;
            }
            rows.push(DoseCondition::new(&label, doses[0], doses[1], doses[2]));
        }

        let mut conditions = Vec::with_capacity(expected.len());
        for label in expected {
            let position = rows
                .iter()
                .position(|r| &r.label == label)
                .ok_or_else(|| ValidationError::MissingCondition(label.clone()))?;
            conditions.push(rows.swap_remove(position));
        }
        let table = DoseTable { conditions };
        table.check_monotonic()?;
        Ok(table)
    }

    /// Doses may not decrease along the condition order
    fn check_monotonic(&self) -> Result<(), ValidationError> {
        for pair in self.conditions.windows(2) {
            for scfa in Scfa::ALL {
                let (previous, current) = (pair[0].dose(scfa), pair[1].dose(scfa));
                if current < previous {
                    return Err(ValidationError::NonMonotonic {
                        column: scfa.column().to_string(),
                        previous: pair[0].label.clone(),
                        previous_value: previous,
                        label: pair[1].label.clone(),
                        value: current,
                    });
                }
            }
        }
        Ok(())
    }

    /// Write the table with the input column names, in condition order
    pub fn write(&self, path: &Path) -> Result<(), ValidationError> {
        let mut writer = csv::Writer::from_path(path)?;
        for condition in &self.conditions {
            writer.serialize(condition)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn get(&self, label: &str) -> Option<&DoseCondition> {
        self.conditions.iter().find(|c| c.label == label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DoseCondition> {
        self.conditions.iter()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.conditions.iter().map(|c| c.label.as_str()).collect()
    }
}
