//! Module providing JSON IO for Models, in the COBRA JSON layout
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::metabolic_model::metabolite::Metabolite;
use crate::metabolic_model::model::Model;
use crate::metabolic_model::reaction::{Reaction, ReactionBuilder, ReactionBuilderError};

// region JSON Model
/// Represents a JSON serialized model, used for reading and writing models in json format
///
/// Genes and any other keys present in the file are ignored.
#[derive(Serialize, Deserialize)]
struct JsonModel {
    metabolites: Vec<JsonMetabolite>,
    reactions: Vec<JsonReaction>,
    id: Option<String>,
    compartments: Option<IndexMap<String, String>>,
    version: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct JsonMetabolite {
    id: String,
    name: Option<String>,
    compartment: Option<String>,
    charge: Option<i32>,
    formula: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct JsonReaction {
    id: String,
    name: Option<String>,
    metabolites: IndexMap<String, f64>,
    #[serde(serialize_with = "flux_bound::serialize", deserialize_with = "flux_bound::lower")]
    lower_bound: f64,
    #[serde(serialize_with = "flux_bound::serialize", deserialize_with = "flux_bound::upper")]
    upper_bound: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    objective_coefficient: Option<f64>,
    subsystem: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    annotation: Option<Value>,
}

/// JSON has no infinity: unbounded fluxes are written as `"inf"` / `"-inf"`
///
/// On reading, a `null` bound (how other tools write a non-finite float) is taken
/// as unbounded in its direction.
mod flux_bound {
    use serde::de::Error as _;
    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawBound {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            Err(S::Error::custom("flux bound is NaN"))
        } else if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if *value > 0. {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    fn parse(raw: Option<RawBound>, unbounded: f64) -> Result<f64, String> {
        match raw {
            None => Ok(unbounded),
            Some(RawBound::Number(value)) => Ok(value),
            Some(RawBound::Text(text)) => match text.trim().to_lowercase().as_str() {
                "inf" | "+inf" | "infinity" => Ok(f64::INFINITY),
                "-inf" | "-infinity" => Ok(f64::NEG_INFINITY),
                other => other
                    .parse::<f64>()
                    .map_err(|_| format!("invalid flux bound {text:?}")),
            },
        }
    }

    pub fn lower<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        parse(Option::deserialize(deserializer)?, f64::NEG_INFINITY).map_err(D::Error::custom)
    }

    pub fn upper<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        parse(Option::deserialize(deserializer)?, f64::INFINITY).map_err(D::Error::custom)
    }
}
// endregion JSON Model

// region Conversions
impl From<JsonMetabolite> for Metabolite {
    fn from(m: JsonMetabolite) -> Self {
        Self {
            id: m.id,
            name: m.name,
            compartment: m.compartment,
            charge: m.charge.unwrap_or_default(),
            formula: m.formula,
        }
    }
}

impl From<Metabolite> for JsonMetabolite {
    fn from(m: Metabolite) -> Self {
        Self {
            id: m.id,
            name: m.name,
            compartment: m.compartment,
            charge: Some(m.charge),
            formula: m.formula,
        }
    }
}

/// Notes and annotations are kept as JSON strings on the model side
fn string_to_value(s: &str) -> Value {
    serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.to_string()))
}

impl Model {
    /// Read a COBRA JSON model
    pub fn read_json<P: AsRef<Path>>(path: P) -> Result<Model, JsonError> {
        let model_str = fs::read_to_string(path)
            .map_err(|err| JsonError::UnableToRead(err.to_string()))?;
        Model::from_json_str(&model_str)
    }

    /// Parse a COBRA JSON model held in memory
    pub fn from_json_str(model_str: &str) -> Result<Model, JsonError> {
        let json_model = serde_json::from_str::<JsonModel>(model_str)
            .map_err(|err| JsonError::UnableToParse(err.to_string()))?;
        Model::from_json(json_model)
    }

    /// Write the model as COBRA JSON
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<(), JsonError> {
        let json_model = self.to_json();
        let model_string = serde_json::to_string(&json_model)?;
        fs::write(path, model_string)?;
        Ok(())
    }

    fn from_json(json_model: JsonModel) -> Result<Self, JsonError> {
        let mut reactions: IndexMap<String, Reaction> = IndexMap::new();
        let mut objective: IndexMap<String, f64> = IndexMap::new();
        let metabolites: IndexMap<String, Metabolite> = json_model
            .metabolites
            .into_iter()
            .map(|m| (m.id.clone(), Metabolite::from(m)))
            .collect();
        for rxn in json_model.reactions {
            if let Some(unknown) = rxn
                .metabolites
                .keys()
                .find(|m| !metabolites.contains_key(*m))
            {
                return Err(JsonError::UnknownMetabolite {
                    reaction: rxn.id,
                    metabolite: unknown.clone(),
                });
            }
            let new_reaction = ReactionBuilder::default()
                .id(rxn.id.clone())
                .metabolites(rxn.metabolites)
                .name(rxn.name)
                .lower_bound(rxn.lower_bound)
                .upper_bound(rxn.upper_bound)
                .subsystem(rxn.subsystem)
                .notes(rxn.notes.map(|v| v.to_string()))
                .annotation(rxn.annotation.map(|v| v.to_string()))
                .build()?;
            // Zero coefficients are written by some tools for every reaction
            if let Some(coef) = rxn.objective_coefficient.filter(|c| *c != 0.) {
                objective.insert(rxn.id.clone(), coef);
            }
            reactions.insert(rxn.id, new_reaction);
        }
        Ok(Model {
            reactions,
            metabolites,
            objective,
            id: json_model.id,
            compartments: json_model.compartments,
            version: json_model.version,
        })
    }

    fn to_json(&self) -> JsonModel {
        let json_metabolites: Vec<JsonMetabolite> = self
            .metabolites
            .values()
            .map(|m| m.clone().into())
            .collect();
        let json_reactions: Vec<JsonReaction> = self
            .reactions
            .values()
            .map(|r| JsonReaction {
                id: r.id.clone(),
                name: r.name.clone(),
                metabolites: r.metabolites.clone(),
                lower_bound: r.lower_bound,
                upper_bound: r.upper_bound,
                objective_coefficient: self.objective.get(&r.id).copied(),
                subsystem: r.subsystem.clone(),
                notes: r.notes.as_deref().map(string_to_value),
                annotation: r.annotation.as_deref().map(string_to_value),
            })
            .collect();

        JsonModel {
            metabolites: json_metabolites,
            reactions: json_reactions,
            id: self.id.clone(),
            compartments: self.compartments.clone(),
            version: self.version.clone(),
        }
    }
}
// endregion Conversions

#[derive(Error, Debug)]
pub enum JsonError {
    #[error("Unable to read file due to {0}")]
    UnableToRead(String),
    #[error("Unable to parse json due to {0}")]
    UnableToParse(String),
    #[error("Reaction {reaction} uses metabolite {metabolite}, which is not declared")]
    UnknownMetabolite { reaction: String, metabolite: String },
    #[error("Unable to build reaction")]
    UnableToBuildReaction(#[from] ReactionBuilderError),
    #[error("Serde json parse error")]
    SerdeJsonParseError(#[from] serde_json::Error),
    #[error("Unable to write to file")]
    UnableToWrite(#[from] std::io::Error),
}
