//! Conversion of SBML documents (level 3 with the fbc package) into Models
use std::collections::HashMap;

use indexmap::IndexMap;
use rust_sbml::{Parameter, SpeciesReference};
use thiserror::Error;
use tracing::debug;

use crate::configuration::Configuration;
use crate::metabolic_model::metabolite::Metabolite;
use crate::metabolic_model::model::Model;
use crate::metabolic_model::reaction::{ReactionBuilder, ReactionBuilderError};

const REACTION_PREFIX: &str = "R_";
const SPECIES_PREFIX: &str = "M_";

#[derive(Error, Debug)]
pub enum SbmlError {
    #[error("Unable to parse SBML document: {0}")]
    UnableToParse(String),
    #[error("Reaction {reaction} points to parameter {parameter}, which is not in the model")]
    UnknownParameter { reaction: String, parameter: String },
    #[error("Parameter {0} holds no value")]
    EmptyParameter(String),
    #[error("Unable to build reaction")]
    UnableToBuildReaction(#[from] ReactionBuilderError),
}

/// COBRA exports prefix reaction ids with `R_` and species ids with `M_`
fn strip_prefix<'a>(id: &'a str, prefix: &str) -> &'a str {
    id.strip_prefix(prefix).unwrap_or(id)
}

fn resolve_bound(
    reaction: &str,
    parameter: Option<&String>,
    parameters: &HashMap<String, Parameter>,
    default_parameter: &str,
    fallback: f64,
) -> Result<f64, SbmlError> {
    match parameter {
        Some(id) => parameters
            .get(id)
            .ok_or_else(|| SbmlError::UnknownParameter {
                reaction: reaction.to_string(),
                parameter: id.clone(),
            })?
            .value
            .ok_or_else(|| SbmlError::EmptyParameter(id.clone())),
        None => match parameters.get(default_parameter) {
            Some(param) => param
                .value
                .ok_or_else(|| SbmlError::EmptyParameter(default_parameter.to_string())),
            None => Ok(fallback),
        },
    }
}

fn add_stoichiometry(
    metabolites: &mut IndexMap<String, f64>,
    references: &[SpeciesReference],
    sign: f64,
) {
    for reference in references {
        let id = strip_prefix(&reference.species, SPECIES_PREFIX).to_string();
        *metabolites.entry(id).or_insert(0.) += sign * reference.stoichiometry.unwrap_or(1.);
    }
}

impl Model {
    /// Build a Model from the text of an SBML document
    ///
    /// Reactions and metabolites are sorted by id so that the resulting model (and
    /// any LP built from it) does not depend on hash map iteration order.
    pub fn from_sbml_str(document: &str) -> Result<Model, SbmlError> {
        let sbml = rust_sbml::Model::parse(document)
            .map_err(|err| SbmlError::UnableToParse(err.to_string()))?;
        let configuration = Configuration::current();

        let mut species_ids: Vec<&String> = sbml.species.keys().collect();
        species_ids.sort();
        let mut metabolites: IndexMap<String, Metabolite> = species_ids
            .into_iter()
            .map(|id| {
                let id = strip_prefix(id, SPECIES_PREFIX);
                (id.to_string(), Metabolite::from_id(id))
            })
            .collect();

        let mut reaction_ids: Vec<&String> = sbml.reactions.keys().collect();
        reaction_ids.sort();
        let mut model = Model::new_empty();
        for sbml_id in reaction_ids {
            let reaction = &sbml.reactions[sbml_id];
            let id = strip_prefix(sbml_id, REACTION_PREFIX);
            let lower_bound = resolve_bound(
                id,
                reaction.lower_bound.as_ref(),
                &sbml.parameters,
                "cobra_default_lb",
                configuration.lower_bound,
            )?;
            let upper_bound = resolve_bound(
                id,
                reaction.upper_bound.as_ref(),
                &sbml.parameters,
                "cobra_default_ub",
                configuration.upper_bound,
            )?;
            let mut stoichiometry = IndexMap::new();
            add_stoichiometry(
                &mut stoichiometry,
                &reaction.list_of_reactants.0,
                -1.,
            );
            add_stoichiometry(
                &mut stoichiometry,
                &reaction.list_of_products.0,
                1.,
            );
            for met in stoichiometry.keys() {
                if !metabolites.contains_key(met) {
                    metabolites.insert(met.clone(), Metabolite::from_id(met));
                }
            }
            model.add_reaction(
                ReactionBuilder::default()
                    .id(id.to_string())
                    .metabolites(stoichiometry)
                    .lower_bound(lower_bound)
                    .upper_bound(upper_bound)
                    .build()?,
            );
        }
        model.metabolites = metabolites;

        for objective in &sbml.objectives {
            let id = strip_prefix(objective, REACTION_PREFIX);
            if model.has_reaction(id) {
                model.objective.insert(id.to_string(), 1.);
            }
        }
        debug!(
            reactions = model.reactions.len(),
            metabolites = model.metabolites.len(),
            "converted SBML document"
        );
        Ok(model)
    }
}
