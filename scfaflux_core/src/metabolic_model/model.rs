//! This module provides the Model struct for representing an entire metabolic model
use indexmap::IndexMap;
use thiserror::Error;
use tracing::debug;

use crate::metabolic_model::metabolite::Metabolite;
use crate::metabolic_model::reaction::Reaction;
use crate::optimize::problem::{Problem, ProblemError};
use crate::optimize::ProblemSolution;

/// Represents a Genome Scale Metabolic Model
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Model {
    /// Map of reaction ids to Reaction Objects
    pub reactions: IndexMap<String, Reaction>,
    /// Map of metabolite ids to Metabolite Objects
    pub metabolites: IndexMap<String, Metabolite>,
    /// Map of reaction ids to objective function coefficients
    pub objective: IndexMap<String, f64>,
    /// Id associated with the Model
    pub id: Option<String>,
    /// Compartments in the model
    ///
    /// An IndexMap<String, String> of {short name: long name}
    pub compartments: Option<IndexMap<String, String>>,
    /// A version identifier for the Model, stored as a string
    pub version: Option<String>,
}

/// Bounds of every reaction, captured so they can be put back later
#[derive(Clone, Debug, PartialEq)]
pub struct BoundsSnapshot(IndexMap<String, (f64, f64)>);

impl BoundsSnapshot {
    /// Bounds recorded for `reaction_id`
    pub fn get(&self, reaction_id: &str) -> Option<(f64, f64)> {
        self.0.get(reaction_id).copied()
    }

    /// Iterate over (reaction id, bounds) pairs
    pub fn iter(&self) -> impl Iterator<Item = (&String, &(f64, f64))> {
        self.0.iter()
    }
}

impl Model {
    pub fn new_empty() -> Self {
        Model::default()
    }

    /// Add a reaction to the model
    ///
    /// # Parameters
    /// - reaction: Reaction to add
    ///
    /// # Examples
    /// ```rust
    /// use scfaflux_core::metabolic_model::model::Model;
    /// use scfaflux_core::metabolic_model::reaction::ReactionBuilder;
    /// let mut model = Model::new_empty();
    /// let new_reaction = ReactionBuilder::default().id("new_reaction".to_string()).build().unwrap();
    /// model.add_reaction(new_reaction);
    /// assert!(model.has_reaction("new_reaction"));
    /// ```
    pub fn add_reaction(&mut self, reaction: Reaction) {
        let id = reaction.id.clone();
        self.reactions.insert(id, reaction);
    }

    /// Add a metabolite to the model
    pub fn add_metabolite(&mut self, metabolite: Metabolite) {
        let id = metabolite.id.clone();
        self.metabolites.insert(id, metabolite);
    }

    pub fn has_reaction(&self, reaction_id: &str) -> bool {
        self.reactions.contains_key(reaction_id)
    }

    pub fn reaction(&self, reaction_id: &str) -> Result<&Reaction, ModelError> {
        self.reactions
            .get(reaction_id)
            .ok_or_else(|| ModelError::UnknownReaction(reaction_id.to_string()))
    }

    /// Return the first id of `candidates` that names a reaction in the model
    ///
    /// Reconstructions are not consistent about exchange ids, so callers pass every
    /// spelling they know of in order of preference.
    pub fn find_reaction<S: AsRef<str>>(&self, candidates: &[S]) -> Option<&str> {
        candidates
            .iter()
            .map(AsRef::as_ref)
            .find(|id| self.reactions.contains_key(*id))
            .and_then(|id| self.reactions.get_key_value(id).map(|(k, _)| k.as_str()))
    }

    // region Bounds
    /// Set both flux bounds of a reaction
    pub fn set_bounds(
        &mut self,
        reaction_id: &str,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<(), ModelError> {
        if lower_bound > upper_bound || lower_bound.is_nan() || upper_bound.is_nan() {
            return Err(ModelError::InvalidBounds {
                reaction: reaction_id.to_string(),
                lower_bound,
                upper_bound,
            });
        }
        let reaction = self
            .reactions
            .get_mut(reaction_id)
            .ok_or_else(|| ModelError::UnknownReaction(reaction_id.to_string()))?;
        reaction.lower_bound = lower_bound;
        reaction.upper_bound = upper_bound;
        Ok(())
    }

    /// Iterate over the boundary (exchange, demand, sink) reactions
    pub fn boundary_reactions(&self) -> impl Iterator<Item = &Reaction> {
        self.reactions.values().filter(|r| r.is_boundary())
    }

    /// Iterate over the reactions that are not boundary reactions
    pub fn internal_reactions(&self) -> impl Iterator<Item = &Reaction> {
        self.reactions.values().filter(|r| !r.is_boundary())
    }

    /// Capture the current bounds of every reaction
    pub fn snapshot_bounds(&self) -> BoundsSnapshot {
        BoundsSnapshot(
            self.reactions
                .iter()
                .map(|(id, r)| (id.clone(), r.bounds()))
                .collect(),
        )
    }

    /// Put back bounds captured by [`Model::snapshot_bounds`]
    pub fn restore_bounds(&mut self, snapshot: &BoundsSnapshot) {
        for (id, (lb, ub)) in snapshot.iter() {
            if let Some(reaction) = self.reactions.get_mut(id) {
                reaction.lower_bound = *lb;
                reaction.upper_bound = *ub;
            }
        }
    }

    /// Run `f` on the model and restore every reaction's bounds afterwards,
    /// whatever `f` returned
    pub fn with_restored_bounds<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut Model) -> R,
    {
        let snapshot = self.snapshot_bounds();
        let result = f(self);
        self.restore_bounds(&snapshot);
        result
    }
    // endregion Bounds

    // region Objective
    /// Make `reaction_id` the sole objective reaction, with coefficient 1
    pub fn set_objective(&mut self, reaction_id: &str) -> Result<(), ModelError> {
        if !self.has_reaction(reaction_id) {
            return Err(ModelError::UnknownReaction(reaction_id.to_string()));
        }
        self.objective.clear();
        self.objective.insert(reaction_id.to_string(), 1.);
        Ok(())
    }
    // endregion Objective

    // region Optimization
    /// Formulate flux balance analysis as a linear program
    ///
    /// One variable per reaction bounded by the reaction's bounds, one steady state
    /// constraint `S v = 0` per metabolite, and the model objective maximized.
    pub fn build_problem(&self) -> Result<Problem, ProblemError> {
        let mut problem = Problem::new_maximization();
        for reaction in self.reactions.values() {
            problem.add_new_variable(
                &reaction.id,
                reaction.name.as_deref(),
                reaction.lower_bound,
                reaction.upper_bound,
            )?;
        }

        let mut balances: IndexMap<&str, (Vec<&str>, Vec<f64>)> = IndexMap::new();
        for metabolite in self.metabolites.keys() {
            balances.insert(metabolite.as_str(), (Vec::new(), Vec::new()));
        }
        for reaction in self.reactions.values() {
            for (metabolite, coefficient) in &reaction.metabolites {
                let (vars, coefs) = balances.entry(metabolite.as_str()).or_default();
                vars.push(reaction.id.as_str());
                coefs.push(*coefficient);
            }
        }
        for (metabolite, (vars, coefs)) in &balances {
            if vars.is_empty() {
                continue;
            }
            problem.add_new_equality_constraint(metabolite, vars, coefs, 0.)?;
        }

        for (reaction_id, coefficient) in &self.objective {
            problem.add_new_linear_objective_term(reaction_id, *coefficient)?;
        }
        debug!(
            variables = problem.num_variables(),
            constraints = problem.num_constraints(),
            "built flux balance problem"
        );
        Ok(problem)
    }

    /// Run flux balance analysis with the configured solver
    pub fn optimize(&self) -> Result<ProblemSolution, ProblemError> {
        self.build_problem()?.solve()
    }
    // endregion Optimization
}

/// Errors raised when editing a model
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("Reaction {0} is not in the model")]
    UnknownReaction(String),
    #[error("Invalid bounds for {reaction}: lower bound {lower_bound} > upper bound {upper_bound}")]
    InvalidBounds {
        reaction: String,
        lower_bound: f64,
        upper_bound: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metabolic_model::reaction::ReactionBuilder;
    use crate::optimize::OptimizationStatus;

    /// A -> B -> C with uptake of A capped at 10
    fn linear_pathway() -> Model {
        let mut model = Model::new_empty();
        for (id, stoich, lb, ub) in [
            ("EX_a_e", vec![("a_e", -1.)], -10., 1000.),
            ("R1", vec![("a_e", -1.), ("b_c", 1.)], 0., 1000.),
            ("R2", vec![("b_c", -1.), ("c_c", 1.)], 0., 1000.),
            ("DM_c_c", vec![("c_c", -1.)], 0., 1000.),
        ] {
            let metabolites: IndexMap<String, f64> =
                stoich.into_iter().map(|(m, c)| (m.to_string(), c)).collect();
            for met in metabolites.keys() {
                model.add_metabolite(Metabolite::from_id(met));
            }
            model.add_reaction(
                ReactionBuilder::default()
                    .id(id.to_string())
                    .metabolites(metabolites)
                    .lower_bound(lb)
                    .upper_bound(ub)
                    .build()
                    .unwrap(),
            );
        }
        model.set_objective("DM_c_c").unwrap();
        model
    }

    #[test]
    fn find_reaction_candidates() {
        let model = linear_pathway();
        assert_eq!(model.find_reaction(&["EX_a", "EX_a_e"]), Some("EX_a_e"));
        assert_eq!(model.find_reaction(&["nothing", "here"]), None);
        let empty: [&str; 0] = [];
        assert_eq!(model.find_reaction(&empty), None);
    }

    #[test]
    fn boundary_partition() {
        let model = linear_pathway();
        let boundary: Vec<&str> = model.boundary_reactions().map(|r| r.id.as_str()).collect();
        let internal: Vec<&str> = model.internal_reactions().map(|r| r.id.as_str()).collect();
        assert_eq!(boundary, vec!["EX_a_e", "DM_c_c"]);
        assert_eq!(internal, vec!["R1", "R2"]);
    }

    #[test]
    fn set_bounds_checks() {
        let mut model = linear_pathway();
        model.set_bounds("R1", -5., 5.).unwrap();
        assert_eq!(model.reaction("R1").unwrap().bounds(), (-5., 5.));
        assert!(matches!(
            model.set_bounds("R1", 5., -5.),
            Err(ModelError::InvalidBounds { .. })
        ));
        assert_eq!(
            model.set_bounds("R9", 0., 1.),
            Err(ModelError::UnknownReaction("R9".to_string()))
        );
    }

    #[test]
    fn restored_bounds() {
        let mut model = linear_pathway();
        let before = model.snapshot_bounds();
        let changed = model.with_restored_bounds(|m| {
            m.set_bounds("EX_a_e", 0., 0.).unwrap();
            m.reaction("EX_a_e").unwrap().bounds()
        });
        assert_eq!(changed, (0., 0.));
        assert_eq!(model.snapshot_bounds(), before);
    }

    #[test]
    fn optimize_linear_pathway() {
        let model = linear_pathway();
        let problem = model.build_problem().unwrap();
        assert_eq!(problem.num_variables(), 4);
        assert_eq!(problem.num_constraints(), 3);

        let solution = model.optimize().unwrap();
        assert_eq!(solution.status, OptimizationStatus::Optimal);
        assert!((solution.objective_value.unwrap() - 10.).abs() < 1e-6);
        let fluxes = solution.variable_values.unwrap();
        assert!((fluxes["EX_a_e"] + 10.).abs() < 1e-6);
        assert!((fluxes["R2"] - 10.).abs() < 1e-6);
    }
}
