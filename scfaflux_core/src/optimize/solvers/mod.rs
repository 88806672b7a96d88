//! Solver interfaces
//!
//! A [`Solver`] receives the variables, constraints and objective of a
//! [`Problem`](crate::optimize::problem::Problem) by id, and returns a
//! [`ProblemSolution`].
pub mod clarabel;
#[cfg(feature = "minilp")]
pub mod microlp;

use thiserror::Error;

use crate::optimize::objective::ObjectiveSense;
use crate::optimize::ProblemSolution;

pub trait Solver {
    /// Add a continuous variable
    fn add_continuous_variable(
        &mut self,
        id: &str,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<(), SolverError>;

    /// Add the constraint sum(coefficients*variables) = equals
    fn add_equality_constraint(
        &mut self,
        id: &str,
        variables: Vec<&str>,
        coefficients: Vec<f64>,
        equals: f64,
    ) -> Result<(), SolverError>;

    /// Add the constraint lower_bound <= sum(coefficients*variables) <= upper_bound
    fn add_inequality_constraint(
        &mut self,
        id: &str,
        variables: Vec<&str>,
        coefficients: Vec<f64>,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<(), SolverError>;

    fn add_linear_objective_term(
        &mut self,
        variable_id: &str,
        coefficient: f64,
    ) -> Result<(), SolverError>;

    fn set_objective_sense(&mut self, objective_sense: ObjectiveSense) -> Result<(), SolverError>;

    fn clear_objective(&mut self) -> Result<(), SolverError>;

    fn solve(&mut self) -> Result<ProblemSolution, SolverError>;
}

/// Errors raised while handing a problem to a solver
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("Variable {0} was added to the solver twice")]
    DuplicateVariable(String),
    #[error("Variable {0} is not known to the solver")]
    UnknownVariable(String),
    #[error("Solver rejected its settings: {0}")]
    InvalidSettings(String),
    #[error("Solver {0} is not available, enable the matching cargo feature")]
    Unavailable(String),
}

/// Resolve variable ids to column indices, dropping zero coefficients
pub(crate) fn lookup_terms(
    index: &indexmap::IndexMap<String, (f64, f64)>,
    variables: &[&str],
    coefficients: &[f64],
) -> Result<Vec<(usize, f64)>, SolverError> {
    variables
        .iter()
        .zip(coefficients)
        .filter(|(_, coef)| **coef != 0.)
        .map(|(var, coef)| match index.get_index_of(*var) {
            Some(i) => Ok((i, *coef)),
            None => Err(SolverError::UnknownVariable(var.to_string())),
        })
        .collect()
}
