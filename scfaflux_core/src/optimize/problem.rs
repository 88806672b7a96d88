//! Provides struct representing an optimization problem
use indexmap::IndexMap;
use thiserror::Error;
use tracing::debug;

use crate::configuration::{Configuration, Solver as SolverChoice};
use crate::optimize::constraint::Constraint;
use crate::optimize::objective::{Objective, ObjectiveSense, ObjectiveTerm};
use crate::optimize::solvers::clarabel::ClarabelSolver;
use crate::optimize::solvers::{Solver, SolverError};
use crate::optimize::variable::{Variable, VariableBuilder};
use crate::optimize::ProblemSolution;

/// A linear optimization problem
#[derive(Debug, Clone)]
pub struct Problem {
    /// Objective to optimize
    objective: Objective,
    /// Variables of the optimization problem
    variables: IndexMap<String, Variable>,
    /// Constraints of the optimization problem
    constraints: IndexMap<String, Constraint>,
}

impl Problem {
    // region Creation Functions
    /// Create a new optimization problem
    pub fn new(objective_sense: ObjectiveSense) -> Self {
        Self {
            objective: Objective::new(objective_sense),
            variables: IndexMap::new(),
            constraints: IndexMap::new(),
        }
    }

    /// Create a new maximization problem
    pub fn new_maximization() -> Self {
        Self::new(ObjectiveSense::Maximize)
    }

    // endregion Creation Functions

    // region Adding Variables
    /// Add a variable to the optimization problem
    pub fn add_variable(&mut self, mut variable: Variable) -> Result<(), ProblemError> {
        self.validate_variable(&variable)?;
        variable.index = self.variables.len();
        self.variables.insert(variable.id.clone(), variable);
        Ok(())
    }

    /// Create a new variable and add it to the optimization problem
    pub fn add_new_variable(
        &mut self,
        id: &str,
        name: Option<&str>,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<(), ProblemError> {
        let new_var = VariableBuilder::default()
            .id(id)
            .name(name.map(str::to_string))
            .lower_bound(lower_bound)
            .upper_bound(upper_bound)
            .build()
            .map_err(|err| ProblemError::InvalidVariable(err.to_string()))?;
        self.add_variable(new_var)
    }
    // endregion Adding Variables

    // region Adding Constraints
    /// Add a constraint to the problem
    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<(), ProblemError> {
        self.validate_constraint(&constraint)?;
        self.constraints
            .insert(constraint.get_id().to_string(), constraint);
        Ok(())
    }

    /// Create a new equality constraint and add it to the model
    pub fn add_new_equality_constraint(
        &mut self,
        id: &str,
        variables: &[&str],
        coefficients: &[f64],
        equals: f64,
    ) -> Result<(), ProblemError> {
        self.add_constraint(Constraint::new_equality(
            id,
            variables,
            coefficients,
            equals,
        ))
    }

    /// Create a new inequality constraint and add it to the model
    pub fn add_new_inequality_constraint(
        &mut self,
        id: &str,
        variables: &[&str],
        coefficients: &[f64],
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<(), ProblemError> {
        self.add_constraint(Constraint::new_inequality(
            id,
            variables,
            coefficients,
            lower_bound,
            upper_bound,
        ))
    }
    // endregion Adding Constraints

    // region Objective Terms
    /// Add a new linear term to the objective using the variable id
    pub fn add_new_linear_objective_term(
        &mut self,
        variable_id: &str,
        coefficient: f64,
    ) -> Result<(), ProblemError> {
        if !self.variables.contains_key(variable_id) {
            return Err(ProblemError::NonExistentVariablesInObjective);
        }
        self.objective
            .add_term(ObjectiveTerm::new(variable_id, coefficient));
        Ok(())
    }
    // endregion Objective Terms

    /// Number of variables in the problem
    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// Number of constraints in the problem
    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    // region Solving
    /// Solve the problem with the solver selected in the global [`Configuration`]
    pub fn solve(&self) -> Result<ProblemSolution, ProblemError> {
        match Configuration::current().solver {
            SolverChoice::Clarabel => self.solve_with(ClarabelSolver::default()),
            SolverChoice::MicroLp => {
                cfg_if::cfg_if! {
                    if #[cfg(feature = "minilp")] {
                        self.solve_with(crate::optimize::solvers::microlp::MicroLpSolver::default())
                    } else {
                        Err(ProblemError::Solver(SolverError::Unavailable("microlp".to_string())))
                    }
                }
            }
        }
    }

    /// Hand the problem to `solver` and solve it
    pub fn solve_with<S: Solver>(&self, mut solver: S) -> Result<ProblemSolution, ProblemError> {
        for var in self.variables.values() {
            solver.add_continuous_variable(&var.id, var.lower_bound, var.upper_bound)?;
        }
        for constraint in self.constraints.values() {
            let variables: Vec<&str> = constraint
                .get_terms()
                .iter()
                .map(|t| t.variable.as_str())
                .collect();
            let coefficients: Vec<f64> =
                constraint.get_terms().iter().map(|t| t.coefficient).collect();
            match constraint {
                Constraint::Equality { id, equals, .. } => {
                    solver.add_equality_constraint(id, variables, coefficients, *equals)?
                }
                Constraint::Inequality {
                    id,
                    lower_bound,
                    upper_bound,
                    ..
                } => solver.add_inequality_constraint(
                    id,
                    variables,
                    coefficients,
                    *lower_bound,
                    *upper_bound,
                )?,
            }
        }
        debug!(
            variables = self.variables.len(),
            fixed = self.variables.values().filter(|v| v.is_fixed()).count(),
            constraints = self.constraints.len(),
            "problem handed to solver"
        );
        solver.clear_objective()?;
        solver.set_objective_sense(self.objective.sense())?;
        for term in self.objective.terms() {
            solver.add_linear_objective_term(&term.variable, term.coefficient)?;
        }
        Ok(solver.solve()?)
    }
    // endregion Solving

    // region Validation Functions
    /// Check that a variable to be added is valid to add to this problem
    fn validate_variable(&self, variable: &Variable) -> Result<(), ProblemError> {
        if self.variables.contains_key(&variable.id) {
            return Err(ProblemError::VariableIdAlreadyExists);
        };
        if variable.lower_bound > variable.upper_bound {
            return Err(ProblemError::InvalidVariableBounds);
        }
        Ok(())
    }

    /// Check that a constraint to be added is valid to add to this Problem
    fn validate_constraint(&self, constraint: &Constraint) -> Result<(), ProblemError> {
        if self.constraints.contains_key(constraint.get_id()) {
            return Err(ProblemError::ConstraintAlreadyExists);
        }
        if let Constraint::Inequality {
            lower_bound,
            upper_bound,
            ..
        } = constraint
        {
            if lower_bound > upper_bound {
                return Err(ProblemError::InvalidConstraintBounds);
            }
        }
        for term in constraint.get_terms() {
            if !self.variables.contains_key(&term.variable) {
                return Err(ProblemError::NonExistentVariablesInConstraint);
            }
        }
        Ok(())
    }
    // endregion Validation Functions

}

/// Errors associated with the Problem
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProblemError {
    /// Error when trying to add a variable with the same id as an existing variable
    #[error("Tried to add a variable with the same id as an existing variable")]
    VariableIdAlreadyExists,
    /// Error when trying to add variable with invalid bounds
    #[error("Tried to add a variable with lower_bound>upper_bound")]
    InvalidVariableBounds,
    /// Error when a variable could not be built
    #[error("Unable to build variable: {0}")]
    InvalidVariable(String),
    /// Error when trying to add a constraint with the same id as an existing constraint
    #[error("Tried to add a constraint with the same id as an existing constraint")]
    ConstraintAlreadyExists,
    /// Error when trying to add a constraint with invalid bounds
    #[error("Tried to add an inequality constraint with lower_bound > upper_bound")]
    InvalidConstraintBounds,
    /// Error when trying to add a constraint that contains variables not in the model
    #[error("Tried to add a constraint with variables not in the model")]
    NonExistentVariablesInConstraint,
    /// Error when trying to add an objective term which includes variables not in the model
    #[error("Tried adding an objective term with variables not in the model")]
    NonExistentVariablesInObjective,
    /// Error raised by the solver back end
    #[error(transparent)]
    Solver(#[from] SolverError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::OptimizationStatus;

    #[test]
    fn new_problem() {
        let problem = Problem::new_maximization();
        assert_eq!(problem.objective.sense(), ObjectiveSense::Maximize);
        assert_eq!(problem.num_variables(), 0);
        assert_eq!(problem.num_constraints(), 0);
    }

    #[test]
    fn add_variables() {
        let mut problem = Problem::new(ObjectiveSense::Maximize);

        problem.add_new_variable("x", None, 64., 100.).unwrap();
        problem.add_new_variable("y", Some("why"), 0., 1.).unwrap();
        let x = problem.variables.get("x").unwrap();
        assert_eq!(x.index, 0);
        assert_eq!(x.lower_bound, 64.);
        assert_eq!(x.upper_bound, 100.);
        let y = problem.variables.get("y").unwrap();
        assert_eq!(y.index, 1);
        assert_eq!(y.name.as_deref(), Some("why"));

        assert_eq!(
            problem.add_new_variable("x", None, 0., 1.),
            Err(ProblemError::VariableIdAlreadyExists)
        );
    }

    #[test]
    fn add_bad_variable() {
        let mut problem = Problem::new(ObjectiveSense::Maximize);
        let res = problem.add_new_variable("x", None, 100., 64.);
        assert_eq!(res, Err(ProblemError::InvalidVariableBounds));
    }

    #[test]
    fn add_constraint() {
        let mut problem = Problem::new(ObjectiveSense::Maximize);
        problem.add_new_variable("x", None, 64., 100.).unwrap();
        problem.add_new_variable("y", None, 64., 100.).unwrap();

        problem
            .add_new_equality_constraint("eq", &["x", "y"], &[2., 3.], 200.)
            .unwrap();
        match problem.constraints.get("eq").unwrap() {
            Constraint::Equality { equals, .. } => assert_eq!(*equals, 200.),
            Constraint::Inequality { .. } => panic!("Incorrect constraint type added"),
        }

        problem
            .add_new_inequality_constraint("ineq", &["x", "y"], &[2., 3.], 100., 200.)
            .unwrap();
        match problem.constraints.get("ineq").unwrap() {
            Constraint::Inequality {
                lower_bound,
                upper_bound,
                ..
            } => {
                assert_eq!(*lower_bound, 100.);
                assert_eq!(*upper_bound, 200.);
            }
            Constraint::Equality { .. } => panic!("Incorrect constraint type added"),
        }
        assert_eq!(problem.num_constraints(), 2);
    }

    #[test]
    fn add_bad_constraint() {
        let mut problem = Problem::new(ObjectiveSense::Maximize);
        problem.add_new_variable("x", None, 64., 100.).unwrap();
        problem.add_new_variable("y", None, 64., 100.).unwrap();

        assert_eq!(
            problem.add_new_inequality_constraint("bad", &["x", "y"], &[2., 3.], 200., 100.),
            Err(ProblemError::InvalidConstraintBounds)
        );
        assert_eq!(
            problem.add_new_equality_constraint("missing", &["x", "z"], &[1., 1.], 0.),
            Err(ProblemError::NonExistentVariablesInConstraint)
        );
        assert_eq!(
            problem.add_new_linear_objective_term("z", 1.),
            Err(ProblemError::NonExistentVariablesInObjective)
        );
    }

    #[test]
    fn solve_small_problem() {
        // max 3x + 2y, x + y <= 4, x + 3y <= 6, 0 <= x <= 3
        let mut problem = Problem::new_maximization();
        problem.add_new_variable("x", None, 0., 3.).unwrap();
        problem.add_new_variable("y", None, 0., 1000.).unwrap();
        problem
            .add_new_inequality_constraint("c1", &["x", "y"], &[1., 1.], f64::NEG_INFINITY, 4.)
            .unwrap();
        problem
            .add_new_inequality_constraint("c2", &["x", "y"], &[1., 3.], f64::NEG_INFINITY, 6.)
            .unwrap();
        problem.add_new_linear_objective_term("x", 3.).unwrap();
        problem.add_new_linear_objective_term("y", 2.).unwrap();
        let solution = problem.solve_with(ClarabelSolver::default()).unwrap();
        assert_eq!(solution.status, OptimizationStatus::Optimal);
        assert!((solution.objective_value.unwrap() - 11.).abs() < 1e-6);
    }
}
