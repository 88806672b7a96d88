//! Solver interface for the microlp simplex solver
use indexmap::IndexMap;
use ::microlp::{ComparisonOp, LinearExpr, OptimizationDirection, Problem};

use crate::configuration::Configuration;
use crate::optimize::objective::ObjectiveSense;
use crate::optimize::solvers::{lookup_terms, Solver, SolverError};
use crate::optimize::{OptimizationStatus, ProblemSolution};

#[derive(Clone, Debug, Default)]
pub struct MicroLpSolver {
    variables: IndexMap<String, (f64, f64)>,
    equalities: Vec<(Vec<(usize, f64)>, f64)>,
    inequalities: Vec<(Vec<(usize, f64)>, f64, f64)>,
    objective: IndexMap<usize, f64>,
    minimize: bool,
}

fn expression(terms: &[(usize, f64)], vars: &[::microlp::Variable]) -> LinearExpr {
    let mut expr = LinearExpr::empty();
    for (col, coef) in terms {
        expr.add(vars[*col], *coef);
    }
    expr
}

impl Solver for MicroLpSolver {
    fn add_continuous_variable(
        &mut self,
        id: &str,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<(), SolverError> {
        if self.variables.contains_key(id) {
            return Err(SolverError::DuplicateVariable(id.to_string()));
        }
        self.variables
            .insert(id.to_string(), (lower_bound, upper_bound));
        Ok(())
    }

    fn add_equality_constraint(
        &mut self,
        _id: &str,
        variables: Vec<&str>,
        coefficients: Vec<f64>,
        equals: f64,
    ) -> Result<(), SolverError> {
        let terms = lookup_terms(&self.variables, &variables, &coefficients)?;
        self.equalities.push((terms, equals));
        Ok(())
    }

    fn add_inequality_constraint(
        &mut self,
        _id: &str,
        variables: Vec<&str>,
        coefficients: Vec<f64>,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<(), SolverError> {
        let terms = lookup_terms(&self.variables, &variables, &coefficients)?;
        self.inequalities.push((terms, lower_bound, upper_bound));
        Ok(())
    }

    fn add_linear_objective_term(
        &mut self,
        variable_id: &str,
        coefficient: f64,
    ) -> Result<(), SolverError> {
        let col = self
            .variables
            .get_index_of(variable_id)
            .ok_or_else(|| SolverError::UnknownVariable(variable_id.to_string()))?;
        *self.objective.entry(col).or_insert(0.) += coefficient;
        Ok(())
    }

    fn set_objective_sense(&mut self, objective_sense: ObjectiveSense) -> Result<(), SolverError> {
        self.minimize = objective_sense == ObjectiveSense::Minimize;
        Ok(())
    }

    fn clear_objective(&mut self) -> Result<(), SolverError> {
        self.objective.clear();
        Ok(())
    }

    fn solve(&mut self) -> Result<ProblemSolution, SolverError> {
        let direction = if self.minimize {
            OptimizationDirection::Minimize
        } else {
            OptimizationDirection::Maximize
        };
        let mut problem = Problem::new(direction);
        let vars: Vec<::microlp::Variable> = self
            .variables
            .values()
            .enumerate()
            .map(|(col, (lb, ub))| {
                let coef = self.objective.get(&col).copied().unwrap_or(0.);
                problem.add_var(coef, (*lb, *ub))
            })
            .collect();
        for (terms, rhs) in &self.equalities {
            problem.add_constraint(expression(terms, &vars), ComparisonOp::Eq, *rhs);
        }
        for (terms, lb, ub) in &self.inequalities {
            if ub.is_finite() {
                problem.add_constraint(expression(terms, &vars), ComparisonOp::Le, *ub);
            }
            if lb.is_finite() {
                problem.add_constraint(expression(terms, &vars), ComparisonOp::Ge, *lb);
            }
        }

        let solution = match problem.solve() {
            Ok(solution) => solution,
            Err(::microlp::Error::Infeasible) => {
                return Ok(ProblemSolution::without_values(OptimizationStatus::Infeasible))
            }
            Err(::microlp::Error::Unbounded) => {
                return Ok(ProblemSolution::without_values(OptimizationStatus::Unbounded))
            }
            Err(_) => {
                return Ok(ProblemSolution::without_values(
                    OptimizationStatus::NumericalError,
                ))
            }
        };
        let tolerance = Configuration::current().tolerance;
        let clean = |v: f64| if v.abs() < tolerance { 0. } else { v };
        let values = self
            .variables
            .keys()
            .zip(vars.iter())
            .map(|(id, var)| (id.clone(), clean(solution[*var])))
            .collect();
        Ok(ProblemSolution {
            status: OptimizationStatus::Optimal,
            objective_value: Some(clean(solution.objective())),
            variable_values: Some(values),
        })
    }
}
