//! Implements a solver interface for Clarabel
//!
//! Clarabel solves `min 0.5 x'Px + q'x` subject to `Ax + s = b`, `s ∈ K`. Linear
//! programs are passed with an empty `P`. Equalities (including variables whose
//! bounds coincide) go into a zero cone, every finite one-sided bound into the
//! nonnegative cone as `a'x <= b`.
use clarabel::algebra::CscMatrix;
use clarabel::solver::*;
use indexmap::IndexMap;
use nalgebra_sparse::{CooMatrix, CscMatrix as SparseCsc};
use tracing::debug;

use crate::configuration::Configuration;
use crate::optimize::objective::ObjectiveSense;
use crate::optimize::solvers::{lookup_terms, Solver, SolverError};
use crate::optimize::{OptimizationStatus, ProblemSolution};

#[derive(Clone, Debug)]
pub struct ClarabelSolver {
    /// Variable id -> (lower bound, upper bound), in column order
    variables: IndexMap<String, (f64, f64)>,
    /// Rows of sum(terms) = rhs
    equalities: Vec<(Vec<(usize, f64)>, f64)>,
    /// Rows of lower <= sum(terms) <= upper
    inequalities: Vec<(Vec<(usize, f64)>, f64, f64)>,
    /// Linear objective coefficients keyed by column
    objective: IndexMap<usize, f64>,
    sense: ObjectiveSense,
    tolerance: f64,
}

impl Default for ClarabelSolver {
    fn default() -> Self {
        ClarabelSolver {
            variables: IndexMap::new(),
            equalities: Vec::new(),
            inequalities: Vec::new(),
            objective: IndexMap::new(),
            sense: ObjectiveSense::Maximize,
            tolerance: Configuration::current().tolerance,
        }
    }
}

impl ClarabelSolver {
    /// Stack the constraint rows into the (A, b, cones) triple Clarabel expects
    fn assemble(&self) -> (CscMatrix<f64>, Vec<f64>, Vec<SupportedConeT<f64>>) {
        let n = self.variables.len();
        let mut zero_rows: Vec<(Vec<(usize, f64)>, f64)> = self.equalities.clone();
        let mut nonneg_rows: Vec<(Vec<(usize, f64)>, f64)> = Vec::new();

        for (col, (lb, ub)) in self.variables.values().enumerate() {
            if lb == ub {
                zero_rows.push((vec![(col, 1.)], *lb));
                continue;
            }
            if ub.is_finite() {
                nonneg_rows.push((vec![(col, 1.)], *ub));
            }
            if lb.is_finite() {
                nonneg_rows.push((vec![(col, -1.)], -*lb));
            }
        }
        for (terms, lb, ub) in &self.inequalities {
            if lb == ub {
                zero_rows.push((terms.clone(), *lb));
                continue;
            }
            if ub.is_finite() {
                nonneg_rows.push((terms.clone(), *ub));
            }
            if lb.is_finite() {
                let negated = terms.iter().map(|(c, v)| (*c, -v)).collect();
                nonneg_rows.push((negated, -*lb));
            }
        }

        let m = zero_rows.len() + nonneg_rows.len();
        let mut coo = CooMatrix::new(m, n);
        let mut b = Vec::with_capacity(m);
        for (row, (terms, rhs)) in zero_rows.iter().chain(nonneg_rows.iter()).enumerate() {
            for (col, coef) in terms {
                coo.push(row, *col, *coef);
            }
            b.push(*rhs);
        }
        let (col_offsets, row_indices, values) = SparseCsc::from(&coo).disassemble();
        let a = CscMatrix::new(m, n, col_offsets, row_indices, values);

        let mut cones = Vec::new();
        if !zero_rows.is_empty() {
            cones.push(SupportedConeT::ZeroConeT(zero_rows.len()));
        }
        if !nonneg_rows.is_empty() {
            cones.push(SupportedConeT::NonnegativeConeT(nonneg_rows.len()));
        }
        (a, b, cones)
    }

    fn clean(&self, value: f64) -> f64 {
        if value.abs() < self.tolerance {
            0.
        } else {
            value
        }
    }
}

impl Solver for ClarabelSolver {
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
        self.sense = objective_sense;
        Ok(())
    }

    fn clear_objective(&mut self) -> Result<(), SolverError> {
        self.objective.clear();
        Ok(())
    }

    fn solve(&mut self) -> Result<ProblemSolution, SolverError> {
        let n = self.variables.len();
        let p = CscMatrix::new(n, n, vec![0; n + 1], Vec::new(), Vec::new());
        let sign = match self.sense {
            ObjectiveSense::Maximize => -1.,
            ObjectiveSense::Minimize => 1.,
        };
        let mut q = vec![0.; n];
        for (col, coef) in &self.objective {
            q[*col] = sign * coef;
        }
        let (a, b, cones) = self.assemble();
        debug!(
            variables = n,
            rows = b.len(),
            "handing linear program to Clarabel"
        );

        let settings = DefaultSettings {
            verbose: false,
            ..DefaultSettings::default()
        };
        let mut solver = DefaultSolver::new(&p, &q, &a, &b, &cones, settings);
        solver.solve();

        let status = match solver.solution.status {
            SolverStatus::Solved => OptimizationStatus::Optimal,
            SolverStatus::AlmostSolved => OptimizationStatus::AlmostOptimal,
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                OptimizationStatus::Infeasible
            }
            SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
                OptimizationStatus::Unbounded
            }
            SolverStatus::NumericalError => OptimizationStatus::NumericalError,
            SolverStatus::Unsolved => OptimizationStatus::Unoptimized,
            _ => OptimizationStatus::SolverHalted,
        };
        if !status.has_solution() {
            return Ok(ProblemSolution::without_values(status));
        }

        let values: IndexMap<String, f64> = self
            .variables
            .keys()
            .zip(solver.solution.x.iter())
            .map(|(id, x)| (id.clone(), self.clean(*x)))
            .collect();
        let objective_value = self
            .objective
            .iter()
            .map(|(col, coef)| coef * values[*col])
            .sum::<f64>();
        Ok(ProblemSolution {
            status,
            objective_value: Some(self.clean(objective_value)),
            variable_values: Some(values),
        })
    }
}
