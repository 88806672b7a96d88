//! Host flux balance simulation under SCFA dose conditions
//!
//! The model is constrained to the medium once, the ATP maintenance reaction is
//! made the objective, and every condition is then solved on top of that
//! baseline with its bounds put back afterwards.
use indexmap::IndexMap;
use thiserror::Error;
use tracing::{info, warn};

use crate::dose::{DoseCondition, DoseTable, Scfa};
use crate::medium::{Medium, MediumReport, GLUCOSE_IDS, O2_IDS};
use crate::metabolic_model::model::{Model, ModelError};
use crate::optimize::problem::ProblemError;
use crate::optimize::OptimizationStatus;
use crate::project::HostSimulation;

pub const ACETATE_IDS: [&str; 3] = ["EX_ac_e", "EX_ac[u]", "EX_ac(e)"];
pub const PROPIONATE_IDS: [&str; 3] = ["EX_ppa_e", "EX_propn_e", "EX_ppn_e"];
pub const BUTYRATE_IDS: [&str; 2] = ["EX_but_e", "EX_btn_e"];
pub const ATPM_IDS: [&str; 2] = ["ATPM", "DM_atp_c_"];
pub const CO2_ID: &str = "EX_co2_e";

/// Central carbon and energy reactions reported for every condition, with a short label
pub const PATHWAYS: [(&str, &str); 17] = [
    ("PYK", "pyruvate kinase"),
    ("PDHm", "pyruvate dehydrogenase"),
    ("CSm", "citrate synthase"),
    ("ACONTm", "aconitase"),
    ("ICDHxm", "isocitrate DH"),
    ("AKGDm", "alpha-KG DH"),
    ("SUCDi", "succinate DH"),
    ("FUMm", "fumarase"),
    ("MDHm", "malate DH"),
    ("PCm", "pyruvate carboxylase"),
    ("PEPCK", "PEPCK"),
    ("G6PDH2r", "G6PD"),
    ("FBA", "aldolase"),
    ("PFK", "PFK"),
    ("ATPS4mi", "ATP synthase"),
    ("NADH2_u10mi", "complex I"),
    ("CYOOm3i", "complex IV"),
];

pub const BASELINE_LABEL: &str = "baseline";

#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("No ATP maintenance reaction in the model (tried {})", .0.join(", "))]
    NoObjective(Vec<String>),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("Unable to solve condition {condition}: {source}")]
    Solve {
        condition: String,
        source: ProblemError,
    },
}

fn scfa_candidates(scfa: Scfa) -> &'static [&'static str] {
    match scfa {
        Scfa::Acetate => &ACETATE_IDS,
        Scfa::Propionate => &PROPIONATE_IDS,
        Scfa::Butyrate => &BUTYRATE_IDS,
    }
}

/// The reactions of interest, as named in the loaded model
#[derive(Clone, Debug, PartialEq)]
pub struct ReactionLookup {
    pub objective: String,
    pub glucose: Option<String>,
    pub oxygen: Option<String>,
    pub co2: Option<String>,
    pub acetate: Option<String>,
    pub propionate: Option<String>,
    pub butyrate: Option<String>,
}

impl ReactionLookup {
    pub fn new(model: &Model) -> Result<ReactionLookup, SimulationError> {
        let objective = model
            .find_reaction(&ATPM_IDS)
            .ok_or_else(|| SimulationError::NoObjective(ATPM_IDS.map(String::from).to_vec()))?
            .to_string();
        let find = |candidates: &[&str]| model.find_reaction(candidates).map(String::from);
        let lookup = ReactionLookup {
            objective,
            glucose: find(&GLUCOSE_IDS),
            oxygen: find(&O2_IDS),
            co2: find(&[CO2_ID]),
            acetate: find(scfa_candidates(Scfa::Acetate)),
            propionate: find(scfa_candidates(Scfa::Propionate)),
            butyrate: find(scfa_candidates(Scfa::Butyrate)),
        };
        for scfa in Scfa::ALL {
            match lookup.scfa(scfa) {
                Some(id) => info!(scfa = scfa.name(), reaction = id, "found SCFA exchange"),
                None => warn!(scfa = scfa.name(), "SCFA exchange not found, dose is ignored"),
            }
        }
        Ok(lookup)
    }

    pub fn scfa(&self, scfa: Scfa) -> Option<&str> {
        match scfa {
            Scfa::Acetate => self.acetate.as_deref(),
            Scfa::Propionate => self.propionate.as_deref(),
            Scfa::Butyrate => self.butyrate.as_deref(),
        }
    }
}

/// Outcome of one solve
#[derive(Clone, Debug, PartialEq)]
pub struct ConditionResult {
    pub label: String,
    pub status: OptimizationStatus,
    /// `None` when the solve had no solution
    pub objective_value: Option<f64>,
    /// Flux of every reaction, empty when the solve had no solution
    pub fluxes: IndexMap<String, f64>,
}

impl ConditionResult {
    pub fn is_feasible(&self) -> bool {
        self.objective_value.is_some()
    }

    pub fn flux(&self, reaction_id: &str) -> Option<f64> {
        self.fluxes.get(reaction_id).copied()
    }
}

/// Baseline and per condition results of a full run
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationOutcome {
    pub baseline: ConditionResult,
    pub conditions: Vec<ConditionResult>,
}

/// A model prepared for dose simulations
#[derive(Clone, Debug)]
pub struct HostSimulator {
    model: Model,
    lookup: ReactionLookup,
    medium_report: MediumReport,
    scfa_upper_bound: f64,
}

impl HostSimulator {
    /// Apply the medium and set the ATP maintenance objective
    pub fn prepare(mut model: Model, settings: &HostSimulation) -> Result<Self, SimulationError> {
        let lookup = ReactionLookup::new(&model)?;
        let medium_report = Medium::hepatocyte(settings).apply(&mut model)?;
        model.set_bounds(&lookup.objective, 0., settings.atpm_upper_bound)?;
        model.set_objective(&lookup.objective)?;
        info!(objective = %lookup.objective, "objective set");
        Ok(HostSimulator {
            model,
            lookup,
            medium_report,
            scfa_upper_bound: settings.scfa_upper_bound,
        })
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn lookup(&self) -> &ReactionLookup {
        &self.lookup
    }

    pub fn medium_report(&self) -> MediumReport {
        self.medium_report
    }

    /// Exchange bounds a condition puts on the SCFA reactions present in the model
    pub fn dose_bounds(&self, condition: &DoseCondition) -> IndexMap<String, (f64, f64)> {
        Scfa::ALL
            .iter()
            .filter_map(|scfa| {
                self.lookup.scfa(*scfa).map(|id| {
                    (
                        id.to_string(),
                        (-condition.dose(*scfa), self.scfa_upper_bound),
                    )
                })
            })
            .collect()
    }

    fn solve(model: &Model, label: &str) -> Result<ConditionResult, SimulationError> {
        let solution = model.optimize().map_err(|source| SimulationError::Solve {
            condition: label.to_string(),
            source,
        })?;
        let (objective_value, fluxes) = match (solution.objective_value, solution.variable_values)
        {
            (Some(value), Some(fluxes)) if solution.status.has_solution() => (Some(value), fluxes),
            _ => {
                warn!(
                    condition = label,
                    status = ?solution.status,
                    "no solution, recording an empty result"
                );
                (None, IndexMap::new())
            }
        };
        Ok(ConditionResult {
            label: label.to_string(),
            status: solution.status,
            objective_value,
            fluxes,
        })
    }

    /// Solve with the medium alone, no SCFA
    pub fn run_baseline(&self) -> Result<ConditionResult, SimulationError> {
        let result = HostSimulator::solve(&self.model, BASELINE_LABEL)?;
        info!(objective = ?result.objective_value, "baseline solved");
        Ok(result)
    }

    /// Solve one dose condition; the model's bounds are unchanged afterwards
    pub fn run_condition(
        &mut self,
        condition: &DoseCondition,
    ) -> Result<ConditionResult, SimulationError> {
        let bounds = self.dose_bounds(condition);
        let result = self.model.with_restored_bounds(|model| -> Result<_, SimulationError> {
            for (id, (lb, ub)) in &bounds {
                model.set_bounds(id, *lb, *ub)?;
            }
            HostSimulator::solve(model, &condition.label)
        })?;
        info!(
            condition = %condition.label,
            objective = ?result.objective_value,
            "condition solved"
        );
        Ok(result)
    }

    /// Solve the baseline and then every condition of the table, in table order
    pub fn run_all(&mut self, doses: &DoseTable) -> Result<SimulationOutcome, SimulationError> {
        let baseline = self.run_baseline()?;
        let conditions = doses
            .iter()
            .map(|condition| self.run_condition(condition))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SimulationOutcome {
            baseline,
            conditions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metabolic_model::reaction::ReactionBuilder;

    /// Acetate is taken up and burned for ATP, nothing else is available
    fn acetate_only() -> Model {
        let mut model = Model::new_empty();
        for (id, stoich, lb, ub) in [
            ("EX_ac_e", vec![("ac_c", -1.)], -1000., 1000.),
            ("EX_h2o_e", vec![("h2o_c", -1.)], -1000., 1000.),
            ("ACOX", vec![("ac_c", -1.), ("h2o_c", 1.), ("atp_c", 3.)], 0., 1000.),
            ("ATPM", vec![("atp_c", -1.)], 0., 1000.),
        ] {
            model.add_reaction(
                ReactionBuilder::default()
                    .id(id.to_string())
                    .metabolites(stoich.into_iter().map(|(m, c)| (m.to_string(), c)).collect())
                    .lower_bound(lb)
                    .upper_bound(ub)
                    .build()
                    .unwrap(),
            );
        }
        model
    }

    #[test]
    fn lookup_requires_atpm() {
        let mut model = acetate_only();
        model.reactions.shift_remove("ATPM");
        assert!(matches!(
            ReactionLookup::new(&model),
            Err(SimulationError::NoObjective(_))
        ));
    }

    #[test]
    fn lookup_finds_scfa() {
        let lookup = ReactionLookup::new(&acetate_only()).unwrap();
        assert_eq!(lookup.objective, "ATPM");
        assert_eq!(lookup.scfa(Scfa::Acetate), Some("EX_ac_e"));
        assert_eq!(lookup.scfa(Scfa::Propionate), None);
        assert_eq!(lookup.glucose, None);
    }

    #[test]
    fn condition_results() {
        let mut simulator =
            HostSimulator::prepare(acetate_only(), &HostSimulation::default()).unwrap();
        assert_eq!(simulator.model().reaction("ATPM").unwrap().bounds(), (0., 500.));
        // acetate exchange is closed by the medium
        let baseline = simulator.run_baseline().unwrap();
        assert_eq!(baseline.objective_value, Some(0.));

        let low = DoseCondition::new("Low", 2., 0.7, 0.4);
        assert_eq!(
            simulator.dose_bounds(&low),
            IndexMap::from([("EX_ac_e".to_string(), (-2., 0.))])
        );
        let before = simulator.model().snapshot_bounds();
        let result = simulator.run_condition(&low).unwrap();
        assert!((result.objective_value.unwrap() - 6.).abs() < 1e-6);
        assert!((result.flux("EX_ac_e").unwrap() + 2.).abs() < 1e-6);
        assert_eq!(simulator.model().snapshot_bounds(), before);
    }
}
