//! Growth medium: which boundary reactions are open, and how far
use indexmap::IndexMap;
use tracing::{debug, info};

use crate::metabolic_model::model::{Model, ModelError};
use crate::project::HostSimulation;

/// One medium component: the ids it may go by and the bounds to give it
#[derive(Clone, Debug, PartialEq)]
pub struct MediumEntry {
    /// Candidate reaction ids, first one present in the model wins
    pub candidates: Vec<String>,
    pub bounds: (f64, f64),
}

impl MediumEntry {
    pub fn new(candidates: &[&str], lower_bound: f64, upper_bound: f64) -> Self {
        MediumEntry {
            candidates: candidates.iter().map(|c| c.to_string()).collect(),
            bounds: (lower_bound, upper_bound),
        }
    }
}

/// Counts of what [`Medium::apply`] changed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MediumReport {
    /// Internal reaction bounds pulled in to the cap
    pub capped: usize,
    /// Boundary reactions closed
    pub closed: usize,
    /// Medium entries found in the model and reopened
    pub reopened: usize,
}

const IONS: [&str; 8] = [
    "EX_pi_e", "EX_so4_e", "EX_k_e", "EX_na1_e", "EX_ca2_e", "EX_cl_e", "EX_mg2_e", "EX_fe2_e",
];

const ESSENTIAL_AMINO_ACIDS: [&str; 9] = [
    "EX_his__L_e",
    "EX_ile__L_e",
    "EX_leu__L_e",
    "EX_lys__L_e",
    "EX_met__L_e",
    "EX_phe__L_e",
    "EX_thr__L_e",
    "EX_trp__L_e",
    "EX_val__L_e",
];

const VITAMINS: [&str; 9] = [
    "EX_thm_e",
    "EX_ribflv_e",
    "EX_ncam_e",
    "EX_pnto__R_e",
    "EX_pydxn_e",
    "EX_fol_e",
    "EX_cbl1_e",
    "EX_chol_e",
    "EX_inost_e",
];

pub const O2_IDS: [&str; 2] = ["EX_o2_e", "EX_o2[e]"];
pub const GLUCOSE_IDS: [&str; 3] = ["EX_glc__D_e", "EX_glc_D_e", "EX_glc[e]"];

/// A curated set of open boundary reactions
#[derive(Clone, Debug, PartialEq)]
pub struct Medium {
    entries: Vec<MediumEntry>,
    internal_bound_cap: f64,
}

impl Medium {
    pub fn new(entries: Vec<MediumEntry>, internal_bound_cap: f64) -> Self {
        Medium {
            entries,
            internal_bound_cap,
        }
    }

    /// Hepatocyte-like medium: water and protons free, ions and ammonium in moderation,
    /// scarce glucose, trace amino acids and vitamins
    pub fn hepatocyte(sim: &HostSimulation) -> Medium {
        let mut entries = vec![
            MediumEntry::new(&["EX_h2o_e"], -1000., 1000.),
            MediumEntry::new(&["EX_h_e"], -1000., 1000.),
        ];
        entries.extend(IONS.iter().map(|id| MediumEntry::new(&[*id], -10., 100.)));
        entries.push(MediumEntry::new(&["EX_co2_e"], 0., 1000.));
        entries.push(MediumEntry::new(&["EX_nh4_e"], -0.5, 100.));
        entries.push(MediumEntry::new(&O2_IDS, -sim.oxygen_uptake, 0.));
        entries.push(MediumEntry::new(&GLUCOSE_IDS, -sim.glucose_uptake, 0.));
        entries.extend(
            ESSENTIAL_AMINO_ACIDS
                .iter()
                .map(|id| MediumEntry::new(&[*id], -sim.amino_acid_uptake, 0.)),
        );
        entries.extend(
            VITAMINS
                .iter()
                .map(|id| MediumEntry::new(&[*id], -sim.vitamin_uptake, 0.)),
        );
        Medium::new(entries, sim.internal_bound_cap)
    }

    pub fn entries(&self) -> &[MediumEntry] {
        &self.entries
    }

    /// Map each entry onto the reaction id it takes in `model`, skipping absent ones
    pub fn resolve(&self, model: &Model) -> IndexMap<String, (f64, f64)> {
        let mut resolved = IndexMap::new();
        for entry in &self.entries {
            match model.find_reaction(entry.candidates.as_slice()) {
                Some(id) => {
                    resolved.insert(id.to_string(), entry.bounds);
                }
                None => debug!(candidates = ?entry.candidates, "medium component not in model"),
            }
        }
        resolved
    }

    /// Pull internal reaction bounds into `[-cap, cap]`, returning how many bounds moved
    pub fn cap_internal_reactions(&self, model: &mut Model) -> usize {
        let cap = self.internal_bound_cap;
        let mut capped = 0;
        for reaction in model.reactions.values_mut().filter(|r| !r.is_boundary()) {
            if reaction.lower_bound < -cap {
                reaction.lower_bound = -cap;
                capped += 1;
            }
            if reaction.upper_bound > cap {
                reaction.upper_bound = cap;
                capped += 1;
            }
        }
        capped
    }

    /// Set every boundary reaction to `(0, 0)`, returning how many there were
    pub fn close_boundary_reactions(model: &mut Model) -> usize {
        let mut closed = 0;
        for reaction in model.reactions.values_mut().filter(|r| r.is_boundary()) {
            reaction.lower_bound = 0.;
            reaction.upper_bound = 0.;
            closed += 1;
        }
        closed
    }

    /// Cap internal bounds, close the boundary, then reopen the medium
    pub fn apply(&self, model: &mut Model) -> Result<MediumReport, ModelError> {
        let capped = self.cap_internal_reactions(model);
        let closed = Medium::close_boundary_reactions(model);
        let resolved = self.resolve(model);
        for (id, (lb, ub)) in &resolved {
            model.set_bounds(id, *lb, *ub)?;
        }
        let report = MediumReport {
            capped,
            closed,
            reopened: resolved.len(),
        };
        info!(
            capped = report.capped,
            closed = report.closed,
            reopened = report.reopened,
            "applied medium"
        );
        Ok(report)
    }
}
