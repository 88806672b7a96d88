//! This module provides a struct for representing reactions
use derive_builder::Builder;
use indexmap::IndexMap;

use crate::configuration::Configuration;

/// Id prefixes of reactions crossing the system boundary: exchanges, demands and sinks
pub const BOUNDARY_PREFIXES: [&str; 4] = ["EX_", "DM_", "sink_", "SK_"];

/// Represents a reaction in the metabolic model
#[derive(Builder, Debug, Clone, PartialEq)]
pub struct Reaction {
    /// Used to identify the reaction
    pub id: String,
    /// Metabolite stoichiometry of the reaction
    #[builder(default = "IndexMap::new()")]
    pub metabolites: IndexMap<String, f64>,
    /// Human-readable reaction name
    #[builder(default = "None")]
    pub name: Option<String>,
    /// Lower flux bound
    #[builder(default = "Configuration::current().lower_bound")]
    pub lower_bound: f64,
    /// Upper flux bound
    #[builder(default = "Configuration::current().upper_bound")]
    pub upper_bound: f64,
    /// Reaction subsystem
    #[builder(default = "None")]
    pub subsystem: Option<String>,
    /// Notes about the reaction
    #[builder(default = "None")]
    pub notes: Option<String>,
    /// Reaction Annotations
    #[builder(default = "None")]
    pub annotation: Option<String>,
}

impl Reaction {
    /// Whether the reaction exchanges mass with the environment
    ///
    /// Boundary reactions are recognised by their id prefix, see [`BOUNDARY_PREFIXES`].
    pub fn is_boundary(&self) -> bool {
        BOUNDARY_PREFIXES
            .iter()
            .any(|prefix| self.id.starts_with(prefix))
    }

    /// The (lower, upper) bound pair
    pub fn bounds(&self) -> (f64, f64) {
        (self.lower_bound, self.upper_bound)
    }

    /// Whether both bounds are zero, so the reaction can't carry flux
    pub fn is_closed(&self) -> bool {
        self.lower_bound == 0. && self.upper_bound == 0.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reaction(id: &str) -> Reaction {
        ReactionBuilder::default().id(id.to_string()).build().unwrap()
    }

    #[test]
    fn boundary_prefixes() {
        assert!(reaction("EX_ac_e").is_boundary());
        assert!(reaction("DM_atp_c_").is_boundary());
        assert!(reaction("sink_accoa_c").is_boundary());
        assert!(reaction("SK_glyc_c").is_boundary());
        assert!(!reaction("ATPM").is_boundary());
        assert!(!reaction("PDHm").is_boundary());
        // prefixes are case sensitive
        assert!(!reaction("ex_ac_e").is_boundary());
    }

    #[test]
    fn default_bounds() {
        let rxn = reaction("PFK");
        assert_eq!(rxn.bounds(), (-1000., 1000.));
        assert!(!rxn.is_closed());
        let closed = ReactionBuilder::default()
            .id("EX_o2_e".to_string())
            .lower_bound(0.)
            .upper_bound(0.)
            .build()
            .unwrap();
        assert!(closed.is_closed());
    }
}
