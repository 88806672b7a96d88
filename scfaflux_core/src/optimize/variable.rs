//! Module providing representation of optimization problem variables
use derive_builder::Builder;

use crate::configuration::Configuration;

/// A continuous variable of a linear program
#[derive(Builder, Debug, Clone, PartialEq)]
#[builder(setter(into))]
pub struct Variable {
    /// Unique identifier of the variable
    pub id: String,
    /// Optional human-readable name
    #[builder(default = "None")]
    pub name: Option<String>,
    /// Lowest value the variable can take
    #[builder(default = "Configuration::current().lower_bound")]
    pub lower_bound: f64,
    /// Highest value the variable can take
    #[builder(default = "Configuration::current().upper_bound")]
    pub upper_bound: f64,
    /// Position of the variable in the problem, assigned when it is added
    #[builder(default = "0")]
    pub(crate) index: usize,
}

impl Variable {
    /// Whether the variable is pinned to a single value
    pub fn is_fixed(&self) -> bool {
        self.lower_bound == self.upper_bound
    }
}
