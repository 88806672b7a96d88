//! This module provides the metabolite struct representing a metabolite

/// Represents a metabolite
#[derive(Debug, Clone, PartialEq)]
pub struct Metabolite {
    /// Used to identify the metabolite (must be unique)
    pub id: String,
    /// Human Readable name of the metabolite
    pub name: Option<String>,
    /// Which compartment the metabolite is in
    pub compartment: Option<String>,
    /// Electrical charge of the Metabolite
    pub charge: i32,
    /// Chemical Formula of the metabolite
    pub formula: Option<String>,
}

impl Metabolite {
    /// Create a metabolite, taking the compartment from the id suffix (`glc__D_e` -> `e`)
    pub fn from_id(id: &str) -> Self {
        let compartment = id
            .rsplit_once('_')
            .map(|(_, c)| c.to_string())
            .filter(|c| !c.is_empty());
        Metabolite {
            id: id.to_string(),
            name: None,
            compartment,
            charge: 0,
            formula: None,
        }
    }
}
