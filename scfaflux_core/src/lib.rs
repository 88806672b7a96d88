//! Core of scfaflux: flux balance analysis of a host metabolic model under short-chain
//! fatty acid dose conditions, from dose table to figures and tables.

pub mod configuration;
pub mod dose;
pub mod figures;
pub mod io;
pub mod medium;
pub mod metabolic_model;
pub mod optimize;
pub mod pipeline;
pub mod project;
pub mod results;
pub mod simulation;
pub mod tables;
