//! Emergent Lexicon - affect-modulated vocabulary simulation and its analysis

pub mod analysis;
pub mod core;
pub mod entity;
pub mod history;
pub mod simulation;
