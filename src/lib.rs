//! MTG combat - combat damage resolution and blocking search
//!
//! Resolves a single combat phase of a two-player Magic: The Gathering game
//! (triggers, first strike, simultaneous damage, state-based actions) and
//! searches the space of block assignments for the ones that are best for
//! the defending player against an adversarial damage ordering.

pub mod core;
pub mod error;
pub mod game;

pub use error::{CombatError, Result};
