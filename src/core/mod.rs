//! Core combat entities

pub mod creature;
pub mod keywords;
pub mod mana;
pub mod player;
pub mod types;

pub use creature::{BlockerList, Creature};
pub use keywords::{Keyword, Keywords};
pub use mana::{Color, ColorSet, ManaCost};
pub use player::{
    ensure_player_state, has_player_lost, GameState, PlayerState, DEFAULT_STARTING_LIFE,
    POISON_LOSS_THRESHOLD,
};
pub use types::{CombatantId, PlayerId};
