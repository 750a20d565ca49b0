//! Player life totals and the two-player game state

use crate::core::{Creature, PlayerId};
use crate::{CombatError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const DEFAULT_STARTING_LIFE: i32 = 20;

/// A player with this many poison counters loses (CR 104.3d)
pub const POISON_LOSS_THRESHOLD: i32 = 10;

/// State for a single player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Life total (can drop below zero during combat)
    pub life: i32,

    pub poison: i32,

    #[serde(default)]
    pub creatures: Vec<Creature>,
}

impl PlayerState {
    /// Create a player state; negative life or poison is rejected
    pub fn new(life: i32, poison: i32, creatures: Vec<Creature>) -> Result<Self> {
        if life < 0 {
            return Err(CombatError::InvalidValue("life cannot be negative".into()));
        }
        if poison < 0 {
            return Err(CombatError::InvalidValue("poison cannot be negative".into()));
        }
        Ok(PlayerState {
            life,
            poison,
            creatures,
        })
    }

    pub fn with_life(life: i32) -> Result<Self> {
        Self::new(life, 0, Vec::new())
    }

    pub fn has_lost(&self) -> bool {
        self.life <= 0 || self.poison >= POISON_LOSS_THRESHOLD
    }
}

impl Default for PlayerState {
    fn default() -> Self {
        PlayerState {
            life: DEFAULT_STARTING_LIFE,
            poison: 0,
            creatures: Vec::new(),
        }
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Life: {}", self.life)?;
        write!(f, "Poison: {}", self.poison)?;
        if self.creatures.is_empty() {
            write!(f, "\nCreatures: None")?;
        } else {
            write!(f, "\nCreatures:")?;
            for creature in &self.creatures {
                write!(f, "\n  - {creature}")?;
                let abilities = creature.abilities();
                if !abilities.is_empty() {
                    write!(f, " [{}]", abilities.join(", "))?;
                }
            }
        }
        Ok(())
    }
}

/// Overall game state tracking both players
///
/// Uses BTreeMap for deterministic iteration order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GameState {
    pub players: BTreeMap<PlayerId, PlayerState>,
}

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Two-player state with the conventional "A" (attacker) and "B" (defender) ids
    pub fn two_player(
        attacker_life: i32,
        attackers: Vec<Creature>,
        defender_life: i32,
        blockers: Vec<Creature>,
    ) -> Result<Self> {
        let mut state = GameState::new();
        state.players.insert(
            PlayerId::attacker(),
            PlayerState::new(attacker_life, 0, attackers)?,
        );
        state.players.insert(
            PlayerId::defender(),
            PlayerState::new(defender_life, 0, blockers)?,
        );
        Ok(state)
    }

    pub fn player(&self, id: &PlayerId) -> Option<&PlayerState> {
        self.players.get(id)
    }

    pub fn player_mut(&mut self, id: &PlayerId) -> Option<&mut PlayerState> {
        self.players.get_mut(id)
    }

    pub fn has_player_lost(&self, id: &PlayerId) -> bool {
        has_player_lost(self, id)
    }

    /// Copy of life and poison totals without the creature lists
    pub fn totals_only(&self) -> GameState {
        GameState {
            players: self
                .players
                .iter()
                .map(|(id, ps)| {
                    (
                        id.clone(),
                        PlayerState {
                            life: ps.life,
                            poison: ps.poison,
                            creatures: Vec::new(),
                        },
                    )
                })
                .collect(),
        }
    }

    /// Clear `blocking` and `blocked_by` on the creatures of "A" and "B"
    pub fn reset_block_assignments(&mut self) {
        for id in [PlayerId::attacker(), PlayerId::defender()] {
            if let Some(ps) = self.players.get_mut(&id) {
                for creature in &mut ps.creatures {
                    creature.clear_combat_links();
                }
            }
        }
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (id, state) in &self.players {
            if !first {
                writeln!(f)?;
            }
            first = false;
            write!(f, "Player {id}:")?;
            for line in state.to_string().lines() {
                write!(f, "\n  {line}")?;
            }
        }
        Ok(())
    }
}

/// Return the state for `id`, creating it at the default starting life if absent
pub fn ensure_player_state<'a>(state: &'a mut GameState, id: &PlayerId) -> &'a mut PlayerState {
    state.players.entry(id.clone()).or_default()
}

/// True if `id` has 0 or less life or at least ten poison counters
///
/// Unknown players have not lost.
pub fn has_player_lost(state: &GameState, id: &PlayerId) -> bool {
    state.players.get(id).is_some_and(PlayerState::has_lost)
}
