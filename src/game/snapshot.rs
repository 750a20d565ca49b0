//! Combat scenario snapshots
//!
//! A snapshot captures everything needed to replay one combat: both rosters,
//! life and poison totals, provoke and mentor choices, and optionally the
//! declared blocks. Snapshots are plain JSON so scenarios can be checked in
//! as regression fixtures and fed to the command-line tool.

use crate::core::{Creature, GameState, PlayerId, PlayerState};
use crate::game::evaluator::{wire_assignment, Assignment};
use crate::game::simulator::CreatureMap;
use crate::{CombatError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Life and poison of one player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerTotals {
    pub life: i32,
    #[serde(default)]
    pub poison: i32,
}

/// A serializable combat scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatSnapshot {
    pub version: u32,

    pub attackers: Vec<Creature>,

    #[serde(default)]
    pub blockers: Vec<Creature>,

    /// Totals per player; empty when the scenario has no game state
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub players: BTreeMap<PlayerId, PlayerTotals>,

    /// Attacker index to the blocker it provokes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub provoke: CreatureMap,

    /// Mentor attacker index to the attacker it mentors
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub mentor: CreatureMap,

    /// Declared blocks, one entry per blocker; empty if none were declared
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Assignment,
}

impl CombatSnapshot {
    pub fn new(attackers: Vec<Creature>, blockers: Vec<Creature>) -> Self {
        CombatSnapshot {
            version: SNAPSHOT_VERSION,
            attackers,
            blockers,
            players: BTreeMap::new(),
            provoke: CreatureMap::new(),
            mentor: CreatureMap::new(),
            blocks: Assignment::new(),
        }
    }

    /// Capture a combat in progress, blocks included
    ///
    /// Blocks are read from the blockers' `blocking` links.
    pub fn capture(attackers: &[Creature], blockers: &[Creature], state: Option<&GameState>) -> Self {
        let mut snapshot = Self::new(attackers.to_vec(), blockers.to_vec());
        if blockers.iter().any(|b| b.blocking.is_some()) {
            snapshot.blocks = blockers.iter().map(|b| b.blocking).collect();
        }
        if let Some(state) = state {
            snapshot.players = state
                .players
                .iter()
                .map(|(id, ps)| {
                    (
                        id.clone(),
                        PlayerTotals {
                            life: ps.life,
                            poison: ps.poison,
                        },
                    )
                })
                .collect();
        }
        snapshot
    }

    pub fn with_player(mut self, id: impl Into<PlayerId>, life: i32, poison: i32) -> Self {
        self.players.insert(id.into(), PlayerTotals { life, poison });
        self
    }

    pub fn with_provoke(mut self, provoke: CreatureMap) -> Self {
        self.provoke = provoke;
        self
    }

    pub fn with_mentor(mut self, mentor: CreatureMap) -> Self {
        self.mentor = mentor;
        self
    }

    pub fn with_blocks(mut self, blocks: Assignment) -> Self {
        self.blocks = blocks;
        self
    }

    /// Check creature invariants and that every index points into the rosters
    pub fn validate(&self) -> Result<()> {
        if self.version != SNAPSHOT_VERSION {
            return Err(CombatError::InvalidValue(format!(
                "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                self.version
            )));
        }
        for creature in self.attackers.iter().chain(&self.blockers) {
            creature.validate()?;
        }
        for (id, totals) in &self.players {
            if totals.life < 0 || totals.poison < 0 {
                return Err(CombatError::InvalidValue(format!(
                    "player {id} has negative life or poison"
                )));
            }
        }

        let attackers = self.attackers.len();
        let blockers = self.blockers.len();
        for (&a, &b) in &self.provoke {
            if a >= attackers || b >= blockers {
                return Err(CombatError::UnknownMapping(format!(
                    "provoke entry {a} -> {b} is out of range"
                )));
            }
        }
        for (&mentor, &target) in &self.mentor {
            if mentor >= attackers || target >= attackers {
                return Err(CombatError::UnknownMapping(format!(
                    "mentor entry {mentor} -> {target} is out of range"
                )));
            }
        }
        if !self.blocks.is_empty() {
            if self.blocks.len() != blockers {
                return Err(CombatError::InvalidValue(format!(
                    "blocks list has {} entries for {blockers} blockers",
                    self.blocks.len()
                )));
            }
            if let Some(a) = self.blocks.iter().flatten().find(|&&a| a >= attackers) {
                return Err(CombatError::UnknownMapping(format!(
                    "block on unknown attacker #{a}"
                )));
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| CombatError::Serialization(e.to_string()))
    }

    /// Decode and validate a snapshot
    pub fn from_json(json: &str) -> Result<Self> {
        let mut snapshot: CombatSnapshot =
            serde_json::from_str(json).map_err(|e| CombatError::Serialization(e.to_string()))?;
        for creature in snapshot.attackers.iter_mut().chain(&mut snapshot.blockers) {
            creature.apply_counter_annihilation();
        }
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_json()?)?;
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&json)
    }

    /// Game state with the recorded totals, or `None` if there are none
    ///
    /// Each player's creature list holds the attackers and blockers it
    /// controls.
    pub fn game_state(&self) -> Result<Option<GameState>> {
        if self.players.is_empty() {
            return Ok(None);
        }
        let mut state = GameState::new();
        for (id, totals) in &self.players {
            let creatures = self
                .attackers
                .iter()
                .chain(&self.blockers)
                .filter(|c| c.controller == *id)
                .cloned()
                .collect();
            state
                .players
                .insert(id.clone(), PlayerState::new(totals.life, totals.poison, creatures)?);
        }
        Ok(Some(state))
    }

    /// Rosters with the recorded blocks wired in
    pub fn wired_rosters(&self) -> (Vec<Creature>, Vec<Creature>) {
        if self.blocks.is_empty() {
            return (self.attackers.clone(), self.blockers.clone());
        }
        wire_assignment(&self.attackers, &self.blockers, &self.blocks)
    }
}
