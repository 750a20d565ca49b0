//! Strongly-typed wrappers for combat concepts
//!
//! Player ids and combatant references are wrapped in distinct types so an
//! attacker index can never be confused with a blocker index or a player name.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Player identifier ("A", "B", ...)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(s: impl Into<String>) -> Self {
        PlayerId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Attacking player used by the default player lookup
    pub fn attacker() -> Self {
        PlayerId::new("A")
    }

    /// Defending player used by the default player lookup
    pub fn defender() -> Self {
        PlayerId::new("B")
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PlayerId {
    fn from(s: String) -> Self {
        PlayerId(s)
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        PlayerId(s.to_string())
    }
}

/// Reference to a creature taking part in one combat
///
/// Attackers and blockers live in two separate rosters; the index is the
/// position within the roster on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CombatantId {
    Attacker(usize),
    Blocker(usize),
}

impl CombatantId {
    pub fn index(&self) -> usize {
        match self {
            CombatantId::Attacker(i) | CombatantId::Blocker(i) => *i,
        }
    }

    pub fn is_attacker(&self) -> bool {
        matches!(self, CombatantId::Attacker(_))
    }
}

impl fmt::Display for CombatantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CombatantId::Attacker(i) => write!(f, "attacker #{i}"),
            CombatantId::Blocker(i) => write!(f, "blocker #{i}"),
        }
    }
}
