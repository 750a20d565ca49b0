//! Combat outcome and scoring
//!
//! A `CombatResult` is produced once per simulation and never mutated
//! afterwards. `Score` orders outcomes from the defender's point of view.

use crate::core::{CombatantId, Creature, PlayerId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A creature that died during combat, as it was when it died
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestroyedCreature {
    pub id: CombatantId,
    pub creature: Creature,
}

/// Outcome of one combat
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CombatResult {
    /// Damage (and afflict life loss) dealt to each player
    pub damage_to_players: BTreeMap<PlayerId, i32>,

    /// Destroyed creatures in the order they were found
    pub creatures_destroyed: Vec<DestroyedCreature>,

    /// Life gained through lifelink, per player
    pub lifegain: BTreeMap<PlayerId, i32>,

    /// Poison counters gained, per player
    pub poison_counters: BTreeMap<PlayerId, i32>,

    pub players_lost: Vec<PlayerId>,
}

/// Lexicographic score of a combat from the defender's perspective
///
/// Lower is better for the defender. Fields compare in declaration order so
/// each one only breaks ties in the ones before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Score {
    /// 1 if the defender lost the game
    pub lost: u8,
    /// Value destroyed, defender minus attacker, in half points
    pub value_diff: i32,
    /// Creatures destroyed, defender minus attacker
    pub count_diff: i32,
    /// Mana value destroyed, defender minus attacker
    pub mana_diff: i32,
    /// Net life swing against the defender, lifelink included
    pub life_diff: i32,
    /// Poison counters, defender minus attacker
    pub poison_diff: i32,
}

impl Score {
    /// Worse than any legal outcome; stands in for an illegal assignment
    pub const ILLEGAL: Score = Score {
        lost: 1,
        value_diff: i32::MAX,
        count_diff: i32::MAX,
        mana_diff: i32::MAX,
        life_diff: i32::MAX,
        poison_diff: i32::MAX,
    };

    pub const ZERO: Score = Score {
        lost: 0,
        value_diff: 0,
        count_diff: 0,
        mana_diff: 0,
        life_diff: 0,
        poison_diff: 0,
    };

    pub fn is_illegal(&self) -> bool {
        *self == Score::ILLEGAL
    }

    /// The same score with the game-loss term cleared
    pub fn without_loss(self) -> Score {
        if self.is_illegal() {
            return self;
        }
        Score { lost: 0, ..self }
    }

    /// Value difference in points
    pub fn value(&self) -> f64 {
        self.value_diff as f64 / 2.0
    }
}

impl Default for Score {
    fn default() -> Self {
        Score::ZERO
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_illegal() {
            return write!(f, "(illegal)");
        }
        write!(
            f,
            "({}, {}, {}, {}, {}, {})",
            self.lost,
            self.value(),
            self.count_diff,
            self.mana_diff,
            self.life_diff,
            self.poison_diff
        )
    }
}

impl CombatResult {
    /// Score this outcome for `defender` against `attacker`
    pub fn score(&self, attacker: &PlayerId, defender: &PlayerId) -> Score {
        let lost = u8::from(self.players_lost.contains(defender));

        let mut value_diff = 0;
        let mut count_diff = 0;
        let mut mana_diff = 0;
        for dead in &self.creatures_destroyed {
            let sign = if dead.creature.controller == *defender {
                1
            } else if dead.creature.controller == *attacker {
                -1
            } else {
                0
            };
            value_diff += sign * dead.creature.value_half_points();
            count_diff += sign;
            mana_diff += sign * dead.creature.mana_value() as i32;
        }

        let get = |map: &BTreeMap<PlayerId, i32>, id: &PlayerId| map.get(id).copied().unwrap_or(0);
        let life_diff = get(&self.damage_to_players, defender)
            - get(&self.damage_to_players, attacker)
            + get(&self.lifegain, attacker)
            - get(&self.lifegain, defender);
        let poison_diff =
            get(&self.poison_counters, defender) - get(&self.poison_counters, attacker);

        Score {
            lost,
            value_diff,
            count_diff,
            mana_diff,
            life_diff,
            poison_diff,
        }
    }

    /// Whether a creature with this id was destroyed
    pub fn was_destroyed(&self, id: CombatantId) -> bool {
        self.creatures_destroyed.iter().any(|d| d.id == id)
    }

    pub fn destroyed_names(&self) -> Vec<&str> {
        self.creatures_destroyed
            .iter()
            .map(|d| d.creature.name.as_str())
            .collect()
    }
}

impl fmt::Display for CombatResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        if !self.damage_to_players.is_empty() {
            let dmg: Vec<String> = self
                .damage_to_players
                .iter()
                .map(|(p, d)| format!("{p} {d}"))
                .collect();
            parts.push(format!("Damage to players: {}", dmg.join(", ")));
        }
        if !self.poison_counters.is_empty() {
            let poison: Vec<String> = self
                .poison_counters
                .iter()
                .map(|(p, c)| format!("{p} +{c}"))
                .collect();
            parts.push(format!("Poison counters: {}", poison.join(", ")));
        }
        if !self.lifegain.is_empty() {
            let gain: Vec<String> = self
                .lifegain
                .iter()
                .map(|(p, g)| format!("{p} +{g}"))
                .collect();
            parts.push(format!("Life gain: {}", gain.join(", ")));
        }
        if !self.creatures_destroyed.is_empty() {
            parts.push(format!(
                "Creatures destroyed: {}",
                self.destroyed_names().join(", ")
            ));
        }
        if !self.players_lost.is_empty() {
            let lost: Vec<&str> = self.players_lost.iter().map(PlayerId::as_str).collect();
            parts.push(format!("Players lost: {}", lost.join(", ")));
        }

        if parts.is_empty() {
            write!(f, "No changes")
        } else {
            write!(f, "{}", parts.join("\n"))
        }
    }
}
