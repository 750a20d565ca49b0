//! Keyword abilities relevant to combat
//!
//! Keywords are stored as typed fields on [`Keywords`]. The [`Keyword`] enum
//! enumerates those fields at compile time so generic code (ability listing,
//! combat value, CLI display) can walk them without reflection.

use crate::{CombatError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A combat keyword ability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Keyword {
    // Evasion
    Flying,
    Reach,
    Menace,
    Fear,
    Shadow,
    Horsemanship,
    Skulk,
    Unblockable,
    Daunt,
    Intimidate,

    // Damage
    FirstStrike,
    DoubleStrike,
    Deathtouch,
    Trample,
    Lifelink,
    Wither,
    Infect,
    Indestructible,
    Vigilance,

    // Attack triggers
    Melee,
    Training,
    Mentor,
    Battalion,
    Dethrone,

    // Death replacement
    Undying,
    Persist,

    // Restrictions
    Defender,
    Provoke,

    // Keywords with a number
    Toxic,
    Bushido,
    Flanking,
    Rampage,
    Exalted,
    BattleCry,
    Frenzy,
    Afflict,
}

impl Keyword {
    pub const ALL: [Keyword; 36] = [
        Keyword::Flying,
        Keyword::Reach,
        Keyword::Menace,
        Keyword::Fear,
        Keyword::Shadow,
        Keyword::Horsemanship,
        Keyword::Skulk,
        Keyword::Unblockable,
        Keyword::Daunt,
        Keyword::Intimidate,
        Keyword::FirstStrike,
        Keyword::DoubleStrike,
        Keyword::Deathtouch,
        Keyword::Trample,
        Keyword::Lifelink,
        Keyword::Wither,
        Keyword::Infect,
        Keyword::Indestructible,
        Keyword::Vigilance,
        Keyword::Melee,
        Keyword::Training,
        Keyword::Mentor,
        Keyword::Battalion,
        Keyword::Dethrone,
        Keyword::Undying,
        Keyword::Persist,
        Keyword::Defender,
        Keyword::Provoke,
        Keyword::Toxic,
        Keyword::Bushido,
        Keyword::Flanking,
        Keyword::Rampage,
        Keyword::Exalted,
        Keyword::BattleCry,
        Keyword::Frenzy,
        Keyword::Afflict,
    ];

    /// Human readable name as printed on cards
    pub fn name(self) -> &'static str {
        match self {
            Keyword::Flying => "Flying",
            Keyword::Reach => "Reach",
            Keyword::Menace => "Menace",
            Keyword::Fear => "Fear",
            Keyword::Shadow => "Shadow",
            Keyword::Horsemanship => "Horsemanship",
            Keyword::Skulk => "Skulk",
            Keyword::Unblockable => "Unblockable",
            Keyword::Daunt => "Daunt",
            Keyword::Intimidate => "Intimidate",
            Keyword::FirstStrike => "First strike",
            Keyword::DoubleStrike => "Double strike",
            Keyword::Deathtouch => "Deathtouch",
            Keyword::Trample => "Trample",
            Keyword::Lifelink => "Lifelink",
            Keyword::Wither => "Wither",
            Keyword::Infect => "Infect",
            Keyword::Indestructible => "Indestructible",
            Keyword::Vigilance => "Vigilance",
            Keyword::Melee => "Melee",
            Keyword::Training => "Training",
            Keyword::Mentor => "Mentor",
            Keyword::Battalion => "Battalion",
            Keyword::Dethrone => "Dethrone",
            Keyword::Undying => "Undying",
            Keyword::Persist => "Persist",
            Keyword::Defender => "Defender",
            Keyword::Provoke => "Provoke",
            Keyword::Toxic => "Toxic",
            Keyword::Bushido => "Bushido",
            Keyword::Flanking => "Flanking",
            Keyword::Rampage => "Rampage",
            Keyword::Exalted => "Exalted",
            Keyword::BattleCry => "Battle cry",
            Keyword::Frenzy => "Frenzy",
            Keyword::Afflict => "Afflict",
        }
    }

    /// Look up a keyword by its printed name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Keyword> {
        Keyword::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Keywords carrying a number ("Bushido 2", "Toxic 1")
    pub fn is_counted(self) -> bool {
        matches!(
            self,
            Keyword::Toxic
                | Keyword::Bushido
                | Keyword::Flanking
                | Keyword::Rampage
                | Keyword::Exalted
                | Keyword::BattleCry
                | Keyword::Frenzy
                | Keyword::Afflict
        )
    }

    /// Whether the keyword adds to a creature's combat value
    ///
    /// Mentor, provoke and defender do not; toxic is excluded as well.
    pub fn adds_value(self) -> bool {
        !matches!(
            self,
            Keyword::Mentor | Keyword::Provoke | Keyword::Defender | Keyword::Toxic
        )
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Keyword abilities of one creature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Keywords {
    pub flying: bool,
    pub reach: bool,
    pub menace: bool,
    pub fear: bool,
    pub shadow: bool,
    pub horsemanship: bool,
    pub skulk: bool,
    pub unblockable: bool,
    pub daunt: bool,
    pub intimidate: bool,

    pub first_strike: bool,
    pub double_strike: bool,
    pub deathtouch: bool,
    pub trample: bool,
    pub lifelink: bool,
    pub wither: bool,
    pub infect: bool,
    pub indestructible: bool,
    pub vigilance: bool,

    pub melee: bool,
    pub training: bool,
    pub mentor: bool,
    pub battalion: bool,
    pub dethrone: bool,

    pub undying: bool,
    pub persist: bool,

    pub defender: bool,
    pub provoke: bool,

    pub toxic: u32,
    pub bushido: u32,
    pub flanking: u32,
    pub rampage: u32,
    pub exalted_count: u32,
    pub battle_cry_count: u32,
    pub frenzy: u32,
    pub afflict: u32,
}

impl Keywords {
    pub fn new() -> Self {
        Self::default()
    }

    fn flag_mut(&mut self, keyword: Keyword) -> Option<&mut bool> {
        Some(match keyword {
            Keyword::Flying => &mut self.flying,
            Keyword::Reach => &mut self.reach,
            Keyword::Menace => &mut self.menace,
            Keyword::Fear => &mut self.fear,
            Keyword::Shadow => &mut self.shadow,
            Keyword::Horsemanship => &mut self.horsemanship,
            Keyword::Skulk => &mut self.skulk,
            Keyword::Unblockable => &mut self.unblockable,
            Keyword::Daunt => &mut self.daunt,
            Keyword::Intimidate => &mut self.intimidate,
            Keyword::FirstStrike => &mut self.first_strike,
            Keyword::DoubleStrike => &mut self.double_strike,
            Keyword::Deathtouch => &mut self.deathtouch,
            Keyword::Trample => &mut self.trample,
            Keyword::Lifelink => &mut self.lifelink,
            Keyword::Wither => &mut self.wither,
            Keyword::Infect => &mut self.infect,
            Keyword::Indestructible => &mut self.indestructible,
            Keyword::Vigilance => &mut self.vigilance,
            Keyword::Melee => &mut self.melee,
            Keyword::Training => &mut self.training,
            Keyword::Mentor => &mut self.mentor,
            Keyword::Battalion => &mut self.battalion,
            Keyword::Dethrone => &mut self.dethrone,
            Keyword::Undying => &mut self.undying,
            Keyword::Persist => &mut self.persist,
            Keyword::Defender => &mut self.defender,
            Keyword::Provoke => &mut self.provoke,
            _ => return None,
        })
    }

    fn count_mut(&mut self, keyword: Keyword) -> Option<&mut u32> {
        Some(match keyword {
            Keyword::Toxic => &mut self.toxic,
            Keyword::Bushido => &mut self.bushido,
            Keyword::Flanking => &mut self.flanking,
            Keyword::Rampage => &mut self.rampage,
            Keyword::Exalted => &mut self.exalted_count,
            Keyword::BattleCry => &mut self.battle_cry_count,
            Keyword::Frenzy => &mut self.frenzy,
            Keyword::Afflict => &mut self.afflict,
            _ => return None,
        })
    }

    /// Numeric value of a keyword: 0/1 for flags, N for counted keywords
    pub fn get(&self, keyword: Keyword) -> u32 {
        // Copy to reuse the field dispatch without duplicating the match
        let mut copy = *self;
        if let Some(flag) = copy.flag_mut(keyword) {
            return u32::from(*flag);
        }
        copy.count_mut(keyword).map(|n| *n).unwrap_or(0)
    }

    pub fn has(&self, keyword: Keyword) -> bool {
        self.get(keyword) > 0
    }

    /// Grant a flag keyword, or add one instance of a counted keyword
    pub fn grant(&mut self, keyword: Keyword) {
        if let Some(flag) = self.flag_mut(keyword) {
            *flag = true;
        } else if let Some(n) = self.count_mut(keyword) {
            *n += 1;
        }
    }

    /// Set a keyword's value; flags treat any nonzero value as present
    pub fn set(&mut self, keyword: Keyword, value: i64) -> Result<()> {
        if value < 0 {
            return Err(CombatError::InvalidValue(format!(
                "{} cannot be negative",
                keyword.name()
            )));
        }
        if let Some(flag) = self.flag_mut(keyword) {
            *flag = value > 0;
        } else if let Some(n) = self.count_mut(keyword) {
            *n = u32::try_from(value).map_err(|_| {
                CombatError::InvalidValue(format!("{} is too large", keyword.name()))
            })?;
        }
        Ok(())
    }

    /// Keywords present, in table order
    pub fn iter(&self) -> impl Iterator<Item = (Keyword, u32)> + '_ {
        Keyword::ALL
            .into_iter()
            .map(|k| (k, self.get(k)))
            .filter(|(_, n)| *n > 0)
    }

    /// First strike or double strike: deals damage in the first-strike step
    pub fn strikes_first(&self) -> bool {
        self.first_strike || self.double_strike
    }

    /// Deals damage in the regular combat damage step
    pub fn strikes_normally(&self) -> bool {
        !self.first_strike || self.double_strike
    }
}
