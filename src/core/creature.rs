//! Creatures taking part in combat

use crate::core::{Color, ColorSet, Keyword, Keywords, ManaCost, PlayerId};
use crate::{CombatError, Result};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Blocker indices in damage assignment order
pub type BlockerList = SmallVec<[usize; 4]>;

/// A creature on the battlefield during one combat
///
/// `blocking` and `blocked_by` are indices into the opposing roster of the
/// same combat. They are back-references only: a creature is owned by the
/// roster (`Vec<Creature>`) that holds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Creature {
    pub name: String,
    pub controller: PlayerId,

    /// Printed power (never negative)
    pub power: i32,

    /// Printed toughness (at least 1)
    pub toughness: i32,

    #[serde(default)]
    pub mana_cost: ManaCost,

    #[serde(default)]
    pub colors: ColorSet,

    #[serde(default)]
    pub artifact: bool,

    #[serde(default)]
    pub keywords: Keywords,

    #[serde(default)]
    pub protection_colors: ColorSet,

    #[serde(default)]
    pub tapped: bool,

    #[serde(default)]
    pub damage_marked: i32,

    #[serde(default)]
    pub damaged_by_deathtouch: bool,

    #[serde(default)]
    plus1_counters: u32,

    #[serde(default)]
    minus1_counters: u32,

    /// Until-end-of-turn modifiers, reset at the start of every combat
    #[serde(default)]
    pub temp_power: i32,

    #[serde(default)]
    pub temp_toughness: i32,

    #[serde(skip)]
    pub attacking: bool,

    /// Attacker this creature is blocking
    #[serde(skip)]
    pub blocking: Option<usize>,

    /// Blockers of this attacker, in damage assignment order
    #[serde(skip)]
    pub blocked_by: BlockerList,
}

impl Creature {
    /// Create a creature with no abilities
    ///
    /// Fails with `InvalidValue` when power is negative or toughness is below 1.
    pub fn new(
        name: impl Into<String>,
        power: i32,
        toughness: i32,
        controller: impl Into<PlayerId>,
    ) -> Result<Self> {
        let creature = Creature {
            name: name.into(),
            controller: controller.into(),
            power,
            toughness,
            mana_cost: ManaCost::new(),
            colors: ColorSet::new(),
            artifact: false,
            keywords: Keywords::new(),
            protection_colors: ColorSet::new(),
            tapped: false,
            damage_marked: 0,
            damaged_by_deathtouch: false,
            plus1_counters: 0,
            minus1_counters: 0,
            temp_power: 0,
            temp_toughness: 0,
            attacking: false,
            blocking: None,
            blocked_by: SmallVec::new(),
        };
        creature.validate()?;
        Ok(creature)
    }

    /// Check the construction invariants
    pub fn validate(&self) -> Result<()> {
        if self.power < 0 {
            return Err(CombatError::InvalidValue(format!(
                "{}: power cannot be negative",
                self.name
            )));
        }
        if self.toughness < 1 {
            return Err(CombatError::InvalidValue(format!(
                "{}: toughness must be positive",
                self.name
            )));
        }
        if self.damage_marked < 0 {
            return Err(CombatError::InvalidValue(format!(
                "{}: damage_marked cannot be negative",
                self.name
            )));
        }
        Ok(())
    }

    pub fn with_keyword(mut self, keyword: Keyword) -> Self {
        self.keywords.grant(keyword);
        self
    }

    /// Set a counted keyword such as "Bushido 2"
    pub fn with_keyword_count(mut self, keyword: Keyword, count: i64) -> Result<Self> {
        self.keywords.set(keyword, count)?;
        Ok(self)
    }

    pub fn with_keywords(mut self, keywords: Keywords) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn with_colors(mut self, colors: impl IntoIterator<Item = Color>) -> Self {
        self.colors = colors.into_iter().collect();
        self
    }

    pub fn with_protection(mut self, colors: impl IntoIterator<Item = Color>) -> Self {
        self.protection_colors = colors.into_iter().collect();
        self
    }

    pub fn with_mana_cost(mut self, cost: &str) -> Self {
        self.mana_cost = ManaCost::parse(cost);
        self
    }

    pub fn with_artifact(mut self) -> Self {
        self.artifact = true;
        self
    }

    pub fn with_tapped(mut self) -> Self {
        self.tapped = true;
        self
    }

    pub fn with_counters(mut self, plus1: i64, minus1: i64) -> Result<Self> {
        self.set_plus1_counters(plus1)?;
        self.set_minus1_counters(minus1)?;
        Ok(self)
    }

    pub fn with_damage(mut self, damage: i32) -> Result<Self> {
        self.damage_marked = damage;
        self.validate()?;
        Ok(self)
    }

    // --- Counters ---

    pub fn plus1_counters(&self) -> u32 {
        self.plus1_counters
    }

    pub fn minus1_counters(&self) -> u32 {
        self.minus1_counters
    }

    pub fn set_plus1_counters(&mut self, value: i64) -> Result<()> {
        self.plus1_counters = checked_counter(value, "plus1 counters")?;
        self.apply_counter_annihilation();
        Ok(())
    }

    pub fn set_minus1_counters(&mut self, value: i64) -> Result<()> {
        self.minus1_counters = checked_counter(value, "minus1 counters")?;
        self.apply_counter_annihilation();
        Ok(())
    }

    pub fn add_plus1_counters(&mut self, amount: u32) {
        self.plus1_counters = self.plus1_counters.saturating_add(amount);
        self.apply_counter_annihilation();
    }

    pub fn add_minus1_counters(&mut self, amount: u32) {
        self.minus1_counters = self.minus1_counters.saturating_add(amount);
        self.apply_counter_annihilation();
    }

    /// Remove matched +1/+1 and -1/-1 counters (CR 704.5q)
    pub fn apply_counter_annihilation(&mut self) {
        let cancel = self.plus1_counters.min(self.minus1_counters);
        self.plus1_counters -= cancel;
        self.minus1_counters -= cancel;
    }

    /// Replace all counters, as when a creature returns to the battlefield
    pub(crate) fn replace_counters(&mut self, plus1: u32, minus1: u32) {
        self.plus1_counters = plus1;
        self.minus1_counters = minus1;
        self.apply_counter_annihilation();
    }

    pub fn reset_temporary_bonuses(&mut self) {
        self.temp_power = 0;
        self.temp_toughness = 0;
    }

    pub fn clear_combat_links(&mut self) {
        self.blocking = None;
        self.blocked_by.clear();
    }

    // --- Derived stats ---

    fn counter_delta(&self) -> i32 {
        self.plus1_counters as i32 - self.minus1_counters as i32
    }

    /// Power including counters and temporary modifiers (may be negative)
    pub fn effective_power(&self) -> i32 {
        self.power + self.temp_power + self.counter_delta()
    }

    /// Toughness including counters and temporary modifiers (may be negative)
    pub fn effective_toughness(&self) -> i32 {
        self.toughness + self.temp_toughness + self.counter_delta()
    }

    /// Combat damage this creature deals
    pub fn damage_output(&self) -> i32 {
        self.effective_power().max(0)
    }

    /// Lethal damage marked (or deathtouch damage); indestructible ignores it
    ///
    /// Zero toughness is checked separately so indestructible creatures still
    /// die from it.
    pub fn is_destroyed_by_damage(&self) -> bool {
        if self.keywords.indestructible {
            return false;
        }
        self.damage_marked >= self.effective_toughness() || self.damaged_by_deathtouch
    }

    pub fn has_protection_from(&self, color: Color) -> bool {
        self.protection_colors.contains(color)
    }

    /// True if any of `colors` is a color this creature is protected from
    pub fn is_protected_from_any(&self, colors: &ColorSet) -> bool {
        self.protection_colors.intersects(colors)
    }

    pub fn mana_value(&self) -> u32 {
        self.mana_cost.cmc()
    }

    /// Heuristic combat value in half points
    ///
    /// Effective power plus toughness, plus one half point per valued keyword
    /// (double strike counts twice, counted keywords add their number).
    /// Defender costs a half point, persist with a -1/-1 counter a half point,
    /// and undying with a +1/+1 counter five half points.
    pub fn value_half_points(&self) -> i32 {
        let mut abilities: i32 = self
            .keywords
            .iter()
            .filter(|(k, _)| k.adds_value())
            .map(|(_, n)| n as i32)
            .sum();
        if self.keywords.double_strike {
            abilities += 1;
        }

        let mut half = 2 * (self.effective_power() + self.effective_toughness()) + abilities;
        if self.keywords.persist && self.minus1_counters > 0 {
            half -= 1;
        }
        if self.keywords.undying && self.plus1_counters > 0 {
            half -= 5;
        }
        if self.keywords.defender {
            half -= 1;
        }
        half
    }

    pub fn value(&self) -> f64 {
        self.value_half_points() as f64 / 2.0
    }

    /// Printed ability list, e.g. `["Flying", "Bushido 2"]`
    pub fn abilities(&self) -> Vec<String> {
        self.keywords
            .iter()
            .map(|(k, n)| {
                if k.is_counted() {
                    format!("{} {}", k.name(), n)
                } else {
                    k.name().to_string()
                }
            })
            .chain(
                self.protection_colors
                    .iter()
                    .map(|c| format!("Protection from {c}")),
            )
            .collect()
    }
}

fn checked_counter(value: i64, what: &str) -> Result<u32> {
    if value < 0 {
        return Err(CombatError::InvalidValue(format!("{what} cannot be negative")));
    }
    u32::try_from(value).map_err(|_| CombatError::InvalidValue(format!("{what} is too large")))
}

impl fmt::Display for Creature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}/{})",
            self.name,
            self.effective_power(),
            self.effective_toughness()
        )
    }
}
