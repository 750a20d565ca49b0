//! Combat damage resolution
//!
//! `CombatSimulator` takes the declared attackers and blockers (with their
//! `blocking`/`blocked_by` links already wired) and runs one combat:
//!
//! 1. validate the declared blocks
//! 2. apply attack and block triggers
//! 3. state-based actions
//! 4. first-strike damage step, if anyone strikes first
//! 5. regular damage step
//!
//! Lifelink, state-based actions and the players-lost check follow each
//! damage step. The caller's creatures are moved into the simulator; read
//! them back through `attackers()` / `blockers()` afterwards.

use crate::core::{
    ensure_player_state, BlockerList, CombatantId, Creature, GameState, Keywords, PlayerId,
};
use crate::game::combat::{CombatResult, DestroyedCreature};
use crate::game::damage::{DamageAssignmentStrategy, DeclarationOrder};
use crate::game::logger::{CombatLogger, VerbosityLevel};
use crate::game::validation::validate_blocking;
use crate::{CombatError, Result};
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;

/// Fixed damage order per attacker index (blocker indices, first hit first)
pub type DamageOrders = BTreeMap<usize, BlockerList>;

/// Attacker index to creature index (provoke targets a blocker, mentor an attacker)
pub type CreatureMap = BTreeMap<usize, usize>;

/// Which damage step is being resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DamageStep {
    FirstStrike,
    Regular,
}

impl DamageStep {
    fn deals_damage(self, keywords: &Keywords) -> bool {
        match self {
            DamageStep::FirstStrike => keywords.strikes_first(),
            DamageStep::Regular => keywords.strikes_normally(),
        }
    }
}

/// Resolves one combat between two rosters
pub struct CombatSimulator {
    attackers: Vec<Creature>,
    blockers: Vec<Creature>,
    game_state: Option<GameState>,
    strategy: Box<dyn DamageAssignmentStrategy>,
    damage_orders: DamageOrders,
    provoke: CreatureMap,
    mentor: CreatureMap,
    defending_player: Option<PlayerId>,
    damage_only: bool,
    logger: CombatLogger,

    /// Attackers that were blocked when damage began
    blocked: Vec<bool>,
    damage_to_players: BTreeMap<PlayerId, i32>,
    poison_counters: BTreeMap<PlayerId, i32>,
    lifegain: BTreeMap<PlayerId, i32>,
    lifegain_applied: BTreeMap<PlayerId, i32>,
    players_lost: Vec<PlayerId>,
    creatures_destroyed: Vec<DestroyedCreature>,
    dead: FxHashSet<CombatantId>,
    /// Returned by persist or undying; no longer attacking or blocking
    out_of_combat: FxHashSet<CombatantId>,
}

impl CombatSimulator {
    /// Set up a combat; fails with `IllegalBlock` if an attacker has defender
    pub fn new(attackers: Vec<Creature>, blockers: Vec<Creature>) -> Result<Self> {
        if let Some(wall) = attackers.iter().find(|a| a.keywords.defender) {
            return Err(CombatError::IllegalBlock(format!(
                "{} has defender and can't attack",
                wall.name
            )));
        }
        Ok(CombatSimulator {
            attackers,
            blockers,
            game_state: None,
            strategy: Box::new(DeclarationOrder),
            damage_orders: DamageOrders::new(),
            provoke: CreatureMap::new(),
            mentor: CreatureMap::new(),
            defending_player: None,
            damage_only: false,
            logger: CombatLogger::silent(),
            blocked: Vec::new(),
            damage_to_players: BTreeMap::new(),
            poison_counters: BTreeMap::new(),
            lifegain: BTreeMap::new(),
            lifegain_applied: BTreeMap::new(),
            players_lost: Vec::new(),
            creatures_destroyed: Vec::new(),
            dead: FxHashSet::default(),
            out_of_combat: FxHashSet::default(),
        })
    }

    /// Track life and poison totals; damage and lifelink update them
    pub fn with_game_state(mut self, state: GameState) -> Self {
        self.game_state = Some(state);
        self
    }

    pub fn with_strategy(mut self, strategy: Box<dyn DamageAssignmentStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Fix the damage order of some attackers instead of asking the strategy
    pub fn with_damage_orders(mut self, orders: DamageOrders) -> Self {
        self.damage_orders = orders;
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

    pub fn with_defending_player(mut self, player: impl Into<PlayerId>) -> Self {
        self.defending_player = Some(player.into());
        self
    }

    pub fn with_logger(mut self, logger: CombatLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Resolve damage only: no block validation and no triggers
    ///
    /// Used to replay the damage steps of a combat whose triggers have
    /// already been applied to the creatures.
    pub fn damage_only(mut self) -> Self {
        self.damage_only = true;
        self
    }

    pub fn attackers(&self) -> &[Creature] {
        &self.attackers
    }

    pub fn blockers(&self) -> &[Creature] {
        &self.blockers
    }

    pub fn game_state(&self) -> Option<&GameState> {
        self.game_state.as_ref()
    }

    pub fn into_game_state(self) -> Option<GameState> {
        self.game_state
    }

    pub fn players_lost(&self) -> &[PlayerId] {
        &self.players_lost
    }

    pub fn logger(&self) -> &CombatLogger {
        &self.logger
    }

    /// Damage order chosen (or fixed) for each blocked attacker
    pub fn damage_orders(&self) -> &DamageOrders {
        &self.damage_orders
    }

    /// The player being attacked
    ///
    /// An explicit override wins, then the first blocker's controller, then
    /// any player in the game state other than the attacking one.
    pub fn defending_player(&self) -> PlayerId {
        if let Some(player) = &self.defending_player {
            return player.clone();
        }
        if let Some(blocker) = self.blockers.first() {
            return blocker.controller.clone();
        }
        if let Some(state) = &self.game_state {
            let attacking = self.attackers.first().map(|a| &a.controller);
            if let Some(id) = state.players.keys().find(|id| Some(*id) != attacking) {
                return id.clone();
            }
        }
        PlayerId::new("defender")
    }

    /// Run the combat and return its outcome
    pub fn simulate(&mut self) -> Result<CombatResult> {
        self.defending_player = Some(self.defending_player());

        if !self.damage_only {
            self.logger.normal("Declare blockers");
            validate_blocking(&self.attackers, &self.blockers, &self.provoke)?;
            self.apply_precombat_triggers()?;
        }

        self.blocked = self
            .attackers
            .iter()
            .map(|a| !a.blocked_by.is_empty())
            .collect();

        self.check_lethal_damage();
        self.check_players_lost();
        self.resolve_damage_orders()?;

        if self.any_first_strike() {
            self.logger.normal("First strike damage step");
            self.resolve_damage_step(DamageStep::FirstStrike);
            self.apply_lifelink();
            self.check_lethal_damage();
            self.check_players_lost();
        }

        self.logger.normal("Combat damage step");
        self.resolve_damage_step(DamageStep::Regular);
        self.apply_lifelink();
        self.check_lethal_damage();
        self.check_players_lost();

        let result = self.finalize();
        self.logger.log(
            VerbosityLevel::Minimal,
            Some("combat"),
            format_args!("{result}"),
        );
        Ok(result)
    }

    fn finalize(&self) -> CombatResult {
        CombatResult {
            damage_to_players: self.damage_to_players.clone(),
            creatures_destroyed: self.creatures_destroyed.clone(),
            lifegain: self.lifegain.clone(),
            poison_counters: self.poison_counters.clone(),
            players_lost: self.players_lost.clone(),
        }
    }

    // --- Lookup helpers ---

    fn creature(&self, id: CombatantId) -> &Creature {
        match id {
            CombatantId::Attacker(i) => &self.attackers[i],
            CombatantId::Blocker(i) => &self.blockers[i],
        }
    }

    fn creature_mut(&mut self, id: CombatantId) -> &mut Creature {
        match id {
            CombatantId::Attacker(i) => &mut self.attackers[i],
            CombatantId::Blocker(i) => &mut self.blockers[i],
        }
    }

    fn combatant_ids(&self) -> Vec<CombatantId> {
        (0..self.attackers.len())
            .map(CombatantId::Attacker)
            .chain((0..self.blockers.len()).map(CombatantId::Blocker))
            .collect()
    }

    /// Dead or removed from combat
    fn is_gone(&self, id: CombatantId) -> bool {
        self.dead.contains(&id) || self.out_of_combat.contains(&id)
    }

    fn defender_id(&self) -> PlayerId {
        self.defending_player
            .clone()
            .unwrap_or_else(|| self.defending_player())
    }

    fn any_first_strike(&self) -> bool {
        self.combatant_ids()
            .into_iter()
            .any(|id| !self.is_gone(id) && self.creature(id).keywords.strikes_first())
    }

    // --- Triggers ---

    fn apply_precombat_triggers(&mut self) -> Result<()> {
        self.logger.normal("Attack and block triggers");
        for creature in self.attackers.iter_mut().chain(self.blockers.iter_mut()) {
            creature.reset_temporary_bonuses();
        }
        for attacker in &mut self.attackers {
            attacker.attacking = true;
            if !attacker.keywords.vigilance {
                attacker.tapped = true;
            }
        }

        self.check_mentor()?;
        self.apply_mentor();
        self.apply_exalted();
        self.apply_battle_cry();
        self.apply_melee();
        self.apply_training();
        self.apply_battalion();
        self.apply_dethrone();
        self.apply_frenzy_and_afflict();
        self.apply_blocking_bonuses();
        Ok(())
    }

    fn trigger_log(&self, id: CombatantId, what: &str) {
        self.logger.log(
            VerbosityLevel::Verbose,
            Some("trigger"),
            format_args!("{} {}", self.creature(id).name, what),
        );
    }

    /// Every mentor entry must name an attacking mentor and a weaker attacker
    fn check_mentor(&self) -> Result<()> {
        for (&mentor, &target) in &self.mentor {
            let Some(source) = self.attackers.get(mentor) else {
                return Err(CombatError::UnknownMapping(format!(
                    "mentor #{mentor} is not attacking"
                )));
            };
            if !source.keywords.mentor {
                return Err(CombatError::UnknownMapping(format!(
                    "{} does not have mentor",
                    source.name
                )));
            }
            let Some(student) = self.attackers.get(target) else {
                return Err(CombatError::UnknownMapping(format!(
                    "mentor target #{target} is not attacking"
                )));
            };
            if student.effective_power() >= source.effective_power() {
                return Err(CombatError::UnknownMapping(format!(
                    "{} is not weaker than its mentor {}",
                    student.name, source.name
                )));
            }
        }
        Ok(())
    }

    fn apply_mentor(&mut self) {
        let targets: Vec<usize> = self.mentor.values().copied().collect();
        for target in targets {
            self.attackers[target].add_plus1_counters(1);
            self.trigger_log(CombatantId::Attacker(target), "gets a +1/+1 counter (mentor)");
        }
    }

    fn attackers_per_controller(&self) -> BTreeMap<PlayerId, usize> {
        let mut counts = BTreeMap::new();
        for attacker in &self.attackers {
            *counts.entry(attacker.controller.clone()).or_insert(0) += 1;
        }
        counts
    }

    fn apply_exalted(&mut self) {
        let counts = self.attackers_per_controller();
        for i in 0..self.attackers.len() {
            let attacker = &mut self.attackers[i];
            let exalted = attacker.keywords.exalted_count as i32;
            if exalted > 0 && counts.get(&attacker.controller) == Some(&1) {
                attacker.temp_power += exalted;
                attacker.temp_toughness += exalted;
                self.trigger_log(CombatantId::Attacker(i), "attacks alone (exalted)");
            }
        }
    }

    fn apply_battle_cry(&mut self) {
        let bonuses: Vec<i32> = (0..self.attackers.len())
            .map(|j| {
                self.attackers
                    .iter()
                    .enumerate()
                    .filter(|&(i, a)| i != j && a.controller == self.attackers[j].controller)
                    .map(|(_, a)| a.keywords.battle_cry_count as i32)
                    .sum()
            })
            .collect();
        for (i, bonus) in bonuses.into_iter().enumerate() {
            if bonus > 0 {
                self.attackers[i].temp_power += bonus;
                self.trigger_log(CombatantId::Attacker(i), "gets a battle cry bonus");
            }
        }
    }

    fn apply_melee(&mut self) {
        // Only one opponent is ever attacked
        for i in 0..self.attackers.len() {
            if self.attackers[i].keywords.melee {
                self.attackers[i].temp_power += 1;
                self.attackers[i].temp_toughness += 1;
                self.trigger_log(CombatantId::Attacker(i), "gets +1/+1 (melee)");
            }
        }
    }

    fn apply_training(&mut self) {
        let trained: Vec<usize> = (0..self.attackers.len())
            .filter(|&i| {
                let attacker = &self.attackers[i];
                attacker.keywords.training
                    && self.attackers.iter().enumerate().any(|(j, other)| {
                        j != i
                            && other.controller == attacker.controller
                            && other.effective_power() > attacker.effective_power()
                    })
            })
            .collect();
        for i in trained {
            self.attackers[i].add_plus1_counters(1);
            self.trigger_log(CombatantId::Attacker(i), "gets a +1/+1 counter (training)");
        }
    }

    fn apply_battalion(&mut self) {
        let counts = self.attackers_per_controller();
        for i in 0..self.attackers.len() {
            let attacker = &mut self.attackers[i];
            if attacker.keywords.battalion
                && counts.get(&attacker.controller).copied().unwrap_or(0) >= 3
            {
                attacker.temp_power += 1;
                attacker.temp_toughness += 1;
                self.trigger_log(CombatantId::Attacker(i), "gets +1/+1 (battalion)");
            }
        }
    }

    fn apply_dethrone(&mut self) {
        if !self.attackers.iter().any(|a| a.keywords.dethrone) {
            return;
        }
        let defender = self.defender_id();
        let Some(state) = self.game_state.as_mut() else {
            return;
        };
        let defender_life = ensure_player_state(state, &defender).life;
        let max_life = state
            .players
            .values()
            .map(|ps| ps.life)
            .max()
            .unwrap_or(defender_life);
        if defender_life < max_life {
            return;
        }
        for i in 0..self.attackers.len() {
            if self.attackers[i].keywords.dethrone {
                self.attackers[i].add_plus1_counters(1);
                self.trigger_log(CombatantId::Attacker(i), "gets a +1/+1 counter (dethrone)");
            }
        }
    }

    fn apply_frenzy_and_afflict(&mut self) {
        let defender = self.defender_id();
        for i in 0..self.attackers.len() {
            let attacker = &mut self.attackers[i];
            let blocked = !attacker.blocked_by.is_empty();
            let frenzy = attacker.keywords.frenzy as i32;
            let afflict = attacker.keywords.afflict as i32;

            if frenzy > 0 && !blocked {
                attacker.temp_power += frenzy;
                self.trigger_log(CombatantId::Attacker(i), "is unblocked (frenzy)");
            }
            if afflict > 0 && blocked {
                // Life loss, not damage: lifelink does not apply
                *self.damage_to_players.entry(defender.clone()).or_insert(0) += afflict;
                if let Some(state) = self.game_state.as_mut() {
                    ensure_player_state(state, &defender).life -= afflict;
                }
                self.logger.log(
                    VerbosityLevel::Verbose,
                    Some("trigger"),
                    format_args!(
                        "{} is blocked; {} loses {} life (afflict)",
                        self.attackers[i].name, defender, afflict
                    ),
                );
            }
        }
    }

    /// Bushido, rampage and flanking
    fn apply_blocking_bonuses(&mut self) {
        for i in 0..self.attackers.len() {
            if self.attackers[i].blocked_by.is_empty() {
                continue;
            }
            let keywords = self.attackers[i].keywords;
            let extra_blockers = self.attackers[i].blocked_by.len() as i32 - 1;

            let bonus = keywords.bushido as i32 + extra_blockers * keywords.rampage as i32;
            if bonus > 0 {
                self.attackers[i].temp_power += bonus;
                self.attackers[i].temp_toughness += bonus;
                self.trigger_log(CombatantId::Attacker(i), "is blocked (bushido/rampage)");
            }

            let flanking = keywords.flanking as i32;
            if flanking > 0 {
                let blocked_by = self.attackers[i].blocked_by.clone();
                for b in blocked_by {
                    if self.blockers[b].keywords.flanking == 0 {
                        self.blockers[b].temp_power -= flanking;
                        self.blockers[b].temp_toughness -= flanking;
                        self.trigger_log(CombatantId::Blocker(b), "is flanked");
                    }
                }
            }
        }

        for b in 0..self.blockers.len() {
            let blocker = &mut self.blockers[b];
            let bushido = blocker.keywords.bushido as i32;
            if bushido > 0 && blocker.blocking.is_some() {
                blocker.temp_power += bushido;
                blocker.temp_toughness += bushido;
                self.trigger_log(CombatantId::Blocker(b), "blocks (bushido)");
            }
        }
    }

    // --- Damage ---

    /// Decide the damage order of every blocked attacker once, before damage
    fn resolve_damage_orders(&mut self) -> Result<()> {
        for i in 0..self.attackers.len() {
            if self.is_gone(CombatantId::Attacker(i)) {
                continue;
            }
            let live: BlockerList = self.attackers[i]
                .blocked_by
                .iter()
                .copied()
                .filter(|&b| !self.is_gone(CombatantId::Blocker(b)))
                .collect();
            if live.is_empty() {
                continue;
            }

            if let Some(fixed) = self.damage_orders.get(&i) {
                if let Some(&missing) = live.iter().find(|b| !fixed.contains(b)) {
                    return Err(CombatError::UnknownMapping(format!(
                        "damage order for {} omits blocker #{missing}",
                        self.attackers[i].name
                    )));
                }
                continue;
            }

            let order: BlockerList = {
                let refs: Vec<&Creature> = live.iter().map(|&b| &self.blockers[b]).collect();
                self.strategy
                    .order_blockers(&self.attackers[i], &refs)?
                    .into_iter()
                    .filter_map(|pos| live.get(pos).copied())
                    .collect()
            };
            if order.len() > 1 {
                self.logger.log(
                    VerbosityLevel::Verbose,
                    Some("damage"),
                    format_args!(
                        "{} orders its blockers {:?} ({})",
                        self.attackers[i].name,
                        order.as_slice(),
                        self.strategy.name()
                    ),
                );
            }
            self.damage_orders.insert(i, order);
        }
        Ok(())
    }

    /// Live blockers of attacker `i` in damage assignment order
    fn ordered_blockers(&self, i: usize) -> BlockerList {
        let declared = &self.attackers[i].blocked_by;
        let alive = |b: &usize| declared.contains(b) && !self.is_gone(CombatantId::Blocker(*b));
        match self.damage_orders.get(&i) {
            Some(order) => order.iter().copied().filter(alive).collect(),
            None => declared.iter().copied().filter(alive).collect(),
        }
    }

    fn resolve_damage_step(&mut self, step: DamageStep) {
        // Blocker power is read before any damage so the step is simultaneous
        let mut blocker_power: Vec<Option<i32>> = vec![None; self.blockers.len()];
        for (b, blocker) in self.blockers.iter().enumerate() {
            if !self.is_gone(CombatantId::Blocker(b)) && step.deals_damage(&blocker.keywords) {
                blocker_power[b] = Some(blocker.damage_output());
            }
        }

        for i in 0..self.attackers.len() {
            if self.is_gone(CombatantId::Attacker(i)) {
                continue;
            }
            let attacker_strikes = step.deals_damage(&self.attackers[i].keywords);
            let order = self.ordered_blockers(i);

            if order.is_empty() {
                // A blocked attacker stays blocked after its blockers leave
                let hits_player = !self.blocked[i] || self.attackers[i].keywords.trample;
                if attacker_strikes && hits_player {
                    let amount = self.attackers[i].damage_output();
                    self.deal_damage_to_player(i, amount);
                }
                continue;
            }

            if attacker_strikes {
                self.assign_attacker_damage(i, &order);
            }
            for &b in &order {
                if let Some(power) = blocker_power[b] {
                    self.deal_damage_to_creature(
                        CombatantId::Blocker(b),
                        CombatantId::Attacker(i),
                        power,
                    );
                }
            }
        }
    }

    /// Assign attacker `i`'s damage among its blockers (CR 510.1c)
    ///
    /// Each blocker must be assigned lethal damage before the next one gets
    /// any. Blockers never take more than lethal; without trample the
    /// excess is not dealt at all.
    fn assign_attacker_damage(&mut self, i: usize, order: &[usize]) {
        let attacker = &self.attackers[i];
        let mut remaining = attacker.damage_output();
        let deathtouch = attacker.keywords.deathtouch;
        let trample = attacker.keywords.trample;

        for &b in order {
            if remaining <= 0 {
                break;
            }
            let blocker = &self.blockers[b];
            let toughness_left = (blocker.effective_toughness() - blocker.damage_marked).max(0);
            let lethal = if deathtouch {
                toughness_left.min(1)
            } else {
                toughness_left
            };
            let amount = remaining.min(lethal);
            self.deal_damage_to_creature(CombatantId::Attacker(i), CombatantId::Blocker(b), amount);
            remaining -= amount;
        }

        if remaining > 0 && trample {
            self.deal_damage_to_player(i, remaining);
        }
    }

    fn deal_damage_to_creature(&mut self, source: CombatantId, target: CombatantId, amount: i32) {
        if amount <= 0 {
            return;
        }
        let (keywords, colors) = {
            let s = self.creature(source);
            (s.keywords, s.colors)
        };

        if self.creature(target).is_protected_from_any(&colors) {
            self.logger.log(
                VerbosityLevel::Verbose,
                Some("damage"),
                format_args!(
                    "{} damage from {} to {} is prevented (protection)",
                    amount,
                    self.creature(source).name,
                    self.creature(target).name
                ),
            );
            return;
        }

        let victim = self.creature_mut(target);
        if keywords.wither || keywords.infect {
            victim.add_minus1_counters(amount as u32);
        } else {
            victim.damage_marked += amount;
        }
        if keywords.deathtouch {
            victim.damaged_by_deathtouch = true;
        }

        self.logger.log(
            VerbosityLevel::Verbose,
            Some("damage"),
            format_args!(
                "{} deals {} damage to {}",
                self.creature(source).name,
                amount,
                self.creature(target).name
            ),
        );

        if keywords.lifelink {
            let controller = self.creature(source).controller.clone();
            *self.lifegain.entry(controller).or_insert(0) += amount;
        }
    }

    /// Combat damage from attacker `i` to the defending player
    fn deal_damage_to_player(&mut self, i: usize, amount: i32) {
        if amount <= 0 {
            return;
        }
        let defender = self.defender_id();
        let keywords = self.attackers[i].keywords;

        if keywords.infect {
            *self.poison_counters.entry(defender.clone()).or_insert(0) += amount;
            if let Some(state) = self.game_state.as_mut() {
                ensure_player_state(state, &defender).poison += amount;
            }
        } else {
            *self.damage_to_players.entry(defender.clone()).or_insert(0) += amount;
            if let Some(state) = self.game_state.as_mut() {
                ensure_player_state(state, &defender).life -= amount;
            }
        }

        let toxic = keywords.toxic as i32;
        if toxic > 0 {
            *self.poison_counters.entry(defender.clone()).or_insert(0) += toxic;
            if let Some(state) = self.game_state.as_mut() {
                ensure_player_state(state, &defender).poison += toxic;
            }
        }

        self.logger.log(
            VerbosityLevel::Verbose,
            Some("damage"),
            format_args!(
                "{} deals {} damage to {}",
                self.attackers[i].name, amount, defender
            ),
        );

        if keywords.lifelink {
            let controller = self.attackers[i].controller.clone();
            *self.lifegain.entry(controller).or_insert(0) += amount;
        }
    }

    /// Add lifelink gains not yet applied to the life totals
    fn apply_lifelink(&mut self) {
        let Some(state) = self.game_state.as_mut() else {
            return;
        };
        for (player, &gain) in &self.lifegain {
            let applied = self.lifegain_applied.entry(player.clone()).or_insert(0);
            let diff = gain - *applied;
            if diff != 0 {
                ensure_player_state(state, player).life += diff;
                *applied = gain;
            }
        }
    }

    // --- State-based actions ---

    /// Destroy creatures with lethal damage or no toughness (CR 704.5f-h)
    ///
    /// Persist and undying return the creature instead. Repeats until no
    /// creature needs to die, as state-based actions do.
    fn check_lethal_damage(&mut self) {
        for creature in self.attackers.iter_mut().chain(self.blockers.iter_mut()) {
            creature.apply_counter_annihilation();
        }

        loop {
            let doomed: Vec<CombatantId> = self
                .combatant_ids()
                .into_iter()
                .filter(|&id| !self.dead.contains(&id))
                .filter(|&id| {
                    let c = self.creature(id);
                    c.is_destroyed_by_damage() || c.effective_toughness() <= 0
                })
                .collect();
            if doomed.is_empty() {
                break;
            }

            for id in doomed {
                let creature = self.creature(id);
                if creature.keywords.undying && creature.plus1_counters() == 0 {
                    self.return_to_battlefield(id, 1, 0);
                    self.log_sba(id, "dies and returns with a +1/+1 counter (undying)");
                } else if creature.keywords.persist && creature.minus1_counters() == 0 {
                    self.return_to_battlefield(id, 0, 1);
                    self.log_sba(id, "dies and returns with a -1/-1 counter (persist)");
                } else {
                    let snapshot = creature.clone();
                    self.dead.insert(id);
                    self.creatures_destroyed.push(DestroyedCreature {
                        id,
                        creature: snapshot,
                    });
                    self.log_sba(id, "is destroyed");
                }
            }
        }
    }

    fn log_sba(&self, id: CombatantId, what: &str) {
        self.logger.log(
            VerbosityLevel::Normal,
            Some("sba"),
            format_args!("{} {}", self.creature(id).name, what),
        );
    }

    /// Return a dying creature as a new object with the given counters
    fn return_to_battlefield(&mut self, id: CombatantId, plus1: u32, minus1: u32) {
        let creature = self.creature_mut(id);
        creature.replace_counters(plus1, minus1);
        creature.damage_marked = 0;
        creature.damaged_by_deathtouch = false;
        creature.reset_temporary_bonuses();
        creature.tapped = false;
        creature.attacking = false;
        let blocking = creature.blocking.take();
        creature.blocked_by.clear();

        if let (CombatantId::Blocker(b), Some(a)) = (id, blocking) {
            self.attackers[a].blocked_by.retain(|x| *x != b);
        }
        self.out_of_combat.insert(id);
    }

    fn check_players_lost(&mut self) {
        let Some(state) = &self.game_state else {
            return;
        };
        for (id, player) in &state.players {
            if player.has_lost() && !self.players_lost.contains(id) {
                self.logger.log(
                    VerbosityLevel::Normal,
                    Some("combat"),
                    format_args!("Player {id} has lost the game"),
                );
                self.players_lost.push(id.clone());
            }
        }
    }
}

impl std::fmt::Debug for CombatSimulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombatSimulator")
            .field("attackers", &self.attackers)
            .field("blockers", &self.blockers)
            .field("strategy", &self.strategy.name())
            .field("damage_only", &self.damage_only)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Color, Keyword, PlayerId};
    use crate::game::damage::MostCreaturesKilled;

    fn creature(name: &str, power: i32, toughness: i32, controller: &str) -> Creature {
        Creature::new(name, power, toughness, controller).unwrap()
    }

    fn block(attackers: &mut [Creature], blockers: &mut [Creature], a: usize, b: usize) {
        attackers[a].blocked_by.push(b);
        blockers[b].blocking = Some(a);
    }

    fn run(
        mut attackers: Vec<Creature>,
        mut blockers: Vec<Creature>,
        links: &[(usize, usize)],
    ) -> (CombatResult, CombatSimulator) {
        for &(a, b) in links {
            block(&mut attackers, &mut blockers, a, b);
        }
        let mut sim = CombatSimulator::new(attackers, blockers).unwrap();
        let result = sim.simulate().unwrap();
        (result, sim)
    }

    #[test]
    fn test_defender_cannot_attack() {
        let wall = creature("Wall", 0, 4, "A").with_keyword(Keyword::Defender);
        let err = CombatSimulator::new(vec![wall], Vec::new()).unwrap_err();
        assert!(err.is_illegal_block());
    }

    #[test]
    fn test_unblocked_damage() {
        let (result, sim) = run(vec![creature("Bear", 2, 2, "A")], Vec::new(), &[]);
        assert_eq!(result.damage_to_players[&PlayerId::new("defender")], 2);
        assert!(sim.attackers()[0].tapped);
        assert!(sim.attackers()[0].attacking);
    }

    #[test]
    fn test_vigilance_does_not_tap() {
        let knight = creature("Knight", 2, 2, "A").with_keyword(Keyword::Vigilance);
        let (_, sim) = run(vec![knight], Vec::new(), &[]);
        assert!(!sim.attackers()[0].tapped);
    }

    #[test]
    fn test_trade() {
        let (result, _) = run(
            vec![creature("Bear", 2, 2, "A")],
            vec![creature("Bear", 2, 2, "B")],
            &[(0, 0)],
        );
        assert_eq!(result.creatures_destroyed.len(), 2);
        assert!(result.damage_to_players.is_empty());
    }

    #[test]
    fn test_first_strike_wins() {
        let striker = creature("Striker", 2, 2, "A").with_keyword(Keyword::FirstStrike);
        let (result, _) = run(vec![striker], vec![creature("Bear", 2, 2, "B")], &[(0, 0)]);
        assert_eq!(result.destroyed_names(), vec!["Bear"]);
    }

    #[test]
    fn test_double_strike_hits_twice() {
        let duelist = creature("Duelist", 2, 2, "A").with_keyword(Keyword::DoubleStrike);
        let (result, _) = run(vec![duelist], Vec::new(), &[]);
        assert_eq!(result.damage_to_players[&PlayerId::new("defender")], 4);
    }

    #[test]
    fn test_excess_damage_without_trample_is_not_dealt() {
        let giant = creature("Giant", 6, 6, "A");
        let (result, sim) = run(
            vec![giant],
            vec![creature("Elf", 1, 1, "B"), creature("Wall", 0, 3, "B")],
            &[(0, 0), (0, 1)],
        );
        assert_eq!(result.creatures_destroyed.len(), 2);
        assert_eq!(sim.blockers()[0].damage_marked, 1);
        assert_eq!(sim.blockers()[1].damage_marked, 3);
        assert!(result.damage_to_players.is_empty());
    }

    #[test]
    fn test_lifelink_counts_only_damage_dealt() {
        let tormentor = creature("Tormentor", 3, 3, "A")
            .with_keyword_count(Keyword::Afflict, 2)
            .unwrap()
            .with_keyword(Keyword::Lifelink);
        let (result, sim) = run(vec![tormentor], vec![creature("Soldier", 2, 2, "B")], &[(0, 0)]);
        assert_eq!(result.destroyed_names(), vec!["Soldier"]);
        assert_eq!(sim.blockers()[0].damage_marked, 2);
        assert_eq!(result.damage_to_players[&PlayerId::new("B")], 2);
        assert_eq!(result.lifegain[&PlayerId::new("A")], 2);
    }

    #[test]
    fn test_blocked_attacker_without_trample_deals_no_player_damage() {
        // Double striker kills the blocker first; the attacker is still blocked
        let giant = creature("Giant", 4, 4, "A").with_keyword(Keyword::DoubleStrike);
        let (result, _) = run(vec![giant.clone()], vec![creature("Elf", 1, 1, "B")], &[(0, 0)]);
        assert!(result.damage_to_players.is_empty());

        let giant = giant.with_keyword(Keyword::Trample);
        let (result, _) = run(vec![giant], vec![creature("Elf", 1, 1, "B")], &[(0, 0)]);
        // 3 tramples over in the first step, all 4 in the second
        assert_eq!(result.damage_to_players[&PlayerId::new("B")], 7);
    }

    #[test]
    fn test_deathtouch_needs_one_damage() {
        let assassin = creature("Assassin", 2, 1, "A")
            .with_keyword(Keyword::Deathtouch)
            .with_keyword(Keyword::Trample);
        let (result, _) = run(vec![assassin], vec![creature("Giant", 5, 5, "B")], &[(0, 0)]);
        assert_eq!(result.creatures_destroyed.len(), 2);
        assert_eq!(result.damage_to_players[&PlayerId::new("B")], 1);
    }

    #[test]
    fn test_protection_prevents_damage() {
        let knight = creature("Knight", 2, 2, "B").with_protection([Color::Red]);
        let goblin = creature("Goblin", 3, 3, "A").with_colors([Color::Red]);
        let mut attackers = vec![goblin];
        let mut blockers = vec![knight];
        block(&mut attackers, &mut blockers, 0, 0);
        let mut sim = CombatSimulator::new(attackers, blockers).unwrap();
        let result = sim.simulate().unwrap();
        assert!(result.creatures_destroyed.is_empty());
        assert_eq!(sim.blockers()[0].damage_marked, 0);
        assert_eq!(sim.attackers()[0].damage_marked, 2);
    }

    #[test]
    fn test_wither_leaves_counters() {
        let witherer = creature("Witherer", 2, 2, "A").with_keyword(Keyword::Wither);
        let (result, sim) = run(vec![witherer], vec![creature("Wall", 0, 4, "B")], &[(0, 0)]);
        assert!(result.creatures_destroyed.is_empty());
        assert_eq!(sim.blockers()[0].minus1_counters(), 2);
        assert_eq!(sim.blockers()[0].damage_marked, 0);
        assert_eq!(sim.blockers()[0].effective_toughness(), 2);
    }

    #[test]
    fn test_lifelink_updates_state() {
        let cleric = creature("Cleric", 3, 3, "A").with_keyword(Keyword::Lifelink);
        let state = GameState::two_player(10, Vec::new(), 20, Vec::new()).unwrap();
        let mut sim = CombatSimulator::new(vec![cleric], Vec::new())
            .unwrap()
            .with_game_state(state);
        let result = sim.simulate().unwrap();
        assert_eq!(result.lifegain[&PlayerId::attacker()], 3);
        let state = sim.game_state().unwrap();
        assert_eq!(state.players[&PlayerId::attacker()].life, 13);
        assert_eq!(state.players[&PlayerId::defender()].life, 17);
    }

    #[test]
    fn test_lethal_damage_loses_game() {
        let state = GameState::two_player(20, Vec::new(), 2, Vec::new()).unwrap();
        let mut sim = CombatSimulator::new(vec![creature("Bear", 2, 2, "A")], Vec::new())
            .unwrap()
            .with_game_state(state);
        let result = sim.simulate().unwrap();
        assert_eq!(result.players_lost, vec![PlayerId::defender()]);
        assert_eq!(sim.players_lost(), &[PlayerId::defender()]);
    }

    #[test]
    fn test_undying_returns() {
        let spirit = creature("Spirit", 2, 2, "B").with_keyword(Keyword::Undying);
        let (result, sim) = run(vec![creature("Ogre", 3, 3, "A")], vec![spirit], &[(0, 0)]);
        assert!(!result.was_destroyed(CombatantId::Blocker(0)));
        let spirit = &sim.blockers()[0];
        assert_eq!(spirit.plus1_counters(), 1);
        assert_eq!(spirit.damage_marked, 0);
        assert_eq!(spirit.blocking, None);
        assert!(sim.attackers()[0].blocked_by.is_empty());
    }

    #[test]
    fn test_persist_creature_dies_second_time() {
        let mut spirit = creature("Spirit", 2, 2, "B").with_keyword(Keyword::Persist);
        spirit.add_minus1_counters(1);
        let (result, _) = run(vec![creature("Ogre", 3, 3, "A")], vec![spirit], &[(0, 0)]);
        assert!(result.was_destroyed(CombatantId::Blocker(0)));
    }

    #[test]
    fn test_afflict_is_life_loss() {
        let afflicted = creature("Afflicted", 2, 2, "A")
            .with_keyword_count(Keyword::Afflict, 2)
            .unwrap()
            .with_keyword(Keyword::Lifelink);
        let (result, _) = run(vec![afflicted], vec![creature("Wall", 0, 4, "B")], &[(0, 0)]);
        assert_eq!(result.damage_to_players[&PlayerId::new("B")], 2);
        assert_eq!(result.lifegain[&PlayerId::new("A")], 2);
    }

    #[test]
    fn test_flanking_shrinks_blocker() {
        let knight = creature("Knight", 2, 2, "A")
            .with_keyword_count(Keyword::Flanking, 1)
            .unwrap();
        let (result, _) = run(vec![knight], vec![creature("Elf", 1, 1, "B")], &[(0, 0)]);
        // Elf dies to the flanking trigger before damage
        assert_eq!(result.destroyed_names(), vec!["Elf"]);
        assert!(result.damage_to_players.is_empty());
    }

    #[test]
    fn test_rampage_and_bushido() {
        let beast = creature("Beast", 3, 3, "A")
            .with_keyword_count(Keyword::Rampage, 2)
            .unwrap();
        let (_, sim) = run(
            vec![beast],
            vec![creature("Wall", 0, 5, "B"), creature("Elf", 1, 1, "B")],
            &[(0, 0), (0, 1)],
        );
        assert_eq!(sim.attackers()[0].effective_power(), 5);

        let samurai = creature("Samurai", 2, 2, "B")
            .with_keyword_count(Keyword::Bushido, 1)
            .unwrap();
        let (result, _) = run(vec![creature("Bear", 2, 2, "A")], vec![samurai], &[(0, 0)]);
        assert_eq!(result.destroyed_names(), vec!["Bear"]);
    }

    #[test]
    fn test_exalted_only_for_lone_attacker() {
        let angel = creature("Angel", 2, 2, "A")
            .with_keyword_count(Keyword::Exalted, 1)
            .unwrap();
        let (result, _) = run(vec![angel.clone()], Vec::new(), &[]);
        assert_eq!(result.damage_to_players[&PlayerId::new("defender")], 3);

        let (result, _) = run(vec![angel, creature("Bear", 2, 2, "A")], Vec::new(), &[]);
        assert_eq!(result.damage_to_players[&PlayerId::new("defender")], 4);
    }

    #[test]
    fn test_battle_cry_and_battalion() {
        let leader = creature("Leader", 1, 1, "A")
            .with_keyword_count(Keyword::BattleCry, 1)
            .unwrap()
            .with_keyword(Keyword::Battalion);
        let attackers = vec![
            leader,
            creature("Soldier", 1, 1, "A"),
            creature("Soldier", 1, 1, "A"),
        ];
        let (result, sim) = run(attackers, Vec::new(), &[]);
        assert_eq!(sim.attackers()[0].effective_power(), 2);
        assert_eq!(sim.attackers()[1].effective_power(), 2);
        assert_eq!(result.damage_to_players[&PlayerId::new("defender")], 6);
    }

    #[test]
    fn test_mentor_and_training() {
        let mentor = creature("Mentor", 3, 3, "A").with_keyword(Keyword::Mentor);
        let pupil = creature("Pupil", 1, 1, "A").with_keyword(Keyword::Training);
        let mut sim = CombatSimulator::new(vec![mentor, pupil], Vec::new())
            .unwrap()
            .with_mentor(BTreeMap::from([(0, 1)]));
        sim.simulate().unwrap();
        // One counter from mentor, one from training
        assert_eq!(sim.attackers()[1].plus1_counters(), 2);
    }

    #[test]
    fn test_mentor_requires_weaker_target() {
        let mentor = creature("Mentor", 2, 2, "A").with_keyword(Keyword::Mentor);
        let peer = creature("Peer", 2, 2, "A");
        let mut sim = CombatSimulator::new(vec![mentor, peer], Vec::new())
            .unwrap()
            .with_mentor(BTreeMap::from([(0, 1)]));
        assert!(matches!(sim.simulate(), Err(CombatError::UnknownMapping(_))));

        let mut sim = CombatSimulator::new(vec![creature("Bear", 3, 3, "A")], Vec::new())
            .unwrap()
            .with_mentor(BTreeMap::from([(0, 4)]));
        assert!(matches!(sim.simulate(), Err(CombatError::UnknownMapping(_))));
    }

    #[test]
    fn test_dethrone_needs_defender_at_most_life() {
        let rogue = creature("Rogue", 2, 2, "A").with_keyword(Keyword::Dethrone);
        let state = GameState::two_player(15, Vec::new(), 20, Vec::new()).unwrap();
        let mut sim = CombatSimulator::new(vec![rogue.clone()], Vec::new())
            .unwrap()
            .with_game_state(state);
        sim.simulate().unwrap();
        assert_eq!(sim.attackers()[0].plus1_counters(), 1);

        let state = GameState::two_player(20, Vec::new(), 15, Vec::new()).unwrap();
        let mut sim = CombatSimulator::new(vec![rogue], Vec::new())
            .unwrap()
            .with_game_state(state);
        sim.simulate().unwrap();
        assert_eq!(sim.attackers()[0].plus1_counters(), 0);
    }

    #[test]
    fn test_frenzy_when_unblocked() {
        let berserker = creature("Berserker", 1, 1, "A")
            .with_keyword_count(Keyword::Frenzy, 2)
            .unwrap();
        let (result, _) = run(vec![berserker], Vec::new(), &[]);
        assert_eq!(result.damage_to_players[&PlayerId::new("defender")], 3);
    }

    #[test]
    fn test_strategy_orders_damage() {
        let giant = creature("Giant", 3, 5, "A");
        let mut attackers = vec![giant];
        let mut blockers = vec![creature("Wall", 0, 3, "B"), creature("Elf", 1, 1, "B")];
        block(&mut attackers, &mut blockers, 0, 0);
        block(&mut attackers, &mut blockers, 0, 1);
        let mut sim = CombatSimulator::new(attackers, blockers)
            .unwrap()
            .with_strategy(Box::new(MostCreaturesKilled));
        let result = sim.simulate().unwrap();
        assert_eq!(result.destroyed_names(), vec!["Elf"]);
        assert_eq!(sim.damage_orders()[&0].as_slice(), &[1, 0]);
    }

    #[test]
    fn test_fixed_damage_order_must_cover_blockers() {
        let mut attackers = vec![creature("Giant", 3, 5, "A")];
        let mut blockers = vec![creature("Wall", 0, 3, "B"), creature("Elf", 1, 1, "B")];
        block(&mut attackers, &mut blockers, 0, 0);
        block(&mut attackers, &mut blockers, 0, 1);
        let orders = BTreeMap::from([(0, BlockerList::from_slice(&[1]))]);
        let mut sim = CombatSimulator::new(attackers, blockers)
            .unwrap()
            .with_damage_orders(orders);
        assert!(matches!(sim.simulate(), Err(CombatError::UnknownMapping(_))));
    }

    #[test]
    fn test_capturing_logger_records_events() {
        let mut attackers = vec![creature("Bear", 2, 2, "A")];
        let mut blockers = vec![creature("Wall", 0, 4, "B")];
        block(&mut attackers, &mut blockers, 0, 0);
        let mut sim = CombatSimulator::new(attackers, blockers)
            .unwrap()
            .with_logger(CombatLogger::capturing());
        sim.simulate().unwrap();
        let logs = sim.logger().logs();
        assert!(logs.iter().any(|e| e.message == "Bear deals 2 damage to Wall"));
        assert!(logs.iter().any(|e| e.message == "Combat damage step"));
    }

    #[test]
    fn test_defending_player_fallbacks() {
        let sim = CombatSimulator::new(vec![creature("Bear", 2, 2, "A")], Vec::new()).unwrap();
        assert_eq!(sim.defending_player(), PlayerId::new("defender"));

        let state = GameState::two_player(20, Vec::new(), 20, Vec::new()).unwrap();
        let sim = sim.with_game_state(state);
        assert_eq!(sim.defending_player(), PlayerId::defender());

        let sim = sim.with_defending_player("C");
        assert_eq!(sim.defending_player(), PlayerId::new("C"));
    }
}
