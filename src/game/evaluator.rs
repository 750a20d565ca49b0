//! Scoring a single block assignment
//!
//! The evaluator copies the rosters, wires the candidate blocks and runs one
//! simulation. Illegal assignments come back as `Evaluation::Illegal` rather
//! than as an error.

use crate::core::{Creature, GameState, PlayerId};
use crate::game::combat::{CombatResult, Score};
use crate::game::damage::OptimalDamageStrategy;
use crate::game::limits::IterationCounter;
use crate::game::simulator::{CombatSimulator, CreatureMap, DamageOrders};
use crate::{CombatError, Result};
use std::rc::Rc;

static NO_MAPPING: CreatureMap = CreatureMap::new();

/// For each blocker, the attacker it blocks (if any)
pub type Assignment = Vec<Option<usize>>;

/// The fixed inputs of a blocking decision
#[derive(Debug, Clone, Copy)]
pub struct CombatScenario<'a> {
    pub attackers: &'a [Creature],
    pub blockers: &'a [Creature],
    pub state: Option<&'a GameState>,
    /// Attacker index to the blocker it provokes
    pub provoke: &'a CreatureMap,
    /// Mentor attacker index to the attacker it mentors
    pub mentor: &'a CreatureMap,
}

impl<'a> CombatScenario<'a> {
    pub fn new(attackers: &'a [Creature], blockers: &'a [Creature]) -> Self {
        CombatScenario {
            attackers,
            blockers,
            state: None,
            provoke: &NO_MAPPING,
            mentor: &NO_MAPPING,
        }
    }

    pub fn with_state(mut self, state: Option<&'a GameState>) -> Self {
        self.state = state;
        self
    }

    pub fn with_provoke(mut self, provoke: &'a CreatureMap) -> Self {
        self.provoke = provoke;
        self
    }

    pub fn with_mentor(mut self, mentor: &'a CreatureMap) -> Self {
        self.mentor = mentor;
        self
    }

    /// Player being attacked: the first blocker's controller, else the
    /// state's first non-attacking player
    pub fn defending_player(&self) -> PlayerId {
        if let Some(blocker) = self.blockers.first() {
            return blocker.controller.clone();
        }
        let attacking = self.attackers.first().map(|a| &a.controller);
        self.state
            .and_then(|state| state.players.keys().find(|id| Some(*id) != attacking))
            .cloned()
            .unwrap_or_else(|| PlayerId::new("defender"))
    }

    pub fn attacking_player(&self) -> PlayerId {
        self.attackers
            .first()
            .map(|a| a.controller.clone())
            .unwrap_or_else(|| PlayerId::new("attacker"))
    }
}

/// Outcome of evaluating one assignment
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Scored { score: Score, result: CombatResult },
    Illegal { reason: String },
}

impl Evaluation {
    /// Score for ranking; illegal assignments get the worst possible score
    pub fn score(&self) -> Score {
        match self {
            Evaluation::Scored { score, .. } => *score,
            Evaluation::Illegal { .. } => Score::ILLEGAL,
        }
    }

    pub fn is_legal(&self) -> bool {
        matches!(self, Evaluation::Scored { .. })
    }

    pub fn result(&self) -> Option<&CombatResult> {
        match self {
            Evaluation::Scored { result, .. } => Some(result),
            Evaluation::Illegal { .. } => None,
        }
    }
}

/// Copy the rosters and wire `assignment` into them
///
/// Existing links on the copies are discarded. A blocker pointing at an
/// attacker index outside the roster keeps its `blocking` link so block
/// validation reports it.
pub fn wire_assignment(
    attackers: &[Creature],
    blockers: &[Creature],
    assignment: &[Option<usize>],
) -> (Vec<Creature>, Vec<Creature>) {
    let mut atks = attackers.to_vec();
    let mut blks = blockers.to_vec();
    for creature in atks.iter_mut().chain(blks.iter_mut()) {
        creature.clear_combat_links();
    }
    for (b, choice) in assignment.iter().enumerate() {
        if let Some(a) = *choice {
            blks[b].blocking = Some(a);
            if let Some(attacker) = atks.get_mut(a) {
                attacker.blocked_by.push(b);
            }
        }
    }
    (atks, blks)
}

/// Simulate `assignment` and score it for the defender
///
/// Damage orders come from `damage_orders` when given; otherwise each
/// attacker picks the order worst for the defender. One iteration is drawn
/// from `counter` for the simulation itself, plus one per order the
/// attackers try.
pub fn evaluate_block_assignment(
    scenario: &CombatScenario<'_>,
    assignment: &[Option<usize>],
    counter: &Rc<IterationCounter>,
    damage_orders: Option<&DamageOrders>,
) -> Result<Evaluation> {
    if assignment.len() != scenario.blockers.len() {
        return Err(CombatError::InvalidValue(format!(
            "assignment covers {} blockers, expected {}",
            assignment.len(),
            scenario.blockers.len()
        )));
    }

    let (atks, blks) = wire_assignment(scenario.attackers, scenario.blockers, assignment);
    let defender = scenario.defending_player();
    let attacker = scenario.attacking_player();

    counter.increment()?;

    let outcome = CombatSimulator::new(atks, blks).and_then(|sim| {
        let mut sim = sim
            .with_provoke(scenario.provoke.clone())
            .with_mentor(scenario.mentor.clone())
            .with_defending_player(defender.clone());
        if let Some(state) = scenario.state {
            sim = sim.with_game_state(state.totals_only());
        }
        sim = match damage_orders {
            Some(orders) => sim.with_damage_orders(orders.clone()),
            None => sim.with_strategy(Box::new(OptimalDamageStrategy::for_attacker(
                counter.clone(),
            ))),
        };
        sim.simulate()
    });

    match outcome {
        Ok(result) => Ok(Evaluation::Scored {
            score: result.score(&attacker, &defender),
            result,
        }),
        Err(CombatError::IllegalBlock(reason)) => Ok(Evaluation::Illegal { reason }),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Keyword;
    use std::collections::BTreeMap;

    fn creature(name: &str, power: i32, toughness: i32, controller: &str) -> Creature {
        Creature::new(name, power, toughness, controller).unwrap()
    }

    #[test]
    fn test_no_block_scores_damage() {
        let attackers = vec![creature("Bear", 2, 2, "A")];
        let blockers = vec![creature("Wall", 0, 4, "B")];
        let scenario = CombatScenario::new(&attackers, &blockers);
        let counter = Rc::new(IterationCounter::new(10));
        let eval = evaluate_block_assignment(&scenario, &[None], &counter, None).unwrap();
        assert_eq!(eval.score().life_diff, 2);
        assert_eq!(counter.count(), 1);

        let eval = evaluate_block_assignment(&scenario, &[Some(0)], &counter, None).unwrap();
        assert_eq!(eval.score(), Score::ZERO);
    }

    #[test]
    fn test_illegal_assignment_is_not_an_error() {
        let attackers = vec![creature("Bird", 1, 1, "A").with_keyword(Keyword::Flying)];
        let blockers = vec![creature("Bear", 2, 2, "B")];
        let scenario = CombatScenario::new(&attackers, &blockers);
        let counter = Rc::new(IterationCounter::new(10));
        let eval = evaluate_block_assignment(&scenario, &[Some(0)], &counter, None).unwrap();
        assert!(!eval.is_legal());
        assert!(eval.score().is_illegal());
        assert!(eval.result().is_none());

        let eval = evaluate_block_assignment(&scenario, &[Some(3)], &counter, None).unwrap();
        assert!(!eval.is_legal());
    }

    #[test]
    fn test_caller_rosters_untouched() {
        let attackers = vec![creature("Bear", 2, 2, "A")];
        let blockers = vec![creature("Bear", 2, 2, "B")];
        let state = GameState::two_player(20, Vec::new(), 20, Vec::new()).unwrap();
        let scenario = CombatScenario::new(&attackers, &blockers).with_state(Some(&state));
        let counter = Rc::new(IterationCounter::new(10));
        evaluate_block_assignment(&scenario, &[Some(0)], &counter, None).unwrap();
        assert!(attackers[0].blocked_by.is_empty());
        assert!(!attackers[0].tapped);
        assert_eq!(blockers[0].blocking, None);
        assert_eq!(state.players[&PlayerId::defender()].life, 20);
    }

    #[test]
    fn test_defender_loss_dominates() {
        let attackers = vec![creature("Bear", 2, 2, "A")];
        let blockers = vec![creature("Elf", 1, 1, "B")];
        let state = GameState::two_player(20, Vec::new(), 2, Vec::new()).unwrap();
        let scenario = CombatScenario::new(&attackers, &blockers).with_state(Some(&state));
        let counter = Rc::new(IterationCounter::new(10));
        let unblocked = evaluate_block_assignment(&scenario, &[None], &counter, None).unwrap();
        let chump = evaluate_block_assignment(&scenario, &[Some(0)], &counter, None).unwrap();
        assert_eq!(unblocked.score().lost, 1);
        assert!(chump.score() < unblocked.score());
    }

    #[test]
    fn test_defender_from_state_without_blockers() {
        let attackers = vec![creature("Bear", 2, 2, "A")];
        let state = GameState::two_player(20, Vec::new(), 2, Vec::new()).unwrap();
        let scenario = CombatScenario::new(&attackers, &[]).with_state(Some(&state));
        assert_eq!(scenario.defending_player(), PlayerId::defender());

        let counter = Rc::new(IterationCounter::new(10));
        let eval = evaluate_block_assignment(&scenario, &[], &counter, None).unwrap();
        let result = eval.result().unwrap();
        assert_eq!(result.damage_to_players[&PlayerId::defender()], 2);
        assert_eq!(result.players_lost, vec![PlayerId::defender()]);
        assert_eq!(eval.score().lost, 1);
    }

    #[test]
    fn test_mapping_errors_propagate() {
        let attackers = vec![creature("Bear", 2, 2, "A")];
        let blockers = vec![creature("Elf", 1, 1, "B")];
        let mentor = BTreeMap::from([(0, 7)]);
        let scenario = CombatScenario::new(&attackers, &blockers).with_mentor(&mentor);
        let counter = Rc::new(IterationCounter::new(10));
        let err = evaluate_block_assignment(&scenario, &[None], &counter, None).unwrap_err();
        assert!(matches!(err, CombatError::UnknownMapping(_)));
    }

    #[test]
    fn test_wrong_assignment_length() {
        let attackers = vec![creature("Bear", 2, 2, "A")];
        let blockers = vec![creature("Elf", 1, 1, "B")];
        let scenario = CombatScenario::new(&attackers, &blockers);
        let counter = Rc::new(IterationCounter::new(10));
        assert!(matches!(
            evaluate_block_assignment(&scenario, &[None, None], &counter, None),
            Err(CombatError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_double_block_uses_worst_order() {
        // 3 power: attacker kills the flyer rather than the elf
        let attackers = vec![creature("Ogre", 3, 5, "A")];
        let blockers = vec![
            creature("Elf", 1, 1, "B"),
            creature("Drake", 3, 3, "B").with_keyword(Keyword::Reach),
        ];
        let scenario = CombatScenario::new(&attackers, &blockers);
        let counter = Rc::new(IterationCounter::new(10));
        let eval =
            evaluate_block_assignment(&scenario, &[Some(0), Some(0)], &counter, None).unwrap();
        let result = eval.result().unwrap();
        assert_eq!(result.destroyed_names(), vec!["Drake"]);
        // One simulation plus two trial orders
        assert_eq!(counter.count(), 3);
    }
}
