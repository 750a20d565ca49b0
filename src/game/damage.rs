//! Damage assignment order strategies
//!
//! An attacker blocked by several creatures assigns its combat damage in an
//! order chosen by its controller (CR 510.1c). Strategies pick that order.

use crate::core::{BlockerList, Creature};
use crate::game::combat::Score;
use crate::game::limits::IterationCounter;
use crate::game::simulator::CombatSimulator;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Chooses the order in which an attacker assigns damage to its blockers
pub trait DamageAssignmentStrategy {
    /// Return positions into `blockers`, first to receive damage first
    fn order_blockers(&self, attacker: &Creature, blockers: &[&Creature]) -> Result<Vec<usize>>;

    fn name(&self) -> &str;
}

/// Blockers receive damage in declaration order
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclarationOrder;

impl DamageAssignmentStrategy for DeclarationOrder {
    fn order_blockers(&self, _attacker: &Creature, blockers: &[&Creature]) -> Result<Vec<usize>> {
        Ok((0..blockers.len()).collect())
    }

    fn name(&self) -> &str {
        "declaration"
    }
}

/// Weakest blockers first, to kill as many as possible
#[derive(Debug, Clone, Copy, Default)]
pub struct MostCreaturesKilled;

impl DamageAssignmentStrategy for MostCreaturesKilled {
    fn order_blockers(&self, _attacker: &Creature, blockers: &[&Creature]) -> Result<Vec<usize>> {
        let mut order: Vec<usize> = (0..blockers.len()).collect();
        // Stable, so equal toughness keeps declaration order
        order.sort_by_key(|&i| blockers[i].effective_toughness());
        Ok(order)
    }

    fn name(&self) -> &str {
        "most-killed"
    }
}

/// Side the optimal strategy plays for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Perspective {
    /// Pick the order worst for the defender
    #[default]
    Attacker,
    /// Pick the order best for the defender
    Defender,
}

/// Tries every order and keeps the one best for its side
///
/// Each order is resolved in an isolated copy of the attacker and its
/// blockers. Every trial consumes one iteration from the counter, if any.
#[derive(Debug, Clone, Default)]
pub struct OptimalDamageStrategy {
    counter: Option<Rc<IterationCounter>>,
    perspective: Perspective,
}

impl OptimalDamageStrategy {
    pub fn new(counter: Option<Rc<IterationCounter>>, perspective: Perspective) -> Self {
        OptimalDamageStrategy {
            counter,
            perspective,
        }
    }

    pub fn for_attacker(counter: Rc<IterationCounter>) -> Self {
        Self::new(Some(counter), Perspective::Attacker)
    }

    pub fn perspective(&self) -> Perspective {
        self.perspective
    }

    fn trial(&self, attacker: &Creature, blockers: &[&Creature], order: &[usize]) -> Result<Score> {
        if let Some(counter) = &self.counter {
            counter.increment()?;
        }

        let mut atk = attacker.clone();
        atk.blocked_by = order.iter().copied().collect();
        atk.blocking = None;

        let blks: Vec<Creature> = blockers
            .iter()
            .map(|b| {
                let mut b = (*b).clone();
                b.blocked_by.clear();
                b.blocking = Some(0);
                b
            })
            .collect();

        let orders = BTreeMap::from([(0, order.iter().copied().collect::<BlockerList>())]);
        let result = CombatSimulator::new(vec![atk], blks)?
            .damage_only()
            .with_damage_orders(orders)
            .simulate()?;
        Ok(result.score(&attacker.controller, &blockers[0].controller))
    }

    fn improves(&self, candidate: &Score, best: &Score) -> bool {
        match self.perspective {
            Perspective::Attacker => candidate > best,
            Perspective::Defender => candidate < best,
        }
    }
}

impl DamageAssignmentStrategy for OptimalDamageStrategy {
    fn order_blockers(&self, attacker: &Creature, blockers: &[&Creature]) -> Result<Vec<usize>> {
        if blockers.len() <= 1 {
            return Ok((0..blockers.len()).collect());
        }

        let mut order: Vec<usize> = (0..blockers.len()).collect();
        let mut best_order = order.clone();
        let mut best_score = self.trial(attacker, blockers, &order)?;
        while next_permutation(&mut order) {
            let score = self.trial(attacker, blockers, &order)?;
            if self.improves(&score, &best_score) {
                best_score = score;
                best_order.clone_from(&order);
            }
        }
        Ok(best_order)
    }

    fn name(&self) -> &str {
        "optimal"
    }
}

/// Advance `order` to the next lexicographic permutation
///
/// Returns false (leaving `order` sorted ascending) after the last one.
pub fn next_permutation(order: &mut [usize]) -> bool {
    if order.len() < 2 {
        return false;
    }
    let Some(pivot) = (0..order.len() - 1).rev().find(|&i| order[i] < order[i + 1]) else {
        order.reverse();
        return false;
    };
    let successor = (pivot + 1..order.len())
        .rev()
        .find(|&j| order[j] > order[pivot])
        .unwrap_or(pivot + 1);
    order.swap(pivot, successor);
    order[pivot + 1..].reverse();
    true
}

/// Every ordering of `blockers`, in lexicographic order of positions
pub fn damage_order_permutations(blockers: &[usize]) -> Vec<BlockerList> {
    let mut positions: Vec<usize> = (0..blockers.len()).collect();
    let mut all = Vec::new();
    loop {
        all.push(positions.iter().map(|&p| blockers[p]).collect());
        if !next_permutation(&mut positions) {
            break;
        }
    }
    all
}
