//! Blocking decisions for the defending player
//!
//! Two searches over block assignments:
//!
//! - `decide_optimal_blocks` tries every legal assignment and, for each one,
//!   every damage order the attacker could pick. An assignment is worth its
//!   worst case, and the best worst case wins.
//! - `decide_simple_blocks` picks the best one-blocker-per-attacker
//!   assignment and then greedily adds extra blockers. It is much cheaper
//!   and can miss the optimum.
//!
//! Both share one iteration budget with every nested simulation and write
//! the chosen blocks into the caller's creatures.

use crate::core::{BlockerList, Creature, GameState, PlayerId};
use crate::game::combat::Score;
use crate::game::damage::damage_order_permutations;
use crate::game::evaluator::{
    evaluate_block_assignment, Assignment, CombatScenario, Evaluation,
};
use crate::game::limits::{IterationCounter, DEFAULT_SEARCH_ITERATIONS};
use crate::game::logger::{CombatLogger, OutputFormat, VerbosityLevel};
use crate::game::simulator::{CreatureMap, DamageOrders};
use crate::game::validation::{can_block, check_provoke_map, provoke_requires_block};
use crate::{CombatError, Result};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Search configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Number of ranked assignments to return
    pub k: usize,
    /// Ceiling on simulations, nested damage-order trials included
    pub max_iterations: u64,
    /// Verbosity of the search summary
    #[serde(default)]
    pub verbosity: VerbosityLevel,
    #[serde(default)]
    pub output_format: OutputFormat,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            k: 1,
            max_iterations: DEFAULT_SEARCH_ITERATIONS,
            verbosity: VerbosityLevel::Silent,
            output_format: OutputFormat::Text,
        }
    }
}

impl SearchOptions {
    /// Options returning the top `k` assignments; negative `k` is rejected
    pub fn with_k(k: i64) -> Result<Self> {
        let k = usize::try_from(k)
            .map_err(|_| CombatError::InvalidValue(format!("k must be non-negative, got {k}")))?;
        Ok(SearchOptions {
            k,
            ..Self::default()
        })
    }

    pub fn max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn verbosity(mut self, verbosity: VerbosityLevel) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }
}

/// An assignment with its (worst-case) score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedAssignment {
    pub score: Score,
    pub assignment: Assignment,
}

/// Outcome of a blocking search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDecision {
    /// Best assignments first, at most `k`
    pub ranked: Vec<RankedAssignment>,
    /// How many assignments share the best score
    pub optimal_count: usize,
    /// Simulations used, nested trials included
    pub iterations: u64,
}

impl BlockDecision {
    pub fn best(&self) -> Option<&RankedAssignment> {
        self.ranked.first()
    }
}

/// Canonical tie-break key: "no block" sorts after every attacker index
fn assignment_key(assignment: &[Option<usize>], attacker_count: usize) -> Vec<usize> {
    assignment
        .iter()
        .map(|choice| choice.unwrap_or(attacker_count))
        .collect()
}

/// Possible choices for each blocker
///
/// Tapped blockers cannot block. A blocker that provoke forces onto an
/// attacker has only that choice.
fn blocker_options(
    attackers: &[Creature],
    blockers: &[Creature],
    provoke: &CreatureMap,
) -> Vec<Vec<Option<usize>>> {
    blockers
        .iter()
        .enumerate()
        .map(|(b, blocker)| {
            if blocker.tapped {
                return vec![None];
            }
            let forced = provoke
                .iter()
                .find(|&(&p, &t)| t == b && provoke_requires_block(attackers, blockers, p, b));
            if let Some((&p, _)) = forced {
                return vec![Some(p)];
            }
            attackers
                .iter()
                .enumerate()
                .filter(|(_, attacker)| can_block(attacker, blocker))
                .map(|(a, _)| Some(a))
                .chain(std::iter::once(None))
                .collect()
        })
        .collect()
}

/// Advance a mixed-radix counter; false once it wraps around
fn advance_odometer(digits: &mut [usize], radices: &[usize]) -> bool {
    for (digit, &radix) in digits.iter_mut().zip(radices).rev() {
        *digit += 1;
        if *digit < radix {
            return true;
        }
        *digit = 0;
    }
    false
}

/// Lazy walk over the cartesian product of the blocker options
///
/// Only the current digits are held, so memory does not grow with the
/// number of candidates.
struct Assignments<'a> {
    options: &'a [Vec<Option<usize>>],
    radices: Vec<usize>,
    digits: Vec<usize>,
    done: bool,
}

impl Iterator for Assignments<'_> {
    type Item = Assignment;

    fn next(&mut self) -> Option<Assignment> {
        if self.done {
            return None;
        }
        let current = self
            .digits
            .iter()
            .zip(self.options)
            .map(|(&d, choices)| choices[d])
            .collect();
        self.done = !advance_odometer(&mut self.digits, &self.radices);
        Some(current)
    }
}

fn enumerate_assignments(options: &[Vec<Option<usize>>]) -> Assignments<'_> {
    let radices: Vec<usize> = options.iter().map(Vec::len).collect();
    Assignments {
        options,
        done: radices.contains(&0),
        digits: vec![0; options.len()],
        radices,
    }
}

/// Blockers of attacker `a` under `assignment`, in blocker order
fn blockers_of(assignment: &[Option<usize>], a: usize) -> BlockerList {
    assignment
        .iter()
        .enumerate()
        .filter(|(_, choice)| **choice == Some(a))
        .map(|(b, _)| b)
        .collect()
}

/// Worst score for the defender over every damage order of `assignment`
///
/// Stops at the first illegal evaluation: the block itself is illegal.
fn worst_case_score(
    scenario: &CombatScenario<'_>,
    assignment: &[Option<usize>],
    counter: &Rc<IterationCounter>,
) -> Result<Score> {
    let multi: Vec<(usize, Vec<BlockerList>)> = (0..scenario.attackers.len())
        .filter_map(|a| {
            let blockers = blockers_of(assignment, a);
            (blockers.len() > 1).then(|| (a, damage_order_permutations(&blockers)))
        })
        .collect();

    let radices: Vec<usize> = multi.iter().map(|(_, perms)| perms.len()).collect();
    let mut digits = vec![0; multi.len()];
    let mut worst: Option<Score> = None;
    loop {
        let orders: DamageOrders = multi
            .iter()
            .zip(&digits)
            .map(|((a, perms), &d)| (*a, perms[d].clone()))
            .collect();
        let score = match evaluate_block_assignment(scenario, assignment, counter, Some(&orders))? {
            Evaluation::Scored { score, .. } => score,
            Evaluation::Illegal { .. } => return Ok(Score::ILLEGAL),
        };
        if worst.map_or(true, |w| score > w) {
            worst = Some(score);
        }
        if !advance_odometer(&mut digits, &radices) {
            break;
        }
    }
    Ok(worst.unwrap_or(Score::ILLEGAL))
}

/// Write `assignment` into the caller's creatures, replacing existing links
fn apply_assignment(
    attackers: &mut [Creature],
    blockers: &mut [Creature],
    assignment: &[Option<usize>],
) {
    for creature in attackers.iter_mut().chain(blockers.iter_mut()) {
        creature.clear_combat_links();
    }
    for (b, choice) in assignment.iter().enumerate() {
        if let Some(a) = *choice {
            blockers[b].blocking = Some(a);
            attackers[a].blocked_by.push(b);
        }
    }
}

fn log_decision(options: &SearchOptions, kind: &str, decision: &BlockDecision) {
    let logger =
        CombatLogger::with_verbosity(options.verbosity).with_output_format(options.output_format);
    match decision.best() {
        Some(best) => logger.log(
            VerbosityLevel::Minimal,
            Some("search"),
            format_args!(
                "{kind} blocks: {:?} scored {} ({} optimal, {} iterations)",
                best.assignment, best.score, decision.optimal_count, decision.iterations
            ),
        ),
        None => logger.log(
            VerbosityLevel::Minimal,
            Some("search"),
            format_args!(
                "{kind} blocks: no legal assignment ({} iterations)",
                decision.iterations
            ),
        ),
    }
}

/// Find the blocks that minimise the defender's worst-case score
///
/// Returns the `k` best legal assignments ranked by `(score, key)`, how many
/// assignments tie for the best score, and the simulations used. The best
/// assignment is written into `attackers` and `blockers`.
pub fn decide_optimal_blocks(
    attackers: &mut [Creature],
    blockers: &mut [Creature],
    state: Option<&GameState>,
    provoke: &CreatureMap,
    mentor: &CreatureMap,
    options: &SearchOptions,
) -> Result<BlockDecision> {
    check_provoke_map(attackers, blockers, provoke)?;
    let counter = Rc::new(IterationCounter::new(options.max_iterations));

    let mut scored: Vec<(Score, Vec<usize>, Assignment)> = Vec::new();
    {
        let scenario = CombatScenario::new(attackers, blockers)
            .with_state(state)
            .with_provoke(provoke)
            .with_mentor(mentor);
        let choices = blocker_options(attackers, blockers, provoke);
        for assignment in enumerate_assignments(&choices) {
            let score = worst_case_score(&scenario, &assignment, &counter)?;
            if score.is_illegal() {
                continue;
            }
            let key = assignment_key(&assignment, attackers.len());
            scored.push((score, key, assignment));
        }
    }
    scored.sort();

    let optimal_count = scored
        .first()
        .map(|(best, _, _)| scored.iter().take_while(|(s, _, _)| s == best).count())
        .unwrap_or(0);

    if let Some((_, _, best)) = scored.first() {
        apply_assignment(attackers, blockers, best);
    }

    let decision = BlockDecision {
        ranked: scored
            .into_iter()
            .take(options.k)
            .map(|(score, _, assignment)| RankedAssignment { score, assignment })
            .collect(),
        optimal_count,
        iterations: counter.count(),
    };
    log_decision(options, "Optimal", &decision);
    Ok(decision)
}

/// Every attacker has at most one blocker, or exactly two if it has menace
fn is_minimal(attackers: &[Creature], assignment: &[Option<usize>]) -> bool {
    attackers.iter().enumerate().all(|(a, attacker)| {
        let count = assignment.iter().filter(|c| **c == Some(a)).count();
        if attacker.keywords.menace {
            count == 0 || count == 2
        } else {
            count <= 1
        }
    })
}

/// Greedy blocking heuristic
///
/// Stage one ranks the minimal assignments by score ignoring game loss.
/// Stage two adds one unused blocker at a time to any attacker while the
/// full score strictly improves. Returns a single assignment.
pub fn decide_simple_blocks(
    attackers: &mut [Creature],
    blockers: &mut [Creature],
    state: Option<&GameState>,
    provoke: &CreatureMap,
    mentor: &CreatureMap,
    options: &SearchOptions,
) -> Result<BlockDecision> {
    check_provoke_map(attackers, blockers, provoke)?;
    let counter = Rc::new(IterationCounter::new(options.max_iterations));

    let chosen = {
        let scenario = CombatScenario::new(attackers, blockers)
            .with_state(state)
            .with_provoke(provoke)
            .with_mentor(mentor);
        let choices = blocker_options(attackers, blockers, provoke);

        let mut base: Option<(Score, Vec<usize>, Assignment, Score)> = None;
        for assignment in enumerate_assignments(&choices) {
            if !is_minimal(attackers, &assignment) {
                continue;
            }
            let full = evaluate_block_assignment(&scenario, &assignment, &counter, None)?.score();
            if full.is_illegal() {
                continue;
            }
            let ranking = full.without_loss();
            let key = assignment_key(&assignment, attackers.len());
            let better = base
                .as_ref()
                .map_or(true, |(s, k, _, _)| (ranking, &key) < (*s, k));
            if better {
                base = Some((ranking, key, assignment, full));
            }
        }

        base.map(|(_, _, mut assignment, mut score)| -> Result<(Assignment, Score)> {
            loop {
                let mut improved: Option<(Assignment, Score)> = None;
                for b in 0..blockers.len() {
                    if assignment[b].is_some() || blockers[b].tapped {
                        continue;
                    }
                    for a in 0..attackers.len() {
                        if !can_block(&attackers[a], &blockers[b]) {
                            continue;
                        }
                        let mut candidate = assignment.clone();
                        candidate[b] = Some(a);
                        let s = evaluate_block_assignment(&scenario, &candidate, &counter, None)?
                            .score();
                        let target = improved.as_ref().map_or(score, |(_, best)| *best);
                        if s < target {
                            improved = Some((candidate, s));
                        }
                    }
                }
                match improved {
                    Some((next, s)) => {
                        assignment = next;
                        score = s;
                    }
                    None => return Ok((assignment, score)),
                }
            }
        })
        .transpose()?
    };

    if let Some((assignment, _)) = &chosen {
        apply_assignment(attackers, blockers, assignment);
    }

    let decision = BlockDecision {
        ranked: chosen
            .into_iter()
            .map(|(assignment, score)| RankedAssignment { score, assignment })
            .take(options.k)
            .collect(),
        optimal_count: 1,
        iterations: counter.count(),
    };
    log_decision(options, "Simple", &decision);
    Ok(decision)
}

type BlockSearch = fn(
    &mut [Creature],
    &mut [Creature],
    Option<&GameState>,
    &CreatureMap,
    &CreatureMap,
    &SearchOptions,
) -> Result<BlockDecision>;

/// Run `search` on the creatures of players "A" (attacking) and "B" (blocking)
fn search_state(
    state: &mut GameState,
    provoke: &CreatureMap,
    mentor: &CreatureMap,
    options: &SearchOptions,
    search: BlockSearch,
) -> Result<BlockDecision> {
    let roster = |state: &GameState, id: &PlayerId| {
        state
            .player(id)
            .map(|p| p.creatures.clone())
            .unwrap_or_default()
    };
    let (a, b) = (PlayerId::attacker(), PlayerId::defender());
    let mut attackers = roster(state, &a);
    let mut blockers = roster(state, &b);

    let decision = search(
        &mut attackers,
        &mut blockers,
        Some(&*state),
        provoke,
        mentor,
        options,
    )?;

    if let Some(player) = state.player_mut(&a) {
        player.creatures = attackers;
    }
    if let Some(player) = state.player_mut(&b) {
        player.creatures = blockers;
    }
    Ok(decision)
}

/// `decide_optimal_blocks` on the "A" and "B" rosters of a game state
pub fn decide_optimal_blocks_for_state(
    state: &mut GameState,
    provoke: &CreatureMap,
    mentor: &CreatureMap,
    options: &SearchOptions,
) -> Result<BlockDecision> {
    search_state(state, provoke, mentor, options, decide_optimal_blocks)
}

/// `decide_simple_blocks` on the "A" and "B" rosters of a game state
pub fn decide_simple_blocks_for_state(
    state: &mut GameState,
    provoke: &CreatureMap,
    mentor: &CreatureMap,
    options: &SearchOptions,
) -> Result<BlockDecision> {
    search_state(state, provoke, mentor, options, decide_simple_blocks)
}
