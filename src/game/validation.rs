//! Blocking legality
//!
//! `can_block` answers the pairwise evasion question. `validate_blocking`
//! checks a whole declared block against every rule, including the ones
//! that need the full rosters (menace, provoke).

use crate::core::{Color, Creature};
use crate::{CombatError, Result};
use std::collections::BTreeMap;

/// Whether `blocker` may block `attacker` given evasion and protection
///
/// Tapped status, menace and provoke are not considered here.
pub fn can_block(attacker: &Creature, blocker: &Creature) -> bool {
    let atk = &attacker.keywords;
    let blk = &blocker.keywords;

    if atk.unblockable {
        return false;
    }
    if atk.flying && !(blk.flying || blk.reach) {
        return false;
    }
    // A shadow attacker can only be blocked by shadow
    if atk.shadow && !blk.shadow {
        return false;
    }
    if atk.horsemanship && !blk.horsemanship {
        return false;
    }
    if atk.skulk && blocker.effective_power() > attacker.effective_power() {
        return false;
    }
    if atk.fear && !(blocker.artifact || blocker.colors.contains(Color::Black)) {
        return false;
    }
    if atk.intimidate && !(blocker.artifact || blocker.colors.intersects(&attacker.colors)) {
        return false;
    }
    if atk.daunt && blocker.effective_power() <= 2 {
        return false;
    }
    if attacker.is_protected_from_any(&blocker.colors) {
        return false;
    }
    true
}

/// Whether `target` can block `attacker` and at least one other untapped
/// blocker could join it, so a menace attacker can actually be blocked
fn menace_block_possible(
    attacker: &Creature,
    blockers: &[Creature],
    target: usize,
) -> bool {
    blockers
        .iter()
        .enumerate()
        .any(|(i, b)| i != target && !b.tapped && can_block(attacker, b))
}

/// Whether provoke forces `blockers[target]` to block `attackers[provoker]`
///
/// The requirement lapses when the target is tapped, cannot legally block
/// the provoker, or the provoker has menace and no second blocker is
/// available.
pub fn provoke_requires_block(
    attackers: &[Creature],
    blockers: &[Creature],
    provoker: usize,
    target: usize,
) -> bool {
    let (Some(attacker), Some(blocker)) = (attackers.get(provoker), blockers.get(target)) else {
        return false;
    };
    if blocker.tapped || !can_block(attacker, blocker) {
        return false;
    }
    if attacker.keywords.menace && !menace_block_possible(attacker, blockers, target) {
        return false;
    }
    true
}

/// Check that every provoke entry names creatures in the rosters
pub fn check_provoke_map(
    attackers: &[Creature],
    blockers: &[Creature],
    provoke: &BTreeMap<usize, usize>,
) -> Result<()> {
    for (&provoker, &target) in provoke {
        if provoker >= attackers.len() {
            return Err(CombatError::UnknownMapping(format!(
                "provoke attacker #{provoker} is not attacking"
            )));
        }
        if target >= blockers.len() {
            return Err(CombatError::UnknownMapping(format!(
                "provoke target #{target} is not a defending creature"
            )));
        }
    }
    Ok(())
}

/// Validate the declared blocks
///
/// Fails with `IllegalBlock` on the first violated rule and with
/// `UnknownMapping` when the provoke map points outside the rosters.
pub fn validate_blocking(
    attackers: &[Creature],
    blockers: &[Creature],
    provoke: &BTreeMap<usize, usize>,
) -> Result<()> {
    check_provoke_map(attackers, blockers, provoke)?;
    check_block_links(attackers, blockers)?;

    for attacker in attackers {
        if attacker.blocked_by.is_empty() {
            continue;
        }
        if attacker.keywords.unblockable {
            return Err(illegal(format!("{} can't be blocked", attacker.name)));
        }
        if attacker.keywords.menace && attacker.blocked_by.len() < 2 {
            return Err(illegal(format!(
                "{} has menace and was blocked by only one creature",
                attacker.name
            )));
        }
        for &b in &attacker.blocked_by {
            let blocker = &blockers[b];
            if !can_block(attacker, blocker) {
                return Err(illegal(format!(
                    "{} can't block {}",
                    blocker.name, attacker.name
                )));
            }
        }
    }

    for blocker in blockers {
        if blocker.blocking.is_some() && blocker.tapped {
            return Err(illegal(format!("{} is tapped and can't block", blocker.name)));
        }
    }

    for (&provoker, &target) in provoke {
        if provoke_requires_block(attackers, blockers, provoker, target)
            && blockers[target].blocking != Some(provoker)
        {
            return Err(illegal(format!(
                "{} was provoked by {} and must block it",
                blockers[target].name, attackers[provoker].name
            )));
        }
    }

    Ok(())
}

/// `blocking` and `blocked_by` must describe the same block, with no
/// out-of-range index and no blocker listed twice
fn check_block_links(attackers: &[Creature], blockers: &[Creature]) -> Result<()> {
    for blocker in blockers {
        if let Some(a) = blocker.blocking {
            if a >= attackers.len() {
                return Err(illegal(format!(
                    "{} is assigned to unknown attacker #{a}",
                    blocker.name
                )));
            }
        }
    }

    for (i, attacker) in attackers.iter().enumerate() {
        for (pos, &b) in attacker.blocked_by.iter().enumerate() {
            let Some(blocker) = blockers.get(b) else {
                return Err(illegal(format!(
                    "{} is blocked by unknown blocker #{b}",
                    attacker.name
                )));
            };
            if blocker.blocking != Some(i) {
                return Err(illegal(format!(
                    "inconsistent block: {} lists {} as a blocker",
                    attacker.name, blocker.name
                )));
            }
            if attacker.blocked_by[..pos].contains(&b) {
                return Err(illegal(format!(
                    "{} listed more than once as a blocker",
                    blocker.name
                )));
            }
        }
    }

    for (b, blocker) in blockers.iter().enumerate() {
        if let Some(a) = blocker.blocking {
            if !attackers[a].blocked_by.contains(&b) {
                return Err(illegal(format!(
                    "inconsistent block: {} is not listed as blocking {}",
                    blocker.name, attackers[a].name
                )));
            }
        }
    }
    Ok(())
}

fn illegal(message: String) -> CombatError {
    CombatError::IllegalBlock(message)
}
